//! A logger capture point crossed to a spawned thread.
//!
//! Demonstrates [`AutoCrossingCapture<T>`] and [`ThreadCrosser::wrap_call`]:
//! the logger installed on the main thread stays current inside the closure
//! handed to `thread::spawn`, even though the closure runs on a thread that
//! never itself installed anything.

use capture_thread::{shroud, stack::CaptureStack, AutoCrossingCapture, ThreadCrosser};
use std::sync::Mutex;
use std::thread;

pub trait Log: Send + Sync {
    fn log(&self, line: &str);
}
shroud!(Log +);

#[derive(Default)]
pub struct LineSink(Mutex<Vec<String>>);

impl Log for LineSink {
    fn log(&self, line: &str) {
        self.0.lock().unwrap().push(line.to_string());
    }
}

fn log(line: &str) {
    CaptureStack::<dyn Log>::with_current(|current| {
        if let Some(sink) = current {
            sink.log(line);
        }
    });
}

fn main() {
    let sink = LineSink::default();
    let _scope = AutoCrossingCapture::<dyn Log>::new(&sink);
    log("dispatching work");

    // `wrap_call` snapshots the currently active auto-crossing captures right
    // now; the worker thread does not need to install anything of its own.
    let wrapped = ThreadCrosser::wrap_call(Some(|| log("running on the worker"))).unwrap();
    thread::spawn(move || wrapped.call()).join().unwrap();

    log("work dispatched");

    assert_eq!(
        sink.0.lock().unwrap().as_slice(),
        ["dispatching work", "running on the worker", "work dispatched"],
    );
}
