#![cfg(feature = "lock")]

use capture_thread::{shroud, stack::CaptureStack, AutoCrossingCapture, ManualCrossThreads, ThreadBridge};
use std::sync::Mutex;
use std::thread;

trait Log: Send + Sync {
    fn log(&self, line: &str);
}
shroud!(Log +);

#[derive(Default)]
struct Sink(Mutex<Vec<String>>);

impl Log for Sink {
    fn log(&self, line: &str) {
        self.0.lock().unwrap().push(line.to_string());
    }
}

fn emit(line: &str) {
    CaptureStack::<dyn Log>::with_current(|current| {
        if let Some(log) = current {
            log.log(line);
        }
    });
}

#[test]
fn bridge_crosses_a_single_hop() {
    let sink = Sink::default();
    let _installed = AutoCrossingCapture::<dyn Log>::new(&sink);
    let bridge = ThreadBridge::<dyn Log>::new().unwrap();

    thread::scope(|scope| {
        scope.spawn(|| {
            let _installed = ManualCrossThreads::new(bridge);
            emit("hello from another thread");
        });
    });

    assert_eq!(sink.0.lock().unwrap().as_slice(), ["hello from another thread"]);
}

#[test]
fn bridge_can_be_cloned_to_many_threads() {
    let sink = Sink::default();
    let _installed = AutoCrossingCapture::<dyn Log>::new(&sink);
    let bridge = ThreadBridge::<dyn Log>::new().unwrap();

    thread::scope(|scope| {
        for n in 0..3 {
            let bridge = bridge.clone();
            scope.spawn(move || {
                let _installed = ManualCrossThreads::new(bridge);
                emit(&n.to_string());
            });
        }
    });

    let mut recorded = sink.0.lock().unwrap().clone();
    recorded.sort();
    assert_eq!(recorded, ["0", "1", "2"]);
}

#[test]
fn bridge_is_not_automatically_current_until_installed() {
    let sink = Sink::default();
    let _installed = AutoCrossingCapture::<dyn Log>::new(&sink);
    let bridge = ThreadBridge::<dyn Log>::new().unwrap();
    // Just constructing the bridge must not install it on this thread — it
    // only ever observes this thread's existing `AutoCrossingCapture`.
    emit("observed once, via the auto-crossing capture already installed");
    drop(bridge);
    assert_eq!(
        sink.0.lock().unwrap().as_slice(),
        ["observed once, via the auto-crossing capture already installed"],
    );
}

#[test]
fn thread_bridge_new_is_none_without_an_active_capture() {
    assert!(ThreadBridge::<dyn Log>::new().is_none());
}

#[test]
fn thread_bridge_new_is_none_over_a_thread_confined_scope() {
    #[cfg(feature = "cell")]
    {
        use capture_thread::ScopedCapture;

        let sink = Sink::default();
        let _scoped = ScopedCapture::<dyn Log>::new(&sink);
        // `sink` is current for `dyn Log`, but only thread-confined — it was
        // never enrolled as bridgeable.
        assert!(ThreadBridge::<dyn Log>::new().is_none());
    }
}

#[test]
fn manual_bridges_do_not_auto_cross_via_wrap_call() {
    use capture_thread::ThreadCrosser;

    let sink = Sink::default();
    let _origin = AutoCrossingCapture::<dyn Log>::new(&sink);
    let bridge = ThreadBridge::<dyn Log>::new().unwrap();
    let _installed = ManualCrossThreads::new(bridge);
    emit("local");

    let wrapped = ThreadCrosser::wrap_call(Some(|| {
        CaptureStack::<dyn Log>::with_current(|current| assert!(current.is_none()));
    }))
    .unwrap();
    thread::spawn(move || wrapped.call()).join().unwrap();

    assert_eq!(sink.0.lock().unwrap().as_slice(), ["local"]);
}
