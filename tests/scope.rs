#![cfg(feature = "cell")]

use capture_thread::{shroud, stack::CaptureStack, ScopedCapture};
use core::cell::RefCell;

trait Log {
    fn log(&self, line: &str);
}
shroud!(Log);

#[derive(Default)]
struct Sink(RefCell<Vec<String>>);

impl Log for Sink {
    fn log(&self, line: &str) {
        self.0.borrow_mut().push(line.to_string());
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
fn absent_capture_is_a_no_op() {
    // Invariant 1: no active capture, no restoration, no-op.
    CaptureStack::<dyn Log>::with_current(|current| {
        assert!(current.is_none());
    });
    emit("nothing should observe this");
}

#[test]
fn nested_scopes_are_lifo() {
    // Invariant 2: innermost scope wins; on its destruction the previous one
    // is current again.
    let outer = Sink::default();
    let _outer_scope = ScopedCapture::<dyn Log>::new(&outer);
    emit("1");
    {
        let inner = Sink::default();
        let _inner_scope = ScopedCapture::<dyn Log>::new(&inner);
        emit("2");
        assert_eq!(inner.0.borrow().as_slice(), ["2"]);
    }
    emit("3");
    assert_eq!(outer.0.borrow().as_slice(), ["1", "3"]);
}

#[test]
fn different_types_do_not_interfere() {
    trait Count {
        fn count(&self, value: i32);
    }
    shroud!(Count);

    #[derive(Default)]
    struct Counter(RefCell<Vec<i32>>);
    impl Count for Counter {
        fn count(&self, value: i32) {
            self.0.borrow_mut().push(value);
        }
    }

    let text = Sink::default();
    let _text_scope = ScopedCapture::<dyn Log>::new(&text);
    emit("x");

    let count = Counter::default();
    let _count_scope = ScopedCapture::<dyn Count>::new(&count);
    CaptureStack::<dyn Count>::with_current(|current| {
        if let Some(counter) = current {
            counter.count(1);
        }
    });
    emit("y");
    drop(_count_scope);
    emit("z");

    assert_eq!(text.0.borrow().as_slice(), ["x", "y", "z"]);
    assert_eq!(count.0.borrow().as_slice(), [1]);
}

#[test]
fn scope_is_not_visible_on_another_thread() {
    // Invariant 6 / scenario 3: a plain ScopedCapture never crosses.
    let sink = Sink::default();
    let _scope = ScopedCapture::<dyn Log>::new(&sink);
    emit("1");
    std::thread::spawn(|| emit("2")).join().unwrap();
    assert_eq!(sink.0.borrow().as_slice(), ["1"]);
}
