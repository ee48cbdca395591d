//! A request-scoped authorization context installed with [`ScopedCapture<T>`].
//!
//! Unlike the logger in `logger_crossing.rs`, an authorization context here
//! is deliberately thread-confined: it never needs to cross to a worker, and
//! using the plain (non-auto-crossing) guard means there is no crosser
//! bookkeeping for it at all. Nested requests (e.g. an internal sub-request)
//! override the outer context for their own extent and restore it on exit.

use capture_thread::{shroud, stack::CaptureStack, ScopedCapture};

pub trait Authorization {
    fn principal(&self) -> &str;
    fn can(&self, action: &str) -> bool;
}
shroud!(Authorization);

pub struct Context {
    principal: &'static str,
    allowed: &'static [&'static str],
}

impl Authorization for Context {
    fn principal(&self) -> &str {
        self.principal
    }

    fn can(&self, action: &str) -> bool {
        self.allowed.contains(&action)
    }
}

fn require(action: &str) -> bool {
    CaptureStack::<dyn Authorization>::with_current(|current| {
        current.is_some_and(|context| context.can(action))
    })
}

fn handle_request() {
    let user = Context {
        principal: "alice",
        allowed: &["read"],
    };
    let _scope = ScopedCapture::<dyn Authorization>::new(&user);

    assert!(require("read"));
    assert!(!require("write"));

    // An internal sub-request running with elevated, narrower privileges.
    {
        let system = Context {
            principal: "system",
            allowed: &["write"],
        };
        let _inner = ScopedCapture::<dyn Authorization>::new(&system);
        assert!(require("write"));
        assert!(!require("read"));
    }

    // Back outside the sub-request, alice's context is current again.
    assert!(require("read"));
    assert!(!require("write"));
}

fn main() {
    assert!(!require("read"));
    handle_request();
    assert!(!require("read"));
}
