//! Auto-crossing captures and the snapshot-and-restore mechanism that carries
//! them across a thread hand-off.
#![cfg(feature = "lock")]

use crate::{
    shroud::Shroud,
    stack::{self, Held},
};
use core::{any::Any, cell::RefCell, marker::PhantomData};
use std::sync::Arc;

thread_local! {
    static LOCAL_CROSSER_TOP: RefCell<CrosserSnapshot> = const { RefCell::new(CrosserSnapshot(None)) };
    static RESTORATIONS: RefCell<Vec<RestorationFrame>> = const { RefCell::new(Vec::new()) };
}

struct CrosserNode {
    capture: Box<dyn Any + Send + Sync>,
    parent: CrosserSnapshot,
}

/// A non-owning handle to the chain of auto-crossing captures active on a
/// thread at the instant it was taken.
///
/// Cheap to clone (an `Arc` bump); safe to use from multiple threads
/// concurrently, each establishing its own independent restoration scope.
#[derive(Clone, Default)]
pub struct CrosserSnapshot(Option<Arc<CrosserNode>>);

impl CrosserSnapshot {
    /// The snapshot of "no auto-crossing capture active".
    pub fn empty() -> Self {
        Self(None)
    }

    /// Whether this snapshot carries any auto-crossing capture at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    fn same_allocation(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub(crate) fn find<T: ?Sized + 'static>(&self) -> Option<&crate::lock::Lich<T>> {
        let mut node = self.0.as_deref();
        while let Some(current) = node {
            if let Some(lich) = current.capture.downcast_ref::<crate::lock::Lich<T>>() {
                return Some(lich);
            }
            node = current.parent.0.as_deref();
        }
        None
    }
}

#[derive(Clone)]
pub(crate) struct RestorationFrame {
    pub(crate) snapshot: CrosserSnapshot,
    pub(crate) enter_generation: u64,
    local_top_at_entry: CrosserSnapshot,
}

pub(crate) fn innermost_restoration() -> Option<RestorationFrame> {
    RESTORATIONS.with(|restorations| restorations.borrow().last().cloned())
}

fn enter_restoration(snapshot: CrosserSnapshot) {
    let enter_generation = stack::tick();
    let local_top_at_entry = LOCAL_CROSSER_TOP.with(|top| top.borrow().clone());
    RESTORATIONS.with(|restorations| {
        restorations.borrow_mut().push(RestorationFrame {
            snapshot,
            enter_generation,
            local_top_at_entry,
        });
    });
}

fn exit_restoration() {
    RESTORATIONS.with(|restorations| {
        restorations.borrow_mut().pop();
    });
}

/// The crosser top as it should be observed *right now* on this thread: the
/// newest auto-crossing capture installed locally since the innermost active
/// restoration began, or that restoration's own snapshot if nothing has been
/// installed locally since, or the plain local chain if no restoration is
/// active at all.
pub(crate) fn effective_top() -> CrosserSnapshot {
    let local = LOCAL_CROSSER_TOP.with(|top| top.borrow().clone());
    RESTORATIONS.with(|restorations| {
        if let Some(frame) = restorations.borrow().last() {
            if local.same_allocation(&frame.local_top_at_entry) {
                return frame.snapshot.clone();
            }
        }
        local
    })
}

/// Installs a capture point of shape `T`, the same as
/// [`ScopedCapture<T>`](crate::ScopedCapture), but additionally enrolls with
/// the crosser registry so a [`ThreadCrosser::wrap_call`] taken while this
/// guard is alive can re-establish it on another thread.
pub struct AutoCrossingCapture<'a, T: ?Sized + Send + Sync + 'static> {
    soul: Option<crate::lock::Soul<'a>>,
    generation: u64,
    previous_local_top: CrosserSnapshot,
    _marker: PhantomData<&'a T>,
}

impl<'a, T: ?Sized + Send + Sync + 'static> AutoCrossingCapture<'a, T> {
    /// Installs `capture` as the current `T` on this thread, and as the
    /// newest auto-crossing capture in the crosser chain, until the returned
    /// guard is dropped.
    pub fn new<Concrete: 'a>(capture: &'a Concrete) -> Self
    where
        T: Shroud<Concrete>,
    {
        let (lich, soul) = crate::lock::ritual::<Concrete, T>(capture);
        let for_node = lich.clone();
        let generation = stack::push(Held::Bridged(lich));

        let parent = effective_top();
        let previous_local_top = LOCAL_CROSSER_TOP.with(|top| top.borrow().clone());
        let node = Arc::new(CrosserNode {
            capture: Box::new(for_node),
            parent,
        });
        LOCAL_CROSSER_TOP.with(|top| *top.borrow_mut() = CrosserSnapshot(Some(node)));

        Self {
            soul: Some(soul),
            generation,
            previous_local_top,
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized + Send + Sync + 'static> Drop for AutoCrossingCapture<'_, T> {
    fn drop(&mut self) {
        let held = stack::pop::<T>(self.generation);
        LOCAL_CROSSER_TOP.with(|top| *top.borrow_mut() = self.previous_local_top.clone());
        if let Held::Bridged(lich) = held {
            let soul = self.soul.take().expect("soul is only taken here, once");
            crate::lock::redeem(lich, soul).ok();
        }
    }
}

/// A callable that re-establishes a [`CrosserSnapshot`] for the duration of
/// its call, wherever it is called.
///
/// Produced by [`ThreadCrosser::wrap_call`]. Invoking it borrows rather than
/// consumes it, so the same `Wrapped<R>` can be run again — including
/// concurrently from different threads, each establishing its own
/// independent restoration scope. `Send + Sync` for exactly that reason.
pub struct Wrapped<R> {
    snapshot: CrosserSnapshot,
    call: Arc<dyn Fn() -> R + Send + Sync>,
}

impl<R> Clone for Wrapped<R> {
    fn clone(&self) -> Self {
        Self {
            snapshot: self.snapshot.clone(),
            call: Arc::clone(&self.call),
        }
    }
}

impl<R> Wrapped<R> {
    /// Enters the restoration scope for the captured snapshot, runs the
    /// wrapped callable, then exits the scope — even if the callable panics.
    pub fn call(&self) -> R {
        enter_restoration(self.snapshot.clone());
        struct ExitOnDrop;
        impl Drop for ExitOnDrop {
            fn drop(&mut self) {
                exit_restoration();
            }
        }
        let _exit = ExitOnDrop;
        (self.call)()
    }
}

/// Converts a plain callable or an already-[`Wrapped<R>`] one into a
/// `Wrapped<R>`, taking the snapshot now rather than at call time.
///
/// The two impls below are what make [`ThreadCrosser::wrap_call`] idempotent:
/// wrapping a `Wrapped<R>` is a distinguishable, zero-cost no-op rather than
/// a fresh snapshot nested around the old one.
pub trait IntoWrapped<R> {
    fn into_wrapped(self) -> Wrapped<R>;
}

impl<R, F: Fn() -> R + Send + Sync + 'static> IntoWrapped<R> for F {
    fn into_wrapped(self) -> Wrapped<R> {
        Wrapped {
            snapshot: effective_top(),
            call: Arc::new(self),
        }
    }
}

impl<R> IntoWrapped<R> for Wrapped<R> {
    fn into_wrapped(self) -> Wrapped<R> {
        self
    }
}

/// The process-wide snapshot-and-restore mechanism.
pub struct ThreadCrosser;

impl ThreadCrosser {
    /// Captures the auto-crossing environment active on the calling thread
    /// right now, and returns a callable that re-establishes it for the
    /// duration of `call`, wherever that callable is invoked.
    ///
    /// `None` in, `None` out, with no snapshot taken — wrapping nothing
    /// produces nothing.
    pub fn wrap_call<R>(call: Option<impl IntoWrapped<R>>) -> Option<Wrapped<R>> {
        call.map(IntoWrapped::into_wrapped)
    }
}
