//! [`ThreadBridge<T>`] / [`ManualCrossThreads<T>`]: a manual, single-type,
//! on-demand alternative to [`AutoCrossingCapture<T>`](crate::AutoCrossingCapture).
#![cfg(feature = "lock")]

use crate::stack::{self, Held};
use core::marker::PhantomData;

/// A `'static`, `Send + Sync` handle to whatever is currently the installed
/// `T` on the origin thread, transportable to another thread by value.
///
/// Construct on the origin thread with [`ThreadBridge::new`], which reads
/// `CaptureStack::<T>::with_current` at the instant it is called and clones
/// the cross-thread-safe handle already backing it — there is no way to
/// bridge a capture that isn't actually current, or one nothing installed.
/// On a destination thread, build a [`ManualCrossThreads<T>`] from a
/// (possibly cloned) bridge to make it the current `T` there.
///
/// Unlike [`AutoCrossingCapture<T>`](crate::AutoCrossingCapture), a bridge
/// crosses exactly one type, one capture, on demand — it never registers
/// with the crosser snapshot mechanism.
pub struct ThreadBridge<T: ?Sized + Send + Sync + 'static>(crate::lock::Lich<T>);

impl<T: ?Sized + Send + Sync + 'static> ThreadBridge<T> {
    /// Clones the handle behind whatever is current for `T` on this thread
    /// right now. `None` if nothing is installed, or if what's installed is
    /// thread-confined (a plain [`ScopedCapture<T>`](crate::ScopedCapture))
    /// rather than bridgeable.
    ///
    /// The origin's original guard still owns the real
    /// [`Soul`](crate::lock::Soul) and must outlive every destination thread
    /// using the bridge; this only ever hands out a clone of the `'static`
    /// handle, never a fresh one.
    pub fn new() -> Option<Self> {
        stack::current_bridged::<T>().map(Self)
    }
}

impl<T: ?Sized + Send + Sync + 'static> Clone for ThreadBridge<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

/// Installs a [`ThreadBridge<T>`] as the current `T` on the calling thread
/// until the returned guard is dropped. Behaves like
/// [`ScopedCapture<T>`](crate::ScopedCapture) from the destination thread's
/// point of view.
pub struct ManualCrossThreads<T: ?Sized + Send + Sync + 'static> {
    generation: u64,
    _marker: PhantomData<T>,
}

impl<T: ?Sized + Send + Sync + 'static> ManualCrossThreads<T> {
    pub fn new(bridge: ThreadBridge<T>) -> Self {
        let generation = stack::push(Held::Bridged(bridge.0));
        Self {
            generation,
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized + Send + Sync + 'static> Drop for ManualCrossThreads<T> {
    fn drop(&mut self) {
        let _held = stack::pop::<T>(self.generation);
    }
}
