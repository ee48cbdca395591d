//! [`ScopedCapture<T>`], the thread-confined installer guard.
#![cfg(feature = "cell")]

use crate::{
    shroud::Shroud,
    stack::{self, Held},
};
use core::marker::PhantomData;

/// Installs a capture point of shape `T` for the duration of its scope.
///
/// Construction pushes onto the calling thread's [`CaptureStack<T>`](crate::CaptureStack);
/// destruction pops it, making whatever was previously current, current
/// again. Never visible from another thread — see
/// [`AutoCrossingCapture<T>`](crate::AutoCrossingCapture) for a variant that
/// opts into that.
pub struct ScopedCapture<'a, T: ?Sized + 'static> {
    soul: Option<crate::cell::Soul<'a>>,
    generation: u64,
    _marker: PhantomData<&'a T>,
}

impl<'a, T: ?Sized + 'static> ScopedCapture<'a, T> {
    /// Installs `capture` as the current `T` on this thread until the
    /// returned guard is dropped.
    pub fn new<Concrete: 'a>(capture: &'a Concrete) -> Self
    where
        T: Shroud<Concrete>,
    {
        let (lich, soul) = crate::cell::ritual::<Concrete, T>(capture);
        let generation = stack::push(Held::Local(lich));
        Self {
            soul: Some(soul),
            generation,
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized + 'static> Drop for ScopedCapture<'_, T> {
    fn drop(&mut self) {
        let held = stack::pop::<T>(self.generation);
        if let Held::Local(lich) = held {
            let soul = self.soul.take().expect("soul is only taken here, once");
            crate::cell::redeem(lich, soul).ok();
        }
    }
}
