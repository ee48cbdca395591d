//! The per-thread, per-type capture stack.
//!
//! [`CaptureStack<T>`] is the thing capture-site helpers call into: a LIFO
//! stack of whatever is currently installed for a given capability `T` on the
//! calling thread. [`ScopedCapture<T>`](crate::ScopedCapture) pushes a
//! thread-confined entry; [`AutoCrossingCapture<T>`](crate::AutoCrossingCapture)
//! and [`ManualCrossThreads<T>`](crate::ManualCrossThreads) push a
//! cross-thread-safe one. Both land in the same stack, so they compose under
//! one LIFO discipline.
//!
//! There is one stack per `(thread, T)` pair. Rather than a type-indexed map,
//! each `T` gets its own `thread_local!` storage: the storage is declared
//! inside a function generic over `T`, so monomorphizing that function for a
//! concrete `T` produces a distinct, independently-initialized thread-local
//! for that type.
use core::{cell::Cell, cell::RefCell, marker::PhantomData};

thread_local! {
    static EVENT_CLOCK: Cell<u64> = const { Cell::new(0) };
}

/// Ticks the per-thread logical clock shared by every capability `T`. Used to
/// detect non-LIFO destruction and to decide what counts as "installed since
/// a restoration scope began" (see `crosser`).
pub(crate) fn tick() -> u64 {
    EVENT_CLOCK.with(|clock| {
        let next = clock.get().wrapping_add(1);
        clock.set(next);
        next
    })
}

/// One entry in a capability's stack: either a thread-confined capture or one
/// that has been proven safe to observe from another thread.
pub(crate) enum Held<T: ?Sized> {
    #[cfg(feature = "cell")]
    Local(crate::cell::Lich<T>),
    #[cfg(feature = "lock")]
    Bridged(crate::lock::Lich<T>),
}

impl<T: ?Sized> Held<T> {
    fn with<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        match self {
            #[cfg(feature = "cell")]
            Held::Local(lich) => f(lich.borrow().as_deref()),
            #[cfg(feature = "lock")]
            Held::Bridged(lich) => f(lich.borrow().as_deref()),
        }
    }
}

struct Entry<T: ?Sized> {
    held: Held<T>,
    generation: u64,
}

fn with_stack<T: ?Sized + 'static, R>(f: impl FnOnce(&mut Vec<Entry<T>>) -> R) -> R {
    thread_local! {
        static STACK: RefCell<Vec<Entry<T>>> = const { RefCell::new(Vec::new()) };
    }
    STACK.with(|stack| f(&mut stack.borrow_mut()))
}

/// Pushes a new entry for `T` on the calling thread and returns the logical
/// clock value ("generation") it was pushed at, which the caller must hand
/// back to [`pop`] on destruction.
pub(crate) fn push<T: ?Sized + 'static>(held: Held<T>) -> u64 {
    let generation = tick();
    with_stack::<T, _>(|stack| stack.push(Entry { held, generation }));
    generation
}

/// Pops the entry for `T` pushed at `generation`. Asserts in debug builds
/// that it is still the top of the stack, i.e. that guards for `T` are being
/// destroyed in the same order they were constructed.
pub(crate) fn pop<T: ?Sized + 'static>(generation: u64) -> Held<T> {
    with_stack::<T, _>(|stack| {
        debug_assert_eq!(
            stack.last().map(|entry| entry.generation),
            Some(generation),
            "capture scopes were not destroyed in LIFO order",
        );
        stack
            .pop()
            .expect("a push exists for every generation handed out by `push`")
            .held
    })
}

/// The per-thread, per-type capture point. Has no instances of its own; it is
/// only ever used through its associated function.
pub struct CaptureStack<T: ?Sized + 'static>(PhantomData<T>);

impl<T: ?Sized + 'static> CaptureStack<T> {
    /// Calls `f` with the currently active `T` capture on this thread, or
    /// `None` if there isn't one.
    ///
    /// While a [`ThreadCrosser`](crate::ThreadCrosser) restoration is active
    /// on this thread, this honors the overlay rule: a `T` installed on this
    /// thread since the restoration began always wins; failing that, the
    /// restored snapshot's `T` (if any) is used; failing that, `None`.
    #[cfg(feature = "lock")]
    pub fn with_current<R>(f: impl FnOnce(Option<&T>) -> R) -> R {
        if let Some(frame) = crate::crosser::innermost_restoration() {
            return with_stack::<T, _>(|stack| match stack.last() {
                Some(entry) if entry.generation > frame.enter_generation => entry.held.with(f),
                _ => match frame.snapshot.find::<T>() {
                    Some(lich) => f(lich.borrow().as_deref()),
                    None => f(None),
                },
            });
        }
        with_stack::<T, _>(|stack| match stack.last() {
            Some(entry) => entry.held.with(f),
            None => f(None),
        })
    }

    #[cfg(not(feature = "lock"))]
    pub fn with_current<R>(f: impl FnOnce(Option<&T>) -> R) -> R {
        with_stack::<T, _>(|stack| match stack.last() {
            Some(entry) => entry.held.with(f),
            None => f(None),
        })
    }
}

/// Returns a clone of the cross-thread-safe handle currently installed for
/// `T` on this thread — the same entry [`CaptureStack::with_current`] would
/// read, overlay rule included — or `None` if nothing is installed, or if
/// what is installed is thread-confined (a plain
/// [`ScopedCapture<T>`](crate::ScopedCapture)) rather than bridgeable.
///
/// This is what [`ThreadBridge::new`](crate::ThreadBridge::new) calls: a
/// bridge can only ever carry what is *actually* current, never an arbitrary
/// reference handed in by the caller.
#[cfg(feature = "lock")]
pub(crate) fn current_bridged<T: ?Sized + 'static>() -> Option<crate::lock::Lich<T>> {
    fn bridged<T: ?Sized + 'static>(held: &Held<T>) -> Option<crate::lock::Lich<T>> {
        match held {
            Held::Bridged(lich) => Some(lich.clone()),
            #[cfg(feature = "cell")]
            Held::Local(_) => None,
        }
    }

    if let Some(frame) = crate::crosser::innermost_restoration() {
        return with_stack::<T, _>(|stack| match stack.last() {
            Some(entry) if entry.generation > frame.enter_generation => bridged(&entry.held),
            _ => frame.snapshot.find::<T>().cloned(),
        });
    }
    with_stack::<T, _>(|stack| stack.last().and_then(|entry| bridged(&entry.held)))
}
