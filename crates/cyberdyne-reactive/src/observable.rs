#![forbid(unsafe_code)]

//! Observable value wrapper with change notification and version tracking.
//!
//! # Design
//!
//! [`Observable<T>`] wraps a value of type `T` in shared, reference-counted
//! storage (`Rc<RefCell<..>>`). A handle is an identity: cloning it yields a
//! second handle to the **same** cell, and [`Observable::ptr_eq`] tells two
//! handles apart. When the value changes (determined by `PartialEq`), live
//! subscribers are called in registration order and every parked
//! [`wait`](crate::wait) future is woken.
//!
//! # Performance
//!
//! | Operation     | Complexity                         |
//! |---------------|------------------------------------|
//! | `get()`       | O(1) + clone of `T`                |
//! | `set()`       | O(S + W), S subscribers, W waiters |
//! | `subscribe()` | O(1) amortized                     |
//!
//! # Failure Modes
//!
//! - **Re-entrant set from `update`**: the closure passed to `update()` runs
//!   under a mutable borrow; touching the same observable from inside it
//!   panics (RefCell borrow rules).
//! - **Subscriber leak**: callbacks whose [`Subscription`] guards are never
//!   dropped accumulate. Dead weak references are pruned during notification.
//! - **Abandoned waits**: a wait future dropped while pending leaves its
//!   task's waker parked until the next change, which drains all wakers.
//!   [`waiter_count`](Observable::waiter_count) includes such entries. The
//!   queue holds at most one entry per task.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::task::Waker;

type CallbackRc<T> = Rc<dyn Fn(&T)>;
type CallbackWeak<T> = Weak<dyn Fn(&T)>;

struct ObservableInner<T> {
    value: T,
    /// Value held immediately before the most recent change.
    previous: T,
    version: u64,
    /// Dead entries are pruned on notify.
    subscribers: Vec<CallbackWeak<T>>,
    /// Parked wait futures. Drained on every change.
    wakers: Vec<Waker>,
}

/// A shared, version-tracked value with change notification.
///
/// # Invariants
///
/// 1. `version` increments by exactly 1 on each value-changing mutation.
/// 2. `set(v)` where `v == current` is a no-op.
/// 3. Subscribers are notified in registration order.
/// 4. Every waker registered before a change is woken by that change.
pub struct Observable<T> {
    inner: Rc<RefCell<ObservableInner<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Observable")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("subscriber_count", &inner.subscribers.len())
            .field("waiter_count", &inner.wakers.len())
            .finish()
    }
}

impl<T> Observable<T> {
    /// Whether two handles refer to the same underlying cell.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// Create a new observable with the given initial value.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ObservableInner {
                previous: value.clone(),
                value,
                version: 0,
                subscribers: Vec::new(),
                wakers: Vec::new(),
            })),
        }
    }

    /// Get a clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Access the current value by reference without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    /// Set a new value. Returns `true` if the value changed, in which case
    /// the version is bumped, subscribers are called and waiters are woken.
    pub fn set(&self, value: T) -> bool {
        if !self.replace(value) {
            return false;
        }
        self.notify();
        true
    }

    /// Modify the value in place. Change detection compares against a
    /// snapshot taken before `f` runs.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool {
        {
            let mut inner = self.inner.borrow_mut();
            let old = inner.value.clone();
            f(&mut inner.value);
            if inner.value == old {
                return false;
            }
            inner.previous = old;
            inner.version += 1;
        }
        self.notify();
        true
    }

    /// Subscribe to value changes. The callback receives the new value.
    ///
    /// Dropping the returned [`Subscription`] unsubscribes.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let strong: CallbackRc<T> = Rc::new(callback);
        let weak = Rc::downgrade(&strong);
        self.inner.borrow_mut().subscribers.push(weak);
        Subscription {
            _guard: Box::new(strong),
        }
    }

    /// Number of value-changing mutations so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Registered subscribers, including dead ones not yet pruned.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    /// Futures currently parked on this observable.
    #[must_use]
    pub fn waiter_count(&self) -> usize {
        self.inner.borrow().wakers.len()
    }

    /// Current value together with the value it replaced.
    pub(crate) fn snapshot(&self) -> (T, T, u64) {
        let inner = self.inner.borrow();
        (inner.value.clone(), inner.previous.clone(), inner.version)
    }

    /// Store `value` without notifying. Returns `true` if it changed.
    pub(crate) fn replace(&self, value: T) -> bool {
        let mut inner = self.inner.borrow_mut();
        if inner.value == value {
            return false;
        }
        inner.previous = std::mem::replace(&mut inner.value, value);
        inner.version += 1;
        true
    }

    pub(crate) fn park(&self, waker: &Waker) {
        let mut inner = self.inner.borrow_mut();
        if !inner.wakers.iter().any(|w| w.will_wake(waker)) {
            inner.wakers.push(waker.clone());
        }
    }

    pub(crate) fn notify(&self) {
        let (callbacks, wakers, value) = {
            let mut inner = self.inner.borrow_mut();
            inner.subscribers.retain(|w| w.strong_count() > 0);
            let callbacks: Vec<CallbackRc<T>> = inner
                .subscribers
                .iter()
                .filter_map(Weak::upgrade)
                .collect();
            let wakers = std::mem::take(&mut inner.wakers);
            (callbacks, wakers, inner.value.clone())
        };

        if !wakers.is_empty() {
            tracing::trace!(message = "observable.wake", waiters = wakers.len());
        }
        for waker in wakers {
            waker.wake();
        }
        for cb in &callbacks {
            cb(&value);
        }
    }
}

impl<T: Clone + PartialEq + Default + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// RAII guard for a subscriber callback.
///
/// Dropping it releases the only strong reference to the callback, so the
/// observable's weak entry fails to upgrade on the next notification.
pub struct Subscription {
    _guard: Box<dyn std::any::Any>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
