#![forbid(unsafe_code)]

//! Read-only handles to an [`Observable`].
//!
//! An owner that must control every write (such as a blackboard, which
//! recomputes dependents after each one) hands out [`ObservableView`]s
//! instead of the observable itself. A view reads, subscribes, and waits; it
//! cannot set.
//!
//! ```compile_fail
//! use cyberdyne_reactive::Observable;
//!
//! let view = Observable::new(1).view();
//! view.set(2);
//! ```

use crate::observable::{Observable, Subscription};
use crate::wait::{WaitTransition, WaitValue};

/// Read-only handle sharing the identity of an [`Observable`].
pub struct ObservableView<T> {
    source: Observable<T>,
}

impl<T> Clone for ObservableView<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ObservableView<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ObservableView").field(&self.source).finish()
    }
}

impl<T> ObservableView<T> {
    /// Whether two views read the same underlying cell.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.source.ptr_eq(&other.source)
    }

    /// Whether this view reads `observable`.
    #[must_use]
    pub fn is_view_of(&self, observable: &Observable<T>) -> bool {
        self.source.ptr_eq(observable)
    }
}

impl<T: Clone + PartialEq + 'static> ObservableView<T> {
    #[must_use]
    pub fn get(&self) -> T {
        self.source.get()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.source.with(f)
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.source.version()
    }

    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.source.subscribe(callback)
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.source.subscriber_count()
    }

    #[must_use]
    pub fn waiter_count(&self) -> usize {
        self.source.waiter_count()
    }

    pub fn wait_value<P>(&self, predicate: P) -> WaitValue<T, P>
    where
        P: FnMut(&T) -> bool + Unpin,
    {
        self.source.wait_value(predicate)
    }

    pub fn wait_transition(&self) -> WaitTransition<T, fn(&T) -> bool> {
        self.source.wait_transition()
    }

    pub fn wait_transition_matching<P>(&self, predicate: P) -> WaitTransition<T, P>
    where
        P: FnMut(&T) -> bool + Unpin,
    {
        self.source.wait_transition_matching(predicate)
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// A read-only handle to this observable.
    #[must_use]
    pub fn view(&self) -> ObservableView<T> {
        ObservableView {
            source: self.clone(),
        }
    }
}

impl<T: Clone + PartialEq + 'static> From<Observable<T>> for ObservableView<T> {
    fn from(source: Observable<T>) -> Self {
        Self { source }
    }
}
