#![forbid(unsafe_code)]

//! Futures that suspend until an [`Observable`] reaches a value or changes.
//!
//! Both futures are runtime-agnostic: they park their task's `Waker` on the
//! observable and are woken by the next value-changing `set()`/`update()`.
//! They hold an `Rc` handle and are therefore `!Send`; drive them on a
//! local executor.
//!
//! Changes are coalesced. A waiter that is not polled between two changes
//! observes only the latest value, with `previous` being the value the
//! latest change replaced.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::observable::Observable;

/// A change observed by [`WaitTransition`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition<T> {
    /// Value after the change.
    pub value: T,
    /// Value immediately before the change.
    pub previous: T,
}

/// Future returned by [`Observable::wait_value`].
#[must_use = "futures do nothing unless polled"]
pub struct WaitValue<T, P> {
    source: Observable<T>,
    predicate: P,
}

impl<T, P> Future for WaitValue<T, P>
where
    T: Clone + PartialEq + 'static,
    P: FnMut(&T) -> bool + Unpin,
{
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let this = self.get_mut();
        let predicate = &mut this.predicate;
        if let Some(value) = this
            .source
            .with(|v| predicate(v).then(|| v.clone()))
        {
            return Poll::Ready(value);
        }
        this.source.park(cx.waker());
        Poll::Pending
    }
}

/// Future returned by [`Observable::wait_transition`] and
/// [`Observable::wait_transition_matching`].
#[must_use = "futures do nothing unless polled"]
pub struct WaitTransition<T, P> {
    source: Observable<T>,
    predicate: P,
    /// Version at which this waiter last looked at the value.
    seen: u64,
}

impl<T, P> Future for WaitTransition<T, P>
where
    T: Clone + PartialEq + 'static,
    P: FnMut(&T) -> bool + Unpin,
{
    type Output = Transition<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Transition<T>> {
        let this = self.get_mut();
        let (value, previous, version) = this.source.snapshot();
        if version != this.seen {
            this.seen = version;
            if (this.predicate)(&value) {
                return Poll::Ready(Transition { value, previous });
            }
        }
        this.source.park(cx.waker());
        Poll::Pending
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// Resolve with the first value satisfying `predicate`.
    ///
    /// Resolves on the first poll if the current value already matches.
    pub fn wait_value<P>(&self, predicate: P) -> WaitValue<T, P>
    where
        P: FnMut(&T) -> bool + Unpin,
    {
        WaitValue {
            source: self.clone(),
            predicate,
        }
    }

    /// Resolve on the next change of the value, whatever it is.
    pub fn wait_transition(&self) -> WaitTransition<T, fn(&T) -> bool> {
        let any: fn(&T) -> bool = |_| true;
        self.wait_transition_matching(any)
    }

    /// Resolve on the first change whose new value satisfies `predicate`.
    ///
    /// Changes that happened before this call are not reported.
    pub fn wait_transition_matching<P>(&self, predicate: P) -> WaitTransition<T, P>
    where
        P: FnMut(&T) -> bool + Unpin,
    {
        WaitTransition {
            source: self.clone(),
            predicate,
            seen: self.version(),
        }
    }
}
