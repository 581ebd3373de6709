#![forbid(unsafe_code)]

//! Observable values for Cyberdyne blackboards.
//!
//! - [`Observable`]: a shared, version-tracked value wrapper with change
//!   notification via subscriber callbacks.
//! - [`Subscription`]: RAII guard that unsubscribes on drop.
//! - [`ObservableView`]: read-only handle for code that must not write.
//! - [`NotifyBatch`]: defers notifications until a group of writes is done.
//! - [`WaitValue`] / [`WaitTransition`]: futures that suspend until the
//!   value satisfies a predicate or changes.
//!
//! # Architecture
//!
//! `Observable<T>` uses `Rc<RefCell<..>>` for single-threaded shared
//! ownership. A handle's identity is the cell it points at; blackboards rely
//! on that identity staying fixed while the contained value changes.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per mutation that changes the value.
//! 2. Subscribers are notified in registration order.
//! 3. Setting a value equal to the current value is a no-op (no version bump,
//!    no notifications, no wakeups).
//! 4. A pending wait future is woken by the first change after it parked.
//! 5. Changes made through a [`NotifyBatch`] are visible to readers at once
//!    but announced only when the batch flushes, in the order they were made.

pub mod batch;
pub mod observable;
pub mod view;
pub mod wait;

pub use batch::NotifyBatch;
pub use observable::{Observable, Subscription};
pub use view::ObservableView;
pub use wait::{Transition, WaitTransition, WaitValue};
