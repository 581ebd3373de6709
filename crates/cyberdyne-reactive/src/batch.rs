#![forbid(unsafe_code)]

//! Deferred change notification.
//!
//! A [`NotifyBatch`] collects the notifications of several
//! [`Observable::set_batched`] calls so that subscribers and waiters run only
//! after every value in the batch has been updated. Observers of one cell can
//! then read any other cell of the batch and see its final value.

use crate::observable::Observable;

/// Pending notifications, run in the order the changes were made.
///
/// Call [`flush`](Self::flush) to run them. A batch dropped without flushing
/// runs them on drop, except while the thread is panicking.
#[must_use = "notifications run when the batch is flushed or dropped"]
#[derive(Default)]
pub struct NotifyBatch {
    pending: Vec<Box<dyn FnOnce()>>,
}

impl NotifyBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of changes waiting to be announced.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Run every pending notification.
    pub fn flush(mut self) {
        self.run();
    }

    pub(crate) fn defer(&mut self, notify: impl FnOnce() + 'static) {
        self.pending.push(Box::new(notify));
    }

    fn run(&mut self) {
        for notify in std::mem::take(&mut self.pending) {
            notify();
        }
    }
}

impl Drop for NotifyBatch {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            self.run();
        }
    }
}

impl std::fmt::Debug for NotifyBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyBatch")
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// Set a new value now and announce the change when `batch` flushes.
    ///
    /// Readers see the new value immediately; subscribers and waiters are
    /// not called until then. Returns `true` if the value changed.
    pub fn set_batched(&self, value: T, batch: &mut NotifyBatch) -> bool {
        if !self.replace(value) {
            return false;
        }
        let this = self.clone();
        batch.defer(move || this.notify());
        true
    }
}
