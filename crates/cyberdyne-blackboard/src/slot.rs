//! Type-erased access to per-instance observable slots.
//!
//! Instance storage holds attributes of different value types side by side,
//! so each slot is a `Box<dyn Any>` containing an `Observable<T>`. The
//! declaration records a [`SlotOps`] table of monomorphized functions that
//! know `T` and do the downcasts.

use std::any::Any;

use cyberdyne_reactive::{NotifyBatch, Observable};

/// Bound for attribute values.
pub trait Value: Clone + PartialEq + 'static {}

impl<T: Clone + PartialEq + 'static> Value for T {}

/// A boxed attribute value.
pub(crate) type Erased = Box<dyn Any>;

/// A boxed `Observable<T>`.
pub(crate) type Slot = Box<dyn Any>;

#[derive(Clone, Copy)]
pub(crate) struct SlotOps {
    /// Wrap a value into a fresh observable slot.
    pub wrap: fn(Erased) -> Option<Slot>,
    /// Clone the current value out of a slot.
    pub read: fn(&Slot) -> Option<Erased>,
    /// Set the slot's value, announcing the change when `batch` flushes.
    /// `Some(changed)` on success.
    pub assign: fn(&Slot, Erased, &mut NotifyBatch) -> Option<bool>,
    /// Whether the slot currently holds `value`.
    pub holds: fn(&Slot, &dyn Any) -> bool,
    /// A second handle to the same observable.
    pub share: fn(&Slot) -> Option<Slot>,
}

impl SlotOps {
    pub fn of<T: Value>() -> Self {
        Self {
            wrap: wrap::<T>,
            read: read::<T>,
            assign: assign::<T>,
            holds: holds::<T>,
            share: share::<T>,
        }
    }
}

fn wrap<T: Value>(value: Erased) -> Option<Slot> {
    let value = value.downcast::<T>().ok()?;
    Some(Box::new(Observable::new(*value)))
}

fn read<T: Value>(slot: &Slot) -> Option<Erased> {
    let obs = slot.downcast_ref::<Observable<T>>()?;
    Some(Box::new(obs.get()))
}

fn assign<T: Value>(slot: &Slot, value: Erased, batch: &mut NotifyBatch) -> Option<bool> {
    let obs = slot.downcast_ref::<Observable<T>>()?;
    let value = value.downcast::<T>().ok()?;
    Some(obs.set_batched(*value, batch))
}

fn holds<T: Value>(slot: &Slot, value: &dyn Any) -> bool {
    match (slot.downcast_ref::<Observable<T>>(), value.downcast_ref::<T>()) {
        (Some(obs), Some(value)) => obs.with(|current| current == value),
        _ => false,
    }
}

fn share<T: Value>(slot: &Slot) -> Option<Slot> {
    let obs = slot.downcast_ref::<Observable<T>>()?;
    Some(Box::new(obs.clone()))
}
