#![forbid(unsafe_code)]

//! Reactive attribute graphs ("blackboards").
//!
//! A container type declares *source* attributes, which are assigned
//! directly, and *derived* attributes, which are pure functions of other
//! attributes. Each board instance stores one [`Observable`] per attribute
//! and hands out read-only [`ObservableView`]s of it. Writing a source
//! recomputes every dependent derived attribute, once each, in dependency
//! order, and only then notifies observers.
//!
//! - [`SchemaBuilder`] / [`Schema`]: declarations, validation, and the
//!   precomputed dependent lists.
//! - [`DependencyGraph`]: topological order and transitive dependents.
//! - [`DynBoard`] / [`Board`]: per-instance storage, reads, and writes.
//! - [`BlackboardType`] / [`BoardType`]: one shared schema per container type.
//!
//! # Invariants
//!
//! 1. The dependency relation is acyclic; cycles are rejected when the schema
//!    is built.
//! 2. Derived attributes cannot be written through a board.
//! 3. A board hands out the same wrapper for an attribute for its lifetime.
//! 4. After a successful write, every derived attribute that exists on the
//!    board equals its function applied to the current source values.
//! 5. Subscribers and waiters are notified only after a write's whole pass
//!    has run, so they never observe a partially updated board.

pub mod attr;
pub mod board;
pub mod config;
pub mod error;
pub mod graph;
pub mod inputs;
mod propagate;
pub mod registry;
pub mod schema;
pub mod slot;

pub use attr::{Attr, AttrId, AttrKind, AttrRef, SchemaId, TypeInfo};
pub use board::{Board, DynBoard};
pub use config::{BoardConfig, Materialize, Propagation};
pub use error::{BlackboardError, ComputeError, DefinitionError, InputError, Result};
pub use graph::DependencyGraph;
pub use inputs::Inputs;
pub use registry::{BlackboardType, BoardType, registered_types};
pub use schema::{Schema, SchemaBuilder};
pub use slot::Value;

pub use cyberdyne_reactive::{Observable, ObservableView, Subscription, Transition};
