#![forbid(unsafe_code)]

//! Cyberdyne public facade crate.
//!
//! Re-exports the blackboard core and the observable wrapper it stores.
//!
//! ```
//! use cyberdyne::prelude::*;
//!
//! struct Example;
//!
//! struct Keys {
//!     a: Attr<i32>,
//!     d: Attr<i32>,
//! }
//!
//! impl BlackboardType for Example {
//!     type Keys = Keys;
//!
//!     fn declare(s: &mut SchemaBuilder) -> Result<Keys, DefinitionError> {
//!         let a = s.source("a", 1)?;
//!         let b = s.source("b", 2)?;
//!         let c = s.derive2("c", &a, &b, |a, b| a + b)?;
//!         let d = s.derive1("d", &c, |c| 2 * c)?;
//!         Ok(Keys { a, d })
//!     }
//! }
//!
//! let board = Board::<Example>::new()?;
//! let k = board.keys();
//! board.set(&k.a, 2)?;
//! assert_eq!(board.value(&k.d)?, 8);
//! # Ok::<(), BlackboardError>(())
//! ```

pub use cyberdyne_blackboard as blackboard;
pub use cyberdyne_reactive as reactive;

pub mod prelude {
    pub use cyberdyne_blackboard::{
        Attr, AttrRef, BlackboardError, BlackboardType, Board, BoardConfig, DefinitionError,
        DynBoard, Inputs, Materialize, Propagation, SchemaBuilder,
    };
    pub use cyberdyne_reactive::{NotifyBatch, Observable, ObservableView, Subscription, Transition};

    pub use crate::{blackboard, reactive};
}
