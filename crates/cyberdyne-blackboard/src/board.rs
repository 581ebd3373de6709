//! Instance runtime: per-board storage of observable wrappers.
//!
//! # Design
//!
//! A board owns one slot per declared attribute, indexed by [`AttrId`]. A slot
//! stays empty until the attribute is first read or written (or until board
//! creation, with [`Materialize::Eager`]). Once filled, a slot's wrapper is
//! never replaced: writes and recomputation only change the wrapped value,
//! so every read of an attribute returns a handle to the same observable.
//!
//! Storage sits behind a `RefCell` and accessors take `&self`. Callers get
//! [`ObservableView`]s, so the only way to change a value is
//! [`DynBoard::set`]. A write updates the source and every dependent first and
//! notifies subscribers and waiters afterwards, in topological order, so an
//! observer never sees a partially updated board. No storage borrow is held
//! while observers run; they may read the board or write it again.
//!
//! Materializing an attribute first materializes its missing upstream
//! attributes in topological order, so the cost of a first read is a loop,
//! not a recursion, however deep the chain.
//!
//! # Invariants
//!
//! 1. A derived slot is written only by materialization and propagation.
//! 2. After `set()` returns `Ok`, every materialized or recomputed derived
//!    value reflects the current source values.
//! 3. Reads never recompute a derived value that is already materialized.

use std::cell::RefCell;
use std::ops::Deref;
use std::sync::Arc;

use cyberdyne_reactive::{NotifyBatch, Observable, ObservableView};

use crate::attr::{Attr, AttrId, AttrKind};
use crate::config::{BoardConfig, Materialize, Propagation};
use crate::error::{BlackboardError, Result};
use crate::inputs::Inputs;
use crate::propagate::propagate;
use crate::registry::{BlackboardType, BoardType};
use crate::schema::{Rule, Schema};
use crate::slot::{Erased, Slot, Value};

/// A blackboard instance over any schema.
pub struct DynBoard {
    schema: Arc<Schema>,
    config: BoardConfig,
    slots: RefCell<Vec<Option<Slot>>>,
}

impl DynBoard {
    /// Create a lazily materialized board.
    #[must_use]
    pub fn new(schema: Arc<Schema>) -> Self {
        let slots = (0..schema.len()).map(|_| None).collect();
        Self {
            schema,
            config: BoardConfig::default(),
            slots: RefCell::new(slots),
        }
    }

    /// Create a board with explicit configuration.
    ///
    /// Fails only when eager materialization hits a compute error.
    pub fn with_config(schema: Arc<Schema>, config: BoardConfig) -> Result<Self> {
        let mut board = Self::new(schema);
        board.config = config;
        if config.materialize == Materialize::Eager {
            let schema = Arc::clone(&board.schema);
            for &id in schema.graph().order() {
                board.materialize(id)?;
            }
        }
        Ok(board)
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    #[must_use]
    pub fn config(&self) -> BoardConfig {
        self.config
    }

    /// A read-only handle to `attr` on this board.
    ///
    /// Every call returns a handle to the same wrapper. The handle cannot
    /// write; assignments go through [`set`](Self::set).
    ///
    /// ```compile_fail
    /// use cyberdyne_blackboard::{DynBoard, SchemaBuilder};
    ///
    /// let mut s = SchemaBuilder::new("Sealed");
    /// let a = s.source("a", 1).unwrap();
    /// let board = DynBoard::new(s.build().unwrap());
    /// board.get(&a).unwrap().set(2);
    /// ```
    pub fn get<T: Value>(&self, attr: &Attr<T>) -> Result<ObservableView<T>> {
        self.check(attr)?;
        self.handle(attr.id()).map(|obs| obs.view())
    }

    /// The current value of `attr`.
    pub fn value<T: Value>(&self, attr: &Attr<T>) -> Result<T> {
        self.get(attr).map(|obs| obs.get())
    }

    /// Assign source attribute `attr` and recompute its dependents.
    pub fn set<T: Value>(&self, attr: &Attr<T>, value: T) -> Result<()> {
        self.check(attr)?;
        self.write(attr.id(), Box::new(value))
    }

    /// A read-only handle to the attribute named `name`.
    pub fn get_named<T: Value>(&self, name: &str) -> Result<ObservableView<T>> {
        let attr = self.schema.attr::<T>(name)?;
        self.handle(attr.id()).map(|obs| obs.view())
    }

    /// Assign the source attribute named `name`.
    pub fn set_named<T: Value>(&self, name: &str, value: T) -> Result<()> {
        let id = self
            .schema
            .lookup(name)
            .ok_or_else(|| BlackboardError::UnknownField {
                name: name.to_owned(),
            })?;
        if self.schema.kind(id) == Some(AttrKind::Derived) {
            return Err(self.immutable(id));
        }
        let attr = self.schema.attr::<T>(name)?;
        self.write(attr.id(), Box::new(value))
    }

    /// Whether the wrapper for `id` exists yet.
    #[must_use]
    pub fn is_materialized(&self, id: AttrId) -> bool {
        self.slots
            .borrow()
            .get(id.index())
            .is_some_and(Option::is_some)
    }

    /// Number of wrappers created so far.
    #[must_use]
    pub fn materialized_count(&self) -> usize {
        self.slots.borrow().iter().filter(|s| s.is_some()).count()
    }

    /// Refresh derived attribute `id` from its upstream values.
    ///
    /// A derived attribute that was never read is materialized instead,
    /// which computes it from the same current values.
    pub(crate) fn recompute(&self, id: AttrId, batch: &mut NotifyBatch) -> Result<()> {
        if !self.is_materialized(id) {
            return self.materialize(id);
        }
        let value = self.compute(id)?;
        let slot = self.shared_slot(id)?;
        let decl = self.schema.decl(id);
        tracing::trace!(message = "blackboard.recompute", field = %decl.name);
        (decl.ops.assign)(&slot, value, batch)
            .map(|_| ())
            .ok_or_else(|| self.mismatch(id, "compute output"))
    }

    fn check<T>(&self, attr: &Attr<T>) -> Result<()> {
        if self.schema.owns(attr) {
            Ok(())
        } else {
            Err(BlackboardError::ForeignAttr {
                index: attr.id().index(),
                schema: self.schema.name().to_owned(),
            })
        }
    }

    fn write(&self, id: AttrId, value: Erased) -> Result<()> {
        let decl = self.schema.decl(id);
        if matches!(decl.rule, Rule::Derived { .. }) {
            return Err(self.immutable(id));
        }

        self.materialize(id)?;
        let slot = self.shared_slot(id)?;
        if self.config.propagation == Propagation::SkipUnchanged && (decl.ops.holds)(&slot, &*value)
        {
            tracing::trace!(message = "blackboard.write.unchanged", field = %decl.name);
            return Ok(());
        }
        let mut batch = NotifyBatch::new();
        (decl.ops.assign)(&slot, value, &mut batch)
            .ok_or_else(|| self.mismatch(id, "written value"))?;
        let outcome = propagate(self, id, &mut batch);
        batch.flush();
        outcome.map(|_| ())
    }

    /// Create the wrapper for `id` and any missing upstream wrappers.
    fn materialize(&self, id: AttrId) -> Result<()> {
        if self.is_materialized(id) {
            return Ok(());
        }
        let graph = self.schema.graph();
        let mut seen = vec![false; self.schema.len()];
        seen[id.index()] = true;
        let mut missing = vec![id];
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            for &up in graph.upstream(node) {
                if !seen[up.index()] && !self.is_materialized(up) {
                    seen[up.index()] = true;
                    missing.push(up);
                    stack.push(up);
                }
            }
        }
        missing.sort_by_key(|node| graph.rank(*node));
        for node in missing {
            self.fill(node)?;
        }
        Ok(())
    }

    /// Create the wrapper for `id`, whose upstream wrappers all exist.
    fn fill(&self, id: AttrId) -> Result<()> {
        let decl = self.schema.decl(id);
        let value = match &decl.rule {
            Rule::Source { initial } => initial(),
            Rule::Derived { .. } => self.compute(id)?,
        };
        let slot = (decl.ops.wrap)(value).ok_or_else(|| self.mismatch(id, "initial value"))?;
        tracing::trace!(message = "blackboard.materialize", field = %decl.name);
        self.slots.borrow_mut()[id.index()] = Some(slot);
        Ok(())
    }

    /// Evaluate derived attribute `id` over current upstream values.
    fn compute(&self, id: AttrId) -> Result<Erased> {
        let decl = self.schema.decl(id);
        let Rule::Derived { compute } = &decl.rule else {
            return self.current(id);
        };
        let deps = self.schema.graph().upstream(id);
        let values = deps
            .iter()
            .map(|&dep| self.current(dep))
            .collect::<Result<Vec<_>>>()?;
        let inputs = Inputs::new(&self.schema, id, deps, &values);
        compute(&inputs).map_err(|source| BlackboardError::Compute {
            field: decl.name.clone(),
            source,
        })
    }

    fn current(&self, id: AttrId) -> Result<Erased> {
        self.materialize(id)?;
        let read = self.schema.decl(id).ops.read;
        let slots = self.slots.borrow();
        slots[id.index()]
            .as_ref()
            .and_then(read)
            .ok_or_else(|| self.mismatch(id, "stored value"))
    }

    fn shared_slot(&self, id: AttrId) -> Result<Slot> {
        self.materialize(id)?;
        let share = self.schema.decl(id).ops.share;
        let slots = self.slots.borrow();
        slots[id.index()]
            .as_ref()
            .and_then(share)
            .ok_or_else(|| self.mismatch(id, "stored value"))
    }

    fn handle<T: Value>(&self, id: AttrId) -> Result<Observable<T>> {
        self.materialize(id)?;
        let slots = self.slots.borrow();
        slots[id.index()]
            .as_ref()
            .and_then(|slot| slot.downcast_ref::<Observable<T>>())
            .cloned()
            .ok_or_else(|| self.mismatch(id, std::any::type_name::<T>()))
    }

    fn immutable(&self, id: AttrId) -> BlackboardError {
        let name = self.schema.decl(id).name.clone();
        tracing::debug!(message = "blackboard.write.rejected", field = %name);
        BlackboardError::ImmutableField { name }
    }

    fn mismatch(&self, id: AttrId, expected: &'static str) -> BlackboardError {
        let decl = self.schema.decl(id);
        BlackboardError::TypeMismatch {
            name: decl.name.clone(),
            expected,
            found: decl.ty.name(),
        }
    }
}

impl std::fmt::Debug for DynBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynBoard")
            .field("schema", &self.schema.name())
            .field("config", &self.config)
            .field("materialized", &self.materialized_count())
            .finish()
    }
}

/// A blackboard instance of container type `B`.
///
/// Derefs to [`DynBoard`] for reads and writes; [`keys`](Self::keys) hands
/// out the typed keys `B` declared.
pub struct Board<B: BlackboardType> {
    ty: Arc<BoardType<B>>,
    inner: DynBoard,
}

impl<B: BlackboardType> Board<B> {
    /// Create a board, defining `B`'s schema on first use.
    pub fn new() -> Result<Self> {
        Self::with_config(BoardConfig::default())
    }

    pub fn with_config(config: BoardConfig) -> Result<Self> {
        let ty = BoardType::<B>::shared()?;
        let inner = DynBoard::with_config(Arc::clone(ty.schema()), config)?;
        Ok(Self { ty, inner })
    }

    #[must_use]
    pub fn keys(&self) -> &B::Keys {
        self.ty.keys()
    }
}

impl<B: BlackboardType> Deref for Board<B> {
    type Target = DynBoard;

    fn deref(&self) -> &DynBoard {
        &self.inner
    }
}

impl<B: BlackboardType> std::fmt::Debug for Board<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Board").field(&self.inner).finish()
    }
}
