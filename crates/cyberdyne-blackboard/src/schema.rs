//! Attribute declarations and the schema they freeze into.
//!
//! A [`SchemaBuilder`] collects source and derived declarations in order.
//! [`SchemaBuilder::build`] resolves name references, validates the
//! dependency relation and computes every source's dependent list once. The
//! resulting [`Schema`] is immutable, `Send + Sync`, and shared by every board
//! created from it.
//!
//! # Example
//!
//! ```
//! use cyberdyne_blackboard::{DynBoard, SchemaBuilder};
//!
//! let mut s = SchemaBuilder::new("Example");
//! let a = s.source("a", 1)?;
//! let b = s.source("b", 2)?;
//! let c = s.derive2("c", &a, &b, |a, b| a + b)?;
//! let d = s.derive1("d", &c, |c| 2 * c)?;
//! let schema = s.build()?;
//!
//! let board = DynBoard::new(schema);
//! board.set(&a, 2)?;
//! assert_eq!(board.value(&c)?, 4);
//! assert_eq!(board.value(&d)?, 8);
//! # Ok::<(), cyberdyne_blackboard::BlackboardError>(())
//! ```

use std::sync::Arc;

use ahash::AHashMap;

use crate::attr::{Attr, AttrId, AttrKind, AttrRef, SchemaId, TypeInfo};
use crate::error::{BlackboardError, ComputeError, DefinitionError};
use crate::graph::{CycleFound, DependencyGraph};
use crate::inputs::Inputs;
use crate::slot::{Erased, SlotOps, Value};

pub(crate) type ComputeFn = Box<dyn Fn(&Inputs<'_>) -> Result<Erased, ComputeError> + Send + Sync>;
type InitFn = Box<dyn Fn() -> Erased + Send + Sync>;

pub(crate) enum Rule {
    Source { initial: InitFn },
    Derived { compute: ComputeFn },
}

pub(crate) struct Declaration {
    pub name: String,
    pub ty: TypeInfo,
    pub ops: SlotOps,
    pub rule: Rule,
}

impl Declaration {
    fn kind(&self) -> AttrKind {
        match self.rule {
            Rule::Source { .. } => AttrKind::Source,
            Rule::Derived { .. } => AttrKind::Derived,
        }
    }
}

/// Collects declarations for one container type.
pub struct SchemaBuilder {
    id: SchemaId,
    name: String,
    decls: Vec<Declaration>,
    deps: Vec<Vec<AttrRef>>,
    index: AHashMap<String, AttrId>,
}

impl SchemaBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: SchemaId::next(),
            name: name.into(),
            decls: Vec::new(),
            deps: Vec::new(),
            index: AHashMap::new(),
        }
    }

    /// Identity shared by the built schema and every key handed out here.
    #[must_use]
    pub fn id(&self) -> SchemaId {
        self.id
    }

    /// Declare a directly assignable attribute.
    pub fn source<T>(&mut self, name: impl Into<String>, initial: T) -> Result<Attr<T>, DefinitionError>
    where
        T: Value + Send + Sync,
    {
        let initial: InitFn = Box::new(move || Box::new(initial.clone()) as Erased);
        self.push::<T>(name.into(), Rule::Source { initial }, Vec::new())
    }

    /// Declare a derived attribute over `deps`.
    ///
    /// `deps` may mix keys of attributes declared earlier with names of
    /// attributes declared anywhere in this builder. The compute function
    /// sees the upstream values in the order given here.
    pub fn derive<T, D, F>(
        &mut self,
        name: impl Into<String>,
        deps: D,
        compute: F,
    ) -> Result<Attr<T>, DefinitionError>
    where
        T: Value,
        D: IntoIterator,
        D::Item: Into<AttrRef>,
        F: Fn(&Inputs<'_>) -> Result<T, ComputeError> + Send + Sync + 'static,
    {
        let deps = deps.into_iter().map(Into::into).collect();
        let compute: ComputeFn =
            Box::new(move |inputs| compute(inputs).map(|value| Box::new(value) as Erased));
        self.push::<T>(name.into(), Rule::Derived { compute }, deps)
    }

    /// Declare a derived attribute over one upstream attribute.
    pub fn derive1<A, T, F>(
        &mut self,
        name: impl Into<String>,
        a: &Attr<A>,
        f: F,
    ) -> Result<Attr<T>, DefinitionError>
    where
        A: Value,
        T: Value,
        F: Fn(&A) -> T + Send + Sync + 'static,
    {
        self.derive(name, [AttrRef::from(a)], move |inputs| {
            Ok(f(inputs.at::<A>(0)?))
        })
    }

    /// Declare a derived attribute over two upstream attributes.
    pub fn derive2<A, B, T, F>(
        &mut self,
        name: impl Into<String>,
        a: &Attr<A>,
        b: &Attr<B>,
        f: F,
    ) -> Result<Attr<T>, DefinitionError>
    where
        A: Value,
        B: Value,
        T: Value,
        F: Fn(&A, &B) -> T + Send + Sync + 'static,
    {
        self.derive(name, [AttrRef::from(a), AttrRef::from(b)], move |inputs| {
            Ok(f(inputs.at::<A>(0)?, inputs.at::<B>(1)?))
        })
    }

    /// Declare a derived attribute over three upstream attributes.
    pub fn derive3<A, B, C, T, F>(
        &mut self,
        name: impl Into<String>,
        a: &Attr<A>,
        b: &Attr<B>,
        c: &Attr<C>,
        f: F,
    ) -> Result<Attr<T>, DefinitionError>
    where
        A: Value,
        B: Value,
        C: Value,
        T: Value,
        F: Fn(&A, &B, &C) -> T + Send + Sync + 'static,
    {
        self.derive(
            name,
            [AttrRef::from(a), AttrRef::from(b), AttrRef::from(c)],
            move |inputs| {
                Ok(f(
                    inputs.at::<A>(0)?,
                    inputs.at::<B>(1)?,
                    inputs.at::<C>(2)?,
                ))
            },
        )
    }

    fn push<T: Value>(
        &mut self,
        name: String,
        rule: Rule,
        deps: Vec<AttrRef>,
    ) -> Result<Attr<T>, DefinitionError> {
        if self.index.contains_key(&name) {
            return Err(DefinitionError::DuplicateName { name });
        }
        let id = AttrId::from_index(self.decls.len());
        self.index.insert(name.clone(), id);
        self.decls.push(Declaration {
            name,
            ty: TypeInfo::of::<T>(),
            ops: SlotOps::of::<T>(),
            rule,
        });
        self.deps.push(deps);
        Ok(Attr::new(self.id, id))
    }

    /// Freeze the declarations.
    ///
    /// Fails if a dependency names an undeclared attribute, uses a key from
    /// another builder, or closes a cycle.
    pub fn build(self) -> Result<Arc<Schema>, DefinitionError> {
        let name = self.name.clone();
        self.freeze().map(Arc::new).inspect_err(|err| {
            tracing::warn!(
                message = "blackboard.schema.rejected",
                schema = %name,
                error = %err
            );
        })
    }

    fn freeze(self) -> Result<Schema, DefinitionError> {
        let mut upstream = Vec::with_capacity(self.decls.len());
        for (decl, refs) in self.decls.iter().zip(&self.deps) {
            let mut ids = Vec::with_capacity(refs.len());
            for r in refs {
                let id = match r {
                    AttrRef::Key { schema, id } if *schema == self.id => *id,
                    AttrRef::Key { .. } => {
                        return Err(DefinitionError::ForeignDependency {
                            field: decl.name.clone(),
                        });
                    }
                    AttrRef::Name(dep) => {
                        *self
                            .index
                            .get(dep)
                            .ok_or_else(|| DefinitionError::UnknownDependency {
                                field: decl.name.clone(),
                                dependency: dep.clone(),
                            })?
                    }
                };
                ids.push(id);
            }
            upstream.push(ids);
        }

        let is_source: Vec<bool> = self
            .decls
            .iter()
            .map(|d| d.kind() == AttrKind::Source)
            .collect();
        let graph = DependencyGraph::build(upstream, &is_source).map_err(|CycleFound(path)| {
            DefinitionError::Cycle {
                path: path
                    .iter()
                    .map(|id| self.decls[id.index()].name.clone())
                    .collect(),
            }
        })?;

        let sources = is_source.iter().filter(|s| **s).count();
        tracing::debug!(
            message = "blackboard.schema.built",
            schema = %self.name,
            sources,
            derived = self.decls.len() - sources
        );

        Ok(Schema {
            id: self.id,
            name: self.name,
            decls: self.decls,
            index: self.index,
            graph,
        })
    }
}

impl std::fmt::Debug for SchemaBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaBuilder")
            .field("name", &self.name)
            .field("declared", &self.decls.len())
            .finish_non_exhaustive()
    }
}

/// Frozen declarations of one container type.
pub struct Schema {
    id: SchemaId,
    name: String,
    decls: Vec<Declaration>,
    index: AHashMap<String, AttrId>,
    graph: DependencyGraph,
}

impl Schema {
    #[must_use]
    pub fn id(&self) -> SchemaId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of declared attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.decls.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    #[must_use]
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<AttrId> {
        self.index.get(name).copied()
    }

    #[must_use]
    pub fn attr_name(&self, id: AttrId) -> Option<&str> {
        self.decls.get(id.index()).map(|d| d.name.as_str())
    }

    #[must_use]
    pub fn kind(&self, id: AttrId) -> Option<AttrKind> {
        self.decls.get(id.index()).map(Declaration::kind)
    }

    #[must_use]
    pub fn value_type(&self, id: AttrId) -> Option<TypeInfo> {
        self.decls.get(id.index()).map(|d| d.ty)
    }

    /// Attribute names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.decls.iter().map(|d| d.name.as_str())
    }

    /// Derived attributes recomputed when source `id` is written.
    #[must_use]
    pub fn dependents(&self, id: AttrId) -> &[AttrId] {
        self.graph.dependents(id)
    }

    /// Whether `attr` was handed out by this schema's builder.
    #[must_use]
    pub fn owns<T>(&self, attr: &Attr<T>) -> bool {
        attr.schema() == self.id && attr.id().index() < self.decls.len()
    }

    /// Typed key for the attribute named `name`.
    pub fn attr<T: 'static>(&self, name: &str) -> Result<Attr<T>, BlackboardError> {
        let id = self
            .lookup(name)
            .ok_or_else(|| BlackboardError::UnknownField {
                name: name.to_owned(),
            })?;
        let ty = self.decls[id.index()].ty;
        if !ty.is::<T>() {
            return Err(BlackboardError::TypeMismatch {
                name: name.to_owned(),
                expected: std::any::type_name::<T>(),
                found: ty.name(),
            });
        }
        Ok(Attr::new(self.id, id))
    }

    pub(crate) fn decl(&self, id: AttrId) -> &Declaration {
        &self.decls[id.index()]
    }
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let attrs: Vec<(&str, AttrKind)> = self
            .decls
            .iter()
            .map(|d| (d.name.as_str(), d.kind()))
            .collect();
        f.debug_struct("Schema")
            .field("id", &self.id.raw())
            .field("name", &self.name)
            .field("attrs", &attrs)
            .finish()
    }
}
