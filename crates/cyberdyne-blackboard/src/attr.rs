//! Attribute identifiers and typed keys.
//!
//! An [`AttrId`] is the dense declaration index of an attribute inside one
//! schema. An [`Attr<T>`] adds the owning schema and the value type, so a
//! board can hand back an `ObservableView<T>` without the caller naming `T`
//! again. Keys are `Copy` and carry no per-instance data.

use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SCHEMA_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaId(u64);

impl SchemaId {
    pub(crate) fn next() -> Self {
        Self(NEXT_SCHEMA_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Dense index of an attribute in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttrId(u32);

impl AttrId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(u32::try_from(index).unwrap_or(u32::MAX))
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for AttrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Whether an attribute is directly assignable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    Source,
    Derived,
}

/// Runtime description of a value type, for error messages and checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
}

impl TypeInfo {
    #[must_use]
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn is<T: 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

/// Typed key for one attribute of one schema.
pub struct Attr<T> {
    schema: SchemaId,
    id: AttrId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Attr<T> {
    pub(crate) fn new(schema: SchemaId, id: AttrId) -> Self {
        Self {
            schema,
            id,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn id(&self) -> AttrId {
        self.id
    }

    #[must_use]
    pub fn schema(&self) -> SchemaId {
        self.schema
    }
}

impl<T> Clone for Attr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Attr<T> {}

impl<T> PartialEq for Attr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.id == other.id
    }
}

impl<T> Eq for Attr<T> {}

impl<T> fmt::Debug for Attr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attr")
            .field("schema", &self.schema.0)
            .field("id", &self.id.0)
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

/// Reference to an upstream attribute in a derived declaration.
///
/// Keys point at attributes already declared. Names are resolved when the
/// schema is built and may point at attributes declared later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrRef {
    Key { schema: SchemaId, id: AttrId },
    Name(String),
}

impl<T> From<Attr<T>> for AttrRef {
    fn from(attr: Attr<T>) -> Self {
        Self::Key {
            schema: attr.schema,
            id: attr.id,
        }
    }
}

impl<T> From<&Attr<T>> for AttrRef {
    fn from(attr: &Attr<T>) -> Self {
        (*attr).into()
    }
}

impl From<&str> for AttrRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl From<String> for AttrRef {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}
