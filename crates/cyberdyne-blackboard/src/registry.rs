//! Process-wide registry of container-type schemas.
//!
//! A container type implements [`BlackboardType`]; its schema is declared
//! the first time a board of that type is created and shared by every later
//! board. The registry is read-optimized: lookups load an `ArcSwap` snapshot
//! without locking, and the rare insert publishes a new map via RCU.
//!
//! Two threads creating the first board of a type at the same time may both
//! run `declare`; exactly one result is published and both callers receive
//! it.

use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::sync::{Arc, LazyLock};

use ahash::AHashMap;
use arc_swap::ArcSwap;

use crate::error::DefinitionError;
use crate::schema::{Schema, SchemaBuilder};

/// A container type with a blackboard schema.
///
/// ```
/// use cyberdyne_blackboard::{Attr, BlackboardType, Board, DefinitionError, SchemaBuilder};
///
/// struct Thermostat;
///
/// struct ThermostatKeys {
///     target: Attr<f64>,
///     current: Attr<f64>,
///     heating: Attr<bool>,
/// }
///
/// impl BlackboardType for Thermostat {
///     type Keys = ThermostatKeys;
///
///     fn declare(s: &mut SchemaBuilder) -> Result<ThermostatKeys, DefinitionError> {
///         let target = s.source("target", 20.0)?;
///         let current = s.source("current", 18.0)?;
///         let heating = s.derive2("heating", &target, &current, |t, c| c < t)?;
///         Ok(ThermostatKeys { target, current, heating })
///     }
/// }
///
/// let board = Board::<Thermostat>::new()?;
/// let keys = board.keys();
/// assert!(board.value(&keys.heating)?);
/// board.set(&keys.current, 21.0)?;
/// assert!(!board.value(&keys.heating)?);
/// # Ok::<(), cyberdyne_blackboard::BlackboardError>(())
/// ```
pub trait BlackboardType: 'static {
    /// Typed keys handed out by [`declare`](Self::declare).
    type Keys: Send + Sync + 'static;

    /// Declare the type's attributes. Runs once per process.
    fn declare(schema: &mut SchemaBuilder) -> Result<Self::Keys, DefinitionError>;

    /// Schema name used in logs and errors.
    fn name() -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Frozen schema and keys of container type `B`.
pub struct BoardType<B: BlackboardType> {
    schema: Arc<Schema>,
    keys: B::Keys,
    _marker: PhantomData<fn() -> B>,
}

type Registry = AHashMap<TypeId, Arc<dyn Any + Send + Sync>>;

static REGISTRY: LazyLock<ArcSwap<Registry>> =
    LazyLock::new(|| ArcSwap::from_pointee(Registry::default()));

impl<B: BlackboardType> BoardType<B> {
    /// The registered schema of `B`, declaring it on first use.
    ///
    /// A failed declaration is not cached; the error is returned again on
    /// every call.
    pub fn shared() -> Result<Arc<Self>, DefinitionError> {
        let key = TypeId::of::<B>();
        if let Some(found) = REGISTRY.load().get(&key).cloned()
            && let Ok(found) = found.downcast::<Self>()
        {
            return Ok(found);
        }

        let built = Arc::new(Self::define()?);
        let erased: Arc<dyn Any + Send + Sync> = Arc::clone(&built) as _;
        let mut winner = Arc::clone(&erased);
        REGISTRY.rcu(|current| {
            let mut next = Registry::clone(current);
            winner = Arc::clone(next.entry(key).or_insert_with(|| Arc::clone(&erased)));
            next
        });
        Ok(winner.downcast::<Self>().unwrap_or(built))
    }

    fn define() -> Result<Self, DefinitionError> {
        let mut builder = SchemaBuilder::new(B::name());
        let keys = B::declare(&mut builder)?;
        let schema = builder.build()?;
        Ok(Self {
            schema,
            keys,
            _marker: PhantomData,
        })
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    #[must_use]
    pub fn keys(&self) -> &B::Keys {
        &self.keys
    }
}

impl<B: BlackboardType> std::fmt::Debug for BoardType<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardType")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// Number of container types with a published schema.
#[must_use]
pub fn registered_types() -> usize {
    REGISTRY.load().len()
}
