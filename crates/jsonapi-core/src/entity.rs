//! # Identifiable Resources
//!
//! The `Identifiable` trait is the contract every model exposed through the API must
//! implement. It ties a plain Rust struct to an identifier type so the resource graph,
//! the query pipeline and the hook executor can work with it generically.
//!
//! # Shared Handles
//!
//! Loaded entities form object graphs that may be cyclic (an article points at its
//! author, the author points back at their articles). Hooks also rewrite relationships
//! on entities they did not receive directly. Both requirements mean entities are held
//! behind a shared, interior-mutable handle: [`Shared<T>`] (`Arc<RwLock<T>>`).
//!
//! The framework itself never knows concrete model types while traversing. It moves
//! type-erased [`EntityRef`] values around and only the accessor closures bound in the
//! resource graph downcast them back to `Shared<T>`.

use parking_lot::RwLock;
use serde::Serialize;
use std::any::{Any, TypeId};
use std::fmt::{self, Debug, Display};
use std::hash::Hash;
use std::str::FromStr;
use std::sync::Arc;

/// Bounds required from an identifier type (int, string or a composite key).
pub trait ResourceId:
    Clone + Eq + Hash + Debug + Display + FromStr + Default + Serialize + Send + Sync + 'static
{
}

impl<T> ResourceId for T where
    T: Clone + Eq + Hash + Debug + Display + FromStr + Default + Serialize + Send + Sync + 'static
{
}

/// Trait that any model must implement to be registered in the resource graph.
///
/// The identifier's `Default` value marks a transient (not yet stored) entity. Stores
/// assign a real identifier on create.
pub trait Identifiable: Clone + Debug + Send + Sync + 'static {
    /// The identifier type (e.g. `i64`, `String`, or a composite key).
    type Id: ResourceId;

    /// Returns the current identifier.
    fn id(&self) -> Self::Id;

    /// Replaces the identifier.
    fn set_id(&mut self, id: Self::Id);

    /// The identifier as it appears on the wire; empty for transient entities.
    fn string_id(&self) -> String {
        let id = self.id();
        if id == Self::Id::default() {
            String::new()
        } else {
            id.to_string()
        }
    }
}

/// Shared, mutable handle to a loaded entity.
pub type Shared<T> = Arc<RwLock<T>>;

/// Wraps a model value in a [`Shared`] handle.
pub fn shared<T: Identifiable>(value: T) -> Shared<T> {
    Arc::new(RwLock::new(value))
}

/// Object-safe view over a `RwLock<T: Identifiable>`.
pub trait AnyResource: Send + Sync {
    /// Type token of the underlying model.
    fn model_type(&self) -> TypeId;

    /// Rust type name of the underlying model, without the module path.
    fn model_name(&self) -> &'static str;

    /// The identifier as a string; empty for transient entities.
    fn string_id(&self) -> String;

    /// Allows downcasting to `RwLock<T>`.
    fn as_any(&self) -> &dyn Any;

    /// Allows downcasting the handle itself to `Arc<RwLock<T>>`.
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    /// Creates a detached copy holding a clone of the current value.
    fn detached_copy(&self) -> EntityRef;

    /// Writes the `Debug` representation of the underlying value.
    fn fmt_entity(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

impl<T: Identifiable> AnyResource for RwLock<T> {
    fn model_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn model_name(&self) -> &'static str {
        short_type_name::<T>()
    }

    fn string_id(&self) -> String {
        self.read().string_id()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn detached_copy(&self) -> EntityRef {
        let value = self.read().clone();
        Arc::new(RwLock::new(value))
    }

    fn fmt_entity(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Debug::fmt(&*self.read(), f)
    }
}

impl Debug for dyn AnyResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_entity(f)
    }
}

/// A type-erased entity handle.
pub type EntityRef = Arc<dyn AnyResource>;

/// Erases the model type of a shared handle.
pub fn erase<T: Identifiable>(entity: Shared<T>) -> EntityRef {
    entity
}

/// Recovers the typed handle; `None` when the entity is of another model type.
pub fn downcast<T: Identifiable>(entity: &EntityRef) -> Option<Shared<T>> {
    Arc::clone(entity).into_any().downcast::<RwLock<T>>().ok()
}

/// Runs `f` against the typed value behind `entity` under a read lock.
pub fn with_typed<T: Identifiable, R>(entity: &dyn AnyResource, f: impl FnOnce(&T) -> R) -> Option<R> {
    entity
        .as_any()
        .downcast_ref::<RwLock<T>>()
        .map(|lock| f(&lock.read()))
}

/// Runs `f` against the typed value behind `entity` under a write lock.
pub fn with_typed_mut<T: Identifiable, R>(
    entity: &dyn AnyResource,
    f: impl FnOnce(&mut T) -> R,
) -> Option<R> {
    entity
        .as_any()
        .downcast_ref::<RwLock<T>>()
        .map(|lock| f(&mut lock.write()))
}

/// Identity of an entity within one traversal or one store.
///
/// Stored entities are identified by model type and string id. Transient entities have
/// no id yet and fall back to handle identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKey {
    Persisted { model: TypeId, id: String },
    Transient(usize),
}

impl EntityKey {
    pub fn of(entity: &EntityRef) -> Self {
        let id = entity.string_id();
        if id.is_empty() {
            EntityKey::Transient(Arc::as_ptr(entity).cast::<()>() as usize)
        } else {
            EntityKey::Persisted {
                model: entity.model_type(),
                id,
            }
        }
    }

    /// Key for an entity of `model` known only by its string id.
    pub fn persisted(model: TypeId, id: impl Into<String>) -> Self {
        EntityKey::Persisted {
            model,
            id: id.into(),
        }
    }
}

/// Extracts just the type name (e.g. "Article" instead of "blog::model::Article").
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}
