//! # Resource Metadata
//!
//! [`ResourceType`], [`Attribute`] and [`Relationship`] describe how a model is exposed.
//! They are created once by the [`ResourceGraphBuilder`](super::ResourceGraphBuilder) and
//! never change afterwards, so they are shared through `Arc` without locks.
//!
//! # Architecture Note
//! Each attribute and relationship carries accessor closures that were bound while the
//! model type was still known. Everything downstream (parser, composer, hook executor,
//! in-memory store) only ever sees [`EntityRef`] values and calls through these closures.

use crate::entity::{AnyResource, EntityKey, EntityRef};
use serde_json::Value;
use std::any::TypeId;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

pub(crate) type ValueGetter = Arc<dyn Fn(&dyn AnyResource) -> Value + Send + Sync>;
pub(crate) type ValueSetter =
    Arc<dyn Fn(&dyn AnyResource, Value) -> Result<(), String> + Send + Sync>;
pub(crate) type NavigationGetter = Arc<dyn Fn(&EntityRef) -> RelationshipValue + Send + Sync>;
pub(crate) type NavigationSetter = Arc<dyn Fn(&EntityRef, RelationshipValue) + Send + Sync>;
pub(crate) type JoinsGetter = Arc<dyn Fn(&EntityRef) -> Vec<EntityRef> + Send + Sync>;
pub(crate) type JoinsSetter = Arc<dyn Fn(&EntityRef, Vec<EntityRef>) + Send + Sync>;
pub(crate) type RightGetter = Arc<dyn Fn(&EntityRef) -> Option<EntityRef> + Send + Sync>;
pub(crate) type JoinFactory = Arc<dyn Fn(&EntityRef, &EntityRef) -> Option<EntityRef> + Send + Sync>;
pub(crate) type StubFactory = Arc<dyn Fn(&str) -> Option<EntityRef> + Send + Sync>;

/// Shape of a model's identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Integer,
    String,
    Composite,
}

impl IdKind {
    pub(crate) fn of<I: 'static>() -> Self {
        let id = TypeId::of::<I>();
        let integers = [
            TypeId::of::<i8>(),
            TypeId::of::<i16>(),
            TypeId::of::<i32>(),
            TypeId::of::<i64>(),
            TypeId::of::<u8>(),
            TypeId::of::<u16>(),
            TypeId::of::<u32>(),
            TypeId::of::<u64>(),
            TypeId::of::<usize>(),
        ];
        if integers.contains(&id) {
            IdKind::Integer
        } else if id == TypeId::of::<String>() {
            IdKind::String
        } else {
            IdKind::Composite
        }
    }
}

/// Which query operations an attribute supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeCapabilities {
    pub filterable: bool,
    pub sortable: bool,
}

impl Default for AttributeCapabilities {
    fn default() -> Self {
        Self {
            filterable: true,
            sortable: true,
        }
    }
}

/// A named, exposed scalar field of a resource.
pub struct Attribute {
    pub public_name: String,
    pub property_name: String,
    pub nullable: bool,
    pub capabilities: AttributeCapabilities,
    pub(crate) getter: ValueGetter,
    pub(crate) setter: Option<ValueSetter>,
}

impl Attribute {
    pub fn get_value(&self, entity: &dyn AnyResource) -> Value {
        (self.getter)(entity)
    }

    /// Writes a JSON value into the entity; fails on read-only attributes and
    /// values of the wrong shape.
    pub fn set_value(&self, entity: &dyn AnyResource, value: Value) -> Result<(), String> {
        match &self.setter {
            Some(setter) => setter(entity, value),
            None => Err(format!("Attribute '{}' is read-only.", self.public_name)),
        }
    }

    pub fn is_readonly(&self) -> bool {
        self.setter.is_none()
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("public_name", &self.public_name)
            .field("property_name", &self.property_name)
            .field("nullable", &self.nullable)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipKind {
    ToOne,
    ToMany,
    /// Many-to-many through an intermediate join entity.
    Through,
}

/// The current value of a relationship navigation.
#[derive(Debug, Clone)]
pub enum RelationshipValue {
    ToOne(Option<EntityRef>),
    ToMany(Vec<EntityRef>),
}

impl RelationshipValue {
    pub fn entities(&self) -> Vec<EntityRef> {
        match self {
            RelationshipValue::ToOne(value) => value.iter().cloned().collect(),
            RelationshipValue::ToMany(values) => values.clone(),
        }
    }

    pub fn into_entities(self) -> Vec<EntityRef> {
        match self {
            RelationshipValue::ToOne(value) => value.into_iter().collect(),
            RelationshipValue::ToMany(values) => values,
        }
    }

    /// String ids of the related entities, in order.
    pub fn ids(&self) -> Vec<String> {
        match self {
            RelationshipValue::ToOne(value) => value.iter().map(|e| e.string_id()).collect(),
            RelationshipValue::ToMany(values) => values.iter().map(|e| e.string_id()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RelationshipValue::ToOne(value) => value.is_none(),
            RelationshipValue::ToMany(values) => values.is_empty(),
        }
    }
}

/// Join metadata of a many-to-many relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThroughInfo {
    pub join_model: TypeId,
    pub join_name: &'static str,
    /// Navigation from the left model to its join rows.
    pub through_property: String,
}

#[derive(Clone)]
pub(crate) enum Navigation {
    Direct {
        get: NavigationGetter,
        set: NavigationSetter,
    },
    Through {
        info: ThroughInfo,
        joins_get: JoinsGetter,
        joins_set: JoinsSetter,
        right_get: RightGetter,
        make_join: JoinFactory,
    },
}

/// Right-side entities of a many-to-many relationship, projected lazily from the join
/// rows. Cloning restarts the sequence.
#[derive(Clone)]
pub struct ThroughTargets {
    joins: Vec<EntityRef>,
    position: usize,
    right_get: RightGetter,
}

impl Iterator for ThroughTargets {
    type Item = EntityRef;

    fn next(&mut self) -> Option<EntityRef> {
        while let Some(join) = self.joins.get(self.position) {
            self.position += 1;
            if let Some(right) = (self.right_get)(join) {
                return Some(right);
            }
        }
        None
    }
}

/// A named link from one resource type to another.
#[derive(Clone)]
pub struct Relationship {
    pub public_name: String,
    pub property_name: String,
    pub kind: RelationshipKind,
    pub left_model: TypeId,
    pub left_name: &'static str,
    pub right_model: TypeId,
    pub right_name: &'static str,
    /// Property name of the inverse navigation on the right type, once resolved.
    pub inverse: Option<String>,
    pub(crate) explicit_inverse: bool,
    pub can_include: bool,
    pub(crate) navigation: Navigation,
}

impl Relationship {
    pub fn is_to_many(&self) -> bool {
        !matches!(self.kind, RelationshipKind::ToOne)
    }

    pub fn through(&self) -> Option<&ThroughInfo> {
        match &self.navigation {
            Navigation::Through { info, .. } => Some(info),
            Navigation::Direct { .. } => None,
        }
    }

    /// Reads the navigation. Through relationships are projected onto their right side.
    pub fn get_value(&self, entity: &EntityRef) -> RelationshipValue {
        match &self.navigation {
            Navigation::Direct { get, .. } => get(entity),
            Navigation::Through { .. } => {
                RelationshipValue::ToMany(self.through_targets(entity).into_iter().flatten().collect())
            }
        }
    }

    /// Lazy right-side sequence of a many-to-many relationship.
    pub fn through_targets(&self, entity: &EntityRef) -> Option<ThroughTargets> {
        match &self.navigation {
            Navigation::Through {
                joins_get,
                right_get,
                ..
            } => Some(ThroughTargets {
                joins: joins_get(entity),
                position: 0,
                right_get: Arc::clone(right_get),
            }),
            Navigation::Direct { .. } => None,
        }
    }

    /// Join rows of a many-to-many relationship.
    pub fn joins(&self, entity: &EntityRef) -> Vec<EntityRef> {
        match &self.navigation {
            Navigation::Through { joins_get, .. } => joins_get(entity),
            Navigation::Direct { .. } => Vec::new(),
        }
    }

    /// Right-side entity of a join row.
    pub fn join_target(&self, join: &EntityRef) -> Option<EntityRef> {
        match &self.navigation {
            Navigation::Through { right_get, .. } => right_get(join),
            Navigation::Direct { .. } => None,
        }
    }

    /// Writes the navigation.
    ///
    /// For many-to-many relationships, join rows whose target is still wanted are kept
    /// and new rows are created for the remaining targets.
    pub fn set_value(&self, entity: &EntityRef, value: RelationshipValue) {
        match &self.navigation {
            Navigation::Direct { set, .. } => set(entity, value),
            Navigation::Through {
                joins_get,
                joins_set,
                right_get,
                make_join,
                ..
            } => {
                let wanted = value.into_entities();
                let wanted_keys: HashSet<EntityKey> = wanted.iter().map(EntityKey::of).collect();

                let mut kept = Vec::new();
                let mut kept_keys = HashSet::new();
                for join in joins_get(entity) {
                    let Some(right) = right_get(&join) else {
                        continue;
                    };
                    let key = EntityKey::of(&right);
                    if wanted_keys.contains(&key) && kept_keys.insert(key) {
                        kept.push(join);
                    }
                }
                for target in &wanted {
                    if kept_keys.insert(EntityKey::of(target)) {
                        if let Some(join) = make_join(entity, target) {
                            kept.push(join);
                        }
                    }
                }
                joins_set(entity, kept);
            }
        }
    }
}

impl fmt::Debug for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relationship")
            .field("public_name", &self.public_name)
            .field("kind", &self.kind)
            .field("left", &self.left_name)
            .field("right", &self.right_name)
            .field("inverse", &self.inverse)
            .field("can_include", &self.can_include)
            .finish()
    }
}

/// A model type registered in the resource graph.
#[derive(Clone)]
pub struct ResourceType {
    pub public_name: String,
    pub model: TypeId,
    pub model_name: &'static str,
    pub id_kind: IdKind,
    pub controller_name: Option<String>,
    pub(crate) attributes: Vec<Arc<Attribute>>,
    pub(crate) relationships: Vec<Arc<Relationship>>,
    pub(crate) id_setter: ValueSetter,
    pub(crate) stub_factory: StubFactory,
}

impl ResourceType {
    pub fn attributes(&self) -> &[Arc<Attribute>] {
        &self.attributes
    }

    pub fn relationships(&self) -> &[Arc<Relationship>] {
        &self.relationships
    }

    pub fn attribute(&self, public_name: &str) -> Option<&Arc<Attribute>> {
        self.attributes.iter().find(|a| a.public_name == public_name)
    }

    pub fn relationship(&self, public_name: &str) -> Option<&Arc<Relationship>> {
        self.relationships
            .iter()
            .find(|r| r.public_name == public_name)
    }

    pub fn relationship_by_property(&self, property_name: &str) -> Option<&Arc<Relationship>> {
        self.relationships
            .iter()
            .find(|r| r.property_name == property_name)
    }

    /// The built-in `id` attribute.
    pub fn id_attribute(&self) -> Option<&Arc<Attribute>> {
        self.attribute("id")
    }

    /// Creates an entity carrying only the given identifier.
    pub fn create_stub(&self, id: &str) -> Option<EntityRef> {
        (self.stub_factory)(id)
    }

    /// Assigns a string identifier; fails when it cannot be parsed for this type.
    pub fn set_string_id(&self, entity: &dyn AnyResource, id: &str) -> Result<(), String> {
        (self.id_setter)(entity, Value::String(id.to_string()))
    }
}

impl fmt::Debug for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceType")
            .field("public_name", &self.public_name)
            .field("model", &self.model_name)
            .field("id_kind", &self.id_kind)
            .field("attributes", &self.attributes)
            .field("relationships", &self.relationships)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_kind_detection() {
        assert_eq!(IdKind::of::<i64>(), IdKind::Integer);
        assert_eq!(IdKind::of::<u32>(), IdKind::Integer);
        assert_eq!(IdKind::of::<String>(), IdKind::String);
        assert_eq!(IdKind::of::<(i64, i64)>(), IdKind::Composite);
    }

    #[test]
    fn test_relationship_value_helpers() {
        let empty = RelationshipValue::ToOne(None);
        assert!(empty.is_empty());
        assert!(empty.ids().is_empty());

        let many = RelationshipValue::ToMany(Vec::new());
        assert!(many.is_empty());
        assert!(many.into_entities().is_empty());
    }
}
