//! Two-phase construction of the resource graph: register every type, then resolve
//! inverse relationships and freeze the result.

use super::resource_type::{
    Attribute, AttributeCapabilities, IdKind, JoinFactory, JoinsGetter, JoinsSetter, Navigation,
    NavigationGetter, NavigationSetter, Relationship, RelationshipKind, RelationshipValue,
    ResourceType, RightGetter, StubFactory, ThroughInfo, ValueGetter, ValueSetter,
};
use super::ResourceGraph;
use crate::entity::{
    downcast, erase, short_type_name, shared, with_typed, with_typed_mut, AnyResource, EntityRef,
    Identifiable, Shared,
};
use crate::error::GraphError;
use crate::options::NamingConvention;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::any::TypeId;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Declares the attributes and relationships of one model type.
///
/// Property names are the Rust field names; public names derive from them through the
/// configured [`NamingConvention`] unless overridden with [`renamed`](Self::renamed).
pub struct ResourceTypeBuilder<T> {
    naming: NamingConvention,
    public_name: String,
    controller: Option<String>,
    attributes: Vec<Attribute>,
    relationships: Vec<Relationship>,
    errors: Vec<GraphError>,
    _model: PhantomData<fn() -> T>,
}

impl<T: Identifiable + Default> ResourceTypeBuilder<T> {
    fn new(public_name: &str, naming: NamingConvention) -> Self {
        Self {
            naming,
            public_name: public_name.to_string(),
            controller: None,
            attributes: Vec::new(),
            relationships: Vec::new(),
            errors: Vec::new(),
            _model: PhantomData,
        }
    }

    /// Adds a read-write attribute.
    pub fn attribute<V>(
        self,
        property: &str,
        get: impl Fn(&T) -> V + Send + Sync + 'static,
        set: impl Fn(&mut T, V) + Send + Sync + 'static,
    ) -> Self
    where
        V: Serialize + DeserializeOwned + 'static,
    {
        let setter: ValueSetter = Arc::new(move |entity: &dyn AnyResource, value: Value| {
            let value: V = serde_json::from_value(value).map_err(|e| e.to_string())?;
            with_typed_mut::<T, _>(entity, |model| set(model, value))
                .ok_or_else(|| format!("Entity is not of type '{}'.", short_type_name::<T>()))
        });
        let nullable = serde_json::from_value::<V>(Value::Null).is_ok();
        self.push_attribute(property, Self::getter(get), Some(setter), nullable)
    }

    /// Adds an attribute that can be read but never written through the API.
    pub fn readonly_attribute<V>(self, property: &str, get: impl Fn(&T) -> V + Send + Sync + 'static) -> Self
    where
        V: Serialize + 'static,
    {
        self.push_attribute(property, Self::getter(get), None, true)
    }

    /// Overrides filter and sort capabilities of an attribute.
    pub fn capabilities(mut self, property: &str, capabilities: AttributeCapabilities) -> Self {
        match self.attributes.iter_mut().find(|a| a.property_name == property) {
            Some(attribute) => attribute.capabilities = capabilities,
            None => self.reject(property),
        }
        self
    }

    /// Overrides the derived public name of an attribute or relationship.
    pub fn renamed(mut self, property: &str, public_name: &str) -> Self {
        if let Some(attribute) = self.attributes.iter_mut().find(|a| a.property_name == property) {
            attribute.public_name = public_name.to_string();
        } else if let Some(relationship) = self
            .relationships
            .iter_mut()
            .find(|r| r.property_name == property)
        {
            relationship.public_name = public_name.to_string();
        } else {
            self.reject(property);
        }
        self
    }

    /// Adds a to-one relationship.
    pub fn has_one<U: Identifiable>(
        self,
        property: &str,
        get: impl Fn(&T) -> Option<Shared<U>> + Send + Sync + 'static,
        set: impl Fn(&mut T, Option<Shared<U>>) + Send + Sync + 'static,
    ) -> Self {
        let getter: NavigationGetter = Arc::new(move |entity: &EntityRef| {
            let target = with_typed::<T, _>(entity.as_ref(), |model| get(model)).flatten();
            RelationshipValue::ToOne(target.map(erase::<U>))
        });
        let setter: NavigationSetter = Arc::new(move |entity: &EntityRef, value: RelationshipValue| {
            let target = value
                .into_entities()
                .into_iter()
                .next()
                .and_then(|e| downcast::<U>(&e));
            with_typed_mut::<T, _>(entity.as_ref(), |model| set(model, target));
        });
        let navigation = Navigation::Direct {
            get: getter,
            set: setter,
        };
        self.push_relationship::<U>(property, RelationshipKind::ToOne, navigation)
    }

    /// Adds a to-many relationship backed by a collection of the target model.
    pub fn has_many<U: Identifiable>(
        self,
        property: &str,
        get: impl Fn(&T) -> Vec<Shared<U>> + Send + Sync + 'static,
        set: impl Fn(&mut T, Vec<Shared<U>>) + Send + Sync + 'static,
    ) -> Self {
        let getter: NavigationGetter = Arc::new(move |entity: &EntityRef| {
            let targets = with_typed::<T, _>(entity.as_ref(), |model| get(model)).unwrap_or_default();
            RelationshipValue::ToMany(targets.into_iter().map(erase::<U>).collect())
        });
        let setter: NavigationSetter = Arc::new(move |entity: &EntityRef, value: RelationshipValue| {
            let targets: Vec<Shared<U>> = value
                .into_entities()
                .iter()
                .filter_map(downcast::<U>)
                .collect();
            with_typed_mut::<T, _>(entity.as_ref(), |model| set(model, targets));
        });
        let navigation = Navigation::Direct {
            get: getter,
            set: setter,
        };
        self.push_relationship::<U>(property, RelationshipKind::ToMany, navigation)
    }

    /// Adds a many-to-many relationship through the join model `J`.
    ///
    /// `joins` reads the join rows, `right` projects a join row onto its target and
    /// `make_join` creates a new join row linking this entity to a target.
    #[allow(clippy::too_many_arguments)]
    pub fn has_many_through<U: Identifiable, J: Identifiable>(
        self,
        property: &str,
        through_property: &str,
        joins: impl Fn(&T) -> Vec<Shared<J>> + Send + Sync + 'static,
        set_joins: impl Fn(&mut T, Vec<Shared<J>>) + Send + Sync + 'static,
        right: impl Fn(&J) -> Option<Shared<U>> + Send + Sync + 'static,
        make_join: impl Fn(&T, &Shared<U>) -> J + Send + Sync + 'static,
    ) -> Self {
        let joins_get: JoinsGetter = Arc::new(move |entity: &EntityRef| {
            with_typed::<T, _>(entity.as_ref(), |model| joins(model))
                .unwrap_or_default()
                .into_iter()
                .map(erase::<J>)
                .collect()
        });
        let joins_set: JoinsSetter = Arc::new(move |entity: &EntityRef, rows: Vec<EntityRef>| {
            let rows: Vec<Shared<J>> = rows.iter().filter_map(downcast::<J>).collect();
            with_typed_mut::<T, _>(entity.as_ref(), |model| set_joins(model, rows));
        });
        let right_get: RightGetter = Arc::new(move |join: &EntityRef| {
            with_typed::<J, _>(join.as_ref(), |row| right(row))
                .flatten()
                .map(erase::<U>)
        });
        let factory: JoinFactory = Arc::new(move |left: &EntityRef, target: &EntityRef| {
            let target = downcast::<U>(target)?;
            let row = with_typed::<T, _>(left.as_ref(), |model| make_join(model, &target))?;
            Some(erase(shared(row)))
        });
        let navigation = Navigation::Through {
            info: ThroughInfo {
                join_model: TypeId::of::<J>(),
                join_name: short_type_name::<J>(),
                through_property: through_property.to_string(),
            },
            joins_get,
            joins_set,
            right_get,
            make_join: factory,
        };
        self.push_relationship::<U>(property, RelationshipKind::Through, navigation)
    }

    /// Pins the inverse of a relationship instead of relying on resolution.
    pub fn inverse(mut self, property: &str, inverse_property: &str) -> Self {
        match self
            .relationships
            .iter_mut()
            .find(|r| r.property_name == property)
        {
            Some(relationship) => {
                relationship.inverse = Some(inverse_property.to_string());
                relationship.explicit_inverse = true;
            }
            None => self.reject(property),
        }
        self
    }

    /// Excludes a relationship from `include` chains.
    pub fn not_includable(mut self, property: &str) -> Self {
        match self
            .relationships
            .iter_mut()
            .find(|r| r.property_name == property)
        {
            Some(relationship) => relationship.can_include = false,
            None => self.reject(property),
        }
        self
    }

    /// Name of the controller serving this type.
    pub fn controller(mut self, name: &str) -> Self {
        self.controller = Some(name.to_string());
        self
    }

    fn getter<V: Serialize + 'static>(get: impl Fn(&T) -> V + Send + Sync + 'static) -> ValueGetter {
        Arc::new(move |entity: &dyn AnyResource| {
            with_typed::<T, _>(entity, |model| serde_json::to_value(get(model)).unwrap_or(Value::Null))
                .unwrap_or(Value::Null)
        })
    }

    fn push_attribute(
        mut self,
        property: &str,
        getter: ValueGetter,
        setter: Option<ValueSetter>,
        nullable: bool,
    ) -> Self {
        let public_name = self.naming.apply(property);
        if self.is_taken(&public_name) {
            let error = self.duplicate_field(&public_name);
            self.errors.push(error);
            return self;
        }
        self.attributes.push(Attribute {
            public_name,
            property_name: property.to_string(),
            nullable,
            capabilities: AttributeCapabilities::default(),
            getter,
            setter,
        });
        self
    }

    fn push_relationship<U: Identifiable>(
        mut self,
        property: &str,
        kind: RelationshipKind,
        navigation: Navigation,
    ) -> Self {
        let public_name = self.naming.apply(property);
        if self.is_taken(&public_name) {
            let error = self.duplicate_field(&public_name);
            self.errors.push(error);
            return self;
        }
        self.relationships.push(Relationship {
            public_name,
            property_name: property.to_string(),
            kind,
            left_model: TypeId::of::<T>(),
            left_name: short_type_name::<T>(),
            right_model: TypeId::of::<U>(),
            right_name: short_type_name::<U>(),
            inverse: None,
            explicit_inverse: false,
            can_include: true,
            navigation,
        });
        self
    }

    fn is_taken(&self, public_name: &str) -> bool {
        public_name == "id"
            || self.attributes.iter().any(|a| a.public_name == public_name)
            || self.relationships.iter().any(|r| r.public_name == public_name)
    }

    fn duplicate_field(&self, field: &str) -> GraphError {
        GraphError::DuplicateField {
            resource: self.public_name.clone(),
            field: field.to_string(),
        }
    }

    fn reject(&mut self, property: &str) {
        let error = self.unknown_field(property);
        self.errors.push(error);
    }

    fn unknown_field(&self, property: &str) -> GraphError {
        GraphError::InvalidInverse {
            resource: self.public_name.clone(),
            relationship: property.to_string(),
            detail: "no field with this property name is declared".to_string(),
        }
    }

    fn into_resource_type(self) -> Result<ResourceType, GraphError> {
        if let Some(error) = self.errors.into_iter().next() {
            return Err(error);
        }

        let id_getter: ValueGetter = Arc::new(|entity: &dyn AnyResource| {
            with_typed::<T, _>(entity, |model| serde_json::to_value(model.id()).unwrap_or(Value::Null))
                .unwrap_or(Value::Null)
        });
        let id_setter: ValueSetter = Arc::new(|entity: &dyn AnyResource, value: Value| {
            let raw = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            let id = raw
                .parse::<T::Id>()
                .map_err(|_| format!("'{raw}' is not a valid identifier."))?;
            with_typed_mut::<T, _>(entity, |model| model.set_id(id))
                .ok_or_else(|| format!("Entity is not of type '{}'.", short_type_name::<T>()))
        });
        let stub_factory: StubFactory = Arc::new(|id: &str| {
            let id = id.parse::<T::Id>().ok()?;
            let mut model = T::default();
            model.set_id(id);
            Some(erase(shared(model)))
        });

        let mut attributes = vec![Arc::new(Attribute {
            public_name: "id".to_string(),
            property_name: "id".to_string(),
            nullable: false,
            capabilities: AttributeCapabilities::default(),
            getter: id_getter,
            setter: Some(Arc::clone(&id_setter)),
        })];
        attributes.extend(self.attributes.into_iter().map(Arc::new));

        Ok(ResourceType {
            public_name: self.public_name,
            model: TypeId::of::<T>(),
            model_name: short_type_name::<T>(),
            id_kind: IdKind::of::<T::Id>(),
            controller_name: self.controller,
            attributes,
            relationships: self.relationships.into_iter().map(Arc::new).collect(),
            id_setter,
            stub_factory,
        })
    }
}

/// Collects resource types and produces an immutable [`ResourceGraph`].
///
/// # Example
/// ```rust,ignore
/// let mut builder = ResourceGraphBuilder::new(NamingConvention::CamelCase);
/// builder
///     .add::<Tag>("tags", |r| r.attribute("name", |t| t.name.clone(), |t, v| t.name = v))?
///     .add::<Article>("articles", |r| r.has_one::<Person>("author", |a| a.author.clone(), |a, v| a.author = v))?;
/// let graph = builder.build()?;
/// ```
#[derive(Default)]
pub struct ResourceGraphBuilder {
    naming: NamingConvention,
    types: Vec<ResourceType>,
}

impl ResourceGraphBuilder {
    pub fn new(naming: NamingConvention) -> Self {
        Self {
            naming,
            types: Vec::new(),
        }
    }

    /// Declares and registers the model `T` under `public_name`.
    pub fn add<T: Identifiable + Default>(
        &mut self,
        public_name: &str,
        configure: impl FnOnce(ResourceTypeBuilder<T>) -> ResourceTypeBuilder<T>,
    ) -> Result<&mut Self, GraphError> {
        let resource_type = configure(ResourceTypeBuilder::new(public_name, self.naming)).into_resource_type()?;
        self.register(resource_type)
    }

    /// Registers a fully described type. Public names are unique, ignoring case.
    pub fn register(&mut self, resource_type: ResourceType) -> Result<&mut Self, GraphError> {
        let collides = self.types.iter().any(|existing| {
            existing.public_name.eq_ignore_ascii_case(&resource_type.public_name)
                || existing.model == resource_type.model
        });
        if collides {
            return Err(GraphError::DuplicateResource {
                public_name: resource_type.public_name,
            });
        }
        debug!(resource = %resource_type.public_name, model = resource_type.model_name, "Registered resource type");
        self.types.push(resource_type);
        Ok(self)
    }

    /// Assigns inverses to relationships that have none.
    ///
    /// A relationship gets an inverse only when exactly one relationship on the target
    /// type leads back to the origin type. Many-to-many relationships only pair with
    /// to-many candidates. Zero or several candidates leave the inverse absent. Running
    /// this more than once yields the same assignments.
    pub fn resolve_inverse_relationships(&mut self) {
        let snapshot: Vec<(TypeId, Vec<Arc<Relationship>>)> = self
            .types
            .iter()
            .map(|t| (t.model, t.relationships.clone()))
            .collect();

        for resource_type in &mut self.types {
            for relationship in &mut resource_type.relationships {
                if relationship.inverse.is_some() {
                    continue;
                }
                let Some((_, targets)) = snapshot
                    .iter()
                    .find(|(model, _)| *model == relationship.right_model)
                else {
                    continue;
                };
                let candidates: Vec<&Arc<Relationship>> = targets
                    .iter()
                    .filter(|c| c.right_model == relationship.left_model)
                    .filter(|c| {
                        !(c.left_model == relationship.left_model
                            && c.property_name == relationship.property_name)
                    })
                    .filter(|c| relationship.kind != RelationshipKind::Through || c.is_to_many())
                    .filter(|c| {
                        !c.explicit_inverse
                            || c.inverse.as_deref() == Some(relationship.property_name.as_str())
                    })
                    .collect();

                if let [single] = candidates.as_slice() {
                    debug!(
                        resource = %resource_type.public_name,
                        relationship = %relationship.public_name,
                        inverse = %single.public_name,
                        "Resolved inverse relationship"
                    );
                    let inverse = single.property_name.clone();
                    Arc::make_mut(relationship).inverse = Some(inverse);
                }
            }
        }
    }

    /// Validates relationship targets and explicit inverses, resolves the remaining
    /// inverses and freezes the graph.
    pub fn build(&mut self) -> Result<ResourceGraph, GraphError> {
        for resource_type in &self.types {
            for relationship in &resource_type.relationships {
                let Some(target) = self
                    .types
                    .iter()
                    .find(|t| t.model == relationship.right_model)
                else {
                    return Err(GraphError::UnknownRelationshipTarget {
                        resource: resource_type.public_name.clone(),
                        relationship: relationship.public_name.clone(),
                        target: relationship.right_name,
                    });
                };
                if !relationship.explicit_inverse {
                    continue;
                }
                let inverse_name = relationship.inverse.as_deref().unwrap_or_default();
                let invalid = |detail: String| GraphError::InvalidInverse {
                    resource: resource_type.public_name.clone(),
                    relationship: relationship.public_name.clone(),
                    detail,
                };
                let Some(inverse) = target.relationship_by_property(inverse_name) else {
                    return Err(invalid(format!(
                        "'{}' has no relationship named '{inverse_name}'",
                        target.public_name
                    )));
                };
                if inverse.right_model != relationship.left_model {
                    return Err(invalid(format!(
                        "'{}' does not lead back to '{}'",
                        inverse.public_name, resource_type.public_name
                    )));
                }
                if relationship.kind == RelationshipKind::Through && !inverse.is_to_many() {
                    return Err(invalid(format!(
                        "many-to-many relationship cannot pair with to-one '{}'",
                        inverse.public_name
                    )));
                }
            }
        }

        self.resolve_inverse_relationships();
        Ok(ResourceGraph::new(self.types.clone()))
    }
}
