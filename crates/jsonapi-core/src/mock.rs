//! # In-Memory Repository
//!
//! [`InMemoryRepository`] evaluates [`QueryLayer`]s against rows kept in memory.
//! It enforces what a relational store would: referenced rows must exist, ids are
//! unique, a many-to-many pair is joined at most once, and both sides of a
//! relationship with an inverse stay in sync.
//!
//! Stored rows hold related entities as id-only stubs. Reads return detached
//! copies with the included relationships materialized, so callers and hooks can
//! mutate results freely.
//!
//! Every call is recorded, and [`InMemoryRepository::fail_next`] injects a one-shot
//! failure.

use crate::entity::{downcast, erase, shared, EntityRef, Identifiable, Shared};
use crate::error::DataStoreError;
use crate::graph::{Relationship, RelationshipValue, ResourceGraph, ResourceType};
use crate::query::{
    ComparisonExpression, FieldChain, FilterExpression, FilterOperator, FilterValue, IncludeChain,
    QueryLayer, SecondaryLayer, SortDirection, SortKey,
};
use crate::repository::{RelationshipIds, Repository};
use crate::request::TargetedFields;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::any::TypeId;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    GetForUpdate,
    Count,
    Create,
    Update,
    Delete,
    SetRelationship,
    AddToToMany,
    RemoveFromToMany,
}

impl Operation {
    pub fn is_write(&self) -> bool {
        !matches!(self, Operation::Get | Operation::GetForUpdate | Operation::Count)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub operation: Operation,
    pub resource: String,
}

#[derive(Default)]
struct Store {
    rows: HashMap<TypeId, Vec<EntityRef>>,
    calls: Vec<RecordedCall>,
    fail_next: Option<DataStoreError>,
}

/// How a loaded row is shaped: selected fields and relationships to materialize.
struct Shape<'a> {
    resource: &'a ResourceType,
    projection: Option<&'a BTreeSet<String>>,
    includes: Vec<IncludeChain>,
    included_projections: &'a HashMap<String, BTreeSet<String>>,
    secondary: Option<&'a SecondaryLayer>,
}

pub struct InMemoryRepository {
    graph: Arc<ResourceGraph>,
    store: Mutex<Store>,
}

impl InMemoryRepository {
    pub fn new(graph: Arc<ResourceGraph>) -> Self {
        Self {
            graph,
            store: Mutex::new(Store::default()),
        }
    }

    /// Stores an entity with all of its non-empty relationships, without recording
    /// a call. Related rows must have been seeded before.
    pub fn seed<T: Identifiable>(&self, entity: T) -> Result<(), DataStoreError> {
        let resource = self.resource_of(TypeId::of::<T>())?;
        let entity = erase(shared(entity));
        let targeted = TargetedFields {
            attributes: Vec::new(),
            relationships: resource.relationships().to_vec(),
        };
        let mut store = self.store.lock();
        self.insert(&mut store, &resource, &entity, &targeted)
    }

    /// Loads a stored entity with every relationship one level deep.
    pub fn find<T: Identifiable>(&self, id: &str) -> Option<Shared<T>> {
        let resource = self.resource_of(TypeId::of::<T>()).ok()?;
        let store = self.store.lock();
        let row = store.row(resource.model, id)?.clone();
        let no_projections = HashMap::new();
        let shape = Shape {
            resource: &resource,
            projection: None,
            includes: all_relationships(&resource),
            included_projections: &no_projections,
            secondary: None,
        };
        let loaded = self.materialize(&store, &row, &shape);
        downcast::<T>(&loaded)
    }

    /// Number of stored rows of model `T`.
    pub fn len_of<T: Identifiable>(&self) -> usize {
        self.store
            .lock()
            .rows
            .get(&TypeId::of::<T>())
            .map_or(0, Vec::len)
    }

    /// Makes the next call fail with `error`.
    pub fn fail_next(&self, error: DataStoreError) {
        self.store.lock().fail_next = Some(error);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.store.lock().calls.clone()
    }

    pub fn count_of(&self, operation: Operation) -> usize {
        self.store
            .lock()
            .calls
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    pub fn write_calls(&self) -> usize {
        self.store
            .lock()
            .calls
            .iter()
            .filter(|call| call.operation.is_write())
            .count()
    }

    pub fn clear_calls(&self) {
        self.store.lock().calls.clear();
    }

    fn resource_of(&self, model: TypeId) -> Result<Arc<ResourceType>, DataStoreError> {
        self.graph
            .get_resource_type_by_model(model)
            .cloned()
            .ok_or_else(|| DataStoreError::Conflict("Model is not part of the resource graph.".into()))
    }

    fn target_of(&self, relationship: &Relationship) -> Result<Arc<ResourceType>, DataStoreError> {
        self.resource_of(relationship.right_model)
    }

    fn insert(
        &self,
        store: &mut Store,
        resource: &ResourceType,
        entity: &EntityRef,
        targeted: &TargetedFields,
    ) -> Result<(), DataStoreError> {
        let assignments = self.requested_assignments(store, entity, &targeted.relationships)?;

        let mut id = entity.string_id();
        if id.is_empty() {
            id = store.next_id(resource.model).to_string();
            resource
                .set_string_id(entity.as_ref(), &id)
                .map_err(DataStoreError::Conflict)?;
        } else if store.row(resource.model, &id).is_some() {
            return Err(DataStoreError::Conflict(format!(
                "Duplicate key: {} '{id}' already exists.",
                resource.public_name
            )));
        }

        let row = entity.detached_copy();
        for relationship in resource.relationships() {
            clear(relationship, &row);
        }
        store.rows.entry(resource.model).or_default().push(Arc::clone(&row));
        debug!(resource = %resource.public_name, %id, "Inserted row");

        for (relationship, ids) in assignments {
            self.write_relationship(store, &relationship, &row, &ids)?;
        }
        Ok(())
    }

    /// Target ids a write assigns per relationship, after checking they exist.
    fn requested_assignments(
        &self,
        store: &Store,
        entity: &EntityRef,
        relationships: &[Arc<Relationship>],
    ) -> Result<Vec<(Arc<Relationship>, BTreeSet<String>)>, DataStoreError> {
        let mut assignments = Vec::new();
        for relationship in relationships {
            let ids: BTreeSet<String> = relationship
                .get_value(entity)
                .ids()
                .into_iter()
                .filter(|id| !id.is_empty())
                .collect();
            for id in &ids {
                store.require(relationship.right_model, relationship.right_name, id)?;
            }
            assignments.push((Arc::clone(relationship), ids));
        }
        Ok(assignments)
    }

    /// Replaces the targets of `relationship` on `row`.
    fn write_relationship(
        &self,
        store: &Store,
        relationship: &Relationship,
        row: &EntityRef,
        wanted: &BTreeSet<String>,
    ) -> Result<(), DataStoreError> {
        for id in wanted {
            store.require(relationship.right_model, relationship.right_name, id)?;
        }
        let current = relationship.get_value(row).ids();
        for id in current.iter().filter(|id| !wanted.contains(*id)) {
            self.unrelate(store, relationship, row, id);
        }
        for id in wanted.iter().filter(|id| !current.contains(id)) {
            self.relate(store, relationship, row, id)?;
        }
        Ok(())
    }

    /// Links `row` to `target_id`, mirroring the link on the inverse side.
    fn relate(
        &self,
        store: &Store,
        relationship: &Relationship,
        row: &EntityRef,
        target_id: &str,
    ) -> Result<(), DataStoreError> {
        let left_id = row.string_id();
        if !relationship.is_to_many() {
            if let Some(old) = relationship.get_value(row).ids().into_iter().next() {
                if old != target_id {
                    self.unrelate(store, relationship, row, &old);
                }
            }
        }
        self.attach(relationship, row, target_id)?;

        if let Some(inverse) = self.graph.inverse_of(relationship) {
            let target_row = store.require(relationship.right_model, relationship.right_name, target_id)?;
            if !inverse.is_to_many() {
                if let Some(old) = inverse.get_value(&target_row).ids().into_iter().next() {
                    if old != left_id {
                        self.unrelate(store, &inverse, &target_row, &old);
                    }
                }
            }
            self.attach(&inverse, &target_row, &left_id)?;
        }
        Ok(())
    }

    fn unrelate(&self, store: &Store, relationship: &Relationship, row: &EntityRef, target_id: &str) {
        detach(relationship, row, target_id);
        if let Some(inverse) = self.graph.inverse_of(relationship) {
            if let Some(target_row) = store.row(relationship.right_model, target_id) {
                detach(&inverse, target_row, &row.string_id());
            }
        }
    }

    /// Adds a stub for `target_id` to one side of a relationship.
    fn attach(&self, relationship: &Relationship, row: &EntityRef, target_id: &str) -> Result<(), DataStoreError> {
        let target = self.target_of(relationship)?;
        let stub = target.create_stub(target_id).ok_or_else(|| {
            DataStoreError::Conflict(format!("Invalid id '{target_id}' for {}.", target.public_name))
        })?;
        match relationship.get_value(row) {
            RelationshipValue::ToOne(_) => relationship.set_value(row, RelationshipValue::ToOne(Some(stub))),
            RelationshipValue::ToMany(mut current) => {
                if !current.iter().any(|e| e.string_id() == target_id) {
                    current.push(stub);
                    relationship.set_value(row, RelationshipValue::ToMany(current));
                }
            }
        }
        Ok(())
    }

    fn evaluate(&self, store: &Store, layer: &QueryLayer) -> Vec<EntityRef> {
        let rows = store.rows.get(&layer.resource.model).cloned().unwrap_or_default();
        let rows = select(store, rows, layer);
        let shape = Shape {
            resource: &layer.resource,
            projection: layer.projection.as_ref(),
            includes: layer.includes.clone(),
            included_projections: &layer.included_projections,
            secondary: layer.secondary.as_ref(),
        };
        rows.iter().map(|row| self.materialize(store, row, &shape)).collect()
    }

    /// Detached copy of a stored row with the requested relationships loaded and
    /// every other relationship left empty.
    fn materialize(&self, store: &Store, row: &EntityRef, shape: &Shape<'_>) -> EntityRef {
        let copy = row.detached_copy();
        if let Some(fields) = shape.projection {
            reset_unselected(shape.resource, &copy, fields);
        }

        for relationship in shape.resource.relationships() {
            clear(relationship, &copy);
            let Ok(target) = self.target_of(relationship) else {
                continue;
            };
            let target_rows: Vec<EntityRef> = relationship
                .get_value(row)
                .ids()
                .iter()
                .filter_map(|id| store.row(relationship.right_model, id).cloned())
                .collect();

            let loaded: Vec<EntityRef> = match shape.secondary {
                Some(secondary) if same(&secondary.relationship, relationship) => {
                    let layer = &secondary.layer;
                    let inner = Shape {
                        resource: &target,
                        projection: layer.projection.as_ref(),
                        includes: layer.includes.clone(),
                        included_projections: &layer.included_projections,
                        secondary: None,
                    };
                    select(store, target_rows, layer)
                        .iter()
                        .map(|target_row| self.materialize(store, target_row, &inner))
                        .collect()
                }
                _ => {
                    let chains: Vec<&IncludeChain> = shape
                        .includes
                        .iter()
                        .filter(|chain| chain.first().is_some_and(|first| same(first, relationship)))
                        .collect();
                    if chains.is_empty() {
                        continue;
                    }
                    let inner = Shape {
                        resource: &target,
                        projection: shape.included_projections.get(&target.public_name),
                        includes: chains.iter().filter_map(|chain| chain.tail()).collect(),
                        included_projections: shape.included_projections,
                        secondary: None,
                    };
                    target_rows
                        .iter()
                        .map(|target_row| self.materialize(store, target_row, &inner))
                        .collect()
                }
            };

            let value = if relationship.is_to_many() {
                RelationshipValue::ToMany(loaded)
            } else {
                RelationshipValue::ToOne(loaded.into_iter().next())
            };
            relationship.set_value(&copy, value);
        }
        copy
    }

    fn remove(&self, store: &mut Store, resource: &ResourceType, id: &str) -> Result<(), DataStoreError> {
        let table = store.rows.entry(resource.model).or_default();
        let before = table.len();
        table.retain(|row| row.string_id() != id);
        if table.len() == before {
            return Err(DataStoreError::Conflict(format!(
                "{} '{id}' does not exist.",
                resource.public_name
            )));
        }

        // Drop references to the deleted row from every other row.
        for (model, rows) in &store.rows {
            let Some(owner) = self.graph.get_resource_type_by_model(*model) else {
                continue;
            };
            for relationship in owner
                .relationships()
                .iter()
                .filter(|r| r.right_model == resource.model)
            {
                for row in rows {
                    detach(relationship, row, id);
                }
            }
        }
        debug!(resource = %resource.public_name, %id, "Deleted row");
        Ok(())
    }
}

impl Store {
    fn begin(&mut self, operation: Operation, resource: &ResourceType) -> Result<(), DataStoreError> {
        trace!(?operation, resource = %resource.public_name, "Repository call");
        self.calls.push(RecordedCall {
            operation,
            resource: resource.public_name.clone(),
        });
        match self.fail_next.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn row(&self, model: TypeId, id: &str) -> Option<&EntityRef> {
        self.rows.get(&model)?.iter().find(|row| row.string_id() == id)
    }

    fn require(&self, model: TypeId, name: &str, id: &str) -> Result<EntityRef, DataStoreError> {
        self.row(model, id)
            .cloned()
            .ok_or_else(|| DataStoreError::Conflict(format!("Referenced {name} '{id}' does not exist.")))
    }

    fn next_id(&self, model: TypeId) -> u64 {
        self.rows
            .get(&model)
            .into_iter()
            .flatten()
            .filter_map(|row| row.string_id().parse::<u64>().ok())
            .max()
            .unwrap_or(0)
            + 1
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get(&self, layer: &QueryLayer) -> Result<Vec<EntityRef>, DataStoreError> {
        let mut store = self.store.lock();
        store.begin(Operation::Get, &layer.resource)?;
        Ok(self.evaluate(&store, layer))
    }

    async fn get_for_update(&self, layer: &QueryLayer) -> Result<Option<EntityRef>, DataStoreError> {
        let mut store = self.store.lock();
        store.begin(Operation::GetForUpdate, &layer.resource)?;
        Ok(self.evaluate(&store, layer).into_iter().next())
    }

    async fn count(
        &self,
        resource: &ResourceType,
        filter: Option<&FilterExpression>,
    ) -> Result<usize, DataStoreError> {
        let mut store = self.store.lock();
        store.begin(Operation::Count, resource)?;
        let rows = store.rows.get(&resource.model).map(Vec::as_slice).unwrap_or_default();
        Ok(rows
            .iter()
            .filter(|row| filter.map_or(true, |f| matches_filter(&store, row, f)))
            .count())
    }

    async fn create(
        &self,
        resource: &ResourceType,
        entity: &EntityRef,
        targeted: &TargetedFields,
    ) -> Result<(), DataStoreError> {
        let mut store = self.store.lock();
        store.begin(Operation::Create, resource)?;
        self.insert(&mut store, resource, entity, targeted)
    }

    async fn update(
        &self,
        resource: &ResourceType,
        requested: &EntityRef,
        _stored: &EntityRef,
        targeted: &TargetedFields,
    ) -> Result<(), DataStoreError> {
        let mut store = self.store.lock();
        store.begin(Operation::Update, resource)?;
        let id = requested.string_id();
        let row = store.require(resource.model, &resource.public_name, &id)?;
        let assignments = self.requested_assignments(&store, requested, &targeted.relationships)?;

        for attribute in &targeted.attributes {
            if attribute.public_name == "id" || attribute.is_readonly() {
                continue;
            }
            attribute
                .set_value(row.as_ref(), attribute.get_value(requested.as_ref()))
                .map_err(DataStoreError::Conflict)?;
        }
        for (relationship, ids) in assignments {
            self.write_relationship(&store, &relationship, &row, &ids)?;
        }
        Ok(())
    }

    async fn delete(&self, resource: &ResourceType, id: &str) -> Result<(), DataStoreError> {
        let mut store = self.store.lock();
        store.begin(Operation::Delete, resource)?;
        self.remove(&mut store, resource, id)
    }

    async fn set_relationship(
        &self,
        resource: &ResourceType,
        primary_id: &str,
        relationship: &Relationship,
        ids: &RelationshipIds,
    ) -> Result<(), DataStoreError> {
        let mut store = self.store.lock();
        store.begin(Operation::SetRelationship, resource)?;
        let row = store.require(resource.model, &resource.public_name, primary_id)?;
        self.write_relationship(&store, relationship, &row, &ids.ids())
    }

    async fn add_to_to_many(
        &self,
        resource: &ResourceType,
        primary_id: &str,
        relationship: &Relationship,
        ids: &BTreeSet<String>,
    ) -> Result<(), DataStoreError> {
        let mut store = self.store.lock();
        store.begin(Operation::AddToToMany, resource)?;
        let row = store.require(resource.model, &resource.public_name, primary_id)?;

        let current = relationship.get_value(&row).ids();
        if let Some(info) = relationship.through() {
            if let Some(duplicate) = ids.iter().find(|id| current.contains(id)) {
                return Err(DataStoreError::Conflict(format!(
                    "Duplicate key in {}: '{primary_id}' is already joined to '{duplicate}'.",
                    info.join_name
                )));
            }
        }
        for id in ids {
            store.require(relationship.right_model, relationship.right_name, id)?;
        }
        for id in ids.iter().filter(|id| !current.contains(id)) {
            self.relate(&store, relationship, &row, id)?;
        }
        Ok(())
    }

    async fn remove_from_to_many(
        &self,
        resource: &ResourceType,
        primary_id: &str,
        relationship: &Relationship,
        ids: &BTreeSet<String>,
    ) -> Result<(), DataStoreError> {
        let mut store = self.store.lock();
        store.begin(Operation::RemoveFromToMany, resource)?;
        let row = store.require(resource.model, &resource.public_name, primary_id)?;
        for id in ids {
            self.unrelate(&store, relationship, &row, id);
        }
        Ok(())
    }
}

/// Filters, sorts and pages stored rows.
fn select(store: &Store, rows: Vec<EntityRef>, layer: &QueryLayer) -> Vec<EntityRef> {
    let mut rows: Vec<EntityRef> = rows
        .into_iter()
        .filter(|row| layer.filter.as_ref().map_or(true, |f| matches_filter(store, row, f)))
        .collect();
    if !layer.sort.is_empty() {
        rows.sort_by(|a, b| compare_rows(store, a, b, &layer.sort));
    }
    if layer.pagination.is_paginated() {
        rows = rows
            .into_iter()
            .skip(layer.pagination.offset())
            .take(layer.pagination.size())
            .collect();
    }
    rows
}

fn all_relationships(resource: &ResourceType) -> Vec<IncludeChain> {
    resource
        .relationships()
        .iter()
        .map(|relationship| IncludeChain {
            relationships: vec![Arc::clone(relationship)],
        })
        .collect()
}

fn same(a: &Relationship, b: &Relationship) -> bool {
    a.left_model == b.left_model && a.property_name == b.property_name
}

fn clear(relationship: &Relationship, row: &EntityRef) {
    let empty = if relationship.is_to_many() {
        RelationshipValue::ToMany(Vec::new())
    } else {
        RelationshipValue::ToOne(None)
    };
    relationship.set_value(row, empty);
}

fn detach(relationship: &Relationship, row: &EntityRef, target_id: &str) {
    match relationship.get_value(row) {
        RelationshipValue::ToOne(Some(current)) if current.string_id() == target_id => {
            relationship.set_value(row, RelationshipValue::ToOne(None));
        }
        RelationshipValue::ToOne(_) => {}
        RelationshipValue::ToMany(current) => {
            if current.iter().any(|e| e.string_id() == target_id) {
                let kept = current.into_iter().filter(|e| e.string_id() != target_id).collect();
                relationship.set_value(row, RelationshipValue::ToMany(kept));
            }
        }
    }
}

/// Resets attributes outside a sparse fieldset to their default values.
fn reset_unselected(resource: &ResourceType, entity: &EntityRef, fields: &BTreeSet<String>) {
    let Some(defaults) = resource.create_stub(&entity.string_id()) else {
        return;
    };
    for attribute in resource.attributes() {
        if attribute.public_name == "id" || attribute.is_readonly() || fields.contains(&attribute.public_name) {
            continue;
        }
        attribute
            .set_value(entity.as_ref(), attribute.get_value(defaults.as_ref()))
            .ok();
    }
}

/// Values reached by a field chain; to-many steps fan out.
fn field_values(store: &Store, row: &EntityRef, chain: &FieldChain) -> Vec<Value> {
    let mut current = vec![Arc::clone(row)];
    for relationship in &chain.relationships {
        current = current
            .iter()
            .flat_map(|entity| relationship.get_value(entity).ids())
            .filter_map(|id| store.row(relationship.right_model, &id).cloned())
            .collect();
    }
    current
        .iter()
        .map(|entity| chain.attribute.get_value(entity.as_ref()))
        .collect()
}

fn matches_filter(store: &Store, row: &EntityRef, filter: &FilterExpression) -> bool {
    match filter {
        FilterExpression::Comparison(comparison) => matches_comparison(store, row, comparison),
        FilterExpression::And(terms) => terms.iter().all(|t| matches_filter(store, row, t)),
        FilterExpression::Or(terms) => terms.iter().any(|t| matches_filter(store, row, t)),
    }
}

fn matches_comparison(store: &Store, row: &EntityRef, comparison: &ComparisonExpression) -> bool {
    let values = field_values(store, row, &comparison.field);
    let literal = &comparison.value;
    match comparison.operator {
        FilterOperator::IsNull => values.is_empty() || values.iter().any(Value::is_null),
        FilterOperator::IsNotNull => values.iter().any(|v| !v.is_null()),
        FilterOperator::NotEquals => !values
            .iter()
            .any(|v| test(v, FilterOperator::Equals, literal)),
        FilterOperator::NotIn => !values.iter().any(|v| test(v, FilterOperator::In, literal)),
        operator => values.iter().any(|v| test(v, operator, literal)),
    }
}

fn test(value: &Value, operator: FilterOperator, literal: &FilterValue) -> bool {
    match (operator, literal) {
        (FilterOperator::In, FilterValue::List(items)) => items
            .iter()
            .any(|item| compare_literal(value, item) == Some(Ordering::Equal)),
        (FilterOperator::Like, FilterValue::Single(pattern)) => value
            .as_str()
            .is_some_and(|s| s.contains(pattern.as_str())),
        (operator, FilterValue::Single(item)) => {
            let Some(ordering) = compare_literal(value, item) else {
                return false;
            };
            match operator {
                FilterOperator::Equals => ordering == Ordering::Equal,
                FilterOperator::LessThan => ordering == Ordering::Less,
                FilterOperator::LessOrEqual => ordering != Ordering::Greater,
                FilterOperator::GreaterThan => ordering == Ordering::Greater,
                FilterOperator::GreaterOrEqual => ordering != Ordering::Less,
                _ => false,
            }
        }
        _ => false,
    }
}

/// Compares a stored value with a query literal, coercing the literal to the
/// value's type.
fn compare_literal(value: &Value, literal: &str) -> Option<Ordering> {
    match value {
        Value::Number(number) => {
            let literal: f64 = literal.parse().ok()?;
            number.as_f64()?.partial_cmp(&literal)
        }
        Value::Bool(flag) => literal.parse::<bool>().ok().map(|l| flag.cmp(&l)),
        Value::String(s) => Some(s.as_str().cmp(literal)),
        Value::Null => literal.eq_ignore_ascii_case("null").then_some(Ordering::Equal),
        other => Some(other.to_string().as_str().cmp(literal)),
    }
}

fn compare_rows(store: &Store, a: &EntityRef, b: &EntityRef, sort: &[SortKey]) -> Ordering {
    for key in sort {
        let left = field_values(store, a, &key.field).into_iter().next().unwrap_or(Value::Null);
        let right = field_values(store, b, &key.field).into_iter().next().unwrap_or(Value::Null);
        let ordering = compare_values(&left, &right);
        let ordering = match key.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Nulls sort first.
fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .zip(b.as_f64())
            .and_then(|(a, b)| a.partial_cmp(&b))
            .unwrap_or(Ordering::Equal),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (a, b) => a.to_string().cmp(&b.to_string()),
    }
}
