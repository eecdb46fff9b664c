//! # Storage Boundary
//!
//! [`Repository`] is the contract between the framework and the persistence engine.
//! The framework hands it fully composed [`QueryLayer`]s and type-erased entities;
//! the engine reports every failure through the single [`DataStoreError`] signal.
//!
//! # Architecture Note
//! The repository never decides *why* a write failed. When a write that references
//! other resources fails, the resource service issues follow-up existence queries to
//! turn the generic conflict into a precise client error.

use crate::entity::EntityRef;
use crate::error::DataStoreError;
use crate::graph::{Relationship, ResourceType};
use crate::query::{FilterExpression, QueryLayer};
use crate::request::TargetedFields;
use async_trait::async_trait;
use std::collections::BTreeSet;

/// Identifiers assigned to a relationship by a relationship endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationshipIds {
    ToOne(Option<String>),
    /// Set semantics: duplicate ids in a request collapse.
    ToMany(BTreeSet<String>),
}

impl RelationshipIds {
    pub fn ids(&self) -> BTreeSet<String> {
        match self {
            RelationshipIds::ToOne(id) => id.iter().cloned().collect(),
            RelationshipIds::ToMany(ids) => ids.clone(),
        }
    }

    pub fn to_many<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RelationshipIds::ToMany(ids.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
pub trait Repository: Send + Sync {
    /// Evaluates a query layer and returns detached entities.
    async fn get(&self, layer: &QueryLayer) -> Result<Vec<EntityRef>, DataStoreError>;

    /// Loads the stored entity a write will apply to, with all relationships.
    async fn get_for_update(&self, layer: &QueryLayer) -> Result<Option<EntityRef>, DataStoreError>;

    async fn count(
        &self,
        resource: &ResourceType,
        filter: Option<&FilterExpression>,
    ) -> Result<usize, DataStoreError>;

    /// Stores a new entity. Assigns the identifier when the entity has none.
    async fn create(
        &self,
        resource: &ResourceType,
        entity: &EntityRef,
        targeted: &TargetedFields,
    ) -> Result<(), DataStoreError>;

    /// Applies the targeted fields of `requested` to the stored entity.
    async fn update(
        &self,
        resource: &ResourceType,
        requested: &EntityRef,
        stored: &EntityRef,
        targeted: &TargetedFields,
    ) -> Result<(), DataStoreError>;

    async fn delete(&self, resource: &ResourceType, id: &str) -> Result<(), DataStoreError>;

    /// Replaces the value of a relationship.
    async fn set_relationship(
        &self,
        resource: &ResourceType,
        primary_id: &str,
        relationship: &Relationship,
        ids: &RelationshipIds,
    ) -> Result<(), DataStoreError>;

    async fn add_to_to_many(
        &self,
        resource: &ResourceType,
        primary_id: &str,
        relationship: &Relationship,
        ids: &BTreeSet<String>,
    ) -> Result<(), DataStoreError>;

    async fn remove_from_to_many(
        &self,
        resource: &ResourceType,
        primary_id: &str,
        relationship: &Relationship,
        ids: &BTreeSet<String>,
    ) -> Result<(), DataStoreError>;
}
