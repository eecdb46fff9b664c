//! # Resource Definitions
//!
//! A [`ResourceDefinition`] lets an application shape the queries issued for one
//! resource type: it supplies defaults (a mandated filter, a default sort, default
//! includes) and may rewrite or veto what the client asked for.
//!
//! All methods have pass-through defaults, so implementors only override what they need.

use super::constraints::QueryConstraints;
use super::expression::{FilterExpression, IncludeChain, PaginationWindow, SortKey};
use crate::entity::Identifiable;
use crate::error::JsonApiError;
use crate::graph::ResourceType;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

pub trait ResourceDefinition: Send + Sync {
    /// Filter that is always ANDed with the request filter and can never be removed
    /// by the client (e.g. hiding soft-deleted rows).
    fn default_filter(
        &self,
        _resource: &ResourceType,
        _constraints: &QueryConstraints,
    ) -> Option<FilterExpression> {
        None
    }

    /// Sort used when the request has none.
    fn default_sort(&self, _resource: &ResourceType) -> Vec<SortKey> {
        Vec::new()
    }

    /// Includes added to every request for this type.
    fn default_includes(&self, _resource: &ResourceType) -> Vec<IncludeChain> {
        Vec::new()
    }

    /// Rewrites or vetoes the client filter.
    fn on_apply_filter(
        &self,
        _resource: &ResourceType,
        existing: Option<FilterExpression>,
        _constraints: &QueryConstraints,
    ) -> Result<Option<FilterExpression>, JsonApiError> {
        Ok(existing)
    }

    fn on_apply_sort(
        &self,
        _resource: &ResourceType,
        existing: Vec<SortKey>,
    ) -> Result<Vec<SortKey>, JsonApiError> {
        Ok(existing)
    }

    fn on_apply_includes(
        &self,
        _resource: &ResourceType,
        existing: Vec<IncludeChain>,
    ) -> Result<Vec<IncludeChain>, JsonApiError> {
        Ok(existing)
    }

    fn on_apply_pagination(
        &self,
        _resource: &ResourceType,
        existing: PaginationWindow,
    ) -> Result<PaginationWindow, JsonApiError> {
        Ok(existing)
    }
}

/// Definitions registered per model type.
#[derive(Default, Clone)]
pub struct ResourceDefinitions {
    definitions: HashMap<TypeId, Arc<dyn ResourceDefinition>>,
}

impl ResourceDefinitions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Identifiable>(&mut self, definition: impl ResourceDefinition + 'static) -> &mut Self {
        self.definitions.insert(TypeId::of::<T>(), Arc::new(definition));
        self
    }

    pub fn get(&self, model: TypeId) -> Option<&Arc<dyn ResourceDefinition>> {
        self.definitions.get(&model)
    }
}

impl std::fmt::Debug for ResourceDefinitions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceDefinitions")
            .field("count", &self.definitions.len())
            .finish()
    }
}
