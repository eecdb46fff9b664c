//! # Query Layer Composition
//!
//! Combines parsed [`QueryConstraints`] with resource-definition callbacks into a
//! [`QueryLayer`]. Defaults are applied first, request constraints are layered on
//! top, and a definition's mandated filter is always ANDed in.
//!
//! The service also uses the composer for its internal queries (load for update,
//! existence checks, join lookups), so every query the framework issues goes
//! through one place.

use super::constraints::QueryConstraints;
use super::definition::ResourceDefinitions;
use super::expression::{
    FieldChain, FilterExpression, FilterOperator, FilterValue, IncludeChain, PaginationWindow,
    SortDirection, SortKey,
};
use super::layer::{QueryLayer, SecondaryLayer};
use crate::entity::EntityRef;
use crate::error::JsonApiError;
use crate::graph::{Relationship, ResourceGraph, ResourceType};
use crate::options::JsonApiOptions;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Which fields a by-id query selects on the primary type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopFieldSelection {
    OnlyIdAttribute,
    AllAttributes,
    PreserveExisting,
}

pub struct QueryLayerComposer {
    graph: Arc<ResourceGraph>,
    options: Arc<JsonApiOptions>,
    definitions: Arc<ResourceDefinitions>,
}

impl QueryLayerComposer {
    pub fn new(
        graph: Arc<ResourceGraph>,
        options: Arc<JsonApiOptions>,
        definitions: Arc<ResourceDefinitions>,
    ) -> Self {
        Self {
            graph,
            options,
            definitions,
        }
    }

    /// Builds the query plan for a collection or single-resource request.
    pub fn compose(
        &self,
        resource: &Arc<ResourceType>,
        constraints: &QueryConstraints,
    ) -> Result<QueryLayer, JsonApiError> {
        let definition = self.definitions.get(resource.model);

        let filter = self.top_filter(resource, constraints)?;

        let mut sort = if constraints.sort.is_empty() {
            definition
                .map(|d| d.default_sort(resource))
                .unwrap_or_default()
        } else {
            constraints.sort.clone()
        };
        if let Some(definition) = definition {
            sort = definition.on_apply_sort(resource, sort)?;
        }

        let mut includes: Vec<IncludeChain> = definition
            .map(|d| d.default_includes(resource))
            .unwrap_or_default();
        for chain in &constraints.includes {
            if !includes.contains(chain) {
                includes.push(chain.clone());
            }
        }
        if let Some(definition) = definition {
            includes = definition.on_apply_includes(resource, includes)?;
        }

        let mut pagination = PaginationWindow::new(
            constraints.page_size.unwrap_or(self.options.default_page_size),
            constraints.page_number.unwrap_or(1),
        );
        if let Some(definition) = definition {
            pagination = definition.on_apply_pagination(resource, pagination)?;
        }

        if pagination.is_paginated() && sort.is_empty() {
            sort.push(SortKey {
                field: id_chain(resource)?,
                direction: SortDirection::Ascending,
            });
        }

        let mut included_projections = constraints.sparse_fields.clone();
        let projection = included_projections.remove(&resource.public_name);

        Ok(QueryLayer {
            resource: Arc::clone(resource),
            filter,
            sort,
            pagination,
            projection,
            includes,
            included_projections,
            secondary: None,
        })
    }

    /// The primary filter alone: the mandated definition filter ANDed with the
    /// (possibly rewritten) request filter. Used for counting.
    pub fn top_filter(
        &self,
        resource: &Arc<ResourceType>,
        constraints: &QueryConstraints,
    ) -> Result<Option<FilterExpression>, JsonApiError> {
        let Some(definition) = self.definitions.get(resource.model) else {
            return Ok(constraints.filter.clone());
        };
        let mandated = definition.default_filter(resource, constraints);
        let requested = definition.on_apply_filter(resource, constraints.filter.clone(), constraints)?;
        Ok(FilterExpression::and_all(mandated.into_iter().chain(requested)))
    }

    /// Query plan for loading a single resource by id.
    pub fn compose_for_get_by_id(
        &self,
        id: &str,
        resource: &Arc<ResourceType>,
        selection: TopFieldSelection,
        constraints: &QueryConstraints,
    ) -> Result<QueryLayer, JsonApiError> {
        let mut layer = self.compose(resource, constraints)?;
        let by_id = id_equals(resource, id)?;
        layer.filter = Some(match layer.filter.take() {
            Some(existing) => existing.and(by_id),
            None => by_id,
        });
        layer.sort.clear();
        layer.pagination = PaginationWindow::unpaginated();
        match selection {
            TopFieldSelection::OnlyIdAttribute => {
                layer.projection = Some(BTreeSet::from(["id".to_string()]));
            }
            TopFieldSelection::AllAttributes => layer.projection = None,
            TopFieldSelection::PreserveExisting => {}
        }
        Ok(layer)
    }

    /// Loads the stored resource with every relationship, for change tracking.
    pub fn compose_for_update(
        &self,
        id: &str,
        resource: &Arc<ResourceType>,
    ) -> Result<QueryLayer, JsonApiError> {
        let mut layer = QueryLayer::new(Arc::clone(resource));
        layer.filter = Some(id_equals(resource, id)?);
        layer.includes = resource
            .relationships()
            .iter()
            .map(|relationship| IncludeChain {
                relationships: vec![Arc::clone(relationship)],
            })
            .collect();
        Ok(layer)
    }

    /// Wraps a layer for a secondary endpoint (`/articles/1/author`) into a layer for
    /// the primary resource that selects only its id.
    pub fn wrap_for_secondary_endpoint(
        &self,
        secondary: QueryLayer,
        primary: &Arc<ResourceType>,
        primary_id: &str,
        relationship: &Arc<Relationship>,
    ) -> Result<QueryLayer, JsonApiError> {
        let mut layer = QueryLayer::new(Arc::clone(primary));
        layer.filter = Some(id_equals(primary, primary_id)?);
        layer.projection = Some(BTreeSet::from(["id".to_string()]));
        layer.secondary = Some(SecondaryLayer {
            relationship: Arc::clone(relationship),
            layer: Box::new(secondary),
        });
        Ok(layer)
    }

    /// Loads the primary resource with only those many-to-many targets whose ids are
    /// among `right_ids`.
    pub fn compose_for_has_many_through(
        &self,
        primary: &Arc<ResourceType>,
        primary_id: &str,
        relationship: &Arc<Relationship>,
        right_ids: &BTreeSet<String>,
    ) -> Result<QueryLayer, JsonApiError> {
        let target = self.target(relationship)?;
        let right = self.compose_for_right_ids(&target, right_ids)?;
        self.wrap_for_secondary_endpoint(right, primary, primary_id, relationship)
    }

    /// Selects only the ids of the given resources. Used for existence checks.
    pub fn compose_for_right_ids(
        &self,
        resource: &Arc<ResourceType>,
        ids: &BTreeSet<String>,
    ) -> Result<QueryLayer, JsonApiError> {
        let mut layer = QueryLayer::new(Arc::clone(resource));
        layer.filter = Some(FilterExpression::comparison(
            id_chain(resource)?,
            FilterOperator::In,
            FilterValue::List(ids.iter().cloned().collect()),
        ));
        layer.projection = Some(BTreeSet::from(["id".to_string()]));
        Ok(layer)
    }

    /// One existence query per relationship of `requested` the client assigned.
    pub fn compose_for_targeted_secondary_ids(
        &self,
        requested: &EntityRef,
        targeted: &[Arc<Relationship>],
    ) -> Result<Vec<(Arc<Relationship>, BTreeSet<String>, QueryLayer)>, JsonApiError> {
        let mut layers = Vec::new();
        for relationship in targeted {
            let ids: BTreeSet<String> = relationship
                .get_value(requested)
                .ids()
                .into_iter()
                .filter(|id| !id.is_empty())
                .collect();
            if ids.is_empty() {
                continue;
            }
            let target = self.target(relationship)?;
            let layer = self.compose_for_right_ids(&target, &ids)?;
            layers.push((Arc::clone(relationship), ids, layer));
        }
        Ok(layers)
    }

    fn target(&self, relationship: &Relationship) -> Result<Arc<ResourceType>, JsonApiError> {
        self.graph.target_of(relationship).cloned().ok_or_else(|| {
            JsonApiError::Internal(format!(
                "Relationship '{}' targets an unregistered type.",
                relationship.public_name
            ))
        })
    }
}

fn id_chain(resource: &ResourceType) -> Result<FieldChain, JsonApiError> {
    FieldChain::on(resource, "id").ok_or_else(|| {
        JsonApiError::Internal(format!("Resource type '{}' has no id attribute.", resource.public_name))
    })
}

fn id_equals(resource: &ResourceType, id: &str) -> Result<FilterExpression, JsonApiError> {
    Ok(FilterExpression::comparison(
        id_chain(resource)?,
        FilterOperator::Equals,
        FilterValue::Single(id.to_string()),
    ))
}
