//! Query shaping per resource type.

use jsonapi_core::query::{FieldChain, FilterOperator, FilterValue, SortDirection};
use jsonapi_core::{
    FilterExpression, JsonApiError, QueryConstraints, ResourceDefinition, ResourceType, SortKey,
};

/// Soft delete for people: rows with `deleted == true` never leave the store, and
/// people are listed by name unless the client sorts otherwise.
pub struct HideDeletedPeople;

impl ResourceDefinition for HideDeletedPeople {
    fn default_filter(
        &self,
        resource: &ResourceType,
        _constraints: &QueryConstraints,
    ) -> Option<FilterExpression> {
        let field = FieldChain::on(resource, "deleted")?;
        Some(FilterExpression::comparison(
            field,
            FilterOperator::Equals,
            FilterValue::Single("false".to_string()),
        ))
    }

    fn default_sort(&self, resource: &ResourceType) -> Vec<SortKey> {
        FieldChain::on(resource, "name")
            .map(|field| SortKey {
                field,
                direction: SortDirection::Ascending,
            })
            .into_iter()
            .collect()
    }

    /// Clients may not filter on the soft-delete marker.
    fn on_apply_filter(
        &self,
        _resource: &ResourceType,
        existing: Option<FilterExpression>,
        _constraints: &QueryConstraints,
    ) -> Result<Option<FilterExpression>, JsonApiError> {
        let touches_marker = existing.as_ref().is_some_and(|filter| {
            filter
                .comparisons()
                .iter()
                .any(|c| c.field.relationships.is_empty() && c.field.attribute.public_name == "deleted")
        });
        if touches_marker {
            return Err(JsonApiError::InvalidQueryParameter {
                parameter: "filter[deleted]".to_string(),
                detail: "Filtering on 'deleted' is not allowed.".to_string(),
            });
        }
        Ok(existing)
    }
}

/// Lists the lot by model name.
pub struct CarsByModel;

impl ResourceDefinition for CarsByModel {
    fn default_sort(&self, resource: &ResourceType) -> Vec<SortKey> {
        FieldChain::on(resource, "model")
            .map(|field| SortKey {
                field,
                direction: SortDirection::Ascending,
            })
            .into_iter()
            .collect()
    }
}
