//! # Errors
//!
//! This module defines the error types used throughout the framework. By centralizing
//! error definitions we keep the mapping from failures to JSON:API error objects in
//! one place.
//!
//! - [`JsonApiError`] is the client-facing error. Every variant knows its HTTP status,
//!   short title, human-readable detail and optional source (query parameter or
//!   document pointer).
//! - [`GraphError`] is raised while building the resource graph at startup.
//! - [`DataStoreError`] is the single generic failure signal of the storage boundary.
//!   The resource service disambiguates it into precise errors.

use serde::Serialize;

/// Errors raised while building the resource graph.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("Resource with public name '{public_name}' is already registered")]
    DuplicateResource { public_name: String },
    #[error("Resource '{resource}' declares the field '{field}' more than once")]
    DuplicateField { resource: String, field: String },
    #[error("Relationship '{relationship}' on '{resource}' targets unregistered model '{target}'")]
    UnknownRelationshipTarget {
        resource: String,
        relationship: String,
        target: &'static str,
    },
    #[error("Invalid inverse for relationship '{relationship}' on '{resource}': {detail}")]
    InvalidInverse {
        resource: String,
        relationship: String,
        detail: String,
    },
    #[error("Model '{0}' is not registered in the resource graph")]
    UnregisteredModel(&'static str),
}

/// Generic failure signal from the storage collaborator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataStoreError {
    /// The write could not be applied (constraint violation, missing row, ...).
    #[error("Data store update failed: {0}")]
    Conflict(String),
    /// The store could not be reached.
    #[error("Data store unavailable: {0}")]
    Unavailable(String),
    /// The request was cancelled while the call was in flight.
    #[error("Data store call cancelled")]
    Cancelled,
}

/// A related resource referenced by a write that does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingResourceInRelationship {
    pub relationship: String,
    pub resource_type: String,
    pub id: String,
}

/// Client-facing errors produced by the framework.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JsonApiError {
    #[error("Query string parameter '{parameter}' is unknown. Set 'allowUnknownQueryParameters' to 'true' in options to ignore unknown parameters.")]
    UnknownQueryParameter { parameter: String },

    #[error("{detail}")]
    InvalidQueryParameter { parameter: String, detail: String },

    #[error("Filter operator '{operator}' is not supported.")]
    InvalidFilterOperator { parameter: String, operator: String },

    #[error("Attribute '{field}' does not exist or cannot be sorted on resource type '{resource}'.")]
    InvalidSortField { field: String, resource: String },

    #[error("{detail}")]
    InvalidInclude {
        segment: String,
        resource: String,
        detail: String,
    },

    #[error("{detail}")]
    InvalidPageSize { detail: String },

    #[error("{detail}")]
    InvalidPageNumber { detail: String },

    #[error("Resource of type '{resource}' with ID '{id}' does not exist.")]
    ResourceNotFound { id: String, resource: String },

    #[error("Resource of type '{resource}' does not contain a relationship named '{relationship}'.")]
    RelationshipNotFound {
        relationship: String,
        resource: String,
    },

    #[error("{} related resource(s) do not exist.", .0.len())]
    ResourcesInRelationshipsNotFound(Vec<MissingResourceInRelationship>),

    #[error("Another resource of type '{resource}' with ID '{id}' already exists.")]
    ResourceAlreadyExists { id: String, resource: String },

    #[error("Relationship '{relationship}' must be a to-many relationship.")]
    ToManyRelationshipRequired { relationship: String },

    #[error("{detail}")]
    InvalidRequestBody { detail: String },

    #[error("Failed to persist changes in the underlying data store: {message}")]
    DataStoreUpdate { message: String },

    #[error("Hook {hook} returned {returned} resources on single-resource pipeline {pipeline}")]
    HookContractViolation {
        hook: String,
        pipeline: String,
        returned: usize,
    },

    #[error("The request was cancelled.")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl JsonApiError {
    /// HTTP status code of this error.
    pub fn status(&self) -> u16 {
        match self {
            JsonApiError::UnknownQueryParameter { .. }
            | JsonApiError::InvalidQueryParameter { .. }
            | JsonApiError::InvalidFilterOperator { .. }
            | JsonApiError::InvalidSortField { .. }
            | JsonApiError::InvalidInclude { .. }
            | JsonApiError::InvalidPageSize { .. }
            | JsonApiError::InvalidPageNumber { .. } => 400,
            JsonApiError::ToManyRelationshipRequired { .. } => 403,
            JsonApiError::ResourceNotFound { .. }
            | JsonApiError::RelationshipNotFound { .. }
            | JsonApiError::ResourcesInRelationshipsNotFound(_) => 404,
            JsonApiError::ResourceAlreadyExists { .. } => 409,
            JsonApiError::InvalidRequestBody { .. } | JsonApiError::DataStoreUpdate { .. } => 422,
            JsonApiError::Cancelled => 499,
            JsonApiError::HookContractViolation { .. } | JsonApiError::Internal(_) => 500,
        }
    }

    /// Short, human-readable summary of the problem.
    pub fn title(&self) -> &'static str {
        match self {
            JsonApiError::UnknownQueryParameter { .. } => "Unknown query string parameter.",
            JsonApiError::InvalidQueryParameter { .. } => {
                "The specified query string parameter is invalid."
            }
            JsonApiError::InvalidFilterOperator { .. } => "The specified filter is invalid.",
            JsonApiError::InvalidSortField { .. } => "The specified sort is invalid.",
            JsonApiError::InvalidInclude { .. } => "The specified include is invalid.",
            JsonApiError::InvalidPageSize { .. } | JsonApiError::InvalidPageNumber { .. } => {
                "The specified paging is invalid."
            }
            JsonApiError::ResourceNotFound { .. } => "The requested resource does not exist.",
            JsonApiError::RelationshipNotFound { .. } => {
                "The requested relationship does not exist."
            }
            JsonApiError::ResourcesInRelationshipsNotFound(_) => {
                "A related resource does not exist."
            }
            JsonApiError::ResourceAlreadyExists { .. } => {
                "Another resource with the specified ID already exists."
            }
            JsonApiError::ToManyRelationshipRequired { .. } => {
                "Only to-many relationships can be updated through this endpoint."
            }
            JsonApiError::InvalidRequestBody { .. } => "Failed to deserialize request body.",
            JsonApiError::DataStoreUpdate { .. } => {
                "Failed to persist changes in the underlying data store."
            }
            JsonApiError::Cancelled => "The request was cancelled.",
            JsonApiError::HookContractViolation { .. } | JsonApiError::Internal(_) => {
                "An unhandled error occurred while processing this request."
            }
        }
    }

    /// Query string parameter that caused the error, if any.
    pub fn source_parameter(&self) -> Option<String> {
        match self {
            JsonApiError::UnknownQueryParameter { parameter }
            | JsonApiError::InvalidQueryParameter { parameter, .. }
            | JsonApiError::InvalidFilterOperator { parameter, .. } => Some(parameter.clone()),
            JsonApiError::InvalidSortField { .. } => Some("sort".to_string()),
            JsonApiError::InvalidInclude { .. } => Some("include".to_string()),
            JsonApiError::InvalidPageSize { .. } => Some("page[size]".to_string()),
            JsonApiError::InvalidPageNumber { .. } => Some("page[number]".to_string()),
            _ => None,
        }
    }

    /// Returns true for errors that indicate a defect rather than a client mistake.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            JsonApiError::HookContractViolation { .. } | JsonApiError::Internal(_)
        )
    }

    /// Converts the error into one or more itemized error objects.
    ///
    /// Internal errors never leak their detail.
    pub fn to_error_objects(&self) -> Vec<ErrorObject> {
        match self {
            JsonApiError::ResourcesInRelationshipsNotFound(missing) => missing
                .iter()
                .map(|item| ErrorObject {
                    status: self.status().to_string(),
                    title: self.title().to_string(),
                    detail: Some(format!(
                        "Related resource of type '{}' with ID '{}' in relationship '{}' does not exist.",
                        item.resource_type, item.id, item.relationship
                    )),
                    source: None,
                })
                .collect(),
            _ if self.is_internal() => vec![ErrorObject {
                status: self.status().to_string(),
                title: self.title().to_string(),
                detail: None,
                source: None,
            }],
            _ => vec![ErrorObject {
                status: self.status().to_string(),
                title: self.title().to_string(),
                detail: Some(self.to_string()),
                source: self.source_parameter().map(ErrorSource::parameter),
            }],
        }
    }
}

impl From<DataStoreError> for JsonApiError {
    fn from(e: DataStoreError) -> Self {
        match e {
            DataStoreError::Conflict(message) => JsonApiError::DataStoreUpdate { message },
            DataStoreError::Unavailable(message) => JsonApiError::Internal(message),
            DataStoreError::Cancelled => JsonApiError::Cancelled,
        }
    }
}

/// Where in the request the error originated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorSource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pointer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

impl ErrorSource {
    pub fn parameter(name: impl Into<String>) -> Self {
        Self {
            pointer: None,
            parameter: Some(name.into()),
        }
    }

    pub fn pointer(pointer: impl Into<String>) -> Self {
        Self {
            pointer: Some(pointer.into()),
            parameter: None,
        }
    }
}

/// One entry of a JSON:API error document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorObject {
    pub status: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ErrorSource>,
}

/// The top-level `errors` document handed to the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ErrorDocument {
    pub errors: Vec<ErrorObject>,
}

impl ErrorDocument {
    pub fn new(errors: Vec<ErrorObject>) -> Self {
        Self { errors }
    }

    /// Response status for the whole document.
    ///
    /// A single distinct status is used as-is. Mixed statuses collapse to the class
    /// of the highest one (404 and 422 become 400).
    pub fn status(&self) -> u16 {
        let mut statuses: Vec<u16> = self
            .errors
            .iter()
            .filter_map(|e| e.status.parse().ok())
            .collect();
        statuses.sort_unstable();
        statuses.dedup();
        match statuses.as_slice() {
            [] => 500,
            [single] => *single,
            [.., highest] => highest / 100 * 100,
        }
    }
}

impl From<&JsonApiError> for ErrorDocument {
    fn from(e: &JsonApiError) -> Self {
        Self::new(e.to_error_objects())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_number_error_carries_parameter_source() {
        let error = JsonApiError::InvalidPageNumber {
            detail: "Page number cannot be negative or zero.".into(),
        };
        let objects = error.to_error_objects();

        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].status, "400");
        assert_eq!(objects[0].title, "The specified paging is invalid.");
        assert_eq!(
            objects[0].detail.as_deref(),
            Some("Page number cannot be negative or zero.")
        );
        assert_eq!(
            objects[0].source,
            Some(ErrorSource::parameter("page[number]"))
        );
    }

    #[test]
    fn test_missing_related_resources_are_itemized() {
        let error = JsonApiError::ResourcesInRelationshipsNotFound(vec![
            MissingResourceInRelationship {
                relationship: "tags".into(),
                resource_type: "tags".into(),
                id: "6".into(),
            },
            MissingResourceInRelationship {
                relationship: "author".into(),
                resource_type: "people".into(),
                id: "9".into(),
            },
        ]);
        let objects = error.to_error_objects();

        assert_eq!(objects.len(), 2);
        assert!(objects.iter().all(|o| o.status == "404"));
        assert!(objects[0].detail.as_deref().unwrap().contains("'6'"));
        assert!(objects[1].detail.as_deref().unwrap().contains("'author'"));
    }

    #[test]
    fn test_internal_errors_hide_detail() {
        let error = JsonApiError::HookContractViolation {
            hook: "AfterRead".into(),
            pipeline: "GetSingle".into(),
            returned: 2,
        };
        let objects = error.to_error_objects();

        assert_eq!(objects[0].status, "500");
        assert!(objects[0].detail.is_none());
    }

    #[test]
    fn test_document_status_collapses_mixed_statuses() {
        let not_found = JsonApiError::ResourceNotFound {
            id: "1".into(),
            resource: "articles".into(),
        };
        let unprocessable = JsonApiError::DataStoreUpdate {
            message: "constraint".into(),
        };
        let mut errors = not_found.to_error_objects();
        errors.extend(unprocessable.to_error_objects());

        assert_eq!(ErrorDocument::new(errors).status(), 400);
        assert_eq!(ErrorDocument::from(&not_found).status(), 404);
    }

    #[test]
    fn test_error_object_serializes_without_empty_fields() {
        let error = JsonApiError::ResourceNotFound {
            id: "42".into(),
            resource: "articles".into(),
        };
        let json = serde_json::to_value(ErrorDocument::from(&error)).unwrap();

        assert_eq!(json["errors"][0]["status"], "404");
        assert!(json["errors"][0].get("source").is_none());
    }
}
