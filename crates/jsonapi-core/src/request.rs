//! Per-request state: the raw query, the fields a write targets, pagination
//! counters and the cancellation token.

use crate::error::{DataStoreError, JsonApiError};
use crate::graph::{Attribute, Relationship, ResourceType};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Attributes and relationships a write request assigns.
#[derive(Debug, Clone, Default)]
pub struct TargetedFields {
    pub attributes: Vec<Arc<Attribute>>,
    pub relationships: Vec<Arc<Relationship>>,
}

impl TargetedFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Targets the named attributes and relationships of `resource`. Unknown names
    /// are ignored.
    pub fn of(resource: &ResourceType, names: &[&str]) -> Self {
        let mut targeted = Self::new();
        for name in names {
            if let Some(attribute) = resource.attribute(name) {
                targeted.attributes.push(Arc::clone(attribute));
            } else if let Some(relationship) = resource.relationship(name) {
                targeted.relationships.push(Arc::clone(relationship));
            }
        }
        targeted
    }

    /// Targets every attribute and relationship of `resource`.
    pub fn all(resource: &ResourceType) -> Self {
        Self {
            attributes: resource.attributes().to_vec(),
            relationships: resource.relationships().to_vec(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.relationships.is_empty()
    }

    pub fn targets_attribute(&self, public_name: &str) -> bool {
        self.attributes.iter().any(|a| a.public_name == public_name)
    }
}

/// Counters written by the collection query and read by the link builder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaginationContext {
    pub total_resource_count: Option<usize>,
    pub is_page_full: bool,
    pub page_size: usize,
    pub page_number: usize,
}

impl PaginationContext {
    pub fn total_pages(&self) -> Option<usize> {
        let total = self.total_resource_count?;
        if self.page_size == 0 {
            return Some(usize::from(total > 0));
        }
        Some(total.div_ceil(self.page_size))
    }
}

/// State of one request. Passed explicitly through every service call.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Decoded query string parameters.
    pub query: Vec<(String, String)>,
    pub targeted: TargetedFields,
    pub pagination: PaginationContext,
    pub cancellation: CancellationToken,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, pairs: &[(&str, &str)]) -> Self {
        self.query = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self
    }

    pub fn with_targeted(mut self, targeted: TargetedFields) -> Self {
        self.targeted = targeted;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn ensure_active(&self) -> Result<(), JsonApiError> {
        if self.cancellation.is_cancelled() {
            return Err(JsonApiError::Cancelled);
        }
        Ok(())
    }

    /// Races a storage call against cancellation.
    pub async fn guard<T>(
        &self,
        call: impl Future<Output = Result<T, DataStoreError>>,
    ) -> Result<T, JsonApiError> {
        self.ensure_active()?;
        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(JsonApiError::Cancelled),
            result = call => result.map_err(JsonApiError::from),
        }
    }
}
