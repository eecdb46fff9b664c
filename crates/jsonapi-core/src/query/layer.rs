use super::expression::{FilterExpression, IncludeChain, PaginationWindow, SortKey};
use crate::graph::{Relationship, ResourceType};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Data-layer query plan for one request.
#[derive(Debug, Clone)]
pub struct QueryLayer {
    pub resource: Arc<ResourceType>,
    pub filter: Option<FilterExpression>,
    pub sort: Vec<SortKey>,
    pub pagination: PaginationWindow,
    /// Selected public field names; `None` selects everything.
    pub projection: Option<BTreeSet<String>>,
    pub includes: Vec<IncludeChain>,
    /// Sparse fieldsets for included types, by public name.
    pub included_projections: HashMap<String, BTreeSet<String>>,
    /// Layer for a secondary endpoint, loaded through `relationship`.
    pub secondary: Option<SecondaryLayer>,
}

#[derive(Debug, Clone)]
pub struct SecondaryLayer {
    pub relationship: Arc<Relationship>,
    pub layer: Box<QueryLayer>,
}

impl QueryLayer {
    /// Unfiltered, unpaginated layer selecting all fields.
    pub fn new(resource: Arc<ResourceType>) -> Self {
        Self {
            resource,
            filter: None,
            sort: Vec::new(),
            pagination: PaginationWindow::unpaginated(),
            projection: None,
            includes: Vec::new(),
            included_projections: HashMap::new(),
            secondary: None,
        }
    }

    pub fn is_selected(&self, field: &str) -> bool {
        self.projection
            .as_ref()
            .map_or(true, |fields| fields.contains(field))
    }

    /// Whether an include chain starts with `relationship`.
    pub fn includes_relationship(&self, relationship: &Relationship) -> bool {
        self.includes.iter().any(|chain| {
            chain
                .first()
                .is_some_and(|first| {
                    first.left_model == relationship.left_model
                        && first.property_name == relationship.property_name
                })
        })
    }
}
