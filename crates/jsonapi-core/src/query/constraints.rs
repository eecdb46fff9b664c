use super::expression::{FilterExpression, IncludeChain, SortKey};
use std::collections::{BTreeSet, HashMap};

/// Typed result of parsing a request's query string.
///
/// Produced by [`QueryStringParser`](super::QueryStringParser) and consumed by the
/// [`QueryLayerComposer`](super::QueryLayerComposer).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryConstraints {
    /// Conjunction of every `filter[...]` parameter.
    pub filter: Option<FilterExpression>,
    pub sort: Vec<SortKey>,
    pub includes: Vec<IncludeChain>,
    /// Requested fields per resource type public name.
    pub sparse_fields: HashMap<String, BTreeSet<String>>,
    pub page_size: Option<i64>,
    pub page_number: Option<i64>,
    /// Parameters handed to resource definitions untouched.
    pub passthrough: Vec<(String, String)>,
}

impl QueryConstraints {
    pub fn is_empty(&self) -> bool {
        *self == QueryConstraints::default()
    }

    pub fn add_filter(&mut self, expression: FilterExpression) {
        self.filter = match self.filter.take() {
            Some(existing) => Some(existing.and(expression)),
            None => Some(expression),
        };
    }

    pub fn add_include(&mut self, chain: IncludeChain) {
        if !self.includes.contains(&chain) {
            self.includes.push(chain);
        }
    }

    pub fn passthrough_value(&self, name: &str) -> Option<&str> {
        self.passthrough
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}
