//! Typed building blocks of a query: filter trees, sort keys, include chains and the
//! pagination window.

use crate::graph::{Attribute, Relationship, ResourceType};
use crate::error::JsonApiError;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Comparison operator of a filter predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    Equals,
    NotEquals,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
    Like,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Equals => "eq",
            FilterOperator::NotEquals => "ne",
            FilterOperator::LessThan => "lt",
            FilterOperator::LessOrEqual => "le",
            FilterOperator::GreaterThan => "gt",
            FilterOperator::GreaterOrEqual => "ge",
            FilterOperator::Like => "like",
            FilterOperator::In => "in",
            FilterOperator::NotIn => "nin",
            FilterOperator::IsNull => "isnull",
            FilterOperator::IsNotNull => "isnotnull",
        }
    }

    /// Operators that compare against a list of literals.
    pub fn takes_list(&self) -> bool {
        matches!(self, FilterOperator::In | FilterOperator::NotIn)
    }

    /// Operators that take no literal at all.
    pub fn takes_no_value(&self) -> bool {
        matches!(self, FilterOperator::IsNull | FilterOperator::IsNotNull)
    }
}

impl FromStr for FilterOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "eq" => Ok(FilterOperator::Equals),
            "ne" => Ok(FilterOperator::NotEquals),
            "lt" => Ok(FilterOperator::LessThan),
            "le" => Ok(FilterOperator::LessOrEqual),
            "gt" => Ok(FilterOperator::GreaterThan),
            "ge" => Ok(FilterOperator::GreaterOrEqual),
            "like" => Ok(FilterOperator::Like),
            "in" => Ok(FilterOperator::In),
            "nin" => Ok(FilterOperator::NotIn),
            "isnull" => Ok(FilterOperator::IsNull),
            "isnotnull" => Ok(FilterOperator::IsNotNull),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Path from the queried type to an attribute, optionally through to-one or to-many
/// relationships (`author.firstName`).
#[derive(Debug, Clone)]
pub struct FieldChain {
    pub relationships: Vec<Arc<Relationship>>,
    pub attribute: Arc<Attribute>,
}

impl FieldChain {
    pub fn attribute(attribute: Arc<Attribute>) -> Self {
        Self {
            relationships: Vec::new(),
            attribute,
        }
    }

    /// Chain to a top-level attribute of `resource`, by public name.
    pub fn on(resource: &ResourceType, attribute: &str) -> Option<Self> {
        resource.attribute(attribute).cloned().map(FieldChain::attribute)
    }

    /// Dotted public path, e.g. `author.firstName`.
    pub fn public_path(&self) -> String {
        self.relationships
            .iter()
            .map(|r| r.public_name.as_str())
            .chain(std::iter::once(self.attribute.public_name.as_str()))
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl PartialEq for FieldChain {
    fn eq(&self, other: &Self) -> bool {
        self.relationships.len() == other.relationships.len()
            && self
                .relationships
                .iter()
                .zip(&other.relationships)
                .all(|(a, b)| Arc::ptr_eq(a, b))
            && Arc::ptr_eq(&self.attribute, &other.attribute)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    None,
    Single(String),
    List(Vec<String>),
}

/// A single `field op value` predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonExpression {
    pub field: FieldChain,
    pub operator: FilterOperator,
    pub value: FilterValue,
}

/// Boolean filter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpression {
    Comparison(ComparisonExpression),
    And(Vec<FilterExpression>),
    Or(Vec<FilterExpression>),
}

impl FilterExpression {
    pub fn comparison(field: FieldChain, operator: FilterOperator, value: FilterValue) -> Self {
        FilterExpression::Comparison(ComparisonExpression {
            field,
            operator,
            value,
        })
    }

    /// Conjunction of two expressions, flattening nested ANDs.
    pub fn and(self, other: FilterExpression) -> FilterExpression {
        let mut terms = Vec::new();
        for expression in [self, other] {
            match expression {
                FilterExpression::And(inner) => terms.extend(inner),
                other => terms.push(other),
            }
        }
        FilterExpression::And(terms)
    }

    /// Conjunction of any number of expressions; `None` when there are none.
    pub fn and_all(expressions: impl IntoIterator<Item = FilterExpression>) -> Option<FilterExpression> {
        expressions
            .into_iter()
            .reduce(|combined, next| combined.and(next))
    }

    /// Every comparison in the tree, depth-first.
    pub fn comparisons(&self) -> Vec<&ComparisonExpression> {
        match self {
            FilterExpression::Comparison(c) => vec![c],
            FilterExpression::And(terms) | FilterExpression::Or(terms) => {
                terms.iter().flat_map(|t| t.comparisons()).collect()
            }
        }
    }
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterExpression::Comparison(c) => {
                write!(f, "{}({}", c.operator, c.field.public_path())?;
                match &c.value {
                    FilterValue::None => {}
                    FilterValue::Single(v) => write!(f, ",'{v}'")?,
                    FilterValue::List(values) => {
                        for v in values {
                            write!(f, ",'{v}'")?;
                        }
                    }
                }
                f.write_str(")")
            }
            FilterExpression::And(terms) | FilterExpression::Or(terms) => {
                let name = if matches!(self, FilterExpression::And(_)) { "and" } else { "or" };
                write!(f, "{name}(")?;
                for (i, term) in terms.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{term}")?;
                }
                f.write_str(")")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub field: FieldChain,
    pub direction: SortDirection,
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.direction == SortDirection::Descending {
            f.write_str("-")?;
        }
        f.write_str(&self.field.public_path())
    }
}

/// A dotted chain of relationships to include (`author.articles`).
#[derive(Debug, Clone)]
pub struct IncludeChain {
    pub relationships: Vec<Arc<Relationship>>,
}

impl IncludeChain {
    pub fn public_path(&self) -> String {
        self.relationships
            .iter()
            .map(|r| r.public_name.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn first(&self) -> Option<&Arc<Relationship>> {
        self.relationships.first()
    }

    /// The chain without its first segment.
    pub fn tail(&self) -> Option<IncludeChain> {
        (self.relationships.len() > 1).then(|| IncludeChain {
            relationships: self.relationships[1..].to_vec(),
        })
    }
}

impl PartialEq for IncludeChain {
    fn eq(&self, other: &Self) -> bool {
        self.public_path() == other.public_path()
    }
}

/// Page size and number of a paginated query. A size of zero disables paging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationWindow {
    size: usize,
    number: usize,
}

impl PaginationWindow {
    /// Non-positive sizes disable paging; page numbers below one become one.
    pub fn new(size: i64, number: i64) -> Self {
        Self {
            size: usize::try_from(size).unwrap_or(0),
            number: usize::try_from(number).unwrap_or(1).max(1),
        }
    }

    pub fn unpaginated() -> Self {
        Self { size: 0, number: 1 }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn number(&self) -> usize {
        self.number
    }

    pub fn is_paginated(&self) -> bool {
        self.size > 0
    }

    /// Number of entries to skip.
    pub fn offset(&self) -> usize {
        if self.is_paginated() {
            (self.number - 1) * self.size
        } else {
            0
        }
    }
}

impl Default for PaginationWindow {
    fn default() -> Self {
        Self::unpaginated()
    }
}

pub(crate) fn invalid_parameter(parameter: &str, detail: impl Into<String>) -> JsonApiError {
    JsonApiError::InvalidQueryParameter {
        parameter: parameter.to_string(),
        detail: detail.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_names_round_trip() {
        for name in ["eq", "ne", "lt", "le", "gt", "ge", "like", "in", "nin", "isnull", "isnotnull"] {
            let operator: FilterOperator = name.parse().unwrap();
            assert_eq!(operator.as_str(), name);
        }
        assert_eq!("EQ".parse::<FilterOperator>(), Ok(FilterOperator::Equals));
        assert_eq!("between".parse::<FilterOperator>(), Err("between".to_string()));
    }

    #[test]
    fn test_pagination_window_normalizes() {
        let window = PaginationWindow::new(0, 3);
        assert!(!window.is_paginated());
        assert_eq!(window.offset(), 0);

        let window = PaginationWindow::new(10, 0);
        assert_eq!(window.number(), 1);
        assert_eq!(window.offset(), 0);

        let window = PaginationWindow::new(-5, -2);
        assert!(!window.is_paginated());
        assert_eq!(window.number(), 1);

        let window = PaginationWindow::new(10, 3);
        assert_eq!(window.offset(), 20);
    }
}
