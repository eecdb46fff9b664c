//! # Query String Parsing
//!
//! Turns `(name, value)` query parameters into [`QueryConstraints`]. Each parameter
//! family (`filter`, `sort`, `include`, `fields`, `page`) has its own
//! [`QueryParameterParser`]; [`QueryStringParser`] dispatches to them.
//!
//! Supported grammar:
//! - `filter[title]=eq:value`, `filter[author.firstName]=like:Jo`, `filter[id]=in:1,2,3`
//!   (no operator prefix means `eq`; filters on the same or different fields AND together)
//! - `sort=-publishedAt,title`
//! - `include=author,tags.articles`
//! - `fields[articles]=title,body`
//! - `page[size]=10&page[number]=2`

use super::constraints::QueryConstraints;
use super::expression::{
    invalid_parameter, FieldChain, FilterExpression, FilterOperator, FilterValue, IncludeChain,
    SortDirection, SortKey,
};
use crate::error::JsonApiError;
use crate::graph::{Relationship, ResourceGraph, ResourceType};
use crate::options::JsonApiOptions;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Shared state handed to every family parser.
pub struct ParseContext<'a> {
    pub graph: &'a ResourceGraph,
    pub resource: &'a Arc<ResourceType>,
    pub options: &'a JsonApiOptions,
}

/// A query parameter name split into family and bracketed argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterName<'a> {
    pub family: &'a str,
    pub argument: Option<&'a str>,
}

impl<'a> ParameterName<'a> {
    /// Splits `filter[title]` into `filter` and `title`. Malformed names fail.
    pub fn parse(name: &'a str) -> Result<Self, JsonApiError> {
        let Some(open) = name.find('[') else {
            if name.contains(']') {
                return Err(invalid_parameter(name, "Query parameter name is malformed."));
            }
            return Ok(Self {
                family: name,
                argument: None,
            });
        };
        let inner = &name[open + 1..];
        match inner.strip_suffix(']') {
            Some(argument) if !argument.is_empty() && !argument.contains(['[', ']']) => Ok(Self {
                family: &name[..open],
                argument: Some(argument),
            }),
            _ => Err(invalid_parameter(name, "Query parameter name is malformed.")),
        }
    }
}

/// Parser for one family of query parameters.
pub trait QueryParameterParser: Send + Sync {
    /// The family this parser handles (`filter`, `sort`, ...).
    fn family(&self) -> &'static str;

    fn parse(
        &self,
        context: &ParseContext<'_>,
        name: &ParameterName<'_>,
        raw_name: &str,
        value: &str,
        constraints: &mut QueryConstraints,
    ) -> Result<(), JsonApiError>;
}

/// Dispatches query parameters to the family parsers.
pub struct QueryStringParser {
    graph: Arc<ResourceGraph>,
    options: Arc<JsonApiOptions>,
    parsers: Vec<Box<dyn QueryParameterParser>>,
}

impl QueryStringParser {
    pub fn new(graph: Arc<ResourceGraph>, options: Arc<JsonApiOptions>) -> Self {
        Self {
            graph,
            options,
            parsers: vec![
                Box::new(FilterParser),
                Box::new(SortParser),
                Box::new(IncludeParser),
                Box::new(SparseFieldsParser),
                Box::new(PageParser),
            ],
        }
    }

    /// Parses all parameters of a request targeting `resource`.
    pub fn parse(
        &self,
        resource: &Arc<ResourceType>,
        parameters: &[(String, String)],
    ) -> Result<QueryConstraints, JsonApiError> {
        let context = ParseContext {
            graph: &self.graph,
            resource,
            options: &self.options,
        };
        let mut constraints = QueryConstraints::default();

        for (raw_name, value) in parameters {
            if self.options.is_passthrough(raw_name) {
                constraints.passthrough.push((raw_name.clone(), value.clone()));
                continue;
            }
            let name = ParameterName::parse(raw_name)?;
            match self.parsers.iter().find(|p| p.family() == name.family) {
                Some(parser) => parser.parse(&context, &name, raw_name, value, &mut constraints)?,
                None if self.options.allow_unknown_query_parameters => {
                    debug!(parameter = %raw_name, "Ignoring unknown query parameter");
                    constraints.passthrough.push((raw_name.clone(), value.clone()));
                }
                None => {
                    return Err(JsonApiError::UnknownQueryParameter {
                        parameter: raw_name.clone(),
                    })
                }
            }
        }
        Ok(constraints)
    }
}

/// Resolves a dotted field path (`author.firstName`) from `resource`.
///
/// On failure returns the offending segment and the type it was looked up on.
fn resolve_field_chain(
    graph: &ResourceGraph,
    resource: &Arc<ResourceType>,
    path: &str,
    allow_to_many: bool,
) -> Result<FieldChain, (String, String)> {
    let segments: Vec<&str> = path.split('.').collect();
    let (last, hops) = segments
        .split_last()
        .ok_or_else(|| (path.to_string(), resource.public_name.clone()))?;

    let mut current = Arc::clone(resource);
    let mut relationships = Vec::new();
    for segment in hops {
        let relationship = current
            .relationship(segment)
            .filter(|r| allow_to_many || !r.is_to_many())
            .cloned()
            .ok_or_else(|| (segment.to_string(), current.public_name.clone()))?;
        current = graph
            .target_of(&relationship)
            .cloned()
            .ok_or_else(|| (segment.to_string(), current.public_name.clone()))?;
        relationships.push(relationship);
    }
    let attribute = current
        .attribute(last)
        .cloned()
        .ok_or_else(|| (last.to_string(), current.public_name.clone()))?;
    Ok(FieldChain {
        relationships,
        attribute,
    })
}

/// Parses `filter[path]=op:value`.
pub struct FilterParser;

impl FilterParser {
    /// Splits an optional `op:` prefix off a filter value.
    ///
    /// A prefix is only taken as an operator when it consists of ASCII letters, so
    /// literals such as times (`12:30`) stay intact.
    pub fn split_operator(value: &str) -> Result<(FilterOperator, &str), String> {
        match value.split_once(':') {
            Some((prefix, rest))
                if !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_alphabetic()) =>
            {
                let operator = prefix.parse::<FilterOperator>()?;
                Ok((operator, rest))
            }
            _ => Ok((FilterOperator::Equals, value)),
        }
    }
}

impl QueryParameterParser for FilterParser {
    fn family(&self) -> &'static str {
        "filter"
    }

    fn parse(
        &self,
        context: &ParseContext<'_>,
        name: &ParameterName<'_>,
        raw_name: &str,
        value: &str,
        constraints: &mut QueryConstraints,
    ) -> Result<(), JsonApiError> {
        let path = name
            .argument
            .ok_or_else(|| invalid_parameter(raw_name, "Filter parameter requires a field name."))?;
        let field = resolve_field_chain(context.graph, context.resource, path, true).map_err(
            |(segment, resource)| {
                invalid_parameter(
                    raw_name,
                    format!("Field '{segment}' does not exist on resource type '{resource}'."),
                )
            },
        )?;
        if !field.attribute.capabilities.filterable {
            return Err(invalid_parameter(
                raw_name,
                format!("Filtering on attribute '{}' is not allowed.", field.attribute.public_name),
            ));
        }

        let (operator, literal) =
            FilterParser::split_operator(value).map_err(|operator| JsonApiError::InvalidFilterOperator {
                parameter: raw_name.to_string(),
                operator,
            })?;
        let value = if operator.takes_no_value() {
            FilterValue::None
        } else if operator.takes_list() {
            let items: Vec<String> = literal
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(String::from)
                .collect();
            if items.is_empty() {
                return Err(invalid_parameter(
                    raw_name,
                    format!("Operator '{operator}' requires at least one value."),
                ));
            }
            FilterValue::List(items)
        } else {
            FilterValue::Single(literal.to_string())
        };

        constraints.add_filter(FilterExpression::comparison(field, operator, value));
        Ok(())
    }
}

/// Parses `sort=a,-b`.
pub struct SortParser;

impl QueryParameterParser for SortParser {
    fn family(&self) -> &'static str {
        "sort"
    }

    fn parse(
        &self,
        context: &ParseContext<'_>,
        name: &ParameterName<'_>,
        raw_name: &str,
        value: &str,
        constraints: &mut QueryConstraints,
    ) -> Result<(), JsonApiError> {
        if name.argument.is_some() {
            return Err(invalid_parameter(raw_name, "Sort parameter does not take an argument."));
        }
        for item in value.split(',').map(str::trim) {
            let (direction, path) = match item.strip_prefix('-') {
                Some(path) => (SortDirection::Descending, path),
                None => (SortDirection::Ascending, item),
            };
            let field = resolve_field_chain(context.graph, context.resource, path, false).map_err(
                |(field, resource)| JsonApiError::InvalidSortField { field, resource },
            )?;
            if !field.attribute.capabilities.sortable {
                return Err(invalid_parameter(
                    raw_name,
                    format!("Sorting on attribute '{}' is not allowed.", field.attribute.public_name),
                ));
            }
            constraints.sort.push(SortKey { field, direction });
        }
        Ok(())
    }
}

/// Parses `include=a.b,c`.
pub struct IncludeParser;

impl IncludeParser {
    pub fn resolve_chain(
        graph: &ResourceGraph,
        resource: &Arc<ResourceType>,
        path: &str,
    ) -> Result<IncludeChain, JsonApiError> {
        let mut current = Arc::clone(resource);
        let mut relationships: Vec<Arc<Relationship>> = Vec::new();
        for segment in path.split('.') {
            let invalid = |detail: String| JsonApiError::InvalidInclude {
                segment: segment.to_string(),
                resource: current.public_name.clone(),
                detail,
            };
            let Some(relationship) = current.relationship(segment).cloned() else {
                return Err(invalid(format!(
                    "Relationship '{segment}' does not exist on resource type '{}'.",
                    current.public_name
                )));
            };
            if !relationship.can_include {
                return Err(invalid(format!(
                    "Including the relationship '{segment}' on '{}' is not allowed.",
                    current.public_name
                )));
            }
            let Some(target) = graph.target_of(&relationship).cloned() else {
                return Err(invalid(format!(
                    "Relationship '{segment}' targets an unregistered resource type."
                )));
            };
            relationships.push(relationship);
            current = target;
        }
        Ok(IncludeChain { relationships })
    }
}

impl QueryParameterParser for IncludeParser {
    fn family(&self) -> &'static str {
        "include"
    }

    fn parse(
        &self,
        context: &ParseContext<'_>,
        name: &ParameterName<'_>,
        raw_name: &str,
        value: &str,
        constraints: &mut QueryConstraints,
    ) -> Result<(), JsonApiError> {
        if name.argument.is_some() {
            return Err(invalid_parameter(raw_name, "Include parameter does not take an argument."));
        }
        for path in value.split(',').map(str::trim) {
            let chain = IncludeParser::resolve_chain(context.graph, context.resource, path)?;
            if let Some(max_depth) = context.options.maximum_include_depth {
                if chain.relationships.len() > max_depth {
                    let segment = chain
                        .relationships
                        .last()
                        .map(|r| r.public_name.clone())
                        .unwrap_or_default();
                    return Err(JsonApiError::InvalidInclude {
                        segment,
                        resource: context.resource.public_name.clone(),
                        detail: format!(
                            "Including '{path}' exceeds the maximum inclusion depth of {max_depth}."
                        ),
                    });
                }
            }
            constraints.add_include(chain);
        }
        Ok(())
    }
}

/// Parses `fields[type]=a,b`.
pub struct SparseFieldsParser;

impl QueryParameterParser for SparseFieldsParser {
    fn family(&self) -> &'static str {
        "fields"
    }

    fn parse(
        &self,
        context: &ParseContext<'_>,
        name: &ParameterName<'_>,
        raw_name: &str,
        value: &str,
        constraints: &mut QueryConstraints,
    ) -> Result<(), JsonApiError> {
        let type_name = name
            .argument
            .ok_or_else(|| invalid_parameter(raw_name, "Fields parameter requires a resource type."))?;
        let resource = context.graph.get_resource_type(type_name).ok_or_else(|| {
            invalid_parameter(raw_name, format!("Resource type '{type_name}' does not exist."))
        })?;

        let mut fields = BTreeSet::new();
        for field in value.split(',').map(str::trim).filter(|f| !f.is_empty()) {
            if resource.attribute(field).is_none() && resource.relationship(field).is_none() {
                return Err(invalid_parameter(
                    raw_name,
                    format!(
                        "Field '{field}' does not exist on resource type '{}'.",
                        resource.public_name
                    ),
                ));
            }
            fields.insert(field.to_string());
        }
        constraints
            .sparse_fields
            .entry(resource.public_name.clone())
            .or_default()
            .extend(fields);
        Ok(())
    }
}

/// Parses `page[size]` and `page[number]`.
pub struct PageParser;

impl QueryParameterParser for PageParser {
    fn family(&self) -> &'static str {
        "page"
    }

    fn parse(
        &self,
        context: &ParseContext<'_>,
        name: &ParameterName<'_>,
        raw_name: &str,
        value: &str,
        constraints: &mut QueryConstraints,
    ) -> Result<(), JsonApiError> {
        let number: i64 = value.trim().parse().map_err(|_| {
            invalid_parameter(raw_name, format!("Value '{value}' is not a valid number."))
        })?;

        match name.argument {
            Some("size") => {
                if number < 0 {
                    return Err(JsonApiError::InvalidPageSize {
                        detail: "Page size cannot be negative.".to_string(),
                    });
                }
                if let Some(max) = context.options.maximum_page_size {
                    if number > max {
                        return Err(JsonApiError::InvalidPageSize {
                            detail: format!("Page size cannot be higher than {max}."),
                        });
                    }
                }
                constraints.page_size = Some(number);
            }
            Some("number") => {
                if number <= 0 {
                    return Err(JsonApiError::InvalidPageNumber {
                        detail: "Page number cannot be negative or zero.".to_string(),
                    });
                }
                if let Some(max) = context.options.maximum_page_number {
                    if number > max {
                        return Err(JsonApiError::InvalidPageNumber {
                            detail: format!("Page number cannot be higher than {max}."),
                        });
                    }
                }
                constraints.page_number = Some(number);
            }
            _ => {
                return Err(invalid_parameter(
                    raw_name,
                    "Only 'page[size]' and 'page[number]' are supported.",
                ))
            }
        }
        Ok(())
    }
}
