//! # Query Pipeline
//!
//! Request query strings flow through two stages:
//!
//! 1. [`QueryStringParser`] validates parameters against the resource graph and
//!    produces [`QueryConstraints`].
//! 2. [`QueryLayerComposer`] merges the constraints with [`ResourceDefinition`]
//!    defaults into a [`QueryLayer`], the plan handed to the repository.

mod composer;
mod constraints;
mod definition;
mod expression;
mod layer;
mod parser;

pub use composer::{QueryLayerComposer, TopFieldSelection};
pub use constraints::QueryConstraints;
pub use definition::{ResourceDefinition, ResourceDefinitions};
pub use expression::{
    ComparisonExpression, FieldChain, FilterExpression, FilterOperator, FilterValue, IncludeChain,
    PaginationWindow, SortDirection, SortKey,
};
pub use layer::{QueryLayer, SecondaryLayer};
pub use parser::{
    FilterParser, IncludeParser, PageParser, ParameterName, ParseContext, QueryParameterParser,
    QueryStringParser, SortParser, SparseFieldsParser,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Identifiable, Shared};
    use crate::error::JsonApiError;
    use crate::graph::{AttributeCapabilities, ResourceGraph, ResourceGraphBuilder, ResourceType};
    use crate::options::{JsonApiOptions, NamingConvention};
    use std::sync::Arc;

    #[derive(Clone, Debug, Default)]
    struct Person {
        id: i64,
        first_name: String,
        secret: String,
        articles: Vec<Shared<Article>>,
    }

    #[derive(Clone, Debug, Default)]
    struct Article {
        id: i64,
        title: String,
        is_deleted: bool,
        author: Option<Shared<Person>>,
    }

    impl Identifiable for Person {
        type Id = i64;
        fn id(&self) -> i64 {
            self.id
        }
        fn set_id(&mut self, id: i64) {
            self.id = id;
        }
    }

    impl Identifiable for Article {
        type Id = i64;
        fn id(&self) -> i64 {
            self.id
        }
        fn set_id(&mut self, id: i64) {
            self.id = id;
        }
    }

    fn graph() -> Arc<ResourceGraph> {
        let mut builder = ResourceGraphBuilder::new(NamingConvention::CamelCase);
        builder
            .add::<Person>("people", |r| {
                r.attribute("first_name", |p| p.first_name.clone(), |p, v| p.first_name = v)
                    .attribute("secret", |p| p.secret.clone(), |p, v| p.secret = v)
                    .capabilities(
                        "secret",
                        AttributeCapabilities {
                            filterable: false,
                            sortable: false,
                        },
                    )
                    .has_many::<Article>("articles", |p| p.articles.clone(), |p, v| p.articles = v)
                    .not_includable("articles")
            })
            .unwrap()
            .add::<Article>("articles", |r| {
                r.attribute("title", |a| a.title.clone(), |a, v| a.title = v)
                    .attribute("is_deleted", |a| a.is_deleted, |a, v| a.is_deleted = v)
                    .has_one::<Person>("author", |a| a.author.clone(), |a, v| a.author = v)
            })
            .unwrap();
        Arc::new(builder.build().unwrap())
    }

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn parse(options: JsonApiOptions, pairs: &[(&str, &str)]) -> Result<QueryConstraints, JsonApiError> {
        let graph = graph();
        let articles = Arc::clone(graph.get_resource_type("articles").unwrap());
        QueryStringParser::new(graph, Arc::new(options)).parse(&articles, &params(pairs))
    }

    #[test]
    fn test_filter_operators_are_parsed() {
        let constraints = parse(
            JsonApiOptions::default(),
            &[
                ("filter[title]", "like:Rust"),
                ("filter[author.firstName]", "John"),
                ("filter[id]", "in:1,2,3"),
                ("filter[title]", "isnotnull:"),
            ],
        )
        .unwrap();

        let filter = constraints.filter.unwrap();
        assert_eq!(
            filter.to_string(),
            "and(like(title,'Rust'),eq(author.firstName,'John'),in(id,'1','2','3'),isnotnull(title))"
        );
    }

    #[test]
    fn test_unknown_filter_operator_is_rejected() {
        let error = parse(JsonApiOptions::default(), &[("filter[title]", "between:a")]).unwrap_err();

        assert_eq!(error.status(), 400);
        assert!(matches!(
            error,
            JsonApiError::InvalidFilterOperator { ref operator, .. } if operator == "between"
        ));
    }

    #[test]
    fn test_filter_on_unknown_or_restricted_field_fails() {
        let error = parse(JsonApiOptions::default(), &[("filter[nope]", "x")]).unwrap_err();
        assert!(matches!(error, JsonApiError::InvalidQueryParameter { .. }));

        let error = parse(JsonApiOptions::default(), &[("filter[author.secret]", "x")]).unwrap_err();
        assert!(error.to_string().contains("not allowed"));
    }

    #[test]
    fn test_sort_parsing_and_unknown_field() {
        let constraints = parse(JsonApiOptions::default(), &[("sort", "-title,author.firstName")]).unwrap();
        let rendered: Vec<String> = constraints.sort.iter().map(|k| k.to_string()).collect();
        assert_eq!(rendered, vec!["-title", "author.firstName"]);

        let error = parse(JsonApiOptions::default(), &[("sort", "bogus")]).unwrap_err();
        assert!(matches!(
            error,
            JsonApiError::InvalidSortField { ref field, ref resource } if field == "bogus" && resource == "articles"
        ));
    }

    #[test]
    fn test_include_errors_name_segment_and_resource() {
        let error = parse(JsonApiOptions::default(), &[("include", "author.books")]).unwrap_err();
        assert!(matches!(
            error,
            JsonApiError::InvalidInclude { ref segment, ref resource, .. } if segment == "books" && resource == "people"
        ));

        let error = parse(JsonApiOptions::default(), &[("include", "author.articles")]).unwrap_err();
        assert!(error.to_string().contains("not allowed"));

        let options = JsonApiOptions {
            maximum_include_depth: Some(0),
            ..JsonApiOptions::default()
        };
        assert!(parse(options, &[("include", "author")]).is_err());
    }

    #[test]
    fn test_page_validation_asymmetry() {
        let constraints = parse(JsonApiOptions::default(), &[("page[size]", "0")]).unwrap();
        assert_eq!(constraints.page_size, Some(0));

        let error = parse(JsonApiOptions::default(), &[("page[size]", "-1")]).unwrap_err();
        assert_eq!(error.to_string(), "Page size cannot be negative.");

        let error = parse(JsonApiOptions::default(), &[("page[number]", "0")]).unwrap_err();
        assert_eq!(error.to_string(), "Page number cannot be negative or zero.");

        let error = parse(JsonApiOptions::default(), &[("page[number]", "abc")]).unwrap_err();
        assert!(matches!(error, JsonApiError::InvalidQueryParameter { .. }));

        let options = JsonApiOptions {
            maximum_page_size: Some(5),
            ..JsonApiOptions::default()
        };
        let error = parse(options, &[("page[size]", "6")]).unwrap_err();
        assert_eq!(error.to_string(), "Page size cannot be higher than 5.");
    }

    #[test]
    fn test_unknown_parameters_and_passthrough() {
        let error = parse(JsonApiOptions::default(), &[("foo", "bar")]).unwrap_err();
        assert!(matches!(error, JsonApiError::UnknownQueryParameter { .. }));

        let options = JsonApiOptions {
            passthrough_query_parameters: vec!["includeDeleted".into()],
            ..JsonApiOptions::default()
        };
        let constraints = parse(options, &[("includeDeleted", "true")]).unwrap();
        assert_eq!(constraints.passthrough_value("includeDeleted"), Some("true"));

        let options = JsonApiOptions {
            allow_unknown_query_parameters: true,
            ..JsonApiOptions::default()
        };
        assert!(parse(options, &[("foo", "bar")]).is_ok());
    }

    #[test]
    fn test_sparse_fields_are_validated_per_type() {
        let constraints = parse(
            JsonApiOptions::default(),
            &[("fields[articles]", "title"), ("fields[people]", "firstName")],
        )
        .unwrap();
        assert!(constraints.sparse_fields["articles"].contains("title"));

        let error = parse(JsonApiOptions::default(), &[("fields[articles]", "nope")]).unwrap_err();
        assert!(matches!(error, JsonApiError::InvalidQueryParameter { .. }));
        let error = parse(JsonApiOptions::default(), &[("fields[nope]", "title")]).unwrap_err();
        assert!(matches!(error, JsonApiError::InvalidQueryParameter { .. }));
    }

    struct HideDeleted;

    impl ResourceDefinition for HideDeleted {
        fn default_filter(
            &self,
            resource: &ResourceType,
            constraints: &QueryConstraints,
        ) -> Option<FilterExpression> {
            if constraints.passthrough_value("includeDeleted") == Some("true") {
                return None;
            }
            Some(FilterExpression::comparison(
                FieldChain::on(resource, "isDeleted")?,
                FilterOperator::Equals,
                FilterValue::Single("false".into()),
            ))
        }

        fn default_sort(&self, resource: &ResourceType) -> Vec<SortKey> {
            FieldChain::on(resource, "title")
                .map(|field| SortKey {
                    field,
                    direction: SortDirection::Descending,
                })
                .into_iter()
                .collect()
        }
    }

    #[test]
    fn test_composer_keeps_mandated_filter_and_applies_defaults() {
        let graph = graph();
        let articles = Arc::clone(graph.get_resource_type("articles").unwrap());
        let mut definitions = ResourceDefinitions::new();
        definitions.register::<Article>(HideDeleted);
        let composer = QueryLayerComposer::new(
            Arc::clone(&graph),
            Arc::new(JsonApiOptions::default()),
            Arc::new(definitions),
        );

        let constraints = QueryStringParser::new(Arc::clone(&graph), Arc::new(JsonApiOptions::default()))
            .parse(&articles, &params(&[("filter[title]", "Rust")]))
            .unwrap();
        let layer = composer.compose(&articles, &constraints).unwrap();

        assert_eq!(
            layer.filter.as_ref().unwrap().to_string(),
            "and(eq(isDeleted,'false'),eq(title,'Rust'))"
        );
        assert_eq!(layer.sort[0].to_string(), "-title");
        assert_eq!(layer.pagination.size(), 10);
    }

    #[test]
    fn test_composer_adds_id_sort_when_paginated() {
        let graph = graph();
        let people = Arc::clone(graph.get_resource_type("people").unwrap());
        let composer = QueryLayerComposer::new(
            Arc::clone(&graph),
            Arc::new(JsonApiOptions::default()),
            Arc::new(ResourceDefinitions::new()),
        );

        let layer = composer.compose(&people, &QueryConstraints::default()).unwrap();
        assert_eq!(layer.sort.len(), 1);
        assert_eq!(layer.sort[0].to_string(), "id");

        let unpaginated = QueryConstraints {
            page_size: Some(0),
            ..QueryConstraints::default()
        };
        let layer = composer.compose(&people, &unpaginated).unwrap();
        assert!(layer.sort.is_empty());
        assert!(!layer.pagination.is_paginated());
    }

    #[test]
    fn test_compose_for_get_by_id_selection() {
        let graph = graph();
        let people = Arc::clone(graph.get_resource_type("people").unwrap());
        let composer = QueryLayerComposer::new(
            Arc::clone(&graph),
            Arc::new(JsonApiOptions::default()),
            Arc::new(ResourceDefinitions::new()),
        );

        let layer = composer
            .compose_for_get_by_id("7", &people, TopFieldSelection::OnlyIdAttribute, &QueryConstraints::default())
            .unwrap();
        assert_eq!(layer.filter.as_ref().unwrap().to_string(), "eq(id,'7')");
        assert!(layer.is_selected("id"));
        assert!(!layer.is_selected("firstName"));
        assert!(!layer.pagination.is_paginated());

        let layer = composer.compose_for_update("7", &people).unwrap();
        assert_eq!(layer.includes.len(), 1);
    }
}
