//! # JSON:API Core
//!
//! This crate provides the server-side core of a JSON:API framework: it exposes plain
//! Rust models as resources with compound documents, sparse fieldsets, filtering,
//! sorting, pagination, write operations on resources and relationships, and a
//! resource-hooks lifecycle for cross-cutting business logic.
//!
//! The web transport and the wire codec are not part of this crate. Callers hand in
//! decoded query parameters and typed models, and get typed models and
//! [`ErrorDocument`]s back.
//!
//! ## Architecture Overview
//!
//! Requests flow leaf to root through five layers:
//!
//! 1. **Resource Graph** ([`ResourceGraph`]) - immutable registry of resource types,
//!    attributes and relationships, including inverse resolution and many-to-many
//!    relationships through join entities.
//! 2. **Query Pipeline** ([`QueryStringParser`], [`QueryLayerComposer`]) - turns
//!    `filter`, `sort`, `include`, `fields` and `page` parameters into a
//!    [`QueryLayer`], merged with [`ResourceDefinition`] defaults.
//! 3. **Hook Executor** ([`HookExecutor`]) - breadth-first traversal that fires
//!    [`ResourceHooks`] across the relationship tree of the affected entities.
//! 4. **Resource Service** ([`ResourceService`]) - per-type orchestrator: hooks,
//!    repository calls, existence assertions, change tracking.
//! 5. **Links** ([`LinkBuilder`]) - top-level, resource and relationship links plus
//!    paging metadata.
//!
//! Persistence lives behind the [`Repository`] trait. [`mock::InMemoryRepository`]
//! implements it in memory for tests and demos.
//!
//! ## Entities
//!
//! Models implement [`Identifiable`]. Loaded entities are held behind
//! [`Shared<T>`] handles because relationship graphs can be cyclic and hooks rewrite
//! relationships of entities they did not receive directly.
//!
//! ## Example
//!
//! ```rust
//! use jsonapi_core::mock::InMemoryRepository;
//! use jsonapi_core::{
//!     HookRegistry, Identifiable, JsonApiContext, JsonApiOptions, NamingConvention,
//!     RequestContext, ResourceDefinitions, ResourceGraphBuilder,
//! };
//! use std::sync::Arc;
//!
//! #[derive(Clone, Debug, Default)]
//! struct Article {
//!     id: i64,
//!     title: String,
//! }
//!
//! impl Identifiable for Article {
//!     type Id = i64;
//!     fn id(&self) -> i64 { self.id }
//!     fn set_id(&mut self, id: i64) { self.id = id; }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut builder = ResourceGraphBuilder::new(NamingConvention::CamelCase);
//!     builder
//!         .add::<Article>("articles", |r| r.attribute("title", |a| a.title.clone(), |a, v| a.title = v))
//!         .unwrap();
//!     let graph = Arc::new(builder.build().unwrap());
//!
//!     let repository = Arc::new(InMemoryRepository::new(Arc::clone(&graph)));
//!     repository.seed(Article { id: 1, title: "Hello".into() }).unwrap();
//!
//!     let context = JsonApiContext::new(
//!         graph,
//!         JsonApiOptions::default(),
//!         ResourceDefinitions::new(),
//!         HookRegistry::new(),
//!         repository,
//!     );
//!     let articles = context.service::<Article>().unwrap();
//!
//!     let mut request = RequestContext::new().with_query(&[("filter[title]", "Hello")]);
//!     let found = articles.get_all(&mut request).await.unwrap();
//!     assert_eq!(found.len(), 1);
//!     assert_eq!(request.pagination.total_resource_count, Some(1));
//! }
//! ```
//!
//! ## Errors
//!
//! Every failure a client can cause is a [`JsonApiError`] carrying an HTTP status, a
//! title, a detail and an optional source parameter. Storage failures arrive as a
//! single generic [`DataStoreError`] and are sharpened by the service into precise
//! errors through follow-up existence queries.

pub mod change_tracker;
pub mod context;
pub mod entity;
pub mod error;
pub mod graph;
pub mod hooks;
pub mod links;
pub mod mock;
pub mod options;
pub mod query;
pub mod repository;
pub mod request;
pub mod service;
pub mod tracing;

// Re-export core types for convenience
pub use context::JsonApiContext;
pub use entity::{downcast, erase, shared, AnyResource, EntityKey, EntityRef, Identifiable, ResourceId, Shared};
pub use error::{
    DataStoreError, ErrorDocument, ErrorObject, ErrorSource, GraphError, JsonApiError,
    MissingResourceInRelationship,
};
pub use graph::{
    Attribute, AttributeCapabilities, Relationship, RelationshipKind, RelationshipValue, ResourceGraph,
    ResourceGraphBuilder, ResourceType, ResourceTypeBuilder,
};
pub use hooks::{
    EntityDiff, HookContext, HookExecutor, HookRegistry, ResourceHook, ResourceHooks, ResourcePipeline,
};
pub use links::LinkBuilder;
pub use options::{JsonApiOptions, NamingConvention};
pub use query::{
    FilterExpression, IncludeChain, QueryConstraints, QueryLayer, QueryLayerComposer,
    QueryStringParser, ResourceDefinition, ResourceDefinitions, SortKey,
};
pub use repository::{RelationshipIds, Repository};
pub use request::{PaginationContext, RequestContext, TargetedFields};
pub use service::{ResourceService, SecondaryResult};
