//! Wiring of the shared, immutable pieces every request uses.

use crate::entity::Identifiable;
use crate::error::GraphError;
use crate::graph::ResourceGraph;
use crate::hooks::{HookExecutor, HookRegistry};
use crate::links::LinkBuilder;
use crate::options::JsonApiOptions;
use crate::query::{QueryLayerComposer, QueryStringParser, ResourceDefinitions};
use crate::repository::Repository;
use crate::service::ResourceService;
use std::sync::Arc;
use tracing::info;

/// Owns the resource graph, options, definitions, hooks and the repository, and
/// hands out per-type [`ResourceService`]s. Cheap to clone.
#[derive(Clone)]
pub struct JsonApiContext {
    graph: Arc<ResourceGraph>,
    options: Arc<JsonApiOptions>,
    parser: Arc<QueryStringParser>,
    composer: Arc<QueryLayerComposer>,
    hooks: Arc<HookExecutor>,
    repository: Arc<dyn Repository>,
}

impl JsonApiContext {
    pub fn new(
        graph: Arc<ResourceGraph>,
        options: JsonApiOptions,
        definitions: ResourceDefinitions,
        hooks: HookRegistry,
        repository: Arc<dyn Repository>,
    ) -> Self {
        let options = Arc::new(options);
        let parser = QueryStringParser::new(Arc::clone(&graph), Arc::clone(&options));
        let composer = QueryLayerComposer::new(Arc::clone(&graph), Arc::clone(&options), Arc::new(definitions));
        let hooks = HookExecutor::new(Arc::clone(&graph), Arc::new(hooks));
        info!(
            resource_types = graph.resource_types().len(),
            hooks = !hooks.is_empty(),
            "JSON:API context ready"
        );
        Self {
            graph,
            options,
            parser: Arc::new(parser),
            composer: Arc::new(composer),
            hooks: Arc::new(hooks),
            repository,
        }
    }

    pub fn graph(&self) -> &Arc<ResourceGraph> {
        &self.graph
    }

    pub fn options(&self) -> &Arc<JsonApiOptions> {
        &self.options
    }

    pub fn link_builder(&self) -> LinkBuilder {
        LinkBuilder::new(Arc::clone(&self.options))
    }

    /// Service for model `T`; fails when `T` is not in the graph.
    pub fn service<T: Identifiable + Default>(&self) -> Result<ResourceService<T>, GraphError> {
        let resource = Arc::clone(self.graph.resource_type_of::<T>()?);
        Ok(ResourceService::new(
            Arc::clone(&self.graph),
            resource,
            Arc::clone(&self.options),
            Arc::clone(&self.parser),
            Arc::clone(&self.composer),
            Arc::clone(&self.hooks),
            Arc::clone(&self.repository),
        ))
    }
}
