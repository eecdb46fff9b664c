//! # Hook Executor
//!
//! Fires resource hooks across the relationship tree of the entities an operation
//! touches. The root layer receives the operation's primary hook (`BeforeCreate`,
//! `AfterRead`, ...); deeper layers receive the matching relationship hook.
//!
//! # Architecture Note
//! Traversal is breadth-first: every hook of layer N completes before layer N+1 is
//! built, because a hook in layer N may detach entities that layer N+1 would
//! otherwise reach. Each entry point starts with a fresh [`VisitedSet`], so an
//! entity is processed at most once per call even in cyclic graphs.

use super::container::{HookContext, ResourceHook, ResourcePipeline};
use super::layer::{EntityTreeLayer, NodeInLayer, VisitedSet};
use super::registry::{HookArgs, HookRegistry};
use crate::entity::{EntityKey, EntityRef};
use crate::error::JsonApiError;
use crate::graph::{Relationship, RelationshipKind, ResourceGraph, ResourceType};
use crate::query::IncludeChain;
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// How the root layer's arguments are built.
enum RootArgs {
    Plain,
    Diff(Vec<EntityRef>),
    Deleted(bool),
}

#[derive(Debug, Clone)]
pub struct HookExecutor {
    graph: Arc<ResourceGraph>,
    registry: Arc<HookRegistry>,
}

impl HookExecutor {
    pub fn new(graph: Arc<ResourceGraph>, registry: Arc<HookRegistry>) -> Self {
        Self { graph, registry }
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Whether the container of `model` wants stored values for `hook`.
    pub fn should_load_database_values(&self, model: TypeId, hook: ResourceHook) -> bool {
        self.registry.load_database_values(model, hook)
    }

    /// Fires `BeforeRead` on the primary type and on every type along the include
    /// chains, once per type.
    pub async fn before_read(
        &self,
        resource: &ResourceType,
        pipeline: ResourcePipeline,
        id: Option<&str>,
        includes: &[IncludeChain],
        cancellation: &CancellationToken,
    ) -> Result<(), JsonApiError> {
        if self.is_empty() {
            return Ok(());
        }
        let args = HookArgs::Read {
            id: id.map(String::from),
            included: false,
        };
        self.fire(resource.model, ResourceHook::BeforeRead, args, pipeline, 0, Vec::new(), cancellation)
            .await?;

        let mut fired = HashSet::from([resource.model]);
        for chain in includes {
            for (position, relationship) in chain.relationships.iter().enumerate() {
                if !fired.insert(relationship.right_model) {
                    continue;
                }
                let args = HookArgs::Read {
                    id: None,
                    included: true,
                };
                self.fire(
                    relationship.right_model,
                    ResourceHook::BeforeRead,
                    args,
                    pipeline,
                    position + 1,
                    vec![Arc::clone(relationship)],
                    cancellation,
                )
                .await?;
            }
        }
        Ok(())
    }

    pub async fn after_read(
        &self,
        entities: Vec<EntityRef>,
        pipeline: ResourcePipeline,
        cancellation: &CancellationToken,
    ) -> Result<Vec<EntityRef>, JsonApiError> {
        self.traverse(
            entities,
            pipeline,
            ResourceHook::AfterRead,
            Some(ResourceHook::AfterRead),
            RootArgs::Plain,
            cancellation,
        )
        .await
    }

    pub async fn before_create(
        &self,
        entities: Vec<EntityRef>,
        pipeline: ResourcePipeline,
        cancellation: &CancellationToken,
    ) -> Result<Vec<EntityRef>, JsonApiError> {
        self.traverse(
            entities,
            pipeline,
            ResourceHook::BeforeCreate,
            Some(ResourceHook::BeforeUpdateRelationship),
            RootArgs::Plain,
            cancellation,
        )
        .await
    }

    pub async fn after_create(
        &self,
        entities: Vec<EntityRef>,
        pipeline: ResourcePipeline,
        cancellation: &CancellationToken,
    ) -> Result<(), JsonApiError> {
        self.traverse(
            entities,
            pipeline,
            ResourceHook::AfterCreate,
            Some(ResourceHook::AfterUpdateRelationship),
            RootArgs::Plain,
            cancellation,
        )
        .await
        .map(|_| ())
    }

    /// Fires `BeforeUpdate` with the request/stored diff (stored values only when the
    /// container asks for them), `BeforeUpdateRelationship`
    /// on the assigned relationship targets and `BeforeImplicitUpdateRelationship` on
    /// stored targets that lose their relationship.
    pub async fn before_update(
        &self,
        requested: Vec<EntityRef>,
        stored: Vec<EntityRef>,
        targeted: &[Arc<Relationship>],
        pipeline: ResourcePipeline,
        cancellation: &CancellationToken,
    ) -> Result<Vec<EntityRef>, JsonApiError> {
        if self.is_empty() {
            return Ok(requested);
        }
        let changes = implicit_changes_for_update(&requested, &stored, targeted);
        let with_database_values = requested
            .first()
            .is_some_and(|e| self.should_load_database_values(e.model_type(), ResourceHook::BeforeUpdate));
        let stored = if with_database_values { stored } else { Vec::new() };
        let survivors = self
            .traverse(
                requested,
                pipeline,
                ResourceHook::BeforeUpdate,
                Some(ResourceHook::BeforeUpdateRelationship),
                RootArgs::Diff(stored),
                cancellation,
            )
            .await?;
        self.before_implicit_update_relationship(changes, pipeline, cancellation)
            .await?;
        Ok(survivors)
    }

    pub async fn after_update(
        &self,
        entities: Vec<EntityRef>,
        pipeline: ResourcePipeline,
        cancellation: &CancellationToken,
    ) -> Result<(), JsonApiError> {
        self.traverse(
            entities,
            pipeline,
            ResourceHook::AfterUpdate,
            Some(ResourceHook::AfterUpdateRelationship),
            RootArgs::Plain,
            cancellation,
        )
        .await
        .map(|_| ())
    }

    /// Fires `BeforeDelete` and `BeforeImplicitUpdateRelationship` on every stored
    /// target of the deleted entities.
    pub async fn before_delete(
        &self,
        stored: Vec<EntityRef>,
        pipeline: ResourcePipeline,
        cancellation: &CancellationToken,
    ) -> Result<Vec<EntityRef>, JsonApiError> {
        if self.is_empty() {
            return Ok(stored);
        }
        let survivors = self
            .traverse(
                stored,
                pipeline,
                ResourceHook::BeforeDelete,
                None,
                RootArgs::Plain,
                cancellation,
            )
            .await?;
        let changes = self.implicit_changes_for_delete(&survivors);
        self.before_implicit_update_relationship(changes, pipeline, cancellation)
            .await?;
        Ok(survivors)
    }

    pub async fn after_delete(
        &self,
        entities: Vec<EntityRef>,
        pipeline: ResourcePipeline,
        succeeded: bool,
        cancellation: &CancellationToken,
    ) -> Result<(), JsonApiError> {
        self.traverse(
            entities,
            pipeline,
            ResourceHook::AfterDelete,
            None,
            RootArgs::Deleted(succeeded),
            cancellation,
        )
        .await
        .map(|_| ())
    }

    pub async fn on_return(
        &self,
        entities: Vec<EntityRef>,
        pipeline: ResourcePipeline,
        cancellation: &CancellationToken,
    ) -> Result<Vec<EntityRef>, JsonApiError> {
        self.traverse(
            entities,
            pipeline,
            ResourceHook::OnReturn,
            Some(ResourceHook::OnReturn),
            RootArgs::Plain,
            cancellation,
        )
        .await
    }

    /// Fires `BeforeImplicitUpdateRelationship` per target type. `changes` pairs the
    /// relationship through which targets were affected with the targets.
    pub async fn before_implicit_update_relationship(
        &self,
        changes: Vec<(Arc<Relationship>, Vec<EntityRef>)>,
        pipeline: ResourcePipeline,
        cancellation: &CancellationToken,
    ) -> Result<(), JsonApiError> {
        let mut by_model: Vec<(TypeId, Vec<Arc<Relationship>>, Vec<EntityRef>)> = Vec::new();
        for (relationship, targets) in changes {
            if targets.is_empty() {
                continue;
            }
            let Some(inverse) = self.graph.inverse_of(&relationship) else {
                continue;
            };
            let model = relationship.right_model;
            match by_model.iter_mut().find(|(m, _, _)| *m == model) {
                Some((_, relationships, entities)) => {
                    relationships.push(inverse);
                    for target in targets {
                        let key = EntityKey::of(&target);
                        if !entities.iter().any(|e| EntityKey::of(e) == key) {
                            entities.push(target);
                        }
                    }
                }
                None => by_model.push((model, vec![inverse], dedup(targets))),
            }
        }

        for (model, relationships, entities) in by_model {
            self.fire(
                model,
                ResourceHook::BeforeImplicitUpdateRelationship,
                HookArgs::Entities(entities),
                pipeline,
                1,
                relationships,
                cancellation,
            )
            .await?;
        }
        Ok(())
    }

    fn implicit_changes_for_delete(&self, stored: &[EntityRef]) -> Vec<(Arc<Relationship>, Vec<EntityRef>)> {
        let mut changes = Vec::new();
        for entity in stored {
            let Some(resource_type) = self.graph.resource_type_of_entity(entity) else {
                continue;
            };
            for relationship in resource_type.relationships() {
                if !fires_implicit(relationship) {
                    continue;
                }
                let targets = relationship.get_value(entity).into_entities();
                if !targets.is_empty() {
                    changes.push((Arc::clone(relationship), targets));
                }
            }
        }
        changes
    }

    async fn traverse(
        &self,
        roots: Vec<EntityRef>,
        pipeline: ResourcePipeline,
        root_hook: ResourceHook,
        nested_hook: Option<ResourceHook>,
        root_args: RootArgs,
        cancellation: &CancellationToken,
    ) -> Result<Vec<EntityRef>, JsonApiError> {
        if self.is_empty() {
            return Ok(roots);
        }

        let mut visited = VisitedSet::new();
        let order: Vec<EntityKey> = roots.iter().map(EntityKey::of).collect();
        let input_count = roots.len();
        let mut layer = EntityTreeLayer::root(roots, &mut visited);

        let mut stored = match &root_args {
            RootArgs::Diff(stored) => Some(stored.clone()),
            _ => None,
        };
        for node in &mut layer.nodes {
            let args = match (&root_args, stored.take()) {
                (_, Some(stored)) => HookArgs::Diff {
                    requested: node.entities.clone(),
                    stored,
                },
                (RootArgs::Deleted(succeeded), None) => HookArgs::Deleted {
                    entities: node.entities.clone(),
                    succeeded: *succeeded,
                },
                _ => HookArgs::Entities(node.entities.clone()),
            };
            let survivors = self
                .fire(node.model, root_hook, args, pipeline, 0, Vec::new(), cancellation)
                .await?;
            if let Some(survivors) = survivors {
                if pipeline.is_single() && input_count <= 1 && survivors.len() > 1 {
                    return Err(JsonApiError::HookContractViolation {
                        hook: root_hook.to_string(),
                        pipeline: pipeline.to_string(),
                        returned: survivors.len(),
                    });
                }
                let kept = restrict(&node.entities, &survivors);
                let kept_keys: HashSet<EntityKey> = kept.iter().map(EntityKey::of).collect();
                for entity in &node.entities {
                    let key = EntityKey::of(entity);
                    if !kept_keys.contains(&key) {
                        visited.mark_removed(key);
                    }
                }
                node.entities = kept;
            }
        }
        let root_entities = layer.entities();

        if let Some(nested_hook) = nested_hook {
            let mut current = layer;
            loop {
                let mut next = current.next(&self.graph, &mut visited, |_| true);
                if next.is_empty() {
                    break;
                }
                for node in &mut next.nodes {
                    self.fire_nested(
                        node,
                        nested_hook,
                        pipeline,
                        next.depth,
                        &mut visited,
                        cancellation,
                    )
                    .await?;
                }
                current = next;
            }
        }

        // Keep the caller's order.
        let by_key: HashMap<EntityKey, EntityRef> = root_entities
            .into_iter()
            .map(|e| (EntityKey::of(&e), e))
            .collect();
        let mut result = Vec::with_capacity(by_key.len());
        let mut emitted = HashSet::new();
        for key in order {
            if let Some(entity) = by_key.get(&key) {
                if emitted.insert(key) {
                    result.push(Arc::clone(entity));
                }
            }
        }
        Ok(result)
    }

    #[allow(clippy::too_many_arguments)]
    async fn fire_nested(
        &self,
        node: &mut NodeInLayer,
        hook: ResourceHook,
        pipeline: ResourcePipeline,
        depth: usize,
        visited: &mut VisitedSet,
        cancellation: &CancellationToken,
    ) -> Result<(), JsonApiError> {
        if node.entities.is_empty() {
            return Ok(());
        }
        let args = HookArgs::Entities(node.entities.clone());
        let relationships = node.relationships();
        if let Some(survivors) = self
            .fire(node.model, hook, args, pipeline, depth, relationships, cancellation)
            .await?
        {
            node.apply_filter(&survivors, visited);
        }
        Ok(())
    }

    /// Invokes one hook if the model's container implements it. Returns `None` when
    /// nothing was invoked.
    #[allow(clippy::too_many_arguments)]
    async fn fire(
        &self,
        model: TypeId,
        hook: ResourceHook,
        args: HookArgs,
        pipeline: ResourcePipeline,
        depth: usize,
        relationships: Vec<Arc<Relationship>>,
        cancellation: &CancellationToken,
    ) -> Result<Option<Vec<EntityRef>>, JsonApiError> {
        let Some(container) = self.registry.container(model, hook) else {
            return Ok(None);
        };
        if cancellation.is_cancelled() {
            return Err(JsonApiError::Cancelled);
        }
        let resource = self
            .graph
            .get_resource_type_by_model(model)
            .map(|t| t.public_name.as_str())
            .unwrap_or("<unregistered>");
        debug!(
            %hook,
            %pipeline,
            resource,
            depth,
            count = args.entities().len(),
            "Firing resource hook"
        );
        let context = HookContext {
            pipeline,
            hook,
            depth,
            relationships,
        };
        container.invoke(hook, args, &context).await.map(Some)
    }
}

/// Whether losing this relationship fires the implicit hook on its targets.
fn fires_implicit(relationship: &Relationship) -> bool {
    relationship.kind != RelationshipKind::Through && relationship.inverse.is_some()
}

/// Stored targets of targeted relationships that are absent from the requested value.
fn implicit_changes_for_update(
    requested: &[EntityRef],
    stored: &[EntityRef],
    targeted: &[Arc<Relationship>],
) -> Vec<(Arc<Relationship>, Vec<EntityRef>)> {
    let mut changes = Vec::new();
    for entity in requested {
        let key = EntityKey::of(entity);
        let Some(current) = stored.iter().find(|s| EntityKey::of(s) == key) else {
            continue;
        };
        for relationship in targeted.iter().filter(|r| fires_implicit(r)) {
            let wanted: HashSet<EntityKey> = relationship
                .get_value(entity)
                .entities()
                .iter()
                .map(EntityKey::of)
                .collect();
            let lost: Vec<EntityRef> = relationship
                .get_value(current)
                .into_entities()
                .into_iter()
                .filter(|target| !wanted.contains(&EntityKey::of(target)))
                .collect();
            if !lost.is_empty() {
                changes.push((Arc::clone(relationship), lost));
            }
        }
    }
    changes
}

fn restrict(entities: &[EntityRef], survivors: &[EntityRef]) -> Vec<EntityRef> {
    let kept: HashSet<EntityKey> = survivors.iter().map(EntityKey::of).collect();
    entities
        .iter()
        .filter(|e| kept.contains(&EntityKey::of(e)))
        .cloned()
        .collect()
}

fn dedup(entities: Vec<EntityRef>) -> Vec<EntityRef> {
    let mut seen = HashSet::new();
    entities
        .into_iter()
        .filter(|e| seen.insert(EntityKey::of(e)))
        .collect()
}
