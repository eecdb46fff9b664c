//! # Resource Service
//!
//! [`ResourceService<T>`] orchestrates every operation on one resource type:
//! query parsing, composition, hooks, storage calls, existence assertions and
//! change tracking. One service exists per model type; the id type comes from
//! `T::Id`.
//!
//! # Error Disambiguation
//! Storage reports every failed write as a generic conflict. Writes that reference
//! other resources re-query after such a failure to report either a missing primary
//! (`ResourceNotFound`) or each missing referenced resource separately.

use crate::change_tracker::ResourceChangeTracker;
use crate::entity::{downcast, erase, shared, EntityRef, Identifiable, Shared};
use crate::error::{JsonApiError, MissingResourceInRelationship};
use crate::graph::{Relationship, RelationshipValue, ResourceGraph, ResourceType};
use crate::hooks::{HookExecutor, ResourcePipeline};
use crate::options::JsonApiOptions;
use crate::query::{
    IncludeChain, PaginationWindow, QueryConstraints, QueryLayer, QueryLayerComposer,
    QueryStringParser, TopFieldSelection,
};
use crate::repository::{RelationshipIds, Repository};
use crate::request::RequestContext;
use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Related entities returned by a secondary or relationship endpoint.
#[derive(Debug, Clone)]
pub enum SecondaryResult {
    ToOne(Option<EntityRef>),
    ToMany(Vec<EntityRef>),
}

impl SecondaryResult {
    pub fn ids(&self) -> Vec<String> {
        match self {
            SecondaryResult::ToOne(entity) => entity.iter().map(|e| e.string_id()).collect(),
            SecondaryResult::ToMany(entities) => entities.iter().map(|e| e.string_id()).collect(),
        }
    }
}

pub struct ResourceService<T: Identifiable + Default> {
    graph: Arc<ResourceGraph>,
    resource: Arc<ResourceType>,
    options: Arc<JsonApiOptions>,
    parser: Arc<QueryStringParser>,
    composer: Arc<QueryLayerComposer>,
    hooks: Arc<HookExecutor>,
    repository: Arc<dyn Repository>,
    _model: PhantomData<fn() -> T>,
}

impl<T: Identifiable + Default> ResourceService<T> {
    pub(crate) fn new(
        graph: Arc<ResourceGraph>,
        resource: Arc<ResourceType>,
        options: Arc<JsonApiOptions>,
        parser: Arc<QueryStringParser>,
        composer: Arc<QueryLayerComposer>,
        hooks: Arc<HookExecutor>,
        repository: Arc<dyn Repository>,
    ) -> Self {
        Self {
            graph,
            resource,
            options,
            parser,
            composer,
            hooks,
            repository,
            _model: PhantomData,
        }
    }

    pub fn resource_type(&self) -> &Arc<ResourceType> {
        &self.resource
    }

    /// `GET /{type}`
    #[tracing::instrument(skip_all, fields(resource = %self.resource.public_name))]
    pub async fn get_all(&self, request: &mut RequestContext) -> Result<Vec<Shared<T>>, JsonApiError> {
        let pipeline = ResourcePipeline::Get;
        let constraints = self.parser.parse(&self.resource, &request.query)?;
        let layer = self.composer.compose(&self.resource, &constraints)?;

        self.hooks
            .before_read(&self.resource, pipeline, None, &layer.includes, &request.cancellation)
            .await?;

        request.pagination.page_size = layer.pagination.size();
        request.pagination.page_number = layer.pagination.number();

        if self.options.include_total_resource_count {
            let filter = self.composer.top_filter(&self.resource, &constraints)?;
            let count = request
                .guard(self.repository.count(&self.resource, filter.as_ref()))
                .await?;
            request.pagination.total_resource_count = Some(count);
            if count == 0 {
                debug!("No resources match, skipping query");
                return Ok(Vec::new());
            }
        }

        let entities = request.guard(self.repository.get(&layer)).await?;
        request.pagination.is_page_full =
            layer.pagination.is_paginated() && entities.len() == layer.pagination.size();

        let entities = self.hooks.after_read(entities, pipeline, &request.cancellation).await?;
        let entities = self.hooks.on_return(entities, pipeline, &request.cancellation).await?;
        Ok(typed(entities))
    }

    /// `GET /{type}/{id}`
    #[tracing::instrument(skip_all, fields(resource = %self.resource.public_name, %id))]
    pub async fn get(&self, id: &T::Id, request: &mut RequestContext) -> Result<Shared<T>, JsonApiError> {
        let id = id.to_string();
        let pipeline = ResourcePipeline::GetSingle;
        let constraints = self.parser.parse(&self.resource, &request.query)?;
        let layer = self.composer.compose_for_get_by_id(
            &id,
            &self.resource,
            TopFieldSelection::PreserveExisting,
            &constraints,
        )?;

        self.hooks
            .before_read(&self.resource, pipeline, Some(&id), &layer.includes, &request.cancellation)
            .await?;

        let primary = self.get_primary(&layer, &id, request).await?;

        let entities = self.hooks.after_read(vec![primary], pipeline, &request.cancellation).await?;
        let entities = self.hooks.on_return(entities, pipeline, &request.cancellation).await?;
        // A hook that filters out the requested resource hides it.
        typed(entities).into_iter().next().ok_or_else(|| self.not_found(&id))
    }

    /// `GET /{type}/{id}/{relationship}`
    #[tracing::instrument(skip_all, fields(resource = %self.resource.public_name, %id, %relationship))]
    pub async fn get_secondary(
        &self,
        id: &T::Id,
        relationship: &str,
        request: &mut RequestContext,
    ) -> Result<SecondaryResult, JsonApiError> {
        let relationship = self.assert_has_relationship(relationship)?;
        self.load_secondary(&id.to_string(), &relationship, false, request)
            .await
    }

    /// `GET /{type}/{id}/relationships/{relationship}`
    #[tracing::instrument(skip_all, fields(resource = %self.resource.public_name, %id, %relationship))]
    pub async fn get_relationship(
        &self,
        id: &T::Id,
        relationship: &str,
        request: &mut RequestContext,
    ) -> Result<SecondaryResult, JsonApiError> {
        let relationship = self.assert_has_relationship(relationship)?;
        self.load_secondary(&id.to_string(), &relationship, true, request)
            .await
    }

    /// `POST /{type}`. Returns `None` when the stored resource equals what the
    /// client sent.
    #[tracing::instrument(skip_all, fields(resource = %self.resource.public_name))]
    pub async fn create(&self, resource: T, request: &mut RequestContext) -> Result<Option<Shared<T>>, JsonApiError> {
        let pipeline = ResourcePipeline::Post;
        let requested = erase(shared(resource));

        let mut tracker = ResourceChangeTracker::new(Arc::clone(&self.resource));
        tracker.set_requested_values(&requested, &request.targeted);
        tracker.set_initial_values(&requested);

        let survivors = self
            .hooks
            .before_create(vec![requested], pipeline, &request.cancellation)
            .await?;
        let Some(requested) = survivors.into_iter().next() else {
            info!("Create was discarded by a hook");
            return Ok(None);
        };

        let result = request
            .guard(self.repository.create(&self.resource, &requested, &request.targeted))
            .await;
        if let Err(error) = result {
            return Err(self.disambiguate_create_failure(error, &requested, request).await);
        }

        let id = requested.string_id();
        info!(%id, "Created resource");
        let reloaded = self.reload(&id, request).await?;

        self.hooks
            .after_create(vec![reloaded.clone()], pipeline, &request.cancellation)
            .await?;

        tracker.set_final_values(&reloaded);
        self.shape_write_result(tracker, reloaded, pipeline, request).await
    }

    /// `PATCH /{type}/{id}`. Returns `None` when the stored resource equals what the
    /// client sent.
    #[tracing::instrument(skip_all, fields(resource = %self.resource.public_name, %id))]
    pub async fn update(
        &self,
        id: &T::Id,
        resource: T,
        request: &mut RequestContext,
    ) -> Result<Option<Shared<T>>, JsonApiError> {
        let id = id.to_string();
        let pipeline = ResourcePipeline::Patch;
        let requested = erase(shared(resource));
        self.resource
            .set_string_id(requested.as_ref(), &id)
            .map_err(|detail| JsonApiError::InvalidRequestBody { detail })?;

        let layer = self.composer.compose_for_update(&id, &self.resource)?;
        let stored = request.guard(self.repository.get_for_update(&layer)).await?;

        let survivors = self
            .hooks
            .before_update(
                vec![requested],
                stored.iter().cloned().collect(),
                &request.targeted.relationships,
                pipeline,
                &request.cancellation,
            )
            .await?;
        let stored = stored.ok_or_else(|| self.not_found(&id))?;
        let Some(requested) = survivors.into_iter().next() else {
            info!("Update was discarded by a hook");
            return Ok(None);
        };

        let mut tracker = ResourceChangeTracker::new(Arc::clone(&self.resource));
        tracker.set_requested_values(&requested, &request.targeted);
        tracker.set_initial_values(&stored);

        let result = request
            .guard(
                self.repository
                    .update(&self.resource, &requested, &stored, &request.targeted),
            )
            .await;
        if let Err(error) = result {
            return Err(self.disambiguate_update_failure(error, &id, &requested, request).await);
        }

        let reloaded = self.reload(&id, request).await?;
        self.hooks
            .after_update(vec![reloaded.clone()], pipeline, &request.cancellation)
            .await?;

        tracker.set_final_values(&reloaded);
        self.shape_write_result(tracker, reloaded, pipeline, request).await
    }

    /// `PATCH /{type}/{id}/relationships/{relationship}`: replaces the relationship.
    #[tracing::instrument(skip_all, fields(resource = %self.resource.public_name, %id, %relationship))]
    pub async fn set_relationship(
        &self,
        id: &T::Id,
        relationship: &str,
        ids: RelationshipIds,
        request: &mut RequestContext,
    ) -> Result<(), JsonApiError> {
        let id = id.to_string();
        let pipeline = ResourcePipeline::PatchRelationship;
        let relationship = self.assert_has_relationship(relationship)?;
        let ids = match (relationship.is_to_many(), ids) {
            (true, RelationshipIds::ToOne(_)) => {
                return Err(JsonApiError::InvalidRequestBody {
                    detail: format!(
                        "Expected data to be an array for to-many relationship '{}'.",
                        relationship.public_name
                    ),
                })
            }
            (false, RelationshipIds::ToMany(_)) => {
                return Err(JsonApiError::InvalidRequestBody {
                    detail: format!(
                        "Expected a single resource identifier for to-one relationship '{}'.",
                        relationship.public_name
                    ),
                })
            }
            (_, ids) => ids,
        };

        let layer = self.composer.compose_for_update(&id, &self.resource)?;
        let stored = request
            .guard(self.repository.get_for_update(&layer))
            .await?
            .ok_or_else(|| self.not_found(&id))?;

        let requested = stored.detached_copy();
        let value = self.stub_value(&relationship, &ids)?;
        relationship.set_value(&requested, value);

        let survivors = self
            .hooks
            .before_update(
                vec![requested],
                vec![stored],
                &[Arc::clone(&relationship)],
                pipeline,
                &request.cancellation,
            )
            .await?;
        let Some(requested) = survivors.into_iter().next() else {
            info!("Relationship update was discarded by a hook");
            return Ok(());
        };

        // Hooks may have detached targets from the requested value.
        let ids = match ids {
            RelationshipIds::ToOne(_) => {
                RelationshipIds::ToOne(relationship.get_value(&requested).ids().into_iter().next())
            }
            RelationshipIds::ToMany(_) => {
                RelationshipIds::ToMany(relationship.get_value(&requested).ids().into_iter().collect())
            }
        };

        let result = request
            .guard(
                self.repository
                    .set_relationship(&self.resource, &id, &relationship, &ids),
            )
            .await;
        if let Err(error) = result {
            return Err(self
                .disambiguate_relationship_failure(error, &id, &relationship, &ids.ids(), request)
                .await);
        }
        info!(%id, relationship = %relationship.public_name, count = ids.ids().len(), "Replaced relationship");

        let reloaded = self.reload(&id, request).await?;
        self.hooks
            .after_update(vec![reloaded], pipeline, &request.cancellation)
            .await
    }

    /// `POST /{type}/{id}/relationships/{relationship}`
    #[tracing::instrument(skip_all, fields(resource = %self.resource.public_name, %id, %relationship))]
    pub async fn add_to_to_many(
        &self,
        id: &T::Id,
        relationship: &str,
        ids: BTreeSet<String>,
        request: &mut RequestContext,
    ) -> Result<(), JsonApiError> {
        let id = id.to_string();
        let relationship = self.assert_to_many(relationship)?;
        let mut ids = ids;

        if relationship.through().is_some() && !ids.is_empty() {
            let layer = self.composer.compose_for_has_many_through(
                &self.resource,
                &id,
                &relationship,
                &ids,
            )?;
            let primary = self.get_primary(&layer, &id, request).await?;
            for existing in relationship.get_value(&primary).ids() {
                ids.remove(&existing);
            }
            debug!(remaining = ids.len(), "Filtered out already joined resources");
        }

        if ids.is_empty() {
            return Ok(());
        }

        let result = request
            .guard(
                self.repository
                    .add_to_to_many(&self.resource, &id, &relationship, &ids),
            )
            .await;
        if let Err(error) = result {
            return Err(self
                .disambiguate_relationship_failure(error, &id, &relationship, &ids, request)
                .await);
        }
        info!(%id, relationship = %relationship.public_name, count = ids.len(), "Added to relationship");
        Ok(())
    }

    /// `DELETE /{type}/{id}/relationships/{relationship}`
    #[tracing::instrument(skip_all, fields(resource = %self.resource.public_name, %id, %relationship))]
    pub async fn remove_from_to_many(
        &self,
        id: &T::Id,
        relationship: &str,
        ids: BTreeSet<String>,
        request: &mut RequestContext,
    ) -> Result<(), JsonApiError> {
        let id = id.to_string();
        let relationship = self.assert_to_many(relationship)?;

        let layer = self.composer.compose_for_get_by_id(
            &id,
            &self.resource,
            TopFieldSelection::OnlyIdAttribute,
            &QueryConstraints::default(),
        )?;
        self.get_primary(&layer, &id, request).await?;

        let missing = self.missing_targets(&relationship, &ids, request).await?;
        if !missing.is_empty() {
            return Err(JsonApiError::ResourcesInRelationshipsNotFound(missing));
        }

        if ids.is_empty() {
            return Ok(());
        }
        request
            .guard(
                self.repository
                    .remove_from_to_many(&self.resource, &id, &relationship, &ids),
            )
            .await?;
        info!(%id, relationship = %relationship.public_name, count = ids.len(), "Removed from relationship");
        Ok(())
    }

    /// `DELETE /{type}/{id}`
    #[tracing::instrument(skip_all, fields(resource = %self.resource.public_name, %id))]
    pub async fn delete(&self, id: &T::Id, request: &mut RequestContext) -> Result<(), JsonApiError> {
        let id = id.to_string();
        let pipeline = ResourcePipeline::Delete;

        let layer = self.composer.compose_for_update(&id, &self.resource)?;
        let stored = request
            .guard(self.repository.get_for_update(&layer))
            .await?
            .ok_or_else(|| self.not_found(&id))?;

        let survivors = self
            .hooks
            .before_delete(vec![stored], pipeline, &request.cancellation)
            .await?;
        if survivors.is_empty() {
            info!("Delete was discarded by a hook");
            return Ok(());
        }

        let result = request.guard(self.repository.delete(&self.resource, &id)).await;
        self.hooks
            .after_delete(survivors, pipeline, result.is_ok(), &request.cancellation)
            .await?;

        match result {
            Ok(()) => {
                info!("Deleted resource");
                Ok(())
            }
            Err(error) => {
                warn!(%error, "Delete failed");
                if !error.is_internal() && !self.primary_exists(&id, request).await? {
                    return Err(self.not_found(&id));
                }
                Err(error)
            }
        }
    }

    async fn load_secondary(
        &self,
        id: &str,
        relationship: &Arc<Relationship>,
        identifiers_only: bool,
        request: &mut RequestContext,
    ) -> Result<SecondaryResult, JsonApiError> {
        let pipeline = ResourcePipeline::GetRelationship;
        let target = self.target_of(relationship)?;
        let constraints = self.parser.parse(&target, &request.query)?;
        let mut secondary = self.composer.compose(&target, &constraints)?;
        if !relationship.is_to_many() {
            secondary.sort.clear();
            secondary.pagination = PaginationWindow::unpaginated();
        }
        if identifiers_only {
            secondary.projection = Some(BTreeSet::from(["id".to_string()]));
            secondary.includes.clear();
            secondary.included_projections.clear();
        }
        request.pagination.page_size = secondary.pagination.size();
        request.pagination.page_number = secondary.pagination.number();

        let through = IncludeChain {
            relationships: vec![Arc::clone(relationship)],
        };
        let mut includes = vec![through.clone()];
        includes.extend(secondary.includes.iter().map(|chain| IncludeChain {
            relationships: through
                .relationships
                .iter()
                .chain(&chain.relationships)
                .cloned()
                .collect(),
        }));
        self.hooks
            .before_read(&self.resource, pipeline, Some(id), &includes, &request.cancellation)
            .await?;

        let paginated = secondary.pagination;
        let layer = self
            .composer
            .wrap_for_secondary_endpoint(secondary, &self.resource, id, relationship)?;
        let primary = self.get_primary(&layer, id, request).await?;

        let loaded = relationship.get_value(&primary).into_entities().len();
        request.pagination.is_page_full = paginated.is_paginated() && loaded == paginated.size();

        // The primary's hooks run first; nested layers reach the related entities
        // and detach whatever they filter out.
        let primary = self
            .hooks
            .after_read(vec![primary], pipeline, &request.cancellation)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| self.not_found(id))?;
        let related = relationship.get_value(&primary).into_entities();
        let related = self.hooks.on_return(related, pipeline, &request.cancellation).await?;
        Ok(if relationship.is_to_many() {
            SecondaryResult::ToMany(related)
        } else {
            SecondaryResult::ToOne(related.into_iter().next())
        })
    }

    async fn get_primary(
        &self,
        layer: &QueryLayer,
        id: &str,
        request: &RequestContext,
    ) -> Result<EntityRef, JsonApiError> {
        request
            .guard(self.repository.get(layer))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| self.not_found(id))
    }

    /// Reloads a written resource with every attribute and the requested includes.
    async fn reload(&self, id: &str, request: &RequestContext) -> Result<EntityRef, JsonApiError> {
        let constraints = self.parser.parse(&self.resource, &request.query)?;
        let layer = self.composer.compose_for_get_by_id(
            id,
            &self.resource,
            TopFieldSelection::AllAttributes,
            &constraints,
        )?;
        self.get_primary(&layer, id, request).await
    }

    async fn shape_write_result(
        &self,
        tracker: ResourceChangeTracker,
        reloaded: EntityRef,
        pipeline: ResourcePipeline,
        request: &RequestContext,
    ) -> Result<Option<Shared<T>>, JsonApiError> {
        if !tracker.has_implicit_changes() {
            debug!("No implicit changes, returning no content");
            return Ok(None);
        }
        let entities = self
            .hooks
            .on_return(vec![reloaded], pipeline, &request.cancellation)
            .await?;
        Ok(typed(entities).into_iter().next())
    }

    async fn primary_exists(&self, id: &str, request: &RequestContext) -> Result<bool, JsonApiError> {
        let layer = self
            .composer
            .compose_for_right_ids(&self.resource, &BTreeSet::from([id.to_string()]))?;
        Ok(!request.guard(self.repository.get(&layer)).await?.is_empty())
    }

    async fn missing_targets(
        &self,
        relationship: &Relationship,
        ids: &BTreeSet<String>,
        request: &RequestContext,
    ) -> Result<Vec<MissingResourceInRelationship>, JsonApiError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let target = self.target_of(relationship)?;
        let layer = self.composer.compose_for_right_ids(&target, ids)?;
        let found: BTreeSet<String> = request
            .guard(self.repository.get(&layer))
            .await?
            .iter()
            .map(|e| e.string_id())
            .collect();
        Ok(ids
            .difference(&found)
            .map(|id| MissingResourceInRelationship {
                relationship: relationship.public_name.clone(),
                resource_type: target.public_name.clone(),
                id: id.clone(),
            })
            .collect())
    }

    async fn missing_targeted_resources(
        &self,
        requested: &EntityRef,
        request: &RequestContext,
    ) -> Result<Vec<MissingResourceInRelationship>, JsonApiError> {
        let mut missing = Vec::new();
        let layers = self
            .composer
            .compose_for_targeted_secondary_ids(requested, &request.targeted.relationships)?;
        for (relationship, ids, layer) in layers {
            let found: BTreeSet<String> = request
                .guard(self.repository.get(&layer))
                .await?
                .iter()
                .map(|e| e.string_id())
                .collect();
            let resource_type = layer.resource.public_name.clone();
            missing.extend(ids.difference(&found).map(|id| MissingResourceInRelationship {
                relationship: relationship.public_name.clone(),
                resource_type: resource_type.clone(),
                id: id.clone(),
            }));
        }
        Ok(missing)
    }

    async fn disambiguate_create_failure(
        &self,
        error: JsonApiError,
        requested: &EntityRef,
        request: &RequestContext,
    ) -> JsonApiError {
        if error.is_internal() || error == JsonApiError::Cancelled {
            return error;
        }
        let id = requested.string_id();
        if !id.is_empty() {
            match self.primary_exists(&id, request).await {
                Ok(true) => {
                    return JsonApiError::ResourceAlreadyExists {
                        id,
                        resource: self.resource.public_name.clone(),
                    }
                }
                Ok(false) => {}
                Err(check) => return check,
            }
        }
        match self.missing_targeted_resources(requested, request).await {
            Ok(missing) if !missing.is_empty() => JsonApiError::ResourcesInRelationshipsNotFound(missing),
            Ok(_) => error,
            Err(check) => check,
        }
    }

    async fn disambiguate_update_failure(
        &self,
        error: JsonApiError,
        id: &str,
        requested: &EntityRef,
        request: &RequestContext,
    ) -> JsonApiError {
        if error.is_internal() || error == JsonApiError::Cancelled {
            return error;
        }
        match self.missing_targeted_resources(requested, request).await {
            Ok(missing) if !missing.is_empty() => return JsonApiError::ResourcesInRelationshipsNotFound(missing),
            Ok(_) => {}
            Err(check) => return check,
        }
        match self.primary_exists(id, request).await {
            Ok(false) => self.not_found(id),
            Ok(true) => error,
            Err(check) => check,
        }
    }

    async fn disambiguate_relationship_failure(
        &self,
        error: JsonApiError,
        id: &str,
        relationship: &Relationship,
        ids: &BTreeSet<String>,
        request: &RequestContext,
    ) -> JsonApiError {
        if error.is_internal() || error == JsonApiError::Cancelled {
            return error;
        }
        match self.primary_exists(id, request).await {
            Ok(false) => return self.not_found(id),
            Ok(true) => {}
            Err(check) => return check,
        }
        match self.missing_targets(relationship, ids, request).await {
            Ok(missing) if !missing.is_empty() => JsonApiError::ResourcesInRelationshipsNotFound(missing),
            Ok(_) => error,
            Err(check) => check,
        }
    }

    /// Builds a relationship value of stub entities holding only ids.
    fn stub_value(&self, relationship: &Relationship, ids: &RelationshipIds) -> Result<RelationshipValue, JsonApiError> {
        let target = self.target_of(relationship)?;
        let stub = |id: &String| {
            target.create_stub(id).ok_or_else(|| JsonApiError::InvalidRequestBody {
                detail: format!("The id '{id}' is invalid for resource type '{}'.", target.public_name),
            })
        };
        Ok(match ids {
            RelationshipIds::ToOne(id) => RelationshipValue::ToOne(id.as_ref().map(stub).transpose()?),
            RelationshipIds::ToMany(ids) => {
                RelationshipValue::ToMany(ids.iter().map(stub).collect::<Result<_, _>>()?)
            }
        })
    }

    fn assert_has_relationship(&self, name: &str) -> Result<Arc<Relationship>, JsonApiError> {
        self.resource
            .relationship(name)
            .cloned()
            .ok_or_else(|| JsonApiError::RelationshipNotFound {
                relationship: name.to_string(),
                resource: self.resource.public_name.clone(),
            })
    }

    fn assert_to_many(&self, name: &str) -> Result<Arc<Relationship>, JsonApiError> {
        let relationship = self.assert_has_relationship(name)?;
        if !relationship.is_to_many() {
            return Err(JsonApiError::ToManyRelationshipRequired {
                relationship: relationship.public_name.clone(),
            });
        }
        Ok(relationship)
    }

    fn target_of(&self, relationship: &Relationship) -> Result<Arc<ResourceType>, JsonApiError> {
        self.graph.target_of(relationship).cloned().ok_or_else(|| {
            JsonApiError::Internal(format!(
                "Relationship '{}' targets an unregistered type.",
                relationship.public_name
            ))
        })
    }

    fn not_found(&self, id: &str) -> JsonApiError {
        JsonApiError::ResourceNotFound {
            id: id.to_string(),
            resource: self.resource.public_name.clone(),
        }
    }
}

fn typed<T: Identifiable>(entities: Vec<EntityRef>) -> Vec<Shared<T>> {
    entities.iter().filter_map(downcast::<T>).collect()
}
