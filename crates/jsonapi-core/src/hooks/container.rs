//! # Resource Hooks
//!
//! A [`ResourceHooks`] container holds the lifecycle callbacks of one model type.
//! Every method has a pass-through default, so an implementation overrides only the
//! hooks it cares about.
//!
//! # Filtering
//! "Before" hooks, `after_read` and `on_return` receive the entities of one layer
//! and return the subset that should continue. Entities a hook leaves out are
//! dropped from the operation and detached from the relationships that led to them.

use crate::entity::{Identifiable, Shared};
use crate::error::JsonApiError;
use crate::graph::Relationship;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Lifecycle points at which hooks fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceHook {
    BeforeCreate,
    BeforeRead,
    BeforeUpdate,
    BeforeDelete,
    BeforeUpdateRelationship,
    BeforeImplicitUpdateRelationship,
    OnReturn,
    AfterCreate,
    AfterRead,
    AfterUpdate,
    AfterDelete,
    AfterUpdateRelationship,
}

impl ResourceHook {
    pub const ALL: [ResourceHook; 12] = [
        ResourceHook::BeforeCreate,
        ResourceHook::BeforeRead,
        ResourceHook::BeforeUpdate,
        ResourceHook::BeforeDelete,
        ResourceHook::BeforeUpdateRelationship,
        ResourceHook::BeforeImplicitUpdateRelationship,
        ResourceHook::OnReturn,
        ResourceHook::AfterCreate,
        ResourceHook::AfterRead,
        ResourceHook::AfterUpdate,
        ResourceHook::AfterDelete,
        ResourceHook::AfterUpdateRelationship,
    ];
}

impl fmt::Display for ResourceHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The request pipeline a hook fires in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourcePipeline {
    Get,
    GetSingle,
    GetRelationship,
    Post,
    Patch,
    PatchRelationship,
    Delete,
}

impl ResourcePipeline {
    /// Pipelines that operate on exactly one primary resource.
    pub fn is_single(&self) -> bool {
        !matches!(self, ResourcePipeline::Get)
    }
}

impl fmt::Display for ResourcePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Describes one hook invocation.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub pipeline: ResourcePipeline,
    pub hook: ResourceHook,
    /// Zero for the primary resources, then one per relationship hop.
    pub depth: usize,
    /// Relationships through which the entities were reached; empty at the root.
    pub relationships: Vec<Arc<Relationship>>,
}

impl HookContext {
    pub fn is_root(&self) -> bool {
        self.depth == 0
    }

    /// Whether the entities were reached through the relationship with this public name.
    pub fn reached_through(&self, public_name: &str) -> bool {
        self.relationships.iter().any(|r| r.public_name == public_name)
    }
}

/// Request values paired with their stored counterparts for `before_update`.
#[derive(Debug, Clone)]
pub struct EntityDiff<T> {
    pub requested: Vec<Shared<T>>,
    /// Present only when the container asks for database values.
    pub stored: Vec<Shared<T>>,
}

impl<T: Identifiable> EntityDiff<T> {
    /// Each requested entity with the stored entity of the same id, if loaded.
    pub fn pairs(&self) -> Vec<(Shared<T>, Option<Shared<T>>)> {
        self.requested
            .iter()
            .map(|requested| {
                let id = requested.read().id();
                let stored = self.stored.iter().find(|s| s.read().id() == id).cloned();
                (Arc::clone(requested), stored)
            })
            .collect()
    }
}

/// Lifecycle callbacks for model `T`.
#[async_trait]
pub trait ResourceHooks<T: Identifiable>: Send + Sync + 'static {
    /// Hooks this container implements. The executor skips everything else.
    fn enabled_hooks(&self) -> Vec<ResourceHook> {
        ResourceHook::ALL.to_vec()
    }

    /// Whether stored values should be loaded and passed along for `hook`.
    fn load_database_values(&self, _hook: ResourceHook) -> bool {
        false
    }

    async fn before_read(
        &self,
        _context: &HookContext,
        _id: Option<&str>,
        _is_included: bool,
    ) -> Result<(), JsonApiError> {
        Ok(())
    }

    async fn after_read(
        &self,
        entities: Vec<Shared<T>>,
        _context: &HookContext,
    ) -> Result<Vec<Shared<T>>, JsonApiError> {
        Ok(entities)
    }

    async fn before_create(
        &self,
        entities: Vec<Shared<T>>,
        _context: &HookContext,
    ) -> Result<Vec<Shared<T>>, JsonApiError> {
        Ok(entities)
    }

    async fn after_create(
        &self,
        _entities: Vec<Shared<T>>,
        _context: &HookContext,
    ) -> Result<(), JsonApiError> {
        Ok(())
    }

    async fn before_update(
        &self,
        diff: EntityDiff<T>,
        _context: &HookContext,
    ) -> Result<Vec<Shared<T>>, JsonApiError> {
        Ok(diff.requested)
    }

    async fn after_update(
        &self,
        _entities: Vec<Shared<T>>,
        _context: &HookContext,
    ) -> Result<(), JsonApiError> {
        Ok(())
    }

    async fn before_delete(
        &self,
        entities: Vec<Shared<T>>,
        _context: &HookContext,
    ) -> Result<Vec<Shared<T>>, JsonApiError> {
        Ok(entities)
    }

    async fn after_delete(
        &self,
        _entities: Vec<Shared<T>>,
        _context: &HookContext,
        _succeeded: bool,
    ) -> Result<(), JsonApiError> {
        Ok(())
    }

    /// Fires for entities that gain or lose a relationship as part of a write.
    async fn before_update_relationship(
        &self,
        entities: Vec<Shared<T>>,
        _context: &HookContext,
    ) -> Result<Vec<Shared<T>>, JsonApiError> {
        Ok(entities)
    }

    /// Fires for entities that lose a relationship as a side effect of a write on
    /// another resource.
    async fn before_implicit_update_relationship(
        &self,
        _entities: Vec<Shared<T>>,
        _context: &HookContext,
    ) -> Result<(), JsonApiError> {
        Ok(())
    }

    async fn after_update_relationship(
        &self,
        _entities: Vec<Shared<T>>,
        _context: &HookContext,
    ) -> Result<(), JsonApiError> {
        Ok(())
    }

    /// Last chance to filter entities before they are returned to the client.
    async fn on_return(
        &self,
        entities: Vec<Shared<T>>,
        _context: &HookContext,
    ) -> Result<Vec<Shared<T>>, JsonApiError> {
        Ok(entities)
    }
}
