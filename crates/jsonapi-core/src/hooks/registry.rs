//! Type-erased storage of hook containers, keyed by model type.

use super::container::{EntityDiff, HookContext, ResourceHook, ResourceHooks};
use crate::entity::{downcast, erase, EntityRef, Identifiable, Shared};
use crate::error::JsonApiError;
use async_trait::async_trait;
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::Arc;

/// Arguments of one erased hook call.
#[derive(Debug, Clone)]
pub enum HookArgs {
    Read { id: Option<String>, included: bool },
    Entities(Vec<EntityRef>),
    Diff {
        requested: Vec<EntityRef>,
        stored: Vec<EntityRef>,
    },
    Deleted {
        entities: Vec<EntityRef>,
        succeeded: bool,
    },
}

impl HookArgs {
    pub fn entities(&self) -> &[EntityRef] {
        match self {
            HookArgs::Read { .. } => &[],
            HookArgs::Entities(entities) => entities,
            HookArgs::Diff { requested, .. } => requested,
            HookArgs::Deleted { entities, .. } => entities,
        }
    }
}

#[async_trait]
pub(crate) trait ErasedHooks: Send + Sync {
    fn implements(&self, hook: ResourceHook) -> bool;

    fn load_database_values(&self, hook: ResourceHook) -> bool;

    /// Runs `hook` and returns the entities that continue. Hooks without a result
    /// keep their input.
    async fn invoke(
        &self,
        hook: ResourceHook,
        args: HookArgs,
        context: &HookContext,
    ) -> Result<Vec<EntityRef>, JsonApiError>;
}

struct HookAdapter<T, H> {
    hooks: H,
    enabled: HashSet<ResourceHook>,
    _model: PhantomData<fn() -> T>,
}

fn typed<T: Identifiable>(entities: &[EntityRef]) -> Vec<Shared<T>> {
    entities.iter().filter_map(downcast::<T>).collect()
}

fn erased<T: Identifiable>(entities: Vec<Shared<T>>) -> Vec<EntityRef> {
    entities.into_iter().map(erase::<T>).collect()
}

#[async_trait]
impl<T, H> ErasedHooks for HookAdapter<T, H>
where
    T: Identifiable,
    H: ResourceHooks<T>,
{
    fn implements(&self, hook: ResourceHook) -> bool {
        self.enabled.contains(&hook)
    }

    fn load_database_values(&self, hook: ResourceHook) -> bool {
        self.hooks.load_database_values(hook)
    }

    async fn invoke(
        &self,
        hook: ResourceHook,
        args: HookArgs,
        context: &HookContext,
    ) -> Result<Vec<EntityRef>, JsonApiError> {
        let input = args.entities().to_vec();
        let entities = typed::<T>(&input);
        let survivors = match (hook, args) {
            (ResourceHook::BeforeRead, HookArgs::Read { id, included }) => {
                self.hooks.before_read(context, id.as_deref(), included).await?;
                return Ok(input);
            }
            (ResourceHook::BeforeUpdate, HookArgs::Diff { stored, .. }) => {
                let diff = EntityDiff {
                    requested: entities,
                    stored: typed::<T>(&stored),
                };
                self.hooks.before_update(diff, context).await?
            }
            (ResourceHook::AfterDelete, HookArgs::Deleted { succeeded, .. }) => {
                self.hooks.after_delete(entities, context, succeeded).await?;
                return Ok(input);
            }
            (ResourceHook::AfterRead, _) => self.hooks.after_read(entities, context).await?,
            (ResourceHook::BeforeCreate, _) => self.hooks.before_create(entities, context).await?,
            (ResourceHook::BeforeDelete, _) => self.hooks.before_delete(entities, context).await?,
            (ResourceHook::BeforeUpdateRelationship, _) => {
                self.hooks.before_update_relationship(entities, context).await?
            }
            (ResourceHook::OnReturn, _) => self.hooks.on_return(entities, context).await?,
            (ResourceHook::AfterCreate, _) => {
                self.hooks.after_create(entities, context).await?;
                return Ok(input);
            }
            (ResourceHook::AfterUpdate, _) => {
                self.hooks.after_update(entities, context).await?;
                return Ok(input);
            }
            (ResourceHook::AfterUpdateRelationship, _) => {
                self.hooks.after_update_relationship(entities, context).await?;
                return Ok(input);
            }
            (ResourceHook::BeforeImplicitUpdateRelationship, _) => {
                self.hooks
                    .before_implicit_update_relationship(entities, context)
                    .await?;
                return Ok(input);
            }
            (hook, args) => {
                return Err(JsonApiError::Internal(format!(
                    "Hook {hook} cannot be invoked with {args:?}."
                )))
            }
        };
        Ok(erased(survivors))
    }
}

/// Hook containers by model type.
#[derive(Default, Clone)]
pub struct HookRegistry {
    containers: HashMap<TypeId, Arc<dyn ErasedHooks>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the hook container for model `T`, replacing any previous one.
    pub fn register<T: Identifiable, H: ResourceHooks<T>>(&mut self, hooks: H) -> &mut Self {
        let enabled = hooks.enabled_hooks().into_iter().collect();
        let adapter = HookAdapter {
            hooks,
            enabled,
            _model: PhantomData::<fn() -> T>,
        };
        self.containers.insert(TypeId::of::<T>(), Arc::new(adapter));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    pub(crate) fn container(&self, model: TypeId, hook: ResourceHook) -> Option<&Arc<dyn ErasedHooks>> {
        self.containers
            .get(&model)
            .filter(|container| container.implements(hook))
    }

    pub fn implements(&self, model: TypeId, hook: ResourceHook) -> bool {
        self.container(model, hook).is_some()
    }

    pub fn load_database_values(&self, model: TypeId, hook: ResourceHook) -> bool {
        self.container(model, hook)
            .is_some_and(|container| container.load_database_values(hook))
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("containers", &self.containers.len())
            .finish()
    }
}
