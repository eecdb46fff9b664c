//! # Resource Hooks
//!
//! Business rules of the sample, expressed as [`ResourceHooks`] containers:
//!
//! - [`ArticleHooks`] normalizes titles on create, refuses blank titles on update
//!   and records the articles handed back to the client.
//! - [`PersonHooks`] records every person the read pipeline hands back, including
//!   people reached through `include` chains.
//!
//! Both write into a shared [`AuditLog`], which tests and the demo binary inspect.

use crate::model::{Article, Person};
use async_trait::async_trait;
use jsonapi_core::{
    EntityDiff, HookContext, Identifiable, JsonApiError, ResourceHook, ResourceHooks, ResourcePipeline,
    Shared,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// One hook invocation for one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub hook: ResourceHook,
    pub pipeline: ResourcePipeline,
    pub resource: &'static str,
    pub id: String,
    pub depth: usize,
}

#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn record<T: Identifiable>(&self, resource: &'static str, entities: &[Shared<T>], context: &HookContext) {
        let mut entries = self.entries.lock();
        for entity in entities {
            entries.push(AuditEntry {
                hook: context.hook,
                pipeline: context.pipeline,
                resource,
                id: entity.read().string_id(),
                depth: context.depth,
            });
        }
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }

    /// Ids recorded for `resource` under `hook`, in invocation order.
    pub fn ids(&self, resource: &str, hook: ResourceHook) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.resource == resource && e.hook == hook)
            .map(|e| e.id.clone())
            .collect()
    }

    /// `(resource, hook, id)` triples in invocation order.
    pub fn sequence(&self) -> Vec<(&'static str, ResourceHook, String)> {
        self.entries
            .lock()
            .iter()
            .map(|e| (e.resource, e.hook, e.id.clone()))
            .collect()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

pub struct ArticleHooks {
    audit: AuditLog,
}

impl ArticleHooks {
    pub fn new(audit: AuditLog) -> Self {
        Self { audit }
    }
}

#[async_trait]
impl ResourceHooks<Article> for ArticleHooks {
    fn enabled_hooks(&self) -> Vec<ResourceHook> {
        vec![
            ResourceHook::BeforeCreate,
            ResourceHook::AfterCreate,
            ResourceHook::BeforeUpdate,
            ResourceHook::OnReturn,
        ]
    }

    fn load_database_values(&self, hook: ResourceHook) -> bool {
        hook == ResourceHook::BeforeUpdate
    }

    /// Trims titles; articles left without a title are silently dropped.
    async fn before_create(
        &self,
        entities: Vec<Shared<Article>>,
        context: &HookContext,
    ) -> Result<Vec<Shared<Article>>, JsonApiError> {
        let mut kept = Vec::with_capacity(entities.len());
        for article in entities {
            let blank = {
                let mut article = article.write();
                article.title = article.title.trim().to_string();
                article.title.is_empty()
            };
            if blank {
                debug!(pipeline = %context.pipeline, "Dropping article without title");
                continue;
            }
            kept.push(article);
        }
        Ok(kept)
    }

    async fn after_create(&self, entities: Vec<Shared<Article>>, context: &HookContext) -> Result<(), JsonApiError> {
        self.audit.record("articles", &entities, context);
        Ok(())
    }

    async fn before_update(
        &self,
        diff: EntityDiff<Article>,
        context: &HookContext,
    ) -> Result<Vec<Shared<Article>>, JsonApiError> {
        for (requested, stored) in diff.pairs() {
            let requested = requested.read();
            if requested.title.trim().is_empty() {
                return Err(JsonApiError::InvalidRequestBody {
                    detail: format!("Article '{}' cannot have a blank title.", requested.id),
                });
            }
            if let Some(stored) = stored {
                let stored = stored.read();
                if stored.title != requested.title {
                    info!(id = requested.id, from = %stored.title, to = %requested.title, "Renaming article");
                }
            }
        }
        self.audit.record("articles", &diff.requested, context);
        Ok(diff.requested)
    }

    async fn on_return(
        &self,
        entities: Vec<Shared<Article>>,
        context: &HookContext,
    ) -> Result<Vec<Shared<Article>>, JsonApiError> {
        self.audit.record("articles", &entities, context);
        Ok(entities)
    }
}

pub struct PersonHooks {
    audit: AuditLog,
}

impl PersonHooks {
    pub fn new(audit: AuditLog) -> Self {
        Self { audit }
    }
}

#[async_trait]
impl ResourceHooks<Person> for PersonHooks {
    fn enabled_hooks(&self) -> Vec<ResourceHook> {
        vec![ResourceHook::AfterRead, ResourceHook::BeforeImplicitUpdateRelationship]
    }

    async fn after_read(
        &self,
        entities: Vec<Shared<Person>>,
        context: &HookContext,
    ) -> Result<Vec<Shared<Person>>, JsonApiError> {
        self.audit.record("people", &entities, context);
        Ok(entities)
    }

    async fn before_implicit_update_relationship(
        &self,
        entities: Vec<Shared<Person>>,
        context: &HookContext,
    ) -> Result<(), JsonApiError> {
        self.audit.record("people", &entities, context);
        Ok(())
    }
}
