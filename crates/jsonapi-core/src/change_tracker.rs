//! Detects changes a write caused beyond what the client asked for (defaults,
//! triggers, hooks rewriting values). Without such changes the write answers
//! "204 No Content".

use crate::entity::EntityRef;
use crate::graph::ResourceType;
use crate::request::TargetedFields;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub struct ResourceChangeTracker {
    resource: Arc<ResourceType>,
    requested: HashMap<String, Value>,
    initial: HashMap<String, Value>,
    finals: HashMap<String, Value>,
}

impl ResourceChangeTracker {
    pub fn new(resource: Arc<ResourceType>) -> Self {
        Self {
            resource,
            requested: HashMap::new(),
            initial: HashMap::new(),
            finals: HashMap::new(),
        }
    }

    /// Records the values the client sent for the targeted attributes.
    pub fn set_requested_values(&mut self, requested: &EntityRef, targeted: &TargetedFields) {
        self.requested = targeted
            .attributes
            .iter()
            .map(|a| (a.public_name.clone(), a.get_value(requested.as_ref())))
            .collect();
    }

    /// Records the stored values before the write. A create has none.
    pub fn set_initial_values(&mut self, stored: &EntityRef) {
        self.initial = self.snapshot(stored);
    }

    pub fn set_final_values(&mut self, reloaded: &EntityRef) {
        self.finals = self.snapshot(reloaded);
    }

    /// An attribute changed implicitly when its final value differs from what the
    /// client requested, or, for attributes the client did not send, from the
    /// stored value before the write.
    pub fn has_implicit_changes(&self) -> bool {
        for (name, final_value) in &self.finals {
            let expected = match self.requested.get(name) {
                Some(requested) => Some(requested),
                None => self.initial.get(name),
            };
            if expected != Some(final_value) {
                debug!(resource = %self.resource.public_name, attribute = %name, "Detected implicit change");
                return true;
            }
        }
        false
    }

    fn snapshot(&self, entity: &EntityRef) -> HashMap<String, Value> {
        self.resource
            .attributes()
            .iter()
            .map(|a| (a.public_name.clone(), a.get_value(entity.as_ref())))
            .collect()
    }
}
