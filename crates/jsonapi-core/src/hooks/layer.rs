//! # Entity Tree Layers
//!
//! Breadth-first slices of the relationship tree rooted at the primary entities.
//! Layer N+1 holds every entity reachable through one relationship from layer N
//! that has not been seen earlier in the same traversal.

use crate::entity::{EntityKey, EntityRef};
use crate::graph::{Relationship, RelationshipKind, RelationshipValue, ResourceGraph};
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Entities already processed in one traversal, per model type.
#[derive(Debug, Default)]
pub struct VisitedSet {
    seen: HashMap<TypeId, HashSet<EntityKey>>,
    removed: HashSet<EntityKey>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `entity` as visited; returns false when it already was.
    pub fn insert(&mut self, entity: &EntityRef) -> bool {
        self.seen
            .entry(entity.model_type())
            .or_default()
            .insert(EntityKey::of(entity))
    }

    pub fn contains(&self, entity: &EntityRef) -> bool {
        self.seen
            .get(&entity.model_type())
            .is_some_and(|keys| keys.contains(&EntityKey::of(entity)))
    }

    pub fn len(&self) -> usize {
        self.seen.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records an entity a hook filtered out. Later layers detach it from every
    /// origin that still references it.
    pub fn mark_removed(&mut self, key: EntityKey) {
        self.removed.insert(key);
    }

    pub fn is_removed(&self, entity: &EntityRef) -> bool {
        self.removed.contains(&EntityKey::of(entity))
    }
}

/// Entities reached from `origins` through one relationship.
#[derive(Debug, Clone)]
pub struct RelationshipGroup {
    pub relationship: Arc<Relationship>,
    /// Entities of the previous layer that hold the relationship.
    pub origins: Vec<EntityRef>,
    /// Newly reached entities. Empty when every target was visited earlier.
    pub entities: Vec<EntityRef>,
}

/// All new entities of one model type within a layer.
#[derive(Debug, Clone)]
pub struct NodeInLayer {
    pub model: TypeId,
    pub entities: Vec<EntityRef>,
    pub groups: Vec<RelationshipGroup>,
}

impl NodeInLayer {
    pub fn relationships(&self) -> Vec<Arc<Relationship>> {
        self.groups.iter().map(|g| Arc::clone(&g.relationship)).collect()
    }

    /// Keeps only `survivors` and detaches every other entity of this node from the
    /// relationships of its origins.
    ///
    /// To-one values pointing at a removed entity are cleared; to-many and
    /// many-to-many values lose the removed entities. The removed keys are kept in
    /// `visited`, so origins found in later layers are detached as well.
    pub fn apply_filter(&mut self, survivors: &[EntityRef], visited: &mut VisitedSet) {
        let kept: HashSet<EntityKey> = survivors.iter().map(EntityKey::of).collect();
        let removed: HashSet<EntityKey> = self
            .entities
            .iter()
            .map(EntityKey::of)
            .filter(|key| !kept.contains(key))
            .collect();
        if removed.is_empty() {
            return;
        }

        for group in &mut self.groups {
            for origin in &group.origins {
                reassign(origin, &group.relationship, &removed);
            }
            group
                .entities
                .retain(|entity| !removed.contains(&EntityKey::of(entity)));
        }
        self.entities
            .retain(|entity| !removed.contains(&EntityKey::of(entity)));
        for key in removed {
            visited.mark_removed(key);
        }
    }
}

fn reassign(origin: &EntityRef, relationship: &Relationship, removed: &HashSet<EntityKey>) {
    match (relationship.kind, relationship.get_value(origin)) {
        (RelationshipKind::ToOne, RelationshipValue::ToOne(Some(target))) => {
            if removed.contains(&EntityKey::of(&target)) {
                relationship.set_value(origin, RelationshipValue::ToOne(None));
            }
        }
        (_, RelationshipValue::ToMany(targets)) => {
            let before = targets.len();
            let retained: Vec<EntityRef> = targets
                .into_iter()
                .filter(|target| !removed.contains(&EntityKey::of(target)))
                .collect();
            if retained.len() != before {
                relationship.set_value(origin, RelationshipValue::ToMany(retained));
            }
        }
        _ => {}
    }
}

/// One breadth-first layer of the traversal.
#[derive(Debug, Clone)]
pub struct EntityTreeLayer {
    pub depth: usize,
    pub nodes: Vec<NodeInLayer>,
}

impl EntityTreeLayer {
    /// The root layer. Duplicate roots collapse into one entry.
    pub fn root(entities: Vec<EntityRef>, visited: &mut VisitedSet) -> Self {
        let mut nodes: Vec<NodeInLayer> = Vec::new();
        for entity in entities {
            if !visited.insert(&entity) {
                continue;
            }
            let model = entity.model_type();
            match nodes.iter_mut().find(|n| n.model == model) {
                Some(node) => node.entities.push(entity),
                None => nodes.push(NodeInLayer {
                    model,
                    entities: vec![entity],
                    groups: Vec::new(),
                }),
            }
        }
        Self { depth: 0, nodes }
    }

    /// The layer reachable from this one, restricted to relationships accepted by
    /// `follow`. Entities already in `visited` are skipped, so cyclic graphs end,
    /// but their origins still get a group. Targets filtered out earlier in the
    /// traversal are detached from the origins here.
    pub fn next(
        &self,
        graph: &ResourceGraph,
        visited: &mut VisitedSet,
        follow: impl Fn(&Relationship) -> bool,
    ) -> EntityTreeLayer {
        let mut nodes: Vec<NodeInLayer> = Vec::new();

        for node in &self.nodes {
            let Some(resource_type) = graph.get_resource_type_by_model(node.model) else {
                continue;
            };
            for relationship in resource_type.relationships() {
                if !follow(relationship) {
                    continue;
                }
                let mut origins = Vec::new();
                let mut reached = Vec::new();
                for origin in &node.entities {
                    let mut targets = relationship.get_value(origin).into_entities();
                    if targets.iter().any(|t| visited.is_removed(t)) {
                        reassign(origin, relationship, &visited.removed);
                        targets.retain(|t| !visited.is_removed(t));
                    }
                    if targets.is_empty() {
                        continue;
                    }
                    origins.push(Arc::clone(origin));
                    for target in targets {
                        if visited.insert(&target) {
                            reached.push(target);
                        }
                    }
                }
                if origins.is_empty() {
                    continue;
                }

                let model = relationship.right_model;
                let group = RelationshipGroup {
                    relationship: Arc::clone(relationship),
                    origins,
                    entities: reached.clone(),
                };
                match nodes.iter_mut().find(|n| n.model == model) {
                    Some(existing) => {
                        existing.entities.extend(reached);
                        existing.groups.push(group);
                    }
                    None => nodes.push(NodeInLayer {
                        model,
                        entities: reached,
                        groups: vec![group],
                    }),
                }
            }
        }

        EntityTreeLayer {
            depth: self.depth + 1,
            nodes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.iter().all(|n| n.entities.is_empty())
    }

    pub fn entities(&self) -> Vec<EntityRef> {
        self.nodes.iter().flat_map(|n| n.entities.clone()).collect()
    }
}
