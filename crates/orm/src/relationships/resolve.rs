//! Relation Resolution Engine
//!
//! Local relations read the key stored on the instance and look the related
//! record up directly. Non-local relations scan the related (or join) store
//! once, keep the matching keys in the instance's derived cache, and from
//! then on are only moved by ADD/DELETE notifications.

use crate::error::{ModelError, ModelResult};
use crate::model::{Entity, KeyName, ModelRegistry, StoreKey};
use crate::relationships::{
    apply_order, CachedKeys, Delta, PivotLink, Relation, RelationKind, Subscriber,
};
use serde_json::Value;
use std::rc::Rc;
use tracing::{debug, trace};

/// Value of a relation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Related {
    One(Option<Entity>),
    Many(Vec<Entity>),
}

impl Related {
    pub fn one(self) -> Option<Entity> {
        match self {
            Related::One(entity) => entity,
            Related::Many(entities) => entities.into_iter().next(),
        }
    }

    pub fn many(self) -> Vec<Entity> {
        match self {
            Related::One(entity) => entity.into_iter().collect(),
            Related::Many(entities) => entities,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Related::One(entity) => usize::from(entity.is_some()),
            Related::Many(entities) => entities.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, entity: &Entity) -> bool {
        match self {
            Related::One(current) => current.as_ref() == Some(entity),
            Related::Many(entities) => entities.contains(entity),
        }
    }
}

impl ModelRegistry {
    /// Resolve relation `name` of `entity`
    pub fn related(&self, entity: &Entity, name: &str) -> ModelResult<Related> {
        let relation = self.relation_of(entity, name)?;
        if relation.is_local() {
            return Ok(self.resolve_local(entity, &relation));
        }

        let keys = self.ensure_loaded(entity, &relation);
        Ok(self.materialize(entity, &relation, &keys))
    }

    pub fn related_one(&self, entity: &Entity, name: &str) -> ModelResult<Option<Entity>> {
        self.related(entity, name).map(Related::one)
    }

    pub fn related_many(&self, entity: &Entity, name: &str) -> ModelResult<Vec<Entity>> {
        self.related(entity, name).map(Related::many)
    }

    pub(crate) fn relation_of(&self, entity: &Entity, name: &str) -> ModelResult<Rc<Relation>> {
        let schema = self.schema_of(entity.model())?;
        schema
            .relation(name)
            .cloned()
            .ok_or_else(|| ModelError::unknown_relation(&schema.name, name))
    }

    /// Resolve a belongs-to or has-many-by relation from the keys on `entity`
    pub(crate) fn resolve_local(&self, entity: &Entity, relation: &Relation) -> Related {
        match &relation.kind {
            RelationKind::BelongsTo => {
                let found = StoreKey::from_values(&entity.values(&relation.foreign_key))
                    .and_then(|key| {
                        let found =
                            self.find_first_by(relation.related, &relation.other_key, &key);
                        if found.is_none() && self.config.trace_relations {
                            debug!(
                                target: "entigraph::relations",
                                model = entity.model_name(),
                                relation = %relation.name,
                                key = %key,
                                "orphaned foreign key"
                            );
                        }
                        found
                    });
                Related::One(found)
            }
            RelationKind::HasManyBy => {
                let attribute = &relation.foreign_key.attributes()[0];
                let mut found: Vec<Entity> = match entity.get(attribute) {
                    Some(Value::Array(items)) => items
                        .iter()
                        .filter_map(|item| StoreKey::from_values(std::slice::from_ref(item)))
                        .filter_map(|key| {
                            self.find_first_by(relation.related, &relation.other_key, &key)
                        })
                        .collect(),
                    _ => Vec::new(),
                };
                apply_order(&mut found, relation.order.as_ref());
                Related::Many(found)
            }
            _ => Related::One(None),
        }
    }

    /// Derived cache entry of a non-local relation, scanning on first use
    pub(crate) fn ensure_loaded(&self, entity: &Entity, relation: &Relation) -> CachedKeys {
        if let Some(keys) = entity.cached(&relation.name) {
            return keys;
        }

        let keys = self.scan_relation(entity, relation);
        if self.config.trace_relations {
            debug!(
                target: "entigraph::relations",
                model = entity.model_name(),
                relation = %relation.name,
                found = keys.keys().len(),
                "initialized relation cache"
            );
        }
        entity.set_cached(&relation.name, keys.clone());
        keys
    }

    fn scan_relation(&self, entity: &Entity, relation: &Relation) -> CachedKeys {
        let many = relation.is_many();
        let link = relation.pivot_link();

        let near = StoreKey::from_values(&entity.values(&relation.other_key));
        let far = link
            .filter(|link| link.symmetric)
            .and_then(|link| StoreKey::from_values(&entity.values(&link.far_other_key)));
        if near.is_none() && far.is_none() {
            return CachedKeys::empty(many);
        }

        let scanned = relation.scanned_model();
        let Ok(entry) = self.root_entry(scanned) else {
            return CachedKeys::empty(many);
        };

        let matches = |candidate: &Entity| {
            let hit = |via: &KeyName, own: &Option<StoreKey>| {
                own.is_some() && StoreKey::from_values(&candidate.values(via)) == *own
            };
            hit(&relation.foreign_key, &near)
                || link.map_or(false, |link| link.symmetric && hit(&link.far_key, &far))
        };

        let mut keys = Vec::new();
        for (key, candidate) in entry.store.iter() {
            if self.is_kind_of(candidate.model(), scanned) && matches(candidate) {
                keys.push(key.clone());
                if !many {
                    break;
                }
            }
        }

        if many {
            CachedKeys::Many(keys)
        } else {
            CachedKeys::One(keys.into_iter().next())
        }
    }

    fn materialize(&self, entity: &Entity, relation: &Relation, keys: &CachedKeys) -> Related {
        match &relation.kind {
            RelationKind::HasOne => Related::One(
                keys.keys()
                    .first()
                    .and_then(|key| self.store_get(relation.related, key)),
            ),
            RelationKind::HasMany => {
                let mut found: Vec<Entity> = keys
                    .keys()
                    .iter()
                    .filter_map(|key| self.store_get(relation.related, key))
                    .collect();
                apply_order(&mut found, relation.order.as_ref());
                Related::Many(found)
            }
            RelationKind::BelongsToMany(link) => {
                let mut found: Vec<Entity> = keys
                    .keys()
                    .iter()
                    .filter_map(|key| self.store_get(link.pivot, key))
                    .filter_map(|row| self.far_end(entity, relation, link, &row))
                    .collect();
                apply_order(&mut found, relation.order.as_ref());
                Related::Many(found)
            }
            RelationKind::BelongsTo | RelationKind::HasManyBy => self.resolve_local(entity, relation),
        }
    }

    /// The end of a join row opposite to `entity`; `None` if it is missing
    fn far_end(
        &self,
        entity: &Entity,
        relation: &Relation,
        link: &PivotLink,
        row: &Entity,
    ) -> Option<Entity> {
        let pivot = self.schema_of(link.pivot).ok()?;
        let own = StoreKey::from_values(&entity.values(&relation.other_key));
        let row_near = StoreKey::from_values(&row.values(&relation.foreign_key));

        let accessor = if own.is_some() && row_near == own {
            &link.far_accessor
        } else {
            &link.near_accessor
        };
        let accessor = pivot.relation(accessor)?;
        self.resolve_local(row, accessor).one()
    }

    /// Deliver `delta` for `child` to every subscriber of its store
    pub(crate) fn notify_all(&self, child: &Entity, delta: Delta) {
        let subscribers = match self.root_entry(child.model()) {
            Ok(entry) => entry.subscribers.all(),
            Err(_) => return,
        };
        self.notify(child, &subscribers, delta);
    }

    /// Subscribers watching `attribute` on the store of `model`
    pub(crate) fn subscribers_for(&self, child: &Entity, attribute: &str) -> Vec<Rc<Subscriber>> {
        self.root_entry(child.model())
            .map(|entry| entry.subscribers.for_attribute(attribute))
            .unwrap_or_default()
    }

    /// Deliver `delta` for `child` to `subscribers`.
    ///
    /// The parent is found from the child's foreign key values; a missing
    /// parent is skipped.
    pub(crate) fn notify(&self, child: &Entity, subscribers: &[Rc<Subscriber>], delta: Delta) {
        let Some(child_key) = child.store_key() else {
            return;
        };

        for subscriber in subscribers {
            let relation = &subscriber.relation;
            if !self.is_kind_of(child.model(), relation.scanned_model()) {
                continue;
            }
            let Some(parent_key) = StoreKey::from_values(&child.values(&subscriber.via)) else {
                continue;
            };

            let parents = self.find_by(subscriber.parent, &subscriber.parent_key, &parent_key);
            if parents.is_empty() && self.config.trace_relations {
                trace!(
                    target: "entigraph::relations",
                    child = child.model_name(),
                    relation = %relation.name,
                    parent_key = %parent_key,
                    "no parent to notify"
                );
            }

            for parent in parents {
                let owns_relation = self
                    .schema_of(parent.model())
                    .ok()
                    .and_then(|schema| schema.relation(&relation.name).map(|r| Rc::ptr_eq(r, relation)))
                    .unwrap_or(false);
                if !owns_relation {
                    continue;
                }

                if parent.apply_delta(&relation.name, delta, &child_key) {
                    if self.config.trace_relations {
                        trace!(
                            target: "entigraph::relations",
                            parent = parent.model_name(),
                            relation = %relation.name,
                            child = %child_key,
                            delta = %delta,
                            "updated relation cache"
                        );
                    }
                    self.observers
                        .trigger_relation_cache_updated(&parent, &relation.name, delta, child);
                }
            }
        }
    }
}
