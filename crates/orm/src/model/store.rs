//! Entity Store - the identity map of one root model

use crate::model::{Entity, StoreKey};
use std::collections::{BTreeMap, HashMap};

/// At most one instance per canonical key, iterated in insertion order
#[derive(Debug, Default)]
pub struct EntityStore {
    entries: HashMap<StoreKey, (u64, Entity)>,
    order: BTreeMap<u64, StoreKey>,
    next_seq: u64,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &StoreKey) -> Option<&Entity> {
        self.entries.get(key).map(|(_, entity)| entity)
    }

    pub fn contains(&self, key: &StoreKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert under `key` unless it is taken; returns the canonical instance
    pub fn insert(&mut self, key: StoreKey, entity: Entity) -> Entity {
        if let Some((_, existing)) = self.entries.get(&key) {
            return existing.clone();
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, key.clone());
        self.entries.insert(key, (seq, entity.clone()));
        entity
    }

    /// Remove the instance under `key`; removing a missing key is a no-op
    pub fn remove(&mut self, key: &StoreKey) -> Option<Entity> {
        let (seq, entity) = self.entries.remove(key)?;
        self.order.remove(&seq);
        Some(entity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&StoreKey, &Entity)> + '_ {
        self.order.values().filter_map(move |key| {
            self.entries
                .get_key_value(key)
                .map(|(key, (_, entity))| (key, entity))
        })
    }

    /// Snapshot of the instances in insertion order
    pub fn entities(&self) -> Vec<Entity> {
        self.iter().map(|(_, entity)| entity.clone()).collect()
    }
}
