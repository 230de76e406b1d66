//! Model Registry - the context object owning every model's schema,
//! identity map and subscriber index
//!
//! A model and its subtypes share the root model's store and subscriber
//! index; per-model entries of subtypes only carry their schema.

use crate::error::{ModelError, ModelResult};
use crate::field::Field;
use crate::model::{Entity, EntityStore, Key, KeyName, StoreKey};
use crate::observers::{ObserverRegistry, StoreObserver};
use crate::relationships::{Relation, SubscriberIndex};
use entigraph_core::StoreConfig;
use std::collections::HashMap;
use std::rc::Rc;

/// Handle of a registered model, valid for the registry that issued it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(pub(crate) usize);

/// Resolved schema of one model
#[derive(Debug, Clone)]
pub struct ModelSchema {
    pub(crate) id: ModelId,
    pub(crate) name: Rc<str>,
    pub(crate) root: ModelId,
    pub(crate) base: Option<ModelId>,
    pub(crate) primary_key: KeyName,
    pub(crate) fields: Vec<(String, Field)>,
    pub(crate) relations: Vec<Rc<Relation>>,
    pub(crate) cascades: Vec<String>,
    pub(crate) synthesized: bool,
}

impl ModelSchema {
    pub fn id(&self) -> ModelId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Model owning the shared store
    pub fn root(&self) -> ModelId {
        self.root
    }

    pub fn base(&self) -> Option<ModelId> {
        self.base
    }

    pub fn primary_key(&self) -> &KeyName {
        &self.primary_key
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn relation(&self, name: &str) -> Option<&Rc<Relation>> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn relations(&self) -> &[Rc<Relation>] {
        &self.relations
    }

    pub fn cascades(&self) -> &[String] {
        &self.cascades
    }

    /// Join model generated for a many-to-many relation
    pub fn is_synthesized(&self) -> bool {
        self.synthesized
    }
}

pub(crate) struct ModelEntry {
    pub(crate) schema: Rc<ModelSchema>,
    pub(crate) store: EntityStore,
    pub(crate) subscribers: SubscriberIndex,
}

pub struct ModelRegistry {
    pub(crate) config: StoreConfig,
    pub(crate) entries: Vec<ModelEntry>,
    pub(crate) names: HashMap<String, ModelId>,
    pub(crate) pivots: HashMap<String, ModelId>,
    pub(crate) observers: ObserverRegistry,
    /// Instances whose delete is in progress, guarding cascade cycles
    pub(crate) deleting: Vec<Entity>,
}

impl ModelRegistry {
    pub(crate) fn new(config: StoreConfig) -> Self {
        Self {
            config,
            entries: Vec::new(),
            names: HashMap::new(),
            pivots: HashMap::new(),
            observers: ObserverRegistry::new(),
            deleting: Vec::new(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn model_id(&self, name: &str) -> ModelResult<ModelId> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| ModelError::UnknownModel(name.to_string()))
    }

    pub fn schema(&self, model: &str) -> ModelResult<Rc<ModelSchema>> {
        let id = self.model_id(model)?;
        self.schema_of(id)
    }

    pub fn schema_of(&self, id: ModelId) -> ModelResult<Rc<ModelSchema>> {
        Ok(Rc::clone(&self.entry(id)?.schema))
    }

    /// Registered model names in registration order
    pub fn model_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.schema.name()).collect()
    }

    /// `model` is `ancestor` or one of its subtypes
    pub fn is_kind_of(&self, model: ModelId, ancestor: ModelId) -> bool {
        let mut current = Some(model);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.entries.get(id.0).and_then(|e| e.schema.base);
        }
        false
    }

    pub fn observe(&mut self, observer: Rc<dyn StoreObserver>) {
        self.observers.register(observer);
    }

    /// Instance stored under `key`, if any
    pub fn get(&self, model: &str, key: impl Into<Key>) -> ModelResult<Option<Entity>> {
        let schema = self.schema(model)?;
        let key = key.into();
        key.check_shape(&schema.primary_key)?;
        Ok(self.store_get(schema.id, &key.store_key()))
    }

    /// Instances stored under `keys`, in input order; unknown keys are skipped
    pub fn get_many<K, I>(&self, model: &str, keys: I) -> ModelResult<Vec<Entity>>
    where
        K: Into<Key>,
        I: IntoIterator<Item = K>,
    {
        let schema = self.schema(model)?;
        let mut found = Vec::new();
        for key in keys {
            let key = key.into();
            key.check_shape(&schema.primary_key)?;
            if let Some(entity) = self.store_get(schema.id, &key.store_key()) {
                found.push(entity);
            }
        }
        Ok(found)
    }

    /// Number of stored instances of `model` and its subtypes
    pub fn count(&self, model: &str) -> ModelResult<usize> {
        let id = self.model_id(model)?;
        let store = &self.root_entry(id)?.store;
        Ok(store
            .iter()
            .filter(|(_, e)| self.is_kind_of(e.model(), id))
            .count())
    }

    /// `entity` is the canonical instance under its key
    pub fn is_stored(&self, entity: &Entity) -> bool {
        entity
            .store_key()
            .and_then(|key| self.store_get(entity.model(), &key))
            .map_or(false, |stored| stored.is(entity))
    }

    /// Name of the join model linking two models, if one was synthesized
    pub fn pivot(&self, a: &str, b: &str) -> Option<String> {
        let name = crate::relationships::pivot_name(a, b, &self.config.pivot_separator);
        self.pivots.contains_key(&name).then_some(name)
    }

    /// Number of parent relations subscribed to the store of `model`
    pub fn subscriber_count(&self, model: &str) -> ModelResult<usize> {
        let id = self.model_id(model)?;
        Ok(self.root_entry(id)?.subscribers.len())
    }

    pub(crate) fn entry(&self, id: ModelId) -> ModelResult<&ModelEntry> {
        self.entries
            .get(id.0)
            .ok_or_else(|| ModelError::UnknownModel(format!("#{}", id.0)))
    }

    pub(crate) fn entry_mut(&mut self, id: ModelId) -> ModelResult<&mut ModelEntry> {
        self.entries
            .get_mut(id.0)
            .ok_or_else(|| ModelError::UnknownModel(format!("#{}", id.0)))
    }

    pub(crate) fn root_entry(&self, id: ModelId) -> ModelResult<&ModelEntry> {
        let root = self.entry(id)?.schema.root;
        self.entry(root)
    }

    pub(crate) fn root_entry_mut(&mut self, id: ModelId) -> ModelResult<&mut ModelEntry> {
        let root = self.entry(id)?.schema.root;
        self.entry_mut(root)
    }

    pub(crate) fn store_get(&self, model: ModelId, key: &StoreKey) -> Option<Entity> {
        self.root_entry(model)
            .ok()
            .and_then(|entry| entry.store.get(key).cloned())
    }

    /// Instances of `model` whose `key_name` attributes match `key`.
    ///
    /// Uses the identity map when `key_name` is the primary key and falls
    /// back to a scan otherwise.
    pub(crate) fn find_by(&self, model: ModelId, key_name: &KeyName, key: &StoreKey) -> Vec<Entity> {
        let Ok(entry) = self.root_entry(model) else {
            return Vec::new();
        };

        if *key_name == entry.schema.primary_key {
            return entry.store.get(key).cloned().into_iter().collect();
        }

        entry
            .store
            .iter()
            .filter(|(_, candidate)| {
                StoreKey::from_values(&candidate.values(key_name)).as_ref() == Some(key)
            })
            .map(|(_, candidate)| candidate.clone())
            .collect()
    }

    pub(crate) fn find_first_by(
        &self,
        model: ModelId,
        key_name: &KeyName,
        key: &StoreKey,
    ) -> Option<Entity> {
        self.find_by(model, key_name, key).into_iter().next()
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stores: Vec<(&str, usize)> = self
            .entries
            .iter()
            .filter(|e| e.schema.root == e.schema.id)
            .map(|e| (e.schema.name(), e.store.len()))
            .collect();
        f.debug_struct("ModelRegistry")
            .field("config", &self.config)
            .field("stores", &stores)
            .field("observers", &self.observers.observer_count())
            .finish()
    }
}
