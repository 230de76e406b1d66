//! Entity handles
//!
//! An [`Entity`] is a cheap, cloneable handle to one in-memory record.
//! Identity is pointer identity: two handles are equal only when they refer
//! to the same record. Writes that must keep relation caches consistent go
//! through [`ModelRegistry`](super::ModelRegistry); the handle itself only
//! offers reads and event hooks.

use crate::error::{ModelError, ModelResult};
use crate::events::{EntityEvent, ListenerId, Listeners};
use crate::model::{Key, KeyName, KeyValue, ModelId, StoreKey};
use crate::relationships::{CachedKeys, Delta};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

struct EntityInner {
    model: ModelId,
    model_name: Rc<str>,
    primary_key: KeyName,
    attributes: RefCell<Map<String, Value>>,
    relation_cache: RefCell<HashMap<String, CachedKeys>>,
    listeners: RefCell<Listeners>,
}

#[derive(Clone)]
pub struct Entity(Rc<EntityInner>);

impl Entity {
    pub(crate) fn new(
        model: ModelId,
        model_name: Rc<str>,
        primary_key: KeyName,
        attributes: Map<String, Value>,
    ) -> Self {
        Entity(Rc::new(EntityInner {
            model,
            model_name,
            primary_key,
            attributes: RefCell::new(attributes),
            relation_cache: RefCell::new(HashMap::new()),
            listeners: RefCell::new(Listeners::default()),
        }))
    }

    pub fn model(&self) -> ModelId {
        self.0.model
    }

    pub fn model_name(&self) -> &str {
        &self.0.model_name
    }

    pub fn primary_key(&self) -> &KeyName {
        &self.0.primary_key
    }

    pub fn get(&self, attribute: &str) -> Option<Value> {
        self.0.attributes.borrow().get(attribute).cloned()
    }

    /// Snapshot of every attribute
    pub fn attributes(&self) -> Map<String, Value> {
        self.0.attributes.borrow().clone()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.attributes())
    }

    /// Values of `key` in declared order, `null` for missing attributes
    pub fn values(&self, key: &KeyName) -> Vec<Value> {
        let attributes = self.0.attributes.borrow();
        key.attributes()
            .iter()
            .map(|name| attributes.get(name).cloned().unwrap_or(Value::Null))
            .collect()
    }

    /// Primary key, or `None` while a key attribute holds no usable value
    pub fn key(&self) -> Option<Key> {
        self.try_key().ok()
    }

    pub fn store_key(&self) -> Option<StoreKey> {
        self.key().map(|key| key.store_key())
    }

    pub(crate) fn try_key(&self) -> ModelResult<Key> {
        let values = self.values(&self.0.primary_key);
        let mut parts = Vec::with_capacity(values.len());
        for (name, value) in self.0.primary_key.attributes().iter().zip(&values) {
            if value.is_null() {
                return Err(ModelError::InvalidKey(format!(
                    "{}.{} has no value",
                    self.0.model_name, name
                )));
            }
            parts.push(KeyValue::from_json(value)?);
        }

        Ok(match &self.0.primary_key {
            KeyName::Single(_) => Key::Scalar(parts.remove(0)),
            KeyName::Composite(_) => Key::Composite(parts),
        })
    }

    /// Same underlying record
    pub fn is(&self, other: &Entity) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Whether the derived cache of a non-local relation has been built
    pub fn is_relation_loaded(&self, relation: &str) -> bool {
        self.0.relation_cache.borrow().contains_key(relation)
    }

    /// Register a listener; returns an id usable with [`Entity::off`]
    pub fn on<F>(&self, event: EntityEvent, listener: F) -> ListenerId
    where
        F: Fn(&Entity) -> bool + 'static,
    {
        self.0.listeners.borrow_mut().add(event, Rc::new(listener))
    }

    pub fn off(&self, event: EntityEvent, id: ListenerId) -> bool {
        self.0.listeners.borrow_mut().remove(event, id)
    }

    /// Run every listener of `event`; `false` if any of them returned `false`
    pub fn emit(&self, event: EntityEvent) -> bool {
        let listeners = self.0.listeners.borrow().snapshot(event);
        let mut allowed = true;
        for listener in listeners {
            allowed &= listener(self);
        }
        allowed
    }

    pub(crate) fn write(&self, attribute: &str, value: Value) -> Option<Value> {
        self.0
            .attributes
            .borrow_mut()
            .insert(attribute.to_string(), value)
    }

    pub(crate) fn cached(&self, relation: &str) -> Option<CachedKeys> {
        self.0.relation_cache.borrow().get(relation).cloned()
    }

    pub(crate) fn set_cached(&self, relation: &str, keys: CachedKeys) {
        self.0
            .relation_cache
            .borrow_mut()
            .insert(relation.to_string(), keys);
    }

    /// Move an initialized cache entry; uninitialized entries stay untouched
    pub(crate) fn apply_delta(&self, relation: &str, delta: Delta, key: &StoreKey) -> bool {
        match self.0.relation_cache.borrow_mut().get_mut(relation) {
            Some(keys) => keys.apply(delta, key),
            None => false,
        }
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.is(other)
    }
}

impl Eq for Entity {}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("model", &self.0.model_name)
            .field("attributes", &*self.0.attributes.borrow())
            .field("listeners", &self.0.listeners.borrow().len())
            .finish()
    }
}
