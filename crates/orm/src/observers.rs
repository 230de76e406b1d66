//! Optional observation hook for hosts that mirror the graph elsewhere
//! (UI bindings, audit logs). The engine never depends on an observer.

use crate::model::Entity;
use crate::relationships::Delta;
use serde_json::Value;
use std::rc::Rc;

pub trait StoreObserver {
    fn saved(&self, _entity: &Entity) {}

    fn deleted(&self, _entity: &Entity) {}

    fn attribute_changed(
        &self,
        _entity: &Entity,
        _attribute: &str,
        _old: Option<&Value>,
        _new: &Value,
    ) {
    }

    fn relation_cache_updated(
        &self,
        _parent: &Entity,
        _relation: &str,
        _delta: Delta,
        _child: &Entity,
    ) {
    }
}

#[derive(Default)]
pub struct ObserverRegistry {
    observers: Vec<Rc<dyn StoreObserver>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, observer: Rc<dyn StoreObserver>) {
        self.observers.push(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn trigger_saved(&self, entity: &Entity) {
        for observer in &self.observers {
            observer.saved(entity);
        }
    }

    pub fn trigger_deleted(&self, entity: &Entity) {
        for observer in &self.observers {
            observer.deleted(entity);
        }
    }

    pub fn trigger_attribute_changed(
        &self,
        entity: &Entity,
        attribute: &str,
        old: Option<&Value>,
        new: &Value,
    ) {
        for observer in &self.observers {
            observer.attribute_changed(entity, attribute, old, new);
        }
    }

    pub fn trigger_relation_cache_updated(
        &self,
        parent: &Entity,
        relation: &str,
        delta: Delta,
        child: &Entity,
    ) {
        for observer in &self.observers {
            observer.relation_cache_updated(parent, relation, delta, child);
        }
    }
}
