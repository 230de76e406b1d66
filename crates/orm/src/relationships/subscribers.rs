//! Subscriber Index - which parent relations depend on which child attributes

use crate::model::{KeyName, ModelId};
use crate::relationships::Relation;
use std::collections::HashMap;
use std::rc::Rc;

/// A parent relation whose derived cache follows a child attribute set
#[derive(Debug, Clone)]
pub struct Subscriber {
    /// Model declaring the relation
    pub parent: ModelId,
    pub relation: Rc<Relation>,
    /// Child attributes holding the parent key
    pub via: KeyName,
    /// Parent attributes matched by `via`
    pub parent_key: KeyName,
}

impl Subscriber {
    fn same_as(&self, other: &Subscriber) -> bool {
        self.parent == other.parent
            && self.relation.name == other.relation.name
            && self.via == other.via
    }
}

/// Per root model index from foreign key attribute to subscribers
#[derive(Debug, Default, Clone)]
pub struct SubscriberIndex {
    by_attribute: HashMap<String, Vec<Rc<Subscriber>>>,
    all: Vec<Rc<Subscriber>>,
}

impl SubscriberIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber once per (parent, relation, via)
    pub fn subscribe(&mut self, subscriber: Subscriber) -> bool {
        if self.all.iter().any(|s| s.same_as(&subscriber)) {
            return false;
        }

        let subscriber = Rc::new(subscriber);
        for attribute in subscriber.via.attributes() {
            self.by_attribute
                .entry(attribute.clone())
                .or_default()
                .push(Rc::clone(&subscriber));
        }
        self.all.push(subscriber);
        true
    }

    /// Snapshot of the subscribers watching `attribute`
    pub fn for_attribute(&self, attribute: &str) -> Vec<Rc<Subscriber>> {
        self.by_attribute
            .get(attribute)
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of every subscriber
    pub fn all(&self) -> Vec<Rc<Subscriber>> {
        self.all.clone()
    }

    pub fn watches(&self, attribute: &str) -> bool {
        self.by_attribute.contains_key(attribute)
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}
