//! Query Methods - scans over a model's store in insertion order
//!
//! Querying a base model includes the instances of its subtypes.

use crate::error::ModelResult;
use crate::model::{Entity, ModelRegistry};
use serde_json::{Map, Value};
use std::fmt;
use std::rc::Rc;

/// Filter for [`ModelRegistry::where_all`]
#[derive(Clone)]
pub enum Condition {
    /// Every listed attribute equals the given value
    Attributes(Map<String, Value>),
    Predicate(Rc<dyn Fn(&Entity) -> bool>),
}

impl Condition {
    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&Entity) -> bool + 'static,
    {
        Condition::Predicate(Rc::new(predicate))
    }

    pub fn matches(&self, entity: &Entity) -> bool {
        match self {
            Condition::Attributes(expected) => expected
                .iter()
                .all(|(attribute, value)| entity.get(attribute).as_ref() == Some(value)),
            Condition::Predicate(predicate) => predicate(entity),
        }
    }
}

impl From<Map<String, Value>> for Condition {
    fn from(attributes: Map<String, Value>) -> Self {
        Condition::Attributes(attributes)
    }
}

impl From<Value> for Condition {
    /// Non-object values match nothing.
    fn from(value: Value) -> Self {
        match value {
            Value::Object(attributes) => Condition::Attributes(attributes),
            _ => Condition::predicate(|_| false),
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Attributes(attributes) => {
                f.debug_tuple("Attributes").field(attributes).finish()
            }
            Condition::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl ModelRegistry {
    /// Stored instances of `model` and its subtypes
    pub fn all(&self, model: &str) -> ModelResult<Vec<Entity>> {
        let id = self.model_id(model)?;
        Ok(self
            .root_entry(id)?
            .store
            .iter()
            .filter(|(_, entity)| self.is_kind_of(entity.model(), id))
            .map(|(_, entity)| entity.clone())
            .collect())
    }

    pub fn first(&self, model: &str) -> ModelResult<Option<Entity>> {
        Ok(self.all(model)?.into_iter().next())
    }

    pub fn where_all(&self, model: &str, condition: impl Into<Condition>) -> ModelResult<Vec<Entity>> {
        let condition = condition.into();
        Ok(self
            .all(model)?
            .into_iter()
            .filter(|entity| condition.matches(entity))
            .collect())
    }

    pub fn where_first(
        &self,
        model: &str,
        condition: impl Into<Condition>,
    ) -> ModelResult<Option<Entity>> {
        Ok(self.where_all(model, condition)?.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use crate::schema::{ModelDef, Schema};
    use serde_json::json;

    fn registry() -> ModelRegistry {
        Schema::new()
            .model(
                ModelDef::new("Animal")
                    .field("name", Field::string())
                    .field("legs", Field::number()),
            )
            .model(ModelDef::new("Bird").extends("Animal").field("wingspan", Field::number()))
            .boot()
            .unwrap()
    }

    #[test]
    fn test_all_keeps_insertion_order_and_includes_subtypes() {
        let mut registry = registry();
        registry.create("Animal", json!({ "id": "a", "name": "cat", "legs": 4 })).unwrap();
        registry.create("Bird", json!({ "id": "b", "name": "owl", "legs": 2 })).unwrap();
        registry.create("Animal", json!({ "id": "c", "name": "dog", "legs": 4 })).unwrap();

        let names: Vec<Value> = registry
            .all("Animal")
            .unwrap()
            .iter()
            .filter_map(|e| e.get("name"))
            .collect();
        assert_eq!(names, vec![json!("cat"), json!("owl"), json!("dog")]);

        let birds = registry.all("Bird").unwrap();
        assert_eq!(birds.len(), 1);
        assert_eq!(birds[0].get("name"), Some(json!("owl")));
    }

    #[test]
    fn test_where_by_attributes_and_predicate() {
        let mut registry = registry();
        registry.create("Animal", json!({ "id": "a", "name": "cat", "legs": 4 })).unwrap();
        registry.create("Animal", json!({ "id": "b", "name": "snake", "legs": 0 })).unwrap();
        registry.create("Animal", json!({ "id": "c", "name": "dog", "legs": 4 })).unwrap();

        assert_eq!(registry.where_all("Animal", json!({ "legs": 4 })).unwrap().len(), 2);

        let legless = registry
            .where_first(
                "Animal",
                Condition::predicate(|e| e.get("legs") == Some(json!(0))),
            )
            .unwrap()
            .unwrap();
        assert_eq!(legless.get("name"), Some(json!("snake")));

        assert!(registry.where_first("Animal", json!({ "legs": 3 })).unwrap().is_none());
        assert_eq!(registry.first("Animal").unwrap().unwrap().get("name"), Some(json!("cat")));
    }
}
