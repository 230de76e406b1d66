//! Relation assignment - writing nested payloads through a relation
//!
//! Assigning to a loaded has-one, has-many or many-to-many relation replaces
//! its contents: the current related records (and, for many-to-many, the
//! join rows) are deleted before the payload is written.

use crate::error::ModelResult;
use crate::model::crud_operations::into_object;
use crate::model::{Entity, KeyName, ModelId, ModelRegistry, StoreKey};
use crate::relationships::{Relation, RelationKind};
use serde_json::{Map, Value};
use tracing::debug;

/// Put `values` under the attributes of `key`. A single attribute receiving
/// a composite key stores it as an array.
fn put_key(target: &mut Map<String, Value>, key: &KeyName, values: &[Value]) {
    let attributes = key.attributes();
    if attributes.len() == values.len() {
        for (attribute, value) in attributes.iter().zip(values) {
            target.insert(attribute.clone(), value.clone());
        }
    } else if let Some(attribute) = attributes.first() {
        target.insert(attribute.clone(), Value::Array(values.to_vec()));
    }
}

fn key_item(values: Vec<Value>) -> Value {
    if values.len() == 1 {
        values.into_iter().next().unwrap_or(Value::Null)
    } else {
        Value::Array(values)
    }
}

impl ModelRegistry {
    /// Assign `payload` to relation `name` of `entity`.
    ///
    /// A payload is an object or an array of objects. Each item is filled
    /// into the stored record under its key or created. `null` clears a
    /// belongs-to foreign key.
    pub fn assign_relation(&mut self, entity: &Entity, name: &str, payload: Value) -> ModelResult<()> {
        let relation = self.relation_of(entity, name)?;
        let related = self.schema_of(relation.related)?.name.to_string();

        if !relation.is_local() && entity.is_relation_loaded(name) {
            self.detach_current(entity, &relation)?;
        }

        if payload.is_null() {
            if matches!(relation.kind, RelationKind::BelongsTo) {
                for attribute in relation.foreign_key.attributes() {
                    self.set(entity, attribute, Value::Null)?;
                }
            }
            return Ok(());
        }

        let items = match payload {
            Value::Array(items) => items,
            single => vec![single],
        };

        match &relation.kind {
            RelationKind::BelongsTo => {
                let Some(item) = items.into_iter().next() else {
                    return Ok(());
                };
                let target = self.fill_or_create(&related, item)?;
                let mut keys = Map::new();
                put_key(&mut keys, &relation.foreign_key, &target.values(&relation.other_key));
                for (attribute, value) in keys {
                    self.set(entity, &attribute, value)?;
                }
            }
            RelationKind::HasOne | RelationKind::HasMany => {
                let own = entity.values(&relation.other_key);
                let limit = if relation.is_many() { items.len() } else { 1 };
                for item in items.into_iter().take(limit) {
                    let mut item = into_object(&related, item)?;
                    put_key(&mut item, &relation.foreign_key, &own);
                    self.fill_or_create(&related, Value::Object(item))?;
                }
            }
            RelationKind::HasManyBy => {
                let attribute = &relation.foreign_key.attributes()[0];
                let mut keys = match entity.get(attribute) {
                    Some(Value::Array(keys)) => keys,
                    _ => Vec::new(),
                };
                for item in items {
                    let target = self.fill_or_create(&related, item)?;
                    let key = key_item(target.values(&relation.other_key));
                    if !keys.contains(&key) {
                        keys.push(key);
                    }
                }
                self.set(entity, attribute, Value::Array(keys))?;
            }
            RelationKind::BelongsToMany(link) => {
                let pivot = self.schema_of(link.pivot)?.name.to_string();
                let near = entity.values(&relation.other_key);
                for item in items {
                    let far = self.fill_or_create(&related, item)?;
                    let far_values = far.values(&link.far_other_key);
                    if self.is_linked(link.pivot, &relation, &near, &link.far_key, &far_values) {
                        continue;
                    }

                    let mut row = Map::new();
                    put_key(&mut row, &relation.foreign_key, &near);
                    put_key(&mut row, &link.far_key, &far_values);
                    self.create(&pivot, Value::Object(row))?;
                }
            }
        }
        Ok(())
    }

    fn detach_current(&mut self, entity: &Entity, relation: &Relation) -> ModelResult<()> {
        let current = self.dependents(entity, relation)?;

        if self.config.trace_relations {
            debug!(
                target: "entigraph::relations",
                model = entity.model_name(),
                relation = %relation.name,
                count = current.len(),
                "replacing relation contents"
            );
        }
        for record in current {
            self.delete(&record)?;
        }
        Ok(())
    }

    fn is_linked(
        &self,
        pivot: ModelId,
        relation: &Relation,
        near: &[Value],
        far_key: &KeyName,
        far: &[Value],
    ) -> bool {
        let mut expected = Map::new();
        put_key(&mut expected, &relation.foreign_key, near);
        put_key(&mut expected, far_key, far);
        let columns: Vec<&String> = expected.keys().collect();

        let Ok(entry) = self.root_entry(pivot) else {
            return false;
        };
        entry.store.iter().any(|(_, row)| {
            columns.iter().all(|column| {
                let want = expected.get(column.as_str()).map(std::slice::from_ref);
                let have = row.get(column);
                match (want, have) {
                    (Some(want), Some(have)) => {
                        StoreKey::from_values(want) == StoreKey::from_values(std::slice::from_ref(&have))
                    }
                    _ => false,
                }
            })
        })
    }
}
