//! CRUD Operations - construction, saving, attribute writes and deletion
//!
//! Every write that can move a foreign key goes through
//! [`ModelRegistry::write_attribute`], which brackets the write with a
//! DELETE notification for the old value and an ADD for the new one.

use crate::error::{ModelError, ModelResult};
use crate::events::EntityEvent;
use crate::model::{Entity, ModelRegistry, ModelSchema, StoreKey};
use crate::relationships::{Delta, Relation, RelationKind};
use serde_json::{Map, Value};
use std::rc::Rc;
use tracing::{debug, warn};

/// Hook run on every instance about to be deleted, cascaded children
/// included. An error aborts the delete and propagates unchanged.
pub type BeforeDelete<'a> = &'a mut dyn FnMut(&mut ModelRegistry, &Entity) -> ModelResult<()>;

/// Options of [`ModelRegistry::delete_with`]
pub struct DeleteOptions<'a> {
    /// Delete the records of the model's cascade relations first
    pub cascade: bool,
    pub before_delete: Option<BeforeDelete<'a>>,
}

impl Default for DeleteOptions<'_> {
    fn default() -> Self {
        Self {
            cascade: true,
            before_delete: None,
        }
    }
}

impl<'a> DeleteOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_cascade(mut self) -> Self {
        self.cascade = false;
        self
    }

    pub fn before_delete(mut self, hook: BeforeDelete<'a>) -> Self {
        self.before_delete = Some(hook);
        self
    }
}

pub(crate) fn into_object(model: &str, values: Value) -> ModelResult<Map<String, Value>> {
    match values {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(ModelError::invalid_value(model, "object", &other)),
    }
}

impl ModelRegistry {
    /// Build an unsaved instance.
    ///
    /// Missing fields take their defaults. Values under a relation name are
    /// assigned through that relation, which may create related records.
    pub fn make(&mut self, model: &str, values: Value) -> ModelResult<Entity> {
        let schema = self.schema(model)?;
        let values = into_object(&schema.name, values)?;
        self.check_attributes(&schema, &values)?;

        let mut attributes = Map::new();
        for (name, field) in &schema.fields {
            let value = field.value_for_write(&schema.name, name, values.get(name))?;
            attributes.insert(name.clone(), value);
        }

        let entity = Entity::new(
            schema.id,
            Rc::clone(&schema.name),
            schema.primary_key.clone(),
            attributes,
        );

        for relation in &schema.relations {
            match values.get(&relation.name) {
                Some(payload) if !payload.is_null() => {
                    self.assign_relation(&entity, &relation.name, payload.clone())?;
                }
                _ => {}
            }
        }

        Ok(entity)
    }

    /// Build and save
    pub fn create(&mut self, model: &str, values: Value) -> ModelResult<Entity> {
        let entity = self.make(model, values)?;
        self.save(&entity)
    }

    pub fn create_all<I>(&mut self, model: &str, values: I) -> ModelResult<Vec<Entity>>
    where
        I: IntoIterator<Item = Value>,
    {
        values
            .into_iter()
            .map(|v| self.create(model, v))
            .collect()
    }

    /// Instance under the key found in `values`, created when absent
    pub fn get_or_create(&mut self, model: &str, values: Value) -> ModelResult<Entity> {
        match self.find_by_values(model, &values)? {
            Some(existing) => Ok(existing),
            None => self.create(model, values),
        }
    }

    pub fn get_or_create_all<I>(&mut self, model: &str, values: I) -> ModelResult<Vec<Entity>>
    where
        I: IntoIterator<Item = Value>,
    {
        values
            .into_iter()
            .map(|v| self.get_or_create(model, v))
            .collect()
    }

    /// Fill the instance under the key found in `values`, or create it
    pub fn fill_or_create(&mut self, model: &str, values: Value) -> ModelResult<Entity> {
        match self.find_by_values(model, &values)? {
            Some(existing) => self.fill(&existing, values),
            None => self.create(model, values),
        }
    }

    pub fn fill_or_create_all<I>(&mut self, model: &str, values: I) -> ModelResult<Vec<Entity>>
    where
        I: IntoIterator<Item = Value>,
    {
        values
            .into_iter()
            .map(|v| self.fill_or_create(model, v))
            .collect()
    }

    fn find_by_values(&self, model: &str, values: &Value) -> ModelResult<Option<Entity>> {
        let schema = self.schema(model)?;
        let Value::Object(map) = values else {
            return Ok(None);
        };

        let raw: Vec<Value> = schema
            .primary_key
            .attributes()
            .iter()
            .map(|attr| map.get(attr).cloned().unwrap_or(Value::Null))
            .collect();
        Ok(StoreKey::from_values(&raw).and_then(|key| self.store_get(schema.id, &key)))
    }

    /// Put `entity` into its store.
    ///
    /// Saving the stored instance again is a no-op. When another instance
    /// already holds the key, that instance absorbs the attributes of
    /// `entity` and is returned instead.
    pub fn save(&mut self, entity: &Entity) -> ModelResult<Entity> {
        let key = entity.try_key()?.store_key();

        match self.store_get(entity.model(), &key) {
            Some(existing) if existing.is(entity) => Ok(existing),
            Some(existing) => {
                debug!(
                    target: "entigraph::store",
                    model = entity.model_name(),
                    key = %key,
                    "merging into stored instance"
                );
                self.absorb(&existing, entity)?;
                Ok(existing)
            }
            None => {
                self.root_entry_mut(entity.model())?
                    .store
                    .insert(key.clone(), entity.clone());
                self.notify_all(entity, Delta::Add);

                debug!(target: "entigraph::store", model = entity.model_name(), key = %key, "saved");
                entity.emit(EntityEvent::Saved);
                self.observers.trigger_saved(entity);
                Ok(entity.clone())
            }
        }
    }

    fn absorb(&mut self, existing: &Entity, incoming: &Entity) -> ModelResult<()> {
        let schema = self.schema_of(existing.model())?;
        let incoming = incoming.attributes();

        for (name, _) in &schema.fields {
            if schema.primary_key.contains(name) {
                continue;
            }
            if let Some(value) = incoming.get(name) {
                self.write_attribute(existing, &schema, name, value.clone())?;
            }
        }
        Ok(())
    }

    /// Write one attribute, or assign a relation when `attribute` names one
    pub fn set(&mut self, entity: &Entity, attribute: &str, value: Value) -> ModelResult<()> {
        let schema = self.schema_of(entity.model())?;

        if let Some(field) = schema.field(attribute) {
            let value = field.value_for_write(&schema.name, attribute, Some(&value))?;
            return self.write_attribute(entity, &schema, attribute, value);
        }
        if schema.relation(attribute).is_some() {
            return self.assign_relation(entity, attribute, value);
        }
        self.unknown_attribute(&schema, attribute)
    }

    /// Bulk assignment: fields first, then relation payloads
    pub fn fill(&mut self, entity: &Entity, values: Value) -> ModelResult<Entity> {
        let schema = self.schema_of(entity.model())?;
        let values = into_object(&schema.name, values)?;
        self.check_attributes(&schema, &values)?;

        for (name, raw) in &values {
            if let Some(field) = schema.field(name) {
                let value = field.value_for_write(&schema.name, name, Some(raw))?;
                self.write_attribute(entity, &schema, name, value)?;
            }
        }
        for (name, payload) in values {
            if schema.relation(&name).is_some() {
                self.assign_relation(entity, &name, payload)?;
            }
        }

        Ok(entity.clone())
    }

    /// Store an already sanitized value.
    ///
    /// On a stored instance, subscribers of the attribute see a DELETE with
    /// the old value before the write and an ADD with the new value after.
    pub(crate) fn write_attribute(
        &self,
        entity: &Entity,
        schema: &ModelSchema,
        attribute: &str,
        value: Value,
    ) -> ModelResult<()> {
        let old = entity.get(attribute);
        if old.as_ref() == Some(&value) {
            return Ok(());
        }

        let stored = self.is_stored(entity);
        if stored && schema.primary_key.contains(attribute) {
            return Err(ModelError::ImmutableKey {
                model: schema.name.to_string(),
                field: attribute.to_string(),
            });
        }

        let subscribers = if stored {
            self.subscribers_for(entity, attribute)
        } else {
            Vec::new()
        };

        self.notify(entity, &subscribers, Delta::Delete);
        entity.write(attribute, value.clone());
        self.notify(entity, &subscribers, Delta::Add);

        self.observers
            .trigger_attribute_changed(entity, attribute, old.as_ref(), &value);
        Ok(())
    }

    fn check_attributes(&self, schema: &ModelSchema, values: &Map<String, Value>) -> ModelResult<()> {
        for name in values.keys() {
            if schema.field(name).is_none() && schema.relation(name).is_none() {
                self.unknown_attribute(schema, name)?;
            }
        }
        Ok(())
    }

    fn unknown_attribute(&self, schema: &ModelSchema, attribute: &str) -> ModelResult<()> {
        if self.config.strict_attributes {
            return Err(ModelError::UnknownField {
                model: schema.name.to_string(),
                field: attribute.to_string(),
            });
        }
        warn!(
            target: "entigraph::store",
            model = %schema.name,
            attribute,
            "ignoring unknown attribute"
        );
        Ok(())
    }

    /// Delete with cascading and no hook
    pub fn delete(&mut self, entity: &Entity) -> ModelResult<bool> {
        self.delete_with(entity, DeleteOptions::default())
    }

    /// Delete `entity`, returning whether it was removed.
    ///
    /// A `Delete` listener returning `false` vetoes the delete. Cascaded
    /// records (including their own cascades) are removed before the owner
    /// notifies its subscribers and leaves the store. A failing hook stops
    /// the walk; records removed up to that point stay removed.
    pub fn delete_with(&mut self, entity: &Entity, options: DeleteOptions<'_>) -> ModelResult<bool> {
        let DeleteOptions {
            cascade,
            before_delete,
        } = options;

        let mut no_hook = |_: &mut ModelRegistry, _: &Entity| -> ModelResult<()> { Ok(()) };
        let hook: &mut dyn FnMut(&mut ModelRegistry, &Entity) -> ModelResult<()> =
            match before_delete {
                Some(hook) => hook,
                None => &mut no_hook,
            };

        self.delete_inner(entity, cascade, hook)
    }

    fn delete_inner(
        &mut self,
        entity: &Entity,
        cascade: bool,
        hook: &mut dyn FnMut(&mut ModelRegistry, &Entity) -> ModelResult<()>,
    ) -> ModelResult<bool> {
        if !entity.emit(EntityEvent::Delete) {
            debug!(target: "entigraph::store", model = entity.model_name(), "delete vetoed");
            return Ok(false);
        }
        if !self.is_stored(entity) || self.deleting.iter().any(|e| e.is(entity)) {
            return Ok(false);
        }

        self.deleting.push(entity.clone());
        let result = self.remove_with_cascade(entity, cascade, hook);
        self.deleting.retain(|e| !e.is(entity));
        result?;

        entity.emit(EntityEvent::Deleted);
        self.observers.trigger_deleted(entity);
        Ok(true)
    }

    /// Records removed along with `entity` through `relation`: the related
    /// records, then for many-to-many the join rows linking them.
    pub(crate) fn dependents(&self, entity: &Entity, relation: &Relation) -> ModelResult<Vec<Entity>> {
        let mut records = self.related(entity, &relation.name)?.many();
        if let RelationKind::BelongsToMany(link) = &relation.kind {
            records.extend(
                self.ensure_loaded(entity, relation)
                    .keys()
                    .iter()
                    .filter_map(|key| self.store_get(link.pivot, key)),
            );
        }
        Ok(records)
    }

    fn remove_with_cascade(
        &mut self,
        entity: &Entity,
        cascade: bool,
        hook: &mut dyn FnMut(&mut ModelRegistry, &Entity) -> ModelResult<()>,
    ) -> ModelResult<()> {
        hook(self, entity)?;

        if cascade {
            let schema = self.schema_of(entity.model())?;
            for name in schema.cascades() {
                let relation = self.relation_of(entity, name)?;
                let children = self.dependents(entity, &relation)?;

                debug!(
                    target: "entigraph::store",
                    model = entity.model_name(),
                    relation = %name,
                    count = children.len(),
                    "cascading delete"
                );
                for child in children {
                    self.delete_inner(&child, true, hook)?;
                }
            }
        }

        // The hook or a cascade cycle may already have removed it.
        let Some(key) = entity.store_key() else {
            return Ok(());
        };
        if !self.is_stored(entity) {
            return Ok(());
        }

        self.notify_all(entity, Delta::Delete);
        self.root_entry_mut(entity.model())?.store.remove(&key);
        debug!(target: "entigraph::store", model = entity.model_name(), key = %key, "deleted");
        Ok(())
    }
}
