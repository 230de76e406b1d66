//! Schema declaration and two-phase boot
//!
//! Every [`ModelDef`] is registered with a [`Schema`] first; [`Schema::boot`]
//! then resolves all relation descriptors at once, so relations may refer to
//! models declared later. Booting synthesizes missing join models and fills
//! the subscriber indices.

use crate::error::{ModelError, ModelResult};
use crate::field::Field;
use crate::model::{EntityStore, KeyName, ModelEntry, ModelId, ModelRegistry, ModelSchema};
use crate::relationships::{
    camel_case, pivot_definition, pivot_name, pivot_sides, Direction, PivotLink, Relation,
    RelationKind, RelationOrder, Subscriber, SubscriberIndex,
};
use entigraph_core::{StoreConfig, StoreConfigTrait};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationDefKind {
    HasOne,
    BelongsTo,
    HasMany,
    HasManyBy,
    BelongsToMany,
}

/// Unresolved relation declaration
///
/// Keys left unset fall back to the naming conventions: `<source>Id` on the
/// related model for has-one/has-many, `<related>Id` (or `<related>Ids` for
/// has-many-by) on the owner, and the primary key on the referenced side.
/// Many-to-many relations take their keys from the join model's belongs-to
/// relations named by [`RelationDef::accessors`].
#[derive(Debug, Clone)]
pub struct RelationDef {
    pub(crate) name: String,
    pub(crate) kind: RelationDefKind,
    pub(crate) related: String,
    pub(crate) foreign_key: Option<KeyName>,
    pub(crate) other_key: Option<KeyName>,
    pub(crate) order: Option<RelationOrder>,
    pub(crate) through: Option<String>,
    pub(crate) accessors: Option<(String, String)>,
}

impl RelationDef {
    fn new(name: &str, kind: RelationDefKind, related: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            related: related.to_string(),
            foreign_key: None,
            other_key: None,
            order: None,
            through: None,
            accessors: None,
        }
    }

    pub fn has_one(name: &str, related: &str) -> Self {
        Self::new(name, RelationDefKind::HasOne, related)
    }

    pub fn belongs_to(name: &str, related: &str) -> Self {
        Self::new(name, RelationDefKind::BelongsTo, related)
    }

    pub fn has_many(name: &str, related: &str) -> Self {
        Self::new(name, RelationDefKind::HasMany, related)
    }

    pub fn has_many_by(name: &str, related: &str) -> Self {
        Self::new(name, RelationDefKind::HasManyBy, related)
    }

    pub fn belongs_to_many(name: &str, related: &str) -> Self {
        Self::new(name, RelationDefKind::BelongsToMany, related)
    }

    pub fn foreign_key(mut self, key: impl Into<KeyName>) -> Self {
        self.foreign_key = Some(key.into());
        self
    }

    pub fn other_key(mut self, key: impl Into<KeyName>) -> Self {
        self.other_key = Some(key.into());
        self
    }

    pub fn order_by(mut self, attribute: &str, direction: Direction) -> Self {
        self.order = Some(RelationOrder::By {
            attribute: attribute.to_string(),
            direction,
        });
        self
    }

    pub fn order_with<F>(mut self, comparator: F) -> Self
    where
        F: Fn(&crate::model::Entity, &crate::model::Entity) -> Ordering + 'static,
    {
        self.order = Some(RelationOrder::Custom(Rc::new(comparator)));
        self
    }

    /// Use an existing join model instead of a synthesized one
    pub fn through(mut self, pivot: &str) -> Self {
        self.through = Some(pivot.to_string());
        self
    }

    /// Belongs-to relations of the join model leading to this side and to
    /// the far side
    pub fn accessors(mut self, near: &str, far: &str) -> Self {
        self.accessors = Some((near.to_string(), far.to_string()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> RelationDefKind {
        self.kind
    }
}

/// Declaration of one model
#[derive(Debug, Clone)]
pub struct ModelDef {
    pub(crate) name: String,
    pub(crate) primary_key: Option<KeyName>,
    pub(crate) base: Option<String>,
    pub(crate) fields: Vec<(String, Field)>,
    pub(crate) relations: Vec<RelationDef>,
    pub(crate) cascades: Vec<String>,
    pub(crate) synthesized: bool,
}

impl ModelDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            primary_key: None,
            base: None,
            fields: Vec::new(),
            relations: Vec::new(),
            cascades: Vec::new(),
            synthesized: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare or replace a field
    pub fn field(mut self, name: &str, field: Field) -> Self {
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = field,
            None => self.fields.push((name.to_string(), field)),
        }
        self
    }

    pub fn primary_key(mut self, key: impl Into<KeyName>) -> Self {
        self.primary_key = Some(key.into());
        self
    }

    /// Declare this model a subtype of `base`, sharing its store and key
    pub fn extends(mut self, base: &str) -> Self {
        self.base = Some(base.to_string());
        self
    }

    /// Relations whose records are deleted together with an instance
    pub fn cascades<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cascades = relations.into_iter().map(Into::into).collect();
        self
    }

    pub fn relation(mut self, relation: RelationDef) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn has_one(self, name: &str, related: &str) -> Self {
        self.relation(RelationDef::has_one(name, related))
    }

    pub fn belongs_to(self, name: &str, related: &str) -> Self {
        self.relation(RelationDef::belongs_to(name, related))
    }

    pub fn has_many(self, name: &str, related: &str) -> Self {
        self.relation(RelationDef::has_many(name, related))
    }

    pub fn has_many_by(self, name: &str, related: &str) -> Self {
        self.relation(RelationDef::has_many_by(name, related))
    }

    pub fn belongs_to_many(self, name: &str, related: &str) -> Self {
        self.relation(RelationDef::belongs_to_many(name, related))
    }

    pub(crate) fn synthesized(mut self) -> Self {
        self.synthesized = true;
        self
    }
}

/// Collects model declarations until [`Schema::boot`]
#[derive(Debug, Default)]
pub struct Schema {
    config: StoreConfig,
    models: Vec<ModelDef>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            models: Vec::new(),
        }
    }

    pub fn model(mut self, def: ModelDef) -> Self {
        self.models.push(def);
        self
    }

    /// Resolve every declaration and return the live registry
    pub fn boot(self) -> ModelResult<ModelRegistry> {
        self.config.validate()?;

        let order = base_first(&self.models)?;
        let mut registry = ModelRegistry::new(self.config);

        debug!(target: "entigraph::schema", models = order.len(), "booting schema");

        for &i in &order {
            registry.install(&self.models[i])?;
        }
        for &i in &order {
            registry.resolve_relations(&self.models[i], Pass::Direct)?;
        }
        for &i in &order {
            registry.resolve_relations(&self.models[i], Pass::Pivot)?;
        }
        for &i in &order {
            registry.finish(&self.models[i])?;
        }

        Ok(registry)
    }
}

/// Indices of `models` ordered so every base precedes its subtypes
fn base_first(models: &[ModelDef]) -> ModelResult<Vec<usize>> {
    let mut index = HashMap::new();
    for (i, def) in models.iter().enumerate() {
        if index.insert(def.name.as_str(), i).is_some() {
            return Err(ModelError::Configuration(format!(
                "model '{}' is declared twice",
                def.name
            )));
        }
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Fresh,
        Visiting,
        Done,
    }

    fn visit(
        i: usize,
        models: &[ModelDef],
        index: &HashMap<&str, usize>,
        marks: &mut [Mark],
        order: &mut Vec<usize>,
    ) -> ModelResult<()> {
        match marks[i] {
            Mark::Done => return Ok(()),
            Mark::Visiting => {
                return Err(ModelError::Configuration(format!(
                    "model '{}' extends itself",
                    models[i].name
                )))
            }
            Mark::Fresh => {}
        }

        marks[i] = Mark::Visiting;
        if let Some(base) = &models[i].base {
            let &b = index
                .get(base.as_str())
                .ok_or_else(|| ModelError::UnknownModel(base.clone()))?;
            visit(b, models, index, marks, order)?;
        }
        marks[i] = Mark::Done;
        order.push(i);
        Ok(())
    }

    let mut marks = vec![Mark::Fresh; models.len()];
    let mut order = Vec::with_capacity(models.len());
    for i in 0..models.len() {
        visit(i, models, &index, &mut marks, &mut order)?;
    }
    Ok(order)
}

/// Schemas and subscriber indexes as they were before a registration.
///
/// Holding the schema handles makes later `Rc::make_mut` calls copy, so the
/// saved schemas stay untouched.
struct Checkpoint {
    models: usize,
    schemas: Vec<Rc<ModelSchema>>,
    subscribers: Vec<SubscriberIndex>,
}

impl Checkpoint {
    fn take(registry: &ModelRegistry) -> Self {
        Self {
            models: registry.entries.len(),
            schemas: registry.entries.iter().map(|e| Rc::clone(&e.schema)).collect(),
            subscribers: registry.entries.iter().map(|e| e.subscribers.clone()).collect(),
        }
    }

    fn restore(self, registry: &mut ModelRegistry) {
        let models = self.models;
        registry.entries.truncate(models);
        for ((entry, schema), subscribers) in registry
            .entries
            .iter_mut()
            .zip(self.schemas)
            .zip(self.subscribers)
        {
            entry.schema = schema;
            entry.subscribers = subscribers;
        }
        registry.names.retain(|_, id| id.0 < models);
        registry.pivots.retain(|_, id| id.0 < models);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pass {
    /// Everything except many-to-many
    Direct,
    /// Many-to-many, once every join model's belongs-to relations exist
    Pivot,
}

impl ModelRegistry {
    /// Register one more model after boot.
    ///
    /// Its base, relation targets and join models must already be
    /// registered; relations pointing at the model itself are allowed.
    pub fn register(&mut self, def: ModelDef) -> ModelResult<ModelId> {
        let known = |name: &str| name == def.name || self.names.contains_key(name);
        let referenced = def
            .base
            .iter()
            .chain(def.relations.iter().map(|r| &r.related))
            .chain(def.relations.iter().filter_map(|r| r.through.as_ref()));
        for name in referenced {
            if !known(name) {
                return Err(ModelError::UnknownModel(name.clone()));
            }
        }

        let checkpoint = Checkpoint::take(self);
        let result = self.install(&def).and_then(|id| {
            self.resolve_relations(&def, Pass::Direct)?;
            self.resolve_relations(&def, Pass::Pivot)?;
            self.finish(&def)?;
            Ok(id)
        });
        if let Err(err) = &result {
            debug!(
                target: "entigraph::schema",
                model = %def.name,
                error = %err,
                "registration rolled back"
            );
            checkpoint.restore(self);
        }
        result
    }

    /// Register the model's shape: key, fields and store placement
    pub(crate) fn install(&mut self, def: &ModelDef) -> ModelResult<ModelId> {
        if self.names.contains_key(&def.name) {
            return Err(ModelError::Configuration(format!(
                "model '{}' is registered twice",
                def.name
            )));
        }

        let id = ModelId(self.entries.len());
        let (root, base, primary_key, mut fields) = match &def.base {
            Some(base_name) => {
                let base = self.schema(base_name)?;
                if let Some(pk) = &def.primary_key {
                    if *pk != base.primary_key {
                        return Err(ModelError::Configuration(format!(
                            "subtype '{}' cannot change the primary key of '{}'",
                            def.name, base_name
                        )));
                    }
                }
                (
                    base.root,
                    Some(base.id),
                    base.primary_key.clone(),
                    base.fields.clone(),
                )
            }
            None => (
                id,
                None,
                def.primary_key
                    .clone()
                    .unwrap_or_else(|| KeyName::Single(self.config.default_primary_key.clone())),
                Vec::new(),
            ),
        };

        for (name, field) in &def.fields {
            match fields.iter_mut().find(|(n, _)| n == name) {
                Some((_, existing)) => *existing = field.clone(),
                None => fields.push((name.clone(), field.clone())),
            }
        }
        for attr in primary_key.attributes() {
            if !fields.iter().any(|(n, _)| n == attr) {
                fields.push((attr.clone(), Field::uid()));
            }
        }

        debug!(
            target: "entigraph::schema",
            model = %def.name,
            key = %primary_key,
            shared_store = base.is_some(),
            "registered model"
        );

        self.entries.push(ModelEntry {
            schema: Rc::new(ModelSchema {
                id,
                name: Rc::from(def.name.as_str()),
                root,
                base,
                primary_key,
                fields,
                relations: Vec::new(),
                cascades: Vec::new(),
                synthesized: def.synthesized,
            }),
            store: EntityStore::new(),
            subscribers: SubscriberIndex::new(),
        });
        self.names.insert(def.name.clone(), id);
        Ok(id)
    }

    pub(crate) fn resolve_relations(&mut self, def: &ModelDef, pass: Pass) -> ModelResult<()> {
        let source_id = self.model_id(&def.name)?;

        for rd in &def.relations {
            let many_to_many = rd.kind == RelationDefKind::BelongsToMany;
            if many_to_many != (pass == Pass::Pivot) {
                continue;
            }

            let source = self.schema_of(source_id)?;
            if source.relation(&rd.name).is_some() || source.field(&rd.name).is_some() {
                return Err(ModelError::Configuration(format!(
                    "'{}.{}' is declared twice",
                    source.name, rd.name
                )));
            }

            let relation = if many_to_many {
                self.resolve_many_to_many(&source, rd)?
            } else {
                self.resolve_direct(&source, rd)?
            };
            relation.validate(&source.name)?;

            debug!(
                target: "entigraph::schema",
                model = %source.name,
                relation = %relation.name,
                kind = relation.kind_name(),
                foreign_key = %relation.foreign_key,
                other_key = %relation.other_key,
                "resolved relation"
            );

            let relation = Rc::new(relation);
            Rc::make_mut(&mut self.entry_mut(source_id)?.schema)
                .relations
                .push(Rc::clone(&relation));
            self.subscribe_relation(&relation)?;
        }

        Ok(())
    }

    fn resolve_direct(&mut self, source: &ModelSchema, rd: &RelationDef) -> ModelResult<Relation> {
        let related = self.schema(&rd.related)?;

        let (kind, foreign_key, other_key, key_owner, referenced) = match rd.kind {
            RelationDefKind::HasOne | RelationDefKind::HasMany => (
                if rd.kind == RelationDefKind::HasOne {
                    RelationKind::HasOne
                } else {
                    RelationKind::HasMany
                },
                rd.foreign_key
                    .clone()
                    .unwrap_or_else(|| format!("{}Id", camel_case(&source.name)).into()),
                rd.other_key
                    .clone()
                    .unwrap_or_else(|| source.primary_key.clone()),
                related.id,
                source,
            ),
            RelationDefKind::BelongsTo => (
                RelationKind::BelongsTo,
                rd.foreign_key
                    .clone()
                    .unwrap_or_else(|| format!("{}Id", camel_case(&related.name)).into()),
                rd.other_key
                    .clone()
                    .unwrap_or_else(|| related.primary_key.clone()),
                source.id,
                &*related,
            ),
            RelationDefKind::HasManyBy => (
                RelationKind::HasManyBy,
                rd.foreign_key
                    .clone()
                    .unwrap_or_else(|| format!("{}Ids", camel_case(&related.name)).into()),
                rd.other_key
                    .clone()
                    .unwrap_or_else(|| related.primary_key.clone()),
                source.id,
                &*related,
            ),
            RelationDefKind::BelongsToMany => {
                return Err(ModelError::Configuration(format!(
                    "'{}.{}' is a many-to-many relation",
                    source.name, rd.name
                )))
            }
        };

        for attr in other_key.attributes() {
            if referenced.field(attr).is_none() {
                return Err(ModelError::Configuration(format!(
                    "relation '{}.{}' references missing field '{}.{}'",
                    source.name, rd.name, referenced.name, attr
                )));
            }
        }

        let key_field = if kind == RelationKind::HasManyBy {
            Field::array()
        } else {
            Field::json().default(Value::Null)
        };
        self.ensure_key_fields(key_owner, &foreign_key, key_field)?;

        Ok(Relation {
            name: rd.name.clone(),
            source: source.id,
            related: related.id,
            foreign_key,
            other_key,
            kind,
            order: rd.order.clone(),
        })
    }

    fn resolve_many_to_many(
        &mut self,
        source: &ModelSchema,
        rd: &RelationDef,
    ) -> ModelResult<Relation> {
        let related = self.schema(&rd.related)?;

        let (pivot, near_accessor, far_accessor) = match &rd.through {
            Some(through) => {
                let (near, far) = rd.accessors.clone().unwrap_or_else(|| {
                    (camel_case(&source.name), camel_case(&related.name))
                });
                (self.schema(through)?, near, far)
            }
            None => self.synthesize_pivot(source, &related)?,
        };

        let accessor = |name: &str, target: ModelId| -> ModelResult<Rc<Relation>> {
            let relation = pivot.relation(name).ok_or_else(|| {
                ModelError::Configuration(format!(
                    "join model '{}' of '{}.{}' has no relation '{}'",
                    pivot.name, source.name, rd.name, name
                ))
            })?;
            let points_back = relation.kind == RelationKind::BelongsTo
                && self.is_kind_of(target, relation.related);
            if !points_back {
                return Err(ModelError::Configuration(format!(
                    "'{}.{}' must be a belongs-to relation to the model of '{}.{}'",
                    pivot.name, name, source.name, rd.name
                )));
            }
            Ok(Rc::clone(relation))
        };
        let near = accessor(&near_accessor, source.id)?;
        let far = accessor(&far_accessor, related.id)?;

        Ok(Relation {
            name: rd.name.clone(),
            source: source.id,
            related: related.id,
            foreign_key: near.foreign_key.clone(),
            other_key: near.other_key.clone(),
            kind: RelationKind::BelongsToMany(PivotLink {
                pivot: pivot.id,
                far_key: far.foreign_key.clone(),
                far_other_key: far.other_key.clone(),
                near_accessor,
                far_accessor,
                symmetric: source.id == related.id,
            }),
            order: rd.order.clone(),
        })
    }

    /// Join model for `source` and `related`, generated on first use.
    ///
    /// A user declared model carrying the generated name is used as is.
    fn synthesize_pivot(
        &mut self,
        source: &ModelSchema,
        related: &ModelSchema,
    ) -> ModelResult<(Rc<ModelSchema>, String, String)> {
        let name = pivot_name(&source.name, &related.name, &self.config.pivot_separator);
        let (near, far) = pivot_sides(
            (&source.name, &source.primary_key),
            (&related.name, &related.primary_key),
        );

        if !self.names.contains_key(&name) {
            let def = pivot_definition(&name, &self.config.default_primary_key, &[&near, &far]);
            let id = self.install(&def)?;
            self.resolve_relations(&def, Pass::Direct)?;
            self.finish(&def)?;
            self.pivots.insert(name.clone(), id);

            debug!(target: "entigraph::schema", pivot = %name, "synthesized join model");
        }

        Ok((self.schema(&name)?, near.accessor, far.accessor))
    }

    /// Add missing foreign key fields to `model` and its subtypes
    fn ensure_key_fields(&mut self, model: ModelId, key: &KeyName, field: Field) -> ModelResult<()> {
        let lineage: Vec<ModelId> = self
            .entries
            .iter()
            .map(|e| e.schema.id)
            .filter(|&id| self.is_kind_of(id, model))
            .collect();

        for id in lineage {
            let schema = &mut self.entry_mut(id)?.schema;
            for attr in key.attributes() {
                if schema.field(attr).is_none() {
                    Rc::make_mut(schema).fields.push((attr.clone(), field.clone()));
                }
            }
        }
        Ok(())
    }

    fn subscribe_relation(&mut self, relation: &Rc<Relation>) -> ModelResult<()> {
        let mut subscribers = Vec::new();
        match &relation.kind {
            RelationKind::BelongsTo | RelationKind::HasManyBy => return Ok(()),
            RelationKind::HasOne | RelationKind::HasMany => subscribers.push(Subscriber {
                parent: relation.source,
                relation: Rc::clone(relation),
                via: relation.foreign_key.clone(),
                parent_key: relation.other_key.clone(),
            }),
            RelationKind::BelongsToMany(link) => {
                subscribers.push(Subscriber {
                    parent: relation.source,
                    relation: Rc::clone(relation),
                    via: relation.foreign_key.clone(),
                    parent_key: relation.other_key.clone(),
                });
                if link.symmetric {
                    subscribers.push(Subscriber {
                        parent: relation.source,
                        relation: Rc::clone(relation),
                        via: link.far_key.clone(),
                        parent_key: link.far_other_key.clone(),
                    });
                }
            }
        }

        let watched = relation.scanned_model();
        let index = &mut self.root_entry_mut(watched)?.subscribers;
        for subscriber in subscribers {
            let via = subscriber.via.to_string();
            if index.subscribe(subscriber) {
                debug!(
                    target: "entigraph::schema",
                    relation = %relation.name,
                    via = %via,
                    "subscribed to foreign key changes"
                );
            }
        }
        Ok(())
    }

    /// Inherit base relations and settle cascades
    pub(crate) fn finish(&mut self, def: &ModelDef) -> ModelResult<()> {
        let id = self.model_id(&def.name)?;
        let schema = self.schema_of(id)?;

        let (mut relations, mut cascades): (Vec<Rc<Relation>>, Vec<String>) = match schema.base {
            Some(base) => {
                let base = self.schema_of(base)?;
                (
                    base.relations
                        .iter()
                        .filter(|r| schema.relation(&r.name).is_none())
                        .cloned()
                        .collect(),
                    base.cascades.clone(),
                )
            }
            None => (Vec::new(), Vec::new()),
        };
        relations.extend(schema.relations.iter().cloned());
        if !def.cascades.is_empty() {
            cascades = def.cascades.clone();
        }

        for name in &cascades {
            if !relations.iter().any(|r| r.name == *name) {
                return Err(ModelError::Configuration(format!(
                    "model '{}' cascades unknown relation '{}'",
                    def.name, name
                )));
            }
        }

        let schema = Rc::make_mut(&mut self.entry_mut(id)?.schema);
        schema.relations = relations;
        schema.cascades = cascades;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boot_resolves_default_keys() {
        let registry = Schema::new()
            .model(ModelDef::new("User").has_many("posts", "Post"))
            .model(ModelDef::new("Post").belongs_to("author", "User"))
            .boot()
            .unwrap();

        let user = registry.schema("User").unwrap();
        let posts = user.relation("posts").unwrap();
        assert_eq!(posts.foreign_key, KeyName::from("userId"));
        assert_eq!(posts.other_key, KeyName::from("id"));
        assert!(!posts.is_local());

        let post = registry.schema("Post").unwrap();
        assert!(post.field("userId").is_some());
        assert_eq!(post.relation("author").unwrap().foreign_key, KeyName::from("userId"));

        assert_eq!(registry.subscriber_count("Post").unwrap(), 1);
        assert_eq!(registry.subscriber_count("User").unwrap(), 0);
    }

    #[test]
    fn test_unknown_related_model() {
        let err = Schema::new()
            .model(ModelDef::new("User").has_many("posts", "Post"))
            .boot()
            .unwrap_err();
        assert_eq!(err, ModelError::UnknownModel("Post".into()));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_key_arity_mismatch() {
        let err = Schema::new()
            .model(ModelDef::new("Tile").primary_key(["x", "y"]))
            .model(
                ModelDef::new("Unit")
                    .relation(RelationDef::belongs_to("tile", "Tile").foreign_key(["a", "b", "c"])),
            )
            .boot()
            .unwrap_err();
        assert!(matches!(err, ModelError::Configuration(_)));
    }

    #[test]
    fn test_unknown_cascade() {
        let err = Schema::new()
            .model(ModelDef::new("User").cascades(["posts"]))
            .boot()
            .unwrap_err();
        assert!(matches!(err, ModelError::Configuration(_)));
    }

    #[test]
    fn test_duplicate_and_cyclic_models() {
        let dup = Schema::new()
            .model(ModelDef::new("User"))
            .model(ModelDef::new("User"))
            .boot();
        assert!(matches!(dup, Err(ModelError::Configuration(_))));

        let cyclic = Schema::new()
            .model(ModelDef::new("A").extends("B"))
            .model(ModelDef::new("B").extends("A"))
            .boot();
        assert!(matches!(cyclic, Err(ModelError::Configuration(_))));
    }

    #[test]
    fn test_pivot_synthesized_once() {
        let registry = Schema::new()
            .model(ModelDef::new("User").belongs_to_many("roles", "Role"))
            .model(ModelDef::new("Role").belongs_to_many("users", "User"))
            .boot()
            .unwrap();

        assert_eq!(registry.pivot("User", "Role").as_deref(), Some("Role_User"));
        let pivot = registry.schema("Role_User").unwrap();
        assert!(pivot.is_synthesized());
        assert!(pivot.field("userId").is_some());
        assert!(pivot.field("roleId").is_some());
        assert!(pivot.relation("user").is_some());
        assert!(pivot.relation("role").is_some());
        assert_eq!(registry.subscriber_count("Role_User").unwrap(), 2);
    }

    #[test]
    fn test_subtype_inherits_shape() {
        let registry = Schema::new()
            .model(
                ModelDef::new("Animal")
                    .field("name", Field::string())
                    .has_many("toys", "Toy"),
            )
            .model(ModelDef::new("Dog").extends("Animal").field("breed", Field::string()))
            .model(ModelDef::new("Toy"))
            .boot()
            .unwrap();

        let dog = registry.schema("Dog").unwrap();
        let animal = registry.schema("Animal").unwrap();
        assert_eq!(dog.root(), animal.id());
        assert!(dog.field("name").is_some());
        assert!(dog.field("breed").is_some());
        assert!(Rc::ptr_eq(
            dog.relation("toys").unwrap(),
            animal.relation("toys").unwrap()
        ));
    }

    #[test]
    fn test_register_after_boot() {
        let mut registry = Schema::new()
            .model(ModelDef::new("User"))
            .boot()
            .unwrap();

        registry
            .register(ModelDef::new("Session").belongs_to("user", "User"))
            .unwrap();
        assert!(registry.schema("Session").unwrap().relation("user").is_some());

        let err = registry
            .register(ModelDef::new("Audit").belongs_to("target", "Missing"))
            .unwrap_err();
        assert_eq!(err, ModelError::UnknownModel("Missing".into()));
        assert!(registry.model_id("Audit").is_err());
    }

    #[test]
    fn test_failed_registration_is_rolled_back() {
        let mut registry = Schema::new()
            .model(ModelDef::new("User"))
            .model(ModelDef::new("Post"))
            .boot()
            .unwrap();

        let err = registry
            .register(
                ModelDef::new("Audit")
                    .relation(RelationDef::belongs_to("user", "User").foreign_key(["a", "b"])),
            )
            .unwrap_err();
        assert!(matches!(err, ModelError::Configuration(_)));
        assert!(registry.model_id("Audit").is_err());

        let err = registry
            .register(
                ModelDef::new("Tag")
                    .has_many("posts", "Post")
                    .belongs_to_many("featured", "Post")
                    .cascades(["nope"]),
            )
            .unwrap_err();
        assert!(matches!(err, ModelError::Configuration(_)));
        assert!(registry.model_id("Tag").is_err());
        assert!(registry.schema("Post").unwrap().field("tagId").is_none());
        assert_eq!(registry.subscriber_count("Post").unwrap(), 0);
        assert_eq!(registry.pivot("Tag", "Post"), None);

        registry
            .register(ModelDef::new("Audit").belongs_to("user", "User"))
            .unwrap();
        registry
            .register(ModelDef::new("Tag").has_many("posts", "Post").cascades(["posts"]))
            .unwrap();
        assert!(registry.schema("Post").unwrap().field("tagId").is_some());
        assert_eq!(registry.subscriber_count("Post").unwrap(), 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = StoreConfig::new().with_pivot_separator("a b");
        assert!(matches!(
            Schema::with_config(config).boot(),
            Err(ModelError::Configuration(_))
        ));
    }
}
