//! Relation Metadata - resolved, immutable descriptors for relation fields

use crate::error::{ModelError, ModelResult};
use crate::model::{Entity, KeyName, ModelId};
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

/// Comparator used by custom relation ordering
pub type Comparator = Rc<dyn Fn(&Entity, &Entity) -> Ordering>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Ordering applied to "many" relation results
#[derive(Clone)]
pub enum RelationOrder {
    By {
        attribute: String,
        direction: Direction,
    },
    Custom(Comparator),
}

impl fmt::Debug for RelationOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationOrder::By {
                attribute,
                direction,
            } => f
                .debug_struct("By")
                .field("attribute", attribute)
                .field("direction", direction)
                .finish(),
            RelationOrder::Custom(_) => f.write_str("Custom(<comparator>)"),
        }
    }
}

/// Join model wiring of a many-to-many relation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotLink {
    pub pivot: ModelId,
    /// Pivot attributes pointing at the far model
    pub far_key: KeyName,
    /// Far model attributes referenced by `far_key`
    pub far_other_key: KeyName,
    /// Pivot belongs-to relation leading back to the owning side
    pub near_accessor: String,
    /// Pivot belongs-to relation leading to the far side
    pub far_accessor: String,
    /// A row links both of its ends to each other (model related to itself)
    pub symmetric: bool,
}

/// The five relation kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationKind {
    /// Single related record holding a foreign key to this one
    HasOne,
    /// This record holds the foreign key
    BelongsTo,
    /// Related records holding a foreign key to this one
    HasMany,
    /// This record holds a list of foreign keys
    HasManyBy,
    /// Related records linked through rows of a join model
    BelongsToMany(PivotLink),
}

/// Resolved relation descriptor
///
/// `foreign_key` lives on the source for local relations, on the related
/// model for `HasOne`/`HasMany` and on the pivot for `BelongsToMany`.
/// `other_key` is the attribute set the foreign key points at.
#[derive(Debug, Clone)]
pub struct Relation {
    pub name: String,
    pub source: ModelId,
    pub related: ModelId,
    pub foreign_key: KeyName,
    pub other_key: KeyName,
    pub kind: RelationKind,
    pub order: Option<RelationOrder>,
}

impl Relation {
    /// The resolving key lives on the owning record itself
    pub fn is_local(&self) -> bool {
        match self.kind {
            RelationKind::BelongsTo | RelationKind::HasManyBy => true,
            RelationKind::HasOne | RelationKind::HasMany | RelationKind::BelongsToMany(_) => false,
        }
    }

    pub fn is_many(&self) -> bool {
        match self.kind {
            RelationKind::HasMany | RelationKind::HasManyBy | RelationKind::BelongsToMany(_) => true,
            RelationKind::HasOne | RelationKind::BelongsTo => false,
        }
    }

    pub fn pivot_link(&self) -> Option<&PivotLink> {
        match &self.kind {
            RelationKind::BelongsToMany(link) => Some(link),
            _ => None,
        }
    }

    /// Model whose store is scanned to build the derived cache
    pub fn scanned_model(&self) -> ModelId {
        match &self.kind {
            RelationKind::BelongsToMany(link) => link.pivot,
            _ => self.related,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            RelationKind::HasOne => "hasOne",
            RelationKind::BelongsTo => "belongsTo",
            RelationKind::HasMany => "hasMany",
            RelationKind::HasManyBy => "hasManyBy",
            RelationKind::BelongsToMany(_) => "belongsToMany",
        }
    }

    /// Validate key arities.
    ///
    /// A single foreign key attribute may hold a whole composite key as an
    /// array; otherwise the foreign key and the other key pair up one to one.
    pub fn validate(&self, source_name: &str) -> ModelResult<()> {
        let pairs = |fk: &KeyName, other: &KeyName| {
            fk.arity() == other.arity() || (fk.arity() == 1 && other.is_composite())
        };

        let valid = match &self.kind {
            RelationKind::HasManyBy => self.foreign_key.arity() == 1,
            RelationKind::BelongsToMany(link) => {
                pairs(&self.foreign_key, &self.other_key) && pairs(&link.far_key, &link.far_other_key)
            }
            _ => pairs(&self.foreign_key, &self.other_key),
        };

        if valid {
            Ok(())
        } else {
            Err(ModelError::Configuration(format!(
                "{} relation '{}.{}' pairs foreign key [{}] with other key [{}]",
                self.kind_name(),
                source_name,
                self.name,
                self.foreign_key,
                self.other_key
            )))
        }
    }
}

/// Lower camel case form of a model name (`UserRole` -> `userRole`)
pub fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, word) in name
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .enumerate()
    {
        if i == 0 {
            if word.chars().all(|c| !c.is_lowercase()) {
                out.push_str(&word.to_lowercase());
            } else {
                let mut chars = word.chars();
                if let Some(first) = chars.next() {
                    out.extend(first.to_lowercase());
                    out.push_str(chars.as_str());
                }
            }
        } else {
            out.push_str(&upper_first(word));
        }
    }
    out
}

pub fn upper_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
