//! Pivot Synthesizer - join models for many-to-many relations declared
//! without an explicit one

use crate::field::Field;
use crate::model::KeyName;
use crate::relationships::{camel_case, upper_first};
use crate::schema::{ModelDef, RelationDef};
use serde_json::Value;

/// Deterministic join model name: both model names sorted and joined
pub fn pivot_name(a: &str, b: &str, separator: &str) -> String {
    let mut names = [a, b];
    names.sort_unstable();
    names.join(separator)
}

/// Pivot columns referencing a model keyed by `primary_key`.
///
/// `userId` for a scalar key, `userId1`/`userId2` style names built from the
/// key attributes for composite keys.
pub fn pivot_columns(prefix: &str, primary_key: &KeyName) -> KeyName {
    match primary_key {
        KeyName::Single(_) => KeyName::Single(format!("{}Id", prefix)),
        KeyName::Composite(attrs) => KeyName::Composite(
            attrs
                .iter()
                .map(|attr| format!("{}{}", prefix, upper_first(attr)))
                .collect(),
        ),
    }
}

/// One side of a synthesized pivot
#[derive(Debug, Clone)]
pub struct PivotSide {
    pub model: String,
    pub primary_key: KeyName,
    /// Name of the pivot's belongs-to relation to this side
    pub accessor: String,
}

impl PivotSide {
    pub fn columns(&self) -> KeyName {
        pivot_columns(&self.accessor, &self.primary_key)
    }
}

/// Sides of the join model between `a` and `b`.
///
/// A model related to itself gets a second, `related`-prefixed column set.
pub fn pivot_sides(a: (&str, &KeyName), b: (&str, &KeyName)) -> (PivotSide, PivotSide) {
    let near = PivotSide {
        model: a.0.to_string(),
        primary_key: a.1.clone(),
        accessor: camel_case(a.0),
    };
    let far_accessor = if a.0 == b.0 {
        format!("related{}", upper_first(b.0))
    } else {
        camel_case(b.0)
    };
    let far = PivotSide {
        model: b.0.to_string(),
        primary_key: b.1.clone(),
        accessor: far_accessor,
    };
    (near, far)
}

/// Definition of the join model: a `uid` primary key, nullable string
/// columns per side and a belongs-to relation back to each side.
pub fn pivot_definition(name: &str, primary_key: &str, sides: &[&PivotSide]) -> ModelDef {
    let mut def = ModelDef::new(name)
        .primary_key(primary_key)
        .field(primary_key, Field::uid());

    for side in sides {
        let columns = side.columns();
        for column in columns.attributes() {
            def = def.field(column.as_str(), Field::string().default(Value::Null));
        }
        def = def.relation(
            RelationDef::belongs_to(&side.accessor, &side.model)
                .foreign_key(columns)
                .other_key(side.primary_key.clone()),
        );
    }

    def.synthesized()
}
