//! Ordering of "many" relation results

use crate::model::Entity;
use crate::relationships::{Direction, RelationOrder};
use serde_json::Value;
use std::cmp::Ordering;

/// Total order over attribute values.
///
/// Missing and `null` values sort first; numbers compare numerically,
/// strings lexically and booleans `false` before `true`. Values of different
/// types compare by their JSON text.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());

    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            match (x.as_f64(), y.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            }
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

/// Sort `entities` in place; stable, so ties keep store order
pub fn apply_order(entities: &mut [Entity], order: Option<&RelationOrder>) {
    match order {
        None => {}
        Some(RelationOrder::By {
            attribute,
            direction,
        }) => {
            entities.sort_by(|a, b| {
                let ordering = compare_values(a.get(attribute).as_ref(), b.get(attribute).as_ref());
                match direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                }
            });
        }
        Some(RelationOrder::Custom(comparator)) => entities.sort_by(|a, b| comparator(a, b)),
    }
}
