//! In-process evaluation of filters and sort keys.
//!
//! Mirrors the JSONB semantics the PostgreSQL backend relies on: ordering
//! across types follows `Object > Array > Boolean > Number > String > Null`,
//! ordered comparisons only match operands of the same JSON type, and a
//! missing field sorts after every present value.

use std::cmp::Ordering;

use serde_json::Value;
use uuid::Uuid;

use super::identity_operand;
use crate::query::types::ID_FIELD;
use crate::query::{Condition, Filter, FilterValue, GeoPoint, Operator, SortDirection, SortKey};

/// Whether a document satisfies every condition of `filter`.
pub(crate) fn matches(doc: &Value, filter: &Filter) -> bool {
    filter.conditions().iter().all(|c| matches_condition(doc, c))
}

fn matches_condition(doc: &Value, condition: &Condition) -> bool {
    match condition {
        Condition::Field { path, op, value } if path.is_id() => {
            let Some(actual) = doc
                .get(ID_FIELD)
                .and_then(Value::as_str)
                .and_then(|s| Uuid::parse_str(s).ok())
            else {
                return false;
            };
            let operands: Vec<Uuid> = value
                .items()
                .into_iter()
                .filter_map(|v| identity_operand(v).ok())
                .collect();
            match op {
                Operator::Eq | Operator::In => operands.contains(&actual),
                ordered => operands
                    .first()
                    .is_some_and(|operand| ordering_holds(*ordered, actual.cmp(operand))),
            }
        }
        Condition::Field { path, op, value } => {
            let Some(actual) = path.lookup(doc) else {
                return false;
            };
            match op {
                Operator::Eq => equals(actual, value),
                Operator::In => value.items().into_iter().any(|v| equals(actual, v)),
                ordered => {
                    json_type(actual) == value.json_type()
                        && ordering_holds(*ordered, compare_json(actual, &value.to_json()))
                }
            }
        }
        Condition::WithinRadius {
            path,
            center,
            radius,
        } => point_at(doc, path.child("coordinates").segments())
            .is_some_and(|point| point.angular_distance(center) <= *radius),
    }
}

/// Equality as used by filters: same JSON value, same text for scalars, or
/// an array containing the value.
fn equals(actual: &Value, expected: &FilterValue) -> bool {
    let expected_json = expected.to_json();
    if json_eq(actual, &expected_json) {
        return true;
    }
    match actual {
        Value::String(s) => *s == expected.to_text(),
        Value::Number(_) | Value::Bool(_) => actual.to_string() == expected.to_text(),
        Value::Array(items) => items.iter().any(|item| json_eq(item, &expected_json)),
        _ => false,
    }
}

fn ordering_holds(op: Operator, ordering: Ordering) -> bool {
    match op {
        Operator::Gt => ordering == Ordering::Greater,
        Operator::Gte => ordering != Ordering::Less,
        Operator::Lt => ordering == Ordering::Less,
        Operator::Lte => ordering != Ordering::Greater,
        Operator::Eq | Operator::In => ordering == Ordering::Equal,
    }
}

fn point_at(doc: &Value, segments: &[String]) -> Option<GeoPoint> {
    let coordinates = segments
        .iter()
        .try_fold(doc, |current, segment| current.get(segment))?
        .as_array()?;
    match coordinates.as_slice() {
        [lng, lat, ..] => Some(GeoPoint {
            lng: lng.as_f64()?,
            lat: lat.as_f64()?,
        }),
        _ => None,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::String(_) => 1,
        Value::Number(_) => 2,
        Value::Bool(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// JSON equality with numeric comparison of numbers (`5000 == 5000.0`).
pub fn json_eq(a: &Value, b: &Value) -> bool {
    compare_json(a, b) == Ordering::Equal
}

/// Total order over JSON values.
pub fn compare_json(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.total_cmp(&y)
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x.len().cmp(&y.len()).then_with(|| {
            x.iter()
                .zip(y)
                .map(|(p, q)| compare_json(p, q))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        }),
        (Value::Object(x), Value::Object(y)) => x.len().cmp(&y.len()).then_with(|| {
            x.iter()
                .zip(y)
                .map(|((k1, v1), (k2, v2))| k1.cmp(k2).then_with(|| compare_json(v1, v2)))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        }),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Compare two documents by sort keys, then by identity.
pub(crate) fn compare_documents(a: &Value, b: &Value, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let ordering = match (key.path.lookup(a), key.path.lookup(b)) {
            (Some(x), Some(y)) => compare_json(x, y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        let ordering = match key.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    let id = |doc: &Value| doc.get(ID_FIELD).and_then(Value::as_str).map(str::to_owned);
    id(a).cmp(&id(b))
}
