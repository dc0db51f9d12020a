//! Listing pipeline types.
//!
//! Filters, projections, sort keys and the response envelope. Every value
//! here is immutable once built; pipeline stages produce new values.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use super::QueryError;

/// Identity field every document carries.
pub const ID_FIELD: &str = "_id";

/// Creation timestamp field used by the default sort.
pub const CREATED_AT_FIELD: &str = "createdAt";

/// Dotted path into a document (`location.state`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// Parse a dotted path, rejecting anything that is not a plain identifier.
    pub fn parse(raw: &str) -> Result<Self, QueryError> {
        let segments: Vec<String> = raw.split('.').map(str::to_string).collect();
        if segments.iter().all(|s| is_valid_segment(s)) {
            Ok(Self(segments))
        } else {
            Err(QueryError::InvalidField(raw.to_string()))
        }
    }

    /// Build a path from separate segments, validating each.
    pub(crate) fn from_segments(segments: Vec<String>) -> Result<Self, QueryError> {
        if !segments.is_empty() && segments.iter().all(|s| is_valid_segment(s)) {
            Ok(Self(segments))
        } else {
            Err(QueryError::InvalidField(segments.join(".")))
        }
    }

    /// Path for a field name written in code. Not validated.
    pub(crate) fn known(name: &str) -> Self {
        Self(name.split('.').map(str::to_string).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// True for the document identity path.
    pub fn is_id(&self) -> bool {
        self.0.len() == 1 && self.0[0] == ID_FIELD
    }

    /// Look the path up in a document.
    pub fn lookup<'a>(&self, doc: &'a Value) -> Option<&'a Value> {
        self.0.iter().try_fold(doc, |current, segment| current.get(segment))
    }

    /// Append a segment.
    pub fn child(&self, segment: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        Self(segments)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// Check a single path segment: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_valid_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Comparison applied by a field condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
}

impl Operator {
    /// Recognise a bracketed comparison token. Only the five whitelisted
    /// tokens are operators; anything else is a path segment.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "gt" => Some(Operator::Gt),
            "gte" => Some(Operator::Gte),
            "lt" => Some(Operator::Lt),
            "lte" => Some(Operator::Lte),
            "in" => Some(Operator::In),
            _ => None,
        }
    }

    /// Store operator form (`$gte`).
    pub fn as_store_operator(&self) -> &'static str {
        match self {
            Operator::Eq => "$eq",
            Operator::Gt => "$gt",
            Operator::Gte => "$gte",
            Operator::Lt => "$lt",
            Operator::Lte => "$lte",
            Operator::In => "$in",
        }
    }

    /// SQL comparison symbol for ordered operators.
    pub fn sql_symbol(&self) -> Option<&'static str> {
        match self {
            Operator::Gt => Some(">"),
            Operator::Gte => Some(">="),
            Operator::Lt => Some("<"),
            Operator::Lte => Some("<="),
            Operator::Eq | Operator::In => None,
        }
    }
}

/// Filter value types.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Boolean value.
    Boolean(bool),
    /// Integer value.
    Integer(i64),
    /// Float value.
    Float(f64),
    /// String value.
    String(String),
    /// List of values (for `in`).
    List(Vec<FilterValue>),
}

impl FilterValue {
    /// Coerce a query-string value for equality matching.
    ///
    /// Numbers are only recognised in canonical form so that `02118` stays
    /// a string and keeps matching zip codes stored as text.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "true" => return FilterValue::Boolean(true),
            "false" => return FilterValue::Boolean(false),
            _ => {}
        }
        if let Ok(n) = raw.parse::<i64>()
            && n.to_string() == raw
        {
            return FilterValue::Integer(n);
        }
        if let Ok(f) = raw.parse::<f64>()
            && f.is_finite()
            && f.to_string() == raw
        {
            return FilterValue::Float(f);
        }
        FilterValue::String(raw.to_string())
    }

    /// Coerce a query-string value for an ordered comparison. Any finite
    /// number is accepted.
    pub fn parse_numeric(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Ok(n) = trimmed.parse::<i64>() {
            return FilterValue::Integer(n);
        }
        if let Ok(f) = trimmed.parse::<f64>()
            && f.is_finite()
        {
            return FilterValue::Float(f);
        }
        FilterValue::parse(raw)
    }

    /// JSON form of the value.
    pub fn to_json(&self) -> Value {
        match self {
            FilterValue::Boolean(b) => Value::Bool(*b),
            FilterValue::Integer(n) => Value::from(*n),
            FilterValue::Float(f) => Value::from(*f),
            FilterValue::String(s) => Value::String(s.clone()),
            FilterValue::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
        }
    }

    /// Text form, as a scalar would read when extracted as text.
    pub fn to_text(&self) -> String {
        match self {
            FilterValue::String(s) => s.clone(),
            other => other.to_json().to_string(),
        }
    }

    /// JSON type name (`jsonb_typeof`).
    pub fn json_type(&self) -> &'static str {
        match self {
            FilterValue::Boolean(_) => "boolean",
            FilterValue::Integer(_) | FilterValue::Float(_) => "number",
            FilterValue::String(_) => "string",
            FilterValue::List(_) => "array",
        }
    }

    /// Members of a list, or the value itself.
    pub fn items(&self) -> Vec<&FilterValue> {
        match self {
            FilterValue::List(items) => items.iter().collect(),
            other => vec![other],
        }
    }
}

/// A point as `[longitude, latitude]` in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub lng: f64,
    pub lat: f64,
}

/// Radius of the earth in miles.
pub const EARTH_RADIUS_MILES: f64 = 3963.2;

impl GeoPoint {
    /// Great-circle distance to another point in radians.
    pub fn angular_distance(&self, other: &GeoPoint) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlng = (other.lng - self.lng).to_radians();
        let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
        2.0 * h.sqrt().min(1.0).asin()
    }
}

/// One predicate of a filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Compare the value at `path`.
    Field {
        path: FieldPath,
        op: Operator,
        value: FilterValue,
    },
    /// GeoJSON point at `path` lies within `radius` radians of `center`.
    WithinRadius {
        path: FieldPath,
        center: GeoPoint,
        radius: f64,
    },
}

impl Condition {
    pub fn eq(path: FieldPath, value: FilterValue) -> Self {
        Condition::Field {
            path,
            op: Operator::Eq,
            value,
        }
    }

    pub fn is_in(path: FieldPath, values: Vec<FilterValue>) -> Self {
        Condition::Field {
            path,
            op: Operator::In,
            value: FilterValue::List(values),
        }
    }
}

/// Conjunction of conditions. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// New filter with one more condition.
    pub fn and(&self, condition: Condition) -> Self {
        let mut conditions = self.conditions.clone();
        conditions.push(condition);
        Self { conditions }
    }

    /// New filter requiring both.
    pub fn merge(&self, other: &Filter) -> Self {
        let mut conditions = self.conditions.clone();
        conditions.extend(other.conditions.iter().cloned());
        Self { conditions }
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

impl From<Vec<Condition>> for Filter {
    fn from(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One sort key.
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub path: FieldPath,
    pub direction: SortDirection,
}

impl SortKey {
    /// `createdAt` descending.
    pub fn newest_first() -> Self {
        Self {
            path: FieldPath::known(CREATED_AT_FIELD),
            direction: SortDirection::Desc,
        }
    }
}

/// Inclusion projection. Empty keeps every field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    fields: Vec<FieldPath>,
}

impl Projection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(fields: Vec<FieldPath>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldPath] {
        &self.fields
    }

    pub fn is_all(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether the projection keeps the top-level field `name`.
    pub fn includes(&self, name: &str) -> bool {
        self.is_all() || self.fields.iter().any(|f| f.segments()[0] == name)
    }

    /// Apply to a document. `_id` is always kept.
    pub fn apply(&self, doc: &Value) -> Value {
        if self.is_all() {
            return doc.clone();
        }
        let mut out = Map::new();
        if let Some(id) = doc.get(ID_FIELD) {
            out.insert(ID_FIELD.to_string(), id.clone());
        }
        for path in &self.fields {
            copy_path(doc, &mut out, path.segments());
        }
        Value::Object(out)
    }
}

fn copy_path(src: &Value, dst: &mut Map<String, Value>, segments: &[String]) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    let Some(value) = src.get(first) else {
        return;
    };
    if rest.is_empty() {
        dst.insert(first.clone(), value.clone());
        return;
    }
    match value {
        Value::Object(_) => {
            let entry = dst
                .entry(first.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(inner) = entry {
                copy_path(value, inner, rest);
            }
        }
        Value::Array(items) => {
            let objects: Vec<&Value> = items.iter().filter(|v| v.is_object()).collect();
            let entry = dst.entry(first.clone()).or_insert_with(|| {
                Value::Array(objects.iter().map(|_| Value::Object(Map::new())).collect())
            });
            if let Value::Array(targets) = entry {
                for (item, target) in objects.iter().zip(targets.iter_mut()) {
                    if let Value::Object(inner) = target {
                        copy_path(item, inner, rest);
                    }
                }
            }
        }
        _ => {}
    }
}

/// Remove top-level fields from a document.
pub fn strip_fields(doc: &mut Value, fields: &[&str]) {
    if let Value::Object(map) = doc {
        for field in fields {
            map.remove(*field);
        }
    }
}

/// Parsed intent of a list request.
#[derive(Debug, Clone, PartialEq)]
pub struct ListSpec {
    pub filter: Filter,
    pub select: Projection,
    pub sort: Vec<SortKey>,
    pub page: u64,
    pub limit: u64,
}

/// Position of an adjacent page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageDescriptor {
    pub page: u64,
    pub limit: u64,
}

/// Adjacent page descriptors; absent ones are omitted from JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Pagination {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<PageDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<PageDescriptor>,
}

/// Response body of a list request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultEnvelope {
    pub success: bool,
    /// Number of records in `data`, not the total match count.
    pub count: usize,
    pub pagination: Pagination,
    pub data: Vec<Value>,
}

impl ResultEnvelope {
    pub fn new(data: Vec<Value>, pagination: Pagination) -> Self {
        Self {
            success: true,
            count: data.len(),
            pagination,
            data,
        }
    }
}
