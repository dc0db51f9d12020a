//! Query parameters to filter conditions.
//!
//! Keys take the form `field`, `field.sub` or `field[sub][op]`. The final
//! bracket segment is an operator only when it is one of the whitelisted
//! comparison tokens; values are never inspected for tokens.

use super::QueryError;
use super::types::{Condition, FieldPath, Filter, FilterValue, Operator};

/// Control keys consumed by the shaper and paginator, never filters.
pub const RESERVED_KEYS: [&str; 4] = ["select", "sort", "page", "limit"];

/// Translate raw query parameters into a filter. Repeated keys are ANDed.
pub fn translate(params: &[(String, String)]) -> Result<Filter, QueryError> {
    let conditions = params
        .iter()
        .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
        .map(|(key, raw)| translate_pair(key, raw))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Filter::from(conditions))
}

fn translate_pair(key: &str, raw: &str) -> Result<Condition, QueryError> {
    let (base, brackets) = split_key(key)?;

    let mut segments: Vec<String> = base.split('.').map(str::to_string).collect();
    let mut op = Operator::Eq;
    let last = brackets.len().checked_sub(1);
    for (i, segment) in brackets.iter().enumerate() {
        if Some(i) == last
            && let Some(found) = Operator::from_token(segment)
        {
            op = found;
            continue;
        }
        segments.push((*segment).to_string());
    }

    let path = FieldPath::from_segments(segments)?;
    let value = match op {
        Operator::Eq => FilterValue::parse(raw),
        Operator::In => FilterValue::List(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(FilterValue::parse)
                .collect(),
        ),
        Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
            FilterValue::parse_numeric(raw)
        }
    };

    Ok(Condition::Field { path, op, value })
}

/// Split `a[b][c]` into `("a", ["b", "c"])`.
fn split_key(key: &str) -> Result<(&str, Vec<&str>), QueryError> {
    let malformed = || QueryError::MalformedKey(key.to_string());

    let (base, mut rest) = match key.find('[') {
        Some(i) => (&key[..i], &key[i..]),
        None => (key, ""),
    };

    let mut brackets = Vec::new();
    while !rest.is_empty() {
        let inner = rest.strip_prefix('[').ok_or_else(malformed)?;
        let close = inner.find(']').ok_or_else(malformed)?;
        brackets.push(&inner[..close]);
        rest = &inner[close + 1..];
    }

    Ok((base, brackets))
}
