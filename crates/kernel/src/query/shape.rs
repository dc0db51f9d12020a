//! Projection and sort order.

use super::QueryError;
use super::pipeline::ListQuery;
use super::types::{FieldPath, Projection, SortDirection, SortKey};

/// Parse `select=name,description`.
pub fn parse_select(raw: Option<&str>) -> Result<Projection, QueryError> {
    let Some(raw) = raw else {
        return Ok(Projection::all());
    };
    let fields = split_list(raw)
        .map(FieldPath::parse)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Projection::new(fields))
}

/// Parse `sort=-averageCost,name`; a leading `-` sorts descending.
pub fn parse_sort(raw: Option<&str>) -> Result<Vec<SortKey>, QueryError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    split_list(raw)
        .map(|item| {
            let (direction, name) = match item.strip_prefix('-') {
                Some(name) => (SortDirection::Desc, name),
                None => (SortDirection::Asc, item.strip_prefix('+').unwrap_or(item)),
            };
            Ok(SortKey {
                path: FieldPath::parse(name)?,
                direction,
            })
        })
        .collect()
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split([',', ' ']).map(str::trim).filter(|s| !s.is_empty())
}

/// Apply projection and sort to a query. With no sort keys the query is
/// ordered newest first.
pub fn apply_projection_and_sort(
    query: ListQuery,
    projection: Projection,
    sort: Vec<SortKey>,
) -> ListQuery {
    let sort = if sort.is_empty() {
        vec![SortKey::newest_first()]
    } else {
        sort
    };
    query.with_projection(projection).with_sort(sort)
}
