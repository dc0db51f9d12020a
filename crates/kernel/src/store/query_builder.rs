//! Document query builder using SeaQuery.
//!
//! Generates SQL over the `documents` table with support for:
//! - JSONB path extraction and type-bracketed comparisons
//! - Array membership for equality
//! - Great-circle radius filters on GeoJSON points
//! - Sorting on JSONB paths with an identity tie-break

use sea_query::{
    Alias, Asterisk, Cond, DeleteStatement, Expr, ExprTrait, Order, PostgresQueryBuilder, Query,
    SelectStatement, SimpleExpr,
};
use uuid::Uuid;

use super::{Collection, FindOptions, StoreError, identity_operand, validate_identity_values};
use crate::query::{Condition, FieldPath, Filter, FilterValue, Operator, SortDirection};

const TABLE: &str = "documents";

/// Query builder for one collection and filter.
pub struct DocumentQueryBuilder<'a> {
    collection: Collection,
    filter: &'a Filter,
}

impl<'a> DocumentQueryBuilder<'a> {
    /// Create a builder. Fails when an identity operand is not a UUID.
    pub fn new(collection: Collection, filter: &'a Filter) -> Result<Self, StoreError> {
        validate_identity_values(filter)?;
        Ok(Self { collection, filter })
    }

    /// Build the SELECT returning matching document bodies.
    pub fn build_find(&self, options: &FindOptions) -> String {
        let mut query = Query::select();
        query.column(Alias::new("body")).from(Alias::new(TABLE));
        self.add_filters(&mut query);

        for key in &options.sort {
            let order = match key.direction {
                SortDirection::Asc => Order::Asc,
                SortDirection::Desc => Order::Desc,
            };
            if key.path.is_id() {
                query.order_by(Alias::new("id"), order);
            } else {
                query.order_by_expr(Expr::cust(jsonb_path(&key.path)), order);
            }
        }
        query.order_by(Alias::new("id"), Order::Asc);

        if let Some(limit) = options.limit {
            query.limit(clamp_bigint(limit));
        }
        if options.skip > 0 {
            query.offset(clamp_bigint(options.skip));
        }

        query.to_string(PostgresQueryBuilder)
    }

    /// Build a COUNT over the same filter.
    pub fn build_count(&self) -> String {
        let mut query = Query::select();
        query.expr(Expr::col(Asterisk).count()).from(Alias::new(TABLE));
        self.add_filters(&mut query);
        query.to_string(PostgresQueryBuilder)
    }

    /// Build a DELETE over the same filter.
    pub fn build_delete(&self) -> String {
        let mut query: DeleteStatement = Query::delete();
        query.from_table(Alias::new(TABLE));
        query.and_where(Expr::col(Alias::new("collection")).eq(self.collection.as_str()));
        for condition in self.filter.conditions() {
            query.and_where(condition_expr(condition));
        }
        query.to_string(PostgresQueryBuilder)
    }

    fn add_filters(&self, query: &mut SelectStatement) {
        query.and_where(Expr::col(Alias::new("collection")).eq(self.collection.as_str()));
        for condition in self.filter.conditions() {
            query.and_where(condition_expr(condition));
        }
    }
}

/// OFFSET and LIMIT are bigint in PostgreSQL.
fn clamp_bigint(n: u64) -> u64 {
    n.min(i64::MAX as u64)
}

/// `body #> '{a,b}'`. Segments are validated identifiers, so inlining is safe.
fn jsonb_path(path: &FieldPath) -> String {
    format!("body #> '{{{}}}'", path.segments().join(","))
}

/// `body #>> '{a,b}'`, the value as text.
fn text_path(path: &FieldPath) -> String {
    format!("body #>> '{{{}}}'", path.segments().join(","))
}

fn condition_expr(condition: &Condition) -> SimpleExpr {
    match condition {
        Condition::Field { path, op, value } if path.is_id() => identity_expr(*op, value),
        Condition::Field { path, op, value } => match op {
            Operator::Eq => equality_expr(path, value),
            Operator::In => {
                let items = value.items();
                if items.is_empty() {
                    return Expr::cust("FALSE");
                }
                items
                    .into_iter()
                    .fold(Cond::any(), |cond, item| {
                        cond.add(equality_expr(path, item))
                    })
                    .into()
            }
            ordered => {
                let symbol = ordered.sql_symbol().unwrap_or("=");
                let p = jsonb_path(path);
                Expr::cust_with_values(
                    format!("(jsonb_typeof({p}) = $1 AND {p} {symbol} $2::jsonb)"),
                    [value.json_type().to_string(), value.to_json().to_string()],
                )
            }
        },
        Condition::WithinRadius {
            path,
            center,
            radius,
        } => {
            let c = jsonb_path(&path.child("coordinates"));
            let lng = format!("(({c}) ->> 0)::float8");
            let lat = format!("(({c}) ->> 1)::float8");
            Expr::cust_with_values(
                format!(
                    "(jsonb_typeof({c}) = 'array' AND 2 * asin(least(1, sqrt(\
                     power(sin((radians({lat}) - radians($1)) / 2), 2) + \
                     cos(radians($1)) * cos(radians({lat})) * \
                     power(sin((radians({lng}) - radians($2)) / 2), 2)))) <= $3)"
                ),
                [center.lat, center.lng, *radius],
            )
        }
    }
}

/// Same JSON value, same text, or an array containing the value.
fn equality_expr(path: &FieldPath, value: &FilterValue) -> SimpleExpr {
    let p = jsonb_path(path);
    let t = text_path(path);
    let json = value.to_json();
    Expr::cust_with_values(
        format!(
            "({p} = $1::jsonb OR {t} = $2 OR (jsonb_typeof({p}) = 'array' AND {p} @> $3::jsonb))"
        ),
        [
            json.to_string(),
            value.to_text(),
            serde_json::Value::Array(vec![json]).to_string(),
        ],
    )
}

fn identity_expr(op: Operator, value: &FilterValue) -> SimpleExpr {
    // Operands were validated when the builder was created.
    let ids: Vec<Uuid> = value
        .items()
        .into_iter()
        .filter_map(|v| identity_operand(v).ok())
        .collect();
    let col = Expr::col(Alias::new("id"));
    match (op, ids.first()) {
        (_, None) => Expr::cust("FALSE"),
        (Operator::Eq | Operator::In, _) => col.is_in(ids),
        (Operator::Gt, Some(id)) => col.gt(*id),
        (Operator::Gte, Some(id)) => col.gte(*id),
        (Operator::Lt, Some(id)) => col.lt(*id),
        (Operator::Lte, Some(id)) => col.lte(*id),
    }
}
