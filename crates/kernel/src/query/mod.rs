//! Listing pipeline.
//!
//! Turns the query string of a list request into a filtered, sorted,
//! projected, paginated and optionally expanded page of documents:
//! - `translate`: query parameters to a [`Filter`]
//! - `shape`: `select` and `sort` to a projection and sort keys
//! - `paginate`: `page` and `limit` to skip/limit and page descriptors
//! - `expand`: batched attachment of related documents
//! - `pipeline`: the composition, producing a [`ResultEnvelope`]

pub mod expand;
pub mod paginate;
pub mod pipeline;
pub mod shape;
pub mod translate;
pub mod types;

use thiserror::Error;

use crate::store::StoreError;

pub use expand::{Relation, RelationKind, RelationSpec};
pub use paginate::{PageRequest, paginate};
pub use pipeline::{ListQuery, ListingPipeline};
pub use translate::translate;
pub use types::{
    Condition, FieldPath, Filter, FilterValue, GeoPoint, ListSpec, Operator, PageDescriptor,
    Pagination, Projection, ResultEnvelope, SortDirection, SortKey,
};

/// Failure while parsing or executing a list request.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Invalid field name '{0}'")]
    InvalidField(String),

    #[error("Malformed query parameter '{0}'")]
    MalformedKey(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Invalid relation declaration, raised when a pipeline is built.
#[derive(Debug, Error)]
pub enum RelationError {
    #[error("collection '{collection}' has no relation named '{path}'")]
    UnknownRelation { collection: String, path: String },

    #[error("relation '{path}' selects invalid field '{field}'")]
    InvalidField { path: String, field: String },
}
