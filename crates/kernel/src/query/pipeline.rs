//! Listing pipeline: translate, shape, count, paginate, expand, execute.

use serde_json::Value;

use super::expand::{Relation, RelationSpec, expand};
use super::paginate::{PageRequest, paginate};
use super::shape::{apply_projection_and_sort, parse_select, parse_sort};
use super::translate::translate;
use super::types::{Filter, ListSpec, Projection, ResultEnvelope, SortKey, strip_fields};
use super::{QueryError, RelationError};
use crate::store::{Collection, DocumentStore, FindOptions};

/// Immutable description of one list query. Each `with_*` returns a new
/// value.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    collection: Collection,
    filter: Filter,
    projection: Projection,
    sort: Vec<SortKey>,
    skip: u64,
    limit: Option<u64>,
    populate: Option<Relation>,
}

impl ListQuery {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            filter: Filter::new(),
            projection: Projection::all(),
            sort: Vec::new(),
            skip: 0,
            limit: None,
            populate: None,
        }
    }

    pub fn with_filter(self, filter: Filter) -> Self {
        Self { filter, ..self }
    }

    pub fn with_projection(self, projection: Projection) -> Self {
        Self { projection, ..self }
    }

    pub fn with_sort(self, sort: Vec<SortKey>) -> Self {
        Self { sort, ..self }
    }

    pub fn with_window(self, skip: u64, limit: u64) -> Self {
        Self {
            skip,
            limit: Some(limit),
            ..self
        }
    }

    pub fn with_populate(self, populate: Option<Relation>) -> Self {
        Self { populate, ..self }
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn sort(&self) -> &[SortKey] {
        &self.sort
    }

    pub fn skip(&self) -> u64 {
        self.skip
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn populate(&self) -> Option<&Relation> {
        self.populate.as_ref()
    }

    pub fn find_options(&self) -> FindOptions {
        FindOptions {
            sort: self.sort.clone(),
            skip: self.skip,
            limit: self.limit,
        }
    }
}

/// Last value given for a control key.
fn control<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .rev()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Parse the query string of a list request.
pub fn parse_list_spec(params: &[(String, String)]) -> Result<ListSpec, QueryError> {
    let page = PageRequest::parse(control(params, "page"), control(params, "limit"));
    Ok(ListSpec {
        filter: translate(params)?,
        select: parse_select(control(params, "select"))?,
        sort: parse_sort(control(params, "sort"))?,
        page: page.page,
        limit: page.limit,
    })
}

/// Reusable list operation for one collection.
#[derive(Debug, Clone)]
pub struct ListingPipeline {
    collection: Collection,
    relation: Option<Relation>,
}

impl ListingPipeline {
    /// Build a pipeline. An unknown relation is rejected here, not per request.
    pub fn new(
        collection: Collection,
        relation: Option<RelationSpec>,
    ) -> Result<Self, RelationError> {
        let relation = relation
            .map(|spec| Relation::resolve(collection, &spec))
            .transpose()?;
        Ok(Self {
            collection,
            relation,
        })
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    /// Run a list request.
    pub async fn execute(
        &self,
        store: &dyn DocumentStore,
        params: &[(String, String)],
    ) -> Result<ResultEnvelope, QueryError> {
        self.execute_scoped(store, params, &Filter::new()).await
    }

    /// Run a list request with extra conditions the caller requires.
    pub async fn execute_scoped(
        &self,
        store: &dyn DocumentStore,
        params: &[(String, String)],
        scope: &Filter,
    ) -> Result<ResultEnvelope, QueryError> {
        let spec = parse_list_spec(params)?;
        let page = PageRequest {
            page: spec.page,
            limit: spec.limit,
        };

        let query = ListQuery::new(self.collection).with_filter(spec.filter.merge(scope));
        let query = apply_projection_and_sort(query, spec.select, spec.sort);

        // Count against the filter before the page window is applied.
        let total = store.count(self.collection, query.filter()).await?;
        let (query, pagination) = paginate(query, page, total);

        let relation = self
            .relation
            .clone()
            .filter(|r| query.projection().includes(&r.name));
        let query = query.with_populate(relation);

        let mut records = store
            .find(self.collection, query.filter(), &query.find_options())
            .await?;
        if let Some(relation) = query.populate() {
            expand(store, relation, &mut records).await?;
        }

        let data: Vec<Value> = records
            .iter()
            .map(|record| {
                let mut shaped = query.projection().apply(record);
                strip_fields(&mut shaped, self.collection.hidden_fields());
                shaped
            })
            .collect();

        tracing::debug!(
            collection = %self.collection,
            total,
            page = page.page,
            limit = page.limit,
            returned = data.len(),
            "listing executed"
        );

        Ok(ResultEnvelope::new(data, pagination))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::query::{PageDescriptor, Pagination};
    use crate::store::MemoryDocumentStore;
    use serde_json::json;
    use uuid::Uuid;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    async fn seeded(n: usize) -> MemoryDocumentStore {
        let store = MemoryDocumentStore::new();
        for i in 0..n {
            store
                .insert(
                    Collection::Bootcamps,
                    json!({
                        "_id": Uuid::now_v7().to_string(),
                        "name": format!("Bootcamp {i:02}"),
                        "description": "desc",
                        "averageCost": 1000 * i,
                        "createdAt": format!("2024-01-01T00:00:{i:02}.000Z"),
                    }),
                )
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn second_page_of_thirty() {
        let store = seeded(30).await;
        let pipeline = ListingPipeline::new(Collection::Bootcamps, None).unwrap();
        let envelope = pipeline
            .execute(&store, &params(&[("limit", "10"), ("page", "2")]))
            .await
            .unwrap();

        assert_eq!(envelope.count, 10);
        assert_eq!(
            envelope.pagination,
            Pagination {
                next: Some(PageDescriptor { page: 3, limit: 10 }),
                prev: Some(PageDescriptor { page: 1, limit: 10 }),
            }
        );
        // Newest first: positions 11..=20 are created at seconds 19 down to 10.
        assert_eq!(envelope.data[0]["name"], "Bootcamp 19");
        assert_eq!(envelope.data[9]["name"], "Bootcamp 10");
    }

    #[tokio::test]
    async fn defaults_on_a_small_collection() {
        let store = seeded(5).await;
        let pipeline = ListingPipeline::new(Collection::Bootcamps, None).unwrap();
        let envelope = pipeline.execute(&store, &[]).await.unwrap();
        assert_eq!(envelope.count, 5);
        assert_eq!(envelope.pagination, Pagination::default());
    }

    #[tokio::test]
    async fn pagination_uses_the_filtered_total() {
        let store = seeded(30).await;
        let pipeline = ListingPipeline::new(Collection::Bootcamps, None).unwrap();
        // averageCost >= 20000 leaves ten records: one full page, no next.
        let envelope = pipeline
            .execute(
                &store,
                &params(&[("averageCost[gte]", "20000"), ("limit", "10")]),
            )
            .await
            .unwrap();
        assert_eq!(envelope.count, 10);
        assert!(envelope.pagination.next.is_none());
    }

    #[tokio::test]
    async fn projection_law() {
        let store = seeded(3).await;
        let pipeline = ListingPipeline::new(Collection::Bootcamps, None).unwrap();
        let envelope = pipeline
            .execute(&store, &params(&[("select", "name,description")]))
            .await
            .unwrap();
        for record in &envelope.data {
            let mut keys: Vec<&str> = record
                .as_object()
                .unwrap()
                .keys()
                .map(String::as_str)
                .collect();
            keys.sort_unstable();
            assert_eq!(keys, ["_id", "description", "name"]);
        }
    }

    #[tokio::test]
    async fn identical_requests_give_identical_envelopes() {
        let store = seeded(12).await;
        let pipeline = ListingPipeline::new(Collection::Bootcamps, None).unwrap();
        let request = params(&[("sort", "-averageCost"), ("limit", "5"), ("page", "2")]);
        let first = pipeline.execute(&store, &request).await.unwrap();
        let second = pipeline.execute(&store, &request).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn expansion_follows_projection() {
        let store = seeded(1).await;
        let pipeline = ListingPipeline::new(
            Collection::Bootcamps,
            Some(RelationSpec::new("courses")),
        )
        .unwrap();

        let full = pipeline.execute(&store, &[]).await.unwrap();
        assert_eq!(full.data[0]["courses"], json!([]));

        let narrowed = pipeline
            .execute(&store, &params(&[("select", "name")]))
            .await
            .unwrap();
        assert!(narrowed.data[0].get("courses").is_none());
    }

    #[tokio::test]
    async fn malformed_filters_fail_the_request() {
        let store = seeded(1).await;
        let pipeline = ListingPipeline::new(Collection::Bootcamps, None).unwrap();
        assert!(
            pipeline
                .execute(&store, &params(&[("$where", "1")]))
                .await
                .is_err()
        );
        assert!(
            pipeline
                .execute(&store, &params(&[("_id", "42")]))
                .await
                .is_err()
        );
    }

    #[test]
    fn unknown_relation_fails_construction() {
        assert!(ListingPipeline::new(Collection::Users, Some(RelationSpec::new("courses"))).is_err());
    }
}
