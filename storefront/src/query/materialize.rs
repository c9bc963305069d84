//! Executes built queries and decodes aggregate payloads
//!
//! Listing queries return one JSON array per round trip and lookups return
//! one JSON object, so decoding the whole entity graph is a single
//! `serde_json` pass. A payload that does not fit the entity type is a
//! [`DecodeError`](crate::repository::RepositoryErrorKind::DecodeError),
//! never a not-found.

use serde::de::DeserializeOwned;
use sqlx::PgPool;
use std::time::Duration;

use super::accumulator::BuiltQuery;
use super::bounded;
use crate::repository::{RepositoryError, RepositoryOperation, RepositoryResult, WriteStep};

/// Read side of a facade: a pool plus the read timeout
#[derive(Debug, Clone)]
pub struct Materializer {
    pool: PgPool,
    timeout: Duration,
}

impl Materializer {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// Run a listing query and decode every element
    pub async fn fetch_many<T: DeserializeOwned>(
        &self,
        operation: RepositoryOperation,
        query: &BuiltQuery,
    ) -> RepositoryResult<Vec<T>> {
        let payload = self.fetch_payload(operation, query).await?;
        match payload {
            Some(document) => decode(operation, document),
            None => Ok(Vec::new()),
        }
    }

    /// Run a lookup query; `None` when no row matched
    pub async fn fetch_one<T: DeserializeOwned>(
        &self,
        operation: RepositoryOperation,
        query: &BuiltQuery,
    ) -> RepositoryResult<Option<T>> {
        self.fetch_payload(operation, query)
            .await?
            .map(|document| decode(operation, document))
            .transpose()
    }

    /// Run a `COUNT(*)` query
    pub async fn fetch_count(&self, query: &BuiltQuery) -> RepositoryResult<u64> {
        let operation = RepositoryOperation::Count;
        let arguments = encode(operation, query)?;
        let pool = &self.pool;
        let total: i64 = bounded(operation, self.timeout, async move {
            sqlx::query_scalar_with::<_, i64, _>(query.sql(), arguments)
                .fetch_one(pool)
                .await
                .map_err(|e| RepositoryError::from_sqlx(operation, WriteStep::Query, e))
        })
        .await?;

        u64::try_from(total)
            .map_err(|_| RepositoryError::decode(operation, format!("negative count {total}")))
    }

    async fn fetch_payload(
        &self,
        operation: RepositoryOperation,
        query: &BuiltQuery,
    ) -> RepositoryResult<Option<serde_json::Value>> {
        let arguments = encode(operation, query)?;
        let pool = &self.pool;
        bounded(operation, self.timeout, async move {
            sqlx::query_scalar_with::<_, Option<serde_json::Value>, _>(query.sql(), arguments)
                .fetch_optional(pool)
                .await
                .map(Option::flatten)
                .map_err(|e| RepositoryError::from_sqlx(operation, WriteStep::Query, e))
        })
        .await
    }
}

/// Encode bound values, reporting failures against the query step
pub(crate) fn encode(
    operation: RepositoryOperation,
    query: &BuiltQuery,
) -> RepositoryResult<sqlx::postgres::PgArguments> {
    query.arguments().map_err(|e| {
        RepositoryError::database_error(operation, format!("failed to encode arguments: {e}"))
            .with_step(WriteStep::Query)
    })
}

/// Decode an aggregate payload into its entity type
pub fn decode<T: DeserializeOwned>(
    operation: RepositoryOperation,
    document: serde_json::Value,
) -> RepositoryResult<T> {
    serde_json::from_value(document).map_err(|e| RepositoryError::decode(operation, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::RepositoryErrorKind;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: String,
        qty: i64,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Parent {
        id: String,
        items: Vec<Item>,
    }

    #[test]
    fn test_decode_nested_payload_in_one_pass() {
        let payload = json!([
            {"id": "a", "items": [{"id": "i1", "qty": 2}, {"id": "i2", "qty": 1}]},
            {"id": "b", "items": []}
        ]);
        let parents: Vec<Parent> = decode(RepositoryOperation::FindMany, payload).unwrap();
        assert_eq!(parents.len(), 2);
        assert_eq!(
            parents[0].items[1],
            Item {
                id: "i2".into(),
                qty: 1,
            }
        );
        assert!(parents[1].items.is_empty());
    }

    #[test]
    fn test_shape_mismatch_is_a_decode_error() {
        let payload = json!([{"id": "a", "items": [{"id": "i1", "qty": "two"}]}]);
        let error = decode::<Vec<Parent>>(RepositoryOperation::FindMany, payload).unwrap_err();
        assert_eq!(error.kind, RepositoryErrorKind::DecodeError);
        assert_eq!(error.step, Some(WriteStep::Decode));
    }
}
