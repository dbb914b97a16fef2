//! `PostgreSQL` implementation of the `ShipmentStore` trait.
//!
//! Each shipment is one row holding the JSONB document. Targeted writes lock
//! the row (`FOR UPDATE`) and apply the shared merge/prepend rules in Rust,
//! so all adapters agree on document semantics.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

use shiptrack_core::error::{DomainError, ValidationError, ValidationReason};
use shiptrack_core::store::{
    Document, ID_FIELD, ShipmentStore, check_revision, document_id, document_revision,
    document_tracking_number, merge_fields, prepend_event, stamp_inserted,
};

use crate::schema::CREATE_SHIPMENTS_TABLE;

const PRIMARY_KEY_CONSTRAINT: &str = "shipments_pkey";

/// Resolves a key to one row: tracking-number match first, then id.
const SELECT_BY_KEY: &str = r"
SELECT id, document FROM shipments
WHERE tracking_number = $1 OR id::text = $1
ORDER BY (tracking_number = $1) DESC
LIMIT 1";

/// PostgreSQL-backed shipment store.
#[derive(Debug, Clone)]
pub struct PgShipmentStore {
    pool: PgPool,
}

fn db_error(e: sqlx::Error) -> DomainError {
    DomainError::StoreUnavailable(format!("database error: {e}"))
}

impl PgShipmentStore {
    /// Creates a new `PgShipmentStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the shipments table if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StoreUnavailable` if the DDL fails.
    pub async fn ensure_schema(&self) -> Result<(), DomainError> {
        sqlx::raw_sql(CREATE_SHIPMENTS_TABLE)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    /// Loads and row-locks the document addressed by `key`.
    async fn lock_by_key(
        tx: &mut Transaction<'_, Postgres>,
        key: &str,
    ) -> Result<(Uuid, Document), DomainError> {
        let query = format!("{SELECT_BY_KEY} FOR UPDATE");
        let row: Option<(Uuid, Json<Document>)> = sqlx::query_as(&query)
            .bind(key)
            .fetch_optional(&mut **tx)
            .await
            .map_err(db_error)?;
        row.map(|(id, Json(document))| (id, document))
            .ok_or_else(|| DomainError::NotFound(key.to_owned()))
    }

    /// Writes `document` back to row `id` and commits.
    async fn save(
        mut tx: Transaction<'_, Postgres>,
        id: Uuid,
        document: &Document,
    ) -> Result<(), DomainError> {
        sqlx::query(
            "UPDATE shipments SET document = $2, revision = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(Json(document))
        .bind(document_revision(document))
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
        tx.commit().await.map_err(db_error)
    }
}

#[async_trait]
impl ShipmentStore for PgShipmentStore {
    fn backend_tag(&self) -> &'static str {
        "postgres"
    }

    #[instrument(skip(self))]
    async fn fetch_all(&self) -> Result<Vec<Document>, DomainError> {
        let rows: Vec<Json<Document>> =
            sqlx::query_scalar("SELECT document FROM shipments ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await
                .map_err(db_error)?;
        debug!(count = rows.len(), "fetched shipment documents");
        Ok(rows.into_iter().map(|Json(document)| document).collect())
    }

    #[instrument(skip(self))]
    async fn fetch_one(&self, key: &str) -> Result<Option<Document>, DomainError> {
        let row: Option<(Uuid, Json<Document>)> = sqlx::query_as(SELECT_BY_KEY)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(row.map(|(_, Json(document))| document))
    }

    #[instrument(skip(self, document))]
    async fn insert(&self, mut document: Document) -> Result<Document, DomainError> {
        let tracking_number = document_tracking_number(&document)
            .ok_or_else(|| ValidationError::required("trackingNumber"))?
            .to_owned();
        let id = document_id(&document)
            .ok_or_else(|| ValidationError::required(ID_FIELD))
            .and_then(|raw| {
                Uuid::parse_str(raw)
                    .map_err(|_| ValidationError::new(ID_FIELD, ValidationReason::BadFormat))
            })?;
        stamp_inserted(&mut document);

        let result = sqlx::query(
            "INSERT INTO shipments (id, tracking_number, revision, document) VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(&tracking_number)
        .bind(document_revision(&document))
        .bind(Json(&document))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(document),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                if db.constraint() == Some(PRIMARY_KEY_CONSTRAINT) {
                    Err(DomainError::Conflict {
                        key: id.to_string(),
                        expected: 0,
                        actual: 1,
                    })
                } else {
                    Err(DomainError::DuplicateTrackingNumber(tracking_number))
                }
            }
            Err(e) => Err(db_error(e)),
        }
    }

    #[instrument(skip(self, fields))]
    async fn merge(
        &self,
        key: &str,
        expected_revision: Option<i64>,
        fields: Document,
    ) -> Result<Document, DomainError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let (id, mut document) = Self::lock_by_key(&mut tx, key).await?;
        check_revision(&document, key, expected_revision)?;
        merge_fields(&mut document, fields);
        Self::save(tx, id, &document).await?;
        Ok(document)
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<(), DomainError> {
        let result = sqlx::query(&format!(
            "DELETE FROM shipments WHERE id = (SELECT id FROM ({SELECT_BY_KEY}) AS target)"
        ))
        .bind(key)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(key.to_owned()));
        }
        Ok(())
    }

    #[instrument(skip(self, event))]
    async fn append_event(&self, key: &str, event: Value) -> Result<Document, DomainError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let (id, mut document) = Self::lock_by_key(&mut tx, key).await?;
        prepend_event(&mut document, event);
        Self::save(tx, id, &document).await?;
        Ok(document)
    }
}
