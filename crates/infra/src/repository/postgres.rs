//! Postgres-backed CNJ record store.
//!
//! Records live in a single `cnj_records` table keyed by the CNJ number.
//! `save` is an upsert, so a re-delivered message simply overwrites the
//! previous outcome. The `ttl` column (epoch seconds) is indexed and honoured
//! by `purge_expired`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, instrument};

use cnjflow_core::{
    Cnj, CnjRecord, CnjRepository, CnjStatus, ExternalPayload, RepositoryError, RequestId,
    StatusUpdate,
};

use super::RecordPurger;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cnj_records (
    cnj           TEXT PRIMARY KEY,
    received_at   TIMESTAMPTZ NOT NULL,
    processed_at  TIMESTAMPTZ NULL,
    status        TEXT NOT NULL,
    external_data JSONB NULL,
    error         TEXT NULL,
    request_id    TEXT NOT NULL,
    ttl           BIGINT NULL
);
CREATE INDEX IF NOT EXISTS cnj_records_ttl_idx ON cnj_records (ttl);
"#;

pub struct PostgresCnjRepository {
    pool: PgPool,
}

impl PostgresCnjRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(storage)?;
        Ok(Self::new(pool))
    }

    /// Create the table and index if they do not exist.
    pub async fn ensure_schema(&self) -> Result<(), RepositoryError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(())
    }
}

fn storage(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Storage(e.to_string())
}

fn row_to_record(row: &PgRow) -> Result<CnjRecord, RepositoryError> {
    let status: String = row.try_get("status").map_err(storage)?;
    let status: CnjStatus = status
        .parse()
        .map_err(|e: cnjflow_core::DomainError| RepositoryError::Serialization(e.to_string()))?;
    let external_data: Option<serde_json::Value> = row.try_get("external_data").map_err(storage)?;
    let request_id: String = row.try_get("request_id").map_err(storage)?;

    Ok(CnjRecord {
        number: row.try_get("cnj").map_err(storage)?,
        received_at: row.try_get("received_at").map_err(storage)?,
        processed_at: row.try_get("processed_at").map_err(storage)?,
        status,
        external_data: external_data.map(ExternalPayload::new),
        error: row.try_get("error").map_err(storage)?,
        request_id: RequestId::new(request_id),
        ttl: row.try_get("ttl").map_err(storage)?,
    })
}

/// Column values written by a status update.
#[derive(Debug, PartialEq)]
struct StatusColumns {
    status: &'static str,
    processed_at: Option<DateTime<Utc>>,
    external_data: Option<serde_json::Value>,
    error: Option<String>,
}

impl StatusColumns {
    fn from_update(update: StatusUpdate, now: DateTime<Utc>) -> Self {
        let status = update.status().as_str();
        match update {
            StatusUpdate::Processing => Self {
                status,
                processed_at: None,
                external_data: None,
                error: None,
            },
            StatusUpdate::Processed(data) => Self {
                status,
                processed_at: Some(now),
                external_data: Some(data.into_json()),
                error: None,
            },
            StatusUpdate::Failed(reason) => Self {
                status,
                processed_at: Some(now),
                external_data: None,
                error: Some(reason),
            },
        }
    }
}

#[async_trait]
impl CnjRepository for PostgresCnjRepository {
    #[instrument(skip(self, cnj), fields(cnj = %cnj.number(), status = %cnj.status()), err)]
    async fn save(&self, cnj: &Cnj) -> Result<(), RepositoryError> {
        let record = CnjRecord::from(cnj);
        sqlx::query(
            r#"
            INSERT INTO cnj_records
                (cnj, received_at, processed_at, status, external_data, error, request_id, ttl)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (cnj) DO UPDATE SET
                received_at = EXCLUDED.received_at,
                processed_at = EXCLUDED.processed_at,
                status = EXCLUDED.status,
                external_data = EXCLUDED.external_data,
                error = EXCLUDED.error,
                request_id = EXCLUDED.request_id,
                ttl = EXCLUDED.ttl
            "#,
        )
        .bind(&record.number)
        .bind(record.received_at)
        .bind(record.processed_at)
        .bind(record.status.as_str())
        .bind(record.external_data.map(ExternalPayload::into_json))
        .bind(&record.error)
        .bind(record.request_id.as_str())
        .bind(record.ttl)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        debug!("CNJ record saved");
        Ok(())
    }

    async fn find_by_number(&self, number: &str) -> Result<Option<Cnj>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT cnj, received_at, processed_at, status, external_data, error, request_id, ttl
            FROM cnj_records
            WHERE cnj = $1
            "#,
        )
        .bind(number)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        row.as_ref()
            .map(row_to_record)
            .transpose()
            .map(|record| record.map(CnjRecord::into_entity))
    }

    #[instrument(skip(self, update), fields(cnj = %number, status = %update.status()), err)]
    async fn update_status(&self, number: &str, update: StatusUpdate) -> Result<(), RepositoryError> {
        let columns = StatusColumns::from_update(update, Utc::now());
        let result = sqlx::query(
            r#"
            UPDATE cnj_records
            SET status = $2, processed_at = $3, external_data = $4, error = $5
            WHERE cnj = $1
            "#,
        )
        .bind(number)
        .bind(columns.status)
        .bind(columns.processed_at)
        .bind(columns.external_data)
        .bind(columns.error)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(number.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordPurger for PostgresCnjRepository {
    async fn purge_expired(&self, now_epoch_secs: i64) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM cnj_records WHERE ttl IS NOT NULL AND ttl <= $1")
            .bind(now_epoch_secs)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(result.rows_affected())
    }
}
