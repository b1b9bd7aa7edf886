#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **curve-outbox-postgres** – Durable, Postgres-backed
//! [`curve_outbox_core::OutboxStore`] implementation. Lease semantics are
//! implemented with `SELECT ... FOR UPDATE SKIP LOCKED` so multiple
//! publisher instances can poll the same table without contending for the
//! same rows.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use curve_outbox_core::{OutboxError, OutboxRecord, OutboxStatus, OutboxStore, PendingCountCache, SchemaLifecycle};
use sqlx::{PgPool, Row};

fn status_to_db(status: OutboxStatus) -> &'static str {
    match status {
        OutboxStatus::Pending => "PENDING",
        OutboxStatus::InFlight => "IN_FLIGHT",
        OutboxStatus::Published => "PUBLISHED",
        OutboxStatus::Failed => "FAILED",
    }
}

fn status_from_db(raw: &str) -> Result<OutboxStatus, OutboxError> {
    match raw {
        "PENDING" => Ok(OutboxStatus::Pending),
        "IN_FLIGHT" => Ok(OutboxStatus::InFlight),
        "PUBLISHED" => Ok(OutboxStatus::Published),
        "FAILED" => Ok(OutboxStatus::Failed),
        other => Err(OutboxError::Backend(format!("unrecognized outbox status in database: {other}"))),
    }
}

fn row_to_record(row: &sqlx::postgres::PgRow) -> Result<OutboxRecord, OutboxError> {
    let id: i64 = row.try_get("id").map_err(|e| OutboxError::Backend(e.to_string()))?;
    let status_raw: String = row.try_get("status").map_err(|e| OutboxError::Backend(e.to_string()))?;
    let retry_count: i32 = row.try_get("retry_count").map_err(|e| OutboxError::Backend(e.to_string()))?;

    Ok(OutboxRecord {
        id: id as u64,
        aggregate_type: row.try_get("aggregate_type").map_err(|e| OutboxError::Backend(e.to_string()))?,
        aggregate_id: row.try_get("aggregate_id").map_err(|e| OutboxError::Backend(e.to_string()))?,
        event_type: row.try_get("event_type").map_err(|e| OutboxError::Backend(e.to_string()))?,
        payload_bytes: row.try_get("payload_bytes").map_err(|e| OutboxError::Backend(e.to_string()))?,
        metadata_bytes: row.try_get("metadata_bytes").map_err(|e| OutboxError::Backend(e.to_string()))?,
        status: status_from_db(&status_raw)?,
        retry_count: retry_count as u32,
        last_error: row.try_get("last_error").map_err(|e| OutboxError::Backend(e.to_string()))?,
        created_at: row.try_get("created_at").map_err(|e| OutboxError::Backend(e.to_string()))?,
        next_retry_at: row.try_get("next_retry_at").map_err(|e| OutboxError::Backend(e.to_string()))?,
        published_at: row.try_get("published_at").map_err(|e| OutboxError::Backend(e.to_string()))?,
    })
}

/// Durable outbox store backed by a Postgres table.
#[derive(Clone)]
pub struct PostgresOutboxStore {
    pool: PgPool,
    pending_count_cache: std::sync::Arc<PendingCountCache>,
}

impl PostgresOutboxStore {
    /// Connect to `database_url`, then create the schema according to
    /// `lifecycle` (§4.4): `Embedded`/`Always` auto-create it if missing,
    /// `Never` leaves an externally managed schema untouched.
    pub async fn open(database_url: &str, lifecycle: SchemaLifecycle) -> Result<Self, OutboxError> {
        let pool = PgPool::connect(database_url).await.map_err(|e| OutboxError::Backend(e.to_string()))?;
        Self::from_pool(pool, lifecycle).await
    }

    /// Wrap an existing pool, creating the schema according to `lifecycle`
    /// unless it is [`SchemaLifecycle::Never`] — the core never silently
    /// migrates a schema its caller declared externally managed.
    pub async fn from_pool(pool: PgPool, lifecycle: SchemaLifecycle) -> Result<Self, OutboxError> {
        let store = Self { pool, pending_count_cache: std::sync::Arc::new(PendingCountCache::new(Duration::seconds(5))) };
        match lifecycle {
            SchemaLifecycle::Embedded | SchemaLifecycle::Always => store.migrate().await?,
            SchemaLifecycle::Never => {}
        }
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), OutboxError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS curve_outbox (
                id BIGINT PRIMARY KEY,
                aggregate_type TEXT NOT NULL,
                aggregate_id TEXT NOT NULL,
                event_type TEXT NOT NULL,
                payload_bytes BYTEA NOT NULL,
                metadata_bytes BYTEA NOT NULL,
                status TEXT NOT NULL,
                retry_count INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                next_retry_at TIMESTAMPTZ NOT NULL,
                published_at TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| OutboxError::Backend(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_curve_outbox_lease ON curve_outbox(status, next_retry_at)")
            .execute(&self.pool)
            .await
            .map_err(|e| OutboxError::Backend(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_curve_outbox_published_at ON curve_outbox(published_at)")
            .execute(&self.pool)
            .await
            .map_err(|e| OutboxError::Backend(e.to_string()))?;

        Ok(())
    }

    /// Save a row inside an already-open transaction, so the caller can
    /// commit it atomically with their own business-data write.
    pub async fn save_in_tx(&self, tx: &mut sqlx::Transaction<'_, sqlx::Postgres>, record: &OutboxRecord) -> Result<(), OutboxError> {
        sqlx::query(
            r#"
            INSERT INTO curve_outbox
                (id, aggregate_type, aggregate_id, event_type, payload_bytes, metadata_bytes,
                 status, retry_count, last_error, created_at, next_retry_at, published_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(record.id as i64)
        .bind(&record.aggregate_type)
        .bind(&record.aggregate_id)
        .bind(&record.event_type)
        .bind(&record.payload_bytes)
        .bind(&record.metadata_bytes)
        .bind(status_to_db(record.status))
        .bind(record.retry_count as i32)
        .bind(&record.last_error)
        .bind(record.created_at)
        .bind(record.next_retry_at)
        .bind(record.published_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| OutboxError::Backend(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl OutboxStore for PostgresOutboxStore {
    async fn save(&self, record: OutboxRecord) -> Result<(), OutboxError> {
        let mut tx = self.pool.begin().await.map_err(|e| OutboxError::Backend(e.to_string()))?;
        self.save_in_tx(&mut tx, &record).await?;
        tx.commit().await.map_err(|e| OutboxError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn lease_batch(&self, limit: usize, now: DateTime<Utc>) -> Result<Vec<OutboxRecord>, OutboxError> {
        let mut tx = self.pool.begin().await.map_err(|e| OutboxError::Backend(e.to_string()))?;

        let rows = sqlx::query(
            r#"
            SELECT id, aggregate_type, aggregate_id, event_type, payload_bytes, metadata_bytes,
                   status, retry_count, last_error, created_at, next_retry_at, published_at
            FROM curve_outbox
            WHERE status = 'PENDING' AND next_retry_at <= $1
            ORDER BY created_at
            LIMIT $2
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| OutboxError::Backend(e.to_string()))?;

        let mut leased = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut record = row_to_record(row)?;
            sqlx::query("UPDATE curve_outbox SET status = 'IN_FLIGHT' WHERE id = $1")
                .bind(record.id as i64)
                .execute(&mut *tx)
                .await
                .map_err(|e| OutboxError::Backend(e.to_string()))?;
            record.status = OutboxStatus::InFlight;
            leased.push(record);
        }

        tx.commit().await.map_err(|e| OutboxError::Backend(e.to_string()))?;
        Ok(leased)
    }

    async fn mark_published(&self, ids: &[u64], published_at: DateTime<Utc>) -> Result<(), OutboxError> {
        let ids: Vec<i64> = ids.iter().map(|id| *id as i64).collect();
        sqlx::query(
            "UPDATE curve_outbox SET status = 'PUBLISHED', published_at = $1 WHERE id = ANY($2) AND status = 'IN_FLIGHT'",
        )
        .bind(published_at)
        .bind(&ids)
        .execute(&self.pool)
        .await
        .map_err(|e| OutboxError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn mark_retry(&self, id: u64, next_retry_at: DateTime<Utc>, error: &str) -> Result<(), OutboxError> {
        let result = sqlx::query(
            r#"
            UPDATE curve_outbox
            SET status = 'PENDING', retry_count = retry_count + 1, next_retry_at = $1, last_error = $2
            WHERE id = $3 AND status = 'IN_FLIGHT'
            "#,
        )
        .bind(next_retry_at)
        .bind(error)
        .bind(id as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| OutboxError::Backend(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(OutboxError::NotFound(id));
        }
        Ok(())
    }

    async fn mark_failed(&self, id: u64, error: &str) -> Result<(), OutboxError> {
        let result = sqlx::query("UPDATE curve_outbox SET status = 'FAILED', last_error = $1 WHERE id = $2 AND status = 'IN_FLIGHT'")
            .bind(error)
            .bind(id as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| OutboxError::Backend(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(OutboxError::NotFound(id));
        }
        Ok(())
    }

    async fn delete_published_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, OutboxError> {
        let result = sqlx::query("DELETE FROM curve_outbox WHERE status = 'PUBLISHED' AND published_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| OutboxError::Backend(e.to_string()))?;
        Ok(result.rows_affected())
    }

    async fn count_pending(&self, now: DateTime<Utc>) -> Result<u64, OutboxError> {
        if let Some(cached) = self.pending_count_cache.get(now) {
            return Ok(cached);
        }

        let row = sqlx::query("SELECT COUNT(*) as count FROM curve_outbox WHERE status = 'PENDING'")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| OutboxError::Backend(e.to_string()))?;
        let count: i64 = row.try_get("count").map_err(|e| OutboxError::Backend(e.to_string()))?;
        let count = count as u64;

        self.pending_count_cache.set(count, now);
        Ok(count)
    }
}
