//! Audit trail persistence for [`the_foundation::IngestionRun`].

use uuid::Uuid;

use the_foundation::{CryptexError, CryptexResult, IngestionRun};

use crate::schema::{ingestion_status_str, IngestionRunRow};
use crate::TheArchive;

impl TheArchive {
    pub async fn record_ingestion_run_start(&self, run: &IngestionRun) -> CryptexResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ingestion_runs (
                id, source, status, started_at, completed_at,
                records_fetched, records_inserted, records_updated, records_failed,
                error_message, run_config
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(run.id)
        .bind(&run.source.0)
        .bind(ingestion_status_str(run.status))
        .bind(run.started_at)
        .bind(run.completed_at)
        .bind(run.records_fetched as i64)
        .bind(run.records_inserted as i64)
        .bind(run.records_updated as i64)
        .bind(run.records_failed as i64)
        .bind(&run.error_message)
        .bind(&run.run_config)
        .execute(&self.pool)
        .await
        .map_err(|e| CryptexError::storage_transient(e.to_string()))?;

        Ok(())
    }

    pub async fn record_ingestion_run_finish(&self, run: &IngestionRun) -> CryptexResult<()> {
        sqlx::query(
            r#"
            UPDATE ingestion_runs
            SET status = $2, completed_at = $3,
                records_fetched = $4, records_inserted = $5,
                records_updated = $6, records_failed = $7, error_message = $8
            WHERE id = $1
            "#,
        )
        .bind(run.id)
        .bind(ingestion_status_str(run.status))
        .bind(run.completed_at)
        .bind(run.records_fetched as i64)
        .bind(run.records_inserted as i64)
        .bind(run.records_updated as i64)
        .bind(run.records_failed as i64)
        .bind(&run.error_message)
        .execute(&self.pool)
        .await
        .map_err(|e| CryptexError::storage_transient(e.to_string()))?;

        Ok(())
    }

    pub async fn recent_ingestion_runs(&self, source: &str, limit: i64) -> CryptexResult<Vec<IngestionRun>> {
        let rows: Vec<IngestionRunRow> = sqlx::query_as(
            r#"
            SELECT * FROM ingestion_runs
            WHERE source = $1
            ORDER BY started_at DESC
            LIMIT $2
            "#,
        )
        .bind(source)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CryptexError::storage_transient(e.to_string()))?;

        Ok(rows.into_iter().map(IngestionRun::from).collect())
    }

    /// `list_ingestion_runs` — audit trail across every source, most recent
    /// first, for the read API's ingestion-run surface.
    pub async fn list_ingestion_runs(&self, limit: i64) -> CryptexResult<Vec<IngestionRun>> {
        let rows: Vec<IngestionRunRow> = sqlx::query_as(
            r#"SELECT * FROM ingestion_runs ORDER BY started_at DESC LIMIT $1"#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CryptexError::storage_transient(e.to_string()))?;

        Ok(rows.into_iter().map(IngestionRun::from).collect())
    }

    /// `get_ingestion_run(id)` — single audit record by id.
    pub async fn find_ingestion_run(&self, id: Uuid) -> CryptexResult<Option<IngestionRun>> {
        let row: Option<IngestionRunRow> =
            sqlx::query_as(r#"SELECT * FROM ingestion_runs WHERE id = $1"#)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| CryptexError::storage_transient(e.to_string()))?;

        Ok(row.map(IngestionRun::from))
    }

    /// Persist a resumable backfill cursor for a paged job.
    pub async fn save_checkpoint(
        &self,
        job_name: &str,
        job_key: &str,
        cursor: serde_json::Value,
        now: chrono::DateTime<chrono::Utc>,
    ) -> CryptexResult<()> {
        sqlx::query(
            r#"
            INSERT INTO job_checkpoints (job_name, job_key, cursor, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (job_name, job_key) DO UPDATE SET
                cursor = EXCLUDED.cursor, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(job_name)
        .bind(job_key)
        .bind(cursor)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| CryptexError::storage_transient(e.to_string()))?;

        Ok(())
    }

    pub async fn load_checkpoint(
        &self,
        job_name: &str,
        job_key: &str,
    ) -> CryptexResult<Option<serde_json::Value>> {
        let cursor: Option<serde_json::Value> = sqlx::query_scalar(
            r#"SELECT cursor FROM job_checkpoints WHERE job_name = $1 AND job_key = $2"#,
        )
        .bind(job_name)
        .bind(job_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CryptexError::storage_transient(e.to_string()))?;

        Ok(cursor)
    }
}
