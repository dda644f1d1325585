use chrono::{DateTime, Utc};
use energy_sharing_api::SharingKeyStatus;
use energy_sharing_db::models::sharing_operation::SharingOperationKeyModel;
use sqlx::Row;
use std::error::Error;
use uuid::Uuid;

use super::repo_impl::SharingOperationRepositoryImpl;
use crate::utils::TryFromRow;

impl SharingOperationRepositoryImpl {
    pub(super) async fn load_schedule_impl(
        repo: &SharingOperationRepositoryImpl,
        sharing_id: Uuid,
    ) -> Result<Vec<SharingOperationKeyModel>, Box<dyn Error + Send + Sync>> {
        let rows = {
            let mut tx = repo.executor.tx.lock().await;
            let transaction = tx.as_mut().ok_or("Transaction has been consumed")?;
            sqlx::query("SELECT * FROM sharing_operation_key WHERE sharing_operation_id = $1 ORDER BY sequence")
                .bind(sharing_id)
                .fetch_all(&mut **transaction)
                .await?
        };

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(SharingOperationKeyModel::try_from_row(&row)?);
        }
        Ok(entries)
    }

    pub(super) async fn insert_entry_impl(
        repo: &SharingOperationRepositoryImpl,
        entry: &SharingOperationKeyModel,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut tx = repo.executor.tx.lock().await;
        let transaction = tx.as_mut().ok_or("Transaction has been consumed")?;

        sqlx::query(
            r#"
            INSERT INTO sharing_operation_key
            (id, sharing_operation_id, allocation_key_id, sequence, start_date, end_date, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.id)
        .bind(entry.sharing_operation_id)
        .bind(entry.allocation_key_id)
        .bind(entry.sequence)
        .bind(entry.start_date)
        .bind(entry.end_date)
        .bind(entry.status)
        .execute(&mut **transaction)
        .await?;

        Ok(())
    }

    /// Inserts the entry, or rewrites status, start and sequence of the open
    /// entry with the same id. Closed entries are never rewritten.
    pub(super) async fn upsert_entry_impl(
        repo: &SharingOperationRepositoryImpl,
        entry: &SharingOperationKeyModel,
    ) -> Result<u64, Box<dyn Error + Send + Sync>> {
        let mut tx = repo.executor.tx.lock().await;
        let transaction = tx.as_mut().ok_or("Transaction has been consumed")?;

        let result = sqlx::query(
            r#"
            INSERT INTO sharing_operation_key
            (id, sharing_operation_id, allocation_key_id, sequence, start_date, end_date, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE
            SET status = EXCLUDED.status,
                start_date = EXCLUDED.start_date,
                sequence = EXCLUDED.sequence
            WHERE sharing_operation_key.end_date IS NULL
            "#,
        )
        .bind(entry.id)
        .bind(entry.sharing_operation_id)
        .bind(entry.allocation_key_id)
        .bind(entry.sequence)
        .bind(entry.start_date)
        .bind(entry.end_date)
        .bind(entry.status)
        .execute(&mut **transaction)
        .await?;

        Ok(result.rows_affected())
    }

    pub(super) async fn close_active_approved_key_impl(
        repo: &SharingOperationRepositoryImpl,
        sharing_id: Uuid,
        end_date: DateTime<Utc>,
    ) -> Result<u64, Box<dyn Error + Send + Sync>> {
        let mut tx = repo.executor.tx.lock().await;
        let transaction = tx.as_mut().ok_or("Transaction has been consumed")?;

        let result = sqlx::query(
            r#"
            UPDATE sharing_operation_key
            SET end_date = $2, status = $3
            WHERE sharing_operation_id = $1 AND status = $4 AND end_date IS NULL
            "#,
        )
        .bind(sharing_id)
        .bind(end_date)
        .bind(SharingKeyStatus::Closed)
        .bind(SharingKeyStatus::Approved)
        .execute(&mut **transaction)
        .await?;

        Ok(result.rows_affected())
    }

    pub(super) async fn close_specific_key_entry_impl(
        repo: &SharingOperationRepositoryImpl,
        entry_id: Uuid,
        end_date: DateTime<Utc>,
    ) -> Result<u64, Box<dyn Error + Send + Sync>> {
        let mut tx = repo.executor.tx.lock().await;
        let transaction = tx.as_mut().ok_or("Transaction has been consumed")?;

        let result = sqlx::query(
            r#"
            UPDATE sharing_operation_key
            SET end_date = $2, status = $3
            WHERE id = $1 AND status = $4 AND end_date IS NULL
            "#,
        )
        .bind(entry_id)
        .bind(end_date)
        .bind(SharingKeyStatus::Closed)
        .bind(SharingKeyStatus::Approved)
        .execute(&mut **transaction)
        .await?;

        Ok(result.rows_affected())
    }

    pub(super) async fn remove_key_entry_impl(
        repo: &SharingOperationRepositoryImpl,
        entry_id: Uuid,
    ) -> Result<u64, Box<dyn Error + Send + Sync>> {
        let mut tx = repo.executor.tx.lock().await;
        let transaction = tx.as_mut().ok_or("Transaction has been consumed")?;

        let result = sqlx::query("DELETE FROM sharing_operation_key WHERE id = $1 AND status = $2")
            .bind(entry_id)
            .bind(SharingKeyStatus::Proposed)
            .execute(&mut **transaction)
            .await?;

        Ok(result.rows_affected())
    }

    pub(super) async fn count_open_entries_for_key_impl(
        repo: &SharingOperationRepositoryImpl,
        key_id: Uuid,
    ) -> Result<i64, Box<dyn Error + Send + Sync>> {
        let row = {
            let mut tx = repo.executor.tx.lock().await;
            let transaction = tx.as_mut().ok_or("Transaction has been consumed")?;
            sqlx::query(
                "SELECT COUNT(*) AS open_entries FROM sharing_operation_key WHERE allocation_key_id = $1 AND status <> $2",
            )
            .bind(key_id)
            .bind(SharingKeyStatus::Closed)
            .fetch_one(&mut **transaction)
            .await?
        };

        Ok(row.try_get("open_entries")?)
    }
}
