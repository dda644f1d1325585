use energy_sharing_api::Ean;
use std::collections::HashSet;
use std::error::Error;
use uuid::Uuid;

use super::repo_impl::SharingOperationRepositoryImpl;
use crate::utils::get_heapless_string;

impl SharingOperationRepositoryImpl {
    pub(super) async fn get_authorized_eans_impl(
        repo: &SharingOperationRepositoryImpl,
        sharing_id: Uuid,
    ) -> Result<HashSet<Ean>, Box<dyn Error + Send + Sync>> {
        let rows = {
            let mut tx = repo.executor.tx.lock().await;
            let transaction = tx.as_mut().ok_or("Transaction has been consumed")?;
            sqlx::query("SELECT ean FROM sharing_operation_ean WHERE sharing_operation_id = $1")
                .bind(sharing_id)
                .fetch_all(&mut **transaction)
                .await?
        };

        let mut eans = HashSet::with_capacity(rows.len());
        for row in &rows {
            eans.insert(get_heapless_string(row, "ean")?);
        }
        Ok(eans)
    }

    pub(super) async fn authorize_eans_impl(
        repo: &SharingOperationRepositoryImpl,
        sharing_id: Uuid,
        eans: &[Ean],
    ) -> Result<u64, Box<dyn Error + Send + Sync>> {
        if eans.is_empty() {
            return Ok(0);
        }

        let mut tx = repo.executor.tx.lock().await;
        let transaction = tx.as_mut().ok_or("Transaction has been consumed")?;

        let mut added = 0;
        for ean in eans {
            let result = sqlx::query(
                r#"
                INSERT INTO sharing_operation_ean (sharing_operation_id, ean)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(sharing_id)
            .bind(ean.as_str())
            .execute(&mut **transaction)
            .await?;
            added += result.rows_affected();
        }

        Ok(added)
    }
}
