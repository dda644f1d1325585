use sqlx::Row;
use std::error::Error;
use uuid::Uuid;

use super::repo_impl::AllocationKeyRepositoryImpl;

impl AllocationKeyRepositoryImpl {
    pub(super) async fn find_ids_by_community_id_impl(
        repo: &AllocationKeyRepositoryImpl,
        community_id: Uuid,
    ) -> Result<Vec<Uuid>, Box<dyn Error + Send + Sync>> {
        let rows = {
            let mut tx = repo.executor.tx.lock().await;
            let transaction = tx.as_mut().ok_or("Transaction has been consumed")?;
            sqlx::query("SELECT id FROM allocation_key WHERE community_id = $1 ORDER BY id")
                .bind(community_id)
                .fetch_all(&mut **transaction)
                .await?
        };

        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(row.try_get("id")?);
        }
        Ok(ids)
    }
}
