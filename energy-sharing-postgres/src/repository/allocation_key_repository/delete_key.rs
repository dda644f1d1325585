use std::error::Error;
use uuid::Uuid;

use super::repo_impl::AllocationKeyRepositoryImpl;

impl AllocationKeyRepositoryImpl {
    pub(super) async fn delete_children_impl(
        repo: &AllocationKeyRepositoryImpl,
        key_id: Uuid,
    ) -> Result<u64, Box<dyn Error + Send + Sync>> {
        let mut tx = repo.executor.tx.lock().await;
        let transaction = tx.as_mut().ok_or("Transaction has been consumed")?;

        let consumers = sqlx::query(
            r#"
            DELETE FROM allocation_key_consumer
            WHERE iteration_id IN (SELECT id FROM allocation_key_iteration WHERE allocation_key_id = $1)
            "#,
        )
        .bind(key_id)
        .execute(&mut **transaction)
        .await?;

        let iterations = sqlx::query("DELETE FROM allocation_key_iteration WHERE allocation_key_id = $1")
            .bind(key_id)
            .execute(&mut **transaction)
            .await?;

        Ok(consumers.rows_affected() + iterations.rows_affected())
    }

    pub(super) async fn delete_key_impl(
        repo: &AllocationKeyRepositoryImpl,
        key_id: Uuid,
    ) -> Result<u64, Box<dyn Error + Send + Sync>> {
        let mut tx = repo.executor.tx.lock().await;
        let transaction = tx.as_mut().ok_or("Transaction has been consumed")?;

        let result = sqlx::query("DELETE FROM allocation_key WHERE id = $1")
            .bind(key_id)
            .execute(&mut **transaction)
            .await?;

        Ok(result.rows_affected())
    }
}
