use energy_sharing_db::models::allocation_key::AllocationKeyModel;
use std::error::Error;

use super::repo_impl::AllocationKeyRepositoryImpl;

impl AllocationKeyRepositoryImpl {
    pub(super) async fn update_key_impl(
        repo: &AllocationKeyRepositoryImpl,
        key: &AllocationKeyModel,
    ) -> Result<u64, Box<dyn Error + Send + Sync>> {
        let mut tx = repo.executor.tx.lock().await;
        let transaction = tx.as_mut().ok_or("Transaction has been consumed")?;

        let result = sqlx::query(
            r#"
            UPDATE allocation_key
            SET name = $2, description = $3
            WHERE id = $1
            "#,
        )
        .bind(key.id)
        .bind(key.name.as_str())
        .bind(key.description.as_deref())
        .execute(&mut **transaction)
        .await?;

        Ok(result.rows_affected())
    }
}
