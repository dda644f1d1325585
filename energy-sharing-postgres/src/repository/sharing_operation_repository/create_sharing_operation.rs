use energy_sharing_db::models::sharing_operation::SharingOperationModel;
use std::error::Error;

use super::repo_impl::SharingOperationRepositoryImpl;

impl SharingOperationRepositoryImpl {
    pub(super) async fn create_sharing_operation_impl(
        repo: &SharingOperationRepositoryImpl,
        operation: &SharingOperationModel,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut tx = repo.executor.tx.lock().await;
        let transaction = tx.as_mut().ok_or("Transaction has been consumed")?;

        sqlx::query(
            r#"
            INSERT INTO sharing_operation (id, community_id, name, created_at, created_by)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(operation.id)
        .bind(operation.community_id)
        .bind(operation.name.as_str())
        .bind(operation.created_at)
        .bind(operation.created_by)
        .execute(&mut **transaction)
        .await?;

        Ok(())
    }
}
