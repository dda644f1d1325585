use energy_sharing_db::models::allocation_key::AllocationKeyModel;
use energy_sharing_db::repository::KeyLock;
use std::error::Error;
use uuid::Uuid;

use super::repo_impl::AllocationKeyRepositoryImpl;
use crate::utils::TryFromRow;

impl AllocationKeyRepositoryImpl {
    pub(super) async fn lock_key_impl(
        repo: &AllocationKeyRepositoryImpl,
        key_id: Uuid,
        lock: KeyLock,
    ) -> Result<Option<AllocationKeyModel>, Box<dyn Error + Send + Sync>> {
        let query = match lock {
            KeyLock::Share => "SELECT * FROM allocation_key WHERE id = $1 FOR SHARE",
            KeyLock::Update => "SELECT * FROM allocation_key WHERE id = $1 FOR UPDATE",
        };

        let row = {
            let mut tx = repo.executor.tx.lock().await;
            let transaction = tx.as_mut().ok_or("Transaction has been consumed")?;
            sqlx::query(query)
                .bind(key_id)
                .fetch_optional(&mut **transaction)
                .await?
        };

        row.as_ref().map(AllocationKeyModel::try_from_row).transpose()
    }
}
