use async_trait::async_trait;
use energy_sharing_db::models::sharing_operation::SharingOperationModel;
use energy_sharing_db::repository::LoadBatch;
use sqlx::Postgres;
use std::error::Error;
use uuid::Uuid;

use super::repo_impl::SharingOperationRepositoryImpl;
use crate::utils::TryFromRow;

impl SharingOperationRepositoryImpl {
    pub(super) async fn load_batch_impl(
        repo: &SharingOperationRepositoryImpl,
        ids: &[Uuid],
    ) -> Result<Vec<Option<SharingOperationModel>>, Box<dyn Error + Send + Sync>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = r#"SELECT * FROM sharing_operation WHERE id = ANY($1)"#;
        let rows = {
            let mut tx = repo.executor.tx.lock().await;
            if let Some(transaction) = tx.as_mut() {
                sqlx::query(query).bind(ids).fetch_all(&mut **transaction).await?
            } else {
                return Err("Transaction has been consumed".into());
            }
        };

        let mut item_map = std::collections::HashMap::new();
        for row in rows {
            let item = SharingOperationModel::try_from_row(&row)?;
            item_map.insert(item.id, item);
        }

        let mut result = Vec::with_capacity(ids.len());
        for id in ids {
            result.push(item_map.remove(id));
        }
        Ok(result)
    }

    /// With `for_update` the row stays locked until the session ends.
    pub(super) async fn find_by_id_impl(
        repo: &SharingOperationRepositoryImpl,
        sharing_id: Uuid,
        for_update: bool,
    ) -> Result<Option<SharingOperationModel>, Box<dyn Error + Send + Sync>> {
        let query = if for_update {
            "SELECT * FROM sharing_operation WHERE id = $1 FOR UPDATE"
        } else {
            "SELECT * FROM sharing_operation WHERE id = $1"
        };

        let row = {
            let mut tx = repo.executor.tx.lock().await;
            let transaction = tx.as_mut().ok_or("Transaction has been consumed")?;
            sqlx::query(query)
                .bind(sharing_id)
                .fetch_optional(&mut **transaction)
                .await?
        };

        row.as_ref().map(SharingOperationModel::try_from_row).transpose()
    }
}

#[async_trait]
impl LoadBatch<Postgres, SharingOperationModel> for SharingOperationRepositoryImpl {
    async fn load_batch(
        &self,
        ids: &[Uuid],
    ) -> Result<Vec<Option<SharingOperationModel>>, Box<dyn Error + Send + Sync>> {
        Self::load_batch_impl(self, ids).await
    }
}
