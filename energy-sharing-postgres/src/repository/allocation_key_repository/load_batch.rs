use async_trait::async_trait;
use energy_sharing_api::AllocationKey;
use energy_sharing_db::models::allocation_key::{AllocationKeyModel, AllocationKeyRows, ConsumerModel, IterationModel};
use energy_sharing_db::repository::LoadBatch;
use sqlx::Postgres;
use std::collections::HashMap;
use std::error::Error;
use uuid::Uuid;

use super::repo_impl::AllocationKeyRepositoryImpl;
use crate::utils::TryFromRow;

impl AllocationKeyRepositoryImpl {
    /// Loads keys with their children in three queries, whatever the batch size.
    pub(super) async fn load_batch_impl(
        repo: &AllocationKeyRepositoryImpl,
        ids: &[Uuid],
    ) -> Result<Vec<Option<AllocationKey>>, Box<dyn Error + Send + Sync>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let (key_rows, iteration_rows, consumer_rows) = {
            let mut tx = repo.executor.tx.lock().await;
            let transaction = tx.as_mut().ok_or("Transaction has been consumed")?;

            let key_rows = sqlx::query("SELECT * FROM allocation_key WHERE id = ANY($1)")
                .bind(ids)
                .fetch_all(&mut **transaction)
                .await?;
            let iteration_rows =
                sqlx::query("SELECT * FROM allocation_key_iteration WHERE allocation_key_id = ANY($1)")
                    .bind(ids)
                    .fetch_all(&mut **transaction)
                    .await?;
            let consumer_rows = sqlx::query(
                r#"
                SELECT c.* FROM allocation_key_consumer c
                JOIN allocation_key_iteration i ON i.id = c.iteration_id
                WHERE i.allocation_key_id = ANY($1)
                "#,
            )
            .bind(ids)
            .fetch_all(&mut **transaction)
            .await?;

            (key_rows, iteration_rows, consumer_rows)
        };

        let mut rows_by_key: HashMap<Uuid, AllocationKeyRows> = HashMap::new();
        for row in &key_rows {
            let key = AllocationKeyModel::try_from_row(row)?;
            rows_by_key.insert(
                key.id,
                AllocationKeyRows {
                    key,
                    iterations: Vec::new(),
                    consumers: Vec::new(),
                },
            );
        }

        let mut key_of_iteration = HashMap::new();
        for row in &iteration_rows {
            let iteration = IterationModel::try_from_row(row)?;
            key_of_iteration.insert(iteration.id, iteration.allocation_key_id);
            if let Some(rows) = rows_by_key.get_mut(&iteration.allocation_key_id) {
                rows.iterations.push(iteration);
            }
        }

        for row in &consumer_rows {
            let consumer = ConsumerModel::try_from_row(row)?;
            let rows = key_of_iteration
                .get(&consumer.iteration_id)
                .and_then(|key_id| rows_by_key.get_mut(key_id));
            if let Some(rows) = rows {
                rows.consumers.push(consumer);
            }
        }

        let mut result = Vec::with_capacity(ids.len());
        for id in ids {
            let key = match rows_by_key.get(id) {
                Some(rows) => Some(rows.clone().into_allocation_key()?),
                None => None,
            };
            result.push(key);
        }
        Ok(result)
    }
}

#[async_trait]
impl LoadBatch<Postgres, AllocationKey> for AllocationKeyRepositoryImpl {
    async fn load_batch(&self, ids: &[Uuid]) -> Result<Vec<Option<AllocationKey>>, Box<dyn Error + Send + Sync>> {
        Self::load_batch_impl(self, ids).await
    }
}
