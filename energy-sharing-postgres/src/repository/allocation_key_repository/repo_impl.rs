use async_trait::async_trait;
use energy_sharing_api::AllocationKey;
use energy_sharing_db::models::allocation_key::{AllocationKeyModel, ConsumerModel, IterationModel};
use energy_sharing_db::repository::{AllocationKeyRepository, KeyLock};
use postgres_unit_of_work::Executor;
use sqlx::{postgres::PgRow, Postgres, Row};
use std::error::Error;
use uuid::Uuid;

use crate::utils::{get_heapless_string, get_optional_heapless_string, TryFromRow};

pub struct AllocationKeyRepositoryImpl {
    pub executor: Executor,
}

impl AllocationKeyRepositoryImpl {
    pub fn new(executor: Executor) -> Self {
        Self { executor }
    }
}

impl TryFromRow<PgRow> for AllocationKeyModel {
    fn try_from_row(row: &PgRow) -> Result<Self, Box<dyn Error + Send + Sync>> {
        Ok(AllocationKeyModel {
            id: row.try_get("id")?,
            community_id: row.try_get("community_id")?,
            name: get_heapless_string(row, "name")?,
            description: get_optional_heapless_string(row, "description")?,
        })
    }
}

impl TryFromRow<PgRow> for IterationModel {
    fn try_from_row(row: &PgRow) -> Result<Self, Box<dyn Error + Send + Sync>> {
        Ok(IterationModel {
            id: row.try_get("id")?,
            allocation_key_id: row.try_get("allocation_key_id")?,
            number: row.try_get("number")?,
            energy_allocated_percentage: row.try_get("energy_allocated_percentage")?,
        })
    }
}

impl TryFromRow<PgRow> for ConsumerModel {
    fn try_from_row(row: &PgRow) -> Result<Self, Box<dyn Error + Send + Sync>> {
        Ok(ConsumerModel {
            id: row.try_get("id")?,
            iteration_id: row.try_get("iteration_id")?,
            member_id: row.try_get("member_id")?,
            position: row.try_get("position")?,
            energy_allocated_percentage: row.try_get("energy_allocated_percentage")?,
        })
    }
}

#[async_trait]
impl AllocationKeyRepository<Postgres> for AllocationKeyRepositoryImpl {
    async fn get_key_by_id(&self, key_id: Uuid) -> Result<Option<AllocationKey>, Box<dyn Error + Send + Sync>> {
        let mut keys = Self::load_batch_impl(self, &[key_id]).await?;
        Ok(keys.pop().flatten())
    }

    async fn lock_key(
        &self,
        key_id: Uuid,
        lock: KeyLock,
    ) -> Result<Option<AllocationKeyModel>, Box<dyn Error + Send + Sync>> {
        Self::lock_key_impl(self, key_id, lock).await
    }

    async fn create_key(&self, key: &AllocationKeyModel) -> Result<(), Box<dyn Error + Send + Sync>> {
        Self::create_key_impl(self, key).await
    }

    async fn update_key(&self, key: &AllocationKeyModel) -> Result<u64, Box<dyn Error + Send + Sync>> {
        Self::update_key_impl(self, key).await
    }

    async fn create_children(
        &self,
        iterations: &[IterationModel],
        consumers: &[ConsumerModel],
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        Self::create_children_impl(self, iterations, consumers).await
    }

    async fn delete_children(&self, key_id: Uuid) -> Result<u64, Box<dyn Error + Send + Sync>> {
        Self::delete_children_impl(self, key_id).await
    }

    async fn delete_key(&self, key_id: Uuid) -> Result<u64, Box<dyn Error + Send + Sync>> {
        Self::delete_key_impl(self, key_id).await
    }

    async fn find_ids_by_community_id(&self, community_id: Uuid) -> Result<Vec<Uuid>, Box<dyn Error + Send + Sync>> {
        Self::find_ids_by_community_id_impl(self, community_id).await
    }
}
