use async_trait::async_trait;
use chrono::{DateTime, Utc};
use energy_sharing_api::Ean;
use energy_sharing_db::models::sharing_operation::{
    SharingOpConsumptionModel, SharingOperationKeyModel, SharingOperationModel,
};
use energy_sharing_db::repository::SharingOperationRepository;
use postgres_unit_of_work::Executor;
use sqlx::{postgres::PgRow, Postgres, Row};
use std::collections::HashSet;
use std::error::Error;
use uuid::Uuid;

use crate::utils::{get_heapless_string, TryFromRow};

pub struct SharingOperationRepositoryImpl {
    pub executor: Executor,
}

impl SharingOperationRepositoryImpl {
    pub fn new(executor: Executor) -> Self {
        Self { executor }
    }
}

impl TryFromRow<PgRow> for SharingOperationModel {
    fn try_from_row(row: &PgRow) -> Result<Self, Box<dyn Error + Send + Sync>> {
        Ok(SharingOperationModel {
            id: row.try_get("id")?,
            community_id: row.try_get("community_id")?,
            name: get_heapless_string(row, "name")?,
            created_at: row.try_get("created_at")?,
            created_by: row.try_get("created_by")?,
        })
    }
}

impl TryFromRow<PgRow> for SharingOperationKeyModel {
    fn try_from_row(row: &PgRow) -> Result<Self, Box<dyn Error + Send + Sync>> {
        Ok(SharingOperationKeyModel {
            id: row.try_get("id")?,
            sharing_operation_id: row.try_get("sharing_operation_id")?,
            allocation_key_id: row.try_get("allocation_key_id")?,
            sequence: row.try_get("sequence")?,
            start_date: row.try_get("start_date")?,
            end_date: row.try_get("end_date")?,
            status: row.try_get("status")?,
        })
    }
}

impl TryFromRow<PgRow> for SharingOpConsumptionModel {
    fn try_from_row(row: &PgRow) -> Result<Self, Box<dyn Error + Send + Sync>> {
        Ok(SharingOpConsumptionModel {
            id: row.try_get("id")?,
            sharing_operation_id: row.try_get("sharing_operation_id")?,
            ean: get_heapless_string(row, "ean")?,
            member_id: row.try_get("member_id")?,
            period_start: row.try_get("period_start")?,
            period_end: row.try_get("period_end")?,
            allocated_quantity: row.try_get("allocated_quantity")?,
            computed_at: row.try_get("computed_at")?,
        })
    }
}

#[async_trait]
impl SharingOperationRepository<Postgres> for SharingOperationRepositoryImpl {
    async fn get_sharing_operation_by_id(
        &self,
        sharing_id: Uuid,
    ) -> Result<Option<SharingOperationModel>, Box<dyn Error + Send + Sync>> {
        Self::find_by_id_impl(self, sharing_id, false).await
    }

    async fn lock_sharing_operation(
        &self,
        sharing_id: Uuid,
    ) -> Result<Option<SharingOperationModel>, Box<dyn Error + Send + Sync>> {
        Self::find_by_id_impl(self, sharing_id, true).await
    }

    async fn create_sharing_operation(
        &self,
        operation: &SharingOperationModel,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        Self::create_sharing_operation_impl(self, operation).await
    }

    async fn load_schedule(
        &self,
        sharing_id: Uuid,
    ) -> Result<Vec<SharingOperationKeyModel>, Box<dyn Error + Send + Sync>> {
        Self::load_schedule_impl(self, sharing_id).await
    }

    async fn add_key_to_sharing(&self, entry: &SharingOperationKeyModel) -> Result<(), Box<dyn Error + Send + Sync>> {
        Self::insert_entry_impl(self, entry).await
    }

    async fn close_active_approved_key(
        &self,
        sharing_id: Uuid,
        end_date: DateTime<Utc>,
    ) -> Result<u64, Box<dyn Error + Send + Sync>> {
        Self::close_active_approved_key_impl(self, sharing_id, end_date).await
    }

    async fn close_specific_key_entry(
        &self,
        entry_id: Uuid,
        end_date: DateTime<Utc>,
    ) -> Result<u64, Box<dyn Error + Send + Sync>> {
        Self::close_specific_key_entry_impl(self, entry_id, end_date).await
    }

    async fn add_sharing_key_entry(
        &self,
        entry: &SharingOperationKeyModel,
    ) -> Result<u64, Box<dyn Error + Send + Sync>> {
        Self::upsert_entry_impl(self, entry).await
    }

    async fn remove_key_entry(&self, entry_id: Uuid) -> Result<u64, Box<dyn Error + Send + Sync>> {
        Self::remove_key_entry_impl(self, entry_id).await
    }

    async fn count_open_entries_for_key(&self, key_id: Uuid) -> Result<i64, Box<dyn Error + Send + Sync>> {
        Self::count_open_entries_for_key_impl(self, key_id).await
    }

    async fn get_authorized_eans(&self, sharing_id: Uuid) -> Result<HashSet<Ean>, Box<dyn Error + Send + Sync>> {
        Self::get_authorized_eans_impl(self, sharing_id).await
    }

    async fn authorize_eans(&self, sharing_id: Uuid, eans: &[Ean]) -> Result<u64, Box<dyn Error + Send + Sync>> {
        Self::authorize_eans_impl(self, sharing_id, eans).await
    }

    async fn add_consumptions(
        &self,
        consumptions: &[SharingOpConsumptionModel],
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        Self::add_consumptions_impl(self, consumptions).await
    }

    async fn get_sharing_operation_consumption(
        &self,
        sharing_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SharingOpConsumptionModel>, Box<dyn Error + Send + Sync>> {
        Self::get_consumption_impl(self, sharing_id, from, to).await
    }
}
