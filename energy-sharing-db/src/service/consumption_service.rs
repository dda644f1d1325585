use chrono::{DateTime, Utc};
use energy_sharing_api::{
    AllocationKey, ApiError, ApiResult, ConsumerAllocation, ConsumptionAllocator, MeterReading, ScheduleEntry,
    SharingKeySchedule, SharingOpConsumption, TenantContext,
};
use sqlx::Database;
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::sharing_operation::SharingOpConsumptionModel;
use crate::repository::{AllocationKeyRepository, SharingOperationRepository};
use crate::service::scope::visible_operation;

/// Fetches what the allocator needs, runs it, and stores the outcome.
pub struct ConsumptionService<DB, K, S>
where
    DB: Database,
    K: AllocationKeyRepository<DB>,
    S: SharingOperationRepository<DB>,
{
    keys: Arc<K>,
    sharing: Arc<S>,
    allocator: ConsumptionAllocator,
    _db: PhantomData<fn() -> DB>,
}

impl<DB, K, S> ConsumptionService<DB, K, S>
where
    DB: Database,
    K: AllocationKeyRepository<DB>,
    S: SharingOperationRepository<DB>,
{
    pub fn new(keys: Arc<K>, sharing: Arc<S>, allocator: ConsumptionAllocator) -> Self {
        Self {
            keys,
            sharing,
            allocator,
            _db: PhantomData,
        }
    }

    /// Allocates one reading without storing anything.
    pub async fn allocate(
        &self,
        ctx: &TenantContext,
        sharing_id: Uuid,
        reading: &MeterReading,
    ) -> ApiResult<Vec<ConsumerAllocation>> {
        let model = self.sharing.get_sharing_operation_by_id(sharing_id).await?;
        visible_operation(model, ctx, sharing_id)?;

        let authorized = self.sharing.get_authorized_eans(sharing_id).await?;
        let entries = self.sharing.load_schedule(sharing_id).await?;
        let schedule =
            SharingKeySchedule::from_entries(sharing_id, entries.into_iter().map(ScheduleEntry::from).collect())?;
        let keys = self.keys_applying_to(&schedule, reading).await?;

        self.allocator
            .allocate(reading, &authorized, &schedule, &keys)
            .inspect_err(|e| {
                warn!(%sharing_id, ean = %reading.ean, error = %e, "Allocation failed");
            })
    }

    /// Allocates one reading and stores a row per receiving member.
    pub async fn record_consumption(
        &self,
        ctx: &TenantContext,
        sharing_id: Uuid,
        reading: &MeterReading,
    ) -> ApiResult<Vec<SharingOpConsumption>> {
        let allocations = self.allocate(ctx, sharing_id, reading).await?;

        let computed_at = Utc::now();
        let records: Vec<SharingOpConsumption> = allocations
            .into_iter()
            .map(|allocation| SharingOpConsumption {
                id: Uuid::new_v4(),
                sharing_operation_id: sharing_id,
                ean: reading.ean.clone(),
                member_id: allocation.member_id,
                period_start: reading.period_start,
                period_end: reading.period_end,
                allocated_quantity: allocation.allocated_quantity,
                computed_at,
            })
            .collect();

        let rows: Vec<SharingOpConsumptionModel> = records.iter().map(SharingOpConsumptionModel::from).collect();
        self.sharing.add_consumptions(&rows).await?;

        info!(
            %sharing_id,
            ean = %reading.ean,
            period_start = %reading.period_start,
            period_end = %reading.period_end,
            members = records.len(),
            "Recorded allocated consumption"
        );
        Ok(records)
    }

    /// Stored allocations overlapping `[from, to)`.
    pub async fn get_consumption(
        &self,
        ctx: &TenantContext,
        sharing_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ApiResult<Vec<SharingOpConsumption>> {
        if from >= to {
            return Err(ApiError::ValidationError(format!(
                "Window start {from} must precede its end {to}"
            )));
        }
        let model = self.sharing.get_sharing_operation_by_id(sharing_id).await?;
        visible_operation(model, ctx, sharing_id)?;

        let rows = self
            .sharing
            .get_sharing_operation_consumption(sharing_id, from, to)
            .await?;
        Ok(rows.into_iter().map(SharingOpConsumption::from).collect())
    }

    /// Loads the keys of every applied entry overlapping the reading period.
    async fn keys_applying_to(
        &self,
        schedule: &SharingKeySchedule,
        reading: &MeterReading,
    ) -> ApiResult<HashMap<Uuid, AllocationKey>> {
        let ids: HashSet<Uuid> = schedule
            .entries()
            .iter()
            .filter(|entry| {
                entry.has_applied()
                    && entry.start_date < reading.period_end
                    && entry.end_date.map_or(true, |end| end > reading.period_start)
            })
            .map(|entry| entry.key_id)
            .collect();
        let ids: Vec<Uuid> = ids.into_iter().collect();

        let keys: HashMap<Uuid, AllocationKey> = self
            .keys
            .load_batch(&ids)
            .await?
            .into_iter()
            .flatten()
            .map(|key| (key.id, key))
            .collect();
        debug!(requested = ids.len(), loaded = keys.len(), "Loaded keys for allocation");
        Ok(keys)
    }
}
