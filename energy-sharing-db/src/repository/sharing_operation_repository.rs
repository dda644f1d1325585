use async_trait::async_trait;
use chrono::{DateTime, Utc};
use energy_sharing_api::Ean;
use sqlx::Database;
use std::collections::HashSet;
use std::error::Error;
use uuid::Uuid;

use crate::models::sharing_operation::{
    SharingOpConsumptionModel, SharingOperationKeyModel, SharingOperationModel,
};
use crate::repository::load_batch::LoadBatch;

/// Storage of sharing operations, their schedule log, authorized meters and
/// computed consumption.
///
/// Schedule writes are plain row operations: the rules live in
/// `SharingKeySchedule`, which the caller evaluates after
/// [`lock_sharing_operation`](Self::lock_sharing_operation) in the same
/// transaction. Update methods return the number of rows touched so the
/// caller can detect a write that matched nothing.
#[async_trait]
pub trait SharingOperationRepository<DB: Database>: LoadBatch<DB, SharingOperationModel> {
    async fn get_sharing_operation_by_id(
        &self,
        sharing_id: Uuid,
    ) -> Result<Option<SharingOperationModel>, Box<dyn Error + Send + Sync>>;

    /// Like [`get_sharing_operation_by_id`](Self::get_sharing_operation_by_id)
    /// but holds a row lock until the transaction ends, serializing schedule
    /// edits of one operation.
    async fn lock_sharing_operation(
        &self,
        sharing_id: Uuid,
    ) -> Result<Option<SharingOperationModel>, Box<dyn Error + Send + Sync>>;

    async fn create_sharing_operation(
        &self,
        operation: &SharingOperationModel,
    ) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// All schedule entries of the operation, ordered by sequence.
    async fn load_schedule(
        &self,
        sharing_id: Uuid,
    ) -> Result<Vec<SharingOperationKeyModel>, Box<dyn Error + Send + Sync>>;

    /// Appends a proposed entry.
    async fn add_key_to_sharing(&self, entry: &SharingOperationKeyModel) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Closes the open approved entry of the operation at `end_date`.
    async fn close_active_approved_key(
        &self,
        sharing_id: Uuid,
        end_date: DateTime<Utc>,
    ) -> Result<u64, Box<dyn Error + Send + Sync>>;

    /// Closes one open approved entry at `end_date`.
    async fn close_specific_key_entry(
        &self,
        entry_id: Uuid,
        end_date: DateTime<Utc>,
    ) -> Result<u64, Box<dyn Error + Send + Sync>>;

    /// Writes an approved entry: inserts it, or promotes the open proposal
    /// with the same id. Returns the number of rows touched.
    async fn add_sharing_key_entry(
        &self,
        entry: &SharingOperationKeyModel,
    ) -> Result<u64, Box<dyn Error + Send + Sync>>;

    /// Deletes a proposed entry.
    async fn remove_key_entry(&self, entry_id: Uuid) -> Result<u64, Box<dyn Error + Send + Sync>>;

    /// Number of proposed or approved entries, across all operations, that
    /// still reference the key.
    async fn count_open_entries_for_key(&self, key_id: Uuid) -> Result<i64, Box<dyn Error + Send + Sync>>;

    async fn get_authorized_eans(&self, sharing_id: Uuid) -> Result<HashSet<Ean>, Box<dyn Error + Send + Sync>>;

    /// Adds meters to the authorized set; already authorized ones are skipped.
    /// Returns the number of meters newly added.
    async fn authorize_eans(&self, sharing_id: Uuid, eans: &[Ean]) -> Result<u64, Box<dyn Error + Send + Sync>>;

    async fn add_consumptions(
        &self,
        consumptions: &[SharingOpConsumptionModel],
    ) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Stored allocations whose period overlaps `[from, to)`, ordered by
    /// period start, meter and member.
    async fn get_sharing_operation_consumption(
        &self,
        sharing_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SharingOpConsumptionModel>, Box<dyn Error + Send + Sync>>;
}
