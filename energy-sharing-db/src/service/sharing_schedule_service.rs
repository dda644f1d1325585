use chrono::{DateTime, Utc};
use energy_sharing_api::{
    parse_ean, ApiError, ApiResult, Ean, ScheduleEntry, SharingKeySchedule, SharingKeyStatus, SharingOperation,
    TenantContext, SHARING_NAME_MAX_LENGTH,
};
use heapless::String as HeaplessString;
use sqlx::Database;
use std::collections::HashSet;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::sharing_operation::{SharingOperationKeyModel, SharingOperationModel};
use crate::repository::{AllocationKeyRepository, KeyLock, SharingOperationRepository};
use crate::service::scope::{visible_key_row, visible_operation};

/// Schedule edits and meter authorization for sharing operations.
///
/// Every schedule mutation locks the sharing operation row, rebuilds the
/// schedule from storage, applies the rule in [`SharingKeySchedule`] and
/// writes the resulting entry, all in the repositories' transaction. Edits
/// of one operation are therefore serialized while different operations
/// proceed independently.
pub struct SharingScheduleService<DB, K, S>
where
    DB: Database,
    K: AllocationKeyRepository<DB>,
    S: SharingOperationRepository<DB>,
{
    keys: Arc<K>,
    sharing: Arc<S>,
    _db: PhantomData<fn() -> DB>,
}

impl<DB, K, S> SharingScheduleService<DB, K, S>
where
    DB: Database,
    K: AllocationKeyRepository<DB>,
    S: SharingOperationRepository<DB>,
{
    pub fn new(keys: Arc<K>, sharing: Arc<S>) -> Self {
        Self {
            keys,
            sharing,
            _db: PhantomData,
        }
    }

    pub async fn create_sharing_operation(&self, ctx: &TenantContext, name: &str) -> ApiResult<SharingOperation> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::ValidationError("name: must not be empty".to_string()));
        }
        let name = HeaplessString::<SHARING_NAME_MAX_LENGTH>::from_str(name).map_err(|_| {
            ApiError::ValidationError(format!("name: too long (max {SHARING_NAME_MAX_LENGTH} bytes)"))
        })?;

        let model = SharingOperationModel {
            id: Uuid::new_v4(),
            community_id: ctx.community_id,
            name,
            created_at: Utc::now(),
            created_by: ctx.user_id,
        };
        self.sharing.create_sharing_operation(&model).await?;

        info!(sharing_id = %model.id, community_id = %model.community_id, "Created sharing operation");
        Ok(model.into())
    }

    pub async fn get_sharing_operation(&self, ctx: &TenantContext, sharing_id: Uuid) -> ApiResult<SharingOperation> {
        let model = self.sharing.get_sharing_operation_by_id(sharing_id).await?;
        visible_operation(model, ctx, sharing_id)
    }

    /// Current schedule, without taking the row lock.
    pub async fn get_schedule(&self, ctx: &TenantContext, sharing_id: Uuid) -> ApiResult<SharingKeySchedule> {
        self.get_sharing_operation(ctx, sharing_id).await?;
        self.load_schedule(sharing_id).await
    }

    pub async fn add_key_to_sharing(
        &self,
        ctx: &TenantContext,
        sharing_id: Uuid,
        key_id: Uuid,
        start_date: DateTime<Utc>,
    ) -> ApiResult<ScheduleEntry> {
        let mut schedule = self.lock_schedule(ctx, sharing_id).await?;
        self.ensure_key_visible(ctx, key_id).await?;

        let entry = schedule
            .add_key_to_sharing(key_id, start_date)
            .inspect_err(|e| warn!(%sharing_id, %key_id, error = %e, "Rejected key proposal"))?;
        self.sharing
            .add_key_to_sharing(&SharingOperationKeyModel::from(&entry))
            .await?;

        info!(%sharing_id, %key_id, %start_date, sequence = entry.sequence, "Proposed key");
        Ok(entry)
    }

    pub async fn close_active_approved_key(
        &self,
        ctx: &TenantContext,
        sharing_id: Uuid,
        prev_end_date: DateTime<Utc>,
    ) -> ApiResult<ScheduleEntry> {
        let mut schedule = self.lock_schedule(ctx, sharing_id).await?;

        let entry = schedule
            .close_active_approved_key(prev_end_date)
            .inspect_err(|e| warn!(%sharing_id, error = %e, "Rejected close of active key"))?;
        let rows = self
            .sharing
            .close_active_approved_key(sharing_id, prev_end_date)
            .await?;
        expect_one_row(rows, sharing_id)?;

        info!(%sharing_id, key_id = %entry.key_id, %prev_end_date, "Closed active approved key");
        Ok(entry)
    }

    pub async fn close_specific_key_entry(
        &self,
        ctx: &TenantContext,
        sharing_id: Uuid,
        key_id: Uuid,
        prev_end_date: DateTime<Utc>,
    ) -> ApiResult<ScheduleEntry> {
        let mut schedule = self.lock_schedule(ctx, sharing_id).await?;

        let entry = schedule
            .close_specific_key_entry(key_id, prev_end_date)
            .inspect_err(|e| warn!(%sharing_id, %key_id, error = %e, "Rejected close of key entry"))?;
        let rows = self
            .sharing
            .close_specific_key_entry(entry.id, prev_end_date)
            .await?;
        expect_one_row(rows, sharing_id)?;

        info!(%sharing_id, %key_id, entry_id = %entry.id, %prev_end_date, "Closed key entry");
        Ok(entry)
    }

    /// Writes an entry with an explicit status, typically approving a
    /// proposal or seeding history.
    pub async fn add_sharing_key_entry(
        &self,
        ctx: &TenantContext,
        sharing_id: Uuid,
        key_id: Uuid,
        new_start_date: DateTime<Utc>,
        status: SharingKeyStatus,
    ) -> ApiResult<ScheduleEntry> {
        let mut schedule = self.lock_schedule(ctx, sharing_id).await?;
        self.ensure_key_visible(ctx, key_id).await?;

        let entry = schedule
            .add_sharing_key_entry(key_id, new_start_date, status)
            .inspect_err(|e| warn!(%sharing_id, %key_id, %status, error = %e, "Rejected schedule entry"))?;
        let model = SharingOperationKeyModel::from(&entry);
        match entry.status {
            SharingKeyStatus::Proposed => self.sharing.add_key_to_sharing(&model).await?,
            _ => {
                let rows = self.sharing.add_sharing_key_entry(&model).await?;
                expect_one_row(rows, sharing_id)?;
            }
        }

        info!(%sharing_id, %key_id, %status, %new_start_date, sequence = entry.sequence, "Wrote schedule entry");
        Ok(entry)
    }

    /// Withdraws the latest open proposal of `key_id`.
    pub async fn discard_proposed_key(
        &self,
        ctx: &TenantContext,
        sharing_id: Uuid,
        key_id: Uuid,
    ) -> ApiResult<ScheduleEntry> {
        let mut schedule = self.lock_schedule(ctx, sharing_id).await?;

        let entry = schedule.discard_proposed_key(key_id)?;
        let rows = self.sharing.remove_key_entry(entry.id).await?;
        expect_one_row(rows, sharing_id)?;

        info!(%sharing_id, %key_id, entry_id = %entry.id, "Discarded key proposal");
        Ok(entry)
    }

    /// Adds meters to the operation's authorized set. Returns the parsed
    /// identifiers; meters already authorized are accepted again.
    pub async fn authorize_eans(
        &self,
        ctx: &TenantContext,
        sharing_id: Uuid,
        eans: &[&str],
    ) -> ApiResult<Vec<Ean>> {
        let parsed = eans
            .iter()
            .map(|ean| parse_ean(ean))
            .collect::<ApiResult<Vec<_>>>()?;
        self.get_sharing_operation(ctx, sharing_id).await?;

        let added = self.sharing.authorize_eans(sharing_id, &parsed).await?;
        info!(%sharing_id, requested = parsed.len(), added, "Authorized meters");
        Ok(parsed)
    }

    pub async fn get_authorized_eans(&self, ctx: &TenantContext, sharing_id: Uuid) -> ApiResult<HashSet<Ean>> {
        self.get_sharing_operation(ctx, sharing_id).await?;
        Ok(self.sharing.get_authorized_eans(sharing_id).await?)
    }

    async fn lock_schedule(&self, ctx: &TenantContext, sharing_id: Uuid) -> ApiResult<SharingKeySchedule> {
        let model = self.sharing.lock_sharing_operation(sharing_id).await?;
        visible_operation(model, ctx, sharing_id)?;
        self.load_schedule(sharing_id).await
    }

    async fn load_schedule(&self, sharing_id: Uuid) -> ApiResult<SharingKeySchedule> {
        let rows = self.sharing.load_schedule(sharing_id).await?;
        debug!(%sharing_id, entries = rows.len(), "Loaded schedule");
        SharingKeySchedule::from_entries(sharing_id, rows.into_iter().map(ScheduleEntry::from).collect())
    }

    /// Only keys of the operation's own community may be scheduled. The key
    /// stays share-locked until the transaction ends, holding off a
    /// concurrent delete.
    async fn ensure_key_visible(&self, ctx: &TenantContext, key_id: Uuid) -> ApiResult<()> {
        let row = self.keys.lock_key(key_id, KeyLock::Share).await?;
        visible_key_row(row, ctx, key_id).map(|_| ())
    }
}

fn expect_one_row(rows: u64, sharing_id: Uuid) -> ApiResult<()> {
    if rows == 1 {
        Ok(())
    } else {
        Err(ApiError::Conflict(format!(
            "Schedule of sharing operation {sharing_id} changed concurrently; {rows} rows matched"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_utils::{day, single_iteration, tenant, InMemoryRepository, KeyGuardCall};
    use crate::service::KeyLifecycleService;
    use energy_sharing_api::ConsumerShare;
    use sqlx::Postgres;

    struct Fixture {
        repo: Arc<InMemoryRepository>,
        schedule: SharingScheduleService<Postgres, InMemoryRepository, InMemoryRepository>,
        keys: KeyLifecycleService<Postgres, InMemoryRepository, InMemoryRepository>,
        ctx: TenantContext,
        sharing_id: Uuid,
    }

    impl Fixture {
        async fn new() -> Self {
            let repo = InMemoryRepository::new();
            let schedule = SharingScheduleService::new(repo.clone(), repo.clone());
            let keys = KeyLifecycleService::new(repo.clone(), repo.clone());
            let ctx = tenant();
            let sharing_id = schedule.create_sharing_operation(&ctx, "Street A").await.unwrap().id;
            Self {
                repo,
                schedule,
                keys,
                ctx,
                sharing_id,
            }
        }

        async fn key(&self) -> Uuid {
            self.keys
                .create_key(&self.ctx, &single_iteration(&[(Uuid::new_v4(), ConsumerShare::ProRata)]))
                .await
                .unwrap()
                .id
        }

        fn open_approved_rows(&self) -> usize {
            self.repo
                .store
                .lock()
                .unwrap()
                .entries
                .iter()
                .filter(|entry| entry.status == SharingKeyStatus::Approved && entry.end_date.is_none())
                .count()
        }
    }

    #[tokio::test]
    async fn test_scheduling_share_locks_the_key() {
        let f = Fixture::new().await;
        let (k1, k2) = (f.key().await, f.key().await);

        f.schedule.add_key_to_sharing(&f.ctx, f.sharing_id, k1, day(0)).await.unwrap();
        f.schedule
            .add_sharing_key_entry(&f.ctx, f.sharing_id, k2, day(0), SharingKeyStatus::Approved)
            .await
            .unwrap();

        let log = f.repo.store.lock().unwrap().key_guard_log.clone();
        assert_eq!(
            log,
            vec![KeyGuardCall::Lock(k1, KeyLock::Share), KeyGuardCall::Lock(k2, KeyLock::Share)]
        );
    }

    #[tokio::test]
    async fn test_key_handover_scenario() {
        let f = Fixture::new().await;
        let (k1, k2, k3) = (f.key().await, f.key().await, f.key().await);

        f.schedule
            .add_sharing_key_entry(&f.ctx, f.sharing_id, k1, day(0), SharingKeyStatus::Approved)
            .await
            .unwrap();
        f.schedule.close_active_approved_key(&f.ctx, f.sharing_id, day(10)).await.unwrap();
        f.schedule.add_key_to_sharing(&f.ctx, f.sharing_id, k2, day(10)).await.unwrap();
        let approved = f
            .schedule
            .add_sharing_key_entry(&f.ctx, f.sharing_id, k2, day(10), SharingKeyStatus::Approved)
            .await
            .unwrap();
        assert_eq!(approved.status, SharingKeyStatus::Approved);

        let result = f
            .schedule
            .add_sharing_key_entry(&f.ctx, f.sharing_id, k3, day(5), SharingKeyStatus::Approved)
            .await;
        assert!(matches!(result, Err(ApiError::Conflict(_))));

        let schedule = f.schedule.get_schedule(&f.ctx, f.sharing_id).await.unwrap();
        assert_eq!(schedule.active_approved_key().map(|entry| entry.key_id), Some(k2));
        assert_eq!(schedule.entries().len(), 2);
        assert_eq!(f.open_approved_rows(), 1);
    }

    #[tokio::test]
    async fn test_second_approval_needs_close() {
        let f = Fixture::new().await;
        let (k1, k2) = (f.key().await, f.key().await);

        f.schedule
            .add_sharing_key_entry(&f.ctx, f.sharing_id, k1, day(0), SharingKeyStatus::Approved)
            .await
            .unwrap();
        let result = f
            .schedule
            .add_sharing_key_entry(&f.ctx, f.sharing_id, k2, day(3), SharingKeyStatus::Approved)
            .await;

        assert!(matches!(result, Err(ApiError::Conflict(_))));
        assert_eq!(f.open_approved_rows(), 1);
    }

    #[tokio::test]
    async fn test_close_without_active_key() {
        let f = Fixture::new().await;
        let result = f.schedule.close_active_approved_key(&f.ctx, f.sharing_id, day(1)).await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_close_before_start_is_rejected() {
        let f = Fixture::new().await;
        let k1 = f.key().await;
        f.schedule
            .add_sharing_key_entry(&f.ctx, f.sharing_id, k1, day(4), SharingKeyStatus::Approved)
            .await
            .unwrap();

        let result = f.schedule.close_specific_key_entry(&f.ctx, f.sharing_id, k1, day(2)).await;
        assert!(matches!(result, Err(ApiError::ValidationError(_))));

        let closed = f
            .schedule
            .close_specific_key_entry(&f.ctx, f.sharing_id, k1, day(6))
            .await
            .unwrap();
        assert_eq!(closed.end_date, Some(day(6)));
        assert_eq!(f.open_approved_rows(), 0);
    }

    #[tokio::test]
    async fn test_proposal_before_boundary_conflicts() {
        let f = Fixture::new().await;
        let (k1, k2) = (f.key().await, f.key().await);
        f.schedule
            .add_sharing_key_entry(&f.ctx, f.sharing_id, k1, day(7), SharingKeyStatus::Approved)
            .await
            .unwrap();

        let result = f.schedule.add_key_to_sharing(&f.ctx, f.sharing_id, k2, day(6)).await;
        assert!(matches!(result, Err(ApiError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_discard_proposal() {
        let f = Fixture::new().await;
        let k1 = f.key().await;
        f.schedule.add_key_to_sharing(&f.ctx, f.sharing_id, k1, day(1)).await.unwrap();

        f.schedule.discard_proposed_key(&f.ctx, f.sharing_id, k1).await.unwrap();

        assert!(f.repo.store.lock().unwrap().entries.is_empty());
        let again = f.schedule.discard_proposed_key(&f.ctx, f.sharing_id, k1).await;
        assert!(matches!(again, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_foreign_key_cannot_be_scheduled() {
        let f = Fixture::new().await;
        let foreign_key = f
            .keys
            .create_key(&tenant(), &single_iteration(&[(Uuid::new_v4(), ConsumerShare::ProRata)]))
            .await
            .unwrap();

        let result = f
            .schedule
            .add_key_to_sharing(&f.ctx, f.sharing_id, foreign_key.id, day(0))
            .await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_foreign_operation_is_invisible() {
        let f = Fixture::new().await;
        let stranger = tenant();

        let result = f.schedule.close_active_approved_key(&stranger, f.sharing_id, day(1)).await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
        assert!(f.schedule.get_schedule(&stranger, f.sharing_id).await.is_err());
    }

    #[tokio::test]
    async fn test_sharing_operation_metadata() {
        let f = Fixture::new().await;
        let operation = f.schedule.get_sharing_operation(&f.ctx, f.sharing_id).await.unwrap();

        assert_eq!(operation.name.as_str(), "Street A");
        assert_eq!(operation.created_by, f.ctx.user_id);
        assert!(matches!(
            f.schedule.create_sharing_operation(&f.ctx, "   ").await,
            Err(ApiError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_authorize_eans_is_idempotent() {
        let f = Fixture::new().await;

        f.schedule
            .authorize_eans(&f.ctx, f.sharing_id, &["541448820000000001", "541448820000000002"])
            .await
            .unwrap();
        f.schedule
            .authorize_eans(&f.ctx, f.sharing_id, &["541448820000000001"])
            .await
            .unwrap();

        let eans = f.schedule.get_authorized_eans(&f.ctx, f.sharing_id).await.unwrap();
        assert_eq!(eans.len(), 2);

        let invalid = f.schedule.authorize_eans(&f.ctx, f.sharing_id, &["not-a-meter"]).await;
        assert!(matches!(invalid, Err(ApiError::ValidationError(_))));
    }
}
