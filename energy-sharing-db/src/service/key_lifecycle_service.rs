use energy_sharing_api::{
    build_allocation_key, AllocationKey, AllocationKeyDefinition, ApiError, ApiResult, TenantContext,
};
use sqlx::Database;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::allocation_key::AllocationKeyRows;
use crate::repository::{AllocationKeyRepository, KeyLock, SharingOperationRepository};
use crate::service::scope::{visible_key, visible_key_row};

/// Creates, replaces and deletes allocation keys together with their
/// iterations and consumers.
///
/// Each operation issues its writes through repositories bound to one
/// transaction; the caller commits, so a failure part-way leaves nothing.
pub struct KeyLifecycleService<DB, K, S>
where
    DB: Database,
    K: AllocationKeyRepository<DB>,
    S: SharingOperationRepository<DB>,
{
    keys: Arc<K>,
    sharing: Arc<S>,
    _db: PhantomData<fn() -> DB>,
}

impl<DB, K, S> KeyLifecycleService<DB, K, S>
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

    pub async fn get_key(&self, ctx: &TenantContext, key_id: Uuid) -> ApiResult<AllocationKey> {
        let key = self.keys.get_key_by_id(key_id).await?;
        visible_key(key, ctx, key_id)
    }

    /// Keys of the caller's community, ordered by id.
    pub async fn list_keys(&self, ctx: &TenantContext) -> ApiResult<Vec<AllocationKey>> {
        let ids = self.keys.find_ids_by_community_id(ctx.community_id).await?;
        let keys = self.keys.load_batch(&ids).await?;
        Ok(keys.into_iter().flatten().collect())
    }

    pub async fn create_key(
        &self,
        ctx: &TenantContext,
        definition: &AllocationKeyDefinition,
    ) -> ApiResult<AllocationKey> {
        let key = build_allocation_key(Uuid::new_v4(), ctx.community_id, definition).inspect_err(|e| {
            warn!(community_id = %ctx.community_id, error = %e, "Rejected allocation key definition");
        })?;

        let rows = AllocationKeyRows::from(&key);
        self.keys.create_key(&rows.key).await?;
        self.keys.create_children(&rows.iterations, &rows.consumers).await?;

        info!(
            key_id = %key.id,
            community_id = %key.community_id,
            user_id = %ctx.user_id,
            iterations = key.iterations.len(),
            "Created allocation key"
        );
        Ok(key)
    }

    /// Replaces the key's definition. All children are deleted and recreated
    /// with fresh ids.
    pub async fn update_key(
        &self,
        ctx: &TenantContext,
        key_id: Uuid,
        definition: &AllocationKeyDefinition,
    ) -> ApiResult<AllocationKey> {
        let existing = visible_key_row(self.keys.lock_key(key_id, KeyLock::Update).await?, ctx, key_id)?;
        let key = build_allocation_key(key_id, existing.community_id, definition).inspect_err(|e| {
            warn!(%key_id, error = %e, "Rejected allocation key update");
        })?;

        let rows = AllocationKeyRows::from(&key);
        let removed = self.keys.delete_children(key_id).await?;
        if self.keys.update_key(&rows.key).await? == 0 {
            return Err(ApiError::NotFound(format!("Allocation key {key_id} not found")));
        }
        self.keys.create_children(&rows.iterations, &rows.consumers).await?;

        debug!(%key_id, removed_children = removed, "Replaced allocation key children");
        info!(%key_id, user_id = %ctx.user_id, "Updated allocation key");
        Ok(key)
    }

    /// Deletes the key unless a proposed or approved schedule entry of any
    /// sharing operation still references it. Closed entries keep the key id
    /// as history only.
    ///
    /// The key row stays exclusively locked from the reference count until
    /// the transaction ends, so no schedule write can pick the key up between
    /// the check and the delete.
    pub async fn delete_key(&self, ctx: &TenantContext, key_id: Uuid) -> ApiResult<()> {
        visible_key_row(self.keys.lock_key(key_id, KeyLock::Update).await?, ctx, key_id)?;

        let references = self.sharing.count_open_entries_for_key(key_id).await?;
        if references > 0 {
            warn!(%key_id, references, "Refused to delete allocation key in use");
            return Err(ApiError::Conflict(format!(
                "Allocation key {key_id} is referenced by {references} open schedule entries"
            )));
        }

        self.keys.delete_children(key_id).await?;
        self.keys.delete_key(key_id).await?;
        info!(%key_id, user_id = %ctx.user_id, "Deleted allocation key");
        Ok(())
    }
}
