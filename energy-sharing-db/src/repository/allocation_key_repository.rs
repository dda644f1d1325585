use async_trait::async_trait;
use energy_sharing_api::AllocationKey;
use sqlx::Database;
use std::error::Error;
use uuid::Uuid;

use crate::models::allocation_key::{AllocationKeyModel, ConsumerModel, IterationModel};
use crate::repository::load_batch::LoadBatch;

/// Row lock held on an allocation key until the transaction ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyLock {
    /// Taken by schedule writes; blocks deletion of the key meanwhile.
    Share,
    /// Taken before replacing or deleting the key.
    Update,
}

/// Storage of allocation keys and their iterations and consumers.
///
/// Every call runs inside the transaction the implementation is bound to;
/// the caller commits or rolls back. Children are never patched: an update
/// is `delete_children`, `update_key`, `create_children` in one transaction.
#[async_trait]
pub trait AllocationKeyRepository<DB: Database>: LoadBatch<DB, AllocationKey> {
    /// Loads a key with its children, iterations ordered by number.
    async fn get_key_by_id(&self, key_id: Uuid) -> Result<Option<AllocationKey>, Box<dyn Error + Send + Sync>>;

    /// Reads the key row and locks it. Deletion checks its references under
    /// [`KeyLock::Update`] while schedule writes hold [`KeyLock::Share`], so a
    /// key cannot disappear between the check and the write.
    async fn lock_key(
        &self,
        key_id: Uuid,
        lock: KeyLock,
    ) -> Result<Option<AllocationKeyModel>, Box<dyn Error + Send + Sync>>;

    async fn create_key(&self, key: &AllocationKeyModel) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Overwrites name and description. Returns the number of rows touched.
    async fn update_key(&self, key: &AllocationKeyModel) -> Result<u64, Box<dyn Error + Send + Sync>>;

    async fn create_children(
        &self,
        iterations: &[IterationModel],
        consumers: &[ConsumerModel],
    ) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Removes every iteration and consumer of the key.
    async fn delete_children(&self, key_id: Uuid) -> Result<u64, Box<dyn Error + Send + Sync>>;

    /// Removes the key row. Children must be gone already.
    async fn delete_key(&self, key_id: Uuid) -> Result<u64, Box<dyn Error + Send + Sync>>;

    async fn find_ids_by_community_id(&self, community_id: Uuid) -> Result<Vec<Uuid>, Box<dyn Error + Send + Sync>>;
}
