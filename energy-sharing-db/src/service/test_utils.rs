//! In-memory repositories for service tests.
//!
//! One store backs both contracts, so cross-checks such as the key deletion
//! guard see the same data a shared transaction would.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use energy_sharing_api::{
    AllocationKey, AllocationKeyDefinition, ConsumerDefinition, ConsumerShare, Ean, IterationDefinition,
    SharingKeyStatus, TenantContext,
};
use rust_decimal::Decimal;
use sqlx::Postgres;
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::models::allocation_key::{AllocationKeyModel, AllocationKeyRows, ConsumerModel, IterationModel};
use crate::models::sharing_operation::{
    SharingOpConsumptionModel, SharingOperationKeyModel, SharingOperationModel,
};
use crate::repository::{AllocationKeyRepository, KeyLock, LoadBatch, SharingOperationRepository};

#[derive(Default)]
pub struct Store {
    pub keys: HashMap<Uuid, AllocationKeyModel>,
    pub iterations: Vec<IterationModel>,
    pub consumers: Vec<ConsumerModel>,
    pub operations: HashMap<Uuid, SharingOperationModel>,
    pub entries: Vec<SharingOperationKeyModel>,
    pub eans: HashSet<(Uuid, Ean)>,
    pub consumptions: Vec<SharingOpConsumptionModel>,
    /// Key locks and reference counts in call order.
    pub key_guard_log: Vec<KeyGuardCall>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyGuardCall {
    Lock(Uuid, KeyLock),
    CountOpenEntries(Uuid),
}

#[derive(Clone, Default)]
pub struct InMemoryRepository {
    pub store: Arc<Mutex<Store>>,
}

impl InMemoryRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn assemble_key(store: &Store, key_id: Uuid) -> Result<Option<AllocationKey>, Box<dyn Error + Send + Sync>> {
        let Some(key) = store.keys.get(&key_id) else {
            return Ok(None);
        };
        let iterations: Vec<IterationModel> = store
            .iterations
            .iter()
            .filter(|iteration| iteration.allocation_key_id == key_id)
            .cloned()
            .collect();
        let iteration_ids: HashSet<Uuid> = iterations.iter().map(|iteration| iteration.id).collect();
        let consumers = store
            .consumers
            .iter()
            .filter(|consumer| iteration_ids.contains(&consumer.iteration_id))
            .cloned()
            .collect();

        let rows = AllocationKeyRows {
            key: key.clone(),
            iterations,
            consumers,
        };
        rows.into_allocation_key().map(Some)
    }
}

#[async_trait]
impl LoadBatch<Postgres, AllocationKey> for InMemoryRepository {
    async fn load_batch(&self, ids: &[Uuid]) -> Result<Vec<Option<AllocationKey>>, Box<dyn Error + Send + Sync>> {
        let store = self.store.lock().unwrap();
        ids.iter().map(|id| Self::assemble_key(&store, *id)).collect()
    }
}

#[async_trait]
impl AllocationKeyRepository<Postgres> for InMemoryRepository {
    async fn get_key_by_id(&self, key_id: Uuid) -> Result<Option<AllocationKey>, Box<dyn Error + Send + Sync>> {
        let store = self.store.lock().unwrap();
        Self::assemble_key(&store, key_id)
    }

    async fn lock_key(
        &self,
        key_id: Uuid,
        lock: KeyLock,
    ) -> Result<Option<AllocationKeyModel>, Box<dyn Error + Send + Sync>> {
        let mut store = self.store.lock().unwrap();
        store.key_guard_log.push(KeyGuardCall::Lock(key_id, lock));
        Ok(store.keys.get(&key_id).cloned())
    }

    async fn create_key(&self, key: &AllocationKeyModel) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut store = self.store.lock().unwrap();
        if store.keys.contains_key(&key.id) {
            return Err(format!("duplicate key {}", key.id).into());
        }
        store.keys.insert(key.id, key.clone());
        Ok(())
    }

    async fn update_key(&self, key: &AllocationKeyModel) -> Result<u64, Box<dyn Error + Send + Sync>> {
        let mut store = self.store.lock().unwrap();
        match store.keys.get_mut(&key.id) {
            Some(existing) => {
                *existing = key.clone();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn create_children(
        &self,
        iterations: &[IterationModel],
        consumers: &[ConsumerModel],
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut store = self.store.lock().unwrap();
        for iteration in iterations {
            if !store.keys.contains_key(&iteration.allocation_key_id) {
                return Err(format!("unknown key {}", iteration.allocation_key_id).into());
            }
        }
        store.iterations.extend_from_slice(iterations);
        store.consumers.extend_from_slice(consumers);
        Ok(())
    }

    async fn delete_children(&self, key_id: Uuid) -> Result<u64, Box<dyn Error + Send + Sync>> {
        let mut store = self.store.lock().unwrap();
        let iteration_ids: HashSet<Uuid> = store
            .iterations
            .iter()
            .filter(|iteration| iteration.allocation_key_id == key_id)
            .map(|iteration| iteration.id)
            .collect();
        let before = store.iterations.len() + store.consumers.len();
        store.consumers.retain(|consumer| !iteration_ids.contains(&consumer.iteration_id));
        store.iterations.retain(|iteration| iteration.allocation_key_id != key_id);
        Ok((before - store.iterations.len() - store.consumers.len()) as u64)
    }

    async fn delete_key(&self, key_id: Uuid) -> Result<u64, Box<dyn Error + Send + Sync>> {
        let mut store = self.store.lock().unwrap();
        Ok(store.keys.remove(&key_id).map_or(0, |_| 1))
    }

    async fn find_ids_by_community_id(&self, community_id: Uuid) -> Result<Vec<Uuid>, Box<dyn Error + Send + Sync>> {
        let store = self.store.lock().unwrap();
        let mut ids: Vec<Uuid> = store
            .keys
            .values()
            .filter(|key| key.community_id == community_id)
            .map(|key| key.id)
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl LoadBatch<Postgres, SharingOperationModel> for InMemoryRepository {
    async fn load_batch(
        &self,
        ids: &[Uuid],
    ) -> Result<Vec<Option<SharingOperationModel>>, Box<dyn Error + Send + Sync>> {
        let store = self.store.lock().unwrap();
        Ok(ids.iter().map(|id| store.operations.get(id).cloned()).collect())
    }
}

#[async_trait]
impl SharingOperationRepository<Postgres> for InMemoryRepository {
    async fn get_sharing_operation_by_id(
        &self,
        sharing_id: Uuid,
    ) -> Result<Option<SharingOperationModel>, Box<dyn Error + Send + Sync>> {
        Ok(self.store.lock().unwrap().operations.get(&sharing_id).cloned())
    }

    async fn lock_sharing_operation(
        &self,
        sharing_id: Uuid,
    ) -> Result<Option<SharingOperationModel>, Box<dyn Error + Send + Sync>> {
        self.get_sharing_operation_by_id(sharing_id).await
    }

    async fn create_sharing_operation(
        &self,
        operation: &SharingOperationModel,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.store.lock().unwrap().operations.insert(operation.id, operation.clone());
        Ok(())
    }

    async fn load_schedule(
        &self,
        sharing_id: Uuid,
    ) -> Result<Vec<SharingOperationKeyModel>, Box<dyn Error + Send + Sync>> {
        let store = self.store.lock().unwrap();
        let mut entries: Vec<_> = store
            .entries
            .iter()
            .filter(|entry| entry.sharing_operation_id == sharing_id)
            .cloned()
            .collect();
        entries.sort_by_key(|entry| entry.sequence);
        Ok(entries)
    }

    async fn add_key_to_sharing(&self, entry: &SharingOperationKeyModel) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut store = self.store.lock().unwrap();
        if store.entries.iter().any(|existing| {
            existing.sharing_operation_id == entry.sharing_operation_id && existing.sequence == entry.sequence
        }) {
            return Err(format!("duplicate sequence {}", entry.sequence).into());
        }
        store.entries.push(entry.clone());
        Ok(())
    }

    async fn close_active_approved_key(
        &self,
        sharing_id: Uuid,
        end_date: DateTime<Utc>,
    ) -> Result<u64, Box<dyn Error + Send + Sync>> {
        let mut store = self.store.lock().unwrap();
        let mut rows = 0;
        for entry in store.entries.iter_mut().filter(|entry| {
            entry.sharing_operation_id == sharing_id
                && entry.status == SharingKeyStatus::Approved
                && entry.end_date.is_none()
        }) {
            entry.end_date = Some(end_date);
            entry.status = SharingKeyStatus::Closed;
            rows += 1;
        }
        Ok(rows)
    }

    async fn close_specific_key_entry(
        &self,
        entry_id: Uuid,
        end_date: DateTime<Utc>,
    ) -> Result<u64, Box<dyn Error + Send + Sync>> {
        let mut store = self.store.lock().unwrap();
        match store.entries.iter_mut().find(|entry| {
            entry.id == entry_id && entry.status == SharingKeyStatus::Approved && entry.end_date.is_none()
        }) {
            Some(entry) => {
                entry.end_date = Some(end_date);
                entry.status = SharingKeyStatus::Closed;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn add_sharing_key_entry(
        &self,
        entry: &SharingOperationKeyModel,
    ) -> Result<u64, Box<dyn Error + Send + Sync>> {
        let mut store = self.store.lock().unwrap();
        let open_approved_elsewhere = store.entries.iter().any(|existing| {
            existing.sharing_operation_id == entry.sharing_operation_id
                && existing.id != entry.id
                && existing.status == SharingKeyStatus::Approved
                && existing.end_date.is_none()
        });
        if entry.status == SharingKeyStatus::Approved && open_approved_elsewhere {
            return Err("one open approved entry per sharing operation".into());
        }

        match store.entries.iter_mut().find(|existing| existing.id == entry.id) {
            Some(existing) if existing.end_date.is_none() => {
                existing.status = entry.status;
                existing.start_date = entry.start_date;
                existing.sequence = entry.sequence;
                Ok(1)
            }
            Some(_) => Ok(0),
            None => {
                store.entries.push(entry.clone());
                Ok(1)
            }
        }
    }

    async fn remove_key_entry(&self, entry_id: Uuid) -> Result<u64, Box<dyn Error + Send + Sync>> {
        let mut store = self.store.lock().unwrap();
        let before = store.entries.len();
        store
            .entries
            .retain(|entry| !(entry.id == entry_id && entry.status == SharingKeyStatus::Proposed));
        Ok((before - store.entries.len()) as u64)
    }

    async fn count_open_entries_for_key(&self, key_id: Uuid) -> Result<i64, Box<dyn Error + Send + Sync>> {
        let mut store = self.store.lock().unwrap();
        store.key_guard_log.push(KeyGuardCall::CountOpenEntries(key_id));
        Ok(store
            .entries
            .iter()
            .filter(|entry| entry.allocation_key_id == key_id && entry.status != SharingKeyStatus::Closed)
            .count() as i64)
    }

    async fn get_authorized_eans(&self, sharing_id: Uuid) -> Result<HashSet<Ean>, Box<dyn Error + Send + Sync>> {
        let store = self.store.lock().unwrap();
        Ok(store
            .eans
            .iter()
            .filter(|(id, _)| *id == sharing_id)
            .map(|(_, ean)| ean.clone())
            .collect())
    }

    async fn authorize_eans(&self, sharing_id: Uuid, eans: &[Ean]) -> Result<u64, Box<dyn Error + Send + Sync>> {
        let mut store = self.store.lock().unwrap();
        let mut added = 0;
        for ean in eans {
            if store.eans.insert((sharing_id, ean.clone())) {
                added += 1;
            }
        }
        Ok(added)
    }

    async fn add_consumptions(
        &self,
        consumptions: &[SharingOpConsumptionModel],
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.store.lock().unwrap().consumptions.extend_from_slice(consumptions);
        Ok(())
    }

    async fn get_sharing_operation_consumption(
        &self,
        sharing_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SharingOpConsumptionModel>, Box<dyn Error + Send + Sync>> {
        let store = self.store.lock().unwrap();
        let mut rows: Vec<_> = store
            .consumptions
            .iter()
            .filter(|row| row.sharing_operation_id == sharing_id && row.period_start < to && row.period_end > from)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (a.period_start, a.ean.as_str(), a.member_id).cmp(&(b.period_start, b.ean.as_str(), b.member_id))
        });
        Ok(rows)
    }
}

pub fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(n)
}

pub fn tenant() -> TenantContext {
    TenantContext::new(Uuid::new_v4(), Uuid::new_v4())
}

/// Single-iteration key definition.
pub fn single_iteration(consumers: &[(Uuid, ConsumerShare)]) -> AllocationKeyDefinition {
    AllocationKeyDefinition {
        name: "Solar roof".to_string(),
        description: None,
        iterations: vec![IterationDefinition {
            number: 1,
            energy_allocated_percentage: Decimal::ONE,
            consumers: consumers
                .iter()
                .map(|(member_id, share)| ConsumerDefinition {
                    member_id: *member_id,
                    energy_allocated_percentage: *share,
                })
                .collect(),
        }],
    }
}
