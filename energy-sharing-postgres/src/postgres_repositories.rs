use energy_sharing_api::ConsumptionAllocator;
use energy_sharing_db::service::{ConsumptionService, KeyLifecycleService, SharingScheduleService};
use postgres_unit_of_work::Executor;
use sqlx::{PgPool, Postgres};
use std::sync::Arc;

use crate::repository::allocation_key_repository::AllocationKeyRepositoryImpl;
use crate::repository::sharing_operation_repository::SharingOperationRepositoryImpl;

pub type PgKeyLifecycleService =
    KeyLifecycleService<Postgres, AllocationKeyRepositoryImpl, SharingOperationRepositoryImpl>;
pub type PgSharingScheduleService =
    SharingScheduleService<Postgres, AllocationKeyRepositoryImpl, SharingOperationRepositoryImpl>;
pub type PgConsumptionService =
    ConsumptionService<Postgres, AllocationKeyRepositoryImpl, SharingOperationRepositoryImpl>;

pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Starts a transaction and builds every repository on top of it.
    pub async fn begin_session(&self) -> Result<EnergySharingSession, sqlx::Error> {
        let tx = self.pool.begin().await?;
        let executor = Executor::new(tx);

        Ok(EnergySharingSession {
            allocation_key_repository: Arc::new(AllocationKeyRepositoryImpl::new(executor.clone())),
            sharing_operation_repository: Arc::new(SharingOperationRepositoryImpl::new(executor.clone())),
            executor,
        })
    }
}

/// Repositories sharing one transaction.
///
/// Nothing is persisted until [`commit`](Self::commit). A session dropped
/// without commit rolls back when its connection returns to the pool.
pub struct EnergySharingSession {
    pub executor: Executor,
    pub allocation_key_repository: Arc<AllocationKeyRepositoryImpl>,
    pub sharing_operation_repository: Arc<SharingOperationRepositoryImpl>,
}

impl EnergySharingSession {
    pub fn key_lifecycle_service(&self) -> PgKeyLifecycleService {
        KeyLifecycleService::new(
            self.allocation_key_repository.clone(),
            self.sharing_operation_repository.clone(),
        )
    }

    pub fn sharing_schedule_service(&self) -> PgSharingScheduleService {
        SharingScheduleService::new(
            self.allocation_key_repository.clone(),
            self.sharing_operation_repository.clone(),
        )
    }

    pub fn consumption_service(&self, allocator: ConsumptionAllocator) -> PgConsumptionService {
        ConsumptionService::new(
            self.allocation_key_repository.clone(),
            self.sharing_operation_repository.clone(),
            allocator,
        )
    }

    /// Fails if the transaction was already taken out of the executor.
    pub async fn commit(self) -> Result<(), sqlx::Error> {
        let tx = self.executor.tx.lock().await.take();
        match tx {
            Some(tx) => {
                tx.commit().await?;
                tracing::debug!("Session committed");
                Ok(())
            }
            None => Err(sqlx::Error::Protocol("Transaction has been consumed".to_string())),
        }
    }

    pub async fn rollback(self) -> Result<(), sqlx::Error> {
        let tx = self.executor.tx.lock().await.take();
        match tx {
            Some(tx) => tx.rollback().await,
            None => Ok(()),
        }
    }
}
