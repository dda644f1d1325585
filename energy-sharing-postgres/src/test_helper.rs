//! Test helper module for transaction-based test isolation
//!
//! Tests run inside a session that is never committed, so every change is
//! rolled back when the context is dropped.

use std::sync::{Arc, Once};
use tracing_subscriber::EnvFilter;

use crate::config::DatabaseConfig;
use crate::postgres_repositories::{EnergySharingSession, PostgresRepositories};
use crate::repository::db_init::init_database;

static TRACING: Once = Once::new();

/// Installs a test-friendly subscriber once; `RUST_LOG` selects the level.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Test context that provides a transactional database session
pub struct TestContext {
    pub session: EnergySharingSession,
}

impl TestContext {
    pub fn session(&self) -> &EnergySharingSession {
        &self.session
    }
}

/// Connects using `DATABASE_URL`, applies the migrations and opens a
/// session that is rolled back on drop.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_example() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
///     let ctx = setup_test_context().await?;
///     let repo = &ctx.session().allocation_key_repository;
///     // All changes will be rolled back when ctx is dropped
///     Ok(())
/// }
/// ```
pub async fn setup_test_context() -> Result<TestContext, Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();

    let config = DatabaseConfig {
        max_connections: 1,
        ..DatabaseConfig::from_env()?
    };
    let pool = config.connect().await?;
    init_database(&pool).await?;

    let repos = PostgresRepositories::new(Arc::new(pool));
    let session = repos.begin_session().await?;
    Ok(TestContext { session })
}

/// Shared repositories for tests that need several sessions, e.g. to check
/// what a committed or rolled back session left behind.
pub async fn setup_shared_repos() -> Result<PostgresRepositories, Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();

    let pool = DatabaseConfig::from_env()?.connect().await?;
    init_database(&pool).await?;
    Ok(PostgresRepositories::new(Arc::new(pool)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use energy_sharing_api::{
        parse_ean, AllocationKeyDefinition, AllocationSettings, ConsumerDefinition, ConsumerShare,
        ConsumptionAllocator, IterationDefinition, MeterReading, SharingKeyStatus, TenantContext,
    };
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn definition(member_id: Uuid) -> AllocationKeyDefinition {
        AllocationKeyDefinition {
            name: "Solar roof".to_string(),
            description: None,
            iterations: vec![IterationDefinition {
                number: 1,
                energy_allocated_percentage: Decimal::ONE,
                consumers: vec![ConsumerDefinition {
                    member_id,
                    energy_allocated_percentage: ConsumerShare::ProRata,
                }],
            }],
        }
    }

    #[tokio::test]
    #[serial_test::serial]
    #[ignore]
    async fn test_rollback_discards_changes() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let repos = setup_shared_repos().await?;
        let ctx = TenantContext::new(Uuid::new_v4(), Uuid::new_v4());

        let session = repos.begin_session().await?;
        let key = session.key_lifecycle_service().create_key(&ctx, &definition(Uuid::new_v4())).await?;
        session.rollback().await?;

        let session = repos.begin_session().await?;
        let result = session.key_lifecycle_service().get_key(&ctx, key.id).await;
        assert!(result.is_err());
        Ok(())
    }

    #[tokio::test]
    #[serial_test::serial]
    #[ignore]
    async fn test_end_to_end_allocation() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let repos = setup_shared_repos().await?;
        let ctx = TenantContext::new(Uuid::new_v4(), Uuid::new_v4());
        let member = Uuid::new_v4();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let session = repos.begin_session().await?;
        let key = session.key_lifecycle_service().create_key(&ctx, &definition(member)).await?;
        let schedule = session.sharing_schedule_service();
        let operation = schedule.create_sharing_operation(&ctx, "Street A").await?;
        schedule.authorize_eans(&ctx, operation.id, &["541448820000000001"]).await?;
        schedule
            .add_sharing_key_entry(&ctx, operation.id, key.id, start, SharingKeyStatus::Approved)
            .await?;
        session.commit().await?;

        let session = repos.begin_session().await?;
        let consumption = session.consumption_service(ConsumptionAllocator::new(AllocationSettings::default()));
        let reading = MeterReading {
            ean: parse_ean("541448820000000001")?,
            period_start: start,
            period_end: start + chrono::Duration::hours(1),
            total_consumption: Decimal::new(42, 0),
        };
        let records = consumption.record_consumption(&ctx, operation.id, &reading).await?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].member_id, member);
        assert_eq!(records[0].allocated_quantity, Decimal::new(42, 0));
        session.rollback().await?;
        Ok(())
    }
}
