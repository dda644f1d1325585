use energy_sharing_api::{AllocationKey, Consumer, ConsumerShare, Iteration};
use energy_sharing_db::models::allocation_key::AllocationKeyRows;
use energy_sharing_db::repository::AllocationKeyRepository;
use heapless::String as HeaplessString;
use rust_decimal::Decimal;
use sqlx::Postgres;
use std::str::FromStr;
use uuid::Uuid;

/// Two iterations (0.6 / 0.4); the second mixes a fixed and a pro-rata
/// consumer.
pub fn create_test_key(community_id: Uuid, name: &str) -> AllocationKey {
    AllocationKey {
        id: Uuid::new_v4(),
        community_id,
        name: HeaplessString::from_str(name).unwrap(),
        description: Some(HeaplessString::from_str("Test key").unwrap()),
        iterations: vec![
            Iteration {
                id: Uuid::new_v4(),
                number: 1,
                energy_allocated_percentage: Decimal::new(6, 1),
                consumers: vec![Consumer {
                    id: Uuid::new_v4(),
                    member_id: Uuid::new_v4(),
                    energy_allocated_percentage: ConsumerShare::Fixed(Decimal::ONE),
                }],
            },
            Iteration {
                id: Uuid::new_v4(),
                number: 2,
                energy_allocated_percentage: Decimal::new(4, 1),
                consumers: vec![
                    Consumer {
                        id: Uuid::new_v4(),
                        member_id: Uuid::new_v4(),
                        energy_allocated_percentage: ConsumerShare::Fixed(Decimal::new(25, 2)),
                    },
                    Consumer {
                        id: Uuid::new_v4(),
                        member_id: Uuid::new_v4(),
                        energy_allocated_percentage: ConsumerShare::ProRata,
                    },
                ],
            },
        ],
    }
}

pub async fn save_key<R: AllocationKeyRepository<Postgres>>(
    repo: &R,
    key: &AllocationKey,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let rows = AllocationKeyRows::from(key);
    repo.create_key(&rows.key).await?;
    repo.create_children(&rows.iterations, &rows.consumers).await
}
