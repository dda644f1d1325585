use energy_sharing_api::{
    AllocationKey, Consumer, ConsumerShare, Iteration, KEY_DESCRIPTION_MAX_LENGTH, KEY_NAME_MAX_LENGTH,
};
use heapless::String as HeaplessString;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use uuid::Uuid;

use crate::models::identifiable::Identifiable;

/// Represents an allocation key row.
///
/// Iterations and consumers live in their own tables and are always written
/// and deleted together with the key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationKeyModel {
    pub id: Uuid,
    pub community_id: Uuid,
    pub name: HeaplessString<KEY_NAME_MAX_LENGTH>,
    pub description: Option<HeaplessString<KEY_DESCRIPTION_MAX_LENGTH>>,
}

impl Identifiable for AllocationKeyModel {
    fn get_id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationModel {
    pub id: Uuid,
    pub allocation_key_id: Uuid,
    pub number: i32,
    pub energy_allocated_percentage: Decimal,
}

impl Identifiable for IterationModel {
    fn get_id(&self) -> Uuid {
        self.id
    }
}

/// Consumer share row. Pro-rata shares are stored as `-1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumerModel {
    pub id: Uuid,
    pub iteration_id: Uuid,
    pub member_id: Uuid,
    /// Position of the consumer inside its iteration
    pub position: i32,
    pub energy_allocated_percentage: Decimal,
}

impl Identifiable for ConsumerModel {
    fn get_id(&self) -> Uuid {
        self.id
    }
}

/// Key row plus its child rows, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationKeyRows {
    pub key: AllocationKeyModel,
    pub iterations: Vec<IterationModel>,
    pub consumers: Vec<ConsumerModel>,
}

impl From<&AllocationKey> for AllocationKeyRows {
    fn from(key: &AllocationKey) -> Self {
        let mut iterations = Vec::with_capacity(key.iterations.len());
        let mut consumers = Vec::new();
        for iteration in &key.iterations {
            iterations.push(IterationModel {
                id: iteration.id,
                allocation_key_id: key.id,
                number: iteration.number,
                energy_allocated_percentage: iteration.energy_allocated_percentage,
            });
            for (position, consumer) in iteration.consumers.iter().enumerate() {
                consumers.push(ConsumerModel {
                    id: consumer.id,
                    iteration_id: iteration.id,
                    member_id: consumer.member_id,
                    position: position as i32,
                    energy_allocated_percentage: consumer.energy_allocated_percentage.as_percentage(),
                });
            }
        }

        AllocationKeyRows {
            key: AllocationKeyModel {
                id: key.id,
                community_id: key.community_id,
                name: key.name.clone(),
                description: key.description.clone(),
            },
            iterations,
            consumers,
        }
    }
}

impl AllocationKeyRows {
    /// Reassembles the domain key. Iterations come out ordered by number and
    /// consumers by position, whatever order the rows were read in.
    pub fn into_allocation_key(self) -> Result<AllocationKey, Box<dyn Error + Send + Sync>> {
        let mut consumers_by_iteration: HashMap<Uuid, Vec<ConsumerModel>> = HashMap::new();
        for consumer in self.consumers {
            consumers_by_iteration
                .entry(consumer.iteration_id)
                .or_default()
                .push(consumer);
        }

        let mut iterations = Vec::with_capacity(self.iterations.len());
        for iteration in self.iterations {
            if iteration.allocation_key_id != self.key.id {
                return Err(format!(
                    "Iteration {} belongs to key {}, not {}",
                    iteration.id, iteration.allocation_key_id, self.key.id
                )
                .into());
            }

            let mut rows = consumers_by_iteration.remove(&iteration.id).unwrap_or_default();
            rows.sort_by_key(|consumer| consumer.position);
            let consumers = rows
                .into_iter()
                .map(|consumer| {
                    let share = ConsumerShare::try_from(consumer.energy_allocated_percentage)
                        .map_err(|e| format!("Consumer {}: {e}", consumer.id))?;
                    Ok(Consumer {
                        id: consumer.id,
                        member_id: consumer.member_id,
                        energy_allocated_percentage: share,
                    })
                })
                .collect::<Result<Vec<_>, Box<dyn Error + Send + Sync>>>()?;

            iterations.push(Iteration {
                id: iteration.id,
                number: iteration.number,
                energy_allocated_percentage: iteration.energy_allocated_percentage,
                consumers,
            });
        }
        iterations.sort_by_key(|iteration| iteration.number);

        if let Some(orphan) = consumers_by_iteration.keys().next() {
            return Err(format!("Consumers reference unknown iteration {orphan}").into());
        }

        Ok(AllocationKey {
            id: self.key.id,
            community_id: self.key.community_id,
            name: self.key.name,
            description: self.key.description,
            iterations,
        })
    }
}
