use heapless::String as HeaplessString;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Wire and storage encoding of a pro-rata consumer share.
pub const PRO_RATA_SENTINEL: Decimal = Decimal::NEGATIVE_ONE;

pub const KEY_NAME_MAX_LENGTH: usize = 100;
pub const KEY_DESCRIPTION_MAX_LENGTH: usize = 500;

/// Share of an iteration's energy assigned to one consumer.
///
/// Externally a share is a plain number where `-1` means pro-rata. Internally
/// the two meanings are kept apart so the allocator never has to special-case
/// a magic value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub enum ConsumerShare {
    /// Fixed fraction of the iteration, in `[0, 1]`
    Fixed(Decimal),
    /// Equal part of whatever the fixed shares leave over
    ProRata,
}

impl ConsumerShare {
    /// Returns the external numeric encoding (`-1` for pro-rata).
    pub fn as_percentage(&self) -> Decimal {
        match self {
            ConsumerShare::Fixed(share) => *share,
            ConsumerShare::ProRata => PRO_RATA_SENTINEL,
        }
    }

    pub fn is_pro_rata(&self) -> bool {
        matches!(self, ConsumerShare::ProRata)
    }
}

impl TryFrom<Decimal> for ConsumerShare {
    type Error = String;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        if value == PRO_RATA_SENTINEL {
            Ok(ConsumerShare::ProRata)
        } else if value >= Decimal::ZERO && value <= Decimal::ONE {
            Ok(ConsumerShare::Fixed(value))
        } else {
            Err(format!(
                "Consumer share {value} must be within [0, 1] or {PRO_RATA_SENTINEL} for pro-rata"
            ))
        }
    }
}

impl From<ConsumerShare> for Decimal {
    fn from(share: ConsumerShare) -> Self {
        share.as_percentage()
    }
}

/// A consumer share inside an iteration, bound to a community member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consumer {
    pub id: Uuid,
    pub member_id: Uuid,
    pub energy_allocated_percentage: ConsumerShare,
}

/// An ordered sub-division of a key. `number` is 1-based and unique per key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Iteration {
    pub id: Uuid,
    pub number: i32,
    pub energy_allocated_percentage: Decimal,
    pub consumers: Vec<Consumer>,
}

/// A reusable template describing how a community's energy is split.
///
/// Iterations are kept sorted by `number`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationKey {
    pub id: Uuid,
    pub community_id: Uuid,
    pub name: HeaplessString<KEY_NAME_MAX_LENGTH>,
    pub description: Option<HeaplessString<KEY_DESCRIPTION_MAX_LENGTH>>,
    pub iterations: Vec<Iteration>,
}

impl AllocationKey {
    pub fn iteration(&self, number: i32) -> Option<&Iteration> {
        self.iterations.iter().find(|iteration| iteration.number == number)
    }
}

/// Caller-supplied definition used to create or replace a key.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AllocationKeyDefinition {
    #[validate(length(min = 1, max = 100))]
    pub name: String,

    #[validate(length(max = 500))]
    pub description: Option<String>,

    #[validate(length(min = 1))]
    #[validate(nested)]
    pub iterations: Vec<IterationDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct IterationDefinition {
    #[validate(range(min = 1))]
    pub number: i32,

    pub energy_allocated_percentage: Decimal,

    #[validate(length(min = 1))]
    pub consumers: Vec<ConsumerDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerDefinition {
    pub member_id: Uuid,
    pub energy_allocated_percentage: ConsumerShare,
}
