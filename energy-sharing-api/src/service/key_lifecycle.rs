use heapless::String as HeaplessString;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use crate::domain::{
    AllocationKey, AllocationKeyDefinition, Consumer, ConsumerShare, Iteration, KEY_DESCRIPTION_MAX_LENGTH,
    KEY_NAME_MAX_LENGTH,
};
use crate::error::{ApiError, ApiResult};
use crate::service::percentage::{consumer_shares_sum_to_one, validate_sum_to_one};

/// Validates a key definition as a whole.
///
/// Field rules come from the `Validate` derive. On top of those:
/// - iteration numbers are unique within the key
/// - each iteration's own share lies in `[0, 1]`
/// - each fixed consumer share lies in `[0, 1]`
/// - each iteration's consumer shares sum to one, pro-rata allowed
/// - the iteration shares sum to one, pro-rata not allowed
///
/// Errors name the offending iteration, and consumer where there is one, by
/// position in the definition.
pub fn validate_key_definition(definition: &AllocationKeyDefinition) -> ApiResult<()> {
    definition.validate()?;

    let mut numbers = HashSet::with_capacity(definition.iterations.len());
    for (index, iteration) in definition.iterations.iter().enumerate() {
        if !numbers.insert(iteration.number) {
            return Err(ApiError::ValidationError(format!(
                "iterations[{index}]: iteration number {} is used more than once",
                iteration.number
            )));
        }

        let share = iteration.energy_allocated_percentage;
        if share < Decimal::ZERO || share > Decimal::ONE {
            return Err(ApiError::ValidationError(format!(
                "iterations[{index}].energy_allocated_percentage: {share} is outside [0, 1]"
            )));
        }

        for (position, consumer) in iteration.consumers.iter().enumerate() {
            if let ConsumerShare::Fixed(share) = consumer.energy_allocated_percentage {
                if share < Decimal::ZERO || share > Decimal::ONE {
                    return Err(ApiError::ValidationError(format!(
                        "iterations[{index}].consumers[{position}].energy_allocated_percentage: \
                         {share} is outside [0, 1]"
                    )));
                }
            }
        }

        let shares: Vec<_> = iteration
            .consumers
            .iter()
            .map(|consumer| consumer.energy_allocated_percentage)
            .collect();
        if !consumer_shares_sum_to_one(&shares) {
            return Err(ApiError::ValidationError(format!(
                "iterations[{index}].consumers: fixed shares must sum to 1 (±0.001) when no consumer is pro-rata"
            )));
        }
    }

    let iteration_shares: Vec<Decimal> = definition
        .iterations
        .iter()
        .map(|iteration| iteration.energy_allocated_percentage)
        .collect();
    if !validate_sum_to_one(&iteration_shares, false) {
        return Err(ApiError::ValidationError(
            "iterations: energy_allocated_percentage values must sum to 1 (±0.001)".to_string(),
        ));
    }

    Ok(())
}

/// Validates `definition` and turns it into a key with fresh child ids.
///
/// Children are always rebuilt from scratch: an update replaces every
/// iteration and consumer rather than patching them.
pub fn build_allocation_key(
    key_id: Uuid,
    community_id: Uuid,
    definition: &AllocationKeyDefinition,
) -> ApiResult<AllocationKey> {
    validate_key_definition(definition)?;

    let name = HeaplessString::<KEY_NAME_MAX_LENGTH>::from_str(&definition.name).map_err(|_| {
        ApiError::ValidationError(format!(
            "name: too long (max {KEY_NAME_MAX_LENGTH} bytes)"
        ))
    })?;
    let description = definition
        .description
        .as_deref()
        .map(HeaplessString::<KEY_DESCRIPTION_MAX_LENGTH>::from_str)
        .transpose()
        .map_err(|_| {
            ApiError::ValidationError(format!(
                "description: too long (max {KEY_DESCRIPTION_MAX_LENGTH} bytes)"
            ))
        })?;

    let mut iterations: Vec<Iteration> = definition
        .iterations
        .iter()
        .map(|iteration| Iteration {
            id: Uuid::new_v4(),
            number: iteration.number,
            energy_allocated_percentage: iteration.energy_allocated_percentage,
            consumers: iteration
                .consumers
                .iter()
                .map(|consumer| Consumer {
                    id: Uuid::new_v4(),
                    member_id: consumer.member_id,
                    energy_allocated_percentage: consumer.energy_allocated_percentage,
                })
                .collect(),
        })
        .collect();
    iterations.sort_by_key(|iteration| iteration.number);

    Ok(AllocationKey {
        id: key_id,
        community_id,
        name,
        description,
        iterations,
    })
}
