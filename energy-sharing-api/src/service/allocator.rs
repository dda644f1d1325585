use chrono::Duration;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::config::AllocationSettings;
use crate::domain::{AllocationKey, ConsumerAllocation, ConsumerShare, Ean, Iteration, MeterReading};
use crate::error::{ApiError, ApiResult};
use crate::service::schedule::SharingKeySchedule;

/// Apportions metered consumption across consumers following the schedule.
///
/// Pure computation over already-fetched data: it holds no mutable state and
/// can run concurrently for any number of meters and periods.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsumptionAllocator {
    settings: AllocationSettings,
}

impl ConsumptionAllocator {
    pub fn new(settings: AllocationSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> AllocationSettings {
        self.settings
    }

    /// Allocates `reading` to the members of the applicable keys.
    ///
    /// When the period spans a key transition the consumption is split by the
    /// time elapsed under each key and the parts are allocated separately,
    /// then merged per member. Nothing is returned unless the whole period is
    /// allocated.
    pub fn allocate(
        &self,
        reading: &MeterReading,
        authorized_eans: &HashSet<Ean>,
        schedule: &SharingKeySchedule,
        keys: &HashMap<Uuid, AllocationKey>,
    ) -> ApiResult<Vec<ConsumerAllocation>> {
        if !authorized_eans.contains(&reading.ean) {
            return Err(ApiError::UnauthorizedMeter {
                ean: reading.ean.to_string(),
            });
        }
        if reading.total_consumption < Decimal::ZERO {
            return Err(ApiError::ValidationError(format!(
                "Total consumption {} must not be negative",
                reading.total_consumption
            )));
        }

        let segments = schedule.coverage(reading.period_start, reading.period_end)?;
        let period = reading.period_end - reading.period_start;

        let mut merged = MemberTotals::default();
        let last = segments.len().saturating_sub(1);
        let mut assigned = Decimal::ZERO;
        for (index, segment) in segments.iter().enumerate() {
            let key = keys.get(&segment.key_id).ok_or_else(|| {
                ApiError::NotFound(format!("Allocation key {} referenced by the schedule", segment.key_id))
            })?;

            // The last part takes the remainder so the parts add up exactly.
            let part = if index == last {
                reading.total_consumption - assigned
            } else {
                reading.total_consumption * time_fraction(segment.duration(), period)
            };
            assigned += part;

            tracing::debug!(
                key_id = %segment.key_id,
                start = %segment.start,
                end = %segment.end,
                %part,
                "Allocating schedule segment"
            );
            self.allocate_key(key, part, &mut merged);
        }

        Ok(merged.into_allocations())
    }

    fn allocate_key(&self, key: &AllocationKey, total: Decimal, merged: &mut MemberTotals) {
        let mut iterations: Vec<&Iteration> = key.iterations.iter().collect();
        iterations.sort_by_key(|iteration| iteration.number);

        for iteration in iterations {
            let iteration_amount =
                (total * iteration.energy_allocated_percentage).round_dp(self.settings.precision);

            let mut fixed_total = Decimal::ZERO;
            let mut pro_rata_count: u32 = 0;
            for consumer in &iteration.consumers {
                match consumer.energy_allocated_percentage {
                    ConsumerShare::Fixed(share) => {
                        let amount = iteration_amount * share;
                        fixed_total += amount;
                        merged.add(consumer.member_id, amount);
                    }
                    ConsumerShare::ProRata => pro_rata_count += 1,
                }
            }

            if pro_rata_count == 0 {
                continue;
            }
            let remainder = (iteration_amount - fixed_total).max(Decimal::ZERO);
            let each = remainder / Decimal::from(pro_rata_count);
            for consumer in iteration.consumers.iter().filter(|c| c.energy_allocated_percentage.is_pro_rata()) {
                merged.add(consumer.member_id, each);
            }
        }
    }
}

/// Share of `whole` covered by `part`, at nanosecond resolution.
fn time_fraction(part: Duration, whole: Duration) -> Decimal {
    let (part, whole) = match (part.num_nanoseconds(), whole.num_nanoseconds()) {
        (Some(part), Some(whole)) => (part, whole),
        // nanoseconds overflow past roughly 292 years
        _ => (part.num_milliseconds(), whole.num_milliseconds()),
    };
    Decimal::from(part)
        .checked_div(Decimal::from(whole))
        .unwrap_or(Decimal::ZERO)
}

/// Per-member running totals, kept in first-seen order.
#[derive(Default)]
struct MemberTotals {
    order: Vec<Uuid>,
    totals: HashMap<Uuid, Decimal>,
}

impl MemberTotals {
    fn add(&mut self, member_id: Uuid, amount: Decimal) {
        match self.totals.get_mut(&member_id) {
            Some(total) => *total += amount,
            None => {
                self.order.push(member_id);
                self.totals.insert(member_id, amount);
            }
        }
    }

    fn into_allocations(mut self) -> Vec<ConsumerAllocation> {
        self.order
            .iter()
            .map(|member_id| ConsumerAllocation {
                member_id: *member_id,
                allocated_quantity: self.totals.remove(member_id).unwrap_or_default(),
            })
            .collect()
    }
}
