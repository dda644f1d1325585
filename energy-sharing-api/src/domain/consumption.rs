use chrono::{DateTime, Utc};
use heapless::String as HeaplessString;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

pub const EAN_MAX_LENGTH: usize = 18;

/// Identifier of a metering point.
pub type Ean = HeaplessString<EAN_MAX_LENGTH>;

/// Parses a meter identifier: 1 to 18 ASCII alphanumeric characters.
pub fn parse_ean(value: &str) -> ApiResult<Ean> {
    let value = value.trim();
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ApiError::ValidationError(format!(
            "EAN '{value}' must be non-empty and alphanumeric"
        )));
    }
    Ean::from_str(value).map_err(|_| {
        ApiError::ValidationError(format!(
            "EAN '{value}' is too long (max {EAN_MAX_LENGTH} chars)"
        ))
    })
}

/// Metered consumption of one EAN over `[period_start, period_end)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterReading {
    pub ean: Ean,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub total_consumption: Decimal,
}

/// Quantity apportioned to one community member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumerAllocation {
    pub member_id: Uuid,
    pub allocated_quantity: Decimal,
}

/// Persisted result of an allocation, kept for audit and reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharingOpConsumption {
    pub id: Uuid,
    pub sharing_operation_id: Uuid,
    pub ean: Ean,
    pub member_id: Uuid,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub allocated_quantity: Decimal,
    pub computed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ean() {
        assert_eq!(parse_ean(" 541448820000000001 ").unwrap().as_str(), "541448820000000001");
        assert!(matches!(parse_ean(""), Err(ApiError::ValidationError(_))));
        assert!(matches!(parse_ean("5414-4882"), Err(ApiError::ValidationError(_))));
        assert!(matches!(parse_ean("5414488200000000012"), Err(ApiError::ValidationError(_))));
    }
}
