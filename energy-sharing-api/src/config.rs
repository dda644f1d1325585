use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};

pub const DEFAULT_ALLOCATION_PRECISION: u32 = 6;

/// Numeric settings of the consumption allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationSettings {
    /// Decimal places kept when an iteration's amount is computed
    #[serde(default = "default_precision")]
    pub precision: u32,
}

fn default_precision() -> u32 {
    DEFAULT_ALLOCATION_PRECISION
}

impl Default for AllocationSettings {
    fn default() -> Self {
        Self {
            precision: DEFAULT_ALLOCATION_PRECISION,
        }
    }
}

impl AllocationSettings {
    /// Reads `ALLOCATION_PRECISION`, defaulting when it is not set.
    pub fn from_env() -> ApiResult<Self> {
        Self::from_precision_var(std::env::var("ALLOCATION_PRECISION").ok())
    }

    fn from_precision_var(value: Option<String>) -> ApiResult<Self> {
        match value {
            None => Ok(Self::default()),
            Some(raw) => {
                let precision = raw.trim().parse::<u32>().map_err(|e| {
                    ApiError::ValidationError(format!("ALLOCATION_PRECISION '{raw}' is invalid: {e}"))
                })?;
                // rust_decimal keeps at most 28 fractional digits
                if precision > 28 {
                    return Err(ApiError::ValidationError(format!(
                        "ALLOCATION_PRECISION {precision} exceeds 28"
                    )));
                }
                Ok(Self { precision })
            }
        }
    }
}
