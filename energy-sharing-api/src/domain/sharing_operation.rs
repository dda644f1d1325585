use chrono::{DateTime, Utc};
use heapless::String as HeaplessString;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub const SHARING_NAME_MAX_LENGTH: usize = 100;

/// Lifecycle of a schedule entry: `Proposed -> Approved -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "sharing_key_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
pub enum SharingKeyStatus {
    Proposed,
    Approved,
    Closed,
}

impl fmt::Display for SharingKeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SharingKeyStatus::Proposed => "PROPOSED",
            SharingKeyStatus::Approved => "APPROVED",
            SharingKeyStatus::Closed => "CLOSED",
        })
    }
}

/// Binding of a community's metering data to a sequence of allocation keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharingOperation {
    pub id: Uuid,
    pub community_id: Uuid,
    pub name: HeaplessString<SHARING_NAME_MAX_LENGTH>,
    pub created_at: DateTime<Utc>,
    pub created_by: Uuid,
}

/// Time-bounded assignment of one key to one sharing operation.
///
/// `sequence` is the entry's position in the operation's append-only log;
/// higher means more recently written. The covered interval is
/// `[start_date, end_date)`, open-ended while `end_date` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: Uuid,
    pub sequence: i64,
    pub sharing_operation_id: Uuid,
    pub key_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: SharingKeyStatus,
}

impl ScheduleEntry {
    pub fn is_open(&self) -> bool {
        self.end_date.is_none()
    }

    /// The one entry per operation whose key currently applies.
    pub fn is_open_approved(&self) -> bool {
        self.status == SharingKeyStatus::Approved && self.end_date.is_none()
    }

    /// Approved and closed entries are the ones that ever applied to readings.
    pub fn has_applied(&self) -> bool {
        matches!(self.status, SharingKeyStatus::Approved | SharingKeyStatus::Closed)
    }

    pub fn covers(&self, instant: DateTime<Utc>) -> bool {
        self.start_date <= instant && self.end_date.map_or(true, |end| instant < end)
    }
}
