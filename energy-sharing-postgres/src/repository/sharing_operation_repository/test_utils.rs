use chrono::{DateTime, Duration, TimeZone, Utc};
use energy_sharing_api::SharingKeyStatus;
use energy_sharing_db::models::sharing_operation::{SharingOperationKeyModel, SharingOperationModel};
use heapless::String as HeaplessString;
use std::str::FromStr;
use uuid::Uuid;

pub fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(n)
}

pub fn create_test_sharing_operation(community_id: Uuid) -> SharingOperationModel {
    SharingOperationModel {
        id: Uuid::new_v4(),
        community_id,
        name: HeaplessString::from_str("Street A").unwrap(),
        // Whole seconds survive the round trip through timestamptz unchanged
        created_at: day(0),
        created_by: Uuid::new_v4(),
    }
}

pub fn create_test_entry(
    sharing_operation_id: Uuid,
    sequence: i64,
    start: i64,
    status: SharingKeyStatus,
) -> SharingOperationKeyModel {
    SharingOperationKeyModel {
        id: Uuid::new_v4(),
        sharing_operation_id,
        allocation_key_id: Uuid::new_v4(),
        sequence,
        start_date: day(start),
        end_date: None,
        status,
    }
}
