use chrono::{DateTime, Utc};
use energy_sharing_api::{
    Ean, ScheduleEntry, SharingKeyStatus, SharingOpConsumption, SharingOperation, SHARING_NAME_MAX_LENGTH,
};
use heapless::String as HeaplessString;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::identifiable::Identifiable;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharingOperationModel {
    pub id: Uuid,
    pub community_id: Uuid,
    pub name: HeaplessString<SHARING_NAME_MAX_LENGTH>,
    pub created_at: DateTime<Utc>,
    pub created_by: Uuid,
}

impl Identifiable for SharingOperationModel {
    fn get_id(&self) -> Uuid {
        self.id
    }
}

impl From<SharingOperationModel> for SharingOperation {
    fn from(model: SharingOperationModel) -> Self {
        SharingOperation {
            id: model.id,
            community_id: model.community_id,
            name: model.name,
            created_at: model.created_at,
            created_by: model.created_by,
        }
    }
}

impl From<&SharingOperation> for SharingOperationModel {
    fn from(operation: &SharingOperation) -> Self {
        SharingOperationModel {
            id: operation.id,
            community_id: operation.community_id,
            name: operation.name.clone(),
            created_at: operation.created_at,
            created_by: operation.created_by,
        }
    }
}

/// One row of the `sharing_operation_key` log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharingOperationKeyModel {
    pub id: Uuid,
    pub sharing_operation_id: Uuid,
    pub allocation_key_id: Uuid,
    pub sequence: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: SharingKeyStatus,
}

impl Identifiable for SharingOperationKeyModel {
    fn get_id(&self) -> Uuid {
        self.id
    }
}

impl From<SharingOperationKeyModel> for ScheduleEntry {
    fn from(model: SharingOperationKeyModel) -> Self {
        ScheduleEntry {
            id: model.id,
            sequence: model.sequence,
            sharing_operation_id: model.sharing_operation_id,
            key_id: model.allocation_key_id,
            start_date: model.start_date,
            end_date: model.end_date,
            status: model.status,
        }
    }
}

impl From<&ScheduleEntry> for SharingOperationKeyModel {
    fn from(entry: &ScheduleEntry) -> Self {
        SharingOperationKeyModel {
            id: entry.id,
            sharing_operation_id: entry.sharing_operation_id,
            allocation_key_id: entry.key_id,
            sequence: entry.sequence,
            start_date: entry.start_date,
            end_date: entry.end_date,
            status: entry.status,
        }
    }
}

/// Meter authorized to take part in a sharing operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharingOperationEanModel {
    pub sharing_operation_id: Uuid,
    pub ean: Ean,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharingOpConsumptionModel {
    pub id: Uuid,
    pub sharing_operation_id: Uuid,
    pub ean: Ean,
    pub member_id: Uuid,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub allocated_quantity: Decimal,
    pub computed_at: DateTime<Utc>,
}

impl Identifiable for SharingOpConsumptionModel {
    fn get_id(&self) -> Uuid {
        self.id
    }
}

impl From<SharingOpConsumptionModel> for SharingOpConsumption {
    fn from(model: SharingOpConsumptionModel) -> Self {
        SharingOpConsumption {
            id: model.id,
            sharing_operation_id: model.sharing_operation_id,
            ean: model.ean,
            member_id: model.member_id,
            period_start: model.period_start,
            period_end: model.period_end,
            allocated_quantity: model.allocated_quantity,
            computed_at: model.computed_at,
        }
    }
}

impl From<&SharingOpConsumption> for SharingOpConsumptionModel {
    fn from(consumption: &SharingOpConsumption) -> Self {
        SharingOpConsumptionModel {
            id: consumption.id,
            sharing_operation_id: consumption.sharing_operation_id,
            ean: consumption.ean.clone(),
            member_id: consumption.member_id,
            period_start: consumption.period_start,
            period_end: consumption.period_end,
            allocated_quantity: consumption.allocated_quantity,
            computed_at: consumption.computed_at,
        }
    }
}
