use energy_sharing_api::{AllocationKey, ApiError, ApiResult, SharingOperation, TenantContext};
use uuid::Uuid;

use crate::models::allocation_key::AllocationKeyModel;
use crate::models::sharing_operation::SharingOperationModel;

/// Records of another community are reported exactly like missing ones.
pub(crate) fn visible_operation(
    model: Option<SharingOperationModel>,
    ctx: &TenantContext,
    sharing_id: Uuid,
) -> ApiResult<SharingOperation> {
    match model {
        Some(model) if ctx.owns(model.community_id) => Ok(model.into()),
        _ => Err(ApiError::NotFound(format!("Sharing operation {sharing_id} not found"))),
    }
}

pub(crate) fn visible_key(key: Option<AllocationKey>, ctx: &TenantContext, key_id: Uuid) -> ApiResult<AllocationKey> {
    match key {
        Some(key) if ctx.owns(key.community_id) => Ok(key),
        _ => Err(ApiError::NotFound(format!("Allocation key {key_id} not found"))),
    }
}

pub(crate) fn visible_key_row(
    row: Option<AllocationKeyModel>,
    ctx: &TenantContext,
    key_id: Uuid,
) -> ApiResult<AllocationKeyModel> {
    match row {
        Some(row) if ctx.owns(row.community_id) => Ok(row),
        _ => Err(ApiError::NotFound(format!("Allocation key {key_id} not found"))),
    }
}
