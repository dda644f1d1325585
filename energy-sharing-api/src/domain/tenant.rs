use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Already-authorized caller identity. Every service operation receives it
/// explicitly; records of another community are treated as absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    pub community_id: Uuid,
    pub user_id: Uuid,
}

impl TenantContext {
    pub fn new(community_id: Uuid, user_id: Uuid) -> Self {
        Self { community_id, user_id }
    }

    pub fn owns(&self, community_id: Uuid) -> bool {
        self.community_id == community_id
    }
}
