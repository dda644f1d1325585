pub mod consumption_service;
pub mod key_lifecycle_service;
mod scope;
pub mod sharing_schedule_service;

#[cfg(test)]
pub(crate) mod test_utils;

pub use consumption_service::*;
pub use key_lifecycle_service::*;
pub use sharing_schedule_service::*;
