pub mod allocation_key_repository;
pub mod load_batch;
pub mod sharing_operation_repository;

pub use allocation_key_repository::*;
pub use load_batch::*;
pub use sharing_operation_repository::*;
