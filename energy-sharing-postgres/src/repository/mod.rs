pub mod allocation_key_repository;
pub mod db_init;
pub mod sharing_operation_repository;

pub use allocation_key_repository::AllocationKeyRepositoryImpl;
pub use sharing_operation_repository::SharingOperationRepositoryImpl;
