pub mod config;
pub mod postgres_repositories;
pub mod repository;
pub mod utils;

pub use config::DatabaseConfig;
pub use postgres_repositories::{EnergySharingSession, PostgresRepositories};
pub use repository::allocation_key_repository::AllocationKeyRepositoryImpl;
pub use repository::sharing_operation_repository::SharingOperationRepositoryImpl;

#[cfg(test)]
pub mod test_helper;
