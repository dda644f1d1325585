pub mod repo_impl;
pub mod load_batch;
pub mod create_sharing_operation;
pub mod schedule_entries;
pub mod authorized_eans;
pub mod consumption;

#[cfg(test)]
pub mod test_utils;

pub use repo_impl::SharingOperationRepositoryImpl;
