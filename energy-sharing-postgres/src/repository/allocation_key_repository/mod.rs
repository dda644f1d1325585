pub mod repo_impl;
pub mod load_batch;
pub mod create_key;
pub mod update_key;
pub mod delete_key;
pub mod lock_key;
pub mod find_ids_by_community_id;

#[cfg(test)]
pub mod test_utils;

pub use repo_impl::AllocationKeyRepositoryImpl;
