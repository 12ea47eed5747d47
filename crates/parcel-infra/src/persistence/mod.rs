//! Persistence implementations
//!
//! This module provides file-based implementations of the repository traits.

mod file_blob_storage;
mod file_condition_repo;
mod file_order_directory;

pub use file_blob_storage::FileBlobStorage;
pub use file_condition_repo::FileConditionRepository;
pub use file_order_directory::FileOrderDirectory;
