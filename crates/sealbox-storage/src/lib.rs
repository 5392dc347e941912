//! Sealbox Storage - Persistence of sealed secure data
//!
//! The storage adapter moves sealed blobs between the instance manager and a
//! raw blob store. It only ever handles instance IDs and sealed strings, never
//! plaintext.

pub mod blob_store;
pub mod config;
pub mod error;
pub mod secure_storage;

pub use blob_store::{BlobStore, FileBlobStore, MemoryBlobStore};
pub use config::StorageConfig;
pub use error::{Result, StorageError};
pub use secure_storage::{
    SecureStorage, StorageOptions, StorageReadOptions, StorageWriteOptions, STORAGE_TYPE_LOCAL,
};
