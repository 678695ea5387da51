#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    ACCESS_TOKEN_KEY, CredentialRepository, InMemoryStore, KeyValueStore, PROGRESS_KEY,
    ProgressRepository, Storage, StorageError,
};
