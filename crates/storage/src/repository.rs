use async_trait::async_trait;
use quiz_core::progress::LearnerProgress;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Storage key holding the bearer token.
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Storage key holding the serialized learner progress object.
pub const PROGRESS_KEY: &str = "codinglab_progress";

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// String key/value store, the shape of browser local storage.
///
/// Values are always replaced whole; there is no partial update.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be written.
    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Whole-object persistence for learner progress.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Load the stored progress, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored object is corrupt.
    async fn load_progress(&self) -> Result<Option<LearnerProgress>, StorageError>;

    /// Replace the stored progress with `progress`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the object cannot be serialized or written.
    async fn save_progress(&self, progress: &LearnerProgress) -> Result<(), StorageError>;

    /// Drop stored progress.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn clear_progress(&self) -> Result<(), StorageError>;
}

/// Persistence for the bearer token.
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn load_token(&self) -> Result<Option<String>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn save_token(&self, token: &str) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn clear_token(&self) -> Result<(), StorageError>;
}

#[async_trait]
impl<T> ProgressRepository for T
where
    T: KeyValueStore + ?Sized,
{
    async fn load_progress(&self) -> Result<Option<LearnerProgress>, StorageError> {
        let Some(raw) = self.get(PROGRESS_KEY).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| StorageError::Serialization(err.to_string()))
    }

    async fn save_progress(&self, progress: &LearnerProgress) -> Result<(), StorageError> {
        let raw = serde_json::to_string(progress)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        self.put(PROGRESS_KEY, &raw).await
    }

    async fn clear_progress(&self) -> Result<(), StorageError> {
        self.remove(PROGRESS_KEY).await
    }
}

#[async_trait]
impl<T> CredentialRepository for T
where
    T: KeyValueStore + ?Sized,
{
    async fn load_token(&self) -> Result<Option<String>, StorageError> {
        let token = self.get(ACCESS_TOKEN_KEY).await?;
        Ok(token.filter(|value| !value.trim().is_empty()))
    }

    async fn save_token(&self, token: &str) -> Result<(), StorageError> {
        self.put(ACCESS_TOKEN_KEY, token).await
    }

    async fn clear_token(&self) -> Result<(), StorageError> {
        self.remove(ACCESS_TOKEN_KEY).await
    }
}

/// Simple in-memory store for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(key);
        Ok(())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
    pub credentials: Arc<dyn CredentialRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let store = InMemoryStore::new();
        let progress: Arc<dyn ProgressRepository> = Arc::new(store.clone());
        let credentials: Arc<dyn CredentialRepository> = Arc::new(store);
        Self {
            progress,
            credentials,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::ExerciseId;

    #[tokio::test]
    async fn progress_round_trips_as_whole_object() {
        let store = InMemoryStore::new();
        assert!(store.load_progress().await.unwrap().is_none());

        let progress = LearnerProgress {
            completed_exercises: vec![ExerciseId::new(1), ExerciseId::new(3)],
            points: 125,
            streak: 2,
            ..LearnerProgress::default()
        };
        store.save_progress(&progress).await.unwrap();

        let raw = store.get(PROGRESS_KEY).await.unwrap().unwrap();
        assert!(raw.contains("\"completedExercises\":[1,3]"));
        assert_eq!(store.load_progress().await.unwrap(), Some(progress));
    }

    #[tokio::test]
    async fn corrupt_progress_is_a_serialization_error() {
        let store = InMemoryStore::new();
        store.put(PROGRESS_KEY, "{not json").await.unwrap();
        let err = store.load_progress().await.unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[tokio::test]
    async fn blank_token_reads_as_missing() {
        let store = InMemoryStore::new();
        store.save_token("   ").await.unwrap();
        assert!(store.load_token().await.unwrap().is_none());

        store.save_token("abc").await.unwrap();
        assert_eq!(store.load_token().await.unwrap().as_deref(), Some("abc"));

        store.clear_token().await.unwrap();
        assert!(store.load_token().await.unwrap().is_none());
    }
}
