//! Record store abstraction and implementations.
//!
//! This module defines the narrow interface the core needs from the
//! persistent record store: reading a user's interest records and collected
//! paper ids, and accumulating interest scores. Any backend offering keyed
//! upserts can implement it.

pub mod sqlite;

use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;

use crate::models::{InterestRecord, Paper};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    ConnectionError(String),

    /// Query execution error
    #[error("Query execution failed: {0}")]
    QueryError(String),

    /// Data serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Schema or migration error
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// Other unexpected errors
    #[error("Unexpected storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for interest record stores.
#[async_trait]
pub trait InterestStore: Send + Sync {
    /// All interest records of a user.
    ///
    /// # Errors
    /// Returns `StorageError` if the records cannot be read
    async fn select_interests(&self, user_id: &str) -> StorageResult<Vec<InterestRecord>>;

    /// Ids of the papers a user has collected.
    ///
    /// # Errors
    /// Returns `StorageError` if the ids cannot be read
    async fn select_collected_ids(&self, user_id: &str) -> StorageResult<HashSet<String>>;

    /// Insert or update the record keyed by `(user_id, category, keyword)`.
    ///
    /// With `accumulate`, an existing record's score is increased by
    /// `record.score`; otherwise it is replaced. `last_updated` is always
    /// taken from `record`.
    ///
    /// # Errors
    /// Returns `StorageError` if the upsert fails
    async fn upsert_interest(&self, record: &InterestRecord, accumulate: bool) -> StorageResult<()>;

    /// Remember that a user collected `paper`. Collecting twice is a no-op.
    ///
    /// # Errors
    /// Returns `StorageError` if the write fails
    async fn insert_collected(&self, user_id: &str, paper: &Paper) -> StorageResult<()>;
}

#[async_trait]
impl<S: InterestStore + ?Sized> InterestStore for std::sync::Arc<S> {
    async fn select_interests(&self, user_id: &str) -> StorageResult<Vec<InterestRecord>> {
        (**self).select_interests(user_id).await
    }

    async fn select_collected_ids(&self, user_id: &str) -> StorageResult<HashSet<String>> {
        (**self).select_collected_ids(user_id).await
    }

    async fn upsert_interest(&self, record: &InterestRecord, accumulate: bool) -> StorageResult<()> {
        (**self).upsert_interest(record, accumulate).await
    }

    async fn insert_collected(&self, user_id: &str, paper: &Paper) -> StorageResult<()> {
        (**self).insert_collected(user_id, paper).await
    }
}
