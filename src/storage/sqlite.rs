//! SQLite storage implementation.
//!
//! This module provides a SQLite-based implementation of the
//! `InterestStore` trait using rusqlite. Database calls are blocking, so
//! each one runs on tokio's blocking thread pool.
//!
//! # Schema
//! - `user_interests`: one row per `(user_id, interest_category,
//!   interest_keyword)`. Category-level records store an empty keyword.
//! - `collected_articles`: one row per `(user_id, arxiv_id)`, with the id
//!   stored without its version suffix.

use super::{InterestStore, StorageError, StorageResult};
use crate::models::{InterestRecord, Paper};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS user_interests (
    user_id           TEXT NOT NULL,
    interest_category TEXT NOT NULL,
    interest_keyword  TEXT NOT NULL DEFAULT '',
    score             REAL NOT NULL,
    last_updated      TEXT NOT NULL,
    PRIMARY KEY (user_id, interest_category, interest_keyword)
);
CREATE TABLE IF NOT EXISTS collected_articles (
    user_id      TEXT NOT NULL,
    arxiv_id     TEXT NOT NULL,
    title        TEXT NOT NULL,
    category     TEXT NOT NULL,
    collected_at TEXT NOT NULL,
    PRIMARY KEY (user_id, arxiv_id)
);
";

const UPSERT_ACCUMULATE: &str = "
INSERT INTO user_interests (user_id, interest_category, interest_keyword, score, last_updated)
VALUES (?1, ?2, ?3, ?4, ?5)
ON CONFLICT (user_id, interest_category, interest_keyword) DO UPDATE SET
    score = user_interests.score + excluded.score,
    last_updated = excluded.last_updated
";

const UPSERT_REPLACE: &str = "
INSERT INTO user_interests (user_id, interest_category, interest_keyword, score, last_updated)
VALUES (?1, ?2, ?3, ?4, ?5)
ON CONFLICT (user_id, interest_category, interest_keyword) DO UPDATE SET
    score = excluded.score,
    last_updated = excluded.last_updated
";

/// SQLite-backed interest store.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and ensure the schema exists.
    ///
    /// # Errors
    /// Returns `StorageError` if the file cannot be opened or the schema
    /// cannot be created
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let conn = Connection::open(path.as_ref()).map_err(|e| {
            StorageError::ConnectionError(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_connection(conn)
    }

    /// A private in-memory database, mainly for tests.
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::ConnectionError(e.to_string()))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| StorageError::SchemaError(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking thread pool.
    async fn with_conn<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> StorageResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| StorageError::ConnectionError("connection mutex poisoned".to_string()))?;
            f(&conn)
        })
        .await
        .map_err(|e| StorageError::Other(format!("storage task failed: {}", e)))?
    }
}

fn query_error(e: rusqlite::Error) -> StorageError {
    StorageError::QueryError(e.to_string())
}

fn parse_timestamp(value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::SerializationError(format!("bad timestamp '{}': {}", value, e)))
}

#[async_trait]
impl InterestStore for SqliteStore {
    async fn select_interests(&self, user_id: &str) -> StorageResult<Vec<InterestRecord>> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT interest_category, interest_keyword, score, last_updated
                     FROM user_interests WHERE user_id = ?1 ORDER BY score DESC",
                )
                .map_err(query_error)?;

            let rows = stmt
                .query_map(params![user_id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })
                .map_err(query_error)?;

            let mut records = Vec::new();
            for row in rows {
                let (category, keyword, score, last_updated) = row.map_err(query_error)?;
                records.push(InterestRecord {
                    user_id: user_id.clone(),
                    category,
                    keyword: if keyword.is_empty() { None } else { Some(keyword) },
                    score,
                    last_updated: parse_timestamp(&last_updated)?,
                });
            }
            Ok(records)
        })
        .await
    }

    async fn select_collected_ids(&self, user_id: &str) -> StorageResult<HashSet<String>> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare("SELECT arxiv_id FROM collected_articles WHERE user_id = ?1")
                .map_err(query_error)?;
            let ids = stmt
                .query_map(params![user_id], |row| row.get::<_, String>(0))
                .map_err(query_error)?
                .collect::<Result<HashSet<_>, _>>()
                .map_err(query_error)?;
            Ok(ids)
        })
        .await
    }

    async fn upsert_interest(&self, record: &InterestRecord, accumulate: bool) -> StorageResult<()> {
        if !record.score.is_finite() || record.score < 0.0 {
            return Err(StorageError::SerializationError(format!(
                "interest score must be a non-negative number, got {}",
                record.score
            )));
        }

        let record = record.clone();
        self.with_conn(move |conn| {
            let sql = if accumulate { UPSERT_ACCUMULATE } else { UPSERT_REPLACE };
            conn.execute(
                sql,
                params![
                    record.user_id,
                    record.category,
                    record.keyword.clone().unwrap_or_default(),
                    record.score,
                    record.last_updated.to_rfc3339(),
                ],
            )
            .map_err(query_error)?;
            Ok(())
        })
        .await
    }

    async fn insert_collected(&self, user_id: &str, paper: &Paper) -> StorageResult<()> {
        let user_id = user_id.to_string();
        let arxiv_id = paper.normalized_id().to_string();
        let title = paper.title.clone();
        let category = paper.category.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO collected_articles (user_id, arxiv_id, title, category, collected_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (user_id, arxiv_id) DO NOTHING",
                params![user_id, arxiv_id, title, category, Utc::now().to_rfc3339()],
            )
            .map_err(query_error)?;
            Ok(())
        })
        .await
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper(id: &str) -> Paper {
        Paper {
            id: id.to_string(),
            title: "A Paper".to_string(),
            authors: vec![],
            summary: String::new(),
            category: "cs.AI".to_string(),
            published_at: None,
            pdf_url: None,
        }
    }

    #[tokio::test]
    async fn test_accumulating_upsert_adds_scores() {
        let store = SqliteStore::open_in_memory().unwrap();
        let first = InterestRecord::new("u1", "cs.AI", Some("transformer".into()), 0.5);
        let second = InterestRecord::new("u1", "cs.AI", Some("transformer".into()), 1.0);

        store.upsert_interest(&first, true).await.unwrap();
        store.upsert_interest(&second, true).await.unwrap();

        let records = store.select_interests("u1").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].score, 1.5);
        assert_eq!(records[0].keyword.as_deref(), Some("transformer"));
        assert_eq!(records[0].last_updated.timestamp(), second.last_updated.timestamp());
    }

    #[tokio::test]
    async fn test_replacing_upsert_overwrites() {
        let store = SqliteStore::open_in_memory().unwrap();
        let record = InterestRecord::new("u1", "cs.AI", Some("agents".into()), 2.0);
        store.upsert_interest(&record, true).await.unwrap();

        let replacement = InterestRecord::new("u1", "cs.AI", Some("agents".into()), 0.5);
        store.upsert_interest(&replacement, false).await.unwrap();

        let records = store.select_interests("u1").await.unwrap();
        assert_eq!(records[0].score, 0.5);
    }

    #[tokio::test]
    async fn test_keys_are_separate() {
        let store = SqliteStore::open_in_memory().unwrap();
        for record in [
            InterestRecord::new("u1", "cs.AI", Some("agents".into()), 1.0),
            InterestRecord::new("u1", "cs.LG", Some("agents".into()), 1.0),
            InterestRecord::new("u1", "cs.AI", None, 1.0),
            InterestRecord::new("u2", "cs.AI", Some("agents".into()), 1.0),
        ] {
            store.upsert_interest(&record, true).await.unwrap();
        }

        let records = store.select_interests("u1").await.unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().any(|r| r.category == "cs.AI" && r.keyword.is_none()));
        assert_eq!(store.select_interests("u2").await.unwrap().len(), 1);
        assert!(store.select_interests("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_negative_score_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        let record = InterestRecord::new("u1", "cs.AI", Some("agents".into()), -1.0);
        assert!(matches!(
            store.upsert_interest(&record, true).await,
            Err(StorageError::SerializationError(_))
        ));
    }

    #[tokio::test]
    async fn test_collected_ids_are_normalized_and_unique() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_collected("u1", &paper("2212.04356v2")).await.unwrap();
        store.insert_collected("u1", &paper("2212.04356v3")).await.unwrap();
        store.insert_collected("u1", &paper("2301.00001")).await.unwrap();

        let ids = store.select_collected_ids("u1").await.unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("2212.04356"));
        assert!(ids.contains("2301.00001"));
        assert!(store.select_collected_ids("u2").await.unwrap().is_empty());
    }

    #[test]
    fn test_open_file_database() {
        let path = std::env::temp_dir().join(format!("paper-recommend-{}.db", std::process::id()));
        let store = SqliteStore::open(&path);
        assert!(store.is_ok());
        drop(store);
        let _ = std::fs::remove_file(&path);
    }
}
