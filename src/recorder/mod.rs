//! Interaction recording.
//!
//! Turns a user action on a paper into interest signals: keywords are
//! extracted from the paper and each one's score in the paper's category is
//! increased by the interaction's base score. Recording is a side effect of
//! the user action and must never fail it, so [`InteractionRecorder::record_detached`]
//! runs it as a background task whose failures only reach the logs.

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::embedding::EmbeddingProvider;
use crate::extraction::{fallback_keywords, KeywordExtractor, DEFAULT_KEYWORD_LIMIT};
use crate::models::{InteractionType, InterestRecord, Paper};
use crate::storage::{InterestStore, StorageError};

/// Errors that can occur while recording an interaction.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The paper cannot be attributed to a category
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Every interest upsert failed
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
}

/// Result type for recording operations.
pub type RecordResult<T> = Result<T, RecordError>;

/// What a single recording did.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RecordOutcome {
    /// Keywords the interaction was attributed to
    pub keywords: Vec<String>,

    /// Number of successful interest upserts
    pub upserted: usize,

    /// Number of failed interest upserts
    pub failed: usize,

    /// Whether keywords came from the title heuristic
    pub used_fallback: bool,
}

/// Records user interactions as accumulated interest scores.
pub struct InteractionRecorder<E, S> {
    extractor: Arc<KeywordExtractor<E>>,
    store: S,
    keyword_limit: usize,
}

impl<E, S> InteractionRecorder<E, S>
where
    E: EmbeddingProvider + 'static,
    S: InterestStore + 'static,
{
    pub fn new(extractor: Arc<KeywordExtractor<E>>, store: S) -> Self {
        Self {
            extractor,
            store,
            keyword_limit: DEFAULT_KEYWORD_LIMIT,
        }
    }

    pub fn with_keyword_limit(mut self, keyword_limit: usize) -> Self {
        self.keyword_limit = keyword_limit;
        self
    }

    /// Record one interaction and wait for it to finish.
    ///
    /// Extraction failures fall back to title keywords. Individual upsert
    /// failures are logged and counted in the outcome. A `Collect` also
    /// marks the paper as collected.
    ///
    /// # Errors
    /// Returns `RecordError::InvalidInput` if the paper has no category, or
    /// `RecordError::StorageError` if no upsert succeeded
    pub async fn record(
        &self,
        user_id: &str,
        paper: &Paper,
        interaction: InteractionType,
    ) -> RecordResult<RecordOutcome> {
        let category = paper.category.trim();
        if category.is_empty() {
            return Err(RecordError::InvalidInput(format!(
                "paper '{}' has no category",
                paper.id
            )));
        }

        let mut outcome = RecordOutcome::default();

        if interaction == InteractionType::Collect {
            if let Err(e) = self.store.insert_collected(user_id, paper).await {
                warn!(user_id, paper_id = %paper.id, error = %e, "Failed to store collected paper");
            }
        }

        outcome.keywords = match self
            .extractor
            .extract_keywords(&paper.title, &paper.summary, self.keyword_limit)
            .await
        {
            Ok(keywords) => keywords,
            Err(e) => {
                warn!(paper_id = %paper.id, error = %e, "Keyword extraction failed, using title words");
                outcome.used_fallback = true;
                fallback_keywords(&paper.title, self.keyword_limit)
            }
        };

        let base_score = interaction.base_score();
        let mut last_error = None;
        for keyword in &outcome.keywords {
            let record = InterestRecord::new(user_id, category, Some(keyword.clone()), base_score);
            match self.store.upsert_interest(&record, true).await {
                Ok(()) => outcome.upserted += 1,
                Err(e) => {
                    warn!(user_id, category, keyword = %keyword, error = %e, "Interest upsert failed");
                    outcome.failed += 1;
                    last_error = Some(e);
                }
            }
        }

        if outcome.upserted == 0 {
            if let Some(e) = last_error {
                return Err(RecordError::StorageError(e));
            }
        }

        debug!(
            user_id,
            category,
            interaction = interaction.as_str(),
            upserted = outcome.upserted,
            "Recorded interaction"
        );
        Ok(outcome)
    }

    /// Record an interaction on a background task.
    ///
    /// Returns immediately. The handle may be awaited or dropped; failures
    /// are logged either way and never reach the caller.
    pub fn record_detached(
        self: &Arc<Self>,
        user_id: String,
        paper: Paper,
        interaction: InteractionType,
    ) -> JoinHandle<()> {
        let recorder = Arc::clone(self);
        tokio::spawn(async move {
            match recorder.record(&user_id, &paper, interaction).await {
                Ok(outcome) => info!(
                    user_id = %user_id,
                    paper_id = %paper.id,
                    keywords = outcome.keywords.len(),
                    failed = outcome.failed,
                    "Interest update finished"
                ),
                Err(e) => error!(
                    user_id = %user_id,
                    paper_id = %paper.id,
                    error = %e,
                    "Interest update failed"
                ),
            }
        })
    }
}

impl<E, S> std::fmt::Debug for InteractionRecorder<E, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionRecorder")
            .field("keyword_limit", &self.keyword_limit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingError, EmbeddingResult};
    use crate::storage::sqlite::SqliteStore;
    use crate::storage::StorageResult;
    use async_trait::async_trait;
    use std::collections::HashSet;

    /// Embeds every text as the same vector, so keyword order follows
    /// candidate generation order.
    struct UniformProvider {
        fail: bool,
    }

    #[async_trait]
    impl EmbeddingProvider for UniformProvider {
        async fn embed(&self, _text: &str) -> EmbeddingResult<Vec<f32>> {
            if self.fail {
                return Err(EmbeddingError::ConfigError("model not loaded".to_string()));
            }
            Ok(vec![1.0, 1.0])
        }

        async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 1.0]).collect())
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "uniform"
        }
    }

    /// Store whose writes always fail.
    struct BrokenStore;

    #[async_trait]
    impl InterestStore for BrokenStore {
        async fn select_interests(&self, _user_id: &str) -> StorageResult<Vec<InterestRecord>> {
            Err(StorageError::ConnectionError("down".to_string()))
        }

        async fn select_collected_ids(&self, _user_id: &str) -> StorageResult<HashSet<String>> {
            Err(StorageError::ConnectionError("down".to_string()))
        }

        async fn upsert_interest(&self, _record: &InterestRecord, _accumulate: bool) -> StorageResult<()> {
            Err(StorageError::QueryError("read-only".to_string()))
        }

        async fn insert_collected(&self, _user_id: &str, _paper: &Paper) -> StorageResult<()> {
            Err(StorageError::QueryError("read-only".to_string()))
        }
    }

    fn paper(category: &str) -> Paper {
        Paper {
            id: "2401.00001v1".to_string(),
            title: "Diffusion Transformers".to_string(),
            authors: vec![],
            summary: "Scalable diffusion".to_string(),
            category: category.to_string(),
            published_at: None,
            pdf_url: None,
        }
    }

    fn recorder<S: InterestStore + 'static>(fail: bool, store: S) -> InteractionRecorder<UniformProvider, S> {
        let extractor = Arc::new(KeywordExtractor::new(UniformProvider { fail }));
        InteractionRecorder::new(extractor, store).with_keyword_limit(2)
    }

    fn score_of(records: &[InterestRecord], keyword: &str) -> f64 {
        records
            .iter()
            .find(|r| r.keyword.as_deref() == Some(keyword))
            .map(|r| r.score)
            .unwrap_or(0.0)
    }

    #[tokio::test]
    async fn test_scores_accumulate_across_interactions() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let recorder = recorder(false, Arc::clone(&store));

        let first = recorder.record("u1", &paper("cs.CV"), InteractionType::View).await.unwrap();
        assert_eq!(first.keywords, vec!["diffusion", "transformers"]);
        assert_eq!(first.upserted, 2);
        assert!(!first.used_fallback);

        recorder.record("u1", &paper("cs.CV"), InteractionType::Collect).await.unwrap();

        let records = store.select_interests("u1").await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(score_of(&records, "diffusion"), 1.5);
        assert_eq!(score_of(&records, "transformers"), 1.5);
        assert!(records.iter().all(|r| r.category == "cs.CV"));
    }

    #[tokio::test]
    async fn test_collect_marks_paper_collected() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let recorder = recorder(false, Arc::clone(&store));

        recorder.record("u1", &paper("cs.CV"), InteractionType::PdfOpen).await.unwrap();
        assert!(store.select_collected_ids("u1").await.unwrap().is_empty());

        recorder.record("u1", &paper("cs.CV"), InteractionType::Collect).await.unwrap();
        let ids = store.select_collected_ids("u1").await.unwrap();
        assert!(ids.contains("2401.00001"));
    }

    #[tokio::test]
    async fn test_extraction_failure_uses_title_words() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let recorder = recorder(true, Arc::clone(&store));

        let outcome = recorder.record("u1", &paper("cs.CV"), InteractionType::Collect).await.unwrap();
        assert!(outcome.used_fallback);
        assert_eq!(outcome.keywords, vec!["transformers", "diffusion"]);

        let records = store.select_interests("u1").await.unwrap();
        assert_eq!(score_of(&records, "transformers"), 1.0);
    }

    #[tokio::test]
    async fn test_missing_category_rejected() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let recorder = recorder(false, Arc::clone(&store));

        let result = recorder.record("u1", &paper("  "), InteractionType::View).await;
        assert!(matches!(result, Err(RecordError::InvalidInput(_))));
        assert!(store.select_interests("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_storage_failure_reported() {
        let recorder = recorder(false, BrokenStore);
        let result = recorder.record("u1", &paper("cs.CV"), InteractionType::Collect).await;
        assert!(matches!(result, Err(RecordError::StorageError(_))));
    }

    #[tokio::test]
    async fn test_detached_failure_is_swallowed() {
        let recorder = Arc::new(recorder(false, BrokenStore));
        let handle = recorder.record_detached("u1".to_string(), paper("cs.CV"), InteractionType::View);
        assert!(handle.await.is_ok());
    }

    #[tokio::test]
    async fn test_detached_records() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let recorder = Arc::new(recorder(false, Arc::clone(&store)));

        recorder
            .record_detached("u1".to_string(), paper("cs.LG"), InteractionType::Collect)
            .await
            .unwrap();

        let records = store.select_interests("u1").await.unwrap();
        assert_eq!(records.len(), 2);
    }
}
