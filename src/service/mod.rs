//! Recommendation service.
//!
//! The request surface used by the UI layer. It wires the keyword
//! extractor, interest aggregation, query planning, ranking and interaction
//! recording together and applies the degradation policy: extraction falls
//! back to title words, a failed or empty personalized ranking is retried
//! with the cold-start categories, and only an empty result after that is
//! reported as an error.

pub mod config;

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::embedding::EmbeddingProvider;
use crate::extraction::{fallback_keywords, KeywordExtractor};
use crate::interest::{aggregate, InterestGroups};
use crate::models::{InteractionType, Paper, SearchConfig};
use crate::provider::CandidateSource;
use crate::query::{cold_start_plan, QueryPlanner};
use crate::ranking::{Ranker, RankingError};
use crate::recorder::InteractionRecorder;
use crate::storage::{InterestStore, StorageError};

pub use config::ServiceConfig;

/// Errors surfaced by the recommendation service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Nothing could be recommended, even with cold-start defaults
    #[error("No recommendations available for user '{0}'")]
    NoRecommendations(String),

    /// A ranking call exceeded the configured timeout
    #[error("Ranking timed out after {0} seconds")]
    Timeout(u64),

    /// Ranking failed
    #[error("Ranking error: {0}")]
    Ranking(#[from] RankingError),

    /// Reading from the record store failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Response payload for a recommendation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationsResponse {
    pub user_id: String,

    /// Number of papers returned
    pub count: usize,

    /// Papers, best first
    pub papers: Vec<Paper>,
}

impl RecommendationsResponse {
    pub fn new(user_id: impl Into<String>, papers: Vec<Paper>) -> Self {
        Self {
            user_id: user_id.into(),
            count: papers.len(),
            papers,
        }
    }
}

/// Response payload for a keyword extraction request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordsResponse {
    pub keywords: Vec<String>,
}

/// Entry point for recommendations, extraction and interaction tracking.
pub struct RecommendationService<E, S, C> {
    extractor: Arc<KeywordExtractor<E>>,
    store: Arc<S>,
    ranker: Ranker<C>,
    planner: QueryPlanner,
    recorder: Arc<InteractionRecorder<E, Arc<S>>>,
    config: ServiceConfig,
}

impl<E, S, C> RecommendationService<E, S, C>
where
    E: EmbeddingProvider + 'static,
    S: InterestStore + 'static,
    C: CandidateSource,
{
    pub fn new(embedding_provider: E, store: S, source: C, config: ServiceConfig) -> Self {
        let extractor = Arc::new(KeywordExtractor::new(embedding_provider));
        let store = Arc::new(store);
        let recorder = Arc::new(
            InteractionRecorder::new(Arc::clone(&extractor), Arc::clone(&store))
                .with_keyword_limit(config.keyword_limit),
        );
        let ranker = Ranker::new(source).with_results_per_config(config.per_config_results);
        let planner = QueryPlanner::new(config.max_categories, config.keywords_per_category);

        Self {
            extractor,
            store,
            ranker,
            planner,
            recorder,
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Ranked recommendations for a user.
    ///
    /// Unreadable interests degrade to a cold-start plan and unreadable
    /// collection history to an empty seen-set.
    ///
    /// # Errors
    /// Returns `ServiceError::NoRecommendations` if both the personalized
    /// and the cold-start rankings come back empty or fail
    pub async fn get_recommendations(&self, user_id: &str, limit: usize) -> ServiceResult<Vec<Paper>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let (interests, collected) = tokio::join!(
            self.store.select_interests(user_id),
            self.store.select_collected_ids(user_id)
        );

        let records = interests.unwrap_or_else(|e| {
            warn!(user_id, error = %e, "Failed to read interests, using cold start");
            Vec::new()
        });
        let already_seen = collected.unwrap_or_else(|e| {
            warn!(user_id, error = %e, "Failed to read collected papers");
            HashSet::new()
        });

        let groups = aggregate(&records);
        let personalized = !groups.is_empty();
        let configs = self.planner.plan(&groups, &self.config.cold_start);
        info!(
            user_id,
            personalized,
            configs = configs.len(),
            "Ranking recommendations"
        );

        if let Some(papers) = self.try_rank(user_id, &configs, &already_seen, limit).await {
            return Ok(papers);
        }

        if personalized {
            info!(user_id, "Retrying with cold-start categories");
            let fallback = cold_start_plan(&self.config.cold_start);
            if let Some(papers) = self.try_rank(user_id, &fallback, &already_seen, limit).await {
                return Ok(papers);
            }
        }

        Err(ServiceError::NoRecommendations(user_id.to_string()))
    }

    /// Run one bounded ranking call; `None` if it failed or found nothing.
    async fn try_rank(
        &self,
        user_id: &str,
        configs: &[SearchConfig],
        already_seen: &HashSet<String>,
        limit: usize,
    ) -> Option<Vec<Paper>> {
        match self.rank_with_timeout(configs, already_seen, limit).await {
            Ok(papers) if !papers.is_empty() => Some(papers),
            Ok(_) => {
                info!(user_id, "Ranking returned no papers");
                None
            }
            Err(e) => {
                warn!(user_id, error = %e, "Ranking failed");
                None
            }
        }
    }

    async fn rank_with_timeout(
        &self,
        configs: &[SearchConfig],
        already_seen: &HashSet<String>,
        limit: usize,
    ) -> ServiceResult<Vec<Paper>> {
        let timeout = self.config.ranking_timeout();
        match tokio::time::timeout(timeout, self.ranker.rank(configs, already_seen, limit)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ServiceError::Timeout(timeout.as_secs())),
        }
    }

    /// Keywords for a paper; falls back to title words if the embedding
    /// service is unavailable.
    pub async fn extract_keywords(&self, title: &str, summary: &str, limit: usize) -> Vec<String> {
        match self.extractor.extract_keywords(title, summary, limit).await {
            Ok(keywords) => keywords,
            Err(e) => {
                warn!(error = %e, "Keyword extraction failed, using title words");
                fallback_keywords(title, limit)
            }
        }
    }

    /// Track a user action on a paper in the background.
    ///
    /// Returns at once; the handle can be awaited by callers that need the
    /// update to land (such as a short-lived CLI process).
    pub fn record_interaction(
        &self,
        user_id: &str,
        paper: Paper,
        interaction: InteractionType,
    ) -> JoinHandle<()> {
        self.recorder
            .record_detached(user_id.to_string(), paper, interaction)
    }

    /// The user's current interest groups.
    ///
    /// # Errors
    /// Returns `ServiceError::Storage` if the interests cannot be read
    pub async fn interests(&self, user_id: &str) -> ServiceResult<InterestGroups> {
        let records = self.store.select_interests(user_id).await?;
        Ok(aggregate(&records))
    }
}

impl<E, S, C> std::fmt::Debug for RecommendationService<E, S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecommendationService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
