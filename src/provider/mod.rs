//! Candidate source module.
//!
//! This module defines the interface to the upstream paper-metadata source
//! and includes an arXiv implementation.
//!
//! The ranker only sees the [`CandidateSource`] trait: a black box that
//! answers a structured query (category filter, title/abstract terms,
//! boolean AND/OR) with an ordered list of papers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Paper;

pub mod arxiv;

/// Errors that can occur when fetching papers from a source.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Failed to parse the response body
    #[error("Parse error: {0}")]
    ParseError(String),

    /// API rate limit exceeded
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Network or connection error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Other source-specific errors
    #[error("Provider error: {0}")]
    Other(String),
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Result ordering requested from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    Relevance,
    #[default]
    SubmittedDate,
}

impl SortBy {
    pub fn as_str(self) -> &'static str {
        match self {
            SortBy::Relevance => "relevance",
            SortBy::SubmittedDate => "submittedDate",
        }
    }
}

/// Trait for sources of candidate papers.
///
/// Implementations handle transport, parsing and their own rate limiting.
/// Returned papers keep the source's order, which the ranker uses for rank
/// decay.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Fetch one page of papers matching `query_expression`.
    ///
    /// # Arguments
    /// * `query_expression` - Structured query in the source's grammar
    /// * `sort_by` - Ordering of the results
    /// * `start` - Offset of the first result
    /// * `max_results` - Maximum number of papers to return
    ///
    /// # Errors
    /// Returns `ProviderError` if the source cannot be reached or its
    /// response cannot be parsed
    async fn fetch(
        &self,
        query_expression: &str,
        sort_by: SortBy,
        start: usize,
        max_results: usize,
    ) -> ProviderResult<Vec<Paper>>;

    /// Get a human-readable name of this source, for logging.
    fn name(&self) -> &str;
}

#[async_trait]
impl<S: CandidateSource + ?Sized> CandidateSource for std::sync::Arc<S> {
    async fn fetch(
        &self,
        query_expression: &str,
        sort_by: SortBy,
        start: usize,
        max_results: usize,
    ) -> ProviderResult<Vec<Paper>> {
        (**self).fetch(query_expression, sort_by, start, max_results).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
