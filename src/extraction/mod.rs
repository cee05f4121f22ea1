//! Semantic keyword extraction.
//!
//! Candidate phrases are generated from a paper's title and abstract, each
//! candidate is embedded, and candidates are ranked by cosine similarity to
//! the embedding of the whole document. A greedy pass then drops phrases
//! that overlap an already selected one, so "neural network" and "network"
//! are never returned together.
//!
//! # Usage
//!
//! ```ignore
//! use paper_recommend::embedding::fastembed::FastEmbedProvider;
//! use paper_recommend::extraction::KeywordExtractor;
//!
//! let extractor = KeywordExtractor::new(FastEmbedProvider::lazy(None, None));
//! let keywords = extractor
//!     .extract_keywords("Deep Learning for X", "We propose a neural network method for X", 8)
//!     .await?;
//! ```

pub mod candidates;

use indexmap::IndexSet;
use thiserror::Error;
use tracing::debug;

use crate::embedding::{cosine_similarity, EmbeddingError, EmbeddingProvider};
use crate::models::ScoredPhrase;

pub use candidates::{generate_candidates, tokenize};

/// Default number of keywords returned per paper.
pub const DEFAULT_KEYWORD_LIMIT: usize = 8;

/// Errors that can occur during keyword extraction.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The embedding service could not be reached or initialized
    #[error("Embedding service unavailable: {0}")]
    Unavailable(#[from] EmbeddingError),

    /// The embedding service answered with an unusable response
    #[error("Malformed embedding response: {0}")]
    MalformedResponse(String),
}

/// Result type for extraction operations.
pub type ExtractionResult<T> = Result<T, ExtractionError>;

/// Keyword extractor backed by an embedding provider.
#[derive(Debug)]
pub struct KeywordExtractor<E> {
    embedding_provider: E,
}

impl<E: EmbeddingProvider> KeywordExtractor<E> {
    pub fn new(embedding_provider: E) -> Self {
        Self { embedding_provider }
    }

    pub fn embedding_provider(&self) -> &E {
        &self.embedding_provider
    }

    /// Extract up to `limit` representative phrases from a paper.
    ///
    /// Returns an empty list, without calling the embedding service, when
    /// the text contains no usable candidate.
    ///
    /// # Errors
    /// Returns `ExtractionError` if the embedding service fails
    pub async fn extract_keywords(
        &self,
        title: &str,
        summary: &str,
        limit: usize,
    ) -> ExtractionResult<Vec<String>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let scored = self.score_candidates(title, summary).await?;
        let keywords = select_non_overlapping(&scored, limit);

        debug!(
            candidates = scored.len(),
            selected = keywords.len(),
            "Extracted keywords"
        );
        Ok(keywords)
    }

    /// Score every candidate phrase of a paper against the paper itself.
    ///
    /// # Returns
    /// Scored phrases sorted by descending similarity. Equal similarities
    /// keep candidate generation order.
    ///
    /// # Errors
    /// Returns `ExtractionError` if the embedding service fails or returns
    /// a different number of vectors than requested
    pub async fn score_candidates(
        &self,
        title: &str,
        summary: &str,
    ) -> ExtractionResult<Vec<ScoredPhrase>> {
        let document = document_text(title, summary);
        let candidates: IndexSet<String> = generate_candidates(&document);
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let document_embedding = self.embedding_provider.embed(&document).await?;

        let candidate_refs: Vec<&str> = candidates.iter().map(String::as_str).collect();
        let candidate_embeddings = self.embedding_provider.embed_batch(&candidate_refs).await?;

        if candidate_embeddings.len() != candidates.len() {
            return Err(ExtractionError::MalformedResponse(format!(
                "requested {} embeddings but received {}",
                candidates.len(),
                candidate_embeddings.len()
            )));
        }

        let mut scored: Vec<ScoredPhrase> = candidates
            .into_iter()
            .zip(candidate_embeddings.iter())
            .map(|(phrase, embedding)| ScoredPhrase {
                similarity: cosine_similarity(embedding, &document_embedding),
                phrase,
            })
            .collect();

        // sort_by is stable, so ties keep generation order
        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(scored)
    }
}

/// The text that represents a paper for extraction.
pub fn document_text(title: &str, summary: &str) -> String {
    format!("{}. {}", title.trim(), summary.trim())
}

/// Greedily take phrases in order, skipping any phrase that is a substring
/// of, or contains, a phrase already taken.
pub fn select_non_overlapping(scored: &[ScoredPhrase], limit: usize) -> Vec<String> {
    let mut selected: Vec<String> = Vec::with_capacity(limit.min(scored.len()));

    for candidate in scored {
        if selected.len() >= limit {
            break;
        }
        let overlaps = selected
            .iter()
            .any(|kept| kept.contains(&candidate.phrase) || candidate.phrase.contains(kept.as_str()));
        if !overlaps {
            selected.push(candidate.phrase.clone());
        }
    }

    selected
}

/// Keywords used when the embedding service is unavailable.
///
/// Takes the title's tokens, drops stop-words of both kinds and returns the
/// longest ones first. Words of equal length keep their title order.
pub fn fallback_keywords(title: &str, limit: usize) -> Vec<String> {
    let mut words: Vec<String> = tokenize(title)
        .into_iter()
        .filter(|token| {
            !candidates::is_basic_stop_word(token) && !candidates::is_domain_stop_word(token)
        })
        .collect::<IndexSet<String>>()
        .into_iter()
        .collect();

    words.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
    words.truncate(limit);
    words
}
