//! Paper Recommend - interest-weighted recommendations for research papers.
//!
//! This library learns what a user reads from their interactions with
//! papers and recommends new papers from an external catalogue (arXiv).
//!
//! # Architecture
//!
//! - **models**: Core data structures (Paper, InterestRecord, SearchConfig, etc.)
//! - **embedding**: Text embedding providers and cosine similarity
//! - **extraction**: Candidate phrase generation and semantic keyword extraction
//! - **interest**: Aggregation of interest records into category groups
//! - **query**: Search plan construction from interest groups
//! - **provider**: Candidate paper sources (arXiv Atom API)
//! - **ranking**: Concurrent fetching, merging and ranking of candidates
//! - **storage**: Interest and collection persistence (SQLite-based)
//! - **recorder**: Turning user interactions into interest updates
//! - **service**: The request surface tying everything together
//!
//! # Workflow
//!
//! ## Recording
//!
//! 1. A user views, opens or collects a paper
//! 2. Keywords are extracted from the paper's title and summary
//! 3. Each keyword's score in the paper's category grows by the interaction's weight
//!
//! ## Recommending
//!
//! 1. Load the user's interest records and collected papers
//! 2. Group records by category and rank keywords within each group
//! 3. Build one search per top category (or use cold-start categories)
//! 4. Fetch all searches concurrently and merge with positional decay
//! 5. Drop already-collected papers and return the best `limit`
//!
//! # Example
//!
//! ```ignore
//! use paper_recommend::{
//!     embedding::fastembed::FastEmbedProvider,
//!     provider::arxiv::ArxivClient,
//!     service::{RecommendationService, ServiceConfig},
//!     storage::sqlite::SqliteStore,
//! };
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = RecommendationService::new(
//!         FastEmbedProvider::lazy(None, None),
//!         SqliteStore::open("interests.db")?,
//!         ArxivClient::new(None, Duration::from_secs(20))?,
//!         ServiceConfig::default(),
//!     );
//!
//!     for paper in service.get_recommendations("alice", 10).await? {
//!         println!("{}: {}", paper.id, paper.title);
//!     }
//!
//!     Ok(())
//! }
//! ```

// Public modules
pub mod embedding;
pub mod extraction;
pub mod interest;
pub mod models;
pub mod provider;
pub mod query;
pub mod ranking;
pub mod recorder;
pub mod service;
pub mod storage;

// Re-export commonly used types at the crate root
pub use embedding::EmbeddingProvider;
pub use extraction::KeywordExtractor;
pub use models::{Author, InteractionType, InterestRecord, Paper, SearchConfig};
pub use provider::CandidateSource;
pub use service::{RecommendationService, ServiceConfig};
pub use storage::InterestStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
