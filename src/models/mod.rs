//! Core data models for the paper recommendation system.
//!
//! This module contains the data structures shared by the extractor, the
//! interest aggregation and the ranker: candidate papers, interest records,
//! the derived interest groups and the search configurations built from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single author as reported by the candidate source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Author {
    /// Full name of the author
    pub name: String,

    /// Institutional affiliation, when the source reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
}

impl Author {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            affiliation: None,
        }
    }
}

/// A candidate paper as received from the candidate source.
///
/// Papers are immutable once received. The `id` is the source identifier
/// including any version suffix (e.g. `2212.04356v2`); see
/// [`normalize_paper_id`] for the form used in deduplication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Paper {
    /// Source identifier, possibly carrying a version suffix
    pub id: String,

    /// Paper title
    pub title: String,

    /// Authors in source order
    #[serde(default)]
    pub authors: Vec<Author>,

    /// Abstract text
    #[serde(default)]
    pub summary: String,

    /// Primary subject category (e.g. `cs.AI`)
    #[serde(default)]
    pub category: String,

    /// First submission timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,

    /// Link to the PDF
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
}

impl Paper {
    /// A paper is usable for ranking only if it carries an id and a title.
    pub fn is_well_formed(&self) -> bool {
        !self.id.trim().is_empty() && !self.title.trim().is_empty()
    }

    /// The id with any trailing version suffix removed.
    pub fn normalized_id(&self) -> &str {
        normalize_paper_id(&self.id)
    }
}

/// Strip a trailing version suffix (`v` followed by digits) from a paper id.
///
/// `2212.04356v2` becomes `2212.04356`; ids without a suffix are returned
/// unchanged, as is a bare `v` with no digits after it.
pub fn normalize_paper_id(id: &str) -> &str {
    let id = id.trim();
    if let Some(idx) = id.rfind('v') {
        let suffix = &id[idx + 1..];
        if idx > 0 && !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) {
            return &id[..idx];
        }
    }
    id
}

/// A paper together with its transient ranking score.
///
/// The score only lives for the duration of a ranking call and is dropped by
/// [`RankedPaper::into_paper`] before results are returned.
#[derive(Debug, Clone)]
pub struct RankedPaper {
    pub paper: Paper,
    pub score: f64,
}

impl RankedPaper {
    pub fn new(paper: Paper, score: f64) -> Self {
        Self { paper, score }
    }

    pub fn into_paper(self) -> Paper {
        self.paper
    }
}

/// A candidate phrase with its similarity to the document it came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredPhrase {
    pub phrase: String,

    /// Cosine similarity in `[-1, 1]`
    pub similarity: f32,
}

/// Kind of user action that produces an interest signal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    /// The paper card was viewed
    View,

    /// The PDF was opened
    PdfOpen,

    /// The paper was collected into the user's library
    Collect,
}

impl InteractionType {
    /// Score added to each extracted keyword for this interaction.
    pub fn base_score(self) -> f64 {
        match self {
            InteractionType::Collect => 1.0,
            InteractionType::View | InteractionType::PdfOpen => 0.5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InteractionType::View => "view",
            InteractionType::PdfOpen => "pdf_open",
            InteractionType::Collect => "collect",
        }
    }
}

impl std::str::FromStr for InteractionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(InteractionType::View),
            "pdf_open" => Ok(InteractionType::PdfOpen),
            "collect" => Ok(InteractionType::Collect),
            other => Err(format!("unknown interaction type '{}'", other)),
        }
    }
}

/// Persisted interest signal for one user, category and keyword.
///
/// A `keyword` of `None`, or equal to `category`, marks a category-level
/// record that carries no specific keyword.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterestRecord {
    pub user_id: String,
    pub category: String,
    pub keyword: Option<String>,
    pub score: f64,
    pub last_updated: DateTime<Utc>,
}

impl InterestRecord {
    pub fn new(
        user_id: impl Into<String>,
        category: impl Into<String>,
        keyword: Option<String>,
        score: f64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            category: category.into(),
            keyword,
            score,
            last_updated: Utc::now(),
        }
    }

    /// The specific keyword of this record, if it has one.
    pub fn specific_keyword(&self) -> Option<&str> {
        self.keyword
            .as_deref()
            .filter(|keyword| !keyword.is_empty() && *keyword != self.category)
    }
}

/// One keyword inside an [`InterestGroup`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeywordScore {
    pub keyword: String,
    pub score: f64,
}

/// Interest records of one category, aggregated for a single ranking call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InterestGroup {
    pub category: String,

    /// Sum of every record score in the category
    pub total_score: f64,

    /// Keywords sorted by descending score
    pub keywords: Vec<KeywordScore>,
}

/// A weighted query against the candidate source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchConfig {
    pub query_expression: String,
    pub weight: f64,
    pub category: String,
}

/// A cold-start default: a category searched with a fixed weight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryWeight {
    pub category: String,
    pub weight: f64,
}

impl CategoryWeight {
    pub fn new(category: impl Into<String>, weight: f64) -> Self {
        Self {
            category: category.into(),
            weight,
        }
    }
}

/// Default categories used when a user has no interest history.
pub fn default_cold_start() -> Vec<CategoryWeight> {
    vec![
        CategoryWeight::new("cs.AI", 1.0),
        CategoryWeight::new("cs.LG", 0.9),
        CategoryWeight::new("cs.CV", 0.8),
    ]
}
