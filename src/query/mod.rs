//! Query planning.
//!
//! Converts a user's interest groups into a handful of weighted search
//! configurations for the candidate source. Users without any interest
//! history get the cold-start categories instead.
//!
//! # Usage
//!
//! ```ignore
//! use paper_recommend::interest::aggregate;
//! use paper_recommend::models::default_cold_start;
//! use paper_recommend::query::QueryPlanner;
//!
//! let groups = aggregate(&records);
//! let configs = QueryPlanner::default().plan(&groups, &default_cold_start());
//! ```
//!
//! Query expressions use the arXiv search grammar: `cat:` for the subject
//! category, `ti:` and `abs:` for title and abstract terms.

use crate::interest::InterestGroups;
use crate::models::{CategoryWeight, InterestGroup, SearchConfig};

/// Default number of categories searched for a personalized plan.
pub const DEFAULT_MAX_CATEGORIES: usize = 3;

/// Default number of keywords per category in a query.
pub const DEFAULT_KEYWORDS_PER_CATEGORY: usize = 4;

/// Builds search configurations from interest groups.
#[derive(Debug, Clone)]
pub struct QueryPlanner {
    /// Maximum number of categories in a personalized plan
    pub max_categories: usize,

    /// Maximum number of keywords per category query
    pub keywords_per_category: usize,
}

impl Default for QueryPlanner {
    fn default() -> Self {
        Self {
            max_categories: DEFAULT_MAX_CATEGORIES,
            keywords_per_category: DEFAULT_KEYWORDS_PER_CATEGORY,
        }
    }
}

impl QueryPlanner {
    pub fn new(max_categories: usize, keywords_per_category: usize) -> Self {
        Self {
            max_categories,
            keywords_per_category,
        }
    }

    /// Build the search plan for one ranking call.
    ///
    /// With interest groups, the strongest categories are searched with
    /// their top keywords and weighted by their total score. Ties on score
    /// are broken by category name. Without groups, `cold_start` is used as
    /// given.
    pub fn plan(&self, groups: &InterestGroups, cold_start: &[CategoryWeight]) -> Vec<SearchConfig> {
        if groups.is_empty() {
            return cold_start_plan(cold_start);
        }

        let mut ranked: Vec<&InterestGroup> = groups.values().collect();
        ranked.sort_by(|a, b| {
            b.total_score
                .partial_cmp(&a.total_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.category.cmp(&b.category))
        });

        ranked
            .into_iter()
            .take(self.max_categories)
            .map(|group| {
                let keywords: Vec<&str> = group
                    .keywords
                    .iter()
                    .take(self.keywords_per_category)
                    .map(|k| k.keyword.as_str())
                    .collect();

                SearchConfig {
                    query_expression: build_query_expression(&group.category, &keywords),
                    weight: group.total_score,
                    category: group.category.clone(),
                }
            })
            .collect()
    }
}

/// Search configurations for a user with no interest history.
pub fn cold_start_plan(defaults: &[CategoryWeight]) -> Vec<SearchConfig> {
    defaults
        .iter()
        .map(|default| SearchConfig {
            query_expression: build_query_expression(&default.category, &[]),
            weight: default.weight,
            category: default.category.clone(),
        })
        .collect()
}

/// Build a query restricted to `category` and, if any keywords are given,
/// to papers mentioning one of them in the title or abstract.
///
/// ```ignore
/// assert_eq!(
///     build_query_expression("cs.AI", &["transformer"]),
///     r#"cat:cs.AI AND (ti:"transformer" OR abs:"transformer")"#
/// );
/// ```
pub fn build_query_expression(category: &str, keywords: &[&str]) -> String {
    let mut query = format!("cat:{}", category.trim());

    let terms: Vec<String> = keywords
        .iter()
        .map(|keyword| keyword.replace('"', "").trim().to_string())
        .filter(|keyword| !keyword.is_empty())
        .map(|keyword| format!("ti:\"{0}\" OR abs:\"{0}\"", keyword))
        .collect();

    if !terms.is_empty() {
        query.push_str(&format!(" AND ({})", terms.join(" OR ")));
    }

    query
}
