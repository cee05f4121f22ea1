//! Recommendation ranking.
//!
//! Executes a search plan against the candidate source and merges the
//! per-query result lists into one ranked list:
//!
//! 1. Every search configuration is fetched concurrently.
//! 2. A paper at position `i` of its list scores `weight / (i + 1)`.
//! 3. Lists are merged in plan order; the first occurrence of a paper (by
//!    id without version suffix) wins, even if a later one scores higher.
//! 4. Papers the user has already seen are removed.
//! 5. The pool is sorted by score and truncated.

use std::collections::HashSet;

use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{Paper, RankedPaper, SearchConfig};
use crate::provider::{CandidateSource, ProviderError, SortBy};

/// Default number of papers fetched per search configuration.
pub const DEFAULT_RESULTS_PER_CONFIG: usize = 8;

/// Errors that can occur during ranking.
#[derive(Debug, Error)]
pub enum RankingError {
    /// Every fetch of the plan failed
    #[error("All {attempted} candidate fetches failed; last error: {last}")]
    AllFetchesFailed {
        attempted: usize,
        last: ProviderError,
    },
}

/// Result type for ranking operations.
pub type RankingResult<T> = Result<T, RankingError>;

/// Positional discount for the paper at `position` in its source list.
pub fn rank_decay(position: usize) -> f64 {
    1.0 / (position as f64 + 1.0)
}

/// Ranks candidate papers fetched from a [`CandidateSource`].
#[derive(Debug)]
pub struct Ranker<S> {
    source: S,
    results_per_config: usize,
    sort_by: SortBy,
}

impl<S: CandidateSource> Ranker<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            results_per_config: DEFAULT_RESULTS_PER_CONFIG,
            sort_by: SortBy::SubmittedDate,
        }
    }

    pub fn with_results_per_config(mut self, results_per_config: usize) -> Self {
        self.results_per_config = results_per_config;
        self
    }

    pub fn with_sort_by(mut self, sort_by: SortBy) -> Self {
        self.sort_by = sort_by;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetch, merge and rank the candidates of `configs`.
    ///
    /// A failing fetch only removes that configuration's contribution.
    /// Dropping the returned future abandons every in-flight fetch.
    ///
    /// # Returns
    /// At most `limit` papers, best first
    ///
    /// # Errors
    /// Returns `RankingError::AllFetchesFailed` if no fetch succeeded
    pub async fn rank(
        &self,
        configs: &[SearchConfig],
        already_seen: &HashSet<String>,
        limit: usize,
    ) -> RankingResult<Vec<Paper>> {
        if configs.is_empty() {
            return Ok(Vec::new());
        }

        // join_all yields results in config order regardless of completion order
        let fetches = configs.iter().map(|config| {
            self.source
                .fetch(&config.query_expression, self.sort_by, 0, self.results_per_config)
        });
        let results = join_all(fetches).await;

        let mut lists: Vec<(&SearchConfig, Vec<Paper>)> = Vec::with_capacity(configs.len());
        let mut last_error = None;
        for (config, result) in configs.iter().zip(results) {
            match result {
                Ok(papers) => {
                    debug!(
                        category = %config.category,
                        fetched = papers.len(),
                        "Fetched candidates"
                    );
                    lists.push((config, papers));
                }
                Err(e) => {
                    warn!(
                        category = %config.category,
                        query = %config.query_expression,
                        source = self.source.name(),
                        error = %e,
                        "Candidate fetch failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        if lists.is_empty() {
            if let Some(last) = last_error {
                return Err(RankingError::AllFetchesFailed {
                    attempted: configs.len(),
                    last,
                });
            }
        }

        let pool = merge_candidates(lists);
        Ok(finalize(pool, already_seen, limit))
    }
}

/// Merge per-configuration result lists into one scored pool.
///
/// Lists are visited in the given order and papers within a list by
/// position. Malformed papers are dropped; a paper whose normalized id was
/// already seen is dropped regardless of its score.
pub fn merge_candidates<'a, I>(lists: I) -> Vec<RankedPaper>
where
    I: IntoIterator<Item = (&'a SearchConfig, Vec<Paper>)>,
{
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut pool = Vec::new();

    for (config, papers) in lists {
        for (position, paper) in papers.into_iter().enumerate() {
            if !paper.is_well_formed() {
                debug!(id = %paper.id, "Dropping malformed candidate");
                continue;
            }
            if !seen_ids.insert(paper.normalized_id().to_string()) {
                continue;
            }
            let score = config.weight * rank_decay(position);
            pool.push(RankedPaper::new(paper, score));
        }
    }

    pool
}

/// Remove already-seen papers, sort by score and keep the best `limit`.
pub fn finalize(pool: Vec<RankedPaper>, already_seen: &HashSet<String>, limit: usize) -> Vec<Paper> {
    let mut pool: Vec<RankedPaper> = pool
        .into_iter()
        .filter(|ranked| {
            !already_seen.contains(ranked.paper.normalized_id())
                && !already_seen.contains(ranked.paper.id.as_str())
        })
        .collect();

    // stable: equal scores keep merge order
    pool.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    pool.truncate(limit);

    pool.into_iter().map(RankedPaper::into_paper).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Author;
    use crate::provider::ProviderResult;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Source answering each query from a fixed table.
    struct MockSource {
        responses: HashMap<String, Vec<Paper>>,
        failing: HashSet<String>,
        delays: HashMap<String, u64>,
        calls: Mutex<Vec<(String, usize)>>,
    }

    impl MockSource {
        fn new() -> Self {
            Self {
                responses: HashMap::new(),
                failing: HashSet::new(),
                delays: HashMap::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn respond(mut self, query: &str, papers: Vec<Paper>) -> Self {
            self.responses.insert(query.to_string(), papers);
            self
        }

        fn fail(mut self, query: &str) -> Self {
            self.failing.insert(query.to_string());
            self
        }

        fn delay(mut self, query: &str, millis: u64) -> Self {
            self.delays.insert(query.to_string(), millis);
            self
        }
    }

    #[async_trait]
    impl CandidateSource for MockSource {
        async fn fetch(
            &self,
            query_expression: &str,
            _sort_by: SortBy,
            _start: usize,
            max_results: usize,
        ) -> ProviderResult<Vec<Paper>> {
            self.calls
                .lock()
                .unwrap()
                .push((query_expression.to_string(), max_results));
            if let Some(millis) = self.delays.get(query_expression) {
                tokio::time::sleep(Duration::from_millis(*millis)).await;
            }
            if self.failing.contains(query_expression) {
                return Err(ProviderError::NetworkError("mock outage".to_string()));
            }
            Ok(self
                .responses
                .get(query_expression)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .take(max_results)
                .collect())
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    fn paper(id: &str, title: &str) -> Paper {
        Paper {
            id: id.to_string(),
            title: title.to_string(),
            authors: vec![Author::new("Test Author")],
            summary: "Test summary".to_string(),
            category: "cs.AI".to_string(),
            published_at: None,
            pdf_url: None,
        }
    }

    fn config(query: &str, weight: f64) -> SearchConfig {
        SearchConfig {
            query_expression: query.to_string(),
            weight,
            category: query.trim_start_matches("cat:").to_string(),
        }
    }

    fn ids(papers: &[Paper]) -> Vec<&str> {
        papers.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_rank_decay() {
        assert_eq!(rank_decay(0), 1.0);
        assert_eq!(rank_decay(1), 0.5);
        assert!((rank_decay(2) - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_merge_first_seen_wins() {
        let a = config("cat:A", 1.0);
        let b = config("cat:B", 10.0);
        let pool = merge_candidates(vec![
            (&a, vec![paper("p1v1", "From A"), paper("p2v1", "P2 from A")]),
            (&b, vec![paper("p2v2", "P2 from B"), paper("p3v1", "From B")]),
        ]);

        assert_eq!(pool.len(), 3);
        let p2 = pool.iter().find(|r| r.paper.normalized_id() == "p2").unwrap();
        assert_eq!(p2.paper.title, "P2 from A");
        assert_eq!(p2.score, 0.5);
        let p3 = pool.iter().find(|r| r.paper.id == "p3v1").unwrap();
        assert_eq!(p3.score, 5.0);
    }

    #[test]
    fn test_merge_drops_malformed() {
        let a = config("cat:A", 1.0);
        let pool = merge_candidates(vec![(
            &a,
            vec![paper("", "No id"), paper("p1", ""), paper("p2", "Fine")],
        )]);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].paper.id, "p2");
        // decay follows the original position
        assert!((pool[0].score - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_finalize_excludes_seen_and_truncates() {
        let pool = vec![
            RankedPaper::new(paper("p1v1", "one"), 3.0),
            RankedPaper::new(paper("p2v4", "two"), 2.0),
            RankedPaper::new(paper("p3", "three"), 1.0),
            RankedPaper::new(paper("p4", "four"), 4.0),
        ];
        let seen: HashSet<String> = ["p2".to_string(), "p1v1".to_string()].into_iter().collect();

        let ranked = finalize(pool, &seen, 10);
        assert_eq!(ids(&ranked), vec!["p4", "p3"]);

        let pool = vec![
            RankedPaper::new(paper("p1", "one"), 1.0),
            RankedPaper::new(paper("p2", "two"), 2.0),
            RankedPaper::new(paper("p3", "three"), 3.0),
        ];
        assert_eq!(ids(&finalize(pool, &HashSet::new(), 2)), vec!["p3", "p2"]);
    }

    #[test]
    fn test_finalize_ties_keep_merge_order() {
        let pool = vec![
            RankedPaper::new(paper("first", "one"), 1.0),
            RankedPaper::new(paper("second", "two"), 1.0),
        ];
        assert_eq!(ids(&finalize(pool, &HashSet::new(), 5)), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_rank_merges_across_configs() {
        let source = MockSource::new()
            .respond("cat:A", vec![paper("p1", "one"), paper("p2v1", "two (A)")])
            .respond("cat:B", vec![paper("p2v2", "two (B)"), paper("p3", "three")]);
        let ranker = Ranker::new(source);

        let configs = vec![config("cat:A", 1.0), config("cat:B", 1.0)];
        let ranked = ranker.rank(&configs, &HashSet::new(), 10).await.unwrap();

        // p1 = 1.0, p2(A) = 0.5, p3 = 0.5
        assert_eq!(ids(&ranked), vec!["p1", "p2v1", "p3"]);
    }

    #[tokio::test]
    async fn test_rank_weights_and_decay() {
        let source = MockSource::new()
            .respond("cat:AI", vec![paper("a1", "a1"), paper("a2", "a2"), paper("a3", "a3")])
            .respond("cat:CV", vec![paper("c1", "c1"), paper("c2", "c2")]);
        let ranker = Ranker::new(source);

        let configs = vec![config("cat:AI", 3.0), config("cat:CV", 1.0)];
        let ranked = ranker.rank(&configs, &HashSet::new(), 10).await.unwrap();

        // a1 = 3, a2 = 1.5, a3 = 1, c1 = 1, c2 = 0.5
        assert_eq!(ids(&ranked), vec!["a1", "a2", "a3", "c1", "c2"]);
    }

    #[tokio::test]
    async fn test_rank_merge_order_ignores_completion_order() {
        let source = MockSource::new()
            .respond("cat:A", vec![paper("shared", "from A")])
            .respond("cat:B", vec![paper("shared", "from B")])
            .delay("cat:A", 50);
        let ranker = Ranker::new(source);

        let configs = vec![config("cat:A", 1.0), config("cat:B", 5.0)];
        let ranked = ranker.rank(&configs, &HashSet::new(), 10).await.unwrap();

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].title, "from A");
    }

    #[tokio::test]
    async fn test_rank_excludes_already_seen() {
        let source = MockSource::new()
            .respond("cat:A", vec![paper("p1v2", "one"), paper("p2", "two"), paper("p3", "three")]);
        let ranker = Ranker::new(source);

        let seen: HashSet<String> = ["p1".to_string(), "p3".to_string()].into_iter().collect();
        let ranked = ranker.rank(&[config("cat:A", 1.0)], &seen, 10).await.unwrap();
        assert_eq!(ids(&ranked), vec!["p2"]);
    }

    #[tokio::test]
    async fn test_rank_bounded_by_limit() {
        let papers: Vec<Paper> = (0..8).map(|i| paper(&format!("p{}", i), "t")).collect();
        let source = MockSource::new()
            .respond("cat:A", papers.clone())
            .respond("cat:B", papers.iter().map(|p| paper(&format!("b{}", p.id), "t")).collect());
        let ranker = Ranker::new(source);

        let configs = vec![config("cat:A", 1.0), config("cat:B", 1.0)];
        let ranked = ranker.rank(&configs, &HashSet::new(), 5).await.unwrap();
        assert_eq!(ranked.len(), 5);
    }

    #[tokio::test]
    async fn test_rank_uses_per_config_cap() {
        let papers: Vec<Paper> = (0..20).map(|i| paper(&format!("p{}", i), "t")).collect();
        let source = MockSource::new().respond("cat:A", papers);
        let ranker = Ranker::new(source).with_results_per_config(3);

        let ranked = ranker.rank(&[config("cat:A", 1.0)], &HashSet::new(), 50).await.unwrap();
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranker.source().calls.lock().unwrap()[0], ("cat:A".to_string(), 3));
    }

    #[tokio::test]
    async fn test_rank_partial_failure_keeps_other_results() {
        let source = MockSource::new()
            .fail("cat:A")
            .respond("cat:B", vec![paper("b1", "b1")]);
        let ranker = Ranker::new(source);

        let configs = vec![config("cat:A", 5.0), config("cat:B", 1.0)];
        let ranked = ranker.rank(&configs, &HashSet::new(), 10).await.unwrap();
        assert_eq!(ids(&ranked), vec!["b1"]);
    }

    #[tokio::test]
    async fn test_rank_all_failures() {
        let source = MockSource::new().fail("cat:A").fail("cat:B");
        let ranker = Ranker::new(source);

        let configs = vec![config("cat:A", 1.0), config("cat:B", 1.0)];
        match ranker.rank(&configs, &HashSet::new(), 10).await {
            Err(RankingError::AllFetchesFailed { attempted, .. }) => assert_eq!(attempted, 2),
            other => panic!("Expected AllFetchesFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rank_empty_plan() {
        let ranker = Ranker::new(MockSource::new());
        assert!(ranker.rank(&[], &HashSet::new(), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rank_fetches_concurrently() {
        let source = MockSource::new()
            .respond("cat:A", vec![paper("a", "a")])
            .respond("cat:B", vec![paper("b", "b")])
            .respond("cat:C", vec![paper("c", "c")])
            .delay("cat:A", 100)
            .delay("cat:B", 100)
            .delay("cat:C", 100);
        let ranker = Ranker::new(source);

        let configs = vec![config("cat:A", 1.0), config("cat:B", 1.0), config("cat:C", 1.0)];
        let started = std::time::Instant::now();
        let ranked = ranker.rank(&configs, &HashSet::new(), 10).await.unwrap();

        assert_eq!(ranked.len(), 3);
        assert!(started.elapsed() < Duration::from_millis(280));
    }
}
