//! Service configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::{ServiceError, ServiceResult};
use crate::extraction::DEFAULT_KEYWORD_LIMIT;
use crate::models::{default_cold_start, CategoryWeight};
use crate::query::{DEFAULT_KEYWORDS_PER_CATEGORY, DEFAULT_MAX_CATEGORIES};
use crate::ranking::DEFAULT_RESULTS_PER_CONFIG;

/// Tunables of the recommendation service.
///
/// Every field has a default, so a configuration file only needs to name
/// the values it changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Number of recommendations when the caller does not specify one
    pub default_limit: usize,

    /// Keywords extracted per paper
    pub keyword_limit: usize,

    /// Papers fetched per search configuration
    pub per_config_results: usize,

    /// Categories searched for a personalized plan
    pub max_categories: usize,

    /// Keywords per category query
    pub keywords_per_category: usize,

    /// Upper bound on one ranking call, in seconds
    pub ranking_timeout_secs: u64,

    /// Categories searched for users without interest history
    pub cold_start: Vec<CategoryWeight>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            keyword_limit: DEFAULT_KEYWORD_LIMIT,
            per_config_results: DEFAULT_RESULTS_PER_CONFIG,
            max_categories: DEFAULT_MAX_CATEGORIES,
            keywords_per_category: DEFAULT_KEYWORDS_PER_CATEGORY,
            ranking_timeout_secs: 30,
            cold_start: default_cold_start(),
        }
    }
}

impl ServiceConfig {
    /// Parse a JSON configuration; missing fields take their defaults.
    ///
    /// # Errors
    /// Returns `ServiceError::Config` if the JSON is invalid or the values
    /// are unusable
    pub fn from_json_str(json: &str) -> ServiceResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ServiceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file.
    ///
    /// # Errors
    /// Returns `ServiceError::Config` if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> ServiceResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ServiceError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    pub fn ranking_timeout(&self) -> Duration {
        Duration::from_secs(self.ranking_timeout_secs)
    }

    fn validate(&self) -> ServiceResult<()> {
        if self.ranking_timeout_secs == 0 {
            return Err(ServiceError::Config("ranking_timeout_secs must be positive".to_string()));
        }
        if self.per_config_results == 0 {
            return Err(ServiceError::Config("per_config_results must be positive".to_string()));
        }
        if let Some(bad) = self
            .cold_start
            .iter()
            .find(|c| c.category.trim().is_empty() || !c.weight.is_finite() || c.weight < 0.0)
        {
            return Err(ServiceError::Config(format!(
                "invalid cold-start entry '{}' with weight {}",
                bad.category, bad.weight
            )));
        }
        Ok(())
    }
}
