//! Planner configuration
//!
//! ```
//! use opentdf_autoconfigure::PlannerConfig;
//!
//! let config = PlannerConfig::from_json(r#"{"defaultKas": ["https://kas.us/"]}"#)?;
//! assert_eq!(config.default_kas, vec!["https://kas.us/".to_string()]);
//! assert_eq!(config.max_fqns_per_request, 250);
//! # Ok::<(), serde_json::Error>(())
//! ```

use crate::service::MAX_FQNS_PER_REQUEST;
use serde::{Deserialize, Serialize};

fn default_max_fqns() -> usize {
    MAX_FQNS_PER_REQUEST
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannerConfig {
    /// KAS URIs that protect data with no attribute grants
    #[serde(default)]
    pub default_kas: Vec<String>,

    /// Client-side cap on FQNs per attribute service call
    #[serde(default = "default_max_fqns")]
    pub max_fqns_per_request: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            default_kas: Vec::new(),
            max_fqns_per_request: MAX_FQNS_PER_REQUEST,
        }
    }
}

impl PlannerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from JSON; the FQN limit is clamped to the service's.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: PlannerConfig = serde_json::from_str(json)?;
        let max = config.max_fqns_per_request;
        Ok(config.with_max_fqns(max))
    }

    pub fn with_default_kas<I, S>(mut self, kases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_kas = kases.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_fqns(mut self, max: usize) -> Self {
        self.max_fqns_per_request = max.min(MAX_FQNS_PER_REQUEST);
        self
    }
}
