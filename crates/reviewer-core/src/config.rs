//! Engine configuration.
//!
//! Loading configuration files is left to the embedding application; this
//! module only defines the typed settings, their defaults, and the
//! `REVIEWER_*` environment overrides.

use serde::{Deserialize, Serialize};

use crate::guards::{
    clamp_chain_depth, clamp_workers, DEFAULT_MAX_CHAIN_DEPTH, DEFAULT_WORKERS,
};

pub const WORKERS_ENV: &str = "REVIEWER_WORKERS";
pub const MAX_CHAIN_DEPTH_ENV: &str = "REVIEWER_MAX_CHAIN_DEPTH";

/// Settings shared by every pipeline stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Size of the rayon pool used for parsing and blame.
    pub workers: usize,
    /// Maximum attribute-chain depth walked when resolving a call's base.
    pub max_chain_depth: usize,
    /// Extension of indexable source files, including the dot.
    pub source_extension: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
            source_extension: ".py".to_string(),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `REVIEWER_WORKERS` and `REVIEWER_MAX_CHAIN_DEPTH`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(workers) = env_usize(WORKERS_ENV) {
            config.workers = workers;
        }
        if let Some(depth) = env_usize(MAX_CHAIN_DEPTH_ENV) {
            config.max_chain_depth = depth;
        }
        config.normalized()
    }

    /// Clamp numeric settings into their supported ranges.
    pub fn normalized(mut self) -> Self {
        self.workers = clamp_workers(self.workers);
        self.max_chain_depth = clamp_chain_depth(self.max_chain_depth);
        if !self.source_extension.starts_with('.') {
            self.source_extension = format!(".{}", self.source_extension);
        }
        self
    }
}

fn env_usize(key: &str) -> Option<usize> {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<usize>().ok(),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = EngineConfig::default();
        assert_eq!(config.workers, 4);
        assert_eq!(config.max_chain_depth, 32);
        assert_eq!(config.source_extension, ".py");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"workers": 9}"#).unwrap();
        assert_eq!(config.workers, 9);
        assert_eq!(config.max_chain_depth, 32);
    }

    #[test]
    fn normalized_clamps_and_dots_extension() {
        let config = EngineConfig {
            workers: 0,
            max_chain_depth: 0,
            source_extension: "py".to_string(),
        }
        .normalized();
        assert_eq!(config.workers, 1);
        assert_eq!(config.max_chain_depth, 1);
        assert_eq!(config.source_extension, ".py");
    }
}
