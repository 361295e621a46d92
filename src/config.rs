//! TOML configuration for the engine and the miner.
//!
//! ```toml
//! [engine]
//! similarity_threshold = 0.9
//! resolution = "embedding"
//! resolution_context = "label"
//!
//! [miner]
//! method = "two_nodes"
//! max_nodes = 8
//! rng_seed = 7
//! ```
//!
//! Every key is optional; missing keys take their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::EngineConfig;
use crate::error::ConfigError;
use crate::mine::MinerConfig;

/// Combined configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub miner: MinerConfig,
}

impl Config {
    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Parse and validate TOML text; `origin` names the source in errors.
    pub fn parse(content: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: origin.to_owned(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        self.miner.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ResolutionContext, ResolutionPolicy};
    use crate::mine::Method;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = Config::parse("", "<test>").unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.engine.similarity_threshold, 0.85);
        assert_eq!(cfg.miner.max_nodes, 20);
        assert_eq!(cfg.miner.max_steps, 10);
    }

    #[test]
    fn sections_override_defaults() {
        let cfg = Config::parse(
            r#"
            [engine]
            similarity_threshold = 0.9
            resolution = "exact_match"
            resolution_context = "label_with_relation"
            max_items = 500

            [miner]
            method = "two_nodes"
            max_nodes = 8
            neighbor_probability = 0.5
            max_auxiliary_nodes = 12
            "#,
            "<test>",
        )
        .unwrap();
        assert_eq!(cfg.engine.similarity_threshold, 0.9);
        assert_eq!(cfg.engine.resolution, ResolutionPolicy::ExactMatch);
        assert_eq!(
            cfg.engine.resolution_context,
            ResolutionContext::LabelWithRelation
        );
        assert_eq!(cfg.engine.max_items, Some(500));
        assert_eq!(cfg.engine.embedding_dimension, 256);
        assert_eq!(cfg.miner.method, Method::TwoNodes);
        assert_eq!(cfg.miner.max_nodes, 8);
        assert_eq!(cfg.miner.max_steps, 10);
        assert_eq!(cfg.miner.max_auxiliary_nodes, Some(12));
    }

    #[test]
    fn bad_syntax_is_parse_error() {
        let err = Config::parse("[engine\nx = ", "cfg.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { ref path, .. } if path == "cfg.toml"));
    }

    #[test]
    fn unknown_method_is_parse_error() {
        assert!(matches!(
            Config::parse("[miner]\nmethod = \"bfs\"", "<test>"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn out_of_range_is_invalid() {
        assert!(matches!(
            Config::parse("[miner]\nmax_nodes = 1", "<test>"),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            Config::parse("[engine]\nsimilarity_threshold = 2.0", "<test>"),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(matches!(
            Config::load(&dir.path().join("absent.toml")),
            Err(ConfigError::Read { .. })
        ));
    }
}
