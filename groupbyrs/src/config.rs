//! Configuration for the resolver.
//!
//! TOML-based, with every section optional and defaulted.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ResolverError, Result};
use crate::linkable::LinkableElementProperty;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub suggestions: SuggestionsConfig,
    pub group_by: GroupByConfig,
    pub logging: LoggingConfig,
}

/// Fuzzy suggestions attached to "no matching item" issues.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SuggestionsConfig {
    /// Maximum suggestions per issue (default: 6).
    pub max_suggestions: usize,
    /// Minimum normalized similarity in `[0, 1]` (default: 0.6).
    pub min_score: f64,
}

/// Which linkable elements the push-down admits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GroupByConfig {
    /// Keep elements carrying any of these properties (default: all).
    pub with_any_of: BTreeSet<LinkableElementProperty>,
    /// Drop elements carrying any of these properties (default: none).
    pub without_any_of: BTreeSet<LinkableElementProperty>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive; `RUST_LOG` takes precedence (default: "info").
    pub filter: String,
}

impl Default for SuggestionsConfig {
    fn default() -> Self {
        Self {
            max_suggestions: 6,
            min_score: 0.6,
        }
    }
}

impl Default for GroupByConfig {
    fn default() -> Self {
        Self {
            with_any_of: LinkableElementProperty::all(),
            without_any_of: BTreeSet::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl ResolverConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ResolverError::Config(format!("failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| ResolverError::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from default locations (env var, cwd, user config dir, or defaults).
    ///
    /// Search order:
    /// 1. `GROUPBY_CONFIG` environment variable
    /// 2. `./groupby.toml` (current directory)
    /// 3. `~/.config/groupby/config.toml` (user config dir)
    /// 4. Built-in defaults
    pub fn load_default() -> Self {
        if let Ok(path) = std::env::var("GROUPBY_CONFIG") {
            if let Ok(cfg) = Self::from_file(&path) {
                tracing::info!(path = %path, "loaded config from GROUPBY_CONFIG");
                return cfg;
            }
        }

        if let Ok(cfg) = Self::from_file("groupby.toml") {
            tracing::info!("loaded config from ./groupby.toml");
            return cfg;
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("groupby").join("config.toml");
            if let Ok(cfg) = Self::from_file(&user_config) {
                tracing::info!(path = %user_config.display(), "loaded config from user config dir");
                return cfg;
            }
        }

        tracing::debug!("no config file found, using defaults");
        Self::default()
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.suggestions.min_score) {
            return Err(ResolverError::Config(format!(
                "suggestions.min_score must be within [0, 1], got {}",
                self.suggestions.min_score
            )));
        }
        if self.group_by.with_any_of.is_empty() {
            return Err(ResolverError::Config(
                "group_by.with_any_of must name at least one property".to_string(),
            ));
        }
        Ok(())
    }
}
