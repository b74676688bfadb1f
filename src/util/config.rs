//! Configuration file support for harbour-graph.
//!
//! Two configuration file locations are read:
//! - Global: `~/.harbour/graph.toml` - User-wide defaults
//! - Project: `.harbour/graph.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::condition::PlatformVersion;
use crate::core::resources::FileRuleSet;
use crate::core::traits::TraitConfiguration;
use crate::graph::GraphOptions;

/// harbour-graph configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Graph construction settings
    pub graph: GraphConfig,
}

/// Settings under `[graph]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GraphConfig {
    /// One test product per test module instead of one per package
    pub create_multiple_test_products: Option<bool>,

    /// Synthesize a `<Name>__REPL` dynamic library for root packages
    pub create_repl_product: Option<bool>,

    /// Resource classification rules
    pub file_rules: Option<FileRuleSet>,

    /// Minimum deployment targets for test modules, by platform
    pub platform_overrides: BTreeMap<String, PlatformVersion>,

    /// Traits enabled on the root packages
    pub traits: Option<TraitConfiguration>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        let other = other.graph;
        if other.create_multiple_test_products.is_some() {
            self.graph.create_multiple_test_products = other.create_multiple_test_products;
        }
        if other.create_repl_product.is_some() {
            self.graph.create_repl_product = other.create_repl_product;
        }
        if other.file_rules.is_some() {
            self.graph.file_rules = other.file_rules;
        }
        // Overrides merge per platform
        self.graph.platform_overrides.extend(other.platform_overrides);
        if other.traits.is_some() {
            self.graph.traits = other.traits;
        }
    }

    /// Options for the graph loader.
    pub fn to_options(&self) -> GraphOptions {
        let graph = &self.graph;
        let mut options = GraphOptions::default();
        if let Some(multiple) = graph.create_multiple_test_products {
            options.create_multiple_test_products = multiple;
        }
        if let Some(repl) = graph.create_repl_product {
            options.create_repl_product = repl;
        }
        if let Some(rules) = graph.file_rules {
            options.file_rules = rules;
        }
        options.platform_overrides = graph.platform_overrides.clone();
        if let Some(traits) = &graph.traits {
            options.traits = traits.clone();
        }
        options
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.harbour/graph.toml)
/// 2. Global config (~/.harbour/graph.toml)
/// 3. Defaults
pub fn load_config(global_path: &Path, project_path: &Path) -> Config {
    let mut config = Config::default();

    if global_path.exists() {
        config.merge(Config::load_or_default(global_path));
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

/// Get the global harbour config directory (~/.harbour).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".harbour"))
}

/// Get the global graph config path (~/.harbour/graph.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("graph.toml"))
}

/// Get the project graph config path (.harbour/graph.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".harbour").join("graph.toml")
}
