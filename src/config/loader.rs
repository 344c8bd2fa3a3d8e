//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/repodiagram/config.toml)
//! 3. Project config (.repodiagram/config.toml)
//! 4. Environment variables (REPODIAGRAM_* prefix, `__` separates sections)
//! 5. Well-known secret variables (OPENROUTER_API_KEY, GITHUB_PAT)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::types::Config;
use crate::types::{DiagramError, Result};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain using Figment:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        let project_path = Self::project_config_path();
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        Self::finish(figment)
    }

    /// Load configuration from a specific file (plus env overrides)
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path));

        Self::finish(figment)
    }

    fn finish(figment: Figment) -> Result<Config> {
        // e.g. REPODIAGRAM_LLM__MODEL -> llm.model
        let figment = figment.merge(Env::prefixed("REPODIAGRAM_").split("__").lowercase(true));

        let mut config: Config = figment
            .extract()
            .map_err(|e| DiagramError::Config(format!("Configuration error: {}", e)))?;

        Self::apply_secret_fallbacks(&mut config);
        config.validate()?;

        Ok(config)
    }

    /// Fill unset secrets from the conventional environment variables
    fn apply_secret_fallbacks(config: &mut Config) {
        if config.llm.api_key.is_none() {
            config.llm.api_key = env::var("OPENROUTER_API_KEY")
                .ok()
                .filter(|k| !k.is_empty());
        }
        if config.github.token.is_none() {
            config.github.token = env::var("GITHUB_PAT").ok().filter(|t| !t.is_empty());
        }
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory (~/.config/repodiagram/)
    pub fn global_dir() -> Option<PathBuf> {
        env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                env::var("HOME")
                    .ok()
                    .map(|home| PathBuf::from(home).join(".config"))
            })
            .map(|p| p.join("repodiagram"))
    }

    /// Get path to global config file
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get path to project config file
    pub fn project_config_path() -> PathBuf {
        PathBuf::from(".repodiagram/config.toml")
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    /// Show config file paths
    pub fn show_path() {
        println!("Configuration paths:");
        println!();

        if let Some(global) = Self::global_config_path() {
            let exists = if global.exists() { "✓" } else { "✗" };
            println!("  Global:  {} {}", exists, global.display());
        } else {
            println!("  Global:  (not available)");
        }

        let project = Self::project_config_path();
        let exists = if project.exists() { "✓" } else { "✗" };
        println!("  Project: {} {}", exists, project.display());
    }

    /// Render the effective configuration (secrets omitted)
    pub fn render(config: &Config, as_json: bool) -> Result<String> {
        if as_json {
            Ok(serde_json::to_string_pretty(config)?)
        } else {
            toml::to_string_pretty(config).map_err(|e| DiagramError::Config(e.to_string()))
        }
    }
}
