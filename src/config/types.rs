//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Secrets (`llm.api_key`, `github.token`) are accepted from files and env
//! but never serialized back out.

use serde::{Deserialize, Serialize};

use crate::constants::{cache, github, llm, network, request};
use crate::types::{DiagramError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// HTTP server settings
    pub server: ServerConfig,

    /// Completion provider settings
    pub llm: LlmConfig,

    /// GitHub repository provider settings
    pub github: GithubConfig,

    /// Snapshot cache settings
    pub cache: CacheConfig,

    /// Request validation settings
    pub generation: GenerationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            server: ServerConfig::default(),
            llm: LlmConfig::default(),
            github: GithubConfig::default(),
            cache: CacheConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `DiagramError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if self.llm.timeout_secs == 0 {
            return Err(DiagramError::Config(
                "LLM timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.github.timeout_secs == 0 {
            return Err(DiagramError::Config(
                "GitHub timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.cache.capacity == 0 {
            return Err(DiagramError::Config(
                "Cache capacity must be greater than 0".to_string(),
            ));
        }

        if self.server.channel_capacity == 0 {
            return Err(DiagramError::Config(
                "Server channel_capacity must be greater than 0".to_string(),
            ));
        }

        for (name, value) in [
            ("llm.api_base", &self.llm.api_base),
            ("github.api_base", &self.github.api_base),
        ] {
            url::Url::parse(value)
                .map_err(|e| DiagramError::Config(format!("Invalid {} '{}': {}", name, value, e)))?;
        }

        Ok(())
    }
}

// =============================================================================
// Server Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on
    pub bind: String,

    /// Allowed CORS origins; empty means permissive
    pub cors_origins: Vec<String>,

    /// Events buffered between a pipeline run and its HTTP response
    pub channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: network::DEFAULT_BIND.to_string(),
            cors_origins: Vec::new(),
            channel_capacity: network::EVENT_CHANNEL_CAPACITY,
        }
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider type (only "openrouter" and OpenAI-compatible endpoints)
    pub provider: String,

    /// Model identifier sent to the provider
    pub model: String,

    /// Chat completions base URL
    pub api_base: String,

    /// Service API key; falls back to OPENROUTER_API_KEY
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Completion length cap per stage
    pub max_completion_tokens: usize,

    /// Attribution headers sent to OpenRouter
    pub referer: String,
    pub title: String,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .field("max_completion_tokens", &self.max_completion_tokens)
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openrouter".to_string(),
            model: llm::DEFAULT_MODEL.to_string(),
            api_base: llm::DEFAULT_API_BASE.to_string(),
            api_key: None,
            timeout_secs: network::DEFAULT_TIMEOUT_SECS,
            max_completion_tokens: llm::DEFAULT_MAX_COMPLETION_TOKENS,
            referer: llm::DEFAULT_REFERER.to_string(),
            title: llm::DEFAULT_TITLE.to_string(),
        }
    }
}

// =============================================================================
// GitHub Configuration
// =============================================================================

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    /// REST API base URL
    pub api_base: String,

    /// Host used when building click-through links
    pub web_host: String,

    /// Fallback token for unauthenticated requests; falls back to GITHUB_PAT
    #[serde(skip_serializing)]
    pub token: Option<String>,

    pub timeout_secs: u64,
}

impl std::fmt::Debug for GithubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubConfig")
            .field("api_base", &self.api_base)
            .field("web_host", &self.web_host)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: github::DEFAULT_API_BASE.to_string(),
            web_host: github::DEFAULT_WEB_HOST.to_string(),
            token: None,
            timeout_secs: 30,
        }
    }
}

// =============================================================================
// Cache & Generation Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum repository snapshots held in memory (LRU)
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: cache::DEFAULT_SNAPSHOT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Maximum instructions length in characters
    pub max_instructions_len: usize,

    /// Repository names that cannot be regenerated
    pub reserved_repos: Vec<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_instructions_len: request::MAX_INSTRUCTIONS_LEN,
            reserved_repos: request::RESERVED_REPOS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.generation.max_instructions_len, 1000);
        assert_eq!(config.cache.capacity, 100);
        assert!(config.generation.reserved_repos.contains(&"fastapi".to_string()));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut config = Config::default();
        config.cache.capacity = 0;
        assert!(matches!(config.validate(), Err(DiagramError::Config(_))));
    }

    #[test]
    fn test_invalid_api_base_rejected() {
        let mut config = Config::default();
        config.llm.api_base = "not a url".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("llm.api_base"));
    }

    #[test]
    fn test_secrets_not_serialized() {
        let mut config = Config::default();
        config.llm.api_key = Some("sk-secret".to_string());
        config.github.token = Some("ghp_secret".to_string());

        let rendered = toml::to_string(&config).unwrap();
        assert!(!rendered.contains("sk-secret"));
        assert!(!rendered.contains("ghp_secret"));
        assert!(!format!("{:?}", config).contains("sk-secret"));
    }
}
