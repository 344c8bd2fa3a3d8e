//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Admission gate thresholds
pub mod budget {
    /// Above this many tokens a caller must supply their own API key
    pub const FREE_TIER_TOKEN_LIMIT: usize = 50_000;

    /// Hard ceiling; requests above it are rejected regardless of key
    pub const CONTEXT_TOKEN_CEILING: usize = 195_000;

    /// Advertised context length of the completion model (tokens)
    pub const MODEL_CONTEXT_TOKENS: usize = 200_000;
}

/// Cost estimate formula
pub mod cost {
    /// Input price per token (USD)
    pub const INPUT_PRICE_PER_TOKEN: f64 = 0.000_001_1;

    /// Output price per token (USD)
    pub const OUTPUT_PRICE_PER_TOKEN: f64 = 0.000_004_4;

    /// Fixed prompt overhead added to every input estimate (tokens)
    pub const PROMPT_OVERHEAD_TOKENS: usize = 3_000;

    /// Assumed output length across all three stages (tokens)
    pub const ESTIMATED_OUTPUT_TOKENS: usize = 8_000;
}

/// Pipeline markers
pub mod markers {
    /// Emitted by the model when instructions are unusable
    pub const BAD_INSTRUCTIONS: &str = "BAD_INSTRUCTIONS";

    pub const MAPPING_OPEN: &str = "<component_mapping>";
    pub const MAPPING_CLOSE: &str = "</component_mapping>";

    pub const MERMAID_FENCE: &str = "```mermaid";
    pub const FENCE: &str = "```";
}

/// Request validation
pub mod request {
    /// Maximum length of free-form instructions (characters)
    pub const MAX_INSTRUCTIONS_LEN: usize = 1_000;

    /// Canonical demo repositories that cannot be regenerated
    pub const RESERVED_REPOS: &[&str] =
        &["fastapi", "streamlit", "flask", "api-analytics", "monkeytype"];
}

/// Cache constants
pub mod cache {
    /// Maximum repository snapshots kept in memory
    pub const DEFAULT_SNAPSHOT_CAPACITY: usize = 100;
}

/// GitHub constants
pub mod github {
    pub const DEFAULT_API_BASE: &str = "https://api.github.com";

    /// Host used for click-through links in diagrams
    pub const DEFAULT_WEB_HOST: &str = "github.com";

    /// Branch assumed when the repository reports none
    pub const FALLBACK_BRANCH: &str = "main";

    /// Branches tried when the default branch tree cannot be listed
    pub const FALLBACK_TREE_BRANCHES: &[&str] = &["main", "master"];

    /// Case-insensitive substrings excluded from file listings
    pub const EXCLUDED_PATH_PATTERNS: &[&str] = &[
        // Dependencies
        "node_modules/",
        "vendor/",
        "venv/",
        // Compiled files
        ".min.",
        ".pyc",
        ".pyo",
        ".pyd",
        ".so",
        ".dll",
        ".class",
        // Assets
        ".jpg",
        ".jpeg",
        ".png",
        ".gif",
        ".ico",
        ".svg",
        ".ttf",
        ".woff",
        ".webp",
        // Cache and temporary files
        "__pycache__/",
        ".cache/",
        ".tmp/",
        // Lock files and logs
        "yarn.lock",
        "poetry.lock",
        "*.log",
        // Editor settings
        ".vscode/",
        ".idea/",
    ];
}

/// HTTP/Network constants
pub mod network {
    /// Default request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

    /// Default bind address of the HTTP server
    pub const DEFAULT_BIND: &str = "127.0.0.1:8000";

    /// Buffered events between the pipeline and the HTTP body
    pub const EVENT_CHANNEL_CAPACITY: usize = 64;
}

/// Completion provider constants
pub mod llm {
    pub const DEFAULT_API_BASE: &str = "https://openrouter.ai/api/v1";
    pub const DEFAULT_MODEL: &str = "openai/o4-mini";
    pub const DEFAULT_MAX_COMPLETION_TOKENS: usize = 12_000;
    pub const DEFAULT_REFERER: &str = "http://localhost:3000";
    pub const DEFAULT_TITLE: &str = "repodiagram";
}
