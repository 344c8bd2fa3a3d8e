//! Unified Error Type System
//!
//! Centralized error types for the whole service.
//!
//! ## Error Categories
//!
//! - **NotFound**: Repository (or branch) does not exist
//! - **RateLimit**: Upstream rate limiting
//! - **Auth**: Credential rejected by an upstream
//! - **Network**: Connectivity issues
//! - **Unavailable**: Upstream returned a server error
//! - **BadRequest**: Upstream rejected the request shape
//! - **ParseError**: Malformed upstream payload or stream frame
//!
//! Nothing is retried. Categories drive logging and the HTTP status of
//! pre-stream failures; every error still surfaces to the caller as a single
//! human-readable message.

use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// Error categories for upstream failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Requested resource does not exist
    NotFound,
    /// Rate limited by upstream
    RateLimit,
    /// Authentication failed
    Auth,
    /// Network/connectivity issues
    Network,
    /// Upstream unavailable or returned a server error
    Unavailable,
    /// Invalid request
    BadRequest,
    /// Parsing an upstream payload failed
    ParseError,
    /// Unknown error
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::Auth => write!(f, "AUTH"),
            Self::Network => write!(f, "NETWORK"),
            Self::Unavailable => write!(f, "UNAVAILABLE"),
            Self::BadRequest => write!(f, "BAD_REQUEST"),
            Self::ParseError => write!(f, "PARSE_ERROR"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl ErrorCategory {
    /// Classify an HTTP status code returned by an upstream service
    pub fn from_http_status(status: u16) -> Self {
        match status {
            404 => Self::NotFound,
            429 => Self::RateLimit,
            401 | 403 => Self::Auth,
            400 | 422 => Self::BadRequest,
            500..=599 => Self::Unavailable,
            _ => Self::Unknown,
        }
    }
}

// =============================================================================
// LLM Error
// =============================================================================

/// Completion provider error with category and provider context
#[derive(Debug, Clone)]
pub struct LlmError {
    /// Error category for logging and status mapping
    pub category: ErrorCategory,
    /// Detailed error message
    pub message: String,
    /// Provider that produced the error
    pub provider: Option<String>,
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(provider) = &self.provider {
            write!(f, "[{}:{}] {}", provider, self.category, self.message)
        } else {
            write!(f, "[{}] {}", self.category, self.message)
        }
    }
}

impl std::error::Error for LlmError {}

impl LlmError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            provider: None,
        }
    }

    /// Create error with provider context
    pub fn with_provider(
        category: ErrorCategory,
        message: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            provider: Some(provider.into()),
            ..Self::new(category, message)
        }
    }

    /// Build from a non-success HTTP response
    pub fn from_http_status(status: u16, body: &str, provider: &str) -> Self {
        Self::with_provider(
            ErrorCategory::from_http_status(status),
            format!("API returned status code {}: {}", status, body),
            provider,
        )
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Request validation failure, detected before any upstream work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Validation error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Instructions longer than the configured bound
    InstructionsTooLong,
    /// Repository belongs to the protected example set
    ReservedRepository,
    /// Missing or malformed field
    Format,
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum DiagramError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // -------------------------------------------------------------------------
    // Request Errors
    // -------------------------------------------------------------------------
    #[error("{0}")]
    Validation(ValidationError),

    #[error("{message}")]
    BudgetRequiresKey { tokens: usize, message: String },

    #[error("{message}")]
    BudgetRejected { tokens: usize, message: String },

    #[error("Invalid or unclear instructions provided")]
    UserInstructions,

    // -------------------------------------------------------------------------
    // Upstream Errors
    // -------------------------------------------------------------------------
    /// Structured completion provider error
    #[error("LLM error: {0}")]
    Llm(LlmError),

    /// Simple completion provider error
    #[error("LLM API error: {0}")]
    LlmApi(String),

    /// Repository data provider error
    #[error("{message}")]
    Repository {
        category: ErrorCategory,
        message: String,
    },

    // -------------------------------------------------------------------------
    // Runtime Errors
    // -------------------------------------------------------------------------
    #[error("Config error: {0}")]
    Config(String),

    /// The event consumer went away before the run finished
    #[error("Generation cancelled: {0}")]
    Cancelled(String),
}

impl From<LlmError> for DiagramError {
    fn from(err: LlmError) -> Self {
        DiagramError::Llm(err)
    }
}

impl From<ValidationError> for DiagramError {
    fn from(err: ValidationError) -> Self {
        DiagramError::Validation(err)
    }
}

pub type Result<T> = std::result::Result<T, DiagramError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl DiagramError {
    /// Repository does not exist
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::Repository {
            category: ErrorCategory::NotFound,
            message: message.into(),
        }
    }

    /// Repository provider failed transiently
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Repository {
            category: ErrorCategory::Unavailable,
            message: message.into(),
        }
    }

    /// Upstream category, when the error came from a collaborator
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            Self::Llm(e) => Some(e.category),
            Self::Repository { category, .. } => Some(*category),
            Self::Http(e) if e.is_timeout() || e.is_connect() => Some(ErrorCategory::Network),
            Self::Http(e) => e
                .status()
                .map(|s| ErrorCategory::from_http_status(s.as_u16())),
            _ => None,
        }
    }

    /// True when the error was raised by the repository provider for a missing repo
    pub fn is_not_found(&self) -> bool {
        self.category() == Some(ErrorCategory::NotFound)
    }
}

// =============================================================================
// Tests
// =============================================================================
