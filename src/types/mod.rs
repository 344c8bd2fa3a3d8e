pub mod error;
pub mod repository;

pub use error::{
    DiagramError, ErrorCategory, LlmError, Result, ValidationError,
    ValidationErrorKind,
};
pub use repository::{
    Credential, GenerationRequest, RepositorySnapshot, SharedSnapshot, SnapshotKey,
};
