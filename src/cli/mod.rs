//! Command-line interface
//!
//! Thin wrappers that load configuration, build the same pipeline the HTTP
//! server uses, and render results to the terminal.

pub mod commands;
pub mod ui;

use crate::types::{DiagramError, Result, ValidationError, ValidationErrorKind};

/// Parse `owner/repo` or a `https://github.com/owner/repo` URL
pub fn parse_repository(target: &str) -> Result<(String, String)> {
    let target = target.trim();
    let path = match url::Url::parse(target) {
        Ok(url) if url.has_host() => url.path().to_string(),
        _ => target.to_string(),
    };

    let mut parts = path
        .trim_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty());

    match (parts.next(), parts.next()) {
        (Some(owner), Some(repo)) => Ok((
            owner.to_string(),
            repo.trim_end_matches(".git").to_string(),
        )),
        _ => Err(DiagramError::Validation(ValidationError::new(
            ValidationErrorKind::Format,
            format!("Expected owner/repo, got '{}'", target),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repository() {
        assert_eq!(
            parse_repository("tokio-rs/axum").unwrap(),
            ("tokio-rs".to_string(), "axum".to_string())
        );
        assert_eq!(
            parse_repository("https://github.com/tokio-rs/axum.git").unwrap(),
            ("tokio-rs".to_string(), "axum".to_string())
        );
        assert_eq!(
            parse_repository("https://github.com/o/r/tree/main/src").unwrap(),
            ("o".to_string(), "r".to_string())
        );
        assert!(parse_repository("just-a-name").is_err());
    }
}
