//! Repository Data
//!
//! The `RepositoryProvider` trait abstracts where repository metadata comes
//! from; `GitHubClient` implements it against the GitHub REST API and
//! `RepositorySnapshotCache` memoizes composed snapshots per credential scope.

mod cache;
mod client;

pub use cache::{CacheStats, RepositorySnapshotCache, SharedSnapshotCache};
pub use client::GitHubClient;

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

use crate::constants::github::{EXCLUDED_PATH_PATTERNS, FALLBACK_BRANCH};
use crate::types::{Credential, RepositorySnapshot, Result};

/// Source of repository metadata.
///
/// Implementations report a missing repository as a `NotFound` repository
/// error and transient failures as `Unavailable`. Nothing is retried here.
#[async_trait]
pub trait RepositoryProvider: Send + Sync {
    /// Default branch, if the repository reports one
    async fn default_branch(
        &self,
        owner: &str,
        repo: &str,
        credential: Option<&Credential>,
    ) -> Result<Option<String>>;

    /// File paths on `branch`, exclusion filter already applied
    async fn file_paths(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        credential: Option<&Credential>,
    ) -> Result<Vec<String>>;

    /// README contents
    async fn readme(&self, owner: &str, repo: &str, credential: Option<&Credential>)
    -> Result<String>;
}

pub type SharedRepositoryProvider = Arc<dyn RepositoryProvider>;

/// Fetch and compose a full snapshot from a provider
pub async fn fetch_snapshot(
    provider: &dyn RepositoryProvider,
    owner: &str,
    repo: &str,
    credential: Option<&Credential>,
) -> Result<RepositorySnapshot> {
    let default_branch = provider
        .default_branch(owner, repo, credential)
        .await?
        .unwrap_or_else(|| FALLBACK_BRANCH.to_string());

    let paths = provider
        .file_paths(owner, repo, &default_branch, credential)
        .await?;
    let readme = provider.readme(owner, repo, credential).await?;

    debug!(
        "Fetched {}/{}: branch={}, {} paths, README {} bytes",
        owner,
        repo,
        default_branch,
        paths.len(),
        readme.len()
    );

    Ok(RepositorySnapshot {
        owner: owner.to_string(),
        repo: repo.to_string(),
        default_branch,
        file_tree: paths.join("\n"),
        readme,
        fetched_at: Utc::now(),
    })
}

/// Whether a path survives the dependency/build/binary/lock-file filter.
///
/// Patterns match case-insensitively as substrings; a leading `*` anchors the
/// rest of the pattern to the end of the path.
pub fn should_include_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    !EXCLUDED_PATH_PATTERNS.iter().any(|pattern| {
        match pattern.strip_prefix('*') {
            Some(suffix) => lower.ends_with(suffix),
            None => lower.contains(pattern),
        }
    })
}


#[cfg(test)]
mod tests {
    use super::fake::StaticRepositoryProvider;
    use super::*;

    #[test]
    fn test_should_include_path() {
        assert!(should_include_path("src/main.rs"));
        assert!(should_include_path("docs/README.md"));
        assert!(!should_include_path("web/node_modules/react/index.js"));
        assert!(!should_include_path("assets/Logo.PNG"));
        assert!(!should_include_path("app/__pycache__/x.cpython-312.pyc"));
        assert!(!should_include_path("yarn.lock"));
        assert!(!should_include_path("logs/server.log"));
        assert!(should_include_path("src/logging.rs"));
        assert!(!should_include_path(".vscode/settings.json"));
    }

    #[tokio::test]
    async fn test_fetch_snapshot_composes_fields() {
        let provider = StaticRepositoryProvider::new(&["a.rs", "src/b.rs"], "# Demo");
        let snapshot = fetch_snapshot(&provider, "o", "r", None).await.unwrap();

        assert_eq!(snapshot.default_branch, "main");
        assert_eq!(snapshot.file_tree, "a.rs\nsrc/b.rs");
        assert_eq!(snapshot.readme, "# Demo");
    }

    #[tokio::test]
    async fn test_fetch_snapshot_defaults_branch() {
        let mut provider = StaticRepositoryProvider::new(&["a.rs"], "");
        provider.branch = None;
        let snapshot = fetch_snapshot(&provider, "o", "r", None).await.unwrap();
        assert_eq!(snapshot.default_branch, FALLBACK_BRANCH);
    }
}
