//! Repository and request value types.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// GitHub credential (personal access token).
///
/// Part of the snapshot cache key, so it must be hashable. Debug output is
/// redacted and the value is never serialized back out.
#[derive(Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token, for building request headers only
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Treat empty strings as "no credential"
    pub fn from_optional(token: Option<String>) -> Option<Self> {
        token.filter(|t| !t.trim().is_empty()).map(Self)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

/// Cache identity for a repository snapshot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotKey {
    pub owner: String,
    pub repo: String,
    pub credential: Option<Credential>,
}

impl SnapshotKey {
    pub fn new(owner: &str, repo: &str, credential: Option<&Credential>) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            credential: credential.cloned(),
        }
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scope = if self.credential.is_some() {
            "authenticated"
        } else {
            "anonymous"
        };
        write!(f, "{}/{} ({})", self.owner, self.repo, scope)
    }
}

/// Repository metadata fetched once per cache key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositorySnapshot {
    pub owner: String,
    pub repo: String,
    pub default_branch: String,
    /// Newline-separated, already filtered file paths
    pub file_tree: String,
    pub readme: String,
    pub fetched_at: DateTime<Utc>,
}

impl RepositorySnapshot {
    /// `file_tree` and `readme` joined the way the token gate measures them
    pub fn combined_content(&self) -> String {
        format!("{}\n{}", self.file_tree, self.readme)
    }

    pub fn file_count(&self) -> usize {
        self.file_tree.lines().filter(|l| !l.is_empty()).count()
    }
}

pub type SharedSnapshot = Arc<RepositorySnapshot>;

/// One streaming generation request
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub owner: String,
    pub repo: String,
    pub instructions: String,
    /// Caller-supplied completion API key, overrides the configured key
    pub api_key: Option<SecretString>,
    pub credential: Option<Credential>,
}

impl GenerationRequest {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            instructions: String::new(),
            api_key: None,
            credential: None,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key.filter(|k| !k.trim().is_empty()).map(SecretString::from);
        self
    }

    pub fn with_credential(mut self, token: Option<String>) -> Self {
        self.credential = Credential::from_optional(token);
        self
    }

    pub fn has_user_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn has_instructions(&self) -> bool {
        !self.instructions.is_empty()
    }

    pub fn snapshot_key(&self) -> SnapshotKey {
        SnapshotKey::new(&self.owner, &self.repo, self.credential.as_ref())
    }
}
