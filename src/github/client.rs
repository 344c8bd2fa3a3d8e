//! GitHub REST client
//!
//! Unauthenticated requests are sent as-is (or with the configured fallback
//! token); a per-request credential takes precedence over both.

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{RepositoryProvider, should_include_path};
use crate::config::GithubConfig;
use crate::constants::github::FALLBACK_TREE_BRANCHES;
use crate::types::{Credential, DiagramError, ErrorCategory, Result};

const USER_AGENT: &str = concat!("repodiagram/", env!("CARGO_PKG_VERSION"));

pub struct GitHubClient {
    api_base: String,
    token: Option<SecretString>,
    client: reqwest::Client,
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("api_base", &self.api_base)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl GitHubClient {
    pub fn new(config: &GithubConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DiagramError::Config(format!("Failed to create GitHub client: {}", e)))?;

        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token.clone().map(SecretString::from),
            client,
        })
    }

    fn get(&self, url: &str, credential: Option<&Credential>) -> reqwest::RequestBuilder {
        let request = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json");

        match (credential, &self.token) {
            (Some(cred), _) => request.header("Authorization", format!("token {}", cred.expose())),
            (None, Some(token)) => {
                request.header("Authorization", format!("token {}", token.expose_secret()))
            }
            (None, None) => request,
        }
    }

    async fn send(&self, url: &str, credential: Option<&Credential>) -> Result<reqwest::Response> {
        self.get(url, credential).send().await.map_err(|e| {
            DiagramError::unavailable(format!("Failed to reach GitHub: {}", e))
        })
    }

    async fn tree(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        credential: Option<&Credential>,
    ) -> Result<Option<Vec<String>>> {
        let url = format!(
            "{}/repos/{}/{}/git/trees/{}?recursive=1",
            self.api_base, owner, repo, branch
        );
        let response = self.send(&url, credential).await?;

        if !response.status().is_success() {
            debug!("Tree listing for {}/{}@{} returned {}", owner, repo, branch, response.status());
            return Ok(None);
        }

        let tree: TreeResponse = response
            .json()
            .await
            .map_err(|e| DiagramError::unavailable(format!("Invalid tree response: {}", e)))?;

        if tree.truncated {
            warn!("Tree listing for {}/{} was truncated by GitHub", owner, repo);
        }

        Ok(Some(
            tree.tree
                .into_iter()
                .map(|entry| entry.path)
                .filter(|path| should_include_path(path))
                .collect(),
        ))
    }
}

fn status_error(status: StatusCode, what: &str) -> DiagramError {
    match ErrorCategory::from_http_status(status.as_u16()) {
        ErrorCategory::NotFound => DiagramError::not_found(format!("{} not found", what)),
        category => DiagramError::Repository {
            category: if category == ErrorCategory::Unknown {
                ErrorCategory::Unavailable
            } else {
                category
            },
            message: format!("GitHub returned {} for {}", status.as_u16(), what),
        },
    }
}

#[async_trait]
impl RepositoryProvider for GitHubClient {
    async fn default_branch(
        &self,
        owner: &str,
        repo: &str,
        credential: Option<&Credential>,
    ) -> Result<Option<String>> {
        let url = format!("{}/repos/{}/{}", self.api_base, owner, repo);
        let response = self.send(&url, credential).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, &format!("Repository {}/{}", owner, repo)));
        }

        let info: RepoResponse = response
            .json()
            .await
            .map_err(|e| DiagramError::unavailable(format!("Invalid repository response: {}", e)))?;

        Ok(info.default_branch.filter(|b| !b.is_empty()))
    }

    async fn file_paths(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        credential: Option<&Credential>,
    ) -> Result<Vec<String>> {
        if let Some(paths) = self.tree(owner, repo, branch, credential).await? {
            return Ok(paths);
        }

        for fallback in FALLBACK_TREE_BRANCHES.iter().filter(|b| **b != branch) {
            if let Some(paths) = self.tree(owner, repo, fallback, credential).await? {
                debug!("Listed {}/{} using fallback branch {}", owner, repo, fallback);
                return Ok(paths);
            }
        }

        Err(DiagramError::not_found(
            "Could not fetch repository file tree. Repository might not exist, be empty or private.",
        ))
    }

    async fn readme(&self, owner: &str, repo: &str, credential: Option<&Credential>) -> Result<String> {
        let url = format!("{}/repos/{}/{}/readme", self.api_base, owner, repo);
        let response = self.send(&url, credential).await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(DiagramError::not_found(
                "No README found for the specified repository.",
            ));
        }
        if !status.is_success() {
            return Err(status_error(status, &format!("README of {}/{}", owner, repo)));
        }

        let meta: ReadmeResponse = response
            .json()
            .await
            .map_err(|e| DiagramError::unavailable(format!("Invalid README response: {}", e)))?;

        let Some(download_url) = meta.download_url else {
            return Err(DiagramError::not_found(
                "No README found for the specified repository.",
            ));
        };

        let content = self.send(&download_url, credential).await?;
        let status = content.status();
        if !status.is_success() {
            return Err(status_error(status, &format!("README of {}/{}", owner, repo)));
        }

        content
            .text()
            .await
            .map_err(|e| DiagramError::unavailable(format!("Failed to read README: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
struct RepoResponse {
    default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
}

#[derive(Debug, Deserialize)]
struct ReadmeResponse {
    download_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client_for(server: &mockito::ServerGuard, token: Option<&str>) -> GitHubClient {
        GitHubClient::new(&GithubConfig {
            api_base: server.url(),
            token: token.map(String::from),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_default_branch() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/o/r")
            .with_status(200)
            .with_body(r#"{"default_branch":"develop"}"#)
            .create_async()
            .await;

        let client = client_for(&server, None);
        let branch = client.default_branch("o", "r", None).await.unwrap();
        assert_eq!(branch.as_deref(), Some("develop"));
    }

    #[tokio::test]
    async fn test_missing_repository_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/o/gone")
            .with_status(404)
            .create_async()
            .await;

        let client = client_for(&server, None);
        let err = client.default_branch("o", "gone", None).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/o/r")
            .with_status(502)
            .create_async()
            .await;

        let client = client_for(&server, None);
        let err = client.default_branch("o", "r", None).await.unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::Unavailable));
    }

    #[tokio::test]
    async fn test_credential_overrides_configured_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/o/r")
            .match_header("authorization", "token user-pat")
            .with_status(200)
            .with_body(r#"{"default_branch":"main"}"#)
            .create_async()
            .await;

        let client = client_for(&server, Some("service-pat"));
        let cred = Credential::new("user-pat");
        client.default_branch("o", "r", Some(&cred)).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_file_paths_filters_and_falls_back() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/o/r/git/trees/trunk")
            .match_query(Matcher::UrlEncoded("recursive".into(), "1".into()))
            .with_status(404)
            .create_async()
            .await;
        server
            .mock("GET", "/repos/o/r/git/trees/main")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;
        server
            .mock("GET", "/repos/o/r/git/trees/master")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"tree":[{"path":"src/lib.rs"},{"path":"node_modules/x.js"},{"path":"logo.png"}],"truncated":false}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server, None);
        let paths = client.file_paths("o", "r", "trunk", None).await.unwrap();
        assert_eq!(paths, vec!["src/lib.rs".to_string()]);
    }

    #[tokio::test]
    async fn test_file_paths_exhausted_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        for branch in ["main", "master"] {
            server
                .mock("GET", format!("/repos/o/r/git/trees/{}", branch).as_str())
                .match_query(Matcher::Any)
                .with_status(404)
                .expect(1)
                .create_async()
                .await;
        }

        let client = client_for(&server, None);
        let err = client.file_paths("o", "r", "main", None).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_readme_downloads_content() {
        let mut server = mockito::Server::new_async().await;
        let download_url = format!("{}/raw/o/r/README.md", server.url());
        server
            .mock("GET", "/repos/o/r/readme")
            .with_status(200)
            .with_body(format!(r#"{{"download_url":"{}"}}"#, download_url))
            .create_async()
            .await;
        server
            .mock("GET", "/raw/o/r/README.md")
            .with_status(200)
            .with_body("# Project")
            .create_async()
            .await;

        let client = client_for(&server, None);
        assert_eq!(client.readme("o", "r", None).await.unwrap(), "# Project");
    }

    #[tokio::test]
    async fn test_missing_readme() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/o/r/readme")
            .with_status(404)
            .create_async()
            .await;

        let client = client_for(&server, None);
        let err = client.readme("o", "r", None).await.unwrap_err();
        assert_eq!(err.to_string(), "No README found for the specified repository.");
    }
}
