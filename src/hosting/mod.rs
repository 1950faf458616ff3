//! Pull request hosting APIs: diff retrieval, file contents and comment posting.

pub mod gitea;
pub mod github;

use crate::core::{PullRequestContext, Suggestion};
use crate::errors::{ReviewError, ReviewResult};
use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub use gitea::GiteaHost;
pub use github::GitHubHost;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Gitea,
    #[value(name = "github")]
    GitHub,
}

#[async_trait]
pub trait ReviewHost: Send + Sync {
    /// Unified diff of the whole pull request.
    async fn fetch_diff(&self, pr: &PullRequestContext) -> ReviewResult<String>;

    /// Content of `path` at the head commit.
    async fn fetch_file_content(&self, pr: &PullRequestContext, path: &str) -> ReviewResult<String>;

    async fn post_inline_comment(
        &self,
        pr: &PullRequestContext,
        suggestion: &Suggestion,
        body: &str,
    ) -> ReviewResult<()>;

    async fn post_pr_comment(&self, pr: &PullRequestContext, body: &str) -> ReviewResult<()>;
}

pub fn create_host(
    platform: Platform,
    token: &str,
    timeout: Duration,
) -> ReviewResult<Arc<dyn ReviewHost>> {
    match platform {
        Platform::Gitea => Ok(Arc::new(GiteaHost::new(token, timeout)?)),
        Platform::GitHub => Ok(Arc::new(GitHubHost::new(token, timeout)?)),
    }
}

/// Appends percent-encoded path segments to an API base URL. `path` may
/// contain `/`, which is split into separate segments.
pub(crate) fn api_url(base: &str, segments: &[&str], path: Option<&str>) -> ReviewResult<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| ReviewError::Hosting(format!("invalid API URL {}: {}", base, e)))?;
    {
        let mut parts = url
            .path_segments_mut()
            .map_err(|_| ReviewError::Hosting(format!("API URL cannot be a base: {}", base)))?;
        parts.pop_if_empty();
        parts.extend(segments);
        if let Some(path) = path {
            parts.extend(path.split('/').filter(|s| !s.is_empty()));
        }
    }
    Ok(url)
}

pub(crate) fn hosting_error(action: &str, err: impl std::fmt::Display) -> ReviewError {
    ReviewError::Hosting(format!("{}: {}", action, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_encodes_file_path_segments() {
        let url = api_url(
            "https://git.example.com/api/v1/repos/acme/app/",
            &["raw"],
            Some("docs/my notes#1.md"),
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://git.example.com/api/v1/repos/acme/app/raw/docs/my%20notes%231.md"
        );
    }

    #[test]
    fn api_url_rejects_garbage() {
        assert!(matches!(
            api_url("not a url", &["pulls"], None),
            Err(ReviewError::Hosting(_))
        ));
    }

    #[test]
    fn platform_parses_from_cli_and_yaml() {
        use clap::ValueEnum;
        assert_eq!(Platform::from_str("github", false).unwrap(), Platform::GitHub);
        assert_eq!(Platform::from_str("gitea", false).unwrap(), Platform::Gitea);
        let parsed: Platform = serde_yaml::from_str("github").unwrap();
        assert_eq!(parsed, Platform::GitHub);
    }
}
