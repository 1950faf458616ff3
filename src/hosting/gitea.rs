use crate::core::{PullRequestContext, Suggestion};
use crate::errors::ReviewResult;
use crate::hosting::{api_url, hosting_error, ReviewHost};
use crate::http::{build_client, send_with_retry, send_write};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Gitea REST v1 client. Repository URLs come from the event payload and
/// already point at `/api/v1/repos/{owner}/{repo}`.
pub struct GiteaHost {
    client: Client,
    headers: HeaderMap,
}

#[derive(Serialize)]
struct CreateReview<'a> {
    body: &'a str,
    event: &'a str,
    commit_id: &'a str,
    comments: Vec<ReviewComment<'a>>,
}

#[derive(Serialize)]
struct ReviewComment<'a> {
    path: &'a str,
    body: &'a str,
    new_position: usize,
}

#[derive(Serialize)]
struct IssueComment<'a> {
    body: &'a str,
}

impl GiteaHost {
    pub fn new(token: &str, timeout: Duration) -> ReviewResult<Self> {
        let client =
            build_client(timeout).map_err(|e| hosting_error("building HTTP client", e))?;
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("token {}", token))
            .map_err(|e| hosting_error("access token", e))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        Ok(Self { client, headers })
    }

    fn get(&self, url: &reqwest::Url) -> reqwest::RequestBuilder {
        self.client.get(url.clone()).headers(self.headers.clone())
    }
}

#[async_trait]
impl ReviewHost for GiteaHost {
    async fn fetch_diff(&self, pr: &PullRequestContext) -> ReviewResult<String> {
        let number = format!("{}.diff", pr.number);
        let url = api_url(&pr.repo_api_url, &["pulls", &number], None)?;
        debug!("Fetching diff from {}", url);

        let response = send_with_retry(|| self.get(&url))
            .await
            .map_err(|e| hosting_error("fetching pull request diff", e))?;
        response
            .text()
            .await
            .map_err(|e| hosting_error("reading pull request diff", e))
    }

    async fn fetch_file_content(
        &self,
        pr: &PullRequestContext,
        path: &str,
    ) -> ReviewResult<String> {
        let mut url = api_url(&pr.head_repo_api_url, &["raw"], Some(path))?;
        url.query_pairs_mut().append_pair("ref", &pr.head_sha);

        let response = send_with_retry(|| self.get(&url))
            .await
            .map_err(|e| hosting_error(&format!("fetching {}", path), e))?;
        response
            .text()
            .await
            .map_err(|e| hosting_error(&format!("reading {}", path), e))
    }

    async fn post_inline_comment(
        &self,
        pr: &PullRequestContext,
        suggestion: &Suggestion,
        body: &str,
    ) -> ReviewResult<()> {
        let number = pr.number.to_string();
        let url = api_url(&pr.repo_api_url, &["pulls", &number, "reviews"], None)?;
        let review = CreateReview {
            body: "",
            event: "COMMENT",
            commit_id: &pr.head_sha,
            comments: vec![ReviewComment {
                path: &suggestion.path,
                body,
                new_position: suggestion.line,
            }],
        };

        send_write(|| {
            self.client
                .post(url.clone())
                .headers(self.headers.clone())
                .json(&review)
        })
        .await
        .map_err(|e| {
            hosting_error(
                &format!("posting comment on {}:{}", suggestion.path, suggestion.line),
                e,
            )
        })?;
        Ok(())
    }

    async fn post_pr_comment(&self, pr: &PullRequestContext, body: &str) -> ReviewResult<()> {
        let number = pr.number.to_string();
        let url = api_url(&pr.repo_api_url, &["issues", &number, "comments"], None)?;
        let comment = IssueComment { body };

        send_write(|| {
            self.client
                .post(url.clone())
                .headers(self.headers.clone())
                .json(&comment)
        })
        .await
        .map_err(|e| hosting_error("posting pull request comment", e))?;
        Ok(())
    }
}
