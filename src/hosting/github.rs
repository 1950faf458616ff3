use crate::core::{PullRequestContext, Suggestion};
use crate::errors::ReviewResult;
use crate::hosting::{api_url, hosting_error, ReviewHost};
use crate::http::{build_client, send_with_retry, send_write};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const DIFF_MEDIA_TYPE: &str = "application/vnd.github.v3.diff";
const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw";

/// GitHub REST v3 client.
pub struct GitHubHost {
    client: Client,
    headers: HeaderMap,
}

#[derive(Serialize)]
struct ReviewComment<'a> {
    body: &'a str,
    commit_id: &'a str,
    path: &'a str,
    line: usize,
    side: &'a str,
}

#[derive(Serialize)]
struct IssueComment<'a> {
    body: &'a str,
}

impl GitHubHost {
    pub fn new(token: &str, timeout: Duration) -> ReviewResult<Self> {
        let client =
            build_client(timeout).map_err(|e| hosting_error("building HTTP client", e))?;
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| hosting_error("access token", e))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert("x-github-api-version", HeaderValue::from_static("2022-11-28"));

        Ok(Self { client, headers })
    }

    fn request(&self, method: Method, url: &Url, accept: &'static str) -> RequestBuilder {
        self.client
            .request(method, url.clone())
            .headers(self.headers.clone())
            .header(ACCEPT, accept)
    }
}

#[async_trait]
impl ReviewHost for GitHubHost {
    async fn fetch_diff(&self, pr: &PullRequestContext) -> ReviewResult<String> {
        let number = pr.number.to_string();
        let url = api_url(&pr.repo_api_url, &["pulls", &number], None)?;
        debug!("Fetching diff from {}", url);

        let response = send_with_retry(|| self.request(Method::GET, &url, DIFF_MEDIA_TYPE))
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
        let mut url = api_url(&pr.head_repo_api_url, &["contents"], Some(path))?;
        url.query_pairs_mut().append_pair("ref", &pr.head_sha);

        let response = send_with_retry(|| self.request(Method::GET, &url, RAW_MEDIA_TYPE))
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
        let url = api_url(&pr.repo_api_url, &["pulls", &number, "comments"], None)?;
        let comment = ReviewComment {
            body,
            commit_id: &pr.head_sha,
            path: &suggestion.path,
            line: suggestion.line,
            side: "RIGHT",
        };

        send_write(|| self.request(Method::POST, &url, JSON_MEDIA_TYPE).json(&comment))
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

        send_write(|| {
            self.request(Method::POST, &url, JSON_MEDIA_TYPE)
                .json(&IssueComment { body })
        })
        .await
        .map_err(|e| hosting_error("posting pull request comment", e))?;
        Ok(())
    }
}
