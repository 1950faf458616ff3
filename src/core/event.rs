use crate::errors::{ReviewError, ReviewResult};
use serde::Deserialize;
use std::path::Path;

/// PR actions that trigger a review. Gitea reports pushes as `synchronized`,
/// GitHub as `synchronize`.
const REVIEWABLE_ACTIONS: [&str; 4] = ["opened", "reopened", "synchronize", "synchronized"];

#[derive(Debug, Deserialize)]
pub struct PullRequestEvent {
    pub action: String,
    pub number: Option<u64>,
    pub pull_request: Option<EventPullRequest>,
}

#[derive(Debug, Deserialize)]
pub struct EventPullRequest {
    pub number: Option<u64>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub base: EventBranch,
    pub head: EventBranch,
}

#[derive(Debug, Deserialize)]
pub struct EventBranch {
    pub sha: String,
    pub repo: EventRepo,
}

#[derive(Debug, Deserialize)]
pub struct EventRepo {
    pub url: String,
}

/// Everything about the pull request under review that stays fixed for the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestContext {
    pub repo_api_url: String,
    pub head_repo_api_url: String,
    pub number: u64,
    pub base_sha: String,
    pub head_sha: String,
    pub title: String,
    pub body: String,
}

impl PullRequestEvent {
    pub fn load(path: &Path) -> ReviewResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ReviewError::Event(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> ReviewResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| ReviewError::Event(format!("invalid event JSON: {}", e)))
    }

    pub fn is_reviewable(&self) -> bool {
        REVIEWABLE_ACTIONS.contains(&self.action.as_str())
    }

    pub fn into_context(self) -> ReviewResult<PullRequestContext> {
        let pr = self
            .pull_request
            .ok_or_else(|| ReviewError::Event("event has no pull_request object".to_string()))?;
        let number = self
            .number
            .or(pr.number)
            .ok_or_else(|| ReviewError::Event("event has no pull request number".to_string()))?;

        Ok(PullRequestContext {
            repo_api_url: pr.base.repo.url.trim_end_matches('/').to_string(),
            head_repo_api_url: pr.head.repo.url.trim_end_matches('/').to_string(),
            number,
            base_sha: pr.base.sha,
            head_sha: pr.head.sha,
            title: pr.title,
            body: pr.body.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const GITEA_EVENT: &str = r#"{
        "action": "synchronized",
        "number": 42,
        "pull_request": {
            "id": 9,
            "number": 42,
            "title": "Speed up parser",
            "body": null,
            "diff_url": "https://git.example.com/acme/app/pulls/42.diff",
            "base": {"ref": "main", "sha": "aaa111", "repo": {"url": "https://git.example.com/api/v1/repos/acme/app"}},
            "head": {"ref": "fast", "sha": "bbb222", "repo": {"url": "https://git.example.com/api/v1/repos/dev/app/"}}
        }
    }"#;

    #[test]
    fn builds_context_from_gitea_event() {
        let event = PullRequestEvent::parse(GITEA_EVENT).unwrap();
        assert!(event.is_reviewable());

        let ctx = event.into_context().unwrap();
        assert_eq!(ctx.number, 42);
        assert_eq!(ctx.repo_api_url, "https://git.example.com/api/v1/repos/acme/app");
        assert_eq!(ctx.head_repo_api_url, "https://git.example.com/api/v1/repos/dev/app");
        assert_eq!(ctx.base_sha, "aaa111");
        assert_eq!(ctx.head_sha, "bbb222");
        assert_eq!(ctx.title, "Speed up parser");
        assert_eq!(ctx.body, "");
    }

    #[test]
    fn only_open_and_push_actions_are_reviewed() {
        for (action, expected) in [
            ("opened", true),
            ("reopened", true),
            ("synchronize", true),
            ("synchronized", true),
            ("closed", false),
            ("labeled", false),
            ("edited", false),
        ] {
            let event = PullRequestEvent {
                action: action.to_string(),
                number: Some(1),
                pull_request: None,
            };
            assert_eq!(event.is_reviewable(), expected, "{action}");
        }
    }

    #[test]
    fn missing_pull_request_is_an_event_error() {
        let event = PullRequestEvent::parse(r#"{"action": "opened", "number": 3}"#).unwrap();
        assert!(matches!(event.into_context(), Err(ReviewError::Event(_))));
    }

    #[test]
    fn load_reports_unreadable_files() {
        let err = PullRequestEvent::load(Path::new("/nonexistent/event.json")).unwrap_err();
        assert!(matches!(err, ReviewError::Event(_)));
    }

    #[test]
    fn load_reads_event_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(GITEA_EVENT.as_bytes()).unwrap();
        let event = PullRequestEvent::load(file.path()).unwrap();
        assert_eq!(event.action, "synchronized");
    }
}
