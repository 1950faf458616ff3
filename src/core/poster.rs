use crate::core::suggestion::{deduplicate, render_general_notes};
use crate::core::{PullRequestContext, Suggestion, SummaryReview};
use crate::hosting::ReviewHost;
use std::sync::Arc;
use tracing::{info, warn};

const INLINE_PREFIX: &str = "[REVIEW]";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PostReport {
    pub inline_posted: usize,
    pub inline_failed: usize,
    pub duplicates_dropped: usize,
    pub summary_posted: bool,
}

pub struct CommentPoster {
    host: Arc<dyn ReviewHost>,
    dry_run: bool,
}

impl CommentPoster {
    pub fn new(host: Arc<dyn ReviewHost>, dry_run: bool) -> Self {
        Self { host, dry_run }
    }

    /// Posts every inline suggestion, then one pull request comment holding
    /// the summary and any suggestions that could not be anchored. A
    /// rejected inline comment is logged and skipped.
    pub async fn post(
        &self,
        pr: &PullRequestContext,
        mut inline: Vec<Suggestion>,
        mut unanchored: Vec<Suggestion>,
        summary: Option<SummaryReview>,
    ) -> PostReport {
        let mut report = PostReport::default();
        let before = inline.len() + unanchored.len();
        deduplicate(&mut inline);
        deduplicate(&mut unanchored);
        report.duplicates_dropped = before - inline.len() - unanchored.len();

        for suggestion in &inline {
            let body = format_inline_body(&suggestion.body);
            if self.dry_run {
                info!("[dry-run] {}:{} {}", suggestion.path, suggestion.line, body);
                report.inline_posted += 1;
                continue;
            }

            match self.host.post_inline_comment(pr, suggestion, &body).await {
                Ok(()) => report.inline_posted += 1,
                Err(e) => {
                    warn!(
                        "Could not post comment on {}:{}: {}",
                        suggestion.path, suggestion.line, e
                    );
                    report.inline_failed += 1;
                }
            }
        }

        let Some(body) = compose_summary(summary, &unanchored) else {
            return report;
        };

        if self.dry_run {
            info!("[dry-run] pull request comment:\n{}", body);
            report.summary_posted = true;
            return report;
        }

        match self.host.post_pr_comment(pr, &body).await {
            Ok(()) => report.summary_posted = true,
            Err(e) => warn!("Could not post summary comment: {}", e),
        }
        report
    }
}

fn format_inline_body(text: &str) -> String {
    format!("{} {}", INLINE_PREFIX, text.trim())
}

fn compose_summary(summary: Option<SummaryReview>, unanchored: &[Suggestion]) -> Option<String> {
    match (summary, unanchored.is_empty()) {
        (None, true) => None,
        (Some(summary), true) => Some(summary.body),
        (None, false) => Some(render_general_notes(unanchored).trim_end().to_string()),
        (Some(summary), false) => Some(format!(
            "{}\n\n{}",
            summary.body.trim_end(),
            render_general_notes(unanchored).trim_end()
        )),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::errors::{ReviewError, ReviewResult};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum Posted {
        Inline { path: String, line: usize, body: String },
        Comment(String),
    }

    /// In-memory host that records what would have been posted.
    #[derive(Default)]
    pub(crate) struct RecordingHost {
        pub diff: String,
        pub contents: HashMap<String, String>,
        pub reject_lines: Vec<usize>,
        pub fail_diff: bool,
        pub posted: Mutex<Vec<Posted>>,
    }

    impl RecordingHost {
        pub(crate) fn posted(&self) -> Vec<Posted> {
            self.posted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReviewHost for RecordingHost {
        async fn fetch_diff(&self, _pr: &PullRequestContext) -> ReviewResult<String> {
            if self.fail_diff {
                return Err(ReviewError::Hosting("HTTP 404 Not Found".to_string()));
            }
            Ok(self.diff.clone())
        }

        async fn fetch_file_content(
            &self,
            _pr: &PullRequestContext,
            path: &str,
        ) -> ReviewResult<String> {
            self.contents
                .get(path)
                .cloned()
                .ok_or_else(|| ReviewError::Hosting(format!("{} not found", path)))
        }

        async fn post_inline_comment(
            &self,
            _pr: &PullRequestContext,
            suggestion: &Suggestion,
            body: &str,
        ) -> ReviewResult<()> {
            if self.reject_lines.contains(&suggestion.line) {
                return Err(ReviewError::Hosting("HTTP 422: line is outside the diff".to_string()));
            }
            self.posted.lock().unwrap().push(Posted::Inline {
                path: suggestion.path.clone(),
                line: suggestion.line,
                body: body.to_string(),
            });
            Ok(())
        }

        async fn post_pr_comment(&self, _pr: &PullRequestContext, body: &str) -> ReviewResult<()> {
            self.posted.lock().unwrap().push(Posted::Comment(body.to_string()));
            Ok(())
        }
    }

    fn pr() -> PullRequestContext {
        crate::core::reviewer::tests::pr()
    }

    fn suggestion(path: &str, line: usize, body: &str) -> Suggestion {
        Suggestion {
            path: path.to_string(),
            line,
            body: body.to_string(),
        }
    }

    #[tokio::test]
    async fn posts_prefixed_inline_comments_once() {
        let host = Arc::new(RecordingHost::default());
        let poster = CommentPoster::new(host.clone(), false);

        let report = poster
            .post(
                &pr(),
                vec![
                    suggestion("a.py", 3, "Check for None."),
                    suggestion("a.py", 3, "Check for None."),
                ],
                Vec::new(),
                None,
            )
            .await;

        assert_eq!(report.inline_posted, 1);
        assert_eq!(report.duplicates_dropped, 1);
        assert!(!report.summary_posted);
        assert_eq!(
            host.posted(),
            vec![Posted::Inline {
                path: "a.py".to_string(),
                line: 3,
                body: "[REVIEW] Check for None.".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn rejected_inline_comment_does_not_stop_the_rest() {
        let host = Arc::new(RecordingHost {
            reject_lines: vec![1],
            ..Default::default()
        });
        let poster = CommentPoster::new(host.clone(), false);

        let report = poster
            .post(
                &pr(),
                vec![suggestion("a.py", 1, "first"), suggestion("a.py", 2, "second")],
                Vec::new(),
                Some(SummaryReview { body: "Overall fine.".to_string() }),
            )
            .await;

        assert_eq!(report.inline_posted, 1);
        assert_eq!(report.inline_failed, 1);
        assert!(report.summary_posted);
        assert_eq!(host.posted().last(), Some(&Posted::Comment("Overall fine.".to_string())));
    }

    #[tokio::test]
    async fn unanchored_suggestions_join_the_summary() {
        let host = Arc::new(RecordingHost::default());
        let poster = CommentPoster::new(host.clone(), false);

        poster
            .post(
                &pr(),
                Vec::new(),
                vec![suggestion("b.py", 90, "Outside the diff.")],
                Some(SummaryReview { body: "Split the module.".to_string() }),
            )
            .await;

        let posted = host.posted();
        assert_eq!(posted.len(), 1);
        let Posted::Comment(body) = &posted[0] else {
            panic!("expected a pull request comment, got {:?}", posted[0]);
        };
        assert!(body.starts_with("Split the module.\n\n### General notes"));
        assert!(body.contains("- `b.py:90`: Outside the diff."));
    }

    #[tokio::test]
    async fn unanchored_suggestions_without_summary_get_own_comment() {
        let host = Arc::new(RecordingHost::default());
        let poster = CommentPoster::new(host.clone(), false);

        let report = poster
            .post(&pr(), Vec::new(), vec![suggestion("b.py", 90, "Far away.")], None)
            .await;

        assert!(report.summary_posted);
        assert!(matches!(
            &host.posted()[0],
            Posted::Comment(body) if body.starts_with("### General notes")
        ));
    }

    #[tokio::test]
    async fn dry_run_posts_nothing() {
        let host = Arc::new(RecordingHost::default());
        let poster = CommentPoster::new(host.clone(), true);

        let report = poster
            .post(
                &pr(),
                vec![suggestion("a.py", 1, "x")],
                Vec::new(),
                Some(SummaryReview { body: "y".to_string() }),
            )
            .await;

        assert_eq!(report.inline_posted, 1);
        assert!(report.summary_posted);
        assert!(host.posted().is_empty());
    }
}
