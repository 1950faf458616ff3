use crate::adapters::llm::{create_adapter, LLMAdapter, ModelConfig};
use crate::config::Config;
use crate::core::poster::{CommentPoster, PostReport};
use crate::core::reviewer::{FullContextReviewer, SingleChunkOutcome, SingleChunkReviewer};
use crate::core::{
    DiffParser, FileDiff, FileFilter, PullRequestContext, SummaryReview,
};
use crate::errors::{ReviewError, ReviewResult};
use crate::hosting::ReviewHost;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What a run did, logged once at the end.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub files_reviewed: usize,
    pub files_failed: usize,
    pub suggestions: usize,
    pub anchored: usize,
    pub unanchored: usize,
    pub duplicates_dropped: usize,
    pub comments_posted: usize,
    pub comments_failed: usize,
    pub summary_posted: bool,
}

pub struct ReviewPipeline {
    config: Config,
    filter: FileFilter,
    host: Arc<dyn ReviewHost>,
    single: Option<SingleChunkReviewer>,
    full: Option<FullContextReviewer>,
}

impl ReviewPipeline {
    /// Resolves both review modes. A model with an unknown prefix disables
    /// only its own mode; any other resolution error aborts.
    pub fn from_config(config: Config, host: Arc<dyn ReviewHost>) -> ReviewResult<Self> {
        let single = build_adapter(
            "single-chunk",
            &config.single_chunk_model,
            &config.single_chunk_api_key,
            &config,
        )?;
        let full = build_adapter(
            "full-context",
            &config.full_context_model,
            &config.full_context_api_key,
            &config,
        )?;
        Self::new(config, host, single, full)
    }

    /// Fails with a config error for an invalid exclude glob, before any
    /// hosting call is made.
    pub fn new(
        config: Config,
        host: Arc<dyn ReviewHost>,
        single: Option<Arc<dyn LLMAdapter>>,
        full: Option<Arc<dyn LLMAdapter>>,
    ) -> ReviewResult<Self> {
        let filter = FileFilter::new(&config.exclude)?;
        let max_concurrency = config.max_concurrency;
        Ok(Self {
            config,
            filter,
            host,
            single: single.map(|adapter| SingleChunkReviewer::new(adapter, max_concurrency)),
            full: full.map(FullContextReviewer::new),
        })
    }

    pub async fn run(&self, pr: &PullRequestContext) -> ReviewResult<RunReport> {
        let mut report = RunReport::default();

        info!("Fetching diff for pull request #{}", pr.number);
        let raw_diff = self.host.fetch_diff(pr).await?;
        if raw_diff.trim().is_empty() {
            info!("No diff found, nothing to review");
            return Ok(report);
        }

        let files = self.collect_files(&raw_diff)?;
        if files.is_empty() {
            info!("No reviewable files after filtering");
            return Ok(report);
        }
        report.files_reviewed = files.len();

        let (outcome, summary) = tokio::join!(
            self.review_single_chunk(pr, &files),
            self.review_full_context(pr, &files)
        );

        report.files_failed = outcome.failed_files;
        report.anchored = outcome.inline.len();
        report.unanchored = outcome.unanchored.len();
        report.suggestions = report.anchored + report.unanchored;

        let poster = CommentPoster::new(Arc::clone(&self.host), self.config.dry_run);
        let posted = poster
            .post(pr, outcome.inline, outcome.unanchored, summary)
            .await;
        report.apply(posted);

        info!(
            files = report.files_reviewed,
            failed = report.files_failed,
            suggestions = report.suggestions,
            unanchored = report.unanchored,
            duplicates = report.duplicates_dropped,
            posted = report.comments_posted,
            rejected = report.comments_failed,
            summary = report.summary_posted,
            "Review finished"
        );
        Ok(report)
    }

    fn collect_files(&self, raw_diff: &str) -> ReviewResult<Vec<FileDiff>> {
        let parsed = DiffParser::parse_unified_diff(raw_diff)?;
        debug!("Diff touches {} file(s)", parsed.len());

        Ok(self
            .filter
            .filter_diffs(parsed)
            .iter()
            .map(FileDiff::from_unified)
            .collect())
    }

    async fn review_single_chunk(
        &self,
        pr: &PullRequestContext,
        files: &[FileDiff],
    ) -> SingleChunkOutcome {
        match &self.single {
            Some(reviewer) => reviewer.review(pr, files).await,
            None => SingleChunkOutcome::default(),
        }
    }

    async fn review_full_context(
        &self,
        pr: &PullRequestContext,
        files: &[FileDiff],
    ) -> Option<SummaryReview> {
        let reviewer = self.full.as_ref()?;

        let mut with_content = Vec::with_capacity(files.len());
        for file in files {
            let content = match self.host.fetch_file_content(pr, &file.path).await {
                Ok(content) => Some(content),
                Err(e) => {
                    warn!("Reviewing {} from its diff only: {}", file.path, e);
                    None
                }
            };
            with_content.push(file.clone().with_content(content));
        }

        reviewer.review(pr, &with_content).await
    }
}

impl RunReport {
    fn apply(&mut self, posted: PostReport) {
        self.duplicates_dropped = posted.duplicates_dropped;
        self.comments_posted = posted.inline_posted;
        self.comments_failed = posted.inline_failed;
        self.summary_posted = posted.summary_posted;
    }
}

fn build_adapter(
    mode: &str,
    model: &str,
    api_key: &str,
    config: &Config,
) -> ReviewResult<Option<Arc<dyn LLMAdapter>>> {
    let model_config = match ModelConfig::resolve(model, api_key, config) {
        Ok(model_config) => model_config,
        Err(e @ ReviewError::UnsupportedModel(_)) => {
            error!("Skipping {} review: {}", mode, e);
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    match create_adapter(&model_config) {
        Ok(adapter) => {
            info!(
                "{} review uses {} via {}",
                mode, model_config.model_name, model_config.provider
            );
            Ok(Some(Arc::from(adapter)))
        }
        Err(e) => {
            error!("Skipping {} review: {}", mode, e);
            Ok(None)
        }
    }
}
