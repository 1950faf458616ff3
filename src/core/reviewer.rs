use crate::adapters::llm::{LLMAdapter, LLMRequest};
use crate::core::suggestion::{anchor_suggestions, parse_suggestions, parse_summary};
use crate::core::{
    FileDiff, PromptBuilder, PromptConfig, PullRequestContext, Suggestion, SummaryReview,
};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
pub struct SingleChunkOutcome {
    pub inline: Vec<Suggestion>,
    pub unanchored: Vec<Suggestion>,
    pub failed_files: usize,
}

#[derive(Debug, Default)]
struct FileOutcome {
    inline: Vec<Suggestion>,
    unanchored: Vec<Suggestion>,
    failed: bool,
}

impl FileOutcome {
    fn failed() -> Self {
        Self {
            failed: true,
            ..Default::default()
        }
    }
}

/// Reviews each file's diff on its own and maps the replies onto diff lines.
pub struct SingleChunkReviewer {
    adapter: Arc<dyn LLMAdapter>,
    prompts: Arc<PromptBuilder>,
    max_concurrency: usize,
}

impl SingleChunkReviewer {
    pub fn new(adapter: Arc<dyn LLMAdapter>, max_concurrency: usize) -> Self {
        Self {
            adapter,
            prompts: Arc::new(PromptBuilder::new(PromptConfig::single_chunk())),
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// One request per file, at most `max_concurrency` in flight. A failure
    /// for one file only costs that file's suggestions.
    pub async fn review(
        &self,
        pr: &PullRequestContext,
        files: &[FileDiff],
    ) -> SingleChunkOutcome {
        let mut outcome = SingleChunkOutcome::default();
        if files.is_empty() {
            return outcome;
        }

        info!(
            "Single-chunk review of {} file(s) with {}",
            files.len(),
            self.adapter.model_name()
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let pr = Arc::new(pr.clone());
        let mut tasks = JoinSet::new();

        for file in files.iter().cloned() {
            let adapter = Arc::clone(&self.adapter);
            let prompts = Arc::clone(&self.prompts);
            let pr = Arc::clone(&pr);
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return FileOutcome::failed(),
                };
                review_file(adapter.as_ref(), &prompts, &pr, &file).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(file_outcome) => {
                    outcome.failed_files += usize::from(file_outcome.failed);
                    outcome.inline.extend(file_outcome.inline);
                    outcome.unanchored.extend(file_outcome.unanchored);
                }
                Err(e) => {
                    warn!("Single-chunk review task panicked: {}", e);
                    outcome.failed_files += 1;
                }
            }
        }

        outcome
    }
}

async fn review_file(
    adapter: &dyn LLMAdapter,
    prompts: &PromptBuilder,
    pr: &PullRequestContext,
    file: &FileDiff,
) -> FileOutcome {
    let (system_prompt, user_prompt) = prompts.build_single_chunk(pr, file);
    let request = LLMRequest {
        system_prompt,
        user_prompt,
        temperature: None,
        max_tokens: None,
    };

    let response = match adapter.complete(request).await {
        Ok(response) => response,
        Err(e) => {
            warn!("Skipping single-chunk review of {}: {}", file.path, e);
            return FileOutcome::failed();
        }
    };
    if let Some(usage) = &response.usage {
        debug!("{}: {} tokens used", file.path, usage.total_tokens);
    }

    let suggestions = match parse_suggestions(&file.path, &response.content) {
        Ok(suggestions) => suggestions,
        Err(e) => {
            warn!("Ignoring reply for {}: {}", file.path, e);
            return FileOutcome::failed();
        }
    };

    let anchored = anchor_suggestions(file, suggestions);
    if !anchored.unanchored.is_empty() {
        info!(
            "{} suggestion(s) for {} reference lines outside the diff",
            anchored.unanchored.len(),
            file.path
        );
    }

    FileOutcome {
        inline: anchored.inline,
        unanchored: anchored.unanchored,
        failed: false,
    }
}

/// Produces one overall summary from every file's content and diff.
pub struct FullContextReviewer {
    adapter: Arc<dyn LLMAdapter>,
    prompts: PromptBuilder,
}

impl FullContextReviewer {
    pub fn new(adapter: Arc<dyn LLMAdapter>) -> Self {
        Self {
            adapter,
            prompts: PromptBuilder::new(PromptConfig::full_context()),
        }
    }

    pub async fn review(
        &self,
        pr: &PullRequestContext,
        files: &[FileDiff],
    ) -> Option<SummaryReview> {
        if files.is_empty() {
            return None;
        }

        info!(
            "Full-context review of {} file(s) with {}",
            files.len(),
            self.adapter.model_name()
        );

        let (system_prompt, user_prompt) = self.prompts.build_full_context(pr, files);
        let request = LLMRequest {
            system_prompt,
            user_prompt,
            temperature: None,
            max_tokens: None,
        };

        match self.adapter.complete(request).await {
            Ok(response) => {
                let summary = parse_summary(&response.content);
                if summary.is_none() {
                    info!("Full-context review returned nothing to report");
                }
                summary
            }
            Err(e) => {
                warn!("Full-context review failed: {}", e);
                None
            }
        }
    }
}
