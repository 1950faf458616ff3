pub mod diff_parser;
pub mod event;
pub mod file_diff;
pub mod filter;
pub mod pipeline;
pub mod poster;
pub mod prompt;
pub mod reviewer;
pub mod suggestion;

pub use diff_parser::{DiffParser, UnifiedDiff};
pub use event::{PullRequestContext, PullRequestEvent};
pub use file_diff::FileDiff;
pub use filter::FileFilter;
pub use pipeline::ReviewPipeline;
pub use prompt::{PromptBuilder, PromptConfig};
pub use suggestion::{Suggestion, SummaryReview};
