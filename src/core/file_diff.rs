use crate::core::UnifiedDiff;
use std::collections::BTreeSet;

/// One changed, reviewable file as handed to the reviewers.
#[derive(Debug, Clone)]
pub struct FileDiff {
    pub path: String,
    pub diff: String,
    pub commentable_lines: BTreeSet<usize>,
    pub content: Option<String>,
}

impl FileDiff {
    pub fn from_unified(diff: &UnifiedDiff) -> Self {
        Self {
            path: diff.path_str(),
            diff: diff.render_numbered(),
            commentable_lines: diff.new_line_numbers(),
            content: None,
        }
    }

    pub fn with_content(mut self, content: Option<String>) -> Self {
        self.content = content;
        self
    }

    pub fn can_anchor(&self, line: usize) -> bool {
        self.commentable_lines.contains(&line)
    }
}
