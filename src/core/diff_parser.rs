use crate::errors::{ReviewError, ReviewResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

static HUNK_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("hunk header regex")
});

const DEV_NULL: &str = "/dev/null";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedDiff {
    pub file_path: PathBuf,
    pub hunks: Vec<DiffHunk>,
    pub is_binary: bool,
    pub is_deleted: bool,
    pub is_new: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffHunk {
    pub old_start: usize,
    pub old_lines: usize,
    pub new_start: usize,
    pub new_lines: usize,
    pub context: String,
    pub changes: Vec<DiffLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffLine {
    pub old_line_no: Option<usize>,
    pub new_line_no: Option<usize>,
    pub change_type: ChangeType,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChangeType {
    Added,
    Removed,
    Context,
}

impl UnifiedDiff {
    pub fn path_str(&self) -> String {
        self.file_path.to_string_lossy().into_owned()
    }

    pub fn is_reviewable(&self) -> bool {
        !self.is_deleted && !self.is_binary && !self.hunks.is_empty()
    }

    /// New-side line numbers that an inline comment can be attached to.
    pub fn new_line_numbers(&self) -> BTreeSet<usize> {
        self.hunks
            .iter()
            .flat_map(|hunk| hunk.changes.iter())
            .filter_map(|line| line.new_line_no)
            .collect()
    }

    /// Renders the diff with new-file line numbers in front of every line a
    /// reviewer may comment on. Removed lines carry no number.
    pub fn render_numbered(&self) -> String {
        let width = self
            .new_line_numbers()
            .iter()
            .next_back()
            .map(|n| n.to_string().len())
            .unwrap_or(1);

        let mut output = String::new();
        for hunk in &self.hunks {
            output.push_str(&hunk.context);
            output.push('\n');
            for change in &hunk.changes {
                let (marker, number) = match change.change_type {
                    ChangeType::Added => ('+', change.new_line_no),
                    ChangeType::Removed => ('-', None),
                    ChangeType::Context => (' ', change.new_line_no),
                };
                match number {
                    Some(n) => output.push_str(&format!("{:>width$} ", n, width = width)),
                    None => output.push_str(&format!("{:>width$} ", "", width = width)),
                }
                output.push(marker);
                output.push_str(&change.content);
                output.push('\n');
            }
        }
        output
    }
}

pub struct DiffParser;

impl DiffParser {
    pub fn parse_unified_diff(diff_content: &str) -> ReviewResult<Vec<UnifiedDiff>> {
        let mut diffs = Vec::new();
        let lines: Vec<&str> = diff_content.lines().collect();
        let mut i = 0;

        while i < lines.len() {
            if lines[i].starts_with("diff --git ") {
                diffs.push(Self::parse_file_diff(&lines, &mut i, true)?);
            } else if lines[i].starts_with("--- ")
                && i + 1 < lines.len()
                && lines[i + 1].starts_with("+++ ")
            {
                diffs.push(Self::parse_file_diff(&lines, &mut i, false)?);
            } else {
                i += 1;
            }
        }

        Ok(diffs)
    }

    fn parse_file_diff(
        lines: &[&str],
        i: &mut usize,
        git_header: bool,
    ) -> ReviewResult<UnifiedDiff> {
        let mut header_path = None;
        if git_header {
            header_path = Self::path_from_git_header(lines[*i]);
            *i += 1;
        }

        let mut old_path = None;
        let mut new_path = None;
        let mut is_binary = false;
        let mut is_deleted = false;
        let mut is_new = false;

        while *i < lines.len() && !lines[*i].starts_with("@@") {
            let line = lines[*i];
            if git_header && line.starts_with("diff --git ") {
                break;
            }
            if let Some(rest) = line.strip_prefix("--- ") {
                if new_path.is_some() {
                    // A second header pair without hunks belongs to the next file.
                    break;
                }
                old_path = Some(Self::path_from_header(rest));
            } else if let Some(rest) = line.strip_prefix("+++ ") {
                new_path = Some(Self::path_from_header(rest));
            } else if line.starts_with("deleted file mode") {
                is_deleted = true;
            } else if line.starts_with("new file mode") {
                is_new = true;
            } else if line.starts_with("Binary files") || line.starts_with("GIT binary patch") {
                is_binary = true;
            }
            *i += 1;
        }

        if new_path.as_deref() == Some(DEV_NULL) {
            is_deleted = true;
        }
        if old_path.as_deref() == Some(DEV_NULL) {
            is_new = true;
        }

        let file_path = new_path
            .filter(|p| p != DEV_NULL)
            .or_else(|| old_path.filter(|p| p != DEV_NULL))
            .or(header_path)
            .ok_or_else(|| ReviewError::Parse("diff section without a file path".to_string()))?;

        let mut hunks = Vec::new();
        while *i < lines.len() && lines[*i].starts_with("@@") {
            hunks.push(Self::parse_hunk(lines, i)?);
        }

        Ok(UnifiedDiff {
            file_path: PathBuf::from(file_path),
            hunks,
            is_binary,
            is_deleted,
            is_new,
        })
    }

    fn path_from_git_header(line: &str) -> Option<String> {
        let rest = line.strip_prefix("diff --git ")?;
        let idx = rest.rfind(" b/")?;
        Some(rest[idx + 3..].trim().to_string())
    }

    fn path_from_header(rest: &str) -> String {
        // Strip the optional timestamp some tools append after a tab.
        let raw = rest.split('\t').next().unwrap_or(rest).trim();
        let raw = raw.trim_matches('"');
        if raw == DEV_NULL {
            return raw.to_string();
        }
        raw.strip_prefix("a/")
            .or_else(|| raw.strip_prefix("b/"))
            .unwrap_or(raw)
            .to_string()
    }

    fn parse_hunk(lines: &[&str], i: &mut usize) -> ReviewResult<DiffHunk> {
        let header = lines[*i];
        let (old_start, old_lines, new_start, new_lines) = Self::parse_hunk_header(header)?;
        *i += 1;

        let mut changes = Vec::new();
        let mut old_line = old_start;
        let mut new_line = new_start;
        let mut old_seen = 0;
        let mut new_seen = 0;

        while *i < lines.len() && (old_seen < old_lines || new_seen < new_lines) {
            let line = lines[*i];
            if line.starts_with("diff --git ") || line.starts_with("@@") {
                break;
            }
            if line.starts_with('\\') {
                // "\ No newline at end of file"
                *i += 1;
                continue;
            }

            let (change_type, content) = match line.chars().next() {
                Some('+') => (ChangeType::Added, &line[1..]),
                Some('-') => (ChangeType::Removed, &line[1..]),
                Some(' ') => (ChangeType::Context, &line[1..]),
                // Some tools strip the single space from blank context lines.
                None => (ChangeType::Context, ""),
                _ => break,
            };

            let diff_line = match change_type {
                ChangeType::Added => {
                    new_seen += 1;
                    new_line += 1;
                    DiffLine {
                        old_line_no: None,
                        new_line_no: Some(new_line - 1),
                        change_type,
                        content: content.to_string(),
                    }
                }
                ChangeType::Removed => {
                    old_seen += 1;
                    old_line += 1;
                    DiffLine {
                        old_line_no: Some(old_line - 1),
                        new_line_no: None,
                        change_type,
                        content: content.to_string(),
                    }
                }
                ChangeType::Context => {
                    old_seen += 1;
                    new_seen += 1;
                    old_line += 1;
                    new_line += 1;
                    DiffLine {
                        old_line_no: Some(old_line - 1),
                        new_line_no: Some(new_line - 1),
                        change_type,
                        content: content.to_string(),
                    }
                }
            };

            changes.push(diff_line);
            *i += 1;
        }

        // Swallow a trailing "no newline" marker that follows the last line.
        while *i < lines.len() && lines[*i].starts_with('\\') {
            *i += 1;
        }

        Ok(DiffHunk {
            old_start,
            old_lines,
            new_start,
            new_lines,
            context: header.to_string(),
            changes,
        })
    }

    fn parse_hunk_header(header: &str) -> ReviewResult<(usize, usize, usize, usize)> {
        let invalid = || ReviewError::Parse(format!("invalid hunk header: {}", header));
        let caps = HUNK_HEADER.captures(header).ok_or_else(invalid)?;

        let number = |idx: usize, default: usize| -> ReviewResult<usize> {
            match caps.get(idx) {
                Some(m) => m.as_str().parse().map_err(|_| invalid()),
                None => Ok(default),
            }
        };

        Ok((number(1, 0)?, number(2, 1)?, number(3, 0)?, number(4, 1)?))
    }
}
