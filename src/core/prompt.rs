use crate::core::{FileDiff, PullRequestContext};

const SINGLE_CHUNK_SYSTEM_PROMPT: &str = r#"You review pull requests one file at a time.

Reply with a JSON array and nothing else:
[{"lineNumber": <number>, "reviewComment": "<comment>"}]

Rules:
- lineNumber is the new-file line number printed at the start of each diff line. Only use numbered lines.
- Comment only when something should change: bugs, security problems, broken edge cases, performance traps, unclear logic.
- No praise, no summaries, no restating what the code does.
- Never ask for comments or docstrings to be added.
- Use the pull request description only as background; review the code.
- Write each reviewComment in GitHub-flavoured Markdown.
- If there is nothing to improve, reply with []."#;

const SINGLE_CHUNK_USER_TEMPLATE: &str = r#"Review the diff of `{file}`.

Pull request title: {title}
Pull request description:
---
{description}
---

Diff (new-file line numbers on the left):
```diff
{diff}
```"#;

const FULL_CONTEXT_SYSTEM_PROMPT: &str = r#"You are a senior engineer writing the overall review of a pull request.

Assess the change as a whole:
1. Structure and architecture: organisation, modularity, separation of concerns.
2. Refactoring: places that can be simplified or de-duplicated without changing behaviour.
3. Future risk: scalability, maintainability and dependency problems this change sets up.

Rules:
- Stay at the design level; skip trivia and syntax nits.
- No praise or compliments.
- Include a short code or pseudo-code example where it makes a suggestion concrete.
- Write GitHub-flavoured Markdown, without wrapping the whole reply in a code fence.
- If there is nothing worth raising, reply with an empty message."#;

const FULL_CONTEXT_USER_TEMPLATE: &str = r#"Review this pull request.

Pull request title: {title}
Pull request description:
---
{description}
---

Changed files:
{files}"#;

#[derive(Debug, Clone)]
pub struct PromptConfig {
    pub system_prompt: String,
    pub user_prompt_template: String,
    pub max_context_chars: usize,
}

impl PromptConfig {
    pub fn single_chunk() -> Self {
        Self {
            system_prompt: SINGLE_CHUNK_SYSTEM_PROMPT.to_string(),
            user_prompt_template: SINGLE_CHUNK_USER_TEMPLATE.to_string(),
            max_context_chars: 60_000,
        }
    }

    pub fn full_context() -> Self {
        Self {
            system_prompt: FULL_CONTEXT_SYSTEM_PROMPT.to_string(),
            user_prompt_template: FULL_CONTEXT_USER_TEMPLATE.to_string(),
            max_context_chars: 200_000,
        }
    }
}

pub struct PromptBuilder {
    config: PromptConfig,
}

impl PromptBuilder {
    pub fn new(config: PromptConfig) -> Self {
        Self { config }
    }

    pub fn build_single_chunk(
        &self,
        pr: &PullRequestContext,
        file: &FileDiff,
    ) -> (String, String) {
        let diff = truncate_chars(&file.diff, self.config.max_context_chars);
        let user_prompt = fill_template(
            &self.config.user_prompt_template,
            &[
                ("file", file.path.as_str()),
                ("title", pr.title.as_str()),
                ("description", description_or_placeholder(&pr.body)),
                ("diff", diff.trim_end()),
            ],
        );

        (self.config.system_prompt.clone(), user_prompt)
    }

    pub fn build_full_context(
        &self,
        pr: &PullRequestContext,
        files: &[FileDiff],
    ) -> (String, String) {
        let mut sections = String::new();
        for file in files {
            let mut block = format!("File: {}\n", file.path);
            if let Some(content) = &file.content {
                block.push_str("Content:\n```\n");
                block.push_str(content.trim_end());
                block.push_str("\n```\n");
            }
            block.push_str("Diff:\n```diff\n");
            block.push_str(file.diff.trim_end());
            block.push_str("\n```\n\n");

            if self.config.max_context_chars > 0
                && sections.len().saturating_add(block.len()) > self.config.max_context_chars
            {
                sections.push_str("[Remaining files truncated]\n");
                break;
            }
            sections.push_str(&block);
        }

        let user_prompt = fill_template(
            &self.config.user_prompt_template,
            &[
                ("title", pr.title.as_str()),
                ("description", description_or_placeholder(&pr.body)),
                ("files", sections.trim_end()),
            ],
        );

        (self.config.system_prompt.clone(), user_prompt)
    }
}

/// Substitutes `{name}` placeholders in a single pass. Inserted values are
/// never scanned again, so braces in titles, descriptions or code stay as is.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        output.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });

        match value {
            Some((value, close)) => {
                output.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                output.push('{');
                rest = after;
            }
        }
    }

    output.push_str(rest);
    output
}

fn description_or_placeholder(body: &str) -> &str {
    if body.trim().is_empty() {
        "(no description)"
    } else {
        body.trim()
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if max_chars == 0 || text.len() <= max_chars {
        return text.to_string();
    }
    let mut end = max_chars;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n[diff truncated]", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn pr() -> PullRequestContext {
        PullRequestContext {
            repo_api_url: "https://git.example.com/api/v1/repos/acme/app".to_string(),
            head_repo_api_url: "https://git.example.com/api/v1/repos/acme/app".to_string(),
            number: 7,
            base_sha: "base".to_string(),
            head_sha: "head".to_string(),
            title: "Add retry to uploader".to_string(),
            body: String::new(),
        }
    }

    fn file(path: &str, content: Option<&str>) -> FileDiff {
        FileDiff {
            path: path.to_string(),
            diff: "@@ -1 +1 @@\n  -a\n1 +b\n".to_string(),
            commentable_lines: BTreeSet::from([1]),
            content: content.map(str::to_string),
        }
    }

    #[test]
    fn single_chunk_prompt_carries_file_title_and_diff() {
        let builder = PromptBuilder::new(PromptConfig::single_chunk());
        let (system, user) = builder.build_single_chunk(&pr(), &file("src/upload.py", None));

        assert!(system.contains("\"lineNumber\""));
        assert!(system.contains("\"reviewComment\""));
        assert!(user.contains("`src/upload.py`"));
        assert!(user.contains("Add retry to uploader"));
        assert!(user.contains("(no description)"));
        assert!(user.contains("1 +b"));
        assert!(!user.contains("{diff}"));
    }

    #[test]
    fn full_context_prompt_lists_every_file() {
        let builder = PromptBuilder::new(PromptConfig::full_context());
        let files = vec![
            file("a.py", Some("print('a')\n")),
            file("b.py", None),
        ];
        let (_, user) = builder.build_full_context(&pr(), &files);

        assert!(user.contains("File: a.py\nContent:\n```\nprint('a')\n```"));
        assert!(user.contains("File: b.py\nDiff:"));
        assert!(!user.contains("{files}"));
    }

    #[test]
    fn full_context_prompt_truncates_past_budget() {
        let mut config = PromptConfig::full_context();
        config.max_context_chars = 80;
        let builder = PromptBuilder::new(config);
        let files = vec![file("a.py", None), file("b.py", None), file("c.py", None)];
        let (_, user) = builder.build_full_context(&pr(), &files);

        assert!(user.contains("File: a.py"));
        assert!(!user.contains("File: c.py"));
        assert!(user.contains("[Remaining files truncated]"));
    }

    #[test]
    fn placeholders_in_pull_request_text_are_not_expanded() {
        let builder = PromptBuilder::new(PromptConfig::single_chunk());
        let mut pr = pr();
        pr.title = "Fix {diff} handling".to_string();
        pr.body = "see {diff} and {title}".to_string();
        let mut file = file("src/{file}.py", None);
        file.diff = "@@ -1 +1 @@\n1 +UNIQUE_DIFF_LINE\n".to_string();

        let (_, user) = builder.build_single_chunk(&pr, &file);

        assert_eq!(user.matches("UNIQUE_DIFF_LINE").count(), 1);
        assert!(user.contains("Pull request title: Fix {diff} handling"));
        assert!(user.contains("see {diff} and {title}"));
        assert!(user.contains("`src/{file}.py`"));
    }

    #[test]
    fn full_context_title_cannot_pull_in_the_description() {
        let builder = PromptBuilder::new(PromptConfig::full_context());
        let mut pr = pr();
        pr.title = "{description}".to_string();
        pr.body = "see {files}".to_string();

        let (_, user) = builder.build_full_context(&pr, &[file("a.py", Some("x = {}\n"))]);

        assert!(user.contains("Pull request title: {description}\n"));
        assert!(user.contains("see {files}"));
        assert_eq!(user.matches("File: a.py").count(), 1);
        assert!(user.contains("x = {}"));
    }

    #[test]
    fn fill_template_keeps_unknown_and_unclosed_braces() {
        let filled = fill_template("{a} {b} {a", &[("a", "1")]);
        assert_eq!(filled, "1 {b} {a");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let text = "ééééé";
        let out = truncate_chars(text, 3);
        assert!(out.starts_with("é"));
        assert!(out.ends_with("[diff truncated]"));
    }
}
