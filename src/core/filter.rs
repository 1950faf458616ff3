use crate::core::UnifiedDiff;
use crate::errors::{ReviewError, ReviewResult};
use glob::{MatchOptions, Pattern};
use tracing::info;

/// Drops changed files whose path matches any exclusion glob.
///
/// Matching is case-sensitive and `*` also crosses `/`, so `*.yml` excludes
/// `.github/workflows/ci.yml` as well as `ci.yml`.
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    patterns: Vec<Pattern>,
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

impl FileFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> ReviewResult<Self> {
        let patterns = patterns
            .iter()
            .map(|p| p.as_ref().trim())
            .filter(|p| !p.is_empty())
            .map(|p| {
                Pattern::new(p).map_err(|e| {
                    ReviewError::Config(format!("invalid exclude pattern `{}`: {}", p, e))
                })
            })
            .collect::<ReviewResult<Vec<_>>>()?;

        Ok(Self { patterns })
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.patterns
            .iter()
            .any(|pattern| pattern.matches_with(path, MATCH_OPTIONS))
    }

    #[cfg(test)]
    pub fn filter_paths<'a>(&self, paths: &[&'a str]) -> Vec<&'a str> {
        paths
            .iter()
            .copied()
            .filter(|path| !self.is_excluded(path))
            .collect()
    }

    /// Keeps reviewable diffs for non-excluded files, logging each skip.
    pub fn filter_diffs(&self, diffs: Vec<UnifiedDiff>) -> Vec<UnifiedDiff> {
        diffs
            .into_iter()
            .filter(|diff| {
                let path = diff.path_str();
                if self.is_excluded(&path) {
                    info!("Excluding file: {}", path);
                    false
                } else if diff.is_deleted {
                    info!("Skipping deleted file: {}", path);
                    false
                } else if !diff.is_reviewable() {
                    info!("Skipping non-text diff: {}", path);
                    false
                } else {
                    true
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DiffParser;

    #[test]
    fn excludes_matching_paths() {
        let filter = FileFilter::new(&["*.yaml"]).unwrap();
        assert_eq!(filter.filter_paths(&["a.py", "b.yaml"]), vec!["a.py"]);
    }

    #[test]
    fn star_crosses_directories() {
        let filter = FileFilter::new(&["*.yml", "*.yaml"]).unwrap();
        assert!(filter.is_excluded(".gitea/workflows/review.yml"));
        assert!(filter.is_excluded("deploy/values.yaml"));
        assert!(!filter.is_excluded("src/yaml.rs"));
    }

    #[test]
    fn matching_is_case_sensitive() {
        let filter = FileFilter::new(&["*.yml"]).unwrap();
        assert!(!filter.is_excluded("CI.YML"));
        assert!(filter.is_excluded("ci.yml"));
    }

    #[test]
    fn empty_pattern_list_passes_everything() {
        let filter = FileFilter::new::<&str>(&[]).unwrap();
        let paths = ["a.py", "b.yaml", "docs/readme.md"];
        assert_eq!(filter.filter_paths(&paths), paths.to_vec());

        let blank_only = FileFilter::new(&["", "  "]).unwrap();
        assert_eq!(blank_only.filter_paths(&paths), paths.to_vec());
    }

    #[test]
    fn supports_character_classes_and_directory_globs() {
        let filter = FileFilter::new(&["docs/*", "*.[ch]"]).unwrap();
        assert_eq!(
            filter.filter_paths(&["docs/a.md", "src/x.c", "src/x.h", "src/x.rs"]),
            vec!["src/x.rs"]
        );
    }

    #[test]
    fn invalid_pattern_is_config_error() {
        assert!(matches!(FileFilter::new(&["[unclosed"]), Err(ReviewError::Config(_))));
    }

    #[test]
    fn excluded_paths_never_survive_any_pattern_set() {
        let paths = ["a.py", "b.yaml", "c/d.yml", "e.lock", "f/g/h.rs", "Makefile"];
        let pattern_sets: [&[&str]; 5] = [
            &["*.yaml"],
            &["*.yml", "*.yaml"],
            &["f/*"],
            &["*"],
            &["?akefile", "*.lock"],
        ];

        for patterns in pattern_sets {
            let filter = FileFilter::new(patterns).unwrap();
            for kept in filter.filter_paths(&paths) {
                for raw in patterns {
                    assert!(
                        !Pattern::new(raw).unwrap().matches_with(kept, MATCH_OPTIONS),
                        "{kept} matches {raw} but was kept"
                    );
                }
            }
        }
    }

    #[test]
    fn filter_diffs_drops_excluded_and_deleted_files() {
        let diff_text = "\
diff --git a/a.py b/a.py
--- a/a.py
+++ b/a.py
@@ -1 +1 @@
-x = 1
+x = 2
diff --git a/b.yaml b/b.yaml
--- a/b.yaml
+++ b/b.yaml
@@ -1 +1 @@
-k: 1
+k: 2
diff --git a/gone.py b/gone.py
deleted file mode 100644
--- a/gone.py
+++ /dev/null
@@ -1 +0,0 @@
-print()
";
        let diffs = DiffParser::parse_unified_diff(diff_text).unwrap();
        let filter = FileFilter::new(&["*.yaml"]).unwrap();
        let kept: Vec<String> = filter
            .filter_diffs(diffs)
            .iter()
            .map(UnifiedDiff::path_str)
            .collect();
        assert_eq!(kept, vec!["a.py"]);
    }
}
