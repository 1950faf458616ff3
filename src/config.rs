use crate::core::FileFilter;
use crate::errors::{ReviewError, ReviewResult};
use crate::hosting::Platform;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE_NAMES: [&str; 2] = [".ai-pr-review.yml", ".ai-pr-review.yaml"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_model")]
    pub full_context_model: String,

    #[serde(default = "default_model")]
    pub single_chunk_model: String,

    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,

    #[serde(default)]
    pub platform: Platform,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default)]
    pub base_urls: BaseUrls,

    #[serde(default)]
    pub dry_run: bool,

    // Secrets only ever come from the CLI or the environment.
    #[serde(skip)]
    pub access_token: String,

    #[serde(skip)]
    pub full_context_api_key: String,

    #[serde(skip)]
    pub single_chunk_api_key: String,
}

/// Optional endpoint overrides, mostly for proxies and tests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BaseUrls {
    pub openai: Option<String>,
    pub anthropic: Option<String>,
    pub google: Option<String>,
    pub deepseek: Option<String>,
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub access_token: Option<String>,
    pub full_context_model: Option<String>,
    pub full_context_api_key: Option<String>,
    pub single_chunk_model: Option<String>,
    pub single_chunk_api_key: Option<String>,
    pub exclude: Option<String>,
    pub platform: Option<Platform>,
    pub max_concurrency: Option<usize>,
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            full_context_model: default_model(),
            single_chunk_model: default_model(),
            exclude: default_exclude(),
            platform: Platform::default(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            max_concurrency: default_max_concurrency(),
            base_urls: BaseUrls::default(),
            dry_run: false,
            access_token: String::new(),
            full_context_api_key: String::new(),
            single_chunk_api_key: String::new(),
        }
    }
}

impl Config {
    pub fn load() -> ReviewResult<Self> {
        for name in CONFIG_FILE_NAMES {
            let path = PathBuf::from(name);
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        if let Some(home_dir) = dirs::home_dir() {
            let home_config = home_dir.join(CONFIG_FILE_NAMES[0]);
            if home_config.exists() {
                return Self::load_from(&home_config);
            }
        }

        Ok(Config::default())
    }

    pub fn load_from(path: &Path) -> ReviewResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ReviewError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_yaml::from_str(&content)
            .map_err(|e| ReviewError::Config(format!("invalid {}: {}", path.display(), e)))
    }

    pub fn merge_with_cli(&mut self, cli: CliOverrides) {
        if let Some(token) = cli.access_token {
            self.access_token = token;
        }
        if let Some(model) = cli.full_context_model {
            self.full_context_model = model;
        }
        if let Some(key) = cli.full_context_api_key {
            self.full_context_api_key = key;
        }
        if let Some(model) = cli.single_chunk_model {
            self.single_chunk_model = model;
        }
        if let Some(key) = cli.single_chunk_api_key {
            self.single_chunk_api_key = key;
        }
        if let Some(exclude) = cli.exclude {
            self.exclude = split_patterns(&exclude);
        }
        if let Some(platform) = cli.platform {
            self.platform = platform;
        }
        if let Some(limit) = cli.max_concurrency {
            self.max_concurrency = limit;
        }
        self.dry_run |= cli.dry_run;
    }

    /// Rejects missing inputs before any network call is made.
    pub fn validate(&self) -> ReviewResult<()> {
        let required = [
            ("access-token", &self.access_token),
            ("full-context-model", &self.full_context_model),
            ("full-context-api-key", &self.full_context_api_key),
            ("single-chunk-model", &self.single_chunk_model),
            ("single-chunk-api-key", &self.single_chunk_api_key),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ReviewError::Config(format!("missing required input `{}`", name)));
            }
        }

        if self.max_concurrency == 0 {
            return Err(ReviewError::Config("max-concurrency must be at least 1".to_string()));
        }
        if self.max_tokens == 0 {
            return Err(ReviewError::Config("max_tokens must be at least 1".to_string()));
        }
        FileFilter::new(&self.exclude)?;

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Splits the comma-separated `exclude-files` input, ignoring blank entries.
pub fn split_patterns(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_exclude() -> Vec<String> {
    vec!["*.yml".to_string(), "*.yaml".to_string()]
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> usize {
    4096
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_concurrency() -> usize {
    4
}
