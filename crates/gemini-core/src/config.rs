use crate::error::{CoreError, Result};
use crate::model::{ModelTable, TaskType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Environment variables
// ---------------------------------------------------------------------------

pub const ENV_API_KEY: &str = "GOOGLE_API_KEY";
pub const ENV_FLASH_MODEL: &str = "GEMINI_FLASH_MODEL";
pub const ENV_PRO_MODEL: &str = "GEMINI_PRO_MODEL";
pub const ENV_CLOUD_PROJECT: &str = "GOOGLE_CLOUD_PROJECT";
pub const ENV_CLI_PATH: &str = "GEMINI_CLI_PATH";
pub const ENV_API_BASE_URL: &str = "GEMINI_API_BASE_URL";

/// Looked up in the working directory when no explicit file is given.
pub const CONFIG_FILE: &str = ".gemini-mcp.yaml";

pub const DEFAULT_CLI_BINARY: &str = "gemini";
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Minimum trimmed length for a credential to be worth trying.
pub const MIN_API_KEY_LEN: usize = 10;

// ---------------------------------------------------------------------------
// ApiKey
// ---------------------------------------------------------------------------

/// Hosted API credential. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        self.0.trim()
    }

    /// Minimal shape check: non-empty and at least [`MIN_API_KEY_LEN`] chars.
    pub fn is_plausible(&self) -> bool {
        self.0.trim().chars().count() >= MIN_API_KEY_LEN
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeoutConfig {
    #[serde(default = "default_timeout_secs")]
    pub default_secs: u64,
    /// Overrides keyed by task type name, e.g. `gemini_codebase_analysis: 180`.
    #[serde(default)]
    pub per_task: HashMap<TaskType, u64>,
}

fn default_timeout_secs() -> u64 {
    90
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_secs: default_timeout_secs(),
            per_task: HashMap::new(),
        }
    }
}

impl TimeoutConfig {
    /// Explicit override, then the built-in tier for directory-scope and
    /// summary tasks, then `default_secs`.
    pub fn timeout_for(&self, task: TaskType) -> Duration {
        let secs = self
            .per_task
            .get(&task)
            .copied()
            .or_else(|| builtin_timeout_secs(task))
            .unwrap_or(self.default_secs);
        Duration::from_secs(secs)
    }
}

fn builtin_timeout_secs(task: TaskType) -> Option<u64> {
    match task {
        TaskType::CodebaseAnalysis => Some(120),
        TaskType::SessionSummary => Some(30),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProgressConfig {
    /// Per-read poll interval on the CLI's stdout.
    #[serde(default = "default_read_poll_ms")]
    pub read_poll_ms: u64,
    /// Idle time after which a "still working" notice is emitted.
    #[serde(default = "default_idle_notice_secs")]
    pub idle_notice_secs: u64,
}

fn default_read_poll_ms() -> u64 {
    1000
}

fn default_idle_notice_secs() -> u64 {
    15
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            read_poll_ms: default_read_poll_ms(),
            idle_notice_secs: default_idle_notice_secs(),
        }
    }
}

impl ProgressConfig {
    pub fn read_poll(&self) -> Duration {
        Duration::from_millis(self.read_poll_ms)
    }

    pub fn idle_notice(&self) -> Duration {
        Duration::from_secs(self.idle_notice_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Process-wide, read-only configuration. Built once at start-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_cli_binary")]
    pub cli_binary: String,
    #[serde(default)]
    pub models: ModelTable,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default)]
    pub api: ApiConfig,
    /// Only ever taken from the environment.
    #[serde(skip)]
    pub api_key: Option<ApiKey>,
    /// Passed through to the CLI subprocess when set.
    #[serde(skip)]
    pub cloud_project: Option<String>,
}

fn default_cli_binary() -> String {
    DEFAULT_CLI_BINARY.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cli_binary: default_cli_binary(),
            models: ModelTable::default(),
            timeouts: TimeoutConfig::default(),
            progress: ProgressConfig::default(),
            api: ApiConfig::default(),
            api_key: None,
            cloud_project: None,
        }
    }
}

impl Config {
    /// Defaults, then the YAML file (explicit path, or [`CONFIG_FILE`] under
    /// `root` if present), then environment overrides from `env`.
    pub fn load(
        explicit: Option<&Path>,
        root: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config = match config_file(explicit, root) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(env);
        config.validate()?;
        Ok(config)
    }

    /// [`load`](Self::load) against the real process environment.
    pub fn from_process_env(explicit: Option<&Path>, root: &Path) -> Result<Self> {
        Self::load(explicit, root, |name| std::env::var(name).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&data)?)
    }

    /// Overlay non-blank environment values.
    pub fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_FLASH_MODEL) {
            self.models.flash = v;
        }
        if let Some(v) = get(ENV_PRO_MODEL) {
            self.models.pro = v;
        }
        if let Some(v) = get(ENV_CLI_PATH) {
            self.cli_binary = v;
        }
        if let Some(v) = get(ENV_API_BASE_URL) {
            self.api.base_url = v;
        }
        if let Some(v) = get(ENV_CLOUD_PROJECT) {
            self.cloud_project = Some(v);
        }
        if let Some(v) = get(ENV_API_KEY) {
            self.api_key = Some(ApiKey::new(v));
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.cli_binary.trim().is_empty() {
            return Err(CoreError::InvalidConfig("cli_binary must not be empty".into()));
        }
        if self.timeouts.default_secs == 0 || self.timeouts.per_task.values().any(|s| *s == 0) {
            return Err(CoreError::InvalidConfig("timeouts must be greater than zero".into()));
        }
        if self.progress.read_poll_ms == 0 {
            return Err(CoreError::InvalidConfig(
                "progress.read_poll_ms must be greater than zero".into(),
            ));
        }
        if self.api.base_url.trim().is_empty() {
            return Err(CoreError::InvalidConfig("api.base_url must not be empty".into()));
        }
        Ok(())
    }

    /// The credential, if one is configured and passes the shape check.
    pub fn usable_api_key(&self) -> Option<&ApiKey> {
        self.api_key.as_ref().filter(|k| k.is_plausible())
    }

    pub fn timeout_for(&self, task: TaskType) -> Duration {
        self.timeouts.timeout_for(task)
    }
}

fn config_file(explicit: Option<&Path>, root: &Path) -> Option<PathBuf> {
    if let Some(p) = explicit {
        return Some(p.to_path_buf());
    }
    let candidate = root.join(CONFIG_FILE);
    candidate.is_file().then_some(candidate)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
