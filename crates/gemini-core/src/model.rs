use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// TaskType
// ---------------------------------------------------------------------------

/// Every kind of work the backend can be asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    #[serde(rename = "gemini_quick_query")]
    QuickQuery,
    #[serde(rename = "gemini_analyze_code")]
    AnalyzeCode,
    #[serde(rename = "gemini_codebase_analysis")]
    CodebaseAnalysis,
    PreEdit,
    PreCommit,
    SessionSummary,
}

impl TaskType {
    pub const ALL: [TaskType; 6] = [
        TaskType::QuickQuery,
        TaskType::AnalyzeCode,
        TaskType::CodebaseAnalysis,
        TaskType::PreEdit,
        TaskType::PreCommit,
        TaskType::SessionSummary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::QuickQuery => "gemini_quick_query",
            TaskType::AnalyzeCode => "gemini_analyze_code",
            TaskType::CodebaseAnalysis => "gemini_codebase_analysis",
            TaskType::PreEdit => "pre_edit",
            TaskType::PreCommit => "pre_commit",
            TaskType::SessionSummary => "session_summary",
        }
    }

    /// Fixed task -> tier assignment.
    pub fn tier(&self) -> Tier {
        match self {
            TaskType::QuickQuery | TaskType::PreEdit | TaskType::SessionSummary => Tier::Flash,
            TaskType::AnalyzeCode | TaskType::CodebaseAnalysis | TaskType::PreCommit => Tier::Pro,
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        TaskType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::InvalidTaskType(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Cheap and quick.
    Flash,
    /// Slower, deeper analysis.
    Pro,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Flash => "flash",
            Tier::Pro => "pro",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ModelTable
// ---------------------------------------------------------------------------

pub const DEFAULT_FLASH_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_PRO_MODEL: &str = "gemini-2.5-pro";

/// Tier -> concrete model name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelTable {
    #[serde(default = "default_flash")]
    pub flash: String,
    #[serde(default = "default_pro")]
    pub pro: String,
}

fn default_flash() -> String {
    DEFAULT_FLASH_MODEL.to_string()
}

fn default_pro() -> String {
    DEFAULT_PRO_MODEL.to_string()
}

impl Default for ModelTable {
    fn default() -> Self {
        Self {
            flash: default_flash(),
            pro: default_pro(),
        }
    }
}

impl ModelTable {
    pub fn model_for(&self, tier: Tier) -> &str {
        match tier {
            Tier::Flash => &self.flash,
            Tier::Pro => &self.pro,
        }
    }
}

// ---------------------------------------------------------------------------
// ModelSelector
// ---------------------------------------------------------------------------

/// A model chosen for one task, already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelChoice {
    pub task: TaskType,
    pub tier: Tier,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct ModelSelector {
    table: ModelTable,
}

impl ModelSelector {
    pub fn new(table: ModelTable) -> Self {
        Self { table }
    }

    /// Resolve and validate the model for `task`.
    pub fn select(&self, task: TaskType) -> Result<ModelChoice> {
        let tier = task.tier();
        let model = self.table.model_for(tier);
        validate_model_name(model)?;
        Ok(ModelChoice {
            task,
            tier,
            model: model.to_string(),
        })
    }
}

/// Model names end up as a process argument; only `[A-Za-z0-9.-]` is allowed.
pub fn validate_model_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(CoreError::EmptyModelName);
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(CoreError::InvalidModelNameCharacters(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
