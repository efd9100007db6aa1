use chrono::{DateTime, Utc};
use gemini_core::{redact, CoreError, TaskType};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Longest prompt accepted, in characters.
pub const MAX_PROMPT_CHARS: usize = 1_000_000;

// ─── InvocationRequest ────────────────────────────────────────────────────

/// A validated unit of work for the [`Invoker`](crate::Invoker).
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    prompt: String,
    task: TaskType,
    timeout: Duration,
}

impl InvocationRequest {
    /// Fails if the prompt is blank or longer than [`MAX_PROMPT_CHARS`].
    pub fn new(prompt: impl Into<String>, task: TaskType, timeout: Duration) -> Result<Self, CoreError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(CoreError::EmptyPrompt);
        }
        let len = prompt.chars().count();
        if len > MAX_PROMPT_CHARS {
            return Err(CoreError::PromptTooLarge {
                len,
                max: MAX_PROMPT_CHARS,
            });
        }
        Ok(Self {
            prompt,
            task,
            timeout,
        })
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn task(&self) -> TaskType {
        self.task
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

// ─── Backend / FailureKind ────────────────────────────────────────────────

/// Which path produced an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Api,
    Cli,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Backend::Api => "api",
            Backend::Cli => "cli",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Empty or oversized prompt. Nothing was attempted.
    InputValidation,
    /// Unknown task type or corrupt model name. Nothing was attempted.
    Configuration,
    /// The CLI binary could not be found or started.
    LaunchFailed,
    /// The CLI ran and exited non-zero.
    BackendRefused,
    /// The CLI was killed by a signal.
    ProcessTerminated,
    /// Reading the CLI's output failed mid-stream.
    StreamBroken,
    /// The invocation deadline passed; the CLI was killed.
    Timeout,
}

// ─── InvocationResult ─────────────────────────────────────────────────────

/// Outcome of exactly one invocation. Failure text is always redacted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InvocationResult {
    Success {
        output: String,
        backend: Backend,
        timestamp: DateTime<Utc>,
    },
    Failure {
        error: String,
        kind: FailureKind,
        timestamp: DateTime<Utc>,
    },
}

impl InvocationResult {
    pub fn success(output: impl Into<String>, backend: Backend) -> Self {
        InvocationResult::Success {
            output: output.into(),
            backend,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(kind: FailureKind, error: impl AsRef<str>) -> Self {
        InvocationResult::Failure {
            error: redact(error.as_ref()),
            kind,
            timestamp: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, InvocationResult::Success { .. })
    }

    pub fn output(&self) -> Option<&str> {
        match self {
            InvocationResult::Success { output, .. } => Some(output),
            InvocationResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            InvocationResult::Failure { error, .. } => Some(error),
            InvocationResult::Success { .. } => None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            InvocationResult::Failure { kind, .. } => Some(*kind),
            InvocationResult::Success { .. } => None,
        }
    }

    pub fn backend(&self) -> Option<Backend> {
        match self {
            InvocationResult::Success { backend, .. } => Some(*backend),
            InvocationResult::Failure { .. } => None,
        }
    }
}

impl From<CoreError> for InvocationResult {
    fn from(err: CoreError) -> Self {
        let kind = match err {
            CoreError::EmptyPrompt | CoreError::PromptTooLarge { .. } => FailureKind::InputValidation,
            _ => FailureKind::Configuration,
        };
        InvocationResult::failure(kind, err.to_string())
    }
}
