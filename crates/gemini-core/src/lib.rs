//! `gemini-core`: the synchronous building blocks of the invocation
//! orchestrator.
//!
//! - [`sanitize`]: prompt-injection filtering
//! - [`path_guard`]: directory confinement for caller paths
//! - [`redact`]: secret redaction for outbound error text
//! - [`model`]: task types, tiers, model selection
//! - [`config`]: immutable process configuration

pub mod config;
pub mod error;
pub mod model;
pub mod path_guard;
pub mod redact;
pub mod sanitize;

pub use config::{ApiKey, Config};
pub use error::{CoreError, Result};
pub use model::{ModelChoice, ModelSelector, ModelTable, TaskType, Tier};
pub use path_guard::{PathDecision, PathGuard};
pub use redact::redact;
pub use sanitize::{sanitize, sanitize_value, SanitizationPolicy};
