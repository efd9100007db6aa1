use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use futures::future::BoxFuture;
use gemini_agent::Invoker;
use gemini_core::{Config, PathGuard};
use serde_json::Value;

pub mod analyze_code;
pub mod codebase_analysis;
pub mod quick_query;

/// Largest code payload accepted, in bytes.
pub const MAX_CODE_BYTES: usize = 81_920;
pub const MAX_CODE_LINES: usize = 800;

pub const QUERY_MAX_CHARS: usize = 10_000;
pub const CONTEXT_MAX_CHARS: usize = 50_000;
pub const DIRECTORY_NAME_MAX_CHARS: usize = 100;
pub const FOCUS_AREA_MAX_CHARS: usize = 200;

/// Shared, read-only state every tool call sees.
pub struct ToolContext {
    pub invoker: Arc<Invoker>,
    pub guard: PathGuard,
}

impl ToolContext {
    pub fn new(invoker: Arc<Invoker>, guard: PathGuard) -> Self {
        Self { invoker, guard }
    }

    /// Guard rooted at the working directory, configuration from file and
    /// environment.
    pub fn load(config_path: Option<&Path>) -> anyhow::Result<Self> {
        let guard = PathGuard::from_cwd().context("failed to resolve the working directory")?;
        let config = Config::from_process_env(config_path, guard.root())
            .context("failed to load configuration")?;
        tracing::info!(
            cli = %config.cli_binary,
            flash = %config.models.flash,
            pro = %config.models.pro,
            hosted_api = config.usable_api_key().is_some(),
            root = %guard.root().display(),
            "configuration loaded"
        );
        let invoker = Invoker::new(Arc::new(config));
        Ok(Self::new(Arc::new(invoker), guard))
    }
}

/// A tool exposed over `tools/call`. `Ok` text is a normal reply; `Err` text
/// is returned with `isError: true`.
pub trait GeminiTool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn schema(&self) -> Value;
    fn call<'a>(
        &'a self,
        args: Value,
        ctx: &'a ToolContext,
    ) -> BoxFuture<'a, Result<String, String>>;
}

pub fn all_tools() -> Vec<Box<dyn GeminiTool>> {
    vec![
        Box::new(quick_query::QuickQueryTool),
        Box::new(analyze_code::AnalyzeCodeTool),
        Box::new(codebase_analysis::CodebaseAnalysisTool),
    ]
}

/// Number of lines the way a text editor counts them.
pub fn line_count(text: &str) -> usize {
    text.lines().count()
}

// ---------------------------------------------------------------------------
// Test harness
// ---------------------------------------------------------------------------
