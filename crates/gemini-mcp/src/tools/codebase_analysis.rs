use std::path::PathBuf;

use super::{GeminiTool, ToolContext, DIRECTORY_NAME_MAX_CHARS};
use crate::prompts::{self, AnalysisScope};
use futures::future::BoxFuture;
use futures::FutureExt;
use gemini_core::{sanitize, PathGuard, TaskType};
use serde_json::Value;

pub struct CodebaseAnalysisTool;

/// A directory that passed the guard, with the display name that goes into
/// the prompt. The full path never does.
#[derive(Debug)]
pub struct PreparedDirectory {
    pub path: PathBuf,
    pub name: String,
}

/// Confine `raw` to the guard root and check it names an existing directory.
pub fn prepare(guard: &PathGuard, raw: &str) -> Result<PreparedDirectory, String> {
    let decision = guard.validate(raw);
    let path = match decision.resolved_path {
        Some(p) if decision.allowed => p,
        _ => return Err(format!("Path security check failed: {}", decision.reason)),
    };
    if !path.exists() {
        return Err(format!("Error: Directory not found: {raw}"));
    }
    if !path.is_dir() {
        return Err(format!("Error: Path is not a directory: {raw}"));
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| ".".to_string());
    Ok(PreparedDirectory {
        name: sanitize(&name, DIRECTORY_NAME_MAX_CHARS),
        path,
    })
}

/// Validate the arguments and build the prompt for a directory overview.
pub fn build_prompt(args: &Value, guard: &PathGuard) -> Result<String, String> {
    let raw = args["directory_path"]
        .as_str()
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| "Error: Directory path must be a non-empty string".to_string())?;

    let scope = match args.get("analysis_scope") {
        None | Some(Value::Null) => AnalysisScope::All,
        Some(v) => v
            .as_str()
            .and_then(AnalysisScope::parse)
            .ok_or_else(|| "Error: Invalid analysis scope".to_string())?,
    };

    let dir = prepare(guard, raw)?;
    tracing::debug!(path = %dir.path.display(), %scope, "codebase analysis");
    Ok(prompts::codebase(&dir.name, scope))
}

impl GeminiTool for CodebaseAnalysisTool {
    fn name(&self) -> &str {
        "gemini_codebase_analysis"
    }

    fn description(&self) -> &str {
        "Analyze a directory of the current project for architecture, quality and security"
    }

    fn schema(&self) -> Value {
        let scopes: Vec<&str> = AnalysisScope::ALL.iter().map(|s| s.as_str()).collect();
        serde_json::json!({
            "type": "object",
            "properties": {
                "directory_path": {
                    "type": "string",
                    "description": "Directory to analyze, inside the working directory"
                },
                "analysis_scope": {
                    "type": "string",
                    "enum": scopes,
                    "default": "all",
                    "description": "Aspect to emphasize"
                }
            },
            "required": ["directory_path"]
        })
    }

    fn call<'a>(
        &'a self,
        args: Value,
        ctx: &'a ToolContext,
    ) -> BoxFuture<'a, Result<String, String>> {
        async move {
            let prompt = build_prompt(&args, &ctx.guard)?;
            let result = ctx.invoker.run(prompt, TaskType::CodebaseAnalysis).await;
            match result.output() {
                Some(text) => Ok(text.to_string()),
                None => Err(format!(
                    "Analysis failed: {}",
                    result.error().unwrap_or_default()
                )),
            }
        }
        .boxed()
    }
}
