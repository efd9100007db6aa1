use super::{
    line_count, GeminiTool, ToolContext, FOCUS_AREA_MAX_CHARS, MAX_CODE_BYTES, MAX_CODE_LINES,
};
use crate::prompts::{self, AnalysisType};
use futures::future::BoxFuture;
use futures::FutureExt;
use gemini_core::{sanitize, TaskType};
use serde_json::Value;

pub struct AnalyzeCodeTool;

/// Validate the arguments and size limits, then build the prompt. Oversized
/// code is refused here, before any backend is involved.
pub fn build_prompt(args: &Value) -> Result<String, String> {
    let code = args["code_content"]
        .as_str()
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| "Error: Code content must be a non-empty string".to_string())?;

    let kind = match args.get("analysis_type") {
        None | Some(Value::Null) => AnalysisType::Comprehensive,
        Some(v) => v
            .as_str()
            .and_then(AnalysisType::parse)
            .ok_or_else(|| "Error: Invalid analysis type".to_string())?,
    };

    let focus_areas = focus_areas(args.get("focus_areas"))?;

    if code.len() > MAX_CODE_BYTES {
        return Err(format!(
            "Code rejected: too large ({} bytes). Max: {MAX_CODE_BYTES} bytes",
            code.len()
        ));
    }
    let lines = line_count(code);
    if lines > MAX_CODE_LINES {
        return Err(format!(
            "Code rejected: too many lines ({lines}). Max: {MAX_CODE_LINES} lines"
        ));
    }

    Ok(prompts::analyze_code(
        &sanitize(code, MAX_CODE_BYTES),
        kind,
        &focus_areas,
    ))
}

fn focus_areas(value: Option<&Value>) -> Result<Vec<String>, String> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(|s| sanitize(s, FOCUS_AREA_MAX_CHARS))
                    .ok_or_else(|| "Error: focus_areas must be an array of strings".to_string())
            })
            .filter(|r| r.as_ref().map_or(true, |s| !s.trim().is_empty()))
            .collect(),
        Some(_) => Err("Error: focus_areas must be an array of strings".to_string()),
    }
}

impl GeminiTool for AnalyzeCodeTool {
    fn name(&self) -> &str {
        "gemini_analyze_code"
    }

    fn description(&self) -> &str {
        "Analyze a code snippet (up to 800 lines) for bugs, security, performance or architecture"
    }

    fn schema(&self) -> Value {
        let kinds: Vec<&str> = AnalysisType::ALL.iter().map(|k| k.as_str()).collect();
        serde_json::json!({
            "type": "object",
            "properties": {
                "code_content": {
                    "type": "string",
                    "description": "Code to analyze"
                },
                "analysis_type": {
                    "type": "string",
                    "enum": kinds,
                    "default": "comprehensive",
                    "description": "Kind of analysis to perform"
                },
                "focus_areas": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Specific areas to pay attention to"
                }
            },
            "required": ["code_content"]
        })
    }

    fn call<'a>(
        &'a self,
        args: Value,
        ctx: &'a ToolContext,
    ) -> BoxFuture<'a, Result<String, String>> {
        async move {
            let prompt = build_prompt(&args)?;
            let result = ctx.invoker.run(prompt, TaskType::AnalyzeCode).await;
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
