use std::path::Path;

use crate::output::print_header;
use crate::prompts::{self, AnalysisType};
use crate::tools::{line_count, ToolContext, MAX_CODE_BYTES, MAX_CODE_LINES};
use anyhow::{anyhow, bail, Context};
use gemini_core::{sanitize, TaskType};

/// Extensions `analyze` accepts. Hooks use a narrower list.
pub const ANALYZE_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "java", "cpp", "c", "rs", "vue", "html", "css", "scss", "sass", "jsx",
    "tsx", "json", "yaml", "toml", "md", "txt",
];

pub fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| allowed.contains(&e))
}

/// Cut `content` to the code limits. Returns the kept text and one warning
/// per limit that was hit.
pub fn truncate_code(content: &str) -> (String, Vec<String>) {
    let mut warnings = Vec::new();
    let mut kept = content;

    if kept.len() > MAX_CODE_BYTES {
        warnings.push(format!(
            "File too large ({} bytes), truncating to {MAX_CODE_BYTES} bytes",
            kept.len()
        ));
        let mut end = MAX_CODE_BYTES;
        while !kept.is_char_boundary(end) {
            end -= 1;
        }
        kept = &kept[..end];
    }

    let lines = line_count(kept);
    if lines > MAX_CODE_LINES {
        warnings.push(format!(
            "File has {lines} lines, truncating to {MAX_CODE_LINES} lines"
        ));
        let end = kept
            .match_indices('\n')
            .nth(MAX_CODE_LINES - 1)
            .map_or(kept.len(), |(i, _)| i + 1);
        kept = &kept[..end];
    }

    (kept.to_string(), warnings)
}

pub async fn run(ctx: &ToolContext, file: &str, kind: &str, json: bool) -> anyhow::Result<()> {
    let kind = AnalysisType::parse(kind).ok_or_else(|| anyhow!("Invalid analysis type: {kind}"))?;

    let decision = ctx.guard.validate(file);
    let path = match decision.resolved_path {
        Some(p) if decision.allowed => p,
        _ => bail!("Path security check failed: {}", decision.reason),
    };
    if !path.exists() {
        bail!("File not found: {file}");
    }
    if !path.is_file() {
        bail!("Not a file: {file}");
    }
    if !has_extension(&path, ANALYZE_EXTENSIONS) {
        bail!("Unsupported file type: {file}");
    }

    let bytes = std::fs::read(&path).with_context(|| format!("cannot read {file}"))?;
    let content = String::from_utf8_lossy(&bytes);
    let (code, warnings) = truncate_code(&content);
    for warning in &warnings {
        eprintln!("Warning: {warning}");
    }

    let prompt = prompts::analyze_code(&sanitize(&code, MAX_CODE_BYTES), kind, &[]);
    let req = ctx.invoker.request(prompt, TaskType::AnalyzeCode)?;

    if !json {
        print_header(&[
            ("Code Analysis", path.display().to_string()),
            ("Type", kind.to_string()),
            ("Lines", line_count(&code).to_string()),
        ]);
    }

    let (result, streamed) = super::stream_to_stdout(&ctx.invoker, req, !json).await?;
    super::finish(&result, streamed, json)
}
