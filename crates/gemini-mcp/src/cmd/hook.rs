//! Editor and VCS hooks. A backend failure is reported but never fails the
//! calling tool.

use std::path::PathBuf;

use super::analyze::has_extension;
use crate::output::{print_answer, print_json};
use crate::prompts;
use crate::tools::{codebase_analysis, line_count, ToolContext, MAX_CODE_BYTES, MAX_CODE_LINES};
use anyhow::anyhow;
use clap::Subcommand;
use gemini_core::{sanitize, PathGuard, TaskType};

/// Source extensions hooks look at.
pub const HOOK_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "java", "cpp", "c", "rs", "vue", "html", "css", "scss", "sass", "jsx", "tsx",
];

const PATH_MAX_CHARS: usize = 500;

#[derive(Subcommand)]
pub enum HookSubcommand {
    /// Review files before they are edited
    PreEdit {
        /// Files to review (whitespace-separated lists are split)
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// Review staged files before a commit
    PreCommit {
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// Summarize a project directory
    SessionSummary {
        /// Directory to summarize (default: working directory)
        directory: Option<String>,
    },
}

#[derive(Debug, PartialEq, Eq)]
pub struct Skipped {
    pub file: String,
    pub reason: String,
}

/// Split arguments on whitespace and keep the files a hook may send.
pub fn screen_files(guard: &PathGuard, args: &[String]) -> (Vec<PathBuf>, Vec<Skipped>) {
    let mut accepted = Vec::new();
    let mut skipped = Vec::new();

    for file in args.iter().flat_map(|a| a.split_whitespace()) {
        match screen_file(guard, file) {
            Ok(path) => accepted.push(path),
            Err(reason) => skipped.push(Skipped {
                file: file.to_string(),
                reason,
            }),
        }
    }

    (accepted, skipped)
}

fn screen_file(guard: &PathGuard, file: &str) -> Result<PathBuf, String> {
    let decision = guard.validate(file);
    let path = match decision.resolved_path {
        Some(p) if decision.allowed => p,
        _ => return Err(decision.reason),
    };
    if !path.is_file() {
        return Err("File not found".to_string());
    }
    if !has_extension(&path, HOOK_EXTENSIONS) {
        return Err("File type not supported".to_string());
    }
    let size = std::fs::metadata(&path)
        .map_err(|_| "Cannot read file".to_string())?
        .len();
    if size > MAX_CODE_BYTES as u64 {
        return Err(format!("File too large ({size} bytes)"));
    }
    let bytes = std::fs::read(&path).map_err(|_| "Cannot read file".to_string())?;
    let lines = line_count(&String::from_utf8_lossy(&bytes));
    if lines > MAX_CODE_LINES {
        return Err(format!("Too many lines ({lines})"));
    }
    Ok(path)
}

/// Paths as they appear in prompts: relative to the guard root, sanitized.
fn display_paths(guard: &PathGuard, paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| {
            let shown = p.strip_prefix(guard.root()).unwrap_or(p);
            sanitize(&shown.to_string_lossy(), PATH_MAX_CHARS)
        })
        .collect()
}

pub async fn run(ctx: &ToolContext, subcmd: HookSubcommand, json: bool) -> anyhow::Result<()> {
    let (name, task, prompt) = match subcmd {
        HookSubcommand::PreEdit { files } => {
            let Some(files) = screened(ctx, &files) else {
                return Ok(());
            };
            ("pre-edit", TaskType::PreEdit, prompts::pre_edit(&files))
        }
        HookSubcommand::PreCommit { files } => {
            let Some(files) = screened(ctx, &files) else {
                return Ok(());
            };
            ("pre-commit", TaskType::PreCommit, prompts::pre_commit(&files))
        }
        HookSubcommand::SessionSummary { directory } => {
            let raw = directory.as_deref().unwrap_or(".");
            let dir = codebase_analysis::prepare(&ctx.guard, raw).map_err(|e| anyhow!(e))?;
            (
                "session-summary",
                TaskType::SessionSummary,
                prompts::session_summary(&dir.name),
            )
        }
    };

    let req = ctx.invoker.request(prompt, task)?;
    if let Ok(choice) = ctx.invoker.selector().select(task) {
        eprintln!("Using {} for {name}", choice.model);
    }

    let (result, streamed) = super::stream_to_stdout(&ctx.invoker, req, !json).await?;
    if json {
        return print_json(&result);
    }
    match result.output() {
        Some(text) => print_answer(text, streamed),
        None => eprintln!("Analysis failed: {}", result.error().unwrap_or_default()),
    }
    Ok(())
}

/// Screen the hook's files, reporting skips. `None` when nothing is left.
fn screened(ctx: &ToolContext, args: &[String]) -> Option<Vec<String>> {
    let (accepted, skipped) = screen_files(&ctx.guard, args);
    for s in &skipped {
        eprintln!("Skipping {}: {}", s.file, s.reason);
    }
    if accepted.is_empty() {
        println!("No valid files to analyze");
        return None;
    }
    Some(display_paths(&ctx.guard, &accepted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project() -> (TempDir, PathGuard) {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "pub fn f() {}\n").unwrap();
        std::fs::write(dir.path().join("src/app.py"), "print(1)\n").unwrap();
        std::fs::write(dir.path().join("notes.md"), "# notes\n").unwrap();
        std::fs::write(dir.path().join("big.rs"), "x".repeat(MAX_CODE_BYTES + 1)).unwrap();
        std::fs::write(dir.path().join("long.rs"), "a\n".repeat(MAX_CODE_LINES + 1)).unwrap();
        let guard = PathGuard::new(dir.path()).unwrap();
        (dir, guard)
    }

    fn reason(skipped: &[Skipped], file: &str) -> String {
        skipped
            .iter()
            .find(|s| s.file == file)
            .map(|s| s.reason.clone())
            .unwrap_or_default()
    }

    #[test]
    fn whitespace_separated_arguments_are_split() {
        let (_dir, guard) = project();
        let (accepted, skipped) = screen_files(&guard, &["src/lib.rs  src/app.py".to_string()]);
        assert_eq!(accepted.len(), 2);
        assert!(skipped.is_empty());
    }

    #[test]
    fn each_rejection_has_a_reason() {
        let (_dir, guard) = project();
        let args: Vec<String> = ["notes.md", "missing.rs", "big.rs", "long.rs", "../../etc/passwd"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let (accepted, skipped) = screen_files(&guard, &args);
        assert!(accepted.is_empty());
        assert_eq!(reason(&skipped, "notes.md"), "File type not supported");
        assert_eq!(reason(&skipped, "missing.rs"), "File not found");
        assert!(reason(&skipped, "big.rs").starts_with("File too large ("));
        assert_eq!(
            reason(&skipped, "long.rs"),
            format!("Too many lines ({})", MAX_CODE_LINES + 1)
        );
        assert!(reason(&skipped, "../../etc/passwd").contains("outside allowed directory"));
    }

    #[test]
    fn prompt_paths_are_relative_to_the_root() {
        let (_dir, guard) = project();
        let (accepted, _) = screen_files(&guard, &["src/lib.rs".to_string()]);
        assert_eq!(display_paths(&guard, &accepted), vec!["src/lib.rs".to_string()]);
    }
}
