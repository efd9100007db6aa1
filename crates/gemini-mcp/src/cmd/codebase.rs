use crate::output::print_header;
use crate::prompts::{self, AnalysisScope};
use crate::tools::{codebase_analysis, ToolContext};
use anyhow::anyhow;
use gemini_core::TaskType;

pub async fn run(ctx: &ToolContext, directory: &str, scope: &str, json: bool) -> anyhow::Result<()> {
    let scope = AnalysisScope::parse(scope).ok_or_else(|| anyhow!("Invalid analysis scope: {scope}"))?;
    let dir = codebase_analysis::prepare(&ctx.guard, directory).map_err(|e| anyhow!(e))?;
    let req = ctx
        .invoker
        .request(prompts::codebase(&dir.name, scope), TaskType::CodebaseAnalysis)?;

    if !json {
        print_header(&[
            ("Codebase Analysis", dir.path.display().to_string()),
            ("Scope", scope.to_string()),
        ]);
    }

    let (result, streamed) = super::stream_to_stdout(&ctx.invoker, req, !json).await?;
    super::finish(&result, streamed, json)
}
