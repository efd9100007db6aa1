use crate::output::print_header;
use crate::tools::{quick_query, ToolContext};
use gemini_core::TaskType;
use serde_json::Value;

pub async fn run(
    ctx: &ToolContext,
    question: &str,
    context: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let context = context.map(|c| Value::String(c.to_string()));
    let prompt = quick_query::build_prompt(&Value::String(question.to_string()), context.as_ref())
        .map_err(|e| anyhow::anyhow!(e))?;
    let req = ctx.invoker.request(prompt, TaskType::QuickQuery)?;

    if !json {
        print_header(&[("Query", question.to_string())]);
    }

    let (result, streamed) = super::stream_to_stdout(&ctx.invoker, req, !json).await?;
    super::finish(&result, streamed, json)
}
