pub mod analyze;
pub mod codebase;
pub mod hook;
pub mod mcp;
pub mod query;

use std::io::Write;
use std::sync::Arc;

use crate::output::{print_answer, print_json};
use futures::StreamExt;
use gemini_agent::{InvocationEvent, InvocationRequest, InvocationResult, Invoker};

/// Run `req`, copying CLI output to stdout as it arrives when `echo` is set.
/// Returns the final result and whether any output was echoed.
pub async fn stream_to_stdout(
    invoker: &Arc<Invoker>,
    req: InvocationRequest,
    echo: bool,
) -> anyhow::Result<(InvocationResult, bool)> {
    let mut events = invoker.stream(req);
    let mut streamed = false;

    while let Some(event) = events.next().await {
        match event {
            InvocationEvent::Started { task, model } => {
                tracing::debug!(%task, %model, "invocation started");
            }
            InvocationEvent::Attempt(backend) => {
                tracing::debug!(%backend, "trying backend");
            }
            InvocationEvent::Output(chunk) if echo => {
                let mut out = std::io::stdout().lock();
                out.write_all(chunk.as_bytes())?;
                out.flush()?;
                streamed = true;
            }
            InvocationEvent::Output(_) => {}
            InvocationEvent::StillWorking { elapsed } => {
                eprintln!("... still working ({}s)", elapsed.as_secs());
            }
            InvocationEvent::Finished(result) => return Ok((result, streamed)),
        }
    }

    anyhow::bail!("invocation ended without a result")
}

/// Print the outcome of a direct command. A failure is an error exit.
pub fn finish(result: &InvocationResult, streamed: bool, json: bool) -> anyhow::Result<()> {
    if json {
        print_json(result)?;
    } else if let Some(text) = result.output() {
        print_answer(text, streamed);
    }

    if result.is_success() {
        return Ok(());
    }
    anyhow::bail!("{}", result.error().unwrap_or_default())
}
