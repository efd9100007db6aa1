use std::ffi::OsString;
use std::sync::Arc;

use gemini_core::{redact, Config, CoreError, ModelSelector, TaskType};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::{GenerativeLanguageClient, HostedBackend};
use crate::error::{ApiError, GeminiAgentError};
use crate::process::{Chunk, CliInvocation, ExitOutcome, GeminiProcess};
use crate::stream::{emit, EventSink, InvocationEvent, InvocationStream};
use crate::types::{Backend, FailureKind, InvocationRequest, InvocationResult};

// ─── State machine ────────────────────────────────────────────────────────

/// Where a single invocation is. Each invocation walks one path from
/// `Start` to a terminal state; there are no retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Start,
    ApiAttempt,
    ApiSuccess,
    ApiFail,
    CliAttempt,
    CliSuccess,
    CliFail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    CredentialPresent,
    CredentialAbsent,
    Succeeded,
    Failed,
    FallBack,
}

impl InvocationState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            InvocationState::ApiSuccess | InvocationState::CliSuccess | InvocationState::CliFail
        )
    }

    /// Pure transition function. Pairs outside the table fail closed.
    pub fn next(self, t: Transition) -> InvocationState {
        use InvocationState::*;
        use Transition::*;
        match (self, t) {
            (Start, CredentialPresent) => ApiAttempt,
            (Start, CredentialAbsent) => CliAttempt,
            (ApiAttempt, Succeeded) => ApiSuccess,
            (ApiAttempt, Failed) => ApiFail,
            (ApiFail, FallBack) => CliAttempt,
            (CliAttempt, Succeeded) => CliSuccess,
            (CliAttempt, Failed) => CliFail,
            _ => CliFail,
        }
    }
}

// ─── Invoker ──────────────────────────────────────────────────────────────

/// Runs prompts against Gemini: the hosted API when a usable key exists,
/// the `gemini` CLI otherwise or when the API fails.
pub struct Invoker {
    config: Arc<Config>,
    selector: ModelSelector,
    hosted: Option<Arc<dyn HostedBackend>>,
    /// `PATH` captured at construction; the only inherited variable.
    search_path: Option<OsString>,
}

impl Invoker {
    pub fn new(config: Arc<Config>) -> Self {
        let hosted: Option<Arc<dyn HostedBackend>> =
            match GenerativeLanguageClient::from_config(&config) {
                Ok(client) => Some(Arc::new(client)),
                Err(ApiError::MissingKey) => None,
                Err(e) => {
                    warn!(error = %redact(&e.to_string()), "hosted API unavailable, using CLI only");
                    None
                }
            };
        Self {
            selector: ModelSelector::new(config.models.clone()),
            hosted,
            search_path: std::env::var_os("PATH"),
            config,
        }
    }

    /// Replace the hosted backend. It is still only used when the
    /// configuration carries a usable key.
    pub fn with_hosted_backend(mut self, backend: Arc<dyn HostedBackend>) -> Self {
        self.hosted = Some(backend);
        self
    }

    pub fn without_hosted_backend(mut self) -> Self {
        self.hosted = None;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn selector(&self) -> &ModelSelector {
        &self.selector
    }

    /// Build a request with the configured timeout for `task`.
    pub fn request(
        &self,
        prompt: impl Into<String>,
        task: TaskType,
    ) -> Result<InvocationRequest, CoreError> {
        InvocationRequest::new(prompt, task, self.config.timeout_for(task))
    }

    /// The exact CLI launch this invoker would perform for `task`.
    pub fn cli_invocation(&self, task: TaskType, prompt: &str) -> Result<CliInvocation, CoreError> {
        let choice = self.selector.select(task)?;
        Ok(self.build_cli_invocation(&choice.model, prompt))
    }

    fn build_cli_invocation(&self, model: &str, prompt: &str) -> CliInvocation {
        CliInvocation::new(
            &self.config.cli_binary,
            model,
            prompt,
            self.search_path.as_ref(),
            self.config.cloud_project.as_deref(),
        )
    }

    /// Validate, then invoke. Precondition failures come back as
    /// [`InvocationResult::Failure`] without touching any backend.
    pub async fn run(&self, prompt: impl Into<String>, task: TaskType) -> InvocationResult {
        match self.request(prompt, task) {
            Ok(req) => self.invoke(&req).await,
            Err(e) => e.into(),
        }
    }

    pub async fn invoke(&self, req: &InvocationRequest) -> InvocationResult {
        self.execute(req, None).await.0
    }

    /// Invoke in a background task, reporting progress as a stream.
    pub fn stream(self: &Arc<Self>, req: InvocationRequest) -> InvocationStream {
        let (tx, rx) = mpsc::channel(32);
        let invoker = Arc::clone(self);
        let task = tokio::spawn(async move {
            let (result, _) = invoker.execute(&req, Some(&tx)).await;
            let _ = tx.send(InvocationEvent::Finished(result)).await;
        });
        InvocationStream::new(rx, task)
    }

    fn credential_present(&self) -> bool {
        self.hosted.is_some() && self.config.usable_api_key().is_some()
    }

    /// Drive the state machine to a terminal state. Returns the visited
    /// states alongside the result.
    pub(crate) async fn execute(
        &self,
        req: &InvocationRequest,
        sink: Option<&EventSink>,
    ) -> (InvocationResult, Vec<InvocationState>) {
        let mut state = InvocationState::Start;
        let mut trace = vec![state];

        let choice = match self.selector.select(req.task()) {
            Ok(c) => c,
            Err(e) => {
                warn!(task = %req.task(), error = %e, "model selection failed");
                return (e.into(), trace);
            }
        };

        info!(
            task = %req.task(),
            tier = %choice.tier,
            model = %choice.model,
            prompt_len = req.prompt().len(),
            "invoking gemini"
        );
        emit(
            sink,
            InvocationEvent::Started {
                task: req.task(),
                model: choice.model.clone(),
            },
        )
        .await;

        let deadline = Instant::now() + req.timeout();
        let credential = if self.credential_present() {
            Transition::CredentialPresent
        } else {
            Transition::CredentialAbsent
        };
        state = state.next(credential);
        trace.push(state);

        let mut output = String::new();
        let mut failure: Option<(FailureKind, String)> = None;

        while !state.is_terminal() {
            let transition = match state {
                InvocationState::ApiAttempt => {
                    emit(sink, InvocationEvent::Attempt(Backend::Api)).await;
                    match self.attempt_api(req, &choice.model, deadline).await {
                        Ok(text) => {
                            output = text;
                            Transition::Succeeded
                        }
                        Err(e) => {
                            warn!(error = %redact(&e.to_string()), "hosted API failed, falling back to CLI");
                            Transition::Failed
                        }
                    }
                }
                InvocationState::ApiFail => Transition::FallBack,
                InvocationState::CliAttempt => {
                    emit(sink, InvocationEvent::Attempt(Backend::Cli)).await;
                    match self.attempt_cli(req, &choice.model, deadline, sink).await {
                        Ok(text) => {
                            output = text;
                            Transition::Succeeded
                        }
                        Err(f) => {
                            failure = Some(f);
                            Transition::Failed
                        }
                    }
                }
                // Start is left before the loop; terminal states end it.
                _ => Transition::Failed,
            };
            state = state.next(transition);
            trace.push(state);
        }

        debug!(?trace, "invocation path");

        let result = match state {
            InvocationState::ApiSuccess => InvocationResult::success(output, Backend::Api),
            InvocationState::CliSuccess => InvocationResult::success(output, Backend::Cli),
            _ => {
                let (kind, message) = failure.unwrap_or((
                    FailureKind::LaunchFailed,
                    "invocation ended without an attempt".to_string(),
                ));
                InvocationResult::failure(kind, message)
            }
        };

        match &result {
            InvocationResult::Success { output, backend, .. } => {
                info!(%backend, output_len = output.len(), "gemini invocation succeeded")
            }
            InvocationResult::Failure { error, kind, .. } => {
                warn!(?kind, %error, "gemini invocation failed")
            }
        }

        (result, trace)
    }

    async fn attempt_api(
        &self,
        req: &InvocationRequest,
        model: &str,
        deadline: Instant,
    ) -> Result<String, ApiError> {
        let hosted = self.hosted.as_ref().ok_or(ApiError::MissingKey)?;
        match tokio::time::timeout_at(deadline, hosted.generate(req.prompt(), model)).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::DeadlineExceeded),
        }
    }

    async fn attempt_cli(
        &self,
        req: &InvocationRequest,
        model: &str,
        deadline: Instant,
        sink: Option<&EventSink>,
    ) -> Result<String, (FailureKind, String)> {
        if Instant::now() >= deadline {
            return Err(timed_out(req));
        }

        let invocation = self.build_cli_invocation(model, req.prompt());
        info!(
            "executing: {} -m {} -p [prompt length: {}]",
            invocation.binary,
            model,
            req.prompt().len()
        );

        let process = GeminiProcess::spawn(&invocation)
            .map_err(|e| (FailureKind::LaunchFailed, e.to_string()))?;
        self.supervise(process, req, deadline, sink).await
    }

    /// Collect a running CLI's output and map its exit to a result. The
    /// child is killed on timeout or a broken stdout.
    async fn supervise(
        &self,
        mut process: GeminiProcess,
        req: &InvocationRequest,
        deadline: Instant,
        sink: Option<&EventSink>,
    ) -> Result<String, (FailureKind, String)> {
        let collected =
            tokio::time::timeout_at(deadline, collect_output(&mut process, &self.config, sink))
                .await;
        let output = match collected {
            Err(_) => {
                process.kill().await;
                return Err(timed_out(req));
            }
            Ok(Err(e)) => {
                process.kill().await;
                let stderr = match process.wait_exit().await {
                    Ok((_, stderr)) => stderr,
                    Err(_) => process.stderr_snapshot(),
                };
                return Err((FailureKind::StreamBroken, with_stderr(e.to_string(), &stderr)));
            }
            Ok(Ok(out)) => out,
        };

        let (outcome, stderr) = match tokio::time::timeout_at(deadline, process.wait_exit()).await {
            Err(_) => {
                process.kill().await;
                return Err(timed_out(req));
            }
            Ok(Err(e)) => return Err((FailureKind::StreamBroken, e.to_string())),
            Ok(Ok(exit)) => exit,
        };

        match outcome {
            ExitOutcome::Success => Ok(output),
            ExitOutcome::Code(code) => Err((
                FailureKind::BackendRefused,
                with_stderr(format!("Gemini CLI exited with code {code}"), &stderr),
            )),
            ExitOutcome::Signal(sig) => {
                let base = match sig {
                    Some(n) => format!("Gemini CLI terminated by signal {n}"),
                    None => "Gemini CLI terminated by signal".to_string(),
                };
                Err((FailureKind::ProcessTerminated, with_stderr(base, &stderr)))
            }
        }
    }
}

fn timed_out(req: &InvocationRequest) -> (FailureKind, String) {
    (
        FailureKind::Timeout,
        format!(
            "Gemini CLI timed out after {} seconds",
            req.timeout().as_secs_f64()
        ),
    )
}

fn with_stderr(message: String, stderr: &str) -> String {
    if stderr.is_empty() {
        message
    } else {
        format!("{message}: {stderr}")
    }
}

/// First 100 characters of a line, for logs.
fn preview(line: &str) -> String {
    let trimmed = line.trim_end();
    let mut out: String = trimmed.chars().take(100).collect();
    if trimmed.chars().nth(100).is_some() {
        out.push_str("...");
    }
    out
}

/// Read stdout until EOF or child exit, emitting each chunk and a
/// "still working" notice after every idle interval.
async fn collect_output(
    process: &mut GeminiProcess,
    config: &Config,
    sink: Option<&EventSink>,
) -> Result<String, GeminiAgentError> {
    let poll = config.progress.read_poll();
    let idle_notice = config.progress.idle_notice();
    let started = Instant::now();
    let mut last_activity = started;
    let mut output = String::new();

    loop {
        match process.next_chunk(poll).await? {
            Chunk::Line(line) => {
                last_activity = Instant::now();
                debug!(line = %preview(&line), "gemini output");
                output.push_str(&line);
                emit(sink, InvocationEvent::Output(line)).await;
            }
            Chunk::Quiet => {
                if process.has_exited()? {
                    break;
                }
                if last_activity.elapsed() >= idle_notice {
                    let elapsed = started.elapsed();
                    info!(elapsed_secs = elapsed.as_secs(), "analysis in progress");
                    emit(sink, InvocationEvent::StillWorking { elapsed }).await;
                    last_activity = Instant::now();
                }
            }
            Chunk::Eof => break,
        }
    }

    let rest = process.drain().await?;
    if !rest.is_empty() {
        output.push_str(&rest);
        emit(sink, InvocationEvent::Output(rest)).await;
    }
    Ok(output)
}

// ─── Tests ────────────────────────────────────────────────────────────────
