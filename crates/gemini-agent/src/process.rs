use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::error::GeminiAgentError;
use crate::Result;

/// How long to wait for the stderr reader after the child has exited.
const STDERR_JOIN_GRACE: Duration = Duration::from_secs(2);

type StdoutReader = BufReader<Box<dyn AsyncRead + Send + Unpin>>;

// ─── CliInvocation ────────────────────────────────────────────────────────

/// Everything needed to launch the CLI once: the argument vector and the
/// complete environment the child will see. Nothing here goes through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliInvocation {
    pub binary: String,
    pub args: Vec<String>,
    pub env: Vec<(String, OsString)>,
}

impl CliInvocation {
    /// `<binary> -m <model> -p <prompt>`, with an environment holding only
    /// `PATH` and, when set, `GOOGLE_CLOUD_PROJECT`.
    pub fn new(
        binary: &str,
        model: &str,
        prompt: &str,
        search_path: Option<&OsString>,
        cloud_project: Option<&str>,
    ) -> Self {
        let mut env = Vec::new();
        if let Some(path) = search_path {
            env.push(("PATH".to_string(), path.clone()));
        }
        if let Some(project) = cloud_project {
            env.push((
                gemini_core::config::ENV_CLOUD_PROJECT.to_string(),
                OsString::from(project),
            ));
        }
        Self {
            binary: binary.to_string(),
            args: vec![
                "-m".to_string(),
                model.to_string(),
                "-p".to_string(),
                prompt.to_string(),
            ],
            env,
        }
    }

    /// The full argument vector, binary first.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.binary.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }

    fn search_path(&self) -> Option<&OsString> {
        self.env.iter().find(|(k, _)| k == "PATH").map(|(_, v)| v)
    }

    /// Locate the binary using the child's own `PATH`.
    fn resolve_binary(&self) -> Result<PathBuf> {
        let cwd = std::env::current_dir()?;
        which::which_in(&self.binary, self.search_path(), cwd).map_err(|_| {
            GeminiAgentError::BinaryNotFound {
                binary: self.binary.clone(),
            }
        })
    }

    fn command(&self) -> Result<Command> {
        let program = self.resolve_binary()?;
        let mut cmd = Command::new(program);
        cmd.args(&self.args).env_clear();
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        Ok(cmd)
    }
}

// ─── GeminiProcess ────────────────────────────────────────────────────────

/// One read from stdout.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Chunk {
    /// A complete line, newline included, or the unterminated tail at EOF.
    Line(String),
    /// Nothing arrived within the poll interval.
    Quiet,
    /// stdout is closed and fully consumed.
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExitOutcome {
    Success,
    Code(i32),
    Signal(Option<i32>),
}

impl From<ExitStatus> for ExitOutcome {
    fn from(status: ExitStatus) -> Self {
        if status.success() {
            return ExitOutcome::Success;
        }
        match status.code() {
            Some(code) => ExitOutcome::Code(code),
            None => ExitOutcome::Signal(signal_of(&status)),
        }
    }
}

#[cfg(unix)]
fn signal_of(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn signal_of(_status: &ExitStatus) -> Option<i32> {
    None
}

/// A running CLI child with stdout read incrementally and stderr drained in
/// the background.
pub(crate) struct GeminiProcess {
    child: Child,
    stdout: StdoutReader,
    /// Bytes of a line not yet terminated. Survives poll timeouts.
    pending: Vec<u8>,
    stdout_done: bool,
    stderr_buf: Arc<Mutex<String>>,
    stderr_task: Option<JoinHandle<()>>,
}

impl GeminiProcess {
    pub(crate) fn spawn(invocation: &CliInvocation) -> Result<Self> {
        let cmd = invocation.command()?;
        Self::from_command(cmd).map_err(|e| match e {
            GeminiAgentError::Io(source) => GeminiAgentError::Launch {
                binary: invocation.binary.clone(),
                source,
            },
            other => other,
        })
    }

    /// Spawn an arbitrary command as a stand-in CLI.
    #[cfg(test)]
    pub(crate) fn spawn_command(cmd: Command) -> Result<Self> {
        Self::from_command(cmd)
    }

    /// Read from `reader` instead of the child's stdout.
    #[cfg(test)]
    pub(crate) fn with_stdout(mut self, reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        let reader: Box<dyn AsyncRead + Send + Unpin> = Box::new(reader);
        self.stdout = BufReader::new(reader);
        self.pending.clear();
        self.stdout_done = false;
        self
    }

    fn from_command(mut cmd: Command) -> Result<Self> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;

        let stdout: Box<dyn AsyncRead + Send + Unpin> = Box::new(
            child
                .stdout
                .take()
                .ok_or_else(|| GeminiAgentError::Process("stdout not captured".into()))?,
        );

        let stderr_buf = Arc::new(Mutex::new(String::new()));
        let stderr_task = child.stderr.take().map(|stderr| {
            let buf = Arc::clone(&stderr_buf);
            tokio::spawn(async move {
                let mut reader = BufReader::new(stderr);
                let mut line = Vec::new();
                loop {
                    line.clear();
                    match reader.read_until(b'\n', &mut line).await {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {
                            if let Ok(mut b) = buf.lock() {
                                b.push_str(&String::from_utf8_lossy(&line));
                            }
                        }
                    }
                }
            })
        });

        Ok(Self {
            child,
            stdout: BufReader::new(stdout),
            pending: Vec::new(),
            stdout_done: false,
            stderr_buf,
            stderr_task,
        })
    }

    /// Wait up to `poll` for the next line of stdout.
    pub(crate) async fn next_chunk(&mut self, poll: Duration) -> Result<Chunk> {
        if self.stdout_done {
            return Ok(Chunk::Eof);
        }
        let read = tokio::time::timeout(poll, self.stdout.read_until(b'\n', &mut self.pending)).await;
        match read {
            Err(_) => Ok(Chunk::Quiet),
            Ok(Err(e)) => Err(GeminiAgentError::Io(e)),
            Ok(Ok(0)) => {
                self.stdout_done = true;
                Ok(self.take_pending().map_or(Chunk::Eof, Chunk::Line))
            }
            Ok(Ok(_)) => {
                // Without a trailing newline, read_until only returns at EOF.
                if !self.pending.ends_with(b"\n") {
                    self.stdout_done = true;
                }
                Ok(self.take_pending().map_or(Chunk::Eof, Chunk::Line))
            }
        }
    }

    /// Read whatever stdout still holds, up to EOF.
    pub(crate) async fn drain(&mut self) -> Result<String> {
        if !self.stdout_done {
            self.stdout.read_to_end(&mut self.pending).await?;
            self.stdout_done = true;
        }
        Ok(self.take_pending().unwrap_or_default())
    }

    fn take_pending(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let bytes = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Non-blocking check for child exit.
    pub(crate) fn has_exited(&mut self) -> Result<bool> {
        Ok(self.child.try_wait()?.is_some())
    }

    /// Wait for the child to exit, then collect stderr.
    pub(crate) async fn wait_exit(&mut self) -> Result<(ExitOutcome, String)> {
        let status = self.child.wait().await?;
        if let Some(task) = self.stderr_task.take() {
            // A grandchild may keep stderr open; stop waiting after a grace period.
            let _ = tokio::time::timeout(STDERR_JOIN_GRACE, task).await;
        }
        Ok((ExitOutcome::from(status), self.stderr_snapshot()))
    }

    pub(crate) fn stderr_snapshot(&self) -> String {
        self.stderr_buf
            .lock()
            .map(|b| b.trim().to_string())
            .unwrap_or_default()
    }

    /// Kill the child (best-effort; errors are ignored).
    pub(crate) async fn kill(&mut self) {
        let _ = self.child.kill().await;
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> GeminiProcess {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        GeminiProcess::spawn_command(cmd).unwrap()
    }

    const POLL: Duration = Duration::from_millis(200);

    async fn collect_lines(p: &mut GeminiProcess) -> Vec<String> {
        let mut lines = Vec::new();
        loop {
            match p.next_chunk(POLL).await.unwrap() {
                Chunk::Line(l) => lines.push(l),
                Chunk::Quiet => continue,
                Chunk::Eof => break,
            }
        }
        lines
    }

    #[test]
    fn argv_is_binary_model_prompt() {
        let inv = CliInvocation::new("gemini", "gemini-2.5-flash", "test; rm -rf /", None, None);
        assert_eq!(
            inv.argv(),
            vec!["gemini", "-m", "gemini-2.5-flash", "-p", "test; rm -rf /"]
        );
        assert!(inv.env.is_empty());
    }

    #[test]
    fn env_holds_only_path_and_project() {
        let path = OsString::from("/usr/bin:/bin");
        let inv = CliInvocation::new("gemini", "m", "p", Some(&path), Some("proj-1"));
        let keys: Vec<_> = inv.env.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["PATH", "GOOGLE_CLOUD_PROJECT"]);
    }

    #[test]
    fn missing_binary_is_reported() {
        let path = OsString::from("/nonexistent-dir");
        let inv = CliInvocation::new("gemini-definitely-missing", "m", "p", Some(&path), None);
        let err = GeminiProcess::spawn(&inv).err().unwrap();
        assert!(matches!(err, GeminiAgentError::BinaryNotFound { .. }));
        assert!(err.to_string().contains("npm install -g @google/gemini-cli"));
    }

    #[tokio::test]
    async fn lines_arrive_in_order_with_unterminated_tail() {
        let mut p = sh("printf 'one\\ntwo\\nthree'");
        let lines = collect_lines(&mut p).await;
        assert_eq!(lines, vec!["one\n", "two\n", "three"]);
        let (outcome, _) = p.wait_exit().await.unwrap();
        assert_eq!(outcome, ExitOutcome::Success);
    }

    #[tokio::test]
    async fn partial_line_survives_a_quiet_poll() {
        let mut p = sh("printf 'half'; sleep 0.5; printf ' done\\n'");
        let mut lines = Vec::new();
        let mut quiet = 0;
        loop {
            match p.next_chunk(Duration::from_millis(100)).await.unwrap() {
                Chunk::Line(l) => lines.push(l),
                Chunk::Quiet => quiet += 1,
                Chunk::Eof => break,
            }
        }
        assert!(quiet > 0);
        assert_eq!(lines, vec!["half done\n"]);
    }

    #[tokio::test]
    async fn invalid_utf8_is_decoded_lossily() {
        let mut p = sh("printf 'ok \\377\\n'");
        let lines = collect_lines(&mut p).await;
        assert_eq!(lines, vec!["ok \u{FFFD}\n"]);
    }

    #[tokio::test]
    async fn nonzero_exit_reports_code_and_stderr() {
        let mut p = sh("echo 'quota exceeded' >&2; exit 3");
        assert!(collect_lines(&mut p).await.is_empty());
        let (outcome, stderr) = p.wait_exit().await.unwrap();
        assert_eq!(outcome, ExitOutcome::Code(3));
        assert_eq!(stderr, "quota exceeded");
    }

    #[tokio::test]
    async fn signal_death_is_distinguished() {
        let mut p = sh("kill -9 $$");
        collect_lines(&mut p).await;
        let (outcome, _) = p.wait_exit().await.unwrap();
        assert_eq!(outcome, ExitOutcome::Signal(Some(9)));
    }

    #[tokio::test]
    async fn drain_returns_remaining_output() {
        let mut p = sh("printf 'a\\nb\\nc'");
        let first = loop {
            if let Chunk::Line(l) = p.next_chunk(POLL).await.unwrap() {
                break l;
            }
        };
        assert_eq!(first, "a\n");
        assert_eq!(p.drain().await.unwrap(), "b\nc");
        assert_eq!(p.next_chunk(POLL).await.unwrap(), Chunk::Eof);
    }
}
