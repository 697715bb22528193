// Subprocess spawning with line-by-line output streaming, timeout handling,
// cancellation and stderr capture

use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout};
use tokio::sync::{mpsc, OwnedSemaphorePermit};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::DEFAULT_STDERR_TAIL_BYTES;
use crate::error::{ExecutionError, LionelError, Result};
use crate::interpreter::Command;

const CHANNEL_CAPACITY: usize = 64;
const STDERR_GRACE: Duration = Duration::from_secs(2);

/// Per-run limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Wall-clock limit for the whole run, unlimited when `None`
    pub timeout: Option<Duration>,
    /// How much trailing stderr a failure report keeps
    pub stderr_tail_bytes: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            stderr_tail_bytes: DEFAULT_STDERR_TAIL_BYTES,
        }
    }
}

impl RunOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Lazy sequence of a running procedure's output lines.
///
/// Lines arrive in the order the process wrote them, without their trailing
/// terminator. A failed run ends with exactly one `Err` item. Dropping the
/// stream (or calling [`OutputStream::close`]) terminates the process and
/// everything it started.
pub struct OutputStream {
    receiver: mpsc::Receiver<Result<String>>,
    pid: Option<u32>,
    command: String,
    task: Option<JoinHandle<()>>,
    permit: Option<OwnedSemaphorePermit>,
    finished: bool,
}

impl OutputStream {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub async fn next_line(&mut self) -> Option<Result<String>> {
        futures::StreamExt::next(self).await
    }

    /// Drain the stream, stopping at the first error
    pub async fn collect_lines(mut self) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        while let Some(item) = self.next_line().await {
            lines.push(item?);
        }
        Ok(lines)
    }

    /// Cancel the run and wait until the process has been reaped
    pub async fn close(mut self) {
        self.receiver.close();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        self.permit.take();
    }

    /// A stream for a process that never started: yields `error`, then ends
    pub(crate) fn failed(command: impl Into<String>, error: LionelError) -> Self {
        let (tx, receiver) = mpsc::channel(1);
        let _ = tx.try_send(Err(error));
        Self {
            receiver,
            pid: None,
            command: command.into(),
            task: None,
            permit: None,
            finished: false,
        }
    }

    /// Whether a process was actually started for this stream
    pub fn is_spawned(&self) -> bool {
        self.pid.is_some()
    }

    /// Keep a concurrency slot occupied until the stream finishes
    pub(crate) fn hold_permit(&mut self, permit: OwnedSemaphorePermit) {
        if self.finished {
            return;
        }
        self.permit = Some(permit);
    }
}

impl Stream for OutputStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        match self.receiver.poll_recv(cx) {
            Poll::Ready(None) => {
                self.finished = true;
                self.permit.take();
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl std::fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputStream")
            .field("command", &self.command)
            .field("pid", &self.pid)
            .field("finished", &self.finished)
            .finish()
    }
}

/// Spawn `command` and stream its standard output.
///
/// Standard input is closed; stderr is captured and only surfaced in a
/// failure report. A process that cannot be started (missing executable,
/// spawn error) yields a stream whose only item is that error. On unix the
/// process leads its own process group so cancellation reaches anything it
/// starts. Must be called from within a Tokio runtime.
pub fn spawn_streaming(command: &Command, script: &Path, options: &RunOptions) -> OutputStream {
    let program = command.program_name();
    match start(command, script, options) {
        Ok(stream) => stream,
        Err(error) => {
            tracing::warn!(command = %program, error = %error, "Procedure could not be started");
            OutputStream::failed(program, error)
        }
    }
}

fn start(command: &Command, script: &Path, options: &RunOptions) -> Result<OutputStream> {
    let program = command.program_name();
    let executable = resolve_executable(&command.executable)?;

    let mut cmd = tokio::process::Command::new(&executable);
    cmd.args(&command.arguments);
    if let Some(ref dir) = command.working_directory {
        cmd.current_dir(dir);
    }
    for (key, value) in &command.environment {
        cmd.env(key, value);
    }
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn().map_err(|e| ExecutionError::SpawnFailed {
        command: program.clone(),
        error: e.to_string(),
        suggestion: None,
    })?;

    let pid = child.id();
    let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
        (Some(stdout), Some(stderr)) => (stdout, stderr),
        _ => {
            let _ = child.start_kill();
            return Err(ExecutionError::SpawnFailed {
                command: program,
                error: "output pipes were not created".to_string(),
                suggestion: None,
            }
            .into());
        }
    };

    tracing::debug!(command = %program, pid = ?pid, "Spawned procedure process");

    let stderr_task = tokio::spawn(capture_tail(stderr, options.stderr_tail_bytes));
    let (tx, receiver) = mpsc::channel(CHANNEL_CAPACITY);
    let supervision = Supervision {
        command: program.clone(),
        script: script.to_path_buf(),
        timeout: options.timeout,
        group: pid,
    };
    let task = tokio::spawn(supervise(child, stdout, stderr_task, tx, supervision));

    Ok(OutputStream {
        receiver,
        pid,
        command: program,
        task: Some(task),
        permit: None,
        finished: false,
    })
}

/// Bare program names are looked up on PATH so a missing interpreter is
/// reported before anything is spawned.
fn resolve_executable(executable: &str) -> Result<PathBuf> {
    if executable.contains(MAIN_SEPARATOR) || executable.contains('/') {
        return Ok(PathBuf::from(executable));
    }
    which::which(executable).map_err(|e| {
        ExecutionError::SpawnFailed {
            command: executable.to_string(),
            error: e.to_string(),
            suggestion: Some(format!(
                "Install {executable} or set interpreters.<language>.executable in the configuration"
            )),
        }
        .into()
    })
}

struct Supervision {
    command: String,
    script: PathBuf,
    timeout: Option<Duration>,
    /// Process group led by the child
    group: Option<u32>,
}

enum Step {
    Line(String),
    Eof,
    Cancelled,
    TimedOut,
    Failed(String),
}

enum Exit {
    Status(std::process::ExitStatus),
    Cancelled,
    TimedOut,
    Failed(String),
}

async fn supervise(
    mut child: Child,
    stdout: ChildStdout,
    stderr_task: JoinHandle<String>,
    tx: mpsc::Sender<Result<String>>,
    ctx: Supervision,
) {
    let started = Instant::now();
    let deadline = ctx.timeout.map(|t| started + t);
    let mut reader = BufReader::new(stdout);
    let mut lines: u64 = 0;

    loop {
        let mut buf = Vec::new();
        let step = tokio::select! {
            _ = tx.closed() => Step::Cancelled,
            read = within(deadline, reader.read_until(b'\n', &mut buf)) => match read {
                None => Step::TimedOut,
                Some(Ok(0)) => Step::Eof,
                Some(Ok(_)) => Step::Line(strip_terminator(&buf)),
                Some(Err(e)) => Step::Failed(e.to_string()),
            },
        };

        match step {
            Step::Line(line) => match within(deadline, tx.send(Ok(line))).await {
                Some(Ok(())) => lines += 1,
                Some(Err(_)) => return cancel(child, stderr_task, &ctx).await,
                None => return time_out(child, stderr_task, &tx, &ctx).await,
            },
            Step::Eof => break,
            Step::Cancelled => return cancel(child, stderr_task, &ctx).await,
            Step::TimedOut => return time_out(child, stderr_task, &tx, &ctx).await,
            Step::Failed(error) => {
                terminate(&mut child, ctx.group).await;
                stderr_task.abort();
                let _ = tx
                    .send(Err(ExecutionError::StreamInterrupted {
                        command: ctx.command.clone(),
                        error,
                    }
                    .into()))
                    .await;
                return;
            }
        }
    }

    let exit = tokio::select! {
        _ = tx.closed() => Exit::Cancelled,
        status = within(deadline, child.wait()) => match status {
            None => Exit::TimedOut,
            Some(Ok(status)) => Exit::Status(status),
            Some(Err(e)) => Exit::Failed(e.to_string()),
        },
    };

    let duration_ms = started.elapsed().as_millis();
    match exit {
        Exit::Status(status) if status.success() => {
            stderr_task.abort();
            crate::logging::utils::log_procedure_completion(&ctx.command, true, lines, duration_ms);
        }
        Exit::Status(status) => {
            crate::logging::utils::log_procedure_completion(&ctx.command, false, lines, duration_ms);
            let stderr = match tokio::time::timeout(STDERR_GRACE, stderr_task).await {
                Ok(Ok(tail)) => tail,
                _ => String::new(),
            };
            let _ = tx
                .send(Err(ExecutionError::SubprocessFailure {
                    command: ctx.command.clone(),
                    script: ctx.script.clone(),
                    exit_code: status.code(),
                    stderr,
                }
                .into()))
                .await;
        }
        Exit::Cancelled => cancel(child, stderr_task, &ctx).await,
        Exit::TimedOut => time_out(child, stderr_task, &tx, &ctx).await,
        Exit::Failed(error) => {
            stderr_task.abort();
            let _ = tx
                .send(Err(ExecutionError::StreamInterrupted {
                    command: ctx.command.clone(),
                    error,
                }
                .into()))
                .await;
        }
    }
}

async fn cancel(mut child: Child, stderr_task: JoinHandle<String>, ctx: &Supervision) {
    terminate(&mut child, ctx.group).await;
    stderr_task.abort();
    tracing::debug!(command = %ctx.command, "Procedure cancelled by consumer");
}

async fn time_out(
    mut child: Child,
    stderr_task: JoinHandle<String>,
    tx: &mpsc::Sender<Result<String>>,
    ctx: &Supervision,
) {
    terminate(&mut child, ctx.group).await;
    stderr_task.abort();
    let duration = ctx.timeout.unwrap_or_default();
    tracing::warn!(command = %ctx.command, ?duration, "Procedure timed out");
    let error: LionelError = ExecutionError::Timeout {
        command: ctx.command.clone(),
        duration,
    }
    .into();
    let _ = tx.send(Err(error)).await;
}

/// Kill every process in the child's group, then kill and reap the child itself
async fn terminate(child: &mut Child, group: Option<u32>) {
    if let Some(group) = group {
        kill_group(group);
    }
    let _ = child.kill().await;
}

#[cfg(unix)]
fn kill_group(group: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Err(e) = killpg(Pid::from_raw(group as i32), Signal::SIGKILL) {
        tracing::debug!(group, error = %e, "Process group already gone");
    }
}

#[cfg(not(unix))]
fn kill_group(_group: u32) {}

async fn within<F: std::future::Future>(deadline: Option<Instant>, future: F) -> Option<F::Output> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, future).await.ok(),
        None => Some(future.await),
    }
}

async fn capture_tail<R: AsyncRead + Unpin>(mut reader: R, limit: usize) -> String {
    let mut tail: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                tail.extend_from_slice(&chunk[..n]);
                if tail.len() > limit {
                    let excess = tail.len() - limit;
                    tail.drain(..excess);
                }
            }
        }
    }
    String::from_utf8_lossy(&tail).into_owned()
}

fn strip_terminator(buf: &[u8]) -> String {
    let mut end = buf.len();
    if end > 0 && buf[end - 1] == b'\n' {
        end -= 1;
        if end > 0 && buf[end - 1] == b'\r' {
            end -= 1;
        }
    }
    String::from_utf8_lossy(&buf[..end]).into_owned()
}
