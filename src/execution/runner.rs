//! Process-backed executor.
//!
//! Every invocation owns its child, one reader task per output pipe and an
//! optional stdin feeder task. The driving task races the child's exit
//! against the watchdog (and, when streaming, against the consumer dropping
//! the stream), then joins the readers before classifying the outcome.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, trace, warn};

use super::command::Command;
use super::executor::{Executor, OutputStream, RunFuture};
use super::options::{ExecutionOptions, NonZeroExitPolicy, StandardInput};
use super::result::{CommandOutput, ExecutionResult, OutputSource};
use crate::error::ExecutionError;
use crate::Result;

/// Default time a process gets to exit after the terminate request before
/// it is killed.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(2);

/// Default buffer size for reading pipe output.
const READ_BUFFER_SIZE: usize = 4096;

type ChunkSender = mpsc::UnboundedSender<Result<CommandOutput>>;

/// An [`Executor`] that runs commands as local child processes.
///
/// The runner holds no per-invocation state, so one instance can serve any
/// number of concurrent `run` and `stream` calls. Both require a Tokio
/// runtime.
#[derive(Debug, Clone, Copy)]
pub struct ProcessRunner {
    buffer_size: usize,
    kill_grace: Duration,
}

impl ProcessRunner {
    /// Create a new process runner.
    pub fn new() -> Self {
        Self {
            buffer_size: READ_BUFFER_SIZE,
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }

    /// Set the pipe read buffer size, which bounds the size of streamed chunks.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Set how long a terminated process may take to exit before it is killed.
    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn kill_grace(&self) -> Duration {
        self.kill_grace
    }

    async fn execute(&self, command: &Command, options: ExecutionOptions) -> Result<ExecutionResult> {
        let mut invocation =
            Invocation::spawn(command, options.standard_input, self.buffer_size, None)?;
        let termination = invocation
            .wait(options.timeout, self.kill_grace, None)
            .await;
        invocation
            .finish(termination, options.timeout, options.non_zero_exit)
            .await
    }

    async fn drive_stream(
        &self,
        command: &Command,
        options: ExecutionOptions,
        tx: &ChunkSender,
    ) -> Result<()> {
        let mut invocation = Invocation::spawn(
            command,
            options.standard_input,
            self.buffer_size,
            Some(tx.clone()),
        )?;
        match invocation
            .wait(options.timeout, self.kill_grace, Some(tx))
            .await
        {
            Termination::Cancelled => Ok(()),
            termination => invocation
                .finish(termination, options.timeout, options.non_zero_exit)
                .await
                .map(|_| ()),
        }
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for ProcessRunner {
    fn run<'a>(&'a self, command: &'a Command, options: ExecutionOptions) -> RunFuture<'a> {
        Box::pin(self.execute(command, options))
    }

    fn stream(&self, command: &Command, options: ExecutionOptions) -> OutputStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let runner = *self;
        let command = command.clone();

        tokio::spawn(async move {
            if let Err(err) = runner.drive_stream(&command, options, &tx).await {
                // receiver may already be gone
                let _ = tx.send(Err(err));
            }
        });

        OutputStream::new(rx)
    }
}

/// How waiting on the child ended.
#[derive(Debug)]
enum Termination {
    Exited(ExitStatus),
    WaitFailed(io::Error),
    /// The output stream was dropped and the child was stopped.
    Cancelled,
}

impl From<io::Result<ExitStatus>> for Termination {
    fn from(status: io::Result<ExitStatus>) -> Self {
        match status {
            Ok(status) => Self::Exited(status),
            Err(e) => Self::WaitFailed(e),
        }
    }
}

/// Aborts the task when dropped.
struct TaskGuard<T>(JoinHandle<T>);

impl<T> TaskGuard<T> {
    async fn join(&mut self) -> std::result::Result<T, JoinError> {
        (&mut self.0).await
    }
}

impl<T> Drop for TaskGuard<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Per-invocation state. Dropping it aborts the helper tasks; the child is
/// spawned with `kill_on_drop`.
struct Invocation {
    child: Child,
    pid: Option<u32>,
    started: Instant,
    stdout: TaskGuard<io::Result<Vec<u8>>>,
    stderr: TaskGuard<io::Result<Vec<u8>>>,
    /// Held only so the feeder is aborted along with the invocation.
    _stdin: Option<TaskGuard<()>>,
    /// Set to the configured timeout right before the watchdog terminates
    /// the child.
    timed_out: Option<Duration>,
}

impl Invocation {
    fn spawn(
        command: &Command,
        input: Option<StandardInput>,
        buffer_size: usize,
        sink: Option<ChunkSender>,
    ) -> Result<Self> {
        let mut cmd = tokio::process::Command::new(command.executable());
        cmd.args(command.arguments());

        if let Some(dir) = command.current_dir() {
            cmd.current_dir(dir);
        }

        if let Some(env) = command.env_override() {
            cmd.env_clear().envs(env.iter());
        }

        let (stdin_cfg, input) = match input {
            None => (Stdio::inherit(), None),
            Some(StandardInput::Null) => (Stdio::null(), None),
            Some(input) => (Stdio::piped(), Some(input)),
        };

        cmd.stdin(stdin_cfg)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            debug!(
                executable = %command.executable().display(),
                error = %e,
                "failed to spawn process"
            );
            ExecutionError::SpawnFailed(e)
        })?;

        let pid = child.id();
        debug!(
            pid,
            executable = %command.executable().display(),
            args = ?command.arguments(),
            "process spawned"
        );

        let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

        let stdin = match (input, child.stdin.take()) {
            (Some(input), Some(pipe)) => Some(TaskGuard(tokio::spawn(feed_stdin(pipe, input)))),
            _ => None,
        };

        Ok(Self {
            pid,
            started: Instant::now(),
            stdout: TaskGuard(tokio::spawn(drain_pipe(
                stdout,
                OutputSource::Stdout,
                buffer_size,
                sink.clone(),
            ))),
            stderr: TaskGuard(tokio::spawn(drain_pipe(
                stderr,
                OutputSource::Stderr,
                buffer_size,
                sink,
            ))),
            _stdin: stdin,
            child,
            timed_out: None,
        })
    }

    /// Wait for the child to exit, enforcing the timeout and, when a sink is
    /// given, stopping the child once the sink's receiver is dropped.
    async fn wait(
        &mut self,
        timeout: Option<Duration>,
        kill_grace: Duration,
        sink: Option<&ChunkSender>,
    ) -> Termination {
        let watchdog = async move {
            match timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };
        let cancelled = async move {
            match sink {
                Some(tx) => tx.closed().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;

            status = self.child.wait() => status.into(),

            _ = watchdog => {
                warn!(
                    pid = self.pid,
                    timeout_secs = timeout.unwrap_or_default().as_secs_f64(),
                    "process exceeded timeout; terminating"
                );
                self.timed_out = timeout;
                self.terminate(kill_grace).await.into()
            }

            _ = cancelled => {
                debug!(pid = self.pid, "output stream dropped; terminating process");
                if let Err(e) = self.terminate(kill_grace).await {
                    warn!(pid = self.pid, error = %e, "failed to stop cancelled process");
                }
                Termination::Cancelled
            }
        }
    }

    /// Ask the child to exit, killing it if it is still alive after `grace`.
    async fn terminate(&mut self, grace: Duration) -> io::Result<ExitStatus> {
        send_terminate(&mut self.child);

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                warn!(
                    pid = self.pid,
                    grace_ms = grace.as_millis() as u64,
                    "process ignored terminate request; killing"
                );
                self.child.kill().await?;
                self.child.wait().await
            }
        }
    }

    async fn finish(
        mut self,
        termination: Termination,
        timeout: Option<Duration>,
        policy: NonZeroExitPolicy,
    ) -> Result<ExecutionResult> {
        let status = exit_status(self.pid, termination, self.timed_out)?;

        debug!(
            pid = self.pid,
            %status,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "process exited"
        );

        // A descendant that inherited a pipe keeps it open after the child
        // exits; the timeout still bounds the whole call.
        let pid = self.pid;
        let deadline = timeout.map(|t| (t, tokio::time::Instant::from_std(self.started + t)));
        let (out, err) = (&mut self.stdout, &mut self.stderr);
        let readers = async move { tokio::join!(out.join(), err.join()) };

        let (stdout, stderr) = match deadline {
            Some((timeout, deadline)) => match tokio::time::timeout_at(deadline, readers).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(
                        pid,
                        timeout_secs = timeout.as_secs_f64(),
                        "output pipes still open at timeout; abandoning readers"
                    );
                    return Err(ExecutionError::Timeout(timeout));
                }
            },
            None => readers.await,
        };

        let stdout = join_reader(stdout).map_err(ExecutionError::FailedToReadOutput)?;
        let stderr = join_reader(stderr).map_err(ExecutionError::FailedToReadOutput)?;

        classify(exit_state(status), policy, &stdout, &stderr)
    }
}

/// Resolve how waiting ended into an exit status. The timed-out flag wins
/// over everything else, including a failed kill or reap.
fn exit_status(
    pid: Option<u32>,
    termination: Termination,
    timed_out: Option<Duration>,
) -> Result<ExitStatus> {
    match (termination, timed_out) {
        (Termination::WaitFailed(e), Some(timeout)) => {
            warn!(pid, error = %e, "failed to reap timed out process");
            Err(ExecutionError::Timeout(timeout))
        }
        (_, Some(timeout)) => Err(ExecutionError::Timeout(timeout)),
        (Termination::Exited(status), None) => Ok(status),
        (Termination::WaitFailed(e), None) => {
            warn!(pid, error = %e, "failed to wait for process");
            Err(ExecutionError::Unknown)
        }
        (Termination::Cancelled, None) => Err(ExecutionError::Unknown),
    }
}

fn missing_pipe(name: &str) -> ExecutionError {
    ExecutionError::SpawnFailed(io::Error::other(format!("{} pipe was not captured", name)))
}

fn join_reader(
    joined: std::result::Result<io::Result<Vec<u8>>, JoinError>,
) -> io::Result<Vec<u8>> {
    joined.unwrap_or_else(|e| Err(io::Error::other(e)))
}

/// Read a pipe to EOF, optionally forwarding every chunk to `sink`.
async fn drain_pipe<R>(
    mut pipe: R,
    source: OutputSource,
    buffer_size: usize,
    sink: Option<ChunkSender>,
) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut captured = Vec::new();
    let mut buf = vec![0u8; buffer_size];

    loop {
        let n = match pipe.read(&mut buf).await {
            Ok(0) => {
                trace!(?source, "pipe reached EOF");
                break;
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!(?source, error = %e, "pipe read failed");
                return Err(e);
            }
        };

        trace!(?source, bytes = n, "read output chunk");
        captured.extend_from_slice(&buf[..n]);

        if let Some(tx) = &sink {
            // keep draining even without a consumer so the child never
            // blocks on a full pipe
            let _ = tx.send(Ok(CommandOutput::new(source, buf[..n].to_vec())));
        }
    }

    Ok(captured)
}

/// Write `input` to the child's stdin, then close it.
async fn feed_stdin(mut pipe: ChildStdin, input: StandardInput) {
    let result = match input {
        StandardInput::Null => Ok(()),
        StandardInput::Bytes(bytes) => pipe.write_all(&bytes).await,
        StandardInput::Reader(mut reader) => {
            tokio::io::copy(&mut reader, &mut pipe).await.map(|_| ())
        }
    };

    match result {
        Ok(()) => trace!("stdin fully written"),
        // the child exited or closed stdin without reading everything
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => debug!("stdin closed by child"),
        Err(e) => warn!(error = %e, "failed to write stdin"),
    }
}

#[cfg(unix)]
fn send_terminate(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    // `id` is `None` once the child has been reaped, so a recycled pid is
    // never signalled.
    if let Some(pid) = child.id() {
        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            debug!(pid, error = %e, "SIGTERM failed");
        }
    }
}

#[cfg(not(unix))]
fn send_terminate(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        debug!(error = %e, "failed to kill process");
    }
}

/// How a process ended, as far as classification cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitState {
    Code(i32),
    Signal(i32),
    Unknown,
}

fn exit_state(status: ExitStatus) -> ExitState {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return ExitState::Signal(signal);
        }
    }

    match status.code() {
        Some(code) => ExitState::Code(code),
        None => ExitState::Unknown,
    }
}

fn classify(
    state: ExitState,
    policy: NonZeroExitPolicy,
    stdout: &[u8],
    stderr: &[u8],
) -> Result<ExecutionResult> {
    let code = match state {
        ExitState::Signal(signal) => return Err(ExecutionError::UncaughtSignal(signal)),
        ExitState::Unknown => return Err(ExecutionError::Unknown),
        ExitState::Code(code) => code,
    };

    let stdout = String::from_utf8_lossy(stdout).into_owned();
    let stderr = String::from_utf8_lossy(stderr).into_owned();

    if code != 0 && policy == NonZeroExitPolicy::Error {
        return Err(ExecutionError::NonZeroExitCode {
            code,
            stdout,
            stderr,
        });
    }

    Ok(ExecutionResult::new(code, stdout, stderr))
}
