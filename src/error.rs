//! Error types for command execution.

use std::time::Duration;

use thiserror::Error;

/// Terminal failure of a single command invocation.
///
/// Exactly one variant is produced per failed invocation. A non-zero exit
/// code only becomes an error under [`NonZeroExitPolicy::Error`], and it
/// carries everything the process wrote so the error is enough to diagnose
/// the failure on its own.
///
/// [`NonZeroExitPolicy::Error`]: crate::execution::NonZeroExitPolicy::Error
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// The process could not be started (missing executable, permissions, ...).
    #[error("failed to spawn command: {0}")]
    SpawnFailed(#[source] std::io::Error),

    /// The process exceeded the configured timeout and was terminated.
    #[error("command timed out after {:.3} seconds", .0.as_secs_f64())]
    Timeout(Duration),

    /// Reading stdout or stderr failed for a reason other than end-of-stream.
    #[error("failed to read command output: {0}")]
    FailedToReadOutput(#[source] std::io::Error),

    /// The process ran to completion and exited with a non-zero status.
    #[error(
        "command terminated with non-zero exit code: {code}{}",
        captured_output(.stdout, .stderr)
    )]
    NonZeroExitCode {
        code: i32,
        stdout: String,
        stderr: String,
    },

    /// The process was killed by a signal the runner did not send.
    #[error("command terminated by uncaught signal: {0}")]
    UncaughtSignal(i32),

    /// The termination reason could not be classified.
    #[error("command terminated for an unknown reason")]
    Unknown,
}

impl ExecutionError {
    /// Exit code carried by a [`NonZeroExitCode`](Self::NonZeroExitCode) error.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::NonZeroExitCode { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Signal number carried by an [`UncaughtSignal`](Self::UncaughtSignal) error.
    pub fn signal(&self) -> Option<i32> {
        match self {
            Self::UncaughtSignal(signal) => Some(*signal),
            _ => None,
        }
    }

    /// Check if the invocation was stopped by the watchdog.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

fn captured_output(stdout: &str, stderr: &str) -> String {
    let mut out = String::new();
    if !stdout.is_empty() {
        out.push_str("\nstdout: ");
        out.push_str(stdout);
    }
    if !stderr.is_empty() {
        out.push_str("\nstderr: ");
        out.push_str(stderr);
    }
    out
}

/// Convenience Result type for command execution.
pub type Result<T> = std::result::Result<T, ExecutionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_failed_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = ExecutionError::SpawnFailed(io_err);
        assert!(err.to_string().contains("failed to spawn"));
        assert!(err.to_string().contains("no such file"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_timeout_display() {
        let err = ExecutionError::Timeout(Duration::from_millis(200));
        assert_eq!(err.to_string(), "command timed out after 0.200 seconds");
        assert!(err.is_timeout());
    }

    #[test]
    fn test_non_zero_exit_display_without_output() {
        let err = ExecutionError::NonZeroExitCode {
            code: 42,
            stdout: String::new(),
            stderr: String::new(),
        };
        assert_eq!(
            err.to_string(),
            "command terminated with non-zero exit code: 42"
        );
        assert_eq!(err.exit_code(), Some(42));
    }

    #[test]
    fn test_non_zero_exit_display_with_output() {
        let err = ExecutionError::NonZeroExitCode {
            code: 1,
            stdout: "out\n".into(),
            stderr: "err\n".into(),
        };
        let message = err.to_string();
        assert!(message.contains("exit code: 1"));
        assert!(message.contains("\nstdout: out\n"));
        assert!(message.contains("\nstderr: err\n"));
    }

    #[test]
    fn test_non_zero_exit_display_stderr_only() {
        let err = ExecutionError::NonZeroExitCode {
            code: 2,
            stdout: String::new(),
            stderr: "usage".into(),
        };
        let message = err.to_string();
        assert!(!message.contains("stdout:"));
        assert!(message.ends_with("\nstderr: usage"));
    }

    #[test]
    fn test_uncaught_signal_display() {
        let err = ExecutionError::UncaughtSignal(9);
        assert!(err.to_string().contains("signal: 9"));
        assert_eq!(err.signal(), Some(9));
        assert_eq!(err.exit_code(), None);
    }

    #[test]
    fn test_unknown_display() {
        let err = ExecutionError::Unknown;
        assert!(err.to_string().contains("unknown"));
        assert!(!err.is_timeout());
    }
}
