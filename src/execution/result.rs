//! Execution result types.

/// Collected result of a command that ran to completion.
///
/// Only produced for exit code 0, or for any exit code under
/// [`NonZeroExitPolicy::ReturnResult`](super::NonZeroExitPolicy::ReturnResult).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Exit status of the process.
    pub exit_code: i32,
    /// Standard output, decoded as UTF-8 (lossy).
    pub stdout: String,
    /// Standard error, decoded as UTF-8 (lossy).
    pub stderr: String,
}

impl ExecutionResult {
    /// Create a new execution result.
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Check if command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Get stdout, trimmed.
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }

    /// Get stdout lines.
    pub fn stdout_lines(&self) -> impl Iterator<Item = &str> {
        self.stdout.lines()
    }
}

/// Pipe a chunk of output was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputSource {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

/// One chunk of output produced while streaming a command.
///
/// Chunks from the same pipe arrive in read order; there is no ordering
/// between stdout and stderr chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutput {
    /// Bytes read from standard output.
    Stdout(Vec<u8>),
    /// Bytes read from standard error.
    Stderr(Vec<u8>),
}

impl CommandOutput {
    pub(crate) fn new(source: OutputSource, bytes: Vec<u8>) -> Self {
        match source {
            OutputSource::Stdout => Self::Stdout(bytes),
            OutputSource::Stderr => Self::Stderr(bytes),
        }
    }

    pub fn source(&self) -> OutputSource {
        match self {
            Self::Stdout(_) => OutputSource::Stdout,
            Self::Stderr(_) => OutputSource::Stderr,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::Stdout(bytes) | Self::Stderr(bytes) => bytes,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Stdout(bytes) | Self::Stderr(bytes) => bytes,
        }
    }

    /// Decoded text (best effort). A multi-byte character split across two
    /// chunks decodes as replacement characters here.
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(self.bytes()).into_owned()
    }
}
