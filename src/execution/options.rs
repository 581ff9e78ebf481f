//! Per-invocation execution options.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

/// Default execution timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Source for a child's standard input.
///
/// Without one the child inherits the caller's stdin.
pub enum StandardInput {
    /// Connect stdin to the null device.
    Null,
    /// Feed these bytes, then close stdin.
    Bytes(Vec<u8>),
    /// Copy from a reader until it reaches EOF, then close stdin.
    Reader(Box<dyn AsyncRead + Send + Unpin>),
}

impl StandardInput {
    /// Feed the given reader into the child's stdin.
    pub fn reader(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self::Reader(Box::new(reader))
    }
}

impl fmt::Debug for StandardInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

impl From<Vec<u8>> for StandardInput {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&str> for StandardInput {
    fn from(text: &str) -> Self {
        Self::Bytes(text.as_bytes().to_vec())
    }
}

impl From<String> for StandardInput {
    fn from(text: String) -> Self {
        Self::Bytes(text.into_bytes())
    }
}

/// How a natural exit with a non-zero status is reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonZeroExitPolicy {
    /// Fail with [`ExecutionError::NonZeroExitCode`](crate::ExecutionError::NonZeroExitCode).
    #[default]
    Error,
    /// Return the result normally, carrying the non-zero exit code.
    ReturnResult,
}

/// Options controlling a single invocation.
#[derive(Debug)]
pub struct ExecutionOptions {
    /// Standard input for the child.
    pub standard_input: Option<StandardInput>,
    /// Watchdog timeout; `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Non-zero exit handling.
    pub non_zero_exit: NonZeroExitPolicy,
}

impl ExecutionOptions {
    /// Create options with the default timeout and error policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Provide standard input.
    pub fn standard_input(mut self, input: impl Into<StandardInput>) -> Self {
        self.standard_input = Some(input.into());
        self
    }

    /// Set the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Set the timeout in seconds; zero, negative or NaN disables it.
    pub fn timeout_secs(mut self, secs: f64) -> Self {
        self.timeout = timeout_from_secs(secs);
        self
    }

    /// Wait indefinitely.
    pub fn no_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Set the non-zero exit policy.
    pub fn non_zero_exit(mut self, policy: NonZeroExitPolicy) -> Self {
        self.non_zero_exit = policy;
        self
    }
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            standard_input: None,
            timeout: Some(DEFAULT_TIMEOUT),
            non_zero_exit: NonZeroExitPolicy::Error,
        }
    }
}

/// Convert a timeout in seconds into a watchdog duration.
pub(crate) fn timeout_from_secs(secs: f64) -> Option<Duration> {
    if secs > 0.0 {
        Duration::try_from_secs_f64(secs).ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = ExecutionOptions::default();
        assert!(options.standard_input.is_none());
        assert_eq!(options.timeout, Some(Duration::from_secs(10)));
        assert_eq!(options.non_zero_exit, NonZeroExitPolicy::Error);
    }

    #[test]
    fn test_timeout_secs() {
        let options = ExecutionOptions::new().timeout_secs(0.2);
        assert_eq!(options.timeout, Some(Duration::from_millis(200)));

        assert!(ExecutionOptions::new().timeout_secs(0.0).timeout.is_none());
        assert!(ExecutionOptions::new().timeout_secs(-1.0).timeout.is_none());
        assert!(ExecutionOptions::new().timeout_secs(f64::NAN).timeout.is_none());
    }

    #[test]
    fn test_zero_duration_disables_timeout() {
        let options = ExecutionOptions::new().timeout(Duration::ZERO);
        assert!(options.timeout.is_none());
    }

    #[test]
    fn test_standard_input_conversions() {
        let options = ExecutionOptions::new().standard_input("hello");
        assert!(matches!(
            options.standard_input,
            Some(StandardInput::Bytes(ref b)) if b == b"hello"
        ));

        let input = StandardInput::reader(std::io::Cursor::new(vec![1u8, 2, 3]));
        assert_eq!(format!("{:?}", input), "Reader(..)");
        assert_eq!(format!("{:?}", StandardInput::from(vec![0u8; 4])), "Bytes(4)");
    }

    #[test]
    fn test_policy_builder() {
        let options = ExecutionOptions::new()
            .no_timeout()
            .non_zero_exit(NonZeroExitPolicy::ReturnResult);
        assert!(options.timeout.is_none());
        assert_eq!(options.non_zero_exit, NonZeroExitPolicy::ReturnResult);
    }
}
