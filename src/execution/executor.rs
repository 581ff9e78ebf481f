//! The executor contract and its output stream.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::{ready, Stream, StreamExt};
use tokio::sync::mpsc;

use super::command::Command;
use super::options::ExecutionOptions;
use super::result::{CommandOutput, ExecutionResult};
use crate::Result;

/// Future returned by [`Executor::run`].
pub type RunFuture<'a> = Pin<Box<dyn Future<Output = Result<ExecutionResult>> + Send + 'a>>;

/// Something that can execute a [`Command`].
///
/// Use [`run`](Self::run) to wait for completion and receive an
/// [`ExecutionResult`], or [`stream`](Self::stream) to consume stdout and
/// stderr as they are produced. Both fail with
/// [`ExecutionError`](crate::ExecutionError) when the process cannot be
/// spawned, times out, exits non-zero (under the default policy) or dies
/// from a signal.
pub trait Executor: Send + Sync {
    /// Run a command and return the collected result.
    fn run<'a>(&'a self, command: &'a Command, options: ExecutionOptions) -> RunFuture<'a>;

    /// Run a command and stream its output.
    ///
    /// The stream ends after the last chunk when the command succeeds;
    /// otherwise its final item is the error. Dropping the stream early
    /// terminates the process.
    fn stream(&self, command: &Command, options: ExecutionOptions) -> OutputStream;

    /// [`run`](Self::run) with default options.
    fn run_default<'a>(&'a self, command: &'a Command) -> RunFuture<'a> {
        self.run(command, ExecutionOptions::default())
    }

    /// [`stream`](Self::stream) with default options.
    fn stream_default(&self, command: &Command) -> OutputStream {
        self.stream(command, ExecutionOptions::default())
    }
}

/// Live output of a streaming invocation.
///
/// Yields `Ok(CommandOutput)` chunks, then either ends or yields a single
/// `Err` and ends. Dropping it before the end cancels the invocation.
#[derive(Debug)]
pub struct OutputStream {
    rx: mpsc::UnboundedReceiver<Result<CommandOutput>>,
    failed: bool,
}

impl OutputStream {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Result<CommandOutput>>) -> Self {
        Self { rx, failed: false }
    }

    /// Consume the stream, concatenating stdout and stderr chunks.
    pub async fn concat(mut self) -> Result<(Vec<u8>, Vec<u8>)> {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        while let Some(item) = self.next().await {
            match item? {
                CommandOutput::Stdout(bytes) => stdout.extend(bytes),
                CommandOutput::Stderr(bytes) => stderr.extend(bytes),
            }
        }
        Ok((stdout, stderr))
    }
}

impl Stream for OutputStream {
    type Item = Result<CommandOutput>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // an error is terminal even if a reader raced one more chunk in
        if self.failed {
            return Poll::Ready(None);
        }

        let item = ready!(self.rx.poll_recv(cx));
        if matches!(item, Some(Err(_))) {
            self.failed = true;
            self.rx.close();
        }
        Poll::Ready(item)
    }
}

/// Build a finished stream from items, for executors that don't spawn
/// anything.
impl FromIterator<Result<CommandOutput>> for OutputStream {
    fn from_iter<I: IntoIterator<Item = Result<CommandOutput>>>(iter: I) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        for item in iter {
            // the receiver is alive, so this cannot fail
            let _ = tx.send(item);
        }
        Self::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExecutionError;

    #[tokio::test]
    async fn test_stream_yields_items_in_order() {
        let stream: OutputStream = vec![
            Ok(CommandOutput::Stdout(b"a".to_vec())),
            Ok(CommandOutput::Stderr(b"b".to_vec())),
            Ok(CommandOutput::Stdout(b"c".to_vec())),
        ]
        .into_iter()
        .collect();

        let chunks: Vec<_> = stream.map(|item| item.unwrap().into_bytes()).collect().await;
        assert_eq!(chunks, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[tokio::test]
    async fn test_concat_splits_by_source() {
        let stream: OutputStream = vec![
            Ok(CommandOutput::Stdout(b"out".to_vec())),
            Ok(CommandOutput::Stderr(b"err".to_vec())),
            Ok(CommandOutput::Stdout(b"\n".to_vec())),
        ]
        .into_iter()
        .collect();

        let (stdout, stderr) = stream.concat().await.unwrap();
        assert_eq!(stdout, b"out\n");
        assert_eq!(stderr, b"err");
    }

    #[tokio::test]
    async fn test_concat_propagates_error() {
        let stream: OutputStream = vec![
            Ok(CommandOutput::Stdout(b"partial".to_vec())),
            Err(ExecutionError::UncaughtSignal(15)),
        ]
        .into_iter()
        .collect();

        let err = stream.concat().await.unwrap_err();
        assert_eq!(err.signal(), Some(15));
    }

    #[tokio::test]
    async fn test_stream_ends_after_error() {
        let mut stream: OutputStream = vec![
            Err(ExecutionError::Timeout(std::time::Duration::from_millis(200))),
            Ok(CommandOutput::Stdout(b"late".to_vec())),
        ]
        .into_iter()
        .collect();

        assert!(stream.next().await.unwrap().unwrap_err().is_timeout());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_stream_ends() {
        let mut stream: OutputStream = std::iter::empty().collect();
        assert!(stream.next().await.is_none());
    }
}
