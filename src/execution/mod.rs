//! Command execution engine.
//!
//! This module provides:
//! - Command descriptions and ready-made helpers
//! - Collected and streaming execution through the [`Executor`] trait
//! - Timeout enforcement and typed termination classification
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use conquer::execution::{Command, ExecutionOptions, Executor, ProcessRunner};
//!
//! # async fn demo() -> conquer::Result<()> {
//! let runner = ProcessRunner::new();
//!
//! // Collected execution
//! let result = runner.run_default(&Command::echo(["hello"], false)).await?;
//! assert_eq!(result.stdout, "hello\n");
//!
//! // Streaming with a shorter timeout
//! let options = ExecutionOptions::new().timeout(Duration::from_secs(2));
//! let (stdout, _stderr) = runner
//!     .stream(&Command::new("ls").arg("-la"), options)
//!     .concat()
//!     .await?;
//! # let _ = stdout;
//! # Ok(())
//! # }
//! ```

mod builtin;
mod command;
mod environment;
mod executor;
mod options;
mod result;
mod runner;

pub use builtin::{Dialect, Script, ENV_LAUNCHER};
pub use command::{Command, CommandBuilder};
pub use environment::Environment;
pub use executor::{Executor, OutputStream, RunFuture};
pub use options::{ExecutionOptions, NonZeroExitPolicy, StandardInput, DEFAULT_TIMEOUT};
pub use result::{CommandOutput, ExecutionResult, OutputSource};
pub use runner::{ProcessRunner, DEFAULT_KILL_GRACE};
