//! # conquer
//!
//! Run external programs to completion or as a live output stream, with
//! bounded waiting time and precise failure reporting.
//!
//! ## Features
//!
//! - **Collected execution**: wait for exit and get stdout, stderr and the exit code
//! - **Streaming execution**: consume output chunks as the process produces them
//! - **Timeouts**: a watchdog terminates processes that run too long
//! - **Typed failures**: spawn errors, timeouts, non-zero exits and signals are distinct
//!
//! ## Quick Start
//!
//! ```no_run
//! use conquer::{Command, Executor, ProcessRunner};
//!
//! #[tokio::main]
//! async fn main() -> conquer::Result<()> {
//!     // Initialize logging
//!     conquer::logging::try_init().ok();
//!
//!     let runner = ProcessRunner::new();
//!     let result = runner.run_default(&Command::env("uname", ["-s"])).await?;
//!
//!     println!("exit {}: {}", result.exit_code, result.stdout_trimmed());
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod execution;
pub mod logging;

// Re-export commonly used types
pub use error::{ExecutionError, Result};
pub use execution::{
    Command, CommandOutput, Environment, ExecutionOptions, ExecutionResult, Executor,
    NonZeroExitPolicy, OutputStream, ProcessRunner, Script, StandardInput,
};
