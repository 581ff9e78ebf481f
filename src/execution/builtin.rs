//! Ready-made commands for common utilities and script one-liners.

use std::path::PathBuf;

use super::command::Command;
use super::environment::Environment;

/// Launcher used to resolve utilities through `PATH`.
pub const ENV_LAUNCHER: &str = "/usr/bin/env";

impl Command {
    /// Run `utility` through `/usr/bin/env`, so it is resolved on `PATH`
    /// instead of as a shell builtin.
    pub fn env<I, S>(utility: impl Into<String>, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Command::new(ENV_LAUNCHER).arg(utility).args(arguments)
    }

    /// Write `operands` to standard output with the system `echo` utility.
    pub fn echo<I, S>(operands: I, omit_trailing_newline: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let flag = omit_trailing_newline.then(|| "-n".to_string());
        Command::env("echo", flag.into_iter().chain(operands.into_iter().map(Into::into)))
    }
}

/// An interpreter and the flag it takes to evaluate inline source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    /// Interpreter name, resolved on `PATH`.
    pub name: &'static str,
    /// Flag that introduces the inline program.
    pub flag: &'static str,
}

impl Dialect {
    pub const SH: Dialect = Dialect::new("sh", "-c");
    pub const BASH: Dialect = Dialect::new("bash", "-c");
    pub const ZSH: Dialect = Dialect::new("zsh", "-c");
    pub const NODE: Dialect = Dialect::new("node", "-e");
    pub const RUBY: Dialect = Dialect::new("ruby", "-e");
    pub const PERL: Dialect = Dialect::new("perl", "-e");
    pub const PHP: Dialect = Dialect::new("php", "-r");
    pub const PYTHON: Dialect = Dialect::new("python3", "-c");

    /// Create a custom dialect.
    pub const fn new(name: &'static str, flag: &'static str) -> Self {
        Self { name, flag }
    }
}

/// Inline source code evaluated by an interpreter.
///
/// Extra positional arguments are passed after the source; for the shell
/// dialects the first one becomes `$0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    dialect: Dialect,
    content: String,
    arguments: Vec<String>,
}

impl Script {
    /// Create a script for the given dialect.
    pub fn new(dialect: Dialect, content: impl Into<String>) -> Self {
        Self {
            dialect,
            content: content.into(),
            arguments: Vec::new(),
        }
    }

    /// Shorthand for a POSIX `sh` script.
    pub fn sh(content: impl Into<String>) -> Self {
        Self::new(Dialect::SH, content)
    }

    /// Shorthand for a `bash` script.
    pub fn bash(content: impl Into<String>) -> Self {
        Self::new(Dialect::BASH, content)
    }

    /// Append positional arguments for the script.
    pub fn args<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(arguments.into_iter().map(Into::into));
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Build the command that evaluates this script.
    pub fn command(&self) -> Command {
        Command::env(
            self.dialect.name,
            [self.dialect.flag.to_string(), self.content.clone()]
                .into_iter()
                .chain(self.arguments.iter().cloned()),
        )
    }

    /// Build the command with a working directory and optional environment
    /// override.
    pub fn command_in(&self, dir: impl Into<PathBuf>, environment: Option<Environment>) -> Command {
        let cmd = self.command().working_directory(dir);
        match environment {
            Some(env) => cmd.environment(env),
            None => cmd,
        }
    }
}

impl From<Script> for Command {
    fn from(script: Script) -> Self {
        script.command()
    }
}
