//! Command building and representation.

use std::path::{Path, PathBuf};

use super::environment::Environment;

/// An external program invocation.
///
/// A `Command` is a plain description; nothing runs until it is handed to an
/// [`Executor`](super::Executor). Builder methods consume and return `self`,
/// so a finished command is never mutated behind the caller's back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    executable: PathBuf,
    arguments: Vec<String>,
    working_directory: Option<PathBuf>,
    environment: Option<Environment>,
}

impl Command {
    /// Create a command for the given executable.
    ///
    /// A bare name without a path separator is looked up on `PATH`.
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            arguments: Vec::new(),
            working_directory: None,
            environment: None,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.arguments.push(arg.into());
        self
    }

    /// Append multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    pub fn working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// Replace the child's environment with `env`.
    pub fn environment(mut self, env: Environment) -> Self {
        self.environment = Some(env);
        self
    }

    /// Add a variable to the environment override.
    ///
    /// The first call starts an empty override, so the child no longer
    /// inherits the caller's environment.
    pub fn env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment
            .get_or_insert_with(Environment::new)
            .set(key, value);
        self
    }

    /// The executable to run.
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// The ordered argument list.
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// The working directory override.
    pub fn current_dir(&self) -> Option<&Path> {
        self.working_directory.as_deref()
    }

    /// The environment override, `None` when the environment is inherited.
    pub fn env_override(&self) -> Option<&Environment> {
        self.environment.as_ref()
    }
}

/// Builder for creating commands with fluent API.
#[derive(Debug, Default)]
pub struct CommandBuilder {
    executable: Option<PathBuf>,
    arguments: Vec<String>,
    working_directory: Option<PathBuf>,
    environment: Option<Environment>,
}

impl CommandBuilder {
    /// Create a new command builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the executable.
    pub fn executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = Some(executable.into());
        self
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.arguments.push(arg.into());
        self
    }

    /// Set the working directory.
    pub fn working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// Replace the child's environment.
    pub fn environment(mut self, env: Environment) -> Self {
        self.environment = Some(env);
        self
    }

    /// Build the command.
    ///
    /// Returns `None` if no executable, or an empty one, was specified.
    pub fn build(self) -> Option<Command> {
        let executable = self.executable.filter(|exe| !exe.as_os_str().is_empty())?;
        Some(Command {
            executable,
            arguments: self.arguments,
            working_directory: self.working_directory,
            environment: self.environment,
        })
    }
}
