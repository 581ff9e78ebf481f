//! Command-line interface for conquer.
//!
//! Uses lexopt for minimal binary size overhead.

use std::ffi::OsString;
use std::path::PathBuf;

use crate::error::ExecutionError;
use crate::execution::{Command, CommandBuilder, Environment};

/// Exit status used when the watchdog stopped the command.
pub const EXIT_TIMEOUT: u8 = 124;
/// Exit status used when the command could not be started.
pub const EXIT_SPAWN_FAILED: u8 = 127;
/// Exit status used for invalid usage.
pub const EXIT_USAGE: u8 = 2;

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Executable to run.
    pub executable: Option<PathBuf>,
    /// Arguments passed verbatim to the executable.
    pub arguments: Vec<String>,
    /// Timeout in seconds (overrides config).
    pub timeout: Option<f64>,
    /// Forward output as it is produced.
    pub stream: bool,
    /// Working directory for the command.
    pub cwd: Option<PathBuf>,
    /// Explicit environment variables.
    pub env: Vec<(String, String)>,
    /// Start the explicit environment from the current one.
    pub inherit_env: bool,
    /// Forward this process's stdin to the command.
    pub stdin: bool,
    /// Report non-zero exits as results instead of errors.
    pub allow_failure: bool,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

impl Args {
    /// Build the command described by these arguments.
    pub fn command(&self) -> Result<Command, ArgsError> {
        let executable = self.executable.clone().ok_or(ArgsError::MissingExecutable)?;

        let mut builder = CommandBuilder::new().executable(executable);
        for arg in &self.arguments {
            builder = builder.arg(arg.clone());
        }
        if let Some(ref dir) = self.cwd {
            builder = builder.working_directory(dir.clone());
        }
        if !self.env.is_empty() || self.inherit_env {
            let mut env = if self.inherit_env {
                Environment::current()
            } else {
                Environment::new()
            };
            env.extend(self.env.iter().cloned());
            builder = builder.environment(env);
        }

        builder.build().ok_or(ArgsError::MissingExecutable)
    }
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('t') | Long("timeout") => {
                let value: String = parser.value()?.parse()?;
                result.timeout = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("timeout", value))?,
                );
            }
            Short('s') | Long("stream") => {
                result.stream = true;
            }
            Short('C') | Long("cwd") => {
                result.cwd = Some(parser.value()?.parse()?);
            }
            Short('e') | Long("env") => {
                let value: String = parser.value()?.parse()?;
                result.env.push(parse_env_pair(value)?);
            }
            Long("inherit-env") => {
                result.inherit_env = true;
            }
            Short('i') | Long("stdin") => {
                result.stdin = true;
            }
            Long("allow-failure") => {
                result.allow_failure = true;
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                result.executable = Some(PathBuf::from(val));
                for raw in parser.raw_args()? {
                    let arg = raw
                        .into_string()
                        .map_err(|raw| ArgsError::NonUnicode(raw.to_string_lossy().into()))?;
                    result.arguments.push(arg);
                }
                break;
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

fn parse_env_pair(value: String) -> Result<(String, String), ArgsError> {
    match value.split_once('=') {
        Some((key, val)) if !key.is_empty() => Ok((key.to_string(), val.to_string())),
        _ => Err(ArgsError::InvalidValue("env", value)),
    }
}

/// Process exit status that mirrors how the command ended.
pub fn exit_status_for(err: &ExecutionError) -> u8 {
    match err {
        ExecutionError::SpawnFailed(_) => EXIT_SPAWN_FAILED,
        ExecutionError::Timeout(_) => EXIT_TIMEOUT,
        ExecutionError::NonZeroExitCode { code, .. } => exit_status_for_code(*code),
        ExecutionError::UncaughtSignal(signal) => 128u8.saturating_add(*signal as u8),
        ExecutionError::FailedToReadOutput(_) | ExecutionError::Unknown => 1,
    }
}

/// Truncate an exit code to a process exit status, keeping failures non-zero.
pub fn exit_status_for_code(code: i32) -> u8 {
    match code {
        0 => 0,
        1..=255 => code as u8,
        _ => 1,
    }
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"conquer {version}
Run a command with a timeout and typed failure reporting

USAGE:
    conquer [OPTIONS] <EXECUTABLE> [ARGS...]

OPTIONS:
    -t, --timeout <SECS>    Timeout in seconds, 0 disables [default: 10]
    -s, --stream            Forward output as it is produced
    -C, --cwd <DIR>         Working directory for the command
    -e, --env <KEY=VALUE>   Set a variable; the command gets only explicit variables
        --inherit-env       Start the explicit environment from the current one
    -i, --stdin             Forward stdin to the command
        --allow-failure     Treat non-zero exit codes as results
    -c, --config <FILE>     Path to configuration file (JSON)
    -l, --log-level <LVL>   Log level (error, warn, info, debug, trace)
    -h, --help              Print help
    -V, --version           Print version

ENVIRONMENT VARIABLES:
    CONQUER_TIMEOUT         Timeout in seconds (overrides config)
    CONQUER_LOG_LEVEL       Log level (overrides config)
    RUST_LOG                Alternative log level setting

EXIT STATUS:
    The command's exit code; 124 on timeout, 127 if it could not be
    started, 128+N if it was killed by signal N.

EXAMPLES:
    # Run with a two second timeout
    conquer -t 2 curl -sS https://example.com

    # Stream a build, keeping going on failure
    conquer -s --allow-failure cargo build

    # Run with a clean environment
    conquer -e FOO=bar env
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("conquer {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// No executable was given.
    MissingExecutable,
    /// A command argument is not valid Unicode.
    NonUnicode(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::MissingExecutable => write!(f, "missing executable"),
            Self::NonUnicode(arg) => write!(f, "argument is not valid unicode: '{}'", arg),
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;

    fn args(args: &[&str]) -> Vec<OsString> {
        std::iter::once("conquer")
            .chain(args.iter().copied())
            .map(OsString::from)
            .collect()
    }

    #[test]
    fn test_default_args() {
        let result = parse_args_from(args(&[])).unwrap();
        assert!(result.executable.is_none());
        assert!(result.timeout.is_none());
        assert!(!result.stream);
        assert!(matches!(result.command(), Err(ArgsError::MissingExecutable)));
    }

    #[test]
    fn test_executable_and_arguments() {
        let result = parse_args_from(args(&["-t", "2.5", "ls", "-la", "/tmp"])).unwrap();
        assert_eq!(result.timeout, Some(2.5));
        assert_eq!(result.executable, Some(PathBuf::from("ls")));
        assert_eq!(result.arguments, vec!["-la", "/tmp"]);
    }

    #[test]
    fn test_options_after_executable_are_passed_through() {
        let result = parse_args_from(args(&["grep", "-s", "--help", "x"])).unwrap();
        assert!(!result.stream);
        assert!(!result.help);
        assert_eq!(result.arguments, vec!["-s", "--help", "x"]);
    }

    #[test]
    fn test_long_options() {
        let result = parse_args_from(args(&[
            "--stream",
            "--cwd",
            "/tmp",
            "--allow-failure",
            "--stdin",
            "pwd",
        ]))
        .unwrap();
        assert!(result.stream);
        assert!(result.allow_failure);
        assert!(result.stdin);
        assert_eq!(result.cwd, Some(PathBuf::from("/tmp")));
    }

    #[test]
    fn test_env_pairs() {
        let result = parse_args_from(args(&["-e", "FOO=bar", "-e", "EMPTY=", "env"])).unwrap();
        assert_eq!(
            result.env,
            vec![
                ("FOO".to_string(), "bar".to_string()),
                ("EMPTY".to_string(), String::new())
            ]
        );

        let command = result.command().unwrap();
        let env = command.env_override().unwrap();
        assert_eq!(env.len(), 2);
        assert_eq!(env.get("FOO"), Some("bar"));
    }

    #[test]
    fn test_invalid_env_pair() {
        assert!(parse_args_from(args(&["-e", "NOVALUE", "env"])).is_err());
        assert!(parse_args_from(args(&["-e", "=x", "env"])).is_err());
    }

    #[test]
    fn test_inherit_env() {
        let result = parse_args_from(args(&["--inherit-env", "-e", "FOO=bar", "env"])).unwrap();
        let command = result.command().unwrap();
        let env = command.env_override().unwrap();
        assert_eq!(env.get("FOO"), Some("bar"));
        assert!(env.len() >= 1);
    }

    #[test]
    fn test_command_without_env_inherits() {
        let result = parse_args_from(args(&["-C", "/tmp", "pwd"])).unwrap();
        let command = result.command().unwrap();
        assert!(command.env_override().is_none());
        assert_eq!(command.current_dir(), Some(Path::new("/tmp")));
    }

    #[test]
    fn test_help_flag() {
        let result = parse_args_from(args(&["-h"])).unwrap();
        assert!(result.help);

        let result = parse_args_from(args(&["--help"])).unwrap();
        assert!(result.help);
    }

    #[test]
    fn test_version_flag() {
        let result = parse_args_from(args(&["-V"])).unwrap();
        assert!(result.version);
    }

    #[test]
    fn test_invalid_timeout() {
        let result = parse_args_from(args(&["-t", "soon", "ls"]));
        assert!(matches!(result, Err(ArgsError::InvalidValue("timeout", _))));
    }

    #[test]
    fn test_unknown_option() {
        assert!(parse_args_from(args(&["--bogus", "ls"])).is_err());
    }

    #[test]
    fn test_exit_status_for_errors() {
        let spawn = ExecutionError::SpawnFailed(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert_eq!(exit_status_for(&spawn), EXIT_SPAWN_FAILED);
        assert_eq!(
            exit_status_for(&ExecutionError::Timeout(Duration::from_secs(1))),
            EXIT_TIMEOUT
        );
        assert_eq!(exit_status_for(&ExecutionError::UncaughtSignal(9)), 137);
        assert_eq!(exit_status_for(&ExecutionError::Unknown), 1);

        let non_zero = ExecutionError::NonZeroExitCode {
            code: 42,
            stdout: String::new(),
            stderr: String::new(),
        };
        assert_eq!(exit_status_for(&non_zero), 42);
    }

    #[test]
    fn test_exit_status_for_code() {
        assert_eq!(exit_status_for_code(0), 0);
        assert_eq!(exit_status_for_code(255), 255);
        assert_eq!(exit_status_for_code(-1), 1);
        assert_eq!(exit_status_for_code(256), 1);
    }
}
