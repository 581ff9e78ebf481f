//! conquer binary entry point.

use std::process::ExitCode;

use conquer::cli::{self, Args, EXIT_USAGE};
use conquer::config::Config;
use conquer::{
    logging, CommandOutput, ExecutionError, Executor, NonZeroExitPolicy, StandardInput,
};
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Try 'conquer --help' for more information.");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }

    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(EXIT_USAGE);
        }
    };

    // Ignore the error if a subscriber is already installed
    let _ = logging::try_init_with_filter(config.log_filter());

    match execute(&args, &config).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => ExitCode::from(e),
    }
}

async fn execute(args: &Args, config: &Config) -> Result<u8, u8> {
    let command = args.command().map_err(|e| {
        eprintln!("error: {}", e);
        EXIT_USAGE
    })?;

    let runner = config.to_runner();
    let mut options = config.to_options();
    if !args.stdin {
        options = options.standard_input(StandardInput::Null);
    }
    if args.stream {
        // a streamed exit code only reaches us through the error
        options = options.non_zero_exit(NonZeroExitPolicy::Error);
    }

    debug!(?command, ?options, stream = args.stream, "executing");

    let outcome = if args.stream {
        forward_stream(runner.stream(&command, options)).await
    } else {
        forward_collected(runner.run(&command, options).await).await
    };

    outcome.map_err(|e| {
        if let ExecutionError::NonZeroExitCode { code, .. } = e {
            debug!(code, "command failed");
        } else {
            error!("{}", e);
        }
        cli::exit_status_for(&e)
    })
}

async fn forward_collected(
    outcome: conquer::Result<conquer::ExecutionResult>,
) -> conquer::Result<u8> {
    let (code, stdout, stderr) = match outcome {
        Ok(result) => (result.exit_code, result.stdout, result.stderr),
        Err(ExecutionError::NonZeroExitCode {
            code,
            stdout,
            stderr,
        }) => {
            write_all(stdout.as_bytes(), stderr.as_bytes()).await;
            return Err(ExecutionError::NonZeroExitCode {
                code,
                stdout: String::new(),
                stderr: String::new(),
            });
        }
        Err(e) => return Err(e),
    };

    write_all(stdout.as_bytes(), stderr.as_bytes()).await;
    Ok(cli::exit_status_for_code(code))
}

async fn forward_stream(mut stream: conquer::OutputStream) -> conquer::Result<u8> {
    let mut stdout = tokio::io::stdout();
    let mut stderr = tokio::io::stderr();

    while let Some(chunk) = stream.next().await {
        let written = match chunk? {
            CommandOutput::Stdout(bytes) => write_flush(&mut stdout, &bytes).await,
            CommandOutput::Stderr(bytes) => write_flush(&mut stderr, &bytes).await,
        };
        if let Err(e) = written {
            debug!(error = %e, "failed to forward output");
        }
    }

    Ok(0)
}

async fn write_all(out: &[u8], err: &[u8]) {
    if let Err(e) = write_flush(&mut tokio::io::stdout(), out).await {
        debug!(error = %e, "failed to write stdout");
    }
    if let Err(e) = write_flush(&mut tokio::io::stderr(), err).await {
        debug!(error = %e, "failed to write stderr");
    }
}

async fn write_flush<W>(writer: &mut W, bytes: &[u8]) -> std::io::Result<()>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    writer.write_all(bytes).await?;
    writer.flush().await
}
