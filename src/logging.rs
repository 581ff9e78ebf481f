//! Logging initialization and configuration.
//!
//! Logs go to stderr so they never interleave with forwarded child stdout.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "conquer=info";

type TryInitResult = Result<(), tracing_subscriber::util::TryInitError>;

fn install(filter: EnvFilter) -> TryInitResult {
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .try_init()
}

fn from_env_or_default() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the stderr subscriber, filtered by `RUST_LOG` or `conquer=info`.
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
pub fn init() {
    if let Err(e) = try_init() {
        panic!("failed to install tracing subscriber: {}", e);
    }
}

/// Like [`init`], but reports an already-installed subscriber as an error.
pub fn try_init() -> TryInitResult {
    install(from_env_or_default())
}

/// Install the subscriber with an explicit filter, ignoring `RUST_LOG`.
///
/// A bare level such as `debug` applies to this crate only; anything else is
/// parsed as a full `EnvFilter` directive. An unparsable directive falls back
/// to [`DEFAULT_FILTER`].
pub fn try_init_with_filter(filter: &str) -> TryInitResult {
    let filter = EnvFilter::try_new(directive_for(filter))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    install(filter)
}

fn directive_for(filter: &str) -> String {
    match filter.trim() {
        level @ ("error" | "warn" | "info" | "debug" | "trace" | "off") => {
            format!("conquer={}", level)
        }
        directive => directive.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_for_level() {
        assert_eq!(directive_for("debug"), "conquer=debug");
        assert_eq!(directive_for(" warn "), "conquer=warn");
    }

    #[test]
    fn test_directive_passthrough() {
        assert_eq!(directive_for("conquer=trace,tokio=info"), "conquer=trace,tokio=info");
    }

    #[test]
    fn test_repeated_init_does_not_panic() {
        let _ = try_init();
        assert!(try_init_with_filter("debug").is_err());
    }

    #[test]
    fn test_logging_works() {
        let _ = try_init();

        tracing::info!("test info message");
        tracing::debug!(pid = 42u32, "test debug message");
        tracing::warn!("test warn message");
    }
}
