//! Logging setup utilities for the Ichiba binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber with the specified default log level.
///
/// Every crate listed in `targets` (plus the binary itself) logs at
/// `default_log_level`. The filter can be overridden with the `RUST_LOG`
/// environment variable.
///
/// # Arguments
///
/// * `binary_name` - The name of the binary (e.g., "ichiba-client")
/// * `targets` - Library crates whose events should be shown (e.g., `["ichiba_client"]`)
/// * `default_log_level` - The default log level (e.g., "debug", "info", "warn", "error")
///
/// # Examples
///
/// ```no_run
/// use ichiba_shared::logger::setup_logger;
///
/// setup_logger("ichiba-client", &["ichiba_client"], "info");
/// ```
pub fn setup_logger(binary_name: &str, targets: &[&str], default_log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(binary_name, targets, default_log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build the `EnvFilter` directive used when `RUST_LOG` is not set.
fn default_filter(binary_name: &str, targets: &[&str], default_log_level: &str) -> String {
    std::iter::once(binary_name)
        .chain(targets.iter().copied())
        .map(|target| format!("{}={}", target.replace('-', "_"), default_log_level))
        .collect::<Vec<_>>()
        .join(",")
}
