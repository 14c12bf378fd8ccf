use time::macros::format_description;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber. `RUST_LOG` overrides the `info` default.
///
/// `log` records emitted by the library crates are forwarded to the same
/// subscriber.
pub fn init_logger() {
    init_logger_with(DEFAULT_FILTER);
}

/// Like [`init_logger`] with a different fallback directive. Calling it a
/// second time leaves the first subscriber in place.
pub fn init_logger_with(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let time_format =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:2]");

    let installed = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_timer(fmt::time::LocalTime::new(time_format))
                .with_target(false)
                .with_level(true)
                .with_thread_names(false)
                .with_line_number(false)
                .with_file(false)
                .compact(),
        )
        .with(filter)
        .try_init();

    if installed.is_err() {
        tracing::debug!("global subscriber already installed");
    }
}
