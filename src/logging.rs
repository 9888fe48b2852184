//! Log output of the binary. Events go to stderr, stdout only carries the count.
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer};

/// Filter used when `RUST_LOG` is unset. Per-range scan summaries are debug events.
const DEFAULT_DIRECTIVES: &str = "info,ipv4_distinct_counter=debug";

/// Install the global subscriber: human readable output when `pretty` is set, JSON lines otherwise.
///
/// Fails if a global subscriber is already installed.
pub fn setup_logging(pretty: bool) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));
    let output = if pretty {
        fmt::layer().pretty().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(output)
        .try_init()
}
