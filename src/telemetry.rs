use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{Error, Result};

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence; `default_filter` (e.g. `"info"` or
/// `"glasses_tryon=debug"`) applies when it is unset. Output goes to stderr so
/// it never mixes with CLI output on stdout.
pub fn init_tracing(default_filter: &str) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()
        .map_err(|err| Error::Telemetry(err.to_string()))
}
