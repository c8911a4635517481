use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{PlayerError, Result};

/// Initialize logging. `RUST_LOG` takes precedence; otherwise the level
/// defaults to `debug` or `info` depending on the flag.
pub fn init(debug: bool) -> Result<()> {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| PlayerError::Config(format!("invalid log filter: {e}")))?;

    let fmt_layer = fmt::layer().with_target(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();

    Ok(())
}
