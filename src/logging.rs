//! Tracing initialization for the binaries.

use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub const LOG_ENV: &str = "MORPHOLANG_LOG";

static INIT: Once = Once::new();

/// Reads `MORPHOLANG_LOG` (e.g. `MORPHOLANG_LOG=morpholang=debug`), falling
/// back to `morpholang=info`. Safe to call more than once.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("morpholang=info"));
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .with(filter)
            .init();
    });
}
