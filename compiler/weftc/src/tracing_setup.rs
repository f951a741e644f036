//! Tracing initialization for the host driver.
//!
//! Controlled by environment variables: `WEFT_LOG` (falls back to
//! `RUST_LOG`), defaulting to `warn` when neither is set.

use std::sync::OnceLock;
use tracing_subscriber::{prelude::*, EnvFilter, Registry};

static INIT: OnceLock<()> = OnceLock::new();

/// Safe to call multiple times — only the first call takes effect.
pub fn init() {
    INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_env("WEFT_LOG")
            .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
            .unwrap_or_else(|_| EnvFilter::new("warn"));

        Registry::default()
            .with(tracing_subscriber::fmt::layer().with_target(true).with_writer(std::io::stderr).compact())
            .with(filter)
            .init();
    });
}
