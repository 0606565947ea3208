//! Tracing initialization.
//!
//! The embedding frontend owns the real logging sink and usually installs
//! its own subscriber; this is a minimal stderr fallback for binaries and
//! tests that have no opinion.

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install a compact stderr subscriber honoring `RUST_LOG`, defaulting to
/// `marian=info,warn`. Safe to call multiple times; if the embedder already
/// installed a subscriber, theirs wins and this becomes a no-op.
pub fn init() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("marian=info,warn"));

        if let Err(error) = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .try_init()
        {
            eprintln!("failed to initialize tracing: {error}");
        }
    });
}
