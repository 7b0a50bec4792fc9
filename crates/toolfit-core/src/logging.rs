//! Tracing setup for binaries and tests that drive the engine

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Directive used when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVE: &str = "info";

/// Install a stderr subscriber filtered by `RUST_LOG`, falling back to
/// [`DEFAULT_DIRECTIVE`].
///
/// Fails if a global subscriber is already installed.
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_with(DEFAULT_DIRECTIVE)
}

/// Like [`init`] with a caller-chosen fallback directive, e.g.
/// `"toolfit_core=debug,toolfit_merge=trace"`.
pub fn init_with(directive: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(directive)?,
    };

    // Reports go to stdout; keep logs out of the way.
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact();

    tracing_subscriber::registry().with(filter).with(layer).try_init()?;
    Ok(())
}
