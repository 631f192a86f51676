//! Thin `tracing-subscriber` initializer, kept as its own crate so
//! `bin/otc-broker` doesn't have to know the layer stack.

#![warn(rust_2018_idioms)]

use tracing_subscriber::{fmt, EnvFilter};

/// Installs a global subscriber: `RUST_LOG`-driven filtering (default
/// `info`) with human-readable formatting to stdout.
///
/// Panics if a global subscriber is already installed; call this once,
/// at process start.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
