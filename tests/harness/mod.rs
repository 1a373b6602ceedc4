//! Shared helpers for integration tests.
//!
//! Spawns axum WebSocket servers with a handful of scripted behaviours and
//! wires up `tracing` output for failing tests.

#![allow(dead_code)]

mod server;

pub use server::TestServer;

use tracing_subscriber::EnvFilter;

/// Install a test-friendly subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
