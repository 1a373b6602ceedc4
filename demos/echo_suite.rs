//! Run the echo round-trip suite against a live endpoint.
//!
//! Run with:
//! ```bash
//! WSPROBE_WEB_SOCKET_URI=ws://127.0.0.1:9001/ RUST_LOG=wsprobe=debug \
//!   cargo run --example echo_suite
//! ```
//!
//! Alternatively pass a properties file with a `web_socket_uri` entry:
//! `cargo run --example echo_suite -- config.properties`

use std::error::Error;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;
use wsprobe::{Config, TestCase, TestSystem};

fn load_config() -> wsprobe::Result<Config> {
    match std::env::args().nth(1) {
        Some(path) => Config::from_properties_file(path),
        None => Config::from_env(),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config()?;
    println!("Testing {}", config.uri);

    let system = TestSystem::new("echo_suite", config);
    let report = system
        .run_suite(vec![
            TestCase::new("echo", |system| async move {
                let actor = system.connection_actor().await?;
                let mut probe = system.probe();
                actor.tell("Hello Server", probe.address()).await?;
                probe.expect_msg("Hello Server").await?;
                probe.expect_no_msg().await
            }),
            TestCase::new("echo_sequence", |system| async move {
                let actor = system.connection_actor().await?;
                let mut probe = system.probe();
                for i in 0..5 {
                    let payload = format!("message {i}");
                    actor.tell(payload.clone(), probe.address()).await?;
                    probe.expect_msg(&payload).await?;
                }
                probe.expect_no_msg().await
            }),
        ])
        .await;
    system.shutdown();

    println!("{report}");
    Ok(if report.all_passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
