//! Connection endpoint against live servers.

mod harness;

use std::time::Duration;

use harness::{TestServer, init_tracing};
use tokio::sync::mpsc;
use wsprobe::config::Timeouts;
use wsprobe::{Config, ConnectionActor, ConnectionState, Endpoint, Error, TestProbe};

#[tokio::test]
async fn test_refused_connection() {
    init_tracing();
    let err = Endpoint::open("ws://127.0.0.1:1/", &Config::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Connection(_)), "{err}");
}

#[tokio::test]
async fn test_invalid_uri() {
    let err = Endpoint::open("wss://example.com/", &Config::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Connection(_)), "{err}");
}

#[tokio::test]
async fn test_unknown_route_fails_handshake() {
    init_tracing();
    let server = TestServer::spawn().await;
    let err = Endpoint::open(&server.uri("/missing"), &Config::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Connection(_)), "{err}");
}

#[tokio::test]
async fn test_handshake_timeout() {
    init_tracing();
    // Accepts TCP but never answers the upgrade request.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let _hold = tokio::spawn(async move {
        let (_stream, _) = listener.accept().await.unwrap();
        std::future::pending::<()>().await;
    });

    let timeouts = Timeouts {
        handshake: Duration::from_millis(200),
        ..Timeouts::default()
    };
    let config = Config::default().with_timeouts(timeouts);
    let err = Endpoint::open(&format!("ws://{addr}/"), &config)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Connection(_)), "{err}");
}

#[tokio::test]
async fn test_send_and_handler() {
    init_tracing();
    let server = TestServer::spawn().await;
    let endpoint = Endpoint::open(&server.uri("/echo"), &Config::default())
        .await
        .unwrap();
    assert_eq!(endpoint.state(), ConnectionState::Open);

    let (tx, mut rx) = mpsc::unbounded_channel();
    endpoint.set_handler(move |text| {
        let _ = tx.send(text);
    });

    endpoint.send("Hello Server").await.unwrap();
    let reply = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap();
    assert_eq!(reply.as_deref(), Some("Hello Server"));
}

#[tokio::test]
async fn test_send_after_close_fails() {
    init_tracing();
    let server = TestServer::spawn().await;
    let endpoint = Endpoint::open(&server.uri("/echo"), &Config::default())
        .await
        .unwrap();

    endpoint.close().await.unwrap();
    let err = endpoint.send("late").await.unwrap_err();
    assert!(matches!(err, Error::Send(_)));
}

#[tokio::test]
async fn test_unsolicited_frame_before_stimulus_is_dropped() {
    init_tracing();
    let server = TestServer::spawn().await;
    let config = Config::new(server.uri("/push"));
    let endpoint = Endpoint::open(&config.uri, &config).await.unwrap();
    let (actor, _task) = ConnectionActor::start(endpoint, &config);
    let mut probe = TestProbe::new(8);

    // Let the greeting arrive while no sender is recorded.
    tokio::time::sleep(Duration::from_millis(100)).await;
    actor.tell("Hello Server", probe.address()).await.unwrap();

    probe
        .expect_message_eq(Duration::from_secs(2), "Hello Server")
        .await
        .unwrap();
    probe
        .expect_no_message(Duration::from_millis(300))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_stop_closes_session() {
    init_tracing();
    let server = TestServer::spawn().await;
    let config = Config::new(server.uri("/echo"));
    let endpoint = Endpoint::open(&config.uri, &config).await.unwrap();
    let (actor, _task) = ConnectionActor::start(endpoint, &config);
    let mut probe = TestProbe::new(8);

    actor.tell("first", probe.address()).await.unwrap();
    probe
        .expect_message_eq(Duration::from_secs(2), "first")
        .await
        .unwrap();

    actor.stop().await;
    actor.stopped().await;
    assert!(!actor.state().is_running());
    server.shutdown();
}
