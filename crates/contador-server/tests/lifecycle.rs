//! Startup failure and shutdown/teardown.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::watch;

use contador_core::protocol::option::OBSERVE_REGISTER;
use contador_core::protocol::{encode_message, Code, Message, MessageType};
use contador_server::config::ServerConfig;
use contador_server::context::ServerState;
use contador_server::{run_server_task, CoapServer, ServerError};

#[tokio::test]
async fn endpoint_failure_terminates_before_loop() {
    let taken = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let mut cfg = ServerConfig::default();
    cfg.server.listen = taken.local_addr().unwrap().to_string();

    let (_stop_tx, stop_rx) = watch::channel(false);
    let err = run_server_task(cfg, stop_rx).await.expect_err("bind must fail");
    assert!(matches!(err, ServerError::Endpoint(_)), "err={err}");
}

#[tokio::test]
async fn context_failure_terminates_before_loop() {
    let mut cfg = ServerConfig::default();
    cfg.server.listen = "nowhere".into();

    let (_stop_tx, stop_rx) = watch::channel(false);
    let err = run_server_task(cfg, stop_rx).await.expect_err("resolve must fail");
    assert!(matches!(err, ServerError::Context(_)), "err={err}");
}

#[tokio::test]
async fn shutdown_runs_teardown() {
    let mut cfg = ServerConfig::default();
    cfg.server.listen = "127.0.0.1:0".into();
    cfg.counter.notify_interval_ms = 60_000;

    let server = CoapServer::bind(&cfg).await.unwrap();
    let lifecycle = server.lifecycle();
    let observers = server.observers();
    assert_eq!(lifecycle.get(), ServerState::Bound);

    let handle = server.spawn();
    let addr = handle.local_addr();

    let sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let mut reg = Message::new(MessageType::Confirmable, Code::GET, 5)
        .with_token(Bytes::from_static(b"z"));
    reg.set_uri_path("contador");
    reg.set_observe(OBSERVE_REGISTER);
    sock.send_to(&encode_message(&reg).unwrap(), addr).await.unwrap();
    let mut buf = [0u8; 256];
    tokio::time::timeout(std::time::Duration::from_secs(3), sock.recv_from(&mut buf))
        .await
        .expect("no response")
        .unwrap();

    assert_eq!(handle.state(), ServerState::Running);
    assert_eq!(handle.observer_count(), 1);

    handle.shutdown().await.unwrap();
    assert_eq!(lifecycle.get(), ServerState::Shutdown);
    assert!(observers.is_empty());

    // endpoint released: the port can be bound again
    UdpSocket::bind(addr).await.unwrap();
}
