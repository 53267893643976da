//! End-to-end tests over loopback UDP.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use contador_core::protocol::option::{OBSERVE_DEREGISTER, OBSERVE_REGISTER};
use contador_core::protocol::{decode_message, encode_message, Code, Message, MessageType};
use contador_server::config::ServerConfig;
use contador_server::{CoapServer, ServerHandle};

const WAIT: Duration = Duration::from_secs(3);

fn test_config(interval_ms: u64) -> ServerConfig {
    let mut cfg = ServerConfig::default();
    cfg.server.listen = "127.0.0.1:0".into();
    cfg.counter.notify_interval_ms = interval_ms;
    cfg
}

async fn start(interval_ms: u64) -> ServerHandle {
    let server = CoapServer::bind(&test_config(interval_ms)).await.unwrap();
    server.spawn()
}

async fn client() -> UdpSocket {
    UdpSocket::bind("127.0.0.1:0").await.unwrap()
}

async fn exchange(sock: &UdpSocket, server: &ServerHandle, msg: &Message) -> Message {
    sock.send_to(&encode_message(msg).unwrap(), server.local_addr())
        .await
        .unwrap();
    recv(sock).await
}

async fn recv(sock: &UdpSocket) -> Message {
    let mut buf = [0u8; 1500];
    let (len, _) = timeout(WAIT, sock.recv_from(&mut buf))
        .await
        .expect("timed out waiting for datagram")
        .unwrap();
    decode_message(Bytes::copy_from_slice(&buf[..len])).unwrap()
}

fn get(mtype: MessageType, mid: u16, token: &'static [u8], path: &str) -> Message {
    let mut m = Message::new(mtype, Code::GET, mid).with_token(Bytes::from_static(token));
    m.set_uri_path(path);
    m
}

#[tokio::test]
async fn get_returns_counter_after_first_cycle() {
    // long interval: only the immediate first cycle runs
    let server = start(60_000).await;
    let sock = client().await;

    let req = get(MessageType::Confirmable, 0x2001, b"t1", "/contador");
    let resp = exchange(&sock, &server, &req).await;
    assert_eq!(resp.mtype, MessageType::Acknowledgement);
    assert_eq!(resp.message_id, 0x2001);
    assert_eq!(&resp.token[..], b"t1");
    assert_eq!(resp.code, Code::CONTENT);
    assert_eq!(&resp.payload[..], b"1");
    assert_eq!(server.counter_value(), 1);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn unknown_path_method_and_ping() {
    let server = start(60_000).await;
    let sock = client().await;

    let resp = exchange(&sock, &server, &get(MessageType::Confirmable, 1, b"", "/nada")).await;
    assert_eq!(resp.code, Code::NOT_FOUND);

    let mut put = get(MessageType::NonConfirmable, 2, b"p", "/contador");
    put.code = Code::PUT;
    let resp = exchange(&sock, &server, &put).await;
    assert_eq!(resp.mtype, MessageType::NonConfirmable);
    assert_eq!(resp.code, Code::METHOD_NOT_ALLOWED);

    let resp = exchange(&sock, &server, &Message::empty(MessageType::Confirmable, 0x0bad)).await;
    assert_eq!(resp.mtype, MessageType::Reset);
    assert_eq!(resp.message_id, 0x0bad);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn malformed_con_is_reset() {
    let server = start(60_000).await;
    let sock = client().await;

    sock.send_to(&[0x40, 0x01, 0x43, 0x21, 0xf0], server.local_addr())
        .await
        .unwrap();
    let resp = recv(&sock).await;
    assert_eq!(resp.mtype, MessageType::Reset);
    assert_eq!(resp.message_id, 0x4321);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn observer_receives_notifications_until_deregistered() {
    let server = start(100).await;
    let sock = client().await;

    let mut reg = get(MessageType::Confirmable, 0x3001, b"obs", "/contador");
    reg.set_observe(OBSERVE_REGISTER);
    let resp = exchange(&sock, &server, &reg).await;
    assert_eq!(resp.code, Code::CONTENT);
    assert!(resp.observe().unwrap().is_some());
    assert_eq!(server.observer_count(), 1);

    let mut last_seq = None;
    for _ in 0..2 {
        let note = recv(&sock).await;
        assert_eq!(note.mtype, MessageType::NonConfirmable);
        assert_eq!(note.code, Code::CONTENT);
        assert_eq!(&note.token[..], b"obs");
        // fixed text, not the counter value
        assert_eq!(&note.payload[..], b"aumento identificado");
        let seq = note.observe().unwrap().unwrap();
        if let Some(prev) = last_seq {
            assert!(seq > prev);
        }
        last_seq = Some(seq);
    }

    let mut dereg = get(MessageType::Confirmable, 0x3002, b"obs", "/contador");
    dereg.set_observe(OBSERVE_DEREGISTER);
    sock.send_to(&encode_message(&dereg).unwrap(), server.local_addr())
        .await
        .unwrap();

    // skip notifications already in flight until the deregistration response
    let resp = loop {
        let m = recv(&sock).await;
        if m.mtype == MessageType::Acknowledgement {
            break m;
        }
    };
    assert_eq!(resp.message_id, 0x3002);
    assert_eq!(resp.observe().unwrap(), None);
    assert_eq!(server.observer_count(), 0);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn reset_cancels_observation() {
    // wide interval: the RST must match the latest notification id
    let server = start(400).await;
    let sock = client().await;

    let mut reg = get(MessageType::NonConfirmable, 0x4001, b"r", "/contador");
    reg.set_observe(OBSERVE_REGISTER);
    let resp = exchange(&sock, &server, &reg).await;
    assert_eq!(resp.code, Code::CONTENT);

    let note = loop {
        let m = recv(&sock).await;
        if m.payload.as_ref() == b"aumento identificado" {
            break m;
        }
    };
    sock.send_to(
        &encode_message(&Message::reset(note.message_id)).unwrap(),
        server.local_addr(),
    )
    .await
    .unwrap();

    timeout(WAIT, async {
        while server.observer_count() != 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("observer was not removed after reset");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn counter_advances_once_per_interval() {
    let server = start(200).await;
    let sock = client().await;

    // cycles at t=0, 200, 400; the next is due at 600
    tokio::time::sleep(Duration::from_millis(500)).await;
    let req = get(MessageType::Confirmable, 9, b"", "/contador");
    let resp = exchange(&sock, &server, &req).await;
    let value: i32 = std::str::from_utf8(&resp.payload).unwrap().parse().unwrap();
    assert_eq!(value, 3);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn vanished_observer_is_replaced_when_full() {
    let mut cfg = test_config(60_000);
    cfg.observe.max_observers = 1;
    let server = CoapServer::bind(&cfg).await.unwrap().spawn();

    // first client registers, then goes away without sending RST
    let gone = client().await;
    let mut reg = get(MessageType::Confirmable, 0x5001, b"a", "/contador");
    reg.set_observe(OBSERVE_REGISTER);
    let resp = exchange(&gone, &server, &reg).await;
    assert!(resp.observe().unwrap().is_some());
    drop(gone);
    assert_eq!(server.observer_count(), 1);

    let sock = client().await;
    let mut reg = get(MessageType::Confirmable, 0x5002, b"b", "/contador");
    reg.set_observe(OBSERVE_REGISTER);
    let resp = exchange(&sock, &server, &reg).await;
    assert_eq!(resp.code, Code::CONTENT);
    assert!(resp.observe().unwrap().is_some());
    assert_eq!(server.observer_count(), 1);

    server.shutdown().await.unwrap();
}
