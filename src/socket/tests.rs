//! Unit tests for the connection wrapper.

use std::{
    io,
    net::SocketAddr,
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use serde_json::json;
use tokio::sync::mpsc;

use super::*;
use crate::codec::BinaryCodec;

#[derive(Default)]
struct MockTransport {
    writes: Mutex<Vec<Bytes>>,
    keep_alive: Mutex<Option<bool>>,
    no_delay: Mutex<Option<bool>>,
    shut_down: AtomicBool,
}

impl MockTransport {
    fn writes(&self) -> Vec<Bytes> {
        self.writes.lock().expect("lock poisoned").clone()
    }
}

impl Transport for MockTransport {
    fn write(&self, data: Bytes) {
        self.writes.lock().expect("lock poisoned").push(data);
    }

    fn set_keep_alive(&self, enabled: bool) {
        *self.keep_alive.lock().expect("lock poisoned") = Some(enabled);
    }

    fn set_no_delay(&self, enabled: bool) {
        *self.no_delay.lock().expect("lock poisoned") = Some(enabled);
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        "192.0.2.1:4000".parse().ok()
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        "127.0.0.1:3333".parse().ok()
    }

    fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<SocketEvent>) -> Vec<SocketEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[test]
fn construction_applies_configured_socket_options() {
    let transport = Arc::new(MockTransport::default());
    let config = SocketConfig::builder()
        .keep_alive(true)
        .no_delay(true)
        .build()
        .expect("config should build");
    let (_socket, _rx) = MessageSocket::json(transport.clone(), config);

    assert_eq!(*transport.keep_alive.lock().expect("lock poisoned"), Some(true));
    assert_eq!(*transport.no_delay.lock().expect("lock poisoned"), Some(true));
}

#[test]
fn construction_leaves_unset_options_alone() {
    let transport = Arc::new(MockTransport::default());
    let (_socket, _rx) = MessageSocket::json(transport.clone(), SocketConfig::default());

    assert_eq!(*transport.keep_alive.lock().expect("lock poisoned"), None);
    assert_eq!(*transport.no_delay.lock().expect("lock poisoned"), None);
}

#[test]
fn runtime_setters_reach_the_transport() {
    let transport = Arc::new(MockTransport::default());
    let (socket, _rx) = MessageSocket::json(transport.clone(), SocketConfig::default());

    socket.set_keep_alive(true);
    socket.set_no_delay(false);
    assert_eq!(*transport.keep_alive.lock().expect("lock poisoned"), Some(true));
    assert_eq!(*transport.no_delay.lock().expect("lock poisoned"), Some(false));
}

#[test]
fn addresses_are_cached_from_the_transport() {
    let transport = Arc::new(MockTransport::default());
    let (socket, _rx) = MessageSocket::json(transport, SocketConfig::default());

    assert_eq!(socket.remote_addr(), "192.0.2.1:4000".parse().ok());
    assert_eq!(socket.local_port(), Some(3333));
}

#[test]
fn send_emits_message_out_then_writes() {
    let transport = Arc::new(MockTransport::default());
    let (socket, mut rx) = MessageSocket::json(transport.clone(), SocketConfig::default());

    let message = json!({"method": "ping"});
    let data = socket.send(&message).expect("send should succeed");
    assert_eq!(data.as_ref(), b"{\"method\":\"ping\"}\n");

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        SocketEvent::MessageOut { message: m, data: d }
            if *m == message && *d == data
    ));
    assert_eq!(transport.writes(), vec![data]);
}

#[test]
fn send_rejects_non_object_messages() {
    let transport = Arc::new(MockTransport::default());
    let (socket, mut rx) = MessageSocket::json(transport.clone(), SocketConfig::default());

    let error = socket.send(&json!("bare")).unwrap_err();
    assert!(matches!(error, SocketError::NotAnObject));
    assert!(drain(&mut rx).is_empty());
    assert!(transport.writes().is_empty());
}

#[test]
fn binary_send_produces_a_decodable_document() {
    let transport = Arc::new(MockTransport::default());
    let (socket, _rx) = MessageSocket::binary(transport, SocketConfig::default());

    let message = json!({"id": 9, "ok": true});
    let data = socket.send(&message).expect("send should succeed");

    let decoded = MsgpackCodec
        .deserialize_bulk(&data)
        .expect("document should decode");
    assert_eq!(decoded.messages, vec![message]);
    assert_eq!(decoded.bytes_consumed, data.len());
}

#[test]
fn inbound_chunks_round_trip_to_events() {
    let transport = Arc::new(MockTransport::default());
    let (mut socket, mut rx) = MessageSocket::json(transport, SocketConfig::default());

    socket.handle_data(b"{\"a\":1}\n{\"b\":");
    let events = drain(&mut rx);
    assert!(matches!(&events[0], SocketEvent::Messages { messages } if messages.len() == 1));
    assert!(
        matches!(&events[1], SocketEvent::MessageIn { message } if *message == json!({"a": 1}))
    );
    assert_eq!(socket.buffered_len(), "{\"b\":".len());
}

#[test]
fn close_emits_disconnect() {
    let transport = Arc::new(MockTransport::default());
    let (socket, mut rx) = MessageSocket::json(transport, SocketConfig::default());

    socket.handle_close();
    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], SocketEvent::Disconnect));
}

#[test]
fn peer_reset_is_suppressed_but_other_errors_surface() {
    let transport = Arc::new(MockTransport::default());
    let (socket, mut rx) = MessageSocket::json(transport, SocketConfig::default());

    socket.handle_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
    assert!(drain(&mut rx).is_empty());

    socket.handle_error(io::Error::new(io::ErrorKind::BrokenPipe, "pipe"));
    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        SocketEvent::Error { error } if error.kind() == io::ErrorKind::BrokenPipe
    ));
}

#[test]
fn destroy_shuts_the_transport_down() {
    let transport = Arc::new(MockTransport::default());
    let (socket, _rx) = MessageSocket::json(transport.clone(), SocketConfig::default());

    socket.destroy();
    assert!(transport.shut_down.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn destroy_prevents_queued_writes_from_flushing() {
    let transport = Arc::new(MockTransport::default());
    let config = SocketConfig::builder()
        .delayed_writes(std::time::Duration::from_millis(10))
        .build()
        .expect("config should build");
    let (socket, _rx) = MessageSocket::json(transport.clone(), config);

    socket
        .send(&json!({"n": 1}))
        .expect("send should succeed");
    socket
        .send(&json!({"n": 2}))
        .expect("send should succeed");
    socket.destroy();

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(transport.writes().len(), 1);
}
