//! End-to-end round trips over a real TCP socket pair.

use std::time::Duration;

use framesock::{MessageSocket, SocketConfig, SocketEvent, TcpTransport, TransportEvent};
use serde_json::{Value, json};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::mpsc,
};

async fn tcp_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind should succeed");
    let addr = listener.local_addr().expect("local addr");
    let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
    let client = client.expect("connect should succeed");
    let (server, _) = accepted.expect("accept should succeed");
    (client, server)
}

/// Pump transport events into `socket` until `predicate` is satisfied by the
/// accumulated socket events.
async fn pump_until(
    socket: &mut MessageSocket,
    transport_rx: &mut mpsc::UnboundedReceiver<TransportEvent>,
    events_rx: &mut mpsc::UnboundedReceiver<SocketEvent>,
    collected: &mut Vec<SocketEvent>,
    predicate: impl Fn(&[SocketEvent]) -> bool,
) {
    while !predicate(collected) {
        let event = tokio::time::timeout(Duration::from_secs(5), transport_rx.recv())
            .await
            .expect("timed out waiting for transport data")
            .expect("transport event stream ended");
        match event {
            TransportEvent::Data(chunk) => socket.handle_data(&chunk),
            TransportEvent::Error(error) => socket.handle_error(error),
            TransportEvent::Closed => {
                socket.handle_close();
                break;
            }
        }
        while let Ok(event) = events_rx.try_recv() {
            collected.push(event);
        }
    }
}

fn messages_in(events: &[SocketEvent]) -> Vec<Value> {
    events
        .iter()
        .filter_map(|event| match event {
            SocketEvent::MessageIn { message } => Some(message.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn json_messages_round_trip_over_tcp() {
    let (mut client, server) = tcp_pair().await;
    let (transport, mut transport_rx) = TcpTransport::spawn(server).expect("spawn transport");
    let (mut socket, mut events_rx) = MessageSocket::json(transport, SocketConfig::default());

    client
        .write_all(b"{\"a\":1}\n{\"a\":2}\n")
        .await
        .expect("client write should succeed");

    let mut collected = Vec::new();
    pump_until(
        &mut socket,
        &mut transport_rx,
        &mut events_rx,
        &mut collected,
        |events| messages_in(events).len() >= 2,
    )
    .await;
    assert_eq!(
        messages_in(&collected),
        vec![json!({"a": 1}), json!({"a": 2})]
    );

    // Reply through the framed socket; the raw client reads one line back.
    socket
        .send(&json!({"ok": true}))
        .expect("send should succeed");
    let mut reader = BufReader::new(client);
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .await
        .expect("client read should succeed");
    let reply: Value = serde_json::from_str(line.trim()).expect("reply should parse");
    assert_eq!(reply, json!({"ok": true}));
}

#[tokio::test]
async fn binary_messages_round_trip_over_tcp() {
    let (client, server) = tcp_pair().await;
    let (server_transport, mut server_rx) = TcpTransport::spawn(server).expect("spawn transport");
    let (mut server_socket, mut server_events) =
        MessageSocket::binary(server_transport, SocketConfig::default());

    let (client_transport, _client_rx) = TcpTransport::spawn(client).expect("spawn transport");
    let (client_socket, _client_events) =
        MessageSocket::binary(client_transport, SocketConfig::default());

    client_socket
        .send(&json!({"id": 1, "params": [1, 2, 3]}))
        .expect("send should succeed");

    let mut collected = Vec::new();
    pump_until(
        &mut server_socket,
        &mut server_rx,
        &mut server_events,
        &mut collected,
        |events| !messages_in(events).is_empty(),
    )
    .await;
    assert_eq!(
        messages_in(&collected),
        vec![json!({"id": 1, "params": [1, 2, 3]})]
    );
}

#[tokio::test]
async fn run_pumps_until_disconnect() {
    let (mut client, server) = tcp_pair().await;
    let (transport, transport_rx) = TcpTransport::spawn(server).expect("spawn transport");
    let (mut socket, mut events_rx) = MessageSocket::json(transport, SocketConfig::default());

    let pump = tokio::spawn(async move {
        socket.run(transport_rx).await;
    });

    client
        .write_all(b"{\"n\":7}\n")
        .await
        .expect("client write should succeed");
    client.shutdown().await.expect("shutdown should succeed");

    pump.await.expect("pump task should finish");

    let mut saw_message = false;
    let mut saw_disconnect = false;
    while let Ok(event) = events_rx.try_recv() {
        match event {
            SocketEvent::MessageIn { message } => {
                assert_eq!(message, json!({"n": 7}));
                saw_message = true;
            }
            SocketEvent::Disconnect => saw_disconnect = true,
            _ => {}
        }
    }
    assert!(saw_message);
    assert!(saw_disconnect);
}

#[tokio::test]
async fn destroy_closes_the_peer_connection() {
    let (client, server) = tcp_pair().await;
    let (transport, _transport_rx) = TcpTransport::spawn(server).expect("spawn transport");
    let (socket, _events_rx) = MessageSocket::json(transport, SocketConfig::default());

    socket.destroy();

    let mut reader = BufReader::new(client);
    let mut line = String::new();
    let read = tokio::time::timeout(Duration::from_secs(5), reader.read_line(&mut line))
        .await
        .expect("timed out waiting for close")
        .expect("read should succeed");
    assert_eq!(read, 0);
}
