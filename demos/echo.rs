//! Newline-delimited JSON echo server.
//!
//! Accepts TCP connections, echoes every valid inbound message back to the
//! sender, and drops connections that flood or exceed the message rate.
//!
//! ```text
//! cargo run --example echo -- 127.0.0.1:4000
//! printf '{"hello":"world"}\n' | nc 127.0.0.1 4000
//! ```

use std::io;

use framesock::{MessageSocket, SocketConfig, SocketEvent, TcpTransport, TransportEvent};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:4000".to_owned());
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "echo server listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        tokio::spawn(async move {
            if let Err(error) = serve(stream).await {
                warn!(%error, %peer, "connection failed");
            }
        });
    }
}

async fn serve(stream: TcpStream) -> io::Result<()> {
    let (transport, mut transport_rx) = TcpTransport::spawn(stream)?;
    let config = SocketConfig::builder()
        .no_delay(true)
        .rate_limit(100)
        .build()
        .expect("static config is valid");
    let (mut socket, mut events) = MessageSocket::json(transport, config);

    let mut transport_done = false;
    loop {
        tokio::select! {
            transport_event = transport_rx.recv(), if !transport_done => match transport_event {
                Some(TransportEvent::Data(chunk)) => socket.handle_data(&chunk),
                Some(TransportEvent::Error(error)) => socket.handle_error(error),
                Some(TransportEvent::Closed) | None => {
                    transport_done = true;
                    socket.handle_close();
                }
            },
            socket_event = events.recv() => match socket_event {
                Some(SocketEvent::MessageIn { message }) => {
                    let _ = socket.send(&message);
                }
                Some(SocketEvent::MalformedMessage { error, .. }) => {
                    warn!(%error, "ignoring malformed message");
                }
                Some(SocketEvent::Flood | SocketEvent::RateLimitExceeded) => {
                    warn!("dropping abusive connection");
                    socket.destroy();
                    break;
                }
                Some(SocketEvent::Disconnect) | None => break,
                Some(_) => {}
            }
        }
    }
    Ok(())
}
