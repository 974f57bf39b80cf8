//! Transport collaborator trait and the TCP adapter.
//!
//! The framing layer does not manage connection setup. It consumes an
//! already-established transport through the [`Transport`] trait and expects
//! the owner to feed it the transport's close/error/data notifications.
//! [`TcpTransport`] adapts an established [`tokio::net::TcpStream`] into
//! that shape: a read task surfaces inbound bytes as [`TransportEvent`]s and
//! a write task drains a channel into the socket, so `write` stays
//! synchronous at the call site.

use std::{io, net::SocketAddr, sync::Arc};

use bytes::{Bytes, BytesMut};
use log::info;
use socket2::SockRef;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Bytes reserved ahead of each read.
const READ_CHUNK_BYTES: usize = 8 * 1024;

/// An established byte-stream connection consumed by the framing layer.
///
/// `write` is synchronous and infallible at the call site; physical write
/// failures surface asynchronously through the transport's event stream.
pub trait Transport: Send + Sync {
    /// Queue `data` for transmission.
    fn write(&self, data: Bytes);

    /// Set `SO_KEEPALIVE` on the underlying connection.
    fn set_keep_alive(&self, enabled: bool);

    /// Set `TCP_NODELAY` on the underlying connection.
    fn set_no_delay(&self, enabled: bool);

    /// Address of the connected peer, when known.
    fn remote_addr(&self) -> Option<SocketAddr>;

    /// Local address of the connection, when known.
    fn local_addr(&self) -> Option<SocketAddr>;

    /// Tear the connection down. Pending queued writes may be dropped.
    fn shutdown(&self);
}

/// Notification from a transport's I/O tasks.
#[derive(Debug)]
pub enum TransportEvent {
    /// A chunk of bytes arrived.
    Data(Bytes),
    /// The peer closed the connection, or it was shut down locally.
    Closed,
    /// An I/O failure occurred.
    Error(io::Error),
}

/// [`Transport`] implementation over an established TCP stream.
pub struct TcpTransport {
    write_tx: mpsc::UnboundedSender<Bytes>,
    /// Duplicated std handle kept solely for socket-option updates.
    options: std::net::TcpStream,
    remote: Option<SocketAddr>,
    local: Option<SocketAddr>,
    cancel: CancellationToken,
}

impl TcpTransport {
    /// Adapt `stream` into a transport plus its event stream.
    ///
    /// Spawns one read task and one write task; both stop when the peer
    /// closes, an I/O error occurs, or [`Transport::shutdown`] is called.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream's underlying handle cannot be
    /// duplicated for socket-option access.
    pub fn spawn(
        stream: TcpStream,
    ) -> io::Result<(Arc<Self>, mpsc::UnboundedReceiver<TransportEvent>)> {
        let remote = stream.peer_addr().ok();
        let local = stream.local_addr().ok();

        let std_stream = stream.into_std()?;
        let options = std_stream.try_clone()?;
        let stream = TcpStream::from_std(std_stream)?;
        let (read_half, write_half) = stream.into_split();

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        tokio::spawn(read_loop(read_half, event_tx.clone(), cancel.clone()));
        tokio::spawn(write_loop(write_half, write_rx, event_tx, cancel.clone()));

        Ok((
            Arc::new(Self {
                write_tx,
                options,
                remote,
                local,
                cancel,
            }),
            event_rx,
        ))
    }
}

impl Transport for TcpTransport {
    fn write(&self, data: Bytes) {
        // The write task may already be gone after shutdown; late writes
        // are dropped, mirroring a closed socket.
        let _ = self.write_tx.send(data);
    }

    fn set_keep_alive(&self, enabled: bool) {
        if let Err(error) = SockRef::from(&self.options).set_keepalive(enabled) {
            warn!(%error, enabled, "failed to set SO_KEEPALIVE");
        }
    }

    fn set_no_delay(&self, enabled: bool) {
        if let Err(error) = self.options.set_nodelay(enabled) {
            warn!(%error, enabled, "failed to set TCP_NODELAY");
        }
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.local
    }

    fn shutdown(&self) {
        self.cancel.cancel();
    }
}

async fn read_loop(
    mut read_half: OwnedReadHalf,
    events: mpsc::UnboundedSender<TransportEvent>,
    cancel: CancellationToken,
) {
    let mut buf = BytesMut::with_capacity(READ_CHUNK_BYTES);
    loop {
        buf.reserve(READ_CHUNK_BYTES);
        tokio::select! {
            () = cancel.cancelled() => break,
            result = read_half.read_buf(&mut buf) => match result {
                Ok(0) => {
                    let _ = events.send(TransportEvent::Closed);
                    break;
                }
                Ok(_) => {
                    let _ = events.send(TransportEvent::Data(buf.split().freeze()));
                }
                Err(error) => {
                    let _ = events.send(TransportEvent::Error(error));
                    let _ = events.send(TransportEvent::Closed);
                    break;
                }
            }
        }
    }
    info!("transport read loop finished");
}

async fn write_loop(
    mut write_half: OwnedWriteHalf,
    mut queue: mpsc::UnboundedReceiver<Bytes>,
    events: mpsc::UnboundedSender<TransportEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            item = queue.recv() => match item {
                Some(data) => {
                    if let Err(error) = write_half.write_all(&data).await {
                        let _ = events.send(TransportEvent::Error(error));
                        break;
                    }
                }
                None => break,
            }
        }
    }
}
