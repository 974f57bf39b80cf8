//! The connection wrapper tying transport, framing, pacing, and rate
//! limiting together.
//!
//! A [`MessageSocket`] exclusively owns one transport handle, one framing
//! decoder, one paced writer, and one rate guard; none of them outlive the
//! connection or are shared across connections. Everything observable is
//! reported through the [`SocketEvent`] channel returned at construction,
//! in strict per-connection order.

use std::{io, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::trace;

use crate::{
    codec::MsgpackCodec,
    config::SocketConfig,
    error::SocketError,
    event::{EventSender, SocketEvent},
    framing::{DecodeContext, DelimitedTextDecoder, FrameDecoder, LengthPrefixedDecoder},
    rate::RateState,
    transport::{Transport, TransportEvent},
    writer::SocketWriter,
};

/// A framed connection over one transport.
pub struct MessageSocket {
    transport: Arc<dyn Transport>,
    decoder: Box<dyn FrameDecoder>,
    writer: SocketWriter,
    rate: RateState,
    events: EventSender,
    config: SocketConfig,
    remote_addr: Option<SocketAddr>,
    local_addr: Option<SocketAddr>,
}

impl MessageSocket {
    /// Wrap `transport` with the given framing strategy.
    ///
    /// Applies the configured keep-alive/no-delay options to the transport
    /// and returns the socket together with the receiving end of its event
    /// channel.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        decoder: Box<dyn FrameDecoder>,
        config: SocketConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SocketEvent>) {
        if let Some(keep_alive) = config.keep_alive {
            transport.set_keep_alive(keep_alive);
        }
        if let Some(no_delay) = config.no_delay {
            transport.set_no_delay(no_delay);
        }

        let remote_addr = transport.remote_addr();
        let local_addr = transport.local_addr();
        let writer = SocketWriter::new(
            Arc::clone(&transport),
            config.delay_writes,
            config.write_delay,
        );
        let rate = RateState::new(config.rate_limit, config.rate_limit_window);
        let (events, rx) = EventSender::channel();

        log::info!("connection opened: peer={remote_addr:?}, local={local_addr:?}");
        (
            Self {
                transport,
                decoder,
                writer,
                rate,
                events,
                config,
                remote_addr,
                local_addr,
            },
            rx,
        )
    }

    /// Wrap `transport` with length-prefixed MessagePack framing.
    #[must_use]
    pub fn binary(
        transport: Arc<dyn Transport>,
        config: SocketConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SocketEvent>) {
        let decoder = Box::new(LengthPrefixedDecoder::new(Box::new(MsgpackCodec), &config));
        Self::new(transport, decoder, config)
    }

    /// Wrap `transport` with newline-delimited JSON framing.
    #[must_use]
    pub fn json(
        transport: Arc<dyn Transport>,
        config: SocketConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SocketEvent>) {
        let decoder = Box::new(DelimitedTextDecoder::new(&config));
        Self::new(transport, decoder, config)
    }

    /// Address of the connected peer, when known.
    #[must_use]
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Local address of the connection, when known.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Local port of the connection, when known.
    #[must_use]
    pub fn local_port(&self) -> Option<u16> {
        self.local_addr.map(|addr| addr.port())
    }

    /// The connection's configuration.
    #[must_use]
    pub fn config(&self) -> &SocketConfig {
        &self.config
    }

    /// The paced writer owned by this connection.
    #[must_use]
    pub fn writer(&self) -> &SocketWriter {
        &self.writer
    }

    /// Mutable access to the paced writer, for runtime pacing changes.
    pub fn writer_mut(&mut self) -> &mut SocketWriter {
        &mut self.writer
    }

    /// Bytes buffered by the decoder awaiting a complete message.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.decoder.buffered_len()
    }

    /// Set `SO_KEEPALIVE` on the transport.
    pub fn set_keep_alive(&self, enabled: bool) {
        self.transport.set_keep_alive(enabled);
    }

    /// Set `TCP_NODELAY` on the transport.
    pub fn set_no_delay(&self, enabled: bool) {
        self.transport.set_no_delay(enabled);
    }

    /// Write already-serialized bytes, reporting the original message for
    /// observability. Always succeeds; physical write failures arrive later
    /// as transport error events.
    pub fn write(&self, data: Bytes, message: Value) {
        self.events.emit(SocketEvent::MessageOut {
            message,
            data: data.clone(),
        });
        self.writer.write(data);
    }

    /// Serialize `message` with the active framing and write it.
    ///
    /// Returns the serialized bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SocketError::NotAnObject`] unless `message` is a JSON
    /// object, or a codec error if serialization fails.
    pub fn send(&self, message: &Value) -> Result<Bytes, SocketError> {
        if !message.is_object() {
            return Err(SocketError::NotAnObject);
        }
        let data = self.decoder.encode(message)?;
        self.write(data.clone(), message.clone());
        Ok(data)
    }

    /// Release the writer's pending flush and shut the transport down.
    ///
    /// Call at most once.
    pub fn destroy(&self) {
        self.writer.destroy();
        self.transport.shutdown();
        log::info!("connection destroyed: peer={:?}", self.remote_addr);
    }

    /// Decode entry point: feed one inbound chunk through the framing
    /// strategy. Never fails; all outcomes are events.
    pub fn handle_data(&mut self, chunk: &[u8]) {
        let mut ctx = DecodeContext {
            events: &self.events,
            rate: &mut self.rate,
            enforce_objects: self.config.enforce_objects,
        };
        self.decoder.append(chunk, &mut ctx);
    }

    /// The transport reported closure.
    pub fn handle_close(&self) {
        self.events.emit(SocketEvent::Disconnect);
    }

    /// The transport reported a failure. A benign peer reset is swallowed;
    /// everything else is surfaced.
    pub fn handle_error(&self, error: io::Error) {
        if error.kind() == io::ErrorKind::ConnectionReset {
            trace!("peer reset suppressed");
            return;
        }
        self.events.emit(SocketEvent::Error { error });
    }

    /// Pump a transport's event stream into this socket until it closes.
    pub async fn run(&mut self, mut transport_rx: mpsc::UnboundedReceiver<TransportEvent>) {
        while let Some(event) = transport_rx.recv().await {
            match event {
                TransportEvent::Data(chunk) => self.handle_data(&chunk),
                TransportEvent::Error(error) => self.handle_error(error),
                TransportEvent::Closed => {
                    self.handle_close();
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests;
