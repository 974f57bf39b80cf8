//! Paced output queue between the socket and its transport.
//!
//! In immediate mode every write passes straight through. In delayed mode
//! writes are queued FIFO; the first write in an idle queue still reaches
//! the transport synchronously, and a flush task spaces the rest out by the
//! configured delay. When the queue empties the flush cycle ends, so an
//! idle connection holds no timer.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::transport::Transport;

#[derive(Debug)]
struct WriterState {
    queue: VecDeque<Bytes>,
    flush_scheduled: bool,
    delay: Duration,
}

/// Dedicated writer pacing output to one transport.
pub struct SocketWriter {
    transport: Arc<dyn Transport>,
    delay_writes: bool,
    state: Arc<Mutex<WriterState>>,
    cancel: CancellationToken,
}

impl SocketWriter {
    /// Create a writer for `transport`.
    ///
    /// `delay_writes` with a non-zero `delay` enables paced mode; any other
    /// combination writes through immediately.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, delay_writes: bool, delay: Duration) -> Self {
        Self {
            transport,
            delay_writes,
            state: Arc::new(Mutex::new(WriterState {
                queue: VecDeque::new(),
                flush_scheduled: false,
                delay,
            })),
            cancel: CancellationToken::new(),
        }
    }

    /// Whether paced mode is enabled.
    #[must_use]
    pub fn delay_writes(&self) -> bool {
        self.delay_writes
    }

    /// Enable or disable paced mode for subsequent writes.
    pub fn set_delay_writes(&mut self, delay_writes: bool) {
        self.delay_writes = delay_writes;
    }

    /// The delay applied between paced writes.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.state.lock().expect("lock poisoned").delay
    }

    /// Replace the inter-write delay. An active flush cycle picks the new
    /// value up on its next iteration.
    pub fn set_delay(&mut self, delay: Duration) {
        self.state.lock().expect("lock poisoned").delay = delay;
    }

    /// Number of writes queued but not yet flushed.
    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.state.lock().expect("lock poisoned").queue.len()
    }

    /// Write `data` to the transport, immediately or paced.
    pub fn write(&self, data: Bytes) {
        let delay = self.state.lock().expect("lock poisoned").delay;
        if !self.delay_writes || delay.is_zero() {
            self.transport.write(data);
            return;
        }

        let first = {
            let mut state = self.state.lock().expect("lock poisoned");
            state.queue.push_back(data);
            if state.flush_scheduled {
                None
            } else {
                state.flush_scheduled = true;
                state.queue.pop_front()
            }
        };
        // The write opening an idle queue is never delayed.
        if let Some(first) = first {
            self.transport.write(first);
            self.spawn_flush_cycle();
        }
    }

    /// Cancel any pending flush. Queued-but-unflushed bytes are dropped and
    /// no transport write occurs after this call returns.
    pub fn destroy(&self) {
        self.cancel.cancel();
    }

    fn spawn_flush_cycle(&self) {
        let state = Arc::clone(&self.state);
        let transport = Arc::clone(&self.transport);
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            loop {
                let delay = state.lock().expect("lock poisoned").delay;
                tokio::select! {
                    () = cancel.cancelled() => return,
                    () = tokio::time::sleep(delay) => {}
                }
                let next = {
                    let mut state = state.lock().expect("lock poisoned");
                    match state.queue.pop_front() {
                        Some(data) => Some(data),
                        None => {
                            state.flush_scheduled = false;
                            None
                        }
                    }
                };
                match next {
                    Some(data) => {
                        trace!(bytes = data.len(), "paced write flushed");
                        transport.write(data);
                    }
                    None => return,
                }
            }
        });
    }
}
