//! Sliding-window message rate accounting.
//!
//! [`RateWindow`] is a fixed-capacity ring of `(timestamp, count)` samples.
//! Queries walk newest-to-oldest and short-circuit at the first sample
//! outside the window, so the steady-state cost is bounded by the number of
//! samples inside the window, never the ring capacity.
//!
//! Timestamps come from [`tokio::time::Instant`] so tests can drive the
//! clock with a paused runtime.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Clone, Copy, Debug)]
struct RateSample {
    at: Instant,
    count: usize,
}

/// Fixed-capacity ring buffer recording message arrival counts.
#[derive(Debug)]
pub struct RateWindow {
    samples: Vec<RateSample>,
    capacity: usize,
    next: usize,
    size: usize,
}

impl RateWindow {
    /// Create a ring holding at most `capacity` samples.
    ///
    /// To be effective the capacity must exceed the number of samples that
    /// can be recorded within the queried window; the socket sizes it at
    /// twice the configured rate limit.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "rate window capacity must be non-zero");
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
            next: 0,
            size: 0,
        }
    }

    /// Maximum number of samples the ring can hold.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of live samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.size
    }

    /// Whether no samples have been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Record `count` messages arriving now.
    pub fn increment(&mut self, count: usize) {
        self.record_at(Instant::now(), count);
    }

    /// Record `count` messages arriving at `at`, overwriting the oldest
    /// slot once the ring is full.
    ///
    /// Samples are assumed to arrive in non-decreasing timestamp order;
    /// queries rely on that to short-circuit.
    pub fn record_at(&mut self, at: Instant, count: usize) {
        if self.size < self.capacity {
            self.size += 1;
        }
        let sample = RateSample { at, count };
        if self.samples.len() < self.capacity {
            self.samples.push(sample);
        } else {
            self.samples[self.next] = sample;
        }
        self.next = (self.next + 1) % self.capacity;
    }

    /// Total messages recorded at or after `cutoff`.
    ///
    /// Walks newest-to-oldest and stops at the first older sample.
    #[must_use]
    pub fn total_since(&self, cutoff: Instant) -> usize {
        let mut total = 0;
        for i in 0..self.size {
            let index = (self.next + self.capacity - 1 - i) % self.capacity;
            let sample = self.samples[index];
            if sample.at >= cutoff {
                total += sample.count;
            } else {
                break;
            }
        }
        total
    }

    /// Total messages across every live sample.
    #[must_use]
    pub fn total(&self) -> usize {
        self.samples[..self.size.min(self.samples.len())]
            .iter()
            .map(|s| s.count)
            .sum()
    }
}

/// Per-connection rate-limit guard owning a lazily created [`RateWindow`].
#[derive(Debug)]
pub(crate) struct RateState {
    limit: usize,
    window: Duration,
    counter: Option<RateWindow>,
}

impl RateState {
    pub(crate) fn new(limit: Option<usize>, window: Duration) -> Self {
        Self {
            limit: limit.unwrap_or(0),
            window,
            counter: None,
        }
    }

    /// Record a batch of `count` decoded messages and report whether the
    /// configured limit is now exceeded.
    ///
    /// The ring is created (or re-created, discarding history) whenever the
    /// required capacity of `limit * 2` outgrows the current one. Returns
    /// false when no limit is configured or `count` is zero.
    pub(crate) fn record_and_check(&mut self, count: usize) -> bool {
        if self.limit == 0 {
            return false;
        }
        let needed = self.limit * 2;
        if self.counter.as_ref().is_none_or(|c| c.capacity() < needed) {
            self.counter = Some(RateWindow::new(needed));
        }
        let Some(counter) = self.counter.as_mut() else {
            return false;
        };
        counter.increment(count);

        let now = Instant::now();
        let total = match now.checked_sub(self.window) {
            Some(cutoff) => counter.total_since(cutoff),
            // The window predates the clock's origin: everything counts.
            None => counter.total(),
        };
        count > 0 && total > self.limit
    }
}
