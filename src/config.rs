//! Connection configuration and its validating builder.

use std::time::Duration;

use crate::error::ConfigError;

/// Default receive-buffer byte budget, shared by both framing strategies.
pub const DEFAULT_MAX_BUFFER_BYTES: usize = 10_240;

/// Default trailing window over which message rates are summed.
pub const DEFAULT_RATE_WINDOW: Duration = Duration::from_secs(1);

/// Per-connection configuration.
///
/// All knobs are optional; the defaults match a plain pass-through socket
/// with a 10 KiB buffer budget and no rate limiting.
#[derive(Clone, Debug)]
pub struct SocketConfig {
    /// `SO_KEEPALIVE`; `None` leaves the transport default untouched.
    pub keep_alive: Option<bool>,
    /// `TCP_NODELAY`; `None` leaves the transport default untouched.
    pub no_delay: Option<bool>,
    /// Maximum messages allowed within the rate window; `None` disables
    /// rate limiting.
    pub rate_limit: Option<usize>,
    /// Trailing window over which message counts are summed.
    pub rate_limit_window: Duration,
    /// Maximum bytes the receive buffer may hold.
    pub max_buffer_bytes: usize,
    /// Maximum bytes a single message may occupy; `None` falls back to
    /// [`SocketConfig::max_buffer_bytes`].
    pub max_message_bytes: Option<usize>,
    /// Reject decoded messages that are not JSON objects.
    pub enforce_objects: bool,
    /// Space out writes instead of writing through immediately.
    pub delay_writes: bool,
    /// Delay between paced writes when [`SocketConfig::delay_writes`] is on.
    pub write_delay: Duration,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            keep_alive: None,
            no_delay: None,
            rate_limit: None,
            rate_limit_window: DEFAULT_RATE_WINDOW,
            max_buffer_bytes: DEFAULT_MAX_BUFFER_BYTES,
            max_message_bytes: None,
            enforce_objects: false,
            delay_writes: false,
            write_delay: Duration::ZERO,
        }
    }
}

impl SocketConfig {
    /// Start building a configuration.
    #[must_use]
    pub fn builder() -> SocketConfigBuilder {
        SocketConfigBuilder::default()
    }

    /// The effective single-message byte budget.
    #[must_use]
    pub fn effective_max_message_bytes(&self) -> usize {
        self.max_message_bytes.unwrap_or(self.max_buffer_bytes)
    }
}

/// Builder validating the positive-value preconditions of [`SocketConfig`].
#[derive(Clone, Debug, Default)]
pub struct SocketConfigBuilder {
    config: SocketConfig,
}

impl SocketConfigBuilder {
    /// Set `SO_KEEPALIVE` on the transport at construction.
    #[must_use]
    pub fn keep_alive(mut self, enabled: bool) -> Self {
        self.config.keep_alive = Some(enabled);
        self
    }

    /// Set `TCP_NODELAY` on the transport at construction.
    #[must_use]
    pub fn no_delay(mut self, enabled: bool) -> Self {
        self.config.no_delay = Some(enabled);
        self
    }

    /// Limit inbound messages to `limit` per rate window.
    #[must_use]
    pub fn rate_limit(mut self, limit: usize) -> Self {
        self.config.rate_limit = Some(limit);
        self
    }

    /// Replace the default one-second rate window.
    #[must_use]
    pub fn rate_limit_window(mut self, window: Duration) -> Self {
        self.config.rate_limit_window = window;
        self
    }

    /// Replace the receive-buffer byte budget.
    #[must_use]
    pub fn max_buffer_bytes(mut self, bytes: usize) -> Self {
        self.config.max_buffer_bytes = bytes;
        self
    }

    /// Cap single messages below the buffer budget.
    #[must_use]
    pub fn max_message_bytes(mut self, bytes: usize) -> Self {
        self.config.max_message_bytes = Some(bytes);
        self
    }

    /// Reject decoded messages that are not JSON objects.
    #[must_use]
    pub fn enforce_objects(mut self, enforce: bool) -> Self {
        self.config.enforce_objects = enforce;
        self
    }

    /// Pace writes with `delay` between them instead of writing through.
    #[must_use]
    pub fn delayed_writes(mut self, delay: Duration) -> Self {
        self.config.delay_writes = true;
        self.config.write_delay = delay;
        self
    }

    /// Validate and produce the configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any configured knob is zero where a
    /// positive value is required.
    pub fn build(self) -> Result<SocketConfig, ConfigError> {
        let config = self.config;
        if config.rate_limit == Some(0) {
            return Err(ConfigError::ZeroRateLimit);
        }
        if config.rate_limit_window.is_zero() {
            return Err(ConfigError::ZeroRateWindow);
        }
        if config.max_buffer_bytes == 0 {
            return Err(ConfigError::ZeroBufferLimit);
        }
        if config.max_message_bytes == Some(0) {
            return Err(ConfigError::ZeroMessageLimit);
        }
        if config.delay_writes && config.write_delay.is_zero() {
            return Err(ConfigError::ZeroWriteDelay);
        }
        Ok(config)
    }
}
