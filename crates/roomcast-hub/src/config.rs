//! Hub tuning knobs.

use std::time::Duration;

/// Interval between keepalive pings, kept inside common proxy idle timeouts.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(54);

/// Default per-connection outbound queue capacity.
pub const DEFAULT_OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Default capacity of the dispatcher's command channel.
pub const DEFAULT_COMMAND_BUFFER: usize = 1024;

/// Configuration for a [`Hub`](crate::Hub).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HubConfig {
    /// Payloads a member may have pending before it is evicted.
    pub outbound_queue_capacity: usize,
    /// Period of the delivery pump's ping frames.
    pub keepalive_interval: Duration,
    /// Events the dispatcher buffers before submitters wait.
    pub command_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbound_queue_capacity: DEFAULT_OUTBOUND_QUEUE_CAPACITY,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            command_buffer: DEFAULT_COMMAND_BUFFER,
        }
    }
}

impl HubConfig {
    /// Builder-style override of the outbound queue capacity.
    #[must_use]
    pub fn with_outbound_queue_capacity(mut self, capacity: usize) -> Self {
        self.outbound_queue_capacity = capacity;
        self
    }

    /// Builder-style override of the keepalive interval.
    #[must_use]
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = HubConfig::default();
        assert_eq!(cfg.outbound_queue_capacity, 256);
        assert_eq!(cfg.keepalive_interval, Duration::from_secs(54));
        assert_eq!(cfg.command_buffer, 1024);
    }

    #[test]
    fn builder_overrides() {
        let cfg = HubConfig::default()
            .with_outbound_queue_capacity(4)
            .with_keepalive_interval(Duration::from_millis(250));
        assert_eq!(cfg.outbound_queue_capacity, 4);
        assert_eq!(cfg.keepalive_interval, Duration::from_millis(250));
        assert_eq!(cfg.command_buffer, DEFAULT_COMMAND_BUFFER);
    }
}
