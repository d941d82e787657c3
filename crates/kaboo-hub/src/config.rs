//! Hub configuration: deadlines, limits, and queue sizes.

use std::time::Duration;

/// Configuration for connection liveness and buffering.
///
/// The defaults are the classic WebSocket keepalive setup: ping a little
/// more often than the peer is allowed to stay silent.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Time allowed to write one frame to the peer. A write that takes
    /// longer marks the connection as dead.
    pub write_wait: Duration,

    /// Time allowed between keepalive acknowledgements. The read deadline
    /// is pushed forward by `pong_wait` on every pong.
    pub pong_wait: Duration,

    /// Interval between keepalive pings. Must be shorter than `pong_wait`.
    pub ping_period: Duration,

    /// Largest inbound frame accepted, in bytes. Bigger frames are a
    /// protocol violation and drop the connection.
    pub max_message_size: usize,

    /// Capacity of each connection's outbound queue. A connection whose
    /// queue is full is treated as a slow consumer and dropped.
    pub send_buffer: usize,

    /// Capacity of the application-level inbox shared by all connections.
    pub inbox_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        let pong_wait = Duration::from_secs(60);
        Self {
            write_wait: Duration::from_secs(10),
            pong_wait,
            ping_period: pong_wait * 9 / 10,
            max_message_size: 512,
            send_buffer: 256,
            inbox_capacity: 256,
        }
    }
}

impl HubConfig {
    /// Fixes out-of-range values so the config is safe to use.
    ///
    /// Called by [`Hub::spawn`](crate::Hub::spawn). Rules:
    /// - `ping_period` forced below `pong_wait` (9/10 of it), otherwise a
    ///   healthy peer would time out between two pings.
    /// - Queue capacities of 0 become 1 (tokio channels reject 0).
    /// - Zero durations are left alone; they're only useful in tests but
    ///   they are not unsafe.
    pub fn validated(mut self) -> Self {
        if self.ping_period >= self.pong_wait {
            let fixed = self.pong_wait * 9 / 10;
            tracing::warn!(
                ping_period = ?self.ping_period,
                pong_wait = ?self.pong_wait,
                fixed = ?fixed,
                "ping_period must be shorter than pong_wait, clamping"
            );
            self.ping_period = fixed;
        }
        self.send_buffer = self.send_buffer.max(1);
        self.inbox_capacity = self.inbox_capacity.max(1);
        self
    }
}
