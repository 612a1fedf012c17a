//! Tunables for every component, gathered into one `Default`-implementing
//! struct family. Constructed once at startup and threaded through by value
//! or reference; never read from global or thread-local state.

use std::time::Duration;

/// Bounds for a single session's [`crate::ring_buffer::OutputRingBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingBufferConfig {
    /// Maximum total bytes retained across all chunks.
    pub max_bytes: usize,
    /// Maximum number of chunks retained.
    pub max_chunks: usize,
}

impl Default for RingBufferConfig {
    fn default() -> Self {
        Self { max_bytes: 2 * 1024 * 1024, max_chunks: 20_000 }
    }
}

/// Thresholds governing [`crate::compressor::AdaptiveCompressor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionConfig {
    /// Compression is skipped entirely below this many bytes. `0` disables
    /// compression entirely.
    pub min_size_for_compression: usize,
    /// A compressed result is discarded (sent uncompressed) unless
    /// `compressed_len * 100 <= original_len * min_compression_ratio_pct`.
    pub min_compression_ratio_pct: u8,
    /// DEFLATE level used when the network is categorized `Fast`.
    pub fast_level: u32,
    /// DEFLATE level used when the network is categorized `Medium`.
    pub medium_level: u32,
    /// DEFLATE level used when the network is categorized `Slow`.
    pub slow_level: u32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            min_size_for_compression: 256,
            min_compression_ratio_pct: 90,
            fast_level: 2,
            medium_level: 5,
            slow_level: 8,
        }
    }
}

/// Per-client flow-control defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowControlConfig {
    /// Initial window granted to a newly registered client.
    pub default_window_size: u64,
    /// How long a blocked send may wait for credit before the client is
    /// disconnected with `FlowControlViolation`.
    pub blocked_send_deadline: Duration,
    /// Maximum outstanding queued sends per client before the same
    /// violation applies regardless of deadline.
    pub max_pending_queue: usize,
}

impl Default for FlowControlConfig {
    fn default() -> Self {
        Self {
            default_window_size: 64 * 1024,
            blocked_send_deadline: Duration::from_secs(30),
            max_pending_queue: 256,
        }
    }
}

/// Reconnection bookkeeping tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectionConfig {
    /// Time budget after disconnection during which a client may rejoin.
    pub reconnection_window: Duration,
    /// Grace period before an expired entry is actually evicted by
    /// `cleanup_expired`, to tolerate clock skew between checks.
    pub cleanup_grace: Duration,
    /// Maximum bytes of replay served per reconnection attempt.
    pub max_replay_bytes: usize,
    /// Whether detaching a session's last client retains it for
    /// reconnection (`true`) or tears it down immediately (`false`).
    pub retain_on_last_detach: bool,
}

impl Default for ReconnectionConfig {
    fn default() -> Self {
        Self {
            reconnection_window: Duration::from_secs(5),
            cleanup_grace: Duration::from_millis(500),
            max_replay_bytes: 2 * 1024 * 1024,
            retain_on_last_detach: true,
        }
    }
}

/// Service-wide bounds and targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Per-session ring buffer bounds.
    pub ring_buffer: RingBufferConfig,
    /// Adaptive compression thresholds.
    pub compression: CompressionConfig,
    /// Per-client flow control defaults.
    pub flow_control: FlowControlConfig,
    /// Reconnection window and replay bookkeeping.
    pub reconnection: ReconnectionConfig,
    /// Heartbeat cadence advertised during capability negotiation.
    pub heartbeat_interval: Duration,
    /// Missed-heartbeat count before a connection is declared dead.
    pub heartbeat_missed_limit: u32,
    /// `processTerminalOutput` logs a warning if it exceeds this latency.
    pub target_latency: Duration,
    /// Capacity of the per-session output broadcast buffer (chunks).
    pub output_broadcast_capacity: usize,
    /// Capacity of the service-wide input buffer (messages).
    pub input_buffer_capacity: usize,
    /// Maximum concurrently open sessions. `0` means unbounded.
    pub max_sessions: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            ring_buffer: RingBufferConfig::default(),
            compression: CompressionConfig::default(),
            flow_control: FlowControlConfig::default(),
            reconnection: ReconnectionConfig::default(),
            heartbeat_interval: Duration::from_secs(15),
            heartbeat_missed_limit: 3,
            target_latency: Duration::from_millis(100),
            output_broadcast_capacity: 1000,
            input_buffer_capacity: 100,
            max_sessions: 0,
        }
    }
}
