//! Observability and Metrics
//!
//! Process-wide counters for RCON connection health, shared by every client
//! and supervisor in the process.
//!
//! Uses atomic counters for thread-safe metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Global metrics collector for RCON operations
#[derive(Debug)]
pub struct Metrics {
    /// Total TCP connections established
    pub connections_total: AtomicU64,
    /// Currently open connections
    pub connections_active: AtomicU64,
    /// Connect attempts that failed before authentication
    pub connection_errors: AtomicU64,
    /// Total authentication attempts
    pub handshakes_total: AtomicU64,
    /// Successful authentications
    pub handshakes_success: AtomicU64,
    /// Rejected or timed out authentications
    pub handshakes_failed: AtomicU64,
    /// Commands written to a socket
    pub commands_sent: AtomicU64,
    /// Commands answered by the server
    pub commands_answered: AtomicU64,
    /// Commands that hit their deadline
    pub command_timeouts: AtomicU64,
    /// Keep-alive commands written
    pub keepalives_sent: AtomicU64,
    /// Responses with no matching pending request
    pub unsolicited_packets: AtomicU64,
    /// Total bytes written
    pub bytes_sent: AtomicU64,
    /// Total bytes read
    pub bytes_received: AtomicU64,
    /// Registry entries pruned by liveness checks
    pub entries_pruned: AtomicU64,
    /// Framing violations
    pub protocol_errors: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            handshakes_total: AtomicU64::new(0),
            handshakes_success: AtomicU64::new(0),
            handshakes_failed: AtomicU64::new(0),
            commands_sent: AtomicU64::new(0),
            commands_answered: AtomicU64::new(0),
            command_timeouts: AtomicU64::new(0),
            keepalives_sent: AtomicU64::new(0),
            unsolicited_packets: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            entries_pruned: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a new connection
    pub fn connection_established(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection closed
    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record a failed connect attempt
    pub fn connection_error(&self) {
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a handshake attempt
    pub fn handshake_attempt(&self) {
        self.handshakes_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful handshake
    pub fn handshake_success(&self) {
        self.handshakes_success.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed handshake
    pub fn handshake_failed(&self) {
        self.handshakes_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a command written to the socket
    pub fn command_sent(&self, byte_count: u64) {
        self.commands_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a command response
    pub fn command_answered(&self) {
        self.commands_answered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a command deadline expiry
    pub fn command_timeout(&self) {
        self.command_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a keep-alive written to the socket
    pub fn keepalive_sent(&self, byte_count: u64) {
        self.keepalives_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a packet nobody was waiting for
    pub fn unsolicited_packet(&self) {
        self.unsolicited_packets.fetch_add(1, Ordering::Relaxed);
    }

    /// Record bytes read from a socket
    pub fn bytes_read(&self, byte_count: u64) {
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a pruned registry entry
    pub fn entry_pruned(&self) {
        self.entries_pruned.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a protocol error
    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            handshakes_total: self.handshakes_total.load(Ordering::Relaxed),
            handshakes_success: self.handshakes_success.load(Ordering::Relaxed),
            handshakes_failed: self.handshakes_failed.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            commands_answered: self.commands_answered.load(Ordering::Relaxed),
            command_timeouts: self.command_timeouts.load(Ordering::Relaxed),
            keepalives_sent: self.keepalives_sent.load(Ordering::Relaxed),
            unsolicited_packets: self.unsolicited_packets.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            entries_pruned: self.entries_pruned.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            connections_total = snapshot.connections_total,
            connections_active = snapshot.connections_active,
            connection_errors = snapshot.connection_errors,
            handshakes_total = snapshot.handshakes_total,
            handshakes_success = snapshot.handshakes_success,
            handshakes_failed = snapshot.handshakes_failed,
            commands_sent = snapshot.commands_sent,
            commands_answered = snapshot.commands_answered,
            command_timeouts = snapshot.command_timeouts,
            keepalives_sent = snapshot.keepalives_sent,
            unsolicited_packets = snapshot.unsolicited_packets,
            bytes_sent = snapshot.bytes_sent,
            bytes_received = snapshot.bytes_received,
            entries_pruned = snapshot.entries_pruned,
            protocol_errors = snapshot.protocol_errors,
            uptime_seconds = snapshot.uptime_seconds,
            "RCON metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub connections_active: u64,
    pub connection_errors: u64,
    pub handshakes_total: u64,
    pub handshakes_success: u64,
    pub handshakes_failed: u64,
    pub commands_sent: u64,
    pub commands_answered: u64,
    pub command_timeouts: u64,
    pub keepalives_sent: u64,
    pub unsolicited_packets: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub entries_pruned: u64,
    pub protocol_errors: u64,
    pub uptime_seconds: u64,
}

static METRICS: once_cell::sync::Lazy<Metrics> = once_cell::sync::Lazy::new(Metrics::new);

/// Get the global metrics instance
pub fn global_metrics() -> &'static Metrics {
    &METRICS
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_ms = duration.as_millis(),
            "Operation completed"
        );
    }
}
