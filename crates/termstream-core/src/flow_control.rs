//! Per-client, per-session credit-based flow control.
//!
//! The client advertises a `windowSize` (max unacknowledged bytes in
//! flight); the server may send only while `bytes_available >= n`.

/// Credit tracker for a single client's subscription to one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowControlWindow {
    window_size: u64,
    bytes_sent: u64,
    bytes_acknowledged: u64,
    bytes_available: u64,
}

impl FlowControlWindow {
    /// Create a window with `default_window_size` credit available.
    #[must_use]
    pub fn new(default_window_size: u64) -> Self {
        Self {
            window_size: default_window_size,
            bytes_sent: 0,
            bytes_acknowledged: 0,
            bytes_available: default_window_size,
        }
    }

    /// Bytes presently available to send without blocking.
    #[must_use]
    pub fn bytes_available(&self) -> u64 {
        self.bytes_available
    }

    /// Attempt to reserve credit for sending `n` bytes.
    ///
    /// Returns `true` and deducts `n` from the available credit on success;
    /// returns `false` (without mutating state) if insufficient credit is
    /// available.
    pub fn try_send(&mut self, n: u64) -> bool {
        if self.bytes_available < n {
            return false;
        }
        self.bytes_available -= n;
        self.bytes_sent += n;
        true
    }

    /// Apply a client's `FlowControlMessage`: `bytes_acknowledged` only ever
    /// moves forward, `window_size` is replaced outright, and available
    /// credit is recomputed from both.
    pub fn apply_flow_control_message(&mut self, window_size: u64, bytes_acknowledged: u64) {
        self.bytes_acknowledged = self.bytes_acknowledged.max(bytes_acknowledged);
        self.window_size = window_size;
        self.bytes_available =
            self.window_size.saturating_sub(self.bytes_sent.saturating_sub(self.bytes_acknowledged));
    }

    /// Apply a standalone `WindowUpdate` credit grant.
    pub fn apply_window_update(&mut self, increment: u64) {
        self.bytes_available = self.bytes_available.saturating_add(increment);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_control_scenario_from_concrete_example() {
        let mut window = FlowControlWindow::new(1024);

        assert!(window.try_send(512));
        assert!(window.try_send(512));
        assert!(!window.try_send(512));

        window.apply_flow_control_message(1024, 512);
        assert!(window.try_send(512));
    }

    #[test]
    fn bytes_in_flight_never_exceed_window_size() {
        let mut window = FlowControlWindow::new(100);
        assert!(window.try_send(60));
        assert!(!window.try_send(60));
        assert_eq!(window.bytes_available(), 40);
    }

    #[test]
    fn window_update_grants_additional_credit() {
        let mut window = FlowControlWindow::new(100);
        assert!(window.try_send(100));
        assert!(!window.try_send(1));

        window.apply_window_update(50);
        assert!(window.try_send(50));
    }

    #[test]
    fn acknowledgment_only_moves_forward() {
        let mut window = FlowControlWindow::new(1000);
        window.try_send(500);
        window.apply_flow_control_message(1000, 500);
        let available_after_first_ack = window.bytes_available();

        window.apply_flow_control_message(1000, 200);
        assert_eq!(window.bytes_available(), available_after_first_ack);
    }
}
