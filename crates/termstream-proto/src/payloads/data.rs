//! Terminal data-plane payloads: output, input, resize, signal delivery.

use serde::{Deserialize, Serialize};

/// Output bytes flowing from the local PTY toward a client.
///
/// Field numbers per the wire schema: `1:sessionId, 2:data, 3:sequenceNumber,
/// 4:compressed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalOutputData {
    /// Source session. Field 1.
    pub session_id: u32,
    /// Output bytes, possibly compressed. Field 2.
    pub data: Vec<u8>,
    /// Ring-buffer sequence number assigned to this chunk. Field 3.
    pub sequence_number: u64,
    /// Whether `data` is compressed; see [`crate::payloads::flow`] for the
    /// scheme, communicated separately during capability negotiation. Field
    /// 4.
    pub compressed: bool,
    /// `true` if this chunk is replay (pre-reattach history) rather than
    /// live output. Not itself a wire field; set by the sender based on
    /// delivery context and used by the client to avoid double-rendering.
    pub is_replay: bool,
}

/// Input bytes flowing from a client toward the local PTY.
///
/// Field numbers: `1:sessionId, 2:data, 3:sequenceNumber`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalInputData {
    /// Destination session. Field 1.
    pub session_id: u32,
    /// Raw input bytes. Field 2.
    pub data: Vec<u8>,
    /// Monotonic per-client input sequence number. Field 3.
    pub sequence_number: u64,
}

/// Terminal dimension change.
///
/// Field numbers: `1:sessionId, 2:columns, 3:rows`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalResize {
    /// Session being resized. Field 1.
    pub session_id: u32,
    /// New width, must be in `[1, 1000]`. Field 2.
    pub columns: u16,
    /// New height, must be in `[1, 500]`. Field 3.
    pub rows: u16,
}

/// POSIX-style signal to deliver to the session's PTY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalKind {
    /// Interrupt (`SIGINT`).
    Interrupt,
    /// Terminate (`SIGTERM`).
    Terminate,
    /// Terminal resize notification (`SIGWINCH`).
    WindowChange,
}

/// Signal delivery request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    /// Target session.
    pub session_id: u32,
    /// Signal to deliver.
    pub signal: SignalKind,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn terminal_output_round_trips() {
        let original = TerminalOutputData {
            session_id: 1,
            data: b"hello".to_vec(),
            sequence_number: 5,
            compressed: false,
            is_replay: true,
        };
        let mut encoded = Vec::new();
        ciborium::ser::into_writer(&original, &mut encoded).unwrap();
        let decoded: TerminalOutputData = ciborium::de::from_reader(&encoded[..]).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn resize_bounds_are_representable() {
        let resize = TerminalResize { session_id: 1, columns: 1000, rows: 500 };
        assert_eq!(resize.columns, 1000);
        assert_eq!(resize.rows, 500);
    }
}
