//! Terminal state synchronization payloads: full snapshots, incremental
//! deltas, standalone cursor updates, and scrollback paging.

use serde::{Deserialize, Serialize};

/// Full terminal screen state.
///
/// Field numbers: `1:sessionId, 2:columns, 3:rows, 4:cursorX, 5:cursorY,
/// 6:cursorVisible, 7:screenContent, 8:scrollbackOffset, 9:scrollbackTotal,
/// 10:foregroundColor, 11:backgroundColor, 12:attributes, 13:sequenceNumber,
/// 14:charset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Owning session. Field 1.
    pub session_id: u32,
    /// Terminal width. Field 2.
    pub columns: u16,
    /// Terminal height. Field 3.
    pub rows: u16,
    /// Cursor column. Field 4.
    pub cursor_x: u16,
    /// Cursor row. Field 5.
    pub cursor_y: u16,
    /// Whether the cursor is visible. Field 6.
    pub cursor_visible: bool,
    /// Screen content, `rows * columns` cells flattened row-major. Field 7.
    pub screen_content: Vec<u8>,
    /// Charset tag for `screen_content` (e.g. `"utf-8"`). Field 14.
    pub charset: String,
    /// First scrollback line included in `screen_content`'s history view.
    /// Field 8.
    pub scrollback_offset: u32,
    /// Total scrollback lines retained. Field 9.
    pub scrollback_total: u32,
    /// Foreground color index. Field 10.
    pub foreground_color: u8,
    /// Background color index. Field 11.
    pub background_color: u8,
    /// Attribute bitfield: bit 0 bold, 1 italic, 2 underline, 3
    /// strikethrough, 4 inverse, 5 blink. Field 12.
    pub attributes: u8,
    /// Monotonic sequence number of the state stream, independent of the
    /// output byte stream. Field 13.
    pub sequence_number: u64,
}

/// One incremental change to apply to a [`StateSnapshot`].
///
/// Modeled as a Rust sum type per update kind rather than the flat
/// `{updateType, row, col, data, intValue}` shape the wire schema
/// enumerates; CBOR's self-describing maps make this lossless, and rejecting
/// an unrecognized `updateType` falls naturally out of deserialization
/// failing instead of needing a manual discriminant check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "update_type")]
pub enum StateUpdate {
    /// Move the cursor to `(row, col)`.
    CursorMove {
        /// Target row.
        row: u16,
        /// Target column.
        col: u16,
    },
    /// Toggle cursor visibility.
    CursorVisibility {
        /// New visibility.
        visible: bool,
    },
    /// Overwrite an entire row with `data`.
    LineUpdate {
        /// Row to overwrite.
        row: u16,
        /// New row content.
        data: Vec<u8>,
    },
    /// Overwrite a sub-region of a row starting at `col`.
    RegionUpdate {
        /// Row to overwrite.
        row: u16,
        /// Starting column.
        col: u16,
        /// New region content.
        data: Vec<u8>,
    },
    /// Scroll the screen by `n` rows, filling cleared rows with spaces in
    /// the current attribute.
    Scroll {
        /// Rows to scroll; positive scrolls content up.
        n: i32,
    },
    /// Clear the entire screen.
    ClearScreen,
    /// Clear a single row.
    ClearLine {
        /// Row to clear.
        row: u16,
    },
    /// Change the attribute bitfield.
    AttributeChange {
        /// New attribute bits.
        bits: u8,
    },
    /// Change the foreground color index.
    ColorChange {
        /// New foreground color index.
        fg_index: u8,
    },
}

/// Incremental state change.
///
/// Field numbers: `1:sessionId, 2:baseSequenceNumber, 3:newSequenceNumber,
/// 4:updates`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDelta {
    /// Session this delta applies to. Field 1.
    pub session_id: u32,
    /// Delta is only applicable if this matches the current sequence. Field
    /// 2.
    pub base_sequence_number: u64,
    /// Sequence number of the snapshot this delta produces. Field 3.
    pub new_sequence_number: u64,
    /// Ordered updates to apply. Field 4.
    pub updates: Vec<StateUpdate>,
}

/// Standalone, lightweight cursor broadcast (cheaper than a full delta for
/// cursor-only movement).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPosition {
    /// Session this cursor belongs to.
    pub session_id: u32,
    /// Cursor row.
    pub row: u16,
    /// Cursor column.
    pub col: u16,
    /// Whether the cursor is visible.
    pub visible: bool,
}

/// Request a page of scrollback history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollbackRequest {
    /// Session to query.
    pub session_id: u32,
    /// First line to return, 0-based.
    pub start_line: u32,
    /// Maximum lines to return; must be in `[1, 10000]`.
    pub line_count: u32,
}

/// A page of scrollback history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollbackResponse {
    /// Echoes the request's `start_line`.
    pub start_line: u32,
    /// Total scrollback lines available.
    pub total_lines: u32,
    /// Newline-terminated lines in `[start_line, start_line + returned)`.
    pub lines: String,
    /// `true` if more lines exist past the returned range.
    pub has_more: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn state_delta_round_trips_with_mixed_updates() {
        let delta = StateDelta {
            session_id: 1,
            base_sequence_number: 1,
            new_sequence_number: 2,
            updates: vec![
                StateUpdate::CursorMove { row: 5, col: 10 },
                StateUpdate::ColorChange { fg_index: 3 },
                StateUpdate::AttributeChange { bits: 4 },
            ],
        };

        let mut encoded = Vec::new();
        ciborium::ser::into_writer(&delta, &mut encoded).unwrap();
        let decoded: StateDelta = ciborium::de::from_reader(&encoded[..]).unwrap();
        assert_eq!(delta, decoded);
    }

    #[test]
    fn scrollback_response_round_trips() {
        let response = ScrollbackResponse {
            start_line: 1,
            total_lines: 5,
            lines: "line2\nline3\n".to_string(),
            has_more: true,
        };
        let mut encoded = Vec::new();
        ciborium::ser::into_writer(&response, &mut encoded).unwrap();
        let decoded: ScrollbackResponse = ciborium::de::from_reader(&encoded[..]).unwrap();
        assert_eq!(response, decoded);
    }
}
