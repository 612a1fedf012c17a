//! Latest-snapshot-plus-delta terminal state tracking, and scrollback
//! paging.
//!
//! The state stream's sequence number is independent from the output byte
//! stream's sequence number.

use termstream_proto::payloads::state::{StateDelta, StateSnapshot, StateUpdate};
use tracing::warn;

use crate::errors::StateError;

/// Per-session store of the latest [`StateSnapshot`] plus scrollback lines.
#[derive(Debug, Clone)]
pub struct TerminalStateStore {
    snapshot: Option<StateSnapshot>,
    scrollback: Vec<String>,
}

impl TerminalStateStore {
    /// Create an empty store with no snapshot installed yet.
    #[must_use]
    pub fn new() -> Self {
        Self { snapshot: None, scrollback: Vec::new() }
    }

    /// Install `snapshot`, replacing any prior one.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::SnapshotAlreadyPresent`] if `initial == true`
    /// but a snapshot already exists.
    pub fn update_snapshot(&mut self, snapshot: StateSnapshot, initial: bool) -> Result<(), StateError> {
        if initial && self.snapshot.is_some() {
            return Err(StateError::SnapshotAlreadyPresent);
        }
        self.snapshot = Some(snapshot);
        Ok(())
    }

    /// Apply `delta` to the current snapshot, producing a new one at
    /// `delta.new_sequence_number`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::OutOfSync`] if `delta.base_sequence_number`
    /// doesn't match the store's current sequence, or if no snapshot exists
    /// yet.
    pub fn apply_delta(&mut self, delta: &StateDelta) -> Result<(), StateError> {
        let current = self.snapshot.as_ref().ok_or(StateError::OutOfSync {
            base: delta.base_sequence_number,
            current: 0,
        })?;

        if current.sequence_number != delta.base_sequence_number {
            return Err(StateError::OutOfSync {
                base: delta.base_sequence_number,
                current: current.sequence_number,
            });
        }

        let mut next = current.clone();
        for update in &delta.updates {
            apply_update(&mut next, update);
        }
        next.sequence_number = delta.new_sequence_number;

        self.snapshot = Some(next);
        Ok(())
    }

    /// A page of scrollback starting at `start_line` (0-based), up to
    /// `line_count` lines.
    #[must_use]
    pub fn scrollback_page(&self, start_line: u32, line_count: u32) -> ScrollbackPage {
        let start = start_line as usize;
        let count = line_count as usize;
        let total = self.scrollback.len();

        let lines: Vec<&str> =
            self.scrollback.iter().skip(start).take(count).map(String::as_str).collect();
        let has_more = start + lines.len() < total;

        let mut rendered = String::new();
        for line in &lines {
            rendered.push_str(line);
            rendered.push('\n');
        }

        ScrollbackPage { start_line, total_lines: total as u32, lines: rendered, has_more }
    }

    /// Replace the stored scrollback lines wholesale (used when a full
    /// resync snapshot also carries history).
    pub fn set_scrollback(&mut self, lines: Vec<String>) {
        self.scrollback = lines;
    }

    /// Current state sequence number, or `0` if no snapshot installed.
    #[must_use]
    pub fn current_sequence(&self) -> u64 {
        self.snapshot.as_ref().map_or(0, |snapshot| snapshot.sequence_number)
    }

    /// Current snapshot, if any.
    #[must_use]
    pub fn snapshot(&self) -> Option<&StateSnapshot> {
        self.snapshot.as_ref()
    }
}

impl Default for TerminalStateStore {
    fn default() -> Self {
        Self::new()
    }
}

/// A page of scrollback history, mirroring the wire `ScrollbackResponse`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollbackPage {
    /// Echoes the request's `start_line`.
    pub start_line: u32,
    /// Total scrollback lines available.
    pub total_lines: u32,
    /// Newline-terminated lines in the returned range.
    pub lines: String,
    /// `true` if more lines exist past the returned range.
    pub has_more: bool,
}

fn apply_update(snapshot: &mut StateSnapshot, update: &StateUpdate) {
    match update {
        StateUpdate::CursorMove { row, col } => {
            if *row >= snapshot.rows || *col >= snapshot.columns {
                warn!(row, col, rows = snapshot.rows, columns = snapshot.columns, "cursor move out of bounds");
            }
            snapshot.cursor_y = (*row).min(snapshot.rows.saturating_sub(1));
            snapshot.cursor_x = (*col).min(snapshot.columns.saturating_sub(1));
        },
        StateUpdate::CursorVisibility { visible } => {
            snapshot.cursor_visible = *visible;
        },
        StateUpdate::LineUpdate { row, data } => {
            if *row >= snapshot.rows {
                warn!(row, rows = snapshot.rows, "line update out of bounds");
                return;
            }
            write_row(snapshot, *row, 0, data);
        },
        StateUpdate::RegionUpdate { row, col, data } => {
            if *row >= snapshot.rows || *col >= snapshot.columns {
                warn!(row, col, "region update out of bounds");
                return;
            }
            write_row(snapshot, *row, *col, data);
        },
        StateUpdate::Scroll { n } => scroll(snapshot, *n),
        StateUpdate::ClearScreen => {
            let len = snapshot.screen_content.len();
            snapshot.screen_content = vec![b' '; len];
        },
        StateUpdate::ClearLine { row } => {
            if *row >= snapshot.rows {
                warn!(row, rows = snapshot.rows, "clear line out of bounds");
                return;
            }
            let columns = snapshot.columns as usize;
            let start = (*row as usize) * columns;
            let end = start + columns;
            if end <= snapshot.screen_content.len() {
                snapshot.screen_content[start..end].fill(b' ');
            }
        },
        StateUpdate::AttributeChange { bits } => snapshot.attributes = *bits,
        StateUpdate::ColorChange { fg_index } => snapshot.foreground_color = *fg_index,
    }
}

fn write_row(snapshot: &mut StateSnapshot, row: u16, col_offset: u16, data: &[u8]) {
    let columns = snapshot.columns as usize;
    let row_start = (row as usize) * columns;
    let write_start = row_start + col_offset as usize;
    let write_end = (write_start + data.len()).min(row_start + columns);

    if write_start >= snapshot.screen_content.len() {
        return;
    }

    let usable = write_end.saturating_sub(write_start);
    snapshot.screen_content[write_start..write_start + usable].copy_from_slice(&data[..usable]);
}

fn scroll(snapshot: &mut StateSnapshot, n: i32) {
    let columns = snapshot.columns as usize;
    let rows = snapshot.rows as usize;
    if columns == 0 || rows == 0 || n == 0 {
        return;
    }

    let shift_rows = n.unsigned_abs() as usize;
    if shift_rows >= rows {
        let len = snapshot.screen_content.len();
        snapshot.screen_content = vec![b' '; len];
        return;
    }

    let shift_bytes = shift_rows * columns;
    if n > 0 {
        snapshot.screen_content.rotate_left(shift_bytes);
    } else {
        snapshot.screen_content.rotate_right(shift_bytes);
    }

    let blank_range = if n > 0 {
        (rows - shift_rows) * columns..rows * columns
    } else {
        0..shift_bytes
    };
    snapshot.screen_content[blank_range].fill(b' ');
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn base_snapshot() -> StateSnapshot {
        StateSnapshot {
            session_id: 1,
            columns: 80,
            rows: 24,
            cursor_x: 0,
            cursor_y: 0,
            cursor_visible: true,
            screen_content: vec![b' '; 80 * 24],
            charset: "utf-8".to_string(),
            scrollback_offset: 0,
            scrollback_total: 0,
            foreground_color: 7,
            background_color: 0,
            attributes: 0,
            sequence_number: 1,
        }
    }

    #[test]
    fn apply_delta_requires_matching_base_sequence() {
        let mut store = TerminalStateStore::new();
        store.update_snapshot(base_snapshot(), true).unwrap();

        let delta = StateDelta {
            session_id: 1,
            base_sequence_number: 99,
            new_sequence_number: 100,
            updates: vec![],
        };

        let result = store.apply_delta(&delta);
        assert!(matches!(result, Err(StateError::OutOfSync { base: 99, current: 1 })));
        assert_eq!(store.current_sequence(), 1);
    }

    #[test]
    fn state_delta_scenario_from_concrete_example() {
        let mut store = TerminalStateStore::new();
        store.update_snapshot(base_snapshot(), true).unwrap();

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

        store.apply_delta(&delta).unwrap();

        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.cursor_y, 5);
        assert_eq!(snapshot.cursor_x, 10);
        assert_eq!(snapshot.foreground_color, 3);
        assert_eq!(snapshot.attributes, 4);
        assert_eq!(snapshot.sequence_number, 2);
    }

    #[test]
    fn second_initial_snapshot_is_rejected() {
        let mut store = TerminalStateStore::new();
        store.update_snapshot(base_snapshot(), true).unwrap();
        assert!(matches!(
            store.update_snapshot(base_snapshot(), true),
            Err(StateError::SnapshotAlreadyPresent)
        ));
    }

    #[test]
    fn scrollback_page_scenario_from_concrete_example() {
        let mut store = TerminalStateStore::new();
        store.set_scrollback(vec![
            "line1".to_string(),
            "line2".to_string(),
            "line3".to_string(),
            "line4".to_string(),
            "line5".to_string(),
        ]);

        let page = store.scrollback_page(1, 2);
        assert_eq!(page.start_line, 1);
        assert_eq!(page.total_lines, 5);
        assert_eq!(page.lines, "line2\nline3\n");
        assert!(page.has_more);
    }

    #[test]
    fn clear_screen_blanks_every_cell() {
        let mut store = TerminalStateStore::new();
        let mut snapshot = base_snapshot();
        snapshot.screen_content[0] = b'x';
        store.update_snapshot(snapshot, true).unwrap();

        let delta = StateDelta {
            session_id: 1,
            base_sequence_number: 1,
            new_sequence_number: 2,
            updates: vec![StateUpdate::ClearScreen],
        };
        store.apply_delta(&delta).unwrap();

        assert!(store.snapshot().unwrap().screen_content.iter().all(|&b| b == b' '));
    }

    #[test]
    fn out_of_bounds_cursor_move_is_clamped_not_fatal() {
        let mut store = TerminalStateStore::new();
        store.update_snapshot(base_snapshot(), true).unwrap();

        let delta = StateDelta {
            session_id: 1,
            base_sequence_number: 1,
            new_sequence_number: 2,
            updates: vec![StateUpdate::CursorMove { row: 9999, col: 9999 }],
        };

        store.apply_delta(&delta).unwrap();
        let snapshot = store.snapshot().unwrap();
        assert!(snapshot.cursor_y < snapshot.rows);
        assert!(snapshot.cursor_x < snapshot.columns);
    }
}
