//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use super::{Invariant, InvariantResult, SystemSnapshot, Violation};

/// Output sequence numbers observed by a session must strictly increase.
///
/// A ring buffer write assigns the next sequence unconditionally; seeing the
/// same or a lower sequence twice indicates a replay or ordering bug
/// upstream of the invariant check.
pub struct OutputSequenceMonotonicity;

impl Invariant for OutputSequenceMonotonicity {
    fn name(&self) -> &'static str {
        "output_sequence_monotonicity"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for session in &state.sessions {
            for window in session.output_sequences.windows(2) {
                if window[1] <= window[0] {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "session {}: sequence did not increase {} -> {}",
                            session.id, window[0], window[1]
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// A client's flow-control window must never go negative.
///
/// `FlowControlWindow::try_send` is supposed to refuse a reservation that
/// would overdraw the window; a negative remaining balance means a caller
/// bypassed it or the bookkeeping double-counted a grant.
pub struct FlowControlWindowNonNegative;

impl Invariant for FlowControlWindowNonNegative {
    fn name(&self) -> &'static str {
        "flow_control_window_non_negative"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for session in &state.sessions {
            for (client_id, remaining) in &session.client_windows {
                if *remaining < 0 {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "session {} client {client_id}: window went negative ({remaining})",
                            session.id
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// A destroyed session must not still report output sequences or client
/// windows; `destroy_session` evicts a session's state entirely.
pub struct DestroyedSessionHasNoState;

impl Invariant for DestroyedSessionHasNoState {
    fn name(&self) -> &'static str {
        "destroyed_session_has_no_state"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for session in &state.sessions {
            if session.destroyed && (!session.output_sequences.is_empty() || !session.client_windows.is_empty()) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("session {}: destroyed but still carries state", session.id),
                });
            }
        }
        Ok(())
    }
}
