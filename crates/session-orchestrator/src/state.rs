//! Pure session state machine (spec.md §4.7), kept separate from the
//! I/O-performing orchestrator methods — structure vs. execution, the way
//! the teacher's DAG (`dag.rs`) is kept separate from its executor
//! (`executor.rs`).

use learner_store::SessionStatus;
use learning_types::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Confirm,
    Cancel,
    Complete,
}

/// The only transitions the state machine recognizes (spec.md §4.7's
/// table); anything else is rejected with `InvalidTransition`.
pub fn transition(
    current: SessionStatus,
    event: SessionEvent,
) -> Result<SessionStatus, EngineError> {
    use SessionEvent::*;
    use SessionStatus::*;

    match (current, event) {
        (Requested, Confirm) => Ok(Confirmed),
        (Requested, Cancel) => Ok(Cancelled),
        (Confirmed, Complete) => Ok(Completed),
        (Confirmed, Cancel) => Ok(Cancelled),
        (from, event) => Err(EngineError::InvalidTransition(format!(
            "{from:?} does not accept {event:?}"
        ))),
    }
}
