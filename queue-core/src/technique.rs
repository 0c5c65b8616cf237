//! Generic poll-to-completion driver for techniques: long-running,
//! device-side state machines that an adapter drives synchronously from
//! inside a single `execute` call, reporting progress and recovering
//! partial data on failure.

use std::thread;
use std::time::Duration;

use crate::error::ErrorCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TechniqueStatus {
    Starting,
    Running,
    Completed,
    Error,
}

/// One step of a device-side technique. Implemented by adapters whose
/// commands drive a multi-poll state machine (e.g. an electrochemistry
/// sweep) rather than completing in a single request/response.
pub trait TechniqueSession {
    type Data;

    /// Advance the technique by one poll and report its current status.
    fn poll(&mut self) -> TechniqueStatus;

    /// Take the final data once `poll` has reported `Completed`. Called
    /// at most once.
    fn take_data(&mut self) -> Option<Self::Data>;

    /// Take whatever data was gathered before an `Error` status, if any.
    /// Called at most once.
    fn take_partial_data(&mut self) -> Option<Self::Data>;

    /// Human-readable detail for the error that produced `Error` status.
    fn last_error(&self) -> String;
}

/// Final result of running a [`TechniqueSession`] to completion.
pub struct TechniqueOutcome<D> {
    pub data: Option<D>,
    pub error_code: ErrorCode,
    pub message: Option<String>,
}

/// What `on_progress` is handed after each non-terminal poll. `poll_count`
/// lets a caller-supplied callback show a tick or step counter without
/// `TechniqueSession` having to expose any device-specific state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TechniqueProgress {
    pub status: TechniqueStatus,
    pub poll_count: u32,
}

/// Drive `session` with `poll_interval` between polls until it reports
/// `Completed` or `Error`, invoking `on_progress` after every
/// non-terminal poll. Runs entirely on the calling (worker) thread — the
/// whole point of a technique is that it occupies one `execute` call.
pub fn run_to_completion<S: TechniqueSession>(
    mut session: S,
    poll_interval: Duration,
    mut on_progress: impl FnMut(TechniqueProgress),
) -> TechniqueOutcome<S::Data> {
    let mut poll_count = 0u32;
    loop {
        let status = session.poll();
        match status {
            TechniqueStatus::Starting | TechniqueStatus::Running => {
                poll_count += 1;
                on_progress(TechniqueProgress { status, poll_count });
                thread::sleep(poll_interval);
            }
            TechniqueStatus::Completed => {
                let data = session.take_data();
                return TechniqueOutcome {
                    data,
                    error_code: ErrorCode::Success,
                    message: None,
                };
            }
            TechniqueStatus::Error => {
                let message = Some(session.last_error());
                return match session.take_partial_data() {
                    Some(partial) => TechniqueOutcome {
                        data: Some(partial),
                        error_code: ErrorCode::PartialData,
                        message,
                    },
                    None => TechniqueOutcome {
                        data: None,
                        error_code: ErrorCode::OperationFailed,
                        message,
                    },
                };
            }
        }
    }
}
