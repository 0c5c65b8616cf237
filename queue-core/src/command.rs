//! Command identity, priority and lifecycle state.

use std::mem::discriminant;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::adapter::DeviceAdapter;
use crate::error::ErrorCode;

pub type CommandId = u64;

static NEXT_COMMAND_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_command_id() -> CommandId {
    NEXT_COMMAND_ID.fetch_add(1, Ordering::Relaxed)
}

/// Scheduling class. Strict: `High` always drains before `Normal`, which
/// always drains before `Low`. No aging, no fairness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low = 0,
    Normal = 1,
    High = 2,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// Lifecycle of one queued command. Monotonic: once a command reaches a
/// terminal state it never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
}

impl CommandState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CommandState::Completed
                | CommandState::Failed
                | CommandState::Cancelled
                | CommandState::TimedOut
        )
    }
}

/// Whatever a command's eventual outcome is delivered through.
pub(crate) enum Delivery<A: DeviceAdapter> {
    /// No waiter holds this slot; the caller who enqueued it is blocked
    /// on the `terminal` condvar and will remove the slot itself once it
    /// observes a terminal state.
    Blocking,
    /// Invoked exactly once, from the worker thread, outside the queue
    /// lock, with the final outcome.
    Async(Box<dyn FnOnce(CommandId, Result<A::Output, ErrorCode>) + Send>),
}

/// One command's bookkeeping while it lives inside the queue.
pub(crate) struct CommandSlot<A: DeviceAdapter> {
    pub command: A::Command,
    pub priority: Priority,
    pub enqueued_at: Instant,
    pub state: CommandState,
    pub output: Option<A::Output>,
    pub error_code: ErrorCode,
    pub delivery: Delivery<A>,
    /// Set when a blocking caller gave up waiting on a running command
    /// (deadline plus grace elapsed). The worker still finishes the
    /// command normally but discards the result instead of notifying.
    pub abandoned: bool,
}

impl<A: DeviceAdapter> CommandSlot<A> {
    pub fn new(command: A::Command, priority: Priority, delivery: Delivery<A>) -> Self {
        Self {
            command,
            priority,
            enqueued_at: Instant::now(),
            state: CommandState::Queued,
            output: None,
            error_code: ErrorCode::Success,
            delivery,
            abandoned: false,
        }
    }
}

/// Whether two commands are of the "same type" for cancel-by-type
/// purposes. The original interface carries a separate adapter-defined
/// type tag alongside the opaque parameter blob; here `Command` is
/// ordinarily an enum, so its own discriminant already *is* that tag.
pub fn same_type<C>(a: &C, b: &C) -> bool {
    discriminant(a) == discriminant(b)
}
