//! Atomic, contiguous multi-command transactions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::adapter::DeviceAdapter;
use crate::command::{CommandState, Priority};
use crate::error::ErrorCode;

pub type TransactionHandle = u64;

static NEXT_TRANSACTION_HANDLE: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_transaction_handle() -> TransactionHandle {
    NEXT_TRANSACTION_HANDLE.fetch_add(1, Ordering::Relaxed)
}

/// Commit-time behaviour flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionFlags {
    /// Stop executing remaining members as soon as one fails, marking
    /// everything after it `Cancelled`.
    pub abort_on_error: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransactionState {
    Building,
    Committed,
    Completing,
    Completed,
}

/// One command's place inside a transaction. Never touches the regular
/// command table or the global `CommandId` space: a transaction member
/// is addressed by its index within the transaction.
pub(crate) struct TransactionMember<A: DeviceAdapter> {
    pub command: A::Command,
    pub state: CommandState,
    pub output: Option<A::Output>,
    pub error_code: ErrorCode,
}

/// One member's final outcome, as delivered to the completion callback.
#[derive(Debug, Clone)]
pub struct TransactionOutcome<O> {
    pub index: usize,
    pub output: Option<O>,
    pub error: ErrorCode,
}

pub(crate) type TransactionCallback<A> = Box<
    dyn FnOnce(TransactionHandle, usize, usize, Vec<TransactionOutcome<<A as DeviceAdapter>::Output>>)
        + Send,
>;

pub(crate) struct TransactionEntry<A: DeviceAdapter> {
    pub priority: Priority,
    pub flags: TransactionFlags,
    pub deadline: Option<Instant>,
    pub state: TransactionState,
    pub members: Vec<TransactionMember<A>>,
    pub callback: Option<TransactionCallback<A>>,
    /// Set by `cancel_transaction` while the worker is mid-execution;
    /// checked by the worker between members.
    pub cancel_requested: bool,
}

impl<A: DeviceAdapter> TransactionEntry<A> {
    pub fn new() -> Self {
        Self {
            priority: Priority::Normal,
            flags: TransactionFlags::default(),
            deadline: None,
            state: TransactionState::Building,
            members: Vec::new(),
            callback: None,
            cancel_requested: false,
        }
    }
}
