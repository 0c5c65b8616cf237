//! The public handle to a running queue: `QueueManager<A>`.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::info;

use crate::adapter::DeviceAdapter;
use crate::command::{next_command_id, same_type, CommandId, CommandSlot, CommandState, Delivery, Priority};
use crate::config::QueueConfig;
use crate::error::ErrorCode;
use crate::pqueue::{PriorityQueues, WorkItem};
use crate::stats::{Stats, StatsInner};
use crate::transaction::{
    next_transaction_handle, TransactionEntry, TransactionFlags, TransactionHandle, TransactionMember,
    TransactionOutcome, TransactionState,
};
use crate::worker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

/// Everything protected by the one queue mutex.
pub(crate) struct QueueState<A: DeviceAdapter> {
    pub queues: PriorityQueues,
    pub commands: HashMap<CommandId, CommandSlot<A>>,
    pub transactions: HashMap<TransactionHandle, TransactionEntry<A>>,
    pub connection: ConnectionState,
    pub shutting_down: bool,
    pub active_transaction: Option<TransactionHandle>,
    pub stats: StatsInner,
    pub log_device: String,
}

/// State shared between `QueueManager` and its worker thread.
pub(crate) struct Inner<A: DeviceAdapter> {
    pub adapter: A,
    pub context: Mutex<A::Context>,
    pub connect_params: A::ConnectParams,
    pub state: Mutex<QueueState<A>>,
    pub not_empty: Condvar,
    pub terminal: Condvar,
    pub config: QueueConfig,
}

impl<A: DeviceAdapter> Inner<A> {
    pub fn log_device(&self) -> String {
        let state = self.state.lock().unwrap();
        if state.log_device.is_empty() {
            self.adapter.display_name().to_string()
        } else {
            state.log_device.clone()
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connection == ConnectionState::Connected
    }
}

/// A thread-safe, priority-ordered command queue driving one instrument
/// through a [`DeviceAdapter`]. Owns a single dedicated worker thread for
/// the lifetime of the manager; dropping the last `Arc<QueueManager<A>>`
/// stops that thread and disconnects the adapter.
pub struct QueueManager<A: DeviceAdapter> {
    pub(crate) inner: Arc<Inner<A>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<A: DeviceAdapter> QueueManager<A> {
    /// Build and start a queue: spawns the worker thread, which performs
    /// the first connection attempt itself. Returns immediately; the
    /// queue accepts commands even before the first connection succeeds.
    pub fn start(
        adapter: A,
        context: A::Context,
        connect_params: A::ConnectParams,
        config: QueueConfig,
    ) -> Arc<Self> {
        let inner = Arc::new(Inner {
            state: Mutex::new(QueueState {
                queues: PriorityQueues::new(&config),
                commands: HashMap::new(),
                transactions: HashMap::new(),
                connection: ConnectionState::Connecting,
                shutting_down: false,
                active_transaction: None,
                stats: StatsInner::default(),
                log_device: String::new(),
            }),
            adapter,
            context: Mutex::new(context),
            connect_params,
            not_empty: Condvar::new(),
            terminal: Condvar::new(),
            config,
        });

        let worker_inner = Arc::clone(&inner);
        let handle = std::thread::Builder::new()
            .name(format!("queue-worker-{}", inner.adapter.display_name()))
            .spawn(move || worker::run(worker_inner))
            .expect("failed to spawn queue worker thread");

        Arc::new(Self {
            inner,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Tag used in subsequent log lines (e.g. an instrument serial
    /// number or bus address), replacing the adapter's display name.
    pub fn set_log_device(&self, tag: impl Into<String>) {
        self.inner.state.lock().unwrap().log_device = tag.into();
    }

    /// Whether the worker thread is still servicing the queue. `false`
    /// once shutdown has begun, independent of `is_connected` — a queue
    /// can be running but disconnected (mid-reconnect), but never
    /// connected while not running.
    pub fn is_running(&self) -> bool {
        !self.inner.state.lock().unwrap().shutting_down
    }

    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    pub fn is_in_transaction(&self) -> bool {
        self.inner.state.lock().unwrap().active_transaction.is_some()
    }

    pub fn stats(&self) -> Stats {
        let state = self.inner.state.lock().unwrap();
        Stats {
            processed: state.stats.processed,
            errors: state.stats.errors,
            reconnect_attempts: state.stats.reconnect_attempts,
            queued_high: state.queues.depth(Priority::High),
            queued_normal: state.queues.depth(Priority::Normal),
            queued_low: state.queues.depth(Priority::Low),
            connected: state.connection == ConnectionState::Connected,
            in_transaction: state.active_transaction.is_some(),
        }
    }

    /// Whether any pending command (queued, or a running transaction
    /// member) shares `sample`'s type.
    pub fn has_command_type(&self, sample: &A::Command) -> bool {
        let state = self.inner.state.lock().unwrap();
        let pending = state
            .commands
            .values()
            .any(|slot| !slot.state.is_terminal() && same_type(&slot.command, sample));
        if pending {
            return true;
        }
        state.transactions.values().any(|txn| {
            txn.members
                .iter()
                .any(|m| !m.state.is_terminal() && same_type(&m.command, sample))
        })
    }

    /// Borrow the adapter's context if currently connected. The
    /// reference is only valid for the duration of `f`; there is no way
    /// to hold it past that, since the worker thread may reconnect
    /// (tearing down and rebuilding the context) the moment this returns.
    pub fn with_device_context<R>(&self, f: impl FnOnce(&A::Context) -> R) -> Option<R> {
        if !self.is_connected() {
            return None;
        }
        let ctx = self.inner.context.lock().unwrap();
        Some(f(&ctx))
    }

    fn enqueue_single(
        &self,
        command: A::Command,
        priority: Priority,
        delivery: Delivery<A>,
    ) -> Result<CommandId, ErrorCode> {
        let mut state = self.inner.state.lock().unwrap();
        if state.shutting_down {
            return Err(ErrorCode::InvalidState);
        }
        let id = next_command_id();
        state.queues.push(priority, WorkItem::Single(id))?;
        state
            .commands
            .insert(id, CommandSlot::new(command, priority, delivery));
        drop(state);
        self.inner.not_empty.notify_one();
        Ok(id)
    }

    /// Enqueue `command` and block the calling thread until it reaches a
    /// terminal state or `timeout` elapses.
    ///
    /// On timeout: if the command was still `Queued`, it is cancelled
    /// and `Timeout` is returned immediately. If it was already
    /// `Running`, this waits a short bounded grace period for it to
    /// settle before giving up and abandoning it — the worker still
    /// finishes the command, but its result is discarded.
    pub fn command_blocking(
        &self,
        command: A::Command,
        priority: Priority,
        timeout: Duration,
    ) -> Result<A::Output, ErrorCode> {
        let id = self.enqueue_single(command, priority, Delivery::Blocking)?;
        let state = self.inner.state.lock().unwrap();

        let (mut state, wait) = self
            .inner
            .terminal
            .wait_timeout_while(state, timeout, |s| {
                s.commands
                    .get(&id)
                    .map(|c| !c.state.is_terminal())
                    .unwrap_or(false)
            })
            .expect("queue mutex poisoned");

        if wait.timed_out() {
            let still_queued = matches!(
                state.commands.get(&id).map(|c| c.state),
                Some(CommandState::Queued)
            );
            if still_queued {
                cancel_queued_locked(&mut state, id, CommandState::TimedOut, ErrorCode::Timeout);
            } else if matches!(
                state.commands.get(&id).map(|c| c.state),
                Some(CommandState::Running)
            ) {
                let (mut state2, wait2) = self
                    .inner
                    .terminal
                    .wait_timeout_while(state, crate::config::IN_FLIGHT_GRACE, |s| {
                        s.commands
                            .get(&id)
                            .map(|c| !c.state.is_terminal())
                            .unwrap_or(false)
                    })
                    .expect("queue mutex poisoned");
                if wait2.timed_out() {
                    if let Some(slot) = state2.commands.get_mut(&id) {
                        slot.abandoned = true;
                    }
                    return Err(ErrorCode::Timeout);
                }
                state = state2;
            }
        }

        let slot = state.commands.remove(&id).expect("slot removed twice");
        match slot.error_code {
            ErrorCode::Success => Ok(slot.output.unwrap_or_default()),
            other => Err(other),
        }
    }

    /// Enqueue `command` and return immediately. `callback` runs exactly
    /// once from the worker thread once the command reaches a terminal
    /// state. Returns `0` if the command could not be enqueued (e.g. the
    /// queue is full or shutting down).
    pub fn command_async<F>(&self, command: A::Command, priority: Priority, callback: F) -> CommandId
    where
        F: FnOnce(CommandId, Result<A::Output, ErrorCode>) + Send + 'static,
    {
        self.enqueue_single(command, priority, Delivery::Async(Box::new(callback)))
            .unwrap_or(0)
    }

    pub fn cancel_command(&self, id: CommandId) -> Result<(), ErrorCode> {
        let mut state = self.inner.state.lock().unwrap();
        match state.commands.get(&id).map(|c| c.state) {
            None => Err(ErrorCode::InvalidParameter),
            Some(CommandState::Queued) => {
                cancel_queued_locked(&mut state, id, CommandState::Cancelled, ErrorCode::Cancelled);
                drop(state);
                self.inner.terminal.notify_all();
                Ok(())
            }
            Some(CommandState::Running) => Err(ErrorCode::OperationFailed),
            Some(_) => Ok(()),
        }
    }

    /// Cancel every pending command whose type matches `sample`.
    /// Returns the number cancelled.
    pub fn cancel_by_type(&self, sample: &A::Command) -> usize {
        let mut state = self.inner.state.lock().unwrap();
        let ids: Vec<CommandId> = state
            .commands
            .iter()
            .filter(|(_, c)| c.state == CommandState::Queued && same_type(&c.command, sample))
            .map(|(id, _)| *id)
            .collect();
        for id in &ids {
            cancel_queued_locked(&mut state, *id, CommandState::Cancelled, ErrorCode::Cancelled);
        }
        let n = ids.len();
        drop(state);
        if n > 0 {
            self.inner.terminal.notify_all();
        }
        n
    }

    /// Cancel every pending command that has been sitting in the queue
    /// for at least `age`. Returns the number cancelled.
    pub fn cancel_by_age(&self, age: Duration) -> usize {
        let mut state = self.inner.state.lock().unwrap();
        let ids: Vec<CommandId> = state
            .commands
            .iter()
            .filter(|(_, c)| c.state == CommandState::Queued && c.enqueued_at.elapsed() >= age)
            .map(|(id, _)| *id)
            .collect();
        for id in &ids {
            cancel_queued_locked(&mut state, *id, CommandState::Cancelled, ErrorCode::Cancelled);
        }
        let n = ids.len();
        drop(state);
        if n > 0 {
            self.inner.terminal.notify_all();
        }
        n
    }

    /// Cancel every pending command. Returns the number cancelled.
    pub fn cancel_all(&self) -> usize {
        let mut state = self.inner.state.lock().unwrap();
        let ids: Vec<CommandId> = state
            .commands
            .iter()
            .filter(|(_, c)| c.state == CommandState::Queued)
            .map(|(id, _)| *id)
            .collect();
        for id in &ids {
            cancel_queued_locked(&mut state, *id, CommandState::Cancelled, ErrorCode::Cancelled);
        }
        let n = ids.len();
        drop(state);
        if n > 0 {
            self.inner.terminal.notify_all();
        }
        n
    }

    /// Open a new transaction. Commands are added with
    /// `add_to_transaction` and the whole thing starts executing only
    /// after `commit_transaction`.
    pub fn begin_transaction(&self) -> TransactionHandle {
        let handle = next_transaction_handle();
        let mut state = self.inner.state.lock().unwrap();
        state.transactions.insert(handle, TransactionEntry::new());
        handle
    }

    pub fn add_to_transaction(
        &self,
        handle: TransactionHandle,
        command: A::Command,
    ) -> Result<(), ErrorCode> {
        let mut state = self.inner.state.lock().unwrap();
        let limit = self.inner.config.max_transaction_commands;
        let txn = state
            .transactions
            .get_mut(&handle)
            .ok_or(ErrorCode::InvalidParameter)?;
        if txn.state != TransactionState::Building {
            return Err(ErrorCode::InvalidState);
        }
        if txn.members.len() >= limit {
            return Err(ErrorCode::InvalidParameter);
        }
        txn.members.push(TransactionMember {
            command,
            state: CommandState::Queued,
            output: None,
            error_code: ErrorCode::Success,
        });
        Ok(())
    }

    pub fn set_transaction_priority(
        &self,
        handle: TransactionHandle,
        priority: Priority,
    ) -> Result<(), ErrorCode> {
        let mut state = self.inner.state.lock().unwrap();
        let txn = state
            .transactions
            .get_mut(&handle)
            .ok_or(ErrorCode::InvalidParameter)?;
        if txn.state != TransactionState::Building {
            return Err(ErrorCode::InvalidState);
        }
        txn.priority = priority;
        Ok(())
    }

    pub fn set_transaction_flags(
        &self,
        handle: TransactionHandle,
        flags: TransactionFlags,
    ) -> Result<(), ErrorCode> {
        let mut state = self.inner.state.lock().unwrap();
        let txn = state
            .transactions
            .get_mut(&handle)
            .ok_or(ErrorCode::InvalidParameter)?;
        if txn.state != TransactionState::Building {
            return Err(ErrorCode::InvalidState);
        }
        txn.flags = flags;
        Ok(())
    }

    pub fn set_transaction_timeout(
        &self,
        handle: TransactionHandle,
        timeout: Duration,
    ) -> Result<(), ErrorCode> {
        let mut state = self.inner.state.lock().unwrap();
        let txn = state
            .transactions
            .get_mut(&handle)
            .ok_or(ErrorCode::InvalidParameter)?;
        if txn.state != TransactionState::Building {
            return Err(ErrorCode::InvalidState);
        }
        txn.deadline = Some(Instant::now() + timeout);
        Ok(())
    }

    /// Commit the transaction: from this point it is immutable and
    /// scheduled into its priority lane as a single atomic unit of work.
    /// `callback` runs exactly once, from the worker thread, once every
    /// member has run or been skipped.
    pub fn commit_transaction<F>(&self, handle: TransactionHandle, callback: F) -> Result<(), ErrorCode>
    where
        F: FnOnce(
                TransactionHandle,
                usize,
                usize,
                Vec<TransactionOutcome<A::Output>>,
            ) + Send
            + 'static,
    {
        let mut state = self.inner.state.lock().unwrap();
        if state.shutting_down {
            return Err(ErrorCode::InvalidState);
        }
        let priority = {
            let txn = state
                .transactions
                .get_mut(&handle)
                .ok_or(ErrorCode::InvalidParameter)?;
            if txn.state != TransactionState::Building {
                return Err(ErrorCode::InvalidState);
            }
            if txn.members.is_empty() {
                return Err(ErrorCode::InvalidState);
            }
            txn.state = TransactionState::Committed;
            txn.callback = Some(Box::new(callback));
            txn.priority
        };
        if let Err(e) = state.queues.push(priority, WorkItem::Transaction(handle)) {
            let txn = state.transactions.get_mut(&handle).unwrap();
            txn.state = TransactionState::Building;
            txn.callback = None;
            return Err(e);
        }
        drop(state);
        self.inner.not_empty.notify_one();
        Ok(())
    }

    /// Cancel a transaction. Before it starts executing this is a silent
    /// drop (no callback ever fires). Once it is executing, remaining
    /// members are marked `Cancelled` and the callback still fires with
    /// whatever ran so far.
    pub fn cancel_transaction(&self, handle: TransactionHandle) -> Result<(), ErrorCode> {
        let mut state = self.inner.state.lock().unwrap();
        let txn_state = match state.transactions.get(&handle) {
            Some(t) => t.state,
            None => return Err(ErrorCode::InvalidParameter),
        };
        match txn_state {
            TransactionState::Building | TransactionState::Committed => {
                state.queues.remove_transaction(handle);
                state.transactions.remove(&handle);
                Ok(())
            }
            TransactionState::Completing => {
                state.transactions.get_mut(&handle).unwrap().cancel_requested = true;
                Ok(())
            }
            TransactionState::Completed => Ok(()),
        }
    }
}

pub(crate) fn cancel_queued_locked<A: DeviceAdapter>(
    state: &mut QueueState<A>,
    id: CommandId,
    terminal_state: CommandState,
    error_code: ErrorCode,
) {
    state.queues.remove_single(id);
    if let Some(slot) = state.commands.get_mut(&id) {
        slot.state = terminal_state;
        slot.error_code = error_code;
    }
}

impl<A: DeviceAdapter> Drop for QueueManager<A> {
    fn drop(&mut self) {
        {
            let mut state = self.inner.state.lock().unwrap();
            state.shutting_down = true;
        }
        self.inner.not_empty.notify_all();
        self.inner.terminal.notify_all();
        if let Some(handle) = self.worker.lock().unwrap().take() {
            info!(device = %self.inner.adapter.display_name(), "stopping queue worker");
            let _ = handle.join();
        }
    }
}
