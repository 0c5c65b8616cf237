//! The dedicated worker thread: the only place an adapter's `Context` is
//! ever touched. Owns the connection lifecycle, drains the priority
//! queues, runs transactions atomically, and reconnects with backoff
//! after a transport failure.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::adapter::DeviceAdapter;
use crate::command::{CommandState, Delivery};
use crate::config::WORKER_POLL_INTERVAL;
use crate::error::{AdapterError, ErrorCode};
use crate::manager::{ConnectionState, Inner};
use crate::pqueue::WorkItem;
use crate::transaction::{TransactionOutcome, TransactionState};

pub(crate) fn run<A: DeviceAdapter>(inner: Arc<Inner<A>>) {
    let device = inner.adapter.display_name();
    attempt_connect(&inner, device);

    let mut backoff = inner.config.reconnect_initial_backoff;

    loop {
        if inner.state.lock().unwrap().shutting_down {
            break;
        }

        let connected = inner.is_connected();
        if !connected {
            if sleep_interruptibly(&inner, backoff) {
                break;
            }
            inner.state.lock().unwrap().stats.reconnect_attempts += 1;
            let ok = {
                let mut ctx = inner.context.lock().unwrap();
                inner.adapter.connect(&mut ctx, &inner.connect_params).is_ok()
            };
            if ok {
                set_connection(&inner, ConnectionState::Connected);
                info_reconnected(device);
                backoff = inner.config.reconnect_initial_backoff;
            } else {
                backoff = (backoff * 2).min(inner.config.reconnect_max_backoff);
            }
            continue;
        }

        let item = {
            let state = inner.state.lock().unwrap();
            let (mut state, _) = inner
                .not_empty
                .wait_timeout_while(state, WORKER_POLL_INTERVAL, |s| {
                    !s.shutting_down && s.queues.is_empty()
                })
                .expect("queue mutex poisoned");
            if state.shutting_down {
                None
            } else {
                state.queues.pop_highest()
            }
        };

        match item {
            Some(WorkItem::Single(id)) => execute_single(&inner, id),
            Some(WorkItem::Transaction(handle)) => execute_transaction(&inner, handle),
            None => {}
        }
    }

    drain_on_shutdown(&inner);
    let mut ctx = inner.context.lock().unwrap();
    inner.adapter.disconnect(&mut ctx);
}

fn attempt_connect<A: DeviceAdapter>(inner: &Arc<Inner<A>>, device: &str) {
    let result = {
        let mut ctx = inner.context.lock().unwrap();
        inner.adapter.connect(&mut ctx, &inner.connect_params)
    };
    match result {
        Ok(()) => {
            set_connection(inner, ConnectionState::Connected);
            debug!(device, "initial connect succeeded");
        }
        Err(e) => {
            set_connection(inner, ConnectionState::Disconnected);
            warn!(device, error = %e, "initial connect failed, will retry");
        }
    }
}

fn info_reconnected(device: &str) {
    tracing::info!(device, "reconnected");
}

/// Sleep up to `duration`, waking early and returning `true` if shutdown
/// is requested in the meantime.
fn sleep_interruptibly<A: DeviceAdapter>(inner: &Arc<Inner<A>>, duration: Duration) -> bool {
    let state = inner.state.lock().unwrap();
    let (state, _) = inner
        .not_empty
        .wait_timeout_while(state, duration, |s| !s.shutting_down)
        .expect("queue mutex poisoned");
    state.shutting_down
}

fn set_connection<A: DeviceAdapter>(inner: &Inner<A>, new_state: ConnectionState) {
    inner.state.lock().unwrap().connection = new_state;
}

fn maybe_handle_transport_error<A: DeviceAdapter>(inner: &Inner<A>, err: &AdapterError) {
    if !err.is_transport_suspect() {
        return;
    }
    let still_alive = {
        let mut ctx = inner.context.lock().unwrap();
        inner.adapter.test_connection(&mut ctx).is_ok()
    };
    if !still_alive {
        let device = inner.adapter.display_name();
        warn!(device, "connection test failed after command error, disconnecting");
        let mut ctx = inner.context.lock().unwrap();
        inner.adapter.disconnect(&mut ctx);
        drop(ctx);
        set_connection(inner, ConnectionState::Disconnected);
    }
}

fn execute_single<A: DeviceAdapter>(inner: &Arc<Inner<A>>, id: crate::command::CommandId) {
    let command = {
        let mut state = inner.state.lock().unwrap();
        match state.commands.get_mut(&id) {
            Some(slot) if slot.state == CommandState::Queued => {
                slot.state = CommandState::Running;
                slot.command.clone()
            }
            _ => return,
        }
    };

    let name = inner.adapter.command_name(&command);
    let delay = inner.adapter.command_delay(&command);
    debug!(device = %inner.log_device(), command = name, "executing command");

    let outcome = {
        let mut ctx = inner.context.lock().unwrap();
        inner.adapter.execute(&mut ctx, &command)
    };

    if let Err(e) = &outcome {
        maybe_handle_transport_error(inner, e);
    }
    if delay > Duration::ZERO {
        thread::sleep(delay);
    }

    complete_single(inner, id, outcome);
}

fn complete_single<A: DeviceAdapter>(
    inner: &Arc<Inner<A>>,
    id: crate::command::CommandId,
    outcome: crate::error::CommandOutcome<A::Output>,
) {
    let (delivery, error_code, output) = {
        let mut state = inner.state.lock().unwrap();
        let Some(slot) = state.commands.get_mut(&id) else {
            return;
        };
        let (code, output) = match outcome {
            Ok(o) => {
                state.stats.processed += 1;
                (ErrorCode::Success, Some(o))
            }
            Err(e) => {
                state.stats.errors += 1;
                (e.code(), None)
            }
        };
        slot.error_code = code;
        slot.output = output.clone();
        slot.state = if code == ErrorCode::Success {
            CommandState::Completed
        } else {
            CommandState::Failed
        };
        let abandoned = slot.abandoned;
        let delivery = std::mem::replace(&mut slot.delivery, Delivery::Blocking);
        if matches!(delivery, Delivery::Async(_)) || abandoned {
            state.commands.remove(&id);
        }
        (delivery, code, output)
    };

    match delivery {
        Delivery::Blocking => {
            inner.terminal.notify_all();
        }
        Delivery::Async(cb) => {
            let result = if error_code == ErrorCode::Success {
                Ok(output.expect("success outcome without output"))
            } else {
                Err(error_code)
            };
            cb(id, result);
        }
    }
}

fn execute_transaction<A: DeviceAdapter>(inner: &Arc<Inner<A>>, handle: crate::transaction::TransactionHandle) {
    let member_count = {
        let mut state = inner.state.lock().unwrap();
        let Some(txn) = state.transactions.get_mut(&handle) else {
            return;
        };
        txn.state = TransactionState::Completing;
        state.active_transaction = Some(handle);
        txn.members.len()
    };

    let mut aborted = false;

    for index in 0..member_count {
        let command = {
            let mut state = inner.state.lock().unwrap();
            let shutting_down = state.shutting_down;
            let txn = state.transactions.get_mut(&handle).unwrap();
            let past_deadline = txn
                .deadline
                .map(|d| Instant::now() >= d)
                .unwrap_or(false);

            if txn.cancel_requested || aborted || shutting_down {
                txn.members[index].state = CommandState::Cancelled;
                txn.members[index].error_code = ErrorCode::Cancelled;
                None
            } else if past_deadline {
                txn.members[index].state = CommandState::TimedOut;
                txn.members[index].error_code = ErrorCode::Timeout;
                None
            } else {
                txn.members[index].state = CommandState::Running;
                Some(txn.members[index].command.clone())
            }
        };

        let Some(command) = command else { continue };

        let name = inner.adapter.command_name(&command);
        let delay = inner.adapter.command_delay(&command);
        debug!(device = %inner.log_device(), command = name, transaction = handle, "executing transaction member");

        let outcome = {
            let mut ctx = inner.context.lock().unwrap();
            inner.adapter.execute(&mut ctx, &command)
        };
        if let Err(e) = &outcome {
            maybe_handle_transport_error(inner, e);
        }

        {
            let mut state = inner.state.lock().unwrap();
            let txn = state.transactions.get_mut(&handle).unwrap();
            match outcome {
                Ok(out) => {
                    txn.members[index].output = Some(out);
                    txn.members[index].error_code = ErrorCode::Success;
                    txn.members[index].state = CommandState::Completed;
                    state.stats.processed += 1;
                }
                Err(e) => {
                    txn.members[index].error_code = e.code();
                    txn.members[index].state = CommandState::Failed;
                    state.stats.errors += 1;
                    if txn.flags.abort_on_error {
                        aborted = true;
                    }
                }
            }
        }

        if delay > Duration::ZERO {
            thread::sleep(delay);
        }
    }

    let (success, failed, outcomes, callback) = {
        let mut state = inner.state.lock().unwrap();
        state.active_transaction = None;
        let mut txn = state.transactions.remove(&handle).unwrap();
        let mut success = 0usize;
        let mut failed = 0usize;
        let outcomes: Vec<_> = txn
            .members
            .drain(..)
            .enumerate()
            .map(|(index, m)| {
                if m.error_code == ErrorCode::Success {
                    success += 1;
                } else {
                    failed += 1;
                }
                TransactionOutcome {
                    index,
                    output: m.output,
                    error: m.error_code,
                }
            })
            .collect();
        txn.state = TransactionState::Completed;
        (success, failed, outcomes, txn.callback.take())
    };

    if let Some(cb) = callback {
        cb(handle, success, failed, outcomes);
    }
}

/// Called once, just before the worker exits: cancels everything still
/// waiting, waking blocking callers and firing async callbacks with
/// `Cancelled`. Transactions that never started execution are dropped
/// silently, matching the pre-execution cancel contract.
fn drain_on_shutdown<A: DeviceAdapter>(inner: &Arc<Inner<A>>) {
    let mut async_callbacks = Vec::new();
    {
        let mut state = inner.state.lock().unwrap();

        let queued: Vec<_> = state
            .commands
            .iter()
            .filter(|(_, c)| c.state == CommandState::Queued)
            .map(|(id, _)| *id)
            .collect();
        for id in &queued {
            state.queues.remove_single(*id);
            if let Some(slot) = state.commands.get_mut(id) {
                slot.state = CommandState::Cancelled;
                slot.error_code = ErrorCode::Cancelled;
            }
        }

        let async_ids: Vec<_> = state
            .commands
            .iter()
            .filter(|(_, c)| c.state == CommandState::Cancelled && matches!(c.delivery, Delivery::Async(_)))
            .map(|(id, _)| *id)
            .collect();
        for id in async_ids {
            if let Some(slot) = state.commands.remove(&id) {
                if let Delivery::Async(cb) = slot.delivery {
                    async_callbacks.push((id, cb));
                }
            }
        }

        let txn_ids: Vec<_> = state
            .transactions
            .iter()
            .filter(|(_, t)| matches!(t.state, TransactionState::Building | TransactionState::Committed))
            .map(|(h, _)| *h)
            .collect();
        for handle in txn_ids {
            state.queues.remove_transaction(handle);
            state.transactions.remove(&handle);
        }
    }

    inner.terminal.notify_all();
    for (id, cb) in async_callbacks {
        cb(id, Err(ErrorCode::Cancelled));
    }

    tracing::info!(device = %inner.adapter.display_name(), "worker shut down");
}
