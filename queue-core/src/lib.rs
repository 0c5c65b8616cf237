//! Thread-safe, priority-ordered, cancellable, transactional command
//! queue for slow, stateful laboratory instruments.
//!
//! A [`QueueManager`] owns one dedicated worker thread per instrument.
//! Callers enqueue [`adapter::DeviceAdapter::Command`] values at one of
//! three strict priorities, either blocking for the result
//! ([`QueueManager::command_blocking`]) or receiving it through a
//! callback ([`QueueManager::command_async`]). Groups of commands can be
//! committed as one atomic [transaction](transaction), and any pending
//! command can be cancelled by id, type, or age.

mod adapter;
mod command;
mod config;
mod error;
mod manager;
mod pqueue;
mod stats;
mod technique;
mod transaction;
mod worker;

pub use adapter::DeviceAdapter;
pub use command::{same_type, CommandId, CommandState, Priority};
pub use config::{QueueConfig, DEFAULT_MAX_TRANSACTION_COMMANDS};
pub use error::{AdapterError, CommandOutcome, ErrorCode};
pub use manager::QueueManager;
pub use stats::Stats;
pub use technique::{run_to_completion, TechniqueOutcome, TechniqueProgress, TechniqueSession, TechniqueStatus};
pub use transaction::{TransactionFlags, TransactionHandle, TransactionOutcome};

#[cfg(test)]
mod tests;
