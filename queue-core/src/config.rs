//! Tunables for one queue instance.

use std::time::Duration;

/// Default cap on commands accumulated inside one transaction before
/// `add_to_transaction` starts returning `InvalidParameter`.
pub const DEFAULT_MAX_TRANSACTION_COMMANDS: usize = 64;

/// How long a blocking caller keeps waiting for a `Running` command to
/// settle after its own deadline has already elapsed and the cancel
/// attempt found nothing left to cancel.
pub(crate) const IN_FLIGHT_GRACE: Duration = Duration::from_millis(500);

/// How often the worker re-checks shutdown/connection state while
/// otherwise idle on the not-empty condvar.
pub(crate) const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
    pub high_capacity: usize,
    pub normal_capacity: usize,
    pub low_capacity: usize,
    pub max_transaction_commands: usize,
    pub reconnect_initial_backoff: Duration,
    pub reconnect_max_backoff: Duration,
    pub default_command_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            high_capacity: 64,
            normal_capacity: 256,
            low_capacity: 256,
            max_transaction_commands: DEFAULT_MAX_TRANSACTION_COMMANDS,
            reconnect_initial_backoff: Duration::from_millis(250),
            reconnect_max_backoff: Duration::from_secs(10),
            default_command_timeout: Duration::from_secs(30),
        }
    }
}
