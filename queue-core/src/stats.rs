//! Runtime counters and the point-in-time snapshot exposed to callers.

#[derive(Debug, Default)]
pub(crate) struct StatsInner {
    pub processed: u64,
    pub errors: u64,
    pub reconnect_attempts: u64,
}

/// A snapshot of queue activity at the moment it was taken. Not live:
/// callers who need current depth should call `QueueManager::stats`
/// again rather than caching one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub processed: u64,
    pub errors: u64,
    pub reconnect_attempts: u64,
    pub queued_high: usize,
    pub queued_normal: usize,
    pub queued_low: usize,
    pub connected: bool,
    pub in_transaction: bool,
}
