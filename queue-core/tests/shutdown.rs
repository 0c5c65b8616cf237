mod common;

use std::sync::mpsc;
use std::time::Duration;

use queue_core::{ErrorCode, Priority, QueueConfig, QueueManager};

use common::{MockAdapter, MockCommand};

#[test]
fn dropping_the_queue_cancels_pending_async_commands() {
    let (adapter, _cfg) = MockAdapter::new();
    let manager = QueueManager::start(adapter, MockAdapter::context(), (), QueueConfig::default());

    // Occupy the worker, then queue one behind it, then drop the manager
    // before the second command ever gets a chance to run.
    manager.command_async(MockCommand::Slow(Duration::from_millis(300)), Priority::High, |_, _| {});
    std::thread::sleep(Duration::from_millis(20));

    let (tx, rx) = mpsc::channel();
    manager.command_async(MockCommand::Echo(1), Priority::Normal, move |_, result| {
        let _ = tx.send(result);
    });

    drop(manager);

    let result = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(result, Err(ErrorCode::Cancelled));
}

#[test]
fn is_running_reflects_queue_lifetime() {
    let (adapter, _cfg) = MockAdapter::new();
    let manager = QueueManager::start(adapter, MockAdapter::context(), (), QueueConfig::default());
    assert!(manager.is_running());

    let enqueued = manager.command_blocking(MockCommand::Ping, Priority::Normal, Duration::from_secs(2));
    assert!(enqueued.is_ok());
    assert!(manager.is_running());
}

