mod common;

use std::time::Duration;

use queue_core::{ErrorCode, Priority, QueueConfig, QueueManager};

use common::{MockAdapter, MockCommand};

#[test]
fn cancel_queued_command_returns_cancelled_to_blocking_waiter() {
    let (adapter, _cfg) = MockAdapter::new();
    let manager = QueueManager::start(adapter, MockAdapter::context(), (), QueueConfig::default());

    // Keep the worker busy so the next command stays Queued.
    manager.command_async(MockCommand::Slow(Duration::from_millis(300)), Priority::High, |_, _| {});
    std::thread::sleep(Duration::from_millis(20));

    let id = manager.command_async(MockCommand::Echo(1), Priority::Normal, |_, _| {});
    assert_ne!(id, 0);
    assert!(manager.cancel_command(id).is_ok());
}

#[test]
fn cancel_running_command_fails() {
    let (adapter, _cfg) = MockAdapter::new();
    let manager = QueueManager::start(adapter, MockAdapter::context(), (), QueueConfig::default());

    let id = manager.command_async(MockCommand::Slow(Duration::from_millis(300)), Priority::Normal, |_, _| {});
    std::thread::sleep(Duration::from_millis(50));

    assert_eq!(manager.cancel_command(id), Err(ErrorCode::OperationFailed));
}

#[test]
fn cancel_unknown_id_is_invalid_parameter() {
    let (adapter, _cfg) = MockAdapter::new();
    let manager = QueueManager::start(adapter, MockAdapter::context(), (), QueueConfig::default());
    assert_eq!(manager.cancel_command(999_999), Err(ErrorCode::InvalidParameter));
}

#[test]
fn cancel_by_type_only_touches_matching_pending_commands() {
    let (adapter, _cfg) = MockAdapter::new();
    let manager = QueueManager::start(adapter, MockAdapter::context(), (), QueueConfig::default());

    manager.command_async(MockCommand::Slow(Duration::from_millis(300)), Priority::High, |_, _| {});
    std::thread::sleep(Duration::from_millis(20));

    manager.command_async(MockCommand::Echo(1), Priority::Normal, |_, _| {});
    manager.command_async(MockCommand::Echo(2), Priority::Normal, |_, _| {});
    manager.command_async(MockCommand::Ping, Priority::Normal, |_, _| {});

    let cancelled = manager.cancel_by_type(&MockCommand::Echo(0));
    assert_eq!(cancelled, 2);
}

#[test]
fn blocking_command_times_out_while_still_queued() {
    let (adapter, _cfg) = MockAdapter::new();
    let manager = QueueManager::start(adapter, MockAdapter::context(), (), QueueConfig::default());

    manager.command_async(MockCommand::Slow(Duration::from_millis(300)), Priority::High, |_, _| {});
    std::thread::sleep(Duration::from_millis(20));

    let result = manager.command_blocking(MockCommand::Echo(1), Priority::Normal, Duration::from_millis(50));
    assert_eq!(result, Err(ErrorCode::Timeout));
}
