mod common;

use std::time::Duration;

use queue_core::{Priority, QueueConfig, QueueManager};

use common::{MockAdapter, MockCommand};

#[test]
fn worker_reconnects_after_initial_connect_failure() {
    let (adapter, cfg) = MockAdapter::new();
    cfg.lock().unwrap().fail_connect = true;

    let mut config = QueueConfig::default();
    config.reconnect_initial_backoff = Duration::from_millis(20);
    config.reconnect_max_backoff = Duration::from_millis(50);
    let manager = QueueManager::start(adapter, MockAdapter::context(), (), config);

    std::thread::sleep(Duration::from_millis(60));
    assert!(!manager.is_connected());

    cfg.lock().unwrap().fail_connect = false;
    std::thread::sleep(Duration::from_millis(150));
    assert!(manager.is_connected());
    assert!(manager.stats().reconnect_attempts >= 1);
}

#[test]
fn command_succeeds_once_reconnected() {
    let (adapter, cfg) = MockAdapter::new();
    cfg.lock().unwrap().fail_connect = true;
    let mut config = QueueConfig::default();
    config.reconnect_initial_backoff = Duration::from_millis(10);
    config.reconnect_max_backoff = Duration::from_millis(30);
    let manager = QueueManager::start(adapter, MockAdapter::context(), (), config);

    std::thread::sleep(Duration::from_millis(30));
    cfg.lock().unwrap().fail_connect = false;
    std::thread::sleep(Duration::from_millis(100));

    let result = manager.command_blocking(MockCommand::Echo(7), Priority::Normal, Duration::from_secs(2));
    assert_eq!(result.unwrap().0, 7);
}
