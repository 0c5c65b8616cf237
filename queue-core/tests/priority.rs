mod common;

use std::sync::mpsc;
use std::time::Duration;

use queue_core::{Priority, QueueConfig, QueueManager};

use common::{MockAdapter, MockCommand};

/// High drains ahead of Normal and Low even when all three are queued at
/// once behind a single in-flight command holding the worker busy.
#[test]
fn strict_priority_order() {
    let (adapter, _cfg) = MockAdapter::new();
    let manager = QueueManager::start(adapter, MockAdapter::context(), (), QueueConfig::default());

    // Occupy the worker so the three below land in the queue together.
    let (tx, rx) = mpsc::channel();
    manager.command_async(MockCommand::Slow(Duration::from_millis(150)), Priority::Normal, {
        let tx = tx.clone();
        move |_, result| {
            let _ = tx.send(("hold", result));
        }
    });
    std::thread::sleep(Duration::from_millis(20));

    let order = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    for (label, priority) in [("low", Priority::Low), ("normal", Priority::Normal), ("high", Priority::High)] {
        let order = std::sync::Arc::clone(&order);
        manager.command_async(MockCommand::Echo(0), priority, move |_, _| {
            order.lock().unwrap().push(label);
        });
    }

    rx.recv_timeout(Duration::from_secs(2)).unwrap();
    std::thread::sleep(Duration::from_millis(200));

    let observed = order.lock().unwrap().clone();
    assert_eq!(observed, vec!["high", "normal", "low"]);
}

#[test]
fn queue_full_rejects_beyond_capacity() {
    let (adapter, _cfg) = MockAdapter::new();
    let mut config = QueueConfig::default();
    config.low_capacity = 1;
    let manager = QueueManager::start(adapter, MockAdapter::context(), (), config);

    // Hold the worker so the lane actually fills up.
    manager.command_async(MockCommand::Slow(Duration::from_millis(200)), Priority::High, |_, _| {});
    std::thread::sleep(Duration::from_millis(20));

    let first = manager.command_async(MockCommand::Echo(1), Priority::Low, |_, _| {});
    assert_ne!(first, 0);
    let second = manager.command_async(MockCommand::Echo(2), Priority::Low, |_, _| {});
    assert_eq!(second, 0, "second low-priority enqueue should have been rejected as QueueFull");
}
