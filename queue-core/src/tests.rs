use std::time::Duration;

use crate::command::{same_type, CommandState};
use crate::config::QueueConfig;
use crate::error::ErrorCode;
use crate::pqueue::{PriorityQueues, WorkItem};
use crate::Priority;

#[test]
fn command_state_terminal_classification() {
    assert!(!CommandState::Queued.is_terminal());
    assert!(!CommandState::Running.is_terminal());
    assert!(CommandState::Completed.is_terminal());
    assert!(CommandState::Failed.is_terminal());
    assert!(CommandState::Cancelled.is_terminal());
    assert!(CommandState::TimedOut.is_terminal());
}

#[test]
fn priority_ordering_is_high_normal_low() {
    assert!(Priority::High > Priority::Normal);
    assert!(Priority::Normal > Priority::Low);
}

#[test]
fn error_code_display_matches_get_error_string_role() {
    assert_eq!(ErrorCode::Success.to_string(), "success");
    assert_eq!(ErrorCode::QueueFull.to_string(), "priority queue is full");
}

#[test]
fn same_type_ignores_payload() {
    #[derive(Debug)]
    enum Cmd {
        A(i32),
        B,
    }
    assert!(same_type(&Cmd::A(1), &Cmd::A(2)));
    assert!(!same_type(&Cmd::A(1), &Cmd::B));
}

#[test]
fn pqueue_drains_high_before_normal_before_low() {
    let config = QueueConfig::default();
    let mut queues = PriorityQueues::new(&config);
    queues.push(Priority::Low, WorkItem::Single(1)).unwrap();
    queues.push(Priority::Normal, WorkItem::Single(2)).unwrap();
    queues.push(Priority::High, WorkItem::Single(3)).unwrap();
    queues.push(Priority::Normal, WorkItem::Single(4)).unwrap();

    assert_eq!(queues.pop_highest(), Some(WorkItem::Single(3)));
    assert_eq!(queues.pop_highest(), Some(WorkItem::Single(2)));
    assert_eq!(queues.pop_highest(), Some(WorkItem::Single(4)));
    assert_eq!(queues.pop_highest(), Some(WorkItem::Single(1)));
    assert_eq!(queues.pop_highest(), None);
}

#[test]
fn pqueue_rejects_past_capacity() {
    let mut config = QueueConfig::default();
    config.low_capacity = 1;
    let mut queues = PriorityQueues::new(&config);
    queues.push(Priority::Low, WorkItem::Single(1)).unwrap();
    assert_eq!(queues.push(Priority::Low, WorkItem::Single(2)), Err(ErrorCode::QueueFull));
}

#[test]
fn pqueue_remove_single_is_idempotent() {
    let config = QueueConfig::default();
    let mut queues = PriorityQueues::new(&config);
    queues.push(Priority::Normal, WorkItem::Single(5)).unwrap();
    assert!(queues.remove_single(5));
    assert!(!queues.remove_single(5));
}

#[test]
fn technique_run_to_completion_recovers_partial_data_on_error() {
    use crate::technique::{run_to_completion, TechniqueSession, TechniqueStatus};

    struct FlakySession {
        polls: u32,
    }
    impl TechniqueSession for FlakySession {
        type Data = Vec<i32>;
        fn poll(&mut self) -> TechniqueStatus {
            self.polls += 1;
            if self.polls < 3 {
                TechniqueStatus::Running
            } else {
                TechniqueStatus::Error
            }
        }
        fn take_data(&mut self) -> Option<Vec<i32>> {
            None
        }
        fn take_partial_data(&mut self) -> Option<Vec<i32>> {
            Some(vec![1, 2])
        }
        fn last_error(&self) -> String {
            "simulated fault".into()
        }
    }

    let outcome = run_to_completion(FlakySession { polls: 0 }, Duration::from_millis(1), |_| {});
    assert_eq!(outcome.error_code, ErrorCode::PartialData);
    assert_eq!(outcome.data, Some(vec![1, 2]));
}
