#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use queue_core::{AdapterError, CommandOutcome, DeviceAdapter};

#[derive(Debug, Clone, PartialEq)]
pub enum MockCommand {
    Ping,
    Echo(i32),
    Slow(Duration),
    Fail,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockOutput(pub i32);

pub struct MockContext {
    pub connected: bool,
}

#[derive(Debug, Default)]
pub struct MockConfig {
    pub fail_connect: bool,
    pub fail_next_executes: usize,
}

pub struct MockAdapter {
    pub config: Arc<Mutex<MockConfig>>,
    pub log: Arc<Mutex<Vec<String>>>,
}

impl MockAdapter {
    pub fn new() -> (Self, Arc<Mutex<MockConfig>>) {
        let config = Arc::new(Mutex::new(MockConfig::default()));
        let log = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                config: Arc::clone(&config),
                log,
            },
            config,
        )
    }

    pub fn context() -> MockContext {
        MockContext { connected: false }
    }

    pub fn executed(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl DeviceAdapter for MockAdapter {
    type Context = MockContext;
    type ConnectParams = ();
    type Command = MockCommand;
    type Output = MockOutput;

    fn display_name(&self) -> &'static str {
        "mock-instrument"
    }

    fn connect(&self, ctx: &mut MockContext, _params: &()) -> Result<(), AdapterError> {
        if self.config.lock().unwrap().fail_connect {
            Err(AdapterError::CommFailed("mock connect failure".into()))
        } else {
            ctx.connected = true;
            Ok(())
        }
    }

    fn disconnect(&self, ctx: &mut MockContext) {
        ctx.connected = false;
    }

    fn test_connection(&self, ctx: &mut MockContext) -> Result<(), AdapterError> {
        if ctx.connected {
            Ok(())
        } else {
            Err(AdapterError::CommFailed("mock link down".into()))
        }
    }

    fn is_connected(&self, ctx: &MockContext) -> bool {
        ctx.connected
    }

    fn execute(&self, _ctx: &mut MockContext, cmd: &MockCommand) -> CommandOutcome<MockOutput> {
        self.log.lock().unwrap().push(format!("{cmd:?}"));

        let mut cfg = self.config.lock().unwrap();
        if cfg.fail_next_executes > 0 {
            cfg.fail_next_executes -= 1;
            return Err(AdapterError::CommFailed("mock forced transport failure".into()));
        }
        drop(cfg);

        match cmd {
            MockCommand::Ping => Ok(MockOutput(0)),
            MockCommand::Echo(v) => Ok(MockOutput(*v)),
            MockCommand::Slow(d) => {
                thread::sleep(*d);
                Ok(MockOutput(0))
            }
            MockCommand::Fail => Err(AdapterError::OperationFailed("mock command failure".into())),
        }
    }

    fn command_name(&self, cmd: &MockCommand) -> &'static str {
        match cmd {
            MockCommand::Ping => "ping",
            MockCommand::Echo(_) => "echo",
            MockCommand::Slow(_) => "slow",
            MockCommand::Fail => "fail",
        }
    }
}
