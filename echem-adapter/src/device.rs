use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use queue_core::{
    run_to_completion, AdapterError, CommandOutcome, DeviceAdapter, ErrorCode, TechniqueOutcome,
    TechniqueProgress,
};
use tracing::{debug, info, warn};

use crate::error::EchemError;
use crate::technique::{ChronoamperometrySession, CyclicVoltammetrySession};

/// Caller-supplied hook invoked after every poll of a long-running
/// technique, letting a caller observe a sweep mid-run instead of only
/// seeing the final (or partial) result.
pub type ProgressCallback = Arc<dyn Fn(TechniqueProgress) + Send + Sync>;

#[derive(Clone)]
pub enum EchemCommand {
    RunCyclicVoltammetry {
        start_v: f32,
        vertex_v: f32,
        scan_rate: f32,
        on_progress: Option<ProgressCallback>,
    },
    RunChronoamperometry {
        potential_v: f32,
        duration_s: f32,
        on_progress: Option<ProgressCallback>,
    },
    ReadOpenCircuitVoltage,
    Stop,
}

impl fmt::Debug for EchemCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EchemCommand::RunCyclicVoltammetry { start_v, vertex_v, scan_rate, .. } => f
                .debug_struct("RunCyclicVoltammetry")
                .field("start_v", start_v)
                .field("vertex_v", vertex_v)
                .field("scan_rate", scan_rate)
                .finish(),
            EchemCommand::RunChronoamperometry { potential_v, duration_s, .. } => f
                .debug_struct("RunChronoamperometry")
                .field("potential_v", potential_v)
                .field("duration_s", duration_s)
                .finish(),
            EchemCommand::ReadOpenCircuitVoltage => write!(f, "ReadOpenCircuitVoltage"),
            EchemCommand::Stop => write!(f, "Stop"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EchemOutput {
    pub points: Vec<(f32, f32)>,
    pub open_circuit_voltage: Option<f32>,
    /// Set when a technique errored partway through but recovered data
    /// collected before the fault; callers still get `Ok`, with this
    /// flag standing in for the queue's `PartialData` outcome.
    pub partial: bool,
}

#[derive(Debug, Clone, Default)]
pub struct EchemConnectParams {
    pub address: String,
}

#[derive(Debug, Default)]
pub struct EchemContext {
    connected: bool,
}

#[derive(Debug, Default)]
pub struct EchemAdapter;

impl DeviceAdapter for EchemAdapter {
    type Context = EchemContext;
    type ConnectParams = EchemConnectParams;
    type Command = EchemCommand;
    type Output = EchemOutput;

    fn display_name(&self) -> &'static str {
        "echem-analyzer"
    }

    fn connect(&self, ctx: &mut EchemContext, params: &EchemConnectParams) -> Result<(), AdapterError> {
        info!(address = params.address, "analyzer connected");
        ctx.connected = true;
        Ok(())
    }

    fn disconnect(&self, ctx: &mut EchemContext) {
        debug!("analyzer disconnected");
        ctx.connected = false;
    }

    fn test_connection(&self, ctx: &mut EchemContext) -> Result<(), AdapterError> {
        if ctx.connected {
            Ok(())
        } else {
            Err(EchemError::NotConnected.into())
        }
    }

    fn is_connected(&self, ctx: &EchemContext) -> bool {
        ctx.connected
    }

    fn execute(&self, ctx: &mut EchemContext, cmd: &EchemCommand) -> CommandOutcome<EchemOutput> {
        if !ctx.connected {
            return Err(EchemError::NotConnected.into());
        }
        match cmd {
            EchemCommand::ReadOpenCircuitVoltage => {
                let mut rng = rand::thread_rng();
                let voltage = 0.05 + rng.gen_range(-0.01..0.01);
                debug!(voltage, "read open circuit voltage");
                Ok(EchemOutput {
                    open_circuit_voltage: Some(voltage),
                    ..Default::default()
                })
            }
            EchemCommand::Stop => Ok(EchemOutput::default()),
            EchemCommand::RunCyclicVoltammetry {
                start_v,
                vertex_v,
                scan_rate,
                on_progress,
            } => {
                info!(start_v, vertex_v, scan_rate, "starting cyclic voltammetry sweep");
                let session = CyclicVoltammetrySession::new(*start_v, *vertex_v, *scan_rate);
                let on_progress = on_progress.clone();
                let outcome = run_to_completion(session, Duration::from_millis(5), |progress| {
                    debug!(poll_count = progress.poll_count, ?progress.status, "sweep progress");
                    if let Some(cb) = &on_progress {
                        cb(progress);
                    }
                });
                finish(outcome)
            }
            EchemCommand::RunChronoamperometry {
                potential_v,
                duration_s,
                on_progress,
            } => {
                info!(potential_v, duration_s, "starting chronoamperometry run");
                let session = ChronoamperometrySession::new(*potential_v, *duration_s);
                let on_progress = on_progress.clone();
                let outcome = run_to_completion(session, Duration::from_millis(5), |progress| {
                    debug!(poll_count = progress.poll_count, ?progress.status, "run progress");
                    if let Some(cb) = &on_progress {
                        cb(progress);
                    }
                });
                finish(outcome)
            }
        }
    }

    fn command_name(&self, cmd: &EchemCommand) -> &'static str {
        match cmd {
            EchemCommand::RunCyclicVoltammetry { .. } => "run_cyclic_voltammetry",
            EchemCommand::RunChronoamperometry { .. } => "run_chronoamperometry",
            EchemCommand::ReadOpenCircuitVoltage => "read_open_circuit_voltage",
            EchemCommand::Stop => "stop",
        }
    }
}

fn finish(outcome: TechniqueOutcome<Vec<(f32, f32)>>) -> CommandOutcome<EchemOutput> {
    match outcome.error_code {
        ErrorCode::Success => {
            let points = outcome.data.unwrap_or_default();
            info!(point_count = points.len(), "technique completed");
            Ok(EchemOutput {
                points,
                open_circuit_voltage: None,
                partial: false,
            })
        }
        ErrorCode::PartialData => {
            let points = outcome.data.unwrap_or_default();
            warn!(point_count = points.len(), error = ?outcome.message, "technique faulted, recovered partial data");
            Ok(EchemOutput {
                points,
                open_circuit_voltage: None,
                partial: true,
            })
        }
        _ => {
            warn!(error = ?outcome.message, "technique failed with no recoverable data");
            Err(EchemError::SimulatedFault(
                outcome.message.unwrap_or_else(|| "technique failed".into()),
            )
            .into())
        }
    }
}
