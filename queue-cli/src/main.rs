use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};

use echem_adapter::{EchemAdapter, EchemCommand, EchemConnectParams, EchemContext};
use modbus_psu_adapter::{
    MeasurementChannel, PsuAdapter, PsuCommand, PsuConnectParams, PsuContext, ReadMeasurementParams,
    SetOutputParams, SetSetpointParams, SetpointChannel,
};
use queue_core::{Priority, QueueConfig, QueueManager};

#[derive(Parser)]
#[command(name = "queue-cli", about = "Drive a lab-instrument command queue from the shell")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Talk to a Modbus-RTU bench power supply.
    Psu {
        #[arg(long)]
        port: String,
        #[arg(long, default_value_t = 9600)]
        baud: u32,
        #[arg(long, default_value_t = 1)]
        slave: u8,
        #[command(subcommand)]
        action: PsuAction,
    },
    /// Talk to the simulated electrochemistry analyzer.
    Echem {
        #[command(subcommand)]
        action: EchemAction,
    },
}

#[derive(Subcommand)]
enum PsuAction {
    ReadVoltage,
    ReadCurrent,
    ReadPower,
    SetVoltage {
        #[arg(long)]
        centivolts: i16,
    },
    SetCurrent {
        #[arg(long)]
        centiamps: i16,
    },
    Enable,
    Disable,
}

#[derive(Subcommand)]
enum EchemAction {
    Ocv,
    Cv {
        #[arg(long)]
        start_v: f32,
        #[arg(long)]
        vertex_v: f32,
        #[arg(long)]
        scan_rate: f32,
    },
    Ca {
        #[arg(long)]
        potential_v: f32,
        #[arg(long)]
        duration_s: f32,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Psu { port, baud, slave, action } => run_psu(port, baud, slave, action),
        Command::Echem { action } => run_echem(action),
    }
}

fn run_psu(port: String, baud: u32, slave: u8, action: PsuAction) -> Result<()> {
    let params = PsuConnectParams {
        path: port,
        baud_rate: baud,
        slave_address: slave,
        read_timeout: Duration::from_millis(500),
    };
    let manager = QueueManager::start(PsuAdapter, PsuContext::new(), params, QueueConfig::default());
    std::thread::sleep(Duration::from_millis(200));

    let command = match action {
        PsuAction::ReadVoltage => PsuCommand::ReadMeasurement(ReadMeasurementParams {
            channel: MeasurementChannel::Voltage,
        }),
        PsuAction::ReadCurrent => PsuCommand::ReadMeasurement(ReadMeasurementParams {
            channel: MeasurementChannel::Current,
        }),
        PsuAction::ReadPower => PsuCommand::ReadMeasurement(ReadMeasurementParams {
            channel: MeasurementChannel::Power,
        }),
        PsuAction::SetVoltage { centivolts } => PsuCommand::SetSetpoint(SetSetpointParams {
            channel: SetpointChannel::Voltage,
            value_centi: centivolts,
        }),
        PsuAction::SetCurrent { centiamps } => PsuCommand::SetSetpoint(SetSetpointParams {
            channel: SetpointChannel::Current,
            value_centi: centiamps,
        }),
        PsuAction::Enable => PsuCommand::SetOutput(SetOutputParams { enabled: true }),
        PsuAction::Disable => PsuCommand::SetOutput(SetOutputParams { enabled: false }),
    };

    match manager.command_blocking(command, Priority::Normal, Duration::from_secs(5)) {
        Ok(output) => {
            println!("{output:?}");
            Ok(())
        }
        Err(code) => Err(anyhow!("command failed: {code}")),
    }
}

fn run_echem(action: EchemAction) -> Result<()> {
    let manager = QueueManager::start(
        EchemAdapter,
        EchemContext::default(),
        EchemConnectParams::default(),
        QueueConfig::default(),
    );
    std::thread::sleep(Duration::from_millis(50));

    let command = match action {
        EchemAction::Ocv => EchemCommand::ReadOpenCircuitVoltage,
        EchemAction::Cv {
            start_v,
            vertex_v,
            scan_rate,
        } => EchemCommand::RunCyclicVoltammetry {
            start_v,
            vertex_v,
            scan_rate,
            on_progress: None,
        },
        EchemAction::Ca { potential_v, duration_s } => EchemCommand::RunChronoamperometry {
            potential_v,
            duration_s,
            on_progress: None,
        },
    };

    match manager.command_blocking(command, Priority::Normal, Duration::from_secs(30)) {
        Ok(output) => {
            println!("{} points, ocv={:?}, partial={}", output.points.len(), output.open_circuit_voltage, output.partial);
            Ok(())
        }
        Err(code) => Err(anyhow!("command failed: {code}")),
    }
}
