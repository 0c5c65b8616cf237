use std::io::{Read, Write};
use std::time::Duration;

use queue_core::{AdapterError, CommandOutcome, DeviceAdapter};
use serialport::SerialPort;
use tracing::{debug, info, trace, warn};

use crate::error::PsuError;
use crate::protocol::{self, validate_and_strip};

const REG_VOLTAGE: u16 = 0x0000;
const REG_CURRENT: u16 = 0x0001;
const REG_POWER: u16 = 0x0002;
const REG_VOLTAGE_SETPOINT: u16 = 0x0010;
const REG_CURRENT_SETPOINT: u16 = 0x0011;
const COIL_OUTPUT_ENABLE: u16 = 0x0020;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementChannel {
    Voltage,
    Current,
    Power,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetpointChannel {
    Voltage,
    Current,
}

#[derive(Debug, Clone, Copy)]
pub struct ReadMeasurementParams {
    pub channel: MeasurementChannel,
}

#[derive(Debug, Clone, Copy)]
pub struct SetSetpointParams {
    /// Hundredths of a volt or amp, matching the instrument's native
    /// register scale.
    pub channel: SetpointChannel,
    pub value_centi: i16,
}

#[derive(Debug, Clone, Copy)]
pub struct SetOutputParams {
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy)]
pub enum PsuCommand {
    ReadMeasurement(ReadMeasurementParams),
    SetSetpoint(SetSetpointParams),
    SetOutput(SetOutputParams),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PsuOutput {
    Measurement { channel: MeasurementChannel, value: f32 },
    Ack,
}

impl Default for PsuOutput {
    fn default() -> Self {
        PsuOutput::Ack
    }
}

#[derive(Debug, Clone)]
pub struct PsuConnectParams {
    pub path: String,
    pub baud_rate: u32,
    pub slave_address: u8,
    pub read_timeout: Duration,
}

pub struct PsuContext {
    port: Option<Box<dyn SerialPort>>,
    slave: u8,
}

impl PsuContext {
    pub fn new() -> Self {
        Self { port: None, slave: 1 }
    }
}

impl Default for PsuContext {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
pub struct PsuAdapter;

impl DeviceAdapter for PsuAdapter {
    type Context = PsuContext;
    type ConnectParams = PsuConnectParams;
    type Command = PsuCommand;
    type Output = PsuOutput;

    fn display_name(&self) -> &'static str {
        "modbus-psu"
    }

    fn connect(&self, ctx: &mut PsuContext, params: &PsuConnectParams) -> Result<(), AdapterError> {
        info!(port = params.path, baud = params.baud_rate, slave = params.slave_address, "opening serial port");
        let port = serialport::new(params.path.as_str(), params.baud_rate)
            .timeout(params.read_timeout)
            .open()
            .map_err(|e| {
                warn!(port = params.path, error = %e, "failed to open serial port");
                AdapterError::CommFailed(e.to_string())
            })?;
        ctx.port = Some(port);
        ctx.slave = params.slave_address;
        debug!(port = params.path, "serial port open");
        Ok(())
    }

    fn disconnect(&self, ctx: &mut PsuContext) {
        debug!("closing serial port");
        ctx.port = None;
    }

    fn test_connection(&self, ctx: &mut PsuContext) -> Result<(), AdapterError> {
        let request = protocol::build_read_holding_registers(ctx.slave, REG_VOLTAGE, 1);
        transact(ctx, &request, protocol::FN_READ_HOLDING_REGISTERS, 3)
            .map(|_| ())
            .map_err(AdapterError::from)
    }

    fn is_connected(&self, ctx: &PsuContext) -> bool {
        ctx.port.is_some()
    }

    fn execute(&self, ctx: &mut PsuContext, cmd: &PsuCommand) -> CommandOutcome<PsuOutput> {
        run(ctx, cmd).map_err(AdapterError::from)
    }

    fn command_name(&self, cmd: &PsuCommand) -> &'static str {
        match cmd {
            PsuCommand::ReadMeasurement(p) => match p.channel {
                MeasurementChannel::Voltage => "read_voltage",
                MeasurementChannel::Current => "read_current",
                MeasurementChannel::Power => "read_power",
            },
            PsuCommand::SetSetpoint(p) => match p.channel {
                SetpointChannel::Voltage => "set_voltage_setpoint",
                SetpointChannel::Current => "set_current_setpoint",
            },
            PsuCommand::SetOutput(_) => "set_output",
        }
    }
}

fn run(ctx: &mut PsuContext, cmd: &PsuCommand) -> Result<PsuOutput, PsuError> {
    match cmd {
        PsuCommand::ReadMeasurement(params) => {
            let register = match params.channel {
                MeasurementChannel::Voltage => REG_VOLTAGE,
                MeasurementChannel::Current => REG_CURRENT,
                MeasurementChannel::Power => REG_POWER,
            };
            let request = protocol::build_read_holding_registers(ctx.slave, register, 1);
            let payload = transact(ctx, &request, protocol::FN_READ_HOLDING_REGISTERS, 3)?;
            let raw = i16::from_be_bytes([payload[1], payload[2]]);
            Ok(PsuOutput::Measurement {
                channel: params.channel,
                value: raw as f32 / 100.0,
            })
        }
        PsuCommand::SetSetpoint(params) => {
            let register = match params.channel {
                SetpointChannel::Voltage => REG_VOLTAGE_SETPOINT,
                SetpointChannel::Current => REG_CURRENT_SETPOINT,
            };
            let request =
                protocol::build_write_single_register(ctx.slave, register, params.value_centi as u16);
            transact(ctx, &request, protocol::FN_WRITE_SINGLE_REGISTER, 4)?;
            Ok(PsuOutput::Ack)
        }
        PsuCommand::SetOutput(params) => {
            let request = protocol::build_write_single_coil(ctx.slave, COIL_OUTPUT_ENABLE, params.enabled);
            transact(ctx, &request, protocol::FN_WRITE_SINGLE_COIL, 4)?;
            Ok(PsuOutput::Ack)
        }
    }
}

/// Send `request` and read back a Modbus RTU response, validating CRC
/// and function code. `data_len` is the number of payload bytes expected
/// between the 2-byte header and the trailing CRC on a non-exception
/// response.
fn transact(
    ctx: &mut PsuContext,
    request: &[u8],
    expected_function: u8,
    data_len: usize,
) -> Result<Vec<u8>, PsuError> {
    let port = ctx.port.as_deref_mut().ok_or(PsuError::ShortFrame)?;

    trace!(bytes = ?request, "TX");
    port.write_all(request)?;
    port.flush()?;

    let mut header = [0u8; 2];
    port.read_exact(&mut header)?;

    let mut frame = header.to_vec();
    if header[1] & 0x80 != 0 {
        let mut rest = [0u8; 3];
        port.read_exact(&mut rest)?;
        frame.extend_from_slice(&rest);
    } else {
        let mut rest = vec![0u8; data_len + 2];
        port.read_exact(&mut rest)?;
        frame.extend_from_slice(&rest);
    }
    trace!(bytes = ?frame, "RX");

    let payload = validate_and_strip(&frame, ctx.slave, expected_function).map_err(|e| {
        warn!(error = %e, "response frame rejected");
        e
    })?;
    Ok(payload.to_vec())
}
