//! `DeviceAdapter` implementation for a bench power supply speaking
//! Modbus RTU over a serial link.

mod device;
mod error;
mod protocol;

pub use device::{
    MeasurementChannel, PsuAdapter, PsuCommand, PsuConnectParams, PsuContext, PsuOutput,
    ReadMeasurementParams, SetOutputParams, SetSetpointParams, SetpointChannel,
};
pub use error::PsuError;
