//! `DeviceAdapter` implementation for a simulated electrochemistry
//! analyzer, exercising the technique-poller pattern (cyclic
//! voltammetry, chronoamperometry) in addition to single-shot commands.

mod device;
mod error;
mod technique;

pub use device::{EchemAdapter, EchemCommand, EchemConnectParams, EchemContext, EchemOutput};
pub use error::EchemError;
