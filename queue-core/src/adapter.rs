//! The seam between the queue and a concrete instrument driver.
//!
//! The original interface is a C-style v-table of function pointers
//! plus `void*` contexts, commands and results, with adapter-supplied
//! clone/alloc/free callbacks for the opaque blobs. `DeviceAdapter`
//! replaces all of that with three associated types and ordinary Rust
//! ownership: `Context` is the adapter's private device handle,
//! `Command` and `Output` are plain, `Clone` value types the queue can
//! copy and hand across its internal boundaries without adapter-supplied
//! callbacks at all.

use std::time::Duration;

use crate::error::{AdapterError, CommandOutcome};

/// A driver for one instrument, executed exclusively from the queue's
/// worker thread. No method here is ever called concurrently with
/// another on the same adapter instance — the queue serialises access.
pub trait DeviceAdapter: Send + Sync + 'static {
    /// The adapter's private device handle (serial port, socket, USB
    /// handle, simulator state, ...). Touched only by the worker thread.
    type Context: Send;

    /// Whatever `connect` needs: address, baud rate, vendor/product ids.
    type ConnectParams: Clone + Send + 'static;

    /// One command the adapter knows how to execute. Typically an enum
    /// tagging the operation together with its parameters.
    type Command: Clone + Send + 'static;

    /// What a successful `execute` produces.
    type Output: Clone + Send + Default + 'static;

    /// Short, stable name for logging (e.g. the instrument model).
    fn display_name(&self) -> &'static str;

    /// Establish the connection. Called once at startup and again on
    /// every reconnect attempt after a disconnect.
    fn connect(
        &self,
        ctx: &mut Self::Context,
        params: &Self::ConnectParams,
    ) -> Result<(), AdapterError>;

    /// Release the connection. Infallible: best-effort cleanup only.
    fn disconnect(&self, ctx: &mut Self::Context);

    /// A cheap round-trip used to decide whether a failed `execute` was
    /// a one-off or the link actually dropped.
    fn test_connection(&self, ctx: &mut Self::Context) -> Result<(), AdapterError>;

    /// Pure accessor, no I/O.
    fn is_connected(&self, ctx: &Self::Context) -> bool;

    /// Run one command to completion. Blocking; may take as long as the
    /// device needs. Must not be called unless connected.
    fn execute(&self, ctx: &mut Self::Context, cmd: &Self::Command) -> CommandOutcome<Self::Output>;

    /// Display name for a command, used in logs and cancel-by-type
    /// matching is done structurally (see [`crate::command::same_type`]),
    /// not through this.
    fn command_name(&self, cmd: &Self::Command) -> &'static str;

    /// Extra settle time the adapter wants after this command completes,
    /// before the worker picks up the next one. Most adapters return
    /// zero; some real devices need a fixed recovery window after
    /// certain operations (e.g. a relay settle time).
    fn command_delay(&self, _cmd: &Self::Command) -> Duration {
        Duration::ZERO
    }
}
