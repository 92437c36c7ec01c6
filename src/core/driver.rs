//! ActuatorDriver trait definition

use crate::core::types::{Command, StatusData};
use crate::error::Result;

/// Actuator controller trait for hardware abstraction
///
/// Implemented by the real controller and by test doubles. The TCP command
/// receiver only sees this trait.
pub trait ActuatorDriver: Send {
    /// Bring the hardware to a known state (homing, safe duty levels)
    fn initialize(&mut self) -> Result<()>;

    /// Execute one inbound command
    fn handle_command(&mut self, cmd: Command) -> Result<()>;

    /// Current actuator status snapshot
    fn status(&self) -> StatusData;

    /// Drive everything to a safe state before process exit
    fn shutdown(&mut self) -> Result<()>;
}
