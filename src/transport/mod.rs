//! Transport layer for hardware I/O abstraction
//!
//! Two seams live here: [`Transport`] for byte-stream peripherals (the
//! fan/LED MCU on USB serial) and [`PulseBus`] for the servo drive
//! primitive (PCA9685 over I²C). Both have mock implementations for
//! hardware-free testing.

use crate::error::Result;

mod i2c;
mod mock;
mod serial;

pub use i2c::Pca9685Bus;
pub use mock::{MockPulseBus, MockTransport};
pub use serial::SerialTransport;

/// Transport trait for byte-stream device communication
pub trait Transport: Send {
    /// Read data into buffer, returns number of bytes read
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Write data from buffer, returns number of bytes written
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Flush any pending writes (blocking until complete)
    fn flush(&mut self) -> Result<()>;

    /// Check if data is available to read
    fn available(&mut self) -> Result<usize> {
        Ok(0) // Default implementation
    }

    /// Discard any unread input
    fn drain(&mut self) -> Result<()> {
        let mut scratch = [0u8; 64];
        while self.available()? > 0 {
            self.read(&mut scratch)?;
        }
        Ok(())
    }
}

/// Raw pulse-write primitive for the servo bank
///
/// A pulse is the integer drive value sent to one servo channel,
/// proportional to the commanded shaft position. Implementations either
/// succeed or return an error; no retries happen at this layer.
pub trait PulseBus: Send {
    /// Drive `channel` (0..7) with `pulse`
    fn write_pulse(&mut self, channel: u8, pulse: u16) -> Result<()>;
}
