//! TCP command receiver
//!
//! Handles inbound commands from a connected client. TCP (not UDP) because
//! commands must not be lost or reordered: "close the vents" arriving twice
//! is harmless, not arriving at all is not.
//!
//! Commands are length-prefixed frames (see [`crate::streaming::wire`]).
//! A malformed payload is logged and discarded without closing the
//! connection; a transport error closes it. The receiver polls the global
//! running flag through a read timeout so daemon shutdown is never blocked
//! on a silent client.

use crate::core::driver::ActuatorDriver;
use crate::core::types::Command;
use crate::error::{Error, Result};
use crate::streaming::wire::{MAX_FRAME_LEN, Serializer};
use parking_lot::Mutex;
use std::io::Read;
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Initial capacity for the command read buffer (typical command size)
const INITIAL_BUFFER_CAPACITY: usize = 256;

/// TCP receiver that handles commands from a connected client
pub struct CommandReceiver {
    serializer: Serializer,
    driver: Arc<Mutex<Box<dyn ActuatorDriver>>>,
    /// Global running flag (daemon shutdown)
    running: Arc<AtomicBool>,
    /// Reusable buffer for reading command payloads
    read_buffer: Vec<u8>,
}

impl CommandReceiver {
    /// Create a new command receiver
    pub fn new(
        serializer: Serializer,
        driver: Arc<Mutex<Box<dyn ActuatorDriver>>>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            serializer,
            driver,
            running,
            read_buffer: Vec::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Run the receiver loop for a connected client
    pub fn run(&mut self, mut stream: TcpStream) -> Result<()> {
        log::info!("Command receiver started for {:?}", stream.peer_addr());

        // Read timeout so the shutdown flag gets polled
        if let Err(e) = stream.set_read_timeout(Some(std::time::Duration::from_millis(500))) {
            log::warn!("Failed to set read timeout: {}", e);
        }

        while self.running.load(Ordering::Relaxed) {
            match self.read_command(&mut stream) {
                Ok(Some(cmd)) => {
                    log::info!("Received command: {:?}", cmd);
                    let shutdown = matches!(cmd, Command::Shutdown);
                    if let Err(e) = self.handle_command(cmd) {
                        log::error!("Failed to handle command: {}", e);
                    }
                    if shutdown {
                        log::info!("Shutdown command received, stopping daemon");
                        self.running.store(false, Ordering::Relaxed);
                    }
                }
                Ok(None) => {
                    // Timeout or malformed frame, keep the connection
                }
                Err(e) => {
                    let _ = stream.shutdown(std::net::Shutdown::Both);
                    if let Error::Io(ref io_err) = e
                        && (io_err.kind() == std::io::ErrorKind::UnexpectedEof
                            || io_err.kind() == std::io::ErrorKind::ConnectionReset)
                    {
                        log::info!("Client disconnected");
                        return Ok(());
                    }
                    log::error!("Failed to read command frame: {}", e);
                    return Err(e);
                }
            }
        }

        let _ = stream.shutdown(std::net::Shutdown::Both);
        log::info!("Command receiver stopped");
        Ok(())
    }

    /// Read one command frame
    ///
    /// Returns `Ok(None)` on read timeout or on a payload that failed to
    /// deserialize (logged and discarded).
    fn read_command(&mut self, stream: &mut TcpStream) -> Result<Option<Command>> {
        let mut len_buf = [0u8; 4];
        match stream.read_exact(&mut len_buf) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        }

        let len = u32::from_be_bytes(len_buf) as usize;
        if len > MAX_FRAME_LEN {
            return Err(Error::Other(format!("Frame too large: {} bytes", len)));
        }

        self.read_buffer.clear();
        self.read_buffer.resize(len, 0);
        stream.read_exact(&mut self.read_buffer)?;

        match self.serializer.deserialize::<Command>(&self.read_buffer) {
            Ok(cmd) => Ok(Some(cmd)),
            Err(e) => {
                log::warn!("Discarding malformed command frame: {}", e);
                Ok(None)
            }
        }
    }

    /// Dispatch a command to the actuator driver
    fn handle_command(&self, cmd: Command) -> Result<()> {
        let mut driver = self.driver.lock();
        driver.handle_command(cmd)
    }
}
