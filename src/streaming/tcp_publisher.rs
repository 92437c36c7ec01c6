//! TCP status publisher
//!
//! Publishes actuator status snapshots to connected clients: immediately
//! when the controller reports a change (through the crossbeam channel) and
//! at least once per configured interval so late-joining clients converge
//! without asking.

use crate::core::types::StatusData;
use crate::error::Result;
use crate::streaming::wire::{Serializer, frame};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Status snapshot publisher over TCP
pub struct StatusPublisher {
    listener: TcpListener,
    clients: Vec<TcpStream>,
    serializer: Serializer,
    rx: Receiver<StatusData>,
    interval: Duration,
    running: Arc<AtomicBool>,
    last: Option<StatusData>,
}

impl StatusPublisher {
    /// Bind the status endpoint
    pub fn bind(
        address: &str,
        serializer: Serializer,
        rx: Receiver<StatusData>,
        interval: Duration,
        running: Arc<AtomicBool>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(address)?;
        listener.set_nonblocking(true)?;
        log::info!("Status publisher listening on {}", address);

        Ok(Self {
            listener,
            clients: Vec::new(),
            serializer,
            rx,
            interval,
            running,
            last: None,
        })
    }

    /// Bound socket address (useful when binding to an ephemeral port)
    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the publish loop until shutdown
    pub fn run(&mut self) -> Result<()> {
        while self.running.load(Ordering::Relaxed) {
            self.accept_new_clients();

            match self.rx.recv_timeout(self.interval) {
                Ok(status) => self.last = Some(status),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    log::debug!("Status channel closed, publisher exiting");
                    break;
                }
            }

            if let Some(status) = self.last.clone() {
                self.broadcast(&status);
            }
        }

        log::info!("Status publisher stopped");
        Ok(())
    }

    fn accept_new_clients(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    log::info!("Status client connected: {}", addr);
                    self.clients.push(stream);
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    log::error!("Status accept error: {}", e);
                    break;
                }
            }
        }
    }

    fn broadcast(&mut self, status: &StatusData) {
        if self.clients.is_empty() {
            return;
        }

        let payload = match self.serializer.serialize(status) {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("Status serialization failed: {}", e);
                return;
            }
        };
        let framed = frame(&payload);

        self.clients.retain_mut(|client| {
            match client.write_all(&framed) {
                Ok(_) => true,
                Err(e) => {
                    log::info!("Status client dropped: {}", e);
                    false
                }
            }
        });
    }
}
