//! VayuIO - Actuator abstraction daemon for the Vayu HVAC unit
//!
//! ## Protocol Architecture
//!
//! - **TCP commands (port 5555)**: length-prefixed command frames, reliable
//!   and ordered
//! - **TCP status (port 5556)**: periodic actuator status snapshots to any
//!   connected client

use std::env;
use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use vayu_io::config::AppConfig;
use vayu_io::core::driver::ActuatorDriver;
use vayu_io::core::types::Command;
use vayu_io::devices::create_controller;
use vayu_io::error::Result;
use vayu_io::streaming::{CommandReceiver, Serializer, StatusPublisher};

/// Parse config path from command line arguments.
///
/// Supports:
/// - `vayu-io <path>` (positional)
/// - `vayu-io --config <path>` (flag-based)
/// - `vayu-io -c <path>` (short flag)
///
/// Defaults to `/etc/vayuio.toml` if not specified.
fn parse_config_path() -> String {
    let args: Vec<String> = env::args().collect();

    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    "/etc/vayuio.toml".to_string()
}

fn main() -> Result<()> {
    let config_path = parse_config_path();
    let config = match AppConfig::from_file(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Could not load {} ({}), using built-in defaults",
                config_path, e
            );
            AppConfig::vayu_defaults()
        }
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("VayuIO v{} starting...", env!("CARGO_PKG_VERSION"));
    log::info!("Using config: {} (unit {})", config_path, config.unit.id);

    let serializer = Serializer::new();

    // Status channel: controller -> publisher
    let (status_tx, status_rx) = crossbeam_channel::unbounded();

    // Open hardware and initialize actuators
    let mut controller = create_controller(&config, status_tx)?;
    controller.initialize()?;
    let driver = Arc::new(Mutex::new(controller));

    // Shutdown signal handler
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| vayu_io::Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    // Status publisher thread
    let mut publisher = StatusPublisher::bind(
        &config.streaming.status_address,
        serializer.clone(),
        status_rx,
        Duration::from_millis(config.streaming.status_interval_ms),
        Arc::clone(&running),
    )?;
    let _pub_handle = thread::Builder::new()
        .name("status-publisher".to_string())
        .spawn(move || {
            if let Err(e) = publisher.run() {
                log::error!("Status publisher error: {}", e);
            }
        })
        .map_err(|e| vayu_io::Error::Other(format!("Failed to spawn publisher: {}", e)))?;

    // Command server
    let bind_addr = &config.streaming.cmd_address;
    let listener = TcpListener::bind(bind_addr)
        .map_err(|e| vayu_io::Error::Other(format!("Failed to bind to {}: {}", bind_addr, e)))?;
    if let Err(e) = listener.set_nonblocking(true) {
        log::warn!("Failed to set nonblocking mode: {}", e);
    }

    log::info!("Command server listening on {}", bind_addr);
    log::info!("VayuIO running. Press Ctrl-C to stop.");

    // Main loop - accept TCP connections for commands
    while running.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, addr)) => {
                log::info!("Command client connected: {}", addr);
                if let Err(e) = stream.set_nonblocking(false) {
                    log::error!("Failed to set socket to blocking mode: {}", e);
                    continue;
                }

                let driver_clone = Arc::clone(&driver);
                let recv_serializer = serializer.clone();
                let recv_running = Arc::clone(&running);

                let _recv_handle = thread::Builder::new()
                    .name("cmd-receiver".to_string())
                    .spawn(move || {
                        let mut receiver =
                            CommandReceiver::new(recv_serializer, driver_clone, recv_running);
                        if let Err(e) = receiver.run(stream) {
                            log::error!("Command receiver error: {}", e);
                        }
                        log::info!("Command client disconnected: {}", addr);
                    });
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(10));
            }
            Err(e) => {
                log::error!("Accept error: {}", e);
            }
        }
    }

    // Shutdown: drive actuators to a safe state
    log::info!("Shutting down...");
    {
        let mut driver = driver.lock();
        if let Err(e) = driver.handle_command(Command::Shutdown) {
            log::warn!("Safe-state shutdown incomplete: {}", e);
        }
    }

    log::info!("VayuIO stopped");
    Ok(())
}
