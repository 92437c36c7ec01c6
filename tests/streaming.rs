//! Loopback tests for the TCP streaming layer
//!
//! Exercises the command receiver and status publisher over real sockets on
//! 127.0.0.1 with a recording driver standing in for the hardware.
//!
//! Run with: `cargo test --test streaming`

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use vayu_io::core::driver::ActuatorDriver;
use vayu_io::core::types::{Command, StatusData};
use vayu_io::error::Result;
use vayu_io::streaming::wire::frame;
use vayu_io::streaming::{CommandReceiver, Serializer, StatusPublisher};

/// Driver double that records every dispatched command
#[derive(Clone, Default)]
struct RecordingDriver {
    commands: Arc<Mutex<Vec<Command>>>,
}

impl ActuatorDriver for RecordingDriver {
    fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    fn handle_command(&mut self, cmd: Command) -> Result<()> {
        self.commands.lock().push(cmd);
        Ok(())
    }

    fn status(&self) -> StatusData {
        StatusData::new(0)
    }

    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

fn send_frame(stream: &mut TcpStream, serializer: &Serializer, cmd: &Command) {
    let payload = serializer.serialize(cmd).unwrap();
    stream.write_all(&frame(&payload)).unwrap();
    stream.flush().unwrap();
}

#[test]
fn receiver_dispatches_framed_commands() {
    let serializer = Serializer::new();
    let recorder = RecordingDriver::default();
    let driver: Arc<Mutex<Box<dyn ActuatorDriver>>> =
        Arc::new(Mutex::new(Box::new(recorder.clone())));
    let running = Arc::new(AtomicBool::new(true));

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let recv_serializer = serializer.clone();
    let recv_running = Arc::clone(&running);
    let handle = std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut receiver = CommandReceiver::new(recv_serializer, driver, recv_running);
        receiver.run(stream).unwrap();
    });

    let mut client = TcpStream::connect(addr).unwrap();
    send_frame(
        &mut client,
        &serializer,
        &Command::SetActuators {
            peltier_pwm: Some(5),
            internal_servo: None,
            external_servo: None,
            small_fan_pwm: None,
            large_fan_pwm: None,
        },
    );
    send_frame(&mut client, &serializer, &Command::HomeAll);
    // Shutdown both exercises dispatch and stops the receiver loop
    send_frame(&mut client, &serializer, &Command::Shutdown);

    handle.join().unwrap();
    assert!(!running.load(Ordering::Relaxed));

    let commands = recorder.commands.lock();
    assert_eq!(commands.len(), 3);
    assert!(matches!(commands[0], Command::SetActuators { .. }));
    assert!(matches!(commands[1], Command::HomeAll));
    assert!(matches!(commands[2], Command::Shutdown));
}

#[test]
fn receiver_discards_malformed_frames() {
    let serializer = Serializer::new();
    let recorder = RecordingDriver::default();
    let driver: Arc<Mutex<Box<dyn ActuatorDriver>>> =
        Arc::new(Mutex::new(Box::new(recorder.clone())));
    let running = Arc::new(AtomicBool::new(true));

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let recv_serializer = serializer.clone();
    let recv_running = Arc::clone(&running);
    let handle = std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut receiver = CommandReceiver::new(recv_serializer, driver, recv_running);
        receiver.run(stream).unwrap();
    });

    let mut client = TcpStream::connect(addr).unwrap();
    // Well-framed but not a command: dropped, connection stays up
    client.write_all(&frame(b"{\"not\": \"a command\"}")).unwrap();
    send_frame(&mut client, &serializer, &Command::Shutdown);

    handle.join().unwrap();
    let commands = recorder.commands.lock();
    assert_eq!(commands.len(), 1);
    assert!(matches!(commands[0], Command::Shutdown));
}

#[test]
fn publisher_delivers_status_frames() {
    let serializer = Serializer::new();
    let (tx, rx) = crossbeam_channel::unbounded();
    let running = Arc::new(AtomicBool::new(true));

    let mut publisher = StatusPublisher::bind(
        "127.0.0.1:0",
        serializer.clone(),
        rx,
        Duration::from_millis(50),
        Arc::clone(&running),
    )
    .unwrap();
    let addr = publisher.local_addr().unwrap();

    let handle = std::thread::spawn(move || {
        publisher.run().unwrap();
    });

    let mut client = TcpStream::connect(addr).unwrap();
    client
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    // Give the publisher a tick to accept before the snapshot arrives
    std::thread::sleep(Duration::from_millis(100));

    let mut status = StatusData::new(7);
    status.fan_main_speed = 42;
    tx.send(status.clone()).unwrap();

    let mut len_buf = [0u8; 4];
    client.read_exact(&mut len_buf).unwrap();
    let len = u32::from_be_bytes(len_buf) as usize;
    let mut payload = vec![0u8; len];
    client.read_exact(&mut payload).unwrap();

    let received: StatusData = serializer.deserialize(&payload).unwrap();
    assert_eq!(received.unit_id, 7);
    assert_eq!(received.fan_main_speed, 42);

    running.store(false, Ordering::Relaxed);
    drop(tx);
    handle.join().unwrap();
}
