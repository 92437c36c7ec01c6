//! Wire format serialization and framing
//!
//! All TCP traffic is length-prefixed:
//!
//! ```text
//! ┌──────────────────┬──────────────────────────┐
//! │ Length (4 bytes) │ Payload (variable)       │
//! │ Big-endian u32   │ JSON                     │
//! └──────────────────┴──────────────────────────┘
//! ```
//!
//! Payloads are JSON: human-readable, easy to drive from scripts, and the
//! server side already speaks it. Commands carry a `"type"` tag field
//! (internally tagged enums), which rules out non-self-describing binary
//! encodings; the status stream is low-rate enough that JSON costs nothing
//! that matters. Frames above [`MAX_FRAME_LEN`] are rejected and close the
//! connection.

use crate::error::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Maximum accepted frame payload size (1 MB)
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Wire payload serializer
///
/// Pins the wire encoding in one place so the receiver, the publisher, and
/// clients built on this crate cannot drift apart.
#[derive(Clone, Default)]
pub struct Serializer;

impl Serializer {
    /// Create a new serializer
    pub fn new() -> Self {
        Self
    }

    /// Serialize a message to payload bytes
    pub fn serialize<T: Serialize>(&self, msg: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(msg).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize payload bytes to a message
    pub fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|e| Error::Serialization(e.to_string()))
    }
}

/// Prepend the 4-byte big-endian length prefix to a payload
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(4 + payload.len());
    framed.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    framed.extend_from_slice(payload);
    framed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Command, StatusData};

    #[test]
    fn test_command_round_trip() {
        let cmd = Command::SetActuators {
            peltier_pwm: Some(5),
            internal_servo: Some(vec![45.0, 45.0, 44.0, 6.0]),
            external_servo: Some(vec![50.0, 70.0, 80.0, 12.0]),
            small_fan_pwm: Some(vec![5, 80, 0, 2]),
            large_fan_pwm: Some(90),
        };

        let serializer = Serializer::new();
        let bytes = serializer.serialize(&cmd).unwrap();
        let back: Command = serializer.deserialize(&bytes).unwrap();
        match back {
            Command::SetActuators { large_fan_pwm, .. } => {
                assert_eq!(large_fan_pwm, Some(90));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_status_round_trip() {
        let mut status = StatusData::new(2);
        status.slot_internal = [45.0, 45.0, 44.0, 6.0];
        status.energy_temp_total = 75;

        let serializer = Serializer::new();
        let bytes = serializer.serialize(&status).unwrap();
        let back: StatusData = serializer.deserialize(&bytes).unwrap();
        assert_eq!(back, status);
    }

    #[test]
    fn test_frame_prefix() {
        let framed = frame(b"abc");
        assert_eq!(&framed[..4], &[0, 0, 0, 3]);
        assert_eq!(&framed[4..], b"abc");
    }

    #[test]
    fn test_malformed_payload_is_an_error() {
        let serializer = Serializer::new();
        let result: Result<Command> = serializer.deserialize(b"not json");
        assert!(matches!(result, Err(Error::Serialization(_))));
    }
}
