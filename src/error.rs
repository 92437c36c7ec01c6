//! Error types for VayuIO

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// VayuIO error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I²C bus error
    #[error("I2C bus error: {0}")]
    I2c(String),

    /// GPIO error
    #[error("GPIO error: {0}")]
    Gpio(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid parameter (rejected before any hardware write)
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Malformed reply or missing acknowledgement from a peer MCU
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Component not available
    #[error("Component not available: {0}")]
    ComponentNotAvailable(&'static str),

    /// Configuration file parse failure
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration file write failure
    #[error("Config write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    /// Wire serialization failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
