//! Error types for upload operations

use crate::strategy::{Family, UploadMethod};
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Upload errors
///
/// All of these collapse to [`UploadOutcome::ErrorGeneral`] at the
/// dispatcher edge; they exist so the cause can be logged.
///
/// [`UploadOutcome::ErrorGeneral`]: crate::UploadOutcome::ErrorGeneral
#[derive(Debug, Error)]
pub enum UploadError {
    /// Family and method do not name a known upload procedure
    #[error("Invalid upload method for firmware: '{method}' is not supported on {family}")]
    InvalidCombination { family: Family, method: UploadMethod },

    /// Firmware artifact does not exist
    #[error("Firmware file not found: {0}")]
    MissingFirmware(PathBuf),

    /// Copy method used without an output path
    #[error("The '{0}' upload method requires an output path")]
    MissingOutput(UploadMethod),

    /// No serial port could be found for the device
    #[error("No serial port found")]
    NoSerialPort,

    /// Serial port selection was aborted or invalid
    #[error("Serial port selection failed: {0}")]
    PortSelection(String),

    /// Passthrough handshake failed
    #[error("Passthrough handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    /// External flashing tool failed
    #[error("Flashing tool failed: {0}")]
    FlashTool(#[from] FlashToolError),

    /// Serial port enumeration error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error while copying or prompting
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the mode-switch handshake
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// Serial port could not be opened or configured
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error during communication
    #[error("I/O error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for HandshakeError {
    fn from(e: std::io::Error) -> Self {
        HandshakeError::IoError(e.to_string())
    }
}

/// Errors from the external flashing tool
#[derive(Debug, Error)]
pub enum FlashToolError {
    /// The tool could not be started
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool ran and reported failure
    #[error("{program} exited with {status}")]
    Failed { program: String, status: ExitStatus },

    /// Reported by in-process tool implementations
    #[error("{0}")]
    Other(String),
}

/// Result type for upload operations
pub type Result<T> = core::result::Result<T, UploadError>;
