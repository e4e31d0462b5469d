//! linkflash-upload - Firmware upload dispatch
//!
//! This crate puts a built firmware image onto a device. An upload request
//! names the artifact, the target platform and the upload method; the
//! dispatcher picks a procedure and runs it:
//!
//! - `dir` / `stock`: copy the artifact to an output location
//! - `uart`: write flash with `esptool` over a serial port
//! - `etx`: switch an EdgeTX radio into serial passthrough, then write flash
//!
//! # Example
//!
//! ```no_run
//! use linkflash_upload::{
//!     Esptool, Family, NoProgress, SystemFlasher, UploadMethod, UploadRequest,
//! };
//!
//! let request = UploadRequest::new("build/firmware.bin", Family::Esp32, "esp32", UploadMethod::Uart)
//!     .with_port("/dev/ttyUSB0");
//! let mut flasher = SystemFlasher::system(Esptool::default());
//! let outcome = flasher.flash(&request, &mut NoProgress);
//! assert!(outcome.is_success());
//! ```

pub mod error;
pub mod esptool;
pub mod flasher;
pub mod passthrough;
pub mod ports;
pub mod progress;
pub mod strategy;
pub mod transport;

pub use error::{FlashToolError, HandshakeError, Result, UploadError};
pub use esptool::{Esptool, EsptoolArgs, FlashTool};
pub use flasher::{
    DeviceFlasher, ResolvedTarget, SystemFlasher, UploadOutcome, UploadRequest, DEFAULT_BAUD,
};
pub use passthrough::{EdgeTxPassthrough, Handshake};
pub use ports::{PortFinder, SerialPortFinder};
pub use progress::{NoProgress, UploadProgress};
pub use strategy::{select, Family, Procedure, UploadMethod};
