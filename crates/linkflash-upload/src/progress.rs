//! Upload progress reporting

use crate::esptool::EsptoolArgs;
use crate::flasher::UploadOutcome;
use std::path::Path;

/// Callbacks for the phases of an upload
///
/// All methods default to doing nothing.
pub trait UploadProgress {
    /// Searching for the device's serial port
    fn resolving_port(&mut self) {}

    /// Serial port chosen
    fn port_resolved(&mut self, _port: &str) {}

    /// Switching the device into passthrough mode
    fn handshake(&mut self, _port: &str, _baud: u32) {}

    /// Handing the write plan to the flashing tool
    fn flashing(&mut self, _args: &EsptoolArgs) {}

    /// Copying the artifact to its destination
    fn copying(&mut self, _from: &Path, _to: &Path) {}

    /// Upload finished
    fn complete(&mut self, _outcome: UploadOutcome) {}
}

/// Progress reporter that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl UploadProgress for NoProgress {}
