//! upload command implementation

use indicatif::{ProgressBar, ProgressStyle};
use linkflash_upload::{
    DeviceFlasher, EdgeTxPassthrough, Esptool, EsptoolArgs, Family, SerialPortFinder,
    UploadMethod, UploadOutcome, UploadProgress, UploadRequest,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Options for one upload, after merging CLI and config file
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub firmware: PathBuf,
    pub port: Option<String>,
    pub platform: Option<String>,
    pub mcu: Option<Family>,
    pub baud: Option<u32>,
    pub erase: bool,
    pub output: Option<PathBuf>,
    pub method: Option<UploadMethod>,
    pub esptool: Option<String>,
    pub non_interactive: bool,
}

/// Platform assumed when none is configured
const DEFAULT_PLATFORM: &str = "esp32";

impl UploadOptions {
    /// Build the upload request
    ///
    /// The family comes from `--mcu` or is derived from the platform.
    pub fn to_request(&self) -> Result<UploadRequest, String> {
        let platform = self.platform.as_deref().unwrap_or(DEFAULT_PLATFORM);
        let family = match self.mcu {
            Some(family) => family,
            None => Family::from_platform(platform).ok_or_else(|| {
                format!(
                    "Cannot derive the MCU family from platform '{}', use --mcu",
                    platform
                )
            })?,
        };
        let method = self.method.unwrap_or(UploadMethod::Uart);

        let mut request = UploadRequest::new(&self.firmware, family, platform, method)
            .with_baud(self.baud.unwrap_or(0))
            .with_erase(self.erase);
        if let Some(port) = &self.port {
            request = request.with_port(port);
        }
        if let Some(output) = &self.output {
            request = request.with_output(output);
        }
        Ok(request)
    }

    fn esptool(&self) -> Result<Esptool, String> {
        match &self.esptool {
            Some(command) => Esptool::from_command_line(command)
                .ok_or_else(|| "Empty flashing tool command".to_string()),
            None => Ok(Esptool::default()),
        }
    }
}

/// Progress reporter using indicatif spinners
struct IndicatifProgress {
    current: Option<ProgressBar>,
}

impl IndicatifProgress {
    fn new() -> Self {
        Self { current: None }
    }

    fn spinner(&mut self, message: String) {
        self.finish_current();
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(100));
        self.current = Some(pb);
    }

    fn finish_current(&mut self) {
        if let Some(pb) = self.current.take() {
            pb.finish_and_clear();
        }
    }
}

impl UploadProgress for IndicatifProgress {
    fn resolving_port(&mut self) {
        self.spinner("Looking for serial port...".to_string());
    }

    fn port_resolved(&mut self, port: &str) {
        self.finish_current();
        println!("Using serial port {}", port);
    }

    fn handshake(&mut self, port: &str, baud: u32) {
        self.spinner(format!("Switching radio on {} to passthrough @ {}...", port, baud));
    }

    fn flashing(&mut self, args: &EsptoolArgs) {
        // The flashing tool draws its own progress
        self.finish_current();
        println!(
            "Flashing {} image(s) to {} on {} @ {}",
            args.segments.len(),
            args.chip,
            args.port,
            args.baud
        );
    }

    fn copying(&mut self, from: &Path, to: &Path) {
        self.spinner(format!("Copying {} to {}...", from.display(), to.display()));
    }

    fn complete(&mut self, outcome: UploadOutcome) {
        self.finish_current();
        match outcome {
            UploadOutcome::Success => println!("Upload complete"),
            UploadOutcome::ErrorGeneral => eprintln!("Upload failed"),
        }
    }
}

/// Run an upload with the system flashing tool, handshake and port list
pub fn run_upload(opts: &UploadOptions) -> Result<UploadOutcome, Box<dyn std::error::Error>> {
    let request = opts.to_request()?;
    let tool = opts.esptool()?;
    log::debug!("Flashing tool: {}", tool.program());

    let ports = if opts.non_interactive {
        SerialPortFinder::new().non_interactive()
    } else {
        SerialPortFinder::new()
    };
    let mut flasher = DeviceFlasher::new(tool, EdgeTxPassthrough::new(), ports);
    let mut progress = IndicatifProgress::new();
    Ok(flasher.flash(&request, &mut progress))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let opts = UploadOptions {
            firmware: PathBuf::from("firmware.bin"),
            ..Default::default()
        };
        let request = opts.to_request().unwrap();
        assert_eq!(request.family, Family::Esp32);
        assert_eq!(request.platform, "esp32");
        assert_eq!(request.method, UploadMethod::Uart);
        assert_eq!(request.effective_baud(), 460800);
        assert_eq!(request.port, None);
    }

    #[test]
    fn test_family_from_platform_or_mcu() {
        let opts = UploadOptions {
            platform: Some("esp32-s3".to_string()),
            method: Some(UploadMethod::EdgeTx),
            port: Some("/dev/ttyACM0".to_string()),
            ..Default::default()
        };
        let request = opts.to_request().unwrap();
        assert_eq!(request.family, Family::Esp32);
        assert_eq!(request.port.as_deref(), Some("/dev/ttyACM0"));

        let opts = UploadOptions {
            platform: Some("nrf52".to_string()),
            ..Default::default()
        };
        assert!(opts.to_request().is_err());

        let opts = UploadOptions {
            platform: Some("nrf52".to_string()),
            mcu: Some(Family::Stm32),
            ..Default::default()
        };
        assert_eq!(opts.to_request().unwrap().family, Family::Stm32);
    }

    #[test]
    fn test_esptool_command_line() {
        let opts = UploadOptions {
            esptool: Some("python3 -m esptool".to_string()),
            ..Default::default()
        };
        assert_eq!(opts.esptool().unwrap().program(), "python3");

        let opts = UploadOptions {
            esptool: Some(" ".to_string()),
            ..Default::default()
        };
        assert!(opts.esptool().is_err());
        assert_eq!(UploadOptions::default().esptool().unwrap().program(), "esptool.py");
    }
}
