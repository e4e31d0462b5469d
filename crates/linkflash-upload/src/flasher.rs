//! Firmware upload dispatcher
//!
//! [`DeviceFlasher`] executes the procedure chosen by
//! [`select`](crate::strategy::select):
//! 1. Default the baud rate
//! 2. Copy the artifact for `dir`/`stock`, or
//! 3. Resolve the serial port, run the passthrough handshake when asked, and
//!    hand the four-segment write plan to the flashing tool
//!
//! Failures are typed internally ([`UploadError`]) and collapse to
//! [`UploadOutcome::ErrorGeneral`] at [`DeviceFlasher::flash`].

use crate::error::{Result, UploadError};
use crate::esptool::{Esptool, EsptoolArgs, FlashTool};
use crate::passthrough::{EdgeTxPassthrough, Handshake};
use crate::ports::{PortFinder, SerialPortFinder};
use crate::progress::UploadProgress;
use crate::strategy::{select, Family, Procedure, UploadMethod};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Baud rate used when none is requested
pub const DEFAULT_BAUD: u32 = 460800;

/// Result of an upload as seen by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Success,
    ErrorGeneral,
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Success)
    }
}

impl fmt::Display for UploadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadOutcome::Success => f.write_str("success"),
            UploadOutcome::ErrorGeneral => f.write_str("general error"),
        }
    }
}

/// A single upload, built from user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// Compiled application image
    pub firmware: PathBuf,
    /// Serial port; found automatically when `None`
    pub port: Option<String>,
    /// Destination for `dir`/`stock`
    pub output: Option<PathBuf>,
    pub family: Family,
    /// Platform/chip name, e.g. `esp32-s3`
    pub platform: String,
    pub method: UploadMethod,
    /// Baud rate; 0 selects [`DEFAULT_BAUD`]
    pub baud: u32,
    /// Erase the whole chip before writing
    pub erase: bool,
}

impl UploadRequest {
    pub fn new(
        firmware: impl Into<PathBuf>,
        family: Family,
        platform: impl Into<String>,
        method: UploadMethod,
    ) -> Self {
        Self {
            firmware: firmware.into(),
            port: None,
            output: None,
            family,
            platform: platform.into(),
            method,
            baud: 0,
            erase: false,
        }
    }

    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_baud(mut self, baud: u32) -> Self {
        self.baud = baud;
        self
    }

    pub fn with_erase(mut self, erase: bool) -> Self {
        self.erase = erase;
        self
    }

    /// Baud rate actually used
    pub fn effective_baud(&self) -> u32 {
        if self.baud == 0 {
            DEFAULT_BAUD
        } else {
            self.baud
        }
    }
}

/// Port and baud rate an upload actually talks to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub port: String,
    pub baud: u32,
}

/// Executes upload requests
///
/// The flashing tool, handshake and port discovery are collaborators so the
/// dispatcher can run against real hardware or test doubles.
pub struct DeviceFlasher<T, H, P> {
    tool: T,
    handshake: H,
    ports: P,
}

/// Flasher wired to esptool, the EdgeTX handshake and the system port list
pub type SystemFlasher = DeviceFlasher<Esptool, EdgeTxPassthrough, SerialPortFinder>;

impl SystemFlasher {
    pub fn system(tool: Esptool) -> Self {
        DeviceFlasher::new(tool, EdgeTxPassthrough::new(), SerialPortFinder::new())
    }
}

impl<T: FlashTool, H: Handshake, P: PortFinder> DeviceFlasher<T, H, P> {
    pub fn new(tool: T, handshake: H, ports: P) -> Self {
        Self {
            tool,
            handshake,
            ports,
        }
    }

    /// Run an upload and report only success or failure
    pub fn flash(
        &mut self,
        request: &UploadRequest,
        progress: &mut dyn UploadProgress,
    ) -> UploadOutcome {
        let outcome = match self.try_flash(request, progress) {
            Ok(()) => UploadOutcome::Success,
            Err(e) => {
                log::error!("{}", e);
                UploadOutcome::ErrorGeneral
            }
        };
        progress.complete(outcome);
        outcome
    }

    /// Run an upload, keeping the cause of a failure
    pub fn try_flash(
        &mut self,
        request: &UploadRequest,
        progress: &mut dyn UploadProgress,
    ) -> Result<()> {
        let procedure = select(request.family, request.method)?;
        log::debug!(
            "Upload {} to {} via {}: {:?}",
            request.firmware.display(),
            request.platform,
            request.method,
            procedure
        );

        if !request.firmware.is_file() {
            return Err(UploadError::MissingFirmware(request.firmware.clone()));
        }

        match procedure {
            Procedure::CopyToOutput => copy_artifact(request, progress),
            Procedure::UartFlash => self.write_flash(request, false, progress),
            Procedure::PassthroughFlash => self.write_flash(request, true, progress),
        }
    }

    fn resolve(
        &self,
        request: &UploadRequest,
        progress: &mut dyn UploadProgress,
    ) -> Result<ResolvedTarget> {
        let baud = request.effective_baud();
        if let Some(port) = &request.port {
            return Ok(ResolvedTarget {
                port: port.clone(),
                baud,
            });
        }
        progress.resolving_port();
        let port = self.ports.find()?;
        progress.port_resolved(&port);
        Ok(ResolvedTarget { port, baud })
    }

    fn write_flash(
        &mut self,
        request: &UploadRequest,
        passthrough: bool,
        progress: &mut dyn UploadProgress,
    ) -> Result<()> {
        let ResolvedTarget { port, baud } = self.resolve(request, progress)?;

        if passthrough {
            progress.handshake(&port, baud);
            self.handshake.init(&port, baud)?;
        }

        let args = EsptoolArgs::write_flash(&request.platform, &port, baud, &request.firmware)
            .no_reset_before(passthrough)
            .erase_all(request.erase);
        progress.flashing(&args);
        self.tool.run(&args.to_args())?;
        Ok(())
    }
}

fn copy_artifact(request: &UploadRequest, progress: &mut dyn UploadProgress) -> Result<()> {
    let output = request
        .output
        .as_deref()
        .ok_or(UploadError::MissingOutput(request.method))?;
    let dest = copy_destination(&request.firmware, output);

    progress.copying(&request.firmware, &dest);
    let bytes = fs::copy(&request.firmware, &dest)?;
    log::info!(
        "Copied {} ({} bytes) to {}",
        request.firmware.display(),
        bytes,
        dest.display()
    );
    Ok(())
}

/// Copying into a directory keeps the artifact's file name
fn copy_destination(firmware: &Path, output: &Path) -> PathBuf {
    match firmware.file_name() {
        Some(name) if output.is_dir() => output.join(name),
        _ => output.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FlashToolError, HandshakeError};
    use crate::progress::NoProgress;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Events = Rc<RefCell<Vec<String>>>;

    struct MockTool {
        events: Events,
        calls: RefCell<Vec<Vec<String>>>,
        fail: bool,
    }

    impl FlashTool for MockTool {
        fn run(&self, args: &[String]) -> std::result::Result<(), FlashToolError> {
            self.events.borrow_mut().push("tool".to_string());
            self.calls.borrow_mut().push(args.to_vec());
            if self.fail {
                Err(FlashToolError::Other("A fatal error occurred".to_string()))
            } else {
                Ok(())
            }
        }
    }

    struct MockHandshake {
        events: Events,
        fail: bool,
    }

    impl Handshake for MockHandshake {
        fn init(&mut self, port: &str, baud: u32) -> std::result::Result<(), HandshakeError> {
            self.events
                .borrow_mut()
                .push(format!("handshake {} {}", port, baud));
            if self.fail {
                Err(HandshakeError::IoError("no reply".to_string()))
            } else {
                Ok(())
            }
        }
    }

    struct FixedPort(Option<&'static str>);

    impl PortFinder for FixedPort {
        fn find(&self) -> Result<String> {
            self.0.map(str::to_string).ok_or(UploadError::NoSerialPort)
        }
    }

    struct Fixture {
        events: Events,
        flasher: DeviceFlasher<MockTool, MockHandshake, FixedPort>,
        dir: tempfile::TempDir,
        firmware: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with(false, false, Some("/dev/ttyUSB7"))
        }

        fn with(tool_fails: bool, handshake_fails: bool, port: Option<&'static str>) -> Self {
            let events: Events = Rc::default();
            let dir = tempfile::tempdir().unwrap();
            let firmware = dir.path().join("firmware.bin");
            fs::write(&firmware, [0xE9u8, 0x03, 0x02, 0x20, 0xAA, 0x55]).unwrap();
            let flasher = DeviceFlasher::new(
                MockTool {
                    events: events.clone(),
                    calls: RefCell::default(),
                    fail: tool_fails,
                },
                MockHandshake {
                    events: events.clone(),
                    fail: handshake_fails,
                },
                FixedPort(port),
            );
            Self {
                events,
                flasher,
                dir,
                firmware,
            }
        }

        fn request(&self, platform: &str, method: UploadMethod) -> UploadRequest {
            let family = Family::from_platform(platform).unwrap();
            UploadRequest::new(&self.firmware, family, platform, method)
        }

        fn calls(&self) -> Vec<Vec<String>> {
            self.flasher.tool.calls.borrow().clone()
        }

        fn arg_after(&self, flag: &str) -> Option<String> {
            let calls = self.calls();
            let args = calls.last()?;
            let idx = args.iter().position(|a| a == flag)?;
            args.get(idx + 1).cloned()
        }
    }

    #[test]
    fn test_default_baud() {
        let request = UploadRequest::new("fw.bin", Family::Esp32, "esp32", UploadMethod::Uart);
        assert_eq!(request.effective_baud(), DEFAULT_BAUD);
        assert_eq!(request.clone().with_baud(115200).effective_baud(), 115200);
    }

    #[test]
    fn test_uart_uses_default_baud_and_resolved_port() {
        let mut fx = Fixture::new();
        let request = fx.request("esp32", UploadMethod::Uart).with_baud(0);
        let outcome = fx.flasher.flash(&request, &mut NoProgress);

        assert_eq!(outcome, UploadOutcome::Success);
        assert_eq!(fx.arg_after("--baud").as_deref(), Some("460800"));
        assert_eq!(fx.arg_after("--port").as_deref(), Some("/dev/ttyUSB7"));
        assert_eq!(fx.arg_after("--chip").as_deref(), Some("esp32"));
        assert!(!fx.calls()[0].contains(&"--before".to_string()));
        assert_eq!(*fx.events.borrow(), ["tool"]);
    }

    #[test]
    fn test_user_port_is_not_replaced() {
        let mut fx = Fixture::with(false, false, None);
        let request = fx.request("esp32", UploadMethod::Uart).with_port("COM3");
        assert!(fx.flasher.flash(&request, &mut NoProgress).is_success());
        assert_eq!(fx.arg_after("--port").as_deref(), Some("COM3"));
    }

    #[test]
    fn test_bootloader_offset_by_platform() {
        let mut fx = Fixture::new();
        let s3 = fx.request("esp32-s3", UploadMethod::EdgeTx);
        assert!(fx.flasher.flash(&s3, &mut NoProgress).is_success());
        let bootloader = fx.dir.path().join("bootloader.bin").display().to_string();
        assert_eq!(fx.arg_after("0x0000"), Some(bootloader.clone()));
        assert_eq!(fx.arg_after("--chip").as_deref(), Some("esp32s3"));

        let classic = fx.request("esp32", UploadMethod::EdgeTx);
        assert!(fx.flasher.flash(&classic, &mut NoProgress).is_success());
        assert_eq!(fx.arg_after("0x1000"), Some(bootloader));
        assert_eq!(fx.arg_after("0x0000"), None);
    }

    #[test]
    fn test_passthrough_handshake_precedes_tool() {
        let mut fx = Fixture::new();
        let request = fx
            .request("esp32", UploadMethod::EdgeTx)
            .with_baud(921600)
            .with_erase(true);
        assert!(fx.flasher.flash(&request, &mut NoProgress).is_success());

        assert_eq!(
            *fx.events.borrow(),
            ["handshake /dev/ttyUSB7 921600", "tool"]
        );
        assert_eq!(fx.arg_after("--before").as_deref(), Some("no_reset"));
        assert_eq!(fx.arg_after("--after").as_deref(), Some("hard_reset"));
        assert!(fx.calls()[0].contains(&"--erase-all".to_string()));
    }

    #[test]
    fn test_write_plan_segments() {
        let mut fx = Fixture::new();
        let request = fx.request("esp32", UploadMethod::Uart);
        assert!(fx.flasher.flash(&request, &mut NoProgress).is_success());

        let dir = fx.dir.path();
        let expect = |name: &str| Some(dir.join(name).display().to_string());
        assert_eq!(fx.arg_after("0x8000"), expect("partitions.bin"));
        assert_eq!(fx.arg_after("0xe000"), expect("boot_app0.bin"));
        assert_eq!(fx.arg_after("0x10000"), expect("firmware.bin"));
        assert_eq!(fx.arg_after("--flash_mode").as_deref(), Some("dio"));
        assert_eq!(fx.arg_after("--flash_freq").as_deref(), Some("40m"));
        assert_eq!(fx.arg_after("--flash_size").as_deref(), Some("detect"));
    }

    #[test]
    fn test_non_esp32_is_general_error() {
        for platform in ["esp8285", "stm32"] {
            for method in UploadMethod::ALL {
                let mut fx = Fixture::new();
                let out = fx.dir.path().join("out");
                fs::create_dir(&out).unwrap();
                let request = fx.request(platform, method).with_output(&out);

                let err = fx.flasher.try_flash(&request, &mut NoProgress).unwrap_err();
                assert!(err.to_string().contains(method.name()));
                assert!(err.to_string().contains(request.family.name()));

                assert_eq!(
                    fx.flasher.flash(&request, &mut NoProgress),
                    UploadOutcome::ErrorGeneral
                );
                assert!(fx.calls().is_empty());
                assert!(fx.events.borrow().is_empty());
                assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
            }
        }
    }

    #[test]
    fn test_dir_copies_without_tool() {
        let mut fx = Fixture::new();
        let out = fx.dir.path().join("deploy");
        fs::create_dir(&out).unwrap();
        let request = fx.request("esp32-s3", UploadMethod::Dir).with_output(&out);

        assert!(fx.flasher.flash(&request, &mut NoProgress).is_success());
        assert_eq!(
            fs::read(out.join("firmware.bin")).unwrap(),
            fs::read(&fx.firmware).unwrap()
        );
        assert!(fx.calls().is_empty());
        assert!(fx.events.borrow().is_empty());
    }

    #[test]
    fn test_stock_copies_to_file_path() {
        let mut fx = Fixture::new();
        let dest = fx.dir.path().join("renamed.bin");
        let request = fx.request("esp32", UploadMethod::Stock).with_output(&dest);

        assert!(fx.flasher.flash(&request, &mut NoProgress).is_success());
        assert_eq!(fs::read(&dest).unwrap(), fs::read(&fx.firmware).unwrap());
        assert!(fx.calls().is_empty());
    }

    #[test]
    fn test_dir_without_output_fails() {
        let mut fx = Fixture::new();
        let request = fx.request("esp32", UploadMethod::Dir);
        let err = fx.flasher.try_flash(&request, &mut NoProgress).unwrap_err();
        assert!(matches!(err, UploadError::MissingOutput(UploadMethod::Dir)));
    }

    #[test]
    fn test_failures_collapse_to_general_error() {
        let mut tool_fails = Fixture::with(true, false, Some("/dev/ttyUSB0"));
        let request = tool_fails.request("esp32", UploadMethod::Uart);
        assert_eq!(
            tool_fails.flasher.flash(&request, &mut NoProgress),
            UploadOutcome::ErrorGeneral
        );

        let mut handshake_fails = Fixture::with(false, true, Some("/dev/ttyUSB0"));
        let request = handshake_fails.request("esp32", UploadMethod::EdgeTx);
        let err = handshake_fails
            .flasher
            .try_flash(&request, &mut NoProgress)
            .unwrap_err();
        assert!(matches!(err, UploadError::Handshake(_)));
        assert!(handshake_fails.calls().is_empty());

        let mut no_port = Fixture::with(false, false, None);
        let request = no_port.request("esp32", UploadMethod::Uart);
        assert_eq!(
            no_port.flasher.flash(&request, &mut NoProgress),
            UploadOutcome::ErrorGeneral
        );
    }

    #[test]
    fn test_missing_firmware() {
        let mut fx = Fixture::new();
        let request = UploadRequest::new(
            fx.dir.path().join("missing.bin"),
            Family::Esp32,
            "esp32",
            UploadMethod::Uart,
        );
        let err = fx.flasher.try_flash(&request, &mut NoProgress).unwrap_err();
        assert!(matches!(err, UploadError::MissingFirmware(_)));
        assert!(fx.calls().is_empty());
    }

    #[derive(Default)]
    struct Recorder(Vec<String>);

    impl UploadProgress for Recorder {
        fn resolving_port(&mut self) {
            self.0.push("resolving".into());
        }
        fn port_resolved(&mut self, port: &str) {
            self.0.push(format!("port {}", port));
        }
        fn handshake(&mut self, _port: &str, _baud: u32) {
            self.0.push("handshake".into());
        }
        fn flashing(&mut self, args: &EsptoolArgs) {
            self.0.push(format!("flashing {}", args.segments.len()));
        }
        fn complete(&mut self, outcome: UploadOutcome) {
            self.0.push(format!("complete {}", outcome));
        }
    }

    #[test]
    fn test_progress_phases() {
        let mut fx = Fixture::new();
        let request = fx.request("esp32", UploadMethod::EdgeTx);
        let mut progress = Recorder::default();
        fx.flasher.flash(&request, &mut progress);
        assert_eq!(
            progress.0,
            [
                "resolving",
                "port /dev/ttyUSB7",
                "handshake",
                "flashing 4",
                "complete success",
            ]
        );
    }
}
