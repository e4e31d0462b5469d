//! Flashing tool boundary
//!
//! ESP32 targets are written with the external `esptool`. This module builds
//! its argument list and runs it; the tool's wire protocol is its own
//! business.
//!
//! Every ESP32 upload writes the same four images:
//!
//! | offset             | image            |
//! |--------------------|------------------|
//! | `0x0000`/`0x1000`  | `bootloader.bin` |
//! | `0x8000`           | `partitions.bin` |
//! | `0xe000`           | `boot_app0.bin`  |
//! | `0x10000`          | application      |
//!
//! The companion images are expected next to the application image.

use crate::error::FlashToolError;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Default program name of the flashing tool
pub const DEFAULT_PROGRAM: &str = "esptool.py";

/// Partition table offset
pub const PARTITIONS_OFFSET: u32 = 0x8000;
/// OTA boot selector offset
pub const BOOT_APP0_OFFSET: u32 = 0xe000;
/// Application offset
pub const APP_OFFSET: u32 = 0x10000;

/// Runs the flashing tool with a prepared argument list
pub trait FlashTool {
    fn run(&self, args: &[String]) -> Result<(), FlashToolError>;
}

/// The external esptool program
#[derive(Debug, Clone)]
pub struct Esptool {
    program: String,
    prefix: Vec<String>,
}

impl Default for Esptool {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl Esptool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            prefix: Vec::new(),
        }
    }

    /// Parse a command line such as `python3 -m esptool`
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            prefix: parts.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl FlashTool for Esptool {
    fn run(&self, args: &[String]) -> Result<(), FlashToolError> {
        log::info!(
            "Running: {} {}",
            self.program,
            self.prefix
                .iter()
                .chain(args)
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(" ")
        );

        let status = Command::new(&self.program)
            .args(&self.prefix)
            .args(args)
            .status()
            .map_err(|source| FlashToolError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(FlashToolError::Failed {
                program: self.program.clone(),
                status,
            });
        }
        Ok(())
    }
}

/// One image in the write plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashSegment {
    pub offset: u32,
    pub image: PathBuf,
}

/// Bootloader offset for a platform
///
/// Newer ESP32 variants (`esp32-s3`, `esp32-c3`, ...) boot from 0x0, the
/// original ESP32 from 0x1000.
pub fn bootloader_offset(platform: &str) -> u32 {
    if platform.starts_with("esp32-") {
        0x0000
    } else {
        0x1000
    }
}

/// Chip identifier as understood by esptool (`esp32-s3` -> `esp32s3`)
pub fn chip_id(platform: &str) -> String {
    platform.replace('-', "")
}

/// Segment plan for an application image and its companions
pub fn write_plan(platform: &str, firmware: &Path) -> Vec<FlashSegment> {
    let dir = firmware.parent().unwrap_or_else(|| Path::new(""));
    vec![
        FlashSegment {
            offset: bootloader_offset(platform),
            image: dir.join("bootloader.bin"),
        },
        FlashSegment {
            offset: PARTITIONS_OFFSET,
            image: dir.join("partitions.bin"),
        },
        FlashSegment {
            offset: BOOT_APP0_OFFSET,
            image: dir.join("boot_app0.bin"),
        },
        FlashSegment {
            offset: APP_OFFSET,
            image: firmware.to_path_buf(),
        },
    ]
}

fn format_offset(offset: u32) -> String {
    format!("{:#06x}", offset)
}

/// Arguments of an esptool `write_flash` invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EsptoolArgs {
    pub chip: String,
    pub port: String,
    pub baud: u32,
    /// Keep the device in its bootloader instead of resetting it first
    pub no_reset_before: bool,
    pub erase_all: bool,
    pub segments: Vec<FlashSegment>,
}

impl EsptoolArgs {
    pub fn write_flash(platform: &str, port: &str, baud: u32, firmware: &Path) -> Self {
        Self {
            chip: chip_id(platform),
            port: port.to_string(),
            baud,
            no_reset_before: false,
            erase_all: false,
            segments: write_plan(platform, firmware),
        }
    }

    pub fn no_reset_before(mut self, enabled: bool) -> Self {
        self.no_reset_before = enabled;
        self
    }

    pub fn erase_all(mut self, enabled: bool) -> Self {
        self.erase_all = enabled;
        self
    }

    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "--chip".to_string(),
            self.chip.clone(),
            "--port".to_string(),
            self.port.clone(),
            "--baud".to_string(),
            self.baud.to_string(),
        ];
        if self.no_reset_before {
            args.extend(["--before", "no_reset"].map(String::from));
        }
        args.extend(["--after", "hard_reset", "write_flash"].map(String::from));
        if self.erase_all {
            args.push("--erase-all".to_string());
        }
        args.extend(
            ["-z", "--flash_mode", "dio", "--flash_freq", "40m", "--flash_size", "detect"]
                .map(String::from),
        );
        for segment in &self.segments {
            args.push(format_offset(segment.offset));
            args.push(segment.image.display().to_string());
        }
        args
    }
}
