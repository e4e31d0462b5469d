//! Upload strategy selection
//!
//! Maps a microcontroller family and a requested upload method onto the
//! procedure that puts the firmware on the device:
//!
//! | family  | `dir` / `stock` | `uart`    | `etx`              |
//! |---------|-----------------|-----------|--------------------|
//! | ESP32   | copy to output  | UART flash| handshake + UART   |
//! | others  | invalid         | invalid   | invalid            |
//!
//! Selection only classifies; [`DeviceFlasher`](crate::DeviceFlasher)
//! executes.

use crate::error::{Result, UploadError};
use std::fmt;
use std::str::FromStr;

/// Microcontroller product line of a firmware build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Esp32,
    Esp8266,
    Stm32,
}

impl Family {
    /// Derive the family from a platform/chip name such as `esp32-s3`
    pub fn from_platform(platform: &str) -> Option<Self> {
        let platform = platform.to_ascii_lowercase();
        if platform.starts_with("esp32") {
            Some(Family::Esp32)
        } else if platform.starts_with("esp8266") || platform.starts_with("esp8285") {
            Some(Family::Esp8266)
        } else if platform.starts_with("stm32") {
            Some(Family::Stm32)
        } else {
            None
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Family::Esp32 => "esp32",
            Family::Esp8266 => "esp8266",
            Family::Stm32 => "stm32",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Family {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "esp32" => Ok(Family::Esp32),
            "esp8266" | "esp8285" => Ok(Family::Esp8266),
            "stm32" => Ok(Family::Stm32),
            _ => Err(format!("Unknown MCU family: {} (expected esp32, esp8266 or stm32)", s)),
        }
    }
}

/// How the user wants the firmware delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadMethod {
    /// Flash over a direct UART connection
    Uart,
    /// Flash through an EdgeTX radio in serial passthrough mode
    EdgeTx,
    /// Stock bootloader upload, delivered as a file
    Stock,
    /// Copy the artifact to an output directory
    Dir,
}

impl UploadMethod {
    pub const ALL: [UploadMethod; 4] = [
        UploadMethod::Uart,
        UploadMethod::EdgeTx,
        UploadMethod::Stock,
        UploadMethod::Dir,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            UploadMethod::Uart => "uart",
            UploadMethod::EdgeTx => "etx",
            UploadMethod::Stock => "stock",
            UploadMethod::Dir => "dir",
        }
    }
}

impl fmt::Display for UploadMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for UploadMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "uart" => Ok(UploadMethod::Uart),
            "etx" | "edgetx" => Ok(UploadMethod::EdgeTx),
            "stock" => Ok(UploadMethod::Stock),
            "dir" => Ok(UploadMethod::Dir),
            _ => Err(format!("Unknown upload method: {} (expected uart, etx, stock or dir)", s)),
        }
    }
}

/// The flashing procedure chosen for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Procedure {
    /// Copy the artifact to the output path
    CopyToOutput,
    /// Write flash over UART with the external tool
    UartFlash,
    /// Switch the radio into passthrough, then write flash over UART
    PassthroughFlash,
}

impl Procedure {
    /// Whether the procedure talks to a device over a serial port
    pub fn needs_port(&self) -> bool {
        !matches!(self, Procedure::CopyToOutput)
    }
}

/// Select the procedure for `family` and `method`
pub fn select(family: Family, method: UploadMethod) -> Result<Procedure> {
    match (family, method) {
        (Family::Esp32, UploadMethod::Dir | UploadMethod::Stock) => Ok(Procedure::CopyToOutput),
        (Family::Esp32, UploadMethod::Uart) => Ok(Procedure::UartFlash),
        (Family::Esp32, UploadMethod::EdgeTx) => Ok(Procedure::PassthroughFlash),
        (Family::Esp8266 | Family::Stm32, _) => {
            Err(UploadError::InvalidCombination { family, method })
        }
    }
}
