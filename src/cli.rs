//! CLI argument parsing

use clap::{Parser, Subcommand};
use linkflash_upload::{Family, UploadMethod};
use std::path::PathBuf;

/// Parse an upload method name (`uart`, `etx`, `stock`, `dir`)
fn parse_method(s: &str) -> Result<UploadMethod, String> {
    s.parse()
}

/// Parse an MCU family name (`esp32`, `esp8266`, `stm32`)
fn parse_family(s: &str) -> Result<Family, String> {
    s.parse()
}

#[derive(Parser)]
#[command(name = "linkflash")]
#[command(author, version, about = "Radio-link firmware build flags and upload", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Project configuration file
    /// Defaults to ./linkflash.toml when present
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve the compiler flags for a build
    BuildFlags {
        /// Flag source file, applied in the order given (repeatable)
        #[arg(short, long = "source")]
        sources: Vec<PathBuf>,

        /// Base flag passed through unchanged (repeatable)
        #[arg(long = "flag", allow_hyphen_values = true)]
        flags: Vec<String>,

        /// Build environment name, e.g. Unified_ESP32_2400_TX_via_UART
        #[arg(short, long)]
        target: Option<String>,

        /// Platform name reported in the build log
        #[arg(long)]
        platform: Option<String>,

        /// Write build metadata as JSON to this file
        #[arg(long)]
        metadata_out: Option<PathBuf>,

        /// Repository used to determine the git version
        #[arg(long, default_value = ".")]
        repo: PathBuf,
    },

    /// Upload a firmware image to a device
    Upload {
        /// Firmware image
        #[arg(short, long)]
        firmware: PathBuf,

        /// Serial port (found automatically if not specified)
        #[arg(short, long)]
        port: Option<String>,

        /// Platform/chip name, e.g. esp32 or esp32-s3
        #[arg(long)]
        platform: Option<String>,

        /// MCU family (derived from the platform if not specified)
        #[arg(long, value_parser = parse_family)]
        mcu: Option<Family>,

        /// Baud rate (0 selects 460800)
        #[arg(short, long)]
        baud: Option<u32>,

        /// Erase the whole flash before writing
        #[arg(long)]
        erase: bool,

        /// Output file or directory for the dir and stock methods
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Upload method [possible values: uart, etx, stock, dir]
        #[arg(short, long, value_parser = parse_method)]
        method: Option<UploadMethod>,

        /// Flashing tool command line, e.g. "python3 -m esptool"
        #[arg(long)]
        esptool: Option<String>,

        /// Never prompt; take the first serial port found
        #[arg(long)]
        non_interactive: bool,
    },
}
