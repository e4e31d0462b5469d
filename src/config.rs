//! Project configuration file
//!
//! Optional defaults for both commands, read from `linkflash.toml`:
//!
//! ```toml
//! [build]
//! target = "Unified_ESP32_2400_TX_via_UART"
//! platform = "espressif32"
//! sources = ["super_defines.txt", "user_defines.txt"]
//! flags = ["-DRADIO_SX128X=1"]
//! metadata_out = "build/options.json"
//!
//! [upload]
//! platform = "esp32-s3"
//! method = "etx"
//! port = "/dev/ttyACM0"
//! baud = 921600
//! esptool = "python3 -m esptool"
//! ```
//!
//! Command-line arguments take precedence over file values.

use linkflash_upload::{Family, UploadMethod};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "linkflash.toml";

/// Errors loading the configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default)]
    pub build: BuildSection,
    #[serde(default)]
    pub upload: UploadSection,
}

/// Defaults for `build-flags`
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    pub target: Option<String>,
    pub platform: Option<String>,
    #[serde(default)]
    pub sources: Vec<PathBuf>,
    #[serde(default)]
    pub flags: Vec<String>,
    pub metadata_out: Option<PathBuf>,
}

/// Defaults for `upload`
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploadSection {
    pub platform: Option<String>,
    #[serde(default, deserialize_with = "deserialize_family")]
    pub mcu: Option<Family>,
    #[serde(default, deserialize_with = "deserialize_method")]
    pub method: Option<UploadMethod>,
    pub port: Option<String>,
    pub baud: Option<u32>,
    pub esptool: Option<String>,
}

fn deserialize_method<'de, D>(deserializer: D) -> Result<Option<UploadMethod>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let name: Option<String> = Option::deserialize(deserializer)?;
    name.map(|s| s.parse().map_err(serde::de::Error::custom))
        .transpose()
}

fn deserialize_family<'de, D>(deserializer: D) -> Result<Option<Family>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let name: Option<String> = Option::deserialize(deserializer)?;
    name.map(|s| s.parse().map_err(serde::de::Error::custom))
        .transpose()
}

impl ProjectConfig {
    pub fn from_toml_str(path: &Path, content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(path, &content)
    }

    /// Load the explicit configuration file, or the default one if present
    ///
    /// Without an explicit path a missing default file yields an empty
    /// configuration.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_toml_file(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.is_file() {
                    log::debug!("Using configuration file {}", path.display());
                    Self::from_toml_file(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}
