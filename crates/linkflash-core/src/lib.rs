//! linkflash-core - build configuration for radio-link firmware
//!
//! This crate turns layered flag source files into the final set of compiler
//! defines for a firmware build and attaches the build's identity.
//!
//! # Example
//!
//! ```no_run
//! use linkflash_core::flags::FlagResolver;
//! use linkflash_core::metadata::{BuildIdentity, BuildMetadataInjector};
//! use std::path::Path;
//!
//! let mut resolver = FlagResolver::new();
//! resolver.add_source("user_defines.txt")?;
//! resolver.add_source("super_defines.txt")?;
//!
//! let identity = BuildIdentity::detect(Path::new("."), "Unified_ESP32_2400_TX_via_UART");
//! let metadata = BuildMetadataInjector::new(identity).inject(&mut resolver);
//! let flags = resolver.finalize();
//!
//! for flag in flags.iter() {
//!     println!("{}", flag);
//! }
//! metadata.write_to("options.json")?;
//! # Ok::<(), linkflash_core::Error>(())
//! ```

pub mod banner;
pub mod error;
pub mod flags;
pub mod git;
pub mod metadata;

pub use error::{Error, Result};
pub use flags::{resolve, FlagResolver, ResolvedFlags};
pub use git::GitVersion;
pub use metadata::{BuildIdentity, BuildMetadata, BuildMetadataInjector};
