//! CLI command implementations
//!
//! - `build_flags`: layered flag resolution plus build identity injection
//! - `upload`: firmware upload through the device flasher

pub mod build_flags;
pub mod upload;

pub use build_flags::{run_build_flags, BuildFlagsOptions};
pub use upload::{run_upload, UploadOptions};
