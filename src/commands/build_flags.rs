//! build-flags command implementation

use linkflash_core::banner;
use linkflash_core::{BuildIdentity, BuildMetadata, BuildMetadataInjector, FlagResolver, ResolvedFlags};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Options for one flag resolution, after merging CLI and config file
#[derive(Debug, Clone, Default)]
pub struct BuildFlagsOptions {
    pub sources: Vec<PathBuf>,
    pub base_flags: Vec<String>,
    pub target: Option<String>,
    pub platform: Option<String>,
    pub metadata_out: Option<PathBuf>,
    pub repo: PathBuf,
}

/// Resolve flags for a known build identity
///
/// Unreadable sources are reported and skipped.
pub fn resolve_build(
    opts: &BuildFlagsOptions,
    identity: BuildIdentity,
) -> (ResolvedFlags, BuildMetadata) {
    let mut resolver = FlagResolver::with_base_flags(&opts.base_flags);
    for source in &opts.sources {
        if let Err(e) = resolver.add_source(source) {
            log::warn!("{}", e);
        }
    }

    let metadata = BuildMetadataInjector::new(identity).inject(&mut resolver);
    (resolver.finalize(), metadata)
}

/// Check the build target is usable
pub fn require_target(target: Option<&str>) -> Result<&str, linkflash_core::Error> {
    match target.map(str::trim) {
        Some(t) if !t.is_empty() => Ok(t),
        _ => Err(banner::fatal(
            "Please define a build target with --target or [build].target",
        )),
    }
}

pub fn run_build_flags<W: Write>(
    opts: &BuildFlagsOptions,
    out: &mut W,
) -> Result<(), Box<dyn std::error::Error>> {
    let target = require_target(opts.target.as_deref())?;
    let identity = BuildIdentity::detect(&opts.repo, target)
        .with_platform(opts.platform.clone().unwrap_or_default());

    let (flags, metadata) = resolve_build(opts, identity);
    log::info!("Resolved {} flag(s)", flags.len());
    if let Some(name) = flags.device_name() {
        log::info!("Device name: {}", name);
    }

    out.write_all(flags.to_source_text().as_bytes())?;
    out.flush()?;

    if let Some(path) = &opts.metadata_out {
        write_metadata(&metadata, path)?;
    }
    Ok(())
}

fn write_metadata(metadata: &BuildMetadata, path: &Path) -> linkflash_core::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    metadata.write_to(path)
}
