//! Build identity injection
//!
//! Every build gets its git revision, human version and target name compiled
//! in as defines. The revision and version are encoded as comma-separated
//! character codes (`-DLATEST_COMMIT=97,98,99`) so they survive preprocessor
//! string quoting and can initialise a byte array directly.
//!
//! A random flash discriminator and the protocol domain marker travel next to
//! the flags in [`BuildMetadata`] and are written into the artifact's
//! companion options by a post-build step.

use crate::error::Result;
use crate::flags::FlagResolver;
use crate::git::GitVersion;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Protocol domain marker written when none is configured
pub const DEFAULT_DOMAIN: u8 = 0;

/// Identity of the build being configured
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildIdentity {
    /// Build environment name, e.g. `Unified_ESP32_2400_TX_via_UART`
    pub target: String,
    /// Platform name, e.g. `espressif32`
    pub platform: String,
    /// Git revision and version
    pub git: GitVersion,
    /// Protocol domain marker
    pub domain: u8,
}

impl BuildIdentity {
    pub fn new(target: impl Into<String>, git: GitVersion) -> Self {
        Self {
            target: target.into(),
            platform: String::new(),
            git,
            domain: DEFAULT_DOMAIN,
        }
    }

    /// Probe git in `repo_dir` for the identity of `target`
    pub fn detect(repo_dir: &Path, target: impl Into<String>) -> Self {
        Self::new(target, GitVersion::detect(repo_dir))
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    pub fn with_domain(mut self, domain: u8) -> Self {
        self.domain = domain;
        self
    }

    /// Human-readable version line
    pub fn version_string(&self) -> String {
        format!("{} ({}) {}", self.git.version, self.git.sha, self.domain)
    }
}

/// Structured build values carried beside the compiler flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    pub flash_discriminator: u32,
    pub domain: u8,
    pub git_sha: String,
    pub git_version: String,
    pub target_name: String,
}

impl BuildMetadata {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the metadata as JSON for the artifact-tagging step
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?)?;
        log::info!("Wrote build metadata to {}", path.display());
        Ok(())
    }
}

/// Encode text as comma-separated decimal character codes
pub fn encode_char_codes(text: &str) -> String {
    text.chars()
        .map(|c| (c as u32).to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Upper-case a build environment name and drop any `_VIA_...` suffix
pub fn normalize_target_name(target: &str) -> String {
    let upper = target.to_uppercase();
    match upper.find("_VIA_") {
        Some(idx) => upper[..idx].to_string(),
        None => upper,
    }
}

/// Injects version and identity defines into a build
pub struct BuildMetadataInjector {
    identity: BuildIdentity,
}

impl BuildMetadataInjector {
    pub fn new(identity: BuildIdentity) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &BuildIdentity {
        &self.identity
    }

    /// Append the identity defines and draw a flash discriminator
    ///
    /// Call after all flag sources were added and before
    /// [`FlagResolver::finalize`], so removal directives also apply to the
    /// injected defines.
    pub fn inject(&self, resolver: &mut FlagResolver) -> BuildMetadata {
        self.inject_with_rng(resolver, &mut rand::thread_rng())
    }

    pub fn inject_with_rng<R: Rng>(
        &self,
        resolver: &mut FlagResolver,
        rng: &mut R,
    ) -> BuildMetadata {
        let identity = &self.identity;
        let target_name = normalize_target_name(&identity.target);

        log::info!("PLATFORM : '{}'", identity.platform);
        log::info!("BUILD ENV: '{}'", identity.target.to_uppercase());
        log::info!("build version: {}", identity.version_string());

        resolver.push_flag(format!(
            "-DLATEST_COMMIT={}",
            encode_char_codes(&identity.git.sha)
        ));
        resolver.push_flag(format!(
            "-DLATEST_VERSION={}",
            encode_char_codes(&identity.git.version)
        ));
        resolver.push_flag(format!("-DTARGET_NAME={}", target_name));

        BuildMetadata {
            device_name: resolver.device_name().map(str::to_string),
            flash_discriminator: rng.gen_range(1..=u32::MAX),
            domain: identity.domain,
            git_sha: identity.git.sha.clone(),
            git_version: identity.git.version.clone(),
            target_name,
        }
    }
}
