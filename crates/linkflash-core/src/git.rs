//! Git revision probing for build identity

use crate::error::{Error, Result};
use std::path::Path;
use std::process::Command;

/// Environment override for the revision
pub const SHA_ENV: &str = "LINKFLASH_GIT_SHA";
/// Environment override for the version string
pub const VERSION_ENV: &str = "LINKFLASH_GIT_VERSION";

/// Revision used when git is unavailable
pub const UNKNOWN_SHA: &str = "000000";
/// Version used when no tag or branch can be determined
pub const UNKNOWN_VERSION: &str = "ver.unknown";

/// Number of revision characters compiled into the firmware
const SHA_LEN: usize = 6;

/// Short revision and human version of the source tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitVersion {
    pub sha: String,
    pub version: String,
}

impl Default for GitVersion {
    fn default() -> Self {
        Self {
            sha: UNKNOWN_SHA.to_string(),
            version: UNKNOWN_VERSION.to_string(),
        }
    }
}

impl GitVersion {
    /// Determine the version of the tree at `repo_dir`
    ///
    /// The version is the exact tag when HEAD is tagged, otherwise the
    /// current branch name. Never fails: missing git or a detached tree fall
    /// back to [`UNKNOWN_SHA`] / [`UNKNOWN_VERSION`]. [`SHA_ENV`] and
    /// [`VERSION_ENV`] take precedence when set.
    pub fn detect(repo_dir: &Path) -> Self {
        Self::from_repository(repo_dir).apply_env_overrides(|key| std::env::var(key).ok())
    }

    fn from_repository(repo_dir: &Path) -> Self {
        let mut version = Self::default();

        match git(repo_dir, &["rev-parse", "HEAD"]) {
            Ok(sha) => version.sha = sha.chars().take(SHA_LEN).collect(),
            Err(e) => log::warn!("Unable to read git revision: {}", e),
        }

        if let Ok(tag) = git(repo_dir, &["describe", "--tags", "--exact-match"]) {
            version.version = tag;
        } else if let Ok(branch) = git(repo_dir, &["symbolic-ref", "-q", "--short", "HEAD"]) {
            version.version = branch;
        }

        version
    }

    fn apply_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(sha) = lookup(SHA_ENV).filter(|s| !s.is_empty()) {
            self.sha = sha;
        }
        if let Some(version) = lookup(VERSION_ENV).filter(|s| !s.is_empty()) {
            self.version = version;
        }
        self
    }
}

fn git(repo_dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_dir)
        .output()
        .map_err(|e| Error::Git(format!("failed to run git: {}", e)))?;

    if !output.status.success() {
        return Err(Error::Git(format!(
            "git {} exited with {}",
            args.join(" "),
            output.status
        )));
    }

    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if text.is_empty() {
        return Err(Error::Git(format!("git {} returned nothing", args.join(" "))));
    }
    Ok(text)
}
