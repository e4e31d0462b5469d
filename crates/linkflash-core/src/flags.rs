//! Build flag resolution
//!
//! Flags are collected from an ordered list of plain-text source files
//! (`user_defines.txt`, target overlays, ...). Each line is a candidate flag:
//!
//! ```text
//! -DRegulatory_Domain_ISM_2400
//! -DDEVICE_NAME="My TX"
//! !-DUSE_TX_BACKPACK
//! -DHAS_FAN -DHAS_THERMAL
//! ```
//!
//! Only lines starting with `-D` or `!-D` are taken. A `!-D...` token is a
//! removal directive: once all sources are read, every occurrence of the
//! directive and of its `-D...` body is erased from every accumulated entry.
//! Erasure is a substring operation, so a directive can strip one flag out of
//! a line that bundles several. A directive that is a textual prefix of an
//! unrelated flag strips that prefix too; flag authors must avoid ambiguous
//! names.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Prefix of a compiler define
pub const DEFINE_PREFIX: &str = "-D";
/// Prefix of a removal directive
pub const REMOVAL_PREFIX: &str = "!-D";

static DEVICE_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(.*)=\w*'?"(.*)"'?$"#).expect("Invalid DEVICE_NAME regex")
});
static REMOVAL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!-D\s*\S+").expect("Invalid removal directive regex"));

/// Returns true if the token is a define or a removal directive
pub fn is_define(token: &str) -> bool {
    token.starts_with(DEFINE_PREFIX) || token.starts_with(REMOVAL_PREFIX)
}

/// Extract the quoted payload of a `DEVICE_NAME=` assignment
pub fn extract_device_name(token: &str) -> Option<&str> {
    if !token.contains("DEVICE_NAME=") {
        return None;
    }
    DEVICE_NAME_REGEX
        .captures(token)
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str())
        .filter(|name| !name.is_empty())
}

/// Accumulates flags from layered sources for a single build
///
/// Construct one per build, feed it sources, then call [`finalize`] to apply
/// removal directives and obtain the immutable [`ResolvedFlags`].
///
/// [`finalize`]: FlagResolver::finalize
#[derive(Debug, Default, Clone)]
pub struct FlagResolver {
    flags: Vec<String>,
    device_name: Option<String>,
}

impl FlagResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the resolver with an earlier-stage flag list
    ///
    /// These flags are kept as-is (including non-define flags such as
    /// `-Wall` or include paths) and are not scanned for `DEVICE_NAME`.
    pub fn with_base_flags<I, S>(flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut resolver = Self::new();
        for flag in flags {
            resolver.push_flag(flag);
        }
        resolver
    }

    /// Read a flag source file
    ///
    /// A missing source is skipped with a warning and yields `Ok(0)`.
    /// Returns the number of flags newly added.
    pub fn add_source(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        if !path.is_file() {
            log::warn!("File '{}' does not exist", path.display());
            return Ok(0);
        }

        let content = fs::read_to_string(path).map_err(|source| Error::SourceRead {
            path: path.to_path_buf(),
            source,
        })?;

        let added = self.add_lines(content.lines());
        log::debug!("Read {} new flag(s) from {}", added, path.display());
        Ok(added)
    }

    /// Feed raw candidate lines, as if read from a source file
    pub fn add_lines<I, S>(&mut self, lines: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        lines
            .into_iter()
            .filter(|line| self.process_candidate(line.as_ref()))
            .count()
    }

    /// Append a flag verbatim unless it is already present
    pub fn push_flag(&mut self, flag: impl Into<String>) -> bool {
        let flag = flag.into();
        if self.flags.contains(&flag) {
            return false;
        }
        self.flags.push(flag);
        true
    }

    /// Device name captured so far from `DEVICE_NAME="..."` flags
    pub fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }

    /// Flags accumulated so far, removal directives not yet applied
    pub fn pending(&self) -> &[String] {
        &self.flags
    }

    fn process_candidate(&mut self, line: &str) -> bool {
        let candidate = line.trim();
        if candidate.is_empty() || !is_define(candidate) {
            return false;
        }

        if let Some(name) = extract_device_name(candidate) {
            log::debug!("Device name: {}", name);
            self.device_name = Some(name.to_string());
        }

        self.push_flag(candidate)
    }

    /// Apply removal directives and produce the final flag set
    pub fn finalize(self) -> ResolvedFlags {
        let directives: Vec<String> = self
            .flags
            .iter()
            .flat_map(|line| REMOVAL_REGEX.find_iter(line))
            .map(|m| m.as_str().to_string())
            .collect();

        let mut entries = self.flags;
        for directive in &directives {
            // Strip the leading '!' to get the flag being cancelled
            let cancelled = &directive[1..];
            for entry in entries.iter_mut() {
                if entry.contains(directive.as_str()) {
                    *entry = entry.replace(directive.as_str(), "");
                }
                if entry.contains(cancelled) {
                    *entry = entry.replace(cancelled, "");
                }
            }
            log::debug!("Applied removal directive {}", directive);
        }

        let mut flags: Vec<String> = Vec::with_capacity(entries.len());
        for entry in entries {
            let entry = entry.trim();
            if entry.is_empty() || entry.starts_with(REMOVAL_PREFIX) {
                continue;
            }
            if !flags.iter().any(|f| f == entry) {
                flags.push(entry.to_string());
            }
        }

        ResolvedFlags {
            flags,
            device_name: self.device_name,
        }
    }
}

/// Resolve a list of flag sources in one pass
///
/// Unreadable sources are logged and skipped, like missing ones.
pub fn resolve<I, P>(sources: I) -> ResolvedFlags
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut resolver = FlagResolver::new();
    for source in sources {
        if let Err(e) = resolver.add_source(source) {
            log::warn!("{}", e);
        }
    }
    resolver.finalize()
}

/// The final, immutable flag set of a build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFlags {
    flags: Vec<String>,
    device_name: Option<String>,
}

impl ResolvedFlags {
    /// Flags in first-insertion order
    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    pub fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }

    pub fn contains(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.flags.iter().map(String::as_str)
    }

    /// Render as a flag source, one flag per line
    pub fn to_source_text(&self) -> String {
        let mut text = self.flags.join("\n");
        text.push('\n');
        text
    }

    pub fn into_vec(self) -> Vec<String> {
        self.flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn source(dir: &tempfile::TempDir, name: &str, lines: &[&str]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        path
    }

    #[test]
    fn test_missing_source_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let present = source(&dir, "user_defines.txt", &["-DHAS_FAN"]);
        let resolved = resolve([dir.path().join("nope.txt"), present]);
        assert_eq!(resolved.flags(), &["-DHAS_FAN".to_string()]);
    }

    #[test]
    fn test_only_defines_are_accepted() {
        let mut resolver = FlagResolver::new();
        let added = resolver.add_lines([
            "# comment",
            "",
            "   -DREG_DOMAIN_ISM_2400  ",
            "-Wall",
            "plain text",
            "!-DUNUSED",
        ]);
        assert_eq!(added, 2);
        assert_eq!(
            resolver.pending(),
            &["-DREG_DOMAIN_ISM_2400".to_string(), "!-DUNUSED".to_string()]
        );
    }

    #[test]
    fn test_duplicates_keep_first_position() {
        let mut resolver = FlagResolver::new();
        resolver.add_lines(["-DA", "-DB", "-DA", "-DC", "-DB"]);
        let resolved = resolver.finalize();
        assert_eq!(resolved.flags(), &["-DA", "-DB", "-DC"]);
    }

    #[test]
    fn test_absent_flag_never_appears() {
        let dir = tempfile::tempdir().unwrap();
        let a = source(&dir, "a.txt", &["-DONE", "-DTWO"]);
        let b = source(&dir, "b.txt", &["-DTHREE"]);
        let resolved = resolve([a, b]);
        assert!(!resolved.contains("-DFOUR"));
        assert_eq!(resolved.len(), 3);
    }

    #[test]
    fn test_removal_after_flag() {
        let dir = tempfile::tempdir().unwrap();
        let a = source(&dir, "a.txt", &["-DUSE_BACKPACK", "-DHAS_FAN"]);
        let b = source(&dir, "b.txt", &["!-DUSE_BACKPACK"]);
        let resolved = resolve([a, b]);
        assert_eq!(resolved.flags(), &["-DHAS_FAN"]);
    }

    #[test]
    fn test_removal_before_flag() {
        let dir = tempfile::tempdir().unwrap();
        let a = source(&dir, "a.txt", &["!-DUSE_BACKPACK"]);
        let b = source(&dir, "b.txt", &["-DHAS_FAN", "-DUSE_BACKPACK"]);
        let resolved = resolve([a, b]);
        assert_eq!(resolved.flags(), &["-DHAS_FAN"]);
        assert!(resolved.iter().all(|f| !f.contains("USE_BACKPACK")));
    }

    #[test]
    fn test_removal_inside_compound_line() {
        let mut resolver = FlagResolver::new();
        resolver.add_lines(["-DHAS_FAN -DHAS_THERMAL -DHAS_GSENSOR", "!-DHAS_THERMAL"]);
        let resolved = resolver.finalize();
        assert_eq!(resolved.flags(), &["-DHAS_FAN  -DHAS_GSENSOR"]);
    }

    #[test]
    fn test_removal_directive_bundled_with_other_flags() {
        let mut resolver = FlagResolver::new();
        resolver.add_lines(["-DLOCK_ON_FIRST_CONNECTION", "-DHAS_FAN !-DLOCK_ON_FIRST_CONNECTION"]);
        let resolved = resolver.finalize();
        assert_eq!(resolved.flags(), &["-DHAS_FAN"]);
    }

    #[test]
    fn test_removal_strips_matching_prefix() {
        // Substring erasure also hits flags that merely start with the body
        let mut resolver = FlagResolver::new();
        resolver.add_lines(["-DRADIO_SX128X", "-DRADIO_SX128X_LR", "!-DRADIO_SX128X"]);
        let resolved = resolver.finalize();
        assert_eq!(resolved.flags(), &["_LR"]);
    }

    #[test]
    fn test_removal_with_whitespace_after_prefix() {
        let mut resolver = FlagResolver::new();
        resolver.add_lines(["-D FOO", "!-D FOO", "-DBAR"]);
        let resolved = resolver.finalize();
        assert_eq!(resolved.flags(), &["-DBAR"]);
    }

    #[test]
    fn test_erasure_does_not_create_duplicates() {
        let mut resolver = FlagResolver::new();
        resolver.add_lines(["-DA", "-DA -DB", "!-DB"]);
        let resolved = resolver.finalize();
        assert_eq!(resolved.flags(), &["-DA"]);
    }

    #[test]
    fn test_device_name_extraction() {
        assert_eq!(extract_device_name(r#"-DDEVICE_NAME="Zorro TX""#), Some("Zorro TX"));
        assert_eq!(extract_device_name(r#"-DDEVICE_NAME='"RX"'"#), Some("RX"));
        assert_eq!(extract_device_name(r#"-DDEVICE_NAME="""#), None);
        assert_eq!(extract_device_name("-DDEVICE_NAME=bare"), None);
        assert_eq!(extract_device_name(r#"-DOTHER="x""#), None);
    }

    #[test]
    fn test_device_name_from_any_source_order() {
        let dir = tempfile::tempdir().unwrap();
        let named = source(&dir, "named.txt", &[r#"-DDEVICE_NAME="Bench TX""#]);
        let other = source(&dir, "other.txt", &["-DHAS_FAN"]);

        let first = resolve([&named, &other]);
        let last = resolve([&other, &named]);
        assert_eq!(first.device_name(), Some("Bench TX"));
        assert_eq!(last.device_name(), Some("Bench TX"));
    }

    #[test]
    fn test_device_name_captured_from_removed_flag() {
        let mut resolver = FlagResolver::new();
        resolver.add_lines([r#"!-DDEVICE_NAME="Gone""#]);
        let resolved = resolver.finalize();
        assert_eq!(resolved.device_name(), Some("Gone"));
        assert!(resolved.is_empty());
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let a = source(
            &dir,
            "a.txt",
            &[
                "-DHAS_FAN -DHAS_THERMAL",
                r#"-DDEVICE_NAME="Idem""#,
                "-DUSE_BACKPACK",
            ],
        );
        let b = source(&dir, "b.txt", &["!-DHAS_THERMAL", "!-DUSE_BACKPACK", "-DHAS_FAN"]);
        let once = resolve([a, b]);

        let again_path = dir.path().join("resolved.txt");
        fs::write(&again_path, once.to_source_text()).unwrap();
        let twice = resolve([again_path]);

        assert_eq!(once, twice);
    }

    #[test]
    fn test_base_flags_pass_through() {
        let mut resolver = FlagResolver::with_base_flags(["-Wall", "-Iinclude"]);
        resolver.add_lines(["-DHAS_FAN", "-Wextra"]);
        let resolved = resolver.finalize();
        assert_eq!(resolved.flags(), &["-Wall", "-Iinclude", "-DHAS_FAN"]);
    }
}
