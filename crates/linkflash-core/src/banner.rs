//! Conspicuous warning banner for configuration errors that halt a build

use crate::error::Error;
use std::io::Write;

const RULE: &str = "%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%";
const HEADLINE: &str = "!!!              linkflash Warning Below             !!!";

/// Render the banner text for `message`
pub fn render(message: &str) -> String {
    format!("\n\n{RULE}\n{HEADLINE}\n{RULE}\n  {message} \n{RULE}\n\n\n")
}

/// Print the banner to `out` and return the error that aborts the build
pub fn fatal_to<W: Write>(out: &mut W, message: impl Into<String>) -> Error {
    let message = message.into();
    // Best effort: the returned error still carries the message
    let _ = out.write_all(render(&message).as_bytes());
    let _ = out.flush();
    Error::FatalConfiguration(message)
}

/// Print the banner to stderr and return the error that aborts the build
pub fn fatal(message: impl Into<String>) -> Error {
    fatal_to(&mut std::io::stderr().lock(), message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banner_frames_message() {
        let mut out = Vec::new();
        let err = fatal_to(&mut out, "Please define a regulatory domain");
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains(RULE));
        assert!(text.contains("  Please define a regulatory domain \n"));
        assert_eq!(text.matches(RULE).count(), 3);
        assert_eq!(err.to_string(), "!!! Please define a regulatory domain !!!");
    }
}
