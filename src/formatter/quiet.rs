use std::io::Write;
use std::path::PathBuf;

use crate::formatter::{Formatter, plural};
use crate::report::MatchReport;

/// Like text, but silent when nothing matched.
pub struct QuietFormatter;

impl Formatter for QuietFormatter {
    fn format_to(&self, matches: &[MatchReport], files: &[PathBuf], out: &mut dyn Write) {
        if matches.is_empty() {
            return;
        }
        for m in matches {
            let _ = writeln!(out, "{m}");
        }
        let _ = writeln!(
            out,
            "\n{} searched, {} found",
            plural(files.len(), "file", "files"),
            plural(matches.len(), "match", "matches"),
        );
    }
}
