use std::io::Write;
use std::path::PathBuf;

use crate::formatter::{Formatter, plural};
use crate::report::MatchReport;

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_to(&self, matches: &[MatchReport], files: &[PathBuf], out: &mut dyn Write) {
        for m in matches {
            let _ = writeln!(out, "{m}");
            for line in &m.trace {
                let _ = writeln!(out, "    {line}");
            }
        }
        let _ = writeln!(
            out,
            "\n{} searched, {} found",
            plural(files.len(), "file", "files"),
            plural(matches.len(), "match", "matches"),
        );
    }
}
