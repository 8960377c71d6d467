use std::collections::BTreeSet;
use std::io::Write;
use std::path::PathBuf;

use crate::formatter::Formatter;
use crate::report::MatchReport;

/// Paths of files with at least one match.
pub struct FilesFormatter;

impl Formatter for FilesFormatter {
    fn format_to(&self, matches: &[MatchReport], _files: &[PathBuf], out: &mut dyn Write) {
        // Deduplicate and sort file paths
        let paths: BTreeSet<&str> = matches.iter().map(|m| m.path.as_str()).collect();
        for path in paths {
            let _ = writeln!(out, "{path}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::sample_report;

    fn render(matches: &[MatchReport]) -> String {
        let mut buf = Vec::new();
        FilesFormatter.format_to(matches, &[], &mut buf);
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn empty_produces_no_output() {
        assert_eq!(render(&[]), "");
    }

    #[test]
    fn deduplicates_and_sorts() {
        let out = render(&[
            sample_report("c.tree", 1),
            sample_report("a.tree", 1),
            sample_report("c.tree", 9),
        ]);
        assert_eq!(out, "a.tree\nc.tree\n");
    }
}
