use std::io::Write;
use std::path::PathBuf;

use serde::Serialize;

use crate::formatter::Formatter;
use crate::report::MatchReport;

pub struct JsonFormatter;

#[derive(Serialize)]
struct JsonOutput<'a> {
    metadata: Metadata,
    matches: &'a [MatchReport],
}

#[derive(Serialize)]
struct Metadata {
    files_searched: usize,
    match_count: usize,
    files_with_matches: usize,
}

impl Formatter for JsonFormatter {
    fn format_to(&self, matches: &[MatchReport], files: &[PathBuf], out: &mut dyn Write) {
        let mut paths: Vec<&str> = matches.iter().map(|m| m.path.as_str()).collect();
        paths.dedup();
        let output = JsonOutput {
            metadata: Metadata {
                files_searched: files.len(),
                match_count: matches.len(),
                files_with_matches: paths.len(),
            },
            matches,
        };
        match serde_json::to_string_pretty(&output) {
            Ok(json) => {
                let _ = writeln!(out, "{json}");
            }
            Err(e) => log::error!("failed to serialize matches: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::sample_report;

    fn render(matches: &[MatchReport], files: &[PathBuf]) -> serde_json::Value {
        let mut buf = Vec::new();
        JsonFormatter.format_to(matches, files, &mut buf);
        serde_json::from_slice(&buf).unwrap()
    }

    #[test]
    fn empty_produces_valid_json() {
        let parsed = render(&[], &[]);
        assert_eq!(parsed["metadata"]["files_searched"], 0);
        assert_eq!(parsed["metadata"]["match_count"], 0);
        assert_eq!(parsed["matches"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn match_fields_present() {
        let files = [PathBuf::from("a.tree"), PathBuf::from("b.tree")];
        let parsed = render(
            &[sample_report("a.tree", 2), sample_report("a.tree", 5)],
            &files,
        );
        assert_eq!(parsed["metadata"]["files_searched"], 2);
        assert_eq!(parsed["metadata"]["files_with_matches"], 1);
        let first = &parsed["matches"][0];
        assert_eq!(first["path"], "a.tree");
        assert_eq!(first["line"], 2);
        assert_eq!(first["step"], 7);
        assert_eq!(first["bindings"]["x"]["text"], "(name a)");
        assert!(first["bindings"]["y"].is_null());
        assert!(first.get("trace").is_none());
    }
}
