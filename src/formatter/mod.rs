pub mod files;
pub mod json;
pub mod quiet;
pub mod text;

use std::io::Write;
use std::path::PathBuf;

use crate::report::MatchReport;

pub trait Formatter {
    fn format_to(&self, matches: &[MatchReport], files: &[PathBuf], out: &mut dyn Write);

    fn print(&self, matches: &[MatchReport], files: &[PathBuf]) {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        self.format_to(matches, files, &mut lock);
    }
}

pub fn create_formatter(format: &str) -> Box<dyn Formatter> {
    match format {
        "json" => Box::new(json::JsonFormatter),
        "quiet" => Box::new(quiet::QuietFormatter),
        "files" => Box::new(files::FilesFormatter),
        // "text" and any unknown value
        _ => Box::new(text::TextFormatter),
    }
}

/// "1 match" / "2 matches".
pub(crate) fn plural(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{count} {singular}")
    } else {
        format!("{count} {plural}")
    }
}

#[cfg(test)]
pub(crate) fn sample_report(path: &str, line: usize) -> MatchReport {
    use crate::report::BoundNode;

    let mut bindings = std::collections::BTreeMap::new();
    bindings.insert(
        "x".to_string(),
        Some(BoundNode {
            kind: "name".to_string(),
            text: "(name a)".to_string(),
            line,
            column: 3,
        }),
    );
    bindings.insert("y".to_string(), None);
    MatchReport {
        path: path.to_string(),
        pattern: None,
        line,
        column: 1,
        step: 7,
        bindings,
        trace: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [&str; 4] = ["text", "json", "quiet", "files"];

    #[test]
    fn create_all_formatters() {
        for name in ALL {
            let _f = create_formatter(name);
        }
        // unknown defaults to text
        let _f = create_formatter("anything_else");
    }

    #[test]
    fn all_formatters_run_without_panic() {
        let files = vec![PathBuf::from("a.tree")];
        let matches = vec![sample_report("a.tree", 1)];
        for name in ALL {
            let f = create_formatter(name);
            let mut buf = Vec::new();
            f.format_to(&[], &[], &mut buf);
            f.format_to(&matches, &files, &mut buf);
        }
    }

    #[test]
    fn pluralization() {
        assert_eq!(plural(1, "file", "files"), "1 file");
        assert_eq!(plural(0, "file", "files"), "0 files");
        assert_eq!(plural(3, "match", "matches"), "3 matches");
    }

    mod prop_tests {
        use super::*;
        use proptest::prelude::*;

        fn report_strategy() -> impl Strategy<Value = MatchReport> {
            ("[a-z]{1,10}\\.tree", 1usize..500).prop_map(|(path, line)| sample_report(&path, line))
        }

        proptest! {
            #[test]
            fn json_output_is_valid_json(
                matches in prop::collection::vec(report_strategy(), 0..10),
                file_count in 0usize..20,
            ) {
                let files: Vec<PathBuf> = (0..file_count).map(|i| PathBuf::from(format!("{i}.tree"))).collect();
                let mut buf = Vec::new();
                create_formatter("json").format_to(&matches, &files, &mut buf);
                let parsed: serde_json::Value = serde_json::from_slice(&buf).unwrap();
                prop_assert_eq!(parsed["metadata"]["match_count"].as_u64().unwrap() as usize, matches.len());
                prop_assert_eq!(parsed["metadata"]["files_searched"].as_u64().unwrap() as usize, file_count);
                prop_assert_eq!(parsed["matches"].as_array().unwrap().len(), matches.len());
            }

            #[test]
            fn text_lists_every_match(matches in prop::collection::vec(report_strategy(), 0..10)) {
                let mut buf = Vec::new();
                create_formatter("text").format_to(&matches, &[], &mut buf);
                let out = String::from_utf8(buf).unwrap();
                prop_assert_eq!(out.matches(": match").count(), matches.len());
            }
        }
    }
}
