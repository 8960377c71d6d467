use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "treepat",
    version,
    about = "Structural pattern matching over syntax trees"
)]
pub struct Args {
    /// Pattern in tree notation, e.g. '(block (return_stmt return ?x))'.
    /// With -P it is read as the first path instead.
    pub pattern: Option<String>,

    /// Subject files or directories to search [default: .]
    pub paths: Vec<PathBuf>,

    /// Load a named pattern file or pattern directory (repeatable)
    #[arg(short = 'P', long = "patterns", value_name = "PATH")]
    pub pattern_sets: Vec<PathBuf>,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Load macro definitions from FILE (repeatable)
    #[arg(short, long = "macros", value_name = "FILE")]
    pub macros: Vec<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "text", value_parser = ["text", "json", "quiet", "files"])]
    pub format: String,

    /// Stop each subject at its first match
    #[arg(long)]
    pub first: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,

    /// Log every search step and include match traces in the output
    #[arg(long)]
    pub trace: bool,

    /// Print the compiled automata as JSON, then exit
    #[arg(long)]
    pub dump_automaton: bool,

    /// Read one subject from stdin, use PATH for display
    #[arg(long, value_name = "PATH")]
    pub stdin: Option<PathBuf>,

    /// Print files that would be searched, then exit
    #[arg(short = 'L', long)]
    pub list_target_files: bool,
}

impl Args {
    /// The paths to search. When pattern sets are given there is no inline
    /// pattern, so the first positional is a path too.
    pub fn search_paths(&self) -> Vec<PathBuf> {
        let mut paths = Vec::with_capacity(self.paths.len() + 1);
        if !self.pattern_sets.is_empty() {
            paths.extend(self.pattern.as_ref().map(PathBuf::from));
        }
        paths.extend(self.paths.iter().cloned());
        if paths.is_empty() {
            paths.push(PathBuf::from("."));
        }
        paths
    }

    /// The inline pattern, unless pattern sets replace it.
    pub fn inline_pattern(&self) -> Option<&str> {
        if self.pattern_sets.is_empty() {
            self.pattern.as_deref()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["treepat", "(a ?x)"]).unwrap();
        assert_eq!(args.inline_pattern(), Some("(a ?x)"));
        assert_eq!(args.search_paths(), vec![PathBuf::from(".")]);
        assert_eq!(args.format, "text");
        assert!(!args.first && !args.trace && !args.dump_automaton);
    }

    #[test]
    fn repeated_macro_files() {
        let args = Args::try_parse_from([
            "treepat", "-m", "a.tpat", "--macros", "b.tpat", "(a)", "src", "lib",
        ])
        .unwrap();
        assert_eq!(
            args.macros,
            vec![PathBuf::from("a.tpat"), PathBuf::from("b.tpat")]
        );
        assert_eq!(args.paths, vec![PathBuf::from("src"), PathBuf::from("lib")]);
    }

    #[test]
    fn pattern_sets_turn_the_pattern_into_a_path() {
        let args =
            Args::try_parse_from(["treepat", "-P", "sets/loops", "--patterns", "one.pat", "src"])
                .unwrap();
        assert_eq!(
            args.pattern_sets,
            vec![PathBuf::from("sets/loops"), PathBuf::from("one.pat")]
        );
        assert_eq!(args.inline_pattern(), None);
        assert_eq!(args.search_paths(), vec![PathBuf::from("src")]);

        let args = Args::try_parse_from(["treepat", "-P", "sets", "a", "b"]).unwrap();
        assert_eq!(args.search_paths(), vec![PathBuf::from("a"), PathBuf::from("b")]);

        let args = Args::try_parse_from(["treepat", "-P", "sets"]).unwrap();
        assert_eq!(args.search_paths(), vec![PathBuf::from(".")]);
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(Args::try_parse_from(["treepat", "-f", "xml", "(a)"]).is_err());
    }
}
