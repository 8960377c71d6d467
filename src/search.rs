use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use log::{debug, error};
use rayon::prelude::*;

use crate::macros::MacroRegistry;
use crate::matcher::{Bindings, LogObserver, MatchSet, Matcher};
use crate::notation::{ParseError, parse_subject};
use crate::pattern_set::NamedPattern;
use crate::pda::AutomatonBundle;
use crate::report::MatchReport;
use crate::tree::Tree;

/// What every subject is searched with. Shared read-only across threads.
pub struct SearchSettings<'a> {
    /// Every pattern is evaluated on every subject and reported separately.
    pub patterns: &'a [NamedPattern],
    pub registry: &'a MacroRegistry,
    pub stop_at_first: bool,
    /// Log each step and keep match traces.
    pub trace: bool,
}

pub struct SearchResult {
    pub matches: Vec<MatchReport>,
    pub file_count: usize,
    /// Subjects that could not be read or parsed.
    pub error_count: usize,
}

impl SearchResult {
    /// 0 = matches found, 1 = no match, 2 = some subject failed.
    pub fn exit_code(&self) -> i32 {
        if self.error_count > 0 {
            2
        } else if self.matches.is_empty() {
            1
        } else {
            0
        }
    }
}

/// Search one subject already loaded into memory. Used for --stdin mode and
/// by [`run_search`] for each file.
pub fn search_source(
    path: &str,
    source: &str,
    settings: &SearchSettings<'_>,
) -> Result<Vec<MatchReport>, ParseError> {
    let tree = parse_subject(source)?;
    let mut run = runner(path, &tree, settings);
    let mut reports = Vec::new();
    for pattern in settings.patterns {
        let verdict = pattern.expr().evaluate(&mut run);
        if !verdict.holds {
            continue;
        }
        if verdict.matches.is_empty() {
            reports.push(MatchReport::whole_file(path, pattern.name()));
        }
        reports.extend(verdict.matches.iter().map(|m| {
            MatchReport::from_match(path, m, settings.trace).for_pattern(pattern.name())
        }));
    }
    reports.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    Ok(reports)
}

/// Searches `tree` with one compiled pattern at a time.
fn runner<'a>(
    path: &'a str,
    tree: &'a Tree,
    settings: &'a SearchSettings<'a>,
) -> impl FnMut(&'a AutomatonBundle) -> MatchSet<'a> {
    move |bundle| {
        let mut matcher =
            Matcher::new(bundle, settings.registry, tree).stop_at_first(settings.stop_at_first);
        if settings.trace {
            matcher.add_observer(Box::new(LogObserver::new(path)));
        }
        matcher.run(Bindings::new())
    }
}

fn search_file(path: &Path, settings: &SearchSettings<'_>) -> Option<Vec<MatchReport>> {
    let display = path.display().to_string();
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            error!("{display}: {e}");
            return None;
        }
    };
    match search_source(&display, &source, settings) {
        Ok(reports) => Some(reports),
        Err(e) => {
            error!("{display}: {e}");
            None
        }
    }
}

pub fn run_search(files: &[PathBuf], settings: &SearchSettings<'_>) -> SearchResult {
    let wall_start = Instant::now();
    let errors = AtomicUsize::new(0);

    let mut matches: Vec<MatchReport> = files
        .par_iter()
        .flat_map(|path| match search_file(path, settings) {
            Some(reports) => reports,
            None => {
                errors.fetch_add(1, Ordering::Relaxed);
                Vec::new()
            }
        })
        .collect();
    matches.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

    debug!(
        "searched {} files in {:.0?}, {} matches",
        files.len(),
        wall_start.elapsed(),
        matches.len()
    );

    SearchResult {
        matches,
        file_count: files.len(),
        error_count: errors.into_inner(),
    }
}
