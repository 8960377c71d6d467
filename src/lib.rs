pub mod cli;
pub mod compiler;
pub mod config;
pub mod formatter;
pub mod fs;
pub mod macros;
pub mod matcher;
pub mod notation;
pub mod pattern_set;
pub mod pda;
pub mod report;
pub mod search;
pub mod tree;

#[cfg(test)]
pub mod testutil;

use std::io::Read;

use anyhow::{Context, Result, bail};
use log::debug;

use cli::Args;
use compiler::compile;
use config::load_config;
use formatter::create_formatter;
use fs::discover_files;
use macros::MacroRegistry;
use notation::parse_pattern;
use pattern_set::{NamedPattern, load_pattern};
use search::{SearchSettings, run_search, search_source};

/// Run a search. Returns the exit code: 0 = matches found, 1 = no match,
/// 2 = a subject could not be read or parsed.
pub fn run(args: Args) -> Result<i32> {
    let paths = args.search_paths();
    let target_dir = paths.first().map(|p| {
        if p.is_file() {
            p.parent().unwrap_or(p)
        } else {
            p.as_path()
        }
    });
    let config_start = std::time::Instant::now();
    let config = load_config(args.config.as_deref(), target_dir)?;
    match config.config_dir() {
        Some(dir) => debug!("config loaded from {} in {:.0?}", dir.display(), config_start.elapsed()),
        None => debug!("no config file found"),
    }

    let mut registry = MacroRegistry::with_options(config.compile_options());
    for path in config.macro_files().iter().chain(&args.macros) {
        registry
            .load_file(path)
            .with_context(|| format!("failed to load macros from {}", path.display()))?;
    }
    debug!("{} macros registered", registry.len());

    let patterns = if let Some(source) = args.inline_pattern() {
        let pattern = parse_pattern(source).context("invalid pattern")?;
        let bundle =
            compile(&pattern, &registry, registry.options()).context("failed to compile pattern")?;
        debug!(
            "pattern compiled: {} automata, {} states in main",
            bundle.len(),
            bundle.main().state_count()
        );
        vec![NamedPattern::unnamed(bundle)]
    } else if !args.pattern_sets.is_empty() {
        args.pattern_sets
            .iter()
            .map(|path| load_pattern(path, &registry))
            .collect::<Result<Vec<_>>>()?
    } else {
        bail!("no pattern given: pass a PATTERN or at least one -P PATH");
    };

    // --dump-automaton: print the compiled automata and exit
    if args.dump_automaton {
        // An inline pattern dumps its bundle as is; pattern sets dump their tree.
        let inline = patterns
            .first()
            .filter(|p| p.name().is_none())
            .and_then(|p| p.expr().as_bundle());
        let json = match inline {
            Some(bundle) => serde_json::to_string_pretty(bundle),
            None => serde_json::to_string_pretty(&patterns),
        }
        .context("failed to serialize automaton")?;
        println!("{json}");
        return Ok(0);
    }

    let settings = SearchSettings {
        patterns: &patterns,
        registry: &registry,
        stop_at_first: args.first || config.stop_at_first(),
        trace: args.trace,
    };
    let formatter = create_formatter(&args.format);

    // --stdin: read one subject from stdin
    if let Some(ref display_path) = args.stdin {
        let mut input = String::new();
        std::io::stdin().read_to_string(&mut input)?;
        let display = display_path.display().to_string();
        let matches = match search_source(&display, &input, &settings) {
            Ok(matches) => matches,
            Err(e) => {
                log::error!("{display}: {e}");
                return Ok(2);
            }
        };
        formatter.print(&matches, &[display_path.clone()]);
        return Ok(if matches.is_empty() { 1 } else { 0 });
    }

    let files = discover_files(&paths, &config)?;

    // --list-target-files: print the files that would be searched and exit
    if args.list_target_files {
        for file in &files {
            println!("{}", file.display());
        }
        return Ok(0);
    }

    debug!("{} files to search", files.len());
    let result = run_search(&files, &settings);
    formatter.print(&result.matches, &files);
    Ok(result.exit_code())
}
