//! Time pattern compilation and matching on generated subject trees.
//!
//! Usage:
//!   cargo run --release --bin bench_treepat              # all scenarios
//!   cargo run --release --bin bench_treepat -- search    # search only
//!   cargo run --release --bin bench_treepat -- --size 2000 --runs 10

use std::fmt::Write;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;

use treepat::compiler::compile;
use treepat::macros::MacroRegistry;
use treepat::matcher::{Bindings, find_matches};
use treepat::notation::{parse_pattern, parse_subject};

// --- CLI ---

#[derive(Parser)]
#[command(about = "Benchmark treepat on generated subjects. Prints a markdown table.")]
struct Args {
    /// Scenario: compile, search, macro, or omit for all
    #[arg(default_value = "all")]
    mode: String,

    /// Statements per generated subject
    #[arg(long, default_value_t = 500)]
    size: usize,

    /// Timed runs per scenario
    #[arg(long, default_value_t = 5)]
    runs: u32,

    /// Also write the table to this file
    #[arg(long)]
    output: Option<PathBuf>,
}

const INCR: &str = "\
?#DEFINE Incr | ?i ?v = (number 1)
?#plus_eq (expr_stmt ?i += ?v)
?#plus (expr_stmt ?i = (arith_expr ?i + ?v))
";

const SWAP: &str = "\
?#DEFINE Swap &
?#save (expr_stmt (name t) = ?)
?#restore (expr_stmt ? = (name t))
";

struct Scenario {
    name: &'static str,
    pattern: &'static str,
    uses_macros: bool,
}

static SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "flat",
        pattern: "(file_input (expr_stmt ?x = ?y) \"<EOF>\")",
        uses_macros: false,
    },
    Scenario {
        name: "repeat-binding",
        pattern: "(file_input (expr_stmt ?x = (arith_expr ?x + ?)) \"<EOF>\")",
        uses_macros: false,
    },
    Scenario {
        name: "search",
        pattern: "(file_input (?: (return_stmt return ?)) \"<EOF>\")",
        uses_macros: false,
    },
    Scenario {
        name: "any-of",
        pattern: "(file_input (?@Incr ?n) \"<EOF>\")",
        uses_macros: true,
    },
    Scenario {
        name: "all-of",
        pattern: "(file_input ?@Swap \"<EOF>\")",
        uses_macros: true,
    },
];

struct Timing {
    name: &'static str,
    compile: f64,
    search: f64,
    matches: usize,
}

/// A flat module of `size` statements mixing assignments, increments and
/// small functions.
fn generate_subject(size: usize) -> String {
    let mut out = String::from("(file_input\n");
    for i in 0..size {
        let name = format!("v{}", i % 17);
        let _ = match i % 5 {
            0 => writeln!(out, "  (expr_stmt (name {name}) = (number {i}))"),
            1 => writeln!(out, "  (expr_stmt (name {name}) += (number 1))"),
            2 => writeln!(
                out,
                "  (expr_stmt (name {name}) = (arith_expr (name {name}) + (number 1)))"
            ),
            3 => writeln!(
                out,
                "  (funcdef def (name f{i}) (block (if_stmt if (name {name}) (block (return_stmt return (name {name}))))))"
            ),
            _ => writeln!(out, "  (expr_stmt (name t) = (name {name}))"),
        };
    }
    out.push_str("  \"<EOF>\")\n");
    out
}

fn format_time(seconds: f64) -> String {
    if seconds < 0.001 {
        format!("{:.0}us", seconds * 1_000_000.0)
    } else if seconds < 1.0 {
        format!("{:.1}ms", seconds * 1000.0)
    } else {
        format!("{seconds:.2}s")
    }
}

fn run_scenario(scenario: &Scenario, subject_src: &str, args: &Args) -> Timing {
    let mut registry = MacroRegistry::new();
    if scenario.uses_macros {
        for defs in [INCR, SWAP] {
            if let Err(e) = registry.load_definitions(defs) {
                eprintln!("bad macro definitions: {e}");
                std::process::exit(1);
            }
        }
    }
    let pattern = match parse_pattern(scenario.pattern) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{}: bad pattern: {e}", scenario.name);
            std::process::exit(1);
        }
    };
    let subject = match parse_subject(subject_src) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("bad generated subject: {e}");
            std::process::exit(1);
        }
    };

    let mut compile_total = 0.0;
    let mut search_total = 0.0;
    let mut matches = 0;
    for _ in 0..args.runs {
        let start = Instant::now();
        let bundle = match compile(&pattern, &registry, registry.options()) {
            Ok(b) => b,
            Err(e) => {
                eprintln!("{}: {e}", scenario.name);
                std::process::exit(1);
            }
        };
        compile_total += start.elapsed().as_secs_f64();

        let start = Instant::now();
        matches = find_matches(&bundle, &registry, &subject, false, Bindings::new()).len();
        search_total += start.elapsed().as_secs_f64();
    }

    let runs = f64::from(args.runs.max(1));
    Timing {
        name: scenario.name,
        compile: compile_total / runs,
        search: search_total / runs,
        matches,
    }
}

fn generate_report(timings: &[Timing], args: &Args) -> String {
    let mut md = String::new();
    let _ = writeln!(md, "# treepat benchmark\n");
    let _ = writeln!(md, "{} statements per subject, {} runs\n", args.size, args.runs);
    let _ = writeln!(md, "| scenario | compile | search | matches |");
    let _ = writeln!(md, "|---|---:|---:|---:|");
    for t in timings {
        let _ = writeln!(
            md,
            "| {} | {} | {} | {} |",
            t.name,
            format_time(t.compile),
            format_time(t.search),
            t.matches
        );
    }
    md
}

fn main() {
    let args = Args::parse();
    let selected: Vec<&Scenario> = match args.mode.as_str() {
        "all" => SCENARIOS.iter().collect(),
        "compile" | "search" => SCENARIOS.iter().filter(|s| !s.uses_macros).collect(),
        "macro" => SCENARIOS.iter().filter(|s| s.uses_macros).collect(),
        other => {
            eprintln!("Unknown mode: {other}. Use: compile, search, macro, or all.");
            std::process::exit(1);
        }
    };

    let subject = generate_subject(args.size);
    let bench_start = Instant::now();
    let timings: Vec<Timing> = selected
        .into_iter()
        .map(|s| {
            eprintln!("running {}...", s.name);
            run_scenario(s, &subject, &args)
        })
        .collect();
    eprintln!("done in {}", format_time(bench_start.elapsed().as_secs_f64()));

    let md = generate_report(&timings, &args);
    print!("{md}");
    if let Some(path) = &args.output {
        match fs::write(path, &md) {
            Ok(()) => eprintln!("\nWrote {}", path.display()),
            Err(e) => {
                eprintln!("failed to write {}: {e}", path.display());
                std::process::exit(1);
            }
        }
    }
}
