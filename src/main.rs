use std::process;

use clap::Parser;
use log::LevelFilter;

use treepat::cli::Args;

fn main() {
    let args = Args::parse();

    let level = if args.trace {
        LevelFilter::Trace
    } else if args.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_env("TREEPAT_LOG")
        .format_timestamp(None)
        .init();

    match treepat::run(args) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(3);
        }
    }
}
