//! Cheerline CLI
//!
//! `cheerline simulate --target 5 -m 2.5:Alex` creates a run on an
//! in-process authority, replays a position track through the delivery
//! engine, and prints the completed run as JSON on stdout. Spoken messages
//! and logs go to stderr.

mod commands;
mod parse;
mod simulate;

use std::process;

use commands::build_cli;
use parse::{parse_simulate, CliConfig};

fn main() {
    let matches = build_cli().get_matches();

    let config = match CliConfig::load(matches.get_one::<String>("config")) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(2);
        }
    };

    match config.level(matches.get_flag("verbose")) {
        Ok(level) => tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .init(),
        Err(e) => {
            eprintln!("{}", e);
            process::exit(2);
        }
    }

    let result = match matches.subcommand() {
        Some(("simulate", sub)) => {
            parse_simulate(sub).and_then(|args| simulate::run(args, config))
        }
        _ => Err("unknown command".to_string()),
    };

    match result {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("(error) {}", e);
            process::exit(1);
        }
    }
}
