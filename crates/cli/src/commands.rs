//! clap command tree

use clap::{Arg, ArgAction, Command};

/// Build the top-level `cheerline` command
pub fn build_cli() -> Command {
    Command::new("cheerline")
        .about("Distance-triggered encouragement messages for runners")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_name("FILE")
                .help("TOML file with [engine] and [authority] tables"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log at debug level"),
        )
        .subcommand(simulate_command())
}

fn simulate_command() -> Command {
    Command::new("simulate")
        .about("Create a run, replay a track through the engine and print the completed run")
        .arg(
            Arg::new("title")
                .long("title")
                .default_value("Simulated run")
                .help("Run title"),
        )
        .arg(
            Arg::new("target")
                .long("target")
                .required(true)
                .value_name("KM")
                .help("Target distance in km"),
        )
        .arg(
            Arg::new("message")
                .long("message")
                .short('m')
                .action(ArgAction::Append)
                .value_name("KM:SENDER[:TEXT]")
                .help("Message to add before the run starts (repeatable)"),
        )
        .arg(
            Arg::new("track")
                .long("track")
                .value_name("FILE")
                .conflicts_with("synthetic-km")
                .help("JSON array of position samples"),
        )
        .arg(
            Arg::new("synthetic-km")
                .long("synthetic-km")
                .value_name("KM")
                .help("Generate a straight track of this length"),
        )
        .arg(
            Arg::new("step-m")
                .long("step-m")
                .value_name("METERS")
                .default_value("10")
                .help("Spacing of synthetic samples"),
        )
        .arg(
            Arg::new("policy")
                .long("policy")
                .value_parser(["replay", "retry"])
                .help("What to do when a played report fails"),
        )
        .arg(
            Arg::new("refresh-every")
                .long("refresh-every")
                .value_name("SAMPLES")
                .default_value("50")
                .help("Refresh the message list every N samples"),
        )
}
