pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "pinbot",
    about = "Pinbot operator CLI",
    long_about = "Inspect pinbot configuration, run readiness checks, and replay reaction scripts through the pin policy.",
    after_help = "Examples:\n  pinbot doctor --json\n  pinbot config\n  pinbot simulate +📌 +👎 +👎 +👎\n  pinbot simulate --pinned -- -📌"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, Discord token readiness, and gateway reconnect settings")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Replay reaction changes against an in-memory message and print each decision")]
    Simulate {
        #[arg(long, help = "Start from a message that is already pinned")]
        pinned: bool,
        #[arg(
            required = true,
            allow_hyphen_values = true,
            help = "Reaction steps such as +📌, +👎 or -📌"
        )]
        steps: Vec<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Simulate { pinned, steps } => commands::simulate::run(pinned, &steps),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
