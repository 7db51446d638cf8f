pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "wheelbase",
    about = "Wheelbase operator CLI",
    long_about = "Operate Wheelbase database migrations, demo fixtures, and runtime readiness.",
    after_help = "Examples:\n  wheelbase migrate\n  wheelbase seed --reset\n  wheelbase doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo marketplace fixtures")]
    Seed {
        #[arg(long, help = "Remove previously seeded rows before loading")]
        reset: bool,
    },
    #[command(about = "Validate config, database connectivity, and fee-settings readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed { reset } => commands::seed::run(reset),
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
