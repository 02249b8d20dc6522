pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "shelfdesk",
    about = "Shelfdesk operator CLI",
    long_about = "Inspect configuration, prepare the order store, and chat with the support assistant.",
    after_help = "Examples:\n  shelfdesk doctor --json\n  shelfdesk seed\n  shelfdesk chat --session demo"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo orders (safe to re-run)")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, database connectivity, and generative backend settings")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Start an interactive support conversation in the terminal")]
    Chat {
        #[arg(long, help = "Resume or name a session instead of generating one")]
        session: Option<String>,
        #[arg(
            long,
            default_value_t = commands::chat::DEFAULT_IDLE_SECS,
            help = "Seconds without input before the assistant says goodbye"
        )]
        idle_secs: u64,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Chat { session, idle_secs } => commands::chat::run(session, idle_secs),
    };

    if !result.output.is_empty() {
        println!("{}", result.output);
    }
    ExitCode::from(result.exit_code)
}
