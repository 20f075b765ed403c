pub mod bootstrap;
pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use bootstrap::GlobalArgs;
use commands::add_record::AddRecordArgs;

#[derive(Debug, Parser)]
#[command(
    name = "sekretarz",
    about = "Sekretarz knowledge-base assistant",
    long_about = "Chat with an assistant that answers questions about customer feedback records, and manage the record store.",
    after_help = "Examples:\n  sekretarz chat\n  sekretarz ask \"Jaki jest status projektu Acme?\"\n  sekretarz add-record --client Acme --country PL --product Widget --status \"W Trakcie\"\n  sekretarz doctor --json"
)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Start an interactive chat session (/add, /records, /history, /quit)")]
    Chat,
    #[command(about = "Ask a single question and print the answer with its tool trace")]
    Ask {
        #[arg(help = "Question for the assistant")]
        question: String,
    },
    #[command(about = "Append a customer record to the store")]
    AddRecord(AddRecordArgs),
    #[command(about = "List stored customer records")]
    Records {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, data file, reports directory and LLM credentials")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let global = &cli.global;

    let result = match cli.command {
        Command::Chat => commands::chat::run(global),
        Command::Ask { question } => commands::ask::run(global, &question),
        Command::AddRecord(args) => commands::add_record::run(global, args),
        Command::Records { json } => commands::records::run(global, json),
        Command::Config => commands::config::run(global),
        Command::Doctor { json } => commands::doctor::run(global, json),
    };

    if !result.output.is_empty() {
        println!("{}", result.output);
    }
    ExitCode::from(result.exit_code)
}
