pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "musicshare",
    about = "Music share bot operator CLI",
    long_about = "Inspect configuration, check service credentials, and run one-time setup steps \
                  for the music share bot.",
    after_help = "Examples:\n  musicshare doctor --json\n  musicshare bot-id\n  \
                  musicshare sheets-auth --client-id ID --client-secret SECRET"
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
    #[command(about = "Validate config and check Slack, Spotify and Google Sheets credentials")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Look up the Slack user id of the bot (value for slack.bot_user_id)")]
    BotId {
        #[arg(long, default_value = commands::bot_id::DEFAULT_BOT_NAME)]
        name: String,
    },
    #[command(about = "Authorize spreadsheet access and store the refresh credential")]
    SheetsAuth {
        #[arg(long, help = "OAuth client id from the Google Cloud console")]
        client_id: String,
        #[arg(long, help = "OAuth client secret from the Google Cloud console")]
        client_secret: String,
        #[arg(long, help = "Authorization code copied from the consent redirect")]
        code: Option<String>,
        #[arg(long, default_value = musicshare_ledger::oauth::DEFAULT_REDIRECT_URI)]
        redirect_uri: String,
        #[arg(long, help = "Where to write the credential file (default: ledger.credentials_path)")]
        credentials_path: Option<PathBuf>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::BotId { name } => commands::bot_id::run(&name),
        Command::SheetsAuth { client_id, client_secret, code, redirect_uri, credentials_path } => {
            commands::sheets_auth::run(commands::sheets_auth::SheetsAuthArgs {
                client_id,
                client_secret,
                code,
                redirect_uri,
                credentials_path,
            })
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
