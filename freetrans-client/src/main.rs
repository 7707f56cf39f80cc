mod api_client;
mod archive;
mod assemble;
mod commands;
mod config;
mod desktop;
mod error;
mod format;
mod history;
mod prompt;
mod resolve;
mod unpack;
mod update;

use anyhow::Result;
use clap::{Parser, ValueHint};
use commands::{
    DownloadCommand, GenCompletionsCommand, HistoryCommand, IssueCommand, SetCommand,
    UninstallCommand, UploadCommand,
};
use config::{AppPaths, Session};
use dotenvy::dotenv;
use error::TransferError;
use std::{path::PathBuf, process::ExitCode};
use tracing::debug;
use tracing_subscriber::EnvFilter;

pub trait ExecutableCommand: Parser {
    /// Consume `self` and run the command against the loaded session.
    fn run(self, session: &mut Session) -> Result<()>;
}

#[derive(Parser)]
enum Command {
    #[clap(visible_aliases = ["up", "u", "upld"])]
    Upload(UploadCommand),
    #[clap(visible_aliases = ["d", "dl", "dld", "down"])]
    Download(DownloadCommand),
    History(HistoryCommand),
    #[clap(visible_aliases = ["setting", "settings", "config", "conf", "s", "c"])]
    Set(SetCommand),
    Uninstall(UninstallCommand),
    #[clap(visible_aliases = ["bug", "github"])]
    Issue(IssueCommand),
    Completions(GenCompletionsCommand),
}

#[derive(Parser)]
#[command(author, version, about, long_about)]
struct RootCommand {
    /// Directory holding the configuration and upload history.
    #[clap(
        long = "config-dir",
        env = "FREETRANS_CONFIG_DIR",
        global = true,
        value_hint = ValueHint::DirPath
    )]
    config_dir: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

impl RootCommand {
    fn run(self) -> Result<()> {
        let command = match self.command {
            Command::Completions(cmd) => return cmd.run(),
            command => command,
        };

        let paths = AppPaths::resolve(self.config_dir);
        debug!("using configuration at '{}'", paths.config_file.display());
        let mut session = Session::load(paths)?;
        update::notify_if_outdated(&mut session);

        match command {
            Command::Upload(cmd) => cmd.run(&mut session),
            Command::Download(cmd) => cmd.run(&mut session),
            Command::History(cmd) => cmd.run(&mut session),
            Command::Set(cmd) => cmd.run(&mut session),
            Command::Uninstall(cmd) => cmd.run(&mut session),
            Command::Issue(cmd) => cmd.run(&mut session),
            Command::Completions(cmd) => cmd.run(),
        }
    }
}

fn main() -> ExitCode {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let Err(err) = RootCommand::parse().run() else {
        return ExitCode::SUCCESS;
    };
    let transfer_error = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<TransferError>());
    match transfer_error {
        Some(TransferError::Cancelled) => println!("Operation cancelled."),
        Some(TransferError::Interrupted) => {}
        _ => eprintln!("Error: {err:#}"),
    }
    ExitCode::from(transfer_error.map_or(1, TransferError::exit_code))
}
