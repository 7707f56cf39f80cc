use super::{Progress, ServiceArgs};
use crate::{
    ExecutableCommand,
    api_client::{TransferService, transfer_key},
    config::Session,
    desktop,
    error::{IoContext, TransferError},
    prompt::{Prompter, TerminalPrompter},
    unpack::unpack,
};
use anyhow::{Context, Result, bail};
use clap::{Parser, ValueHint};
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

const COLLISION_CHOICES: [&str; 4] = [
    "Rename the downloaded file",
    "Rename the existing file",
    "Replace the existing file",
    "Cancel",
];

/// Download a transfer from a share link.
#[derive(Parser)]
pub struct DownloadCommand {
    /// Share link of the transfer, or its bare key.
    ///
    /// The key is the last path segment of the link, e.g. `2kxQZv` in
    /// `https://transfert.free.fr/2kxQZv`.
    #[clap(value_hint = ValueHint::Url)]
    link: Option<String>,

    /// Directory the transfer is written to.
    ///
    /// Defaults to the download directory chosen with `set`.
    #[clap(short = 'o', env = "FREETRANS_DOWNLOAD_DIRECTORY", long = "output", value_hint = ValueHint::DirPath)]
    directory: Option<PathBuf>,

    #[clap(flatten)]
    service: ServiceArgs,
}

impl ExecutableCommand for DownloadCommand {
    fn run(self, session: &mut Session) -> Result<()> {
        let mut prompter = TerminalPrompter;
        let link = match self.link {
            Some(link) => link,
            None => prompter.text("Link of the transfer to download:")?,
        };
        let directory = self
            .directory
            .unwrap_or_else(|| session.config.download_dir.clone());

        let service = self.service.client()?;
        let Some(downloaded) = download(
            session,
            &service,
            &link,
            &directory,
            &mut prompter,
            Progress::detect(),
        )?
        else {
            return Ok(());
        };

        if session.config.notify {
            if let Err(err) = desktop::notify(
                "Your file was downloaded.",
                &session.config.icon,
                session.config.sound,
            ) {
                warn!("failed to show notification: {err:#}");
            }
        }
        println!(
            "Successfully downloaded transfer to '{}'",
            downloaded.display()
        );
        Ok(())
    }
}

/// Fetch the transfer behind `link` into `directory`.
///
/// Zip transfers are extracted when `unzip` is enabled, in which case the
/// extraction directory is returned. `None` means the user cancelled.
pub fn download(
    session: &Session,
    service: &dyn TransferService,
    link: &str,
    directory: &Path,
    prompter: &mut dyn Prompter,
    progress: Progress,
) -> Result<Option<PathBuf>> {
    // Validate link and output directory.
    let key = transfer_key(link)
        .with_context(|| format!("invalid transfer link '{}'", link.trim()))?;
    if !directory.exists() {
        return Err(TransferError::NotFound(directory.to_path_buf()))
            .context("the download directory does not exist");
    }
    if !directory.is_dir() {
        bail!(
            "download directory '{}' must be a directory and not a file",
            directory.display()
        );
    }

    let info = service.transfer_info(&key).context(
        "failed to get transfer - it may have expired or the link may be incorrect",
    )?;
    let Some(file_name) = Path::new(&info.path).file_name() else {
        bail!("transfer '{key}' has no usable file name ('{}')", info.path);
    };
    let Some(target) = resolve_collision(directory.join(file_name), prompter)? else {
        return Ok(None);
    };
    let url = service.download_url(&key, &info.path)?;
    debug!("downloading transfer '{key}' to '{}'", target.display());

    // Remove the partial file on failure.
    let prog_bar = progress.bytes("Downloading");
    if let Err(err) = write_to(service, &url, &target, &prog_bar) {
        prog_bar.abandon();
        if let Err(remove_err) = fs::remove_file(&target) {
            warn!(
                "failed to remove partial download '{}': {remove_err}",
                target.display()
            );
        }
        return Err(err.into());
    }
    prog_bar.finish_and_clear();

    if !(info.is_zip && session.config.unzip) {
        return Ok(Some(target));
    }
    let prog_bar = progress.bytes("Extracting");
    let extracted = unpack(&target, directory, &prog_bar).inspect_err(|_| prog_bar.abandon())?;
    prog_bar.finish_and_clear();
    Ok(Some(extracted))
}

fn write_to(
    service: &dyn TransferService,
    url: &url::Url,
    target: &Path,
    prog_bar: &indicatif::ProgressBar,
) -> Result<u64, TransferError> {
    let file = File::create(target)
        .io_context(|| format!("failed to create '{}'", target.display()))?;
    let mut writer = BufWriter::new(file);
    let written = service.fetch(url, &mut writer, prog_bar)?;
    writer
        .flush()
        .io_context(|| format!("failed to write '{}'", target.display()))?;
    Ok(written)
}

/// Ask what to do while `target` already exists. Returns the path to write
/// to, or `None` when the user cancels.
fn resolve_collision(
    mut target: PathBuf,
    prompter: &mut dyn Prompter,
) -> Result<Option<PathBuf>, TransferError> {
    let choices = COLLISION_CHOICES.map(str::to_string);
    while target.exists() {
        let question = format!("'{}' already exists. What do you want to do?", target.display());
        match prompter.select(&question, &choices)? {
            0 => {
                if let Some(name) = new_name(prompter, "New name for the downloaded file:")? {
                    target.set_file_name(name);
                }
            }
            1 => {
                let Some(name) = new_name(prompter, "New name for the existing file:")? else {
                    continue;
                };
                let renamed = target.with_file_name(name);
                if renamed.exists() {
                    eprintln!("'{}' already exists too", renamed.display());
                    continue;
                }
                fs::rename(&target, &renamed)
                    .io_context(|| format!("failed to rename '{}'", target.display()))?;
                println!("Renamed the existing file to '{}'", renamed.display());
            }
            2 => {
                if prompter.confirm(
                    "Are you sure you want to replace it? This cannot be undone.",
                    false,
                )? {
                    return Ok(Some(target));
                }
            }
            _ => return Ok(None),
        }
    }
    Ok(Some(target))
}

/// A bare file name typed by the user, or `None` if it is unusable.
fn new_name(prompter: &mut dyn Prompter, message: &str) -> Result<Option<String>, TransferError> {
    let name = prompter.text(message)?;
    let name = name.trim();
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        eprintln!("'{name}' is not a valid file name");
        return Ok(None);
    }
    Ok(Some(name.to_string()))
}
