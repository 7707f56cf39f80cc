use crate::{
    ExecutableCommand,
    archive::directory_size,
    config::{AppPaths, Session},
    error::{IoContext, TransferError},
    format::readable_size,
    prompt::{Prompter, TerminalPrompter},
};
use anyhow::Result;
use clap::Parser;
use std::{env, fs, path::Path};
use tracing::{debug, warn};

/// Remove the client, its configuration and its temporary files.
#[derive(Parser)]
pub struct UninstallCommand {
    /// Skip the confirmation.
    #[clap(short = 'y', long = "yes")]
    no_confirm: bool,
}

impl ExecutableCommand for UninstallCommand {
    fn run(self, session: &mut Session) -> Result<()> {
        let executable = env::current_exe()
            .inspect_err(|err| warn!("unable to locate the running executable: {err}"))
            .ok();
        uninstall(
            &session.paths,
            executable.as_deref(),
            &mut TerminalPrompter,
            !self.no_confirm,
        )?;
        Ok(())
    }
}

/// Delete the configuration directory, the work directory and `executable`.
///
/// Returns `false` when the user chose to keep everything.
pub fn uninstall(
    paths: &AppPaths,
    executable: Option<&Path>,
    prompter: &mut dyn Prompter,
    confirm: bool,
) -> Result<bool, TransferError> {
    let freed = [&paths.config_dir, &paths.work_dir]
        .into_iter()
        .filter(|dir| dir.is_dir())
        .map(|dir| directory_size(dir).unwrap_or(0))
        .sum::<u64>()
        + executable
            .and_then(|exe| fs::metadata(exe).ok())
            .map_or(0, |metadata| metadata.len());

    println!(
        "Something not working? Open an issue with '{} issue'.",
        env!("CARGO_PKG_NAME")
    );
    println!("Estimated disk space freed: {}", readable_size(freed));

    if confirm {
        let choice = prompter.select(
            &format!("Uninstall {}?", env!("CARGO_PKG_NAME")),
            &["No".to_string(), "Yes".to_string()],
        )?;
        if choice == 0 {
            println!("Thanks for sticking around!");
            return Ok(false);
        }
    }

    for dir in [&paths.config_dir, &paths.work_dir] {
        if dir.exists() {
            debug!("removing '{}'", dir.display());
            fs::remove_dir_all(dir)
                .io_context(|| format!("failed to remove '{}'", dir.display()))?;
        }
    }
    if let Some(exe) = executable {
        fs::remove_file(exe).io_context(|| {
            format!(
                "failed to remove '{}', try again with elevated privileges or delete it yourself",
                exe.display()
            )
        })?;
    }

    println!("{} was uninstalled.", env!("CARGO_PKG_NAME"));
    Ok(true)
}
