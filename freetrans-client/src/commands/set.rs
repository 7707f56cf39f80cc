use super::uninstall::uninstall;
use crate::{
    ExecutableCommand,
    config::{Config, Session},
    desktop,
    error::{IoContext, TransferError},
    format::readable_size,
    prompt::{Prompter, TerminalPrompter},
    resolve::normalize_argument,
};
use anyhow::Result;
use clap::Parser;
use std::{
    env, fs,
    path::{self, Path, PathBuf},
};
use tracing::warn;

const ICON_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];
const ICON_FILE_STEM: &str = "icon";

/// Change the client settings interactively.
#[derive(Parser)]
pub struct SetCommand {}

impl ExecutableCommand for SetCommand {
    fn run(self, session: &mut Session) -> Result<()> {
        let executable = env::current_exe().ok();
        settings_menu(session, &mut TerminalPrompter, executable.as_deref())?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Toggle {
    Unzip,
    Notify,
    Sound,
    Clipboard,
    QrCode,
    History,
    UpdateCheck,
    SuggestSimilar,
}

impl Toggle {
    const ALL: [Toggle; 8] = [
        Toggle::Unzip,
        Toggle::Notify,
        Toggle::Sound,
        Toggle::Clipboard,
        Toggle::QrCode,
        Toggle::History,
        Toggle::UpdateCheck,
        Toggle::SuggestSimilar,
    ];

    fn value(self, config: &mut Config) -> &mut bool {
        match self {
            Self::Unzip => &mut config.unzip,
            Self::Notify => &mut config.notify,
            Self::Sound => &mut config.sound,
            Self::Clipboard => &mut config.clipboard,
            Self::QrCode => &mut config.qrcode,
            Self::History => &mut config.history,
            Self::UpdateCheck => &mut config.update_check,
            Self::SuggestSimilar => &mut config.suggest_similar,
        }
    }

    fn subject(self) -> &'static str {
        match self {
            Self::Unzip => "automatic extraction of downloaded archives",
            Self::Notify => "desktop notifications",
            Self::Sound => "notification sound",
            Self::Clipboard => "copying share links to the clipboard",
            Self::QrCode => "QR code display",
            Self::History => "upload history",
            Self::UpdateCheck => "new release notices",
            Self::SuggestSimilar => "similar path suggestions",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Setting {
    DownloadDir,
    Toggle(Toggle),
    Icon,
    ClearHistory,
    ResetConfig,
    Uninstall,
    Quit,
}

/// What the menu does after an action.
enum Flow {
    Save,
    Continue,
    Quit,
}

/// The menu entries with labels reflecting the current configuration.
fn menu(config: &Config) -> Vec<(Setting, String)> {
    let mut entries = vec![(
        Setting::DownloadDir,
        "Choose the default download directory".to_string(),
    )];
    let mut config = config.clone();
    for toggle in Toggle::ALL {
        let verb = if *toggle.value(&mut config) {
            "Disable"
        } else {
            "Enable"
        };
        entries.push((Setting::Toggle(toggle), format!("{verb} {}", toggle.subject())));
        if toggle == Toggle::Sound {
            let icon = match icon_unavailable(&config) {
                Some(reason) => format!("Choose a notification icon ({reason})"),
                None => "Choose a notification icon".to_string(),
            };
            entries.push((Setting::Icon, icon));
        }
    }
    entries.extend([
        (Setting::ClearHistory, "Clear the upload history".to_string()),
        (Setting::ResetConfig, "Reset the configuration".to_string()),
        (
            Setting::Uninstall,
            format!("Uninstall {}", env!("CARGO_PKG_NAME")),
        ),
        (Setting::Quit, "Quit".to_string()),
    ]);
    entries
}

fn icon_unavailable(config: &Config) -> Option<&'static str> {
    if cfg!(target_os = "macos") {
        Some("unavailable on macOS")
    } else if !config.notify {
        Some("unavailable without notifications")
    } else {
        None
    }
}

/// Run the settings loop until the user quits or presses Ctrl+C.
///
/// The configuration is written after every change.
pub fn settings_menu(
    session: &mut Session,
    prompter: &mut dyn Prompter,
    executable: Option<&Path>,
) -> Result<(), TransferError> {
    loop {
        let entries = menu(&session.config);
        let labels = entries
            .iter()
            .map(|(_, label)| label.clone())
            .collect::<Vec<_>>();
        let setting = match prompter.select("Which setting? (Ctrl+C to quit)", &labels) {
            Ok(index) => entries[index].0,
            Err(TransferError::Interrupted) => return Ok(()),
            Err(err) => return Err(err),
        };

        match apply(session, setting, prompter, executable) {
            Ok(Flow::Save) => session.save()?,
            Ok(Flow::Continue) | Err(TransferError::Interrupted) => {}
            Ok(Flow::Quit) => return Ok(()),
            Err(err) => return Err(err),
        }
    }
}

fn apply(
    session: &mut Session,
    setting: Setting,
    prompter: &mut dyn Prompter,
    executable: Option<&Path>,
) -> Result<Flow, TransferError> {
    match setting {
        Setting::DownloadDir => Ok(match choose_download_dir(prompter)? {
            Some(dir) => {
                println!("Downloads will be saved to '{}'", dir.display());
                session.config.download_dir = dir;
                Flow::Save
            }
            None => Flow::Continue,
        }),
        Setting::Toggle(toggle) => {
            let value = toggle.value(&mut session.config);
            *value = !*value;
            Ok(Flow::Save)
        }
        Setting::Icon => {
            if let Some(reason) = icon_unavailable(&session.config) {
                eprintln!("Notification icons are {reason}");
                return Ok(Flow::Continue);
            }
            choose_icon(session, prompter)
        }
        Setting::ClearHistory => {
            let store = session.history();
            let Some(size) = store.disk_size() else {
                eprintln!("There is no history to clear, it is created again on the next upload");
                return Ok(Flow::Continue);
            };
            if prompter.confirm(
                &format!(
                    "Clear the upload history? {} will be freed",
                    readable_size(size)
                ),
                false,
            )? {
                store.clear()?;
                println!("The upload history was cleared");
            } else {
                println!("The upload history was kept");
            }
            Ok(Flow::Continue)
        }
        Setting::ResetConfig => {
            if prompter.confirm(
                "Reset the configuration? This cannot be undone.",
                false,
            )? {
                session.config = Config::default();
                println!("The configuration was reset");
                Ok(Flow::Save)
            } else {
                println!("The configuration was kept");
                Ok(Flow::Continue)
            }
        }
        Setting::Uninstall => {
            if uninstall(&session.paths, executable, prompter, true)? {
                Ok(Flow::Quit)
            } else {
                Ok(Flow::Continue)
            }
        }
        Setting::Quit => Ok(Flow::Quit),
    }
}

/// Ask for a directory that exists and can be written to.
fn choose_download_dir(prompter: &mut dyn Prompter) -> Result<Option<PathBuf>, TransferError> {
    let raw = normalize_argument(&prompter.text("Download directory:")?);
    if raw.trim().is_empty() {
        eprintln!("No path given");
        return Ok(None);
    }
    let dir = PathBuf::from(raw);
    match fs::metadata(&dir) {
        Err(_) => {
            eprintln!("Directory '{}' not found", dir.display());
            return Ok(None);
        }
        Ok(metadata) if !metadata.is_dir() => {
            eprintln!("'{}' is not a directory", dir.display());
            return Ok(None);
        }
        Ok(_) => {}
    }
    if let Err(err) = tempfile::tempfile_in(&dir) {
        eprintln!("'{}' is not writable: {err}", dir.display());
        return Ok(None);
    }
    Ok(Some(path::absolute(&dir).unwrap_or(dir)))
}

fn choose_icon(session: &mut Session, prompter: &mut dyn Prompter) -> Result<Flow, TransferError> {
    let choices = [
        "Keep this icon",
        "Keep the previous icon",
        "Use the default icon",
        "Choose another icon",
    ]
    .map(str::to_string);

    loop {
        let raw = normalize_argument(&prompter.text("Icon path:")?);
        if raw.trim().is_empty() {
            return Ok(Flow::Continue);
        }
        let icon = PathBuf::from(raw);
        let Some(extension) = image_extension(&icon) else {
            eprintln!("'{}' is not a png or jpeg image", icon.display());
            return Ok(Flow::Continue);
        };
        if !icon.is_file() {
            eprintln!("File '{}' not found", icon.display());
            return Ok(Flow::Continue);
        }

        if let Err(err) = desktop::notify(
            "Testing notifications",
            &icon.to_string_lossy(),
            session.config.sound,
        ) {
            warn!("failed to show test notification: {err:#}");
        }
        match prompter.select("What do you think of this icon?", &choices)? {
            0 => {
                let kept = session
                    .paths
                    .config_dir
                    .join(format!("{ICON_FILE_STEM}.{extension}"));
                fs::create_dir_all(&session.paths.config_dir).io_context(|| {
                    format!("failed to create '{}'", session.paths.config_dir.display())
                })?;
                fs::copy(&icon, &kept)
                    .io_context(|| format!("failed to copy '{}'", icon.display()))?;
                session.config.icon = kept.to_string_lossy().into_owned();
                println!("The icon was kept");
                return Ok(Flow::Save);
            }
            1 => {
                println!("The icon was not changed");
                return Ok(Flow::Continue);
            }
            2 => {
                session.config.icon.clear();
                println!("The default icon is used again");
                return Ok(Flow::Save);
            }
            _ => {}
        }
    }
}

fn image_extension(path: &Path) -> Option<String> {
    let extension = path.extension()?.to_string_lossy().to_ascii_lowercase();
    ICON_EXTENSIONS
        .contains(&extension.as_str())
        .then_some(extension)
}
