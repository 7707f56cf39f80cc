//! Best-effort integration with the desktop: notifications, clipboard, the
//! default browser and terminal QR codes.

use anyhow::{Context, Result, bail};
use qrcode::{QrCode, render::unicode};
use std::{
    io::Write,
    process::{Command, Stdio},
};
use tracing::debug;

const APP_TITLE: &str = "FreeTransCLI";

/// Clipboard helpers tried in order, with their arguments.
#[cfg(target_os = "macos")]
const CLIPBOARD_HELPERS: &[(&str, &[&str])] = &[("pbcopy", &[])];
#[cfg(target_os = "windows")]
const CLIPBOARD_HELPERS: &[(&str, &[&str])] = &[("clip", &[])];
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const CLIPBOARD_HELPERS: &[(&str, &[&str])] = &[
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("xsel", &["--clipboard", "--input"]),
];

/// Render `data` as a QR code made of half-block characters.
pub fn qr_code(data: &str) -> Result<String> {
    let code = QrCode::new(data.as_bytes()).context("failed to generate QR code")?;
    Ok(code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}

/// Show a desktop notification, with a sound when `sound` is set.
pub fn notify(message: &str, icon: &str, sound: bool) -> Result<()> {
    let mut command = if cfg!(target_os = "macos") {
        let mut script = format!(
            "display notification {} with title {}",
            applescript_string(message),
            applescript_string(APP_TITLE)
        );
        if sound {
            script.push_str(" sound name \"default\"");
        }
        let mut command = Command::new("osascript");
        command.arg("-e").arg(script);
        command
    } else if cfg!(target_os = "windows") {
        bail!("desktop notifications are not supported on this platform");
    } else {
        let mut command = Command::new("notify-send");
        command.arg("--app-name").arg(APP_TITLE);
        if !icon.is_empty() {
            command.arg("--icon").arg(icon);
        }
        if sound {
            command.arg("--hint=string:sound-name:complete");
        }
        command.arg(APP_TITLE).arg(message);
        command
    };
    run(&mut command)
}

/// Put `text` on the system clipboard.
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    for (program, args) in CLIPBOARD_HELPERS {
        let child = Command::new(program)
            .args(*args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        let mut child = match child {
            Ok(child) => child,
            Err(err) => {
                debug!("clipboard helper '{program}' unavailable: {err}");
                continue;
            }
        };
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes())?;
        }
        if child.wait()?.success() {
            return Ok(());
        }
    }
    bail!("no working clipboard helper found")
}

/// Open `url` in the default browser.
pub fn open_browser(url: &str) -> Result<()> {
    let mut command = if cfg!(target_os = "macos") {
        let mut command = Command::new("open");
        command.arg(url);
        command
    } else if cfg!(target_os = "windows") {
        let mut command = Command::new("rundll32");
        command.arg("url.dll,FileProtocolHandler").arg(url);
        command
    } else {
        let mut command = Command::new("xdg-open");
        command.arg(url);
        command
    };
    command
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to open browser for '{url}'"))?;
    Ok(())
}

fn run(command: &mut Command) -> Result<()> {
    let status = command
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .with_context(|| format!("failed to run {:?}", command.get_program()))?;
    if !status.success() {
        bail!("{:?} exited with {status}", command.get_program());
    }
    Ok(())
}

fn applescript_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}
