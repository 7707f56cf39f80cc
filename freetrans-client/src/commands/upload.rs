use super::{Progress, ServiceArgs};
use crate::{
    ExecutableCommand,
    api_client::TransferService,
    assemble::{ArtifactKind, TransferAssembler},
    config::{Config, Session},
    desktop,
    format::readable_size,
    prompt::{Prompter, TerminalPrompter},
    resolve::resolve,
};
use anyhow::{Context, Result};
use clap::{Parser, ValueHint};
use std::path;
use tracing::{info, warn};
use url::Url;

/// Upload files or directories and print a share link.
#[derive(Parser)]
pub struct UploadCommand {
    /// Files or directories to upload.
    ///
    /// A single directory is sent as a zip archive.
    /// Several paths are bundled together into one zip archive.
    #[clap(value_hint = ValueHint::AnyPath)]
    paths: Vec<String>,

    /// Skip the upload confirmation.
    #[clap(short = 'y', env = "FREETRANS_NOCONFIRM", long = "yes")]
    no_confirm: bool,

    #[clap(flatten)]
    service: ServiceArgs,
}

/// A completed upload.
#[derive(Debug)]
pub struct Uploaded {
    pub url: Url,
    pub kind: ArtifactKind,
    pub size: u64,
}

impl ExecutableCommand for UploadCommand {
    fn run(self, session: &mut Session) -> Result<()> {
        let mut prompter = TerminalPrompter;
        let raw_paths = if self.paths.is_empty() {
            vec![prompter.text("Path of the file to upload:")?]
        } else {
            self.paths
        };

        let service = self.service.client()?;
        let Some(uploaded) = upload(
            session,
            &service,
            &raw_paths,
            !self.no_confirm,
            &mut prompter,
            Progress::detect(),
        )?
        else {
            return Ok(());
        };
        info!(
            "uploaded {} of {}",
            uploaded.kind,
            readable_size(uploaded.size)
        );
        announce(&session.config, &uploaded.url);
        Ok(())
    }
}

/// Resolve, assemble and upload `raw_paths`, then record the upload.
///
/// Returns `None` when the user declines the confirmation.
pub fn upload(
    session: &Session,
    service: &dyn TransferService,
    raw_paths: &[String],
    confirm: bool,
    prompter: &mut dyn Prompter,
    progress: Progress,
) -> Result<Option<Uploaded>> {
    let resolution = resolve(raw_paths, session.config.suggest_similar, prompter)?;
    for rejected in &resolution.rejected {
        eprintln!("Skipping: {rejected}");
    }
    let paths = resolution.paths;

    // Ensure the user wants to continue.
    if confirm {
        let listing = paths
            .iter()
            .map(|path| format!("'{}'", path.display()))
            .collect::<Vec<_>>()
            .join(", ");
        if !prompter.confirm(&format!("Are you sure you want to upload {listing}?"), true)? {
            return Ok(None);
        }
    }

    let artifact = TransferAssembler::new(&session.paths.work_dir, progress.bytes("Archiving"))
        .assemble(&paths, prompter)?;
    let (kind, size) = (artifact.kind, artifact.size);
    let recorded_path = match paths.as_slice() {
        [single] => path::absolute(single),
        _ => path::absolute(&artifact.path),
    }
    .context("failed to resolve absolute path")?;

    // Generated archives stay on disk when the upload fails.
    let prog_bar = progress.bytes("Uploading");
    let url = match service.upload(&artifact.path, &prog_bar) {
        Ok(url) => url,
        Err(err) => {
            prog_bar.abandon();
            if artifact.is_generated() {
                let kept = artifact.retain();
                eprintln!("The archive was kept at '{}'", kept.display());
            }
            return Err(err.into());
        }
    };
    prog_bar.finish_and_clear();

    if session.config.history {
        if let Err(err) = session
            .history()
            .record(&url, &recorded_path, kind, &readable_size(size))
        {
            warn!("failed to record upload in history: {err}");
        }
    }
    artifact.release()?;

    Ok(Some(Uploaded { url, kind, size }))
}

/// Tell the user where their upload lives, honouring the display settings.
fn announce(config: &Config, url: &Url) {
    if config.notify {
        if let Err(err) = desktop::notify("Your file was uploaded.", &config.icon, config.sound) {
            warn!("failed to show notification: {err:#}");
        }
    }
    if config.qrcode {
        match desktop::qr_code(url.as_str()) {
            Ok(code) => println!("{code}"),
            Err(err) => warn!("{err:#}"),
        }
    }
    if config.clipboard {
        match desktop::copy_to_clipboard(url.as_str()) {
            Ok(()) => println!("Your file is available at {url} (copied to clipboard)"),
            Err(err) => {
                warn!("failed to copy link to clipboard: {err:#}");
                println!("Your file is available at {url} (the link could not be copied to your clipboard)");
            }
        }
    } else {
        println!("Your file is available at {url}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        commands::testing::{FakeService, session},
        prompt::testing::{Answer, ScriptedPrompter},
    };
    use std::{fs, io::Cursor};
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn arg(path: &std::path::Path) -> String {
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn single_file_upload_is_recorded_and_file_kept() {
        let root = TempDir::new().unwrap();
        let session = session(&root);
        let file = root.path().join("notes.txt");
        fs::write(&file, b"hello").unwrap();
        let service = FakeService::default();

        let uploaded = upload(
            &session,
            &service,
            &[arg(&file)],
            false,
            &mut ScriptedPrompter::default(),
            Progress::Hidden,
        )
        .unwrap()
        .unwrap();

        assert_eq!(uploaded.kind, ArtifactKind::File);
        assert_eq!(uploaded.size, 5);
        assert_eq!(service.uploads.borrow()[0].path, file);
        assert!(file.exists());

        let history = session.history().entries().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].1.url, uploaded.url);
        assert_eq!(history[0].1.size, "5 o");
        assert_eq!(history[0].1.path, path::absolute(&file).unwrap());
    }

    #[test]
    fn multi_file_upload_removes_generated_archive() {
        let root = TempDir::new().unwrap();
        let session = session(&root);
        let first = root.path().join("a.txt");
        let second = root.path().join("b.txt");
        fs::write(&first, b"a").unwrap();
        fs::write(&second, b"b").unwrap();
        let service = FakeService::default();

        let uploaded = upload(
            &session,
            &service,
            &[arg(&first), arg(&second)],
            false,
            &mut ScriptedPrompter::default(),
            Progress::Hidden,
        )
        .unwrap()
        .unwrap();

        assert_eq!(uploaded.kind, ArtifactKind::MultiFileArchive);
        let sent = service.uploads.borrow()[0].clone();
        assert!(!sent.path.exists(), "archive should be deleted after upload");
        let archive = ZipArchive::new(Cursor::new(sent.bytes)).unwrap();
        let mut names = archive.file_names().map(str::to_string).collect::<Vec<_>>();
        names.sort();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn failed_upload_keeps_generated_archive() {
        let root = TempDir::new().unwrap();
        let session = session(&root);
        let dir = root.path().join("album");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("1.jpg"), b"jpg").unwrap();
        let service = FakeService {
            fail_upload: true,
            ..FakeService::default()
        };

        let result = upload(
            &session,
            &service,
            &[arg(&dir)],
            false,
            &mut ScriptedPrompter::default(),
            Progress::Hidden,
        );

        assert!(result.is_err());
        assert!(root.path().join("album.zip").exists());
        assert!(session.history().entries().unwrap().is_empty());
    }

    #[test]
    fn declining_confirmation_uploads_nothing() {
        let root = TempDir::new().unwrap();
        let session = session(&root);
        let file = root.path().join("secret.txt");
        fs::write(&file, b"x").unwrap();
        let service = FakeService::default();
        let mut prompter = ScriptedPrompter::new([Answer::Confirm(false)]);

        let uploaded = upload(
            &session,
            &service,
            &[arg(&file)],
            true,
            &mut prompter,
            Progress::Hidden,
        )
        .unwrap();

        assert!(uploaded.is_none());
        assert!(service.uploads.borrow().is_empty());
    }

    #[test]
    fn history_can_be_disabled() {
        let root = TempDir::new().unwrap();
        let mut session = session(&root);
        session.config.history = false;
        let file = root.path().join("x.bin");
        fs::write(&file, b"x").unwrap();

        upload(
            &session,
            &FakeService::default(),
            &[arg(&file)],
            false,
            &mut ScriptedPrompter::default(),
            Progress::Hidden,
        )
        .unwrap();

        assert!(!session.paths.history_file.exists());
    }
}
