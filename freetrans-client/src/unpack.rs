use crate::{
    error::{IoContext, TransferError},
    format,
};
use indicatif::ProgressBar;
use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};
use time::OffsetDateTime;
use tracing::{debug, trace};
use zip::ZipArchive;

/// Prefix of the directories that downloaded archives are extracted into.
pub const EXTRACT_DIRECTORY_PREFIX: &str = "freetransfert";

/// Extract `zip_path` into a new timestamped directory below `destination_root`
/// and delete the archive afterwards.
///
/// Returns the directory the entries were written to. Files already written
/// stay on disk if extraction fails part way; the archive is only removed on success.
pub fn unpack(
    zip_path: &Path,
    destination_root: &Path,
    progress: &ProgressBar,
) -> Result<PathBuf, TransferError> {
    unpack_at(zip_path, destination_root, format::local_now(), progress)
}

pub(crate) fn unpack_at(
    zip_path: &Path,
    destination_root: &Path,
    now: OffsetDateTime,
    progress: &ProgressBar,
) -> Result<PathBuf, TransferError> {
    let file = File::open(zip_path)
        .io_context(|| format!("failed to open archive '{}'", zip_path.display()))?;
    let mut archive = ZipArchive::new(file)?;

    let mut total = 0;
    for i in 0..archive.len() {
        total += archive.by_index(i)?.size();
    }
    progress.set_length(total);
    progress.set_position(0);

    let destination = create_extract_directory(destination_root, now)?;
    debug!(
        "extracting {} entries ({total} bytes) from '{}' into '{}'",
        archive.len(),
        zip_path.display(),
        destination.display()
    );

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let relative = entry.enclosed_name().ok_or_else(|| {
            TransferError::io(
                format!("archive entry '{}' escapes the destination", entry.name()),
                io::Error::from(io::ErrorKind::InvalidData),
            )
        })?;
        let target = destination.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)
                .io_context(|| format!("failed to create '{}'", target.display()))?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .io_context(|| format!("failed to create '{}'", parent.display()))?;
        }
        trace!("extracting '{}'", target.display());
        let out = File::create(&target)
            .io_context(|| format!("failed to create '{}'", target.display()))?;
        let mut writer = progress.wrap_write(BufWriter::new(out));
        io::copy(&mut entry, &mut writer)
            .and_then(|_| writer.flush())
            .io_context(|| format!("failed to extract '{}'", target.display()))?;
    }
    progress.finish_and_clear();

    fs::remove_file(zip_path)
        .io_context(|| format!("failed to remove archive '{}'", zip_path.display()))?;
    Ok(destination)
}

/// Create a fresh `freetransfert <stamp>` directory, appending ` (2)`, ` (3)`
/// and so on when an extraction from the same second already exists.
fn create_extract_directory(root: &Path, now: OffsetDateTime) -> Result<PathBuf, TransferError> {
    fs::create_dir_all(root).io_context(|| format!("failed to create '{}'", root.display()))?;
    let base = format!("{EXTRACT_DIRECTORY_PREFIX} {}", format::directory_stamp(now));
    let mut index = 1;
    loop {
        let candidate = match index {
            1 => root.join(&base),
            n => root.join(format!("{base} ({n})")),
        };
        match fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => index += 1,
            Err(err) => {
                return Err(TransferError::io(
                    format!("failed to create '{}'", candidate.display()),
                    err,
                ));
            }
        }
    }
}
