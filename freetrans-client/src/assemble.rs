//! Turns a set of resolved paths into the single artifact handed to the uploader.
//!
//! | input                 | artifact                                   |
//! |-----------------------|--------------------------------------------|
//! | one regular file      | the file itself                            |
//! | one directory         | `<dir>.zip` next to the directory          |
//! | several paths         | a zip of a staging directory holding them  |
//!
//! The size ceiling is checked on the inputs before anything is archived and
//! again on the finished artifact.

use crate::{
    archive::{archive_directory, directory_size},
    error::{IoContext, TransferError},
    prompt::Prompter,
};
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    ffi::OsString,
    fmt, fs,
    path::{Path, PathBuf},
};
use tempfile::TempDir;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Largest artifact the service accepts: 50 GB, decimal.
pub const MAX_TRANSFER_SIZE: u64 = 50_000_000_000;

const STAGING_PREFIX: &str = "freetrans-staging-";
const MULTI_ARCHIVE_PREFIX: &str = "freetrans-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    File,
    DirectoryArchive,
    MultiFileArchive,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::File => "file",
            Self::DirectoryArchive => "directory-archive",
            Self::MultiFileArchive => "multi-file-archive",
        })
    }
}

/// The single file ultimately handed to the upload step.
#[derive(Debug)]
#[must_use = "generated archives must be released or retained"]
pub struct TransferArtifact {
    pub path: PathBuf,
    pub size: u64,
    pub kind: ArtifactKind,
    generated: bool,
}

impl TransferArtifact {
    /// Whether the artifact was created by the assembler.
    pub fn is_generated(&self) -> bool {
        self.generated
    }

    /// Call once the artifact has been handed off successfully. Generated
    /// archives are deleted; user files are left alone.
    pub fn release(self) -> Result<(), TransferError> {
        if self.generated {
            debug!("removing generated archive '{}'", self.path.display());
            fs::remove_file(&self.path)
                .io_context(|| format!("failed to remove '{}'", self.path.display()))?;
        }
        Ok(())
    }

    /// Keep the artifact on disk (e.g. after a failed upload) and return its path.
    pub fn retain(self) -> PathBuf {
        self.path
    }
}

pub struct TransferAssembler<'a> {
    work_dir: &'a Path,
    size_limit: u64,
    progress: ProgressBar,
}

impl<'a> TransferAssembler<'a> {
    /// Multi-path archives are written below `work_dir`.
    pub fn new(work_dir: &'a Path, progress: ProgressBar) -> Self {
        Self {
            work_dir,
            size_limit: MAX_TRANSFER_SIZE,
            progress,
        }
    }

    #[cfg(test)]
    pub fn with_size_limit(mut self, size_limit: u64) -> Self {
        self.size_limit = size_limit;
        self
    }

    pub fn assemble(
        &self,
        paths: &[PathBuf],
        prompter: &mut dyn Prompter,
    ) -> Result<TransferArtifact, TransferError> {
        let artifact = match paths {
            [] => Err(TransferError::Cancelled),
            [path] if path.is_dir() => self.assemble_directory(path, prompter),
            [path] => self.assemble_file(path),
            paths => self.assemble_many(paths),
        };
        if !self.progress.is_finished() {
            self.progress.finish_and_clear();
        }
        artifact
    }

    fn assemble_file(&self, path: &Path) -> Result<TransferArtifact, TransferError> {
        let size = fs::metadata(path)
            .io_context(|| format!("failed to read '{}'", path.display()))?
            .len();
        self.check_size(path, size)?;
        Ok(TransferArtifact {
            path: path.to_path_buf(),
            size,
            kind: ArtifactKind::File,
            generated: false,
        })
    }

    fn assemble_directory(
        &self,
        dir: &Path,
        prompter: &mut dyn Prompter,
    ) -> Result<TransferArtifact, TransferError> {
        let dir = fs::canonicalize(dir)
            .io_context(|| format!("failed to read '{}'", dir.display()))?;
        self.check_size(&dir, directory_size(&dir)?)?;

        let mut name = dir
            .file_name()
            .map_or_else(|| OsString::from("archive"), OsString::from);
        name.push(".zip");
        let destination = dir.parent().unwrap_or(&dir).join(name);
        if destination.exists()
            && !prompter.confirm(
                &format!("'{}' already exists. Overwrite it?", destination.display()),
                false,
            )?
        {
            return Err(TransferError::Cancelled);
        }

        self.progress.set_message("Archiving");
        self.archive_into(&dir, &destination)?;
        self.finish(destination, ArtifactKind::DirectoryArchive)
    }

    fn assemble_many(&self, paths: &[PathBuf]) -> Result<TransferArtifact, TransferError> {
        let mut total = 0;
        for path in paths {
            let size = input_size(path)?;
            self.check_size(path, size)?;
            total += size;
        }
        if total > self.size_limit {
            return Err(TransferError::SizeLimitExceeded {
                path: PathBuf::from(format!("the {} selected paths", paths.len())),
                size: total,
                limit: self.size_limit,
            });
        }

        fs::create_dir_all(self.work_dir)
            .io_context(|| format!("failed to create '{}'", self.work_dir.display()))?;
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(self.work_dir)
            .io_context(|| "failed to create staging directory")?;
        stage_inputs(paths, &staging)?;

        let (_, destination) = tempfile::Builder::new()
            .prefix(MULTI_ARCHIVE_PREFIX)
            .suffix(".zip")
            .tempfile_in(self.work_dir)
            .io_context(|| "failed to create archive file")?
            .keep()
            .map_err(|err| TransferError::io("failed to keep archive file", err.error))?;

        self.progress.set_message("Archiving");
        let archived = self.archive_into(staging.path(), &destination);
        if let Err(err) = staging.close() {
            warn!("failed to remove staging directory: {err}");
        }
        archived?;
        self.finish(destination, ArtifactKind::MultiFileArchive)
    }

    fn archive_into(&self, source: &Path, destination: &Path) -> Result<(), TransferError> {
        self.archive_into_with(source, destination, archive_directory)
    }

    /// Archive `source` into `destination` with `archiver`, deleting the
    /// partial archive on failure.
    fn archive_into_with(
        &self,
        source: &Path,
        destination: &Path,
        archiver: impl FnOnce(&Path, &Path, &ProgressBar) -> Result<u64, TransferError>,
    ) -> Result<(), TransferError> {
        match archiver(source, destination, &self.progress) {
            Ok(_) => {
                self.progress.finish_and_clear();
                Ok(())
            }
            Err(err) => {
                self.progress.abandon();
                if let Err(remove_err) = fs::remove_file(destination) {
                    warn!(
                        "failed to remove partial archive '{}': {remove_err}",
                        destination.display()
                    );
                }
                Err(err)
            }
        }
    }

    fn finish(
        &self,
        path: PathBuf,
        kind: ArtifactKind,
    ) -> Result<TransferArtifact, TransferError> {
        let size = fs::metadata(&path)
            .io_context(|| format!("failed to read '{}'", path.display()))?
            .len();
        let artifact = TransferArtifact {
            path,
            size,
            kind,
            generated: true,
        };
        if let Err(err) = self.check_size(&artifact.path, size) {
            artifact.release()?;
            return Err(err);
        }
        info!(
            "assembled {kind} '{}' ({size} bytes)",
            artifact.path.display()
        );
        Ok(artifact)
    }

    fn check_size(&self, path: &Path, size: u64) -> Result<(), TransferError> {
        if size > self.size_limit {
            return Err(TransferError::SizeLimitExceeded {
                path: path.to_path_buf(),
                size,
                limit: self.size_limit,
            });
        }
        Ok(())
    }
}

fn input_size(path: &Path) -> Result<u64, TransferError> {
    let metadata =
        fs::metadata(path).io_context(|| format!("failed to read '{}'", path.display()))?;
    if metadata.is_dir() {
        directory_size(path)
    } else {
        Ok(metadata.len())
    }
}

/// Copy every input into the staging directory under its base name, adding a
/// numeric suffix when two inputs share a name.
fn stage_inputs(paths: &[PathBuf], staging: &TempDir) -> Result<(), TransferError> {
    let mut taken = HashSet::new();
    for path in paths {
        let name = path.file_name().map(OsString::from).unwrap_or_else(|| "input".into());
        let target = staging.path().join(unique_name(&name, &mut taken));
        debug!("staging '{}' as '{}'", path.display(), target.display());
        if path.is_dir() {
            copy_tree(path, &target)?;
        } else {
            fs::copy(path, &target)
                .io_context(|| format!("failed to copy '{}'", path.display()))?;
        }
    }
    Ok(())
}

fn unique_name(name: &OsString, taken: &mut HashSet<OsString>) -> OsString {
    if taken.insert(name.clone()) {
        return name.clone();
    }
    let as_path = Path::new(name);
    let stem = as_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = as_path.extension().map(|ext| ext.to_string_lossy().into_owned());

    let mut index = 2usize;
    loop {
        let candidate = OsString::from(match &extension {
            Some(ext) => format!("{stem}-{index}.{ext}"),
            None => format!("{stem}-{index}"),
        });
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        index += 1;
    }
}

fn copy_tree(source: &Path, target: &Path) -> Result<(), TransferError> {
    for entry in WalkDir::new(source).follow_links(true) {
        let entry = entry.map_err(|err| {
            TransferError::io(format!("failed to read '{}'", source.display()), err.into())
        })?;
        let relative = entry.path().strip_prefix(source).unwrap_or(entry.path());
        let destination = target.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination)
                .io_context(|| format!("failed to create '{}'", destination.display()))?;
        } else {
            fs::copy(entry.path(), &destination)
                .io_context(|| format!("failed to copy '{}'", entry.path().display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::testing::{Answer, ScriptedPrompter};
    use std::fs::File;
    use zip::ZipArchive;

    fn assembler(work_dir: &Path) -> TransferAssembler<'_> {
        TransferAssembler::new(work_dir, ProgressBar::hidden())
    }

    fn zip_names(path: &Path) -> Vec<String> {
        let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut names = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    fn staging_dirs(work_dir: &Path) -> usize {
        fs::read_dir(work_dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX))
            .count()
    }

    #[test]
    fn single_file_is_used_as_is() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("movie.mov");
        fs::write(&file, vec![0u8; 1234]).unwrap();

        let artifact = assembler(dir.path())
            .assemble(&[file.clone()], &mut ScriptedPrompter::default())
            .unwrap();

        assert_eq!(artifact.path, file);
        assert_eq!(artifact.size, 1234);
        assert_eq!(artifact.kind, ArtifactKind::File);
        assert!(!artifact.is_generated());
        artifact.release().unwrap();
        assert!(file.exists(), "user files are never deleted");
    }

    #[test]
    fn oversized_single_file_produces_no_artifact() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("big.bin");
        fs::write(&file, vec![0u8; 101]).unwrap();

        let result = assembler(dir.path())
            .with_size_limit(100)
            .assemble(&[file], &mut ScriptedPrompter::default());

        assert!(matches!(
            result,
            Err(TransferError::SizeLimitExceeded {
                size: 101,
                limit: 100,
                ..
            })
        ));
    }

    #[test]
    fn default_limit_is_fifty_decimal_gigabytes() {
        let dir = TempDir::new().unwrap();
        let assembler = assembler(dir.path());
        assert!(assembler.check_size(dir.path(), 50_000_000_000).is_ok());
        assert!(matches!(
            assembler.check_size(dir.path(), 50_000_000_001),
            Err(TransferError::SizeLimitExceeded { .. })
        ));
    }

    #[test]
    fn directory_is_archived_next_to_itself() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("photos");
        fs::create_dir_all(dir.join("2026")).unwrap();
        fs::write(dir.join("cover.jpg"), b"jpg").unwrap();
        fs::write(dir.join("2026/beach.jpg"), b"beach").unwrap();

        let artifact = assembler(root.path())
            .assemble(&[dir.clone()], &mut ScriptedPrompter::default())
            .unwrap();

        assert_eq!(
            artifact.path,
            fs::canonicalize(root.path()).unwrap().join("photos.zip")
        );
        assert_eq!(artifact.kind, ArtifactKind::DirectoryArchive);
        assert_eq!(artifact.size, fs::metadata(&artifact.path).unwrap().len());
        assert_eq!(zip_names(&artifact.path), vec!["2026/beach.jpg", "cover.jpg"]);

        let path = artifact.path.clone();
        artifact.release().unwrap();
        assert!(!path.exists());
        assert!(dir.exists());
    }

    #[test]
    fn current_directory_is_archived_beside_itself() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("music");
        fs::create_dir_all(dir.join("live")).unwrap();
        fs::write(dir.join("track.ogg"), b"ogg").unwrap();
        fs::write(dir.join("live/encore.ogg"), b"encore").unwrap();

        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(&dir).unwrap();
        let result =
            assembler(root.path()).assemble(&[PathBuf::from(".")], &mut ScriptedPrompter::default());
        std::env::set_current_dir(previous).unwrap();
        let artifact = result.unwrap();

        assert_eq!(
            artifact.path,
            fs::canonicalize(root.path()).unwrap().join("music.zip")
        );
        assert_eq!(zip_names(&artifact.path), vec!["live/encore.ogg", "track.ogg"]);
        assert!(!dir.join("..zip").exists());
        artifact.release().unwrap();
    }

    #[test]
    fn dotted_directory_path_names_archive_after_the_directory() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("reports");
        fs::create_dir_all(dir.join("2026")).unwrap();
        fs::write(dir.join("2026/q1.csv"), b"q1").unwrap();

        let artifact = assembler(root.path())
            .assemble(&[dir.join("2026/..")], &mut ScriptedPrompter::default())
            .unwrap();

        assert_eq!(artifact.path.file_name().unwrap(), "reports.zip");
        assert!(!dir.join("2026").join("...zip").exists());
        assert_eq!(zip_names(&artifact.path), vec!["2026/q1.csv"]);
        artifact.release().unwrap();
    }

    #[test]
    fn failed_archiving_removes_the_partial_archive() {
        let root = TempDir::new().unwrap();
        let destination = root.path().join("partial.zip");

        let result = assembler(root.path()).archive_into_with(
            root.path(),
            &destination,
            |_, destination, _| {
                fs::write(destination, b"PK\x03\x04").unwrap();
                Err(TransferError::io(
                    "failed to add 'a.txt' to archive",
                    std::io::Error::other("disk full"),
                ))
            },
        );

        assert!(matches!(result, Err(TransferError::Io { .. })));
        assert!(!destination.exists());
    }

    #[test]
    fn progress_is_cleared_when_no_archive_is_built() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("song.flac");
        fs::write(&file, b"flac").unwrap();
        let progress = ProgressBar::hidden();

        let artifact = TransferAssembler::new(dir.path(), progress.clone())
            .assemble(&[file], &mut ScriptedPrompter::default())
            .unwrap();

        assert_eq!(artifact.kind, ArtifactKind::File);
        assert!(progress.is_finished());
    }

    #[test]
    fn existing_directory_archive_requires_confirmation() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("docs");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("a.txt"), b"a").unwrap();
        fs::write(root.path().join("docs.zip"), b"precious").unwrap();
        let mut prompter = ScriptedPrompter::new([Answer::Confirm(false)]);

        let result = assembler(root.path()).assemble(&[dir], &mut prompter);

        assert!(matches!(result, Err(TransferError::Cancelled)));
        assert_eq!(fs::read(root.path().join("docs.zip")).unwrap(), b"precious");
    }

    #[test]
    fn oversized_directory_archive_is_removed() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("tiny");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("a.txt"), b"a").unwrap();

        // One byte of content passes the pre-archive check, the zip itself does not.
        let result = assembler(root.path())
            .with_size_limit(10)
            .assemble(&[dir], &mut ScriptedPrompter::default());

        assert!(matches!(result, Err(TransferError::SizeLimitExceeded { .. })));
        assert!(!root.path().join("tiny.zip").exists());
    }

    #[test]
    fn several_paths_become_one_archive_and_staging_is_removed() {
        let inputs = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let first = inputs.path().join("one.txt");
        let second = inputs.path().join("two.txt");
        let folder = inputs.path().join("folder");
        fs::write(&first, b"1").unwrap();
        fs::write(&second, b"22").unwrap();
        fs::create_dir_all(folder.join("inner")).unwrap();
        fs::write(folder.join("inner/three.txt"), b"333").unwrap();

        let artifact = assembler(work.path())
            .assemble(&[first, second, folder], &mut ScriptedPrompter::default())
            .unwrap();

        assert_eq!(artifact.kind, ArtifactKind::MultiFileArchive);
        assert!(artifact.path.starts_with(work.path()));
        assert_eq!(
            zip_names(&artifact.path),
            vec!["folder/inner/three.txt", "one.txt", "two.txt"]
        );
        assert_eq!(staging_dirs(work.path()), 0);
        artifact.release().unwrap();
    }

    #[test]
    fn duplicate_base_names_are_kept_apart() {
        let inputs = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        fs::create_dir_all(inputs.path().join("a")).unwrap();
        fs::create_dir_all(inputs.path().join("b")).unwrap();
        fs::write(inputs.path().join("a/report.pdf"), b"a").unwrap();
        fs::write(inputs.path().join("b/report.pdf"), b"b").unwrap();

        let artifact = assembler(work.path())
            .assemble(
                &[
                    inputs.path().join("a/report.pdf"),
                    inputs.path().join("b/report.pdf"),
                ],
                &mut ScriptedPrompter::default(),
            )
            .unwrap();

        assert_eq!(
            zip_names(&artifact.path),
            vec!["report-2.pdf", "report.pdf"]
        );
        artifact.release().unwrap();
    }

    #[test]
    fn oversized_member_aborts_before_staging() {
        let inputs = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let small = inputs.path().join("small.txt");
        let large = inputs.path().join("large.txt");
        fs::write(&small, b"x").unwrap();
        fs::write(&large, vec![0u8; 64]).unwrap();

        let result = assembler(work.path())
            .with_size_limit(32)
            .assemble(&[small, large], &mut ScriptedPrompter::default());

        assert!(matches!(result, Err(TransferError::SizeLimitExceeded { .. })));
        assert_eq!(fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[test]
    fn unique_name_appends_counter_before_extension() {
        let mut taken = HashSet::new();
        let name = OsString::from("notes.txt");
        assert_eq!(unique_name(&name, &mut taken), "notes.txt");
        assert_eq!(unique_name(&name, &mut taken), "notes-2.txt");
        assert_eq!(unique_name(&name, &mut taken), "notes-3.txt");
        assert_eq!(unique_name(&OsString::from("Makefile"), &mut taken), "Makefile");
        assert_eq!(unique_name(&OsString::from("Makefile"), &mut taken), "Makefile-2");
    }
}
