use crate::error::{IoContext, TransferError};
use indicatif::ProgressBar;
use std::{
    fs::{self, File},
    io::{self, BufWriter},
    path::{Component, Path},
};
use tracing::{debug, trace};
use walkdir::{DirEntry, WalkDir};
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

/// Sum of the sizes of every non-directory entry under `root`.
pub fn directory_size(root: &Path) -> Result<u64, TransferError> {
    Ok(files(root, None)?.iter().map(|(_, len)| len).sum())
}

/// Write every file below `source` into a new zip archive at `destination`.
///
/// Entry names are the paths relative to `source`, joined with `/`. The byte
/// total is computed first and set as the length of `progress`, which then
/// advances as file contents are copied. Returns the byte total.
///
/// `destination` may live inside `source`; it is never added to itself.
/// A failure leaves a partial file at `destination`; removing it is up to the caller.
pub fn archive_directory(
    source: &Path,
    destination: &Path,
    progress: &ProgressBar,
) -> Result<u64, TransferError> {
    let source = fs::canonicalize(source)
        .io_context(|| format!("failed to read '{}'", source.display()))?;
    let file = File::create(destination)
        .io_context(|| format!("failed to create archive '{}'", destination.display()))?;
    let own_path = fs::canonicalize(destination)
        .io_context(|| format!("failed to read '{}'", destination.display()))?;

    let entries = files(&source, Some(&own_path))?;
    let total = entries.iter().map(|(_, len)| len).sum();
    progress.set_length(total);
    progress.set_position(0);
    debug!(
        "archiving '{}' ({} files, {total} bytes) into '{}'",
        source.display(),
        entries.len(),
        destination.display()
    );

    let mut zip = ZipWriter::new(BufWriter::new(file));
    for (entry, len) in &entries {
        let name = entry_name(&source, entry.path())?;
        trace!("adding '{name}' ({len} bytes)");

        zip.start_file(name.as_str(), entry_options(entry, *len))?;
        let reader = File::open(entry.path())
            .io_context(|| format!("failed to open '{}'", entry.path().display()))?;
        io::copy(&mut progress.wrap_read(reader), &mut zip)
            .io_context(|| format!("failed to add '{}' to archive", entry.path().display()))?;
    }

    zip.finish()?;
    Ok(total)
}

/// Every non-directory entry under `root` with its size, leaving out `skip`.
fn files(root: &Path, skip: Option<&Path>) -> Result<Vec<(DirEntry, u64)>, TransferError> {
    let mut files = Vec::new();
    for entry in walk(root) {
        let entry = entry.map_err(|err| walk_error(root, err))?;
        if entry.file_type().is_dir() || Some(entry.path()) == skip {
            continue;
        }
        let len = entry.metadata().map_err(|err| walk_error(root, err))?.len();
        files.push((entry, len));
    }
    Ok(files)
}

fn walk(root: &Path) -> walkdir::IntoIter {
    WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
}

fn walk_error(root: &Path, err: walkdir::Error) -> TransferError {
    let context = match err.path() {
        Some(path) => format!("failed to read '{}'", path.display()),
        None => format!("failed to walk '{}'", root.display()),
    };
    TransferError::io(context, err.into())
}

/// Archive name of `path`, relative to `root` and using `/` on every platform.
fn entry_name(root: &Path, path: &Path) -> Result<String, TransferError> {
    let relative = path.strip_prefix(root).map_err(|_| {
        TransferError::io(
            format!("'{}' is outside of '{}'", path.display(), root.display()),
            io::Error::from(io::ErrorKind::InvalidInput),
        )
    })?;
    let parts = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>();
    Ok(parts.join("/"))
}

fn entry_options(entry: &DirEntry, len: u64) -> SimpleFileOptions {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(len >= u32::MAX as u64);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = entry.metadata() {
            return options.unix_permissions(metadata.permissions().mode());
        }
    }
    #[cfg(not(unix))]
    let _ = entry;
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn sample_tree() -> TempDir {
        let dir = TempDir::new().expect("Failed to create temp directory");
        fs::create_dir_all(dir.path().join("nested/deeper")).unwrap();
        fs::create_dir_all(dir.path().join("empty")).unwrap();
        fs::write(dir.path().join("top.txt"), b"hello").unwrap();
        fs::write(dir.path().join("nested/data.bin"), vec![7u8; 4096]).unwrap();
        fs::write(dir.path().join("nested/deeper/note.md"), b"# note\n").unwrap();
        dir
    }

    #[test]
    fn directory_size_ignores_directories() {
        let tree = sample_tree();
        assert_eq!(directory_size(tree.path()).unwrap(), 5 + 4096 + 7);
    }

    #[test]
    fn archive_keeps_relative_structure_and_sizes() {
        let tree = sample_tree();
        let out = TempDir::new().unwrap();
        let zip_path = out.path().join("tree.zip");
        let progress = ProgressBar::hidden();

        let total = archive_directory(tree.path(), &zip_path, &progress).unwrap();
        assert_eq!(total, 5 + 4096 + 7);
        assert_eq!(progress.position(), total);

        let mut archive = ZipArchive::new(File::open(&zip_path).unwrap()).unwrap();
        assert_eq!(archive.len(), 3);

        let mut names = Vec::new();
        let mut uncompressed = 0;
        for i in 0..archive.len() {
            let file = archive.by_index(i).unwrap();
            names.push(file.name().to_string());
            uncompressed += file.size();
        }
        names.sort();
        assert_eq!(
            names,
            vec!["nested/data.bin", "nested/deeper/note.md", "top.txt"]
        );
        assert_eq!(uncompressed, total);

        let mut contents = String::new();
        archive
            .by_name("nested/deeper/note.md")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "# note\n");
    }

    #[test]
    fn archive_written_inside_its_source_skips_itself() {
        let tree = sample_tree();
        let destination = tree.path().join("nested/../tree.zip");

        let total = archive_directory(
            &tree.path().join("nested/.."),
            &destination,
            &ProgressBar::hidden(),
        )
        .unwrap();

        assert_eq!(total, 5 + 4096 + 7);
        let archive = ZipArchive::new(File::open(&destination).unwrap()).unwrap();
        let mut names = archive.file_names().map(str::to_string).collect::<Vec<_>>();
        names.sort();
        assert_eq!(
            names,
            vec!["nested/data.bin", "nested/deeper/note.md", "top.txt"]
        );
    }

    #[test]
    fn archive_of_missing_source_fails() {
        let out = TempDir::new().unwrap();
        let result = archive_directory(
            &out.path().join("does-not-exist"),
            &out.path().join("x.zip"),
            &ProgressBar::hidden(),
        );
        assert!(matches!(result, Err(TransferError::Io { .. })));
    }
}
