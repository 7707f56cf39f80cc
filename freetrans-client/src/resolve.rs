use crate::{error::TransferError, prompt::Prompter};
use std::{
    fs::{self, File},
    io,
    path::{MAIN_SEPARATOR, Path, PathBuf},
};
use tracing::debug;

/// Outcome of resolving the raw path arguments of a transfer.
#[derive(Debug, Default)]
pub struct Resolution {
    /// Paths that exist, in the order they were given.
    pub paths: Vec<PathBuf>,
    /// Entries that were skipped and why.
    pub rejected: Vec<TransferError>,
}

/// Turn raw command-line arguments into existing paths.
///
/// A missing path may be replaced by a similarly named sibling when
/// `suggest_similar` is set and the user accepts the suggestion. Missing or
/// unreadable entries are skipped, unless nothing usable is left, in which
/// case the first rejection is returned as the error.
pub fn resolve(
    raw_args: &[String],
    suggest_similar: bool,
    prompter: &mut dyn Prompter,
) -> Result<Resolution, TransferError> {
    let mut resolution = Resolution::default();

    for raw in raw_args {
        let path = PathBuf::from(normalize_argument(raw));
        match check_readable(&path) {
            Ok(()) => resolution.paths.push(path),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                match suggest_replacement(&path, suggest_similar, prompter)? {
                    Some(replacement) => resolution.paths.push(replacement),
                    None => resolution.rejected.push(TransferError::NotFound(path)),
                }
            }
            Err(err) => resolution.rejected.push(classify(path, err)),
        }
    }

    if resolution.paths.is_empty() {
        return Err(resolution
            .rejected
            .into_iter()
            .next()
            .unwrap_or(TransferError::Cancelled));
    }
    Ok(resolution)
}

/// Files must open for reading and directories must list.
fn check_readable(path: &Path) -> io::Result<()> {
    if fs::metadata(path)?.is_dir() {
        fs::read_dir(path).map(drop)
    } else {
        File::open(path).map(drop)
    }
}

fn classify(path: PathBuf, err: io::Error) -> TransferError {
    match err.kind() {
        io::ErrorKind::PermissionDenied => TransferError::PermissionDenied(path),
        io::ErrorKind::NotFound => TransferError::NotFound(path),
        _ => TransferError::io(format!("failed to read '{}'", path.display()), err),
    }
}

/// Strip enclosing quotes and a single trailing separator.
pub fn normalize_argument(raw: &str) -> String {
    let trimmed = raw.trim();
    let unquoted = ['\'', '"']
        .iter()
        .find_map(|quote| {
            trimmed
                .strip_prefix(*quote)
                .and_then(|rest| rest.strip_suffix(*quote))
        })
        .unwrap_or(trimmed);

    let mut path = unquoted.to_string();
    if path.len() > 1 && (path.ends_with('/') || path.ends_with(MAIN_SEPARATOR)) {
        path.pop();
    }
    path
}

/// Entries next to `path` whose name contains its file name, sorted by name.
pub fn similar_paths(path: &Path) -> Vec<PathBuf> {
    let Some(needle) = path.file_name().and_then(|name| name.to_str()) else {
        return Vec::new();
    };
    let parent = path.parent().unwrap_or(Path::new(""));
    let listing = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };

    let Ok(entries) = fs::read_dir(listing) else {
        return Vec::new();
    };
    let mut matches = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.contains(needle))
        .map(|name| parent.join(name))
        .collect::<Vec<_>>();
    matches.sort();
    matches
}

fn suggest_replacement(
    path: &Path,
    suggest_similar: bool,
    prompter: &mut dyn Prompter,
) -> Result<Option<PathBuf>, TransferError> {
    if !suggest_similar {
        return Ok(None);
    }
    let Some(candidate) = similar_paths(path).into_iter().next() else {
        debug!("no similar path found for '{}'", path.display());
        return Ok(None);
    };
    let accepted = prompter.confirm(
        &format!(
            "'{}' does not exist. Use the similar path '{}' instead?",
            path.display(),
            candidate.display()
        ),
        true,
    )?;
    Ok(accepted.then_some(candidate))
}
