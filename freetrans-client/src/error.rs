use std::{io, path::PathBuf};
use thiserror::Error;

/// Failures of the transfer pipeline.
///
/// Each failure class maps to its own process exit code through [`TransferError::exit_code`].
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("'{}' does not exist, check that the path is spelled correctly", .0.display())]
    NotFound(PathBuf),

    #[error("permission denied while reading '{}'", .0.display())]
    PermissionDenied(PathBuf),

    #[error("'{}' is {size} bytes which exceeds the upload limit of {limit} bytes", path.display())]
    SizeLimitExceeded {
        path: PathBuf,
        size: u64,
        limit: u64,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("the transfer service returned an error: {0}")]
    Api(String),

    #[error("invalid configuration document: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("failed to read answer from terminal: {0}")]
    Prompt(String),

    #[error("operation interrupted")]
    Interrupted,

    #[error("operation cancelled")]
    Cancelled,
}

impl TransferError {
    /// Attach a human readable context to an I/O error.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Process exit status for this failure class.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Cancelled => 0,
            Self::NotFound(_) => 2,
            Self::PermissionDenied(_) => 3,
            Self::SizeLimitExceeded { .. } => 4,
            Self::Io { .. } | Self::Archive(_) => 5,
            Self::Network(_) | Self::Api(_) => 6,
            Self::Config(_) => 7,
            Self::Prompt(_) => 8,
            Self::Interrupted => 130,
        }
    }
}

/// Extension for attaching context to [`io::Result`] values.
pub trait IoContext<T> {
    fn io_context<C: Into<String>>(self, context: impl FnOnce() -> C) -> Result<T, TransferError>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn io_context<C: Into<String>>(self, context: impl FnOnce() -> C) -> Result<T, TransferError> {
        self.map_err(|err| TransferError::io(context(), err))
    }
}
