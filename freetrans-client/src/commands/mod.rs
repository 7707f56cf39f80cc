mod completion;
mod download;
mod history;
mod issue;
mod set;
mod uninstall;
mod upload;

use crate::api_client::{DEFAULT_API_URL, DEFAULT_SHARE_URL, FreeTransferClient};
use anyhow::Result;
use clap::{Args, ValueHint};
use indicatif::{ProgressBar, ProgressStyle};
use std::{io::IsTerminal, time::Duration};
use url::Url;

pub use completion::GenCompletionsCommand;
pub use download::DownloadCommand;
pub use history::HistoryCommand;
pub use issue::IssueCommand;
pub use set::SetCommand;
pub use uninstall::UninstallCommand;
pub use upload::UploadCommand;

pub const PROGRESS_BAR_TICKRATE: Duration = Duration::from_millis(200);

/// Location of the transfer service.
#[derive(Args)]
pub struct ServiceArgs {
    /// Base URL (including scheme) of the transfer API.
    #[clap(
        long = "api",
        env = "FREETRANS_API_URL",
        default_value = DEFAULT_API_URL,
        value_hint = ValueHint::Url
    )]
    api_url: Url,

    /// Base URL (including scheme) that share links are built on.
    #[clap(
        long = "share-url",
        env = "FREETRANS_SHARE_URL",
        default_value = DEFAULT_SHARE_URL,
        value_hint = ValueHint::Url
    )]
    share_url: Url,
}

impl ServiceArgs {
    pub fn client(self) -> Result<FreeTransferClient> {
        Ok(FreeTransferClient::new(self.api_url, self.share_url)?)
    }
}

/// How byte progress is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Terminal,
    Hidden,
}

impl Progress {
    /// Draw bars only when stderr is a terminal.
    pub fn detect() -> Self {
        if std::io::stderr().is_terminal() {
            Self::Terminal
        } else {
            Self::Hidden
        }
    }

    pub fn bytes(self, message: &'static str) -> ProgressBar {
        if self == Self::Hidden {
            return ProgressBar::hidden();
        }
        let prog_bar = ProgressBar::new(0).with_message(message);
        prog_bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{bar:40}] {bytes}/{total_bytes} @ {bytes_per_sec}")
                .unwrap()
                .progress_chars("##-"),
        );
        prog_bar.enable_steady_tick(PROGRESS_BAR_TICKRATE);
        prog_bar
    }
}
