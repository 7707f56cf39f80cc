use crate::{
    ExecutableCommand,
    config::Session,
    desktop,
    prompt::{Prompter, TerminalPrompter},
};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;
use url::Url;

const NEW_ISSUE_URL: &str = "https://github.com/el2zay/freetranscli/issues/new";

/// Report a bug or request a feature on GitHub.
///
/// Opens the new-issue page in your browser. When no browser can be opened
/// the link is printed instead, along with a QR code.
#[derive(Parser)]
pub struct IssueCommand {}

impl ExecutableCommand for IssueCommand {
    fn run(self, _session: &mut Session) -> Result<()> {
        let mut prompter = TerminalPrompter;
        let title = prompter.text("Issue title:")?;
        let body = prompter.text("Issue description:")?;
        let url = issue_url(&title, &body)?;

        if let Err(err) = desktop::open_browser(url.as_str()) {
            warn!("{err:#}");
            match desktop::qr_code(url.as_str()) {
                Ok(code) => println!("{code}"),
                Err(err) => warn!("{err:#}"),
            }
            println!("Open this link to create the issue: {url}");
        }
        Ok(())
    }
}

fn issue_url(title: &str, body: &str) -> Result<Url> {
    Url::parse_with_params(NEW_ISSUE_URL, [("title", title), ("body", body)])
        .context("failed to build issue link")
}
