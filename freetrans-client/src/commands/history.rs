use crate::{ExecutableCommand, config::Session, history::HistoryEntry};
use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use tracing::debug;

/// Show previously uploaded files and their share links.
#[derive(Parser)]
pub struct HistoryCommand {}

impl ExecutableCommand for HistoryCommand {
    fn run(self, session: &mut Session) -> Result<()> {
        let store = session.history();
        debug!("reading upload history from '{}'", store.path().display());
        let entries = store
            .entries()
            .context("failed to read upload history")?;
        if entries.is_empty() {
            println!("No uploads recorded yet.");
            if !session.config.history {
                println!("Upload history is disabled, run 'freetrans set' to enable it.");
            }
            return Ok(());
        }
        println!("{}", history_table(&entries));
        Ok(())
    }
}

fn history_table(entries: &[(String, HistoryEntry)]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Date", "Type", "Size", "Path", "URL"]);
    for (date, entry) in entries {
        table.add_row(vec![
            date.clone(),
            entry.filetype.to_string(),
            entry.size.clone(),
            entry.path.display().to_string(),
            entry.url.to_string(),
        ]);
    }
    table
}
