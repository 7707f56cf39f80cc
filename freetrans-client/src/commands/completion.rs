use std::io;

use anyhow::Result;
use clap::{CommandFactory, Parser, ValueHint};
use clap_complete::{Generator, Shell, generate};

use crate::RootCommand;

/// Print a shell completion script to stdout.
#[derive(Parser)]
pub struct GenCompletionsCommand {
    #[clap(value_enum, value_hint = ValueHint::Other)]
    shell: Shell,
}

fn print_completions<G: Generator>(generator: G, cmd: &mut clap::Command, out: &mut dyn io::Write) {
    generate(generator, cmd, cmd.get_name().to_string(), out);
}

impl GenCompletionsCommand {
    /// Runs without a session so completions never touch the config directory.
    pub fn run(self) -> Result<()> {
        let mut cmd = RootCommand::command();
        eprintln!("Generating completion file for {:?}...", self.shell);
        print_completions(self.shell, &mut cmd, &mut io::stdout());
        Ok(())
    }
}
