use crate::error::TransferError;
use inquire::{Confirm, InquireError, Select, Text};

/// Source of answers for every interactive question the client asks.
///
/// The pipeline only talks to the terminal through this trait so it can be
/// driven without one.
pub trait Prompter {
    /// Ask a yes/no question.
    fn confirm(&mut self, message: &str, default: bool) -> Result<bool, TransferError>;

    /// Ask the user to pick one of `options`, returning its index.
    fn select(&mut self, message: &str, options: &[String]) -> Result<usize, TransferError>;

    /// Ask for a line of free text.
    fn text(&mut self, message: &str) -> Result<String, TransferError>;
}

/// [`Prompter`] backed by terminal prompts.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn confirm(&mut self, message: &str, default: bool) -> Result<bool, TransferError> {
        Confirm::new(message)
            .with_default(default)
            .prompt()
            .map_err(prompt_error)
    }

    fn select(&mut self, message: &str, options: &[String]) -> Result<usize, TransferError> {
        Select::new(message, options.to_vec())
            .with_page_size(options.len().max(1))
            .raw_prompt()
            .map(|choice| choice.index)
            .map_err(prompt_error)
    }

    fn text(&mut self, message: &str) -> Result<String, TransferError> {
        Text::new(message).prompt().map_err(prompt_error)
    }
}

fn prompt_error(err: InquireError) -> TransferError {
    match err {
        InquireError::OperationInterrupted | InquireError::OperationCanceled => {
            TransferError::Interrupted
        }
        other => TransferError::Prompt(other.to_string()),
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::VecDeque;

    /// A canned answer for [`ScriptedPrompter`].
    #[derive(Debug, Clone)]
    pub enum Answer {
        Confirm(bool),
        Select(usize),
        Text(String),
        Interrupt,
    }

    /// Replays answers in order and records every question it was asked.
    #[derive(Debug, Default)]
    pub struct ScriptedPrompter {
        answers: VecDeque<Answer>,
        pub asked: Vec<String>,
    }

    impl ScriptedPrompter {
        pub fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
            Self {
                answers: answers.into_iter().collect(),
                asked: Vec::new(),
            }
        }

        fn next(&mut self, message: &str) -> Answer {
            self.asked.push(message.to_string());
            self.answers
                .pop_front()
                .unwrap_or_else(|| panic!("no scripted answer left for '{message}'"))
        }
    }

    impl Prompter for ScriptedPrompter {
        fn confirm(&mut self, message: &str, _default: bool) -> Result<bool, TransferError> {
            match self.next(message) {
                Answer::Confirm(value) => Ok(value),
                Answer::Interrupt => Err(TransferError::Interrupted),
                other => panic!("expected a confirm answer for '{message}', got {other:?}"),
            }
        }

        fn select(&mut self, message: &str, options: &[String]) -> Result<usize, TransferError> {
            match self.next(message) {
                Answer::Select(index) => {
                    assert!(index < options.len(), "scripted index out of range");
                    Ok(index)
                }
                Answer::Interrupt => Err(TransferError::Interrupted),
                other => panic!("expected a select answer for '{message}', got {other:?}"),
            }
        }

        fn text(&mut self, message: &str) -> Result<String, TransferError> {
            match self.next(message) {
                Answer::Text(value) => Ok(value),
                Answer::Interrupt => Err(TransferError::Interrupted),
                other => panic!("expected a text answer for '{message}', got {other:?}"),
            }
        }
    }
}
