// src/cli/prompt.rs

use crate::core::parameters::{InputRequest, PromptError, Prompter};
use dialoguer::{Input, theme::ColorfulTheme};
use std::io::IsTerminal;

/// Asks for parameter values on the terminal.
///
/// Without an interactive stdin nobody can answer, so the pre-filled value
/// (if any) is taken as the answer.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn request_input(&self, request: &InputRequest) -> Result<Option<String>, PromptError> {
        if !std::io::stdin().is_terminal() {
            log::debug!("Stdin is not a terminal; answering '{}' with its default.", request.prompt);
            return Ok(request.value.clone());
        }

        let theme = ColorfulTheme::default();
        let mut input = Input::<String>::with_theme(&theme)
            .with_prompt(&request.prompt)
            .allow_empty(!request.required)
            .validate_with(|answer: &String| request.validate(answer));
        if let Some(initial) = &request.value {
            input = input.with_initial_text(initial.clone());
        }

        let answer = input
            .interact_text()
            .map_err(|e| PromptError::Other(e.to_string()))?;
        Ok(Some(answer))
    }
}
