// src/core/parameters.rs

use crate::{
    core::template,
    models::{ActionDefinition, Parameter},
};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParameterError {
    #[error("Could not ask for a value for parameter '{name}': {source}")]
    Prompt {
        name: String,
        #[source]
        source: PromptError,
    },
}

/// Failure of the interactive input surface itself, as opposed to the user
/// declining to answer (which is `Ok(None)`).
#[derive(Error, Debug)]
pub enum PromptError {
    #[error("Terminal I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

/// A request for one parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRequest {
    /// Pre-filled value offered to the user.
    pub value: Option<String>,
    pub prompt: String,
    /// When set, the prompt must reject an empty answer.
    pub required: bool,
}

impl InputRequest {
    /// The validation rule applied to every answer.
    pub fn validate(&self, answer: &str) -> Result<(), String> {
        if self.required && answer.trim().is_empty() {
            Err("A value is required.".to_string())
        } else {
            Ok(())
        }
    }
}

/// Interactive source of parameter values.
pub trait Prompter: Send + Sync {
    /// Asks the user for a value. `Ok(None)` means no answer was given.
    fn request_input(&self, request: &InputRequest) -> Result<Option<String>, PromptError>;
}

/// Merges the parameters declared on an action with the ones its script
/// declares inline.
///
/// Explicit declarations win. Inline declarations that are not already
/// declared are added as required parameters.
pub fn merge_declarations(action: &ActionDefinition) -> Vec<Parameter> {
    let mut merged: Vec<Parameter> = action.parameters.clone();
    let mut known: HashSet<String> = merged.iter().map(|p| p.name.clone()).collect();

    for inline in template::extract_declared_parameters(&action.script) {
        if known.insert(inline.name.clone()) {
            merged.push(inline);
        }
    }
    merged
}

fn default_prompt(name: &str) -> String {
    format!("Enter a value for '{}'", name)
}

/// Produces the final name-to-value mapping of a run.
#[derive(Clone, Copy)]
pub struct ParameterResolver<'a> {
    prompter: &'a dyn Prompter,
}

impl std::fmt::Debug for ParameterResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterResolver").finish_non_exhaustive()
    }
}

impl<'a> ParameterResolver<'a> {
    pub fn new(prompter: &'a dyn Prompter) -> Self {
        Self { prompter }
    }

    /// Resolves every merged parameter of `action`.
    ///
    /// Provided values are used verbatim and never prompted for. An optional
    /// parameter with a default takes it silently. Everything else is asked
    /// interactively, and an unanswered prompt leaves the parameter out of the
    /// result.
    pub fn resolve(
        &self,
        action: &ActionDefinition,
        provided: &HashMap<String, String>,
    ) -> Result<BTreeMap<String, String>, ParameterError> {
        let mut values = BTreeMap::new();

        for param in merge_declarations(action) {
            if let Some(value) = provided.get(&param.name) {
                log::debug!("Parameter '{}' supplied by caller.", param.name);
                values.insert(param.name, value.clone());
                continue;
            }

            if !param.required
                && let Some(default) = &param.default_value
            {
                log::debug!("Parameter '{}' uses its default value.", param.name);
                values.insert(param.name.clone(), default.clone());
                continue;
            }

            let request = InputRequest {
                value: param.default_value.clone(),
                prompt: param
                    .prompt
                    .clone()
                    .unwrap_or_else(|| default_prompt(&param.name)),
                required: param.required,
            };
            let answer = self
                .prompter
                .request_input(&request)
                .map_err(|source| ParameterError::Prompt {
                    name: param.name.clone(),
                    source,
                })?;

            match answer {
                Some(value) => {
                    values.insert(param.name, value);
                }
                None => log::debug!("No value given for parameter '{}'; omitting it.", param.name),
            }
        }
        Ok(values)
    }
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::ActionDraft;
    use std::sync::Mutex;

    /// Answers prompts from a queue and records every request it receives.
    #[derive(Default)]
    pub(crate) struct ScriptedPrompter {
        answers: Mutex<Vec<Option<String>>>,
        pub(crate) requests: Mutex<Vec<InputRequest>>,
        /// Answer with the pre-filled value instead of the queue.
        accept_defaults: bool,
    }

    impl ScriptedPrompter {
        pub(crate) fn answering(answers: Vec<Option<&str>>) -> Self {
            Self {
                answers: Mutex::new(
                    answers
                        .into_iter()
                        .rev()
                        .map(|a| a.map(str::to_string))
                        .collect(),
                ),
                ..Default::default()
            }
        }

        pub(crate) fn accepting_defaults() -> Self {
            Self {
                accept_defaults: true,
                ..Default::default()
            }
        }

        pub(crate) fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl Prompter for ScriptedPrompter {
        fn request_input(&self, request: &InputRequest) -> Result<Option<String>, PromptError> {
            self.requests.lock().unwrap().push(request.clone());
            if self.accept_defaults {
                return Ok(request.value.clone());
            }
            Ok(self.answers.lock().unwrap().pop().flatten())
        }
    }

    fn action(script: &str, parameters: Vec<Parameter>) -> ActionDefinition {
        ActionDraft {
            name: "test".to_string(),
            script: script.to_string(),
            parameters,
            ..Default::default()
        }
        .into_definition()
    }

    fn param(name: &str, default: Option<&str>, required: bool) -> Parameter {
        Parameter {
            name: name.to_string(),
            prompt: None,
            default_value: default.map(str::to_string),
            required,
        }
    }

    #[test]
    fn test_declared_parameter_wins_over_inline_token() {
        let action = action("echo ${param:P:D2}", vec![param("P", Some("D1"), false)]);
        let merged = merge_declarations(&action);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].default_value.as_deref(), Some("D1"));
        assert!(!merged[0].required);
    }

    #[test]
    fn test_provided_values_skip_the_prompt() {
        let action = action("echo ${param:P}", vec![]);
        let prompter = ScriptedPrompter::answering(vec![Some("never")]);
        let provided = HashMap::from([("P".to_string(), "given".to_string())]);

        let values = ParameterResolver::new(&prompter)
            .resolve(&action, &provided)
            .unwrap();
        assert_eq!(values.get("P").map(String::as_str), Some("given"));
        assert_eq!(prompter.request_count(), 0);
    }

    #[test]
    fn test_optional_default_is_used_without_prompting() {
        let action = action("echo", vec![param("region", Some("eu"), false)]);
        let prompter = ScriptedPrompter::default();
        let values = ParameterResolver::new(&prompter)
            .resolve(&action, &HashMap::new())
            .unwrap();
        assert_eq!(values.get("region").map(String::as_str), Some("eu"));
        assert_eq!(prompter.request_count(), 0);
    }

    #[test]
    fn test_inline_parameter_prompts_with_default_prefilled() {
        let action = action("echo ${param:name:World:Who to greet?}", vec![]);
        let prompter = ScriptedPrompter::accepting_defaults();
        let values = ParameterResolver::new(&prompter)
            .resolve(&action, &HashMap::new())
            .unwrap();

        assert_eq!(values.get("name").map(String::as_str), Some("World"));
        let requests = prompter.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].prompt, "Who to greet?");
        assert_eq!(requests[0].value.as_deref(), Some("World"));
        assert!(requests[0].required);
    }

    #[test]
    fn test_unanswered_prompt_omits_parameter() {
        let action = action("echo ${param:a} ${param:b}", vec![]);
        let prompter = ScriptedPrompter::answering(vec![None, Some("B")]);
        let values = ParameterResolver::new(&prompter)
            .resolve(&action, &HashMap::new())
            .unwrap();
        assert!(!values.contains_key("a"));
        assert_eq!(values.get("b").map(String::as_str), Some("B"));
    }

    #[test]
    fn test_generated_prompt_and_validation() {
        let action = action("", vec![param("target", None, true)]);
        let prompter = ScriptedPrompter::answering(vec![Some("x")]);
        ParameterResolver::new(&prompter)
            .resolve(&action, &HashMap::new())
            .unwrap();

        let requests = prompter.requests.lock().unwrap();
        assert_eq!(requests[0].prompt, "Enter a value for 'target'");
        assert!(requests[0].validate("  ").is_err());
        assert!(requests[0].validate("ok").is_ok());
    }
}
