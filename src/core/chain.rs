//! # Chain Orchestrator
//!
//! After a root action exits with code 0, its chain links run one at a time in
//! declared order. A link may pass the previous action's stdout (trailing line
//! breaks removed) to its target as a named parameter.
//!
//! The chain stops at the first of: the last link, a target that already ran in
//! this chain, a target that does not exist, a non-zero exit, or a run error.
//! Nothing is retried.

use crate::{
    core::store::ActionLookup,
    models::{ActionDefinition, ExecutionContext, ExecutionResult},
    system::executor::{ActionExecutor, ExecutorError, RunOptions},
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

/// Something that can run a single action.
#[async_trait]
pub trait ActionRunner: Send + Sync {
    async fn run_action(
        &self,
        action: &ActionDefinition,
        context: &ExecutionContext,
        options: RunOptions,
    ) -> Result<ExecutionResult, ExecutorError>;
}

#[async_trait]
impl ActionRunner for ActionExecutor {
    async fn run_action(
        &self,
        action: &ActionDefinition,
        context: &ExecutionContext,
        options: RunOptions,
    ) -> Result<ExecutionResult, ExecutorError> {
        self.run(action, context, options).await
    }
}

/// Why a chain stopped.
#[derive(Debug)]
pub enum ChainOutcome {
    /// Every link ran and exited with 0.
    Completed,
    /// The root failed or has no chain, so no link ran.
    NotStarted,
    CycleDetected { link_index: usize, target: String },
    TargetMissing { link_index: usize, target: String },
    NonZeroExit {
        link_index: usize,
        target: String,
        exit_code: Option<i32>,
    },
    Failed {
        link_index: usize,
        target: String,
        error: ExecutorError,
    },
}

/// What a chain run did.
#[derive(Debug)]
pub struct ChainReport {
    /// Results of the chain links that ran, in order. The root is not included.
    pub executed: Vec<ExecutionResult>,
    pub outcome: ChainOutcome,
}

impl ChainReport {
    pub fn completed(&self) -> bool {
        matches!(self.outcome, ChainOutcome::Completed)
    }
}

/// Runs chains against an [`ActionRunner`], looking targets up by id.
pub struct ChainRunner<'a, R: ActionRunner + ?Sized, L: ActionLookup + ?Sized> {
    runner: &'a R,
    lookup: &'a L,
}

impl<R: ActionRunner + ?Sized, L: ActionLookup + ?Sized> std::fmt::Debug for ChainRunner<'_, R, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainRunner").finish_non_exhaustive()
    }
}

impl<'a, R: ActionRunner + ?Sized, L: ActionLookup + ?Sized> ChainRunner<'a, R, L> {
    pub fn new(runner: &'a R, lookup: &'a L) -> Self {
        Self { runner, lookup }
    }

    /// Runs `action` and then, if it succeeded, its chain.
    /// An error of the root run is returned as is.
    pub async fn run(
        &self,
        action: &ActionDefinition,
        context: &ExecutionContext,
        options: RunOptions,
    ) -> Result<(ExecutionResult, ChainReport), ExecutorError> {
        let root_result = self.runner.run_action(action, context, options).await?;
        let report = self.run_chain(action, &root_result, context).await;
        Ok((root_result, report))
    }

    /// Walks the chain of `root` given the result of its own run.
    /// The same context is handed to every link.
    pub async fn run_chain(
        &self,
        root: &ActionDefinition,
        root_result: &ExecutionResult,
        context: &ExecutionContext,
    ) -> ChainReport {
        let mut executed = Vec::new();
        let links = root.chain_links();

        if !root_result.succeeded() || links.is_empty() {
            return ChainReport {
                executed,
                outcome: ChainOutcome::NotStarted,
            };
        }

        let mut visited: HashSet<String> = HashSet::from([root.id.clone()]);
        let mut previous_stdout = root_result.stdout.clone();

        for (link_index, link) in links.iter().enumerate() {
            let target = link.target_action_id.clone();

            if visited.contains(&target) {
                log::warn!(
                    "Chain of '{}' stopped: action '{}' already ran in this chain.",
                    root.name,
                    target
                );
                return ChainReport {
                    executed,
                    outcome: ChainOutcome::CycleDetected { link_index, target },
                };
            }

            let Some(next) = self.lookup.find_by_id(&target) else {
                log::warn!(
                    "Chain of '{}' stopped: action '{}' was not found.",
                    root.name,
                    target
                );
                return ChainReport {
                    executed,
                    outcome: ChainOutcome::TargetMissing { link_index, target },
                };
            };
            visited.insert(target.clone());

            let mut provided_values = HashMap::new();
            if let Some(alias) = link.pass_output_as.as_deref().filter(|a| !a.trim().is_empty()) {
                provided_values.insert(alias.to_string(), trim_output(&previous_stdout).to_string());
            }
            let options = RunOptions {
                provided_values,
                force_output_channel: None,
            };

            log::debug!("Chain link {} runs '{}'.", link_index, next.name);
            let result = match self.runner.run_action(&next, context, options).await {
                Ok(result) => result,
                Err(error) => {
                    log::warn!("Chain link {} ('{}') failed: {}", link_index, next.name, error);
                    return ChainReport {
                        executed,
                        outcome: ChainOutcome::Failed {
                            link_index,
                            target,
                            error,
                        },
                    };
                }
            };

            let exit_code = result.exit_code;
            previous_stdout = result.stdout.clone();
            executed.push(result);

            if exit_code != Some(0) {
                log::warn!(
                    "Chain of '{}' stopped: '{}' exited with {:?}.",
                    root.name,
                    next.name,
                    exit_code
                );
                return ChainReport {
                    executed,
                    outcome: ChainOutcome::NonZeroExit {
                        link_index,
                        target,
                        exit_code,
                    },
                };
            }
        }

        ChainReport {
            executed,
            outcome: ChainOutcome::Completed,
        }
    }
}

/// Strips every trailing `\r` and `\n`.
pub fn trim_output(stdout: &str) -> &str {
    stdout.trim_end_matches(['\r', '\n'])
}
