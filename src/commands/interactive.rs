//! 终端交互：冲突决定与确认

use crate::core::{Decision, DecisionHandler, DecisionRequest, DEFAULT_CATEGORY};
use anyhow::{Context, Result};
use dialoguer::{Confirm, Select};

/// 通过 `dialoguer::Select` 回答冲突决定
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptHandler;

impl PromptHandler {
    fn describe(decision: Decision, request: &DecisionRequest) -> String {
        match (decision, request) {
            (Decision::Candidate(idx), DecisionRequest::AmbiguousMatch { candidates, .. }) => {
                candidates
                    .get(idx)
                    .map(|c| format!("Use {}", c.label()))
                    .unwrap_or_else(|| format!("Candidate {}", idx))
            }
            (Decision::UseLocal, DecisionRequest::CategoryMismatch { local_category, .. }) => {
                format!(
                    "Move the Drive copy to '{}'",
                    local_category.as_deref().unwrap_or(DEFAULT_CATEGORY)
                )
            }
            (Decision::KeepRemote, DecisionRequest::CategoryMismatch { remote, .. }) => format!(
                "Keep the Drive copy in '{}'",
                remote.category.as_deref().unwrap_or(DEFAULT_CATEGORY)
            ),
            (Decision::Skip, _) => "Skip this book".to_string(),
            (other, _) => other.to_string(),
        }
    }

    fn prompt(request: &DecisionRequest) -> String {
        match request {
            DecisionRequest::AmbiguousMatch { name, candidates, .. } => format!(
                "'{}' exists {} times on Drive. Which one is this file?",
                name,
                candidates.len()
            ),
            DecisionRequest::CategoryMismatch {
                name,
                local_category,
                remote,
            } => format!(
                "'{}' is in '{}' locally but in '{}' on Drive",
                name,
                local_category.as_deref().unwrap_or(DEFAULT_CATEGORY),
                remote.category.as_deref().unwrap_or(DEFAULT_CATEGORY)
            ),
        }
    }
}

impl DecisionHandler for PromptHandler {
    fn decide(&self, request: &DecisionRequest) -> Result<Option<Decision>> {
        let choices = request.choices();
        let items: Vec<String> = choices
            .iter()
            .map(|d| Self::describe(*d, request))
            .collect();

        // 在 tokio 工作线程中阻塞等待输入
        let selected = tokio::task::block_in_place(|| {
            Select::new()
                .with_prompt(Self::prompt(request))
                .items(&items)
                .default(0)
                .interact_opt()
        })
        .context("Failed to show prompt")?;

        Ok(selected.map(|idx| choices[idx]))
    }
}

/// 批量操作开始前的确认；`yes` 时直接通过
pub fn confirm(prompt: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    tokio::task::block_in_place(|| {
        Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
    })
    .context("Failed to show prompt")
}
