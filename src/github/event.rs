//! Pull request and commit resolution from workflow event payloads

use colored::Colorize;
use serde_json::Value;

use super::{PullRequest, ReviewHost};

/// Where the pull request and commit come from, in priority order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSource {
    /// Explicitly configured pull request; its head commit must be looked up
    PullNumber(u64),
    /// `workflow_run` event; the pull request is found among open ones
    WorkflowRun { commit: String },
    PullRequest { number: u64, commit: String },
    /// Push event, commit only
    Push { commit: String },
    Unknown,
}

impl EventSource {
    pub fn from_payload(explicit_number: Option<u64>, payload: &Value) -> Self {
        if let Some(number) = explicit_number {
            return EventSource::PullNumber(number);
        }

        let text = |pointer: &str| payload.pointer(pointer).and_then(Value::as_str);

        if let Some(commit) = text("/workflow_run/head_commit/id") {
            return EventSource::WorkflowRun {
                commit: commit.to_string(),
            };
        }

        if let (Some(number), Some(commit)) = (
            payload.pointer("/pull_request/number").and_then(Value::as_u64),
            text("/pull_request/head/sha"),
        ) {
            return EventSource::PullRequest {
                number,
                commit: commit.to_string(),
            };
        }

        match text("/after") {
            Some(commit) => EventSource::Push {
                commit: commit.to_string(),
            },
            None => EventSource::Unknown,
        }
    }
}

/// Pull request number and commit the report belongs to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullRequestContext {
    pub number: Option<u64>,
    pub commit: Option<String>,
}

/// Open pull request whose head is `commit`; the last match wins
pub fn match_open_pull(pulls: &[PullRequest], commit: &str) -> Option<u64> {
    pulls
        .iter()
        .rev()
        .find(|pull| pull.head.sha == commit)
        .map(|pull| pull.number)
}

/// Resolve the pull request and commit for this run.
///
/// Lookup failures are reported and leave the affected part unknown: a
/// `workflow_run` keeps its commit without a pull request, an explicit pull
/// request without a resolvable head has no commit.
pub async fn resolve_pull_request<H: ReviewHost>(
    host: &H,
    explicit_number: Option<u64>,
    payload: &Value,
) -> PullRequestContext {
    match EventSource::from_payload(explicit_number, payload) {
        EventSource::PullNumber(number) => {
            let commit = match host.pull_head_sha(number).await {
                Ok(sha) => Some(sha),
                Err(e) => {
                    eprintln!(
                        "{} Failed to look up pull request #{}. ({})",
                        "Error:".red().bold(),
                        number,
                        e
                    );
                    None
                }
            };
            PullRequestContext {
                number: Some(number),
                commit,
            }
        }
        EventSource::WorkflowRun { commit } => {
            let number = match host.list_open_pulls().await {
                Ok(pulls) => match_open_pull(&pulls, &commit),
                Err(e) => {
                    eprintln!(
                        "{} Failed to list open pull requests, continuing without one. ({})",
                        "Warning:".yellow(),
                        e
                    );
                    None
                }
            };
            PullRequestContext {
                number,
                commit: Some(commit),
            }
        }
        EventSource::PullRequest { number, commit } => PullRequestContext {
            number: Some(number),
            commit: Some(commit),
        },
        EventSource::Push { commit } => PullRequestContext {
            number: None,
            commit: Some(commit),
        },
        EventSource::Unknown => PullRequestContext::default(),
    }
}
