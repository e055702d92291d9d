//! Pull request action flow
//!
//! Renders the reports, evaluates the threshold and delivers both to the
//! review host. Delivery failures are reported and never change the verdict.

use anyhow::Result;
use colored::Colorize;
use serde_json::Value;

use crate::config::Config;
use crate::coverage::{evaluate, CoverageReport, ThresholdVerdict};
use crate::github::{resolve_pull_request, CheckRun, PullRequestContext, ReviewHost};
use crate::markdown::markdown_report;

/// What the action did
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub context: PullRequestContext,
    /// `None` when no commit could be resolved and nothing was rendered
    pub verdict: Option<ThresholdVerdict>,
    pub comment_posted: bool,
    pub check_created: bool,
}

impl ActionOutcome {
    /// Whether the process should fail: only when `fail_below_threshold` is
    /// set and the threshold was missed.
    pub fn should_fail(&self, fail_below_threshold: bool) -> bool {
        fail_below_threshold
            && self
                .verdict
                .as_ref()
                .is_some_and(|verdict| verdict.below_threshold)
    }
}

async fn changed_files<H: ReviewHost>(host: &H, number: Option<u64>) -> Option<Vec<String>> {
    let Some(number) = number else {
        eprintln!(
            "{} only_changed_files is set but no pull request was found, reporting all files",
            "Warning:".yellow()
        );
        return None;
    };

    match host.list_pull_files(number).await {
        Ok(files) => Some(files),
        Err(e) => {
            eprintln!(
                "{} Failed to list changed files, reporting all files. ({})",
                "Warning:".yellow(),
                e
            );
            None
        }
    }
}

pub async fn run_action<H: ReviewHost>(
    host: &H,
    config: &Config,
    reports: &[CoverageReport],
    payload: &Value,
) -> Result<ActionOutcome> {
    let context = resolve_pull_request(host, config.action.pull_request_number, payload).await;

    let Some(commit) = context.commit.clone() else {
        eprintln!("{} Found no commit.", "Error:".red().bold());
        return Ok(ActionOutcome {
            context,
            verdict: None,
            comment_posted: false,
            check_created: false,
        });
    };

    let mut render = config.render.clone();
    if config.action.only_changed_files {
        render.filtered_files = changed_files(host, context.number)
            .await
            .map(|files| files.into_iter().collect());
    }

    let report = markdown_report(reports, &commit, &render)?;
    let verdict = evaluate(reports, render.minimum_coverage, &render.report_name)?;

    let mut comment_posted = false;
    if let Some(number) = context.number.filter(|_| config.action.pull_request_comment) {
        match host
            .upsert_comment(number, &report.flat, &render.report_name)
            .await
        {
            Ok(()) => comment_posted = true,
            Err(e) => eprintln!("❌ Failed to add pull request comment. ({})", e),
        }
    }

    let check = CheckRun {
        name: &config.action.check_name,
        head_sha: &commit,
        title: &verdict.title,
        summary: &report.structured,
        conclusion: verdict.conclusion(config.action.fail_below_threshold),
    };
    let check_created = match host.create_check(&check).await {
        Ok(()) => true,
        Err(e) => {
            eprintln!(
                "❌ Failed to create checks using the provided token. ({})",
                e
            );
            false
        }
    };

    Ok(ActionOutcome {
        context,
        verdict: Some(verdict),
        comment_posted,
        check_created,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::{CheckConclusion, FileCoverage};
    use crate::github::{PullHead, PullRequest};
    use serde_json::json;
    use std::cell::RefCell;

    #[derive(Debug, Clone)]
    struct RecordedCheck {
        name: String,
        head_sha: String,
        title: String,
        summary: String,
        conclusion: CheckConclusion,
    }

    #[derive(Default)]
    struct FakeHost {
        open_pulls: Vec<PullRequest>,
        files: Vec<String>,
        fail_comment: bool,
        fail_check: bool,
        fail_files: bool,
        fail_pulls: bool,
        comments: RefCell<Vec<(u64, String, String)>>,
        checks: RefCell<Vec<RecordedCheck>>,
    }

    impl ReviewHost for FakeHost {
        async fn pull_head_sha(&self, number: u64) -> Result<String> {
            if self.fail_pulls {
                anyhow::bail!("502 Bad Gateway");
            }
            Ok(format!("sha-of-{}", number))
        }

        async fn list_open_pulls(&self) -> Result<Vec<PullRequest>> {
            if self.fail_pulls {
                anyhow::bail!("502 Bad Gateway");
            }
            Ok(self.open_pulls.clone())
        }

        async fn list_pull_files(&self, _number: u64) -> Result<Vec<String>> {
            if self.fail_files {
                anyhow::bail!("boom");
            }
            Ok(self.files.clone())
        }

        async fn upsert_comment(&self, issue: u64, body: &str, marker: &str) -> Result<()> {
            if self.fail_comment {
                anyhow::bail!("403 Forbidden");
            }
            self.comments
                .borrow_mut()
                .push((issue, body.to_string(), marker.to_string()));
            Ok(())
        }

        async fn create_check(&self, check: &CheckRun<'_>) -> Result<()> {
            if self.fail_check {
                anyhow::bail!("403 Forbidden");
            }
            self.checks.borrow_mut().push(RecordedCheck {
                name: check.name.to_string(),
                head_sha: check.head_sha.to_string(),
                title: check.title.to_string(),
                summary: check.summary.to_string(),
                conclusion: check.conclusion,
            });
            Ok(())
        }
    }

    fn file(filename: &str, total: f64) -> FileCoverage {
        FileCoverage {
            filename: filename.to_string(),
            name: None,
            total,
            line: total,
            branch: total,
            missing: Vec::new(),
        }
    }

    fn reports(total: f64) -> Vec<CoverageReport> {
        vec![CoverageReport {
            folder: "app".to_string(),
            total,
            line: total,
            branch: total,
            files: vec![file("a.py", total), file("b.py", total)],
        }]
    }

    fn config(minimum_coverage: u32, fail_below_threshold: bool) -> Config {
        let mut config = Config::default();
        config.render.minimum_coverage = minimum_coverage;
        config.action.fail_below_threshold = fail_below_threshold;
        config
    }

    fn pull_request_event() -> Value {
        json!({ "pull_request": { "number": 5, "head": { "sha": "abc" } } })
    }

    #[tokio::test]
    async fn test_posts_comment_and_check() {
        let host = FakeHost::default();
        let outcome = run_action(&host, &config(80, true), &reports(60.0), &pull_request_event())
            .await
            .unwrap();

        assert!(outcome.comment_posted);
        assert!(outcome.check_created);
        assert!(outcome.should_fail(true));

        let comments = host.comments.borrow();
        assert_eq!(comments[0].0, 5);
        assert_eq!(comments[0].2, "Coverage Report");
        assert!(!comments[0].1.contains("<details>"));

        let checks = host.checks.borrow();
        assert_eq!(checks[0].name, "coverage");
        assert_eq!(checks[0].head_sha, "abc");
        assert_eq!(checks[0].title, "Coverage: 60% (actual) < 80% (expected)");
        assert!(checks[0].summary.starts_with("<details>"));
        assert_eq!(checks[0].conclusion, CheckConclusion::Failure);
    }

    #[tokio::test]
    async fn test_neutral_without_fail_below_threshold() {
        let host = FakeHost::default();
        let outcome = run_action(&host, &config(80, false), &reports(60.0), &pull_request_event())
            .await
            .unwrap();

        assert!(outcome.verdict.as_ref().unwrap().below_threshold);
        assert!(!outcome.should_fail(false));
        assert_eq!(host.checks.borrow()[0].conclusion, CheckConclusion::Neutral);
    }

    #[tokio::test]
    async fn test_delivery_failures_keep_verdict() {
        let host = FakeHost {
            fail_comment: true,
            fail_check: true,
            ..Default::default()
        };
        let outcome = run_action(&host, &config(80, true), &reports(60.0), &pull_request_event())
            .await
            .unwrap();

        assert!(!outcome.comment_posted);
        assert!(!outcome.check_created);
        assert!(outcome.should_fail(true));
    }

    #[tokio::test]
    async fn test_push_event_skips_comment() {
        let host = FakeHost::default();
        let payload = json!({ "after": "def" });
        let outcome = run_action(&host, &config(50, true), &reports(90.0), &payload)
            .await
            .unwrap();

        assert!(!outcome.comment_posted);
        assert!(host.comments.borrow().is_empty());
        assert_eq!(host.checks.borrow()[0].conclusion, CheckConclusion::Success);
        assert!(!outcome.should_fail(true));
    }

    #[tokio::test]
    async fn test_no_commit_renders_nothing() {
        let host = FakeHost::default();
        let outcome = run_action(&host, &config(80, true), &reports(10.0), &json!({}))
            .await
            .unwrap();

        assert!(outcome.verdict.is_none());
        assert!(!outcome.should_fail(true));
        assert!(host.checks.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_workflow_run_matches_open_pull() {
        let host = FakeHost {
            open_pulls: vec![PullRequest {
                number: 12,
                head: PullHead {
                    sha: "wf".to_string(),
                },
            }],
            ..Default::default()
        };
        let payload = json!({ "workflow_run": { "head_commit": { "id": "wf" } } });
        let outcome = run_action(&host, &config(0, false), &reports(50.0), &payload)
            .await
            .unwrap();

        assert_eq!(outcome.context.number, Some(12));
        assert_eq!(host.comments.borrow()[0].0, 12);
    }

    #[tokio::test]
    async fn test_workflow_run_lookup_failure_keeps_verdict() {
        let host = FakeHost {
            fail_pulls: true,
            ..Default::default()
        };
        let payload = json!({ "workflow_run": { "head_commit": { "id": "wf" } } });
        let outcome = run_action(&host, &config(80, true), &reports(95.0), &payload)
            .await
            .unwrap();

        assert_eq!(outcome.context.number, None);
        assert_eq!(outcome.context.commit.as_deref(), Some("wf"));
        assert!(!outcome.verdict.as_ref().unwrap().below_threshold);
        assert!(!outcome.should_fail(true));
        assert!(!outcome.comment_posted);
        assert!(outcome.check_created);

        let checks = host.checks.borrow();
        assert_eq!(checks[0].head_sha, "wf");
        assert_eq!(checks[0].conclusion, CheckConclusion::Success);
    }

    #[tokio::test]
    async fn test_explicit_pull_request_lookup_failure() {
        let host = FakeHost {
            fail_pulls: true,
            ..Default::default()
        };
        let mut cfg = config(80, true);
        cfg.action.pull_request_number = Some(44);
        let outcome = run_action(&host, &cfg, &reports(10.0), &json!({}))
            .await
            .unwrap();

        assert_eq!(outcome.context.number, Some(44));
        assert!(outcome.verdict.is_none());
        assert!(!outcome.should_fail(true));
        assert!(host.checks.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_explicit_pull_request_number() {
        let host = FakeHost::default();
        let mut cfg = config(0, false);
        cfg.action.pull_request_number = Some(44);
        let outcome = run_action(&host, &cfg, &reports(50.0), &json!({}))
            .await
            .unwrap();

        assert_eq!(outcome.context.commit.as_deref(), Some("sha-of-44"));
        assert!(host.comments.borrow()[0].1.contains("sha-of-44"));
    }

    #[tokio::test]
    async fn test_only_changed_files() {
        let host = FakeHost {
            files: vec!["a.py".to_string()],
            ..Default::default()
        };
        let mut cfg = config(0, false);
        cfg.action.only_changed_files = true;
        run_action(&host, &cfg, &reports(50.0), &pull_request_event())
            .await
            .unwrap();

        let comments = host.comments.borrow();
        let body = &comments[0].1;
        assert!(body.contains("| a.py |"));
        assert!(!body.contains("| b.py |"));
    }

    #[tokio::test]
    async fn test_changed_files_failure_reports_everything() {
        let host = FakeHost {
            fail_files: true,
            ..Default::default()
        };
        let mut cfg = config(0, false);
        cfg.action.only_changed_files = true;
        run_action(&host, &cfg, &reports(50.0), &pull_request_event())
            .await
            .unwrap();

        let comments = host.comments.borrow();
        let body = &comments[0].1;
        assert!(body.contains("| a.py |"));
        assert!(body.contains("| b.py |"));
    }

    #[tokio::test]
    async fn test_comment_disabled() {
        let host = FakeHost::default();
        let mut cfg = config(0, false);
        cfg.action.pull_request_comment = false;
        let outcome = run_action(&host, &cfg, &reports(50.0), &pull_request_event())
            .await
            .unwrap();

        assert!(!outcome.comment_posted);
        assert!(outcome.check_created);
    }
}
