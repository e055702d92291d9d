//! Coverage threshold evaluation

use colored::Colorize;
use serde::Serialize;

use super::{floor_percent, validate_reports, CoverageReport};
use crate::error::Result;

/// Floored total of one report compared against the minimum
#[derive(Debug, Clone, PartialEq)]
pub struct ReportThreshold {
    pub folder: String,
    pub actual: i64,
    pub passed: bool,
}

/// Result of threshold evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdVerdict {
    pub below_threshold: bool,
    pub title: String,
    pub minimum_coverage: u32,
    pub reports: Vec<ReportThreshold>,
}

/// Outcome reported on the check run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckConclusion {
    Success,
    Failure,
    Neutral,
}

impl ThresholdVerdict {
    /// Map the verdict to a check conclusion. Without `fail_below_threshold`
    /// the check stays neutral whatever the coverage.
    pub fn conclusion(&self, fail_below_threshold: bool) -> CheckConclusion {
        if !fail_below_threshold {
            CheckConclusion::Neutral
        } else if self.below_threshold {
            CheckConclusion::Failure
        } else {
            CheckConclusion::Success
        }
    }

    pub fn print_summary(&self) {
        for report in &self.reports {
            let status = if report.passed { "✓".green() } else { "✗".red() };
            let delta = report.actual - i64::from(self.minimum_coverage);
            let delta_str = if delta >= 0 {
                format!("+{}%", delta).green()
            } else {
                format!("{}%", delta).red()
            };
            let folder = if report.folder.is_empty() {
                "coverage".to_string()
            } else {
                report.folder.clone()
            };

            println!(
                "  {} {}: {}% (threshold: {}%, {})",
                status, folder, report.actual, self.minimum_coverage, delta_str
            );
        }
        println!("  {}", self.title.bold());
    }
}

/// Compare every report's floored total against `minimum_coverage`.
///
/// Only a single-report run gets a comparison title; with zero or several
/// reports the title is just `report_name`.
pub fn evaluate(
    reports: &[CoverageReport],
    minimum_coverage: u32,
    report_name: &str,
) -> Result<ThresholdVerdict> {
    validate_reports(reports)?;

    let minimum = i64::from(minimum_coverage);
    let results: Vec<ReportThreshold> = reports
        .iter()
        .map(|report| {
            let actual = floor_percent(report.total);
            ReportThreshold {
                folder: report.folder.clone(),
                actual,
                passed: actual >= minimum,
            }
        })
        .collect();

    let below_threshold = results.iter().any(|r| !r.passed);

    let title = match results.as_slice() {
        [only] => format!(
            "Coverage: {}% (actual) {} {}% (expected)",
            only.actual,
            if below_threshold { "<" } else { ">=" },
            minimum_coverage
        ),
        _ => report_name.to_string(),
    };

    Ok(ThresholdVerdict {
        below_threshold,
        title,
        minimum_coverage,
        reports: results,
    })
}
