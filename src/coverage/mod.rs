//! Coverage module
//!
//! Provides:
//! - Normalized coverage model (reports, files, missing line ranges)
//! - Boundary validation of that model
//! - Threshold evaluation

mod threshold;

pub use threshold::*;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{CoverageError, Result};

/// Coverage data for one coverage source (one Cobertura file, one folder)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub folder: String,
    pub total: f64,
    pub line: f64,
    pub branch: f64,
    #[serde(default)]
    pub files: Vec<FileCoverage>,
}

/// Coverage data for a single file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileCoverage {
    /// Path relative to the repository root
    pub filename: String,
    /// Qualified class name, if the producer reported one
    #[serde(default)]
    pub name: Option<String>,
    pub total: f64,
    pub line: f64,
    pub branch: f64,
    #[serde(default)]
    pub missing: Vec<LineRange>,
}

/// Closed interval of uncovered lines, 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "(u32, u32)", into = "(u32, u32)")]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

impl LineRange {
    pub fn new(start: u32, end: u32) -> Result<Self> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    pub fn single(line: u32) -> Result<Self> {
        Self::new(line, line)
    }

    pub fn is_single(&self) -> bool {
        self.start == self.end
    }

    fn validate(&self) -> Result<()> {
        if self.start == 0 {
            return Err(CoverageError::InvalidInput(format!(
                "line range {}-{} starts at line 0, lines are 1-based",
                self.start, self.end
            )));
        }
        if self.start > self.end {
            return Err(CoverageError::InvalidInput(format!(
                "line range {}-{} has start after end",
                self.start, self.end
            )));
        }
        Ok(())
    }
}

impl TryFrom<(u32, u32)> for LineRange {
    type Error = CoverageError;

    fn try_from((start, end): (u32, u32)) -> Result<Self> {
        Self::new(start, end)
    }
}

impl From<LineRange> for (u32, u32) {
    fn from(range: LineRange) -> Self {
        (range.start, range.end)
    }
}

/// Percentage as displayed everywhere: truncated, never rounded
pub fn floor_percent(value: f64) -> i64 {
    value.floor() as i64
}

fn validate_percent(value: f64, what: &str, owner: &str) -> Result<()> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(CoverageError::InvalidInput(format!(
            "{} coverage of '{}' is {}, expected a percentage between 0 and 100",
            what, owner, value
        )));
    }
    Ok(())
}

impl FileCoverage {
    pub fn validate(&self) -> Result<()> {
        validate_percent(self.total, "total", &self.filename)?;
        validate_percent(self.line, "line", &self.filename)?;
        validate_percent(self.branch, "branch", &self.filename)?;
        for range in &self.missing {
            range.validate().map_err(|e| {
                CoverageError::InvalidInput(format!("{} (in '{}')", e, self.filename))
            })?;
        }
        Ok(())
    }
}

impl CoverageReport {
    pub fn validate(&self) -> Result<()> {
        validate_percent(self.total, "total", &self.folder)?;
        validate_percent(self.line, "line", &self.folder)?;
        validate_percent(self.branch, "branch", &self.folder)?;
        self.files.iter().try_for_each(FileCoverage::validate)
    }
}

/// Validate every report before it reaches the renderer or the evaluator
pub fn validate_reports(reports: &[CoverageReport]) -> Result<()> {
    reports.iter().try_for_each(CoverageReport::validate)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ReportsFile {
    Many(Vec<CoverageReport>),
    One(CoverageReport),
}

/// Parse normalized reports from JSON: either an array or a single report object
pub fn parse_reports(content: &str) -> Result<Vec<CoverageReport>> {
    let reports = match serde_json::from_str::<ReportsFile>(content)? {
        ReportsFile::Many(reports) => reports,
        ReportsFile::One(report) => vec![report],
    };
    validate_reports(&reports)?;
    Ok(reports)
}

/// Load normalized reports from a JSON file
pub fn load_reports(path: &Path) -> Result<Vec<CoverageReport>> {
    let content = fs::read_to_string(path)?;
    parse_reports(&content)
}
