//! covmark - coverage reports for pull requests
//!
//! A library for turning normalized coverage data into review feedback:
//! - Markdown tables per report, flat or folded into `<details>` blocks
//! - Missing line ranges, cropped and linked to the source at a commit
//! - Minimum coverage gate with a check run title and conclusion
//! - GitHub delivery as a pull request comment and a check run

pub mod action;
pub mod config;
pub mod coverage;
pub mod error;
pub mod github;
pub mod markdown;

pub use config::{Config, RenderConfig, Repository};
pub use coverage::{
    evaluate, floor_percent, load_reports, CheckConclusion, CoverageReport, FileCoverage,
    LineRange, ThresholdVerdict,
};
pub use error::{CoverageError, Result};
pub use markdown::{format_missing_lines, markdown_report, MarkdownReport};
