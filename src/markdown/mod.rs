//! Markdown rendering of coverage reports
//!
//! Provides:
//! - Missing line range formatting
//! - Column-driven table building
//! - Flat and collapsible report documents

pub mod ranges;
pub mod table;

pub use ranges::{file_url, format_missing_lines, format_range_text};
pub use table::{Column, MarkdownTable, TableRow};

use crate::config::RenderConfig;
use crate::coverage::{floor_percent, validate_reports, CoverageReport, FileCoverage};
use crate::error::{CoverageError, Result};

pub const CREDITS: &str = "Generated by :monkey: covmark";
pub const PASS_GLYPH: &str = ":white_check_mark:";
pub const FAIL_GLYPH: &str = ":x:";
const ALL_FILES: &str = "**All files**";

/// The two rendered variants of the same reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownReport {
    /// Title and table per report, for a pull request comment
    pub flat: String,
    /// Each report folded into a `<details>` block, for a check run summary
    pub structured: String,
}

/// Backslash-escape characters that would otherwise turn into markdown
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '`' | '*' | '_' | '~' | '#') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn status_glyph(total: i64, minimum_coverage: u32) -> &'static str {
    if total >= i64::from(minimum_coverage) {
        PASS_GLYPH
    } else {
        FAIL_GLYPH
    }
}

fn check_config(config: &RenderConfig) -> Result<()> {
    if config.minimum_coverage > 100 {
        return Err(CoverageError::Config(format!(
            "minimum coverage {} is above 100",
            config.minimum_coverage
        )));
    }
    if config.show_missing && config.link_missing_lines && config.repository.is_none() {
        return Err(CoverageError::Config(
            "linking missing lines requires a repository".to_string(),
        ));
    }
    Ok(())
}

fn file_row(file: &FileCoverage, revision: &str, config: &RenderConfig) -> TableRow {
    let name = if config.show_class_names {
        file.name.as_deref().unwrap_or(&file.filename)
    } else {
        file.filename.as_str()
    };
    let total = floor_percent(file.total);

    let missing = (config.show_missing && !file.missing.is_empty()).then(|| {
        let url = match &config.repository {
            Some(repository) if config.link_missing_lines => file_url(
                &config.server_url,
                repository,
                config.link_missing_lines_source_dir.as_deref(),
                &file.filename,
                revision,
            ),
            _ => String::new(),
        };
        format_missing_lines(
            &url,
            &file.missing,
            config.show_missing_max_length,
            config.link_missing_lines,
        )
    });

    TableRow {
        name: escape_markdown(name),
        total,
        line: floor_percent(file.line),
        branch: floor_percent(file.branch),
        status: status_glyph(total, config.minimum_coverage),
        missing,
    }
}

fn report_table(report: &CoverageReport, revision: &str, config: &RenderConfig) -> String {
    let total = floor_percent(report.total);
    let mut table = MarkdownTable::new(Column::for_config(config));

    table.push(&TableRow {
        name: ALL_FILES.to_string(),
        total,
        line: floor_percent(report.line),
        branch: floor_percent(report.branch),
        status: status_glyph(total, config.minimum_coverage),
        missing: None,
    });

    let retained = report.files.iter().filter(|file| {
        config
            .filtered_files
            .as_ref()
            .map_or(true, |filter| filter.contains(&file.filename))
    });
    for file in retained {
        table.push(&file_row(file, revision, config));
    }

    table.render()
}

/// Bold report title; the folder is only named when several reports share
/// the document.
pub fn report_title(report: &CoverageReport, report_name: &str, multiple: bool) -> String {
    let folder = if multiple {
        format!(" {}", report.folder)
    } else {
        String::new()
    };
    format!(
        "<strong>{}{} - {}%</strong>",
        report_name,
        folder,
        floor_percent(report.total)
    )
}

fn footer(revision: &str, minimum_coverage: u32) -> String {
    format!(
        "_Minimum allowed coverage is `{}%`_\n\n<p align=\"right\">{} against {} </p>",
        minimum_coverage, CREDITS, revision
    )
}

/// Render `reports` as markdown for `revision`.
///
/// Reports are validated first; nothing is rendered from malformed input.
pub fn markdown_report(
    reports: &[CoverageReport],
    revision: &str,
    config: &RenderConfig,
) -> Result<MarkdownReport> {
    validate_reports(reports)?;
    check_config(config)?;

    let multiple = reports.len() > 1;
    let mut flat = String::new();
    let mut structured = String::new();

    for report in reports {
        let title = report_title(report, &config.report_name, multiple);
        let table = report_table(report, revision, config);

        flat.push_str(&format!("{}\n\n{}\n\n", title, table));
        structured.push_str(&format!(
            "<details><summary>{}</summary>\n\n{}\n\n</details>\n\n",
            title, table
        ));
    }

    let footer = footer(revision, config.minimum_coverage);
    flat.push_str(&footer);
    structured.push_str(&footer);

    Ok(MarkdownReport { flat, structured })
}
