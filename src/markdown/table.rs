//! Markdown table assembly
//!
//! Columns are an ordered list of descriptors. Header, alignment and every
//! data row are produced from the same list, so optional columns can never
//! leave a row with a different cell count.

use crate::config::RenderConfig;

/// One table column: header label, alignment token and cell extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    File,
    Coverage,
    Lines,
    Branches,
    Status,
    Missing,
}

impl Column {
    /// Columns enabled by `config`, in display order
    pub fn for_config(config: &RenderConfig) -> Vec<Column> {
        [
            (Column::File, true),
            (Column::Coverage, true),
            (Column::Lines, config.show_line),
            (Column::Branches, config.show_branch),
            (Column::Status, true),
            (Column::Missing, config.show_missing),
        ]
        .into_iter()
        .filter_map(|(column, enabled)| enabled.then_some(column))
        .collect()
    }

    pub fn header(&self) -> &'static str {
        match self {
            Column::File => "File",
            Column::Coverage => "Coverage",
            Column::Lines => "Lines",
            Column::Branches => "Branches",
            Column::Status => " ",
            Column::Missing => "Missing",
        }
    }

    pub fn alignment(&self) -> &'static str {
        match self {
            Column::File => "-",
            _ => ":-:",
        }
    }

    pub fn cell(&self, row: &TableRow) -> String {
        match self {
            Column::File => row.name.clone(),
            Column::Coverage => percent_cell(row.total),
            Column::Lines => percent_cell(row.line),
            Column::Branches => percent_cell(row.branch),
            Column::Status => row.status.to_string(),
            Column::Missing => row.missing.clone().unwrap_or_else(|| " ".to_string()),
        }
    }
}

fn percent_cell(value: i64) -> String {
    format!("`{}%`", value)
}

/// Values for one table row, percentages already floored
#[derive(Debug, Clone)]
pub struct TableRow {
    pub name: String,
    pub total: i64,
    pub line: i64,
    pub branch: i64,
    pub status: &'static str,
    pub missing: Option<String>,
}

/// Table builder, serialized once with [`MarkdownTable::render`]
#[derive(Debug, Clone)]
pub struct MarkdownTable {
    columns: Vec<Column>,
    rows: Vec<Vec<String>>,
}

impl MarkdownTable {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: &TableRow) {
        let cells = self.columns.iter().map(|column| column.cell(row)).collect();
        self.rows.push(cells);
    }

    pub fn render(&self) -> String {
        let header: Vec<&str> = self.columns.iter().map(Column::header).collect();
        let alignment: Vec<&str> = self.columns.iter().map(Column::alignment).collect();

        let mut lines = Vec::with_capacity(self.rows.len() + 2);
        lines.push(render_row(header.as_slice()));
        lines.push(render_row(alignment.as_slice()));
        for row in &self.rows {
            lines.push(render_row(row.as_slice()));
        }
        lines.join("\n")
    }
}

fn render_row<S: AsRef<str>>(cells: &[S]) -> String {
    let cells: Vec<&str> = cells.iter().map(AsRef::as_ref).collect();
    format!("| {} |", cells.join(" | "))
}
