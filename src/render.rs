//! Presentation of normalized tables on the terminal.

use crate::db::Value;
use crate::query::Table;

/// Widest a text column may grow before cells are shortened.
pub const MAX_COLUMN_WIDTH: usize = 40;

const ELLIPSIS: char = '…';

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Aligned plain-text table.
    #[default]
    Text,
    /// JSON object with columns, rows and row count.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {s}. Expected: text or json")),
        }
    }
}

/// Renders a table in the requested format.
pub fn render(table: &Table, row_count: usize, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => render_text(table),
        OutputFormat::Json => table.to_json(row_count).to_string(),
    }
}

/// Renders a table as `a | b` columns under a `--+--` rule. NULL cells are blank.
pub fn render_text(table: &Table) -> String {
    let cells: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| row.iter().map(cell_text).collect())
        .collect();

    let widths: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            let longest = cells
                .iter()
                .filter_map(|row| row.get(i))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0);
            longest.max(column.chars().count()).min(MAX_COLUMN_WIDTH)
        })
        .collect();

    let mut lines = Vec::with_capacity(cells.len() + 2);
    lines.push(join_padded(table.columns.iter().map(String::as_str), &widths));
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    for row in &cells {
        lines.push(join_padded(row.iter().map(String::as_str), &widths));
    }

    lines
        .into_iter()
        .map(|line| line.trim_end().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

fn join_padded<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, width)| {
            let cell = shorten(cell, *width);
            let pad = width.saturating_sub(cell.chars().count());
            format!("{cell}{}", " ".repeat(pad))
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => other.to_display_string(),
    }
}

/// Cuts `text` to `width` characters, ending in an ellipsis when cut.
pub fn shorten(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut short: String = text.chars().take(width - 1).collect();
    short.push(ELLIPSIS);
    short
}

/// One-line summary printed after a result, e.g. "3 rows."
pub fn status_line(row_count: usize) -> String {
    match row_count {
        1 => "1 row.".to_string(),
        n => format!("{n} rows."),
    }
}
