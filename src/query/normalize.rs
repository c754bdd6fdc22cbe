//! Result normalization.
//!
//! Turns any [`QueryOutput`] into a column list plus equal-width rows, the one
//! shape the presentation layer renders.

use tracing::warn;

use crate::db::{QueryOutput, Row, Value};

/// Message shown when a query returned no result at all.
pub const NO_RESULT_MESSAGE: &str = "No result returned.";

/// Message shown when a query returned an empty row sequence.
pub const NO_ROWS_MESSAGE: &str = "No rows returned.";

/// Column used for informational single-cell tables.
pub const INFO_COLUMN: &str = "info";

/// Column names plus rows, every row as wide as the column list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    /// A single `info` column holding one message row.
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            columns: vec![INFO_COLUMN.to_string()],
            rows: vec![vec![Value::String(message.into())]],
        }
    }

    /// Renders the table as JSON with plain cell values.
    pub fn to_json(&self, row_count: usize) -> serde_json::Value {
        let rows: Vec<serde_json::Value> = self
            .rows
            .iter()
            .map(|row| serde_json::Value::Array(row.iter().map(Value::to_json).collect()))
            .collect();
        serde_json::json!({
            "columns": self.columns,
            "rows": rows,
            "row_count": row_count,
        })
    }
}

impl From<Table> for QueryOutput {
    fn from(table: Table) -> Self {
        QueryOutput::Table {
            columns: table.columns,
            rows: table.rows,
        }
    }
}

/// Normalizes a query result. The first matching rule wins:
///
/// 1. null result: info row "No result returned."
/// 2. explicit (columns, rows) pair: kept as is
/// 3. empty sequence: info row "No rows returned."
/// 4. records: columns from the first record's keys, missing keys become NULL
/// 5. tuples: columns `col1..colN` sized to the first row
/// 6. anything else: info row with the value's text
pub fn normalize(output: &QueryOutput) -> Table {
    match output {
        QueryOutput::Null => Table::info(NO_RESULT_MESSAGE),

        QueryOutput::Table { columns, rows } => Table {
            columns: columns.clone(),
            rows: rows.iter().map(|row| fit_row(row, columns.len())).collect(),
        },

        _ if output.is_empty_sequence() => Table::info(NO_ROWS_MESSAGE),

        QueryOutput::Records(records) => {
            let columns: Vec<String> = records
                .first()
                .map(|first| first.keys().map(String::from).collect())
                .unwrap_or_default();
            let rows = records
                .iter()
                .map(|record| {
                    columns
                        .iter()
                        .map(|column| record.get(column).cloned().unwrap_or(Value::Null))
                        .collect()
                })
                .collect();
            Table { columns, rows }
        }

        QueryOutput::Tuples(rows) => {
            let width = rows.first().map(Vec::len).unwrap_or_default();
            let columns = (1..=width).map(|i| format!("col{i}")).collect();
            let rows = rows.iter().map(|row| fit_row(row, width)).collect();
            Table { columns, rows }
        }

        QueryOutput::Scalar(value) => Table::info(value.to_display_string()),
    }
}

/// Counts the rows a query produced, before normalization.
///
/// Differs from `normalize(output).rows.len()` only for the null result and
/// the empty sequence, which count as 0 but normalize to one info row.
pub fn count_rows(output: &QueryOutput) -> usize {
    match output {
        QueryOutput::Null => 0,
        QueryOutput::Table { rows, .. } => rows.len(),
        QueryOutput::Records(records) => records.len(),
        QueryOutput::Tuples(rows) => rows.len(),
        QueryOutput::Scalar(_) => 1,
    }
}

/// Pads a short row with NULLs or truncates a long one to `width`.
fn fit_row(row: &Row, width: usize) -> Row {
    if row.len() != width {
        warn!(
            "Row has {} values but the result has {width} columns; adjusting",
            row.len()
        );
    }
    let mut fitted: Row = row.iter().take(width).cloned().collect();
    fitted.resize(width, Value::Null);
    fitted
}
