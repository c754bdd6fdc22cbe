//! Read-only SQL console.

use super::{QueryCatalog, Statement};
use crate::db::QueryOutput;
use crate::error::{GameSearchError, Result};

/// Leading keywords the console accepts, compared case-insensitively.
pub const CONSOLE_KEYWORDS: [&str; 2] = ["select", "with"];

/// Checks console text and returns it trimmed.
///
/// Only the first whitespace-delimited token is inspected; this is an
/// allow-list on the statement's leading keyword, not a SQL parser.
pub fn check_console_statement(text: &str) -> Result<&str> {
    let sql = text.trim();
    let Some(first) = sql.split_whitespace().next() else {
        return Err(GameSearchError::validation("Enter a SELECT query."));
    };

    let first = first.to_lowercase();
    if !CONSOLE_KEYWORDS.contains(&first.as_str()) {
        return Err(GameSearchError::validation(
            "Console only allows SELECT/WITH queries.",
        ));
    }
    Ok(sql)
}

impl QueryCatalog {
    /// Runs a free-form read statement typed into the console.
    pub async fn run_console(&self, text: &str) -> Result<QueryOutput> {
        let sql = check_console_statement(text)?;
        self.select(&Statement::new(sql, Vec::new())).await
    }
}
