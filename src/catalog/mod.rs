//! The fixed set of statements the application issues.
//!
//! Statement text is built by pure functions so it can be inspected without a
//! database; `QueryCatalog` validates input, builds the statement and runs it
//! through the [`QueryAdapter`]. Input that fails validation never reaches the
//! adapter.

mod audit;
mod console;
mod games;
mod schema;
mod users;

pub use console::{check_console_statement, CONSOLE_KEYWORDS};
pub use games::{
    build_average_sales_by_rating, build_game_search, build_games_by_rating, build_title_lookup,
    build_top_games_by_sales, parse_row_bound, GameFilter, GAME_SEARCH_LIMIT, TITLE_LOOKUP_LIMIT,
};
pub use schema::{AnalyticsTables, AuditTable, GamesTable, SchemaMap, UsersTable};
pub use users::{
    hash_password, DeleteOutcome, LoginOutcome, UserForm, PASSWORD_DIGEST_LEN, USER_LIST_LIMIT,
};

use crate::db::{QueryOutput, Value};
use crate::error::{GameSearchError, Result};
use crate::query::QueryAdapter;

/// A statement template with `%s` placeholders and its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Row counts and adapter capabilities reported by [`QueryCatalog::db_check`].
#[derive(Debug, Clone, PartialEq)]
pub struct DbCheck {
    pub user_rows: Option<Value>,
    pub game_rows: Option<Value>,
    pub supports_fetch: bool,
    pub supports_commit: bool,
}

/// Runs catalog statements through a query adapter.
#[derive(Debug, Clone)]
pub struct QueryCatalog {
    adapter: QueryAdapter,
    schema: SchemaMap,
}

impl QueryCatalog {
    pub fn new(adapter: QueryAdapter, schema: SchemaMap) -> Self {
        Self { adapter, schema }
    }

    pub fn adapter(&self) -> &QueryAdapter {
        &self.adapter
    }

    async fn select(&self, statement: &Statement) -> Result<QueryOutput> {
        self.adapter.select(&statement.sql, &statement.params).await
    }

    async fn exec(&self, statement: &Statement) -> Result<QueryOutput> {
        self.adapter.exec(&statement.sql, &statement.params).await
    }

    /// Counts users and games and reports which flags the query function accepts.
    pub async fn db_check(&self) -> Result<DbCheck> {
        let users = &self.schema.users;
        let games = &self.schema.games;

        let user_rows = self
            .adapter
            .select(&format!("SELECT COUNT(*) AS n FROM {}", users.table), &[])
            .await?;
        let game_rows = self
            .adapter
            .select(&format!("SELECT COUNT(*) AS n FROM {}", games.table), &[])
            .await?;

        let binding = self.adapter.binding();
        Ok(DbCheck {
            user_rows: user_rows.first_value().cloned(),
            game_rows: game_rows.first_value().cloned(),
            supports_fetch: binding.has_fetch,
            supports_commit: binding.has_commit,
        })
    }
}

/// Trims a required text field, rejecting it when blank.
pub(crate) fn require_text<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(GameSearchError::validation(format!("{field} is required.")));
    }
    Ok(trimmed)
}

/// Returns the trimmed text of an optional field, or `None` when blank.
pub(crate) fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
