//! Database abstraction layer for gamesearch.
//!
//! A query function is anything that can run one statement against the store.
//! Each implementation declares the parameters it accepts, and the adapter in
//! [`crate::query`] decides how to call it from that declaration.

mod mock;
mod store;
mod types;

pub use mock::{MockQueryFn, RecordedCall};
pub use store::SqlStore;
pub use types::{QueryOutput, Record, Row, Value};

use crate::error::{GameSearchError, Result};
use async_trait::async_trait;

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DatabaseBackend {
    #[default]
    Sqlite,
    MySql,
}

impl DatabaseBackend {
    /// Returns the backend as a string for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::MySql => "mysql",
        }
    }

    /// Parses a backend from a string or URL scheme.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sqlite" => Some(Self::Sqlite),
            "mysql" => Some(Self::MySql),
            _ => None,
        }
    }

    /// Returns the default port for this backend, if it uses one.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Self::Sqlite => None,
            Self::MySql => Some(3306),
        }
    }
}

/// One invocation of a query function, in one of the shapes it may accept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Call<'a> {
    /// `f(sql)`
    Statement { sql: &'a str },

    /// `f(sql, params)`
    Positional { sql: &'a str, params: &'a [Value] },

    /// `f(sql, params, fetch)`
    PositionalFetch {
        sql: &'a str,
        params: &'a [Value],
        fetch: bool,
    },

    /// `f(sql, params, fetch=.., commit=..)`; a flag is `None` when not passed.
    Keyword {
        sql: &'a str,
        params: &'a [Value],
        fetch: Option<bool>,
        commit: Option<bool>,
    },
}

impl<'a> Call<'a> {
    /// The statement text.
    pub fn sql(&self) -> &'a str {
        match self {
            Self::Statement { sql }
            | Self::Positional { sql, .. }
            | Self::PositionalFetch { sql, .. }
            | Self::Keyword { sql, .. } => sql,
        }
    }

    /// Bound parameters (empty for the statement-only shape).
    pub fn params(&self) -> &'a [Value] {
        match self {
            Self::Statement { .. } => &[],
            Self::Positional { params, .. }
            | Self::PositionalFetch { params, .. }
            | Self::Keyword { params, .. } => params,
        }
    }

    /// Whether the caller asked for rows back. Shapes without a flag default to fetching.
    pub fn wants_rows(&self) -> bool {
        match self {
            Self::Statement { .. } | Self::Positional { .. } => true,
            Self::PositionalFetch { fetch, .. } => *fetch,
            Self::Keyword { fetch, commit, .. } => match (fetch, commit) {
                (Some(fetch), _) => *fetch,
                (None, Some(commit)) => !commit,
                (None, None) => true,
            },
        }
    }

    /// Number of positional arguments in this shape.
    pub fn positional_count(&self) -> usize {
        match self {
            Self::Statement { .. } => 1,
            Self::Positional { .. } | Self::Keyword { .. } => 2,
            Self::PositionalFetch { .. } => 3,
        }
    }

    /// Names of the keyword arguments in this shape.
    pub fn keyword_names(&self) -> Vec<&'static str> {
        match self {
            Self::Keyword { fetch, commit, .. } => {
                let mut names = Vec::new();
                if fetch.is_some() {
                    names.push("fetch");
                }
                if commit.is_some() {
                    names.push("commit");
                }
                names
            }
            _ => Vec::new(),
        }
    }
}

/// Checks a call against a declared parameter list.
///
/// Positional arguments fill declared parameters in order, keyword arguments
/// must name a declared parameter not already filled, and undeclared trailing
/// parameters are assumed to carry defaults.
pub fn check_call(name: &str, parameters: &[String], call: &Call<'_>) -> Result<()> {
    let positional = call.positional_count();
    if positional > parameters.len() {
        return Err(GameSearchError::signature(format!(
            "{name}() takes {} positional arguments but {positional} were given",
            parameters.len()
        )));
    }

    for keyword in call.keyword_names() {
        match parameters.iter().position(|p| p == keyword) {
            None => {
                return Err(GameSearchError::signature(format!(
                    "{name}() got an unexpected keyword argument '{keyword}'"
                )))
            }
            Some(index) if index < positional => {
                return Err(GameSearchError::signature(format!(
                    "{name}() got multiple values for argument '{keyword}'"
                )))
            }
            Some(_) => {}
        }
    }

    Ok(())
}

/// An entry point that executes one statement against the store.
#[async_trait]
pub trait QueryFn: Send + Sync {
    /// Declared parameter names, in order (e.g. `["query", "params", "fetch"]`).
    fn parameters(&self) -> Vec<String>;

    /// Executes one statement.
    ///
    /// Returns [`GameSearchError::Signature`] when the call shape does not
    /// match the declared parameters.
    async fn call(&self, call: Call<'_>) -> Result<QueryOutput>;
}
