//! Query adapter over an injected query function.
//!
//! The adapter reads the function's declared parameters once, fixes a calling
//! convention from them, and routes every `select`/`exec` through a single
//! dispatch that retries once with `?` placeholders when a `%s` statement
//! fails.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::db::{Call, QueryFn, QueryOutput, Value};
use crate::error::{GameSearchError, Result};

/// Placeholder style the catalog writes statements in.
pub const PERCENT_PLACEHOLDER: &str = "%s";

/// Placeholder style tried when a `%s` statement fails.
pub const QUESTION_PLACEHOLDER: &str = "?";

/// Calling conventions an integrator can pick directly instead of declaring parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallingConvention {
    /// `f(sql)`
    SingleArg,
    /// `f(sql, params)`
    Positional2,
    /// `f(sql, params, fetch)`
    Positional3,
    /// `f(sql, params, fetch=..)`
    KeywordFetch,
    /// `f(sql, params, fetch=.., commit=..)`
    KeywordFetchCommit,
}

/// The call shape the adapter uses for every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallShape {
    /// Statement text only; params are dropped.
    StatementOnly,
    /// Statement and params plus whichever flags are declared, by keyword.
    Keyword { fetch: bool, commit: bool },
    /// Three positional arguments, falling back to two on a signature error.
    PositionalWithFetch,
    /// Two positional arguments.
    Positional,
}

impl fmt::Display for CallShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StatementOnly => write!(f, "f(sql)"),
            Self::Keyword {
                fetch: true,
                commit: true,
            } => write!(f, "f(sql, params, fetch=.., commit=..)"),
            Self::Keyword { fetch: true, .. } => write!(f, "f(sql, params, fetch=..)"),
            Self::Keyword { .. } => write!(f, "f(sql, params, commit=..)"),
            Self::PositionalWithFetch => write!(f, "f(sql, params, fetch)"),
            Self::Positional => write!(f, "f(sql, params)"),
        }
    }
}

/// The calling convention of a query function, fixed at adapter construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterBinding {
    /// Number of declared parameters.
    pub arity: usize,
    /// Whether a parameter named `fetch` is declared.
    pub has_fetch: bool,
    /// Whether a parameter named `commit` is declared.
    pub has_commit: bool,
}

impl AdapterBinding {
    /// Derives the binding from declared parameter names.
    pub fn from_parameters<S: AsRef<str>>(parameters: &[S]) -> Self {
        Self {
            arity: parameters.len(),
            has_fetch: parameters.iter().any(|p| p.as_ref() == "fetch"),
            has_commit: parameters.iter().any(|p| p.as_ref() == "commit"),
        }
    }

    /// The binding equivalent to a chosen calling convention.
    pub fn from_convention(convention: CallingConvention) -> Self {
        let (arity, has_fetch, has_commit) = match convention {
            CallingConvention::SingleArg => (1, false, false),
            CallingConvention::Positional2 => (2, false, false),
            CallingConvention::Positional3 => (3, false, false),
            CallingConvention::KeywordFetch => (3, true, false),
            CallingConvention::KeywordFetchCommit => (4, true, true),
        };
        Self {
            arity,
            has_fetch,
            has_commit,
        }
    }

    /// Selects the call shape. Precedence: single parameter, keyword flags,
    /// three or more parameters, two positional arguments.
    pub fn call_shape(&self) -> CallShape {
        if self.arity == 1 {
            CallShape::StatementOnly
        } else if self.has_fetch || self.has_commit {
            CallShape::Keyword {
                fetch: self.has_fetch,
                commit: self.has_commit,
            }
        } else if self.arity >= 3 {
            CallShape::PositionalWithFetch
        } else {
            CallShape::Positional
        }
    }
}

/// Wraps a query function with a fixed binding and placeholder fallback.
#[derive(Clone)]
pub struct QueryAdapter {
    query_fn: Arc<dyn QueryFn>,
    binding: AdapterBinding,
}

impl fmt::Debug for QueryAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryAdapter")
            .field("binding", &self.binding)
            .finish_non_exhaustive()
    }
}

impl QueryAdapter {
    /// Creates an adapter, reading the function's declared parameters once.
    pub fn new(query_fn: Arc<dyn QueryFn>) -> Self {
        let binding = AdapterBinding::from_parameters(&query_fn.parameters());
        debug!(?binding, shape = %binding.call_shape(), "Query adapter bound");
        Self { query_fn, binding }
    }

    /// Creates an adapter with an explicitly chosen calling convention.
    pub fn with_convention(query_fn: Arc<dyn QueryFn>, convention: CallingConvention) -> Self {
        let binding = AdapterBinding::from_convention(convention);
        debug!(?binding, shape = %binding.call_shape(), "Query adapter bound");
        Self { query_fn, binding }
    }

    /// The binding computed at construction.
    pub fn binding(&self) -> AdapterBinding {
        self.binding
    }

    /// Executes with read semantics. A null or falsy result becomes an empty sequence.
    pub async fn select(&self, sql: &str, params: &[Value]) -> Result<QueryOutput> {
        let output = self.call(sql, Some(params), true).await?;
        if output.is_falsy() {
            return Ok(QueryOutput::Records(Vec::new()));
        }
        Ok(output)
    }

    /// Executes with write semantics.
    pub async fn exec(&self, sql: &str, params: &[Value]) -> Result<QueryOutput> {
        self.call(sql, Some(params), false).await
    }

    /// Dispatches one statement, retrying once with `?` placeholders on failure.
    ///
    /// When both attempts fail the error of the first attempt is returned.
    pub async fn call(
        &self,
        sql: &str,
        params: Option<&[Value]>,
        fetch: bool,
    ) -> Result<QueryOutput> {
        let sql = sql.trim();
        let params = params.unwrap_or(&[]);

        let first_error = match self.call_once(sql, params, fetch).await {
            Ok(output) => return Ok(output),
            Err(e) => e,
        };

        if !sql.contains(PERCENT_PLACEHOLDER) {
            return Err(first_error);
        }

        debug!("Statement failed ({first_error}); retrying with '?' placeholders");
        let swapped = sql.replace(PERCENT_PLACEHOLDER, QUESTION_PLACEHOLDER);
        match self.call_once(&swapped, params, fetch).await {
            Ok(output) => Ok(output),
            Err(retry_error) => {
                debug!("Placeholder retry failed as well: {retry_error}");
                Err(first_error)
            }
        }
    }

    async fn call_once(&self, sql: &str, params: &[Value], fetch: bool) -> Result<QueryOutput> {
        match self.binding.call_shape() {
            CallShape::StatementOnly => self.query_fn.call(Call::Statement { sql }).await,
            CallShape::Keyword {
                fetch: has_fetch,
                commit: has_commit,
            } => {
                self.query_fn
                    .call(Call::Keyword {
                        sql,
                        params,
                        fetch: has_fetch.then_some(fetch),
                        commit: has_commit.then_some(!fetch),
                    })
                    .await
            }
            CallShape::PositionalWithFetch => {
                match self
                    .query_fn
                    .call(Call::PositionalFetch { sql, params, fetch })
                    .await
                {
                    Err(GameSearchError::Signature(reason)) => {
                        // Also swallows a genuine three-argument mismatch.
                        warn!("Three-argument call rejected ({reason}); falling back to f(sql, params)");
                        self.query_fn.call(Call::Positional { sql, params }).await
                    }
                    other => other,
                }
            }
            CallShape::Positional => self.query_fn.call(Call::Positional { sql, params }).await,
        }
    }
}
