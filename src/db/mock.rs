//! Mock query function for testing.
//!
//! Declares an arbitrary parameter list, records every call it receives and
//! replays scripted results, so adapter and catalog behaviour can be checked
//! without a database.

use super::{check_call, Call, QueryFn, QueryOutput, Value};
use crate::error::{GameSearchError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// A call observed by [`MockQueryFn`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// Statement text as received.
    pub sql: String,
    /// Bound parameters as received.
    pub params: Vec<Value>,
    /// Number of positional arguments.
    pub positional: usize,
    /// Fetch flag, positional or keyword.
    pub fetch: Option<bool>,
    /// Commit keyword flag.
    pub commit: Option<bool>,
}

impl RecordedCall {
    fn from_call(call: &Call<'_>) -> Self {
        let (fetch, commit) = match call {
            Call::PositionalFetch { fetch, .. } => (Some(*fetch), None),
            Call::Keyword { fetch, commit, .. } => (*fetch, *commit),
            _ => (None, None),
        };
        Self {
            sql: call.sql().to_string(),
            params: call.params().to_vec(),
            positional: call.positional_count(),
            fetch,
            commit,
        }
    }
}

#[derive(Default)]
struct MockState {
    calls: Vec<RecordedCall>,
    script: VecDeque<Result<QueryOutput>>,
    failing_patterns: Vec<(String, GameSearchError)>,
}

/// A query function that returns predefined results.
pub struct MockQueryFn {
    parameters: Vec<String>,
    state: Mutex<MockState>,
}

impl MockQueryFn {
    /// Creates a mock declaring the given parameter names.
    pub fn new(parameters: &[&str]) -> Self {
        Self {
            parameters: parameters.iter().map(|p| p.to_string()).collect(),
            state: Mutex::new(MockState::default()),
        }
    }

    /// Creates a mock shaped like `run_query(query, params=None, fetch=True)`.
    pub fn run_query() -> Self {
        Self::new(&["query", "params", "fetch"])
    }

    /// Queues a result for the next accepted call.
    pub fn respond(self, output: QueryOutput) -> Self {
        self.lock().script.push_back(Ok(output));
        self
    }

    /// Queues an error for the next accepted call.
    pub fn fail(self, error: GameSearchError) -> Self {
        self.lock().script.push_back(Err(error));
        self
    }

    /// Fails every accepted call whose statement contains `pattern`.
    pub fn fail_when_contains(self, pattern: &str, error: GameSearchError) -> Self {
        self.lock()
            .failing_patterns
            .push((pattern.to_string(), error));
        self
    }

    /// Every call received so far, including rejected shapes.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    /// Number of calls received so far.
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // A poisoned lock only means another test thread panicked mid-call.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl QueryFn for MockQueryFn {
    fn parameters(&self) -> Vec<String> {
        self.parameters.clone()
    }

    async fn call(&self, call: Call<'_>) -> Result<QueryOutput> {
        let mut state = self.lock();
        state.calls.push(RecordedCall::from_call(&call));

        check_call("mock_query", &self.parameters, &call)?;

        if let Some((_, error)) = state
            .failing_patterns
            .iter()
            .find(|(pattern, _)| call.sql().contains(pattern.as_str()))
        {
            return Err(error.clone());
        }

        match state.script.pop_front() {
            Some(result) => result,
            None if call.wants_rows() => Ok(QueryOutput::Records(Vec::new())),
            None => Ok(QueryOutput::Null),
        }
    }
}
