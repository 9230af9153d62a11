//! Scripted in-memory session source shared by the integration tests.
//!
//! Every statement, parameter list, acquisition, discard and release is
//! recorded so tests can assert the exact protocol a handler followed.

#![allow(dead_code)]

use pg_mcp_server::db::{Session, SessionSource};
use pg_mcp_server::error::FailureDetails;
use pg_mcp_server::models::Row;
use std::borrow::Cow;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};

/// Failure values a scripted session can raise.
#[derive(Debug, Clone)]
pub enum MockFailure {
    /// A typed database error, optionally with a DETAIL.
    Typed {
        message: String,
        detail: Option<String>,
    },
    /// Something that carries no message at all.
    Opaque(String),
}

impl MockFailure {
    pub fn typed(message: &str) -> Self {
        Self::Typed {
            message: message.to_string(),
            detail: None,
        }
    }

    pub fn with_detail(message: &str, detail: &str) -> Self {
        Self::Typed {
            message: message.to_string(),
            detail: Some(detail.to_string()),
        }
    }
}

impl fmt::Display for MockFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Typed { message, .. } => f.write_str(message),
            Self::Opaque(raw) => write!(f, "opaque failure: {}", raw),
        }
    }
}

impl FailureDetails for MockFailure {
    fn message(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Typed { message, .. } => Some(Cow::Borrowed(message)),
            Self::Opaque(_) => None,
        }
    }

    fn detail(&self) -> Option<&str> {
        match self {
            Self::Typed { detail, .. } => detail.as_deref(),
            Self::Opaque(_) => None,
        }
    }
}

type Response = Result<Vec<Row>, MockFailure>;

#[derive(Default)]
struct State {
    statements: Vec<String>,
    params: Vec<Vec<String>>,
    acquires: usize,
    discards: usize,
    releases: usize,
    acquire_failure: Option<MockFailure>,
    responses: HashMap<String, VecDeque<Response>>,
}

/// Session source whose sessions answer from a script.
///
/// Statements without a scripted response succeed with no rows.
#[derive(Clone, Default)]
pub struct ScriptedSource {
    state: Arc<Mutex<State>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the response for the next execution of `sql`.
    pub fn respond(&self, sql: &str, response: Response) -> &Self {
        self.state
            .lock()
            .unwrap()
            .responses
            .entry(sql.to_string())
            .or_default()
            .push_back(response);
        self
    }

    pub fn respond_rows(&self, sql: &str, rows: Vec<Row>) -> &Self {
        self.respond(sql, Ok(rows))
    }

    pub fn fail(&self, sql: &str, failure: MockFailure) -> &Self {
        self.respond(sql, Err(failure))
    }

    /// Make every acquisition fail.
    pub fn fail_acquire(&self, failure: MockFailure) -> &Self {
        self.state.lock().unwrap().acquire_failure = Some(failure);
        self
    }

    pub fn statements(&self) -> Vec<String> {
        self.state.lock().unwrap().statements.clone()
    }

    pub fn params(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().params.clone()
    }

    pub fn acquires(&self) -> usize {
        self.state.lock().unwrap().acquires
    }

    /// Sessions marked to be closed instead of pooled.
    pub fn discards(&self) -> usize {
        self.state.lock().unwrap().discards
    }

    pub fn releases(&self) -> usize {
        self.state.lock().unwrap().releases
    }
}

impl SessionSource for ScriptedSource {
    type Session = ScriptedSession;

    async fn acquire(&self) -> Result<ScriptedSession, MockFailure> {
        let mut state = self.state.lock().unwrap();
        if let Some(failure) = state.acquire_failure.clone() {
            return Err(failure);
        }
        state.acquires += 1;
        Ok(ScriptedSession {
            state: self.state.clone(),
        })
    }
}

pub struct ScriptedSession {
    state: Arc<Mutex<State>>,
}

impl Session for ScriptedSession {
    type Error = MockFailure;

    async fn execute(&mut self, sql: &str, params: &[&str]) -> Result<Vec<Row>, MockFailure> {
        let mut state = self.state.lock().unwrap();
        state.statements.push(sql.to_string());
        state
            .params
            .push(params.iter().map(|p| p.to_string()).collect());
        state
            .responses
            .get_mut(sql)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    fn discard(&mut self) {
        self.state.lock().unwrap().discards += 1;
    }

    /// Counts every call, so a double release shows up in the tests.
    fn release(&mut self) {
        self.state.lock().unwrap().releases += 1;
    }
}

/// Build a row from `(column, value)` pairs, keeping their order.
pub fn row(columns: &[(&str, serde_json::Value)]) -> Row {
    columns
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}
