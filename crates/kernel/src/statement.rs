use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::descriptor::ConnectionDescriptor;

/// SQLSTATE raised by `CREATE ROLE` when the role is already present.
pub const DUPLICATE_OBJECT: &str = "42710";
/// SQLSTATE raised by `CREATE SCHEMA` without `IF NOT EXISTS` when the schema is present.
pub const DUPLICATE_SCHEMA: &str = "42P06";
/// SQLSTATE raised when a concurrent session inserts the same catalog row first,
/// e.g. two `CREATE ROLE` or `CREATE SCHEMA IF NOT EXISTS` racing each other.
pub const UNIQUE_VIOLATION: &str = "23505";

/// One step of the bootstrap plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Statement {
    pub id: &'static str,
    pub sql: &'static str,
    /// SQLSTATE codes meaning the target state already holds.
    pub tolerated: &'static [&'static str],
}

impl Statement {
    pub const fn new(id: &'static str, sql: &'static str) -> Self {
        Self {
            id,
            sql,
            tolerated: &[],
        }
    }

    pub const fn tolerating(mut self, codes: &'static [&'static str]) -> Self {
        self.tolerated = codes;
        self
    }

    pub fn tolerates(&self, code: &str) -> bool {
        self.tolerated.contains(&code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecErrorKind {
    Connect,
    ConnectTimeout,
    Statement,
    StatementTimeout,
}

impl fmt::Display for ExecErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExecErrorKind::Connect => "connect",
            ExecErrorKind::ConnectTimeout => "connect timeout",
            ExecErrorKind::Statement => "statement",
            ExecErrorKind::StatementTimeout => "statement timeout",
        };
        f.write_str(label)
    }
}

/// Failure of a single statement, either reaching the database or running the SQL.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct ExecError {
    pub kind: ExecErrorKind,
    /// SQLSTATE reported by the server, when there was one.
    pub code: Option<String>,
    pub message: String,
}

impl ExecError {
    pub fn new(kind: ExecErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// What happened to one statement during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    AlreadySatisfied { code: String },
    Failed(ExecError),
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Applied => "applied",
            Outcome::AlreadySatisfied { .. } => "already_satisfied",
            Outcome::Failed(_) => "failed",
        }
    }
}

/// Runs a single statement over its own connection.
///
/// Implementations open a connection from the descriptor, execute, and close
/// it again before returning. Nothing is shared between calls.
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    async fn execute(
        &self,
        descriptor: &ConnectionDescriptor,
        statement: &Statement,
    ) -> Result<(), ExecError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tolerated_codes_are_matched_exactly() {
        let stmt = Statement::new("create_role_x", "create role x").tolerating(&[DUPLICATE_OBJECT]);
        assert!(stmt.tolerates("42710"));
        assert!(!stmt.tolerates("42P06"));
        assert!(!Statement::new("grant", "grant usage").tolerates("42710"));
    }

    #[test]
    fn exec_error_display_includes_kind() {
        let err = ExecError::new(ExecErrorKind::ConnectTimeout, "no answer after 5000ms");
        assert_eq!(err.to_string(), "connect timeout: no answer after 5000ms");

        let err = ExecError::new(ExecErrorKind::Statement, "role \"anon\" already exists")
            .with_code(DUPLICATE_OBJECT);
        assert_eq!(err.code.as_deref(), Some("42710"));
    }

    #[test]
    fn only_failed_outcome_is_failure() {
        assert!(!Outcome::Applied.is_failure());
        assert!(!Outcome::AlreadySatisfied { code: "42710".into() }.is_failure());
        assert!(Outcome::Failed(ExecError::new(ExecErrorKind::Connect, "refused")).is_failure());
    }
}
