use serde::Deserialize;
use tracing::Instrument;

use crate::descriptor::ConnectionDescriptor;
use crate::event::{InvocationEvent, InvocationResult, RequestType, Status};
use crate::settings::DatabaseSettings;
use crate::statement::{Outcome, Statement, StatementExecutor};

/// How the final status is derived from the statement outcomes.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResultPolicy {
    /// Any failed statement turns the result into `FAILED`.
    #[default]
    Strict,
    /// Always report `SUCCESS`; failures are only logged.
    Lenient,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub statement: Statement,
    pub outcome: Outcome,
}

/// Ordered outcome of every statement in one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    entries: Vec<ReportEntry>,
}

impl Report {
    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn failures(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(|e| e.outcome.is_failure())
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn status(&self, policy: ResultPolicy) -> Status {
        match policy {
            ResultPolicy::Lenient => Status::Success,
            ResultPolicy::Strict if self.is_clean() => Status::Success,
            ResultPolicy::Strict => Status::Failed,
        }
    }

    /// Human-readable summary naming each failed statement, `None` when all succeeded.
    pub fn failure_reason(&self) -> Option<String> {
        let failed: Vec<String> = self
            .failures()
            .filter_map(|entry| match &entry.outcome {
                Outcome::Failed(err) => Some(format!("{} ({})", entry.statement.id, err)),
                _ => None,
            })
            .collect();

        if failed.is_empty() {
            return None;
        }

        Some(format!(
            "{} of {} bootstrap statements failed: {}",
            failed.len(),
            self.entries.len(),
            failed.join("; ")
        ))
    }

    fn record(&mut self, statement: Statement, outcome: Outcome) {
        self.entries.push(ReportEntry { statement, outcome });
    }
}

/// Runs a fixed, ordered statement plan one statement at a time.
pub struct Bootstrapper {
    statements: Vec<Statement>,
    policy: ResultPolicy,
}

impl Bootstrapper {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self {
            statements,
            policy: ResultPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ResultPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn policy(&self) -> ResultPolicy {
        self.policy
    }

    /// Execute every statement in order. A failing statement never stops the run.
    pub async fn run(
        &self,
        descriptor: &ConnectionDescriptor,
        executor: &dyn StatementExecutor,
    ) -> Report {
        tracing::info!(
            database = %descriptor.redacted(),
            statements = self.statements.len(),
            "running bootstrap statements"
        );

        let mut report = Report::default();

        for statement in &self.statements {
            let outcome = match executor.execute(descriptor, statement).await {
                Ok(()) => Outcome::Applied,
                Err(err) => match err.code.as_deref() {
                    Some(code) if statement.tolerates(code) => Outcome::AlreadySatisfied {
                        code: code.to_string(),
                    },
                    _ => Outcome::Failed(err),
                },
            };

            match &outcome {
                Outcome::Failed(err) => tracing::error!(
                    statement = statement.id,
                    sql = statement.sql,
                    kind = %err.kind,
                    code = err.code.as_deref().unwrap_or("-"),
                    error = %err.message,
                    "error executing statement"
                ),
                Outcome::AlreadySatisfied { code } => tracing::info!(
                    statement = statement.id,
                    code = %code,
                    "statement target already in place"
                ),
                Outcome::Applied => tracing::info!(
                    statement = statement.id,
                    sql = statement.sql,
                    "statement applied"
                ),
            }

            report.record(*statement, outcome);
        }

        report
    }

    /// Handle one orchestrator invocation and build the response it waits for.
    pub async fn invoke(
        &self,
        event: &InvocationEvent,
        descriptor: &ConnectionDescriptor,
        executor: &dyn StatementExecutor,
    ) -> InvocationResult {
        let span = tracing::info_span!(
            "bootstrap",
            request_id = %event.request_id,
            logical_resource_id = %event.logical_resource_id,
            request_type = %event.request_type,
        );

        async {
            match event.request_type {
                RequestType::Create => tracing::info!("create event"),
                _ => tracing::info!("no dedicated handling for request type"),
            }

            let report = self.run(descriptor, executor).await;
            self.conclude(event, &report)
        }
        .instrument(span)
        .await
    }

    /// Resolve the descriptor from settings for this invocation, then invoke.
    ///
    /// Unusable connection settings mean nothing can run, so the result is
    /// `FAILED` regardless of the policy.
    pub async fn invoke_with_settings(
        &self,
        event: &InvocationEvent,
        database: &DatabaseSettings,
        executor: &dyn StatementExecutor,
    ) -> InvocationResult {
        match database.descriptor() {
            Ok(descriptor) => self.invoke(event, &descriptor, executor).await,
            Err(err) => {
                tracing::error!(
                    request_id = %event.request_id,
                    error = %err,
                    "invalid connection settings"
                );
                InvocationResult::failed(event, format!("invalid connection settings: {err}"))
            }
        }
    }

    /// Turn a finished report into the orchestrator response under the configured policy.
    pub fn conclude(&self, event: &InvocationEvent, report: &Report) -> InvocationResult {
        let reason = report.failure_reason();

        match (report.status(self.policy), reason) {
            (Status::Failed, Some(reason)) => {
                tracing::error!(reason = %reason, "bootstrap failed");
                InvocationResult::failed(event, reason)
            }
            (_, Some(reason)) => {
                tracing::warn!(
                    reason = %reason,
                    "bootstrap finished with failures; reporting success under lenient policy"
                );
                InvocationResult::success(event)
            }
            (_, None) => {
                tracing::info!(statements = report.entries().len(), "bootstrap complete");
                InvocationResult::success(event)
            }
        }
    }
}
