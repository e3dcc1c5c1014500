//! PostgreSQL side of the bootstrap: one short-lived connection per statement.

pub mod catalog;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;

use dbinit_kernel::statement::{ExecError, ExecErrorKind, Statement, StatementExecutor};
use dbinit_kernel::ConnectionDescriptor;

pub use catalog::{Catalog, RoleAttributes};

const APPLICATION_NAME: &str = "supavisor-dbinit";
/// SQLSTATE for a statement cancelled by `statement_timeout`.
const QUERY_CANCELED: &str = "57014";

/// Executes statements against PostgreSQL, connecting fresh for each one.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgStatementExecutor;

impl PgStatementExecutor {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StatementExecutor for PgStatementExecutor {
    async fn execute(
        &self,
        descriptor: &ConnectionDescriptor,
        statement: &Statement,
    ) -> Result<(), ExecError> {
        let mut conn = connect(descriptor).await?;

        let executed = tokio::time::timeout(
            descriptor.query_timeout(),
            execute_raw(&mut conn, statement.sql),
        )
        .await;

        let result = match executed {
            Ok(Ok(done)) => {
                tracing::debug!(
                    statement = statement.id,
                    rows_affected = done.rows_affected(),
                    "statement finished"
                );
                Ok(())
            }
            Ok(Err(err)) => Err(classify(ExecErrorKind::Statement, err)),
            Err(_) => {
                // The connection is dropped rather than closed gracefully.
                return Err(ExecError::new(
                    ExecErrorKind::StatementTimeout,
                    format!(
                        "no response within {}ms",
                        descriptor.query_timeout().as_millis()
                    ),
                ));
            }
        };

        if let Err(err) = conn.close().await {
            tracing::debug!(statement = statement.id, error = %err, "error closing connection");
        }

        result
    }
}

/// Concrete-lifetime wrapper so the future satisfies `Send` inside `async_trait`.
fn execute_raw<'c>(
    conn: &'c mut PgConnection,
    sql: &'c str,
) -> std::pin::Pin<
    Box<dyn std::future::Future<Output = Result<sqlx::postgres::PgQueryResult, sqlx::Error>> + Send + 'c>,
> {
    sqlx::Executor::execute(conn, sqlx::raw_sql(sql))
}

/// Connection options parsed from the descriptor's connection string, with the
/// server-side statement timeout applied.
pub fn connect_options(descriptor: &ConnectionDescriptor) -> Result<PgConnectOptions, ExecError> {
    let options = descriptor
        .connection_string()
        .parse::<PgConnectOptions>()
        .map_err(|err| classify(ExecErrorKind::Connect, err))?;

    Ok(options.application_name(APPLICATION_NAME).options([(
        "statement_timeout",
        descriptor.query_timeout().as_millis().to_string(),
    )]))
}

/// Open a single connection, bounded by the descriptor's connect timeout.
pub async fn connect(descriptor: &ConnectionDescriptor) -> Result<PgConnection, ExecError> {
    let options = connect_options(descriptor)?;

    match tokio::time::timeout(
        descriptor.connect_timeout(),
        PgConnection::connect_with(&options),
    )
    .await
    {
        Ok(Ok(conn)) => Ok(conn),
        Ok(Err(err)) => Err(classify(ExecErrorKind::Connect, err)),
        Err(_) => Err(ExecError::new(
            ExecErrorKind::ConnectTimeout,
            format!(
                "no connection to {}:{} within {}ms",
                descriptor.host(),
                descriptor.port(),
                descriptor.connect_timeout().as_millis()
            ),
        )),
    }
}

fn classify(kind: ExecErrorKind, err: sqlx::Error) -> ExecError {
    match &err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.into_owned());
            ExecError {
                kind: kind_for_code(kind, code.as_deref()),
                code,
                message: db_err.message().to_string(),
            }
        }
        _ => ExecError::new(kind, err.to_string()),
    }
}

fn kind_for_code(kind: ExecErrorKind, code: Option<&str>) -> ExecErrorKind {
    match code {
        Some(QUERY_CANCELED) if kind == ExecErrorKind::Statement => ExecErrorKind::StatementTimeout,
        _ => kind,
    }
}
