//! HTTP facade for the bootstrap routine: the orchestrator posts an
//! invocation event and waits for the result in the response.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use axum::{
    routing::{get, post},
    Router,
};
use utoipa::OpenApi;

use dbinit_kernel::settings::Settings;
use dbinit_kernel::{Bootstrapper, StatementExecutor};

pub mod error;
pub mod handlers;
pub mod router;

use handlers::AppState;
use router::RouterBuilder;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "supavisor-dbinit",
        description = "Idempotent database bootstrap for the pooler deployment"
    ),
    paths(handlers::invoke, handlers::statements, handlers::health_check),
    components(schemas(
        dbinit_kernel::InvocationEvent,
        dbinit_kernel::InvocationResult,
        dbinit_kernel::Status,
        handlers::StatementView,
        error::ErrorEnvelope,
        error::ErrorBody
    ))
)]
pub struct ApiDoc;

/// Start the HTTP server and serve until the process is stopped
pub async fn start_server(
    bootstrapper: Arc<Bootstrapper>,
    executor: Arc<dyn StatementExecutor>,
    settings: &Settings,
) -> anyhow::Result<()> {
    check_request_timeout(settings, bootstrapper.statements().len())?;

    let state = AppState {
        bootstrapper,
        executor,
        database: Arc::new(settings.database.clone()),
    };

    let app = build_router(state, settings.server.request_timeout_ms);

    let address = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind to {address}"))?;

    tracing::info!("HTTP server listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

/// Refuse a request timeout that could cut off an invocation before it can
/// answer with the correlation ids.
pub fn check_request_timeout(settings: &Settings, statements: usize) -> anyhow::Result<()> {
    let budget = settings.database.worst_case_run(statements);
    let configured = Duration::from_millis(settings.server.request_timeout_ms);

    if configured <= budget {
        bail!(
            "server.request_timeout_ms ({}) must exceed {}ms: {} statements x (connect_timeout_ms + query_timeout_ms)",
            settings.server.request_timeout_ms,
            budget.as_millis(),
            statements
        );
    }
    Ok(())
}

/// Build the router with API routes, docs, and middleware
pub fn build_router(state: AppState, request_timeout_ms: u64) -> Router {
    let api = Router::new()
        .route("/invoke", post(handlers::invoke))
        .route("/statements", get(handlers::statements))
        .route("/healthz", get(handlers::health_check))
        .fallback(handlers::not_found)
        .with_state(state);

    RouterBuilder::new()
        .merge(api)
        .with_openapi::<ApiDoc>()
        .with_timeout(request_timeout_ms)
        .with_tracing()
        .with_request_id()
        .build()
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
