use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use dbinit_kernel::settings::DatabaseSettings;
use dbinit_kernel::{Bootstrapper, InvocationEvent, InvocationResult, StatementExecutor};

use crate::error::{AppError, ErrorEnvelope};

/// Shared by all handlers; the descriptor is resolved per invocation from `database`.
#[derive(Clone)]
pub struct AppState {
    pub bootstrapper: Arc<Bootstrapper>,
    pub executor: Arc<dyn StatementExecutor>,
    pub database: Arc<DatabaseSettings>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatementView {
    pub id: String,
    pub sql: String,
    pub tolerated: Vec<String>,
}

/// Run the bootstrap once and answer with the orchestrator result.
#[utoipa::path(
    post,
    path = "/invoke",
    request_body = InvocationEvent,
    responses(
        (status = 200, description = "Bootstrap finished; see Status", body = InvocationResult),
        (status = 400, description = "Malformed request body", body = ErrorEnvelope),
        (status = 415, description = "Body is not JSON", body = ErrorEnvelope),
        (status = 422, description = "Event is missing required fields", body = ErrorEnvelope)
    )
)]
pub async fn invoke(
    State(state): State<AppState>,
    payload: Result<Json<InvocationEvent>, JsonRejection>,
) -> Result<Json<InvocationResult>, AppError> {
    let Json(event) = payload?;

    tracing::info!(
        request_type = %event.request_type,
        request_id = %event.request_id,
        "invocation received"
    );

    let result = state
        .bootstrapper
        .invoke_with_settings(&event, &state.database, state.executor.as_ref())
        .await;

    Ok(Json(result))
}

/// The ordered statement plan.
#[utoipa::path(
    get,
    path = "/statements",
    responses((status = 200, description = "Statements in execution order", body = [StatementView]))
)]
pub async fn statements(State(state): State<AppState>) -> Json<Vec<StatementView>> {
    let views = state
        .bootstrapper
        .statements()
        .iter()
        .map(|s| StatementView {
            id: s.id.to_string(),
            sql: s.sql.to_string(),
            tolerated: s.tolerated.iter().map(|c| c.to_string()).collect(),
        })
        .collect();
    Json(views)
}

#[utoipa::path(
    get,
    path = "/healthz",
    responses((status = 200, description = "OK", body = String))
)]
pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn not_found() -> AppError {
    AppError::not_found("no such route")
}
