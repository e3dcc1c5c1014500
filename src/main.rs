use std::sync::Arc;

use anyhow::Context;
use dbinit_db::PgStatementExecutor;
use dbinit_kernel::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load dbinit settings")?;

    dbinit_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        policy = ?settings.bootstrap.result_policy,
        "supavisor-dbinit starting"
    );

    let bootstrapper = supavisor_dbinit::bootstrapper(&settings.bootstrap);

    dbinit_http::start_server(
        Arc::new(bootstrapper),
        Arc::new(PgStatementExecutor::new()),
        &settings,
    )
    .await
}
