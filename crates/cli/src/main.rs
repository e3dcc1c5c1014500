use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};

use dbinit_db::PgStatementExecutor;
use dbinit_kernel::settings::Settings;
use dbinit_kernel::{InvocationEvent, ResultPolicy};

#[derive(Parser)]
#[command(name = "dbinit", version, about = "Bootstrap roles and schema for the pooler database")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the bootstrap once for an orchestrator event and print the result
    Invoke {
        /// Event JSON file, `-` for stdin
        #[arg(long, default_value = "-")]
        event: PathBuf,
        /// Overrides the configured database connection
        #[arg(long)]
        database_url: Option<String>,
        /// Report SUCCESS even when statements fail
        #[arg(long)]
        lenient: bool,
    },
    /// Print the statements in execution order
    Plan,
    /// Check that the database is in the bootstrapped state
    Verify {
        /// Overrides the configured database connection
        #[arg(long)]
        database_url: Option<String>,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut settings = Settings::load().with_context(|| "failed to load dbinit settings")?;

    match cli.command {
        Command::Plan => {
            for statement in supavisor_dbinit::BASELINE {
                println!("{:<30} {}", statement.id, statement.sql);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Invoke {
            event,
            database_url,
            lenient,
        } => {
            dbinit_telemetry::init(&settings.telemetry)?;

            if database_url.is_some() {
                settings.database.url = database_url;
            }
            if lenient {
                settings.bootstrap.result_policy = ResultPolicy::Lenient;
            }

            let event = read_event(&event)?;
            let bootstrapper = supavisor_dbinit::bootstrapper(&settings.bootstrap);

            let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
            let result = runtime.block_on(bootstrapper.invoke_with_settings(
                &event,
                &settings.database,
                &PgStatementExecutor::new(),
            ));

            println!(
                "{}",
                serde_json::to_string_pretty(&result).context("failed to encode result")?
            );

            Ok(if result.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Verify { database_url } => {
            dbinit_telemetry::init(&settings.telemetry)?;

            if database_url.is_some() {
                settings.database.url = database_url;
            }
            let descriptor = settings
                .database
                .descriptor()
                .context("invalid connection settings")?;

            let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
            let problems = runtime.block_on(supavisor_dbinit::verify::verify(&descriptor))?;

            if problems.is_empty() {
                println!("database is bootstrapped");
                return Ok(ExitCode::SUCCESS);
            }
            for problem in &problems {
                println!("{problem}");
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

fn read_event(path: &PathBuf) -> anyhow::Result<InvocationEvent> {
    let raw = if path.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read event from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read event file {}", path.display()))?
    };

    serde_json::from_str(&raw).context("failed to parse invocation event")
}
