//! The fixed bootstrap plan the pooler needs before it can start.

use dbinit_kernel::settings::BootstrapSettings;
use dbinit_kernel::statement::{Statement, DUPLICATE_OBJECT, DUPLICATE_SCHEMA, UNIQUE_VIOLATION};
use dbinit_kernel::Bootstrapper;

/// Schema the pooler keeps its own metadata in.
pub const INTERNAL_SCHEMA: &str = "_supavisor";

/// Roles every database behind the pooler is expected to have.
pub const BASELINE_ROLES: [&str; 3] = ["anon", "authenticated", "service_role"];

/// Statements in execution order. Roles first, then grants that reference
/// them, then the internal schema.
pub const BASELINE: &[Statement] = &[
    Statement::new(
        "create_role_anon",
        "create role anon nologin noinherit",
    )
    .tolerating(&[DUPLICATE_OBJECT, UNIQUE_VIOLATION]),
    Statement::new(
        "create_role_authenticated",
        "create role authenticated nologin noinherit",
    )
    .tolerating(&[DUPLICATE_OBJECT, UNIQUE_VIOLATION]),
    Statement::new(
        "create_role_service_role",
        "create role service_role nologin noinherit bypassrls",
    )
    .tolerating(&[DUPLICATE_OBJECT, UNIQUE_VIOLATION]),
    Statement::new(
        "grant_public_usage",
        "grant usage on schema public to anon, authenticated, service_role",
    ),
    Statement::new(
        "default_privileges_tables",
        "alter default privileges in schema public grant all on tables to anon, authenticated, service_role",
    ),
    Statement::new(
        "default_privileges_functions",
        "alter default privileges in schema public grant all on functions to anon, authenticated, service_role",
    ),
    Statement::new(
        "default_privileges_sequences",
        "alter default privileges in schema public grant all on sequences to anon, authenticated, service_role",
    ),
    Statement::new(
        "create_internal_schema",
        "create schema if not exists _supavisor",
    )
    .tolerating(&[DUPLICATE_SCHEMA, UNIQUE_VIOLATION]),
];

/// Runner for the baseline plan under the configured result policy.
pub fn bootstrapper(settings: &BootstrapSettings) -> Bootstrapper {
    Bootstrapper::new(BASELINE.to_vec()).with_policy(settings.result_policy)
}
