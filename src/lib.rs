//! Database bootstrap for the supavisor pooler deployment.
//!
//! The plan creates the baseline roles, grants, and the pooler's internal
//! schema; `verify` reads the catalog back to confirm the result.

pub mod plan;
pub mod verify;

pub use plan::{bootstrapper, BASELINE, BASELINE_ROLES, INTERNAL_SCHEMA};
