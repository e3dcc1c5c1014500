//! Core types for the database bootstrap routine: settings, the connection
//! descriptor, the orchestrator contract, and the statement runner.

pub mod bootstrap;
pub mod descriptor;
pub mod event;
pub mod settings;
pub mod statement;

pub use bootstrap::{Bootstrapper, Report, ReportEntry, ResultPolicy};
pub use descriptor::{ConnectionDescriptor, DescriptorError};
pub use event::{InvocationEvent, InvocationResult, RequestType, Status};
pub use statement::{ExecError, ExecErrorKind, Outcome, Statement, StatementExecutor};
