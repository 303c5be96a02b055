//! Background job system.
//!
//! Jobs implement [`BackgroundJob`] and are driven by the [`JobRunner`],
//! which runs each one on its interval until the shutdown token fires.

mod audit_logger;
pub mod context;
pub mod job;
pub mod jobs;
mod runner;

pub use audit_logger::JobAuditLogger;
pub use context::JobContext;
pub use job::{BackgroundJob, JobError, JobSchedule, ShutdownBehavior};
pub use runner::{run_once, JobRunner};
