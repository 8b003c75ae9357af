//! Security-orchestration playbook runner.
//!
//! Playbooks are YAML action trees (`log`, `set_variable`, `condition`,
//! `code_eval`, `external_call`) executed by [`PlaybookEngine`] against a
//! per-run variable context. Each run yields an [`ExecutionReport`] that can be
//! attached to a tracked [`Case`].

pub mod cases;
pub mod config;
pub mod error;
pub mod integrations;
pub mod models;
pub mod observability;
pub mod playbooks;

pub use cases::{CaseFilter, CaseManager, CaseStore, NewCase};
pub use config::Config;
pub use error::{AppError, Result};
pub use integrations::{IntegrationGateway, IntegrationManager};
pub use models::{Case, ExecutionReport, ExecutionStatus, Playbook};
pub use playbooks::{PlaybookEngine, PlaybookLoader, PlaybookService};
