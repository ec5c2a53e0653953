//! Reconciliation engine
//!
//! - [`diff`] - pure comparison of master and target records
//! - [`reconciler`] - fetch, diff and execute for one resource
//! - [`orchestrator`] - runs the reconciler over every active resource

pub mod diff;
pub mod orchestrator;
pub mod reconciler;

pub use diff::{compute_diff, SyncPlan};
pub use orchestrator::SyncOrchestrator;
pub use reconciler::{Reconciler, SyncRepository};
