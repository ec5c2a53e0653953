//! Drives reconciliation across all active master resources

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use super::reconciler::SyncRepository;
use crate::api::ResourceRepository;
use crate::error::Result;
use crate::models::{Resource, SyncResult, SynchronizationSettings};

/// Runs one synchronization over every active resource
pub struct SyncOrchestrator {
    master: Arc<dyn ResourceRepository>,
    reconciler: Arc<dyn SyncRepository>,
}

impl SyncOrchestrator {
    /// Create an orchestrator listing resources from `master`
    pub fn new(master: Arc<dyn ResourceRepository>, reconciler: Arc<dyn SyncRepository>) -> Self {
        Self { master, reconciler }
    }

    /// Active resources in master order
    pub async fn active_resources(&self) -> Result<Vec<Resource>> {
        let resources = self.master.list_resources().await?;
        Ok(resources.into_iter().filter(|r| r.active).collect())
    }

    /// Reconcile every active resource and aggregate the outcome
    ///
    /// Up to `settings.max_concurrent_resources` resources are in flight at
    /// once; results are folded in master order at this single point. An
    /// authentication failure stops the run with one error.
    pub async fn run(&self, settings: &SynchronizationSettings) -> SyncResult {
        let started = Instant::now();
        let mut result = SyncResult::default();

        info!(
            start_date = %settings.start_date,
            end_date = %settings.end_date,
            dry_run = settings.dry_run,
            concurrency = settings.max_concurrent_resources,
            "Starting synchronization"
        );

        let resources = match self.active_resources().await {
            Ok(resources) => resources,
            Err(e) => {
                error!(
                    category = e.category().as_str(),
                    recoverable = e.is_recoverable(),
                    error = %e,
                    "Failed to list master resources"
                );
                result.errors.push(if e.is_fatal() {
                    e.to_string()
                } else {
                    format!("Failed to list resources from master: {e}")
                });
                result.finish(started.elapsed());
                return result;
            }
        };

        info!(resources = resources.len(), "Active resources to synchronize");

        let concurrency = settings.max_concurrent_resources.max(1);
        let mut outcomes = stream::iter(resources)
            .map(|resource| async move {
                let outcome = self.reconciler.reconcile(&resource.id, settings).await;
                (resource, outcome)
            })
            .buffered(concurrency);

        while let Some((resource, outcome)) = outcomes.next().await {
            match outcome {
                Ok(operation) => {
                    if !operation.errors.is_empty() {
                        warn!(
                            resource_id = %resource.id,
                            errors = operation.errors.len(),
                            "Resource synchronized with errors"
                        );
                    }
                    result.absorb(operation);
                }
                Err(e) if e.is_fatal() => {
                    error!(resource_id = %resource.id, error = %e, "Aborting synchronization");
                    result.errors.push(e.to_string());
                    break;
                }
                Err(e) => {
                    error!(
                        resource_id = %resource.id,
                        category = e.category().as_str(),
                        error = %e,
                        "Resource synchronization failed"
                    );
                    result.resources_processed += 1;
                    result.errors.push(format!(
                        "Failed to sync resource {} ({}): {e}",
                        resource.id, resource.name
                    ));
                }
            }
        }

        result.finish(started.elapsed());

        info!(
            success = result.success,
            resources = result.resources_processed,
            created = result.created,
            updated = result.updated,
            deleted = result.deleted,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            duration_ms = result.duration.as_millis() as u64,
            "Synchronization finished"
        );

        result
    }
}
