//! Fetch-diff-execute cycle for a single resource

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::diff::{compute_diff, describe};
use crate::api::ResourceRepository;
use crate::error::{Error, Result};
use crate::models::{ResourceSyncOperation, SynchronizationSettings, UnavailabilityInput};

/// Cross-environment reconciliation capability
#[async_trait]
pub trait SyncRepository: Send + Sync {
    /// Bring target into agreement with master for one resource
    ///
    /// Per-resource failures end up in the returned operation's `errors`;
    /// only fatal errors (authentication) are returned as `Err`.
    async fn reconcile(
        &self,
        resource_id: &str,
        settings: &SynchronizationSettings,
    ) -> Result<ResourceSyncOperation>;

    /// Compute the diff for the current calendar year without mutating target
    async fn compare(&self, resource_id: &str) -> Result<ResourceSyncOperation>;
}

/// [`SyncRepository`] over a master and a target environment
pub struct Reconciler {
    master: Arc<dyn ResourceRepository>,
    target: Arc<dyn ResourceRepository>,
}

impl Reconciler {
    /// Create a reconciler between two environments
    pub fn new(master: Arc<dyn ResourceRepository>, target: Arc<dyn ResourceRepository>) -> Self {
        Self { master, target }
    }

    /// Fetch both sides and fill the diff sets
    ///
    /// Any recorded error means the diff must not be executed: a partially
    /// fetched side would turn into spurious creates or deletes.
    async fn plan(
        &self,
        resource_id: &str,
        settings: &SynchronizationSettings,
    ) -> Result<ResourceSyncOperation> {
        let mut op = ResourceSyncOperation::new(resource_id);

        let resource = match self.master.get_resource(resource_id).await {
            Ok(Some(resource)) => resource,
            Ok(None) => {
                op.errors
                    .push(format!("resource {resource_id} not found in master"));
                return Ok(op);
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                op.errors.push(format!(
                    "failed to fetch resource {resource_id} from master: {e}"
                ));
                return Ok(op);
            }
        };
        op.resource_name = resource.name;

        let start = Some(settings.window_start());
        let end = Some(settings.window_end());
        let (master, target) = futures::join!(
            self.master.list_unavailabilities(resource_id, start, end),
            self.target.list_unavailabilities(resource_id, start, end),
        );

        match master {
            Ok(records) => op.master_unavailabilities = records,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => op.errors.push(fetch_error(self.master.as_ref(), resource_id, &e)),
        }
        match target {
            Ok(records) => op.target_unavailabilities = records,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => op.errors.push(fetch_error(self.target.as_ref(), resource_id, &e)),
        }
        if !op.errors.is_empty() {
            return Ok(op);
        }

        let plan = compute_diff(&op.master_unavailabilities, &op.target_unavailabilities);
        for warning in &plan.warnings {
            warn!(resource_id = %resource_id, "{warning}");
        }

        op.to_create = plan.to_create;
        op.to_update = plan.to_update;
        op.to_delete = plan.to_delete;
        op.warnings.extend(plan.warnings);

        debug!(
            resource_id = %resource_id,
            master = op.master_unavailabilities.len(),
            target = op.target_unavailabilities.len(),
            to_create = op.to_create.len(),
            to_update = op.to_update.len(),
            to_delete = op.to_delete.len(),
            "Computed diff"
        );

        Ok(op)
    }

    /// Apply the diff to target, attempting every entry
    ///
    /// Failures are recorded on `op` as they happen; a fatal error stops the
    /// loop with everything recorded so far still on `op`.
    async fn execute(&self, op: &mut ResourceSyncOperation) -> Result<()> {
        let resource_id = op.resource_id.as_str();
        let errors = &mut op.errors;

        for record in &op.to_create {
            let input = UnavailabilityInput::from(record);
            match self.target.create_unavailability(resource_id, &input).await {
                Ok(created) => debug!(
                    resource_id = %resource_id,
                    id = created.id.as_deref().unwrap_or_default(),
                    "Created unavailability"
                ),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => errors.push(format!(
                    "failed to create unavailability ({}) for resource {resource_id}: {e}",
                    describe(record)
                )),
            }
        }

        for record in &op.to_update {
            let Some(id) = record.remote_id() else {
                errors.push(format!(
                    "skipped update of unavailability ({}) for resource {resource_id}: missing target id",
                    describe(record)
                ));
                continue;
            };
            let input = UnavailabilityInput::from(record);
            match self
                .target
                .update_unavailability(resource_id, id, &input)
                .await
            {
                Ok(_) => debug!(resource_id = %resource_id, id = %id, "Updated unavailability"),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => errors.push(format!(
                    "failed to update unavailability {id} for resource {resource_id}: {e}"
                )),
            }
        }

        for id in &op.to_delete {
            match self.target.delete_unavailability(resource_id, id).await {
                Ok(true) => debug!(resource_id = %resource_id, id = %id, "Deleted unavailability"),
                Ok(false) => errors.push(format!(
                    "failed to delete unavailability {id} for resource {resource_id}"
                )),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => errors.push(format!(
                    "failed to delete unavailability {id} for resource {resource_id}: {e}"
                )),
            }
        }

        Ok(())
    }
}

/// Carry failures already recorded for a resource into a fatal error
fn abort_with(err: Error, op: &ResourceSyncOperation) -> Error {
    match err {
        Error::Auth(reason) if !op.errors.is_empty() => Error::Auth(format!(
            "{reason}; earlier failures for resource {}: {}",
            op.resource_id,
            op.errors.join("; ")
        )),
        other => other,
    }
}

fn fetch_error(side: &dyn ResourceRepository, resource_id: &str, err: &Error) -> String {
    warn!(
        environment = %side.environment_name(),
        resource_id = %resource_id,
        category = err.category().as_str(),
        recoverable = err.is_recoverable(),
        error = %err,
        "Failed to fetch unavailabilities"
    );
    format!(
        "failed to fetch {} unavailabilities for resource {resource_id}: {err}",
        side.environment_name()
    )
}

#[async_trait]
impl SyncRepository for Reconciler {
    async fn reconcile(
        &self,
        resource_id: &str,
        settings: &SynchronizationSettings,
    ) -> Result<ResourceSyncOperation> {
        let mut op = self.plan(resource_id, settings).await?;
        if !op.errors.is_empty() || !op.has_changes() {
            return Ok(op);
        }

        if settings.dry_run {
            op.warnings.push(format!(
                "dry run: {} creates, {} updates, {} deletes for resource {resource_id} not applied",
                op.to_create.len(),
                op.to_update.len(),
                op.to_delete.len()
            ));
            return Ok(op);
        }

        if let Err(e) = self.execute(&mut op).await {
            return Err(abort_with(e, &op));
        }

        info!(
            resource_id = %resource_id,
            resource_name = %op.resource_name,
            created = op.to_create.len(),
            updated = op.to_update.len(),
            deleted = op.to_delete.len(),
            errors = op.errors.len(),
            "Reconciled resource"
        );

        Ok(op)
    }

    async fn compare(&self, resource_id: &str) -> Result<ResourceSyncOperation> {
        let settings = SynchronizationSettings::full_year(Utc::now().date_naive());
        self.plan(resource_id, &settings).await
    }
}
