// Core data structures for fleetsync

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fleet or driver resource as exposed by the scheduling API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Resource {
    pub id: String,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub active: bool,
}

/// Time-bounded period during which a resource cannot be scheduled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unavailability {
    /// Assigned by the remote environment; absent before creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Unavailability {
    /// Non-empty external id, if any
    pub fn external_key(&self) -> Option<&str> {
        non_empty(self.external_id.as_deref())
    }

    /// Non-empty remote id, if any
    pub fn remote_id(&self) -> Option<&str> {
        non_empty(self.id.as_deref())
    }

    /// Whether two records describe the same real-world unavailability
    ///
    /// When both sides carry an external id it alone decides; otherwise the
    /// `(start_time, end_time, reason)` tuple must match.
    pub fn same_identity(&self, other: &Self) -> bool {
        match (self.external_key(), other.external_key()) {
            (Some(a), Some(b)) => a == b,
            _ => {
                self.start_time == other.start_time
                    && self.end_time == other.end_time
                    && self.reason == other.reason
            }
        }
    }

    /// Whether any mutable field differs from `other`
    pub fn has_changes(&self, other: &Self) -> bool {
        self.start_time != other.start_time
            || self.end_time != other.end_time
            || self.reason != other.reason
            || non_empty(self.description.as_deref()) != non_empty(other.description.as_deref())
    }

    /// Copy of this record carrying `target_id` as its identifier
    ///
    /// Used for update entries: the target's id paired with master's fields.
    pub fn retargeted(&self, target_id: impl Into<String>) -> Self {
        Self {
            id: Some(target_id.into()),
            ..self.clone()
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Mutable subset of [`Unavailability`] sent on create and update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnavailabilityInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<&Unavailability> for UnavailabilityInput {
    fn from(record: &Unavailability) -> Self {
        Self {
            external_id: record.external_id.clone(),
            start_time: record.start_time,
            end_time: record.end_time,
            reason: record.reason.clone(),
            description: record.description.clone(),
        }
    }
}

/// Run configuration consumed by the reconciliation engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynchronizationSettings {
    /// First day of the window (inclusive)
    pub start_date: NaiveDate,
    /// Last day of the window (inclusive)
    pub end_date: NaiveDate,
    /// Compute the diff without issuing mutations
    #[serde(default)]
    pub dry_run: bool,
    /// Accepted for compatibility; the reconciliation path does not batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Number of resources reconciled at once (1 = sequential)
    #[serde(default = "default_max_concurrent_resources")]
    pub max_concurrent_resources: usize,
}

fn default_batch_size() -> usize {
    100
}

fn default_max_concurrent_resources() -> usize {
    1
}

impl SynchronizationSettings {
    /// Create settings for the given inclusive window
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            dry_run: false,
            batch_size: default_batch_size(),
            max_concurrent_resources: default_max_concurrent_resources(),
        }
    }

    /// Window covering the whole calendar year of `today`
    pub fn full_year(today: NaiveDate) -> Self {
        use chrono::Datelike;

        let year = today.year();
        let start = NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(today);
        let end = NaiveDate::from_ymd_opt(year, 12, 31).unwrap_or(today);
        Self::new(start, end)
    }

    /// Enable or disable dry-run mode
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the number of resources reconciled concurrently
    pub fn with_max_concurrent_resources(mut self, n: usize) -> Self {
        self.max_concurrent_resources = n;
        self
    }

    /// Start of the window as an instant (midnight UTC)
    pub fn window_start(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.start_date.and_time(NaiveTime::MIN))
    }

    /// End of the window as an instant (last second of `end_date`, UTC)
    pub fn window_end(&self) -> DateTime<Utc> {
        let last_second = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        Utc.from_utc_datetime(&self.end_date.and_time(last_second))
    }
}

/// Per-resource working state of one reconciliation
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResourceSyncOperation {
    pub resource_id: String,
    pub resource_name: String,
    pub master_unavailabilities: Vec<Unavailability>,
    pub target_unavailabilities: Vec<Unavailability>,
    pub to_create: Vec<Unavailability>,
    /// Target's id with master's field values
    pub to_update: Vec<Unavailability>,
    /// Target ids
    pub to_delete: Vec<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ResourceSyncOperation {
    /// Create an empty operation for one resource
    pub fn new(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            ..Default::default()
        }
    }

    /// Whether the diff produced any work
    pub fn has_changes(&self) -> bool {
        !(self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty())
    }
}

/// Run-level aggregate of all per-resource operations
#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    pub success: bool,
    pub resources_processed: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub duration: Duration,
    pub timestamp: DateTime<Utc>,
}

impl Default for SyncResult {
    fn default() -> Self {
        Self {
            success: false,
            resources_processed: 0,
            created: 0,
            updated: 0,
            deleted: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
            duration: Duration::ZERO,
            timestamp: Utc::now(),
        }
    }
}

impl SyncResult {
    /// Fold one resource's outcome into the run totals
    pub fn absorb(&mut self, operation: ResourceSyncOperation) {
        self.resources_processed += 1;
        self.created += operation.to_create.len();
        self.updated += operation.to_update.len();
        self.deleted += operation.to_delete.len();
        self.errors.extend(operation.errors);
        self.warnings.extend(operation.warnings);
    }

    /// Close the run: set `success` and the elapsed time
    pub fn finish(&mut self, duration: Duration) {
        self.success = self.errors.is_empty();
        self.duration = duration;
    }
}
