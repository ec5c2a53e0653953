//! Pure diff between master and target unavailability lists
//!
//! Records are paired with [`Unavailability::same_identity`]. The first target
//! record (in fetch order) that matches a master record is its counterpart;
//! further matches are reported as warnings and left untouched.

use serde::Serialize;

use crate::models::Unavailability;

/// Mutations needed to make target mirror master
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncPlan {
    /// Master records with no counterpart in target
    pub to_create: Vec<Unavailability>,
    /// Master field values carrying the matched target id
    pub to_update: Vec<Unavailability>,
    /// Ids of target records with no counterpart in master
    pub to_delete: Vec<String>,
    /// Data-integrity notices (ambiguous matches)
    pub warnings: Vec<String>,
}

impl SyncPlan {
    /// Whether applying the plan would change anything
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }
}

/// Human-readable identity of a record for log and warning text
pub fn describe(record: &Unavailability) -> String {
    match record.external_key() {
        Some(key) => format!("external_id {key}"),
        None => format!(
            "{} {}..{}",
            record.reason,
            record.start_time.to_rfc3339(),
            record.end_time.to_rfc3339()
        ),
    }
}

/// Compute create/update/delete sets for one resource
///
/// A target record is claimed by at most one master record. A later master
/// record whose counterpart is already claimed is reported and skipped, so
/// two master records never pull one target record in different directions.
pub fn compute_diff(master: &[Unavailability], target: &[Unavailability]) -> SyncPlan {
    let mut plan = SyncPlan::default();
    let mut claimed: Vec<Option<&Unavailability>> = vec![None; target.len()];

    for record in master {
        let mut matches = target
            .iter()
            .enumerate()
            .filter(|(_, t)| record.same_identity(t));

        let Some((index, counterpart)) = matches.next() else {
            plan.to_create.push(record.clone());
            continue;
        };

        let others: Vec<&str> = matches.filter_map(|(_, t)| t.remote_id()).collect();
        if !others.is_empty() {
            plan.warnings.push(format!(
                "{} matches {} target records; using {} and ignoring {}",
                describe(record),
                others.len() + 1,
                counterpart.remote_id().unwrap_or("<no id>"),
                others.join(", ")
            ));
        }

        if let Some(owner) = claimed[index] {
            plan.warnings.push(format!(
                "{} and {} both match target record {}; keeping the first",
                describe(owner),
                describe(record),
                counterpart.remote_id().unwrap_or("<no id>")
            ));
            continue;
        }
        claimed[index] = Some(record);

        if record.has_changes(counterpart) {
            plan.to_update.push(Unavailability {
                id: counterpart.id.clone(),
                ..record.clone()
            });
        }
    }

    for record in target {
        let Some(id) = record.remote_id() else {
            continue;
        };
        if !master.iter().any(|m| m.same_identity(record)) {
            plan.to_delete.push(id.to_string());
        }
    }

    plan
}
