//! In-memory scheduling environment for reconciliation tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use fleetsync::api::ResourceRepository;
use fleetsync::error::{Error, Result};
use fleetsync::models::{Resource, Unavailability, UnavailabilityInput};

#[derive(Default)]
struct State {
    resources: Vec<Resource>,
    unavailabilities: HashMap<String, Vec<Unavailability>>,
    next_id: usize,
    mutations: Vec<String>,
    calls: usize,
    fail_deletes: HashSet<String>,
    unauthorized_deletes: HashSet<String>,
    fail_creates: HashSet<String>,
    fail_listing: bool,
    reject_token: bool,
}

/// One environment held in memory, recording every call
pub struct InMemoryRepository {
    name: String,
    state: Mutex<State>,
}

impl InMemoryRepository {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn with_resource(self, resource: Resource) -> Self {
        self.state().resources.push(resource);
        self
    }

    pub fn with_unavailabilities(self, resource_id: &str, records: Vec<Unavailability>) -> Self {
        self.state()
            .unavailabilities
            .entry(resource_id.to_string())
            .or_default()
            .extend(records);
        self
    }

    /// Deletes of `id` answer `false`
    pub fn failing_delete(self, id: &str) -> Self {
        self.state().fail_deletes.insert(id.to_string());
        self
    }

    /// Deletes of `id` fail with an authentication error
    pub fn unauthorized_delete(self, id: &str) -> Self {
        self.state().unauthorized_deletes.insert(id.to_string());
        self
    }

    /// Creates of records with `external_id` fail
    pub fn failing_create(self, external_id: &str) -> Self {
        self.state().fail_creates.insert(external_id.to_string());
        self
    }

    /// Unavailability listing fails with a transport error
    pub fn failing_listing(self) -> Self {
        self.state().fail_listing = true;
        self
    }

    /// Every call fails with an authentication error
    pub fn rejecting_token(self) -> Self {
        self.state().reject_token = true;
        self
    }

    /// Current records of one resource
    pub fn records(&self, resource_id: &str) -> Vec<Unavailability> {
        self.state()
            .unavailabilities
            .get(resource_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Mutation log, e.g. `create r1`, `update r1/t2`, `delete r1/t1`
    pub fn mutations(&self) -> Vec<String> {
        self.state().mutations.clone()
    }

    /// Total number of calls of any kind
    pub fn call_count(&self) -> usize {
        self.state().calls
    }

    fn enter(&self) -> Result<MutexGuard<'_, State>> {
        let mut state = self.state();
        state.calls += 1;
        if state.reject_token {
            return Err(Error::Auth(format!("{} rejected credentials", self.name)));
        }
        Ok(state)
    }
}

fn apply(record: &mut Unavailability, input: &UnavailabilityInput) {
    record.external_id = input.external_id.clone();
    record.start_time = input.start_time;
    record.end_time = input.end_time;
    record.reason = input.reason.clone();
    record.description = input.description.clone();
}

#[async_trait]
impl ResourceRepository for InMemoryRepository {
    fn environment_name(&self) -> &str {
        &self.name
    }

    async fn list_resources(&self) -> Result<Vec<Resource>> {
        Ok(self.enter()?.resources.clone())
    }

    async fn get_resource(&self, id: &str) -> Result<Option<Resource>> {
        Ok(self.enter()?.resources.iter().find(|r| r.id == id).cloned())
    }

    async fn list_unavailabilities(
        &self,
        resource_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Unavailability>> {
        let state = self.enter()?;
        if state.fail_listing {
            return Err(Error::Transport(format!("{} unreachable", self.name)));
        }
        Ok(state
            .unavailabilities
            .get(resource_id)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| start.map_or(true, |s| r.start_time >= s))
                    .filter(|r| end.map_or(true, |e| r.end_time <= e))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create_unavailability(
        &self,
        resource_id: &str,
        input: &UnavailabilityInput,
    ) -> Result<Unavailability> {
        let mut state = self.enter()?;
        if input
            .external_id
            .as_ref()
            .is_some_and(|e| state.fail_creates.contains(e))
        {
            return Err(Error::OperationFailed("server returned no record".into()));
        }

        state.next_id += 1;
        let created = Unavailability {
            id: Some(format!("{}-{}", self.name, state.next_id)),
            external_id: input.external_id.clone(),
            start_time: input.start_time,
            end_time: input.end_time,
            reason: input.reason.clone(),
            description: input.description.clone(),
        };
        state
            .unavailabilities
            .entry(resource_id.to_string())
            .or_default()
            .push(created.clone());
        state.mutations.push(format!("create {resource_id}"));
        Ok(created)
    }

    async fn update_unavailability(
        &self,
        resource_id: &str,
        id: &str,
        input: &UnavailabilityInput,
    ) -> Result<Unavailability> {
        let mut state = self.enter()?;
        state.mutations.push(format!("update {resource_id}/{id}"));
        let record = state
            .unavailabilities
            .get_mut(resource_id)
            .and_then(|records| records.iter_mut().find(|r| r.id.as_deref() == Some(id)))
            .ok_or_else(|| Error::OperationFailed(format!("unavailability {id} not found")))?;
        apply(record, input);
        Ok(record.clone())
    }

    async fn delete_unavailability(&self, resource_id: &str, id: &str) -> Result<bool> {
        let mut state = self.enter()?;
        if state.unauthorized_deletes.contains(id) {
            return Err(Error::Auth(format!("{} revoked the access token", self.name)));
        }
        state.mutations.push(format!("delete {resource_id}/{id}"));
        if state.fail_deletes.contains(id) {
            return Ok(false);
        }
        let Some(records) = state.unavailabilities.get_mut(resource_id) else {
            return Ok(false);
        };
        let before = records.len();
        records.retain(|r| r.id.as_deref() != Some(id));
        Ok(records.len() < before)
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Active resource with the given id
pub fn resource(id: &str, name: &str) -> Resource {
    Resource {
        id: id.to_string(),
        external_id: None,
        name: name.to_string(),
        resource_type: "VEHICLE".to_string(),
        active: true,
    }
}

/// Midnight UTC on a January 2025 day
pub fn jan(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, day, 0, 0, 0).unwrap()
}

/// One-day unavailability starting on `day` of January 2025
pub fn unavailability(
    id: Option<&str>,
    external_id: Option<&str>,
    day: u32,
    reason: &str,
) -> Unavailability {
    Unavailability {
        id: id.map(String::from),
        external_id: external_id.map(String::from),
        start_time: jan(day),
        end_time: jan(day + 1),
        reason: reason.to_string(),
        description: None,
    }
}
