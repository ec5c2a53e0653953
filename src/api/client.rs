//! Resource and unavailability access for one environment

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::transport::{is_absolute_url, Transport};
use crate::error::{Error, Result};
use crate::models::{Resource, Unavailability, UnavailabilityInput};

// ============================================================================
// Paths
// ============================================================================

const RESOURCES_PATH: &str = "/v1/resources/resource";

// Ids are percent-encoded so reserved characters stay inside their segment.
fn resource_path(resource_id: &str) -> String {
    format!("{RESOURCES_PATH}/{}", urlencoding::encode(resource_id))
}

fn unavailabilities_path(resource_id: &str) -> String {
    format!("{}/unavailability", resource_path(resource_id))
}

fn unavailability_path(resource_id: &str, unavailability_id: &str) -> String {
    format!(
        "{}/{}",
        unavailabilities_path(resource_id),
        urlencoding::encode(unavailability_id)
    )
}

// ============================================================================
// Repository Trait
// ============================================================================

/// CRUD capability against a single environment
#[async_trait]
pub trait ResourceRepository: Send + Sync {
    /// Environment label for logs
    fn environment_name(&self) -> &str;

    /// All resources, following pagination to the end
    async fn list_resources(&self) -> Result<Vec<Resource>>;

    /// One resource, `None` when the environment does not know it
    async fn get_resource(&self, id: &str) -> Result<Option<Resource>>;

    /// Unavailabilities of one resource, optionally filtered server-side
    async fn list_unavailabilities(
        &self,
        resource_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Unavailability>>;

    /// Create a record; fails with `OperationFailed` when nothing decodable comes back
    async fn create_unavailability(
        &self,
        resource_id: &str,
        input: &UnavailabilityInput,
    ) -> Result<Unavailability>;

    /// Update a record; rejects an empty `id` before any network call
    async fn update_unavailability(
        &self,
        resource_id: &str,
        id: &str,
        input: &UnavailabilityInput,
    ) -> Result<Unavailability>;

    /// Delete a record; `false` on any non-success outcome
    async fn delete_unavailability(&self, resource_id: &str, id: &str) -> Result<bool>;
}

// ============================================================================
// Pagination
// ============================================================================

/// One page of a collection response
#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(alias = "data", alias = "results")]
    items: Option<Vec<T>>,

    /// Absolute URL or opaque cursor token
    #[serde(alias = "next_page", alias = "next_cursor", alias = "cursor")]
    next: Option<String>,
}

// ============================================================================
// HTTP Implementation
// ============================================================================

/// [`ResourceRepository`] backed by the scheduling REST API
pub struct ResourceClient {
    transport: Transport,
}

impl ResourceClient {
    /// Create a client over an authenticated transport
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    async fn fetch_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut next: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page: Page<T> = match next.as_deref() {
                Some(url) if is_absolute_url(url) => self.transport.get(url, &[]).await?,
                Some(cursor) => {
                    let mut paged = query.to_vec();
                    paged.push(("cursor", cursor.to_string()));
                    self.transport.get(path, &paged).await?
                }
                None => self.transport.get(path, query).await?,
            };

            pages += 1;
            items.extend(page.items.unwrap_or_default());

            match page.next.filter(|n| !n.trim().is_empty()) {
                Some(n) => next = Some(n),
                None => break,
            }
        }

        debug!(
            environment = %self.environment_name(),
            path = %path,
            pages,
            items = items.len(),
            "Fetched collection"
        );

        Ok(items)
    }
}

/// Collapse any non-fatal mutation failure into `OperationFailed`
fn operation_failed(action: &str, err: Error) -> Error {
    if err.is_fatal() {
        err
    } else {
        Error::OperationFailed(format!("{action}: {err}"))
    }
}

fn rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl ResourceRepository for ResourceClient {
    fn environment_name(&self) -> &str {
        &self.transport.environment().name
    }

    async fn list_resources(&self) -> Result<Vec<Resource>> {
        self.fetch_all(RESOURCES_PATH, &[]).await
    }

    async fn get_resource(&self, id: &str) -> Result<Option<Resource>> {
        self.transport.get_optional(&resource_path(id)).await
    }

    async fn list_unavailabilities(
        &self,
        resource_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Unavailability>> {
        let mut query = Vec::new();
        if let Some(start) = start {
            query.push(("start_time_gte", rfc3339(start)));
        }
        if let Some(end) = end {
            query.push(("end_time_lte", rfc3339(end)));
        }

        self.fetch_all(&unavailabilities_path(resource_id), &query)
            .await
    }

    async fn create_unavailability(
        &self,
        resource_id: &str,
        input: &UnavailabilityInput,
    ) -> Result<Unavailability> {
        let action = format!("create unavailability for resource {resource_id}");
        let created: Option<Unavailability> = self
            .transport
            .post(&unavailabilities_path(resource_id), input)
            .await
            .map_err(|e| operation_failed(&action, e))?;

        created.ok_or_else(|| Error::OperationFailed(format!("{action}: no record returned")))
    }

    async fn update_unavailability(
        &self,
        resource_id: &str,
        id: &str,
        input: &UnavailabilityInput,
    ) -> Result<Unavailability> {
        if id.trim().is_empty() {
            return Err(Error::InvalidArgument(format!(
                "unavailability id is required to update resource {resource_id}"
            )));
        }

        let action = format!("update unavailability {id} for resource {resource_id}");
        let updated: Option<Unavailability> = self
            .transport
            .put(&unavailability_path(resource_id, id), input)
            .await
            .map_err(|e| operation_failed(&action, e))?;

        updated.ok_or_else(|| Error::OperationFailed(format!("{action}: no record returned")))
    }

    async fn delete_unavailability(&self, resource_id: &str, id: &str) -> Result<bool> {
        match self
            .transport
            .delete(&unavailability_path(resource_id, id))
            .await
        {
            Ok(deleted) => Ok(deleted),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(
                    environment = %self.environment_name(),
                    resource_id = %resource_id,
                    unavailability_id = %id,
                    error = %e,
                    "Delete request failed"
                );
                Ok(false)
            }
        }
    }
}
