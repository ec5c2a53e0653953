//! fleetsync - Unavailability reconciliation between scheduling environments
//!
//! Brings the unavailability records of a "target" scheduling API instance
//! into agreement with a "master" instance for a bounded date window.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`api`] - Token cache, authenticated transport and resource client
//! - [`sync`] - Diff, per-resource reconciler and run orchestrator
//! - [`models`] - Core data structures and types
//! - [`error`] - Unified error type
//!
//! # Example
//!
//! ```no_run
//! use fleetsync::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     config.validate()?;
//!     let orchestrator = fleetsync::build_orchestrator(&config)?;
//!     let result = orchestrator.run(&config.settings()).await;
//!     println!("success: {}", result.success);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod sync;

use std::sync::Arc;

use api::{ResourceClient, ResourceRepository, TokenCache, TokenProvider, Transport};
use config::Config;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::api::{Environment, ResourceClient, ResourceRepository, TokenProvider};
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::models::{
        Resource, ResourceSyncOperation, SyncResult, SynchronizationSettings, Unavailability,
        UnavailabilityInput,
    };
    pub use crate::sync::{Reconciler, SyncOrchestrator, SyncRepository};
}

// Direct re-exports for convenience
pub use models::{ResourceSyncOperation, SyncResult, SynchronizationSettings, Unavailability};

/// Master and target clients sharing one token cache
pub fn build_clients(
    config: &Config,
) -> error::Result<(Arc<dyn ResourceRepository>, Arc<dyn ResourceRepository>)> {
    let token_http = reqwest::Client::builder()
        .timeout(config.request_timeout())
        .user_agent(config.http.user_agent.as_str())
        .build()
        .map_err(|e| error::Error::config(format!("failed to build HTTP client: {e}")))?;
    let tokens: Arc<dyn TokenProvider> = Arc::new(TokenCache::new(token_http));

    let client = |environment: api::Environment| -> error::Result<Arc<dyn ResourceRepository>> {
        let transport = Transport::new(
            environment,
            Arc::clone(&tokens),
            config.request_timeout(),
            &config.http.user_agent,
        )?;
        let repository: Arc<dyn ResourceRepository> = Arc::new(ResourceClient::new(transport));
        Ok(repository)
    };

    Ok((
        client(config.master_environment())?,
        client(config.target_environment())?,
    ))
}

/// Reconciler wired against the configured environments
pub fn build_reconciler(config: &Config) -> error::Result<sync::Reconciler> {
    let (master, target) = build_clients(config)?;
    Ok(sync::Reconciler::new(master, target))
}

/// Orchestrator wired against the configured environments
pub fn build_orchestrator(config: &Config) -> error::Result<sync::SyncOrchestrator> {
    let (master, target) = build_clients(config)?;
    let reconciler = Arc::new(sync::Reconciler::new(Arc::clone(&master), target));
    Ok(sync::SyncOrchestrator::new(master, reconciler))
}
