//! Unified error handling for the fleetsync crate
//!
//! Every layer (transport, resource client, reconciler) reports failures
//! through the single [`Error`] enum. The reconciler turns most of them into
//! per-resource error strings; only [`Error::is_fatal`] errors are allowed to
//! escape a unit of work.
//!
//! # Usage
//!
//! ```rust,ignore
//! use fleetsync::error::{Error, ErrorCategory};
//!
//! fn handle_error(err: Error) {
//!     if err.is_fatal() {
//!         eprintln!("Aborting run: {err}");
//!     } else if err.category() == ErrorCategory::Network {
//!         eprintln!("Remote call failed: {err}");
//!     }
//! }
//! ```

use thiserror::Error;

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network-related errors (HTTP status, timeout, DNS)
    Network,
    /// Token exchange and authorization errors
    Auth,
    /// Missing records, undecodable payloads, rejected arguments
    Data,
    /// Configuration and validation errors
    Config,
}

impl ErrorCategory {
    /// Short human-readable label for the category
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Auth => "auth",
            Self::Data => "data",
            Self::Config => "config",
        }
    }
}

/// Unified error type for the fleetsync crate
#[derive(Error, Debug)]
pub enum Error {
    /// A mutation reached the server but produced no usable result
    #[error("Operation failed: {0}")]
    OperationFailed(String),

    /// A call was rejected before reaching the network
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Network-level failure (connect, timeout, DNS)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status on a read path
    #[error("HTTP error ({status}): {message}")]
    Http { status: u16, message: String },

    /// Response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Token exchange or authorization failure
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Get the error category for handling strategies
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Transport(_) | Self::Http { .. } => ErrorCategory::Network,
            Self::Auth(_) => ErrorCategory::Auth,
            Self::OperationFailed(_) | Self::InvalidArgument(_) | Self::Decode(_) => {
                ErrorCategory::Data
            }
            Self::Config(_) => ErrorCategory::Config,
        }
    }

    /// Check if this error is transient (a later run may succeed)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Check if this error must abort the whole run
    ///
    /// Without a token no call against the environment can succeed, so
    /// authentication failures are never recorded per resource.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
