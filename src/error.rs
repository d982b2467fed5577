//! Error types for a deploy run.
//!
//! Whether an error is fatal depends on where it surfaces: listing and
//! catalog failures end the run, while failures scoped to one app are
//! logged by the updater and the walk moves on.

use reqwest::{Method, StatusCode};
use std::time::Duration;
use thiserror::Error;

pub type Result<T, E = DeployError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no semver tag found in {candidates:?}")]
    NoValidTag { candidates: Vec<String> },

    #[error("{method} {url} returned {status}")]
    Status {
        method: Method,
        url: String,
        status: StatusCode,
    },

    #[error("{method} {url} failed: {source}")]
    Transport {
        method: Method,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    ClientSetup(#[source] reqwest::Error),

    #[error("unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode upgrade body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("invalid externalId {external_id:?}: {reason}")]
    InvalidExternalId { external_id: String, reason: String },

    #[error("app {app} has no {action} action")]
    MissingAction { app: String, action: &'static str },

    #[error("catalog {catalog} still syncing after {waited:?}")]
    CatalogSyncTimeout { catalog: String, waited: Duration },

    #[error("interrupted")]
    Interrupted,
}

impl DeployError {
    /// HTTP status of a failed request, if the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Problems with the inputs to a run, caught before any request is made.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required flag --{0}")]
    Missing(&'static str),

    #[error("invalid value for --{flag}: {reason}")]
    Invalid { flag: &'static str, reason: String },

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}
