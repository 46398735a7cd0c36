// src/error.rs
//! Error types shared across the crate.
//!
//! Startup errors (`ConfigError`, `LedgerError::Corrupt`) are fatal. Everything raised while a
//! run is in progress is contained by the pipeline, the oracle or the notifier and only shows
//! up in logs.

use std::path::PathBuf;

use thiserror::Error;

/// Anything wrong with the configuration file or the environment secrets.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    /// The stored ledger exists but cannot be parsed. Never recovered silently: dropping the
    /// history would re-deliver every paper.
    #[error("ledger at {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("ledger io on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Ordinal extraction failed for an identifier.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("identifier `{id}` has no numeric ordinal")]
pub struct OrdinalError {
    pub id: String,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("search request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("search request timed out")]
    Timeout,

    #[error("search source returned HTTP {0}")]
    Status(u16),

    #[error("search response could not be parsed: {0}")]
    Parse(String),

    #[error("search source reported an error: {0}")]
    Api(String),
}

impl SourceError {
    /// Network and timeout class failures, plus throttling and server-side errors.
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::Transport(_) | SourceError::Timeout => true,
            SourceError::Status(code) => *code == 429 || (500..600).contains(code),
            SourceError::Parse(_) | SourceError::Api(_) => false,
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout
        } else if let Some(status) = err.status() {
            SourceError::Status(status.as_u16())
        } else {
            SourceError::Transport(err)
        }
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("building http client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("completion request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("completion endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("completion response had no content")]
    EmptyResponse,
}
