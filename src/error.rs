//! Error types for each stage of the crawl pipeline.
//!
//! Faults are scoped to the stage that raises them so callers can decide how
//! far they propagate:
//!
//! | Type | Raised by | Effect |
//! |------|-----------|--------|
//! | [`FetchError`] | page sessions | fatal to the operation that needed the page |
//! | [`NavigationFault`] | `click` | ends pagination early, keeps partial links |
//! | [`ExtractError`] | article extraction | fatal to one record only |
//! | [`DispatchFault`] | the coordinator | recorded per URL, never aborts the batch |
//! | [`SinkError`] | CSV output | fatal to the run |

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure to load or query a document.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, request timeout).
    #[error("network error fetching {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },

    /// The URL could not be parsed or resolved.
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// A structural selector failed to parse.
    #[error("invalid selector: {selector}")]
    InvalidSelector { selector: String },
}

/// Failure to follow a navigation control.
#[derive(Debug, Error)]
pub enum NavigationFault {
    #[error("navigation control not found: {selector}")]
    ControlAbsent { selector: String },

    /// The control exists but has no link to follow.
    #[error("navigation control is not clickable: {selector}")]
    NotClickable { selector: String },

    #[error("navigation target failed to load: {0}")]
    Load(#[from] FetchError),
}

/// Failure to build a record for one article.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("required field `{field}` missing at {url}")]
    RequiredField { field: &'static str, url: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// An extraction outcome that did not produce a record.
#[derive(Debug, Error)]
pub enum DispatchFault {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("extraction timed out after {after:?}")]
    TimedOut { after: Duration },

    /// The worker running this URL died before reporting.
    #[error("extraction aborted: {reason}")]
    Aborted { reason: String },
}

/// Failure to persist the result table.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error writing {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Failure to load a site profile.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("IO error reading profile {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid profile {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid {field} selector {selector:?} in profile {path}")]
    InvalidSelector {
        path: PathBuf,
        field: &'static str,
        selector: String,
    },
}
