//! Error types for the Iléo to InfluxDB2 forwarder.
//!
//! Each component owns a typed error enum; the top-level [`Error`] wraps them
//! so a refresh cycle can be downgraded to a logged failure without losing the
//! category (authentication, transport, feed shape, reconciliation).

use thiserror::Error;

/// Result type alias using our custom error types.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error type that encompasses all application errors.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration-related errors
    #[error("configuration error")]
    Config(#[from] ConfigError),

    /// Portal login/download errors
    #[error("portal error")]
    Portal(#[from] PortalError),

    /// CSV feed shape errors
    #[error("feed error")]
    Feed(#[from] FeedError),

    /// Statistics reconciliation errors
    #[error("reconciliation error")]
    Reconcile(#[from] ReconcileError),

    /// Generic errors that don't fit other categories
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// True when the failure means the portal rejected the credentials or the
    /// session, as opposed to a transport problem or a malformed feed. The
    /// credential-entry flow uses this to show a specific message.
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Portal(e) if e.is_auth())
    }
}

/// Configuration-related errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Environment variable parsing failed
    #[error("failed to parse environment variables: {0}")]
    EnvParse(String),

    /// Configuration value is invalid
    #[error("invalid configuration value for {field}: {message}")]
    Invalid { field: String, message: String },
}

/// Portal communication errors.
///
/// Auth-shaped failures (`LoginRejected`, `NotAuthenticated`) are distinct
/// from transport failures (`Http`, `ExportRejected`): the portal answers bad
/// credentials with a redirect to an HTML error page, not an HTTP error.
#[derive(Error, Debug)]
pub enum PortalError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Login endpoint answered with a hard error status
    #[error("login rejected (status {status})")]
    LoginRejected { status: u16 },

    /// Export endpoint answered with a non-success status
    #[error("export download failed (status {status})")]
    ExportRejected { status: u16 },

    /// Export body was empty or an HTML error page instead of CSV
    #[error("authentication failed: portal returned an error page instead of CSV")]
    NotAuthenticated,
}

impl PortalError {
    /// True for credential/session failures, false for transport failures.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            PortalError::LoginRejected { .. } | PortalError::NotAuthenticated
        )
    }
}

/// CSV feed shape errors. Row-level problems (bad date, bad numeric field)
/// never surface here; they skip the row.
#[derive(Error, Debug)]
pub enum FeedError {
    /// Payload is markup, not delimited text
    #[error("feed is not tabular data (markup payload)")]
    NotTabular,

    /// Header plus at least one data row required
    #[error("feed too short: {rows} row(s), need a header and at least one data row")]
    TooShort { rows: usize },

    /// Every data row was dropped during parsing
    #[error("feed contained no usable data rows")]
    NoUsableRows,
}

/// Statistics reconciliation errors. Either one aborts the cycle before any
/// partial commit can corrupt the watermark.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Watermark lookup against the statistics store failed
    #[error("statistics lookup failed for series '{series}'")]
    StoreLookup {
        series: String,
        #[source]
        source: anyhow::Error,
    },

    /// Batch append to the statistics store failed
    #[error("failed to append {count} point(s) to series '{series}'")]
    StoreAppend {
        series: String,
        count: usize,
        #[source]
        source: anyhow::Error,
    },
}

impl ConfigError {
    /// Creates a new environment parse error.
    pub fn env_parse(err: impl std::fmt::Display) -> Self {
        Self::EnvParse(err.to_string())
    }

    /// Creates a new invalid configuration error.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl ReconcileError {
    /// Creates a store lookup error.
    pub fn store_lookup(series: impl Into<String>, source: anyhow::Error) -> Self {
        Self::StoreLookup {
            series: series.into(),
            source,
        }
    }

    /// Creates a store append error.
    pub fn store_append(series: impl Into<String>, count: usize, source: anyhow::Error) -> Self {
        Self::StoreAppend {
            series: series.into(),
            count,
            source,
        }
    }
}
