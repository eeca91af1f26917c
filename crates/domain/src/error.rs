//! Shared error type used across all archon crates.
//!
//! Carries the semantic kinds the substrate's error-handling design names
//! (`NotFound`, `Validation`, `Transient`, `ServiceUnavailable`,
//! `DataIntegrity`, `Internal`) layered on top of transport-shaped
//! variants, since several semantic kinds are often *caused by* one of
//! those (a `Transient` error usually wraps a `Timeout`).

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("config: {0}")]
    Config(String),

    /// Requested entity is absent or has logically expired.
    #[error("not found: {0}")]
    NotFound(String),

    /// Input violates a declared invariant. Never retried.
    #[error("validation: {0}")]
    Validation(String),

    /// Timeout, connection refused, rate limit — retried internally before
    /// counting as a breaker failure.
    #[error("transient: {0}")]
    Transient(String),

    /// Breaker open, or every routing candidate was exhausted.
    #[error("service unavailable (services: {services:?}): {message}")]
    ServiceUnavailable {
        services: Vec<String>,
        message: String,
        correlation_id: Option<String>,
    },

    /// A read returned data violating an invariant. Never auto-repaired.
    #[error("data integrity violation: {0}")]
    DataIntegrity(String),

    /// Uncaught programmer error. Does not trip breakers.
    #[error("internal: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Best-effort classification of whether an error is in the retriable
    /// (`Transient`-class) family: timeout, connection, rate-limit shaped.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Timeout(_) | Error::Transient(_))
    }

    pub fn service_unavailable(services: Vec<String>, message: impl Into<String>) -> Self {
        Error::ServiceUnavailable {
            services,
            message: message.into(),
            correlation_id: None,
        }
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        if let Error::ServiceUnavailable { correlation_id, .. } = &mut self {
            *correlation_id = Some(id.into());
        }
        self
    }
}

pub type Result<T> = std::result::Result<T, Error>;
