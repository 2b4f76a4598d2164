/// Convenience result type used across swipebook.
pub type BookResult<T> = Result<T, BookError>;

/// A single remote resource that could not be materialized in the local cache.
///
/// Transport errors, non-200 statuses and local filesystem failures all collapse into this one
/// outcome; the caller decides the policy.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
#[error("load failed for '{url}': {reason}")]
pub struct LoadFailed {
    /// Remote URL that was requested.
    pub url: String,
    /// Human-readable cause.
    pub reason: String,
}

impl LoadFailed {
    /// Build a [`LoadFailed`] for `url`.
    pub fn new(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// Top-level error taxonomy used by document, cache and playback APIs.
#[derive(thiserror::Error, Debug)]
pub enum BookError {
    /// The document is missing a required key or has the wrong shape.
    #[error("invalid document: {0}")]
    DocumentInvalid(String),

    /// A resource could not be loaded.
    #[error(transparent)]
    ResourceLoadFailed(#[from] LoadFailed),

    /// Invalid configuration or API argument.
    #[error("validation error: {0}")]
    Validation(String),

    /// The persistent metadata store failed.
    #[error("store error: {0}")]
    Store(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BookError {
    /// Build a [`BookError::DocumentInvalid`] value.
    pub fn document(msg: impl Into<String>) -> Self {
        Self::DocumentInvalid(msg.into())
    }

    /// Build a [`BookError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`BookError::Store`] value.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Build a [`BookError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

impl From<serde_json::Error> for BookError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
