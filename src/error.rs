//! Error types for the consent gate

use thiserror::Error;

use crate::domain::CmpBackend;

/// Errors that can occur while talking to a CMP or rewriting markup.
///
/// None of these is fatal for a page: the activation controllers degrade
/// every error to the placeholder state and keep going.
#[derive(Error, Debug)]
pub enum ConsentError {
    /// The host bridge to the CMP library failed
    #[error("cmp transport error ({backend}): {message}")]
    Transport { backend: CmpBackend, message: String },

    /// A CMP callback payload could not be decoded
    #[error("malformed cmp response: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    /// Vendor reference does not resolve in the registry
    #[error("unknown vendor: {0}")]
    UnknownVendor(String),

    /// Vendor or purpose identifier does not fit the backend's id scheme
    #[error("invalid {kind} id for {backend}: {value:?}")]
    InvalidId {
        backend: CmpBackend,
        kind: &'static str,
        value: String,
    },

    /// Registry definition is inconsistent
    #[error("registry error: {0}")]
    Registry(String),

    /// A single markup node could not be parsed or rebuilt
    #[error("markup error: {0}")]
    Markup(String),

    /// A gated script could not be fetched or executed
    #[error("script load failed for {url}: {message}")]
    ScriptLoad { url: String, message: String },

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl ConsentError {
    pub fn transport(backend: CmpBackend, message: impl Into<String>) -> Self {
        ConsentError::Transport {
            backend,
            message: message.into(),
        }
    }

    pub fn markup(message: impl Into<String>) -> Self {
        ConsentError::Markup(message.into())
    }
}

/// Result type for consent gate operations
pub type Result<T> = std::result::Result<T, ConsentError>;
