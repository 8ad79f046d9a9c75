//! Error types for the Mail.tm client.

use crate::envelope::{HydraError, Violation};

/// Errors surfaced by every client operation.
///
/// The enum is `Clone` so failures can be fanned out to several live-event
/// observers through a broadcast channel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Transport failure or a non-2xx status without a structured error body.
    #[error("network error: {0}")]
    Network(String),

    /// The API answered with a structured Hydra error document.
    ///
    /// Only the description is shown by `Display`; the field-level
    /// violations are kept for callers that want them.
    #[error("{description}")]
    Remote {
        /// Human readable `hydra:description`.
        description: String,
        /// Field-level violations, empty when the API sent none.
        violations: Vec<Violation>,
    },

    /// The response body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decoding(String),

    /// The request body could not be serialized.
    #[error("failed to encode request body: {0}")]
    Encoding(String),

    /// Invalid client configuration (URLs, proxy, TLS backend).
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Returns `true` for [`Error::Remote`].
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    pub(crate) fn network(err: impl std::fmt::Display) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<HydraError> for Error {
    fn from(err: HydraError) -> Self {
        Self::Remote {
            description: err.description,
            violations: err.violations.unwrap_or_default(),
        }
    }
}
