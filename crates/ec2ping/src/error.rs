//! Error types for peer resolution.
//!
//! Init-time errors (identity, credentials, criteria, missing tags) are fatal to the
//! owning process. Round-time errors degrade to "no candidates this round".

use thiserror::Error;

/// Errors produced by the resolution pipeline.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Metadata endpoint unreachable, non-2xx, or the document is incomplete.
    #[error("instance identity unavailable: {reason}")]
    IdentityUnavailable { reason: String },

    /// No credentials strategy registered under this name.
    #[error("credentials provider not found: {name}")]
    ProviderNotFound { name: String },

    /// The strategy exists but could not build a provider.
    #[error("credentials provider {name} could not be constructed: {reason}")]
    ProviderConstructionFailed { name: String, reason: String },

    /// A filter segment did not match `NAME '=' VALUE (',' VALUE)*`.
    #[error("could not process filter segment '{segment}'")]
    InvalidFilterSyntax { segment: String },

    /// Configured tag names absent on the local instance.
    #[error("expected instance tag(s) missing: {}", .names.join(", "))]
    MissingTags { names: Vec<String> },

    /// Transient inventory API or network failure.
    #[error("inventory query failed: {message}")]
    InventoryQueryFailed { message: String },

    /// A single address could not be turned into a socket address.
    #[error("could not resolve address '{address}'")]
    AddressResolutionFailed { address: String },

    /// Static configuration defect.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation invoked in the wrong lifecycle state.
    #[error("operation '{operation}' not allowed in state {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },
}

impl DiscoveryError {
    pub(crate) fn inventory(message: impl Into<String>) -> Self {
        Self::InventoryQueryFailed {
            message: message.into(),
        }
    }

    pub(crate) fn identity(reason: impl Into<String>) -> Self {
        Self::IdentityUnavailable {
            reason: reason.into(),
        }
    }

    /// Whether this error must abort initialization rather than a single round.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::InventoryQueryFailed { .. } | Self::AddressResolutionFailed { .. }
        )
    }
}

pub type Result<T, E = DiscoveryError> = std::result::Result<T, E>;
