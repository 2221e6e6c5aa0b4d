//! Error types for a3s-audit

use crate::policy::CreationPolicy;
use crate::provider::ProviderOperation;
use thiserror::Error;

/// Errors that can occur while creating, mutating, or persisting an audit scope
#[derive(Debug, Error)]
pub enum AuditError {
    /// A data provider call failed (network, serialization, backend rejection)
    #[error("Provider '{provider}' failed on {operation}: {reason}")]
    Provider {
        provider: String,
        operation: ProviderOperation,
        reason: String,
    },

    /// The data provider does not implement the requested operation
    #[error("Provider '{provider}' does not support {operation}")]
    UnsupportedOperation {
        provider: String,
        operation: ProviderOperation,
    },

    /// A replace was required but no start-time event id was recorded
    #[error("Cannot replace audit event under policy {policy}: no event id from a prior insert")]
    MissingReferenceId { policy: CreationPolicy },

    /// A registered hook failed
    #[error("Hook '{hook}' failed during {phase}: {reason}")]
    Hook {
        hook: String,
        phase: crate::hooks::HookPhase,
        reason: String,
    },

    /// The requested action is not allowed in the scope's current state
    #[error("Cannot {action} audit scope (state {state}, policy {policy})")]
    InvalidTransition {
        state: crate::scope::ScopeState,
        policy: CreationPolicy,
        action: &'static str,
    },

    /// An operation context item holds a value of an unexpected type
    #[error("Context item '{key}' is not {expected}")]
    ContextItem {
        key: String,
        expected: &'static str,
    },

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuditError {
    /// Build a provider failure for the given operation
    pub fn provider(
        provider: impl Into<String>,
        operation: ProviderOperation,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::Provider {
            provider: provider.into(),
            operation,
            reason: reason.to_string(),
        }
    }

    /// Build an unsupported-operation failure
    pub fn unsupported(provider: impl Into<String>, operation: ProviderOperation) -> Self {
        Self::UnsupportedOperation {
            provider: provider.into(),
            operation,
        }
    }
}

/// Result type alias for audit operations
pub type Result<T> = std::result::Result<T, AuditError>;
