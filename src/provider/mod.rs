//! Audit data provider trait: the storage abstraction for audit events
//!
//! All storage backends (files, SQL, HTTP sinks, in-memory, etc.) implement
//! `DataProvider`. Each operation comes in a blocking and a suspending form;
//! a backend implements the subset it can serve and the remaining operations
//! fail with `AuditError::UnsupportedOperation`.
//!
//! Providers are shared by every concurrently active scope and must be safe
//! for concurrent calls. The scope performs no locking around them.

use crate::error::{AuditError, Result};
use crate::types::{AuditEvent, EventId};
use async_trait::async_trait;
use std::fmt;

pub mod dynamic;
pub mod file;
pub mod memory;

/// Core trait for audit storage backends
///
/// The `EventId` returned from an insert is opaque to the scope; it is only
/// passed back into `replace_event*` of the same provider.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Provider name (e.g., "memory", "file")
    fn name(&self) -> &str;

    /// Store a new audit event, returning its id (blocking)
    fn insert_event(&self, _event: &AuditEvent) -> Result<EventId> {
        Err(AuditError::unsupported(
            self.name(),
            ProviderOperation::InsertEvent,
        ))
    }

    /// Store a new audit event, returning its id
    async fn insert_event_async(&self, _event: &AuditEvent) -> Result<EventId> {
        Err(AuditError::unsupported(
            self.name(),
            ProviderOperation::InsertEventAsync,
        ))
    }

    /// Overwrite a previously inserted audit event (blocking)
    fn replace_event(&self, _id: &EventId, _event: &AuditEvent) -> Result<()> {
        Err(AuditError::unsupported(
            self.name(),
            ProviderOperation::ReplaceEvent,
        ))
    }

    /// Overwrite a previously inserted audit event
    async fn replace_event_async(&self, _id: &EventId, _event: &AuditEvent) -> Result<()> {
        Err(AuditError::unsupported(
            self.name(),
            ProviderOperation::ReplaceEventAsync,
        ))
    }
}

/// The four data provider operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderOperation {
    InsertEvent,
    InsertEventAsync,
    ReplaceEvent,
    ReplaceEventAsync,
}

impl ProviderOperation {
    /// Whether this is one of the suspending forms
    pub fn is_async(&self) -> bool {
        matches!(self, Self::InsertEventAsync | Self::ReplaceEventAsync)
    }
}

impl fmt::Display for ProviderOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InsertEvent => "InsertEvent",
            Self::InsertEventAsync => "InsertEventAsync",
            Self::ReplaceEvent => "ReplaceEvent",
            Self::ReplaceEventAsync => "ReplaceEventAsync",
        };
        f.write_str(name)
    }
}
