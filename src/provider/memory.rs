//! In-memory audit data provider
//!
//! Keeps events in a `BTreeMap` keyed by a sequential id. Useful for tests,
//! development, and single-process use. Events are lost on drop.

use super::{DataProvider, ProviderOperation};
use crate::error::{AuditError, Result};
use crate::types::{AuditEvent, EventId};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard};

/// Configuration for the in-memory provider
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Maximum stored events; the oldest are evicted first. 0 = unbounded
    pub max_events: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { max_events: 10_000 }
    }
}

#[derive(Default)]
struct MemoryStore {
    next_seq: u64,
    events: BTreeMap<u64, AuditEvent>,
}

/// In-memory audit data provider
///
/// Supports all four provider operations. Ids are `u64` sequence numbers
/// starting at 1.
#[derive(Default)]
pub struct MemoryDataProvider {
    config: MemoryConfig,
    store: RwLock<MemoryStore>,
}

impl MemoryDataProvider {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            store: RwLock::new(MemoryStore::default()),
        }
    }

    /// Get a stored event by id
    pub fn get(&self, id: &EventId) -> Option<AuditEvent> {
        let seq = id.as_u64()?;
        self.read().events.get(&seq).cloned()
    }

    /// All stored events, oldest first
    pub fn events(&self) -> Vec<(EventId, AuditEvent)> {
        self.read()
            .events
            .iter()
            .map(|(seq, event)| (EventId::from(*seq), event.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every stored event (ids keep increasing)
    pub fn clear(&self) {
        let mut store = self.store.write().unwrap_or_else(|e| e.into_inner());
        store.events.clear();
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryStore> {
        self.store.read().unwrap_or_else(|e| e.into_inner())
    }

    fn store_event(&self, event: &AuditEvent, operation: ProviderOperation) -> Result<EventId> {
        let mut store = self
            .store
            .write()
            .map_err(|e| AuditError::provider(self.name(), operation, format!("store lock poisoned: {}", e)))?;

        store.next_seq += 1;
        let seq = store.next_seq;
        store.events.insert(seq, event.clone());

        // Enforce max capacity
        if self.config.max_events > 0 {
            while store.events.len() > self.config.max_events {
                store.events.pop_first();
            }
        }

        tracing::debug!(
            event_type = %event.event_type,
            event_id = seq,
            provider = "memory",
            "Audit event inserted"
        );
        Ok(EventId::from(seq))
    }

    fn overwrite_event(
        &self,
        id: &EventId,
        event: &AuditEvent,
        operation: ProviderOperation,
    ) -> Result<()> {
        let seq = id.as_u64().ok_or_else(|| {
            AuditError::provider(self.name(), operation, format!("invalid event id: {}", id))
        })?;

        let mut store = self
            .store
            .write()
            .map_err(|e| AuditError::provider(self.name(), operation, format!("store lock poisoned: {}", e)))?;

        let slot = store.events.get_mut(&seq).ok_or_else(|| {
            AuditError::provider(self.name(), operation, format!("event not found: {}", id))
        })?;
        *slot = event.clone();

        tracing::debug!(
            event_type = %event.event_type,
            event_id = seq,
            provider = "memory",
            "Audit event replaced"
        );
        Ok(())
    }
}

#[async_trait]
impl DataProvider for MemoryDataProvider {
    fn name(&self) -> &str {
        "memory"
    }

    fn insert_event(&self, event: &AuditEvent) -> Result<EventId> {
        self.store_event(event, ProviderOperation::InsertEvent)
    }

    async fn insert_event_async(&self, event: &AuditEvent) -> Result<EventId> {
        self.store_event(event, ProviderOperation::InsertEventAsync)
    }

    fn replace_event(&self, id: &EventId, event: &AuditEvent) -> Result<()> {
        self.overwrite_event(id, event, ProviderOperation::ReplaceEvent)
    }

    async fn replace_event_async(&self, id: &EventId, event: &AuditEvent) -> Result<()> {
        self.overwrite_event(id, event, ProviderOperation::ReplaceEventAsync)
    }
}
