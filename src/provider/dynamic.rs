//! Closure-backed audit data provider
//!
//! Wire storage in with plain functions instead of a dedicated type. Only the
//! operations that have a registered closure are supported; the async forms
//! run the same closures inline.

use super::{DataProvider, ProviderOperation};
use crate::error::{AuditError, Result};
use crate::types::{AuditEvent, EventId};
use async_trait::async_trait;
use std::sync::Arc;

type InsertFn = Arc<dyn Fn(&AuditEvent) -> Result<EventId> + Send + Sync>;
type ReplaceFn = Arc<dyn Fn(&EventId, &AuditEvent) -> Result<()> + Send + Sync>;

/// Audit data provider built from closures
///
/// ```rust
/// use a3s_audit::{DataProvider, DynamicDataProvider, EventId, AuditEvent};
///
/// let provider = DynamicDataProvider::new("stdout")
///     .on_insert(|event| {
///         println!("{}", event.event_type);
///         Ok(EventId::generate())
///     });
///
/// assert!(provider.insert_event(&AuditEvent::new("demo")).is_ok());
/// assert!(provider.replace_event(&EventId::from(1u64), &AuditEvent::new("demo")).is_err());
/// ```
#[derive(Clone)]
pub struct DynamicDataProvider {
    name: String,
    on_insert: Option<InsertFn>,
    on_replace: Option<ReplaceFn>,
}

impl DynamicDataProvider {
    /// Create a provider with no operations registered
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            on_insert: None,
            on_replace: None,
        }
    }

    /// Register the insert closure
    pub fn on_insert(
        mut self,
        f: impl Fn(&AuditEvent) -> Result<EventId> + Send + Sync + 'static,
    ) -> Self {
        self.on_insert = Some(Arc::new(f));
        self
    }

    /// Register the replace closure
    pub fn on_replace(
        mut self,
        f: impl Fn(&EventId, &AuditEvent) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.on_replace = Some(Arc::new(f));
        self
    }

    fn insert_with(&self, event: &AuditEvent, operation: ProviderOperation) -> Result<EventId> {
        match &self.on_insert {
            Some(f) => f(event),
            None => Err(AuditError::unsupported(&self.name, operation)),
        }
    }

    fn replace_with(
        &self,
        id: &EventId,
        event: &AuditEvent,
        operation: ProviderOperation,
    ) -> Result<()> {
        match &self.on_replace {
            Some(f) => f(id, event),
            None => Err(AuditError::unsupported(&self.name, operation)),
        }
    }
}

#[async_trait]
impl DataProvider for DynamicDataProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn insert_event(&self, event: &AuditEvent) -> Result<EventId> {
        self.insert_with(event, ProviderOperation::InsertEvent)
    }

    async fn insert_event_async(&self, event: &AuditEvent) -> Result<EventId> {
        self.insert_with(event, ProviderOperation::InsertEventAsync)
    }

    fn replace_event(&self, id: &EventId, event: &AuditEvent) -> Result<()> {
        self.replace_with(id, event, ProviderOperation::ReplaceEvent)
    }

    async fn replace_event_async(&self, id: &EventId, event: &AuditEvent) -> Result<()> {
        self.replace_with(id, event, ProviderOperation::ReplaceEventAsync)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_registered_closures_are_called() {
        let inserts = Arc::new(AtomicUsize::new(0));
        let replaces = Arc::new(AtomicUsize::new(0));

        let provider = {
            let inserts = inserts.clone();
            let replaces = replaces.clone();
            DynamicDataProvider::new("dyn")
                .on_insert(move |_| {
                    let n = inserts.fetch_add(1, Ordering::SeqCst);
                    Ok(EventId::from(n as u64))
                })
                .on_replace(move |_, _| {
                    replaces.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
        };

        let event = AuditEvent::new("x");
        let id = provider.insert_event(&event).unwrap();
        provider.insert_event_async(&event).await.unwrap();
        provider.replace_event(&id, &event).unwrap();
        provider.replace_event_async(&id, &event).await.unwrap();

        assert_eq!(inserts.load(Ordering::SeqCst), 2);
        assert_eq!(replaces.load(Ordering::SeqCst), 2);
        assert_eq!(provider.name(), "dyn");
    }

    #[tokio::test]
    async fn test_missing_closure_is_unsupported() {
        let provider = DynamicDataProvider::new("insert-only").on_insert(|_| Ok(EventId::generate()));
        let event = AuditEvent::new("x");

        let err = provider
            .replace_event_async(&EventId::from(1u64), &event)
            .await
            .unwrap_err();
        match err {
            AuditError::UnsupportedOperation { provider, operation } => {
                assert_eq!(provider, "insert-only");
                assert_eq!(operation, ProviderOperation::ReplaceEventAsync);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_closure_errors_propagate() {
        let provider = DynamicDataProvider::new("failing").on_insert(|_| {
            Err(AuditError::provider(
                "failing",
                ProviderOperation::InsertEvent,
                "disk full",
            ))
        });

        let err = provider.insert_event(&AuditEvent::new("x")).unwrap_err();
        assert!(err.to_string().contains("disk full"));
    }
}
