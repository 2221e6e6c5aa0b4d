//! Per-operation item bag
//!
//! Hosts (request pipelines, job runners) carry one `OperationContext` per
//! in-flight operation. The audit scope for that operation lives under
//! [`AUDIT_SCOPE_KEY`], so every stage of the pipeline finds and enriches the
//! same scope instead of starting a new one. Dropping the context drops the
//! scope, which performs its end action.

use crate::error::{AuditError, Result};
use crate::factory::{AuditScopeFactory, ScopeOptions};
use crate::scope::AuditScope;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;

/// Item key under which the operation's audit scope is stored
pub const AUDIT_SCOPE_KEY: &str = "__private_AuditScope__";

/// String-keyed, type-erased items attached to one operation
#[derive(Default)]
pub struct OperationContext {
    items: HashMap<String, Box<dyn Any + Send>>,
}

impl OperationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an item, returning the previous value under the key
    pub fn insert<T: Any + Send>(
        &mut self,
        key: impl Into<String>,
        value: T,
    ) -> Option<Box<dyn Any + Send>> {
        self.items.insert(key.into(), Box::new(value))
    }

    /// Typed lookup; `None` if absent or of a different type
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.items.get(key).and_then(|item| item.downcast_ref())
    }

    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.items.get_mut(key).and_then(|item| item.downcast_mut())
    }

    pub fn remove(&mut self, key: &str) -> Option<Box<dyn Any + Send>> {
        self.items.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The operation's audit scope, if one was begun
    pub fn scope(&self) -> Option<&AuditScope> {
        self.get(AUDIT_SCOPE_KEY)
    }

    pub fn scope_mut(&mut self) -> Option<&mut AuditScope> {
        self.get_mut(AUDIT_SCOPE_KEY)
    }

    /// Begin the operation's scope, or return the one already begun (blocking)
    ///
    /// `options` are only used when a new scope is created.
    #[track_caller]
    pub fn begin_scope(
        &mut self,
        factory: &AuditScopeFactory,
        options: ScopeOptions,
    ) -> Result<&mut AuditScope> {
        if !self.contains_key(AUDIT_SCOPE_KEY) {
            let scope = factory.create(options)?;
            self.insert(AUDIT_SCOPE_KEY, scope);
        } else {
            tracing::debug!("Reusing audit scope from operation context");
        }
        self.stored_scope()
    }

    /// Begin the operation's scope, or return the one already begun
    #[track_caller]
    pub fn begin_scope_async<'a>(
        &'a mut self,
        factory: &'a AuditScopeFactory,
        options: ScopeOptions,
    ) -> impl Future<Output = Result<&'a mut AuditScope>> + Send + 'a {
        let create = if self.contains_key(AUDIT_SCOPE_KEY) {
            None
        } else {
            Some(factory.create_async(options))
        };
        async move {
            if let Some(create) = create {
                let scope = create.await?;
                self.insert(AUDIT_SCOPE_KEY, scope);
            }
            self.stored_scope()
        }
    }

    /// Detach the scope from the context, e.g. to save it explicitly
    pub fn take_scope(&mut self) -> Option<AuditScope> {
        let item = self.items.remove(AUDIT_SCOPE_KEY)?;
        match item.downcast::<AuditScope>() {
            Ok(scope) => Some(*scope),
            Err(other) => {
                self.items.insert(AUDIT_SCOPE_KEY.to_string(), other);
                None
            }
        }
    }

    fn stored_scope(&mut self) -> Result<&mut AuditScope> {
        self.scope_mut().ok_or_else(|| AuditError::ContextItem {
            key: AUDIT_SCOPE_KEY.to_string(),
            expected: "an audit scope",
        })
    }
}

impl std::fmt::Debug for OperationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&str> = self.items.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("OperationContext").field("items", &keys).finish()
    }
}
