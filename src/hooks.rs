//! Audit event hooks
//!
//! Hooks run in registration order right before each provider call and may
//! read and mutate the in-progress event, e.g. to attach request metadata
//! captured by the host. The first failing hook stops the chain and the
//! provider call does not happen.
//!
//! The core never retries, so it never re-runs a hook on its own. A retry
//! wrapper around `save` re-runs every hook, so hooks should be idempotent.

use crate::error::{AuditError, Result};
use crate::types::AuditEvent;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Boxed error returned by hook implementations
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Which provider call a hook is running in front of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HookPhase {
    BeforeInsert,
    BeforeReplace,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeforeInsert => f.write_str("beforeInsert"),
            Self::BeforeReplace => f.write_str("beforeReplace"),
        }
    }
}

/// A callback allowed to mutate an audit event before it is persisted
pub trait Hook: Send + Sync {
    /// Hook name, used in error reports
    fn name(&self) -> &str;

    fn on_event(
        &self,
        event: &mut AuditEvent,
        phase: HookPhase,
    ) -> std::result::Result<(), BoxError>;
}

/// Closure adapter for `Hook`
pub struct FnHook<F> {
    name: String,
    f: F,
}

impl<F> Hook for FnHook<F>
where
    F: Fn(&mut AuditEvent, HookPhase) -> std::result::Result<(), BoxError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn on_event(
        &self,
        event: &mut AuditEvent,
        phase: HookPhase,
    ) -> std::result::Result<(), BoxError> {
        (self.f)(event, phase)
    }
}

/// Create a hook from a closure
pub fn hook_fn<F>(name: impl Into<String>, f: F) -> Arc<dyn Hook>
where
    F: Fn(&mut AuditEvent, HookPhase) -> std::result::Result<(), BoxError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnHook {
        name: name.into(),
        f,
    })
}

/// Ordered list of hooks
#[derive(Clone, Default)]
pub struct HookChain {
    hooks: Vec<Arc<dyn Hook>>,
}

impl HookChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook; it runs after every hook already registered
    pub fn push(&mut self, hook: Arc<dyn Hook>) {
        self.hooks.push(hook);
    }

    /// Append a hook (builder style)
    pub fn with(mut self, hook: Arc<dyn Hook>) -> Self {
        self.push(hook);
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Hook names in execution order
    pub fn names(&self) -> Vec<&str> {
        self.hooks.iter().map(|h| h.name()).collect()
    }

    /// Run every hook in order, stopping at the first failure
    pub fn run(&self, event: &mut AuditEvent, phase: HookPhase) -> Result<()> {
        for hook in &self.hooks {
            hook.on_event(event, phase).map_err(|e| {
                tracing::debug!(hook = hook.name(), phase = %phase, error = %e, "Audit hook failed");
                AuditError::Hook {
                    hook: hook.name().to_string(),
                    phase,
                    reason: e.to_string(),
                }
            })?;
        }
        Ok(())
    }
}

impl Extend<Arc<dyn Hook>> for HookChain {
    fn extend<I: IntoIterator<Item = Arc<dyn Hook>>>(&mut self, iter: I) {
        self.hooks.extend(iter);
    }
}

impl fmt::Debug for HookChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_hooks_run_in_registration_order() {
        let chain = HookChain::new()
            .with(hook_fn("first", |event, _| {
                event.comments.push("first".to_string());
                Ok(())
            }))
            .with(hook_fn("second", |event, phase| {
                event.comments.push(format!("second:{}", phase));
                Ok(())
            }));

        let mut event = AuditEvent::new("ordered");
        chain.run(&mut event, HookPhase::BeforeInsert).unwrap();

        assert_eq!(event.comments, vec!["first", "second:beforeInsert"]);
        assert_eq!(chain.names(), vec!["first", "second"]);
    }

    #[test]
    fn test_failing_hook_stops_chain() {
        let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
        let after = seen.clone();

        let chain = HookChain::new()
            .with(hook_fn("reject", |_, _| Err("missing tenant".into())))
            .with(hook_fn("after", move |_, _| {
                after.lock().unwrap().push("after");
                Ok(())
            }));

        let mut event = AuditEvent::new("x");
        let err = chain.run(&mut event, HookPhase::BeforeReplace).unwrap_err();

        match err {
            AuditError::Hook { hook, phase, reason } => {
                assert_eq!(hook, "reject");
                assert_eq!(phase, HookPhase::BeforeReplace);
                assert_eq!(reason, "missing tenant");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_empty_chain() {
        let chain = HookChain::default();
        let mut event = AuditEvent::new("x");
        assert!(chain.is_empty());
        chain.run(&mut event, HookPhase::BeforeInsert).unwrap();
        assert_eq!(format!("{:?}", chain), "[]");
    }

    #[test]
    fn test_phase_serialization() {
        assert_eq!(
            serde_json::to_string(&HookPhase::BeforeReplace).unwrap(),
            "\"beforeReplace\""
        );
    }
}
