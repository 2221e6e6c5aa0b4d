//! Scope factory
//!
//! Resolves per-call `ScopeOptions` against a configuration snapshot and
//! starts new scopes. Per-call options win over the settings; per-call hooks
//! run after the configured ones.

use crate::config::AuditSettings;
use crate::error::Result;
use crate::hooks::Hook;
use crate::policy::CreationPolicy;
use crate::provider::DataProvider;
use crate::scope::{AuditScope, SaveOutcome, ScopeParts};
use crate::types::{AuditEvent, CustomFields, Environment, EventId};
use futures::future::BoxFuture;
use std::future::Future;
use std::panic::Location;
use std::sync::Arc;

/// Per-scope overrides
#[derive(Clone, Default)]
pub struct ScopeOptions {
    /// Event type; inferred from the call site when absent
    pub event_type: Option<String>,

    pub creation_policy: Option<CreationPolicy>,

    pub data_provider: Option<Arc<dyn DataProvider>>,

    /// Extra hooks, appended after the configured hooks
    pub hooks: Vec<Arc<dyn Hook>>,

    pub ignore_start_failure: Option<bool>,

    /// Initial target payload
    pub target: Option<serde_json::Value>,

    /// Initial custom fields
    pub custom_fields: CustomFields,

    /// Pre-built event to audit instead of a fresh one
    pub event: Option<AuditEvent>,
}

impl ScopeOptions {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: Some(event_type.into()),
            ..Default::default()
        }
    }

    pub fn with_creation_policy(mut self, policy: CreationPolicy) -> Self {
        self.creation_policy = Some(policy);
        self
    }

    pub fn with_data_provider(mut self, provider: Arc<dyn DataProvider>) -> Self {
        self.data_provider = Some(provider);
        self
    }

    pub fn with_hook(mut self, hook: Arc<dyn Hook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn with_ignore_start_failure(mut self, ignore: bool) -> Self {
        self.ignore_start_failure = Some(ignore);
        self
    }

    pub fn with_target(mut self, target: serde_json::Value) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.custom_fields.insert(key.into(), value);
        self
    }

    pub fn with_event(mut self, event: AuditEvent) -> Self {
        self.event = Some(event);
        self
    }
}

/// Creates audit scopes from a settings holder
#[derive(Clone)]
pub struct AuditScopeFactory {
    settings: Arc<AuditSettings>,
}

impl Default for AuditScopeFactory {
    fn default() -> Self {
        Self::global()
    }
}

impl AuditScopeFactory {
    /// Factory over an injected settings holder
    pub fn new(settings: Arc<AuditSettings>) -> Self {
        Self { settings }
    }

    /// Factory over the process-wide settings
    pub fn global() -> Self {
        Self::new(AuditSettings::global())
    }

    pub fn settings(&self) -> &Arc<AuditSettings> {
        &self.settings
    }

    /// Create and start a scope (blocking provider path)
    ///
    /// Fails if the start-time insert fails, unless start failures are ignored.
    #[track_caller]
    pub fn create(&self, options: ScopeOptions) -> Result<AuditScope> {
        let (mut scope, ignore_failure) = self.prepare(options, Location::caller());
        scope.start(ignore_failure)?;
        Ok(scope)
    }

    /// Create and start a scope (suspending provider path)
    #[track_caller]
    pub fn create_async(
        &self,
        options: ScopeOptions,
    ) -> impl Future<Output = Result<AuditScope>> + Send + '_ {
        let location = Location::caller();
        async move {
            let (mut scope, ignore_failure) = self.prepare(options, location);
            scope.start_async(ignore_failure).await?;
            Ok(scope)
        }
    }

    /// Rebuild an active scope from a stored event without running the start action
    ///
    /// Pass the id the event was stored under, if any. Under
    /// `InsertOnStartReplaceOnEnd` a scope resumed without an id fails to save
    /// with `MissingReferenceId`.
    #[track_caller]
    pub fn resume(
        &self,
        event: AuditEvent,
        event_id: Option<EventId>,
        options: ScopeOptions,
    ) -> AuditScope {
        let (mut scope, _) = self.prepare(options.with_event(event), Location::caller());
        scope.resume(event_id);
        scope
    }

    /// Create a scope, run `f`, then save (blocking)
    ///
    /// The scope is saved whatever `f` returns; if `f` panics the scope's
    /// drop performs the end action. Audit failures are returned as `Err`.
    #[track_caller]
    pub fn run<T>(&self, options: ScopeOptions, f: impl FnOnce(&mut AuditScope) -> T) -> Result<T> {
        let mut scope = self.create(options)?;
        let value = f(&mut scope);
        scope.save()?;
        Ok(value)
    }

    /// Create a scope, run `f`, then save (suspending)
    ///
    /// If the returned future is dropped before completion the scope's drop
    /// performs the end action through the blocking provider path.
    #[track_caller]
    pub fn run_async<'a, T, F>(
        &'a self,
        options: ScopeOptions,
        f: F,
    ) -> impl Future<Output = Result<T>> + 'a
    where
        F: for<'s> FnOnce(&'s mut AuditScope) -> BoxFuture<'s, T> + 'a,
        T: 'a,
    {
        let create = self.create_async(options);
        async move {
            let mut scope = create.await?;
            let value = f(&mut scope).await;
            scope.save_async().await?;
            Ok(value)
        }
    }

    /// Persist a one-shot event: create and save immediately (blocking)
    ///
    /// Uses `InsertOnEnd` unless the options choose a policy.
    #[track_caller]
    pub fn log(&self, mut options: ScopeOptions) -> Result<SaveOutcome> {
        options.creation_policy = Some(
            options
                .creation_policy
                .unwrap_or(CreationPolicy::InsertOnEnd),
        );
        let mut scope = self.create(options)?;
        scope.save()
    }

    /// Persist a one-shot event: create and save immediately
    #[track_caller]
    pub fn log_async(
        &self,
        mut options: ScopeOptions,
    ) -> impl Future<Output = Result<SaveOutcome>> + Send + '_ {
        options.creation_policy = Some(
            options
                .creation_policy
                .unwrap_or(CreationPolicy::InsertOnEnd),
        );
        let create = self.create_async(options);
        async move {
            let mut scope = create.await?;
            scope.save_async().await
        }
    }

    fn prepare(
        &self,
        options: ScopeOptions,
        location: &'static Location<'static>,
    ) -> (AuditScope, bool) {
        let config = self.settings.snapshot();

        let mut event = options.event.unwrap_or_else(|| AuditEvent::new(String::new()));
        if event.environment() == &Environment::default() {
            event = event.with_environment(Environment::capture(Some(location)));
        }
        if let Some(event_type) = options.event_type {
            event.event_type = event_type;
        } else if event.event_type.is_empty() {
            event.event_type = format!("{}:{}", location.file(), location.line());
        }
        if let Some(target) = options.target {
            event.target = Some(target);
        }
        event.custom_fields.extend(options.custom_fields);

        let mut hooks = config.hooks.clone();
        hooks.extend(options.hooks);

        let policy = options.creation_policy.unwrap_or(config.creation_policy);
        let provider = options
            .data_provider
            .unwrap_or_else(|| config.data_provider.clone());

        tracing::debug!(
            event_type = %event.event_type,
            policy = %policy,
            provider = provider.name(),
            "Creating audit scope"
        );

        let scope = AuditScope::new(ScopeParts {
            event,
            policy,
            provider,
            hooks,
            disabled: config.disabled,
            on_release_error: config.on_release_error.clone(),
        });
        let ignore_failure = options
            .ignore_start_failure
            .unwrap_or(config.ignore_start_failure);
        (scope, ignore_failure)
    }
}
