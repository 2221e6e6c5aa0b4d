//! Lifecycle of one audited operation
//!
//! A scope owns exactly one `AuditEvent` and drives it through
//! `Created → Active → {Saved | Discarded}`:
//!
//! - **start** (factory only): run the policy's start action, record the
//!   returned event id.
//! - **active**: mutate custom fields, target, comments.
//! - **save**: stamp the end time and run the policy's end action. Saving
//!   again returns the first outcome without touching the provider.
//! - **discard**: mark the event discarded; no provider call ever follows.
//!
//! A scope dropped while still active performs its end action in `Drop`
//! through the blocking provider path. Drop-time failures are logged and
//! handed to the configured release error handler.

use crate::config::ReleaseErrorHandler;
use crate::error::{AuditError, Result};
use crate::hooks::{HookChain, HookPhase};
use crate::policy::{self, Action, CreationPolicy};
use crate::provider::DataProvider;
use crate::types::{AuditEvent, EventId};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Lifecycle state of an audit scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeState {
    Created,
    Active,
    Saved,
    Discarded,
}

impl ScopeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Saved | Self::Discarded)
    }
}

impl fmt::Display for ScopeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "Created",
            Self::Active => "Active",
            Self::Saved => "Saved",
            Self::Discarded => "Discarded",
        };
        f.write_str(name)
    }
}

/// What a persistence point did
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// No provider call was due (or auditing is disabled)
    Skipped,
    /// A new record was inserted
    Inserted(EventId),
    /// An existing record was replaced
    Replaced(EventId),
    /// The scope was discarded; nothing was persisted
    Discarded,
}

impl SaveOutcome {
    /// Event id touched by this outcome, if any
    pub fn event_id(&self) -> Option<&EventId> {
        match self {
            Self::Inserted(id) | Self::Replaced(id) => Some(id),
            Self::Skipped | Self::Discarded => None,
        }
    }
}

/// Everything a scope is built from, resolved by the factory
pub(crate) struct ScopeParts {
    pub event: AuditEvent,
    pub policy: CreationPolicy,
    pub provider: Arc<dyn DataProvider>,
    pub hooks: HookChain,
    pub disabled: bool,
    pub on_release_error: Option<ReleaseErrorHandler>,
}

/// Lifecycle object for one audited operation
///
/// Not shared across operations: one caller drives it, so it needs no
/// internal locking. Created through `AuditScopeFactory`.
pub struct AuditScope {
    event: AuditEvent,
    policy: CreationPolicy,
    provider: Arc<dyn DataProvider>,
    hooks: HookChain,
    event_id: Option<EventId>,
    state: ScopeState,
    disabled: bool,
    outcome: Option<SaveOutcome>,
    /// Set once an end action has been attempted; drop never re-runs it
    end_attempted: bool,
    on_release_error: Option<ReleaseErrorHandler>,
}

impl AuditScope {
    pub(crate) fn new(parts: ScopeParts) -> Self {
        Self {
            event: parts.event,
            policy: parts.policy,
            provider: parts.provider,
            hooks: parts.hooks,
            event_id: None,
            state: ScopeState::Created,
            disabled: parts.disabled,
            outcome: None,
            end_attempted: false,
            on_release_error: parts.on_release_error,
        }
    }

    /// Activate without running the start action (restored scopes)
    pub(crate) fn resume(&mut self, event_id: Option<EventId>) {
        self.event_id = event_id;
        self.state = ScopeState::Active;
    }

    /// Run the start action (blocking) and activate
    pub(crate) fn start(&mut self, ignore_failure: bool) -> Result<()> {
        let result = self.execute(policy::on_start(self.policy));
        self.activate(result, ignore_failure)
    }

    /// Run the start action and activate
    pub(crate) async fn start_async(&mut self, ignore_failure: bool) -> Result<()> {
        let result = self.execute_async(policy::on_start(self.policy)).await;
        self.activate(result, ignore_failure)
    }

    fn activate(&mut self, result: Result<SaveOutcome>, ignore_failure: bool) -> Result<()> {
        match result {
            Ok(SaveOutcome::Inserted(id)) => self.event_id = Some(id),
            Ok(_) => {}
            Err(e) if ignore_failure => {
                tracing::warn!(
                    event_type = %self.event.event_type,
                    policy = %self.policy,
                    error = %e,
                    "Start-time audit insert failed; continuing without event id"
                );
            }
            Err(e) => return Err(e),
        }
        self.state = ScopeState::Active;
        Ok(())
    }

    // ─── Accessors ─────────────────────────────────────────────

    pub fn event(&self) -> &AuditEvent {
        &self.event
    }

    /// Id returned by the start-time (or manual) insert
    pub fn event_id(&self) -> Option<&EventId> {
        self.event_id.as_ref()
    }

    pub fn policy(&self) -> CreationPolicy {
        self.policy
    }

    pub fn state(&self) -> ScopeState {
        self.state
    }

    pub fn is_discarded(&self) -> bool {
        self.state == ScopeState::Discarded
    }

    /// Outcome of the save, once saved
    pub fn outcome(&self) -> Option<&SaveOutcome> {
        self.outcome.as_ref()
    }

    pub fn data_provider(&self) -> &Arc<dyn DataProvider> {
        &self.provider
    }

    // ─── Mutation ──────────────────────────────────────────────

    /// Set (or overwrite) a custom field
    pub fn set_custom_field(&mut self, key: impl Into<String>, value: impl Serialize) -> Result<()> {
        self.ensure_active("set a custom field on")?;
        let value = serde_json::to_value(value)?;
        self.event.custom_fields.insert(key.into(), value);
        Ok(())
    }

    /// Remove a custom field, returning its previous value
    pub fn remove_custom_field(&mut self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self
            .active_event("remove a custom field from")?
            .custom_fields
            .shift_remove(key))
    }

    /// Attach the operation's subject/result payload
    pub fn set_target(&mut self, target: impl Serialize) -> Result<()> {
        self.ensure_active("set the target of")?;
        self.event.target = Some(serde_json::to_value(target)?);
        Ok(())
    }

    pub fn set_event_type(&mut self, event_type: impl Into<String>) -> Result<()> {
        self.active_event("rename")?.event_type = event_type.into();
        Ok(())
    }

    pub fn comment(&mut self, text: impl Into<String>) -> Result<()> {
        self.active_event("comment on")?.comments.push(text.into());
        Ok(())
    }

    /// Record the failure of the audited operation
    pub fn set_error(&mut self, error: impl fmt::Display) -> Result<()> {
        self.active_event("record an error on")?.error = Some(error.to_string());
        Ok(())
    }

    /// Arbitrary mutation of the event while the scope is active
    pub fn update<R>(&mut self, f: impl FnOnce(&mut AuditEvent) -> R) -> Result<R> {
        Ok(f(self.active_event("update")?))
    }

    fn active_event(&mut self, action: &'static str) -> Result<&mut AuditEvent> {
        self.ensure_active(action)?;
        Ok(&mut self.event)
    }

    fn ensure_active(&self, action: &'static str) -> Result<()> {
        if self.state == ScopeState::Active {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    fn invalid(&self, action: &'static str) -> AuditError {
        AuditError::InvalidTransition {
            state: self.state,
            policy: self.policy,
            action,
        }
    }

    // ─── Manual triggers ───────────────────────────────────────

    /// Insert the event now, as a start-time insert would (blocking)
    ///
    /// Only for `Manual` scopes. The returned id is kept for later replaces.
    pub fn insert_event(&mut self) -> Result<SaveOutcome> {
        self.ensure_manual("manually insert")?;
        let outcome = self.execute(policy::on_start(CreationPolicy::InsertOnStartReplaceOnEnd))?;
        self.record_manual(outcome)
    }

    /// Insert the event now, as a start-time insert would
    pub async fn insert_event_async(&mut self) -> Result<SaveOutcome> {
        self.ensure_manual("manually insert")?;
        let outcome = self
            .execute_async(policy::on_start(CreationPolicy::InsertOnStartReplaceOnEnd))
            .await?;
        self.record_manual(outcome)
    }

    /// Replace the previously inserted event, as an end-time replace would (blocking)
    ///
    /// Fails with `MissingReferenceId` when nothing was inserted yet.
    pub fn replace_event(&mut self) -> Result<SaveOutcome> {
        let action = self.manual_replace_action()?;
        self.execute(action)
    }

    /// Replace the previously inserted event, as an end-time replace would
    pub async fn replace_event_async(&mut self) -> Result<SaveOutcome> {
        let action = self.manual_replace_action()?;
        self.execute_async(action).await
    }

    fn ensure_manual(&self, action: &'static str) -> Result<()> {
        self.ensure_active(action)?;
        if self.policy != CreationPolicy::Manual {
            return Err(self.invalid(action));
        }
        Ok(())
    }

    fn manual_replace_action(&self) -> Result<Action> {
        self.ensure_manual("manually replace")?;
        if self.disabled {
            return Ok(Action::None);
        }
        policy::on_end(CreationPolicy::InsertOnStartReplaceOnEnd, self.event_id.as_ref())
    }

    fn record_manual(&mut self, outcome: SaveOutcome) -> Result<SaveOutcome> {
        if let SaveOutcome::Inserted(id) = &outcome {
            self.event_id = Some(id.clone());
        }
        Ok(outcome)
    }

    // ─── Terminal actions ──────────────────────────────────────

    /// Save the scope (blocking)
    ///
    /// Idempotent: once saved, returns the first outcome; once discarded,
    /// returns `SaveOutcome::Discarded`. A failed save leaves the scope
    /// active so the caller may retry or discard.
    pub fn save(&mut self) -> Result<SaveOutcome> {
        if let Some(outcome) = self.terminal_outcome()? {
            return Ok(outcome);
        }
        let result = self
            .end_action(true)
            .and_then(|action| self.execute(action));
        self.complete(result)
    }

    /// Save the scope
    pub async fn save_async(&mut self) -> Result<SaveOutcome> {
        if let Some(outcome) = self.terminal_outcome()? {
            return Ok(outcome);
        }
        let result = match self.end_action(true) {
            Ok(action) => self.execute_async(action).await,
            Err(e) => Err(e),
        };
        self.complete(result)
    }

    /// Discard the scope; no provider call happens afterwards
    ///
    /// No-op on a scope that is already saved or discarded.
    pub fn discard(&mut self) {
        if self.state != ScopeState::Active {
            return;
        }
        self.event.mark_discarded();
        self.state = ScopeState::Discarded;
        tracing::info!(event_type = %self.event.event_type, "Audit scope discarded");
    }

    fn terminal_outcome(&self) -> Result<Option<SaveOutcome>> {
        match self.state {
            ScopeState::Saved => Ok(Some(self.outcome.clone().unwrap_or(SaveOutcome::Skipped))),
            ScopeState::Discarded => Ok(Some(SaveOutcome::Discarded)),
            ScopeState::Active => Ok(None),
            ScopeState::Created => Err(self.invalid("save")),
        }
    }

    /// Stamp the end time and decide the end action
    fn end_action(&mut self, explicit: bool) -> Result<Action> {
        self.end_attempted = true;
        self.event.end();
        if self.disabled {
            return Ok(Action::None);
        }
        if explicit {
            policy::on_save(self.policy, self.event_id.as_ref())
        } else {
            policy::on_end(self.policy, self.event_id.as_ref())
        }
    }

    fn complete(&mut self, result: Result<SaveOutcome>) -> Result<SaveOutcome> {
        let outcome = result?;
        self.state = ScopeState::Saved;
        self.outcome = Some(outcome.clone());
        tracing::info!(
            event_type = %self.event.event_type,
            policy = %self.policy,
            outcome = ?outcome,
            "Audit scope saved"
        );
        Ok(outcome)
    }

    // ─── Provider dispatch ─────────────────────────────────────

    fn execute(&mut self, action: Action) -> Result<SaveOutcome> {
        if self.disabled {
            return Ok(SaveOutcome::Skipped);
        }
        match action {
            Action::None => Ok(SaveOutcome::Skipped),
            Action::Insert => {
                self.hooks.run(&mut self.event, HookPhase::BeforeInsert)?;
                let id = self.provider.insert_event(&self.event)?;
                self.trace_call("insert", &id);
                Ok(SaveOutcome::Inserted(id))
            }
            Action::Replace(id) => {
                self.hooks.run(&mut self.event, HookPhase::BeforeReplace)?;
                self.provider.replace_event(&id, &self.event)?;
                self.trace_call("replace", &id);
                Ok(SaveOutcome::Replaced(id))
            }
        }
    }

    async fn execute_async(&mut self, action: Action) -> Result<SaveOutcome> {
        if self.disabled {
            return Ok(SaveOutcome::Skipped);
        }
        match action {
            Action::None => Ok(SaveOutcome::Skipped),
            Action::Insert => {
                self.hooks.run(&mut self.event, HookPhase::BeforeInsert)?;
                let id = self.provider.insert_event_async(&self.event).await?;
                self.trace_call("insert", &id);
                Ok(SaveOutcome::Inserted(id))
            }
            Action::Replace(id) => {
                self.hooks.run(&mut self.event, HookPhase::BeforeReplace)?;
                self.provider.replace_event_async(&id, &self.event).await?;
                self.trace_call("replace", &id);
                Ok(SaveOutcome::Replaced(id))
            }
        }
    }

    fn trace_call(&self, call: &str, id: &EventId) {
        tracing::debug!(
            event_type = %self.event.event_type,
            event_id = %id,
            provider = self.provider.name(),
            call,
            "Audit provider call"
        );
    }
}

impl Drop for AuditScope {
    fn drop(&mut self) {
        if self.state != ScopeState::Active || self.end_attempted {
            return;
        }

        let result = self
            .end_action(false)
            .and_then(|action| self.execute(action));

        if let Err(e) = self.complete(result) {
            tracing::error!(
                event_type = %self.event.event_type,
                policy = %self.policy,
                error = %e,
                "Audit scope release failed"
            );
            if let Some(handler) = &self.on_release_error {
                handler(&self.event, &e);
            }
        }
    }
}

impl fmt::Debug for AuditScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditScope")
            .field("event_type", &self.event.event_type)
            .field("policy", &self.policy)
            .field("provider", &self.provider.name())
            .field("state", &self.state)
            .field("event_id", &self.event_id)
            .finish()
    }
}
