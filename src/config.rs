//! Audit configuration
//!
//! `AuditConfig` is an immutable snapshot of the policy, provider, and hooks a
//! scope uses. `AuditSettings` holds the current snapshot and is the
//! process-wide default; every scope reads it exactly once, at creation, so
//! a configuration change mid-flight never splits a scope's start and end
//! behavior.

use crate::error::{AuditError, Result};
use crate::hooks::{Hook, HookChain};
use crate::policy::CreationPolicy;
use crate::provider::memory::MemoryDataProvider;
use crate::provider::DataProvider;
use crate::types::AuditEvent;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock, RwLock};

/// Callback receiving failures of the implicit save performed when a scope is dropped
pub type ReleaseErrorHandler = Arc<dyn Fn(&AuditEvent, &AuditError) + Send + Sync>;

/// Resolved audit configuration
#[derive(Clone)]
pub struct AuditConfig {
    /// Creation policy for new scopes
    pub creation_policy: CreationPolicy,

    /// Storage backend for new scopes
    pub data_provider: Arc<dyn DataProvider>,

    /// Hooks run before every provider call
    pub hooks: HookChain,

    /// Keep the scope alive (without an event id) when the start-time insert fails
    pub ignore_start_failure: bool,

    /// Create scopes but never call hooks or the provider
    pub disabled: bool,

    /// Receives errors from drop-time saves, which no caller is awaiting
    pub on_release_error: Option<ReleaseErrorHandler>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self::new(MemoryDataProvider::default())
    }
}

impl AuditConfig {
    /// Create a configuration with default settings and the given provider
    pub fn new(provider: impl DataProvider + 'static) -> Self {
        Self {
            creation_policy: CreationPolicy::default(),
            data_provider: Arc::new(provider),
            hooks: HookChain::default(),
            ignore_start_failure: false,
            disabled: false,
            on_release_error: None,
        }
    }

    /// Use a shared provider
    pub fn with_data_provider(mut self, provider: Arc<dyn DataProvider>) -> Self {
        self.data_provider = provider;
        self
    }

    pub fn with_creation_policy(mut self, policy: CreationPolicy) -> Self {
        self.creation_policy = policy;
        self
    }

    pub fn with_hook(mut self, hook: Arc<dyn Hook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn with_ignore_start_failure(mut self, ignore: bool) -> Self {
        self.ignore_start_failure = ignore;
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn with_release_error_handler(
        mut self,
        handler: impl Fn(&AuditEvent, &AuditError) + Send + Sync + 'static,
    ) -> Self {
        self.on_release_error = Some(Arc::new(handler));
        self
    }

    /// Apply file/env supplied options on top of this configuration
    pub fn with_options(mut self, options: &AuditOptions) -> Self {
        self.creation_policy = options.creation_policy;
        self.ignore_start_failure = options.ignore_start_failure;
        self.disabled = options.disabled;
        self
    }
}

impl fmt::Debug for AuditConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditConfig")
            .field("creation_policy", &self.creation_policy)
            .field("data_provider", &self.data_provider.name())
            .field("hooks", &self.hooks)
            .field("ignore_start_failure", &self.ignore_start_failure)
            .field("disabled", &self.disabled)
            .field("on_release_error", &self.on_release_error.is_some())
            .finish()
    }
}

/// Serializable subset of the audit configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditOptions {
    #[serde(default)]
    pub creation_policy: CreationPolicy,

    #[serde(default)]
    pub ignore_start_failure: bool,

    #[serde(default)]
    pub disabled: bool,
}

impl AuditOptions {
    /// Parse options from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load options from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            AuditError::Config(format!(
                "Failed to read audit config {}: {}",
                path.display(),
                e
            ))
        })?;

        let options = serde_json::from_str(&json).map_err(|e| {
            AuditError::Config(format!(
                "Failed to parse audit config {}: {}",
                path.display(),
                e
            ))
        })?;

        tracing::debug!(path = %path.display(), "Audit options loaded");
        Ok(options)
    }
}

static GLOBAL_SETTINGS: OnceLock<Arc<AuditSettings>> = OnceLock::new();

/// Holder of the current audit configuration
///
/// Updates are last-write-wins and only affect scopes created afterwards.
pub struct AuditSettings {
    current: RwLock<Arc<AuditConfig>>,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self::new(AuditConfig::default())
    }
}

impl AuditSettings {
    /// Create an isolated settings instance
    pub fn new(config: AuditConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
        }
    }

    /// The process-wide default settings
    pub fn global() -> Arc<AuditSettings> {
        GLOBAL_SETTINGS
            .get_or_init(|| Arc::new(AuditSettings::default()))
            .clone()
    }

    /// Current configuration snapshot
    pub fn snapshot(&self) -> Arc<AuditConfig> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the whole configuration
    pub fn replace(&self, config: AuditConfig) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(config);
    }

    /// Copy-on-write update of the current configuration
    pub fn update(&self, f: impl FnOnce(&mut AuditConfig)) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        let mut next = AuditConfig::clone(&current);
        f(&mut next);
        *current = Arc::new(next);
    }

    pub fn set_creation_policy(&self, policy: CreationPolicy) {
        self.update(|c| c.creation_policy = policy);
        tracing::debug!(policy = %policy, "Audit creation policy updated");
    }

    pub fn set_data_provider(&self, provider: Arc<dyn DataProvider>) {
        tracing::debug!(provider = provider.name(), "Audit data provider updated");
        self.update(|c| c.data_provider = provider);
    }

    pub fn add_hook(&self, hook: Arc<dyn Hook>) {
        self.update(|c| c.hooks.push(hook));
    }

    pub fn set_ignore_start_failure(&self, ignore: bool) {
        self.update(|c| c.ignore_start_failure = ignore);
    }

    pub fn set_disabled(&self, disabled: bool) {
        self.update(|c| c.disabled = disabled);
    }

    pub fn set_release_error_handler(
        &self,
        handler: impl Fn(&AuditEvent, &AuditError) + Send + Sync + 'static,
    ) {
        let handler: ReleaseErrorHandler = Arc::new(handler);
        self.update(|c| c.on_release_error = Some(handler));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::hook_fn;
    use crate::provider::dynamic::DynamicDataProvider;

    #[test]
    fn test_config_defaults() {
        let config = AuditConfig::default();
        assert_eq!(config.creation_policy, CreationPolicy::InsertOnEnd);
        assert_eq!(config.data_provider.name(), "memory");
        assert!(config.hooks.is_empty());
        assert!(!config.ignore_start_failure);
        assert!(!config.disabled);
        assert!(config.on_release_error.is_none());
    }

    #[test]
    fn test_options_from_json() {
        let options = AuditOptions::from_json(
            r#"{"creationPolicy": "insertOnStartReplaceOnEnd", "ignoreStartFailure": true}"#,
        )
        .unwrap();

        assert_eq!(options.creation_policy, CreationPolicy::InsertOnStartReplaceOnEnd);
        assert!(options.ignore_start_failure);
        assert!(!options.disabled);

        let config = AuditConfig::default().with_options(&options);
        assert_eq!(config.creation_policy, CreationPolicy::InsertOnStartReplaceOnEnd);
        assert!(config.ignore_start_failure);
    }

    #[test]
    fn test_options_empty_json_uses_defaults() {
        assert_eq!(AuditOptions::from_json("{}").unwrap(), AuditOptions::default());
        assert!(AuditOptions::from_json(r#"{"creationPolicy": "sometimes"}"#).is_err());
    }

    #[test]
    fn test_options_from_file() {
        let dir = std::env::temp_dir().join(format!("a3s-audit-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("audit.json");
        std::fs::write(&path, r#"{"creationPolicy": "manual", "disabled": true}"#).unwrap();

        let options = AuditOptions::from_file(&path).unwrap();
        assert_eq!(options.creation_policy, CreationPolicy::Manual);
        assert!(options.disabled);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_options_from_missing_file() {
        let err = AuditOptions::from_file("/tmp/nonexistent-a3s-audit.json").unwrap_err();
        assert!(matches!(err, AuditError::Config(_)));
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_updates() {
        let settings = AuditSettings::default();
        let before = settings.snapshot();

        settings.set_creation_policy(CreationPolicy::Manual);
        settings.set_data_provider(Arc::new(DynamicDataProvider::new("dyn")));
        settings.add_hook(hook_fn("tag", |_, _| Ok(())));

        assert_eq!(before.creation_policy, CreationPolicy::InsertOnEnd);
        assert_eq!(before.data_provider.name(), "memory");
        assert!(before.hooks.is_empty());

        let after = settings.snapshot();
        assert_eq!(after.creation_policy, CreationPolicy::Manual);
        assert_eq!(after.data_provider.name(), "dyn");
        assert_eq!(after.hooks.names(), vec!["tag"]);
    }

    #[test]
    fn test_last_write_wins() {
        let settings = AuditSettings::default();
        settings.set_disabled(true);
        settings.set_disabled(false);
        settings.set_ignore_start_failure(true);
        settings.set_release_error_handler(|_, _| {});

        let config = settings.snapshot();
        assert!(!config.disabled);
        assert!(config.ignore_start_failure);
        assert!(config.on_release_error.is_some());

        settings.replace(AuditConfig::default());
        assert!(!settings.snapshot().ignore_start_failure);
    }

    #[test]
    fn test_global_is_shared() {
        let a = AuditSettings::global();
        let b = AuditSettings::global();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_config_debug_hides_closures() {
        let config = AuditConfig::default().with_hook(hook_fn("h", |_, _| Ok(())));
        let debug = format!("{:?}", config);
        assert!(debug.contains("\"memory\""));
        assert!(debug.contains("\"h\""));
    }
}
