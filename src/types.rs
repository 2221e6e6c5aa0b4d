//! Core audit types for the a3s-audit system
//!
//! All types use camelCase JSON serialization for wire compatibility.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::Location;

/// Ordered custom field map (insertion order is preserved)
pub type CustomFields = serde_json::Map<String, serde_json::Value>;

/// A single audited operation
///
/// Created when an `AuditScope` starts, mutated while the scope is active,
/// and finalized (end time, duration) when the scope is saved. Providers only
/// ever see it by shared reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    /// Event type identifier (e.g., "order.create", "GET /api/values")
    pub event_type: String,

    /// Machine, user, and process metadata captured at creation
    #[serde(default)]
    environment: Environment,

    /// When the audited operation started
    start_time: DateTime<Utc>,

    /// When the audited operation ended (set on save)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    end_time: Option<DateTime<Utc>>,

    /// Elapsed milliseconds between start and end (set on save)
    #[serde(default, rename = "duration", skip_serializing_if = "Option::is_none")]
    duration_ms: Option<i64>,

    /// Subject or result of the audited operation, opaque to the core
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<serde_json::Value>,

    /// Free-form comments, in the order they were added
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<String>,

    /// Failure reported by the audited operation, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Caller and hook supplied fields
    #[serde(default)]
    pub custom_fields: CustomFields,

    /// Whether the owning scope was discarded instead of saved
    #[serde(default)]
    discarded: bool,
}

impl AuditEvent {
    /// Create a new event starting now, with an empty environment
    pub fn new(event_type: impl Into<String>) -> Self {
        Self::starting_at(event_type, Utc::now())
    }

    /// Create a new event with an explicit start time
    pub fn starting_at(event_type: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            event_type: event_type.into(),
            environment: Environment::default(),
            start_time,
            end_time: None,
            duration_ms: None,
            target: None,
            comments: Vec::new(),
            error: None,
            custom_fields: CustomFields::new(),
            discarded: false,
        }
    }

    /// Attach an environment (builder style, before the event is handed to a scope)
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Add a custom field (builder style)
    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.custom_fields.insert(key.into(), value);
        self
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    /// Elapsed time, available once the event has been ended
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.end_time.map(|end| end - self.start_time)
    }

    /// Elapsed milliseconds as serialized
    pub fn duration_ms(&self) -> Option<i64> {
        self.duration_ms
    }

    pub fn is_discarded(&self) -> bool {
        self.discarded
    }

    /// Look up a custom field
    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.custom_fields.get(key)
    }

    /// Stamp the end time; never earlier than the start time
    pub(crate) fn end(&mut self) {
        let now = Utc::now().max(self.start_time);
        self.end_time = Some(now);
        self.duration_ms = Some((now - self.start_time).num_milliseconds());
    }

    pub(crate) fn mark_discarded(&mut self) {
        self.discarded = true;
    }
}

/// Execution environment captured when a scope is created
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_name: Option<String>,

    #[serde(default)]
    pub process_id: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_name: Option<String>,

    /// Source location (`file:line`) that created the scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_site: Option<String>,
}

impl Environment {
    /// Capture the current process environment
    pub fn capture(call_site: Option<&Location<'_>>) -> Self {
        let process_name = std::env::current_exe().ok().and_then(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
        });

        Self {
            user_name: env_first(&["USER", "USERNAME", "LOGNAME"]),
            machine_name: env_first(&["HOSTNAME", "COMPUTERNAME"]),
            process_id: std::process::id(),
            process_name,
            call_site: call_site.map(|loc| format!("{}:{}", loc.file(), loc.line())),
        }
    }
}

fn env_first(vars: &[&str]) -> Option<String> {
    vars.iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.is_empty())
}

/// Provider-assigned identifier of a stored audit event
///
/// Opaque to the core: providers may use integers, strings, or composite
/// keys. The scope only hands it back to the provider that issued it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(serde_json::Value);

impl EventId {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Generate a random `aud-<uuid>` identifier
    pub fn generate() -> Self {
        Self(serde_json::Value::String(format!(
            "aud-{}",
            uuid::Uuid::new_v4()
        )))
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_str()
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.0.as_u64()
    }

    pub fn value(&self) -> &serde_json::Value {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            serde_json::Value::String(s) => f.write_str(s),
            other => write!(f, "{}", other),
        }
    }
}

impl From<u64> for EventId {
    fn from(value: u64) -> Self {
        Self(value.into())
    }
}

impl From<&str> for EventId {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

impl From<String> for EventId {
    fn from(value: String) -> Self {
        Self(value.into())
    }
}

impl From<serde_json::Value> for EventId {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}
