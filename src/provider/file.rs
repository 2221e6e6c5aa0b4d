//! JSON file audit data provider
//!
//! Writes one pretty-printed JSON document per audit event into a directory.
//! The file name is the event id. Writes are atomic via temp file + rename,
//! so a replace never leaves a half-written record behind.

use super::{DataProvider, ProviderOperation};
use crate::error::{AuditError, Result};
use crate::types::{AuditEvent, EventId};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Longest event-type prefix kept in a file name
const MAX_PREFIX_LEN: usize = 64;

/// Directory-backed audit data provider
pub struct FileDataProvider {
    directory: PathBuf,
}

impl FileDataProvider {
    /// Create a provider writing into `directory` (created on first insert)
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Get the target directory
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Read a stored event back by id
    pub fn read(&self, id: &EventId) -> Result<AuditEvent> {
        let operation = ProviderOperation::ReplaceEvent;
        let path = self.path_for(id, operation)?;
        let json = std::fs::read_to_string(&path).map_err(|e| {
            AuditError::provider(
                self.name(),
                operation,
                format!("failed to read {}: {}", path.display(), e),
            )
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    fn new_file_name(event: &AuditEvent) -> String {
        // ids must pass `path_for`: no leading dot, bounded length
        let mut event_type: String = event
            .event_type
            .chars()
            .enumerate()
            .map(|(i, c)| match c {
                '.' if i == 0 => '_',
                c if c.is_ascii_alphanumeric() || c == '-' || c == '.' => c,
                _ => '_',
            })
            .collect();
        event_type.truncate(MAX_PREFIX_LEN);

        format!(
            "{}_{}_{}.json",
            if event_type.is_empty() { "event" } else { event_type.as_str() },
            event.start_time().format("%Y%m%d%H%M%S%3f"),
            uuid::Uuid::new_v4().simple()
        )
    }

    /// Resolve an id to a path inside the directory, rejecting anything else
    fn path_for(&self, id: &EventId, operation: ProviderOperation) -> Result<PathBuf> {
        let name = id
            .as_str()
            .filter(|name| {
                name.ends_with(".json")
                    && !name.contains('/')
                    && !name.contains('\\')
                    && !name.starts_with('.')
            })
            .ok_or_else(|| {
                AuditError::provider(self.name(), operation, format!("invalid event id: {}", id))
            })?;
        Ok(self.directory.join(name))
    }

    fn write(&self, path: &Path, event: &AuditEvent, operation: ProviderOperation) -> Result<()> {
        let json = serde_json::to_string_pretty(event)?;
        let tmp_path = path.with_extension("tmp");

        std::fs::create_dir_all(&self.directory).map_err(|e| {
            AuditError::provider(
                self.name(),
                operation,
                format!("failed to create directory {}: {}", self.directory.display(), e),
            )
        })?;

        std::fs::write(&tmp_path, json).map_err(|e| {
            AuditError::provider(
                self.name(),
                operation,
                format!("failed to write {}: {}", tmp_path.display(), e),
            )
        })?;

        std::fs::rename(&tmp_path, path).map_err(|e| {
            AuditError::provider(
                self.name(),
                operation,
                format!("failed to rename {} → {}: {}", tmp_path.display(), path.display(), e),
            )
        })?;

        tracing::debug!(path = %path.display(), event_type = %event.event_type, "Audit event written");
        Ok(())
    }

    async fn write_async(
        &self,
        path: &Path,
        event: &AuditEvent,
        operation: ProviderOperation,
    ) -> Result<()> {
        let json = serde_json::to_string_pretty(event)?;
        let tmp_path = path.with_extension("tmp");

        tokio::fs::create_dir_all(&self.directory).await.map_err(|e| {
            AuditError::provider(
                self.name(),
                operation,
                format!("failed to create directory {}: {}", self.directory.display(), e),
            )
        })?;

        tokio::fs::write(&tmp_path, json).await.map_err(|e| {
            AuditError::provider(
                self.name(),
                operation,
                format!("failed to write {}: {}", tmp_path.display(), e),
            )
        })?;

        tokio::fs::rename(&tmp_path, path).await.map_err(|e| {
            AuditError::provider(
                self.name(),
                operation,
                format!("failed to rename {} → {}: {}", tmp_path.display(), path.display(), e),
            )
        })?;

        tracing::debug!(path = %path.display(), event_type = %event.event_type, "Audit event written");
        Ok(())
    }

    fn not_found(&self, id: &EventId, operation: ProviderOperation) -> AuditError {
        AuditError::provider(self.name(), operation, format!("event not found: {}", id))
    }
}

#[async_trait]
impl DataProvider for FileDataProvider {
    fn name(&self) -> &str {
        "file"
    }

    fn insert_event(&self, event: &AuditEvent) -> Result<EventId> {
        let name = Self::new_file_name(event);
        self.write(&self.directory.join(&name), event, ProviderOperation::InsertEvent)?;
        Ok(EventId::from(name))
    }

    async fn insert_event_async(&self, event: &AuditEvent) -> Result<EventId> {
        let name = Self::new_file_name(event);
        self.write_async(&self.directory.join(&name), event, ProviderOperation::InsertEventAsync)
            .await?;
        Ok(EventId::from(name))
    }

    fn replace_event(&self, id: &EventId, event: &AuditEvent) -> Result<()> {
        let operation = ProviderOperation::ReplaceEvent;
        let path = self.path_for(id, operation)?;
        if !path.exists() {
            return Err(self.not_found(id, operation));
        }
        self.write(&path, event, operation)
    }

    async fn replace_event_async(&self, id: &EventId, event: &AuditEvent) -> Result<()> {
        let operation = ProviderOperation::ReplaceEventAsync;
        let path = self.path_for(id, operation)?;
        if tokio::fs::metadata(&path).await.is_err() {
            return Err(self.not_found(id, operation));
        }
        self.write_async(&path, event, operation).await
    }
}
