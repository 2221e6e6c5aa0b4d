//! Creation policy engine
//!
//! Pure decision logic: given a policy and the scope's phase, decide which
//! provider operation fires. No state lives here; the scope carries the
//! start-time event id and passes it in.
//!
//! | Policy | On start | On end |
//! |---|---|---|
//! | `InsertOnEnd` | none | insert |
//! | `InsertOnStartInsertOnEnd` | insert | insert (second record) |
//! | `InsertOnStartReplaceOnEnd` | insert | replace(start id) |
//! | `Manual` | none | none |

use crate::error::{AuditError, Result};
use crate::types::EventId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// When audit events are persisted during a scope's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CreationPolicy {
    /// Insert once, when the scope is saved
    #[default]
    InsertOnEnd,
    /// Insert when the scope starts and insert a second record on save
    InsertOnStartInsertOnEnd,
    /// Insert when the scope starts, then replace that record on save
    InsertOnStartReplaceOnEnd,
    /// Persist only when the caller explicitly asks for it
    Manual,
}

impl fmt::Display for CreationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InsertOnEnd => "InsertOnEnd",
            Self::InsertOnStartInsertOnEnd => "InsertOnStartInsertOnEnd",
            Self::InsertOnStartReplaceOnEnd => "InsertOnStartReplaceOnEnd",
            Self::Manual => "Manual",
        };
        f.write_str(name)
    }
}

/// Provider operation selected by the policy engine
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    None,
    Insert,
    Replace(EventId),
}

/// Action to run when a scope starts
pub fn on_start(policy: CreationPolicy) -> Action {
    match policy {
        CreationPolicy::InsertOnStartInsertOnEnd | CreationPolicy::InsertOnStartReplaceOnEnd => {
            Action::Insert
        }
        CreationPolicy::InsertOnEnd | CreationPolicy::Manual => Action::None,
    }
}

/// Action to run when a scope ends
///
/// Fails with `MissingReferenceId` when a replace is due but the start-time
/// insert never produced an id; it never degrades to an insert.
pub fn on_end(policy: CreationPolicy, start_id: Option<&EventId>) -> Result<Action> {
    match policy {
        CreationPolicy::InsertOnEnd | CreationPolicy::InsertOnStartInsertOnEnd => {
            Ok(Action::Insert)
        }
        CreationPolicy::InsertOnStartReplaceOnEnd => start_id
            .cloned()
            .map(Action::Replace)
            .ok_or(AuditError::MissingReferenceId { policy }),
        CreationPolicy::Manual => Ok(Action::None),
    }
}

/// Action to run on an explicit, caller-invoked save
///
/// Same as `on_end` for the automatic policies. Under `Manual` the save is
/// the trigger itself: insert the first time, replace once an id exists.
pub fn on_save(policy: CreationPolicy, start_id: Option<&EventId>) -> Result<Action> {
    match policy {
        CreationPolicy::Manual => Ok(start_id
            .cloned()
            .map(Action::Replace)
            .unwrap_or(Action::Insert)),
        other => on_end(other, start_id),
    }
}
