//! # a3s-audit
//!
//! Audit scopes, creation policies, and pluggable audit data providers for the
//! A3S ecosystem.
//!
//! ## Overview
//!
//! `a3s-audit` wraps an operation in an [`AuditScope`] that owns one
//! [`AuditEvent`]. The scope's [`CreationPolicy`] decides when the event is
//! written to a [`DataProvider`]: at the start, at the end, or both, and
//! whether the end write inserts a second record or replaces the first.
//! Swap providers (in-memory, files, closures, your own) without changing
//! application code.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_audit::{AuditConfig, AuditScopeFactory, AuditSettings, CreationPolicy};
//! use a3s_audit::{MemoryDataProvider, SaveOutcome, ScopeOptions};
//! use std::sync::Arc;
//!
//! # fn example() -> a3s_audit::Result<()> {
//! let provider = Arc::new(MemoryDataProvider::default());
//! let config = AuditConfig::default()
//!     .with_data_provider(provider.clone())
//!     .with_creation_policy(CreationPolicy::InsertOnStartReplaceOnEnd);
//! let factory = AuditScopeFactory::new(Arc::new(AuditSettings::new(config)));
//!
//! // Start-time insert happens here
//! let mut scope = factory.create(ScopeOptions::new("order.create"))?;
//! scope.set_custom_field("orderId", 1042)?;
//!
//! // End-time replace of the same record
//! let outcome = scope.save()?;
//! assert!(matches!(outcome, SaveOutcome::Replaced(_)));
//! assert_eq!(provider.len(), 1);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## Providers
//!
//! - **memory**: bounded in-memory store for tests and single-process use
//! - **file**: one JSON document per event in a directory
//! - **dynamic**: closures registered per operation
//!
//! ## Architecture
//!
//! - **DataProvider** trait: insert/replace, blocking and async
//! - **CreationPolicy**: pure start/end action rules
//! - **AuditScope**: lifecycle of one audited operation
//! - **AuditScopeFactory**: resolves settings and per-call options into scopes
//! - **AuditSettings**: process-wide (or injected) configuration snapshots
//! - **OperationContext**: per-operation item bag carrying the current scope

pub mod config;
pub mod context;
pub mod error;
pub mod factory;
pub mod hooks;
pub mod policy;
pub mod provider;
pub mod scope;
pub mod types;

// Re-export core types
pub use config::{AuditConfig, AuditOptions, AuditSettings, ReleaseErrorHandler};
pub use context::{OperationContext, AUDIT_SCOPE_KEY};
pub use error::{AuditError, Result};
pub use factory::{AuditScopeFactory, ScopeOptions};
pub use hooks::{hook_fn, BoxError, Hook, HookChain, HookPhase};
pub use policy::{Action, CreationPolicy};
pub use provider::{DataProvider, ProviderOperation};
pub use scope::{AuditScope, SaveOutcome, ScopeState};
pub use types::{AuditEvent, CustomFields, Environment, EventId};

// Re-export providers for convenience
pub use provider::dynamic::DynamicDataProvider;
pub use provider::file::FileDataProvider;
pub use provider::memory::{MemoryConfig, MemoryDataProvider};
