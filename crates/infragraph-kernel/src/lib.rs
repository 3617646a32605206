//! infragraph kernel
//!
//! Resource graph expansion and concurrent evaluation:
//! 1. **Construction**: transformers build a graph of unexpanded resources
//! 2. **Walk**: ready nodes run concurrently; resource nodes expand into
//!    per-instance subgraphs that are spliced into the live walk
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use infragraph_kernel::prelude::*;
//!
//! let registry = PluginRegistry::new().with_fallback(Arc::new(EchoProvider::new()));
//! let ctx = Context::new(Arc::new(registry));
//!
//! let planned = ctx.plan(&config, State::new()).await?;
//! let applied = ctx.apply(&config, &planned.plan).await?;
//! ```

#![warn(missing_docs)]

pub mod api;
pub mod config;
pub mod construction;
pub mod context;
pub mod dag;
pub mod diagnostics;
pub mod error;
pub mod eval;
pub mod executor;
pub mod expander;
pub mod logging;
pub mod node;
pub mod plan;
pub mod plugin;
pub mod state;
pub mod state_machine;
pub mod transform;

pub use api::{ApplyOutcome, Context, PlanOutcome};
pub use error::*;

/// Common imports
pub mod prelude {
    pub use crate::api::{ApplyOutcome, Context, PlanOutcome};
    pub use crate::config::{Config, Evaluator, Expression, LiteralEvaluator, ResourceConfig, WalkerConfig};
    pub use crate::diagnostics::{Diagnostic, Diagnostics, Severity};
    pub use crate::error::{ConfigError, GraphError, PluginError, WalkError};
    pub use crate::executor::{WalkSummary, Walker};
    pub use crate::plan::{Action, Plan, PlannedChange};
    pub use crate::plugin::{EchoProvider, PluginRegistry, Provider, Provisioner};
    pub use crate::state::{ObjectState, State};
    pub use infragraph_addrs::{InstanceAddress, InstanceKey, ModuleInstance, ProviderAddr, Target};
    pub use std::sync::Arc;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Check if running with strict debugging enabled
#[must_use]
pub const fn strict_debug() -> bool {
    cfg!(feature = "strict-debug")
}
