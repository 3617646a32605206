//! Evaluation procedures
//!
//! A node hands the walker an [`EvalProcedure`]: an owned description of
//! the work it needs done. Procedures touch the state store only for their
//! own address.

mod apply;
mod plan;

pub use apply::{ApplyDestroy, ApplyInstance};
pub use plan::{PlanInstance, PlanOrphan};

use crate::context::WalkContext;
use crate::diagnostics::Diagnostics;
use crate::expander::evaluate_expansion;
use crate::node::AbstractResource;
use infragraph_addrs::ResourceAddress;
use std::fmt::Display;
use std::sync::Arc;
use tracing::debug;

/// Work a node performs when walked
#[derive(Debug)]
pub enum EvalProcedure {
    /// Nothing
    Noop,
    /// Register the resource's expansion and write its metadata
    WriteResourceState(WriteResourceState),
    /// Plan one live instance
    PlanInstance(PlanInstance),
    /// Plan destruction of an orphan
    PlanOrphan(PlanOrphan),
    /// Create, update or replace one instance
    ApplyInstance(ApplyInstance),
    /// Destroy one object
    ApplyDestroy(ApplyDestroy),
}

impl EvalProcedure {
    /// Run the procedure
    pub async fn run(&self, ctx: &WalkContext) -> Diagnostics {
        match self {
            Self::Noop => Diagnostics::new(),
            Self::WriteResourceState(p) => p.run(ctx),
            Self::PlanInstance(p) => p.run(ctx).await,
            Self::PlanOrphan(p) => p.run(ctx),
            Self::ApplyInstance(p) => p.run(ctx).await,
            Self::ApplyDestroy(p) => p.run(ctx).await,
        }
    }
}

/// Attach `addr` to diagnostics that lack an address
pub(crate) fn scoped(diags: Diagnostics, addr: &impl Display) -> Diagnostics {
    diags
        .into_iter()
        .map(|d| if d.address.is_some() { d } else { d.with_address(addr) })
        .collect()
}

/// Resource-level state write
///
/// Evaluates count / for-each, registers the result with the expander and
/// records each-mode and provider in state.
#[derive(Debug)]
pub struct WriteResourceState {
    resource: Arc<AbstractResource>,
    addr: ResourceAddress,
}

impl WriteResourceState {
    /// Create
    #[must_use]
    pub fn new(resource: Arc<AbstractResource>, addr: ResourceAddress) -> Self {
        Self { resource, addr }
    }

    fn run(&self, ctx: &WalkContext) -> Diagnostics {
        let Some(config) = &self.resource.config else {
            return Diagnostics::new();
        };
        let expansion = match evaluate_expansion(
            ctx.evaluator.as_ref(),
            config.count.as_ref(),
            config.for_each.as_ref(),
            &self.addr.module,
        ) {
            Ok(expansion) => expansion,
            Err(diags) => return scoped(diags, &self.addr),
        };

        let provider = config.provider_addr();
        if let Err(diag) = ctx.schemas.resolve(&provider) {
            return diag.with_address(&self.addr).into();
        }

        debug!(resource = %self.addr, ?expansion, "writing resource state");
        ctx.expander.set_resource_expansion(&self.addr, expansion.clone());
        ctx.state
            .lock()
            .set_resource_meta(&self.addr, expansion.each_mode(), provider);
        Diagnostics::new()
    }
}
