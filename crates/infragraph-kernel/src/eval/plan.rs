//! Plan-walk procedures

use super::scoped;
use crate::context::WalkContext;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::node::AbstractResource;
use crate::plan::{Action, PlannedChange};
use crate::plugin::{PlanResourceChangeRequest, ResolvedProvider};
use crate::state::{ObjectState, ObjectStatus};
use infragraph_addrs::InstanceAddress;
use std::sync::Arc;
use tracing::debug;

/// Plan one live instance
#[derive(Debug)]
pub struct PlanInstance {
    pub(crate) addr: InstanceAddress,
    pub(crate) resource: Arc<AbstractResource>,
    pub(crate) provider: Option<ResolvedProvider>,
    pub(crate) prior: Option<ObjectState>,
    pub(crate) create_before_destroy: bool,
}

impl PlanInstance {
    pub(super) async fn run(&self, ctx: &WalkContext) -> Diagnostics {
        scoped(self.plan(ctx).await, &self.addr)
    }

    async fn plan(&self, ctx: &WalkContext) -> Diagnostics {
        let Some(config) = &self.resource.config else {
            return Diagnostic::error("Missing resource configuration", "only orphans may lack configuration").into();
        };
        let Some(provider) = &self.provider else {
            return Diagnostic::error("Provider not available", config.provider_addr().to_string()).into();
        };
        let Some(schema) = provider.resource_schema(&config.kind) else {
            return Diagnostic::error(
                "Unsupported resource type",
                format!("provider {} does not support resource type {:?}", provider.addr, config.kind),
            )
            .into();
        };

        let body = config.body();
        let mut diags = schema.validate(&body);
        diags.extend(provider.provider.validate_resource_config(&config.kind, &body).await);
        if diags.has_errors() {
            return diags;
        }

        let before = self.prior.as_ref().map(|o| o.value.clone());
        let response = provider
            .provider
            .plan_resource_change(PlanResourceChangeRequest {
                type_name: config.kind.clone(),
                prior_state: before.clone(),
                proposed_new_state: body.clone(),
                config: body,
            })
            .await;
        diags.extend(response.diagnostics);
        if diags.has_errors() {
            return diags;
        }

        let mut planned = response.planned_state;
        let action = match &self.prior {
            None => Action::Create,
            Some(prior) => {
                let mut replace = response.requires_replace;
                replace.extend(schema.requires_replace(&prior.value, &planned));
                if prior.status == ObjectStatus::Tainted || !replace.is_empty() {
                    debug!(address = %self.addr, attributes = ?replace, tainted = prior.status == ObjectStatus::Tainted, "replacement required");
                    if self.create_before_destroy {
                        Action::CreateThenDelete
                    } else {
                        Action::DeleteThenCreate
                    }
                } else if prior.value == planned {
                    Action::NoOp
                } else {
                    Action::Update
                }
            }
        };

        // A replacement is a fresh object; plan it without the prior one.
        if action.is_replace() {
            let response = provider
                .provider
                .plan_resource_change(PlanResourceChangeRequest {
                    type_name: config.kind.clone(),
                    prior_state: None,
                    proposed_new_state: config.body(),
                    config: config.body(),
                })
                .await;
            diags.extend(response.diagnostics);
            if diags.has_errors() {
                return diags;
            }
            planned = response.planned_state;
        }

        debug!(address = %self.addr, %action, "planned instance");
        ctx.changes.record(PlannedChange {
            addr: self.addr.clone(),
            action,
            provider: provider.addr.clone(),
            before,
            after: Some(planned),
            deposed: false,
        });
        diags
    }
}

/// Plan destruction of an orphaned instance or a leftover deposed object
#[derive(Debug)]
pub struct PlanOrphan {
    pub(crate) addr: InstanceAddress,
    pub(crate) provider: Option<ResolvedProvider>,
    pub(crate) prior: Option<ObjectState>,
    pub(crate) deposed: bool,
}

impl PlanOrphan {
    pub(super) fn run(&self, ctx: &WalkContext) -> Diagnostics {
        let Some(prior) = &self.prior else {
            debug!(address = %self.addr, deposed = self.deposed, "no recorded object to destroy");
            return Diagnostics::new();
        };
        let Some(provider) = &self.provider else {
            return Diagnostic::error("Provider not available", "cannot plan destruction without a provider")
                .with_address(&self.addr)
                .into();
        };
        debug!(address = %self.addr, deposed = self.deposed, "planned destruction");
        ctx.changes.record(PlannedChange {
            addr: self.addr.clone(),
            action: Action::Delete,
            provider: provider.addr.clone(),
            before: Some(prior.value.clone()),
            after: None,
            deposed: self.deposed,
        });
        Diagnostics::new()
    }
}
