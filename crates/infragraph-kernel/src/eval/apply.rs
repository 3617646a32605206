//! Apply-walk procedures

use super::scoped;
use crate::config::ResourceConfig;
use crate::context::WalkContext;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::node::AbstractResource;
use crate::plan::{Action, PlannedChange};
use crate::plugin::{ApplyResourceChangeRequest, LogOutput, ProvisionResourceRequest, ResolvedProvider};
use crate::state::{Depose, ObjectState, ObjectStatus};
use infragraph_addrs::InstanceAddress;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Create, update or replace one instance
#[derive(Debug)]
pub struct ApplyInstance {
    pub(crate) addr: InstanceAddress,
    pub(crate) resource: Arc<AbstractResource>,
    pub(crate) provider: Option<ResolvedProvider>,
    pub(crate) change: PlannedChange,
    pub(crate) create_before_destroy: bool,
}

impl ApplyInstance {
    pub(super) async fn run(&self, ctx: &WalkContext) -> Diagnostics {
        scoped(self.apply(ctx).await, &self.addr)
    }

    async fn apply(&self, ctx: &WalkContext) -> Diagnostics {
        let Some(config) = &self.resource.config else {
            return Diagnostic::error("Missing resource configuration", "cannot apply without configuration").into();
        };
        let Some(provider) = &self.provider else {
            return Diagnostic::error("Provider not available", self.change.provider.to_string()).into();
        };

        let action = self.change.action;
        if action == Action::CreateThenDelete {
            let deposed = ctx.state.lock().depose_current(&self.addr);
            match deposed {
                Depose::Moved => debug!(address = %self.addr, "deposed current object"),
                Depose::NoCurrent => {}
                Depose::Occupied => {
                    return Diagnostic::error(
                        "Deposed object pending destruction",
                        "an earlier replacement left a deposed object; destroy it before replacing again",
                    )
                    .into();
                }
            }
        }
        let prior_state = match action {
            Action::Update => self.change.before.clone(),
            _ => None,
        };

        info!(address = %self.addr, %action, "applying");
        let response = provider
            .provider
            .apply_resource_change(ApplyResourceChangeRequest {
                type_name: config.kind.clone(),
                prior_state,
                planned_state: self.change.after.clone(),
                config: config.body(),
            })
            .await;
        let mut diags = response.diagnostics;

        if let Some(value) = response.new_state {
            let mut object =
                ObjectState::new(value).with_dependencies(config.dependencies(&self.addr.module().module_path()));
            object.create_before_destroy = self.create_before_destroy;
            ctx.state.lock().set_current(&self.addr, Some(object));
        }
        if diags.has_errors() || !action.creates() || config.provisioners.is_empty() {
            return diags;
        }

        let provisioned = run_provisioners(ctx, config, &self.addr).await;
        if provisioned.has_errors() {
            warn!(address = %self.addr, "provisioning failed; marking object tainted");
            let mut state = ctx.state.lock();
            if let Some(mut object) = state.current_object(&self.addr).cloned() {
                object.status = ObjectStatus::Tainted;
                state.set_current(&self.addr, Some(object));
            }
        }
        diags.extend(provisioned);
        diags
    }
}

async fn run_provisioners(ctx: &WalkContext, config: &ResourceConfig, addr: &InstanceAddress) -> Diagnostics {
    let mut diags = Diagnostics::new();
    for p in &config.provisioners {
        let Some(provisioner) = ctx.plugins.provisioner(&p.kind) else {
            diags.push(Diagnostic::error(
                "Provisioner not available",
                format!("no provisioner of type {:?} is registered", p.kind),
            ));
            break;
        };

        diags.extend(provisioner.validate_provisioner_config(&p.config).await);
        if diags.has_errors() {
            break;
        }

        info!(address = %addr, provisioner = %p.kind, "provisioning");
        let output = LogOutput::new(addr.to_string(), &p.kind);
        let request = ProvisionResourceRequest {
            config: p.config.clone(),
            connection: p.connection.clone(),
        };
        diags.extend(provisioner.provision_resource(request, &output).await);
        if diags.has_errors() {
            break;
        }
    }
    diags
}

/// Destroy the live or deposed object of an instance
#[derive(Debug)]
pub struct ApplyDestroy {
    pub(crate) addr: InstanceAddress,
    pub(crate) provider: Option<ResolvedProvider>,
    pub(crate) deposed: bool,
}

impl ApplyDestroy {
    pub(super) async fn run(&self, ctx: &WalkContext) -> Diagnostics {
        scoped(self.destroy(ctx).await, &self.addr)
    }

    async fn destroy(&self, ctx: &WalkContext) -> Diagnostics {
        let Some(provider) = &self.provider else {
            return Diagnostic::error("Provider not available", "cannot destroy without a provider").into();
        };
        let object = {
            let state = ctx.state.lock();
            state.instance(&self.addr).and_then(|record| {
                if self.deposed {
                    record.deposed.clone()
                } else {
                    record.current.clone()
                }
            })
        };
        let Some(object) = object else {
            debug!(address = %self.addr, deposed = self.deposed, "nothing to destroy");
            return Diagnostics::new();
        };

        info!(address = %self.addr, deposed = self.deposed, "destroying");
        let response = provider
            .provider
            .apply_resource_change(ApplyResourceChangeRequest {
                type_name: self.addr.resource.resource.kind.clone(),
                prior_state: Some(object.value),
                planned_state: None,
                config: Value::Null,
            })
            .await;
        if response.diagnostics.has_errors() {
            return response.diagnostics;
        }

        let mut state = ctx.state.lock();
        if self.deposed {
            state.set_deposed(&self.addr, None);
        } else {
            state.set_current(&self.addr, None);
        }
        response.diagnostics
    }
}
