//! Instance-level nodes

use super::{AttachState, CreateBeforeDestroy, Evaluable, Referenceable, Referencer};
use crate::context::WalkOperation;
use crate::eval::{ApplyDestroy, ApplyInstance, EvalProcedure, PlanInstance, PlanOrphan};
use crate::node::AbstractResource;
use crate::plan::PlannedChange;
use crate::plugin::ResolvedProvider;
use crate::state::{InstanceRecord, ObjectState};
use infragraph_addrs::{InstanceAddress, Reference};
use std::sync::Arc;

/// One live instance of a configured resource
#[derive(Debug, Clone)]
pub struct ResourceInstance {
    /// Instance address
    pub addr: InstanceAddress,
    /// Shared resource data
    pub resource: Arc<AbstractResource>,
    /// Resolved provider, if available
    pub provider: Option<ResolvedProvider>,
    /// Recorded live object
    pub prior: Option<ObjectState>,
    /// Planned change, during apply
    pub change: Option<PlannedChange>,
    create_before_destroy: bool,
}

impl ResourceInstance {
    /// Create with a create-before-destroy policy
    #[must_use]
    pub fn new(
        addr: InstanceAddress,
        resource: Arc<AbstractResource>,
        provider: Option<ResolvedProvider>,
        create_before_destroy: bool,
    ) -> Self {
        Self {
            addr,
            resource,
            provider,
            prior: None,
            change: None,
            create_before_destroy,
        }
    }

    /// Attach the change apply should make
    #[must_use]
    pub fn with_change(mut self, change: PlannedChange) -> Self {
        self.change = Some(change);
        self
    }
}

impl Referenceable for ResourceInstance {
    fn referenceable_addrs(&self) -> Vec<Reference> {
        let whole = Reference {
            resource: self.addr.resource.resource.clone(),
            key: None,
        };
        if self.addr.key.is_none() {
            vec![whole]
        } else {
            vec![whole.clone().with_key(self.addr.key.clone()), whole]
        }
    }
}

impl Referencer for ResourceInstance {
    fn references(&self) -> Vec<Reference> {
        self.resource
            .config
            .as_ref()
            .map(crate::config::ResourceConfig::all_references)
            .unwrap_or_default()
    }
}

impl CreateBeforeDestroy for ResourceInstance {
    fn create_before_destroy(&self) -> bool {
        self.create_before_destroy
    }

    fn modify_create_before_destroy(&mut self, value: bool) {
        self.create_before_destroy = value;
    }
}

impl Evaluable for ResourceInstance {
    fn eval_procedure(&self, operation: WalkOperation) -> EvalProcedure {
        match (operation, &self.change) {
            (WalkOperation::Plan, _) => EvalProcedure::PlanInstance(PlanInstance {
                addr: self.addr.clone(),
                resource: Arc::clone(&self.resource),
                provider: self.provider.clone(),
                prior: self.prior.clone(),
                create_before_destroy: self.create_before_destroy,
            }),
            (WalkOperation::Apply, Some(change)) => EvalProcedure::ApplyInstance(ApplyInstance {
                addr: self.addr.clone(),
                resource: Arc::clone(&self.resource),
                provider: self.provider.clone(),
                change: change.clone(),
                create_before_destroy: self.create_before_destroy,
            }),
            (WalkOperation::Apply, None) => EvalProcedure::Noop,
        }
    }
}

impl AttachState for ResourceInstance {
    fn state_address(&self) -> &InstanceAddress {
        &self.addr
    }

    fn attach_state(&mut self, record: Option<&InstanceRecord>) {
        self.prior = record.and_then(|r| r.current.clone());
    }
}

/// A recorded object that configuration no longer produces
///
/// Either the live object of an instance outside the instance set, or a
/// deposed object an earlier create-before-destroy replacement failed to
/// destroy. Both plan only a destroy.
#[derive(Debug, Clone)]
pub struct OrphanInstance {
    /// Instance address
    pub addr: InstanceAddress,
    /// Resolved provider
    pub provider: Option<ResolvedProvider>,
    /// Recorded object to destroy
    pub prior: Option<ObjectState>,
    /// Acts on the deposed object
    pub deposed: bool,
}

impl OrphanInstance {
    /// Orphaned live object
    #[must_use]
    pub fn new(addr: InstanceAddress, provider: Option<ResolvedProvider>) -> Self {
        Self {
            addr,
            provider,
            prior: None,
            deposed: false,
        }
    }

    /// Leftover deposed object
    #[must_use]
    pub fn deposed(addr: InstanceAddress, provider: Option<ResolvedProvider>) -> Self {
        Self {
            deposed: true,
            ..Self::new(addr, provider)
        }
    }
}

impl Evaluable for OrphanInstance {
    fn eval_procedure(&self, operation: WalkOperation) -> EvalProcedure {
        match operation {
            WalkOperation::Plan => EvalProcedure::PlanOrphan(PlanOrphan {
                addr: self.addr.clone(),
                provider: self.provider.clone(),
                prior: self.prior.clone(),
                deposed: self.deposed,
            }),
            WalkOperation::Apply => EvalProcedure::Noop,
        }
    }
}

impl AttachState for OrphanInstance {
    fn state_address(&self) -> &InstanceAddress {
        &self.addr
    }

    fn attach_state(&mut self, record: Option<&InstanceRecord>) {
        self.prior = record.and_then(|r| {
            if self.deposed {
                r.deposed.clone()
            } else {
                r.current.clone()
            }
        });
    }
}

/// Destroys one object during apply
#[derive(Debug, Clone)]
pub struct DestroyInstance {
    /// Instance address
    pub addr: InstanceAddress,
    /// Resolved provider, if available
    pub provider: Option<ResolvedProvider>,
    /// Object recorded when the graph was built
    ///
    /// The live object, except for a leftover deposed object's destroy.
    pub prior: Option<ObjectState>,
    /// Destroy the deposed object instead of the live one
    pub deposed: bool,
    /// Change this destroy belongs to
    pub change: PlannedChange,
}

impl DestroyInstance {
    /// Create
    #[must_use]
    pub fn new(change: PlannedChange, provider: Option<ResolvedProvider>, deposed: bool) -> Self {
        Self {
            addr: change.addr.clone(),
            provider,
            prior: None,
            deposed,
            change,
        }
    }
}

impl Evaluable for DestroyInstance {
    fn eval_procedure(&self, operation: WalkOperation) -> EvalProcedure {
        match operation {
            WalkOperation::Apply => EvalProcedure::ApplyDestroy(ApplyDestroy {
                addr: self.addr.clone(),
                provider: self.provider.clone(),
                deposed: self.deposed,
            }),
            WalkOperation::Plan => EvalProcedure::Noop,
        }
    }
}

impl AttachState for DestroyInstance {
    fn state_address(&self) -> &InstanceAddress {
        &self.addr
    }

    fn attach_state(&mut self, record: Option<&InstanceRecord>) {
        self.prior = record.and_then(|r| {
            if self.change.deposed {
                r.deposed.clone()
            } else {
                r.current.clone()
            }
        });
    }
}
