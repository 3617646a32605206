//! Resource-level nodes

use super::{
    CreateBeforeDestroy, DynamicExpand, Evaluable, GraphNode, OrphanInstance, Referenceable, Referencer,
    ResourceInstance,
};
use crate::config::{evaluate_count, implied_provider, ResourceConfig};
use crate::context::{WalkContext, WalkOperation};
use crate::dag::Graph;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::eval::{scoped, EvalProcedure, WriteResourceState};
use crate::state::State;
use crate::transform::{
    AttachStateTransformer, BasicGraphBuilder, DeposedObjectTransformer, GraphTransformer,
    OrphanResourceCountTransformer, ReferenceTransformer, ResourceCountTransformer, RootTransformer,
    TargetsTransformer,
};
use infragraph_addrs::{ConfigResource, InstanceAddress, ProviderAddr, Reference, ResourceAddress, Target};
use std::sync::Arc;
use tracing::{debug, warn};

/// Data shared by every node derived from one configured resource
#[derive(Debug)]
pub struct AbstractResource {
    /// Unexpanded address
    pub addr: ConfigResource,
    /// Configuration; `None` for resources only found in state
    pub config: Option<ResourceConfig>,
}

impl AbstractResource {
    /// Shared handle
    #[must_use]
    pub fn new(addr: ConfigResource, config: Option<ResourceConfig>) -> Arc<Self> {
        Arc::new(Self { addr, config })
    }

    /// Configured create-before-destroy flag; `false` without configuration
    #[must_use]
    pub fn configured_create_before_destroy(&self) -> bool {
        self.config.as_ref().is_some_and(ResourceConfig::create_before_destroy)
    }

    /// Provider from configuration, else as recorded, else implied by type
    #[must_use]
    pub fn provider_addr(&self, recorded: Option<ProviderAddr>) -> ProviderAddr {
        match &self.config {
            Some(config) => config.provider_addr(),
            None => recorded.unwrap_or_else(|| implied_provider(&self.addr.resource.kind)),
        }
    }

    fn self_reference(&self) -> Reference {
        Reference {
            resource: self.addr.resource.clone(),
            key: None,
        }
    }

    fn all_references(&self) -> Vec<Reference> {
        self.config.as_ref().map(ResourceConfig::all_references).unwrap_or_default()
    }

    fn expansion_references(&self) -> Vec<Reference> {
        self.config
            .as_ref()
            .map(ResourceConfig::expansion_references)
            .unwrap_or_default()
    }
}

/// Targets naming part of a resource
///
/// Empty when the resource is only walked as a dependency of a target, in
/// which case it expands in full.
fn own_targets(targets: &[Target], matches: impl Fn(&Target) -> bool) -> Vec<Target> {
    targets.iter().filter(|t| matches(t)).cloned().collect()
}

/// A configured resource before module expansion
#[derive(Debug, Clone)]
pub struct ExpandableResource {
    /// Shared resource data
    pub resource: Arc<AbstractResource>,
    force_create_before_destroy: Option<bool>,
}

impl ExpandableResource {
    /// Wrap a resource
    #[must_use]
    pub fn new(resource: Arc<AbstractResource>) -> Self {
        Self {
            resource,
            force_create_before_destroy: None,
        }
    }
}

impl Referenceable for ExpandableResource {
    fn referenceable_addrs(&self) -> Vec<Reference> {
        vec![self.resource.self_reference()]
    }
}

impl Referencer for ExpandableResource {
    fn references(&self) -> Vec<Reference> {
        self.resource.all_references()
    }
}

impl CreateBeforeDestroy for ExpandableResource {
    fn create_before_destroy(&self) -> bool {
        self.force_create_before_destroy
            .unwrap_or_else(|| self.resource.configured_create_before_destroy())
    }

    fn modify_create_before_destroy(&mut self, value: bool) {
        self.force_create_before_destroy = Some(value);
    }
}

impl DynamicExpand for ExpandableResource {
    fn dynamic_expand(&self, ctx: &WalkContext) -> Result<Graph, Diagnostics> {
        let modules = ctx.expander.expand_module(&self.resource.addr.module);
        debug!(resource = %self.resource.addr, modules = modules.len(), "expanding over module instances");

        let mut graph = Graph::new();
        for module in modules {
            graph.add(GraphNode::PlannableResource(PlannableResource::new(
                Arc::clone(&self.resource),
                self.resource.addr.resource.absolute(module),
                self.force_create_before_destroy,
            )));
        }

        let targets = own_targets(&ctx.targets, |t| t.matches_config_resource(&self.resource.addr));
        let steps: Vec<Box<dyn GraphTransformer + '_>> = vec![
            Box::new(TargetsTransformer::new(&targets)),
            Box::new(RootTransformer),
        ];
        BasicGraphBuilder::new("ExpandableResource", steps)
            .build_from(graph)
            .map_err(|err| Diagnostic::from(&err).with_address(&self.resource.addr).into())
    }
}

/// A resource in one module instance, before instance expansion
#[derive(Debug, Clone)]
pub struct PlannableResource {
    /// Shared resource data
    pub resource: Arc<AbstractResource>,
    /// Address in its module instance
    pub addr: ResourceAddress,
    force_create_before_destroy: Option<bool>,
}

impl PlannableResource {
    /// Create, inheriting a forced create-before-destroy policy
    #[must_use]
    pub fn new(resource: Arc<AbstractResource>, addr: ResourceAddress, force_create_before_destroy: Option<bool>) -> Self {
        Self {
            resource,
            addr,
            force_create_before_destroy,
        }
    }

    fn instance_addresses(&self, ctx: &WalkContext, state: &mut State) -> Result<Vec<InstanceAddress>, Diagnostics> {
        let Some(config) = &self.resource.config else {
            return Ok(Vec::new());
        };
        let count = evaluate_count(ctx.evaluator.as_ref(), config.count.as_ref(), &self.addr.module)
            .map_err(|diags| scoped(diags, &self.addr))?;
        state.fix_count_set_transition(&self.addr, count.is_some());
        Ok(ctx.expander.expand_resource(&self.addr))
    }
}

impl Referenceable for PlannableResource {
    fn referenceable_addrs(&self) -> Vec<Reference> {
        vec![self.resource.self_reference()]
    }
}

impl Referencer for PlannableResource {
    fn references(&self) -> Vec<Reference> {
        self.resource.all_references()
    }
}

impl CreateBeforeDestroy for PlannableResource {
    fn create_before_destroy(&self) -> bool {
        self.force_create_before_destroy
            .unwrap_or_else(|| self.resource.configured_create_before_destroy())
    }

    fn modify_create_before_destroy(&mut self, value: bool) {
        self.force_create_before_destroy = Some(value);
    }
}

impl Evaluable for PlannableResource {
    fn eval_procedure(&self, _operation: WalkOperation) -> EvalProcedure {
        if self.resource.config.is_none() {
            return EvalProcedure::Noop;
        }
        EvalProcedure::WriteResourceState(WriteResourceState::new(Arc::clone(&self.resource), self.addr.clone()))
    }
}

impl DynamicExpand for PlannableResource {
    fn dynamic_expand(&self, ctx: &WalkContext) -> Result<Graph, Diagnostics> {
        // One guard covers the count rename and every read of the records
        // the subgraph is built from.
        let mut state = ctx.state.lock();
        let instances = self.instance_addresses(ctx, &mut state)?;
        if self.resource.config.is_none() {
            warn!(resource = %self.addr, "resource has no configuration; all recorded instances are orphans");
        }

        let recorded = state.resource(&self.addr).and_then(|rs| rs.provider.clone());
        let provider = ctx
            .schemas
            .resolve(&self.resource.provider_addr(recorded))
            .map_err(|d| Diagnostics::from(d.with_address(&self.addr)))?;

        let create_before_destroy = self.create_before_destroy();
        let live = |addr: InstanceAddress| {
            GraphNode::ResourceInstance(ResourceInstance::new(
                addr,
                Arc::clone(&self.resource),
                Some(provider.clone()),
                create_before_destroy,
            ))
        };
        let orphan = |addr: InstanceAddress| GraphNode::OrphanInstance(OrphanInstance::new(addr, Some(provider.clone())));
        let deposed =
            |addr: InstanceAddress| GraphNode::OrphanInstance(OrphanInstance::deposed(addr, Some(provider.clone())));

        let targets = own_targets(&ctx.targets, |t| t.matches_resource(&self.addr));
        let steps: Vec<Box<dyn GraphTransformer + '_>> = vec![
            Box::new(ResourceCountTransformer::new(&instances, &live)),
            Box::new(OrphanResourceCountTransformer::new(&self.addr, &instances, &state, &orphan)),
            Box::new(DeposedObjectTransformer::new(&self.addr, &state, &deposed)),
            Box::new(AttachStateTransformer::new(&state)),
            Box::new(TargetsTransformer::new(&targets)),
            Box::new(ReferenceTransformer),
            Box::new(RootTransformer),
        ];
        let graph: Result<Graph, Diagnostics> = BasicGraphBuilder::new("PlannableResource", steps)
            .build()
            .map_err(|err| Diagnostic::from(&err).with_address(&self.addr).into());
        drop(state);
        graph
    }
}

/// A resource in one module instance during apply
#[derive(Debug, Clone)]
pub struct ApplyableResource {
    /// Shared resource data
    pub resource: Arc<AbstractResource>,
    /// Address in its module instance
    pub addr: ResourceAddress,
}

impl ApplyableResource {
    /// Create
    #[must_use]
    pub fn new(resource: Arc<AbstractResource>, addr: ResourceAddress) -> Self {
        Self { resource, addr }
    }
}

impl Referenceable for ApplyableResource {
    fn referenceable_addrs(&self) -> Vec<Reference> {
        vec![self.resource.self_reference()]
    }
}

impl Referencer for ApplyableResource {
    fn references(&self) -> Vec<Reference> {
        self.resource.expansion_references()
    }
}

impl Evaluable for ApplyableResource {
    fn eval_procedure(&self, _operation: WalkOperation) -> EvalProcedure {
        if self.resource.config.is_none() {
            return EvalProcedure::Noop;
        }
        EvalProcedure::WriteResourceState(WriteResourceState::new(Arc::clone(&self.resource), self.addr.clone()))
    }
}
