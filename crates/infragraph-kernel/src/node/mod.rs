//! Graph nodes
//!
//! Every vertex is a [`GraphNode`]. Behaviour is split into capability
//! traits; transformers and the walker ask a node for a capability through
//! the `as_*` accessors instead of matching on variants.

mod instance;
mod resource;

pub use instance::{DestroyInstance, OrphanInstance, ResourceInstance};
pub use resource::{AbstractResource, ApplyableResource, ExpandableResource, PlannableResource};

use crate::context::{WalkContext, WalkOperation};
use crate::dag::Graph;
use crate::diagnostics::Diagnostics;
use crate::eval::EvalProcedure;
use crate::state::InstanceRecord;
use infragraph_addrs::{InstanceAddress, Reference, Target};

/// Node that other nodes can depend on by reference
pub trait Referenceable {
    /// References that resolve to this node
    fn referenceable_addrs(&self) -> Vec<Reference>;
}

/// Node whose configuration refers to other nodes
pub trait Referencer {
    /// References made by this node
    fn references(&self) -> Vec<Reference>;
}

/// Node carrying a create-before-destroy policy
pub trait CreateBeforeDestroy {
    /// Effective policy: forced value, else configured flag, else `false`
    fn create_before_destroy(&self) -> bool;

    /// Force the policy
    fn modify_create_before_destroy(&mut self, value: bool);
}

/// Node that builds a subgraph when walked
pub trait DynamicExpand {
    /// Build the subgraph
    ///
    /// # Errors
    /// Diagnostics for expression or structural failures; the node is then
    /// marked failed and nothing is spliced.
    fn dynamic_expand(&self, ctx: &WalkContext) -> Result<Graph, Diagnostics>;
}

/// Node with an evaluation procedure
pub trait Evaluable {
    /// Procedure to run for `operation`
    fn eval_procedure(&self, operation: WalkOperation) -> EvalProcedure;
}

/// Node that receives its prior object from state
pub trait AttachState {
    /// Address whose record is attached
    fn state_address(&self) -> &InstanceAddress;

    /// Take the recorded objects for [`AttachState::state_address`]
    fn attach_state(&mut self, record: Option<&InstanceRecord>);
}

/// Which part of an instance's lifecycle a node handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectRole {
    /// The live object, configured or orphaned
    Current,
    /// Destroy half of a delete or replacement
    Destroy,
    /// Deposed object left by an earlier replacement
    Deposed,
}

/// A vertex of the dependency graph
#[derive(Debug, Clone)]
pub enum GraphNode {
    /// Unexpanded resource; expands over module instances
    ExpandableResource(ExpandableResource),
    /// Resource in one module instance; expands over its instances
    PlannableResource(PlannableResource),
    /// Resource in one module instance during apply
    ApplyableResource(ApplyableResource),
    /// One live instance
    ResourceInstance(ResourceInstance),
    /// Instance in state but no longer in configuration; destroy-only
    OrphanInstance(OrphanInstance),
    /// Destroy half of a delete or replacement during apply
    DestroyInstance(DestroyInstance),
    /// Synthetic single sink
    Root,
}

impl GraphNode {
    /// Human-readable name, unique within a well-formed graph
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::ExpandableResource(n) => format!("{} (expand)", n.resource.addr),
            Self::PlannableResource(n) => n.addr.to_string(),
            Self::ApplyableResource(n) => format!("{} (prepare)", n.addr),
            Self::ResourceInstance(n) => n.addr.to_string(),
            Self::OrphanInstance(n) if n.deposed => format!("{} (deposed)", n.addr),
            Self::OrphanInstance(n) => format!("{} (orphan)", n.addr),
            Self::DestroyInstance(n) if n.change.deposed => format!("{} (destroy leftover deposed)", n.addr),
            Self::DestroyInstance(n) if n.deposed => format!("{} (destroy deposed)", n.addr),
            Self::DestroyInstance(n) => format!("{} (destroy)", n.addr),
            Self::Root => "root".to_string(),
        }
    }

    /// Check if this is the synthetic root
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        matches!(self, Self::Root)
    }

    /// Scope in which references made by or to this node resolve
    ///
    /// Unexpanded nodes use their configuration module path; everything
    /// else uses its module instance.
    #[must_use]
    pub fn reference_scope(&self) -> String {
        match self {
            Self::ExpandableResource(n) => n.resource.addr.module.to_string(),
            Self::PlannableResource(n) => n.addr.module.to_string(),
            Self::ApplyableResource(n) => n.addr.module.to_string(),
            Self::ResourceInstance(n) => n.addr.module().to_string(),
            Self::OrphanInstance(n) => n.addr.module().to_string(),
            Self::DestroyInstance(n) => n.addr.module().to_string(),
            Self::Root => String::new(),
        }
    }

    /// Identity used to detect duplicate instances
    ///
    /// Live and orphan nodes share [`ObjectRole::Current`] so an orphan can
    /// never coincide with a live instance.
    #[must_use]
    pub fn unique_key(&self) -> Option<(InstanceAddress, ObjectRole)> {
        match self {
            Self::ResourceInstance(n) => Some((n.addr.clone(), ObjectRole::Current)),
            Self::OrphanInstance(n) if n.deposed => Some((n.addr.clone(), ObjectRole::Deposed)),
            Self::OrphanInstance(n) => Some((n.addr.clone(), ObjectRole::Current)),
            Self::DestroyInstance(n) if n.change.deposed => Some((n.addr.clone(), ObjectRole::Deposed)),
            Self::DestroyInstance(n) => Some((n.addr.clone(), ObjectRole::Destroy)),
            _ => None,
        }
    }

    /// Check if any of `targets` selects this node
    #[must_use]
    pub fn is_targeted(&self, targets: &[Target]) -> bool {
        match self {
            Self::ExpandableResource(n) => targets.iter().any(|t| t.matches_config_resource(&n.resource.addr)),
            Self::PlannableResource(n) => targets.iter().any(|t| t.matches_resource(&n.addr)),
            Self::ApplyableResource(n) => targets.iter().any(|t| t.matches_resource(&n.addr)),
            Self::ResourceInstance(n) => targets.iter().any(|t| t.matches_instance(&n.addr)),
            Self::OrphanInstance(n) => targets.iter().any(|t| t.matches_instance(&n.addr)),
            Self::DestroyInstance(n) => targets.iter().any(|t| t.matches_instance(&n.addr)),
            Self::Root => true,
        }
    }

    /// Referenceable capability
    #[must_use]
    pub fn as_referenceable(&self) -> Option<&dyn Referenceable> {
        match self {
            Self::ExpandableResource(n) => Some(n),
            Self::PlannableResource(n) => Some(n),
            Self::ApplyableResource(n) => Some(n),
            Self::ResourceInstance(n) => Some(n),
            _ => None,
        }
    }

    /// Referencer capability
    #[must_use]
    pub fn as_referencer(&self) -> Option<&dyn Referencer> {
        match self {
            Self::ExpandableResource(n) => Some(n),
            Self::PlannableResource(n) => Some(n),
            Self::ApplyableResource(n) => Some(n),
            Self::ResourceInstance(n) => Some(n),
            _ => None,
        }
    }

    /// Create-before-destroy capability
    #[must_use]
    pub fn as_create_before_destroy(&self) -> Option<&dyn CreateBeforeDestroy> {
        match self {
            Self::ExpandableResource(n) => Some(n),
            Self::PlannableResource(n) => Some(n),
            Self::ResourceInstance(n) => Some(n),
            _ => None,
        }
    }

    /// Mutable create-before-destroy capability
    pub fn as_create_before_destroy_mut(&mut self) -> Option<&mut dyn CreateBeforeDestroy> {
        match self {
            Self::ExpandableResource(n) => Some(n),
            Self::PlannableResource(n) => Some(n),
            Self::ResourceInstance(n) => Some(n),
            _ => None,
        }
    }

    /// Dynamic-expansion capability
    #[must_use]
    pub fn as_dynamic_expand(&self) -> Option<&dyn DynamicExpand> {
        match self {
            Self::ExpandableResource(n) => Some(n),
            Self::PlannableResource(n) => Some(n),
            _ => None,
        }
    }

    /// Evaluation capability
    #[must_use]
    pub fn as_evaluable(&self) -> Option<&dyn Evaluable> {
        match self {
            Self::PlannableResource(n) => Some(n),
            Self::ApplyableResource(n) => Some(n),
            Self::ResourceInstance(n) => Some(n),
            Self::OrphanInstance(n) => Some(n),
            Self::DestroyInstance(n) => Some(n),
            _ => None,
        }
    }

    /// State-attachment capability
    pub fn as_attach_state_mut(&mut self) -> Option<&mut dyn AttachState> {
        match self {
            Self::ResourceInstance(n) => Some(n),
            Self::OrphanInstance(n) => Some(n),
            Self::DestroyInstance(n) => Some(n),
            _ => None,
        }
    }
}
