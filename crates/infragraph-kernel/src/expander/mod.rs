//! Instance expander
//!
//! Records how many instances each module call and resource has, and turns
//! unexpanded addresses into concrete instance lists. Registration must
//! happen before any expansion query for the same scope; querying an
//! unregistered scope is a programming error and panics.

use crate::config::{evaluate_count, evaluate_for_each, Config, Evaluator, Expression, ModuleConfig};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::state::EachMode;
use infragraph_addrs::{InstanceAddress, InstanceKey, ModuleInstance, ModulePath, ResourceAddress};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{trace, warn};

/// Repetition recorded for one module call or resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expansion {
    /// Exactly one instance with [`InstanceKey::NoKey`]
    Single,
    /// `count = n`
    Count(usize),
    /// `for_each` over a set of keys
    ForEach(BTreeSet<String>),
}

impl Expansion {
    /// Instance keys, in deterministic order
    #[must_use]
    pub fn keys(&self) -> Vec<InstanceKey> {
        match self {
            Self::Single => vec![InstanceKey::NoKey],
            // count is bounded by memory long before i64::MAX
            #[allow(clippy::cast_possible_wrap)]
            Self::Count(n) => (0..*n).map(|i| InstanceKey::Int(i as i64)).collect(),
            Self::ForEach(keys) => keys.iter().map(|k| InstanceKey::Str(k.clone())).collect(),
        }
    }

    /// Instance-key mode written to state
    #[must_use]
    pub fn each_mode(&self) -> EachMode {
        match self {
            Self::Single => EachMode::Single,
            Self::Count(_) => EachMode::List,
            Self::ForEach(_) => EachMode::Map,
        }
    }
}

/// Evaluate `count` / `for_each` into an [`Expansion`]
///
/// # Errors
/// Both arguments set, or either argument invalid.
pub fn evaluate_expansion(
    evaluator: &dyn Evaluator,
    count: Option<&Expression>,
    for_each: Option<&Expression>,
    module: &ModuleInstance,
) -> Result<Expansion, Diagnostics> {
    if count.is_some() && for_each.is_some() {
        return Err(Diagnostic::error(
            "Invalid combination of \"count\" and \"for_each\"",
            "count and for_each may not be used together",
        )
        .into());
    }
    if let Some(keys) = evaluate_for_each(evaluator, for_each, module)? {
        return Ok(Expansion::ForEach(keys));
    }
    Ok(match evaluate_count(evaluator, count, module)? {
        Some(n) => Expansion::Count(n),
        None => Expansion::Single,
    })
}

/// Registry of module and resource expansions
///
/// Safe for concurrent use: nodes register and query from many tasks.
#[derive(Debug, Default)]
pub struct InstanceExpander {
    modules: RwLock<BTreeMap<(ModuleInstance, String), Expansion>>,
    resources: RwLock<BTreeMap<ResourceAddress, Expansion>>,
}

impl InstanceExpander {
    /// Empty expander
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the expansion of module call `call` inside `parent`
    ///
    /// The first registration wins. Returns `false` if the scope was
    /// already registered.
    pub fn set_module_expansion(&self, parent: &ModuleInstance, call: &str, expansion: Expansion) -> bool {
        let mut modules = self.modules.write();
        let key = (parent.clone(), call.to_string());
        if let Some(existing) = modules.get(&key) {
            if *existing != expansion {
                warn!(module = %parent.child(call, InstanceKey::NoKey), "conflicting module expansion ignored");
            }
            return false;
        }
        trace!(parent = %parent, call, ?expansion, "module expansion registered");
        modules.insert(key, expansion);
        true
    }

    /// Register the expansion of a resource
    ///
    /// The first registration wins. Returns `false` if the scope was
    /// already registered.
    pub fn set_resource_expansion(&self, addr: &ResourceAddress, expansion: Expansion) -> bool {
        let mut resources = self.resources.write();
        if let Some(existing) = resources.get(addr) {
            if *existing != expansion {
                warn!(resource = %addr, "conflicting resource expansion ignored");
            }
            return false;
        }
        trace!(resource = %addr, ?expansion, "resource expansion registered");
        resources.insert(addr.clone(), expansion);
        true
    }

    /// Recorded expansion of a resource, if any
    #[must_use]
    pub fn resource_expansion(&self, addr: &ResourceAddress) -> Option<Expansion> {
        self.resources.read().get(addr).cloned()
    }

    /// All instances of a configuration module path
    ///
    /// # Panics
    /// If any module call along the path has not been registered for a
    /// parent instance reached during expansion.
    #[must_use]
    pub fn expand_module(&self, path: &ModulePath) -> Vec<ModuleInstance> {
        let modules = self.modules.read();
        let mut instances = vec![ModuleInstance::root()];
        for call in path.calls() {
            let mut next = Vec::new();
            for parent in &instances {
                let Some(expansion) = modules.get(&(parent.clone(), call.clone())) else {
                    panic!("expansion of module call {call:?} in {parent:?} queried before registration");
                };
                next.extend(expansion.keys().into_iter().map(|key| parent.child(call, key)));
            }
            instances = next;
        }
        instances
    }

    /// All instance addresses of a resource
    ///
    /// # Panics
    /// If the resource's expansion has not been registered.
    #[must_use]
    pub fn expand_resource(&self, addr: &ResourceAddress) -> Vec<InstanceAddress> {
        let resources = self.resources.read();
        let Some(expansion) = resources.get(addr) else {
            panic!("expansion of resource {addr} queried before registration");
        };
        expansion.keys().into_iter().map(|key| addr.instance(key)).collect()
    }
}

/// Register every module call's expansion, parents before children
///
/// Module calls are evaluated once per parent instance. A call that fails
/// to evaluate is registered with zero instances so nested queries stay
/// well defined, and the failure is reported.
#[must_use]
pub fn register_modules(config: &Config, expander: &InstanceExpander, evaluator: &dyn Evaluator) -> Diagnostics {
    fn walk(
        module: &ModuleConfig,
        instances: &[ModuleInstance],
        expander: &InstanceExpander,
        evaluator: &dyn Evaluator,
        diags: &mut Diagnostics,
    ) {
        for call in &module.module_calls {
            let mut children = Vec::new();
            for parent in instances {
                let expansion =
                    match evaluate_expansion(evaluator, call.count.as_ref(), call.for_each.as_ref(), parent) {
                        Ok(expansion) => expansion,
                        Err(errs) => {
                            let addr = parent.child(&call.name, InstanceKey::NoKey);
                            diags.extend(errs.into_iter().map(|d| d.with_address(&addr)).collect());
                            Expansion::Count(0)
                        }
                    };
                children.extend(expansion.keys().into_iter().map(|k| parent.child(&call.name, k)));
                expander.set_module_expansion(parent, &call.name, expansion);
            }
            walk(&call.module, &children, expander, evaluator, diags);
        }
    }

    let mut diags = Diagnostics::new();
    walk(&config.root, &[ModuleInstance::root()], expander, evaluator, &mut diags);
    diags
}
