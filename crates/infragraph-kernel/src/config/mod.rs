//! Configuration tree
//!
//! The engine consumes an already-decoded configuration: a tree of modules,
//! each holding resources and calls to child modules. Files are TOML or
//! JSON; the format is picked by extension.

mod expr;

pub use expr::{evaluate_count, evaluate_for_each, Evaluator, ExprValue, Expression, LiteralEvaluator};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::ConfigError;
use infragraph_addrs::{ConfigResource, ModulePath, ProviderAddr, Reference, Resource, Target};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Root of the configuration tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Config {
    /// Root module
    pub root: ModuleConfig,
}

impl Config {
    /// Load from a `.toml` or `.json` file
    ///
    /// # Errors
    /// I/O failures, decode failures and unknown extensions.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&text),
            Some("json") => Ok(serde_json::from_str(&text)?),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// Decode TOML text
    ///
    /// # Errors
    /// Returns [`ConfigError::Toml`] on syntax or shape errors.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Module at a configuration path
    #[must_use]
    pub fn module(&self, path: &ModulePath) -> Option<&ModuleConfig> {
        let mut current = &self.root;
        for call in path.calls() {
            current = &current.module_call(call)?.module;
        }
        Some(current)
    }

    /// Configuration of one resource
    #[must_use]
    pub fn resource(&self, addr: &ConfigResource) -> Option<&ResourceConfig> {
        self.module(&addr.module)?.resource(&addr.resource)
    }

    /// Every resource in the tree, depth first, root module first
    #[must_use]
    pub fn resources(&self) -> Vec<(ModulePath, &ResourceConfig)> {
        fn walk<'a>(path: ModulePath, module: &'a ModuleConfig, out: &mut Vec<(ModulePath, &'a ResourceConfig)>) {
            out.extend(module.resources.iter().map(|r| (path.clone(), r)));
            for call in &module.module_calls {
                walk(path.child(&call.name), &call.module, out);
            }
        }

        let mut out = Vec::new();
        walk(ModulePath::root(), &self.root, &mut out);
        out
    }

    /// Static checks that need no evaluation
    #[must_use]
    pub fn validate(&self) -> Diagnostics {
        fn walk(path: &ModulePath, module: &ModuleConfig, diags: &mut Diagnostics) {
            let mut seen = BTreeSet::new();
            for r in &module.resources {
                let addr = r.addr().in_module(path.clone());
                if !seen.insert(r.addr()) {
                    diags.push(
                        Diagnostic::error("Duplicate resource", "a resource with this name is already declared")
                            .with_address(&addr),
                    );
                }
                if r.count.is_some() && r.for_each.is_some() {
                    diags.push(
                        Diagnostic::error(
                            "Invalid combination of \"count\" and \"for_each\"",
                            "count and for_each may not be used together",
                        )
                        .with_address(&addr),
                    );
                }
            }

            let mut calls = BTreeSet::new();
            for call in &module.module_calls {
                let child = path.child(&call.name);
                if !calls.insert(call.name.as_str()) {
                    diags.push(
                        Diagnostic::error("Duplicate module call", "a module with this name is already declared")
                            .with_address(&child),
                    );
                }
                if call.count.is_some() && call.for_each.is_some() {
                    diags.push(
                        Diagnostic::error(
                            "Invalid combination of \"count\" and \"for_each\"",
                            "count and for_each may not be used together",
                        )
                        .with_address(&child),
                    );
                }
                walk(&child, &call.module, diags);
            }
        }

        let mut diags = Diagnostics::new();
        walk(&ModulePath::root(), &self.root, &mut diags);
        diags
    }
}

/// One module's contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Resources declared in this module
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
    /// Child module calls
    #[serde(default, rename = "modules")]
    pub module_calls: Vec<ModuleCall>,
}

impl ModuleConfig {
    /// Look up a resource by kind and name
    #[must_use]
    pub fn resource(&self, addr: &Resource) -> Option<&ResourceConfig> {
        self.resources.iter().find(|r| r.kind == addr.kind && r.name == addr.name)
    }

    /// Look up a module call by name
    #[must_use]
    pub fn module_call(&self, name: &str) -> Option<&ModuleCall> {
        self.module_calls.iter().find(|c| c.name == name)
    }
}

/// A call to a child module
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleCall {
    /// Call name
    pub name: String,
    /// Optional count
    #[serde(default)]
    pub count: Option<Expression>,
    /// Optional for-each
    #[serde(default)]
    pub for_each: Option<Expression>,
    /// Body of the called module
    #[serde(default)]
    pub module: ModuleConfig,
}

/// Lifecycle options of a resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifecycle {
    /// Create the replacement before destroying the old object
    #[serde(default)]
    pub create_before_destroy: bool,
}

/// A provisioner attached to a resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvisionerConfig {
    /// Provisioner type, e.g. `local-exec`
    #[serde(rename = "type")]
    pub kind: String,
    /// Provisioner-specific configuration
    #[serde(default)]
    pub config: Value,
    /// Connection settings
    #[serde(default)]
    pub connection: BTreeMap<String, String>,
}

/// One configured resource block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Resource type
    #[serde(rename = "type")]
    pub kind: String,
    /// Resource name
    pub name: String,
    /// Provider; implied from the type prefix when absent
    #[serde(default)]
    pub provider: Option<ProviderAddr>,
    /// Optional count
    #[serde(default)]
    pub count: Option<Expression>,
    /// Optional for-each
    #[serde(default)]
    pub for_each: Option<Expression>,
    /// Lifecycle options
    #[serde(default)]
    pub lifecycle: Lifecycle,
    /// Attribute values sent to the provider
    #[serde(default)]
    pub body: Value,
    /// References made by the body
    #[serde(default)]
    pub references: Vec<Reference>,
    /// Explicit dependencies
    #[serde(default)]
    pub depends_on: Vec<Reference>,
    /// Provisioners run after creation, in order
    #[serde(default)]
    pub provisioners: Vec<ProvisionerConfig>,
}

impl ResourceConfig {
    /// Minimal resource block
    #[must_use]
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Module-relative address
    #[must_use]
    pub fn addr(&self) -> Resource {
        Resource::new(&self.kind, &self.name)
    }

    /// Provider responsible for this resource
    ///
    /// Without an explicit provider, the type prefix before the first `_`
    /// names a legacy provider.
    #[must_use]
    pub fn provider_addr(&self) -> ProviderAddr {
        self.provider
            .clone()
            .unwrap_or_else(|| implied_provider(&self.kind))
    }

    /// Configured create-before-destroy flag
    #[inline]
    #[must_use]
    pub fn create_before_destroy(&self) -> bool {
        self.lifecycle.create_before_destroy
    }

    /// References made by `count` and `for_each`
    #[must_use]
    pub fn expansion_references(&self) -> Vec<Reference> {
        self.count
            .iter()
            .chain(self.for_each.iter())
            .flat_map(|e| e.references.iter().cloned())
            .collect()
    }

    /// Every reference: expansion, body and explicit dependencies
    #[must_use]
    pub fn all_references(&self) -> Vec<Reference> {
        let mut refs = self.expansion_references();
        refs.extend(self.references.iter().cloned());
        refs.extend(self.depends_on.iter().cloned());
        refs
    }

    /// Resources this one depends on, resolved in `module`
    #[must_use]
    pub fn dependencies(&self, module: &ModulePath) -> Vec<ConfigResource> {
        let own = self.addr();
        let deps: BTreeSet<ConfigResource> = self
            .all_references()
            .into_iter()
            .filter(|r| r.resource != own)
            .map(|r| r.resource.in_module(module.clone()))
            .collect();
        deps.into_iter().collect()
    }

    /// Body as an object, treating an absent body as empty
    #[must_use]
    pub fn body(&self) -> Value {
        match &self.body {
            Value::Null => Value::Object(serde_json::Map::new()),
            other => other.clone(),
        }
    }
}

/// Legacy provider implied by a resource type name
#[must_use]
pub fn implied_provider(kind: &str) -> ProviderAddr {
    let prefix = kind.split('_').next().unwrap_or(kind);
    ProviderAddr::legacy(prefix)
}

/// Walk settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkerConfig {
    /// Maximum number of nodes evaluated at once
    pub parallelism: usize,
    /// Restrict the walk to these addresses and their dependencies
    #[serde(default)]
    pub targets: Vec<Target>,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            parallelism: 10,
            targets: Vec::new(),
        }
    }
}

impl WalkerConfig {
    /// Override parallelism; zero is raised to one
    #[must_use]
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Add a target
    #[must_use]
    pub fn with_target(mut self, target: Target) -> Self {
        self.targets.push(target);
        self
    }
}
