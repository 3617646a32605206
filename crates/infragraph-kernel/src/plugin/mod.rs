//! Provider and provisioner plugin interfaces
//!
//! The engine talks to plugins only through these traits. Values cross the
//! boundary as JSON. Transport (RPC, process management) is not part of
//! the engine; hosts hand in ready [`Provider`] and [`Provisioner`] objects
//! through a [`PluginRegistry`].

mod echo;
mod schema;

pub use echo::EchoProvider;
pub use schema::{AttributeSchema, ProviderSchema, Schema};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::PluginError;
use async_trait::async_trait;
use infragraph_addrs::ProviderAddr;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Request to plan one resource change
#[derive(Debug, Clone, PartialEq)]
pub struct PlanResourceChangeRequest {
    /// Resource type
    pub type_name: String,
    /// Recorded object, `None` when creating
    pub prior_state: Option<Value>,
    /// Desired object derived from configuration
    pub proposed_new_state: Value,
    /// Raw configuration
    pub config: Value,
}

/// Provider's answer to a plan request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanResourceChangeResponse {
    /// Object the provider expects to exist after apply
    pub planned_state: Value,
    /// Attributes whose change forces replacement
    pub requires_replace: Vec<String>,
    /// Problems found while planning
    pub diagnostics: Diagnostics,
}

/// Request to apply one resource change
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyResourceChangeRequest {
    /// Resource type
    pub type_name: String,
    /// Recorded object, `None` when creating
    pub prior_state: Option<Value>,
    /// Planned object, `None` when destroying
    pub planned_state: Option<Value>,
    /// Raw configuration
    pub config: Value,
}

/// Provider's answer to an apply request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyResourceChangeResponse {
    /// Resulting object, `None` once destroyed
    pub new_state: Option<Value>,
    /// Problems found while applying
    pub diagnostics: Diagnostics,
}

/// A resource provider
#[async_trait]
pub trait Provider: Send + Sync {
    /// Schemas of every resource type this provider manages
    async fn get_schema(&self) -> Result<ProviderSchema, PluginError>;

    /// Provider-side validation of a resource body
    async fn validate_resource_config(&self, type_name: &str, config: &Value) -> Diagnostics;

    /// Compute the planned new state
    async fn plan_resource_change(&self, request: PlanResourceChangeRequest) -> PlanResourceChangeResponse;

    /// Make the planned change real
    async fn apply_resource_change(&self, request: ApplyResourceChangeRequest) -> ApplyResourceChangeResponse;

    /// Stop in-flight operations
    async fn stop(&self) -> Result<(), PluginError>;
}

/// Receives provisioner output as it is produced
pub trait ProvisionerOutput: Send + Sync {
    /// One line of output
    fn output(&self, line: &str);
}

/// Request to run a provisioner against a newly created object
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionResourceRequest {
    /// Provisioner configuration
    pub config: Value,
    /// Connection settings
    pub connection: BTreeMap<String, String>,
}

/// A provisioner
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Configuration schema
    async fn get_schema(&self) -> Result<Schema, PluginError>;

    /// Provisioner-side validation
    async fn validate_provisioner_config(&self, config: &Value) -> Diagnostics;

    /// Run the provisioner, streaming output to `output`
    async fn provision_resource(
        &self,
        request: ProvisionResourceRequest,
        output: &dyn ProvisionerOutput,
    ) -> Diagnostics;

    /// Stop a running provisioner
    async fn stop(&self) -> Result<(), PluginError>;
}

/// Forwards provisioner output to the log
#[derive(Debug, Clone)]
pub struct LogOutput {
    address: String,
    provisioner: String,
}

impl LogOutput {
    /// Output sink for one provisioner run
    #[must_use]
    pub fn new(address: impl Into<String>, provisioner: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            provisioner: provisioner.into(),
        }
    }
}

impl ProvisionerOutput for LogOutput {
    fn output(&self, line: &str) {
        info!(address = %self.address, provisioner = %self.provisioner, "{line}");
    }
}

/// A provider together with its loaded schema
#[derive(Clone)]
pub struct ResolvedProvider {
    /// Provider identity
    pub addr: ProviderAddr,
    /// Provider handle
    pub provider: Arc<dyn Provider>,
    /// Loaded schema
    pub schema: Arc<ProviderSchema>,
}

impl ResolvedProvider {
    /// Schema of one resource type
    #[must_use]
    pub fn resource_schema(&self, type_name: &str) -> Option<&Schema> {
        self.schema.resource_types.get(type_name)
    }
}

impl fmt::Debug for ResolvedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedProvider")
            .field("addr", &self.addr)
            .finish_non_exhaustive()
    }
}

/// Providers and provisioners available to a walk
#[derive(Default)]
pub struct PluginRegistry {
    providers: HashMap<ProviderAddr, Arc<dyn Provider>>,
    provisioners: HashMap<String, Arc<dyn Provisioner>>,
    fallback: Option<Arc<dyn Provider>>,
}

impl PluginRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider
    #[must_use]
    pub fn with_provider(mut self, addr: ProviderAddr, provider: Arc<dyn Provider>) -> Self {
        self.providers.insert(addr, provider);
        self
    }

    /// Register a provisioner by type name
    #[must_use]
    pub fn with_provisioner(mut self, kind: impl Into<String>, provisioner: Arc<dyn Provisioner>) -> Self {
        self.provisioners.insert(kind.into(), provisioner);
        self
    }

    /// Provider used for any address without an explicit registration
    #[must_use]
    pub fn with_fallback(mut self, provider: Arc<dyn Provider>) -> Self {
        self.fallback = Some(provider);
        self
    }

    /// Look up a provider
    #[must_use]
    pub fn provider(&self, addr: &ProviderAddr) -> Option<Arc<dyn Provider>> {
        self.providers.get(addr).or(self.fallback.as_ref()).cloned()
    }

    /// Look up a provisioner
    #[must_use]
    pub fn provisioner(&self, kind: &str) -> Option<Arc<dyn Provisioner>> {
        self.provisioners.get(kind).cloned()
    }

    /// Fetch schemas for `addrs`
    ///
    /// Unknown providers and schema failures are reported and left out.
    pub async fn load_schemas<'a, I>(&self, addrs: I) -> (Schemas, Diagnostics)
    where
        I: IntoIterator<Item = &'a ProviderAddr>,
    {
        let mut schemas = Schemas::default();
        let mut diags = Diagnostics::new();
        for addr in addrs {
            if schemas.entries.contains_key(addr) {
                continue;
            }
            let Some(provider) = self.provider(addr) else {
                continue;
            };
            match provider.get_schema().await {
                Ok(schema) => {
                    schemas.entries.insert(
                        addr.clone(),
                        ResolvedProvider {
                            addr: addr.clone(),
                            provider,
                            schema: Arc::new(schema),
                        },
                    );
                }
                Err(err) => {
                    warn!(provider = %addr, error = %err, "failed to load provider schema");
                    diags.push(
                        Diagnostic::error("Failed to load provider schema", err.to_string()).with_address(addr),
                    );
                }
            }
        }
        (schemas, diags)
    }

    /// Stop every registered plugin
    pub async fn stop_all(&self) -> Diagnostics {
        let mut diags = Diagnostics::new();
        for (addr, provider) in &self.providers {
            if let Err(err) = provider.stop().await {
                diags.push(Diagnostic::warning("Failed to stop provider", err.to_string()).with_address(addr));
            }
        }
        for (kind, provisioner) in &self.provisioners {
            if let Err(err) = provisioner.stop().await {
                diags.push(Diagnostic::warning("Failed to stop provisioner", err.to_string()).with_address(kind));
            }
        }
        diags
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .field("provisioners", &self.provisioners.keys().collect::<Vec<_>>())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

/// Providers resolved with their schemas for one walk
#[derive(Debug, Clone, Default)]
pub struct Schemas {
    entries: HashMap<ProviderAddr, ResolvedProvider>,
}

impl Schemas {
    /// Resolve a provider
    ///
    /// # Errors
    /// An error diagnostic when the provider is unavailable.
    pub fn resolve(&self, addr: &ProviderAddr) -> Result<ResolvedProvider, Diagnostic> {
        self.entries.get(addr).cloned().ok_or_else(|| {
            Diagnostic::error(
                "Provider not available",
                format!("provider {addr} is not registered or failed to load its schema"),
            )
        })
    }
}
