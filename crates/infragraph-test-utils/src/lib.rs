//! Testing utilities for the infragraph workspace
//!
//! Recording mock plugins, plus fixture helpers for configuration and state.

#![allow(missing_docs)]

use async_trait::async_trait;
use infragraph_addrs::{ConfigResource, InstanceAddress};
use infragraph_kernel::config::Config;
use infragraph_kernel::diagnostics::{Diagnostic, Diagnostics};
use infragraph_kernel::plugin::{
    ApplyResourceChangeRequest, ApplyResourceChangeResponse, AttributeSchema, PlanResourceChangeRequest,
    PlanResourceChangeResponse, PluginRegistry, ProvisionResourceRequest, Provider, ProviderSchema, Provisioner,
    ProvisionerOutput, Schema,
};
use infragraph_kernel::state::{ObjectState, ObjectStatus, State};
use infragraph_kernel::{Context, PluginError};
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

type PlanMatcher = Box<dyn Fn(&PlanResourceChangeRequest) -> bool + Send + Sync>;
type ApplyMatcher = Box<dyn Fn(&ApplyResourceChangeRequest) -> bool + Send + Sync>;

/// Provider that records every request and fails on demand
///
/// Plans echo the configuration, carrying `id` over from the prior object.
/// Creates assign `mock-<n>` ids.
#[derive(Default)]
pub struct MockProvider {
    schema: ProviderSchema,
    fail_plan: Option<PlanMatcher>,
    fail_apply: Option<ApplyMatcher>,
    apply_delay: Option<Duration>,
    plan_requests: Mutex<Vec<PlanResourceChangeRequest>>,
    apply_requests: Mutex<Vec<ApplyResourceChangeRequest>>,
    next_id: AtomicU64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    stopped: AtomicBool,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept each of `types` with an open schema
    pub fn accepting<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        types
            .into_iter()
            .fold(Self::new(), |p, t| p.with_resource_type(t, Schema::open()))
    }

    pub fn with_resource_type(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.schema = self.schema.with_resource_type(name, schema);
        self
    }

    /// Fail plan requests matching `matcher`
    pub fn fail_plan_when<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&PlanResourceChangeRequest) -> bool + Send + Sync + 'static,
    {
        self.fail_plan = Some(Box::new(matcher));
        self
    }

    /// Fail apply requests (including destroys) matching `matcher`
    pub fn fail_apply_when<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&ApplyResourceChangeRequest) -> bool + Send + Sync + 'static,
    {
        self.fail_apply = Some(Box::new(matcher));
        self
    }

    /// Sleep this long inside every apply
    pub fn with_apply_delay(mut self, delay: Duration) -> Self {
        self.apply_delay = Some(delay);
        self
    }

    pub fn plan_requests(&self) -> Vec<PlanResourceChangeRequest> {
        self.plan_requests.lock().clone()
    }

    pub fn apply_requests(&self) -> Vec<ApplyResourceChangeRequest> {
        self.apply_requests.lock().clone()
    }

    /// Applies that created or updated an object
    pub fn applied(&self) -> Vec<ApplyResourceChangeRequest> {
        self.apply_requests()
            .into_iter()
            .filter(|r| r.planned_state.is_some())
            .collect()
    }

    /// Applies that destroyed an object
    pub fn destroyed(&self) -> Vec<ApplyResourceChangeRequest> {
        self.apply_requests()
            .into_iter()
            .filter(|r| r.planned_state.is_none())
            .collect()
    }

    /// Highest number of applies observed running at once
    pub fn max_concurrent_applies(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn was_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockProvider")
            .field("schema", &self.schema)
            .field("apply_delay", &self.apply_delay)
            .finish_non_exhaustive()
    }
}

fn carry_id(prior: Option<&Value>, mut planned: Value) -> Value {
    if let (Some(id), Some(obj)) = (prior.and_then(|p| p.get("id")), planned.as_object_mut()) {
        obj.entry("id").or_insert_with(|| id.clone());
    }
    planned
}

#[async_trait]
impl Provider for MockProvider {
    async fn get_schema(&self) -> Result<ProviderSchema, PluginError> {
        Ok(self.schema.clone())
    }

    async fn validate_resource_config(&self, type_name: &str, _config: &Value) -> Diagnostics {
        if self.schema.resource_types.contains_key(type_name) {
            Diagnostics::new()
        } else {
            Diagnostic::error("Unsupported resource type", type_name).into()
        }
    }

    async fn plan_resource_change(&self, request: PlanResourceChangeRequest) -> PlanResourceChangeResponse {
        self.plan_requests.lock().push(request.clone());
        if self.fail_plan.as_ref().is_some_and(|m| m(&request)) {
            return PlanResourceChangeResponse {
                diagnostics: Diagnostic::error("Mock plan failure", "injected").into(),
                ..PlanResourceChangeResponse::default()
            };
        }
        PlanResourceChangeResponse {
            planned_state: carry_id(request.prior_state.as_ref(), request.proposed_new_state),
            requires_replace: Vec::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    async fn apply_resource_change(&self, request: ApplyResourceChangeRequest) -> ApplyResourceChangeResponse {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.apply_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.apply_requests.lock().push(request.clone());
        if self.fail_apply.as_ref().is_some_and(|m| m(&request)) {
            return ApplyResourceChangeResponse {
                new_state: None,
                diagnostics: Diagnostic::error("Mock apply failure", "injected").into(),
            };
        }
        let Some(planned) = request.planned_state else {
            return ApplyResourceChangeResponse::default();
        };
        let mut new_state = carry_id(request.prior_state.as_ref(), planned);
        if let Some(obj) = new_state.as_object_mut() {
            if !obj.contains_key("id") {
                let n = self.next_id.fetch_add(1, Ordering::SeqCst);
                obj.insert("id".into(), Value::String(format!("mock-{n}")));
            }
        }
        ApplyResourceChangeResponse {
            new_state: Some(new_state),
            diagnostics: Diagnostics::new(),
        }
    }

    async fn stop(&self) -> Result<(), PluginError> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Provisioner that records its runs and optionally fails
#[derive(Debug, Default)]
pub struct MockProvisioner {
    fail: bool,
    requests: Mutex<Vec<ProvisionResourceRequest>>,
}

impl MockProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<ProvisionResourceRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Provisioner for MockProvisioner {
    async fn get_schema(&self) -> Result<Schema, PluginError> {
        Ok(Schema::open())
    }

    async fn validate_provisioner_config(&self, _config: &Value) -> Diagnostics {
        Diagnostics::new()
    }

    async fn provision_resource(&self, request: ProvisionResourceRequest, output: &dyn ProvisionerOutput) -> Diagnostics {
        self.requests.lock().push(request);
        output.output("mock provisioner ran");
        if self.fail {
            Diagnostic::error("Mock provisioner failure", "injected").into()
        } else {
            Diagnostics::new()
        }
    }

    async fn stop(&self) -> Result<(), PluginError> {
        Ok(())
    }
}

/// Schema accepting any attribute, where changes to `force_new` replace
pub fn replacing_schema(force_new: &[&str]) -> Schema {
    force_new.iter().fold(Schema::open(), |schema, name| {
        schema.with_attribute(
            *name,
            AttributeSchema {
                force_new: true,
                ..AttributeSchema::default()
            },
        )
    })
}

/// Context whose every provider is `provider`
pub fn context_with(provider: Arc<MockProvider>) -> Context {
    Context::new(Arc::new(PluginRegistry::new().with_fallback(provider)))
}

/// Context with a provider and a `mock` provisioner
pub fn context_with_provisioner(provider: Arc<MockProvider>, provisioner: Arc<MockProvisioner>) -> Context {
    let registry = PluginRegistry::new()
        .with_fallback(provider)
        .with_provisioner("mock", provisioner);
    Context::new(Arc::new(registry))
}

/// Parse a TOML configuration
pub fn config(toml: &str) -> Config {
    Config::from_toml_str(toml).expect("test configuration should parse")
}

/// Parse an instance address
pub fn instance(addr: &str) -> InstanceAddress {
    addr.parse().expect("test instance address should parse")
}

/// Builds a [`State`] from instance addresses and JSON values
#[derive(Debug, Default)]
pub struct StateBuilder {
    state: State,
}

impl StateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object(self, addr: &str, value: Value) -> Self {
        self.object_with(addr, ObjectState::new(value))
    }

    /// Live object recorded with dependencies on `deps` (config resource addresses)
    pub fn object_with_deps(self, addr: &str, value: Value, deps: &[&str]) -> Self {
        let deps: Vec<ConfigResource> = deps
            .iter()
            .map(|d| {
                d.parse::<infragraph_addrs::ResourceAddress>()
                    .expect("test dependency address should parse")
                    .config()
            })
            .collect();
        self.object_with(addr, ObjectState::new(value).with_dependencies(deps))
    }

    pub fn tainted(self, addr: &str, value: Value) -> Self {
        let mut object = ObjectState::new(value);
        object.status = ObjectStatus::Tainted;
        self.object_with(addr, object)
    }

    pub fn object_with(mut self, addr: &str, object: ObjectState) -> Self {
        self.state.set_current(&instance(addr), Some(object));
        self
    }

    pub fn deposed(mut self, addr: &str, value: Value) -> Self {
        self.state.set_deposed(&instance(addr), Some(ObjectState::new(value)));
        self
    }

    pub fn build(self) -> State {
        self.state
    }
}

/// Instance addresses recorded in `state`, as strings, sorted
pub fn recorded_instances(state: &State) -> Vec<String> {
    let mut out: Vec<String> = state
        .resources()
        .flat_map(|rs| {
            rs.instances
                .iter()
                .filter(|(_, record)| record.current.is_some())
                .map(|(key, _)| rs.addr.instance(key.clone()).to_string())
                .collect::<Vec<_>>()
        })
        .collect();
    out.sort();
    out
}
