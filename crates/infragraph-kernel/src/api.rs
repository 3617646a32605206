//! Public entry points
//!
//! A [`Context`] bundles the plugins, expression evaluator and walk settings
//! and runs the plan and apply walks against a configuration.

use crate::config::{implied_provider, Config, Evaluator, LiteralEvaluator, WalkerConfig};
use crate::construction::{ApplyGraphBuilder, PlanGraphBuilder};
use crate::context::{WalkContext, WalkOperation};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::WalkError;
use crate::executor::{WalkSummary, Walker};
use crate::expander::{register_modules, InstanceExpander};
use crate::plan::{ChangeSet, Plan};
use crate::plugin::{PluginRegistry, Schemas};
use crate::state::{State, SyncState};
use infragraph_addrs::ProviderAddr;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument, Span};

/// Result of [`Context::plan`]
#[derive(Debug)]
pub struct PlanOutcome {
    /// The plan; empty when validation failed
    pub plan: Plan,
    /// Working state after the walk
    pub state: State,
    /// Everything reported
    pub diagnostics: Diagnostics,
    /// Node counts
    pub summary: WalkSummary,
}

/// Result of [`Context::apply`]
#[derive(Debug)]
pub struct ApplyOutcome {
    /// State after the walk, including partial progress
    pub state: State,
    /// Everything reported
    pub diagnostics: Diagnostics,
    /// Node counts
    pub summary: WalkSummary,
}

/// Runs plan and apply walks
#[derive(Clone)]
pub struct Context {
    plugins: Arc<PluginRegistry>,
    evaluator: Arc<dyn Evaluator>,
    config: WalkerConfig,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("plugins", &self.plugins)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Context with literal-only expressions and default settings
    #[must_use]
    pub fn new(plugins: Arc<PluginRegistry>) -> Self {
        Self {
            plugins,
            evaluator: Arc::new(LiteralEvaluator),
            config: WalkerConfig::default(),
        }
    }

    /// Use a custom expression evaluator
    #[must_use]
    pub fn with_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Use custom walk settings
    #[must_use]
    pub fn with_config(mut self, config: WalkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Walk settings in use
    #[must_use]
    pub fn walker_config(&self) -> &WalkerConfig {
        &self.config
    }

    /// Check configuration structure, provider availability and every
    /// resource body against its schema
    pub async fn validate(&self, config: &Config) -> Diagnostics {
        let mut diags = config.validate();
        let resources = config.resources();
        let (schemas, loaded) = self
            .plugins
            .load_schemas(&resources.iter().map(|(_, r)| r.provider_addr()).collect::<BTreeSet<_>>())
            .await;
        diags.extend(loaded);

        for (module, resource) in resources {
            let addr = resource.addr().in_module(module);
            let provider = match schemas.resolve(&resource.provider_addr()) {
                Ok(provider) => provider,
                Err(diag) => {
                    diags.push(diag.with_address(&addr));
                    continue;
                }
            };
            let Some(schema) = provider.resource_schema(&resource.kind) else {
                diags.push(
                    Diagnostic::error(
                        "Unsupported resource type",
                        format!("provider {} does not support resource type {:?}", provider.addr, resource.kind),
                    )
                    .with_address(&addr),
                );
                continue;
            };
            let body = resource.body();
            let mut found = schema.validate(&body);
            found.extend(provider.provider.validate_resource_config(&resource.kind, &body).await);
            diags.extend(found.into_iter().map(|d| d.with_address(&addr)).collect());
        }
        diags
    }

    /// Compute the changes needed to reach `config` from `state`
    ///
    /// # Errors
    /// Structural failures of the top-level graph and aborted tasks. Node
    /// failures are reported as diagnostics.
    pub async fn plan(&self, config: &Config, state: State) -> Result<PlanOutcome, WalkError> {
        let span = info_span!("plan", parallelism = self.config.parallelism);
        self.plan_inner(config, state).instrument(span).await
    }

    async fn plan_inner(&self, config: &Config, state: State) -> Result<PlanOutcome, WalkError> {
        let targets = self.config.targets.clone();
        let mut diags = config.validate();
        if diags.has_errors() {
            warn!(errors = diags.error_count(), "configuration is invalid; not planning");
            return Ok(PlanOutcome {
                plan: Plan {
                    changes: Vec::new(),
                    prior_state: state.clone(),
                    targets,
                },
                state,
                diagnostics: diags,
                summary: WalkSummary::default(),
            });
        }

        let (schemas, loaded) = self.plugins.load_schemas(&plan_providers(config, &state)).await;
        diags.extend(loaded);

        let expander = InstanceExpander::new();
        diags.extend(register_modules(config, &expander, self.evaluator.as_ref()));

        let graph = PlanGraphBuilder {
            config,
            state: &state,
            expander: &expander,
            targets: &targets,
        }
        .build()
        .map_err(|source| WalkError::Graph { name: "plan", source })?;
        info!(nodes = graph.node_count(), "plan graph built");

        let ctx = self.walk_context(WalkOperation::Plan, state, expander, schemas, targets.clone());
        let result = Walker::new(Arc::clone(&ctx), self.config.parallelism).walk(graph).await?;
        diags.extend(result.diagnostics);

        let state = ctx.state.snapshot();
        let plan = Plan {
            changes: ctx.changes.sorted(),
            prior_state: state.clone(),
            targets,
        };
        info!(summary = %plan.summary(), errors = diags.error_count(), "plan complete");
        Ok(PlanOutcome {
            plan,
            state,
            diagnostics: diags,
            summary: result.summary,
        })
    }

    /// Carry out `plan`
    ///
    /// The returned state reflects every change that succeeded, even when
    /// others failed.
    ///
    /// # Errors
    /// Structural failures of the apply graph and aborted tasks.
    pub async fn apply(&self, config: &Config, plan: &Plan) -> Result<ApplyOutcome, WalkError> {
        let span = info_span!("apply", changes = plan.changes.len());
        self.apply_inner(config, plan).instrument(span).await
    }

    async fn apply_inner(&self, config: &Config, plan: &Plan) -> Result<ApplyOutcome, WalkError> {
        let mut diags = Diagnostics::new();
        let providers: BTreeSet<ProviderAddr> = plan
            .changes
            .iter()
            .map(|c| c.provider.clone())
            .chain(config.resources().into_iter().map(|(_, r)| r.provider_addr()))
            .collect();
        let (schemas, loaded) = self.plugins.load_schemas(&providers).await;
        diags.extend(loaded);

        let expander = InstanceExpander::new();
        diags.extend(register_modules(config, &expander, self.evaluator.as_ref()));

        let graph = ApplyGraphBuilder {
            config,
            plan,
            schemas: &schemas,
        }
        .build()
        .map_err(|source| WalkError::Graph { name: "apply", source })?;
        info!(nodes = graph.node_count(), "apply graph built");

        let ctx = self.walk_context(
            WalkOperation::Apply,
            plan.prior_state.clone(),
            expander,
            schemas,
            plan.targets.clone(),
        );
        let result = Walker::new(Arc::clone(&ctx), self.config.parallelism).walk(graph).await?;
        diags.extend(result.diagnostics);

        let mut state = ctx.state.snapshot();
        state.prune(|addr| config.resource(&addr.config()).is_some());
        info!(
            done = result.summary.done,
            failed = result.summary.failed,
            errors = diags.error_count(),
            "apply complete"
        );
        Ok(ApplyOutcome {
            state,
            diagnostics: diags,
            summary: result.summary,
        })
    }

    fn walk_context(
        &self,
        operation: WalkOperation,
        state: State,
        expander: InstanceExpander,
        schemas: Schemas,
        targets: Vec<infragraph_addrs::Target>,
    ) -> Arc<WalkContext> {
        Arc::new(WalkContext {
            operation,
            state: SyncState::new(state),
            expander,
            evaluator: Arc::clone(&self.evaluator),
            plugins: Arc::clone(&self.plugins),
            schemas,
            changes: ChangeSet::new(),
            targets,
            span: Span::current(),
        })
    }
}

/// Providers a plan may need: configured ones plus those recorded in state
fn plan_providers(config: &Config, state: &State) -> BTreeSet<ProviderAddr> {
    let mut providers: BTreeSet<ProviderAddr> =
        config.resources().into_iter().map(|(_, r)| r.provider_addr()).collect();
    providers.extend(
        state
            .resources()
            .map(|rs| rs.provider.clone().unwrap_or_else(|| implied_provider(&rs.addr.resource.kind))),
    );
    providers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::EchoProvider;

    fn context() -> Context {
        let registry = PluginRegistry::new().with_fallback(Arc::new(EchoProvider::accepting(["null_resource"])));
        Context::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn invalid_config_short_circuits() {
        let config = Config::from_toml_str(
            r#"
[[resources]]
type = "null_resource"
name = "a"
count = { value = 1 }
for_each = { value = ["x"] }
"#,
        )
        .unwrap();
        let outcome = context().plan(&config, State::new()).await.unwrap();
        assert!(outcome.diagnostics.has_errors());
        assert!(outcome.plan.changes.is_empty());
        assert_eq!(outcome.summary, WalkSummary::default());
    }

    #[tokio::test]
    async fn validate_reports_unknown_types() {
        let config = Config::from_toml_str(
            r#"
[[resources]]
type = "null_thing"
name = "a"
"#,
        )
        .unwrap();
        let diags = context().validate(&config).await;
        assert_eq!(diags.error_count(), 1);
        assert!(diags.iter().any(|d| d.summary == "Unsupported resource type"));
    }

    #[test]
    fn state_providers_are_planned_for() {
        let mut state = State::new();
        let addr = infragraph_addrs::Resource::new("aws_instance", "web")
            .absolute(infragraph_addrs::ModuleInstance::root())
            .instance(infragraph_addrs::InstanceKey::NoKey);
        state.set_current(&addr, Some(crate::state::ObjectState::new(serde_json::json!({}))));
        let providers = plan_providers(&Config::default(), &state);
        assert!(providers.contains(&ProviderAddr::legacy("aws")));
    }
}
