//! In-process pass-through provider

use super::{
    ApplyResourceChangeRequest, ApplyResourceChangeResponse, PlanResourceChangeRequest,
    PlanResourceChangeResponse, Provider, ProviderSchema, Schema,
};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::PluginError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};

/// Provider that plans the configuration as-is and stamps an `id` on create
///
/// Used by the CLI, where no real plugin transport exists, and by tests.
#[derive(Debug, Default)]
pub struct EchoProvider {
    schema: ProviderSchema,
    next_id: AtomicU64,
}

impl EchoProvider {
    /// Provider with no resource types
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource type
    #[must_use]
    pub fn with_resource_type(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.schema = self.schema.with_resource_type(name, schema);
        self
    }

    /// Accept each of `types` with an open schema
    #[must_use]
    pub fn accepting<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        types
            .into_iter()
            .fold(Self::new(), |p, t| p.with_resource_type(t, Schema::open()))
    }
}

fn carry_id(prior: Option<&Value>, mut planned: Value) -> Value {
    if let (Some(id), Some(obj)) = (prior.and_then(|p| p.get("id")), planned.as_object_mut()) {
        obj.entry("id").or_insert_with(|| id.clone());
    }
    planned
}

#[async_trait]
impl Provider for EchoProvider {
    async fn get_schema(&self) -> Result<ProviderSchema, PluginError> {
        Ok(self.schema.clone())
    }

    async fn validate_resource_config(&self, type_name: &str, _config: &Value) -> Diagnostics {
        if self.schema.resource_types.contains_key(type_name) {
            Diagnostics::new()
        } else {
            Diagnostic::error("Unsupported resource type", format!("type {type_name:?} is not supported")).into()
        }
    }

    async fn plan_resource_change(&self, request: PlanResourceChangeRequest) -> PlanResourceChangeResponse {
        let schema = self.schema.resource_types.get(&request.type_name);
        let planned_state = carry_id(request.prior_state.as_ref(), request.proposed_new_state);
        let requires_replace = match (schema, &request.prior_state) {
            (Some(schema), Some(prior)) => schema.requires_replace(prior, &planned_state),
            _ => Vec::new(),
        };
        PlanResourceChangeResponse {
            planned_state,
            requires_replace,
            diagnostics: Diagnostics::new(),
        }
    }

    async fn apply_resource_change(&self, request: ApplyResourceChangeRequest) -> ApplyResourceChangeResponse {
        let Some(planned) = request.planned_state else {
            return ApplyResourceChangeResponse::default();
        };
        let mut new_state = carry_id(request.prior_state.as_ref(), planned);
        if let Some(obj) = new_state.as_object_mut() {
            if !obj.contains_key("id") {
                let n = self.next_id.fetch_add(1, Ordering::Relaxed);
                obj.insert("id".into(), Value::String(format!("{}-{n}", request.type_name)));
            }
        }
        ApplyResourceChangeResponse {
            new_state: Some(new_state),
            diagnostics: Diagnostics::new(),
        }
    }

    async fn stop(&self) -> Result<(), PluginError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn apply_assigns_id_once() {
        let p = EchoProvider::accepting(["null_resource"]);
        let created = p
            .apply_resource_change(ApplyResourceChangeRequest {
                type_name: "null_resource".into(),
                prior_state: None,
                planned_state: Some(json!({"a": 1})),
                config: json!({"a": 1}),
            })
            .await
            .new_state
            .unwrap();
        assert_eq!(created["id"], json!("null_resource-0"));

        let updated = p
            .apply_resource_change(ApplyResourceChangeRequest {
                type_name: "null_resource".into(),
                prior_state: Some(created.clone()),
                planned_state: Some(json!({"a": 2})),
                config: json!({"a": 2}),
            })
            .await
            .new_state
            .unwrap();
        assert_eq!(updated["id"], created["id"]);
    }

    #[tokio::test]
    async fn destroy_returns_no_state() {
        let p = EchoProvider::new();
        let resp = p
            .apply_resource_change(ApplyResourceChangeRequest {
                type_name: "x".into(),
                prior_state: Some(json!({})),
                planned_state: None,
                config: Value::Null,
            })
            .await;
        assert!(resp.new_state.is_none());
    }

    #[tokio::test]
    async fn unknown_type_fails_validation() {
        let p = EchoProvider::accepting(["a_b"]);
        assert!(p.validate_resource_config("c_d", &json!({})).await.has_errors());
        assert!(p.validate_resource_config("a_b", &json!({})).await.is_empty());
    }
}
