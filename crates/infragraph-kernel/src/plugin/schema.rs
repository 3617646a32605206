//! Plugin schemas

use crate::diagnostics::{Diagnostic, Diagnostics};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One attribute of a schema
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSchema {
    /// Must be set in configuration
    #[serde(default)]
    pub required: bool,
    /// Set by the provider
    #[serde(default)]
    pub computed: bool,
    /// Changing it forces replacement
    #[serde(default)]
    pub force_new: bool,
}

/// Schema of a resource type or provisioner
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Schema version
    #[serde(default)]
    pub version: u64,
    /// Attributes by name
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeSchema>,
    /// Accept attributes not listed in `attributes`
    #[serde(default)]
    pub open: bool,
}

impl Schema {
    /// Schema that accepts any object
    #[must_use]
    pub fn open() -> Self {
        Self {
            open: true,
            ..Self::default()
        }
    }

    /// Add an attribute
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, attr: AttributeSchema) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    /// Check a configuration body against this schema
    #[must_use]
    pub fn validate(&self, body: &Value) -> Diagnostics {
        let mut diags = Diagnostics::new();
        let Some(object) = body.as_object() else {
            diags.push(Diagnostic::error(
                "Invalid configuration body",
                "the body must be an object",
            ));
            return diags;
        };

        for (name, attr) in &self.attributes {
            if attr.required && object.get(name).map_or(true, Value::is_null) {
                diags.push(Diagnostic::error(
                    "Missing required argument",
                    format!("the argument \"{name}\" is required"),
                ));
            }
        }
        if !self.open {
            for name in object.keys() {
                match self.attributes.get(name) {
                    None => diags.push(Diagnostic::error(
                        "Unsupported argument",
                        format!("an argument named \"{name}\" is not expected here"),
                    )),
                    Some(attr) if attr.computed && !attr.required => diags.push(Diagnostic::error(
                        "Invalid argument",
                        format!("\"{name}\" is set by the provider and cannot be configured"),
                    )),
                    Some(_) => {}
                }
            }
        }
        diags
    }

    /// Attributes whose change between `prior` and `planned` forces replacement
    #[must_use]
    pub fn requires_replace(&self, prior: &Value, planned: &Value) -> Vec<String> {
        self.attributes
            .iter()
            .filter(|(_, attr)| attr.force_new)
            .filter(|(name, _)| prior.get(name.as_str()) != planned.get(name.as_str()))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// Schemas of every resource type of one provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSchema {
    /// Resource type schemas by type name
    #[serde(default)]
    pub resource_types: BTreeMap<String, Schema>,
}

impl ProviderSchema {
    /// Add a resource type
    #[must_use]
    pub fn with_resource_type(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.resource_types.insert(name.into(), schema);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::default()
            .with_attribute(
                "ami",
                AttributeSchema {
                    required: true,
                    force_new: true,
                    ..AttributeSchema::default()
                },
            )
            .with_attribute("tags", AttributeSchema::default())
            .with_attribute(
                "id",
                AttributeSchema {
                    computed: true,
                    ..AttributeSchema::default()
                },
            )
    }

    #[test]
    fn missing_and_unknown_arguments() {
        let diags = schema().validate(&json!({"tags": "x", "color": "red"}));
        let summaries: Vec<_> = diags.iter().map(|d| d.summary.as_str()).collect();
        assert_eq!(summaries, ["Missing required argument", "Unsupported argument"]);
    }

    #[test]
    fn computed_attributes_cannot_be_set() {
        let diags = schema().validate(&json!({"ami": "a", "id": "nope"}));
        assert_eq!(diags.error_count(), 1);
    }

    #[test]
    fn open_schema_accepts_anything() {
        assert!(Schema::open().validate(&json!({"whatever": 1})).is_empty());
        assert!(Schema::open().validate(&json!(3)).has_errors());
    }

    #[test]
    fn force_new_changes_require_replace() {
        let s = schema();
        assert_eq!(s.requires_replace(&json!({"ami": "a"}), &json!({"ami": "b"})), ["ami"]);
        assert!(s.requires_replace(&json!({"ami": "a", "tags": 1}), &json!({"ami": "a", "tags": 2})).is_empty());
    }
}
