//! Count and for-each expressions
//!
//! Expression *syntax* is out of scope for the engine. An [`Expression`]
//! carries its source text, the references it makes, and optionally a
//! literal value. An [`Evaluator`] turns it into an [`ExprValue`] for a
//! given module instance.

use crate::diagnostics::{Diagnostic, Diagnostics};
use infragraph_addrs::{ModuleInstance, Reference};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A count or for-each expression
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expression {
    /// Source text, used in diagnostics
    #[serde(default)]
    pub source: String,
    /// Literal value, if known without evaluation
    #[serde(default)]
    pub value: Option<ExprValue>,
    /// References made by the expression
    #[serde(default)]
    pub references: Vec<Reference>,
}

impl Expression {
    /// Literal whole-number expression
    #[must_use]
    pub fn number(n: i64) -> Self {
        Self {
            source: n.to_string(),
            value: Some(ExprValue::Number(n)),
            references: Vec::new(),
        }
    }

    /// Literal set-of-strings expression
    #[must_use]
    pub fn keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: BTreeSet<String> = keys.into_iter().map(Into::into).collect();
        let source = format!(
            "[{}]",
            keys.iter().map(|k| format!("{k:?}")).collect::<Vec<_>>().join(", ")
        );
        Self {
            source,
            value: Some(ExprValue::Keys(keys)),
            references: Vec::new(),
        }
    }

    /// Expression whose value is only known to a custom evaluator
    #[must_use]
    pub fn deferred(source: impl Into<String>, references: Vec<Reference>) -> Self {
        Self {
            source: source.into(),
            value: None,
            references,
        }
    }
}

/// Evaluated expression value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExprValue {
    /// Whole number
    Number(i64),
    /// Set of strings
    Keys(BTreeSet<String>),
}

/// Resolves expressions in the scope of a module instance
pub trait Evaluator: Send + Sync {
    /// Evaluate `expr` as seen from `module`
    ///
    /// # Errors
    /// Returns an error diagnostic when the value cannot be determined.
    fn evaluate(&self, expr: &Expression, module: &ModuleInstance) -> Result<ExprValue, Diagnostic>;
}

impl<F> Evaluator for F
where
    F: Fn(&Expression, &ModuleInstance) -> Result<ExprValue, Diagnostic> + Send + Sync,
{
    fn evaluate(&self, expr: &Expression, module: &ModuleInstance) -> Result<ExprValue, Diagnostic> {
        self(expr, module)
    }
}

/// Evaluator that only understands literal values
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralEvaluator;

impl Evaluator for LiteralEvaluator {
    fn evaluate(&self, expr: &Expression, module: &ModuleInstance) -> Result<ExprValue, Diagnostic> {
        expr.value.clone().ok_or_else(|| {
            let scope = if module.is_root() {
                "the root module".to_string()
            } else {
                module.to_string()
            };
            Diagnostic::error(
                "Unknown expression value",
                format!("the value of `{}` in {scope} cannot be determined", expr.source),
            )
        })
    }
}

/// Evaluate an optional `count` expression
///
/// `Ok(None)` means count is not set.
///
/// # Errors
/// Evaluation failures, negative numbers and non-number values.
pub fn evaluate_count(
    evaluator: &dyn Evaluator,
    expr: Option<&Expression>,
    module: &ModuleInstance,
) -> Result<Option<usize>, Diagnostics> {
    let Some(expr) = expr else {
        return Ok(None);
    };
    match evaluator.evaluate(expr, module)? {
        ExprValue::Number(n) => usize::try_from(n).map(Some).map_err(|_| {
            Diagnostic::error(
                "Invalid count argument",
                format!("count must be a non-negative whole number, got {n}"),
            )
            .into()
        }),
        ExprValue::Keys(_) => Err(Diagnostic::error(
            "Invalid count argument",
            format!("count must be a whole number, but `{}` is a set", expr.source),
        )
        .into()),
    }
}

/// Evaluate an optional `for_each` expression
///
/// # Errors
/// Evaluation failures and non-set values.
pub fn evaluate_for_each(
    evaluator: &dyn Evaluator,
    expr: Option<&Expression>,
    module: &ModuleInstance,
) -> Result<Option<BTreeSet<String>>, Diagnostics> {
    let Some(expr) = expr else {
        return Ok(None);
    };
    match evaluator.evaluate(expr, module)? {
        ExprValue::Keys(keys) => Ok(Some(keys)),
        ExprValue::Number(n) => Err(Diagnostic::error(
            "Invalid for_each argument",
            format!("for_each must be a set of strings, got the number {n}"),
        )
        .into()),
    }
}
