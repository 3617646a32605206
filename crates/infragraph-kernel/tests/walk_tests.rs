//! Walk behaviour: structural errors, failure isolation, parallelism

use infragraph_kernel::plan::Action;
use infragraph_kernel::prelude::*;
use infragraph_kernel::{GraphError, WalkError};
use infragraph_test_utils::{config, context_with, instance, MockProvider};
use pretty_assertions::assert_eq;
use std::time::Duration;

fn fails(config: &serde_json::Value) -> bool {
    config.get("fail").and_then(serde_json::Value::as_bool).unwrap_or(false)
}

#[tokio::test]
async fn reference_cycle_is_a_structural_error() {
    let config = config(
        r#"
[[resources]]
type = "null_resource"
name = "a"
references = ["null_resource.b"]

[[resources]]
type = "null_resource"
name = "b"
references = ["null_resource.a"]
"#,
    );
    let provider = Arc::new(MockProvider::accepting(["null_resource"]));

    let err = context_with(Arc::clone(&provider))
        .plan(&config, State::new())
        .await
        .unwrap_err();
    match err {
        WalkError::Graph {
            name: "plan",
            source: GraphError::CycleDetected { path },
        } => assert!(path.len() >= 2, "{path:?}"),
        other => panic!("expected a cycle, got {other}"),
    }
    assert!(provider.plan_requests().is_empty(), "nothing is evaluated");
}

#[tokio::test]
async fn failure_skips_dependents_but_not_siblings() {
    let config = config(
        r#"
[[resources]]
type = "null_resource"
name = "a"
body = { fail = true }

[[resources]]
type = "null_resource"
name = "b"

[[resources]]
type = "null_resource"
name = "c"
count = { value = 2 }
references = ["null_resource.a"]
"#,
    );
    let provider = Arc::new(MockProvider::accepting(["null_resource"]).fail_plan_when(|r| fails(&r.config)));

    let outcome = context_with(Arc::clone(&provider)).plan(&config, State::new()).await.unwrap();

    assert_eq!(outcome.diagnostics.error_count(), 1, "{:?}", outcome.diagnostics);
    let error = outcome.diagnostics.errors().next().unwrap();
    assert_eq!(error.summary, "Mock plan failure");
    assert_eq!(error.address.as_deref(), Some("null_resource.a"));

    let skipped: Vec<&str> = outcome
        .diagnostics
        .iter()
        .filter(|d| d.summary == "Skipped")
        .filter_map(|d| d.address.as_deref())
        .collect();
    assert_eq!(skipped, ["null_resource.c (expand)"]);

    assert_eq!(outcome.plan.changes.len(), 1);
    assert_eq!(outcome.plan.changes[0].addr, instance("null_resource.b"));
    assert_eq!(outcome.plan.changes[0].action, Action::Create);
    assert_eq!(outcome.summary.failed, 1);
    assert!(outcome.summary.skipped >= 2, "{:?}", outcome.summary);

    let planned: Vec<String> = provider
        .plan_requests()
        .iter()
        .map(|r| r.config.to_string())
        .collect();
    assert_eq!(planned.len(), 2, "c is never planned: {planned:?}");
}

#[tokio::test]
async fn failed_count_evaluation_is_scoped_to_its_resource() {
    let config = config(
        r#"
[[resources]]
type = "null_resource"
name = "a"
count = { source = "var.missing" }

[[resources]]
type = "null_resource"
name = "b"
"#,
    );
    let provider = Arc::new(MockProvider::accepting(["null_resource"]));
    let outcome = context_with(provider).plan(&config, State::new()).await.unwrap();

    assert_eq!(outcome.diagnostics.error_count(), 1, "{:?}", outcome.diagnostics);
    let addrs: Vec<String> = outcome.plan.changes.iter().map(|c| c.addr.to_string()).collect();
    assert_eq!(addrs, ["null_resource.b"]);
}

#[tokio::test]
async fn missing_provider_fails_only_its_resources() {
    let config = config(
        r#"
[[resources]]
type = "null_resource"
name = "a"

[[resources]]
type = "aws_instance"
name = "web"
"#,
    );
    let null = Arc::new(MockProvider::accepting(["null_resource"]));
    let registry = PluginRegistry::new().with_provider(ProviderAddr::legacy("null"), null);
    let outcome = Context::new(Arc::new(registry)).plan(&config, State::new()).await.unwrap();

    assert_eq!(outcome.diagnostics.error_count(), 1, "{:?}", outcome.diagnostics);
    assert!(outcome.diagnostics.iter().any(|d| d.summary == "Provider not available"));
    assert_eq!(outcome.plan.changes.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallelism_bounds_concurrent_evaluation() {
    let config = config(
        r#"
[[resources]]
type = "null_resource"
name = "a"
count = { value = 12 }
"#,
    );
    let provider = Arc::new(MockProvider::accepting(["null_resource"]).with_apply_delay(Duration::from_millis(20)));
    let ctx = context_with(Arc::clone(&provider)).with_config(WalkerConfig::default().with_parallelism(3));

    let planned = ctx.plan(&config, State::new()).await.unwrap();
    let applied = ctx.apply(&config, &planned.plan).await.unwrap();

    assert!(!applied.diagnostics.has_errors(), "{:?}", applied.diagnostics);
    assert_eq!(provider.applied().len(), 12);
    let peak = provider.max_concurrent_applies();
    assert!(peak <= 3, "peak concurrency {peak} exceeds parallelism");
    assert!(peak > 1, "instances should run concurrently");
}

#[tokio::test]
async fn parallelism_of_one_serializes_the_walk() {
    let config = config(
        r#"
[[resources]]
type = "null_resource"
name = "a"
count = { value = 4 }
"#,
    );
    let provider = Arc::new(MockProvider::accepting(["null_resource"]).with_apply_delay(Duration::from_millis(5)));
    let ctx = context_with(Arc::clone(&provider)).with_config(WalkerConfig::default().with_parallelism(1));

    let planned = ctx.plan(&config, State::new()).await.unwrap();
    ctx.apply(&config, &planned.plan).await.unwrap();
    assert_eq!(provider.max_concurrent_applies(), 1);
}
