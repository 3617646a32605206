//! Plan then apply: create, update, replace, delete and provisioners

use infragraph_kernel::plan::Action;
use infragraph_kernel::prelude::*;
use infragraph_kernel::state::ObjectStatus;
use infragraph_test_utils::{
    config, context_with, context_with_provisioner, instance, recorded_instances, replacing_schema, MockProvider,
    MockProvisioner, StateBuilder,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn provider() -> Arc<MockProvider> {
    Arc::new(
        MockProvider::accepting(["null_resource"]).with_resource_type("null_replaced", replacing_schema(&["v"])),
    )
}

async fn plan_and_apply(ctx: &Context, config: &Config, state: State) -> (Plan, State) {
    let planned = ctx.plan(config, state).await.unwrap();
    assert!(!planned.diagnostics.has_errors(), "plan: {:?}", planned.diagnostics);
    let applied = ctx.apply(config, &planned.plan).await.unwrap();
    assert!(!applied.diagnostics.has_errors(), "apply: {:?}", applied.diagnostics);
    (planned.plan, applied.state)
}

fn id_of(state: &State, addr: &str) -> Value {
    state.current_object(&instance(addr)).expect("object recorded").value["id"].clone()
}

#[tokio::test]
async fn create_records_objects_and_dependencies() {
    let config = config(
        r#"
[[resources]]
type = "null_resource"
name = "a"
count = { value = 2 }

[[resources]]
type = "null_resource"
name = "b"
references = ["null_resource.a[0]"]
"#,
    );
    let provider = provider();
    let ctx = context_with(Arc::clone(&provider));
    let (plan, state) = plan_and_apply(&ctx, &config, State::new()).await;

    assert_eq!(plan.summary().add, 3);
    assert_eq!(
        recorded_instances(&state),
        ["null_resource.a[0]", "null_resource.a[1]", "null_resource.b"]
    );
    let b = state.current_object(&instance("null_resource.b")).unwrap();
    assert_eq!(b.dependencies.len(), 1);
    assert_eq!(b.dependencies[0].to_string(), "null_resource.a");
    assert!(b.value["id"].as_str().unwrap().starts_with("mock-"));
    assert_eq!(provider.applied().len(), 3);
}

#[tokio::test]
async fn second_plan_after_apply_is_empty() {
    let config = config(
        r#"
[[resources]]
type = "null_resource"
name = "a"
for_each = { value = ["x", "y"] }
body = { size = 1 }
"#,
    );
    let ctx = context_with(provider());
    let (_, state) = plan_and_apply(&ctx, &config, State::new()).await;

    let again = ctx.plan(&config, state).await.unwrap();
    assert!(again.plan.actionable().next().is_none(), "{:?}", again.plan.changes);
    assert_eq!(again.plan.changes.len(), 2);
}

#[tokio::test]
async fn update_keeps_identity() {
    let ctx = context_with(provider());
    let v1 = config(
        r#"
[[resources]]
type = "null_resource"
name = "a"
body = { size = 1 }
"#,
    );
    let (_, state) = plan_and_apply(&ctx, &v1, State::new()).await;
    let before = id_of(&state, "null_resource.a");

    let v2 = config(
        r#"
[[resources]]
type = "null_resource"
name = "a"
body = { size = 2 }
"#,
    );
    let (plan, state) = plan_and_apply(&ctx, &v2, state).await;
    assert_eq!(plan.changes[0].action, Action::Update);
    assert_eq!(id_of(&state, "null_resource.a"), before);
    assert_eq!(state.current_object(&instance("null_resource.a")).unwrap().value["size"], json!(2));
}

#[tokio::test]
async fn replace_destroys_before_creating() {
    let state = StateBuilder::new()
        .object("null_replaced.a", json!({"id": "old", "v": 1}))
        .build();
    let config = config(
        r#"
[[resources]]
type = "null_replaced"
name = "a"
body = { v = 2 }
"#,
    );
    let provider = provider();
    let ctx = context_with(Arc::clone(&provider));
    let (plan, state) = plan_and_apply(&ctx, &config, state).await;

    assert_eq!(plan.changes[0].action, Action::DeleteThenCreate);
    let requests = provider.apply_requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].planned_state.is_none(), "destroy first");
    assert!(requests[1].planned_state.is_some(), "then create");

    assert_ne!(id_of(&state, "null_replaced.a"), json!("old"));
    let record = state.instance(&instance("null_replaced.a")).unwrap();
    assert!(record.deposed.is_none());
}

#[tokio::test]
async fn create_before_destroy_replaces_through_deposed_object() {
    let state = StateBuilder::new()
        .object("null_replaced.a", json!({"id": "old", "v": 1}))
        .build();
    let config = config(
        r#"
[[resources]]
type = "null_replaced"
name = "a"
lifecycle = { create_before_destroy = true }
body = { v = 2 }
"#,
    );
    let provider = provider();
    let ctx = context_with(Arc::clone(&provider));
    let (plan, state) = plan_and_apply(&ctx, &config, state).await;

    assert_eq!(plan.changes[0].action, Action::CreateThenDelete);
    let requests = provider.apply_requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].planned_state.is_some(), "create first");
    assert_eq!(requests[1].prior_state, Some(json!({"id": "old", "v": 1})), "then destroy the old object");

    let record = state.instance(&instance("null_replaced.a")).unwrap();
    assert!(record.deposed.is_none(), "deposed object destroyed");
    let current = record.current.as_ref().unwrap();
    assert_eq!(current.value["v"], json!(2));
    assert!(current.create_before_destroy);
    assert_ne!(current.value["id"], json!("old"));
}

#[tokio::test]
async fn failed_deposed_destroy_keeps_both_objects() {
    let state = StateBuilder::new()
        .object("null_replaced.a", json!({"id": "old", "v": 1}))
        .build();
    let config = config(
        r#"
[[resources]]
type = "null_replaced"
name = "a"
lifecycle = { create_before_destroy = true }
body = { v = 2 }
"#,
    );
    let provider = Arc::new(
        MockProvider::new()
            .with_resource_type("null_replaced", replacing_schema(&["v"]))
            .fail_apply_when(|r| r.planned_state.is_none()),
    );
    let ctx = context_with(provider);
    let planned = ctx.plan(&config, state).await.unwrap();
    let applied = ctx.apply(&config, &planned.plan).await.unwrap();

    assert_eq!(applied.diagnostics.error_count(), 1);
    let record = applied.state.instance(&instance("null_replaced.a")).unwrap();
    assert_eq!(record.deposed.as_ref().unwrap().value["id"], json!("old"));
    assert_eq!(record.current.as_ref().unwrap().value["v"], json!(2));
}

fn cbd_config() -> Config {
    config(
        r#"
[[resources]]
type = "null_replaced"
name = "a"
lifecycle = { create_before_destroy = true }
body = { v = 2 }
"#,
    )
}

#[tokio::test]
async fn next_plan_destroys_leftover_deposed_object() {
    let state = StateBuilder::new()
        .object("null_replaced.a", json!({"id": "old", "v": 1}))
        .build();
    let failing = Arc::new(
        MockProvider::new()
            .with_resource_type("null_replaced", replacing_schema(&["v"]))
            .fail_apply_when(|r| r.planned_state.is_none()),
    );
    let ctx = context_with(failing);
    let planned = ctx.plan(&cbd_config(), state).await.unwrap();
    let applied = ctx.apply(&cbd_config(), &planned.plan).await.unwrap();
    assert_eq!(applied.diagnostics.error_count(), 1);
    let new_id = id_of(&applied.state, "null_replaced.a");

    let provider = provider();
    let ctx = context_with(Arc::clone(&provider));
    let (plan, state) = plan_and_apply(&ctx, &cbd_config(), applied.state).await;

    let addr = instance("null_replaced.a");
    assert_eq!(plan.change(&addr).unwrap().action, Action::NoOp);
    let leftover = plan.deposed_change(&addr).expect("deposed object planned");
    assert_eq!(leftover.action, Action::Delete);
    assert_eq!(leftover.before.as_ref().unwrap()["id"], json!("old"));
    assert_eq!(plan.summary().destroy, 1);

    let destroyed = provider.destroyed();
    assert_eq!(destroyed.len(), 1);
    assert_eq!(destroyed[0].prior_state.as_ref().unwrap()["id"], json!("old"));
    let record = state.instance(&addr).unwrap();
    assert!(record.deposed.is_none());
    assert_eq!(id_of(&state, "null_replaced.a"), new_id);
}

#[tokio::test]
async fn failed_leftover_destroy_blocks_next_replacement() {
    let state = StateBuilder::new()
        .object("null_replaced.a", json!({"id": "old", "v": 1}))
        .deposed("null_replaced.a", json!({"id": "older", "v": 0}))
        .build();
    let provider = Arc::new(
        MockProvider::new()
            .with_resource_type("null_replaced", replacing_schema(&["v"]))
            .fail_apply_when(|r| r.prior_state.as_ref().is_some_and(|p| p["id"] == json!("older"))),
    );
    let ctx = context_with(Arc::clone(&provider));
    let planned = ctx.plan(&cbd_config(), state).await.unwrap();
    assert!(!planned.diagnostics.has_errors(), "{:?}", planned.diagnostics);
    let addr = instance("null_replaced.a");
    assert_eq!(planned.plan.change(&addr).unwrap().action, Action::CreateThenDelete);
    assert!(planned.plan.deposed_change(&addr).is_some());

    let applied = ctx.apply(&cbd_config(), &planned.plan).await.unwrap();
    assert_eq!(applied.diagnostics.error_count(), 1, "{:?}", applied.diagnostics);
    assert!(provider.applied().is_empty(), "replacement waits for the leftover destroy");
    let record = applied.state.instance(&addr).unwrap();
    assert_eq!(record.current.as_ref().unwrap().value["id"], json!("old"));
    assert_eq!(record.deposed.as_ref().unwrap().value["id"], json!("older"));
}

#[tokio::test]
async fn replacement_refuses_to_overwrite_deposed_object() {
    let state = StateBuilder::new()
        .object("null_replaced.a", json!({"id": "old", "v": 1}))
        .build();
    let provider = provider();
    let ctx = context_with(Arc::clone(&provider));
    let mut planned = ctx.plan(&cbd_config(), state).await.unwrap().plan;
    let addr = instance("null_replaced.a");
    planned
        .prior_state
        .set_deposed(&addr, Some(ObjectState::new(json!({"id": "older", "v": 0}))));

    let applied = ctx.apply(&cbd_config(), &planned).await.unwrap();
    assert!(applied.diagnostics.has_errors());
    assert!(
        applied
            .diagnostics
            .iter()
            .any(|d| d.summary == "Deposed object pending destruction"),
        "{:?}",
        applied.diagnostics
    );
    assert!(provider.apply_requests().is_empty());
    let record = applied.state.instance(&addr).unwrap();
    assert_eq!(record.current.as_ref().unwrap().value["id"], json!("old"));
    assert_eq!(record.deposed.as_ref().unwrap().value["id"], json!("older"));
}

#[tokio::test]
async fn removed_resources_are_destroyed_dependents_first() {
    let state = StateBuilder::new()
        .object("null_resource.a", json!({"id": "a"}))
        .object_with_deps("null_resource.b", json!({"id": "b"}), &["null_resource.a"])
        .object_with_deps("null_resource.c", json!({"id": "c"}), &["null_resource.b"])
        .build();
    let provider = provider();
    let ctx = context_with(Arc::clone(&provider));
    let (plan, state) = plan_and_apply(&ctx, &Config::default(), state).await;

    assert_eq!(plan.summary().destroy, 3);
    assert!(state.is_empty(), "{state:?}");
    let order: Vec<Value> = provider
        .destroyed()
        .into_iter()
        .map(|r| r.prior_state.unwrap()["id"].clone())
        .collect();
    assert_eq!(order, [json!("c"), json!("b"), json!("a")]);
}

#[tokio::test]
async fn shrinking_count_destroys_extra_instances() {
    let ctx = context_with(provider());
    let three = config(
        r#"
[[resources]]
type = "null_resource"
name = "a"
count = { value = 3 }
"#,
    );
    let (_, state) = plan_and_apply(&ctx, &three, State::new()).await;
    let one = config(
        r#"
[[resources]]
type = "null_resource"
name = "a"
count = { value = 1 }
"#,
    );
    let (plan, state) = plan_and_apply(&ctx, &one, state).await;
    assert_eq!(plan.summary().destroy, 2);
    assert_eq!(recorded_instances(&state), ["null_resource.a[0]"]);
}

#[tokio::test]
async fn apply_failure_keeps_partial_progress() {
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
references = ["null_resource.a"]
"#,
    );
    let provider = Arc::new(
        MockProvider::accepting(["null_resource"]).fail_apply_when(|r| r.config.get("fail") == Some(&json!(true))),
    );
    let ctx = context_with(Arc::clone(&provider));
    let planned = ctx.plan(&config, State::new()).await.unwrap();
    assert_eq!(planned.plan.summary().add, 3);

    let applied = ctx.apply(&config, &planned.plan).await.unwrap();
    assert_eq!(applied.diagnostics.error_count(), 1, "{:?}", applied.diagnostics);
    assert_eq!(recorded_instances(&applied.state), ["null_resource.b"]);
    assert_eq!(provider.apply_requests().len(), 2, "c never applied");
}

#[tokio::test]
async fn failed_provisioner_taints_and_forces_replacement() {
    let config = config(
        r#"
[[resources]]
type = "null_resource"
name = "a"

[[resources.provisioners]]
type = "mock"
config = { command = "configure" }
"#,
    );
    let provisioner = Arc::new(MockProvisioner::failing());
    let ctx = context_with_provisioner(provider(), Arc::clone(&provisioner));

    let planned = ctx.plan(&config, State::new()).await.unwrap();
    let applied = ctx.apply(&config, &planned.plan).await.unwrap();
    assert_eq!(applied.diagnostics.error_count(), 1);
    assert_eq!(provisioner.requests().len(), 1);
    assert_eq!(provisioner.requests()[0].config, json!({"command": "configure"}));

    let object = applied.state.current_object(&instance("null_resource.a")).unwrap();
    assert_eq!(object.status, ObjectStatus::Tainted);

    let replan = ctx.plan(&config, applied.state).await.unwrap();
    assert_eq!(replan.plan.changes[0].action, Action::DeleteThenCreate);
}

#[tokio::test]
async fn provisioners_run_only_on_create() {
    let config = config(
        r#"
[[resources]]
type = "null_resource"
name = "a"
body = { size = 1 }

[[resources.provisioners]]
type = "mock"
"#,
    );
    let provisioner = Arc::new(MockProvisioner::new());
    let ctx = context_with_provisioner(provider(), Arc::clone(&provisioner));
    let (_, state) = plan_and_apply(&ctx, &config, State::new()).await;
    assert_eq!(provisioner.requests().len(), 1);

    let resized = infragraph_test_utils::config(
        r#"
[[resources]]
type = "null_resource"
name = "a"
body = { size = 2 }

[[resources.provisioners]]
type = "mock"
"#,
    );
    let (plan, _) = plan_and_apply(&ctx, &resized, state).await;
    assert_eq!(plan.changes[0].action, Action::Update);
    assert_eq!(provisioner.requests().len(), 1);
}

#[tokio::test]
async fn plan_round_trips_through_json() {
    let config = config(
        r#"
[[resources]]
type = "null_resource"
name = "a"
count = { value = 2 }
"#,
    );
    let ctx = context_with(provider());
    let planned = ctx.plan(&config, State::new()).await.unwrap();
    let text = serde_json::to_string(&planned.plan).unwrap();
    let decoded: Plan = serde_json::from_str(&text).unwrap();
    assert_eq!(decoded, planned.plan);

    let applied = ctx.apply(&config, &decoded).await.unwrap();
    assert_eq!(recorded_instances(&applied.state), ["null_resource.a[0]", "null_resource.a[1]"]);
}
