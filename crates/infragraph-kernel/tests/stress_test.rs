//! Stress test: many resources expanding and writing state concurrently
//!
//! Run with: cargo test --package infragraph-kernel --test stress_test

use infragraph_kernel::plan::Action;
use infragraph_kernel::prelude::*;
use infragraph_kernel::state::{EachMode, SyncState};
use infragraph_test_utils::{config, context_with, instance, recorded_instances, MockProvider, StateBuilder};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

const RESOURCES: usize = 40;
const COUNT: usize = 5;
const RECORDED: usize = 7;

fn wide_config() -> Config {
    let mut text = String::new();
    for r in 0..RESOURCES {
        text.push_str(&format!(
            "[[resources]]\ntype = \"null_resource\"\nname = \"r{r}\"\ncount = {{ value = {COUNT} }}\n"
        ));
        if r > 0 && r % 4 == 0 {
            text.push_str(&format!("references = [\"null_resource.r{}\"]\n", r - 1));
        }
        text.push('\n');
    }
    config(&text)
}

fn recorded_state() -> State {
    let mut builder = StateBuilder::new();
    for r in 0..RESOURCES {
        for i in 0..RECORDED {
            builder = builder.object(&format!("null_resource.r{r}[{i}]"), json!({}));
        }
    }
    builder.build()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_plan_and_apply_under_shared_state() {
    println!("\n[STRESS TEST] {RESOURCES} resources x {COUNT} instances, {RECORDED} recorded each...");
    let start = Instant::now();

    let config = wide_config();
    let provider = Arc::new(MockProvider::accepting(["null_resource"]).with_apply_delay(Duration::from_millis(1)));
    let ctx = context_with(Arc::clone(&provider)).with_config(WalkerConfig::default().with_parallelism(16));

    let planned = ctx.plan(&config, recorded_state()).await.unwrap();
    assert!(!planned.diagnostics.has_errors(), "{:?}", planned.diagnostics);

    let noop = planned.plan.changes.iter().filter(|c| c.action == Action::NoOp).count();
    let delete = planned.plan.changes.iter().filter(|c| c.action == Action::Delete).count();
    assert_eq!(noop, RESOURCES * COUNT);
    assert_eq!(delete, RESOURCES * (RECORDED - COUNT));
    assert_eq!(planned.plan.changes.len(), RESOURCES * RECORDED);

    let applied = ctx.apply(&config, &planned.plan).await.unwrap();
    assert!(!applied.diagnostics.has_errors(), "{:?}", applied.diagnostics);
    assert_eq!(provider.destroyed().len(), RESOURCES * (RECORDED - COUNT));
    assert_eq!(recorded_instances(&applied.state).len(), RESOURCES * COUNT);
    assert!(provider.max_concurrent_applies() <= 16);

    let duration = start.elapsed();
    println!("  Completed in {:.2}s", duration.as_secs_f64());
    assert!(
        duration < Duration::from_secs(10),
        "Stress test too slow: {:.2}s",
        duration.as_secs_f64()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_repeated_walks_are_deterministic() {
    let config = wide_config();
    let ctx = context_with(Arc::new(MockProvider::accepting(["null_resource"])))
        .with_config(WalkerConfig::default().with_parallelism(32));

    let first = ctx.plan(&config, recorded_state()).await.unwrap();
    for _ in 0..5 {
        let again = ctx.plan(&config, recorded_state()).await.unwrap();
        assert_eq!(again.plan, first.plan);
        assert_eq!(again.state, first.state);
        assert_eq!(again.summary, first.summary);
    }
}

fn unkeyed_state() -> State {
    let mut builder = StateBuilder::new();
    for r in 0..RESOURCES {
        let addr = format!("null_resource.u{r}");
        builder = builder
            .object(&addr, json!({"id": format!("u{r}")}))
            .deposed(&addr, json!({"id": format!("u{r}-old")}));
    }
    builder.build()
}

/// Every resource is either untouched or fully switched to count
fn assert_no_torn_resources(state: &State) {
    for rs in state.resources() {
        let unkeyed = rs.instances.contains_key(&InstanceKey::NoKey);
        let zero = rs.instances.contains_key(&InstanceKey::Int(0));
        assert!(unkeyed != zero, "{} has both or neither key", rs.addr);
        if unkeyed {
            assert_eq!(rs.each_mode, EachMode::Single, "{}", rs.addr);
            assert!(rs.provider.is_none(), "{}", rs.addr);
        } else {
            assert_eq!(rs.each_mode, EachMode::List, "{}", rs.addr);
            assert!(rs.provider.is_some(), "{}", rs.addr);
        }
        for record in rs.instances.values() {
            assert!(record.current.is_some() && record.deposed.is_some(), "{} lost an object", rs.addr);
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_snapshots_never_see_half_expanded_resources() {
    let shared = Arc::new(SyncState::new(unkeyed_state()));
    let finished = Arc::new(AtomicUsize::new(0));
    let mut tasks = JoinSet::new();

    for r in 0..RESOURCES {
        let shared = Arc::clone(&shared);
        let finished = Arc::clone(&finished);
        tasks.spawn(async move {
            tokio::task::yield_now().await;
            let addr = instance(&format!("null_resource.u{r}")).resource;
            {
                let mut state = shared.lock();
                assert!(state.fix_count_set_transition(&addr, true));
                state.set_resource_meta(&addr, EachMode::List, ProviderAddr::legacy("null"));
            }
            finished.fetch_add(1, Ordering::SeqCst);
        });
    }
    for _ in 0..4 {
        let shared = Arc::clone(&shared);
        let finished = Arc::clone(&finished);
        tasks.spawn(async move {
            while finished.load(Ordering::SeqCst) < RESOURCES {
                assert_no_torn_resources(&shared.snapshot());
                tokio::task::yield_now().await;
            }
        });
    }
    while let Some(joined) = tasks.join_next().await {
        joined.unwrap();
    }

    let state = shared.snapshot();
    assert_no_torn_resources(&state);
    assert!(state.resources().all(|rs| rs.each_mode == EachMode::List));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_concurrent_count_switch_keeps_every_object() {
    let mut text = String::new();
    for r in 0..RESOURCES {
        text.push_str(&format!(
            "[[resources]]\ntype = \"null_resource\"\nname = \"u{r}\"\ncount = {{ value = 1 }}\n\n"
        ));
    }
    let ctx = context_with(Arc::new(MockProvider::accepting(["null_resource"])))
        .with_config(WalkerConfig::default().with_parallelism(32));

    let planned = ctx.plan(&config(&text), unkeyed_state()).await.unwrap();
    assert!(!planned.diagnostics.has_errors(), "{:?}", planned.diagnostics);

    assert_no_torn_resources(&planned.state);
    assert_eq!(planned.state.resources().count(), RESOURCES);
    let noop = planned.plan.changes.iter().filter(|c| c.action == Action::NoOp && !c.deposed).count();
    let deposed = planned.plan.changes.iter().filter(|c| c.action == Action::Delete && c.deposed).count();
    assert_eq!(noop, RESOURCES);
    assert_eq!(deposed, RESOURCES);
    for r in 0..RESOURCES {
        let leftover = planned
            .plan
            .deposed_change(&instance(&format!("null_resource.u{r}[0]")))
            .expect("deposed object planned under its renamed key");
        assert_eq!(leftover.before, Some(json!({"id": format!("u{r}-old")})));
    }
}
