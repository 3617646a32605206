//! Concurrent graph walker
//!
//! The walker owns the live edge set. Nodes run on tokio tasks as soon as
//! every dependency is done, bounded by a semaphore. A node that expands
//! dynamically has its subgraph spliced in place: the subgraph's sources
//! start immediately and its sink takes over the node's dependents.
//!
//! # Failure
//!
//! A failed node marks every transitive dependent failed without running
//! it. Work already running is never cancelled, and independent branches
//! finish.

use crate::context::WalkContext;
use crate::dag::Graph;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::WalkError;
use crate::node::GraphNode;
use crate::state_machine::{validate_transition, NodeState};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info_span, trace, warn, Instrument};

/// Node counts at the end of a walk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WalkSummary {
    /// Nodes that finished
    pub done: usize,
    /// Nodes whose own evaluation or expansion failed
    pub failed: usize,
    /// Nodes never run because a dependency failed
    pub skipped: usize,
}

/// Outcome of a walk
#[derive(Debug, Default)]
pub struct WalkResult {
    /// Diagnostics from every node, in completion order
    pub diagnostics: Diagnostics,
    /// Node counts
    pub summary: WalkSummary,
}

impl WalkResult {
    /// Check if any node failed
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0 || self.summary.skipped > 0 || self.diagnostics.has_errors()
    }
}

struct Slot {
    name: String,
    node: Option<GraphNode>,
    is_root: bool,
    state: NodeState,
    waiting_on: usize,
    dependents: Vec<usize>,
}

struct Finished {
    slot: usize,
    diagnostics: Diagnostics,
    subgraph: Option<Graph>,
}

/// Walks a graph to completion
#[derive(Debug)]
pub struct Walker {
    ctx: Arc<WalkContext>,
    semaphore: Arc<Semaphore>,
}

impl Walker {
    /// Walker running at most `parallelism` nodes at once
    #[must_use]
    pub fn new(ctx: Arc<WalkContext>, parallelism: usize) -> Self {
        Self {
            ctx,
            semaphore: Arc::new(Semaphore::new(parallelism.max(1))),
        }
    }

    /// Walk `graph` until nothing is pending, ready or running
    ///
    /// A panicking node resumes the panic on the caller.
    ///
    /// # Errors
    /// A cancelled task or an illegal node transition.
    pub async fn walk(&self, graph: Graph) -> Result<WalkResult, WalkError> {
        let mut slots: Vec<Slot> = Vec::new();
        let mut ready = VecDeque::new();
        splice(&mut slots, graph, &[], &mut ready);

        let mut result = WalkResult::default();
        let mut tasks: JoinSet<Finished> = JoinSet::new();

        loop {
            while let Some(id) = ready.pop_front() {
                transition(&mut slots[id], NodeState::Ready)?;
                transition(&mut slots[id], NodeState::Running)?;
                let Some(node) = slots[id].node.take() else {
                    continue;
                };
                trace!(node = %slots[id].name, "scheduling");
                let span = info_span!(parent: &self.ctx.span, "node", name = %slots[id].name);
                let ctx = Arc::clone(&self.ctx);
                let semaphore = Arc::clone(&self.semaphore);
                tasks.spawn(
                    async move {
                        let _permit = semaphore.acquire_owned().await;
                        let (diagnostics, subgraph) = evaluate(&ctx, node).await;
                        Finished {
                            slot: id,
                            diagnostics,
                            subgraph,
                        }
                    }
                    .instrument(span),
                );
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            let finished = match joined {
                Ok(finished) => finished,
                Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                Err(err) => return Err(WalkError::Join(err.to_string())),
            };

            let id = finished.slot;
            let failed = finished.diagnostics.has_errors();
            result.diagnostics.extend(finished.diagnostics);

            if failed {
                transition(&mut slots[id], NodeState::Failed)?;
                result.summary.failed += 1;
                result.summary.skipped += skip_dependents(&mut slots, id, &mut result.diagnostics)?;
                continue;
            }

            transition(&mut slots[id], NodeState::Done)?;
            result.summary.done += 1;
            let dependents = std::mem::take(&mut slots[id].dependents);
            match finished.subgraph {
                Some(subgraph) if !subgraph.is_empty() => {
                    trace!(node = %slots[id].name, nodes = subgraph.node_count(), "splicing subgraph");
                    splice(&mut slots, subgraph, &dependents, &mut ready);
                }
                _ => release(&mut slots, &dependents, &mut ready),
            }
        }

        Ok(result)
    }
}

async fn evaluate(ctx: &WalkContext, node: GraphNode) -> (Diagnostics, Option<Graph>) {
    let procedure = node.as_evaluable().map(|e| e.eval_procedure(ctx.operation));
    let mut diags = match procedure {
        Some(procedure) => procedure.run(ctx).await,
        None => Diagnostics::new(),
    };
    if diags.has_errors() {
        return (diags, None);
    }

    let subgraph = match node.as_dynamic_expand().map(|n| n.dynamic_expand(ctx)) {
        Some(Ok(graph)) => Some(graph),
        Some(Err(errs)) => {
            diags.extend(errs);
            None
        }
        None => None,
    };
    (diags, subgraph)
}

fn transition(slot: &mut Slot, to: NodeState) -> Result<(), WalkError> {
    if !validate_transition(slot.state, to) {
        return Err(WalkError::IllegalTransition {
            node: slot.name.clone(),
            from: slot.state,
            to,
        });
    }
    slot.state = to;
    Ok(())
}

/// Append `graph` to the slot table; its sinks inherit `dependents`
fn splice(slots: &mut Vec<Slot>, graph: Graph, dependents: &[usize], ready: &mut VecDeque<usize>) {
    let base = slots.len();
    let (nodes, edges) = graph.into_parts();
    let count = nodes.len();
    for node in nodes {
        slots.push(Slot {
            name: node.name(),
            is_root: node.is_root(),
            node: Some(node),
            state: NodeState::Pending,
            waiting_on: 0,
            dependents: Vec::new(),
        });
    }
    for (from, to) in edges {
        slots[base + from].dependents.push(base + to);
        slots[base + to].waiting_on += 1;
    }
    for id in base..base + count {
        if slots[id].dependents.is_empty() {
            slots[id].dependents.extend_from_slice(dependents);
            for dependent in dependents {
                slots[*dependent].waiting_on += 1;
            }
        }
    }
    // Every inherited dependent was waiting on the expanded node once.
    for dependent in dependents {
        slots[*dependent].waiting_on -= 1;
    }
    for id in base..base + count {
        if slots[id].waiting_on == 0 {
            ready.push_back(id);
        }
    }
}

fn release(slots: &mut [Slot], dependents: &[usize], ready: &mut VecDeque<usize>) {
    for &dependent in dependents {
        let slot = &mut slots[dependent];
        slot.waiting_on -= 1;
        if slot.waiting_on == 0 && slot.state == NodeState::Pending {
            ready.push_back(dependent);
        }
    }
}

fn skip_dependents(slots: &mut [Slot], failed: usize, diags: &mut Diagnostics) -> Result<usize, WalkError> {
    let cause = slots[failed].name.clone();
    let mut stack = std::mem::take(&mut slots[failed].dependents);
    let mut skipped = 0;
    while let Some(id) = stack.pop() {
        if slots[id].state != NodeState::Pending {
            continue;
        }
        transition(&mut slots[id], NodeState::Failed)?;
        slots[id].node = None;
        skipped += 1;
        if !slots[id].is_root {
            warn!(node = %slots[id].name, dependency = %cause, "skipping node after dependency failure");
            diags.push(
                Diagnostic::warning("Skipped", format!("a dependency of this node failed: {cause}"))
                    .with_address(&slots[id].name),
            );
        }
        stack.extend(slots[id].dependents.iter().copied());
    }
    Ok(skipped)
}
