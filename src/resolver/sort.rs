//! Load order planning using depth-first search (DFS)
//!
//! Produces a linear order in which every bundle comes after all of its
//! dependencies.
//!
//! ## Algorithm
//!
//! Iterative post-order DFS with three-color marking and an explicit stack of
//! `(node, next edge)` frames, so deep chains cannot overflow the call stack:
//!
//! 1. **Unvisited**: node hasn't been processed
//! 2. **InProgress**: node is on the current stack
//! 3. **Done**: node and all of its dependencies have been emitted
//!
//! Reaching an `InProgress` node means the stack closes a cycle. Roots are
//! visited in graph insertion order and dependencies in edge order, so the
//! result is deterministic.
//!
//! ```text
//! Dependencies:
//!   app → ui, net
//!   ui  → core
//!   net → core
//!
//! Result: [core, ui, net, app]   (core emitted once)
//! ```

use super::graph::DependencyGraph;
use crate::error::{Result, circular_dependency};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Graph node indices in load order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOrder(Vec<usize>);

impl LoadOrder {
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Plan the load order of a resolved graph
///
/// # Errors
///
/// Returns `CircularDependency` with the offending chain (`a -> b -> a`) if
/// the graph contains a cycle.
pub fn plan(graph: &DependencyGraph) -> Result<LoadOrder> {
    let nodes = graph.nodes();
    let mut marks = vec![Mark::Unvisited; nodes.len()];
    let mut order = Vec::with_capacity(nodes.len());

    for root in 0..nodes.len() {
        if marks[root] != Mark::Unvisited {
            continue;
        }

        marks[root] = Mark::InProgress;
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];

        while let Some(frame) = stack.last_mut() {
            let (node, next) = *frame;
            if let Some(&dep) = nodes[node].dependencies.get(next) {
                frame.1 += 1;
                match marks[dep] {
                    Mark::Unvisited => {
                        marks[dep] = Mark::InProgress;
                        stack.push((dep, 0));
                    }
                    Mark::InProgress => {
                        return Err(circular_dependency(render_chain(graph, &stack, dep)));
                    }
                    Mark::Done => {}
                }
            } else {
                // post-order: all dependencies emitted
                marks[node] = Mark::Done;
                order.push(node);
                stack.pop();
            }
        }
    }

    Ok(LoadOrder(order))
}

/// Render the cycle closed by reaching `repeat` from the top of `stack`
fn render_chain(graph: &DependencyGraph, stack: &[(usize, usize)], repeat: usize) -> String {
    let name = |index: usize| {
        graph
            .node(index)
            .map_or("?", |node| node.manifest.name.as_str())
    };
    stack
        .iter()
        .map(|&(node, _)| node)
        .skip_while(|&node| node != repeat)
        .chain(std::iter::once(repeat))
        .map(name)
        .collect::<Vec<_>>()
        .join(" -> ")
}
