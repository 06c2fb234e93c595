// src/dag/graph.rs

use std::collections::HashSet;

use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Dfs;

use crate::dag::node::{GraphNode, NodeId};

/// Dependency graph over the *non-terminal* nodes of a solve.
///
/// Edge direction: dependant -> dependency. For a process node of `build.api`
/// waiting on `resolve-action.build.api` we add
/// `process:build.api -> process:resolve-action.build.api`.
///
/// Terminal nodes are left out entirely, so a node with no outgoing edge is a
/// leaf: everything it waits on has settled.
#[derive(Debug)]
pub(crate) struct PendingGraph {
    graph: DiGraphMap<NodeId, ()>,
    /// `graph` plus the declared process dependencies of nodes still waiting
    /// on their status check.
    declared: DiGraphMap<NodeId, ()>,
}

impl PendingGraph {
    /// Rebuild the graph from the node arena.
    pub fn build<O>(nodes: &[GraphNode<O>]) -> Self {
        let mut graph: DiGraphMap<NodeId, ()> = DiGraphMap::new();

        for node in nodes.iter().filter(|n| !n.state.is_terminal()) {
            graph.add_node(node.id);
        }

        for node in nodes.iter().filter(|n| !n.state.is_terminal()) {
            for dep in &node.dependencies {
                if !nodes[dep.id].state.is_terminal() {
                    graph.add_edge(node.id, dep.id, ());
                }
            }
        }

        let mut declared = graph.clone();
        for node in nodes.iter().filter(|n| !n.state.is_terminal()) {
            for dep in &node.declared {
                if !nodes[*dep].state.is_terminal() {
                    declared.add_edge(node.id, *dep, ());
                }
            }
        }

        Self { graph, declared }
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.graph.contains_node(id)
    }

    /// Nodes with no non-terminal dependency.
    pub fn leaves(&self) -> Vec<NodeId> {
        let mut leaves: Vec<NodeId> = self
            .graph
            .nodes()
            .filter(|n| {
                self.graph
                    .neighbors_directed(*n, Direction::Outgoing)
                    .next()
                    .is_none()
            })
            .collect();
        leaves.sort_unstable();
        leaves
    }

    /// Strongly connected components that form a cycle (more than one node,
    /// or a single node depending on itself).
    ///
    /// Declared process dependencies count, so a cycle is reported before any
    /// status check inside it is dispatched.
    pub fn cycles(&self) -> Vec<Vec<NodeId>> {
        tarjan_scc(&self.declared)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1
                    || scc
                        .first()
                        .is_some_and(|n| self.declared.contains_edge(*n, *n))
            })
            .collect()
    }

    /// All nodes reachable from `roots` (roots included, when present).
    pub fn reachable_from(&self, roots: &[NodeId]) -> HashSet<NodeId> {
        let mut seen = HashSet::new();
        let mut roots = roots.iter().filter(|r| self.graph.contains_node(**r));

        let Some(first) = roots.next() else {
            return seen;
        };

        let mut dfs = Dfs::new(&self.graph, *first);
        while let Some(n) = dfs.next(&self.graph) {
            seen.insert(n);
        }

        for root in roots {
            dfs.move_to(*root);
            while let Some(n) = dfs.next(&self.graph) {
                seen.insert(n);
            }
        }

        seen
    }
}
