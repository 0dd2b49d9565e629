//! Dominator, post-dominator and loop analysis

use crate::cfg::{Block, EdgeKind};
use petgraph::algo::dominators::{self, Dominators};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Post-dominator information rooted at the synthetic exit
#[derive(Debug, Clone)]
pub struct PostDominatorAnalysis {
    immediate: HashMap<NodeIndex, NodeIndex>,
}

impl PostDominatorAnalysis {
    pub fn compute(graph: &DiGraph<Block, EdgeKind>, exit: NodeIndex) -> Self {
        let doms = dominators::simple_fast(Reversed(graph), exit);
        let immediate = graph
            .node_indices()
            .filter_map(|n| doms.immediate_dominator(n).map(|d| (n, d)))
            .collect();
        Self { immediate }
    }

    /// Closest node every path from `node` to the exit passes through
    pub fn immediate_post_dominator(&self, node: NodeIndex) -> Option<NodeIndex> {
        self.immediate.get(&node).copied()
    }
}

/// A natural loop; several back edges to one header are merged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loop {
    pub header: NodeIndex,
    pub body_nodes: HashSet<NodeIndex>,
    pub back_edges: Vec<(NodeIndex, NodeIndex)>,
    /// Targets outside the body, in ascending node order
    pub exit_nodes: BTreeSet<NodeIndex>,
}

impl Loop {
    pub fn contains(&self, node: NodeIndex) -> bool {
        self.body_nodes.contains(&node)
    }
}

/// Loops keyed by header
#[derive(Debug, Clone, Default)]
pub struct LoopAnalysis {
    pub loops: HashMap<NodeIndex, Loop>,
}

impl LoopAnalysis {
    pub fn compute(
        graph: &DiGraph<Block, EdgeKind>,
        dominators: &Dominators<NodeIndex>,
        exit: NodeIndex,
    ) -> Self {
        let mut loops: HashMap<NodeIndex, Loop> = HashMap::new();
        for edge in graph.edge_indices() {
            let Some((source, target)) = graph.edge_endpoints(edge) else {
                continue;
            };
            if !dominates(dominators, target, source) {
                continue;
            }
            let body = loop_body(graph, dominators, target, source);
            let entry = loops.entry(target).or_insert_with(|| Loop {
                header: target,
                body_nodes: HashSet::new(),
                back_edges: Vec::new(),
                exit_nodes: BTreeSet::new(),
            });
            entry.body_nodes.extend(body);
            entry.back_edges.push((source, target));
        }

        for l in loops.values_mut() {
            l.exit_nodes = l
                .body_nodes
                .iter()
                .flat_map(|&n| graph.neighbors_directed(n, Direction::Outgoing))
                .filter(|s| !l.body_nodes.contains(s) && *s != exit)
                .collect();
        }

        Self { loops }
    }

    pub fn get(&self, header: NodeIndex) -> Option<&Loop> {
        self.loops.get(&header)
    }

    pub fn is_header(&self, node: NodeIndex) -> bool {
        self.loops.contains_key(&node)
    }
}

/// Entry-rooted dominators
pub fn analyze_dominators(
    graph: &DiGraph<Block, EdgeKind>,
    entry: NodeIndex,
) -> Dominators<NodeIndex> {
    dominators::simple_fast(graph, entry)
}

/// True when `dominator` dominates `node`; every node dominates itself
pub fn dominates(dominators: &Dominators<NodeIndex>, dominator: NodeIndex, node: NodeIndex) -> bool {
    if dominator == node {
        return dominators.immediate_dominator(node).is_some() || dominators.root() == node;
    }
    let mut current = node;
    while let Some(idom) = dominators.immediate_dominator(current) {
        if idom == dominator {
            return true;
        }
        current = idom;
    }
    false
}

/// Nodes dominated by `header` that reach `tail` without passing through it
fn loop_body(
    graph: &DiGraph<Block, EdgeKind>,
    dominators: &Dominators<NodeIndex>,
    header: NodeIndex,
    tail: NodeIndex,
) -> HashSet<NodeIndex> {
    let mut body = HashSet::new();
    body.insert(header);
    let mut worklist = vec![tail];
    while let Some(node) = worklist.pop() {
        if !body.insert(node) {
            continue;
        }
        for pred in graph.neighbors_directed(node, Direction::Incoming) {
            if !body.contains(&pred) && dominates(dominators, header, pred) {
                worklist.push(pred);
            }
        }
    }
    body
}

/// Nodes reachable from `entry`
pub fn reachable(graph: &DiGraph<Block, EdgeKind>, entry: NodeIndex) -> HashSet<NodeIndex> {
    let mut seen = HashSet::new();
    let mut dfs = Dfs::new(graph, entry);
    while let Some(node) = dfs.next(graph) {
        seen.insert(node);
    }
    seen
}
