//! Control Flow Graph (CFG) module
//!
//! This module builds and analyzes control flow graphs over a decoded
//! function's instructions, and structures them into nested regions for
//! the pseudo-source renderer.

pub mod analysis;
pub mod block;
pub mod builder;
pub mod structure;

pub use block::Block;
pub use structure::{LoopKind, Region};

use crate::usecode::{UsecodeFunction, VmGeneration};
use petgraph::algo::dominators::Dominators;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Edge kind in the control flow graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Fallthrough to next block
    Fall,
    /// Unconditional jump
    Uncond,
    /// Condition held; the instruction fell through
    True,
    /// Condition failed; the jump was taken
    False,
    /// Exception handler opened by `starttry`
    Handler,
    /// Return or abort into the synthetic exit
    Exit,
}

/// Main CFG struct that provides high-level interface
#[derive(Debug, Clone)]
pub struct Cfg {
    graph: DiGraph<Block, EdgeKind>,
    entry: Option<NodeIndex>,
    exit: NodeIndex,
    generation: VmGeneration,
}

impl Cfg {
    /// Build the CFG of one function
    pub fn build(function: &UsecodeFunction, generation: VmGeneration) -> Self {
        let mut builder = builder::CfgBuilder::new(function, generation);
        let graph = builder.build();
        let entry = function
            .instructions
            .first()
            .and_then(|i| builder.get_block_at_pc(i.offset));
        // The builder always adds the exit; fall back to the last node
        let exit = builder
            .exit_node()
            .unwrap_or_else(|| NodeIndex::new(graph.node_count().saturating_sub(1)));
        Self {
            graph,
            entry,
            exit,
            generation,
        }
    }

    /// Get the underlying graph
    pub fn graph(&self) -> &DiGraph<Block, EdgeKind> {
        &self.graph
    }

    /// First block, `None` for a function without code
    pub fn entry_node(&self) -> Option<NodeIndex> {
        self.entry
    }

    pub fn exit_node(&self) -> NodeIndex {
        self.exit
    }

    pub fn generation(&self) -> VmGeneration {
        self.generation
    }

    pub fn block(&self, node: NodeIndex) -> &Block {
        &self.graph[node]
    }

    /// Number of real blocks, the synthetic exit excluded
    pub fn block_count(&self) -> usize {
        self.graph.node_count().saturating_sub(1)
    }

    /// Successor along an edge of the given kind
    pub fn successor(&self, node: NodeIndex, kind: EdgeKind) -> Option<NodeIndex> {
        self.graph
            .edges_directed(node, Direction::Outgoing)
            .find(|e| *e.weight() == kind)
            .map(|e| e.target())
    }

    pub fn successors(&self, node: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors_directed(node, Direction::Outgoing)
    }

    /// Analyze dominators for the CFG
    pub fn analyze_dominators(&self) -> Option<Dominators<NodeIndex>> {
        self.entry
            .map(|entry| analysis::analyze_dominators(&self.graph, entry))
    }

    pub fn analyze_post_dominators(&self) -> analysis::PostDominatorAnalysis {
        analysis::PostDominatorAnalysis::compute(&self.graph, self.exit)
    }

    pub fn analyze_loops(&self, dominators: &Dominators<NodeIndex>) -> analysis::LoopAnalysis {
        analysis::LoopAnalysis::compute(&self.graph, dominators, self.exit)
    }

    /// Blocks reachable from the entry, the exit excluded
    pub fn reachable_blocks(&self) -> HashSet<NodeIndex> {
        let Some(entry) = self.entry else {
            return HashSet::new();
        };
        let mut seen = analysis::reachable(&self.graph, entry);
        seen.remove(&self.exit);
        seen
    }

    /// Get blocks in code order
    pub fn blocks_in_order(&self) -> Vec<NodeIndex> {
        let mut nodes: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&n| !self.graph[n].is_exit())
            .collect();
        nodes.sort_by_key(|&n| self.graph[n].start_pc);
        nodes
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::usecode::{Instruction, Operand, UsecodeFunction};

    /// Assemble a U7 instruction list from `(opcode, operands)` pairs.
    /// Sizes follow the U7 16-bit encoding.
    pub fn u7(program: Vec<(u8, Vec<Operand>)>) -> UsecodeFunction {
        let mut offset = 0u32;
        let mut instructions = Vec::new();
        for (opcode, operands) in program {
            let size = match opcode {
                0x02 | 0x5c | 0x5f => 11,
                0x07 | 0x31 | 0x4d | 0x57 => 5,
                0x38 | 0x39 => 4,
                0x44 | 0xd4 => 2,
                0x04..=0x06 | 0x12 | 0x1c..=0x1f | 0x21 | 0x24 | 0x26 | 0x2f | 0x42 | 0x43 | 0x46 | 0x47 | 0x4c
                | 0x50..=0x52 | 0x54..=0x56 | 0x58 | 0x5a | 0x5b | 0x5d | 0x5e | 0x61 => 3,
                _ => 1,
            };
            instructions.push(Instruction {
                opcode,
                offset,
                size,
                raw: Vec::new(),
                operands,
            });
            offset += size;
        }
        UsecodeFunction {
            id: 0x401,
            num_args: 0,
            num_locals: 4,
            returns_value: false,
            always_aborts: false,
            class_id: None,
            uses_ext32_encoding: false,
            instructions,
            raw_offset: 0,
            raw_size: 0,
            data_size: 0,
            code_size: offset,
            links: Vec::new(),
            data_strings: Vec::new(),
            debug_name: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::u7;
    use super::*;
    use crate::usecode::Operand::*;

    #[test]
    fn branches_and_returns_reach_the_exit() {
        // 0: push var0; 3: jne L7; 6: ret; 7: ret
        let function = u7(vec![
            (0x21, vec![Local(0)]),
            (0x05, vec![JumpTarget(7)]),
            (0x25, vec![]),
            (0x25, vec![]),
        ]);
        let cfg = Cfg::build(&function, VmGeneration::U7);
        assert_eq!(cfg.block_count(), 3);
        let entry = cfg.entry_node().unwrap();
        let then = cfg.successor(entry, EdgeKind::True).unwrap();
        let other = cfg.successor(entry, EdgeKind::False).unwrap();
        assert_eq!(cfg.block(then).start_pc, 6);
        assert_eq!(cfg.block(other).start_pc, 7);
        assert_eq!(cfg.successor(then, EdgeKind::Exit), Some(cfg.exit_node()));
        assert_eq!(cfg.reachable_blocks().len(), 3);
    }

    #[test]
    fn post_dominator_of_a_diamond_is_the_join() {
        // 0: push var0; 3: jne L12; 6: pushi 1; 9: jmp L15; 12: pushi 2; 15: ret
        let function = u7(vec![
            (0x21, vec![Local(0)]),
            (0x05, vec![JumpTarget(12)]),
            (0x1f, vec![Immediate(1)]),
            (0x06, vec![JumpTarget(15)]),
            (0x1f, vec![Immediate(2)]),
            (0x25, vec![]),
        ]);
        let cfg = Cfg::build(&function, VmGeneration::U7);
        let pdom = cfg.analyze_post_dominators();
        let entry = cfg.entry_node().unwrap();
        let join = pdom.immediate_post_dominator(entry).unwrap();
        assert_eq!(cfg.block(join).start_pc, 15);
    }

    #[test]
    fn back_edge_forms_a_loop() {
        // 0: push var0; 3: jne L9; 6: jmp L0; 9: ret
        let function = u7(vec![
            (0x21, vec![Local(0)]),
            (0x05, vec![JumpTarget(9)]),
            (0x06, vec![JumpTarget(0)]),
            (0x25, vec![]),
        ]);
        let cfg = Cfg::build(&function, VmGeneration::U7);
        let doms = cfg.analyze_dominators().unwrap();
        let loops = cfg.analyze_loops(&doms);
        let entry = cfg.entry_node().unwrap();
        let lp = loops.get(entry).unwrap();
        assert_eq!(lp.body_nodes.len(), 2);
        assert_eq!(lp.exit_nodes.len(), 1);
    }

    #[test]
    fn empty_function_has_only_the_exit() {
        let function = u7(vec![]);
        let cfg = Cfg::build(&function, VmGeneration::U7);
        assert!(cfg.entry_node().is_none());
        assert_eq!(cfg.block_count(), 0);
        assert!(cfg.reachable_blocks().is_empty());
    }
}
