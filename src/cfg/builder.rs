//! CFG builder module
//!
//! Splits a function's instructions at leaders and links the resulting
//! blocks. Every return, abort and fall-off-the-end path gets an edge to one
//! synthetic exit node so post-dominators have a single root.

use crate::cfg::{Block, EdgeKind};
use crate::usecode::opcodes::Flow;
use crate::usecode::{Instruction, UsecodeFunction, VmGeneration};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeSet, HashMap};

/// CFG builder for one function
pub struct CfgBuilder<'a> {
    function: &'a UsecodeFunction,
    generation: VmGeneration,
    /// Mapping from block start PC to node index
    block_starts: HashMap<u32, NodeIndex>,
    exit_node: Option<NodeIndex>,
}

impl<'a> CfgBuilder<'a> {
    pub fn new(function: &'a UsecodeFunction, generation: VmGeneration) -> Self {
        Self {
            function,
            generation,
            block_starts: HashMap::new(),
            exit_node: None,
        }
    }

    /// Build the graph; the exit node is always the last node added
    pub fn build(&mut self) -> DiGraph<Block, EdgeKind> {
        self.block_starts.clear();
        self.exit_node = None;

        let instructions = &self.function.instructions;
        let mut graph = DiGraph::new();

        let leaders = self.find_leaders(instructions);
        for block in self.create_blocks(instructions, &leaders) {
            let start = block.start_pc;
            let node = graph.add_node(block);
            self.block_starts.insert(start, node);
        }

        let exit = graph.add_node(Block::new_exit());
        self.exit_node = Some(exit);

        self.add_edges(&mut graph, exit);
        graph
    }

    /// Offsets that start a basic block
    pub fn find_leaders(&self, instructions: &[Instruction]) -> BTreeSet<u32> {
        let mut leaders = BTreeSet::new();
        if instructions.is_empty() {
            return leaders;
        }
        leaders.insert(instructions[0].offset);

        let code_end = self.function.code_size;
        for instr in instructions {
            let flow = instr.flow(self.generation);
            if let Some(target) = instr.jump_target() {
                if target < code_end {
                    leaders.insert(target);
                }
            }
            if flow.has_target() || flow.is_terminator() {
                let next = instr.next_offset();
                if next < code_end {
                    leaders.insert(next);
                }
            }
        }
        leaders
    }

    fn create_blocks(&self, instructions: &[Instruction], leaders: &BTreeSet<u32>) -> Vec<Block> {
        let mut blocks = Vec::new();
        let mut current: Vec<Instruction> = Vec::new();
        let mut start = 0u32;

        for instr in instructions {
            if leaders.contains(&instr.offset) && !current.is_empty() {
                blocks.push(Block::new(start, std::mem::take(&mut current)));
            }
            if current.is_empty() {
                start = instr.offset;
            }
            current.push(instr.clone());
        }
        if !current.is_empty() {
            blocks.push(Block::new(start, current));
        }
        blocks
    }

    fn node_for(&self, pc: u32, exit: NodeIndex) -> NodeIndex {
        self.block_starts.get(&pc).copied().unwrap_or(exit)
    }

    fn add_edges(&self, graph: &mut DiGraph<Block, EdgeKind>, exit: NodeIndex) {
        let nodes: Vec<NodeIndex> = graph
            .node_indices()
            .filter(|&n| !graph[n].is_exit())
            .collect();

        for node in nodes {
            let (flow, end_pc, target) = {
                let block = &graph[node];
                let Some(last) = block.last_instruction() else {
                    continue;
                };
                (last.flow(self.generation), block.end_pc, last.jump_target())
            };
            let next = self.node_for(end_pc, exit);
            let taken = target.map(|t| self.node_for(t, exit)).unwrap_or(exit);

            match flow {
                Flow::Next => {
                    graph.add_edge(node, next, EdgeKind::Fall);
                }
                Flow::Jump => {
                    graph.add_edge(node, taken, EdgeKind::Uncond);
                }
                Flow::Branch | Flow::Loop | Flow::Converse => {
                    graph.add_edge(node, next, EdgeKind::True);
                    graph.add_edge(node, taken, EdgeKind::False);
                }
                Flow::Try => {
                    graph.add_edge(node, next, EdgeKind::Fall);
                    graph.add_edge(node, taken, EdgeKind::Handler);
                }
                Flow::Return | Flow::Abort => {
                    graph.add_edge(node, exit, EdgeKind::Exit);
                }
            }
        }
    }

    pub fn get_block_at_pc(&self, pc: u32) -> Option<NodeIndex> {
        self.block_starts.get(&pc).copied()
    }

    pub fn exit_node(&self) -> Option<NodeIndex> {
        self.exit_node
    }
}
