//! Basic block module
//!
//! This module contains the Block struct and related functionality.

use crate::usecode::opcodes::Flow;
use crate::usecode::{Instruction, VmGeneration};
use serde::{Deserialize, Serialize};

/// Basic block containing a straight run of instructions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// Instructions in this block
    pub instructions: Vec<Instruction>,
    /// Code offset of the first instruction
    pub start_pc: u32,
    /// Code offset just past the last instruction
    pub end_pc: u32,
    /// Synthetic function exit
    exit: bool,
}

impl Block {
    /// Create a new basic block
    pub fn new(start_pc: u32, instructions: Vec<Instruction>) -> Self {
        let end_pc = instructions
            .last()
            .map(Instruction::next_offset)
            .unwrap_or(start_pc);
        Self {
            instructions,
            start_pc,
            end_pc,
            exit: false,
        }
    }

    /// Create the synthetic exit node every return edge points at
    pub fn new_exit() -> Self {
        Self {
            instructions: Vec::new(),
            start_pc: u32::MAX,
            end_pc: u32::MAX,
            exit: true,
        }
    }

    pub fn is_exit(&self) -> bool {
        self.exit
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    pub fn contains_pc(&self, pc: u32) -> bool {
        pc >= self.start_pc && pc < self.end_pc
    }

    pub fn last_instruction(&self) -> Option<&Instruction> {
        self.instructions.last()
    }

    /// Control-flow class of the last instruction
    pub fn terminator_flow(&self, generation: VmGeneration) -> Flow {
        self.last_instruction()
            .map(|i| i.flow(generation))
            .unwrap_or(Flow::Next)
    }
}
