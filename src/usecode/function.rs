//! Decoded function records

use super::opcodes::{self, FlagAccess, Flow, OpcodeDesc};
use super::symbol_table::ClassRef;
use super::VmGeneration;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A decoded operand value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    Immediate(i32),
    /// Text referenced by offset into the record's data segment
    StringLiteral { offset: u32, text: String },
    /// Text stored inside the instruction stream
    InlineString(String),
    FunctionRef(u32),
    Flag(u32),
    /// Absolute offset within the function's code segment
    JumpTarget(u32),
    Local(u16),
    Static(i16),
    ClassVar(u16),
    Intrinsic(u16),
    ArgCount(u16),
    Method(u16),
    ClassId(u16),
}

/// One decoded instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: u8,
    /// Offset from the start of the code segment
    pub offset: u32,
    /// Encoded size in bytes, opcode included
    pub size: u32,
    pub raw: Vec<u8>,
    pub operands: Vec<Operand>,
}

impl Instruction {
    /// Offset of the instruction that follows this one
    pub fn next_offset(&self) -> u32 {
        self.offset + self.size
    }

    /// First jump target among the operands, if any
    pub fn jump_target(&self) -> Option<u32> {
        self.operands.iter().find_map(|op| match op {
            Operand::JumpTarget(t) => Some(*t),
            _ => None,
        })
    }

    /// First flag-index operand, if any
    pub fn flag_index(&self) -> Option<u32> {
        self.operands.iter().find_map(|op| match op {
            Operand::Flag(f) => Some(*f),
            _ => None,
        })
    }

    /// Function ids referenced by this instruction
    pub fn called_function(&self) -> Option<u32> {
        self.operands.iter().find_map(|op| match op {
            Operand::FunctionRef(id) => Some(*id),
            _ => None,
        })
    }

    /// Look up the opcode description for this instruction
    pub fn desc(&self, generation: VmGeneration) -> Option<&'static OpcodeDesc> {
        opcodes::table(generation).get(self.opcode)
    }

    pub fn flow(&self, generation: VmGeneration) -> Flow {
        self.desc(generation).map(|d| d.flow).unwrap_or(Flow::Next)
    }

    pub fn flag_access(&self, generation: VmGeneration) -> Option<FlagAccess> {
        self.desc(generation).and_then(|d| d.flag_access)
    }
}

/// A NUL-terminated string from a record's data segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataString {
    pub offset: u32,
    pub text: String,
}

/// One decoded function record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsecodeFunction {
    pub id: u32,
    pub num_args: u16,
    pub num_locals: u16,
    pub returns_value: bool,
    pub always_aborts: bool,
    pub class_id: Option<ClassRef>,
    pub uses_ext32_encoding: bool,
    pub instructions: Vec<Instruction>,
    /// Image offset of the first header byte
    pub raw_offset: u32,
    /// Size of the whole record, header included
    pub raw_size: u32,
    pub data_size: u32,
    pub code_size: u32,
    /// External function table used by U7 `call`
    pub links: Vec<u32>,
    pub data_strings: Vec<DataString>,
    /// Name recorded by a `dbgfunc` instruction
    pub debug_name: Option<String>,
}

impl UsecodeFunction {
    /// Instruction starting exactly at `offset`
    pub fn instruction_at(&self, offset: u32) -> Option<&Instruction> {
        self.instructions
            .binary_search_by_key(&offset, |i| i.offset)
            .ok()
            .map(|idx| &self.instructions[idx])
    }

    /// Data string starting exactly at `offset`
    pub fn data_string(&self, offset: u32) -> Option<&DataString> {
        self.data_strings.iter().find(|s| s.offset == offset)
    }

    /// Offsets that some jump instruction targets
    pub fn jump_targets(&self) -> Vec<u32> {
        let mut targets: Vec<u32> = self
            .instructions
            .iter()
            .filter_map(Instruction::jump_target)
            .collect();
        targets.sort_unstable();
        targets.dedup();
        targets
    }
}

impl fmt::Display for UsecodeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "UsecodeFunction(id=0x{:04X}, args={}, locals={}, instructions={}{}{})",
            self.id,
            self.num_args,
            self.num_locals,
            self.instructions.len(),
            if self.returns_value { ", returns" } else { "" },
            if self.uses_ext32_encoding { ", ext32" } else { "" }
        )
    }
}

/// Split a data segment into its NUL-terminated strings
pub fn split_data_strings(data: &[u8]) -> Vec<DataString> {
    let mut strings = Vec::new();
    let mut start = 0usize;
    for (i, &b) in data.iter().enumerate() {
        if b == 0 {
            strings.push(DataString {
                offset: start as u32,
                text: super::cursor::decode_text(&data[start..i]),
            });
            start = i + 1;
        }
    }
    if start < data.len() {
        strings.push(DataString {
            offset: start as u32,
            text: super::cursor::decode_text(&data[start..]),
        });
    }
    strings
}
