//! Opcode tables
//!
//! Each VM generation has one data table mapping an opcode byte to its
//! mnemonic, operand shape, control-flow class and stack effect. The decoder
//! reads operands generically from the shape, so adding an opcode only means
//! adding a row.

use super::VmGeneration;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

pub mod ultima7;
pub mod ultima8;

/// Encoding of a single operand field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperandKind {
    /// Unsigned 8-bit immediate
    Imm8,
    /// Signed 16-bit immediate
    Imm16,
    /// Signed 32-bit immediate
    Imm32,
    /// 16-bit offset into the record's text segment
    Data16,
    /// 32-bit offset into the record's text segment
    Data32,
    /// 16-bit jump distance from the end of the instruction
    Rel16,
    /// 32-bit jump distance from the end of the instruction
    Rel32,
    /// 8-bit local variable slot
    Local8,
    /// 16-bit local variable slot
    Local16,
    /// Static variable; negative values are global statics
    Static16,
    /// Class member variable
    ClassVar16,
    /// Global flag index
    Flag16,
    /// U7 index into the record's external link table
    Link16,
    /// 16-bit function id
    FunId16,
    /// 32-bit function id
    FunId32,
    /// U8 class id and entry offset pair naming a function
    ClassEntry,
    /// Intrinsic number
    Intrinsic16,
    /// 8-bit argument count
    ArgCount8,
    /// 16-bit argument count
    ArgCount16,
    /// Method slot in a class's vtable
    Method16,
    /// Class index
    ClassId16,
    /// u16 length followed by that many bytes of text
    InlineString,
}

impl OperandKind {
    /// Encoded width in bytes, `None` for variable-width operands
    pub fn width(self) -> Option<usize> {
        use OperandKind::*;
        match self {
            Imm8 | Local8 | ArgCount8 => Some(1),
            Imm16 | Data16 | Rel16 | Local16 | Static16 | ClassVar16 | Flag16 | Link16
            | FunId16 | Intrinsic16 | ArgCount16 | Method16 | ClassId16 => Some(2),
            Imm32 | Data32 | Rel32 | FunId32 | ClassEntry => Some(4),
            InlineString => None,
        }
    }
}

/// How an instruction affects control flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Flow {
    /// Falls through to the next instruction
    Next,
    /// Unconditional jump
    Jump,
    /// Falls through when the condition holds, jumps otherwise
    Branch,
    /// Array iteration step: falls into the body, jumps when exhausted
    Loop,
    /// Conversation loop head: falls into the body, jumps when it ends
    Converse,
    /// Returns from the function
    Return,
    /// Aborts the script
    Abort,
    /// Opens an exception handler at the jump target
    Try,
}

impl Flow {
    /// True for instructions that end a basic block without falling through
    pub fn is_terminator(self) -> bool {
        matches!(self, Flow::Jump | Flow::Return | Flow::Abort)
    }

    /// True for instructions whose operands carry a jump target
    pub fn has_target(self) -> bool {
        matches!(
            self,
            Flow::Jump | Flow::Branch | Flow::Loop | Flow::Converse | Flow::Try
        )
    }
}

/// Global flag access performed by an opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FlagAccess {
    Get,
    Set,
}

/// One row of an opcode table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpcodeDesc {
    pub opcode: u8,
    pub mnemonic: &'static str,
    pub operands: &'static [OperandKind],
    pub flow: Flow,
    /// Values popped, not counting dynamic argument lists
    pub pops: u8,
    /// Values pushed
    pub pushes: u8,
    pub flag_access: Option<FlagAccess>,
    /// Sets the function's return value
    pub returns_value: bool,
}

impl OpcodeDesc {
    pub(crate) fn new(
        opcode: u8,
        mnemonic: &'static str,
        operands: &'static [OperandKind],
        flow: Flow,
        pops: u8,
        pushes: u8,
    ) -> Self {
        Self {
            opcode,
            mnemonic,
            operands,
            flow,
            pops,
            pushes,
            flag_access: None,
            returns_value: false,
        }
    }

    pub(crate) fn flag(mut self, access: FlagAccess) -> Self {
        self.flag_access = Some(access);
        self
    }

    pub(crate) fn returning(mut self) -> Self {
        self.returns_value = true;
        self
    }

    /// Encoded size of the fixed-width part of the instruction
    pub fn fixed_size(&self) -> usize {
        1 + self
            .operands
            .iter()
            .map(|kind| kind.width().unwrap_or(2))
            .sum::<usize>()
    }
}

/// Opcode lookup table for one VM generation
#[derive(Debug)]
pub struct OpcodeTable {
    generation: VmGeneration,
    entries: Vec<Option<OpcodeDesc>>,
}

impl OpcodeTable {
    fn from_rows(generation: VmGeneration, rows: Vec<OpcodeDesc>) -> Self {
        let mut entries: Vec<Option<OpcodeDesc>> = vec![None; 256];
        for row in rows {
            let slot = row.opcode as usize;
            debug_assert!(entries[slot].is_none(), "duplicate opcode row 0x{:02x}", slot);
            entries[slot] = Some(row);
        }
        Self {
            generation,
            entries,
        }
    }

    pub fn generation(&self) -> VmGeneration {
        self.generation
    }

    pub fn get(&self, opcode: u8) -> Option<&OpcodeDesc> {
        self.entries[opcode as usize].as_ref()
    }

    /// All defined opcodes in ascending order
    pub fn iter(&self) -> impl Iterator<Item = &OpcodeDesc> {
        self.entries.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

static U7_TABLE: Lazy<OpcodeTable> =
    Lazy::new(|| OpcodeTable::from_rows(VmGeneration::U7, ultima7::rows()));

static U8_TABLE: Lazy<OpcodeTable> =
    Lazy::new(|| OpcodeTable::from_rows(VmGeneration::U8, ultima8::rows()));

/// Get the opcode table for a VM generation
pub fn table(generation: VmGeneration) -> &'static OpcodeTable {
    match generation {
        VmGeneration::U7 => &U7_TABLE,
        VmGeneration::U8 => &U8_TABLE,
    }
}
