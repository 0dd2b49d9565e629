//! Global flag cross-reference

use crate::usecode::opcodes::FlagAccess;
use crate::usecode::{UsecodeFunction, VmGeneration};
use serde::Serialize;

/// One static read or write of a global flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FlagUsage {
    pub function_id: u32,
    pub offset: u32,
    pub flag_index: u32,
    pub access: FlagAccess,
}

/// The same usages sorted two ways
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlagUsageViews {
    /// Ascending function id, then offset
    pub by_function: Vec<FlagUsage>,
    /// Ascending flag index, then function id
    pub by_flag: Vec<FlagUsage>,
}

impl FlagUsageViews {
    pub fn collect(functions: &[UsecodeFunction], generation: VmGeneration) -> Self {
        let mut usages = Vec::new();
        for function in functions {
            for instr in &function.instructions {
                let (Some(access), Some(flag_index)) =
                    (instr.flag_access(generation), instr.flag_index())
                else {
                    continue;
                };
                usages.push(FlagUsage {
                    function_id: function.id,
                    offset: instr.offset,
                    flag_index,
                    access,
                });
            }
        }

        let mut by_function = usages.clone();
        by_function.sort_by_key(|u| (u.function_id, u.offset));
        let mut by_flag = usages;
        by_flag.sort_by_key(|u| (u.flag_index, u.function_id));
        log::debug!("Collected {} flag usages", by_function.len());

        Self { by_function, by_flag }
    }

    pub fn len(&self) -> usize {
        self.by_function.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_function.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecode::{Instruction, Operand};

    fn instr(opcode: u8, offset: u32, operands: Vec<Operand>) -> Instruction {
        Instruction {
            opcode,
            offset,
            size: 3,
            raw: Vec::new(),
            operands,
        }
    }

    fn function(id: u32, instructions: Vec<Instruction>) -> UsecodeFunction {
        UsecodeFunction {
            id,
            num_args: 0,
            num_locals: 0,
            returns_value: false,
            always_aborts: false,
            class_id: None,
            uses_ext32_encoding: false,
            instructions,
            raw_offset: 0,
            raw_size: 0,
            data_size: 0,
            code_size: 0,
            links: Vec::new(),
            data_strings: Vec::new(),
            debug_name: None,
        }
    }

    #[test]
    fn both_views_hold_the_same_usages() {
        let functions = vec![
            function(
                0x500,
                vec![
                    instr(0x42, 0, vec![Operand::Flag(7)]),
                    instr(0x1f, 3, vec![Operand::Immediate(7)]),
                    instr(0x43, 6, vec![Operand::Flag(2)]),
                ],
            ),
            function(0x401, vec![instr(0x43, 0, vec![Operand::Flag(7)])]),
        ];
        let views = FlagUsageViews::collect(&functions, VmGeneration::U7);
        assert_eq!(views.len(), 3);
        assert_eq!(
            views.by_function.iter().map(|u| (u.function_id, u.offset)).collect::<Vec<_>>(),
            vec![(0x401, 0), (0x500, 0), (0x500, 6)]
        );
        assert_eq!(
            views.by_flag.iter().map(|u| (u.flag_index, u.function_id)).collect::<Vec<_>>(),
            vec![(2, 0x500), (7, 0x401), (7, 0x500)]
        );

        let mut a = views.by_function.clone();
        let mut b = views.by_flag.clone();
        a.sort();
        b.sort();
        assert_eq!(a, b);
    }

    #[test]
    fn pushi_is_not_a_flag_access() {
        let functions = vec![function(0x500, vec![instr(0x1f, 0, vec![Operand::Immediate(1)])])];
        assert!(FlagUsageViews::collect(&functions, VmGeneration::U7).is_empty());
    }
}
