//! Assembly listing
//!
//! Prints the record header as directives, the data segment, and then one
//! line per instruction. Jump targets get `Lxxxx:` labels. Raw bytes and
//! auto-comments are optional columns.

use super::{FunctionRenderer, RenderContext};
use crate::ast::nodes::{quote, VarRef};
use crate::error::Result;
use crate::usecode::{Instruction, Operand, UsecodeFunction, VmGeneration};
use std::collections::HashSet;
use std::fmt::Write;

const MNEMONIC_WIDTH: usize = 14;
const RAW_WIDTH: usize = 3 * 12;

pub struct AssemblyRenderer;

impl AssemblyRenderer {
    fn header(&self, function: &UsecodeFunction, generation: VmGeneration, out: &mut String) -> Result<()> {
        writeln!(out, ".funcnumber 0x{:04X}", function.id)?;
        if function.uses_ext32_encoding {
            out.push_str(".ext32\n");
        }
        writeln!(out, ".msize 0x{:04X}", function.raw_size)?;
        writeln!(out, ".dsize 0x{:04X}", function.data_size)?;
        if !function.data_strings.is_empty() {
            out.push_str(".data\n");
            for string in &function.data_strings {
                writeln!(out, "\t0x{:04X}: {}", string.offset, quote(&string.text))?;
            }
        }
        out.push_str(".code\n");
        writeln!(out, ".argc 0x{:04X}", function.num_args)?;
        writeln!(out, ".localc 0x{:04X}", function.num_locals)?;
        if generation == VmGeneration::U7 {
            writeln!(out, ".externsize 0x{:04X}", function.links.len())?;
            for link in &function.links {
                writeln!(out, ".extern 0x{:04X}", link)?;
            }
        }
        Ok(())
    }

    fn instruction(
        &self,
        ctx: &RenderContext<'_>,
        instr: &Instruction,
        out: &mut String,
    ) -> Result<()> {
        let generation = ctx.image.generation();
        let mnemonic = match instr.desc(generation) {
            Some(desc) => desc.mnemonic.to_string(),
            None => format!("db 0x{:02X}", instr.opcode),
        };
        let mut line = format!("\t0x{:04X}: ", instr.offset);
        if ctx.options.raw_ops {
            let bytes = instr
                .raw
                .iter()
                .map(|b| format!("{:02X}", b))
                .collect::<Vec<_>>()
                .join(" ");
            write!(line, "{:<width$} ", bytes, width = RAW_WIDTH)?;
        }
        let operands = instr
            .operands
            .iter()
            .map(format_operand)
            .collect::<Vec<_>>()
            .join(", ");
        if operands.is_empty() {
            line.push_str(&mnemonic);
        } else {
            write!(line, "{:<width$} {}", mnemonic, operands, width = MNEMONIC_WIDTH)?;
        }
        if ctx.options.auto_comment {
            let comments = instr
                .operands
                .iter()
                .filter_map(|op| auto_comment(ctx, op))
                .collect::<Vec<_>>();
            if !comments.is_empty() {
                write!(line, "\t; {}", comments.join(" "))?;
            }
        }
        out.push_str(line.trim_end());
        out.push('\n');
        Ok(())
    }
}

impl FunctionRenderer for AssemblyRenderer {
    fn name(&self) -> &'static str {
        "asm"
    }

    fn render_function(
        &self,
        ctx: &RenderContext<'_>,
        function: &UsecodeFunction,
    ) -> Result<Option<String>> {
        let mut out = String::new();
        self.header(function, ctx.image.generation(), &mut out)?;
        let labels: HashSet<u32> = function.jump_targets().into_iter().collect();
        for instr in &function.instructions {
            if labels.contains(&instr.offset) {
                writeln!(out, "L{:04X}:", instr.offset)?;
            }
            self.instruction(ctx, instr, &mut out)?;
        }
        out.push('\n');
        Ok(Some(out))
    }
}

fn format_operand(operand: &Operand) -> String {
    match operand {
        Operand::Immediate(v) if *v < 0 => format!("-0x{:04X}", v.unsigned_abs()),
        Operand::Immediate(v) => format!("0x{:04X}", v),
        Operand::StringLiteral { offset, .. } => format!("0x{:04X}", offset),
        Operand::InlineString(text) => quote(text),
        Operand::FunctionRef(id) => format!("[0x{:04X}]", id),
        Operand::Flag(index) => format!("flag:[0x{:04X}]", index),
        Operand::JumpTarget(target) => format!("L{:04X}", target),
        Operand::Local(slot) => VarRef::Local(*slot).to_string(),
        Operand::Static(raw) => VarRef::from_static(*raw).to_string(),
        Operand::ClassVar(slot) => VarRef::ClassVar(*slot).to_string(),
        Operand::Intrinsic(number) => format!("_0x{:02X}", number),
        Operand::ArgCount(count) => format!("{}", count),
        Operand::Method(slot) => format!("#{}", slot),
        Operand::ClassId(class) => format!("class:0x{:04X}", class),
    }
}

fn auto_comment(ctx: &RenderContext<'_>, operand: &Operand) -> Option<String> {
    match operand {
        Operand::StringLiteral { text, .. } => Some(quote(text)),
        Operand::FunctionRef(id) => Some(ctx.analysis.index.name_of(*id)),
        Operand::Flag(index) => Some(match ctx.flag_names.and_then(|n| n.get(*index)) {
            Some(name) => format!("gflags[{}]", name),
            None => format!("gflags[0x{:04X}]", index),
        }),
        Operand::Intrinsic(number) => Some(match ctx.intrinsics {
            Some(names) => names.name(*number),
            None => format!("UNKNOWN_{:02x}", number),
        }),
        _ => None,
    }
}
