//! Function record decoding
//!
//! One decoder per VM generation reads the record header; both hand the
//! code segment to [`decode_instructions`], which reads operands generically
//! from the opcode table's operand shapes.
//!
//! A record is always split off the image cursor by its declared length
//! before its body is decoded, so a malformed body never knocks the image
//! cursor off the next record boundary.

use super::cursor::{decode_text, ByteCursor};
use super::function::{split_data_strings, Instruction, Operand, UsecodeFunction};
use super::opcodes::{self, Flow, OpcodeDesc, OperandKind};
use super::symbol_table::SymbolTable;
use super::VmGeneration;
use crate::error::{Error as DecompilerError, Result as DecompilerResult};

/// U7 header word announcing a 32-bit function id
const EXT32_ID32_MARKER: u16 = 0xFFFE;
/// U7 header word announcing a 16-bit id with 32-bit lengths
const EXT32_ID16_MARKER: u16 = 0xFFFF;

/// Shared inputs for decoding the records of one image
#[derive(Debug, Clone, Copy)]
pub struct DecodeContext<'s> {
    pub generation: VmGeneration,
    pub symbols: Option<&'s SymbolTable>,
}

impl<'s> DecodeContext<'s> {
    pub fn new(generation: VmGeneration, symbols: Option<&'s SymbolTable>) -> Self {
        Self { generation, symbols }
    }
}

/// Decode the next record for the context's generation
pub fn decode_one(cursor: &mut ByteCursor, ctx: &DecodeContext) -> DecompilerResult<UsecodeFunction> {
    match ctx.generation {
        VmGeneration::U7 => decode_u7(cursor, ctx),
        VmGeneration::U8 => decode_u8(cursor, ctx),
    }
}

/// Decode one Ultima VII record
pub fn decode_u7(cursor: &mut ByteCursor, ctx: &DecodeContext) -> DecompilerResult<UsecodeFunction> {
    let raw_offset = cursor.absolute();
    let word = cursor.read_u16()?;
    let (id, ext32) = match word {
        EXT32_ID32_MARKER => (cursor.read_u32()?, true),
        EXT32_ID16_MARKER => (cursor.read_u16()? as u32, true),
        w => (w as u32, false),
    };
    let total_len = if ext32 {
        cursor.read_u32()? as usize
    } else {
        cursor.read_u16()? as usize
    };
    let header_len = cursor.absolute() - raw_offset;
    let mut body = take_body(cursor, id, raw_offset, total_len)?;
    let malformed = |e: DecompilerError, at: usize| DecompilerError::malformed(id, at, e);

    let data_size = if ext32 {
        body.read_u32()
    } else {
        body.read_u16().map(u32::from)
    }
    .map_err(|e| malformed(e, raw_offset))?;
    let data = body
        .read_bytes(data_size as usize)
        .map_err(|e| malformed(e, raw_offset))?;
    let num_args = body.read_u16().map_err(|e| malformed(e, raw_offset))?;
    let num_locals = body.read_u16().map_err(|e| malformed(e, raw_offset))?;
    let num_links = body.read_u16().map_err(|e| malformed(e, raw_offset))?;
    let mut links = Vec::with_capacity(num_links as usize);
    for _ in 0..num_links {
        links.push(body.read_u16().map_err(|e| malformed(e, raw_offset))? as u32);
    }

    let code_base = body.absolute();
    let code = body.rest();
    let segments = Segments { data, links: &links };
    let instructions = decode_instructions(id, ctx.generation, code, code_base, &segments)?;

    let mut function = UsecodeFunction {
        id,
        num_args,
        num_locals,
        returns_value: false,
        always_aborts: false,
        class_id: ctx.symbols.and_then(|s| s.class_of_method(id)),
        uses_ext32_encoding: ext32,
        instructions,
        raw_offset: raw_offset as u32,
        raw_size: (header_len + total_len) as u32,
        data_size,
        code_size: code.len() as u32,
        links,
        data_strings: split_data_strings(data),
        debug_name: None,
    };
    derive_fields(&mut function, ctx.generation, false);
    Ok(function)
}

/// Split off a record body whose header has already been read.
///
/// A body running past the end of the image makes the record malformed and
/// consumes the rest of the image.
fn take_body<'a>(
    cursor: &mut ByteCursor<'a>,
    id: u32,
    raw_offset: usize,
    len: usize,
) -> DecompilerResult<ByteCursor<'a>> {
    cursor.take(len).map_err(|err| {
        cursor.skip_to_end();
        DecompilerError::malformed(id, raw_offset, err)
    })
}

/// Decode one Ultima VIII record
pub fn decode_u8(cursor: &mut ByteCursor, ctx: &DecodeContext) -> DecompilerResult<UsecodeFunction> {
    let raw_offset = cursor.absolute();
    let id = cursor.read_u32()?;
    let num_args = cursor.read_u16()?;
    let flags = cursor.read_u8()?;
    let code_len = cursor.read_u32()? as usize;
    let header_len = cursor.absolute() - raw_offset;
    let body = take_body(cursor, id, raw_offset, code_len)?;

    let code_base = body.absolute();
    let code = body.rest();
    let segments = Segments { data: &[], links: &[] };
    let instructions = decode_instructions(id, ctx.generation, code, code_base, &segments)?;

    let mut function = UsecodeFunction {
        id,
        num_args,
        num_locals: 0,
        returns_value: false,
        always_aborts: false,
        class_id: None,
        uses_ext32_encoding: false,
        instructions,
        raw_offset: raw_offset as u32,
        raw_size: (header_len + code_len) as u32,
        data_size: 0,
        code_size: code_len as u32,
        links: Vec::new(),
        data_strings: Vec::new(),
        debug_name: None,
    };
    derive_fields(&mut function, ctx.generation, flags & 1 != 0);
    Ok(function)
}

/// Record segments that operands may refer into
struct Segments<'a> {
    data: &'a [u8],
    links: &'a [u32],
}

impl Segments<'_> {
    fn string_at(&self, offset: u32) -> Option<String> {
        let rest = self.data.get(offset as usize..)?;
        if rest.is_empty() {
            return None;
        }
        let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        Some(decode_text(&rest[..end]))
    }
}

/// Decode a whole code segment into instructions
fn decode_instructions(
    id: u32,
    generation: VmGeneration,
    code: &[u8],
    code_base: usize,
    segments: &Segments,
) -> DecompilerResult<Vec<Instruction>> {
    let table = opcodes::table(generation);
    let mut cursor = ByteCursor::with_base(code, code_base);
    let mut instructions = Vec::new();

    while !cursor.is_eof() {
        let start = cursor.position();
        let opcode = cursor.read_u8()?;
        let desc = table.get(opcode).ok_or_else(|| {
            let err = DecompilerError::UnknownOpcode {
                opcode,
                offset: start as u32,
            };
            DecompilerError::malformed(id, code_base + start, err)
        })?;
        let operands = read_operands(desc, &mut cursor, segments, code.len())
            .map_err(|e| DecompilerError::malformed(id, code_base + start, e))?;
        let end = cursor.position();
        instructions.push(Instruction {
            opcode,
            offset: start as u32,
            size: (end - start) as u32,
            raw: code[start..end].to_vec(),
            operands,
        });
    }

    Ok(instructions)
}

/// Read the operands of one instruction following its shape
fn read_operands(
    desc: &OpcodeDesc,
    cursor: &mut ByteCursor,
    segments: &Segments,
    code_len: usize,
) -> DecompilerResult<Vec<Operand>> {
    let mut operands = Vec::with_capacity(desc.operands.len());
    let mut relative: Option<(usize, i64)> = None;

    for kind in desc.operands {
        let operand = match kind {
            OperandKind::Imm8 => Operand::Immediate(cursor.read_u8()? as i32),
            OperandKind::Imm16 => Operand::Immediate(cursor.read_i16()? as i32),
            OperandKind::Imm32 => Operand::Immediate(cursor.read_i32()?),
            OperandKind::Data16 | OperandKind::Data32 => {
                let offset = if *kind == OperandKind::Data16 {
                    cursor.read_u16()? as u32
                } else {
                    cursor.read_u32()?
                };
                let text = segments.string_at(offset).ok_or_else(|| {
                    DecompilerError::internal(format!("data offset 0x{:04X} out of range", offset))
                })?;
                Operand::StringLiteral { offset, text }
            }
            OperandKind::Rel16 | OperandKind::Rel32 => {
                let rel = if *kind == OperandKind::Rel16 {
                    cursor.read_i16()? as i64
                } else {
                    cursor.read_i32()? as i64
                };
                relative = Some((operands.len(), rel));
                Operand::JumpTarget(0)
            }
            OperandKind::Local8 => Operand::Local(cursor.read_u8()? as u16),
            OperandKind::Local16 => Operand::Local(cursor.read_u16()?),
            OperandKind::Static16 => Operand::Static(cursor.read_i16()?),
            OperandKind::ClassVar16 => Operand::ClassVar(cursor.read_u16()?),
            OperandKind::Flag16 => Operand::Flag(cursor.read_u16()? as u32),
            OperandKind::Link16 => {
                let index = cursor.read_u16()?;
                let target = segments.links.get(index as usize).copied().ok_or_else(|| {
                    DecompilerError::internal(format!("link index {} out of range", index))
                })?;
                Operand::FunctionRef(target)
            }
            OperandKind::FunId16 => Operand::FunctionRef(cursor.read_u16()? as u32),
            OperandKind::FunId32 => Operand::FunctionRef(cursor.read_u32()?),
            OperandKind::ClassEntry => {
                let class = cursor.read_u16()? as u32;
                let entry = cursor.read_u16()? as u32;
                Operand::FunctionRef(class << 16 | entry)
            }
            OperandKind::Intrinsic16 => Operand::Intrinsic(cursor.read_u16()?),
            OperandKind::ArgCount8 => Operand::ArgCount(cursor.read_u8()? as u16),
            OperandKind::ArgCount16 => Operand::ArgCount(cursor.read_u16()?),
            OperandKind::Method16 => Operand::Method(cursor.read_u16()?),
            OperandKind::ClassId16 => Operand::ClassId(cursor.read_u16()?),
            OperandKind::InlineString => Operand::InlineString(cursor.read_prefixed_string()?),
        };
        operands.push(operand);
    }

    // Jumps are relative to the end of the instruction
    if let Some((slot, rel)) = relative {
        let target = cursor.position() as i64 + rel;
        if target < 0 || target > code_len as i64 {
            return Err(DecompilerError::internal(format!(
                "jump target {} outside code segment",
                target
            )));
        }
        operands[slot] = Operand::JumpTarget(target as u32);
    }

    Ok(operands)
}

fn is_debug_function_marker(desc: &OpcodeDesc) -> bool {
    desc.mnemonic.starts_with("dbgfunc")
}

/// Fill in the fields that follow from the instruction stream
fn derive_fields(function: &mut UsecodeFunction, generation: VmGeneration, header_returns: bool) {
    let table = opcodes::table(generation);
    let mut returns_value = header_returns;
    let mut has_return = false;
    let mut has_abort = false;
    let mut debug_name = None;

    for instr in &function.instructions {
        let Some(desc) = table.get(instr.opcode) else {
            continue;
        };
        returns_value |= desc.returns_value;
        match desc.flow {
            Flow::Return => has_return = true,
            Flow::Abort => has_abort = true,
            _ => {}
        }
        if debug_name.is_none() && is_debug_function_marker(desc) {
            debug_name = instr.operands.iter().find_map(|op| match op {
                Operand::StringLiteral { text, .. } => Some(text.clone()),
                _ => None,
            });
        }
    }

    function.returns_value = returns_value;
    function.always_aborts = has_abort && !has_return;
    function.debug_name = debug_name;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecode::symbol_table::{ClassRef, ClassSymbol};

    fn u7_body(data: &[u8], args: u16, links: &[u16], code: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&(data.len() as u16).to_le_bytes());
        body.extend_from_slice(data);
        body.extend_from_slice(&args.to_le_bytes());
        body.extend_from_slice(&0u16.to_le_bytes());
        body.extend_from_slice(&(links.len() as u16).to_le_bytes());
        for link in links {
            body.extend_from_slice(&link.to_le_bytes());
        }
        body.extend_from_slice(code);
        body
    }

    fn u7_record(id: u16, data: &[u8], links: &[u16], code: &[u8]) -> Vec<u8> {
        let body = u7_body(data, 0, links, code);
        let mut out = Vec::new();
        out.extend_from_slice(&id.to_le_bytes());
        out.extend_from_slice(&(body.len() as u16).to_le_bytes());
        out.extend(body);
        out
    }

    fn ctx() -> DecodeContext<'static> {
        DecodeContext::new(VmGeneration::U7, None)
    }

    #[test]
    fn code_ending_on_the_declared_boundary_decodes() {
        // 13 pushi + ret = 40 bytes
        let mut code = Vec::new();
        for i in 0..13u16 {
            code.push(0x1f);
            code.extend_from_slice(&i.to_le_bytes());
        }
        code.push(0x25);
        assert_eq!(code.len(), 40);

        let mut bytes = u7_record(0x401, &[], &[], &code);
        let first_len = bytes.len();
        bytes.extend(u7_record(0x402, &[], &[], &[0x25]));

        let mut cursor = ByteCursor::new(&bytes);
        let first = decode_u7(&mut cursor, &ctx()).unwrap();
        assert_eq!(first.code_size, 40);
        assert_eq!(first.instructions.len(), 14);
        assert_eq!(first.raw_size as usize, first_len);
        assert_eq!(cursor.position(), first_len);

        let second = decode_u7(&mut cursor, &ctx()).unwrap();
        assert_eq!(second.id, 0x402);
        assert!(cursor.is_eof());
    }

    #[test]
    fn jumps_resolve_to_absolute_offsets() {
        // 0: pushi 1; 3: jne +4 -> 10; 6: pushi 2; 9: ret; 10: ret
        let code = [0x1f, 0x01, 0x00, 0x05, 0x04, 0x00, 0x1f, 0x02, 0x00, 0x25, 0x25];
        let bytes = u7_record(0x401, &[], &[], &code);
        let function = decode_u7(&mut ByteCursor::new(&bytes), &ctx()).unwrap();
        assert_eq!(function.instructions[1].jump_target(), Some(10));
        assert_eq!(function.jump_targets(), vec![10]);
    }

    #[test]
    fn strings_links_and_debug_name() {
        let data = b"Intro\0Hello\0";
        // dbgfunc 0, "Intro"; pushs "Hello"; call link 0; ret
        let code = [
            0x4d, 0x00, 0x00, 0x00, 0x00, 0x1d, 0x06, 0x00, 0x24, 0x00, 0x00, 0x25,
        ];
        let bytes = u7_record(0x500, data, &[0x0901], &code);
        let function = decode_u7(&mut ByteCursor::new(&bytes), &ctx()).unwrap();
        assert_eq!(function.debug_name.as_deref(), Some("Intro"));
        assert_eq!(
            function.instructions[1].operands,
            vec![Operand::StringLiteral { offset: 6, text: "Hello".into() }]
        );
        assert_eq!(function.instructions[2].called_function(), Some(0x901));
        assert_eq!(function.data_strings.len(), 2);
        assert!(!function.returns_value);
    }

    #[test]
    fn ext32_header_uses_wide_fields() {
        let body = {
            let mut b = Vec::new();
            b.extend_from_slice(&0u32.to_le_bytes());
            b.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
            // pushi32 7; retv
            b.extend_from_slice(&[0x9f, 0x07, 0x00, 0x00, 0x00, 0x2d]);
            b
        };
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&EXT32_ID32_MARKER.to_le_bytes());
        bytes.extend_from_slice(&0x0001_2345u32.to_le_bytes());
        bytes.extend_from_slice(&(body.len() as u32).to_le_bytes());
        bytes.extend(body);

        let function = decode_u7(&mut ByteCursor::new(&bytes), &ctx()).unwrap();
        assert_eq!(function.id, 0x12345);
        assert!(function.uses_ext32_encoding);
        assert!(function.returns_value);
        assert_eq!(function.instructions[0].operands, vec![Operand::Immediate(7)]);
    }

    #[test]
    fn unknown_opcode_skips_to_the_next_record() {
        let mut bytes = u7_record(0x401, &[], &[], &[0x00, 0x25]);
        bytes.extend(u7_record(0x402, &[], &[], &[0x25]));
        let mut cursor = ByteCursor::new(&bytes);
        let err = decode_u7(&mut cursor, &ctx()).unwrap_err();
        assert!(matches!(err, DecompilerError::MalformedFunction { id: 0x401, .. }));
        assert_eq!(decode_u7(&mut cursor, &ctx()).unwrap().id, 0x402);
    }

    #[test]
    fn operand_crossing_code_end_is_malformed() {
        let bytes = u7_record(0x401, &[], &[], &[0x1f, 0x01]);
        let err = decode_u7(&mut ByteCursor::new(&bytes), &ctx()).unwrap_err();
        assert!(matches!(err, DecompilerError::MalformedFunction { .. }));
    }

    #[test]
    fn bad_link_index_is_malformed() {
        let bytes = u7_record(0x401, &[], &[], &[0x24, 0x03, 0x00]);
        let err = decode_u7(&mut ByteCursor::new(&bytes), &ctx()).unwrap_err();
        assert!(matches!(err, DecompilerError::MalformedFunction { .. }));
    }

    #[test]
    fn truncated_header_is_fatal() {
        let bytes = [0x01, 0x04, 0x20, 0x00, 0x00];
        let err = decode_u7(&mut ByteCursor::new(&bytes), &ctx()).unwrap_err();
        assert!(matches!(err, DecompilerError::TruncatedInput { .. }));
    }

    #[test]
    fn abort_without_return_marks_always_aborts() {
        let bytes = u7_record(0x401, &[], &[], &[0x3f]);
        let function = decode_u7(&mut ByteCursor::new(&bytes), &ctx()).unwrap();
        assert!(function.always_aborts);
    }

    #[test]
    fn class_membership_comes_from_symbols() {
        let symbols = SymbolTable {
            classes: vec![ClassSymbol::new("Door", 0, 1, vec![0x900])],
            ..SymbolTable::default()
        };
        let ctx = DecodeContext::new(VmGeneration::U7, Some(&symbols));
        let bytes = u7_record(0x900, &[], &[], &[0x25]);
        let function = decode_u7(&mut ByteCursor::new(&bytes), &ctx).unwrap();
        assert_eq!(function.class_id, Some(ClassRef(0)));
    }

    #[test]
    fn u8_record_with_class_call_and_inline_string() {
        let mut code = vec![0x0d, 0x02, 0x00, b'h', b'i'];
        code.extend_from_slice(&[0x11, 0x03, 0x00, 0x20, 0x00]);
        code.push(0x7a);
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0x0003_0010u32.to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.push(1);
        bytes.extend_from_slice(&(code.len() as u32).to_le_bytes());
        bytes.extend(code);

        let ctx = DecodeContext::new(VmGeneration::U8, None);
        let mut cursor = ByteCursor::new(&bytes);
        let function = decode_u8(&mut cursor, &ctx).unwrap();
        assert!(cursor.is_eof());
        assert_eq!(function.id, 0x30010);
        assert!(function.returns_value);
        assert_eq!(function.instructions[0].operands, vec![Operand::InlineString("hi".into())]);
        assert_eq!(function.instructions[1].called_function(), Some(0x30020));
    }
}
