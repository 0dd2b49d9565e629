//! Ultima VIII usecode opcodes
//!
//! The U8 VM addresses locals with 8-bit slots, calls functions by class and
//! entry offset, and keeps its global flags in a byte-addressed block read
//! with `push global` / `pop global`.

use super::{FlagAccess, Flow, OpcodeDesc, OperandKind as K};

pub(crate) fn rows() -> Vec<OpcodeDesc> {
    use Flow::*;
    let op = OpcodeDesc::new;
    vec![
        op(0x00, "pop byte", &[K::Local8], Next, 1, 0),
        op(0x01, "pop", &[K::Local8], Next, 1, 0),
        op(0x02, "pop dword", &[K::Local8], Next, 1, 0),
        op(0x08, "pop res", &[], Next, 1, 0).returning(),
        op(0x0a, "push byte", &[K::Imm8], Next, 0, 1),
        op(0x0b, "push", &[K::Imm16], Next, 0, 1),
        op(0x0c, "push dword", &[K::Imm32], Next, 0, 1),
        op(0x0d, "push string", &[K::InlineString], Next, 0, 1),
        op(0x0e, "create list", &[K::ArgCount8, K::Imm8], Next, 0, 1),
        op(0x0f, "calli", &[K::ArgCount8, K::Intrinsic16], Next, 0, 1),
        op(0x11, "call", &[K::ClassEntry], Next, 0, 0),
        op(0x12, "pop temp", &[], Next, 1, 0),
        op(0x14, "add", &[], Next, 2, 1),
        op(0x15, "add dword", &[], Next, 2, 1),
        op(0x16, "concat", &[], Next, 2, 1),
        op(0x17, "append", &[], Next, 2, 1),
        op(0x1c, "sub", &[], Next, 2, 1),
        op(0x1d, "sub dword", &[], Next, 2, 1),
        op(0x1e, "mul", &[], Next, 2, 1),
        op(0x1f, "mul dword", &[], Next, 2, 1),
        op(0x20, "div", &[], Next, 2, 1),
        op(0x21, "div dword", &[], Next, 2, 1),
        op(0x22, "mod", &[], Next, 2, 1),
        op(0x24, "cmp", &[], Next, 2, 1),
        op(0x28, "lt", &[], Next, 2, 1),
        op(0x2a, "le", &[], Next, 2, 1),
        op(0x2c, "gt", &[], Next, 2, 1),
        op(0x2e, "ge", &[], Next, 2, 1),
        op(0x30, "not", &[], Next, 1, 1),
        op(0x32, "and", &[], Next, 2, 1),
        op(0x34, "or", &[], Next, 2, 1),
        op(0x36, "ne", &[], Next, 2, 1),
        op(0x38, "in list", &[K::Imm8, K::Imm8], Next, 2, 1),
        op(0x3e, "push byte local", &[K::Local8], Next, 0, 1),
        op(0x3f, "push local", &[K::Local8], Next, 0, 1),
        op(0x40, "push dword local", &[K::Local8], Next, 0, 1),
        op(0x4e, "push global", &[K::Flag16, K::Imm8], Next, 0, 1).flag(FlagAccess::Get),
        op(0x4f, "pop global", &[K::Flag16, K::Imm8], Next, 1, 0).flag(FlagAccess::Set),
        op(0x50, "ret", &[], Return, 0, 0),
        op(0x51, "jne", &[K::Rel16], Branch, 1, 0),
        op(0x52, "jmp", &[K::Rel16], Jump, 0, 0),
        op(0x53, "suspend", &[], Next, 0, 0),
        op(0x59, "push pid", &[], Next, 0, 1),
        op(0x5a, "init", &[K::Imm8], Next, 0, 0),
        op(0x5b, "line number", &[K::Imm16], Next, 0, 0),
        op(0x5d, "push retval byte", &[], Next, 0, 1),
        op(0x5e, "push retval", &[], Next, 0, 1),
        op(0x5f, "push retval dword", &[], Next, 0, 1),
        op(0x60, "word to dword", &[], Next, 1, 1),
        op(0x61, "dword to word", &[], Next, 1, 1),
        op(0x6e, "add sp", &[K::Imm8], Next, 0, 0),
        op(0x75, "foreach list", &[K::Local8, K::Imm8, K::Rel16], Loop, 0, 0),
        op(0x7a, "end", &[], Return, 0, 0),
    ]
}
