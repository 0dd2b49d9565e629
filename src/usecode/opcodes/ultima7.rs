//! Ultima VII usecode opcodes
//!
//! Covers the Black Gate / Serpent Isle instruction set plus the
//! extensions emitted by the UCC compiler (statics, classes, exceptions and
//! the `0x80`-bit 32-bit forms).

use super::{FlagAccess, Flow, OpcodeDesc, OperandKind as K};

const LOOP16: &[K] = &[K::Local16, K::Local16, K::Local16, K::Local16, K::Rel16];
const LOOP32: &[K] = &[K::Local16, K::Local16, K::Local16, K::Local16, K::Rel32];
const STATIC_LOOP16: &[K] = &[K::Local16, K::Local16, K::Local16, K::Static16, K::Rel16];
const STATIC_LOOP32: &[K] = &[K::Local16, K::Local16, K::Local16, K::Static16, K::Rel32];
const CLSVAR_LOOP16: &[K] = &[K::Local16, K::Local16, K::Local16, K::ClassVar16, K::Rel16];
const CLSVAR_LOOP32: &[K] = &[K::Local16, K::Local16, K::Local16, K::ClassVar16, K::Rel32];

pub(crate) fn rows() -> Vec<OpcodeDesc> {
    use Flow::*;
    let op = OpcodeDesc::new;
    vec![
        op(0x02, "loop", LOOP16, Loop, 0, 0),
        op(0x04, "startconv", &[K::Rel16], Converse, 0, 0),
        op(0x05, "jne", &[K::Rel16], Branch, 1, 0),
        op(0x06, "jmp", &[K::Rel16], Jump, 0, 0),
        op(0x07, "cmps", &[K::ArgCount16, K::Rel16], Branch, 0, 0),
        op(0x09, "add", &[], Next, 2, 1),
        op(0x0a, "sub", &[], Next, 2, 1),
        op(0x0b, "div", &[], Next, 2, 1),
        op(0x0c, "mul", &[], Next, 2, 1),
        op(0x0d, "mod", &[], Next, 2, 1),
        op(0x0e, "and", &[], Next, 2, 1),
        op(0x0f, "or", &[], Next, 2, 1),
        op(0x10, "not", &[], Next, 1, 1),
        op(0x12, "pop", &[K::Local16], Next, 1, 0),
        op(0x13, "push true", &[], Next, 0, 1),
        op(0x14, "push false", &[], Next, 0, 1),
        op(0x16, "cmpgt", &[], Next, 2, 1),
        op(0x17, "cmplt", &[], Next, 2, 1),
        op(0x18, "cmpge", &[], Next, 2, 1),
        op(0x19, "cmple", &[], Next, 2, 1),
        op(0x1a, "cmpne", &[], Next, 2, 1),
        op(0x1c, "addsi", &[K::Data16], Next, 0, 0),
        op(0x1d, "pushs", &[K::Data16], Next, 0, 1),
        op(0x1e, "arrc", &[K::ArgCount16], Next, 0, 1),
        op(0x1f, "pushi", &[K::Imm16], Next, 0, 1),
        op(0x21, "push", &[K::Local16], Next, 0, 1),
        op(0x22, "cmpeq", &[], Next, 2, 1),
        op(0x24, "call", &[K::Link16], Next, 0, 0),
        op(0x25, "ret", &[], Return, 0, 0),
        op(0x26, "aidx", &[K::Local16], Next, 1, 1),
        op(0x2c, "ret2", &[], Return, 0, 0),
        op(0x2d, "retv", &[], Return, 1, 0).returning(),
        op(0x2e, "initloop", &[], Next, 0, 0),
        op(0x2f, "addsv", &[K::Local16], Next, 0, 0),
        op(0x30, "in", &[], Next, 2, 1),
        op(0x31, "conv_something", &[K::Imm16, K::Rel16], Branch, 0, 0),
        op(0x32, "retz", &[], Return, 0, 0).returning(),
        op(0x33, "say", &[], Next, 0, 0),
        op(0x38, "callis", &[K::Intrinsic16, K::ArgCount8], Next, 0, 1),
        op(0x39, "calli", &[K::Intrinsic16, K::ArgCount8], Next, 0, 0),
        op(0x3e, "push itemref", &[], Next, 0, 1),
        op(0x3f, "abrt", &[], Abort, 0, 0),
        op(0x40, "endconv", &[], Next, 0, 0),
        op(0x42, "pushf", &[K::Flag16], Next, 0, 1).flag(FlagAccess::Get),
        op(0x43, "popf", &[K::Flag16], Next, 1, 0).flag(FlagAccess::Set),
        op(0x44, "pushb", &[K::Imm8], Next, 0, 1),
        op(0x46, "setarrayelem", &[K::Local16], Next, 2, 0),
        op(0x47, "calle", &[K::FunId16], Next, 1, 0),
        op(0x48, "push eventid", &[], Next, 0, 1),
        op(0x4a, "arra", &[], Next, 2, 1),
        op(0x4b, "pop eventid", &[], Next, 1, 0),
        op(0x4c, "dbgline", &[K::Imm16], Next, 0, 0),
        op(0x4d, "dbgfunc", &[K::Imm16, K::Data16], Next, 0, 0),
        op(0x50, "push static", &[K::Static16], Next, 0, 1),
        op(0x51, "pop static", &[K::Static16], Next, 1, 0),
        op(0x52, "callo", &[K::FunId16], Next, 1, 1),
        op(0x53, "callind", &[], Next, 2, 0),
        op(0x54, "push clsvar", &[K::ClassVar16], Next, 0, 1),
        op(0x55, "pop clsvar", &[K::ClassVar16], Next, 1, 0),
        op(0x56, "callm", &[K::Method16], Next, 0, 0),
        op(0x57, "callms", &[K::Method16, K::ClassId16], Next, 0, 0),
        op(0x58, "clscreate", &[K::ClassId16], Next, 0, 1),
        op(0x59, "classdel", &[], Next, 1, 0),
        op(0x5a, "aidxs", &[K::Static16], Next, 1, 1),
        op(0x5b, "setstaticarrayelem", &[K::Static16], Next, 2, 0),
        op(0x5c, "staticloop", STATIC_LOOP16, Loop, 0, 0),
        op(0x5d, "aidxclsvar", &[K::ClassVar16], Next, 1, 1),
        op(0x5e, "setclsvararrayelem", &[K::ClassVar16], Next, 2, 0),
        op(0x5f, "clsvarloop", CLSVAR_LOOP16, Loop, 0, 0),
        op(0x60, "push choice", &[], Next, 0, 1),
        op(0x61, "starttry", &[K::Rel16], Try, 0, 0),
        op(0x62, "endtry", &[], Next, 0, 0),
        op(0x82, "loop32", LOOP32, Loop, 0, 0),
        op(0x84, "startconv32", &[K::Rel32], Converse, 0, 0),
        op(0x85, "jne32", &[K::Rel32], Branch, 1, 0),
        op(0x86, "jmp32", &[K::Rel32], Jump, 0, 0),
        op(0x87, "cmps32", &[K::ArgCount16, K::Rel32], Branch, 0, 0),
        op(0x9c, "addsi32", &[K::Data32], Next, 0, 0),
        op(0x9d, "pushs32", &[K::Data32], Next, 0, 1),
        op(0x9f, "pushi32", &[K::Imm32], Next, 0, 1),
        op(0xa4, "call32", &[K::FunId32], Next, 0, 0),
        op(0xae, "initloop32", &[], Next, 0, 0),
        op(0xb1, "conv_something32", &[K::Imm16, K::Rel32], Branch, 0, 0),
        op(0xbf, "throw", &[], Abort, 1, 0),
        op(0xc2, "pushfvar", &[], Next, 1, 1),
        op(0xc3, "popfvar", &[], Next, 2, 0),
        op(0xc7, "calle32", &[K::FunId32], Next, 1, 0),
        op(0xcd, "dbgfunc32", &[K::Imm32, K::Data32], Next, 0, 0),
        op(0xd4, "callindex", &[K::ArgCount8], Next, 0, 0),
        op(0xdc, "staticloop32", STATIC_LOOP32, Loop, 0, 0),
        op(0xdf, "clsvarloop32", CLSVAR_LOOP32, Loop, 0, 0),
        op(0xe1, "starttry32", &[K::Rel32], Try, 0, 0),
    ]
}
