//! Synthetic usecode images for integration tests

#![allow(dead_code)]

use usecode_dec_rs::usecode::symbol_table::{UCSYMTBL_MAGIC0, UCSYMTBL_MAGIC1};
use usecode_dec_rs::usecode::SymbolKind;

/// One Ultima VII function record
#[derive(Debug, Clone, Default)]
pub struct U7Record {
    pub id: u32,
    pub args: u16,
    pub locals: u16,
    pub data: Vec<u8>,
    pub links: Vec<u16>,
    pub code: Vec<u8>,
    pub ext32: bool,
}

impl U7Record {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn args(mut self, args: u16) -> Self {
        self.args = args;
        self
    }

    pub fn locals(mut self, locals: u16) -> Self {
        self.locals = locals;
        self
    }

    pub fn string(mut self, text: &str) -> Self {
        self.data.extend_from_slice(text.as_bytes());
        self.data.push(0);
        self
    }

    pub fn link(mut self, id: u16) -> Self {
        self.links.push(id);
        self
    }

    pub fn code(mut self, code: &[u8]) -> Self {
        self.code.extend_from_slice(code);
        self
    }

    pub fn ext32(mut self) -> Self {
        self.ext32 = true;
        self
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        if self.ext32 {
            body.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        } else {
            body.extend_from_slice(&(self.data.len() as u16).to_le_bytes());
        }
        body.extend_from_slice(&self.data);
        body.extend_from_slice(&self.args.to_le_bytes());
        body.extend_from_slice(&self.locals.to_le_bytes());
        body.extend_from_slice(&(self.links.len() as u16).to_le_bytes());
        for link in &self.links {
            body.extend_from_slice(&link.to_le_bytes());
        }
        body.extend_from_slice(&self.code);

        let mut out = Vec::new();
        if self.ext32 {
            out.extend_from_slice(&0xFFFEu16.to_le_bytes());
            out.extend_from_slice(&self.id.to_le_bytes());
            out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        } else {
            out.extend_from_slice(&(self.id as u16).to_le_bytes());
            out.extend_from_slice(&(body.len() as u16).to_le_bytes());
        }
        out.extend_from_slice(&body);
        out
    }
}

pub fn image(records: &[U7Record]) -> Vec<u8> {
    records.iter().flat_map(U7Record::encode).collect()
}

/// Symbol table with one class holding `methods` and nothing else
pub fn symbol_table(class: &str, methods: &[u16], num_vars: u16, statics: u32) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&UCSYMTBL_MAGIC0.to_le_bytes());
    out.extend_from_slice(&UCSYMTBL_MAGIC1.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(class.as_bytes());
    out.push(0);
    out.extend_from_slice(&SymbolKind::ClassScope.code().to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    // empty member scope
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(methods.len() as u16).to_le_bytes());
    for m in methods {
        out.extend_from_slice(&m.to_le_bytes());
    }
    out.extend_from_slice(&num_vars.to_le_bytes());
    out.extend_from_slice(&statics.to_le_bytes());
    out
}

/// `if (var0000) var0001 = 1; else var0001 = 2; say();`
pub const IF_ELSE: &[u8] = &[
    0x21, 0x00, 0x00, // 0: push var0000
    0x05, 0x09, 0x00, // 3: jne L15
    0x1f, 0x01, 0x00, // 6: pushi 1
    0x12, 0x01, 0x00, // 9: pop var0001
    0x06, 0x06, 0x00, // 12: jmp L21
    0x1f, 0x02, 0x00, // 15: pushi 2
    0x12, 0x01, 0x00, // 18: pop var0001
    0x33, // 21: say
    0x25, // 22: ret
];

/// `while (var0000) var0000 = 1;`
pub const WHILE: &[u8] = &[
    0x21, 0x00, 0x00, // 0: push var0000
    0x05, 0x09, 0x00, // 3: jne L15
    0x1f, 0x01, 0x00, // 6: pushi 1
    0x12, 0x00, 0x00, // 9: pop var0000
    0x06, 0xf1, 0xff, // 12: jmp L0
    0x25, // 15: ret
];

/// `for (var0003 in var0000 with var0001 to var0002) var0004 = var0003;`
pub const FOR_EACH: &[u8] = &[
    0x2e, // 0: initloop
    0x02, 0x01, 0x00, 0x02, 0x00, 0x03, 0x00, 0x00, 0x00, 0x09, 0x00, // 1: loop L21
    0x21, 0x03, 0x00, // 12: push var0003
    0x12, 0x04, 0x00, // 15: pop var0004
    0x06, 0xec, 0xff, // 18: jmp L1
    0x25, // 21: ret
];
