//! Function id to name / signature lookup
//!
//! Renderers never look at the symbol table directly; every "function id to
//! printable name" question goes through [`FunctionIndex`].

use crate::usecode::{ClassRef, SymbolKind, SymbolTable, UsecodeFunction};
use serde::Serialize;
use std::collections::BTreeMap;

/// Ids below this are run when a shape is used
pub const SHAPE_FUNCTION_LIMIT: u32 = 0x400;
/// Ids below this (and above the shape range) are run for specific objects
pub const OBJECT_FUNCTION_LIMIT: u32 = 0x800;

/// How the engine reaches a function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FunctionKind {
    ShapeTriggered,
    ObjectTriggered,
    UserDefined,
    /// Declared but defined elsewhere
    External,
}

impl FunctionKind {
    /// Classify an id by range alone
    pub fn from_id(id: u32) -> Self {
        if id < SHAPE_FUNCTION_LIMIT {
            FunctionKind::ShapeTriggered
        } else if id < OBJECT_FUNCTION_LIMIT {
            FunctionKind::ObjectTriggered
        } else {
            FunctionKind::UserDefined
        }
    }

    fn from_symbol(kind: SymbolKind, id: u32) -> Self {
        match kind {
            SymbolKind::ShapeFun => FunctionKind::ShapeTriggered,
            SymbolKind::ObjectFun => FunctionKind::ObjectTriggered,
            SymbolKind::FunDefined => FunctionKind::UserDefined,
            SymbolKind::FunExternDefined | SymbolKind::FunUndefined => FunctionKind::External,
            SymbolKind::ClassScope | SymbolKind::TableScope => FunctionKind::from_id(id),
        }
    }
}

/// Everything a renderer needs to know about a function id
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionInfo {
    pub id: u32,
    pub name: String,
    pub num_args: u16,
    pub returns_value: bool,
    pub always_aborts: bool,
    pub class_id: Option<ClassRef>,
    pub kind: FunctionKind,
    pub symbol_kind: Option<SymbolKind>,
    /// Shape number for shape functions declared in the symbol table
    pub shape: Option<u32>,
    /// False for ids that are only referenced, never defined in the image
    pub defined: bool,
}

impl FunctionInfo {
    fn synthesized(id: u32) -> Self {
        Self {
            id,
            name: synthesized_name(id),
            num_args: 0,
            returns_value: false,
            always_aborts: false,
            class_id: None,
            kind: FunctionKind::from_id(id),
            symbol_kind: None,
            shape: None,
            defined: false,
        }
    }

    /// `var0000, var0001, ...` for the argument slots
    pub fn parameter_list(&self) -> String {
        (0..self.num_args)
            .map(|i| format!("var{:04}", i))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Prototype without trailing `;`
    pub fn signature(&self) -> String {
        let mut out = String::new();
        out.push_str(if self.returns_value { "var " } else { "void " });
        out.push_str(&self.name);
        out.push(' ');
        match self.kind {
            FunctionKind::ShapeTriggered => {
                out.push_str(&format!("shape#(0x{:X}) ", self.shape.unwrap_or(self.id)))
            }
            FunctionKind::ObjectTriggered => out.push_str(&format!("object#(0x{:X}) ", self.id)),
            _ => out.push_str(&format!("0x{:X} ", self.id)),
        }
        out.push_str(&format!("({})", self.parameter_list()));
        out
    }
}

pub fn synthesized_name(id: u32) -> String {
    format!("Func{:04X}", id)
}

/// Map of every function id the image defines
#[derive(Debug, Clone, Default, Serialize)]
pub struct FunctionIndex {
    entries: BTreeMap<u32, FunctionInfo>,
}

impl FunctionIndex {
    pub fn build(functions: &[UsecodeFunction], symbols: Option<&SymbolTable>) -> Self {
        let entries = functions
            .iter()
            .map(|function| {
                let symbol = symbols.and_then(|s| s.function(function.id));
                let name = symbol
                    .map(|s| s.name.clone())
                    .filter(|n| !n.is_empty())
                    .or_else(|| function.debug_name.clone())
                    .unwrap_or_else(|| synthesized_name(function.id));
                let kind = match symbol {
                    Some(s) => FunctionKind::from_symbol(s.kind, function.id),
                    None => FunctionKind::from_id(function.id),
                };
                let info = FunctionInfo {
                    id: function.id,
                    name,
                    num_args: function.num_args,
                    returns_value: function.returns_value,
                    always_aborts: function.always_aborts,
                    class_id: function.class_id,
                    kind,
                    symbol_kind: symbol.map(|s| s.kind),
                    shape: symbol.and_then(|s| s.shape),
                    defined: true,
                };
                (function.id, info)
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, id: u32) -> Option<&FunctionInfo> {
        self.entries.get(&id)
    }

    /// Entry for `id`, synthesized for functions outside the image
    pub fn resolve(&self, id: u32) -> FunctionInfo {
        self.get(id)
            .cloned()
            .unwrap_or_else(|| FunctionInfo::synthesized(id))
    }

    /// Printable name for a call target
    pub fn name_of(&self, id: u32) -> String {
        match self.get(id) {
            Some(info) => info.name.clone(),
            None => synthesized_name(id),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &FunctionInfo> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecode::FunctionSymbol;

    fn function(id: u32) -> UsecodeFunction {
        UsecodeFunction {
            id,
            num_args: 2,
            num_locals: 0,
            returns_value: false,
            always_aborts: false,
            class_id: None,
            uses_ext32_encoding: false,
            instructions: Vec::new(),
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
    fn kinds_follow_id_ranges_without_symbols() {
        let functions = vec![function(0x3ff), function(0x400), function(0x7ff), function(0x800)];
        let index = FunctionIndex::build(&functions, None);
        assert_eq!(index.len(), 4);
        let kinds: Vec<_> = index.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                FunctionKind::ShapeTriggered,
                FunctionKind::ObjectTriggered,
                FunctionKind::ObjectTriggered,
                FunctionKind::UserDefined
            ]
        );
        assert_eq!(index.name_of(0x800), "Func0800");
    }

    #[test]
    fn symbol_name_wins_over_debug_name() {
        let mut named = function(0x900);
        named.debug_name = Some("dbg".into());
        let mut debug_only = function(0x901);
        debug_only.debug_name = Some("talk".into());
        let mut symbols = SymbolTable::default();
        symbols.functions.insert(
            0x900,
            FunctionSymbol {
                name: "greet".into(),
                kind: SymbolKind::FunDefined,
                shape: None,
            },
        );
        let index = FunctionIndex::build(&[named, debug_only], Some(&symbols));
        assert_eq!(index.name_of(0x900), "greet");
        assert_eq!(index.name_of(0x901), "talk");
        assert_eq!(index.get(0x900).map(|i| i.symbol_kind), Some(Some(SymbolKind::FunDefined)));
    }

    #[test]
    fn signatures() {
        let mut f = function(0x96);
        f.returns_value = true;
        let index = FunctionIndex::build(&[f, function(0x401)], None);
        assert_eq!(
            index.resolve(0x96).signature(),
            "var Func0096 shape#(0x96) (var0000, var0001)"
        );
        assert_eq!(
            index.resolve(0x401).signature(),
            "void Func0401 object#(0x401) (var0000, var0001)"
        );
        let missing = index.resolve(0x1234);
        assert!(!missing.defined);
        assert_eq!(missing.signature(), "void Func1234 0x1234 ()");
    }
}
