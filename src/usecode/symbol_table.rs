//! Embedded usecode symbol table
//!
//! Images produced by the UCC compiler start with an optional symbol table
//! that names functions and declares classes. Only the U7 generation carries
//! one.

use super::cursor::ByteCursor;
use crate::error::{Error as DecompilerError, Result as DecompilerResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// First magic word of an embedded symbol table
pub const UCSYMTBL_MAGIC0: u32 = 0xFFFF_FFFF;
/// Second magic word ("UCSY")
pub const UCSYMTBL_MAGIC1: u32 = 0x5543_5359;
/// The only table layout version we understand
pub const UCSYMTBL_VERSION: u32 = 0;

/// Symbol kind codes as stored in the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    FunDefined,
    FunExternDefined,
    FunUndefined,
    ClassScope,
    TableScope,
    ShapeFun,
    ObjectFun,
}

impl SymbolKind {
    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            1 => SymbolKind::FunDefined,
            2 => SymbolKind::FunExternDefined,
            3 => SymbolKind::FunUndefined,
            4 => SymbolKind::ClassScope,
            5 => SymbolKind::TableScope,
            6 => SymbolKind::ShapeFun,
            7 => SymbolKind::ObjectFun,
            _ => return None,
        })
    }

    pub fn code(self) -> u16 {
        match self {
            SymbolKind::FunDefined => 1,
            SymbolKind::FunExternDefined => 2,
            SymbolKind::FunUndefined => 3,
            SymbolKind::ClassScope => 4,
            SymbolKind::TableScope => 5,
            SymbolKind::ShapeFun => 6,
            SymbolKind::ObjectFun => 7,
        }
    }
}

/// Non-owning reference to a class by declaration index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassRef(pub usize);

/// A named function symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSymbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Shape number for shape functions
    pub shape: Option<u32>,
}

/// A declared class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSymbol {
    pub name: String,
    pub index: u32,
    pub num_vars: u32,
    /// Method ids in declaration order
    pub method_ids: Vec<u32>,
}

impl ClassSymbol {
    pub fn new(name: impl Into<String>, index: u32, num_vars: u32, method_ids: Vec<u32>) -> Self {
        Self {
            name: name.into(),
            index,
            num_vars,
            method_ids,
        }
    }
}

/// Parsed symbol table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolTable {
    pub classes: Vec<ClassSymbol>,
    pub functions: BTreeMap<u32, FunctionSymbol>,
    pub global_static_count: u32,
}

impl SymbolTable {
    pub fn function(&self, id: u32) -> Option<&FunctionSymbol> {
        self.functions.get(&id)
    }

    pub fn class(&self, class: ClassRef) -> Option<&ClassSymbol> {
        self.classes.get(class.0)
    }

    /// Class whose method list contains `id`
    pub fn class_of_method(&self, id: u32) -> Option<ClassRef> {
        self.classes
            .iter()
            .position(|cls| cls.method_ids.contains(&id))
            .map(ClassRef)
    }
}

/// Global statics are addressed by 16-bit slot numbers
pub const MAX_GLOBAL_STATICS: u32 = u16::MAX as u32;

/// A table that parsed but whose content we cannot trust
#[derive(Debug)]
pub struct LoadedTable {
    pub table: SymbolTable,
    /// Bytes consumed from the start of the image
    pub consumed: usize,
    /// Reason the content was rejected, if it was
    pub rejected: Option<DecompilerError>,
}

/// Check the signature words at the start of the image
pub fn detect(bytes: &[u8]) -> bool {
    let mut cursor = ByteCursor::new(bytes);
    matches!(
        (cursor.read_u32(), cursor.read_u32()),
        (Ok(UCSYMTBL_MAGIC0), Ok(UCSYMTBL_MAGIC1))
    )
}

/// Parse the symbol table at the start of the image
///
/// Truncation is returned as an error since the start of the function
/// records can no longer be found. Content problems are reported through
/// [`LoadedTable::rejected`] so the caller can continue without symbols.
pub fn load(bytes: &[u8]) -> DecompilerResult<LoadedTable> {
    let mut cursor = ByteCursor::new(bytes);
    let magic0 = cursor.read_u32()?;
    let magic1 = cursor.read_u32()?;
    if magic0 != UCSYMTBL_MAGIC0 || magic1 != UCSYMTBL_MAGIC1 {
        return Err(DecompilerError::UnknownSymbolTableFormat {
            reason: format!("bad signature 0x{:08X} 0x{:08X}", magic0, magic1),
        });
    }

    let mut loader = Loader::default();
    loader.read_scope(&mut cursor, None)?;
    let global_static_count = cursor.read_u32()?;
    if global_static_count > MAX_GLOBAL_STATICS {
        loader.reject(format!("implausible global static count {}", global_static_count));
    }

    let table = SymbolTable {
        classes: loader.classes,
        functions: loader.functions,
        global_static_count,
    };
    log::debug!(
        "Symbol table: {} classes, {} functions, {} global statics",
        table.classes.len(),
        table.functions.len(),
        table.global_static_count
    );

    Ok(LoadedTable {
        table,
        consumed: cursor.position(),
        rejected: loader.problem.map(|reason| DecompilerError::UnknownSymbolTableFormat { reason }),
    })
}

#[derive(Default)]
struct Loader {
    classes: Vec<ClassSymbol>,
    functions: BTreeMap<u32, FunctionSymbol>,
    problem: Option<String>,
}

impl Loader {
    fn reject(&mut self, reason: String) {
        if self.problem.is_none() {
            self.problem = Some(reason);
        }
    }

    /// Read one scope; `class_name` is set when reading a class's members
    fn read_scope(&mut self, cursor: &mut ByteCursor, class_name: Option<&str>) -> DecompilerResult<()> {
        let count = cursor.read_u32()?;
        let version = cursor.read_u32()?;
        if version != UCSYMTBL_VERSION {
            self.reject(format!("unsupported version {}", version));
        }
        for _ in 0..count {
            let name = cursor.read_cstring()?;
            let code = cursor.read_u16()?;
            let value = cursor.read_u32()?;
            match SymbolKind::from_code(code) {
                Some(SymbolKind::ClassScope) => {
                    if class_name.is_some() {
                        self.reject(format!("nested class '{}'", name));
                    }
                    self.read_class(cursor, name, value)?;
                }
                Some(SymbolKind::ShapeFun) => {
                    let shape = cursor.read_u32()?;
                    self.functions.insert(
                        value,
                        FunctionSymbol {
                            name,
                            kind: SymbolKind::ShapeFun,
                            shape: Some(shape),
                        },
                    );
                }
                Some(kind) => {
                    self.functions.insert(value, FunctionSymbol { name, kind, shape: None });
                }
                None => {
                    self.reject(format!("unknown symbol kind {} for '{}'", code, name));
                }
            }
        }
        Ok(())
    }

    fn read_class(&mut self, cursor: &mut ByteCursor, name: String, value: u32) -> DecompilerResult<()> {
        if value as usize != self.classes.len() {
            self.reject(format!(
                "class '{}' declared with index {} at position {}",
                name,
                value,
                self.classes.len()
            ));
        }
        self.read_scope(cursor, Some(&name))?;
        let num_methods = cursor.read_u16()?;
        let mut method_ids = Vec::with_capacity(num_methods as usize);
        for _ in 0..num_methods {
            method_ids.push(cursor.read_u16()? as u32);
        }
        let num_vars = cursor.read_u16()? as u32;
        self.classes
            .push(ClassSymbol::new(name, value, num_vars, method_ids));
        Ok(())
    }
}
