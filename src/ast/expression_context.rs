//! Lookups needed while rebuilding expressions
//!
//! Bundles the function being converted with the image-wide tables that
//! turn raw operands into names: the function index for call targets, the
//! declared classes, and the optional flag and intrinsic name files.

use crate::analysis::{FunctionIndex, FunctionInfo};
use crate::usecode::{ClassSymbol, FlagNames, IntrinsicNames, UsecodeFunction, VmGeneration};

#[derive(Debug, Clone, Copy)]
pub struct ExpressionContext<'a> {
    pub function: &'a UsecodeFunction,
    pub generation: VmGeneration,
    pub index: &'a FunctionIndex,
    pub classes: &'a [ClassSymbol],
    pub flag_names: Option<&'a FlagNames>,
    pub intrinsics: Option<&'a IntrinsicNames>,
}

impl<'a> ExpressionContext<'a> {
    pub fn new(
        function: &'a UsecodeFunction,
        generation: VmGeneration,
        index: &'a FunctionIndex,
        classes: &'a [ClassSymbol],
    ) -> Self {
        Self {
            function,
            generation,
            index,
            classes,
            flag_names: None,
            intrinsics: None,
        }
    }

    pub fn with_names(
        mut self,
        flag_names: Option<&'a FlagNames>,
        intrinsics: Option<&'a IntrinsicNames>,
    ) -> Self {
        self.flag_names = flag_names;
        self.intrinsics = intrinsics;
        self
    }

    /// Subscript text for `gflags[...]`
    pub fn flag_label(&self, index: u32) -> String {
        match self.flag_names {
            Some(names) => names.subscript(index),
            None => format!("0x{:04X}", index),
        }
    }

    pub fn intrinsic_name(&self, number: u16) -> String {
        match self.intrinsics {
            Some(names) => names.name(number),
            None => format!("UNKNOWN_{:02x}", number),
        }
    }

    pub fn callee(&self, id: u32) -> FunctionInfo {
        self.index.resolve(id)
    }

    pub fn class(&self, index: u16) -> Option<&'a ClassSymbol> {
        self.classes.get(index as usize)
    }

    pub fn class_name(&self, index: u16) -> String {
        self.class(index)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| format!("Class{:04X}", index))
    }
}
