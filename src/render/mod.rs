//! Output views
//!
//! Per-function renderers produce one chunk of text per selected function,
//! framed by a prologue and an epilogue. Whole-image renderers run once.
//! The session in [`crate::decompiler`] decides the order and the fallback.

pub mod assembly;
pub mod extern_header;
pub mod flags;
pub mod inspect;
pub mod listing;
pub mod pseudo_source;
pub mod trans_table;

pub use assembly::AssemblyRenderer;
pub use extern_header::ExternHeaderRenderer;
pub use flags::FlagReportRenderer;
pub use inspect::InspectRenderer;
pub use listing::ListingRenderer;
pub use pseudo_source::PseudoSourceRenderer;
pub use trans_table::TranslationTableRenderer;

use crate::analysis::ImageAnalysis;
use crate::ast::ExpressionContext;
use crate::error::Result;
use crate::options::Options;
use crate::usecode::{ClassSymbol, FlagNames, IntrinsicNames, UsecodeFunction, UsecodeImage};

/// Read-only inputs shared by every renderer
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub image: &'a UsecodeImage,
    pub analysis: &'a ImageAnalysis,
    pub options: &'a Options,
    pub flag_names: Option<&'a FlagNames>,
    pub intrinsics: Option<&'a IntrinsicNames>,
}

impl<'a> RenderContext<'a> {
    pub fn new(image: &'a UsecodeImage, analysis: &'a ImageAnalysis, options: &'a Options) -> Self {
        Self {
            image,
            analysis,
            options,
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

    pub fn expression_context(&self, function: &'a UsecodeFunction) -> ExpressionContext<'a> {
        ExpressionContext::new(
            function,
            self.image.generation(),
            &self.analysis.index,
            self.image.classes(),
        )
        .with_names(self.flag_names, self.intrinsics)
    }

    /// Declared class a method belongs to
    pub fn class_of(&self, function: &UsecodeFunction) -> Option<&'a ClassSymbol> {
        function
            .class_id
            .and_then(|class| self.image.classes().get(class.0))
    }
}

/// A view rendered function by function
pub trait FunctionRenderer: Sync {
    fn name(&self) -> &'static str;

    fn prologue(&self, _ctx: &RenderContext<'_>) -> Result<String> {
        Ok(String::new())
    }

    /// `Ok(None)` when the view has nothing to say about `function`
    fn render_function(
        &self,
        ctx: &RenderContext<'_>,
        function: &UsecodeFunction,
    ) -> Result<Option<String>>;

    fn epilogue(&self, _ctx: &RenderContext<'_>) -> Result<String> {
        Ok(String::new())
    }
}

/// A view rendered once for the whole image
pub trait ImageRenderer {
    fn name(&self) -> &'static str;

    fn render(&self, ctx: &RenderContext<'_>) -> Result<String>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::usecode::{ClassRef, DataString, Game, Instruction, Operand, UsecodeFunction, UsecodeImage};
    use crate::usecode::{ClassSymbol, SymbolTable};

    pub fn function(id: u32, instructions: Vec<Instruction>) -> UsecodeFunction {
        let code_size = instructions.last().map_or(0, |i| i.next_offset());
        UsecodeFunction {
            id,
            num_args: 1,
            num_locals: 1,
            returns_value: false,
            always_aborts: false,
            class_id: None,
            uses_ext32_encoding: false,
            instructions,
            raw_offset: 0x10,
            raw_size: 12 + code_size,
            data_size: 6,
            code_size,
            links: vec![0x0402],
            data_strings: vec![DataString {
                offset: 0,
                text: "Hello".to_string(),
            }],
            debug_name: None,
        }
    }

    pub fn instr(opcode: u8, offset: u32, size: u32, operands: Vec<Operand>) -> Instruction {
        Instruction {
            opcode,
            offset,
            size,
            raw: (0..size).map(|i| if i == 0 { opcode } else { 0 }).collect(),
            operands,
        }
    }

    pub fn image(functions: Vec<UsecodeFunction>) -> UsecodeImage {
        UsecodeImage {
            game: Game::BlackGate,
            functions,
            symbols: None,
            diagnostics: Vec::new(),
        }
    }

    pub fn with_class(mut image: UsecodeImage, method: u32) -> UsecodeImage {
        for f in &mut image.functions {
            if f.id == method {
                f.class_id = Some(ClassRef(0));
            }
        }
        image.symbols = Some(SymbolTable {
            classes: vec![ClassSymbol::new("Door", 0, 2, vec![method])],
            functions: Default::default(),
            global_static_count: 0,
        });
        image
    }
}
