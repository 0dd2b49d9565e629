//! Main decompiler module
//!
//! This module orchestrates one run: whole-image views first, then the
//! per-function stream. Functions render in parallel and are stitched back
//! in image order, so the text matches a sequential run.

use crate::analysis::ImageAnalysis;
use crate::error::{Error as DecompilerError, Result as DecompilerResult};
use crate::options::{FunctionSelection, Options};
use crate::render::{
    AssemblyRenderer, ExternHeaderRenderer, FlagReportRenderer, FunctionRenderer, ImageRenderer,
    InspectRenderer, ListingRenderer, PseudoSourceRenderer, RenderContext,
    TranslationTableRenderer,
};
use crate::usecode::{ClassRef, FlagNames, IntrinsicNames, UsecodeFunction, UsecodeImage};
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;

/// A renderer that failed for one function
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderDiagnostic {
    pub function_id: u32,
    pub renderer: &'static str,
    pub message: String,
}

impl fmt::Display for RenderDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "function 0x{:04X}: {} failed: {}",
            self.function_id, self.renderer, self.message
        )
    }
}

/// Aggregate result of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub functions_total: usize,
    pub functions_rendered: usize,
    /// Functions whose pseudo-source fell back to assembly
    pub fallbacks: usize,
    /// Number of explicitly requested ids; zero for the whole image
    pub requested: usize,
    /// Requested ids the image does not define
    pub missing: Vec<u32>,
    pub diagnostics: Vec<RenderDiagnostic>,
    /// Lines destined for stderr, in order
    pub messages: Vec<String>,
    /// True when only whole-image views were requested
    pub whole_image_only: bool,
}

impl RunReport {
    pub fn exit_code(&self) -> i32 {
        if self.requested > 0 && self.missing.len() == self.requested {
            1
        } else if self.functions_rendered > 0 || self.whole_image_only {
            0
        } else {
            1
        }
    }
}

/// Text and report of one run
#[derive(Debug, Clone)]
pub struct DecompileOutput {
    pub text: String,
    pub report: RunReport,
}

/// Rendered pieces of one function, in stream order
#[derive(Debug, Default)]
struct FunctionChunk {
    list: Option<String>,
    ucs: Option<String>,
    trans: Option<String>,
    asm: Option<String>,
    fell_back: bool,
    diagnostics: Vec<RenderDiagnostic>,
}

/// Main decompiler struct
pub struct Decompiler<'a> {
    image: &'a UsecodeImage,
    options: &'a Options,
    analysis: ImageAnalysis,
    flag_names: Option<FlagNames>,
    intrinsics: Option<IntrinsicNames>,
}

impl<'a> Decompiler<'a> {
    /// Create a new decompiler over a decoded image
    pub fn new(image: &'a UsecodeImage, options: &'a Options) -> Self {
        log::info!("Analyzing {} functions...", image.functions.len());
        Self {
            image,
            options,
            analysis: ImageAnalysis::run(image),
            flag_names: None,
            intrinsics: None,
        }
    }

    pub fn with_flag_names(mut self, names: Option<FlagNames>) -> Self {
        self.flag_names = names;
        self
    }

    pub fn with_intrinsics(mut self, names: Option<IntrinsicNames>) -> Self {
        self.intrinsics = names;
        self
    }

    pub fn analysis(&self) -> &ImageAnalysis {
        &self.analysis
    }

    fn context(&self) -> RenderContext<'_> {
        RenderContext::new(self.image, &self.analysis, self.options)
            .with_names(self.flag_names.as_ref(), self.intrinsics.as_ref())
    }

    /// Functions the selection asks for, in image order
    pub fn selected_functions(&self) -> Vec<&'a UsecodeFunction> {
        self.image
            .functions
            .iter()
            .filter(|f| self.options.selection.includes(f.id))
            .collect()
    }

    fn missing_ids(&self) -> Vec<u32> {
        match &self.options.selection {
            FunctionSelection::All => Vec::new(),
            FunctionSelection::Ids(ids) => ids
                .iter()
                .copied()
                .filter(|&id| self.image.function(id).is_none())
                .collect(),
        }
    }

    /// Run every requested view and collect the text
    pub fn run(&self) -> DecompilerResult<DecompileOutput> {
        let ctx = self.context();
        let modes = self.options.modes;
        let mut text = String::new();
        let mut report = RunReport {
            functions_total: self.image.functions.len(),
            whole_image_only: !modes.any_per_function() && modes.any_whole_image(),
            ..RunReport::default()
        };
        report
            .messages
            .extend(self.image.diagnostics.iter().map(|d| format!("warning: {}", d)));

        if modes.inspect {
            text.push_str(&InspectRenderer.render(&ctx)?);
        }
        if modes.extern_header {
            text.push_str(&ExternHeaderRenderer.render(&ctx)?);
        }
        if modes.flags {
            text.push_str(&FlagReportRenderer.render(&ctx)?);
        }

        if let FunctionSelection::Ids(ids) = &self.options.selection {
            report.requested = ids.len();
        }
        report.missing = self.missing_ids();
        for &id in &report.missing {
            let err = DecompilerError::RequestedFunctionNotFound { id };
            log::warn!("{}", err);
        }

        if modes.any_per_function() {
            self.render_stream(&ctx, &mut text, &mut report)?;
        }
        Ok(DecompileOutput { text, report })
    }

    fn render_stream(
        &self,
        ctx: &RenderContext<'_>,
        text: &mut String,
        report: &mut RunReport,
    ) -> DecompilerResult<()> {
        let modes = self.options.modes;
        if modes.list {
            text.push_str(&ListingRenderer.prologue(ctx)?);
        }
        if modes.trans_table {
            text.push_str(&TranslationTableRenderer.prologue(ctx)?);
        }
        if modes.ucs {
            text.push_str(&PseudoSourceRenderer.prologue(ctx)?);
        }

        let selected = self.selected_functions();
        log::info!("Rendering {} functions...", selected.len());
        let chunks: Vec<FunctionChunk> = selected
            .par_iter()
            .map(|function| self.render_function(ctx, function))
            .collect();

        let mut class: Option<ClassRef> = None;
        for (function, chunk) in selected.iter().zip(chunks) {
            if let Some(list) = chunk.list {
                text.push_str(&list);
            }
            if modes.ucs {
                text.push_str(&PseudoSourceRenderer::class_transition(
                    ctx,
                    class,
                    function.class_id,
                )?);
                class = function.class_id;
                if let Some(ucs) = chunk.ucs {
                    text.push_str(&ucs);
                }
            }
            if let Some(trans) = chunk.trans {
                text.push_str(&trans);
            }
            if let Some(asm) = chunk.asm {
                text.push_str(&asm);
            }
            if chunk.fell_back {
                report.fallbacks += 1;
            }
            report.functions_rendered += 1;
            for diagnostic in chunk.diagnostics {
                report.messages.push(format!("warning: {}", diagnostic));
                report.diagnostics.push(diagnostic);
            }
        }
        if modes.ucs && class.is_some() {
            text.push_str(&PseudoSourceRenderer::class_transition(ctx, class, None)?);
        }

        if selected.is_empty() {
            report.messages.push("Function not found.".to_string());
        }
        if self.options.selection == FunctionSelection::All {
            report
                .messages
                .push(format!("Functions: {}", self.image.functions.len()));
        }
        if modes.list {
            report
                .messages
                .push(format!("\nFunctions: {}", self.image.functions.len()));
        }

        if modes.trans_table {
            text.push_str(&TranslationTableRenderer.epilogue(ctx)?);
        }
        text.push('\n');
        Ok(())
    }

    fn render_function(&self, ctx: &RenderContext<'_>, function: &UsecodeFunction) -> FunctionChunk {
        let modes = self.options.modes;
        let mut chunk = FunctionChunk::default();
        let mut printed = false;

        if modes.list {
            chunk.list = self.attempt(&ListingRenderer, ctx, function, &mut chunk.diagnostics);
            printed |= chunk.list.is_some();
        }
        if modes.ucs {
            match PseudoSourceRenderer.render_function(ctx, function) {
                Ok(text) => {
                    printed |= text.is_some();
                    chunk.ucs = text;
                }
                Err(err) => {
                    log::debug!("Function 0x{:04X}: {}", function.id, err);
                    chunk.ucs = Some(format!(
                        "// Function 0x{:04X}: pseudo-source unavailable: {}\n",
                        function.id, err
                    ));
                    chunk.fell_back = true;
                    chunk.diagnostics.push(RenderDiagnostic {
                        function_id: function.id,
                        renderer: PseudoSourceRenderer.name(),
                        message: err.to_string(),
                    });
                }
            }
        }
        if modes.trans_table {
            chunk.trans =
                self.attempt(&TranslationTableRenderer, ctx, function, &mut chunk.diagnostics);
            printed |= chunk.trans.is_some();
        }
        if modes.asm || !printed || chunk.fell_back {
            chunk.asm = self.attempt(&AssemblyRenderer, ctx, function, &mut chunk.diagnostics);
        }
        chunk
    }

    fn attempt(
        &self,
        renderer: &dyn FunctionRenderer,
        ctx: &RenderContext<'_>,
        function: &UsecodeFunction,
        diagnostics: &mut Vec<RenderDiagnostic>,
    ) -> Option<String> {
        match renderer.render_function(ctx, function) {
            Ok(text) => text,
            Err(err) => {
                diagnostics.push(RenderDiagnostic {
                    function_id: function.id,
                    renderer: renderer.name(),
                    message: err.to_string(),
                });
                None
            }
        }
    }
}
