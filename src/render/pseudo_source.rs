//! Reconstructed pseudo-source
//!
//! Each function goes through the same pipeline: build the CFG, structure it
//! into regions, replay every block on a symbolic stack, then print. Any
//! step may fail for an individual function; the session falls back to
//! assembly for that function.

use super::{FunctionRenderer, RenderContext};
use crate::ast::{BlockToStatementConverter, StatementPrinter, Stmt, VarRef};
use crate::cfg::Cfg;
use crate::error::{Error, Result};
use crate::usecode::{ClassRef, UsecodeFunction, VmGeneration};
use std::fmt::Write;

pub struct PseudoSourceRenderer;

impl PseudoSourceRenderer {
    /// Text printed when consecutive functions move from one class to another
    pub fn class_transition(
        ctx: &RenderContext<'_>,
        from: Option<ClassRef>,
        to: Option<ClassRef>,
    ) -> Result<String> {
        let mut out = String::new();
        if from == to {
            return Ok(out);
        }
        if from.is_some() {
            out.push_str("}\n\n");
        }
        let Some(class_ref) = to else {
            return Ok(out);
        };
        let classes = ctx.image.classes();
        let Some(class) = classes.get(class_ref.0) else {
            return Ok(out);
        };
        write!(out, "class {}", class.name)?;
        let base = ctx
            .analysis
            .hierarchy
            .base_of(class_ref)
            .and_then(|b| classes.get(b.0));
        if let Some(base) = base {
            write!(out, " : {}", base.name)?;
        }
        out.push_str("\n{\n");
        let first = base.map_or(0, |b| b.num_vars);
        for i in first..class.num_vars {
            writeln!(out, "\tvar {};", VarRef::ClassVar(i as u16))?;
        }
        Ok(out)
    }

    /// Structured statements of one function
    pub fn body(ctx: &RenderContext<'_>, function: &UsecodeFunction) -> Result<Vec<Stmt>> {
        if ctx.image.generation() != VmGeneration::U7 {
            return Err(Error::structuring(
                function.id,
                "pseudo-source is only produced for Ultima VII usecode",
            ));
        }
        let cfg = Cfg::build(function, ctx.image.generation());
        let regions = crate::cfg::structure::structure(&cfg, function.id)?;
        let mut converter = BlockToStatementConverter::new(&cfg, ctx.expression_context(function));
        let mut body = converter.convert_regions(&regions)?;
        let stats = converter.stats();
        log::debug!(
            "Function 0x{:04X}: {} blocks, {} conditionals, {} loops",
            function.id,
            stats.blocks,
            stats.conditionals,
            stats.loops
        );
        if !function.returns_value && body.last() == Some(&Stmt::Return(None)) {
            body.pop();
        }
        Ok(body)
    }
}

impl FunctionRenderer for PseudoSourceRenderer {
    fn name(&self) -> &'static str {
        "ucs"
    }

    fn prologue(&self, ctx: &RenderContext<'_>) -> Result<String> {
        let mut out = String::new();
        if let Some(game) = ctx.image.game.directive_name() {
            writeln!(out, "#game \"{}\"", game)?;
        }
        if let Some(names) = ctx.flag_names.filter(|n| !n.is_empty()) {
            out.push_str("enum GlobalFlags\n{\n");
            for (index, name) in names.iter() {
                writeln!(out, "\t{} = 0x{:04X},", name, index)?;
            }
            out.push_str("};\n\n");
        }
        let statics = ctx.image.global_static_count();
        if statics > 0 {
            out.push_str("// Global static variables\n");
            for i in 1..=statics {
                writeln!(out, "static {};", VarRef::GlobalStatic(i as u16))?;
            }
            out.push('\n');
        }
        Ok(out)
    }

    fn render_function(
        &self,
        ctx: &RenderContext<'_>,
        function: &UsecodeFunction,
    ) -> Result<Option<String>> {
        let end = function
            .num_args
            .checked_add(function.num_locals)
            .ok_or_else(|| {
                Error::structuring(
                    function.id,
                    format!(
                        "{} arguments and {} locals exceed the variable range",
                        function.num_args, function.num_locals
                    ),
                )
            })?;
        let body = Self::body(ctx, function)?;
        let signature = ctx.analysis.index.resolve(function.id).signature();
        let locals: Vec<VarRef> = (function.num_args..end).map(VarRef::Local).collect();
        let mut text = StatementPrinter::print_function(&signature, &locals, &body);
        if function.class_id.is_none() {
            text.push('\n');
        }
        Ok(Some(text))
    }
}
