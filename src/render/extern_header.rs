//! `extern` prototypes for every selected function

use super::{ImageRenderer, RenderContext};
use crate::error::Result;
use crate::usecode::VmGeneration;
use std::fmt::Write;

pub const U7_ONLY: &str =
    "This option only works for U7:BG, U7:FoV, U7:SI beta, U7:SI and U7:SS";

pub struct ExternHeaderRenderer;

impl ImageRenderer for ExternHeaderRenderer {
    fn name(&self) -> &'static str {
        "extern-header"
    }

    fn render(&self, ctx: &RenderContext<'_>) -> Result<String> {
        if ctx.image.generation() != VmGeneration::U7 {
            return Ok(format!("{}\n", U7_ONLY));
        }
        let mut out = String::new();
        for function in &ctx.image.functions {
            if !ctx.options.selection.includes(function.id) {
                continue;
            }
            let info = ctx.analysis.index.resolve(function.id);
            writeln!(out, "extern {};", info.signature())?;
        }
        Ok(out)
    }
}
