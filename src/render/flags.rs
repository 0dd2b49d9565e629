//! Global flag cross-reference report

use super::{ImageRenderer, RenderContext};
use crate::analysis::FlagUsage;
use crate::error::Result;
use crate::usecode::opcodes::FlagAccess;
use std::fmt::Write;

pub struct FlagReportRenderer;

impl FlagReportRenderer {
    fn row(ctx: &RenderContext<'_>, usage: &FlagUsage, first: u32, out: &mut String) -> Result<()> {
        let access = match usage.access {
            FlagAccess::Get => "push  ",
            FlagAccess::Set => "pop   ",
        };
        write!(out, "        {}{:04x}  {:04x}", access, first, usage.offset)?;
        if let Some(name) = ctx.flag_names.and_then(|n| n.get(usage.flag_index)) {
            write!(out, "  {}", name)?;
        }
        out.push('\n');
        Ok(())
    }
}

impl ImageRenderer for FlagReportRenderer {
    fn name(&self) -> &'static str {
        "flags"
    }

    fn render(&self, ctx: &RenderContext<'_>) -> Result<String> {
        let views = &ctx.analysis.flags;
        let mut out = String::new();
        writeln!(out, "Number of flags found: {}", views.len())?;
        out.push('\n');
        if views.is_empty() {
            out.push_str("No global flags are read or written.\n");
            return Ok(out);
        }

        let mut current = None;
        for usage in &views.by_function {
            if current != Some(usage.function_id) {
                writeln!(out, "Function: {:04x}", usage.function_id)?;
                out.push_str("              flag  offset\n");
                current = Some(usage.function_id);
            }
            Self::row(ctx, usage, usage.flag_index, &mut out)?;
        }

        out.push('\n');
        let mut current = None;
        for usage in &views.by_flag {
            if current != Some(usage.flag_index) {
                write!(out, "Flag: {:04x}", usage.flag_index)?;
                if let Some(name) = ctx.flag_names.and_then(|n| n.get(usage.flag_index)) {
                    write!(out, "  {}", name)?;
                }
                out.push('\n');
                out.push_str("              func  offset\n");
                current = Some(usage.flag_index);
            }
            Self::row(ctx, usage, usage.function_id, &mut out)?;
        }
        Ok(out)
    }
}
