//! JSON summary of the decoded image

use super::{ImageRenderer, RenderContext};
use crate::analysis::FunctionInfo;
use crate::error::{Error, Result};
use crate::options::Options;
use crate::usecode::{DecodeDiagnostic, Game};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ClassEntry<'a> {
    name: &'a str,
    index: u32,
    num_vars: u32,
    methods: &'a [u32],
    base: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct InspectReport<'a> {
    game: Game,
    options: &'a Options,
    function_count: usize,
    global_statics: u32,
    functions: Vec<&'a FunctionInfo>,
    classes: Vec<ClassEntry<'a>>,
    flag_usages: usize,
    diagnostics: &'a [DecodeDiagnostic],
}

pub struct InspectRenderer;

impl ImageRenderer for InspectRenderer {
    fn name(&self) -> &'static str {
        "inspect"
    }

    fn render(&self, ctx: &RenderContext<'_>) -> Result<String> {
        let classes = ctx.image.classes();
        let report = InspectReport {
            game: ctx.image.game,
            options: ctx.options,
            function_count: ctx.image.functions.len(),
            global_statics: ctx.image.global_static_count(),
            functions: ctx.analysis.index.iter().collect(),
            classes: classes
                .iter()
                .enumerate()
                .map(|(i, class)| ClassEntry {
                    name: &class.name,
                    index: class.index,
                    num_vars: class.num_vars,
                    methods: &class.method_ids,
                    base: ctx
                        .analysis
                        .hierarchy
                        .base_of(crate::usecode::ClassRef(i))
                        .and_then(|b| classes.get(b.0))
                        .map(|b| b.name.as_str()),
                })
                .collect(),
            flag_usages: ctx.analysis.flags.len(),
            diagnostics: &ctx.image.diagnostics,
        };
        let mut json = serde_json::to_string_pretty(&report)
            .map_err(|e| Error::internal(format!("Failed to serialize image summary: {}", e)))?;
        json.push('\n');
        Ok(json)
    }
}
