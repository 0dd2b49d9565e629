//! Translation-table scaffold for localisation tooling

use super::{FunctionRenderer, RenderContext};
use crate::error::Result;
use crate::usecode::UsecodeFunction;
use std::fmt::Write;

pub struct TranslationTableRenderer;

impl FunctionRenderer for TranslationTableRenderer {
    fn name(&self) -> &'static str {
        "trans-table"
    }

    fn prologue(&self, _ctx: &RenderContext<'_>) -> Result<String> {
        Ok("<trans>\n".to_string())
    }

    fn render_function(
        &self,
        _ctx: &RenderContext<'_>,
        function: &UsecodeFunction,
    ) -> Result<Option<String>> {
        let mut out = String::new();
        writeln!(out, "<0x{:04X}>", function.id)?;
        for string in &function.data_strings {
            writeln!(out, "<0x{:04X}>", string.offset)?;
            writeln!(out, "{}", string.text)?;
            out.push_str("</>\n");
        }
        out.push_str("</>\n");
        Ok(Some(out))
    }

    fn epilogue(&self, _ctx: &RenderContext<'_>) -> Result<String> {
        Ok("</>\n".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ImageAnalysis;
    use crate::options::Options;
    use crate::render::test_support::{function, image};

    #[test]
    fn one_entry_per_string() {
        let image = image(vec![function(0x401, vec![])]);
        let analysis = ImageAnalysis::run(&image);
        let options = Options::default();
        let ctx = RenderContext::new(&image, &analysis, &options);
        let text = TranslationTableRenderer
            .render_function(&ctx, &image.functions[0])
            .unwrap()
            .unwrap();
        assert_eq!(text, "<0x0401>\n<0x0000>\nHello\n</>\n</>\n");
        assert_eq!(TranslationTableRenderer.prologue(&ctx).unwrap(), "<trans>\n");
    }
}
