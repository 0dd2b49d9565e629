//! Function listing: one row of sizes per function

use super::{FunctionRenderer, RenderContext};
use crate::error::Result;
use crate::usecode::UsecodeFunction;

pub struct ListingRenderer;

impl FunctionRenderer for ListingRenderer {
    fn name(&self) -> &'static str {
        "list"
    }

    fn prologue(&self, ctx: &RenderContext<'_>) -> Result<String> {
        let mut header = String::from("Function       offset    size  data  code");
        if ctx.options.debug_names {
            header.push_str(" funcname");
        }
        header.push('\n');
        Ok(header)
    }

    fn render_function(
        &self,
        ctx: &RenderContext<'_>,
        function: &UsecodeFunction,
    ) -> Result<Option<String>> {
        let mut row = format!(
            "{:<11}{:>10}{:>8}{:>6}{:>6}",
            format!("0x{:04X}", function.id),
            format!("{:08X}", function.raw_offset),
            format!("{:04X}", function.raw_size),
            format!("{:04X}", function.data_size),
            format!("{:04X}", function.code_size),
        );
        if ctx.options.debug_names {
            if let Some(name) = &function.debug_name {
                row.push(' ');
                row.push_str(name);
            }
        }
        row.push('\n');
        Ok(Some(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ImageAnalysis;
    use crate::options::Options;
    use crate::render::test_support::{function, image, instr};

    #[test]
    fn row_lines_up_with_header() {
        let image = image(vec![function(0x401, vec![instr(0x25, 0, 1, vec![])])]);
        let analysis = ImageAnalysis::run(&image);
        let options = Options::default();
        let ctx = RenderContext::new(&image, &analysis, &options);
        let header = ListingRenderer.prologue(&ctx).unwrap();
        let row = ListingRenderer
            .render_function(&ctx, &image.functions[0])
            .unwrap()
            .unwrap();
        assert_eq!(row, "0x0401       00000010    000D  0006  0001\n");
        assert_eq!(header.trim_end().len(), row.trim_end().len());
    }

    #[test]
    fn debug_names_add_a_column() {
        let mut f = function(0x401, vec![]);
        f.debug_name = Some("Intro".to_string());
        let image = image(vec![f]);
        let analysis = ImageAnalysis::run(&image);
        let options = Options {
            debug_names: true,
            ..Options::default()
        };
        let ctx = RenderContext::new(&image, &analysis, &options);
        assert!(ListingRenderer.prologue(&ctx).unwrap().ends_with(" funcname\n"));
        let row = ListingRenderer
            .render_function(&ctx, &image.functions[0])
            .unwrap()
            .unwrap();
        assert!(row.ends_with(" Intro\n"));
    }
}
