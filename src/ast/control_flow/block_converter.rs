//! Block-to-statement conversion

use super::ConditionalConverter;
use crate::ast::expression_context::ExpressionContext;
use crate::ast::instructions::{BlockOutcome, InstructionToStatementConverter, Terminator};
use crate::ast::nodes::Stmt;
use crate::cfg::{Cfg, LoopKind, Region};
use crate::error::{Error, Result};
use petgraph::graph::NodeIndex;

/// Counters gathered while converting one function
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockConversionStats {
    pub blocks: usize,
    pub conditionals: usize,
    pub loops: usize,
}

/// Turns a structured region tree into statements
pub struct BlockToStatementConverter<'a> {
    cfg: &'a Cfg,
    ctx: ExpressionContext<'a>,
    stats: BlockConversionStats,
}

impl<'a> BlockToStatementConverter<'a> {
    pub fn new(cfg: &'a Cfg, ctx: ExpressionContext<'a>) -> Self {
        Self {
            cfg,
            ctx,
            stats: BlockConversionStats::default(),
        }
    }

    pub fn stats(&self) -> BlockConversionStats {
        self.stats
    }

    fn block(&mut self, node: NodeIndex) -> Result<BlockOutcome> {
        self.stats.blocks += 1;
        InstructionToStatementConverter::convert_block(self.ctx, self.cfg.block(node))
    }

    fn unexpected(&self, node: NodeIndex, what: &str) -> Error {
        Error::structuring(
            self.ctx.function.id,
            format!("{} at 0x{:04X}", what, self.cfg.block(node).start_pc),
        )
    }

    pub fn convert_regions(&mut self, regions: &[Region]) -> Result<Vec<Stmt>> {
        let mut out = Vec::new();
        for region in regions {
            self.convert_region(region, &mut out)?;
        }
        Ok(out)
    }

    fn convert_region(&mut self, region: &Region, out: &mut Vec<Stmt>) -> Result<()> {
        match region {
            Region::Block(node) => {
                let outcome = self.block(*node)?;
                if outcome.terminator != Terminator::None {
                    return Err(self.unexpected(*node, "branch in a straight-line block"));
                }
                out.extend(outcome.statements);
            }
            Region::If {
                block,
                then,
                otherwise,
            } => {
                self.stats.conditionals += 1;
                let outcome = self.block(*block)?;
                let Terminator::Condition(cond) = outcome.terminator else {
                    return Err(self.unexpected(*block, "branch without a condition"));
                };
                out.extend(outcome.statements);
                let then = self.convert_regions(then)?;
                let otherwise = self.convert_regions(otherwise)?;
                out.push(ConditionalConverter::build_if(cond, then, otherwise));
            }
            Region::Loop { header, kind, body } => {
                self.stats.loops += 1;
                self.convert_loop(*header, *kind, body, out)?;
            }
            Region::Break => out.push(Stmt::Break),
            Region::Continue => out.push(Stmt::Continue),
        }
        Ok(())
    }

    fn convert_loop(
        &mut self,
        header: NodeIndex,
        kind: LoopKind,
        body: &[Region],
        out: &mut Vec<Stmt>,
    ) -> Result<()> {
        if kind == LoopKind::Infinite {
            // The header is the first region of the body
            let body = self.convert_regions(body)?;
            out.push(Stmt::Loop(body));
            return Ok(());
        }

        let outcome = self.block(header)?;
        let body = self.convert_regions(body)?;
        match (kind, outcome.terminator) {
            (LoopKind::ForEach, Terminator::ForEach(h)) => {
                out.extend(outcome.statements);
                out.push(Stmt::ForEach { header: h, body });
            }
            (LoopKind::Converse, Terminator::Converse) => {
                out.extend(outcome.statements);
                out.push(Stmt::Converse(body));
            }
            (LoopKind::While { negated }, Terminator::Condition(cond)) => {
                let cond = if negated { cond.negate() } else { cond };
                out.push(ConditionalConverter::build_while(outcome.statements, cond, body));
            }
            _ => return Err(self.unexpected(header, "loop header does not match its loop")),
        }
        Ok(())
    }
}
