//! Control flow structuring
//!
//! Turns a function's CFG into nested [`Region`]s. Loops come from back
//! edges, two-way branches join at their immediate post-dominator, and edges
//! to the enclosing loop's header or follow block become `continue` and
//! `break`. A block that would be emitted twice, a loop whose exits cannot be
//! reduced to one follow block, an exception handler, or any reachable block
//! left over makes structuring fail for the function.

use crate::cfg::analysis::{dominates, PostDominatorAnalysis};
use crate::cfg::{Cfg, EdgeKind};
use crate::error::{Error, Result};
use crate::usecode::opcodes::Flow;
use petgraph::algo::dominators::Dominators;
use petgraph::graph::NodeIndex;
use std::collections::{HashMap, HashSet};

/// How a loop header decides whether to run the body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    /// `for (x in array)` driven by a `loop` instruction
    ForEach,
    /// `converse` block driven by `startconv`
    Converse,
    /// Conditional header; `negated` when the body is on the jump side
    While { negated: bool },
    /// No usable header condition; left by `break` or `return`
    Infinite,
}

/// A structured piece of a function body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Region {
    /// Straight-line block
    Block(NodeIndex),
    /// Two-way branch; `block` computes the condition
    If {
        block: NodeIndex,
        then: Vec<Region>,
        otherwise: Vec<Region>,
    },
    Loop {
        header: NodeIndex,
        kind: LoopKind,
        body: Vec<Region>,
    },
    Break,
    Continue,
}

/// A loop with its body widened over break and return paths
#[derive(Debug, Clone)]
struct LoopShape {
    body: HashSet<NodeIndex>,
    follow: Option<NodeIndex>,
}

#[derive(Clone, Copy)]
struct Frame<'a> {
    header: Option<NodeIndex>,
    follow: Option<NodeIndex>,
    body: Option<&'a HashSet<NodeIndex>>,
}

impl Frame<'_> {
    fn top() -> Self {
        Frame {
            header: None,
            follow: None,
            body: None,
        }
    }

    fn in_body(&self, node: NodeIndex) -> bool {
        self.body.map_or(true, |b| b.contains(&node))
    }
}

/// Where control goes after a block
enum Step {
    End,
    Continue,
    Break,
    Node(NodeIndex),
}

/// Structure a function body
pub fn structure(cfg: &Cfg, function_id: u32) -> Result<Vec<Region>> {
    let (Some(entry), Some(dominators)) = (cfg.entry_node(), cfg.analyze_dominators()) else {
        return Ok(Vec::new());
    };
    let post = cfg.analyze_post_dominators();
    let shapes = loop_shapes(cfg, &dominators, function_id)?;
    let mut structurer = Structurer {
        cfg,
        function_id,
        post: &post,
        shapes: &shapes,
        emitted: HashSet::new(),
    };

    let regions = structurer.sequence(entry, None, Frame::top())?;
    let mut leftover: Vec<u32> = cfg
        .reachable_blocks()
        .into_iter()
        .filter(|n| !structurer.emitted.contains(n))
        .map(|n| cfg.block(n).start_pc)
        .collect();
    leftover.sort_unstable();
    if let Some(pc) = leftover.first() {
        return Err(Error::structuring(
            function_id,
            format!("block at 0x{:04X} was not structured", pc),
        ));
    }
    Ok(structurer.flatten(regions))
}

fn loop_shapes(
    cfg: &Cfg,
    dominators: &Dominators<NodeIndex>,
    function_id: u32,
) -> Result<HashMap<NodeIndex, LoopShape>> {
    let loops = cfg.analyze_loops(dominators);
    let exit = cfg.exit_node();
    let mut shapes = HashMap::new();

    for (&header, lp) in &loops.loops {
        let header_follow = match cfg.block(header).terminator_flow(cfg.generation()) {
            Flow::Branch | Flow::Loop | Flow::Converse => [EdgeKind::False, EdgeKind::True]
                .into_iter()
                .filter_map(|k| cfg.successor(header, k))
                .find(|s| !lp.contains(*s)),
            _ => None,
        };

        let candidates: Vec<Option<NodeIndex>> = match header_follow {
            Some(f) => vec![Some(f)],
            None => std::iter::once(None)
                .chain(lp.exit_nodes.iter().copied().map(Some))
                .collect(),
        };

        let shape = candidates.into_iter().find_map(|follow| {
            let mut body = lp.body_nodes.clone();
            for &e in lp.exit_nodes.iter().filter(|&&e| Some(e) != follow) {
                let region = absorb(cfg, dominators, &lp.body_nodes, header, e, follow)?;
                body.extend(region);
            }
            Some(LoopShape { body, follow })
        });

        match shape {
            Some(shape) => {
                log::debug!(
                    "Loop at 0x{:04X}: {} block(s)",
                    cfg.block(header).start_pc,
                    shape.body.len()
                );
                shapes.insert(header, shape);
            }
            None => {
                return Err(Error::structuring(
                    function_id,
                    format!(
                        "loop at 0x{:04X} has {} exits",
                        cfg.block(header).start_pc,
                        lp.exit_nodes.len() + usize::from(header_follow == Some(exit))
                    ),
                ))
            }
        }
    }
    Ok(shapes)
}

/// Blocks that lead from a loop exit to `follow` or out of the function
/// without re-entering the loop; `None` when the exit is shared code
fn absorb(
    cfg: &Cfg,
    dominators: &Dominators<NodeIndex>,
    body: &HashSet<NodeIndex>,
    header: NodeIndex,
    start: NodeIndex,
    follow: Option<NodeIndex>,
) -> Option<HashSet<NodeIndex>> {
    let mut region = HashSet::new();
    let mut stack = vec![start];
    while let Some(node) = stack.pop() {
        if Some(node) == follow || node == cfg.exit_node() {
            continue;
        }
        if body.contains(&node) || !dominates(dominators, header, node) {
            return None;
        }
        if region.insert(node) {
            stack.extend(cfg.successors(node));
        }
    }
    Some(region)
}

struct Structurer<'a> {
    cfg: &'a Cfg,
    function_id: u32,
    post: &'a PostDominatorAnalysis,
    shapes: &'a HashMap<NodeIndex, LoopShape>,
    emitted: HashSet<NodeIndex>,
}

impl<'a> Structurer<'a> {
    fn error(&self, node: NodeIndex, what: &str) -> Error {
        Error::structuring(
            self.function_id,
            format!("{} at 0x{:04X}", what, self.cfg.block(node).start_pc),
        )
    }

    fn mark(&mut self, node: NodeIndex) -> Result<()> {
        if self.emitted.insert(node) {
            Ok(())
        } else {
            Err(self.error(node, "block reached twice"))
        }
    }

    fn flow(&self, node: NodeIndex) -> Flow {
        self.cfg.block(node).terminator_flow(self.cfg.generation())
    }

    fn step(&self, target: NodeIndex, stop: Option<NodeIndex>, frame: Frame<'a>) -> Result<Step> {
        if Some(target) == stop {
            return Ok(Step::End);
        }
        if frame.header == Some(target) {
            return Ok(Step::Continue);
        }
        if frame.follow == Some(target) {
            return Ok(Step::Break);
        }
        if target == self.cfg.exit_node() {
            if frame.header.is_some() {
                return Err(Error::structuring(
                    self.function_id,
                    "loop body falls off the end of the function",
                ));
            }
            return Ok(Step::End);
        }
        if !frame.in_body(target) {
            return Err(self.error(target, "edge leaves the loop"));
        }
        Ok(Step::Node(target))
    }

    fn sequence(
        &mut self,
        start: NodeIndex,
        stop: Option<NodeIndex>,
        frame: Frame<'a>,
    ) -> Result<Vec<Region>> {
        let mut out = Vec::new();
        let mut node = start;
        loop {
            let next = if self.shapes.contains_key(&node) && frame.header != Some(node) {
                let (region, follow) = self.emit_loop(node, frame)?;
                out.push(region);
                match follow {
                    Some(f) => self.step(f, stop, frame)?,
                    None => Step::End,
                }
            } else {
                self.mark(node)?;
                match self.flow(node) {
                    Flow::Return | Flow::Abort => {
                        out.push(Region::Block(node));
                        Step::End
                    }
                    Flow::Try => return Err(self.error(node, "exception handler")),
                    Flow::Next | Flow::Jump => {
                        out.push(Region::Block(node));
                        match self.cfg.successors(node).next() {
                            Some(s) => self.step(s, stop, frame)?,
                            None => Step::End,
                        }
                    }
                    Flow::Branch => {
                        let (region, join) = self.emit_if(node, stop, frame)?;
                        out.push(region);
                        match join {
                            Some(j) => self.step(j, stop, frame)?,
                            None => Step::End,
                        }
                    }
                    Flow::Loop | Flow::Converse => {
                        if frame.header == Some(node) {
                            return Err(self.error(node, "unstructured loop header"));
                        }
                        let (region, follow) = self.emit_single_pass(node)?;
                        out.push(region);
                        match follow {
                            Some(f) => self.step(f, stop, frame)?,
                            None => Step::End,
                        }
                    }
                }
            };

            match next {
                Step::End => return Ok(out),
                Step::Continue => {
                    out.push(Region::Continue);
                    return Ok(out);
                }
                Step::Break => {
                    out.push(Region::Break);
                    return Ok(out);
                }
                Step::Node(n) => node = n,
            }
        }
    }

    fn branch(
        &mut self,
        target: Option<NodeIndex>,
        join: Option<NodeIndex>,
        frame: Frame<'a>,
    ) -> Result<Vec<Region>> {
        let Some(target) = target else {
            return Ok(Vec::new());
        };
        Ok(match self.step(target, join, frame)? {
            Step::End => Vec::new(),
            Step::Continue => vec![Region::Continue],
            Step::Break => vec![Region::Break],
            Step::Node(n) => self.sequence(n, join, frame)?,
        })
    }

    fn emit_if(
        &mut self,
        node: NodeIndex,
        stop: Option<NodeIndex>,
        frame: Frame<'a>,
    ) -> Result<(Region, Option<NodeIndex>)> {
        let then_t = self.cfg.successor(node, EdgeKind::True);
        let else_t = self.cfg.successor(node, EdgeKind::False);
        let join = self.join_of(node, then_t, else_t, stop, frame);
        let then = self.branch(then_t, join, frame)?;
        let otherwise = self.branch(else_t, join, frame)?;
        Ok((
            Region::If {
                block: node,
                then,
                otherwise,
            },
            join,
        ))
    }

    /// Where both arms of a branch meet again
    fn join_of(
        &self,
        node: NodeIndex,
        then_t: Option<NodeIndex>,
        else_t: Option<NodeIndex>,
        stop: Option<NodeIndex>,
        frame: Frame<'a>,
    ) -> Option<NodeIndex> {
        let avoid: Vec<NodeIndex> = stop.into_iter().chain(frame.header).collect();
        if let Some(j) = self.post.immediate_post_dominator(node) {
            let inner = |n: NodeIndex| Some(n) == stop || (Some(n) != frame.header && Some(n) != frame.follow);
            let reached = [then_t, else_t]
                .into_iter()
                .flatten()
                .any(|t| self.reaches(t, j, &avoid, frame));
            if j != self.cfg.exit_node()
                && frame.in_body(j)
                && inner(j)
                && (Some(j) == stop || reached)
            {
                return Some(j);
            }
        }
        match (then_t, else_t) {
            (Some(t), Some(e)) if self.reaches(t, e, &avoid, frame) => Some(e),
            (Some(t), Some(e)) if self.reaches(e, t, &avoid, frame) => Some(t),
            _ => stop,
        }
    }

    /// True when `to` can be reached from `from` inside the current loop
    /// without passing any node in `avoid`
    fn reaches(&self, from: NodeIndex, to: NodeIndex, avoid: &[NodeIndex], frame: Frame<'a>) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![from];
        while let Some(n) = stack.pop() {
            if n == to {
                return true;
            }
            if avoid.contains(&n) || n == self.cfg.exit_node() || !frame.in_body(n) || !seen.insert(n) {
                continue;
            }
            stack.extend(self.cfg.successors(n));
        }
        false
    }

    fn emit_loop(&mut self, header: NodeIndex, outer: Frame<'a>) -> Result<(Region, Option<NodeIndex>)> {
        let shapes = self.shapes;
        let Some(shape) = shapes.get(&header) else {
            return Err(self.error(header, "missing loop"));
        };
        if !outer.in_body(header) {
            return Err(self.error(header, "loop entered from outside"));
        }
        let frame = Frame {
            header: Some(header),
            follow: shape.follow,
            body: Some(&shape.body),
        };
        let flow = self.flow(header);
        let t = self.cfg.successor(header, EdgeKind::True);
        let f = self.cfg.successor(header, EdgeKind::False);
        let inside = |n: Option<NodeIndex>| n.map_or(false, |n| shape.body.contains(&n));
        let leaves = |n: Option<NodeIndex>| n.is_some() && n == shape.follow;

        let structured = match flow {
            Flow::Loop if inside(t) && leaves(f) => Some((LoopKind::ForEach, t)),
            Flow::Converse if inside(t) && leaves(f) => Some((LoopKind::Converse, t)),
            Flow::Branch if inside(t) && leaves(f) => Some((LoopKind::While { negated: false }, t)),
            Flow::Branch if inside(f) && leaves(t) => Some((LoopKind::While { negated: true }, f)),
            _ => None,
        };

        let region = match structured {
            Some((kind, body_target)) => {
                self.mark(header)?;
                let body = self.branch(body_target, Some(header), frame)?;
                Region::Loop { header, kind, body }
            }
            None => {
                if matches!(flow, Flow::Loop | Flow::Converse | Flow::Try) {
                    return Err(self.error(header, "unstructured loop header"));
                }
                let mut body = self.sequence(header, None, frame)?;
                if body.last() == Some(&Region::Continue) {
                    body.pop();
                }
                Region::Loop {
                    header,
                    kind: LoopKind::Infinite,
                    body,
                }
            }
        };
        Ok((region, shape.follow))
    }

    /// A `loop` or `startconv` whose body never jumps back
    fn emit_single_pass(&mut self, node: NodeIndex) -> Result<(Region, Option<NodeIndex>)> {
        let kind = if self.flow(node) == Flow::Converse {
            LoopKind::Converse
        } else {
            LoopKind::ForEach
        };
        let follow = self.cfg.successor(node, EdgeKind::False);
        let frame = Frame {
            header: Some(node),
            follow,
            body: None,
        };
        let body = self.branch(self.cfg.successor(node, EdgeKind::True), None, frame)?;
        Ok((
            Region::Loop {
                header: node,
                kind,
                body,
            },
            follow,
        ))
    }

    /// Hoist the else arm after an `if` whose then arm never falls through
    fn flatten(&self, regions: Vec<Region>) -> Vec<Region> {
        let mut out = Vec::with_capacity(regions.len());
        for region in regions {
            match region {
                Region::If {
                    block,
                    then,
                    otherwise,
                } => {
                    let then = self.flatten(then);
                    let otherwise = self.flatten(otherwise);
                    if !otherwise.is_empty() && self.ends_abruptly(&then) {
                        out.push(Region::If {
                            block,
                            then,
                            otherwise: Vec::new(),
                        });
                        out.extend(otherwise);
                    } else {
                        out.push(Region::If {
                            block,
                            then,
                            otherwise,
                        });
                    }
                }
                Region::Loop { header, kind, body } => out.push(Region::Loop {
                    header,
                    kind,
                    body: self.flatten(body),
                }),
                other => out.push(other),
            }
        }
        out
    }

    fn ends_abruptly(&self, regions: &[Region]) -> bool {
        match regions.last() {
            Some(Region::Break | Region::Continue) => true,
            Some(Region::Block(n)) => matches!(self.flow(*n), Flow::Return | Flow::Abort),
            Some(Region::If { then, otherwise, .. }) => {
                !otherwise.is_empty() && self.ends_abruptly(then) && self.ends_abruptly(otherwise)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::test_support::u7;
    use crate::usecode::Operand::*;
    use crate::usecode::VmGeneration;

    fn pc(cfg: &Cfg, node: NodeIndex) -> u32 {
        cfg.block(node).start_pc
    }

    /// Compact rendering of a region tree by block offsets
    fn shape(cfg: &Cfg, regions: &[Region]) -> String {
        regions
            .iter()
            .map(|r| match r {
                Region::Block(n) => format!("b{}", pc(cfg, *n)),
                Region::If {
                    block,
                    then,
                    otherwise,
                } => format!(
                    "if{}[{}][{}]",
                    pc(cfg, *block),
                    shape(cfg, then),
                    shape(cfg, otherwise)
                ),
                Region::Loop { header, kind, body } => {
                    format!("{:?}{}[{}]", kind, pc(cfg, *header), shape(cfg, body))
                }
                Region::Break => "break".to_string(),
                Region::Continue => "continue".to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn structured(program: Vec<(u8, Vec<crate::usecode::Operand>)>) -> Result<String> {
        let function = u7(program);
        let cfg = Cfg::build(&function, VmGeneration::U7);
        structure(&cfg, function.id).map(|r| shape(&cfg, &r))
    }

    #[test]
    fn if_else_joins_at_post_dominator() {
        let got = structured(vec![
            (0x21, vec![Local(0)]),       // 0
            (0x05, vec![JumpTarget(15)]), // 3
            (0x1f, vec![Immediate(1)]),   // 6
            (0x12, vec![Local(1)]),       // 9
            (0x06, vec![JumpTarget(21)]), // 12
            (0x1f, vec![Immediate(2)]),   // 15
            (0x12, vec![Local(1)]),       // 18
            (0x25, vec![]),               // 21
        ])
        .unwrap();
        assert_eq!(got, "if0[b6][b15] b21");
    }

    #[test]
    fn if_without_else() {
        let got = structured(vec![
            (0x21, vec![Local(0)]),       // 0
            (0x05, vec![JumpTarget(12)]), // 3
            (0x1f, vec![Immediate(1)]),   // 6
            (0x12, vec![Local(1)]),       // 9
            (0x25, vec![]),               // 12
        ])
        .unwrap();
        assert_eq!(got, "if0[b6][] b12");
    }

    #[test]
    fn while_loop() {
        let got = structured(vec![
            (0x21, vec![Local(0)]),       // 0
            (0x05, vec![JumpTarget(15)]), // 3
            (0x1f, vec![Immediate(1)]),   // 6
            (0x12, vec![Local(0)]),       // 9
            (0x06, vec![JumpTarget(0)]),  // 12
            (0x25, vec![]),               // 15
        ])
        .unwrap();
        assert_eq!(got, "While { negated: false }0[b6] b15");
    }

    #[test]
    fn for_each_loop() {
        let got = structured(vec![
            (0x2e, vec![]), // 0
            (
                0x02,
                vec![Local(1), Local(2), Local(3), Local(0), JumpTarget(21)],
            ), // 1
            (0x21, vec![Local(3)]),       // 12
            (0x12, vec![Local(1)]),       // 15
            (0x06, vec![JumpTarget(1)]),  // 18
            (0x25, vec![]),               // 21
        ])
        .unwrap();
        assert_eq!(got, "b0 ForEach1[b12] b21");
    }

    #[test]
    fn early_return_is_hoisted() {
        let got = structured(vec![
            (0x21, vec![Local(0)]),      // 0
            (0x05, vec![JumpTarget(7)]), // 3
            (0x25, vec![]),              // 6
            (0x1f, vec![Immediate(1)]),  // 7
            (0x12, vec![Local(1)]),      // 10
            (0x25, vec![]),              // 13
        ])
        .unwrap();
        assert_eq!(got, "if0[b6][] b7");
    }

    #[test]
    fn break_inside_while() {
        let got = structured(vec![
            (0x21, vec![Local(0)]),       // 0
            (0x05, vec![JumpTarget(24)]), // 3
            (0x21, vec![Local(1)]),       // 6
            (0x05, vec![JumpTarget(15)]), // 9
            (0x06, vec![JumpTarget(24)]), // 12
            (0x1f, vec![Immediate(1)]),   // 15
            (0x12, vec![Local(2)]),       // 18
            (0x06, vec![JumpTarget(0)]),  // 21
            (0x25, vec![]),               // 24
        ])
        .unwrap();
        assert_eq!(got, "While { negated: false }0[if6[b12 break][] b15] b24");
    }

    #[test]
    fn return_inside_loop_is_absorbed() {
        let got = structured(vec![
            (0x21, vec![Local(0)]),       // 0
            (0x05, vec![JumpTarget(19)]), // 3
            (0x21, vec![Local(1)]),       // 6
            (0x05, vec![JumpTarget(13)]), // 9
            (0x25, vec![]),               // 12
            (0x1f, vec![Immediate(1)]),   // 13
            (0x06, vec![JumpTarget(0)]),  // 16
            (0x25, vec![]),               // 19
        ])
        .unwrap();
        assert_eq!(got, "While { negated: false }0[if6[b12][] b13] b19");
    }

    #[test]
    fn exception_handlers_are_not_structured() {
        let err = structured(vec![
            (0x61, vec![JumpTarget(4)]), // 0
            (0x25, vec![]),              // 3
            (0x25, vec![]),              // 4
        ])
        .unwrap_err();
        assert!(matches!(err, Error::Structuring { id: 0x401, .. }));
    }

    #[test]
    fn jump_into_the_other_arm_fails() {
        let err = structured(vec![
            (0x21, vec![Local(0)]),       // 0
            (0x05, vec![JumpTarget(15)]), // 3
            (0x21, vec![Local(1)]),       // 6
            (0x05, vec![JumpTarget(18)]), // 9
            (0x06, vec![JumpTarget(21)]), // 12
            (0x1f, vec![Immediate(1)]),   // 15
            (0x12, vec![Local(2)]),       // 18
            (0x25, vec![]),               // 21
        ])
        .unwrap_err();
        assert!(err.to_string().contains("reached twice"), "{}", err);
    }
}
