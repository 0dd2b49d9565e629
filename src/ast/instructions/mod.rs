//! Instruction-to-statement conversion
//!
//! The U7 VM is a stack machine, so every basic block is replayed against a
//! symbolic stack: pushes build expressions, pops and calls without a result
//! turn them into statements. Values still on the stack when the block ends
//! become expression statements. The block's last instruction may leave a
//! [`Terminator`] that the control-flow converter wraps around the nested
//! regions.

use crate::ast::expression_context::ExpressionContext;
use crate::ast::nodes::{Expr, ForEachHeader, Stmt, VarRef};
use crate::cfg::Block;
use crate::error::{Error, Result};
use crate::usecode::{Instruction, Operand, VmGeneration};

mod arithmetic;
mod functions;
mod misc;
mod variables;

use arithmetic::ArithmeticHelpers;
use functions::FunctionHelpers;
use misc::MiscHelpers;
use variables::VariableHelpers;

/// What the last instruction of a block decides
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminator {
    /// Nothing; control falls through, jumps or leaves the function
    None,
    /// Two-way branch taken when the condition is false
    Condition(Expr),
    ForEach(ForEachHeader),
    Converse,
}

/// Statements and terminator of one replayed block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockOutcome {
    pub statements: Vec<Stmt>,
    pub terminator: Terminator,
}

/// Symbolic stack machine for one block
pub struct InstructionToStatementConverter<'a> {
    ctx: ExpressionContext<'a>,
    stack: Vec<Expr>,
    statements: Vec<Stmt>,
    /// Offset of the instruction being converted
    offset: u32,
}

impl<'a> InstructionToStatementConverter<'a> {
    pub fn new(ctx: ExpressionContext<'a>) -> Self {
        Self {
            ctx,
            stack: Vec::new(),
            statements: Vec::new(),
            offset: 0,
        }
    }

    /// Replay a whole block from an empty stack
    pub fn convert_block(ctx: ExpressionContext<'a>, block: &Block) -> Result<BlockOutcome> {
        let mut converter = Self::new(ctx);
        let mut terminator = Terminator::None;
        for instr in block.instructions() {
            terminator = converter.convert_instruction(instr)?;
        }
        Ok(converter.finish(terminator))
    }

    fn finish(mut self, terminator: Terminator) -> BlockOutcome {
        let leftover = std::mem::take(&mut self.stack);
        self.statements.extend(leftover.into_iter().map(Stmt::Expr));
        BlockOutcome {
            statements: self.statements,
            terminator,
        }
    }

    pub(crate) fn error(&self, message: impl std::fmt::Display) -> Error {
        Error::structuring(
            self.ctx.function.id,
            format!("{} at 0x{:04X}", message, self.offset),
        )
    }

    pub(crate) fn push(&mut self, expr: Expr) {
        self.stack.push(expr);
    }

    pub(crate) fn pop(&mut self) -> Result<Expr> {
        self.stack
            .pop()
            .ok_or_else(|| self.error("stack underflow"))
    }

    /// Pop `count` values; the first value popped comes first
    pub(crate) fn pop_n(&mut self, count: usize) -> Result<Vec<Expr>> {
        (0..count).map(|_| self.pop()).collect()
    }

    pub(crate) fn emit(&mut self, stmt: Stmt) {
        self.statements.push(stmt);
    }

    /// Push the value of a call, or emit it as a statement when nothing is returned
    pub(crate) fn push_or_emit(&mut self, expr: Expr, returns: bool) {
        if returns {
            self.push(expr);
        } else {
            self.emit(Stmt::Expr(expr));
        }
    }

    pub(crate) fn context(&self) -> &ExpressionContext<'a> {
        &self.ctx
    }

    /// Convert one instruction, returning the terminator it sets
    pub fn convert_instruction(&mut self, instr: &Instruction) -> Result<Terminator> {
        self.offset = instr.offset;
        if self.ctx.generation != VmGeneration::U7 {
            return Err(self.error("pseudo-source needs Ultima VII usecode"));
        }
        let Some(desc) = instr.desc(self.ctx.generation) else {
            return Err(self.error(format!("unknown opcode 0x{:02x}", instr.opcode)));
        };
        let mnemonic = desc.mnemonic.strip_suffix("32").unwrap_or(desc.mnemonic);

        match mnemonic {
            "add" | "sub" | "mul" | "div" | "mod" | "and" | "or" | "cmpgt" | "cmplt" | "cmpge"
            | "cmple" | "cmpne" | "cmpeq" | "in" | "arra" => self.create_binary_operation(mnemonic)?,
            "not" => self.create_not()?,
            "push true" => self.push(Expr::Bool(true)),
            "push false" => self.push(Expr::Bool(false)),
            "pushi" | "pushb" => self.push(Expr::Int(immediate(instr)?)),
            "pushs" => self.push(Expr::Str(string_operand(instr)?)),
            "arrc" => self.create_array(arg_count(instr)?)?,

            "push" | "push static" | "push clsvar" => self.create_load(variable(instr)?),
            "pop" | "pop static" | "pop clsvar" => self.create_store(variable(instr)?)?,
            "aidx" | "aidxs" | "aidxclsvar" => self.create_element_load(variable(instr)?)?,
            "setarrayelem" | "setstaticarrayelem" | "setclsvararrayelem" => {
                self.create_element_store(variable(instr)?)?
            }
            "pushf" => self.create_flag_load(flag(instr)?),
            "popf" => self.create_flag_store(flag(instr)?)?,
            "pushfvar" => self.create_computed_flag_load()?,
            "popfvar" => self.create_computed_flag_store()?,
            "push itemref" => self.push(Expr::Item),
            "push eventid" => self.push(Expr::Event),
            "pop eventid" => self.create_event_store()?,
            "push choice" => self.push(Expr::UserChoice),

            "call" => self.create_call(function_ref(instr)?)?,
            "calle" | "callo" => self.create_member_call(function_ref(instr)?, desc.pushes > 0)?,
            "callis" | "calli" => {
                let (number, count) = intrinsic(instr)?;
                self.create_intrinsic_call(number, count, mnemonic == "callis")?
            }
            "callind" => self.create_indirect_call(0)?,
            "callindex" => self.create_indirect_call(arg_count(instr)?)?,
            "callm" => self.create_method_call(method(instr)?)?,
            "callms" => self.create_static_method_call(method(instr)?, class_id(instr)?)?,
            "clscreate" => self.create_new_object(class_id(instr)?)?,
            "classdel" => self.create_delete()?,

            "addsi" => self.emit(Stmt::Message(Expr::Str(string_operand(instr)?))),
            "addsv" => self.emit(Stmt::Message(Expr::Var(variable(instr)?))),
            "say" => self.emit(Stmt::Say),
            "ret" | "ret2" => self.emit(Stmt::Return(None)),
            "retv" => self.create_return_value()?,
            "retz" => self.emit(Stmt::Return(Some(Expr::Int(0)))),
            "abrt" => self.emit(Stmt::Abort),
            "throw" => self.create_throw()?,

            "jne" => return Ok(Terminator::Condition(self.pop()?)),
            "cmps" => return self.create_choice_test(arg_count(instr)?),
            "conv_something" => {
                let value = Expr::Int(immediate(instr)?);
                return Ok(Terminator::Condition(Expr::binary(
                    crate::ast::nodes::BinaryOp::Eq,
                    Expr::UserChoice,
                    value,
                )));
            }
            "loop" | "staticloop" | "clsvarloop" => return Ok(Terminator::ForEach(loop_header(instr)?)),
            "startconv" => return Ok(Terminator::Converse),
            "jmp" | "initloop" | "dbgline" | "dbgfunc" | "endconv" | "endtry" => {}
            other => return Err(self.error(format!("no pseudo-source form for `{}`", other))),
        }
        Ok(Terminator::None)
    }
}

fn missing(instr: &Instruction, what: &str) -> Error {
    Error::internal(format!(
        "opcode 0x{:02x} at 0x{:04X} has no {} operand",
        instr.opcode, instr.offset, what
    ))
}

fn find<T>(instr: &Instruction, what: &str, f: impl Fn(&Operand) -> Option<T>) -> Result<T> {
    instr.operands.iter().find_map(f).ok_or_else(|| missing(instr, what))
}

fn immediate(instr: &Instruction) -> Result<i32> {
    find(instr, "immediate", |op| match op {
        Operand::Immediate(n) => Some(*n),
        _ => None,
    })
}

fn string_operand(instr: &Instruction) -> Result<String> {
    find(instr, "string", |op| match op {
        Operand::StringLiteral { text, .. } | Operand::InlineString(text) => Some(text.clone()),
        _ => None,
    })
}

fn arg_count(instr: &Instruction) -> Result<usize> {
    find(instr, "argument count", |op| match op {
        Operand::ArgCount(n) => Some(*n as usize),
        _ => None,
    })
}

fn variable_of(op: &Operand) -> Option<VarRef> {
    match op {
        Operand::Local(n) => Some(VarRef::Local(*n)),
        Operand::Static(s) => Some(VarRef::from_static(*s)),
        Operand::ClassVar(n) => Some(VarRef::ClassVar(*n)),
        _ => None,
    }
}

fn variable(instr: &Instruction) -> Result<VarRef> {
    find(instr, "variable", variable_of)
}

fn flag(instr: &Instruction) -> Result<u32> {
    instr.flag_index().ok_or_else(|| missing(instr, "flag"))
}

fn function_ref(instr: &Instruction) -> Result<u32> {
    instr.called_function().ok_or_else(|| missing(instr, "function"))
}

fn intrinsic(instr: &Instruction) -> Result<(u16, usize)> {
    let number = find(instr, "intrinsic", |op| match op {
        Operand::Intrinsic(n) => Some(*n),
        _ => None,
    })?;
    Ok((number, arg_count(instr)?))
}

fn method(instr: &Instruction) -> Result<u16> {
    find(instr, "method", |op| match op {
        Operand::Method(n) => Some(*n),
        _ => None,
    })
}

fn class_id(instr: &Instruction) -> Result<u16> {
    find(instr, "class", |op| match op {
        Operand::ClassId(n) => Some(*n),
        _ => None,
    })
}

/// Loop operands are counter, total, element and array, then the exit target
fn loop_header(instr: &Instruction) -> Result<ForEachHeader> {
    let vars: Vec<VarRef> = instr.operands.iter().filter_map(variable_of).collect();
    match vars.as_slice() {
        [counter, total, element, array] => Ok(ForEachHeader {
            element: *element,
            array: *array,
            counter: *counter,
            total: *total,
        }),
        _ => Err(missing(instr, "loop variable")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::FunctionIndex;
    use crate::cfg::test_support::u7;
    use crate::usecode::{ClassSymbol, IntrinsicNames, UsecodeFunction};

    fn run(function: &UsecodeFunction, classes: &[ClassSymbol]) -> Result<BlockOutcome> {
        let index = FunctionIndex::build(std::slice::from_ref(function), None);
        let names = IntrinsicNames::parse("<0x0C> get_item_shape </>").unwrap();
        let ctx = ExpressionContext::new(function, VmGeneration::U7, &index, classes)
            .with_names(None, Some(&names));
        let block = Block::new(0, function.instructions.clone());
        InstructionToStatementConverter::convert_block(ctx, &block)
    }

    fn lines(outcome: &BlockOutcome) -> Vec<String> {
        outcome
            .statements
            .iter()
            .map(|s| match s {
                Stmt::Assign { place, value } => format!("{} = {};", place, value),
                Stmt::Expr(e) => format!("{};", e),
                other => format!("{:?}", other),
            })
            .collect()
    }

    #[test]
    fn arithmetic_pops_the_right_operand_first() {
        let f = u7(vec![
            (0x21, vec![Operand::Local(0)]),
            (0x1f, vec![Operand::Immediate(2)]),
            (0x0a, vec![]),
            (0x12, vec![Operand::Local(1)]),
        ]);
        let out = run(&f, &[]).unwrap();
        assert_eq!(lines(&out), vec!["var0001 = var0000 - 2;"]);
        assert_eq!(out.terminator, Terminator::None);
    }

    #[test]
    fn intrinsic_arguments_come_out_in_source_order() {
        // Arguments are pushed last-first
        let f = u7(vec![
            (0x1f, vec![Operand::Immediate(2)]),
            (0x3e, vec![]),
            (0x38, vec![Operand::Intrinsic(0x0c), Operand::ArgCount(2)]),
            (0x12, vec![Operand::Local(0)]),
            (0x1f, vec![Operand::Immediate(7)]),
            (0x39, vec![Operand::Intrinsic(0x99), Operand::ArgCount(1)]),
        ]);
        let out = run(&f, &[]).unwrap();
        assert_eq!(
            lines(&out),
            vec!["var0000 = get_item_shape(item, 2);", "UNKNOWN_99(7);"]
        );
    }

    #[test]
    fn array_element_store_pops_index_then_value() {
        let f = u7(vec![
            (0x1f, vec![Operand::Immediate(9)]),
            (0x1f, vec![Operand::Immediate(1)]),
            (0x46, vec![Operand::Local(2)]),
            (0x50, vec![Operand::Static(-3)]),
            (0x51, vec![Operand::Static(4)]),
        ]);
        let out = run(&f, &[]).unwrap();
        assert_eq!(lines(&out), vec!["var0002[1] = 9;", "svar0004 = gvar0003;"]);
    }

    #[test]
    fn branch_leaves_its_condition() {
        let f = u7(vec![
            (0x42, vec![Operand::Flag(0x1f)]),
            (0x10, vec![]),
            (0x05, vec![Operand::JumpTarget(0)]),
        ]);
        let out = run(&f, &[]).unwrap();
        assert!(out.statements.is_empty());
        assert_eq!(
            out.terminator,
            Terminator::Condition(Expr::Not(Box::new(Expr::Flag("0x001F".into()))))
        );
    }

    #[test]
    fn underflow_is_a_structuring_error() {
        let f = u7(vec![(0x12, vec![Operand::Local(0)])]);
        let err = run(&f, &[]).unwrap_err();
        assert!(matches!(err, Error::Structuring { id: 0x401, .. }));
        assert!(err.to_string().contains("stack underflow at 0x0000"));
    }

    #[test]
    fn leftover_values_become_statements() {
        let f = u7(vec![(0x38, vec![Operand::Intrinsic(0x0c), Operand::ArgCount(0)])]);
        let out = run(&f, &[]).unwrap();
        assert_eq!(lines(&out), vec!["get_item_shape();"]);
    }

    #[test]
    fn class_creation_pops_one_value_per_member() {
        let classes = vec![ClassSymbol::new("Cart", 0, 2, vec![])];
        let f = u7(vec![
            (0x1f, vec![Operand::Immediate(5)]),
            (0x1f, vec![Operand::Immediate(4)]),
            (0x58, vec![Operand::ClassId(0)]),
            (0x12, vec![Operand::Local(0)]),
            (0x21, vec![Operand::Local(0)]),
            (0x59, vec![]),
        ]);
        let out = run(&f, &classes).unwrap();
        assert_eq!(lines(&out)[0], "var0000 = new Cart(4, 5);");
        assert_eq!(out.statements[1], Stmt::Delete(Expr::Var(VarRef::Local(0))));
    }

    #[test]
    fn loop_header_operands() {
        let f = u7(vec![(
            0x02,
            vec![
                Operand::Local(1),
                Operand::Local(2),
                Operand::Local(3),
                Operand::Local(0),
                Operand::JumpTarget(11),
            ],
        )]);
        let out = run(&f, &[]).unwrap();
        assert_eq!(
            out.terminator,
            Terminator::ForEach(ForEachHeader {
                element: VarRef::Local(3),
                array: VarRef::Local(0),
                counter: VarRef::Local(1),
                total: VarRef::Local(2),
            })
        );
    }
}
