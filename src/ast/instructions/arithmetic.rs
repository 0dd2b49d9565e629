//! Arithmetic, comparison and logical operation helper methods

use super::InstructionToStatementConverter;
use crate::ast::nodes::{BinaryOp, Expr};
use crate::error::Result;

/// Trait providing arithmetic operation helper methods
pub trait ArithmeticHelpers {
    /// Pop two operands and push `left op right`
    fn create_binary_operation(&mut self, mnemonic: &str) -> Result<()>;

    fn create_not(&mut self) -> Result<()>;
}

fn binary_op(mnemonic: &str) -> Option<BinaryOp> {
    Some(match mnemonic {
        "add" => BinaryOp::Add,
        "sub" => BinaryOp::Sub,
        "mul" => BinaryOp::Mul,
        "div" => BinaryOp::Div,
        "mod" => BinaryOp::Mod,
        "and" => BinaryOp::And,
        "or" => BinaryOp::Or,
        "cmpgt" => BinaryOp::Gt,
        "cmplt" => BinaryOp::Lt,
        "cmpge" => BinaryOp::Ge,
        "cmple" => BinaryOp::Le,
        "cmpne" => BinaryOp::Ne,
        "cmpeq" => BinaryOp::Eq,
        "in" => BinaryOp::In,
        "arra" => BinaryOp::Append,
        _ => return None,
    })
}

impl ArithmeticHelpers for InstructionToStatementConverter<'_> {
    fn create_binary_operation(&mut self, mnemonic: &str) -> Result<()> {
        let op = binary_op(mnemonic).ok_or_else(|| self.error(format!("`{}` is not a binary operator", mnemonic)))?;
        let right = self.pop()?;
        let left = self.pop()?;
        self.push(Expr::binary(op, left, right));
        Ok(())
    }

    fn create_not(&mut self) -> Result<()> {
        let value = self.pop()?;
        self.push(Expr::Not(Box::new(value)));
        Ok(())
    }
}
