//! Returns, exceptions and conversation helper methods

use super::{InstructionToStatementConverter, Terminator};
use crate::ast::nodes::{BinaryOp, Expr, Stmt};
use crate::error::Result;

/// Trait providing miscellaneous helper methods
pub trait MiscHelpers {
    fn create_return_value(&mut self) -> Result<()>;
    fn create_throw(&mut self) -> Result<()>;
    fn create_delete(&mut self) -> Result<()>;
    /// Condition of a `cmps` comparing the user's choice against `count` answers
    fn create_choice_test(&mut self, count: usize) -> Result<Terminator>;
}

impl MiscHelpers for InstructionToStatementConverter<'_> {
    fn create_return_value(&mut self) -> Result<()> {
        let value = self.pop()?;
        self.emit(Stmt::Return(Some(value)));
        Ok(())
    }

    fn create_throw(&mut self) -> Result<()> {
        let value = self.pop()?;
        self.emit(Stmt::Throw(value));
        Ok(())
    }

    fn create_delete(&mut self) -> Result<()> {
        let value = self.pop()?;
        self.emit(Stmt::Delete(value));
        Ok(())
    }

    fn create_choice_test(&mut self, count: usize) -> Result<Terminator> {
        let mut answers = self.pop_n(count)?;
        let cond = if answers.len() == 1 {
            Expr::binary(BinaryOp::Eq, Expr::UserChoice, answers.remove(0))
        } else {
            Expr::binary(BinaryOp::In, Expr::UserChoice, Expr::Array(answers))
        };
        Ok(Terminator::Condition(cond))
    }
}
