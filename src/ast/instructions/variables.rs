//! Variable, array, flag and event access helper methods

use super::InstructionToStatementConverter;
use crate::ast::nodes::{Expr, Place, Stmt, VarRef};
use crate::error::Result;

/// Trait providing variable access helper methods
pub trait VariableHelpers {
    fn create_load(&mut self, var: VarRef);
    fn create_store(&mut self, var: VarRef) -> Result<()>;
    fn create_element_load(&mut self, base: VarRef) -> Result<()>;
    /// `base[index] = value;` with the index on top of the stack
    fn create_element_store(&mut self, base: VarRef) -> Result<()>;
    fn create_flag_load(&mut self, index: u32);
    fn create_flag_store(&mut self, index: u32) -> Result<()>;
    fn create_computed_flag_load(&mut self) -> Result<()>;
    fn create_computed_flag_store(&mut self) -> Result<()>;
    fn create_event_store(&mut self) -> Result<()>;
    /// Array literal from `count` stacked values
    fn create_array(&mut self, count: usize) -> Result<()>;
}

impl VariableHelpers for InstructionToStatementConverter<'_> {
    fn create_load(&mut self, var: VarRef) {
        self.push(Expr::Var(var));
    }

    fn create_store(&mut self, var: VarRef) -> Result<()> {
        let value = self.pop()?;
        self.emit(Stmt::Assign {
            place: Place::Var(var),
            value,
        });
        Ok(())
    }

    fn create_element_load(&mut self, base: VarRef) -> Result<()> {
        let index = self.pop()?;
        self.push(Expr::Index {
            base,
            index: Box::new(index),
        });
        Ok(())
    }

    fn create_element_store(&mut self, base: VarRef) -> Result<()> {
        let index = self.pop()?;
        let value = self.pop()?;
        self.emit(Stmt::Assign {
            place: Place::Element { base, index },
            value,
        });
        Ok(())
    }

    fn create_flag_load(&mut self, index: u32) {
        let label = self.context().flag_label(index);
        self.push(Expr::Flag(label));
    }

    fn create_flag_store(&mut self, index: u32) -> Result<()> {
        let value = self.pop()?;
        let label = self.context().flag_label(index);
        self.emit(Stmt::Assign {
            place: Place::Flag(label),
            value,
        });
        Ok(())
    }

    fn create_computed_flag_load(&mut self) -> Result<()> {
        let index = self.pop()?;
        self.push(Expr::FlagAt(Box::new(index)));
        Ok(())
    }

    fn create_computed_flag_store(&mut self) -> Result<()> {
        let index = self.pop()?;
        let value = self.pop()?;
        self.emit(Stmt::Assign {
            place: Place::FlagAt(index),
            value,
        });
        Ok(())
    }

    fn create_event_store(&mut self) -> Result<()> {
        let value = self.pop()?;
        self.emit(Stmt::Assign {
            place: Place::Event,
            value,
        });
        Ok(())
    }

    fn create_array(&mut self, count: usize) -> Result<()> {
        let items = self.pop_n(count)?;
        self.push(Expr::Array(items));
        Ok(())
    }
}
