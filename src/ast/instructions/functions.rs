//! Call and object helper methods
//!
//! Arguments are pushed last-first, so popping yields them in source
//! order. The callee's argument count and return flag come from the
//! function index.

use super::InstructionToStatementConverter;
use crate::ast::nodes::{Expr, Stmt};
use crate::error::Result;

/// Trait providing function call helper methods
pub trait FunctionHelpers {
    fn create_call(&mut self, id: u32) -> Result<()>;
    /// `item->Func(args)`; the object is popped before the arguments
    fn create_member_call(&mut self, id: u32, always_pushes: bool) -> Result<()>;
    fn create_intrinsic_call(&mut self, number: u16, count: usize, pushes: bool) -> Result<()>;
    /// Call through a function id popped from the stack
    fn create_indirect_call(&mut self, count: usize) -> Result<()>;
    fn create_method_call(&mut self, slot: u16) -> Result<()>;
    fn create_static_method_call(&mut self, slot: u16, class: u16) -> Result<()>;
    fn create_new_object(&mut self, class: u16) -> Result<()>;
}

impl FunctionHelpers for InstructionToStatementConverter<'_> {
    fn create_call(&mut self, id: u32) -> Result<()> {
        let callee = self.context().callee(id);
        let args = self.pop_n(callee.num_args as usize)?;
        let call = Expr::Call {
            name: callee.name,
            args,
        };
        self.push_or_emit(call, callee.returns_value);
        Ok(())
    }

    fn create_member_call(&mut self, id: u32, always_pushes: bool) -> Result<()> {
        let callee = self.context().callee(id);
        let object = self.pop()?;
        let args = self.pop_n(callee.num_args as usize)?;
        let call = Expr::MemberCall {
            object: Box::new(object),
            name: callee.name,
            args,
        };
        self.push_or_emit(call, always_pushes || callee.returns_value);
        Ok(())
    }

    fn create_intrinsic_call(&mut self, number: u16, count: usize, pushes: bool) -> Result<()> {
        let args = self.pop_n(count)?;
        let call = Expr::Call {
            name: self.context().intrinsic_name(number),
            args,
        };
        self.push_or_emit(call, pushes);
        Ok(())
    }

    fn create_indirect_call(&mut self, count: usize) -> Result<()> {
        let function = self.pop()?;
        let object = self.pop()?;
        let args = self.pop_n(count)?;
        self.emit(Stmt::Expr(Expr::IndirectCall {
            object: Box::new(object),
            function: Box::new(function),
            args,
        }));
        Ok(())
    }

    fn create_method_call(&mut self, slot: u16) -> Result<()> {
        let object = self.pop()?;
        self.emit(Stmt::Expr(Expr::MemberCall {
            object: Box::new(object),
            name: format!("method#{}", slot),
            args: Vec::new(),
        }));
        Ok(())
    }

    fn create_static_method_call(&mut self, slot: u16, class: u16) -> Result<()> {
        let target = self
            .context()
            .class(class)
            .and_then(|c| c.method_ids.get(slot as usize).copied());
        match target {
            Some(id) => self.create_call(id),
            None => {
                let name = format!("{}::method#{}", self.context().class_name(class), slot);
                self.emit(Stmt::Expr(Expr::Call {
                    name,
                    args: Vec::new(),
                }));
                Ok(())
            }
        }
    }

    fn create_new_object(&mut self, class: u16) -> Result<()> {
        let members = self.context().class(class).map_or(0, |c| c.num_vars as usize);
        let args = self.pop_n(members)?;
        let name = self.context().class_name(class);
        self.push(Expr::New { class: name, args });
        Ok(())
    }
}
