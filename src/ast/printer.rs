//! Pseudo-source text generation
//!
//! Prints statements with tab indentation and braces on their own lines.
//! An `else` arm holding a single `if` prints as `else if`.

use crate::ast::nodes::{Stmt, VarRef};
use std::fmt::Write;

#[derive(Debug, Default)]
pub struct StatementPrinter {
    out: String,
    depth: usize,
}

impl StatementPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render a whole function: signature, local declarations and body
    pub fn print_function(signature: &str, locals: &[VarRef], body: &[Stmt]) -> String {
        let mut printer = Self::new();
        printer.out.push_str(signature);
        printer.out.push('\n');
        printer.open();
        for local in locals {
            printer.line(&format!("var {};", local));
        }
        if !locals.is_empty() && !body.is_empty() {
            printer.out.push('\n');
        }
        printer.statements(body);
        printer.close();
        printer.out
    }

    pub fn finish(self) -> String {
        self.out
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push('\t');
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn open(&mut self) {
        self.line("{");
        self.depth += 1;
    }

    fn close(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        self.line("}");
    }

    fn block(&mut self, body: &[Stmt]) {
        self.open();
        self.statements(body);
        self.close();
    }

    pub fn statements(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.statement(stmt);
        }
    }

    pub fn statement(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Assign { place, value } => self.line(&format!("{} = {};", place, value)),
            Stmt::Expr(expr) => self.line(&format!("{};", expr)),
            Stmt::Message(expr) => self.line(&format!("message({});", expr)),
            Stmt::Say => self.line("say();"),
            Stmt::Return(Some(expr)) => self.line(&format!("return {};", expr)),
            Stmt::Return(None) => self.line("return;"),
            Stmt::Abort => self.line("abort;"),
            Stmt::Throw(expr) => self.line(&format!("throw {};", expr)),
            Stmt::Delete(expr) => self.line(&format!("delete {};", expr)),
            Stmt::If { .. } => self.if_chain(stmt, "if"),
            Stmt::While { cond, body } => {
                self.line(&format!("while ({})", cond));
                self.block(body);
            }
            Stmt::Loop(body) => {
                self.line("while (true)");
                self.block(body);
            }
            Stmt::ForEach { header, body } => {
                let mut text = String::new();
                // Writing into a String cannot fail
                let _ = write!(
                    text,
                    "for ({} in {} with {} to {})",
                    header.element, header.array, header.counter, header.total
                );
                self.line(&text);
                self.block(body);
            }
            Stmt::Converse(body) => {
                self.line("converse");
                self.block(body);
            }
            Stmt::Break => self.line("break;"),
            Stmt::Continue => self.line("continue;"),
            Stmt::Comment(text) => self.line(&format!("// {}", text)),
        }
    }

    fn if_chain(&mut self, stmt: &Stmt, keyword: &str) {
        let Stmt::If {
            cond,
            then,
            otherwise,
        } = stmt
        else {
            return;
        };
        self.line(&format!("{} ({})", keyword, cond));
        self.block(then);
        match otherwise.as_slice() {
            [] => {}
            [nested @ Stmt::If { .. }] => self.if_chain(nested, "else if"),
            _ => {
                self.line("else");
                self.block(otherwise);
            }
        }
    }
}
