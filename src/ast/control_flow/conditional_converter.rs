//! Conditional and loop statement shaping

use crate::ast::nodes::{Expr, Stmt};

/// Builds `if` and `while` statements in their most readable form
pub struct ConditionalConverter;

impl ConditionalConverter {
    /// `if (cond) then else otherwise`, negated when only the else arm has code
    pub fn build_if(cond: Expr, then: Vec<Stmt>, otherwise: Vec<Stmt>) -> Stmt {
        if then.is_empty() && !otherwise.is_empty() {
            Stmt::If {
                cond: cond.negate(),
                then: otherwise,
                otherwise: Vec::new(),
            }
        } else {
            Stmt::If {
                cond,
                then,
                otherwise,
            }
        }
    }

    /// A `while` whose header also runs statements becomes
    /// `while (true) { stmts; if (!cond) break; body }`
    pub fn build_while(header: Vec<Stmt>, cond: Expr, body: Vec<Stmt>) -> Stmt {
        if header.is_empty() {
            return Stmt::While { cond, body };
        }
        let mut stmts = header;
        stmts.push(Stmt::If {
            cond: cond.negate(),
            then: vec![Stmt::Break],
            otherwise: Vec::new(),
        });
        stmts.extend(body);
        Stmt::Loop(stmts)
    }
}
