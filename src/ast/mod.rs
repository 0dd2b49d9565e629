//! Pseudo-source syntax tree
//!
//! This module turns structured control flow into a small statement tree and
//! prints it. The module is organized into sub-modules by functionality:
//!
//! - `nodes`: Expression and statement types
//! - `expression_context`: Name lookups shared by one function's conversion
//! - `instructions`: Symbolic stack replay of one basic block
//! - `control_flow`: Region-to-statement conversion
//! - `printer`: Text generation

pub mod control_flow;
pub mod expression_context;
pub mod instructions;
pub mod nodes;
pub mod printer;

pub use control_flow::{BlockConversionStats, BlockToStatementConverter, ConditionalConverter};
pub use expression_context::ExpressionContext;
pub use instructions::{BlockOutcome, InstructionToStatementConverter, Terminator};
pub use nodes::{BinaryOp, Expr, ForEachHeader, Place, Stmt, VarRef};
pub use printer::StatementPrinter;
