//! Control flow handling and conversion
//!
//! Walks the region tree produced by [`crate::cfg::structure`] and replays
//! each block through the instruction converter.

pub mod block_converter;
pub mod conditional_converter;

pub use block_converter::{BlockConversionStats, BlockToStatementConverter};
pub use conditional_converter::ConditionalConverter;
