//! usecode-dec-rs: disassembler and decompiler for Ultima usecode
//!
//! This library decodes Ultima VII and Ultima VIII usecode images into typed
//! function records and renders them as listings, assembly, reconstructed
//! pseudo-source and cross-reference reports.

pub mod analysis;
pub mod ast;
pub mod cfg;
pub mod cli;
pub mod decompiler;
pub mod error;
pub mod options;
pub mod render;
pub mod usecode;

pub use decompiler::{DecompileOutput, Decompiler, RunReport};
pub use error::{Error as DecompilerError, Result as DecompilerResult};

// Re-export commonly used types
pub use analysis::ImageAnalysis;
pub use cfg::{Block, Cfg};
pub use options::{FunctionSelection, Options, OutputModes};
pub use usecode::{Game, UsecodeFunction, UsecodeImage};
