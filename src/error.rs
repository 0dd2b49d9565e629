use miette::Diagnostic;
use thiserror::Error;

/// Result type for decompiler operations
pub type Result<T> = std::result::Result<T, Error>;

/// Custom error types for the usecode decompiler
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("I/O error: {0}")]
    #[diagnostic(code(usecode_dec::io_error))]
    Io(String),

    #[error("Could not open input file: {path}")]
    #[diagnostic(
        code(usecode_dec::input_not_found),
        help("check the path given with --input")
    )]
    InputNotFound { path: String },

    #[error("Truncated input at offset 0x{offset:X}: wanted {wanted} more byte(s)")]
    #[diagnostic(code(usecode_dec::truncated_input))]
    TruncatedInput { offset: usize, wanted: usize },

    #[error("Malformed function 0x{id:04X} at offset 0x{offset:X}: {reason}")]
    #[diagnostic(code(usecode_dec::malformed_function))]
    MalformedFunction { id: u32, offset: usize, reason: String },

    #[error("Unknown symbol table format: {reason}")]
    #[diagnostic(
        code(usecode_dec::unknown_symbol_table),
        help("names fall back to synthesized Func#### labels")
    )]
    UnknownSymbolTableFormat { reason: String },

    #[error("Function 0x{id:04X} not found")]
    #[diagnostic(code(usecode_dec::function_not_found))]
    RequestedFunctionNotFound { id: u32 },

    #[error("Unknown opcode: 0x{opcode:02X} at offset 0x{offset:04X}")]
    #[diagnostic(code(usecode_dec::unknown_opcode))]
    UnknownOpcode { opcode: u8, offset: u32 },

    #[error("Control flow structuring failed for function 0x{id:04X}: {message}")]
    #[diagnostic(code(usecode_dec::structuring_error))]
    Structuring { id: u32, message: String },

    #[error("Invalid arguments: {message}")]
    #[diagnostic(code(usecode_dec::invalid_args))]
    InvalidArgs { message: String },

    #[error("Internal error: {message}")]
    #[diagnostic(code(usecode_dec::internal_error))]
    Internal { message: String },
}

impl Error {
    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }

    /// Create a structuring error for a function
    pub fn structuring(id: u32, message: impl Into<String>) -> Self {
        Error::Structuring {
            id,
            message: message.into(),
        }
    }

    /// Wrap a lower-level failure as a malformed function record
    pub fn malformed(id: u32, offset: usize, reason: impl ToString) -> Self {
        Error::MalformedFunction {
            id,
            offset,
            reason: reason.to_string(),
        }
    }

    /// True when the error only concerns a single function record
    pub fn is_function_scoped(&self) -> bool {
        matches!(
            self,
            Error::MalformedFunction { .. } | Error::UnknownOpcode { .. } | Error::Structuring { .. }
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<std::fmt::Error> for Error {
    fn from(err: std::fmt::Error) -> Self {
        Error::internal(format!("formatting failed: {}", err))
    }
}
