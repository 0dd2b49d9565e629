//! Command-line interface module
//!
//! This module holds the clap argument surface of `ucxt` and turns it into
//! [`Options`] for the library.

use crate::options::{FunctionSelection, Options, OutputModes, Verbosity};
use crate::usecode::Game;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

pub mod decompile;

#[derive(Parser, Debug, Clone)]
#[command(name = "ucxt")]
#[command(about = "Disassembler and decompiler for Ultima VII and Ultima VIII usecode")]
#[command(version)]
pub struct Cli {
    /// Game the usecode belongs to
    #[arg(long, value_enum, default_value_t = Game::BlackGate)]
    pub game: Game,

    /// Render every function (the default when no ids are given)
    #[arg(long)]
    pub all: bool,

    /// Function ids in hex, e.g. `0401` or `0x802`
    #[arg(value_parser = parse_function_id)]
    pub functions: Vec<u32>,

    /// Function listing
    #[arg(long)]
    pub list: bool,

    /// Assembly
    #[arg(long)]
    pub asm: bool,

    /// Pseudo-source (the default when no view is chosen)
    #[arg(long)]
    pub ucs: bool,

    /// Global flag cross-reference
    #[arg(long)]
    pub flags: bool,

    /// Translation-table scaffold
    #[arg(long)]
    pub trans_table: bool,

    /// `extern` prototypes for the selected functions
    #[arg(long)]
    pub extern_header: bool,

    /// JSON summary of the decoded image
    #[arg(long)]
    pub inspect: bool,

    /// Input usecode file
    #[arg(short, long, default_value = "usecode")]
    pub input: PathBuf,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Flag-name file
    #[arg(short = 'g', long)]
    pub global_flags: Option<PathBuf>,

    /// Intrinsic-name data file
    #[arg(long)]
    pub intrinsics: Option<PathBuf>,

    /// More progress output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Treat every function as using the 32-bit encoding
    #[arg(long)]
    pub ext32: bool,

    /// Show debug function names in the listing
    #[arg(long)]
    pub debug_names: bool,

    /// Show raw opcode bytes in the assembly
    #[arg(long)]
    pub raw_ops: bool,

    /// Annotate the assembly with call targets, flags and strings
    #[arg(long)]
    pub auto_comment: bool,
}

impl Cli {
    pub fn options(&self) -> Options {
        let mut modes = OutputModes {
            list: self.list,
            asm: self.asm,
            ucs: self.ucs,
            flags: self.flags,
            trans_table: self.trans_table,
            extern_header: self.extern_header,
            inspect: self.inspect,
        };
        if modes.is_empty() {
            modes.ucs = true;
        }
        let selection = if self.all || self.functions.is_empty() {
            FunctionSelection::All
        } else {
            FunctionSelection::Ids(self.functions.clone())
        };
        Options {
            game: self.game,
            selection,
            modes,
            verbosity: Verbosity::from_count(self.verbose),
            force_ext32: self.ext32,
            debug_names: self.debug_names,
            raw_ops: self.raw_ops,
            auto_comment: self.auto_comment,
        }
    }
}

fn parse_function_id(text: &str) -> Result<u32, String> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u32::from_str_radix(digits, 16).map_err(|e| format!("`{}` is not a hex function id: {}", text, e))
}

/// Common CLI utilities
pub mod utils {
    use crate::error::{Error as DecompilerError, Result as DecompilerResult};
    use std::path::Path;

    /// Read a file into a byte vector
    pub fn read_file(path: &Path) -> DecompilerResult<Vec<u8>> {
        std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DecompilerError::InputNotFound {
                path: path.display().to_string(),
            },
            _ => DecompilerError::from(e),
        })
    }

    /// Write output to file or stdout
    pub fn write_output(content: &str, output_path: Option<&Path>) -> DecompilerResult<()> {
        match output_path {
            Some(path) => std::fs::write(path, content).map_err(DecompilerError::from),
            None => {
                use std::io::Write;
                let stdout = std::io::stdout();
                let mut lock = stdout.lock();
                lock.write_all(content.as_bytes())?;
                lock.flush()?;
                Ok(())
            }
        }
    }
}
