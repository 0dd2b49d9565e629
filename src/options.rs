//! Run options
//!
//! Built once by the CLI and passed by reference into decoding and
//! rendering. Nothing in the crate keeps option state of its own.

use crate::usecode::Game;
use serde::Serialize;

/// Which functions a run renders
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FunctionSelection {
    All,
    Ids(Vec<u32>),
}

impl Default for FunctionSelection {
    fn default() -> Self {
        FunctionSelection::All
    }
}

impl FunctionSelection {
    pub fn includes(&self, id: u32) -> bool {
        match self {
            FunctionSelection::All => true,
            FunctionSelection::Ids(ids) => ids.contains(&id),
        }
    }
}

/// Output modes; any combination may be requested in one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutputModes {
    pub list: bool,
    pub asm: bool,
    pub ucs: bool,
    pub flags: bool,
    pub trans_table: bool,
    pub extern_header: bool,
    pub inspect: bool,
}

impl OutputModes {
    /// True when some mode renders function by function
    pub fn any_per_function(&self) -> bool {
        self.list || self.asm || self.ucs || self.trans_table
    }

    /// True when some mode renders the image as a whole
    pub fn any_whole_image(&self) -> bool {
        self.flags || self.extern_header || self.inspect
    }

    pub fn is_empty(&self) -> bool {
        !self.any_per_function() && !self.any_whole_image()
    }
}

/// Amount of progress narration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Verbosity {
    #[default]
    Quiet,
    Verbose,
    VeryVerbose,
}

impl Verbosity {
    pub fn from_count(count: u8) -> Self {
        match count {
            0 => Verbosity::Quiet,
            1 => Verbosity::Verbose,
            _ => Verbosity::VeryVerbose,
        }
    }

    pub fn level_filter(self) -> log::LevelFilter {
        match self {
            Verbosity::Quiet => log::LevelFilter::Warn,
            Verbosity::Verbose => log::LevelFilter::Info,
            Verbosity::VeryVerbose => log::LevelFilter::Debug,
        }
    }
}

/// Options for one decompilation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Options {
    pub game: Game,
    pub selection: FunctionSelection,
    pub modes: OutputModes,
    pub verbosity: Verbosity,
    /// Mark every function as ext32 once decoded
    pub force_ext32: bool,
    /// Show `dbgfunc` names in the listing
    pub debug_names: bool,
    /// Show raw opcode bytes in the assembly
    pub raw_ops: bool,
    /// Annotate assembly with call targets, flags and strings
    pub auto_comment: bool,
}
