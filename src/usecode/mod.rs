//! Usecode image parsing
//!
//! This module turns the raw bytes of a usecode file into an immutable
//! [`UsecodeImage`]: the optional embedded symbol table followed by every
//! function record, decoded in file order.

use crate::error::{Error as DecompilerError, Result as DecompilerResult};
use crate::options::Options;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

pub mod cursor;
pub mod decoder;
pub mod function;
pub mod names;
pub mod opcodes;
pub mod symbol_table;

pub use cursor::ByteCursor;
pub use decoder::DecodeContext;
pub use function::{DataString, Instruction, Operand, UsecodeFunction};
pub use names::{FlagNames, IntrinsicNames};
pub use symbol_table::{ClassRef, ClassSymbol, FunctionSymbol, SymbolKind, SymbolTable};

/// Script VM generation; selects the record layout and opcode table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VmGeneration {
    /// Ultima VII family, optionally extended by the UCC compiler
    U7,
    /// Ultima VIII
    U8,
}

/// Game whose usecode is being read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum Game {
    #[default]
    #[value(name = "bg")]
    BlackGate,
    #[value(name = "fov")]
    ForgeOfVirtue,
    #[value(name = "si")]
    SerpentIsle,
    #[value(name = "ss")]
    SilverSeed,
    #[value(name = "sib")]
    SerpentIsleBeta,
    #[value(name = "u8")]
    Ultima8,
}

impl Game {
    pub fn generation(self) -> VmGeneration {
        match self {
            Game::Ultima8 => VmGeneration::U8,
            _ => VmGeneration::U7,
        }
    }

    /// Name used in the `#game` directive of pseudo-source output
    pub fn directive_name(self) -> Option<&'static str> {
        match self {
            Game::BlackGate | Game::ForgeOfVirtue => Some("blackgate"),
            Game::SerpentIsle | Game::SilverSeed => Some("serpentisle"),
            Game::SerpentIsleBeta => Some("serpentbeta"),
            Game::Ultima8 => None,
        }
    }

    pub fn short_name(self) -> &'static str {
        match self {
            Game::BlackGate => "bg",
            Game::ForgeOfVirtue => "fov",
            Game::SerpentIsle => "si",
            Game::SilverSeed => "ss",
            Game::SerpentIsleBeta => "sib",
            Game::Ultima8 => "u8",
        }
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// What went wrong while building the image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    SymbolTable,
    MalformedFunction,
    DuplicateFunction,
}

/// A recoverable problem found while decoding the image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeDiagnostic {
    pub kind: DiagnosticKind,
    /// Image offset of the record or table involved
    pub offset: usize,
    pub function_id: Option<u32>,
    pub message: String,
}

impl fmt::Display for DecodeDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.function_id {
            Some(id) => write!(f, "function 0x{:04X} at 0x{:X}: {}", id, self.offset, self.message),
            None => write!(f, "offset 0x{:X}: {}", self.offset, self.message),
        }
    }
}

/// A fully decoded usecode file
#[derive(Debug, Clone, Serialize)]
pub struct UsecodeImage {
    pub game: Game,
    pub functions: Vec<UsecodeFunction>,
    pub symbols: Option<SymbolTable>,
    pub diagnostics: Vec<DecodeDiagnostic>,
}

impl UsecodeImage {
    /// Decode a whole usecode image
    ///
    /// Only header truncation is fatal. Malformed records, duplicate ids and
    /// unusable symbol tables are recorded in [`UsecodeImage::diagnostics`].
    pub fn parse(bytes: &[u8], options: &Options) -> DecompilerResult<Self> {
        let generation = options.game.generation();
        let mut diagnostics = Vec::new();
        let mut symbols = None;
        let mut start = 0usize;

        if generation == VmGeneration::U7 && symbol_table::detect(bytes) {
            log::info!("Loading symbol table...");
            let loaded = symbol_table::load(bytes)?;
            start = loaded.consumed;
            match loaded.rejected {
                Some(err) => {
                    log::warn!("{}", err);
                    diagnostics.push(DecodeDiagnostic {
                        kind: DiagnosticKind::SymbolTable,
                        offset: 0,
                        function_id: None,
                        message: err.to_string(),
                    });
                }
                None => symbols = Some(loaded.table),
            }
        }

        log::info!("Loading functions...");
        let ctx = DecodeContext::new(generation, symbols.as_ref());
        let mut cursor = ByteCursor::with_base(&bytes[start..], start);
        let mut functions: Vec<UsecodeFunction> = Vec::new();
        let mut seen = HashSet::new();

        while !cursor.is_eof() {
            let record_offset = cursor.absolute();
            match decoder::decode_one(&mut cursor, &ctx) {
                Ok(mut function) => {
                    if !seen.insert(function.id) {
                        log::warn!(
                            "Duplicate function 0x{:04X} at 0x{:X}, skipping",
                            function.id,
                            record_offset
                        );
                        diagnostics.push(DecodeDiagnostic {
                            kind: DiagnosticKind::DuplicateFunction,
                            offset: record_offset,
                            function_id: Some(function.id),
                            message: "duplicate function id; later record skipped".to_string(),
                        });
                        continue;
                    }
                    // Only safe once the record has been fully decoded
                    if options.force_ext32 {
                        function.uses_ext32_encoding = true;
                    }
                    log::debug!("Decoded {}", function);
                    functions.push(function);
                }
                Err(DecompilerError::MalformedFunction { id, offset, reason }) => {
                    log::warn!("Malformed function 0x{:04X}: {}", id, reason);
                    diagnostics.push(DecodeDiagnostic {
                        kind: DiagnosticKind::MalformedFunction,
                        offset,
                        function_id: Some(id),
                        message: reason,
                    });
                }
                Err(err) => return Err(err),
            }
        }

        log::info!("Loaded {} functions", functions.len());
        Ok(Self {
            game: options.game,
            functions,
            symbols,
            diagnostics,
        })
    }

    pub fn generation(&self) -> VmGeneration {
        self.game.generation()
    }

    pub fn function(&self, id: u32) -> Option<&UsecodeFunction> {
        self.functions.iter().find(|f| f.id == id)
    }

    pub fn classes(&self) -> &[ClassSymbol] {
        self.symbols
            .as_ref()
            .map(|s| s.classes.as_slice())
            .unwrap_or(&[])
    }

    pub fn global_static_count(&self) -> u32 {
        self.symbols.as_ref().map_or(0, |s| s.global_static_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u7_record(id: u16, code: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&0u16.to_le_bytes());
        body.extend_from_slice(&1u16.to_le_bytes());
        body.extend_from_slice(&1u16.to_le_bytes());
        body.extend_from_slice(&0u16.to_le_bytes());
        body.extend_from_slice(code);
        let mut out = Vec::new();
        out.extend_from_slice(&id.to_le_bytes());
        out.extend_from_slice(&(body.len() as u16).to_le_bytes());
        out.extend_from_slice(&body);
        out
    }

    #[test]
    fn duplicate_ids_keep_the_first_record() {
        let mut bytes = u7_record(0x401, &[0x25]);
        bytes.extend(u7_record(0x401, &[0x2c]));
        let image = UsecodeImage::parse(&bytes, &Options::default()).unwrap();
        assert_eq!(image.functions.len(), 1);
        assert_eq!(image.functions[0].instructions[0].opcode, 0x25);
        assert_eq!(image.diagnostics[0].kind, DiagnosticKind::DuplicateFunction);
    }

    #[test]
    fn force_ext32_is_applied_after_decode() {
        let bytes = u7_record(0x401, &[0x1f, 0x05, 0x00, 0x25]);
        let options = Options {
            force_ext32: true,
            ..Options::default()
        };
        let image = UsecodeImage::parse(&bytes, &options).unwrap();
        let function = &image.functions[0];
        assert!(function.uses_ext32_encoding);
        assert_eq!(function.instructions.len(), 2);
        assert_eq!(function.instructions[0].operands, vec![Operand::Immediate(5)]);
    }

    #[test]
    fn u8_images_never_look_for_a_symbol_table() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&symbol_table::UCSYMTBL_MAGIC0.to_le_bytes());
        let options = Options {
            game: Game::Ultima8,
            ..Options::default()
        };
        // 0xFFFFFFFF is read as a U8 function id, then the header runs out
        assert!(matches!(
            UsecodeImage::parse(&bytes, &options),
            Err(DecompilerError::TruncatedInput { .. })
        ));
    }

    #[test]
    fn game_names() {
        assert_eq!(Game::SilverSeed.directive_name(), Some("serpentisle"));
        assert_eq!(Game::Ultima8.generation(), VmGeneration::U8);
        assert_eq!(Game::default().to_string(), "bg");
    }
}
