//! Companion name files
//!
//! Neither file is required. Without them flags print as hex indices and
//! intrinsics get synthesized `UNKNOWN_xx` names.

use crate::error::{Error as DecompilerError, Result as DecompilerResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};

/// Global flag names, one NUL-terminated record per flag index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagNames {
    names: BTreeMap<u32, String>,
}

impl FlagNames {
    pub fn parse(bytes: &[u8]) -> Self {
        let mut names = BTreeMap::new();
        let mut used = HashSet::new();
        for (index, record) in bytes.split(|&b| b == 0).enumerate() {
            let raw = String::from_utf8_lossy(record);
            let trimmed = raw.trim();
            let trimmed = trimmed.strip_prefix('$').unwrap_or(trimmed);
            if trimmed.is_empty() {
                continue;
            }
            let mut name = sanitize_identifier(trimmed);
            if !used.insert(name.clone()) {
                name = format!("{}{}", name, index);
                used.insert(name.clone());
            }
            names.insert(index as u32, name);
        }
        log::debug!("Loaded {} flag names", names.len());
        Self { names }
    }

    pub fn get(&self, index: u32) -> Option<&str> {
        self.names.get(&index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.names.iter().map(|(i, n)| (*i, n.as_str()))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// `gflags[...]` subscript for pseudo-source
    pub fn subscript(&self, index: u32) -> String {
        match self.get(index) {
            Some(name) => name.to_string(),
            None => format!("0x{:04X}", index),
        }
    }
}

fn sanitize_identifier(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

static INTRINSIC_ENTRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<0x([0-9A-Fa-f]+)>\s*([^<\s]+)\s*</>").expect("intrinsic entry pattern")
});

/// Intrinsic function names read from a ucxt `.data` file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntrinsicNames {
    names: BTreeMap<u16, String>,
}

impl IntrinsicNames {
    /// Parse `<0xNN> name </>` entries
    pub fn parse(text: &str) -> DecompilerResult<Self> {
        let mut names = BTreeMap::new();
        for caps in INTRINSIC_ENTRY.captures_iter(text) {
            let number = u16::from_str_radix(&caps[1], 16).map_err(|e| DecompilerError::InvalidArgs {
                message: format!("bad intrinsic number 0x{}: {}", &caps[1], e),
            })?;
            names.insert(number, caps[2].to_string());
        }
        if names.is_empty() && !text.trim().is_empty() {
            return Err(DecompilerError::InvalidArgs {
                message: "intrinsics file has no <0xNN> name </> entries".to_string(),
            });
        }
        log::debug!("Loaded {} intrinsic names", names.len());
        Ok(Self { names })
    }

    pub fn get(&self, number: u16) -> Option<&str> {
        self.names.get(&number).map(String::as_str)
    }

    /// Name for an intrinsic, synthesized when unknown
    pub fn name(&self, number: u16) -> String {
        match self.get(number) {
            Some(name) => name.to_string(),
            None => format!("UNKNOWN_{:02x}", number),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
