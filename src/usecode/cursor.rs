//! Sequential little-endian reader over a usecode image
//!
//! Every decoder in the crate reads through a [`ByteCursor`]. Reads are bounds
//! checked and a failed read leaves the cursor where it was, so callers can
//! keep using it to find the end of the image.

use crate::error::{Error as DecompilerError, Result as DecompilerResult};
use scroll::ctx::TryFromCtx;
use scroll::{Pread, LE};

/// Forward-only reader with an absolute base offset for diagnostics
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    offset: usize,
    base: usize,
}

impl<'a> ByteCursor<'a> {
    /// Create a cursor over the whole buffer
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_base(data, 0)
    }

    /// Create a cursor whose reported positions start at `base`
    pub fn with_base(data: &'a [u8], base: usize) -> Self {
        Self {
            data,
            offset: 0,
            base,
        }
    }

    /// Offset relative to the start of this cursor's buffer
    pub fn position(&self) -> usize {
        self.offset
    }

    /// Offset relative to the start of the image
    pub fn absolute(&self) -> usize {
        self.base + self.offset
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }

    /// True once every byte has been consumed
    pub fn is_eof(&self) -> bool {
        self.remaining() == 0
    }

    fn truncated(&self, wanted: usize) -> DecompilerError {
        DecompilerError::TruncatedInput {
            offset: self.absolute(),
            wanted: wanted.saturating_sub(self.remaining()).max(1),
        }
    }

    fn read_le<N>(&mut self, width: usize) -> DecompilerResult<N>
    where
        N: TryFromCtx<'a, scroll::Endian, [u8], Error = scroll::Error>,
    {
        let data: &'a [u8] = self.data;
        data.gread_with::<N>(&mut self.offset, LE)
            .map_err(|_| self.truncated(width))
    }

    pub fn read_u8(&mut self) -> DecompilerResult<u8> {
        self.read_le::<u8>(1)
    }

    pub fn read_i8(&mut self) -> DecompilerResult<i8> {
        self.read_le::<i8>(1)
    }

    pub fn read_u16(&mut self) -> DecompilerResult<u16> {
        self.read_le::<u16>(2)
    }

    pub fn read_i16(&mut self) -> DecompilerResult<i16> {
        self.read_le::<i16>(2)
    }

    pub fn read_u32(&mut self) -> DecompilerResult<u32> {
        self.read_le::<u32>(4)
    }

    pub fn read_i32(&mut self) -> DecompilerResult<i32> {
        self.read_le::<i32>(4)
    }

    /// Read a raw run of `len` bytes
    pub fn read_bytes(&mut self, len: usize) -> DecompilerResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(self.truncated(len));
        }
        let bytes = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(bytes)
    }

    /// Split off the next `len` bytes as a bounded cursor and skip past them
    pub fn take(&mut self, len: usize) -> DecompilerResult<ByteCursor<'a>> {
        let base = self.absolute();
        let bytes = self.read_bytes(len)?;
        Ok(ByteCursor::with_base(bytes, base))
    }

    /// Consume everything left in the buffer
    pub fn skip_to_end(&mut self) {
        self.offset = self.data.len();
    }

    /// Read a NUL-terminated string; the terminator is consumed
    pub fn read_cstring(&mut self) -> DecompilerResult<String> {
        let rest = &self.data[self.offset.min(self.data.len())..];
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| self.truncated(rest.len() + 1))?;
        let text = decode_text(&rest[..end]);
        self.offset += end + 1;
        Ok(text)
    }

    /// Read a string prefixed by its u16 byte length
    pub fn read_prefixed_string(&mut self) -> DecompilerResult<String> {
        let start = self.offset;
        let len = self.read_u16()? as usize;
        match self.read_bytes(len) {
            Ok(bytes) => Ok(decode_text(bytes)),
            Err(e) => {
                self.offset = start;
                Err(e)
            }
        }
    }

    /// Peek at the unread bytes without consuming them
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.offset.min(self.data.len())..]
    }
}

/// Usecode text is 8-bit codepage data; keep ASCII and map the rest byte-wise
pub fn decode_text(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}
