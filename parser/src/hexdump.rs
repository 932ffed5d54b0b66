//! Fixed-layout field extraction from a packet's textual hex dump.
//!
//! A packet block is a header line, two descriptive lines, then the payload as
//! rows of 16 bytes:
//!
//! ```text
//! [2023-05-04 18:21:03] Incoming packet 0x00E:
//!         |  0  1  2  3  4  5  6  7  8  9  A  B  C  D  E  F      | 0123456789ABCDEF
//!     -----------------------------------------------------------------------------------
//!       0 | 0E 2E 8C 02 56 34 12 00 1A 00 01 40 00 00 C8 42    0 | ....V4.....@...B
//! ```
//!
//! Payload byte `k` is the two hex digits at column `10 + (k % 16) * 3` of line
//! `3 + k / 16`.

use nom::number::complete::{le_f32, le_i16, le_u16, le_u32, le_u8};
use tracing::trace;

use crate::types::Position;
use crate::{Error, IResult, Result};

/// Number of lines preceding the first payload row.
pub const HEADER_LINES: usize = 3;
/// Column of the first byte on a payload row.
pub const FIRST_BYTE_COLUMN: usize = 10;
pub const BYTES_PER_LINE: usize = 16;
/// Longest string field read by [`HexDump::cstring`].
pub const MAX_STRING_LEN: usize = 16;

/// Read-only view of one packet's lines for offset-based field decoding.
#[derive(Debug, Clone, Copy)]
pub struct HexDump<'a> {
    lines: &'a [&'a str],
}

impl<'a> HexDump<'a> {
    pub fn new(lines: &'a [&'a str]) -> Self {
        Self { lines }
    }

    /// Extracts `count` raw bytes starting at payload `offset`.
    ///
    /// Digits that are not valid hex (or a row too short to reach the column) decode
    /// as `0`. Running past the last row of the block is reported as
    /// [`Error::Truncated`].
    pub fn bytes(&self, offset: usize, count: usize) -> Result<Vec<u8>> {
        let mut line = offset / BYTES_PER_LINE;
        let mut byte_index = offset % BYTES_PER_LINE;

        let mut result = Vec::with_capacity(count);
        for _ in 0..count {
            let text = self.lines.get(HEADER_LINES + line).ok_or(Error::Truncated {
                offset,
                count,
                lines: self.lines.len(),
            })?;
            let column = FIRST_BYTE_COLUMN + byte_index * 3;
            let digits = text.get(column..column + 2).unwrap_or("");
            let byte = u8::from_str_radix(digits, 16).unwrap_or_else(|_| {
                trace!(offset, column, digits, "malformed hex byte");
                0
            });
            result.push(byte);

            byte_index += 1;
            if byte_index >= BYTES_PER_LINE {
                byte_index = 0;
                line += 1;
            }
        }
        Ok(result)
    }

    fn field<T, F>(&self, offset: usize, width: usize, parser: F) -> Result<T>
    where
        F: Fn(&[u8]) -> IResult<&[u8], T>,
    {
        let bytes = self.bytes(offset, width)?;
        let (_, value) = parser(&bytes)?;
        Ok(value)
    }

    pub fn u8(&self, offset: usize) -> Result<u8> {
        self.field(offset, 1, |i| le_u8(i))
    }

    pub fn u16(&self, offset: usize) -> Result<u16> {
        self.field(offset, 2, |i| le_u16(i))
    }

    pub fn u32(&self, offset: usize) -> Result<u32> {
        self.field(offset, 4, |i| le_u32(i))
    }

    pub fn i16(&self, offset: usize) -> Result<i16> {
        self.field(offset, 2, |i| le_i16(i))
    }

    pub fn f32(&self, offset: usize) -> Result<f32> {
        self.field(offset, 4, |i| le_f32(i))
    }

    /// Three consecutive little-endian floats as x, y, z. No rotation.
    pub fn position(&self, offset: usize) -> Result<Position> {
        self.field(offset, 12, parse_position)
    }

    /// NUL-terminated string of at most [`MAX_STRING_LEN`] bytes. Invalid UTF-8 is
    /// replaced rather than rejected.
    pub fn cstring(&self, offset: usize) -> Result<String> {
        let bytes = self.bytes(offset, MAX_STRING_LEN)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }
}

fn parse_position(i: &[u8]) -> IResult<&[u8], Position> {
    let (i, x) = le_f32(i)?;
    let (i, y) = le_f32(i)?;
    let (i, z) = le_f32(i)?;
    Ok((i, Position::new(x, y, z)))
}
