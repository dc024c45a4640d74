//! Payload header: file size, offset count and the section offset table.
//!
//! Layout (at payload position 0, little-endian):
//!
//! | Field        | Type       | Notes                              |
//! |--------------|------------|------------------------------------|
//! | file_size    | i32        | length of the encrypted file       |
//! | offset_count | i32        |                                    |
//! | offsets      | i32 × n    | raw file positions of sections     |
//!
//! Raw offsets count the checksum dword of every block before them. They
//! are stored here already adjusted so that `header_end + offset` is a
//! payload position.

use log::debug;
use serde::Serialize;

use crate::cursor::BinaryCursor;
use crate::error::FormatError;

#[derive(Debug, Clone, Serialize)]
pub struct ContainerHeader {
    pub file_size:   i32,
    /// Raw values as stored.
    pub raw_offsets: Vec<i32>,
    /// Relative to the end of the header.
    pub offsets:     Vec<i32>,
}

impl ContainerHeader {
    /// Read the header from the start of `cursor` and install the adjusted
    /// table on it.
    pub fn read(cursor: &mut BinaryCursor, block_size: usize) -> Result<Self, FormatError> {
        cursor.seek(0);
        let file_size = cursor.read_i32()?;
        let count = cursor.read_i32()?.max(0) as usize;
        let raw_offsets = cursor.read_array_n(count, |c| c.read_i32())?;

        let header_len = Self::len_for(count);
        let offsets = raw_offsets
            .iter()
            .map(|&raw| adjust_offset(raw, block_size, header_len))
            .collect::<Vec<_>>();
        debug!("header: file size {}, {} offsets {:?}", file_size, count, offsets);

        cursor.set_offset_table(header_len, offsets.clone());
        Ok(Self { file_size, raw_offsets, offsets })
    }

    /// Bytes taken by a header with `offset_count` entries.
    pub fn len_for(offset_count: usize) -> usize {
        8 + 4 * offset_count
    }

    pub fn len(&self) -> usize {
        Self::len_for(self.offsets.len())
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// Strip the checksum dwords of the blocks preceding `raw` and make the
/// result relative to the header end.
pub fn adjust_offset(raw: i32, block_size: usize, header_len: usize) -> i32 {
    let bs = block_size as i32;
    raw - (raw / bs) * 4 - header_len as i32
}
