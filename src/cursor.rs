//! Sequential reader over a decrypted PDBF payload.
//!
//! All integers are little-endian. Strings are a length byte followed by
//! bytes XORed with the complement of their index. The cursor also owns the
//! adjusted offset table so parsers can jump to sections that do not follow
//! each other on disk.
//!
//! # Over-reads
//! The game tolerates reads past the end of the payload; the missing bytes
//! come back as zeros. The cursor keeps that behaviour but logs each one and
//! counts it (see [`BinaryCursor::truncated_reads`]). With `strict` set the
//! read fails with [`FormatError::Truncated`] instead. Zero-filling stops
//! after [`MAX_ZERO_FILL`] bytes in total, so a corrupt length cannot make
//! the cursor allocate or loop without bound.

use byteorder::{ByteOrder, LittleEndian};
use log::{trace, warn};

use crate::error::FormatError;
use crate::fixed::{fixed_to_f32, fixed_vec3};
use glam::Vec3;

/// Bytes a lenient cursor will zero-fill past the end before giving up.
pub const MAX_ZERO_FILL: usize = 16 << 20;

pub struct BinaryCursor {
    data:            Vec<u8>,
    pos:             usize,
    strict:          bool,
    truncated_reads: usize,
    zero_filled:     usize,
    header_end:      usize,
    offsets:         Vec<i32>,
}

impl BinaryCursor {
    pub fn new(data: Vec<u8>, strict: bool) -> Self {
        Self {
            data,
            pos: 0,
            strict,
            truncated_reads: 0,
            zero_filled: 0,
            header_end: 0,
            offsets: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Number of reads so far that ran past the end and were zero-filled.
    pub fn truncated_reads(&self) -> usize {
        self.truncated_reads
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    /// Install the adjusted offset table; `header_end` is where offset 0 points.
    pub fn set_offset_table(&mut self, header_end: usize, offsets: Vec<i32>) {
        self.header_end = header_end;
        self.offsets = offsets;
    }

    pub fn offset_count(&self) -> usize {
        self.offsets.len()
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Jump to the section that offset table entry `index` points at.
    pub fn seek_offset(&mut self, index: usize) -> Result<usize, FormatError> {
        let offset = match self.offsets.get(index) {
            Some(&o) => o as i64,
            None => return Err(FormatError::OffsetOutOfRange { index, offset: -1 }),
        };
        let target = self.header_end as i64 + offset;
        if offset < 0 || target >= self.data.len() as i64 {
            return Err(FormatError::OffsetOutOfRange { index, offset });
        }
        trace!("seek offset[{}] -> {}", index, target);
        self.pos = target as usize;
        Ok(self.pos)
    }

    // ── Raw bytes ────────────────────────────────────────────────────────────

    /// Whether a read of `wanted` bytes may go ahead. Fails in strict mode
    /// when the bytes are not there, and in lenient mode when the shortfall
    /// would push the zero-filled total past [`MAX_ZERO_FILL`].
    fn check_read(&self, wanted: usize) -> Result<(), FormatError> {
        let available = self.remaining();
        if wanted <= available {
            return Ok(());
        }
        let missing = wanted - available;
        if self.strict || self.zero_filled.saturating_add(missing) > MAX_ZERO_FILL {
            return Err(FormatError::Truncated { position: self.pos, wanted, available });
        }
        Ok(())
    }

    /// Fill `out` from the current position, zero-filling past the end.
    pub fn read_into(&mut self, out: &mut [u8]) -> Result<(), FormatError> {
        self.check_read(out.len())?;
        let available = self.remaining();
        if out.len() > available {
            warn!(
                "read of {} bytes at {} runs past the payload end ({} left); zero-filling",
                out.len(), self.pos, available
            );
            self.truncated_reads += 1;
            self.zero_filled += out.len() - available;
            if available > 0 {
                out[..available].copy_from_slice(&self.data[self.pos..self.pos + available]);
            }
            out[available..].fill(0);
        } else {
            out.copy_from_slice(&self.data[self.pos..self.pos + out.len()]);
        }
        self.pos += out.len();
        Ok(())
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, FormatError> {
        // Checked before allocating: `n` usually comes from the file.
        self.check_read(n)?;
        let mut buf = vec![0u8; n];
        self.read_into(&mut buf)?;
        Ok(buf)
    }

    /// `count` elements of `size` bytes, or `Truncated` if that overflows.
    fn read_elements(&mut self, count: usize, size: usize) -> Result<Vec<u8>, FormatError> {
        let wanted = count.checked_mul(size).ok_or(FormatError::Truncated {
            position:  self.pos,
            wanted:    usize::MAX,
            available: self.remaining(),
        })?;
        self.read_bytes(wanted)
    }

    pub fn read_array_bytes<const N: usize>(&mut self) -> Result<[u8; N], FormatError> {
        let mut buf = [0u8; N];
        self.read_into(&mut buf)?;
        Ok(buf)
    }

    // ── Primitives ───────────────────────────────────────────────────────────

    pub fn read_u8(&mut self) -> Result<u8, FormatError> {
        Ok(self.read_array_bytes::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, FormatError> {
        Ok(LittleEndian::read_u16(&self.read_array_bytes::<2>()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, FormatError> {
        Ok(LittleEndian::read_u32(&self.read_array_bytes::<4>()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, FormatError> {
        Ok(LittleEndian::read_i32(&self.read_array_bytes::<4>()?))
    }

    /// A u32 used as a flag; any non-zero value is true.
    pub fn read_bool(&mut self) -> Result<bool, FormatError> {
        Ok(self.read_u32()? != 0)
    }

    /// 16.16 fixed point as `f32`.
    pub fn read_fixed(&mut self) -> Result<f32, FormatError> {
        Ok(fixed_to_f32(self.read_i32()?))
    }

    pub fn read_fixed3(&mut self) -> Result<[i32; 3], FormatError> {
        Ok([self.read_i32()?, self.read_i32()?, self.read_i32()?])
    }

    /// Three fixed-point values in file axes. Callers remap.
    pub fn read_vec3(&mut self) -> Result<Vec3, FormatError> {
        Ok(fixed_vec3(self.read_fixed3()?))
    }

    pub fn read_u16_vec(&mut self, count: usize) -> Result<Vec<u16>, FormatError> {
        let bytes = self.read_elements(count, 2)?;
        let mut out = vec![0u16; count];
        LittleEndian::read_u16_into(&bytes, &mut out);
        Ok(out)
    }

    pub fn read_u32_vec(&mut self, count: usize) -> Result<Vec<u32>, FormatError> {
        let bytes = self.read_elements(count, 4)?;
        let mut out = vec![0u32; count];
        LittleEndian::read_u32_into(&bytes, &mut out);
        Ok(out)
    }

    pub fn read_i32_vec(&mut self, count: usize) -> Result<Vec<i32>, FormatError> {
        let bytes = self.read_elements(count, 4)?;
        let mut out = vec![0i32; count];
        LittleEndian::read_i32_into(&bytes, &mut out);
        Ok(out)
    }

    // ── Strings ──────────────────────────────────────────────────────────────

    /// Length-prefixed obfuscated string. Bytes map 1:1 onto Latin-1 chars.
    pub fn read_string(&mut self) -> Result<String, FormatError> {
        let len = self.read_u8()? as usize;
        if len == 0 {
            return Ok(String::new());
        }
        let bytes = self.read_bytes(len)?;
        Ok(bytes
            .iter()
            .enumerate()
            .map(|(i, &b)| (b ^ !(i as u8)) as char)
            .collect())
    }

    // ── Arrays ───────────────────────────────────────────────────────────────

    /// `count:u32` followed by `count` elements.
    pub fn read_array<T, F>(&mut self, f: F) -> Result<Vec<T>, FormatError>
    where
        F: FnMut(&mut Self) -> Result<T, FormatError>,
    {
        let count = self.read_u32()? as usize;
        self.read_array_n(count, f)
    }

    /// `count` elements whose count was stored elsewhere.
    pub fn read_array_n<T, F>(&mut self, count: usize, mut f: F) -> Result<Vec<T>, FormatError>
    where
        F: FnMut(&mut Self) -> Result<T, FormatError>,
    {
        // A corrupt count must not reserve gigabytes up front.
        let mut out = Vec::with_capacity(count.min(self.remaining()));
        for _ in 0..count {
            out.push(f(self)?);
        }
        Ok(out)
    }
}

/// Encode a string the way [`BinaryCursor::read_string`] expects it.
/// Chars above U+00FF are not representable and are replaced by `?`.
pub fn encode_string(s: &str) -> Vec<u8> {
    let bytes: Vec<u8> = s
        .chars()
        .take(255)
        .map(|c| if (c as u32) <= 0xff { c as u32 as u8 } else { b'?' })
        .collect();
    let mut out = Vec::with_capacity(bytes.len() + 1);
    out.push(bytes.len() as u8);
    out.extend(bytes.iter().enumerate().map(|(i, &b)| b ^ !(i as u8)));
    out
}
