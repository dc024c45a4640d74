//! PDBF block decryption.
//!
//! An encrypted file is a run of equally sized blocks. Every block ends in
//! a checksum dword: the wrapping sum of the decrypted data dwords before it.
//!
//! Key derivation: `key = first_stored_u32 ^ file_len`
//! Block size:     first dword position `p` where the stored dword equals the
//!                 running checksum so far and `file_len % p == 0`
//!
//! Two keys switch every block after the first to a stateful transform
//! (see [`BlockCipher::Special`]); all other blocks are XORed with the key.

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, trace};
use serde::Serialize;

use crate::error::FormatError;

/// Key that enables the special transform and a reordered face layout.
pub const KEY_SPECIAL_A: u32 = 0x0000_5CA8;
/// Second key that enables the special transform.
pub const KEY_SPECIAL_B: u32 = 0x0000_D13F;

/// Which algorithm family a file's key selects. Decided once per file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum KeyScheme {
    Standard,
    SpecialA,
    SpecialB,
}

impl KeyScheme {
    pub fn from_key(key: u32) -> Self {
        match key {
            KEY_SPECIAL_A => KeyScheme::SpecialA,
            KEY_SPECIAL_B => KeyScheme::SpecialB,
            _             => KeyScheme::Standard,
        }
    }

    /// The transform applied to block `index`.
    pub fn cipher_for_block(self, index: usize) -> BlockCipher {
        match self {
            KeyScheme::Standard                 => BlockCipher::Xor,
            _ if index == 0                     => BlockCipher::Xor,
            KeyScheme::SpecialA | KeyScheme::SpecialB => BlockCipher::Special,
        }
    }
}

/// Per-block transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockCipher {
    /// `plain = stored ^ key`.
    Xor,
    /// Keystream derived from the previous stored dword; state resets at
    /// every block boundary.
    Special,
}

impl BlockCipher {
    /// Decrypt `dwords` in place and return their checksum.
    pub fn apply(self, key: u32, dwords: &mut [u32]) -> u32 {
        match self {
            BlockCipher::Xor     => xor_block(key, dwords),
            BlockCipher::Special => special_block(dwords),
        }
    }
}

fn xor_block(key: u32, dwords: &mut [u32]) -> u32 {
    let mut checksum = 0u32;
    for d in dwords.iter_mut() {
        *d ^= key;
        checksum = checksum.wrapping_add(*d);
    }
    checksum
}

fn special_block(dwords: &mut [u32]) -> u32 {
    let mut checksum = 0u32;
    let mut last = 0u32;
    for d in dwords.iter_mut() {
        let key_value = match (last >> 16) & 3 {
            0 => last.wrapping_sub(0x50A4_A89D),
            1 => 0x3AF7_0BC4u32.wrapping_sub(last),
            2 => last.wrapping_add(0x0709_1971) << 1,
            _ => 0x11E6_7319u32.wrapping_sub(last) << 1,
        };
        let raw = *d;
        last = raw;
        *d = match raw & 3 {
            0 => !raw ^ key_value,
            1 => !raw ^ !key_value,
            2 => raw ^ !key_value,
            _ => raw ^ key_value ^ 0xFFFF,
        };
        checksum = checksum.wrapping_add(*d);
    }
    checksum
}

/// Output of [`decrypt`].
#[derive(Debug, Clone)]
pub struct Decrypted {
    /// Block payloads with checksum dwords removed.
    pub data:       Vec<u8>,
    pub key:        u32,
    pub scheme:     KeyScheme,
    pub block_size: usize,
    pub blocks:     usize,
}

pub fn derive_key(raw: &[u8]) -> Result<u32, FormatError> {
    if raw.len() < 4 {
        return Err(FormatError::BlockSizeNotFound);
    }
    Ok(LittleEndian::read_u32(raw) ^ raw.len() as u32)
}

/// Locate the block size by probing for the first self-consistent checksum.
pub fn find_block_size(raw: &[u8], key: u32) -> Result<usize, FormatError> {
    let len = raw.len();
    let mut checksum = 0u32;
    for (i, chunk) in raw.chunks_exact(4).enumerate() {
        let value = LittleEndian::read_u32(chunk);
        let pos = (i + 1) * 4;
        if value == checksum && len % pos == 0 {
            return Ok(pos);
        }
        checksum = checksum.wrapping_add(value ^ key);
    }
    Err(FormatError::BlockSizeNotFound)
}

/// Decrypt a complete PDBF file.
pub fn decrypt(raw: &[u8]) -> Result<Decrypted, FormatError> {
    let key = derive_key(raw)?;
    let scheme = KeyScheme::from_key(key);
    let block_size = find_block_size(raw, key)?;
    debug!("pdbf key {:#010x} ({:?}), block size {}", key, scheme, block_size);

    let data_dwords = block_size / 4 - 1;
    let blocks = raw.len() / block_size;
    let mut data = Vec::with_capacity(blocks * data_dwords * 4);
    let mut dwords = vec![0u32; data_dwords + 1];

    for (index, block) in raw.chunks_exact(block_size).enumerate() {
        LittleEndian::read_u32_into(block, &mut dwords);
        let (payload, trailer) = dwords.split_at_mut(data_dwords);
        let checksum = scheme.cipher_for_block(index).apply(key, payload);
        if checksum != trailer[0] {
            return Err(FormatError::ChecksumMismatch { block: index });
        }
        trace!("block {} ok, checksum {:#010x}", index, checksum);

        let start = data.len();
        data.resize(start + data_dwords * 4, 0);
        LittleEndian::write_u32_into(payload, &mut data[start..]);
    }

    Ok(Decrypted { data, key, scheme, block_size, blocks })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Standard-scheme file around `plain` (whose first dword must equal
    /// the final file length).
    fn seal(plain: &[u32], key: u32, block_dwords: usize) -> Vec<u8> {
        let mut out = Vec::new();
        for chunk in plain.chunks(block_dwords) {
            let mut sum = 0u32;
            for &p in chunk {
                sum = sum.wrapping_add(p);
                out.extend_from_slice(&(p ^ key).to_le_bytes());
            }
            out.extend_from_slice(&sum.to_le_bytes());
        }
        out
    }

    #[test]
    fn key_from_length() {
        let mut raw = vec![0u8; 16];
        raw[..4].copy_from_slice(&(16u32 ^ 0xABCD).to_le_bytes());
        assert_eq!(derive_key(&raw).unwrap(), 0xABCD);
    }

    #[test]
    fn standard_roundtrip_two_blocks() {
        // 2 blocks of 8 dwords: 7 data + 1 checksum each, 64 bytes total.
        let plain: Vec<u32> = vec![64, 0, 7, 9, 11, 13, 15, 100, 200, 300, 400, 500, 600, 700];
        let key = 0x1234_5678;
        let raw = seal(&plain, key, 7);
        assert_eq!(raw.len(), 64);

        let out = decrypt(&raw).unwrap();
        assert_eq!(out.key, key);
        assert_eq!(out.scheme, KeyScheme::Standard);
        assert_eq!(out.block_size, 32);
        assert_eq!(out.blocks, 2);
        let words: Vec<u32> = out.data.chunks_exact(4).map(LittleEndian::read_u32).collect();
        assert_eq!(words, plain);
    }

    #[test]
    fn corrupt_checksum_names_block() {
        let plain: Vec<u32> = vec![64, 0, 7, 9, 11, 13, 15, 100, 200, 300, 400, 500, 600, 700];
        let mut raw = seal(&plain, 0x1234_5678, 7);
        // Flip a payload bit in block 1; the trailer no longer matches.
        raw[40] ^= 0x01;
        match decrypt(&raw) {
            Err(FormatError::ChecksumMismatch { block }) => assert_eq!(block, 1),
            other => panic!("expected checksum mismatch, got {:?}", other.map(|d| d.blocks)),
        }
    }

    #[test]
    fn no_block_size() {
        let raw = vec![0xffu8; 12];
        assert!(matches!(decrypt(&raw), Err(FormatError::BlockSizeNotFound)));
        assert!(matches!(decrypt(&[1, 2]), Err(FormatError::BlockSizeNotFound)));
    }

    #[test]
    fn scheme_selection() {
        assert_eq!(KeyScheme::from_key(0x5CA8), KeyScheme::SpecialA);
        assert_eq!(KeyScheme::from_key(0xD13F), KeyScheme::SpecialB);
        assert_eq!(KeyScheme::from_key(0x5CA9), KeyScheme::Standard);
        assert_eq!(KeyScheme::SpecialA.cipher_for_block(0), BlockCipher::Xor);
        assert_eq!(KeyScheme::SpecialB.cipher_for_block(1), BlockCipher::Special);
        assert_eq!(KeyScheme::Standard.cipher_for_block(5), BlockCipher::Xor);
    }

    #[test]
    fn special_transform_vector() {
        let mut dwords = [0x0000_0000, 0x0000_0001, 0x0001_0002, 0x0000_0003];
        let sum = BlockCipher::Special.apply(0, &mut dwords);
        assert_eq!(dwords, [0x50A4_A89C, 0xAF5B_5762, 0x50A5_A899, 0x3AF6_F43E]);
        assert_eq!(sum, 0x8B9C_9CD5);
    }

    #[test]
    fn special_key_file() {
        let key = KEY_SPECIAL_A;
        let mut raw = Vec::new();
        // Block 0: plain XOR, first dword is the file length (40).
        for p in [40u32, 0, 0, 0] {
            raw.extend_from_slice(&(p ^ key).to_le_bytes());
        }
        raw.extend_from_slice(&40u32.to_le_bytes());
        // Block 1: special transform; state restarts at zero.
        for s in [0u32, 1, 0x0001_0002, 3, 0x8B9C_9CD5] {
            raw.extend_from_slice(&s.to_le_bytes());
        }

        let out = decrypt(&raw).unwrap();
        assert_eq!(out.scheme, KeyScheme::SpecialA);
        assert_eq!(out.block_size, 20);
        let words: Vec<u32> = out.data.chunks_exact(4).map(LittleEndian::read_u32).collect();
        assert_eq!(words, vec![40, 0, 0, 0, 0x50A4_A89C, 0xAF5B_5762, 0x50A5_A899, 0x3AF6_F43E]);
    }
}
