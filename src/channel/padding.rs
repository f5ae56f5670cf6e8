//! PKCS#7-style block padding with a 32-byte block.
//!
//! The platform pads plaintext to a multiple of 32 bytes before AES-CBC
//! encryption, not to the 16-byte AES block size. The cipher itself runs
//! with padding disabled and these helpers do the framing.

/// Block size used by the platform's padding scheme.
pub const BLOCK_SIZE: usize = 32;

/// Appends `n` bytes of value `n`, where `n = 32 - len % 32` (so `1..=32`).
pub fn pad(data: &[u8]) -> Vec<u8> {
    let pad_len = BLOCK_SIZE - (data.len() % BLOCK_SIZE);
    let mut padded = Vec::with_capacity(data.len() + pad_len);
    padded.extend_from_slice(data);
    padded.resize(data.len() + pad_len, pad_len as u8);
    padded
}

/// Strips the trailing padding declared by the last byte.
///
/// A last byte outside `1..=32` removes nothing. That lenient fallback is
/// what the platform's reference implementation does, so corrupted input
/// passes through here and must be caught by the layout checks that follow.
pub fn unpad(data: &[u8]) -> &[u8] {
    let Some(&last) = data.last() else {
        return data;
    };
    let pad_len = match last as usize {
        n @ 1..=BLOCK_SIZE => n,
        _ => 0,
    };
    &data[..data.len().saturating_sub(pad_len)]
}
