//! Bridge between [`BitArray`](crate::BitArray) and mutable byte buffers.
//!
//! The in-place cipher paths (notably the byte-buffer CCM form) want plain
//! byte storage they can mutate block by block. Going from bits to bytes is
//! only possible when the bit length is a multiple of 8; going back always
//! succeeds, with a trailing 1-3 bytes becoming a tagged partial word.

use crate::bits::BitArray;
use crate::error::{CryptoError, CryptoResult};

/// Cipher block size the padding helpers default to, in bytes.
pub const BLOCK_BYTES: usize = 16;

/// Serializes a bit array into bytes. Fails with an invalid-parameter error
/// unless the bit length is a multiple of 8.
pub fn from_bits(bits: &BitArray) -> CryptoResult<Vec<u8>> {
    if bits.bit_len() % 8 != 0 {
        return Err(CryptoError::Invalid(
            "bit length must be a multiple of 8 to fit a byte buffer",
        ));
    }
    let nbytes = bits.bit_len() / 8;
    let mut out = Vec::with_capacity(bits.words().len() * 4);
    for w in bits.words() {
        out.extend_from_slice(&w.to_be_bytes());
    }
    out.truncate(nbytes);
    Ok(out)
}

/// Like [`from_bits`], additionally zero-padding the result up to the next
/// multiple of `pad_to`.
pub fn from_bits_padded(bits: &BitArray, pad_to: usize) -> CryptoResult<Vec<u8>> {
    let mut out = from_bits(bits)?;
    pad_buffer(&mut out, pad_to);
    Ok(out)
}

/// Packs bytes into a bit array. Always succeeds; a trailing partial word
/// is tagged with its true bit length.
pub fn to_bits(buf: &[u8]) -> BitArray {
    let mut words = Vec::with_capacity(buf.len().div_ceil(4));
    let mut chunks = buf.chunks_exact(4);
    for c in &mut chunks {
        words.push(u32::from_be_bytes(c.try_into().expect("4-byte chunk")));
    }
    let rem = chunks.remainder();
    if !rem.is_empty() {
        let mut w = 0u32;
        for &b in rem {
            w = (w << 8) | u32::from(b);
        }
        words.push(w << (32 - rem.len() * 8));
    }
    BitArray::from_words_partial(words, buf.len() * 8)
}

/// Zero-pads `buf` in place up to the next multiple of `pad_to`. An empty
/// buffer stays empty.
pub fn pad_buffer(buf: &mut Vec<u8>, pad_to: usize) {
    debug_assert!(pad_to > 0);
    if buf.is_empty() {
        return;
    }
    let r = buf.len() % pad_to;
    if r != 0 {
        buf.resize(buf.len() + pad_to - r, 0);
    }
}

/// Truncates the zero padding reintroduced by block encryption back to the
/// caller's original length.
pub fn unpad_buffer(buf: &mut Vec<u8>, original_len: usize) {
    debug_assert!(original_len <= buf.len());
    buf.truncate(original_len);
}
