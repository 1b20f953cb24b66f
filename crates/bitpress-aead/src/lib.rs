//! bitpress-aead: streaming authenticated encryption over the bitpress core
//!
//! Every mode here is built against two narrow interfaces: the
//! [`BitArray`](bitpress_core::BitArray) bit-vector currency from
//! `bitpress-core`, and a 128-bit block permutation behind the
//! [`BlockCipher`] trait (AES via the RustCrypto `aes` crate in
//! production). The modes themselves are what this crate implements:
//!
//! ```text
//! prf      BlockCipher trait + AES adapter
//! ghash    GF(2^128) accumulator consumed by GCM
//! stream   keystream-cipher abstraction with cross-call mask carry
//! ctr      seekable CTR keystream + one-shot XOR cipher (no integrity!)
//! ccm      counter-with-CBC-MAC over bit arrays
//! ccm_buffer   the same, mutating caller-owned byte buffers in place
//! gcm      progressive (chunked) Galois/Counter mode
//! ocb2     progressive (chunked) offset-codebook mode 2.0
//! ```
//!
//! The progressive engines are single-use state machines: construct one
//! per (key, nonce, associated data) triple, feed `process` as data
//! arrives, and `finalize` consumes the engine — decryption releases no
//! plaintext held back as a possible tag until that tag has verified.
//! Engines carry no internal synchronization; give each logical stream its
//! own engine or serialize access externally.

pub mod ccm;
pub mod ccm_buffer;
pub mod ctr;
pub mod gcm;
pub mod ghash;
pub mod ocb2;
pub mod prf;
pub mod stream;

pub use ccm_buffer::CcmSealed;
pub use ctr::CtrKeystream;
pub use gcm::{GcmDecryptor, GcmEncryptor};
pub use ocb2::{Ocb2Decryptor, Ocb2Encryptor};
pub use prf::{Aes128Prf, Aes192Prf, Aes256Prf, AesPrf, BlockCipher};
pub use stream::{Keystream, KeystreamCipher};

use bitpress_core::BitArray;

/// The first 128 bits of `a` as a cipher block, zero-padded.
pub(crate) fn head_block(a: &BitArray) -> [u32; 4] {
    let mut block = [0u32; 4];
    let words = a.words();
    let n = words.len().min(4);
    block[..n].copy_from_slice(&words[..n]);
    block
}

/// `words` in cipher-block units, the final block zero-padded.
pub(crate) fn word_blocks(words: &[u32]) -> impl Iterator<Item = [u32; 4]> + '_ {
    words.chunks(4).map(|chunk| {
        let mut block = [0u32; 4];
        block[..chunk.len()].copy_from_slice(chunk);
        block
    })
}
