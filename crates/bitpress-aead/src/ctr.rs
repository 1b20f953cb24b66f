//! Counter-mode keystream over a 128-bit block cipher.
//!
//! CTR alone provides no message integrity; anyone who can flip a
//! ciphertext bit flips the matching plaintext bit undetected. Prefer the
//! AEAD modes unless an outer layer authenticates the stream.
//!
//! The 128-bit IV seeds the initial counter block; the 64-bit block index
//! is carried in the low two counter words, which is what makes the
//! keystream block-addressable for [`Keystream::set_position`].

use bitpress_core::{BitArray, CryptoError, CryptoResult};

use crate::prf::BlockCipher;
use crate::stream::{Keystream, KeystreamCipher};

/// A seekable CTR keystream.
pub struct CtrKeystream<C> {
    prf: C,
    prefix: [u32; 2],
    base: u64,
    block: u64,
}

impl<C: BlockCipher> CtrKeystream<C> {
    /// `iv` must be exactly 128 bits; it becomes the counter block for
    /// block index 0.
    pub fn new(prf: C, iv: &BitArray) -> CryptoResult<Self> {
        if iv.bit_len() != 128 {
            return Err(CryptoError::Invalid("ctr iv must be 128 bits"));
        }
        let w = iv.words();
        Ok(Self {
            prf,
            prefix: [w[0], w[1]],
            base: (u64::from(w[2]) << 32) | u64::from(w[3]),
            block: 0,
        })
    }

    fn counter_block(&self, block: u64) -> CryptoResult<[u32; 4]> {
        let ctr = self
            .base
            .checked_add(block)
            .ok_or(CryptoError::Invalid("ctr: position outside the addressable counter width"))?;
        Ok([self.prefix[0], self.prefix[1], (ctr >> 32) as u32, ctr as u32])
    }
}

impl<C: BlockCipher> KeystreamCipher for CtrKeystream<C> {
    const BLOCK_BITS: usize = 128;

    fn next_mask(&mut self) -> CryptoResult<BitArray> {
        let ctr = self.counter_block(self.block)?;
        self.block = self
            .block
            .checked_add(1)
            .ok_or(CryptoError::Invalid("ctr: 64-bit block counter exhausted"))?;
        Ok(BitArray::from_words(self.prf.encrypt(ctr).to_vec()))
    }

    fn set_block(&mut self, block: u64) -> CryptoResult<()> {
        self.block = block;
        Ok(())
    }

    fn get_block(&self) -> CryptoResult<u64> {
        Ok(self.block)
    }
}

/// One-shot CTR over `data`; encryption and decryption are the same
/// operation.
pub fn crypt<C: BlockCipher>(prf: C, data: &BitArray, iv: &BitArray) -> CryptoResult<BitArray> {
    Keystream::new(CtrKeystream::new(prf, iv)?).crypt(data)
}

/// Alias for [`crypt`].
pub fn encrypt<C: BlockCipher>(prf: C, data: &BitArray, iv: &BitArray) -> CryptoResult<BitArray> {
    crypt(prf, data, iv)
}

/// Alias for [`crypt`].
pub fn decrypt<C: BlockCipher>(prf: C, data: &BitArray, iv: &BitArray) -> CryptoResult<BitArray> {
    crypt(prf, data, iv)
}
