//! Keystream cipher abstraction.
//!
//! A keystream cipher emits successive fixed-size pseudorandom blocks
//! ("masks"); XORing them against data gives a stream cipher. [`Keystream`]
//! carries the unconsumed tail of the last mask across calls, so repeated
//! [`Keystream::crypt`] calls over successive chunks are equivalent to one
//! call over the concatenation. Ciphers with absolute block addressing
//! additionally get random-access seeking through
//! [`Keystream::set_position`].

use bitpress_core::{BitArray, CryptoError, CryptoResult};

/// A cipher that produces one pseudorandom block per call.
pub trait KeystreamCipher {
    /// Size of one mask block in bits.
    const BLOCK_BITS: usize;

    /// Advances the internal state and returns one fresh mask block.
    /// Fails with an invalid-state error once the underlying 64-bit block
    /// counter would wrap.
    fn next_mask(&mut self) -> CryptoResult<BitArray>;

    /// Repositions to an absolute block index. Optional; the default
    /// signals an unseekable cipher.
    fn set_block(&mut self, _block: u64) -> CryptoResult<()> {
        Err(CryptoError::Bug("this keystream cipher can't seek"))
    }

    /// Current absolute block index. Optional, as for
    /// [`KeystreamCipher::set_block`].
    fn get_block(&self) -> CryptoResult<u64> {
        Err(CryptoError::Bug("this keystream cipher can't tell its position"))
    }
}

/// A keystream cipher plus the carried-over remainder of its last mask.
pub struct Keystream<C> {
    cipher: C,
    mask: BitArray,
}

impl<C: KeystreamCipher> Keystream<C> {
    pub fn new(cipher: C) -> Self {
        Self {
            cipher,
            mask: BitArray::new(),
        }
    }

    /// XORs `data` against the keystream, consuming leftover mask bits from
    /// a prior partial block before requesting new ones.
    pub fn crypt(&mut self, data: &BitArray) -> CryptoResult<BitArray> {
        let len = data.bit_len();
        let mut ks = std::mem::take(&mut self.mask);
        while ks.bit_len() < len {
            ks = ks.concat(&self.cipher.next_mask()?);
        }
        self.mask = ks.bit_slice_from(len);
        Ok(data.xor(&ks.clamp(len)))
    }

    /// Alias for [`Keystream::crypt`]; encryption and decryption are the
    /// same XOR.
    pub fn encrypt(&mut self, data: &BitArray) -> CryptoResult<BitArray> {
        self.crypt(data)
    }

    /// Alias for [`Keystream::crypt`].
    pub fn decrypt(&mut self, data: &BitArray) -> CryptoResult<BitArray> {
        self.crypt(data)
    }

    /// Seeks to an absolute bit offset in the stream. Requires the cipher
    /// to support block addressing.
    pub fn set_position(&mut self, pos: u64) -> CryptoResult<()> {
        let block_bits = C::BLOCK_BITS as u64;
        let rel = pos % block_bits;
        self.cipher.set_block(pos / block_bits)?;
        self.mask = if rel == 0 {
            BitArray::new()
        } else {
            self.cipher.next_mask()?.bit_slice_from(rel as usize)
        };
        Ok(())
    }

    /// Current bit offset in the stream.
    pub fn get_position(&self) -> CryptoResult<u64> {
        Ok(self.cipher.get_block()? * C::BLOCK_BITS as u64 - self.mask.bit_len() as u64)
    }

    pub fn into_inner(self) -> C {
        self.cipher
    }
}
