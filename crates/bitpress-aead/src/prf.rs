//! The 128-bit block cipher (PRF/PRP) interface every mode is built on.
//!
//! The modes in this crate never touch key schedules or cipher internals;
//! they consume a deterministic 128-bit permutation through [`BlockCipher`]
//! and nothing else. [`AesPrf`] adapts the RustCrypto `aes` crate to that
//! interface for production use; tests are free to plug in anything.

use aes::cipher::consts::U16;
use aes::cipher::{BlockDecrypt, BlockEncrypt, BlockSizeUser, KeyInit};
use bitpress_core::{CryptoError, CryptoResult};

/// A deterministic, constant-time 128-bit block permutation, expressed over
/// the 4-word blocks the bit-vector core trades in.
///
/// `decrypt` is part of the contract because OCB2 runs the inverse
/// permutation on its data path; GCM and CCM only ever call `encrypt`.
pub trait BlockCipher {
    fn encrypt(&self, block: [u32; 4]) -> [u32; 4];
    fn decrypt(&self, block: [u32; 4]) -> [u32; 4];
}

impl<T: BlockCipher + ?Sized> BlockCipher for &T {
    fn encrypt(&self, block: [u32; 4]) -> [u32; 4] {
        (**self).encrypt(block)
    }

    fn decrypt(&self, block: [u32; 4]) -> [u32; 4] {
        (**self).decrypt(block)
    }
}

/// AES adapter over any RustCrypto AES variant.
pub struct AesPrf<C> {
    inner: C,
}

pub type Aes128Prf = AesPrf<aes::Aes128>;
pub type Aes192Prf = AesPrf<aes::Aes192>;
pub type Aes256Prf = AesPrf<aes::Aes256>;

impl<C: KeyInit> AesPrf<C> {
    /// Expands `key`; fails with an invalid-parameter error when the key
    /// length does not match the AES variant.
    pub fn new(key: &[u8]) -> CryptoResult<Self> {
        let inner =
            C::new_from_slice(key).map_err(|_| CryptoError::Invalid("aes: wrong key length"))?;
        Ok(Self { inner })
    }
}

impl<C: BlockEncrypt + BlockDecrypt + BlockSizeUser<BlockSize = U16>> BlockCipher for AesPrf<C> {
    fn encrypt(&self, block: [u32; 4]) -> [u32; 4] {
        let mut b = aes::Block::from(block_to_bytes(block));
        self.inner.encrypt_block(&mut b);
        bytes_to_block(b.into())
    }

    fn decrypt(&self, block: [u32; 4]) -> [u32; 4] {
        let mut b = aes::Block::from(block_to_bytes(block));
        self.inner.decrypt_block(&mut b);
        bytes_to_block(b.into())
    }
}

fn block_to_bytes(block: [u32; 4]) -> [u8; 16] {
    let mut out = [0u8; 16];
    for (chunk, w) in out.chunks_exact_mut(4).zip(block.iter()) {
        chunk.copy_from_slice(&w.to_be_bytes());
    }
    out
}

fn bytes_to_block(bytes: [u8; 16]) -> [u32; 4] {
    let mut out = [0u32; 4];
    for (w, chunk) in out.iter_mut().zip(bytes.chunks_exact(4)) {
        *w = u32::from_be_bytes(chunk.try_into().expect("4-byte chunk"));
    }
    out
}
