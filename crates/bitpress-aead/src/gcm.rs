//! Galois/Counter Mode with chunked (progressive) processing.
//!
//! The engine accepts input in arbitrary-sized chunks and produces output
//! immediately, deferring only the final tag: each `process` call prepends
//! whatever the previous call could not align to a block boundary, and on
//! the decrypt side additionally withholds the trailing tag-length bits,
//! since until the stream ends they may be the authentication tag rather
//! than ciphertext. `finalize` consumes the engine, so a use-after-finish
//! is a compile error rather than a runtime check.
//!
//! Order matters on the two directions: GCM authenticates ciphertext, so
//! decryption folds its input into GHASH *before* decrypting while
//! encryption encrypts first and folds the output after.

use bitpress_core::{xor_block, BitArray, CryptoError, CryptoResult};
use zeroize::Zeroize;

use crate::ghash::ghash;
use crate::head_block;
use crate::prf::BlockCipher;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Direction {
    Encrypt,
    Decrypt,
}

struct GcmState<C> {
    prf: C,
    direction: Direction,
    h: [u32; 4],
    j0: [u32; 4],
    ctr: [u32; 4],
    tag: [u32; 4],
    tlen: usize,
    aad_bits: u64,
    data_bits: u64,
    /// Unprocessed remainder (< one block) from the previous call.
    carry: BitArray,
    /// Decrypt only: trailing bytes provisionally held back as a possible
    /// authentication tag.
    tag_candidate: BitArray,
}

impl<C: BlockCipher> GcmState<C> {
    fn new(
        prf: C,
        direction: Direction,
        iv: &BitArray,
        adata: &BitArray,
        tlen: usize,
    ) -> CryptoResult<Self> {
        if tlen == 0 || tlen > 128 || tlen % 8 != 0 {
            return Err(CryptoError::Invalid(
                "gcm: tag length must be a positive multiple of 8 bits, at most 128",
            ));
        }
        if iv.is_empty() {
            return Err(CryptoError::Invalid("gcm: iv must not be empty"));
        }
        let h = prf.encrypt([0; 4]);
        let ivbl = iv.bit_len() as u64;
        let j0 = if ivbl == 96 {
            // J0 = IV || 0^31 || 1
            head_block(&iv.concat(&BitArray::from_words(vec![1])))
        } else {
            // J0 = GHASH(H, {}, IV), closed with the IV length block
            let j = ghash(&h, [0; 4], iv);
            ghash(
                &h,
                j,
                &BitArray::from_words(vec![0, 0, (ivbl >> 32) as u32, ivbl as u32]),
            )
        };
        let tag = ghash(&h, [0; 4], adata);
        Ok(Self {
            prf,
            direction,
            h,
            j0,
            ctr: j0,
            tag,
            tlen,
            aad_bits: adata.bit_len() as u64,
            data_bits: 0,
            carry: BitArray::new(),
            tag_candidate: BitArray::new(),
        })
    }

    fn update(&mut self, data: &BitArray, finalizing: bool) -> BitArray {
        let mut inp = std::mem::take(&mut self.carry);
        if self.direction == Direction::Decrypt {
            inp = inp.concat(&std::mem::take(&mut self.tag_candidate));
        }
        inp = inp.concat(data);
        let mut bl = inp.bit_len();

        // peel the possible tag off the end before anything is decrypted
        if self.direction == Direction::Decrypt {
            if bl < self.tlen {
                self.tag_candidate = inp;
                return BitArray::new();
            }
            self.tag_candidate = inp.bit_slice_from(bl - self.tlen);
            inp = inp.clamp(bl - self.tlen);
            bl -= self.tlen;
        }

        // round down to whole blocks unless this is the last call
        let rem = bl % 128;
        if rem > 0 && !finalizing {
            self.carry = inp.bit_slice_from(bl - rem);
            inp = inp.clamp(bl - rem);
            bl -= rem;
        }
        if bl == 0 {
            return BitArray::new();
        }
        self.data_bits += bl as u64;

        if self.direction == Direction::Decrypt {
            self.tag = ghash(&self.h, self.tag, &inp);
        }
        let mut words = inp.words().to_vec();
        for chunk in words.chunks_mut(4) {
            incr32(&mut self.ctr);
            let ks = self.prf.encrypt(self.ctr);
            for (w, k) in chunk.iter_mut().zip(ks.iter()) {
                *w ^= k;
            }
        }
        let out = BitArray::from_words_partial(words, bl);
        if self.direction == Direction::Encrypt {
            self.tag = ghash(&self.h, self.tag, &out);
        }
        out
    }

    /// Folds the encoded bit lengths and encrypts the accumulator with
    /// `E(J0)`, yielding the tag clamped to the requested length.
    fn final_tag(&self) -> BitArray {
        let lengths = BitArray::from_words(vec![
            (self.aad_bits >> 32) as u32,
            self.aad_bits as u32,
            (self.data_bits >> 32) as u32,
            self.data_bits as u32,
        ]);
        let tag = ghash(&self.h, self.tag, &lengths);
        let masked = xor_block(&tag, &self.prf.encrypt(self.j0));
        BitArray::from_words(masked.to_vec()).clamp(self.tlen)
    }
}

fn incr32(ctr: &mut [u32; 4]) {
    ctr[3] = ctr[3].wrapping_add(1);
    if ctr[3] == 0 {
        ctr[2] = ctr[2].wrapping_add(1);
    }
}

/// Streaming GCM encryption engine. Create once per (key, nonce,
/// associated data) triple, feed chunks through
/// [`GcmEncryptor::process`], then consume it with
/// [`GcmEncryptor::finalize`].
pub struct GcmEncryptor<C>(GcmState<C>);

impl<C: BlockCipher> GcmEncryptor<C> {
    pub fn new(prf: C, iv: &BitArray, adata: &BitArray, tlen: usize) -> CryptoResult<Self> {
        Ok(Self(GcmState::new(prf, Direction::Encrypt, iv, adata, tlen)?))
    }

    /// Encrypts as much of the stream as is block-aligned so far; the rest
    /// is carried into the next call. May return an empty array.
    pub fn process(&mut self, data: &BitArray) -> BitArray {
        self.0.update(data, false)
    }

    /// Encrypts the final (possibly empty) chunk and appends the
    /// authentication tag.
    pub fn finalize(mut self, data: &BitArray) -> BitArray {
        let out = self.0.update(data, true);
        out.concat(&self.0.final_tag())
    }
}

/// Streaming GCM decryption engine; the mirror of [`GcmEncryptor`], with
/// tag verification gating the output at [`GcmDecryptor::finalize`].
pub struct GcmDecryptor<C>(GcmState<C>);

impl<C: BlockCipher> GcmDecryptor<C> {
    pub fn new(prf: C, iv: &BitArray, adata: &BitArray, tlen: usize) -> CryptoResult<Self> {
        Ok(Self(GcmState::new(prf, Direction::Decrypt, iv, adata, tlen)?))
    }

    /// Decrypts the block-aligned part of the stream seen so far, always
    /// keeping the trailing tag-length bits back as the tag candidate.
    pub fn process(&mut self, data: &BitArray) -> BitArray {
        self.0.update(data, false)
    }

    /// Decrypts the remainder and verifies the tag. On mismatch the
    /// pending plaintext is zeroized and a corrupt-data error returned;
    /// nothing of the unauthenticated tail is released.
    pub fn finalize(mut self, data: &BitArray) -> CryptoResult<BitArray> {
        let mut out = self.0.update(data, true);
        let tag = self.0.final_tag();
        if !tag.ct_eq(&self.0.tag_candidate) {
            out.zeroize();
            tracing::debug!("gcm: tag mismatch, plaintext discarded");
            return Err(CryptoError::Corrupt("gcm: tag doesn't match"));
        }
        Ok(out)
    }
}

/// One-shot encryption: `ciphertext || tag`.
pub fn encrypt<C: BlockCipher>(
    prf: C,
    plaintext: &BitArray,
    iv: &BitArray,
    adata: &BitArray,
    tlen: usize,
) -> CryptoResult<BitArray> {
    Ok(GcmEncryptor::new(prf, iv, adata, tlen)?.finalize(plaintext))
}

/// One-shot decryption of `ciphertext || tag`.
pub fn decrypt<C: BlockCipher>(
    prf: C,
    ciphertext: &BitArray,
    iv: &BitArray,
    adata: &BitArray,
    tlen: usize,
) -> CryptoResult<BitArray> {
    GcmDecryptor::new(prf, iv, adata, tlen)?.finalize(ciphertext)
}
