//! Offset Codebook mode 2.0 with chunked (progressive) processing.
//!
//! Rogaway's OCB 2.0: one block-cipher call per block, an evolving offset
//! Δ doubled in GF(2^128) (`times2`) between blocks, and a running
//! plaintext checksum instead of a hash accumulator. Associated data is
//! authenticated by a separate PMAC pass at construction time.
//!
//! The engines mirror the GCM pair: `process` emits every complete block
//! while always retaining the final-block candidate (plus, on the decrypt
//! side, the trailing tag bits), and `finalize` consumes the engine to
//! handle the last, possibly partial, block with the offset-masked pad.

use bitpress_core::{xor_block, BitArray, CryptoError, CryptoResult};
use zeroize::Zeroize;

use crate::head_block;
use crate::prf::BlockCipher;

/// Doubles a block in GF(2^128): shift left one bit, conditionally folding
/// the reduction constant 0x87 back in.
fn times2(x: &[u32; 4]) -> [u32; 4] {
    [
        x[0] << 1 ^ x[1] >> 31,
        x[1] << 1 ^ x[2] >> 31,
        x[2] << 1 ^ x[3] >> 31,
        x[3] << 1 ^ (x[0] >> 31).wrapping_mul(0x87),
    ]
}

/// PMAC over the associated data.
pub fn pmac<C: BlockCipher>(prp: &C, adata: &BitArray) -> [u32; 4] {
    let mut checksum = [0u32; 4];
    let mut delta = prp.encrypt([0; 4]);
    delta = xor_block(&delta, &times2(&times2(&delta)));

    let mut rest = adata.clone();
    while rest.words().len() > 4 {
        delta = times2(&delta);
        checksum = xor_block(&checksum, &prp.encrypt(xor_block(&delta, &head_block(&rest))));
        rest = rest.bit_slice_from(128);
    }
    let mut last = rest;
    if last.bit_len() < 128 {
        // 10* padding, and the final-block offset variant
        delta = xor_block(&delta, &times2(&delta));
        last = last.concat(&BitArray::from_words(vec![0x8000_0000, 0, 0, 0]));
    }
    checksum = xor_block(&checksum, &head_block(&last));
    prp.encrypt(xor_block(
        &times2(&xor_block(&delta, &times2(&delta))),
        &checksum,
    ))
}

fn init<C: BlockCipher>(
    prp: &C,
    iv: &BitArray,
    adata: &BitArray,
    tlen: usize,
) -> CryptoResult<([u32; 4], Option<[u32; 4]>)> {
    if iv.bit_len() != 128 {
        return Err(CryptoError::Invalid("ocb iv must be 128 bits"));
    }
    if tlen == 0 || tlen > 128 {
        return Err(CryptoError::Invalid("ocb: tag length must be 1..=128 bits"));
    }
    let delta = times2(&prp.encrypt(head_block(iv)));
    let aad_mac = if adata.is_empty() {
        None
    } else {
        Some(pmac(prp, adata))
    };
    Ok((delta, aad_mac))
}

/// Streaming OCB2 encryption engine. The one-shot form in the original
/// toolkit defaults the tag to 64 bits; the engine takes it explicitly.
pub struct Ocb2Encryptor<C> {
    prp: C,
    delta: [u32; 4],
    checksum: [u32; 4],
    aad_mac: Option<[u32; 4]>,
    tlen: usize,
    carry: BitArray,
}

impl<C: BlockCipher> Ocb2Encryptor<C> {
    pub fn new(prp: C, iv: &BitArray, adata: &BitArray, tlen: usize) -> CryptoResult<Self> {
        let (delta, aad_mac) = init(&prp, iv, adata, tlen)?;
        Ok(Self {
            prp,
            delta,
            checksum: [0; 4],
            aad_mac,
            tlen,
            carry: BitArray::new(),
        })
    }

    /// Encrypts every block that can no longer be the final one; at least
    /// one block's worth of input is always retained for `finalize`.
    pub fn process(&mut self, data: &BitArray) -> BitArray {
        let inp = std::mem::take(&mut self.carry).concat(data);
        let total = inp.bit_len();
        let nblocks = total.saturating_sub(1) / 128;
        let words = inp.words();
        let mut out = Vec::with_capacity(nblocks * 4);
        for i in 0..nblocks {
            let bi = [words[4 * i], words[4 * i + 1], words[4 * i + 2], words[4 * i + 3]];
            self.checksum = xor_block(&self.checksum, &bi);
            let ci = xor_block(
                &self.delta,
                &self.prp.encrypt(xor_block(&self.delta, &bi)),
            );
            out.extend_from_slice(&ci);
            self.delta = times2(&self.delta);
        }
        self.carry = inp.bit_slice_from(nblocks * 128);
        BitArray::from_words(out)
    }

    /// Encrypts the final (possibly partial, possibly empty) block with the
    /// offset-masked pad and appends the tag.
    pub fn finalize(mut self, data: &BitArray) -> BitArray {
        let head = self.process(data);
        let bl = self.carry.bit_len();
        let pad = self
            .prp
            .encrypt(xor_block(&self.delta, &[0, 0, 0, bl as u32]));
        let ct_words = xor_block(&head_block(&self.carry), &pad);
        let final_ct = BitArray::from_words(ct_words.to_vec()).clamp(bl);
        // the checksum absorbs plaintext || pad-tail, i.e. C0* ⊕ Pad
        self.checksum = xor_block(
            &self.checksum,
            &xor_block(&head_block(&final_ct), &pad),
        );
        let tag = self.tag();
        head.concat(&final_ct).concat(&tag)
    }

    fn tag(&self) -> BitArray {
        finish_tag(
            &self.prp,
            &self.checksum,
            &self.delta,
            self.aad_mac,
            self.tlen,
        )
    }
}

/// Streaming OCB2 decryption engine.
pub struct Ocb2Decryptor<C> {
    prp: C,
    delta: [u32; 4],
    checksum: [u32; 4],
    aad_mac: Option<[u32; 4]>,
    tlen: usize,
    carry: BitArray,
}

impl<C: BlockCipher> Ocb2Decryptor<C> {
    pub fn new(prp: C, iv: &BitArray, adata: &BitArray, tlen: usize) -> CryptoResult<Self> {
        let (delta, aad_mac) = init(&prp, iv, adata, tlen)?;
        Ok(Self {
            prp,
            delta,
            checksum: [0; 4],
            aad_mac,
            tlen,
            carry: BitArray::new(),
        })
    }

    /// Decrypts every block that can no longer be part of the final block
    /// or the trailing tag.
    pub fn process(&mut self, data: &BitArray) -> BitArray {
        let inp = std::mem::take(&mut self.carry).concat(data);
        let total = inp.bit_len();
        let nblocks = total.saturating_sub(self.tlen).saturating_sub(1) / 128;
        let words = inp.words();
        let mut out = Vec::with_capacity(nblocks * 4);
        for i in 0..nblocks {
            let ci = [words[4 * i], words[4 * i + 1], words[4 * i + 2], words[4 * i + 3]];
            let bi = xor_block(
                &self.delta,
                &self.prp.decrypt(xor_block(&self.delta, &ci)),
            );
            self.checksum = xor_block(&self.checksum, &bi);
            out.extend_from_slice(&bi);
            self.delta = times2(&self.delta);
        }
        self.carry = inp.bit_slice_from(nblocks * 128);
        BitArray::from_words(out)
    }

    /// Decrypts the final block, verifies the trailing tag in constant
    /// time, and fails with a corrupt-data error (releasing nothing) on a
    /// mismatch.
    pub fn finalize(mut self, data: &BitArray) -> CryptoResult<BitArray> {
        let mut head = self.process(data);
        if self.carry.bit_len() < self.tlen {
            return Err(CryptoError::Invalid("ocb: ciphertext shorter than the tag"));
        }
        let bl = self.carry.bit_len() - self.tlen;
        let pad = self
            .prp
            .encrypt(xor_block(&self.delta, &[0, 0, 0, bl as u32]));
        let final_ct = self.carry.bit_slice(0, bl);
        let pt_words = xor_block(&head_block(&final_ct), &pad);
        self.checksum = xor_block(&self.checksum, &pt_words);

        let expected = finish_tag(
            &self.prp,
            &self.checksum,
            &self.delta,
            self.aad_mac,
            self.tlen,
        );
        let given = self.carry.bit_slice_from(bl);
        if !expected.ct_eq(&given) {
            head.zeroize();
            tracing::debug!("ocb2: tag mismatch, plaintext discarded");
            return Err(CryptoError::Corrupt("ocb: tag doesn't match"));
        }
        Ok(head.concat(&BitArray::from_words(pt_words.to_vec()).clamp(bl)))
    }
}

fn finish_tag<C: BlockCipher>(
    prp: &C,
    checksum: &[u32; 4],
    delta: &[u32; 4],
    aad_mac: Option<[u32; 4]>,
    tlen: usize,
) -> BitArray {
    let mut tag = prp.encrypt(xor_block(
        checksum,
        &xor_block(delta, &times2(delta)),
    ));
    if let Some(mac) = aad_mac {
        tag = xor_block(&tag, &mac);
    }
    BitArray::from_words(tag.to_vec()).clamp(tlen)
}

/// One-shot encryption: `ciphertext || tag`. The original toolkit's
/// default tag length for OCB2 is 64 bits.
pub fn encrypt<C: BlockCipher>(
    prp: C,
    plaintext: &BitArray,
    iv: &BitArray,
    adata: &BitArray,
    tlen: usize,
) -> CryptoResult<BitArray> {
    Ok(Ocb2Encryptor::new(prp, iv, adata, tlen)?.finalize(plaintext))
}

/// One-shot decryption of `ciphertext || tag`.
pub fn decrypt<C: BlockCipher>(
    prp: C,
    ciphertext: &BitArray,
    iv: &BitArray,
    adata: &BitArray,
    tlen: usize,
) -> CryptoResult<BitArray> {
    Ocb2Decryptor::new(prp, iv, adata, tlen)?.finalize(ciphertext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prf::Aes128Prf;
    use bitpress_core::bytes;

    fn prp() -> Aes128Prf {
        Aes128Prf::new(&hex::decode("000102030405060708090a0b0c0d0e0f").unwrap()).unwrap()
    }

    fn iv() -> BitArray {
        bytes::to_bits(&hex::decode("000102030405060708090a0b0c0d0e0f").unwrap())
    }

    #[test]
    fn times2_folds_the_reduction_constant() {
        assert_eq!(times2(&[0, 0, 0, 1]), [0, 0, 0, 2]);
        assert_eq!(
            times2(&[0x8000_0000, 0, 0, 0]),
            [0, 0, 0, 0x87]
        );
    }

    #[test]
    fn roundtrip_empty_plaintext() {
        let ct = encrypt(prp(), &BitArray::new(), &iv(), &BitArray::new(), 64).unwrap();
        assert_eq!(ct.bit_len(), 64);
        let pt = decrypt(prp(), &ct, &iv(), &BitArray::new(), 64).unwrap();
        assert!(pt.is_empty());
    }

    #[test]
    fn roundtrip_partial_final_block() {
        for len in [1usize, 7, 64, 127, 128, 129, 255, 256, 300] {
            let pt = BitArray::from_words((0..10).map(|i| 0x0101_0101 * i).collect()).clamp(len);
            let ct = encrypt(prp(), &pt, &iv(), &BitArray::new(), 64).unwrap();
            assert_eq!(ct.bit_len(), len + 64, "len={len}");
            let back = decrypt(prp(), &ct, &iv(), &BitArray::new(), 64).unwrap();
            assert_eq!(back, pt, "len={len}");
        }
    }

    #[test]
    fn roundtrip_with_associated_data_and_full_tag() {
        let pt = bytes::to_bits(b"offset codebook mode, version 2.0");
        let adata = bytes::to_bits(b"pmac covers this");
        let ct = encrypt(prp(), &pt, &iv(), &adata, 128).unwrap();
        assert_eq!(decrypt(prp(), &ct, &iv(), &adata, 128).unwrap(), pt);
        assert!(matches!(
            decrypt(prp(), &ct, &iv(), &bytes::to_bits(b"pmac covers that"), 128),
            Err(CryptoError::Corrupt(_))
        ));
    }

    #[test]
    fn chunked_encryption_matches_one_shot() {
        let pt = bytes::to_bits(b"chunk boundaries must not change the stream, ever.");
        let oneshot = encrypt(prp(), &pt, &iv(), &BitArray::new(), 64).unwrap();

        let mut enc = Ocb2Encryptor::new(prp(), &iv(), &BitArray::new(), 64).unwrap();
        let mut out = BitArray::new();
        for chunk in [pt.bit_slice(0, 13), pt.bit_slice(13, 257), pt.bit_slice_from(257)] {
            out = out.concat(&enc.process(&chunk));
        }
        out = out.concat(&enc.finalize(&BitArray::new()));
        assert_eq!(out, oneshot);
    }

    #[test]
    fn chunked_decryption_matches_one_shot() {
        let pt = bytes::to_bits(b"decrypting in dribs and drabs, tag held back throughout");
        let ct = encrypt(prp(), &pt, &iv(), &BitArray::new(), 64).unwrap();

        let mut dec = Ocb2Decryptor::new(prp(), &iv(), &BitArray::new(), 64).unwrap();
        let mut out = BitArray::new();
        for chunk in [ct.bit_slice(0, 50), ct.bit_slice(50, 200), ct.bit_slice_from(200)] {
            out = out.concat(&dec.process(&chunk));
        }
        out = out.concat(&dec.finalize(&BitArray::new()).unwrap());
        assert_eq!(out, pt);
    }

    #[test]
    fn tampered_ciphertext_is_corrupt() {
        let pt = bytes::to_bits(b"one flipped bit anywhere must be fatal");
        let ct = encrypt(prp(), &pt, &iv(), &BitArray::new(), 64).unwrap();
        for bit in [0, 130, ct.bit_len() - 1] {
            let flip = BitArray::partial(1, 1);
            let tampered = ct
                .bit_slice(0, bit)
                .concat(&ct.bit_slice(bit, bit + 1).xor(&flip))
                .concat(&ct.bit_slice_from(bit + 1));
            assert!(
                matches!(
                    decrypt(prp(), &tampered, &iv(), &BitArray::new(), 64),
                    Err(CryptoError::Corrupt(_))
                ),
                "bit {bit}"
            );
        }
    }

    #[test]
    fn rejects_wrong_iv_length() {
        let short = bytes::to_bits(&[0u8; 12]);
        assert!(matches!(
            encrypt(prp(), &BitArray::new(), &short, &BitArray::new(), 64),
            Err(CryptoError::Invalid(_))
        ));
    }

    #[test]
    fn ciphertext_shorter_than_tag_is_invalid() {
        let stub = BitArray::from_words(vec![0]).clamp(16);
        assert_eq!(
            decrypt(prp(), &stub, &iv(), &BitArray::new(), 64),
            Err(CryptoError::Invalid("ocb: ciphertext shorter than the tag"))
        );
    }
}
