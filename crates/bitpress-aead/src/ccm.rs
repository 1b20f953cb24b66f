//! Counter-with-CBC-MAC (CCM) over bit arrays.
//!
//! NIST CCM with a 128-bit PRF: a CBC-MAC over a header block (flags,
//! nonce, payload length), the length-prefixed associated data and the
//! payload, then counter mode encrypting both the payload and the MAC.
//! The length-field size `L` is the smallest of 2..=4 bytes that can encode
//! the payload length, subject to `L >= 15 - nonce_bytes`, and the nonce is
//! clamped to the `15 - L` bytes that fit the header block.
//!
//! The byte-buffer form in [`crate::ccm_buffer`] runs the same algorithm
//! in place over caller-owned storage; both share the header and
//! associated-data MAC below.

use bitpress_core::{xor_block, BitArray, CryptoError, CryptoResult};
use zeroize::Zeroize;

use crate::prf::BlockCipher;
use crate::{head_block, word_blocks};

/// Validated CCM parameters: clamped nonce, length-field size, tag size,
/// payload byte length.
pub(crate) struct CcmParams {
    pub iv: BitArray,
    pub l: usize,
    pub tlen_bytes: usize,
    pub ol: u64,
}

impl CcmParams {
    pub(crate) fn derive(
        iv: &BitArray,
        ol: u64,
        adata_bytes: u64,
        tlen: usize,
    ) -> CryptoResult<Self> {
        if tlen % 16 != 0 || !(32..=128).contains(&tlen) {
            return Err(CryptoError::Invalid("ccm: invalid tag length"));
        }
        let ivl = iv.bit_len() / 8;
        if ivl < 7 {
            return Err(CryptoError::Invalid("ccm: iv must be at least 7 bytes"));
        }
        if ol > u64::from(u32::MAX) || adata_bytes > u64::from(u32::MAX) {
            return Err(CryptoError::Bug("ccm: can't deal with 4GiB or more data"));
        }
        let mut l = 2;
        while l < 4 && (ol >> (8 * l)) != 0 {
            l += 1;
        }
        if l < 15usize.saturating_sub(ivl) {
            l = 15 - ivl;
        }
        Ok(Self {
            iv: iv.clone().clamp(8 * (15 - l)),
            l,
            tlen_bytes: tlen / 8,
            ol,
        })
    }

    fn flags(&self, has_adata: bool) -> u32 {
        let adata_bit: usize = if has_adata { 0x40 } else { 0 };
        (adata_bit | ((self.tlen_bytes - 2) / 2) << 3 | (self.l - 1)) as u32
    }

    /// The counter block for index 0 (`A0`), which encrypts the MAC.
    pub(crate) fn a0(&self) -> [u32; 4] {
        head_block(&BitArray::partial(8, (self.l - 1) as u32).concat(&self.iv))
    }
}

/// CBC-MAC over the header block and the length-prefixed associated data,
/// per the NIST CCM size classes: a zero length is omitted entirely,
/// lengths below `0xFF00` take two bytes, larger ones an `0xFFFE` marker
/// plus four bytes. Deviating here changes wire compatibility with other
/// CCM implementations.
pub(crate) fn mac_additional_data<C: BlockCipher>(
    prf: &C,
    adata: &BitArray,
    params: &CcmParams,
) -> [u32; 4] {
    let b0 = BitArray::partial(8, params.flags(!adata.is_empty())).concat(&params.iv);
    let mut mac = head_block(&b0);
    mac[3] |= params.ol as u32;
    mac = prf.encrypt(mac);

    if !adata.is_empty() {
        let abytes = (adata.bit_len() / 8) as u64;
        let len_prefix = if abytes < 0xFF00 {
            BitArray::partial(16, abytes as u32)
        } else {
            BitArray::partial(16, 0xFFFE).concat(&BitArray::from_words(vec![abytes as u32]))
        };
        let mac_data = len_prefix.concat(adata);
        for block in word_blocks(mac_data.words()) {
            mac = prf.encrypt(xor_block(&mac, &block));
        }
    }
    mac
}

/// The unencrypted authentication tag: the associated-data MAC continued
/// over the payload blocks, clamped to the tag length.
fn compute_tag<C: BlockCipher>(
    prf: &C,
    data: &BitArray,
    adata: &BitArray,
    params: &CcmParams,
) -> BitArray {
    let mut mac = mac_additional_data(prf, adata, params);
    for block in word_blocks(data.words()) {
        mac = prf.encrypt(xor_block(&mac, &block));
    }
    BitArray::from_words(mac.to_vec()).clamp(params.tlen_bytes * 8)
}

/// CCM-style CTR: encrypts the tag under counter 0 and the payload under
/// counters 1.., incrementing the low counter word with carry.
fn ctr_mode<C: BlockCipher>(
    prf: &C,
    data: BitArray,
    tag: &BitArray,
    params: &CcmParams,
) -> (BitArray, BitArray) {
    let mut ctr = params.a0();
    let tag_out = BitArray::from_words(
        xor_block(&head_block(tag), &prf.encrypt(ctr)).to_vec(),
    )
    .clamp(params.tlen_bytes * 8);

    let bl = data.bit_len();
    let mut words = data.words().to_vec();
    for chunk in words.chunks_mut(4) {
        incr(&mut ctr);
        let ks = prf.encrypt(ctr);
        for (w, k) in chunk.iter_mut().zip(ks.iter()) {
            *w ^= k;
        }
    }
    (BitArray::from_words_partial(words, bl), tag_out)
}

pub(crate) fn incr(ctr: &mut [u32; 4]) {
    ctr[3] = ctr[3].wrapping_add(1);
    if ctr[3] == 0 {
        ctr[2] = ctr[2].wrapping_add(1);
    }
}

/// Encrypts and authenticates `plaintext`, returning `ciphertext || tag`.
///
/// The nonce must be at least 7 bytes; the tag length (bits) must be one of
/// 32, 48, 64, 80, 96, 112, 128. The default in the wider toolkit is 128.
pub fn encrypt<C: BlockCipher>(
    prf: &C,
    plaintext: &BitArray,
    iv: &BitArray,
    adata: &BitArray,
    tlen: usize,
) -> CryptoResult<BitArray> {
    let params = CcmParams::derive(
        iv,
        (plaintext.bit_len() / 8) as u64,
        (adata.bit_len() / 8) as u64,
        tlen,
    )?;
    let tag = compute_tag(prf, plaintext, adata, &params);
    let (ct, tag) = ctr_mode(prf, plaintext.clone(), &tag, &params);
    Ok(ct.concat(&tag))
}

/// Decrypts `ciphertext || tag`, failing with a corrupt-data error (and
/// releasing no plaintext) when the recomputed MAC does not match.
pub fn decrypt<C: BlockCipher>(
    prf: &C,
    ciphertext: &BitArray,
    iv: &BitArray,
    adata: &BitArray,
    tlen: usize,
) -> CryptoResult<BitArray> {
    if ciphertext.bit_len() < tlen {
        return Err(CryptoError::Invalid("ccm: ciphertext shorter than the tag"));
    }
    let ol_bits = ciphertext.bit_len() - tlen;
    let body = ciphertext.clone().clamp(ol_bits);
    let tag = ciphertext.bit_slice_from(ol_bits);
    let params = CcmParams::derive(
        iv,
        (ol_bits / 8) as u64,
        (adata.bit_len() / 8) as u64,
        tlen,
    )?;

    let (mut pt, tag_dec) = ctr_mode(prf, body, &tag, &params);
    let expected = compute_tag(prf, &pt, adata, &params);
    if !tag_dec.ct_eq(&expected) {
        pt.zeroize();
        tracing::debug!("ccm: tag mismatch, plaintext discarded");
        return Err(CryptoError::Corrupt("ccm: tag doesn't match"));
    }
    Ok(pt)
}
