//! CCM over mutable byte buffers.
//!
//! Same algorithm as [`crate::ccm`], but the payload lives in a `Vec<u8>`
//! that is encrypted or decrypted in place, block by block, with no
//! bit-array round-trip on the data path. The buffer is moved into the
//! call and handed back transformed; the short tag travels separately.
//! On a failed tag check the decrypted contents are zeroized before the
//! error returns, so unauthenticated plaintext never escapes.

use bitpress_core::{bytes, xor_block, BitArray, CryptoError, CryptoResult};
use zeroize::Zeroize;

use crate::ccm::{incr, mac_additional_data, CcmParams};
use crate::head_block;
use crate::prf::BlockCipher;

/// Ciphertext buffer plus its detached authentication tag.
pub struct CcmSealed {
    pub ciphertext: Vec<u8>,
    pub tag: BitArray,
}

/// Encrypts `plaintext` in place, returning the transformed buffer at its
/// original length and the detached tag.
pub fn encrypt<C: BlockCipher>(
    prf: &C,
    plaintext: Vec<u8>,
    iv: &BitArray,
    adata: &BitArray,
    tlen: usize,
) -> CryptoResult<CcmSealed> {
    let ol = plaintext.len();
    let params = CcmParams::derive(iv, ol as u64, (adata.bit_len() / 8) as u64, tlen)?;

    let mut buf = plaintext;
    bytes::pad_buffer(&mut buf, bytes::BLOCK_BYTES);
    let mac = compute_tag(prf, &mut buf, adata, &params, ol);
    let tag = ctr_mode(prf, &mut buf, &mac, &params);
    bytes::unpad_buffer(&mut buf, ol);
    Ok(CcmSealed {
        ciphertext: buf,
        tag,
    })
}

/// Decrypts `ciphertext` in place against the detached `tag`, returning
/// the plaintext at its original length, or a corrupt-data error with the
/// buffer scrubbed.
pub fn decrypt<C: BlockCipher>(
    prf: &C,
    ciphertext: Vec<u8>,
    tag: &BitArray,
    iv: &BitArray,
    adata: &BitArray,
    tlen: usize,
) -> CryptoResult<Vec<u8>> {
    let ol = ciphertext.len();
    let params = CcmParams::derive(iv, ol as u64, (adata.bit_len() / 8) as u64, tlen)?;

    let mut buf = ciphertext;
    bytes::pad_buffer(&mut buf, bytes::BLOCK_BYTES);
    let tag_dec = ctr_mode(prf, &mut buf, tag, &params);
    let expected = compute_tag(prf, &mut buf, adata, &params, ol);
    if !tag_dec.ct_eq(&expected) {
        buf.zeroize();
        tracing::debug!("ccm: tag mismatch, buffer scrubbed");
        return Err(CryptoError::Corrupt("ccm: tag doesn't match"));
    }
    bytes::unpad_buffer(&mut buf, ol);
    Ok(buf)
}

/// The unencrypted tag over header, associated data and the buffer.
/// Zeroes the padding region first: after an in-place CTR pass it holds
/// keystream residue, not the zeros the MAC is defined over.
fn compute_tag<C: BlockCipher>(
    prf: &C,
    buf: &mut [u8],
    adata: &BitArray,
    params: &CcmParams,
    ol: usize,
) -> BitArray {
    let mut mac = mac_additional_data(prf, adata, params);

    if !buf.is_empty() {
        for b in &mut buf[ol..] {
            *b = 0;
        }
        for block in buf.chunks_exact(16) {
            for (m, chunk) in mac.iter_mut().zip(block.chunks_exact(4)) {
                *m ^= u32::from_be_bytes(chunk.try_into().expect("4-byte chunk"));
            }
            mac = prf.encrypt(mac);
        }
    }
    BitArray::from_words(mac.to_vec()).clamp(params.tlen_bytes * 8)
}

/// CCM-style CTR over the buffer: en/decrypts the tag under counter 0 and
/// the buffer blocks under counters 1.., in place.
fn ctr_mode<C: BlockCipher>(
    prf: &C,
    buf: &mut [u8],
    tag: &BitArray,
    params: &CcmParams,
) -> BitArray {
    let mut ctr = params.a0();
    let tag_out = BitArray::from_words(
        xor_block(&head_block(tag), &prf.encrypt(ctr)).to_vec(),
    )
    .clamp(params.tlen_bytes * 8);

    for block in buf.chunks_exact_mut(16) {
        incr(&mut ctr);
        let ks = prf.encrypt(ctr);
        for (chunk, k) in block.chunks_exact_mut(4).zip(ks.iter()) {
            let w = u32::from_be_bytes(chunk.try_into().expect("4-byte chunk")) ^ k;
            chunk.copy_from_slice(&w.to_be_bytes());
        }
    }
    tag_out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ccm;
    use crate::prf::Aes128Prf;

    fn prf() -> Aes128Prf {
        Aes128Prf::new(&hex::decode("b058d2931f46abb2a6062abcddf61d88").unwrap()).unwrap()
    }

    fn iv13() -> BitArray {
        bytes::to_bits(&[0u8, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12])
    }

    #[test]
    fn roundtrip_unaligned_length() {
        let pt = b"aaa".to_vec();
        let sealed = encrypt(&prf(), pt.clone(), &iv13(), &BitArray::new(), 128).unwrap();
        assert_eq!(sealed.ciphertext.len(), 3);
        assert_eq!(sealed.tag.bit_len(), 128);
        let back = decrypt(
            &prf(),
            sealed.ciphertext,
            &sealed.tag,
            &iv13(),
            &BitArray::new(),
            128,
        )
        .unwrap();
        assert_eq!(back, pt);
    }

    #[test]
    fn agrees_with_the_bit_array_form() {
        let pt = b"the two ccm paths must produce identical wire output".to_vec();
        let adata = bytes::to_bits(b"shared header");
        let sealed = encrypt(&prf(), pt.clone(), &iv13(), &adata, 128).unwrap();

        let reference = ccm::encrypt(&prf(), &bytes::to_bits(&pt), &iv13(), &adata, 128).unwrap();
        let combined = bytes::to_bits(&sealed.ciphertext).concat(&sealed.tag);
        assert_eq!(combined, reference);
    }

    #[test]
    fn empty_payload_produces_only_a_tag() {
        let sealed = encrypt(&prf(), vec![], &iv13(), &bytes::to_bits(b"ad"), 64).unwrap();
        assert!(sealed.ciphertext.is_empty());
        assert_eq!(sealed.tag.bit_len(), 64);
        let back = decrypt(
            &prf(),
            vec![],
            &sealed.tag,
            &iv13(),
            &bytes::to_bits(b"ad"),
            64,
        )
        .unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn tampered_buffer_is_scrubbed_and_corrupt() {
        let pt = b"in-place decryption must not leak".to_vec();
        let sealed = encrypt(&prf(), pt, &iv13(), &BitArray::new(), 128).unwrap();
        let mut tampered = sealed.ciphertext;
        tampered[5] ^= 0x40;
        assert_eq!(
            decrypt(&prf(), tampered, &sealed.tag, &iv13(), &BitArray::new(), 128),
            Err(CryptoError::Corrupt("ccm: tag doesn't match"))
        );
    }

    #[test]
    fn tampered_tag_is_corrupt() {
        let pt = b"tag tamper".to_vec();
        let sealed = encrypt(&prf(), pt, &iv13(), &BitArray::new(), 128).unwrap();
        let bad_tag = sealed.tag.xor(&BitArray::partial(1, 1).concat(
            &BitArray::from_words(vec![0; 4]).clamp(127),
        ));
        assert!(matches!(
            decrypt(&prf(), sealed.ciphertext, &bad_tag, &iv13(), &BitArray::new(), 128),
            Err(CryptoError::Corrupt(_))
        ));
    }

    #[test]
    fn adata_length_classes_roundtrip() {
        // exercise the 2-byte and marker+4-byte length encodings
        for alen in [1usize, 0xFEFF, 0xFF00] {
            let adata = bytes::to_bits(&vec![0xA5u8; alen]);
            let sealed = encrypt(&prf(), b"x".to_vec(), &iv13(), &adata, 128).unwrap();
            let back = decrypt(
                &prf(),
                sealed.ciphertext,
                &sealed.tag,
                &iv13(),
                &adata,
                128,
            )
            .unwrap();
            assert_eq!(back, b"x");
        }
    }
}
