//! Packed big-endian bit strings.
//!
//! `BitArray` is the currency accepted by every primitive in this toolkit.
//! Most primitives operate on 32-bit words internally, but many take inputs
//! that are not a multiple of 32 bits. A `BitArray` packs the bits
//! big-endian, 32 at a time, into a word vector and tracks the exact bit
//! length in a separate field, so the last word may be *partial*: it holds
//! `1..=32` meaningful high-order bits and its unused low-order bits are
//! kept zero. That masking invariant is what makes word-wise XOR and
//! comparison well defined without looking at the length twice.

use zeroize::Zeroize;

/// A bit string of arbitrary length, packed big-endian into 32-bit words.
///
/// Bits fill each word from the most-significant end; words are ordered
/// most-significant-first. Operations that truncate or shift take the array
/// by value and return it, so a caller can never observe a half-updated
/// array through a second handle.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct BitArray {
    words: Vec<u32>,
    bit_len: usize,
}

impl BitArray {
    /// The empty bit string.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an array from full 32-bit words.
    pub fn from_words(words: Vec<u32>) -> Self {
        let bit_len = words.len() * 32;
        Self { words, bit_len }
    }

    /// Builds an array from `words` holding exactly `bit_len` meaningful
    /// bits. Excess words are dropped and the unused low-order bits of the
    /// last word are cleared.
    pub fn from_words_partial(mut words: Vec<u32>, bit_len: usize) -> Self {
        words.truncate(bit_len.div_ceil(32));
        debug_assert!(words.len() * 32 >= bit_len);
        let mut a = Self { words, bit_len };
        a.mask_last();
        a
    }

    /// Packs the low `len` bits of `x` (1..=32) into a one-word array.
    ///
    /// `BitArray::partial(1, 0)` has the word `0x0000_0000` and
    /// `BitArray::partial(1, 1)` the word `0x8000_0000`.
    pub fn partial(len: usize, x: u32) -> Self {
        assert!((1..=32).contains(&len), "partial word length out of range");
        let word = if len == 32 { x } else { x << (32 - len) };
        Self::from_words_partial(vec![word], len)
    }

    /// Like [`BitArray::partial`], but `x` is already aligned to the
    /// high-order side of the word.
    pub fn partial_shifted(len: usize, x: u32) -> Self {
        assert!((1..=32).contains(&len), "partial word length out of range");
        Self::from_words_partial(vec![x], len)
    }

    /// Total number of meaningful bits.
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn is_empty(&self) -> bool {
        self.bit_len == 0
    }

    /// The packed words. The last one may be partial; its unused low-order
    /// bits are zero.
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Number of meaningful bits in the last word: `1..=32`, or 0 for the
    /// empty array. A full last word reports 32.
    pub fn last_word_bits(&self) -> usize {
        if self.bit_len == 0 {
            0
        } else {
            (self.bit_len - 1) % 32 + 1
        }
    }

    /// Bits `[start, end)` as a new array. An `end` past the array behaves
    /// like [`BitArray::bit_slice_from`].
    pub fn bit_slice(&self, start: usize, end: usize) -> BitArray {
        let end = end.min(self.bit_len);
        if start >= end {
            return BitArray::new();
        }
        self.covering_words(start, end).shift_left(start % 32).clamp(end - start)
    }

    /// Bits `[start, bit_len)` as a new array.
    pub fn bit_slice_from(&self, start: usize) -> BitArray {
        if start >= self.bit_len {
            return BitArray::new();
        }
        self.covering_words(start, self.bit_len).shift_left(start % 32)
    }

    /// The minimal word range covering `[start, end)`, still carrying the
    /// leading `start % 32` junk bits.
    fn covering_words(&self, start: usize, end: usize) -> BitArray {
        let w0 = start / 32;
        let w1 = end.div_ceil(32);
        BitArray {
            words: self.words[w0..w1].to_vec(),
            bit_len: self.bit_len.min(w1 * 32) - w0 * 32,
        }
    }

    /// Extracts up to 32 bits starting at `start`, spanning at most two
    /// words, returned right-aligned.
    pub fn extract(&self, start: usize, length: usize) -> u32 {
        debug_assert!(length <= 32, "extract reads at most 32 bits");
        if length == 0 {
            return 0;
        }
        let sh = ((32 - (start + length) % 32) % 32) as u32;
        let wi = start / 32;
        let x = if (start + length - 1) / 32 != wi {
            // crosses a word boundary; sh is nonzero here
            (self.word(wi) << (32 - sh)) | (self.word(wi + 1) >> sh)
        } else {
            self.word(wi) >> sh
        };
        if length == 32 {
            x
        } else {
            x & ((1u32 << length) - 1)
        }
    }

    fn word(&self, i: usize) -> u32 {
        self.words.get(i).copied().unwrap_or(0)
    }

    /// Bit-exact concatenation. Concatenating with an empty operand returns
    /// the other operand unchanged.
    pub fn concat(&self, other: &BitArray) -> BitArray {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }
        let k = self.last_word_bits();
        let mut words = self.words.clone();
        if k == 32 {
            words.extend_from_slice(&other.words);
        } else {
            // shift the second operand into the gap left by the partial word
            let gap = 32 - k;
            let mut idx = words.len() - 1;
            for &w in &other.words {
                words[idx] |= w >> k;
                words.push(w << gap);
                idx += 1;
            }
        }
        BitArray::from_words_partial(words, self.bit_len + other.bit_len)
    }

    /// Truncates to `len` bits. A `len` at or beyond the current length is
    /// a no-op.
    pub fn clamp(mut self, len: usize) -> BitArray {
        if len >= self.bit_len {
            return self;
        }
        self.bit_len = len;
        self.words.truncate(len.div_ceil(32));
        self.mask_last();
        self
    }

    /// Drops the first `shift` bits.
    pub fn shift_left(mut self, shift: usize) -> BitArray {
        if shift == 0 {
            return self;
        }
        if shift >= self.bit_len {
            return BitArray::new();
        }
        let drop_words = shift / 32;
        if drop_words > 0 {
            self.words.drain(..drop_words);
            self.bit_len -= drop_words * 32;
        }
        let s = shift % 32;
        if s > 0 {
            let n = self.words.len();
            for i in 0..n {
                let hi = self.words[i] << s;
                let lo = if i + 1 < n { self.words[i + 1] >> (32 - s) } else { 0 };
                self.words[i] = hi | lo;
            }
            self.bit_len -= s;
            self.words.truncate(self.bit_len.div_ceil(32));
            self.mask_last();
        }
        self
    }

    /// Compares content and length in constant time with respect to the
    /// content: the XOR of every word pair is accumulated with no early
    /// exit, so tag comparisons do not leak a mismatch position. Returns
    /// `false` (never an error) on any mismatch, including length.
    pub fn ct_eq(&self, other: &BitArray) -> bool {
        if self.bit_len != other.bit_len {
            return false;
        }
        let mut diff = 0u32;
        for (a, b) in self.words.iter().zip(other.words.iter()) {
            diff |= a ^ b;
        }
        diff == 0
    }

    /// Word-wise XOR of two arrays of equal bit length.
    pub fn xor(&self, other: &BitArray) -> BitArray {
        debug_assert_eq!(self.bit_len, other.bit_len, "xor requires equal lengths");
        BitArray {
            words: self
                .words
                .iter()
                .zip(other.words.iter())
                .map(|(a, b)| a ^ b)
                .collect(),
            bit_len: self.bit_len,
        }
    }

    /// Swaps the byte order of every word. Only meaningful when every word
    /// is full; a partial last word ends up misaligned (the little-endian
    /// conversions correct for this explicitly).
    pub fn byteswap(mut self) -> BitArray {
        for w in &mut self.words {
            *w = w.swap_bytes();
        }
        self
    }

    fn mask_last(&mut self) {
        let r = self.bit_len % 32;
        if r != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= !0u32 << (32 - r);
            }
        }
    }
}

impl std::fmt::Debug for BitArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BitArray[{} bits;", self.bit_len)?;
        for w in &self.words {
            write!(f, " {w:08x}")?;
        }
        write!(f, "]")
    }
}

impl Zeroize for BitArray {
    fn zeroize(&mut self) {
        self.words.zeroize();
        self.bit_len = 0;
    }
}

/// XOR of two 4-word blocks, the unit consumed by every 128-bit block
/// cipher call.
pub fn xor_block(x: &[u32; 4], y: &[u32; 4]) -> [u32; 4] {
    [x[0] ^ y[0], x[1] ^ y[1], x[2] ^ y[2], x[3] ^ y[3]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bits(s: &str) -> BitArray {
        // "1011" style helper, packing left to right
        let mut a = BitArray::new();
        for c in s.chars() {
            a = a.concat(&BitArray::partial(1, if c == '1' { 1 } else { 0 }));
        }
        a
    }

    #[test]
    fn partial_packs_single_bits() {
        assert_eq!(BitArray::partial(1, 0).words(), &[0x0000_0000]);
        assert_eq!(BitArray::partial(1, 1).words(), &[0x8000_0000]);
    }

    #[test]
    fn partial_roundtrips_length() {
        for len in 1..=32 {
            let a = BitArray::partial(len, 0xdead_beef);
            assert_eq!(a.last_word_bits(), len);
            assert_eq!(a.bit_len(), len);
        }
    }

    #[test]
    fn partial_masks_unused_bits() {
        let a = BitArray::partial(4, 0xff);
        assert_eq!(a.words(), &[0xf000_0000]);
        let b = BitArray::partial_shifted(4, 0xf234_5678);
        assert_eq!(b.words(), &[0xf000_0000]);
        assert_eq!(a, b);
    }

    #[test]
    fn concat_with_empty_is_identity() {
        let a = bits("10110");
        assert_eq!(a.concat(&BitArray::new()), a);
        assert_eq!(BitArray::new().concat(&a), a);
    }

    #[test]
    fn concat_shifts_into_partial_gap() {
        let a = BitArray::partial(8, 0xab);
        let b = BitArray::partial(8, 0xcd);
        let c = a.concat(&b);
        assert_eq!(c.bit_len(), 16);
        assert_eq!(c.words(), &[0xabcd_0000]);
    }

    #[test]
    fn concat_across_word_boundary() {
        let a = BitArray::partial(24, 0xaabbcc);
        let b = BitArray::from_words(vec![0x1122_3344]);
        let c = a.concat(&b);
        assert_eq!(c.bit_len(), 56);
        assert_eq!(c.words(), &[0xaabb_cc11, 0x2233_4400]);
    }

    #[test]
    fn slice_end_past_array_equals_open_slice() {
        let a = BitArray::from_words(vec![0x0123_4567, 0x89ab_cdef]);
        assert_eq!(a.bit_slice(8, 1_000_000), a.bit_slice_from(8));
    }

    #[test]
    fn slice_and_extract_agree() {
        let a = BitArray::from_words(vec![0x0123_4567, 0x89ab_cdef]);
        assert_eq!(a.extract(4, 16), 0x1234);
        assert_eq!(a.extract(28, 8), 0x78);
        assert_eq!(a.bit_slice(28, 36).words(), &[0x7800_0000]);
    }

    #[test]
    fn clamp_beyond_length_is_noop() {
        let a = bits("101");
        assert_eq!(a.clone().clamp(64), a);
    }

    #[test]
    fn clamp_to_word_multiple_keeps_full_last_word() {
        let a = BitArray::from_words(vec![1, 2, 3]);
        let c = a.clamp(64);
        assert_eq!(c.bit_len(), 64);
        assert_eq!(c.last_word_bits(), 32);
        assert_eq!(c.words(), &[1, 2]);
    }

    #[test]
    fn shift_left_drops_leading_bits() {
        let a = BitArray::from_words(vec![0x0123_4567, 0x89ab_cdef]);
        let s = a.shift_left(8);
        assert_eq!(s.bit_len(), 56);
        assert_eq!(s.words(), &[0x2345_6789, 0xabcd_ef00]);
    }

    #[test]
    fn ct_eq_checks_length_and_content() {
        let a = bits("1010");
        let b = bits("1010");
        let c = bits("1011");
        let d = bits("10100");
        assert!(a.ct_eq(&b));
        assert!(!a.ct_eq(&c));
        assert!(!a.ct_eq(&d), "same prefix, different length");
    }

    #[test]
    fn byteswap_swaps_each_word() {
        let a = BitArray::from_words(vec![0x0102_0304]).byteswap();
        assert_eq!(a.words(), &[0x0403_0201]);
    }

    proptest! {
        #[test]
        fn concat_length_algebra(a in arb_bits(), b in arb_bits()) {
            let c = a.concat(&b);
            prop_assert_eq!(c.bit_len(), a.bit_len() + b.bit_len());
        }

        #[test]
        fn slice_of_concat_recovers_operands(a in arb_bits(), b in arb_bits()) {
            let c = a.concat(&b);
            prop_assert_eq!(c.bit_slice(0, a.bit_len()), a.clone());
            prop_assert_eq!(c.bit_slice_from(a.bit_len()), b);
            prop_assert_eq!(c.bit_slice(0, c.bit_len()), c);
        }

        #[test]
        fn slice_then_extract_consistent(a in arb_bits(), start in 0usize..256, len in 1usize..=32) {
            prop_assume!(start + len <= a.bit_len());
            let x = a.extract(start, len);
            let s = a.bit_slice(start, start + len);
            prop_assert_eq!(s.bit_len(), len);
            prop_assert_eq!(s.extract(0, len), x);
        }
    }

    fn arb_bits() -> impl Strategy<Value = BitArray> {
        (proptest::collection::vec(any::<u32>(), 0..8), 0usize..=32).prop_map(|(words, cut)| {
            let total = words.len() * 32;
            let bit_len = total.saturating_sub(cut);
            BitArray::from_words_partial(words, bit_len)
        })
    }
}
