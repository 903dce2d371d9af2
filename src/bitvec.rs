use crate::{ByteSink, ByteSource, DecodeContext, Error, Marshal, ReadExt, Unmarshal, WriteExt};
use std::fmt;

/// A set of `N` bits
///
/// The wire format favors sets where only the low bits are populated: seven
/// bits per byte, lowest first, with the top bit marking the final byte.
/// Nothing is written past the byte holding the highest set bit, so a set
/// that grows in a later build still decodes in an older one and the other
/// way around.
///
/// ```rust
/// use tagsave::{FixedBitVector, MemorySink, Marshal};
/// let mut runes = FixedBitVector::<64>::new();
/// runes.set(1, true);
/// runes.set(9, true);
///
/// let mut sink = MemorySink::new();
/// runes.marshal(&mut sink);
/// assert_eq!(sink.as_slice(), &[0b0000_0010, 0x80 | 0b0000_0100]);
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FixedBitVector<const N: usize> {
    words: Vec<u64>,
}

impl<const N: usize> FixedBitVector<N> {
    /// A set with every bit cleared
    pub fn new() -> Self {
        FixedBitVector {
            words: vec![0; (N + 63) / 64],
        }
    }

    /// Number of bits in the set
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Whether the bit is set. Bits past the end are never set.
    #[inline]
    pub fn get(&self, index: usize) -> bool {
        index < N && self.words[index / 64] & (1 << (index % 64)) != 0
    }

    /// Set or clear a bit
    ///
    /// # Panics
    ///
    /// If the index is not below `N`
    #[inline]
    pub fn set(&mut self, index: usize, value: bool) {
        assert!(index < N, "bit {} out of range for {} bits", index, N);
        let mask = 1u64 << (index % 64);
        if value {
            self.words[index / 64] |= mask;
        } else {
            self.words[index / 64] &= !mask;
        }
    }

    /// Clear every bit
    pub fn reset(&mut self) {
        self.words.iter_mut().for_each(|x| *x = 0);
    }

    /// Number of set bits
    pub fn count(&self) -> usize {
        self.words.iter().map(|x| x.count_ones() as usize).sum()
    }

    /// Whether any bit is set
    pub fn any(&self) -> bool {
        self.words.iter().any(|&x| x != 0)
    }

    /// Index of the highest set bit
    pub fn last_set(&self) -> Option<usize> {
        self.words
            .iter()
            .enumerate()
            .rev()
            .find(|(_, w)| **w != 0)
            .map(|(i, w)| i * 64 + 63 - w.leading_zeros() as usize)
    }

    /// Indices of the set bits in ascending order
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        (0..N).filter(move |&i| self.get(i))
    }
}

impl<const N: usize> Default for FixedBitVector<N> {
    fn default() -> Self {
        FixedBitVector::new()
    }
}

impl<const N: usize> fmt::Debug for FixedBitVector<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter_ones()).finish()
    }
}

impl<const N: usize> FromIterator<usize> for FixedBitVector<N> {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut result = FixedBitVector::new();
        for i in iter {
            result.set(i, true);
        }
        result
    }
}

impl<const N: usize> Marshal for FixedBitVector<N> {
    fn marshal<W: ByteSink + ?Sized>(&self, w: &mut W) {
        let last = self.last_set().unwrap_or(0);
        let bytes = last / 7 + 1;
        for chunk in 0..bytes {
            let mut byte = 0u8;
            for j in 0..7 {
                if self.get(chunk * 7 + j) {
                    byte |= 1 << j;
                }
            }

            if chunk + 1 == bytes {
                byte |= 0x80;
            }
            w.write_u8(byte);
        }
    }
}

impl<const N: usize> Unmarshal for FixedBitVector<N> {
    fn unmarshal<R: ByteSource + ?Sized>(r: &mut R, _ctx: &DecodeContext) -> Result<Self, Error> {
        let mut result = FixedBitVector::new();
        let mut i = 0;
        loop {
            let byte = r.read_u8()?;
            for j in 0..7 {
                if i < N {
                    result.set(i, byte & (1 << j) != 0);
                    i += 1;
                }
            }

            if byte & 0x80 != 0 {
                return Ok(result);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemorySink, SliceSource};
    use quickcheck_macros::quickcheck;

    fn encode<const N: usize>(bits: &FixedBitVector<N>) -> Vec<u8> {
        let mut sink = MemorySink::new();
        bits.marshal(&mut sink);
        sink.into_inner()
    }

    fn decode<const N: usize>(data: &[u8]) -> FixedBitVector<N> {
        let ctx = DecodeContext::current();
        let mut source = SliceSource::new(data);
        let result = FixedBitVector::unmarshal(&mut source, &ctx).unwrap();
        assert_eq!(source.remaining(), 0);
        result
    }

    #[test]
    fn test_empty_vector() {
        let bits = FixedBitVector::<100>::new();
        assert_eq!(encode(&bits), vec![0x80]);
        assert_eq!(decode::<100>(&[0x80]), bits);
    }

    #[test]
    fn test_last_bit_only() {
        let bits: FixedBitVector<100> = [99].into_iter().collect();
        let data = encode(&bits);
        assert_eq!(data.len(), 15);
        assert_eq!(data[14], 0x80 | 1 << (99 % 7));
        assert!(data[..14].iter().all(|&x| x == 0));
        assert_eq!(decode::<100>(&data), bits);
    }

    #[test]
    fn test_bit_on_byte_boundary() {
        let bits: FixedBitVector<16> = [6, 7].into_iter().collect();
        assert_eq!(encode(&bits), vec![0x40, 0x81]);
    }

    #[test]
    fn test_wider_writer_narrower_reader() {
        let bits: FixedBitVector<32> = [2, 20].into_iter().collect();
        let narrow = decode::<8>(&encode(&bits));
        assert_eq!(narrow.iter_ones().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_zero_sized_vector() {
        let bits = FixedBitVector::<0>::new();
        assert_eq!(encode(&bits), vec![0x80]);
        assert_eq!(decode::<0>(&[0x80]), bits);
    }

    #[test]
    fn test_truncated_vector() {
        let ctx = DecodeContext::current();
        let err = FixedBitVector::<32>::unmarshal(&mut SliceSource::new(&[0x01]), &ctx);
        assert!(err.is_err());
    }

    #[quickcheck]
    fn bitvec_roundtrip(indices: Vec<u8>) -> bool {
        let bits: FixedBitVector<256> = indices.iter().map(|&x| usize::from(x)).collect();
        let data = encode(&bits);
        let expected_len = bits.last_set().unwrap_or(0) / 7 + 1;
        data.len() == expected_len && decode::<256>(&data) == bits
    }
}
