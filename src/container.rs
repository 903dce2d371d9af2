//! Sequences, maps, and sets: an i32 element count followed by the
//! elements.
//!
//! ```rust
//! use tagsave::{container, DecodeContext, MemorySink, SliceSource};
//!
//! let mut sink = MemorySink::new();
//! container::marshal_seq(&mut sink, &[1i16, 2, 3]);
//! assert_eq!(sink.as_slice(), &[0, 0, 0, 3, 0, 1, 0, 2, 0, 3]);
//!
//! let ctx = DecodeContext::current();
//! let data: Vec<i16> = container::unmarshal_vec(&mut SliceSource::new(sink.as_slice()), &ctx)?;
//! assert_eq!(data, vec![1, 2, 3]);
//! # Ok::<(), tagsave::Error>(())
//! ```

use crate::{
    ByteSink, ByteSource, DecodeContext, Error, ErrorKind, Marshal, ReadExt, Unmarshal, WriteExt,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::{BuildHasher, Hash};

/// Upper bound on elements reserved ahead of decoding. A corrupted count
/// then fails with a short read long before memory runs out.
const MAX_PREALLOC: usize = 4096;

/// Write an element count
///
/// # Panics
///
/// If the count does not fit in an i32
#[inline]
pub fn write_count<W: ByteSink + ?Sized>(w: &mut W, len: usize) {
    let len = i32::try_from(len).expect("container has more than i32::MAX elements");
    w.write_i32(len)
}

/// Read an element count, rejecting negative values
#[inline]
pub fn read_count<R: ByteSource + ?Sized>(r: &mut R) -> Result<usize, Error> {
    let offset = r.position();
    let len = r.read_i32()?;
    usize::try_from(len).map_err(|_| {
        Error::new(ErrorKind::InvalidLength {
            offset,
            len: i64::from(len),
        })
    })
}

/// Write a slice as a sequence
pub fn marshal_seq<W, T>(w: &mut W, items: &[T])
where
    W: ByteSink + ?Sized,
    T: Marshal,
{
    marshal_iter(w, items)
}

/// Write the elements of an iterator of known length as a sequence
pub fn marshal_iter<W, I>(w: &mut W, items: I)
where
    W: ByteSink + ?Sized,
    I: IntoIterator,
    I::IntoIter: ExactSizeIterator,
    I::Item: Marshal,
{
    let iter = items.into_iter();
    write_count(w, iter.len());
    for item in iter {
        item.marshal(w);
    }
}

/// Write a sequence whose elements are encoded by a closure
pub fn marshal_seq_with<W, T, F>(w: &mut W, items: &[T], mut f: F)
where
    W: ByteSink + ?Sized,
    F: FnMut(&mut W, &T),
{
    write_count(w, items.len());
    for item in items {
        f(w, item);
    }
}

/// Read a sequence into a new vector
pub fn unmarshal_vec<R, T>(r: &mut R, ctx: &DecodeContext) -> Result<Vec<T>, Error>
where
    R: ByteSource + ?Sized,
    T: Unmarshal,
{
    unmarshal_vec_with(r, |r| T::unmarshal(r, ctx))
}

/// Read a sequence into an existing vector, replacing its contents
pub fn unmarshal_vec_into<R, T>(r: &mut R, ctx: &DecodeContext, out: &mut Vec<T>) -> Result<(), Error>
where
    R: ByteSource + ?Sized,
    T: Unmarshal,
{
    out.clear();
    let len = read_count(r)?;
    out.reserve(len.min(MAX_PREALLOC));
    for _ in 0..len {
        out.push(T::unmarshal(r, ctx)?);
    }
    Ok(())
}

/// Read a sequence whose elements are decoded by a closure
pub fn unmarshal_vec_with<R, T, F>(r: &mut R, mut f: F) -> Result<Vec<T>, Error>
where
    R: ByteSource + ?Sized,
    F: FnMut(&mut R) -> Result<T, Error>,
{
    let len = read_count(r)?;
    let mut out = Vec::with_capacity(len.min(MAX_PREALLOC));
    for _ in 0..len {
        out.push(f(r)?);
    }
    Ok(out)
}

/// Write key value pairs as a map
pub fn marshal_map<'a, W, K, V, I>(w: &mut W, entries: I)
where
    W: ByteSink + ?Sized,
    K: Marshal + 'a,
    V: Marshal + 'a,
    I: IntoIterator<Item = (&'a K, &'a V)>,
    I::IntoIter: ExactSizeIterator,
{
    let iter = entries.into_iter();
    write_count(w, iter.len());
    for (k, v) in iter {
        k.marshal(w);
        v.marshal(w);
    }
}

/// Read a map into any collection of pairs. When a key repeats, the
/// destination's `Extend` decides and for the standard maps the last value
/// wins.
///
/// The standard maps also extend from borrowed pairs, so name the key and
/// value types when calling this directly:
/// `unmarshal_map::<_, u16, i32, BTreeMap<_, _>>(r, ctx)`.
pub fn unmarshal_map<R, K, V, M>(r: &mut R, ctx: &DecodeContext) -> Result<M, Error>
where
    R: ByteSource + ?Sized,
    K: Unmarshal,
    V: Unmarshal,
    M: Default + Extend<(K, V)>,
{
    let len = read_count(r)?;
    let mut out = M::default();
    for _ in 0..len {
        let k = K::unmarshal(r, ctx)?;
        let v = V::unmarshal(r, ctx)?;
        out.extend(std::iter::once((k, v)));
    }
    Ok(out)
}

/// Write the elements of a set
pub fn marshal_set<'a, W, T, I>(w: &mut W, items: I)
where
    W: ByteSink + ?Sized,
    T: Marshal + 'a,
    I: IntoIterator<Item = &'a T>,
    I::IntoIter: ExactSizeIterator,
{
    marshal_iter(w, items)
}

/// Read elements into a set. Duplicates collapse.
pub fn unmarshal_set<R, T, S>(r: &mut R, ctx: &DecodeContext) -> Result<S, Error>
where
    R: ByteSource + ?Sized,
    T: Unmarshal,
    S: Default + Extend<T>,
{
    let len = read_count(r)?;
    let mut out = S::default();
    for _ in 0..len {
        out.extend(std::iter::once(T::unmarshal(r, ctx)?));
    }
    Ok(out)
}

impl<T: Marshal> Marshal for [T] {
    fn marshal<W: ByteSink + ?Sized>(&self, w: &mut W) {
        marshal_seq(w, self)
    }
}

impl<T: Marshal> Marshal for Vec<T> {
    fn marshal<W: ByteSink + ?Sized>(&self, w: &mut W) {
        marshal_seq(w, self)
    }
}

impl<T: Unmarshal> Unmarshal for Vec<T> {
    fn unmarshal<R: ByteSource + ?Sized>(r: &mut R, ctx: &DecodeContext) -> Result<Self, Error> {
        unmarshal_vec(r, ctx)
    }
}

impl<T: Marshal> Marshal for VecDeque<T> {
    fn marshal<W: ByteSink + ?Sized>(&self, w: &mut W) {
        marshal_iter(w, self)
    }
}

impl<T: Unmarshal> Unmarshal for VecDeque<T> {
    fn unmarshal<R: ByteSource + ?Sized>(r: &mut R, ctx: &DecodeContext) -> Result<Self, Error> {
        unmarshal_vec(r, ctx).map(VecDeque::from)
    }
}

impl<K: Marshal, V: Marshal> Marshal for BTreeMap<K, V> {
    fn marshal<W: ByteSink + ?Sized>(&self, w: &mut W) {
        marshal_map(w, self)
    }
}

impl<K: Unmarshal + Ord, V: Unmarshal> Unmarshal for BTreeMap<K, V> {
    fn unmarshal<R: ByteSource + ?Sized>(r: &mut R, ctx: &DecodeContext) -> Result<Self, Error> {
        unmarshal_map::<_, K, V, _>(r, ctx)
    }
}

impl<K: Marshal, V: Marshal, S> Marshal for HashMap<K, V, S> {
    fn marshal<W: ByteSink + ?Sized>(&self, w: &mut W) {
        marshal_map(w, self)
    }
}

impl<K, V, S> Unmarshal for HashMap<K, V, S>
where
    K: Unmarshal + Eq + Hash,
    V: Unmarshal,
    S: BuildHasher + Default,
{
    fn unmarshal<R: ByteSource + ?Sized>(r: &mut R, ctx: &DecodeContext) -> Result<Self, Error> {
        unmarshal_map::<_, K, V, _>(r, ctx)
    }
}

impl<T: Marshal> Marshal for BTreeSet<T> {
    fn marshal<W: ByteSink + ?Sized>(&self, w: &mut W) {
        marshal_set(w, self)
    }
}

impl<T: Unmarshal + Ord> Unmarshal for BTreeSet<T> {
    fn unmarshal<R: ByteSource + ?Sized>(r: &mut R, ctx: &DecodeContext) -> Result<Self, Error> {
        unmarshal_set::<_, T, _>(r, ctx)
    }
}

impl<T: Marshal, S> Marshal for HashSet<T, S> {
    fn marshal<W: ByteSink + ?Sized>(&self, w: &mut W) {
        marshal_set(w, self)
    }
}

impl<T, S> Unmarshal for HashSet<T, S>
where
    T: Unmarshal + Eq + Hash,
    S: BuildHasher + Default,
{
    fn unmarshal<R: ByteSource + ?Sized>(r: &mut R, ctx: &DecodeContext) -> Result<Self, Error> {
        unmarshal_set::<_, T, _>(r, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemorySink, SliceSource};
    use quickcheck_macros::quickcheck;

    fn encode<T: Marshal + ?Sized>(value: &T) -> Vec<u8> {
        let mut sink = MemorySink::new();
        value.marshal(&mut sink);
        sink.into_inner()
    }

    fn decode<T: Unmarshal>(data: &[u8]) -> T {
        let ctx = DecodeContext::current();
        let mut source = SliceSource::new(data);
        let result = T::unmarshal(&mut source, &ctx).unwrap();
        assert_eq!(source.remaining(), 0);
        result
    }

    #[test]
    fn test_empty_sequence() {
        let data = encode(&Vec::<i32>::new());
        assert_eq!(data, vec![0, 0, 0, 0]);
        assert!(decode::<Vec<i32>>(&data).is_empty());
    }

    #[test]
    fn test_negative_count() {
        let ctx = DecodeContext::current();
        let data = [0xff, 0xff, 0xff, 0xfe];
        let err = unmarshal_vec::<_, u8>(&mut SliceSource::new(&data), &ctx).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::InvalidLength { offset: 0, len: -2 }
        ));
    }

    #[test]
    fn test_huge_count_is_a_short_read() {
        let ctx = DecodeContext::current();
        let data = [0x7f, 0xff, 0xff, 0xff, 0x01];
        let err = unmarshal_vec::<_, u8>(&mut SliceSource::new(&data), &ctx).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::ShortRead { offset: 5, .. }));
    }

    #[test]
    fn test_unmarshal_into_replaces_contents() {
        let ctx = DecodeContext::current();
        let data = encode(&vec![7u8, 8]);
        let mut out = vec![1u8, 2, 3];
        unmarshal_vec_into(&mut SliceSource::new(&data), &ctx, &mut out).unwrap();
        assert_eq!(out, vec![7, 8]);
    }

    #[test]
    fn test_duplicate_keys_last_wins() {
        let mut sink = MemorySink::new();
        write_count(&mut sink, 2);
        sink.write_u8(1);
        sink.write_string("first");
        sink.write_u8(1);
        sink.write_string("second");

        let map: BTreeMap<u8, String> = decode(sink.as_slice());
        assert_eq!(map.len(), 1);
        assert_eq!(map[&1], "second");

        let map: HashMap<u8, String> = decode(sink.as_slice());
        assert_eq!(map[&1], "second");
    }

    #[test]
    fn test_set_collapses_duplicates() {
        let data = encode(&vec![3i16, 1, 3]);
        let set: BTreeSet<i16> = decode(&data);
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_closure_codecs() {
        let mut sink = MemorySink::new();
        marshal_seq_with(&mut sink, &[300u64, 1], |w, x| w.write_unsigned(*x));
        assert_eq!(sink.as_slice(), &[0, 0, 0, 2, 0xac, 0x02, 0x01]);

        let mut source = SliceSource::new(sink.as_slice());
        let out = unmarshal_vec_with(&mut source, |r| r.read_unsigned()).unwrap();
        assert_eq!(out, vec![300, 1]);
    }

    #[quickcheck]
    fn map_roundtrip_ignores_insertion_order(entries: Vec<(i32, String)>) -> bool {
        let entries: Vec<_> = entries.into_iter().filter(|(_, v)| v.len() < 512).collect();
        let forward: HashMap<i32, String> = entries.iter().cloned().collect();
        let backward: HashMap<i32, String> = entries.iter().rev().cloned().collect();

        let a: BTreeMap<i32, String> = decode(&encode(&forward));
        let b: BTreeMap<i32, String> = decode(&encode(&backward));
        let expected: BTreeMap<i32, String> = forward.into_iter().collect();
        a == expected && b == backward.into_iter().collect::<BTreeMap<_, _>>()
    }

    #[quickcheck]
    fn nested_roundtrip(data: Vec<Vec<i16>>) -> bool {
        decode::<Vec<Vec<i16>>>(&encode(&data)) == data
    }

    #[quickcheck]
    fn set_roundtrip(data: HashSet<u32>) -> bool {
        decode::<HashSet<u32>>(&encode(&data)) == data
    }
}
