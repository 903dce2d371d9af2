use crate::{ByteSink, ByteSource, DecodeContext, Error, ErrorKind};

/// Longest string accepted by the i16 length prefixed string codec
pub const MAX_STRING_LEN: usize = i16::MAX as usize;

/// Map a signed integer onto an unsigned one so that values of small
/// magnitude stay small: 0, -1, 1, -2, 2 become 0, 1, 2, 3, 4.
///
/// ```rust
/// use tagsave::{zigzag_decode, zigzag_encode};
/// assert_eq!(zigzag_encode(-1), 1);
/// assert_eq!(zigzag_encode(1), 2);
/// assert_eq!(zigzag_decode(zigzag_encode(i64::MIN)), i64::MIN);
/// ```
#[inline]
pub fn zigzag_encode(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

/// Inverse of [zigzag_encode]
#[inline]
pub fn zigzag_decode(u: u64) -> i64 {
    ((u >> 1) as i64) ^ -((u & 1) as i64)
}

/// Number of bytes the LEB128 encoding of a value occupies
#[inline]
pub fn varint_len(v: u64) -> usize {
    let bits = 64 - (v | 1).leading_zeros() as usize;
    (bits + 6) / 7
}

/// Encoders for the primitive wire types, available on every [ByteSink]
///
/// Fixed width integers are big-endian. Nothing is returned: a failed sink
/// swallows writes and reports the failure when finished.
pub trait WriteExt: ByteSink {
    #[inline]
    fn write_u8(&mut self, v: u8) {
        self.write_byte(v)
    }

    #[inline]
    fn write_i8(&mut self, v: i8) {
        self.write_byte(v as u8)
    }

    #[inline]
    fn write_u16(&mut self, v: u16) {
        self.write(&v.to_be_bytes())
    }

    #[inline]
    fn write_i16(&mut self, v: i16) {
        self.write(&v.to_be_bytes())
    }

    #[inline]
    fn write_u32(&mut self, v: u32) {
        self.write(&v.to_be_bytes())
    }

    #[inline]
    fn write_i32(&mut self, v: i32) {
        self.write(&v.to_be_bytes())
    }

    /// LEB128: seven bits per byte, least significant group first, the top
    /// bit flags that another byte follows
    fn write_unsigned(&mut self, v: u64) {
        let mut buf = [0u8; 10];
        let mut len = 0;
        let mut v = v;
        loop {
            let byte = (v & 0x7f) as u8;
            v >>= 7;
            if v == 0 {
                buf[len] = byte;
                len += 1;
                break;
            }

            buf[len] = byte | 0x80;
            len += 1;
        }

        self.write(&buf[..len])
    }

    /// Zig-zag mapped then written as [WriteExt::write_unsigned]
    #[inline]
    fn write_signed(&mut self, v: i64) {
        self.write_unsigned(zigzag_encode(v))
    }

    /// IEEE-754 bits through the 4 byte codec
    #[inline]
    fn write_f32(&mut self, v: f32) {
        self.write_u32(v.to_bits())
    }

    #[inline]
    fn write_bool(&mut self, v: bool) {
        self.write_byte(u8::from(v))
    }

    /// An i16 length followed by the UTF-8 bytes
    ///
    /// # Panics
    ///
    /// If the string is longer than [MAX_STRING_LEN] bytes
    #[inline]
    fn write_string(&mut self, s: &str) {
        self.write_byte_string(s.as_bytes())
    }

    /// An i16 length followed by the bytes
    ///
    /// # Panics
    ///
    /// If the data is longer than [MAX_STRING_LEN] bytes
    fn write_byte_string(&mut self, data: &[u8]) {
        assert!(
            data.len() <= MAX_STRING_LEN,
            "string of {} bytes exceeds the {} byte limit",
            data.len(),
            MAX_STRING_LEN
        );
        self.write_i16(data.len() as i16);
        self.write(data)
    }

    /// An i32 length followed by the UTF-8 bytes, for text that can
    /// outgrow [WriteExt::write_string]
    ///
    /// # Panics
    ///
    /// If the string is longer than `i32::MAX` bytes
    fn write_string4(&mut self, s: &str) {
        let len = i32::try_from(s.len()).expect("string length must fit in an i32");
        self.write_i32(len);
        self.write(s.as_bytes())
    }
}

impl<T: ByteSink + ?Sized> WriteExt for T {}

/// Decoders for the primitive wire types, available on every [ByteSource]
pub trait ReadExt: ByteSource {
    #[inline]
    fn read_u8(&mut self) -> Result<u8, Error> {
        self.read_byte()
    }

    #[inline]
    fn read_i8(&mut self) -> Result<i8, Error> {
        self.read_byte().map(|x| x as i8)
    }

    #[inline]
    fn read_u16(&mut self) -> Result<u16, Error> {
        let mut buf = [0u8; 2];
        self.read_into(&mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    #[inline]
    fn read_i16(&mut self) -> Result<i16, Error> {
        let mut buf = [0u8; 2];
        self.read_into(&mut buf)?;
        Ok(i16::from_be_bytes(buf))
    }

    #[inline]
    fn read_u32(&mut self) -> Result<u32, Error> {
        let mut buf = [0u8; 4];
        self.read_into(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    #[inline]
    fn read_i32(&mut self) -> Result<i32, Error> {
        let mut buf = [0u8; 4];
        self.read_into(&mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }

    /// Inverse of [WriteExt::write_unsigned]. Fails once a value needs more
    /// than ten bytes.
    fn read_unsigned(&mut self) -> Result<u64, Error> {
        let offset = self.position();
        let mut result = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.read_byte()?;
            let bits = u64::from(byte & 0x7f);
            if shift >= 64 || (shift == 63 && bits > 1) {
                return Err(Error::new(ErrorKind::VarintOverflow { offset }));
            }

            result |= bits << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }

            shift += 7;
        }
    }

    #[inline]
    fn read_signed(&mut self) -> Result<i64, Error> {
        self.read_unsigned().map(zigzag_decode)
    }

    #[inline]
    fn read_f32(&mut self) -> Result<f32, Error> {
        self.read_u32().map(f32::from_bits)
    }

    /// Any non-zero byte is true
    #[inline]
    fn read_bool(&mut self) -> Result<bool, Error> {
        self.read_byte().map(|x| x != 0)
    }

    fn read_string(&mut self) -> Result<String, Error> {
        let offset = self.position();
        let data = self.read_byte_string()?;
        String::from_utf8(data).map_err(|_| Error::new(ErrorKind::InvalidString { offset }))
    }

    fn read_byte_string(&mut self) -> Result<Vec<u8>, Error> {
        let offset = self.position();
        let len = self.read_i16()?;
        if len < 0 {
            return Err(Error::new(ErrorKind::InvalidLength {
                offset,
                len: i64::from(len),
            }));
        }

        self.read_vec(len as usize)
    }

    fn read_string4(&mut self) -> Result<String, Error> {
        let offset = self.position();
        let len = self.read_i32()?;
        if len < 0 {
            return Err(Error::new(ErrorKind::InvalidLength {
                offset,
                len: i64::from(len),
            }));
        }

        let data = self.read_vec(len as usize)?;
        String::from_utf8(data).map_err(|_| Error::new(ErrorKind::InvalidString { offset }))
    }
}

impl<T: ByteSource + ?Sized> ReadExt for T {}

/// A value with a wire representation
pub trait Marshal {
    /// Append the value to the sink
    fn marshal<W: ByteSink + ?Sized>(&self, w: &mut W);
}

/// A value that can be decoded from its wire representation
///
/// The decode context carries the version of the data so that fields added
/// in later revisions can be skipped when reading older data.
pub trait Unmarshal: Sized {
    /// Decode a value from the source
    fn unmarshal<R: ByteSource + ?Sized>(r: &mut R, ctx: &DecodeContext) -> Result<Self, Error>;
}

impl<T: Marshal + ?Sized> Marshal for &'_ T {
    #[inline]
    fn marshal<W: ByteSink + ?Sized>(&self, w: &mut W) {
        (**self).marshal(w)
    }
}

impl<T: Marshal + ?Sized> Marshal for Box<T> {
    #[inline]
    fn marshal<W: ByteSink + ?Sized>(&self, w: &mut W) {
        (**self).marshal(w)
    }
}

impl<T: Unmarshal> Unmarshal for Box<T> {
    fn unmarshal<R: ByteSource + ?Sized>(r: &mut R, ctx: &DecodeContext) -> Result<Self, Error> {
        T::unmarshal(r, ctx).map(Box::new)
    }
}

macro_rules! fixed_codec {
    ($($ty:ty => $write:ident, $read:ident);* $(;)?) => {
        $(
            impl Marshal for $ty {
                #[inline]
                fn marshal<W: ByteSink + ?Sized>(&self, w: &mut W) {
                    w.$write(*self)
                }
            }

            impl Unmarshal for $ty {
                #[inline]
                fn unmarshal<R: ByteSource + ?Sized>(
                    r: &mut R,
                    _ctx: &DecodeContext,
                ) -> Result<Self, Error> {
                    r.$read()
                }
            }
        )*
    };
}

fixed_codec! {
    u8 => write_u8, read_u8;
    i8 => write_i8, read_i8;
    u16 => write_u16, read_u16;
    i16 => write_i16, read_i16;
    u32 => write_u32, read_u32;
    i32 => write_i32, read_i32;
    u64 => write_unsigned, read_unsigned;
    i64 => write_signed, read_signed;
    f32 => write_f32, read_f32;
    bool => write_bool, read_bool;
}

impl Marshal for str {
    #[inline]
    fn marshal<W: ByteSink + ?Sized>(&self, w: &mut W) {
        w.write_string(self)
    }
}

impl Marshal for String {
    #[inline]
    fn marshal<W: ByteSink + ?Sized>(&self, w: &mut W) {
        w.write_string(self)
    }
}

impl Unmarshal for String {
    #[inline]
    fn unmarshal<R: ByteSource + ?Sized>(r: &mut R, _ctx: &DecodeContext) -> Result<Self, Error> {
        r.read_string()
    }
}

/// A presence flag followed by the value when present
impl<T: Marshal> Marshal for Option<T> {
    fn marshal<W: ByteSink + ?Sized>(&self, w: &mut W) {
        match self {
            Some(x) => {
                w.write_bool(true);
                x.marshal(w);
            }
            None => w.write_bool(false),
        }
    }
}

impl<T: Unmarshal> Unmarshal for Option<T> {
    fn unmarshal<R: ByteSource + ?Sized>(r: &mut R, ctx: &DecodeContext) -> Result<Self, Error> {
        if r.read_bool()? {
            T::unmarshal(r, ctx).map(Some)
        } else {
            Ok(None)
        }
    }
}

impl<A: Marshal, B: Marshal> Marshal for (A, B) {
    fn marshal<W: ByteSink + ?Sized>(&self, w: &mut W) {
        self.0.marshal(w);
        self.1.marshal(w);
    }
}

impl<A: Unmarshal, B: Unmarshal> Unmarshal for (A, B) {
    fn unmarshal<R: ByteSource + ?Sized>(r: &mut R, ctx: &DecodeContext) -> Result<Self, Error> {
        let a = A::unmarshal(r, ctx)?;
        let b = B::unmarshal(r, ctx)?;
        Ok((a, b))
    }
}

/// Field codec writing an unsigned integer as a varint instead of its fixed
/// width encoding. Meant for `#[tagsave(with = "tagsave::varint")]`.
pub mod varint {
    use crate::{ByteSink, ByteSource, DecodeContext, Error, ErrorKind, ReadExt, WriteExt};

    pub fn marshal<W, T>(value: &T, w: &mut W)
    where
        W: ByteSink + ?Sized,
        T: Copy + Into<u64>,
    {
        w.write_unsigned((*value).into())
    }

    pub fn unmarshal<R, T>(r: &mut R, _ctx: &DecodeContext) -> Result<T, Error>
    where
        R: ByteSource + ?Sized,
        T: TryFrom<u64>,
    {
        let offset = r.position();
        let value = r.read_unsigned()?;
        T::try_from(value).map_err(|_| Error::new(ErrorKind::VarintOverflow { offset }))
    }
}

/// Field codec writing a signed integer as a zig-zag varint. Meant for
/// `#[tagsave(with = "tagsave::signed_varint")]`.
pub mod signed_varint {
    use crate::{ByteSink, ByteSource, DecodeContext, Error, ErrorKind, ReadExt, WriteExt};

    pub fn marshal<W, T>(value: &T, w: &mut W)
    where
        W: ByteSink + ?Sized,
        T: Copy + Into<i64>,
    {
        w.write_signed((*value).into())
    }

    pub fn unmarshal<R, T>(r: &mut R, _ctx: &DecodeContext) -> Result<T, Error>
    where
        R: ByteSource + ?Sized,
        T: TryFrom<i64>,
    {
        let offset = r.position();
        let value = r.read_signed()?;
        T::try_from(value).map_err(|_| Error::new(ErrorKind::VarintOverflow { offset }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemorySink, SliceSource};
    use quickcheck_macros::quickcheck;
    use rstest::*;

    fn encode(f: impl FnOnce(&mut MemorySink)) -> Vec<u8> {
        let mut sink = MemorySink::new();
        f(&mut sink);
        sink.into_inner()
    }

    #[test]
    fn test_fixed_width_is_big_endian() {
        assert_eq!(encode(|w| w.write_u16(0x0102)), vec![0x01, 0x02]);
        assert_eq!(encode(|w| w.write_i16(i16::MIN)), vec![0x80, 0x00]);
        assert_eq!(encode(|w| w.write_i32(-2)), vec![0xff, 0xff, 0xff, 0xfe]);
        assert_eq!(
            encode(|w| w.write_u32(0xdead_beef)),
            vec![0xde, 0xad, 0xbe, 0xef]
        );
        assert_eq!(encode(|w| w.write_i8(-1)), vec![0xff]);
    }

    #[rstest]
    #[case(0, &[0x00])]
    #[case(1, &[0x01])]
    #[case(127, &[0x7f])]
    #[case(128, &[0x80, 0x01])]
    #[case(300, &[0xac, 0x02])]
    #[case(16383, &[0xff, 0x7f])]
    #[case(16384, &[0x80, 0x80, 0x01])]
    #[case(u64::MAX, &[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01])]
    fn test_unsigned_encoding(#[case] value: u64, #[case] expected: &[u8]) {
        let data = encode(|w| w.write_unsigned(value));
        assert_eq!(data.as_slice(), expected);
        assert_eq!(varint_len(value), expected.len());

        let mut source = SliceSource::new(&data);
        assert_eq!(source.read_unsigned().unwrap(), value);
        assert_eq!(source.remaining(), 0);
    }

    #[rstest]
    #[case(0, &[0x00])]
    #[case(-1, &[0x01])]
    #[case(1, &[0x02])]
    #[case(-64, &[0x7f])]
    #[case(64, &[0x80, 0x01])]
    fn test_signed_encoding(#[case] value: i64, #[case] expected: &[u8]) {
        let data = encode(|w| w.write_signed(value));
        assert_eq!(data.as_slice(), expected);
        assert_eq!(SliceSource::new(&data).read_signed().unwrap(), value);
    }

    #[rstest]
    #[case(i64::MIN)]
    #[case(i64::MAX)]
    #[case(i64::MIN + 1)]
    fn test_signed_extremes(#[case] value: i64) {
        let data = encode(|w| w.write_signed(value));
        assert_eq!(data.len(), 10);
        assert_eq!(SliceSource::new(&data).read_signed().unwrap(), value);
    }

    #[test]
    fn test_varint_overflow() {
        let data = [0xff; 11];
        let err = SliceSource::new(&data).read_unsigned().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::VarintOverflow { offset: 0 }));

        // ten bytes, but the last one carries bits past 64
        let mut data = vec![0xff; 9];
        data.push(0x02);
        let err = SliceSource::new(&data).read_unsigned().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::VarintOverflow { .. }));
    }

    #[test]
    fn test_truncated_varint() {
        let err = SliceSource::new(&[0x80, 0x80]).read_unsigned().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::ShortRead { offset: 2, .. }));
    }

    #[rstest]
    #[case(1.0, [0x3f, 0x80, 0x00, 0x00])]
    #[case(-2.0, [0xc0, 0x00, 0x00, 0x00])]
    #[case(0.5, [0x3f, 0x00, 0x00, 0x00])]
    #[case(f32::INFINITY, [0x7f, 0x80, 0x00, 0x00])]
    fn test_f32_bit_pattern(#[case] value: f32, #[case] expected: [u8; 4]) {
        let data = encode(|w| w.write_f32(value));
        assert_eq!(data, expected);
        assert_eq!(SliceSource::new(&data).read_f32().unwrap(), value);
    }

    #[test]
    fn test_f32_nan_bits_survive() {
        let nan = f32::from_bits(0x7fc0_0001);
        let data = encode(|w| w.write_f32(nan));
        let back = SliceSource::new(&data).read_f32().unwrap();
        assert_eq!(back.to_bits(), nan.to_bits());
    }

    #[test]
    fn test_bool_accepts_any_nonzero() {
        let mut source = SliceSource::new(&[0, 1, 7]);
        assert!(!source.read_bool().unwrap());
        assert!(source.read_bool().unwrap());
        assert!(source.read_bool().unwrap());
    }

    #[test]
    fn test_empty_string() {
        let data = encode(|w| w.write_string(""));
        assert_eq!(data, vec![0, 0]);
        assert_eq!(SliceSource::new(&data).read_string().unwrap(), "");
    }

    #[test]
    fn test_max_length_string() {
        let s = "x".repeat(MAX_STRING_LEN);
        let data = encode(|w| w.write_string(&s));
        assert_eq!(&data[..2], &[0x7f, 0xff]);
        assert_eq!(data.len(), MAX_STRING_LEN + 2);
        assert_eq!(SliceSource::new(&data).read_string().unwrap(), s);
    }

    #[test]
    #[should_panic]
    fn test_string_too_long() {
        let s = "x".repeat(MAX_STRING_LEN + 1);
        encode(|w| w.write_string(&s));
    }

    #[test]
    fn test_negative_string_length() {
        let err = SliceSource::new(&[0xff, 0xff]).read_string().unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::InvalidLength { offset: 0, len: -1 }
        ));
    }

    #[test]
    fn test_invalid_utf8() {
        let err = SliceSource::new(&[0x00, 0x02, 0xc3, 0x28])
            .read_string()
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidString { offset: 0 }));

        let data = SliceSource::new(&[0x00, 0x02, 0xc3, 0x28])
            .read_byte_string()
            .unwrap();
        assert_eq!(data, vec![0xc3, 0x28]);
    }

    #[test]
    fn test_string4() {
        let data = encode(|w| w.write_string4("tiles"));
        assert_eq!(&data[..4], &[0, 0, 0, 5]);
        assert_eq!(SliceSource::new(&data).read_string4().unwrap(), "tiles");
    }

    #[test]
    fn test_option_codec() {
        let ctx = DecodeContext::current();
        let data = encode(|w| {
            Some(5i16).marshal(w);
            None::<i16>.marshal(w);
        });
        assert_eq!(data, vec![1, 0, 5, 0]);

        let mut source = SliceSource::new(&data);
        assert_eq!(Option::<i16>::unmarshal(&mut source, &ctx).unwrap(), Some(5));
        assert_eq!(Option::<i16>::unmarshal(&mut source, &ctx).unwrap(), None);
    }

    #[test]
    fn test_varint_field_codec_narrows() {
        let ctx = DecodeContext::current();
        let data = encode(|w| varint::marshal(&70000u32, w));
        let value: u32 = varint::unmarshal(&mut SliceSource::new(&data), &ctx).unwrap();
        assert_eq!(value, 70000);

        let err = varint::unmarshal::<_, u16>(&mut SliceSource::new(&data), &ctx).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::VarintOverflow { .. }));

        let data = encode(|w| signed_varint::marshal(&-3i16, w));
        assert_eq!(data, vec![5]);
        let value: i16 = signed_varint::unmarshal(&mut SliceSource::new(&data), &ctx).unwrap();
        assert_eq!(value, -3);
    }

    #[quickcheck]
    fn zigzag_roundtrip(v: i64) -> bool {
        zigzag_decode(zigzag_encode(v)) == v
    }

    #[quickcheck]
    fn small_magnitudes_are_compact(v: i8) -> bool {
        let v = i64::from(v) / 2;
        encode(|w| w.write_signed(v)).len() == 1
    }

    #[quickcheck]
    fn unsigned_roundtrip(v: u64) -> bool {
        let data = encode(|w| w.write_unsigned(v));
        data.len() == varint_len(v) && SliceSource::new(&data).read_unsigned().unwrap() == v
    }

    #[quickcheck]
    fn string_roundtrip(s: String) -> bool {
        if s.len() > MAX_STRING_LEN {
            return true;
        }

        let data = encode(|w| w.write_string(&s));
        SliceSource::new(&data).read_string().unwrap() == s
    }
}
