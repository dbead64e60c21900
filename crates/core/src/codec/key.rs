//! Order-preserving key encoding
//!
//! # Format
//!
//! | Type | Encoding |
//! |------|----------|
//! | `u8`..`u128` | big-endian, fixed width |
//! | `i8`..`i128` | sign bit flipped, then big-endian |
//! | `bool` | one byte, `0x00` / `0x01` |
//! | `String`, `Vec<u8>` | bytes with `0x00` escaped as `0x00 0xFF`, terminated by `0x00 0x01` |
//! | `Option<T>` | `0x00` for `None`, `0x01` followed by `T` |
//! | tuples | components concatenated in order |
//!
//! Every encoding is self-delimiting, so composite keys decode without
//! length prefixes and a key prefix can be decoded from a longer entry key.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{CodecError, CodecResult};

const ESCAPE: u8 = 0x00;
const ESCAPED_ZERO: u8 = 0xFF;
const TERMINATOR: u8 = 0x01;

/// Types that can be written as an order-preserving key.
pub trait KeyEncode {
    /// Append the encoding of `self` to `out`.
    fn encode_key(&self, out: &mut Vec<u8>);
}

/// Types that can be read back from an order-preserving key.
pub trait KeyDecode: Sized {
    /// Decode one value from the front of `input`, advancing it.
    fn decode_key(input: &mut &[u8]) -> CodecResult<Self>;
}

/// Encode a key into a fresh buffer.
pub fn pack_key<K: KeyEncode + ?Sized>(key: &K) -> Vec<u8> {
    let mut out = Vec::new();
    key.encode_key(&mut out);
    out
}

/// Decode a key that must span all of `bytes`.
pub fn unpack_key<K: KeyDecode>(bytes: &[u8]) -> CodecResult<K> {
    let mut input = bytes;
    let key = K::decode_key(&mut input)?;
    if !input.is_empty() {
        return Err(CodecError::TrailingBytes(input.len()));
    }
    Ok(key)
}

/// Decode a key from the front of `bytes`, ignoring whatever follows.
///
/// Non-unique secondary entries are stored as `pack(key) ++ pack(id)`;
/// this reads back the logical key.
pub fn unpack_key_prefix<K: KeyDecode>(bytes: &[u8]) -> CodecResult<K> {
    let mut input = bytes;
    K::decode_key(&mut input)
}

fn take<'a>(input: &mut &'a [u8], n: usize) -> CodecResult<&'a [u8]> {
    if input.len() < n {
        return Err(CodecError::UnexpectedEof {
            needed: n - input.len(),
        });
    }
    let (head, rest) = input.split_at(n);
    *input = rest;
    Ok(head)
}

fn take_byte(input: &mut &[u8]) -> CodecResult<u8> {
    Ok(take(input, 1)?[0])
}

// =============================================================================
// Integers
// =============================================================================

impl KeyEncode for u8 {
    fn encode_key(&self, out: &mut Vec<u8>) {
        out.push(*self);
    }
}

impl KeyDecode for u8 {
    fn decode_key(input: &mut &[u8]) -> CodecResult<Self> {
        take_byte(input)
    }
}

impl KeyEncode for i8 {
    fn encode_key(&self, out: &mut Vec<u8>) {
        out.push((*self as u8) ^ 0x80);
    }
}

impl KeyDecode for i8 {
    fn decode_key(input: &mut &[u8]) -> CodecResult<Self> {
        Ok((take_byte(input)? ^ 0x80) as i8)
    }
}

macro_rules! unsigned_key {
    ($($ty:ty => $write:ident, $read:ident;)*) => {$(
        impl KeyEncode for $ty {
            fn encode_key(&self, out: &mut Vec<u8>) {
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                BigEndian::$write(&mut buf, *self);
                out.extend_from_slice(&buf);
            }
        }

        impl KeyDecode for $ty {
            fn decode_key(input: &mut &[u8]) -> CodecResult<Self> {
                let bytes = take(input, std::mem::size_of::<$ty>())?;
                Ok(BigEndian::$read(bytes))
            }
        }
    )*};
}

unsigned_key! {
    u16 => write_u16, read_u16;
    u32 => write_u32, read_u32;
    u64 => write_u64, read_u64;
    u128 => write_u128, read_u128;
}

macro_rules! signed_key {
    ($($ty:ty as $uty:ty;)*) => {$(
        impl KeyEncode for $ty {
            fn encode_key(&self, out: &mut Vec<u8>) {
                const SIGN: $uty = 1 << (<$uty>::BITS - 1);
                ((*self as $uty) ^ SIGN).encode_key(out);
            }
        }

        impl KeyDecode for $ty {
            fn decode_key(input: &mut &[u8]) -> CodecResult<Self> {
                const SIGN: $uty = 1 << (<$uty>::BITS - 1);
                Ok((<$uty>::decode_key(input)? ^ SIGN) as $ty)
            }
        }
    )*};
}

signed_key! {
    i16 as u16;
    i32 as u32;
    i64 as u64;
    i128 as u128;
}

impl KeyEncode for bool {
    fn encode_key(&self, out: &mut Vec<u8>) {
        out.push(u8::from(*self));
    }
}

impl KeyDecode for bool {
    fn decode_key(input: &mut &[u8]) -> CodecResult<Self> {
        match take_byte(input)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::InvalidTag(other)),
        }
    }
}

// =============================================================================
// Byte strings
// =============================================================================

fn encode_escaped(bytes: &[u8], out: &mut Vec<u8>) {
    out.reserve(bytes.len() + 2);
    for &b in bytes {
        if b == ESCAPE {
            out.push(ESCAPE);
            out.push(ESCAPED_ZERO);
        } else {
            out.push(b);
        }
    }
    out.push(ESCAPE);
    out.push(TERMINATOR);
}

fn decode_escaped(input: &mut &[u8]) -> CodecResult<Vec<u8>> {
    let mut out = Vec::new();
    loop {
        let b = take_byte(input)?;
        if b != ESCAPE {
            out.push(b);
            continue;
        }
        match take_byte(input)? {
            ESCAPED_ZERO => out.push(0),
            TERMINATOR => return Ok(out),
            other => return Err(CodecError::InvalidTag(other)),
        }
    }
}

impl KeyEncode for [u8] {
    fn encode_key(&self, out: &mut Vec<u8>) {
        encode_escaped(self, out);
    }
}

impl KeyEncode for Vec<u8> {
    fn encode_key(&self, out: &mut Vec<u8>) {
        encode_escaped(self, out);
    }
}

impl KeyDecode for Vec<u8> {
    fn decode_key(input: &mut &[u8]) -> CodecResult<Self> {
        decode_escaped(input)
    }
}

impl KeyEncode for str {
    fn encode_key(&self, out: &mut Vec<u8>) {
        encode_escaped(self.as_bytes(), out);
    }
}

impl KeyEncode for String {
    fn encode_key(&self, out: &mut Vec<u8>) {
        encode_escaped(self.as_bytes(), out);
    }
}

impl KeyDecode for String {
    fn decode_key(input: &mut &[u8]) -> CodecResult<Self> {
        String::from_utf8(decode_escaped(input)?).map_err(|_| CodecError::InvalidUtf8)
    }
}

// =============================================================================
// Composites
// =============================================================================

impl<T: KeyEncode> KeyEncode for Option<T> {
    fn encode_key(&self, out: &mut Vec<u8>) {
        match self {
            None => out.push(0),
            Some(v) => {
                out.push(1);
                v.encode_key(out);
            }
        }
    }
}

impl<T: KeyDecode> KeyDecode for Option<T> {
    fn decode_key(input: &mut &[u8]) -> CodecResult<Self> {
        match take_byte(input)? {
            0 => Ok(None),
            1 => Ok(Some(T::decode_key(input)?)),
            other => Err(CodecError::InvalidTag(other)),
        }
    }
}

impl<T: KeyEncode + ?Sized> KeyEncode for &T {
    fn encode_key(&self, out: &mut Vec<u8>) {
        (**self).encode_key(out);
    }
}

impl KeyEncode for () {
    fn encode_key(&self, _out: &mut Vec<u8>) {}
}

impl KeyDecode for () {
    fn decode_key(_input: &mut &[u8]) -> CodecResult<Self> {
        Ok(())
    }
}

impl<A: KeyEncode, B: KeyEncode> KeyEncode for (A, B) {
    fn encode_key(&self, out: &mut Vec<u8>) {
        self.0.encode_key(out);
        self.1.encode_key(out);
    }
}

impl<A: KeyDecode, B: KeyDecode> KeyDecode for (A, B) {
    fn decode_key(input: &mut &[u8]) -> CodecResult<Self> {
        let a = A::decode_key(input)?;
        let b = B::decode_key(input)?;
        Ok((a, b))
    }
}

impl<A: KeyEncode, B: KeyEncode, C: KeyEncode> KeyEncode for (A, B, C) {
    fn encode_key(&self, out: &mut Vec<u8>) {
        self.0.encode_key(out);
        self.1.encode_key(out);
        self.2.encode_key(out);
    }
}

impl<A: KeyDecode, B: KeyDecode, C: KeyDecode> KeyDecode for (A, B, C) {
    fn decode_key(input: &mut &[u8]) -> CodecResult<Self> {
        let a = A::decode_key(input)?;
        let b = B::decode_key(input)?;
        let c = C::decode_key(input)?;
        Ok((a, b, c))
    }
}
