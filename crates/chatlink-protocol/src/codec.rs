//! Binary wire codec primitives.
//!
//! Wire format: big-endian fixed-width integers, LEB128 VarInts (at most 5
//! bytes, two's complement for negatives), VarInt-length-prefixed UTF-8
//! strings, UUIDs as 16 raw bytes, timestamps as i64 epoch milliseconds.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::ProtocolError;

/// Maximum encoded size of a VarInt.
const MAX_VAR_INT_BYTES: usize = 5;

/// A value with a bit-exact wire encoding.
pub trait Wire: Sized {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), ProtocolError>;

    fn decode(src: &mut Bytes) -> Result<Self, ProtocolError>;

    fn to_bytes(&self) -> Result<Bytes, ProtocolError> {
        let mut buf = BytesMut::new();
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Decode a complete value, rejecting leftover bytes.
    fn decode_exact(mut src: Bytes) -> Result<Self, ProtocolError> {
        let value = Self::decode(&mut src)?;
        if src.has_remaining() {
            return Err(ProtocolError::TrailingBytes(src.remaining()));
        }
        Ok(value)
    }
}

pub fn ensure(src: &Bytes, needed: usize) -> Result<(), ProtocolError> {
    if src.remaining() < needed {
        return Err(ProtocolError::UnexpectedEof {
            needed: needed - src.remaining(),
        });
    }
    Ok(())
}

pub fn get_u8(src: &mut Bytes) -> Result<u8, ProtocolError> {
    ensure(src, 1)?;
    Ok(src.get_u8())
}

pub fn get_i64(src: &mut Bytes) -> Result<i64, ProtocolError> {
    ensure(src, 8)?;
    Ok(src.get_i64())
}

pub fn put_var_int(dst: &mut BytesMut, value: i32) {
    let mut v = value as u32;
    loop {
        if v & !0x7f == 0 {
            dst.put_u8(v as u8);
            return;
        }
        dst.put_u8((v & 0x7f) as u8 | 0x80);
        v >>= 7;
    }
}

pub fn get_var_int(src: &mut Bytes) -> Result<i32, ProtocolError> {
    let mut result: u32 = 0;
    for i in 0..MAX_VAR_INT_BYTES {
        let byte = get_u8(src)?;
        result |= ((byte & 0x7f) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(result as i32);
        }
    }
    Err(ProtocolError::VarIntTooLong)
}

/// Write a length or count. Callers validate the upper bound first.
pub fn put_len(dst: &mut BytesMut, len: usize) {
    put_var_int(dst, len as i32);
}

/// Read a non-negative VarInt length.
pub fn get_len(src: &mut Bytes) -> Result<usize, ProtocolError> {
    let len = get_var_int(src)?;
    if len < 0 {
        return Err(ProtocolError::Negative(len));
    }
    Ok(len as usize)
}

pub fn put_string(dst: &mut BytesMut, value: &str, max_bytes: usize) -> Result<(), ProtocolError> {
    if value.len() > max_bytes {
        return Err(ProtocolError::StringTooLong {
            len: value.len(),
            max: max_bytes,
        });
    }
    put_len(dst, value.len());
    dst.put_slice(value.as_bytes());
    Ok(())
}

pub fn get_string(src: &mut Bytes, max_bytes: usize) -> Result<String, ProtocolError> {
    let len = get_len(src)?;
    if len > max_bytes {
        return Err(ProtocolError::StringTooLong {
            len,
            max: max_bytes,
        });
    }
    ensure(src, len)?;
    let raw = src.split_to(len);
    Ok(String::from_utf8(raw.to_vec())?)
}

pub fn put_bool(dst: &mut BytesMut, value: bool) {
    dst.put_u8(value as u8);
}

pub fn get_bool(src: &mut Bytes) -> Result<bool, ProtocolError> {
    match get_u8(src)? {
        0 => Ok(false),
        1 => Ok(true),
        tag => Err(ProtocolError::UnknownTag {
            what: "bool",
            tag: tag as i32,
        }),
    }
}

pub fn put_uuid(dst: &mut BytesMut, value: &Uuid) {
    dst.put_slice(value.as_bytes());
}

pub fn get_uuid(src: &mut Bytes) -> Result<Uuid, ProtocolError> {
    ensure(src, 16)?;
    let mut raw = [0u8; 16];
    src.copy_to_slice(&mut raw);
    Ok(Uuid::from_bytes(raw))
}

pub fn put_timestamp(dst: &mut BytesMut, value: &DateTime<Utc>) {
    dst.put_i64(value.timestamp_millis());
}

pub fn get_timestamp(src: &mut Bytes) -> Result<DateTime<Utc>, ProtocolError> {
    let millis = get_i64(src)?;
    DateTime::from_timestamp_millis(millis).ok_or(ProtocolError::InvalidTimestamp(millis))
}

/// Write the low `width` bytes of `bits`, least significant byte first.
pub fn put_fixed_bits(dst: &mut BytesMut, bits: u32, width: usize) {
    for i in 0..width {
        dst.put_u8((bits >> (8 * i)) as u8);
    }
}

pub fn get_fixed_bits(src: &mut Bytes, width: usize) -> Result<u32, ProtocolError> {
    debug_assert!(width <= 4);
    ensure(src, width)?;
    let mut bits = 0u32;
    for i in 0..width {
        bits |= (src.get_u8() as u32) << (8 * i);
    }
    Ok(bits)
}
