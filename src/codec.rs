//! Minecraft protocol framing primitives.
//!
//! Implements the wire-level building blocks of the Java Edition protocol:
//! VarInts (7-bit groups, little-endian, continuation bit in the MSB),
//! VarInt-prefixed UTF-8 strings, big-endian fixed-width numerics, the
//! short-prefixed string form used inside NBT, and the outer
//! `[VarInt length][VarInt id][payload]` packet frame.
//!
//! [`Reader`] and [`Writer`] are pure and deterministic; the async frame
//! helpers at the bottom do the socket-facing length-prefixed reads.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{CodecError, Error, Result};

/// Longest string the protocol permits, in bytes.
pub const MAX_STRING_LEN: usize = 32773;

/// A cursor over the bytes of one decoded packet.
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Bytes not yet consumed.
    pub fn rest(&self) -> &'a [u8] {
        self.buf
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consumes `n` bytes, returning them as a slice.
    pub fn take(&mut self, n: usize) -> std::result::Result<&'a [u8], CodecError> {
        if n <= self.buf.len() {
            let (head, tail) = self.buf.split_at(n);
            self.buf = tail;
            Ok(head)
        } else {
            Err(CodecError::Truncated)
        }
    }

    pub fn read_u8(&mut self) -> std::result::Result<u8, CodecError> {
        self.take(1).map(|b| b[0])
    }

    pub fn read_u16(&mut self) -> std::result::Result<u16, CodecError> {
        self.take(2).map(|b| u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_i64(&mut self) -> std::result::Result<i64, CodecError> {
        let b = self.take(8)?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(b);
        Ok(i64::from_be_bytes(bytes))
    }

    /// Reads a VarInt with signed 32-bit two's-complement semantics.
    ///
    /// Fails with [`CodecError::Overlong`] when the fifth byte still carries
    /// the continuation bit.
    pub fn read_var_int(&mut self) -> std::result::Result<i32, CodecError> {
        let mut result: u32 = 0;
        for group in 0..5 {
            let byte = self.read_u8()?;
            result |= u32::from(byte & 0x7f) << (7 * group);
            if byte & 0x80 == 0 {
                return Ok(result as i32);
            }
        }
        Err(CodecError::Overlong)
    }

    /// Reads a VarInt-prefixed UTF-8 string.
    ///
    /// The declared length is checked against [`MAX_STRING_LEN`] before any
    /// bytes are consumed or allocated.
    pub fn read_string(&mut self) -> std::result::Result<&'a str, CodecError> {
        let len = self.read_var_int()?;
        if len < 0 || len as usize > MAX_STRING_LEN {
            return Err(CodecError::TooLarge);
        }
        let bytes = self.take(len as usize)?;
        Ok(std::str::from_utf8(bytes)?)
    }
}

/// Builds packet payloads in wire order.
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, x: u8) {
        self.buf.push(x);
    }

    pub fn write_bool(&mut self, x: bool) {
        self.buf.push(u8::from(x));
    }

    pub fn write_u16(&mut self, x: u16) {
        self.buf.extend_from_slice(&x.to_be_bytes());
    }

    pub fn write_i32(&mut self, x: i32) {
        self.buf.extend_from_slice(&x.to_be_bytes());
    }

    pub fn write_i64(&mut self, x: i64) {
        self.buf.extend_from_slice(&x.to_be_bytes());
    }

    pub fn write_f32(&mut self, x: f32) {
        self.buf.extend_from_slice(&x.to_be_bytes());
    }

    pub fn write_f64(&mut self, x: f64) {
        self.buf.extend_from_slice(&x.to_be_bytes());
    }

    /// Writes a VarInt, emitting groups until the remaining value is zero.
    pub fn write_var_int(&mut self, x: i32) {
        let mut x = x as u32;
        loop {
            let mut group = (x & 0x7f) as u8;
            x >>= 7;
            if x != 0 {
                group |= 0x80;
            }
            self.buf.push(group);
            if x == 0 {
                break;
            }
        }
    }

    /// Writes a VarInt-prefixed UTF-8 string.
    pub fn write_string(&mut self, s: &str) {
        self.write_var_int(s.len() as i32);
        self.buf.extend_from_slice(s.as_bytes());
    }

    /// Writes the int16-BE-prefixed string form used inside NBT tags.
    pub fn write_nbt_string(&mut self, s: &str) {
        self.buf.extend_from_slice(&(s.len() as i16).to_be_bytes());
        self.buf.extend_from_slice(s.as_bytes());
    }
}

/// Number of bytes `write_var_int` emits for `x`.
pub fn var_int_len(x: i32) -> usize {
    let mut x = x as u32;
    let mut n = 1;
    while x >= 0x80 {
        x >>= 7;
        n += 1;
    }
    n
}

/// Assembles a complete outer frame: `[VarInt len][VarInt id][payload]`,
/// where `len` covers the id and the payload.
pub fn frame(packet_id: i32, payload: &[u8]) -> Vec<u8> {
    let body_len = var_int_len(packet_id) + payload.len();
    let mut w = Writer::with_capacity(var_int_len(body_len as i32) + body_len);
    w.write_var_int(body_len as i32);
    w.write_var_int(packet_id);
    w.write_raw(payload);
    w.into_inner()
}

/// Reads one outer frame body (packet id + payload) from `reader`.
///
/// The length prefix is read byte-at-a-time so exactly one frame is
/// consumed; bodies larger than `max_len` fail before any allocation.
pub async fn read_frame<R>(reader: &mut R, max_len: usize) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut result: u32 = 0;
    for group in 0..5 {
        let byte = reader.read_u8().await?;
        result |= u32::from(byte & 0x7f) << (7 * group);
        if byte & 0x80 == 0 {
            let len = result as i32;
            if len < 0 || len as usize > max_len {
                return Err(CodecError::TooLarge.into());
            }
            let mut body = vec![0u8; len as usize];
            reader.read_exact(&mut body).await?;
            return Ok(body);
        }
    }
    Err(Error::Codec(CodecError::Overlong))
}
