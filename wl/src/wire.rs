//! Byte layout of messages.
//!
//! A message is an 8 byte header, `[object id][(size << 16) | opcode]` in
//! native endianness, followed by 32-bit aligned arguments. File descriptors
//! carry no bytes; they travel next to the message.

use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::os::fd::OwnedFd;

pub const HEADER_SIZE: usize = 8;
pub const MAX_MESSAGE_SIZE: usize = 4096;

const WORD: usize = std::mem::size_of::<u32>();

/// Signed 24.8 fixed point number.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Fixed(i32);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);
    pub const ONE: Fixed = Fixed(256);

    pub const fn from_raw(raw: i32) -> Fixed {
        Fixed(raw)
    }

    pub const fn as_raw(self) -> i32 {
        self.0
    }

    pub fn from_f64(v: f64) -> Fixed {
        Fixed((v * 256.0).round() as i32)
    }

    pub fn to_f64(self) -> f64 {
        f64::from(self.0) / 256.0
    }

    pub const fn from_int(v: i32) -> Fixed {
        Fixed(v.wrapping_shl(8))
    }

    /// Integer part, rounded towards zero.
    pub const fn to_int(self) -> i32 {
        self.0 / 256
    }
}

impl fmt::Debug for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_f64(), f)
    }
}

impl From<i32> for Fixed {
    fn from(v: i32) -> Fixed {
        Fixed::from_int(v)
    }
}

impl From<Fixed> for f64 {
    fn from(v: Fixed) -> f64 {
        v.to_f64()
    }
}

impl Mul for Fixed {
    type Output = Fixed;
    fn mul(self, rhs: Fixed) -> Fixed {
        Fixed(((i64::from(self.0) * i64::from(rhs.0)) >> 8) as i32)
    }
}

macro_rules! delegate_op {
    ($trait:ident::$fn:ident) => {
        impl $trait for Fixed {
            type Output = Fixed;
            fn $fn(self, rhs: Fixed) -> Fixed {
                Fixed(self.0.$fn(rhs.0))
            }
        }
    };
}

delegate_op!(Add::add);
delegate_op!(Sub::sub);

impl Neg for Fixed {
    type Output = Fixed;
    fn neg(self) -> Fixed {
        Fixed(-self.0)
    }
}

/// An outgoing message ready for the transport.
#[derive(Debug)]
pub struct Message {
    pub object: u32,
    pub opcode: u16,
    pub body: Vec<u8>,
    pub fds: Vec<OwnedFd>,
}

impl Message {
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.body.len()
    }

    pub fn header(&self) -> [u8; HEADER_SIZE] {
        let mut hdr = [0; HEADER_SIZE];
        hdr[..WORD].copy_from_slice(&self.object.to_ne_bytes());
        let szop = ((self.size() as u32) << 16) | u32::from(self.opcode);
        hdr[WORD..].copy_from_slice(&szop.to_ne_bytes());
        hdr
    }

    /// Appends header and body to `buf`.
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.header());
        buf.extend_from_slice(&self.body);
    }
}

/// An inbound message as framed by the transport, arguments still encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub object: u32,
    pub opcode: u16,
    pub body: Vec<u8>,
}

impl RawMessage {
    /// Reads a header, returning object id, opcode and total message size.
    pub fn parse_header(buf: &[u8]) -> Option<(u32, u16, usize)> {
        let hdr = buf.get(..HEADER_SIZE)?;
        let id = u32::from_ne_bytes([hdr[0], hdr[1], hdr[2], hdr[3]]);
        let szop = u32::from_ne_bytes([hdr[4], hdr[5], hdr[6], hdr[7]]);
        Some((id, (szop & 0xffff) as u16, (szop >> 16) as usize))
    }

    /// Splits one complete message off the front of `buf`.
    pub fn parse(buf: &[u8]) -> Option<(RawMessage, usize)> {
        let (object, opcode, size) = RawMessage::parse_header(buf)?;
        let body = buf.get(HEADER_SIZE..size.max(HEADER_SIZE))?;
        Some((RawMessage { object, opcode, body: body.to_vec() }, size.max(HEADER_SIZE)))
    }

    pub fn size(&self) -> usize {
        HEADER_SIZE + self.body.len()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size());
        out.extend_from_slice(&self.object.to_ne_bytes());
        let szop = ((self.size() as u32) << 16) | u32::from(self.opcode);
        out.extend_from_slice(&szop.to_ne_bytes());
        out.extend_from_slice(&self.body);
        out
    }
}

fn pad(n: usize) -> usize {
    (WORD - n % WORD) % WORD
}

/// Argument encoder for one message body.
#[derive(Debug, Default)]
pub(crate) struct WriteBuf {
    pub(crate) body: Vec<u8>,
    pub(crate) fds: Vec<OwnedFd>,
}

impl WriteBuf {
    pub(crate) fn put_u32(&mut self, v: u32) {
        self.body.extend_from_slice(&v.to_ne_bytes());
    }

    pub(crate) fn put_i32(&mut self, v: i32) {
        self.body.extend_from_slice(&v.to_ne_bytes());
    }

    /// Null is a zero length; otherwise the length counts the trailing NUL.
    pub(crate) fn put_str(&mut self, s: Option<&str>) -> Result<(), &'static str> {
        let Some(s) = s else {
            self.put_u32(0);
            return Ok(());
        };
        if s.as_bytes().contains(&0) {
            return Err("string contains a NUL byte");
        }
        let len = u32::try_from(s.len() + 1).map_err(|_| "string too long")?;
        self.put_u32(len);
        self.body.extend_from_slice(s.as_bytes());
        self.body.push(0);
        self.body.resize(self.body.len() + pad(s.len() + 1), 0);
        Ok(())
    }

    pub(crate) fn put_array(&mut self, a: &[u8]) -> Result<(), &'static str> {
        let len = u32::try_from(a.len()).map_err(|_| "array too long")?;
        self.put_u32(len);
        self.body.extend_from_slice(a);
        self.body.resize(self.body.len() + pad(a.len()), 0);
        Ok(())
    }

    pub(crate) fn put_fd(&mut self, fd: OwnedFd) {
        self.fds.push(fd);
    }
}

/// Argument decoder over one message body.
#[derive(Debug)]
pub(crate) struct ReadBuf<'b> {
    buf: &'b [u8],
    pos: usize,
}

impl<'b> ReadBuf<'b> {
    pub(crate) fn new(buf: &'b [u8]) -> ReadBuf<'b> {
        ReadBuf { buf, pos: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'b [u8], &'static str> {
        let Some(bytes) = self.buf.get(self.pos..self.pos + n) else {
            return Err("unexpected end of message");
        };
        self.pos += n;
        Ok(bytes)
    }

    pub(crate) fn get_u32(&mut self) -> Result<u32, &'static str> {
        let b = self.take(WORD)?;
        Ok(u32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn get_i32(&mut self) -> Result<i32, &'static str> {
        let b = self.take(WORD)?;
        Ok(i32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn get_str(&mut self) -> Result<Option<String>, &'static str> {
        let len = self.get_u32()? as usize;
        if len == 0 {
            return Ok(None);
        }
        let bytes = self.take(len)?;
        self.take(pad(len))?;
        let Some((&0, s)) = bytes.split_last() else {
            return Err("string is not NUL terminated");
        };
        let s = std::str::from_utf8(s).map_err(|_| "string is not UTF-8")?;
        Ok(Some(s.to_owned()))
    }

    pub(crate) fn get_array(&mut self) -> Result<Vec<u8>, &'static str> {
        let len = self.get_u32()? as usize;
        let bytes = self.take(len)?;
        self.take(pad(len))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(body: &[u8]) -> Vec<u32> {
        body.chunks(4).map(|c| u32::from_ne_bytes(c.try_into().unwrap())).collect()
    }

    #[test]
    fn fixed_conversions() {
        assert_eq!(Fixed::from_int(3).as_raw(), 768);
        assert_eq!(Fixed::from_f64(1.5).as_raw(), 384);
        assert_eq!(Fixed::from_raw(-384).to_f64(), -1.5);
        assert_eq!(Fixed::from_f64(-1.5).to_int(), -1);
        assert_eq!(Fixed::from_int(2) * Fixed::from_f64(0.25), Fixed::from_f64(0.5));
        assert_eq!(Fixed::ONE + Fixed::ONE - Fixed::from_int(3), -Fixed::ONE);
    }

    #[test]
    fn string_padding() {
        let mut w = WriteBuf::default();
        w.put_str(Some("abc")).unwrap();
        assert_eq!(w.body.len(), 8);
        assert_eq!(words(&w.body)[0], 4);
        assert_eq!(&w.body[4..], b"abc\0");

        let mut w = WriteBuf::default();
        w.put_str(Some("abcd")).unwrap();
        assert_eq!(w.body.len(), 12);
        assert_eq!(words(&w.body)[0], 5);
        assert_eq!(&w.body[4..], b"abcd\0\0\0\0");

        let mut w = WriteBuf::default();
        w.put_str(None).unwrap();
        assert_eq!(w.body, 0u32.to_ne_bytes());

        assert!(WriteBuf::default().put_str(Some("a\0b")).is_err());
    }

    #[test]
    fn array_padding() {
        let mut w = WriteBuf::default();
        w.put_array(&[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(w.body.len(), 12);
        assert_eq!(words(&w.body)[0], 5);
        assert_eq!(&w.body[4..], &[1, 2, 3, 4, 5, 0, 0, 0]);

        let mut w = WriteBuf::default();
        w.put_array(&[]).unwrap();
        assert_eq!(w.body.len(), 4);
    }

    #[test]
    fn read_back() {
        let mut w = WriteBuf::default();
        w.put_u32(7);
        w.put_str(Some("wl_shm")).unwrap();
        w.put_str(None).unwrap();
        w.put_array(b"xy").unwrap();
        w.put_i32(-2);

        let mut r = ReadBuf::new(&w.body);
        assert_eq!(r.get_u32(), Ok(7));
        assert_eq!(r.get_str(), Ok(Some("wl_shm".to_owned())));
        assert_eq!(r.get_str(), Ok(None));
        assert_eq!(r.get_array(), Ok(b"xy".to_vec()));
        assert_eq!(r.get_i32(), Ok(-2));
        assert_eq!(r.remaining(), 0);
        assert!(r.get_u32().is_err());
    }

    #[test]
    fn truncated_and_unterminated() {
        let mut body = 8u32.to_ne_bytes().to_vec();
        body.extend_from_slice(b"abc");
        assert!(ReadBuf::new(&body).get_str().is_err());

        let mut body = 4u32.to_ne_bytes().to_vec();
        body.extend_from_slice(b"abcd");
        assert_eq!(ReadBuf::new(&body).get_str(), Err("string is not NUL terminated"));
    }

    #[test]
    fn header_layout() {
        let msg = Message { object: 3, opcode: 1, body: vec![0; 12], fds: vec![] };
        let hdr = msg.header();
        assert_eq!(u32::from_ne_bytes(hdr[..4].try_into().unwrap()), 3);
        assert_eq!(u32::from_ne_bytes(hdr[4..].try_into().unwrap()), (20 << 16) | 1);

        let mut buf = vec![];
        msg.write_to(&mut buf);
        buf.extend_from_slice(&[9, 9]);
        let (raw, used) = RawMessage::parse(&buf).unwrap();
        assert_eq!(used, 20);
        assert_eq!((raw.object, raw.opcode, raw.body.len()), (3, 1, 12));
        assert_eq!(raw.to_bytes(), buf[..20]);
        assert!(RawMessage::parse(&buf[..19]).is_none());
    }
}
