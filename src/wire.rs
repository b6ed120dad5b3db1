//! Byte-order aware request decoding and reply encoding
//!
//! The server speaks little-endian. Clients that connect big-endian are
//! "swapped": every multi-byte field they send is read with swapped order and
//! every multi-byte field we send them is written swapped.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::ProtocolError;

/// X resource id
pub type Xid = u32;

/// The `None` resource id; also marks an empty slot in id arrays
pub const NONE: Xid = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

impl ByteOrder {
    /// Byte order from the first byte of the connection setup
    pub fn from_setup_byte(byte: u8) -> Option<Self> {
        match byte {
            0x6c => Some(ByteOrder::LittleEndian), // 'l'
            0x42 => Some(ByteOrder::BigEndian),    // 'B'
            _ => None,
        }
    }

    /// Whether a client using this order needs its fields swapped
    pub fn is_swapped(self) -> bool {
        self == ByteOrder::BigEndian
    }
}

/// Reads request fields in the client's byte order.
///
/// Callers check the request length first; reading past the end is a bug.
pub struct RequestReader<'a> {
    buf: &'a [u8],
    swapped: bool,
}

impl<'a> RequestReader<'a> {
    pub fn new(buf: &'a [u8], swapped: bool) -> Self {
        Self { buf, swapped }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn u8(&mut self) -> u8 {
        self.buf.get_u8()
    }

    pub fn u16(&mut self) -> u16 {
        if self.swapped {
            self.buf.get_u16()
        } else {
            self.buf.get_u16_le()
        }
    }

    pub fn i16(&mut self) -> i16 {
        self.u16() as i16
    }

    pub fn u32(&mut self) -> u32 {
        if self.swapped {
            self.buf.get_u32()
        } else {
            self.buf.get_u32_le()
        }
    }

    pub fn skip(&mut self, n: usize) {
        self.buf.advance(n);
    }
}

/// Length in bytes of a request, from its header
pub fn request_length(header: &[u8], swapped: bool) -> Option<usize> {
    if header.len() < 4 {
        return None;
    }
    let words = if swapped {
        u16::from_be_bytes([header[2], header[3]])
    } else {
        u16::from_le_bytes([header[2], header[3]])
    };
    Some(words as usize * 4)
}

/// Request length must be exactly `expected` bytes
pub fn size_match(data: &[u8], expected: usize) -> Result<(), ProtocolError> {
    if data.len() != expected {
        return Err(ProtocolError::Length);
    }
    Ok(())
}

/// Request length must be at least `minimum` bytes
pub fn size_at_least(data: &[u8], minimum: usize) -> Result<(), ProtocolError> {
    if data.len() < minimum {
        return Err(ProtocolError::Length);
    }
    Ok(())
}

/// Writes reply fields in the client's byte order
pub struct ReplyWriter {
    buf: BytesMut,
    swapped: bool,
}

impl ReplyWriter {
    pub fn new(swapped: bool) -> Self {
        Self {
            buf: BytesMut::with_capacity(32),
            swapped,
        }
    }

    /// Start a reply: type, detail byte, sequence and a placeholder length
    pub fn reply(sequence: u16, detail: u8, swapped: bool) -> Self {
        let mut out = Self::new(swapped);
        out.u8(1); // reply
        out.u8(detail);
        out.u16(sequence);
        out.u32(0); // length, patched in finish_reply
        out
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn u16(&mut self, v: u16) {
        if self.swapped {
            self.buf.put_u16(v);
        } else {
            self.buf.put_u16_le(v);
        }
    }

    pub fn i16(&mut self, v: i16) {
        self.u16(v as u16);
    }

    pub fn u32(&mut self, v: u32) {
        if self.swapped {
            self.buf.put_u32(v);
        } else {
            self.buf.put_u32_le(v);
        }
    }

    pub fn bytes(&mut self, data: &[u8]) {
        self.buf.put_slice(data);
    }

    pub fn pad(&mut self, n: usize) {
        self.buf.put_bytes(0, n);
    }

    /// Pad to a multiple of four bytes
    pub fn align4(&mut self) {
        let pad = (4 - self.buf.len() % 4) % 4;
        self.pad(pad);
    }

    /// Finish a reply started with [`ReplyWriter::reply`]: pad the fixed part
    /// to 32 bytes and fill in the length of the trailing data.
    pub fn finish_reply(mut self) -> Vec<u8> {
        if self.buf.len() < 32 {
            let short = 32 - self.buf.len();
            self.pad(short);
        }
        self.align4();
        let words = ((self.buf.len() - 32) / 4) as u32;
        let length = if self.swapped {
            words.to_be_bytes()
        } else {
            words.to_le_bytes()
        };
        self.buf[4..8].copy_from_slice(&length);
        self.buf.to_vec()
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_byte_orders() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06];
        let mut le = RequestReader::new(&data, false);
        assert_eq!(le.u32(), 0x04030201);
        assert_eq!(le.u16(), 0x0605);

        let mut be = RequestReader::new(&data, true);
        assert_eq!(be.u32(), 0x01020304);
        assert_eq!(be.u16(), 0x0506);
        assert_eq!(be.remaining(), 0);
    }

    #[test]
    fn test_request_length_uses_client_order() {
        let header = [131, 3, 0x00, 0x04];
        assert_eq!(request_length(&header, true), Some(16));
        assert_eq!(request_length(&header, false), Some(0x400 * 4));
        assert_eq!(request_length(&header[..2], false), None);
    }

    #[test]
    fn test_finish_reply_sets_length() {
        let mut out = ReplyWriter::reply(7, 0, false);
        out.u32(2);
        out.pad(20);
        out.u32(0xdeadbeef);
        let reply = out.finish_reply();
        assert_eq!(reply.len(), 36);
        assert_eq!(&reply[4..8], &1u32.to_le_bytes());
        assert_eq!(&reply[32..36], &0xdeadbeefu32.to_le_bytes());
    }

    #[test]
    fn test_finish_reply_pads_short_reply() {
        let mut out = ReplyWriter::reply(1, 0, true);
        out.u8(1);
        let reply = out.finish_reply();
        assert_eq!(reply.len(), 32);
        assert_eq!(&reply[4..8], &[0, 0, 0, 0]);
        assert_eq!(&reply[2..4], &[0, 1]);
    }
}
