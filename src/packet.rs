//! Opcode and body of a single logon or world message.
//!
//! Writes append to the end of the body and never fail.
//! Reads advance a cursor and fail softly: reading past the end returns zero (or an empty
//! string) and sets a sticky flag that can be checked with [`Packet::has_read_overflow`]
//! once the whole message has been read.
//!
//! All integers and floats are little endian. Floats go through their bit pattern.

/// Opcode plus body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Packet {
    opcode: u16,
    data: Vec<u8>,
    read_position: usize,
    read_overflow: bool,
}

impl Packet {
    pub fn new(opcode: u16) -> Self {
        Self {
            opcode,
            ..Default::default()
        }
    }

    /// Packet with read cursor at zero.
    pub fn with_data(opcode: u16, data: Vec<u8>) -> Self {
        Self {
            opcode,
            data,
            ..Default::default()
        }
    }

    pub const fn opcode(&self) -> u16 {
        self.opcode
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn write_u8(&mut self, v: u8) -> &mut Self {
        self.data.push(v);
        self
    }

    pub fn write_u16(&mut self, v: u16) -> &mut Self {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_u32(&mut self, v: u32) -> &mut Self {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_u64(&mut self, v: u64) -> &mut Self {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_f32(&mut self, v: f32) -> &mut Self {
        self.write_u32(v.to_bits())
    }

    pub fn write_bytes(&mut self, v: &[u8]) -> &mut Self {
        self.data.extend_from_slice(v);
        self
    }

    /// Writes the string followed by a zero byte.
    pub fn write_cstring(&mut self, v: &str) -> &mut Self {
        self.write_bytes(v.as_bytes());
        self.write_u8(0)
    }

    pub fn read_u8(&mut self) -> u8 {
        self.read_array::<1>()[0]
    }

    pub fn read_u16(&mut self) -> u16 {
        u16::from_le_bytes(self.read_array())
    }

    pub fn read_u32(&mut self) -> u32 {
        u32::from_le_bytes(self.read_array())
    }

    pub fn read_u64(&mut self) -> u64 {
        u64::from_le_bytes(self.read_array())
    }

    pub fn read_f32(&mut self) -> f32 {
        f32::from_bits(self.read_u32())
    }

    /// Reads exactly `N` bytes, or returns zeroes and sets the overflow flag.
    pub fn read_array<const N: usize>(&mut self) -> [u8; N] {
        let mut buf = [0_u8; N];
        if let Some(bytes) = self.take(N) {
            buf.copy_from_slice(bytes);
        }
        buf
    }

    /// Reads exactly `length` bytes, or returns zeroes and sets the overflow flag.
    pub fn read_bytes(&mut self, length: usize) -> Vec<u8> {
        self.take(length)
            .map_or_else(|| vec![0_u8; length], <[u8]>::to_vec)
    }

    /// Reads up to and including the next zero byte.
    ///
    /// A missing terminator consumes the rest of the body and sets the overflow flag.
    /// Invalid UTF-8 is replaced.
    pub fn read_cstring(&mut self) -> String {
        let rest = &self.data[self.read_position.min(self.data.len())..];

        match rest.iter().position(|b| *b == 0) {
            Some(end) => {
                let s = String::from_utf8_lossy(&rest[..end]).into_owned();
                self.read_position += end + 1;
                s
            }
            None => {
                let s = String::from_utf8_lossy(rest).into_owned();
                self.read_position = self.data.len();
                self.read_overflow = true;
                s
            }
        }
    }

    pub const fn read_position(&self) -> usize {
        self.read_position
    }

    pub fn set_read_position(&mut self, position: usize) {
        self.read_position = position;
    }

    /// Bytes left after the read cursor.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.read_position)
    }

    /// Set once any read went past the end of the body. Never cleared.
    pub const fn has_read_overflow(&self) -> bool {
        self.read_overflow
    }

    fn take(&mut self, length: usize) -> Option<&[u8]> {
        if self.remaining() < length {
            self.read_position = self.data.len();
            self.read_overflow = true;
            return None;
        }

        let start = self.read_position;
        self.read_position += length;
        Some(&self.data[start..start + length])
    }
}
