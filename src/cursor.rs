//! Bounds-checked little-endian reader over a byte slice.
//!
//! Every read checks the remaining length first and never panics; the
//! caller decides which error an overrun maps to.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OutOfBounds {
    pub offset: usize,
    pub wanted: usize,
    pub available: usize,
}

impl fmt::Display for OutOfBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "read of {} bytes at offset {} exceeds buffer of {} bytes",
            self.wanted, self.offset, self.available
        )
    }
}

pub(crate) struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Starts reading at `pos`, which may equal the buffer length.
    pub fn at(data: &'a [u8], pos: usize) -> Result<Self, OutOfBounds> {
        if pos > data.len() {
            return Err(OutOfBounds {
                offset: pos,
                wanted: 0,
                available: data.len(),
            });
        }
        Ok(Self { data, pos })
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], OutOfBounds> {
        if len > self.remaining() {
            return Err(OutOfBounds {
                offset: self.pos,
                wanted: len,
                available: self.data.len(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], OutOfBounds> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, OutOfBounds> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, OutOfBounds> {
        self.read_array().map(u16::from_le_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32, OutOfBounds> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub fn read_u64(&mut self) -> Result<u64, OutOfBounds> {
        self.read_array().map(u64::from_le_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_fields_in_order() {
        let data = [1, 0, 2, 0, 0, 0, 3, 0, 0, 0, 0, 0, 0, 0, 9];
        let mut cur = Cursor::new(&data);

        assert_eq!(cur.read_u16().unwrap(), 1);
        assert_eq!(cur.read_u32().unwrap(), 2);
        assert_eq!(cur.read_u64().unwrap(), 3);
        assert_eq!(cur.read_u8().unwrap(), 9);
        assert_eq!(cur.remaining(), 0);
    }

    #[test]
    fn overrun_reports_and_does_not_advance() {
        let data = [0u8; 3];
        let mut cur = Cursor::new(&data);

        let err = cur.read_u32().unwrap_err();
        assert_eq!(
            err,
            OutOfBounds {
                offset: 0,
                wanted: 4,
                available: 3
            }
        );
        assert_eq!(cur.position(), 0);
    }

    #[test]
    fn start_past_end_fails() {
        let data = [0u8; 4];
        assert!(Cursor::at(&data, 4).is_ok());
        assert!(Cursor::at(&data, 5).is_err());
    }
}
