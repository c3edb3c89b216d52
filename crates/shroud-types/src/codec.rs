//! Big-endian, length-prefixed byte framing shared by the binary formats.

use crate::error::TypeError;

/// Append a big-endian `u32`.
pub fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

/// Append a `u32` length prefix followed by `bytes`.
pub fn put_frame(buf: &mut Vec<u8>, bytes: &[u8]) -> Result<(), TypeError> {
    let len = u32::try_from(bytes.len()).map_err(|_| TypeError::FrameTooLarge(bytes.len()))?;
    put_u32(buf, len);
    buf.extend_from_slice(bytes);
    Ok(())
}

/// Cursor over a byte slice that refuses to read past the end.
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Take exactly `n` bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], TypeError> {
        if self.remaining() < n {
            return Err(TypeError::Truncated {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, TypeError> {
        Ok(self.take(1)?[0])
    }

    pub fn u32(&mut self) -> Result<u32, TypeError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a `u32` length prefix and that many bytes.
    pub fn frame(&mut self) -> Result<&'a [u8], TypeError> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    /// Fail unless every byte has been consumed.
    pub fn finish(self) -> Result<(), TypeError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(TypeError::TrailingBytes(n)),
        }
    }
}
