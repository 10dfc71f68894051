//! Positioned big-endian reader for TPM 2.0 wire structures.

/// A decoding failure at a byte offset in the structure being read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireError {
    pub position: usize,
    pub detail: String,
}

pub(crate) struct Reader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Reader { data, position: 0 }
    }

    fn take(&mut self, count: usize, what: &str) -> Result<&'a [u8], WireError> {
        let remaining = self.data.len() - self.position;
        if remaining < count {
            return Err(WireError {
                position: self.position,
                detail: format!("{what}: need {count} bytes, {remaining} remain"),
            });
        }
        let bytes = &self.data[self.position..self.position + count];
        self.position += count;
        Ok(bytes)
    }

    pub fn read_u8(&mut self, what: &str) -> Result<u8, WireError> {
        Ok(self.take(1, what)?[0])
    }

    pub fn read_u16(&mut self, what: &str) -> Result<u16, WireError> {
        let bytes = self.take(2, what)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self, what: &str) -> Result<u32, WireError> {
        let bytes = self.take(4, what)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_u64(&mut self, what: &str) -> Result<u64, WireError> {
        let bytes = self.take(8, what)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(u64::from_be_bytes(buf))
    }

    /// Reads a u16 big-endian length, then exactly that many bytes.
    pub fn read_sized(&mut self, what: &str) -> Result<&'a [u8], WireError> {
        let len = usize::from(self.read_u16(what)?);
        self.take(len, what)
    }

    /// Asserts the structure consumed its buffer completely.
    pub fn finish(&self, what: &str) -> Result<(), WireError> {
        let remaining = self.data.len() - self.position;
        if remaining != 0 {
            return Err(WireError {
                position: self.position,
                detail: format!("{what}: {remaining} trailing bytes"),
            });
        }
        Ok(())
    }
}
