use crate::error::{Result, TsPesError};

/// A bit-level reader over a byte slice, most significant bit first.
///
/// Transport stream headers pack several fields into shared bytes
/// (13-bit PIDs, 33-bit clock bases), so the decoders read them through
/// this reader instead of masking bytes by hand.
///
/// Example:
/// ```
/// use tspes::utils::BitReader;
///
/// let data = [0b10110011];
/// let mut reader = BitReader::new(&data);
///
/// assert_eq!(reader.read_bit().unwrap(), true);   // 1
/// assert_eq!(reader.read_bits(3).unwrap(), 0b011); // 011
/// ```
pub struct BitReader<'a> {
    data: &'a [u8],
    byte_offset: usize,
    bit_offset: u8,
}

impl<'a> BitReader<'a> {
    /// Creates a new BitReader from a byte slice
    pub fn new(data: &'a [u8]) -> Self {
        BitReader {
            data,
            byte_offset: 0,
            bit_offset: 0,
        }
    }

    /// Reads a single bit from the stream.
    /// Returns true for 1, false for 0.
    ///
    /// Returns error if end of data is reached.
    pub fn read_bit(&mut self) -> Result<bool> {
        if self.byte_offset >= self.data.len() {
            return Err(TsPesError::Parser("Reached end of data".into()));
        }

        let bit = (self.data[self.byte_offset] >> (7 - self.bit_offset)) & 1;
        self.bit_offset += 1;

        if self.bit_offset == 8 {
            self.bit_offset = 0;
            self.byte_offset += 1;
        }

        Ok(bit == 1)
    }

    /// Reads n bits and returns them as a number.
    /// The bits are interpreted as big-endian.
    ///
    /// Returns error if n > 32 or end of data is reached.
    pub fn read_bits(&mut self, n: u32) -> Result<u32> {
        if n > 32 {
            return Err(TsPesError::Parser("Too many bits requested".into()));
        }
        Ok(self.read_bits_u64(n)? as u32)
    }

    /// Reads up to 64 bits, for fields such as the 33-bit clock base.
    pub fn read_bits_u64(&mut self, n: u32) -> Result<u64> {
        if n > 64 {
            return Err(TsPesError::Parser("Too many bits requested".into()));
        }
        if (n as usize) > self.available_bits() {
            return Err(TsPesError::Parser("Reached end of data".into()));
        }

        let mut value = 0u64;
        for _ in 0..n {
            value = (value << 1) | self.read_bit()? as u64;
        }
        Ok(value)
    }

    /// Reads a single bit as a flag byte (0 or 1).
    pub fn read_flag(&mut self) -> Result<u8> {
        Ok(self.read_bit()? as u8)
    }

    /// Skips n bits in the stream.
    pub fn skip_bits(&mut self, n: u32) -> Result<()> {
        if (n as usize) > self.available_bits() {
            return Err(TsPesError::Parser("Reached end of data".into()));
        }
        let total = self.bit_offset as usize + n as usize;
        self.byte_offset += total / 8;
        self.bit_offset = (total % 8) as u8;
        Ok(())
    }

    /// Aligns reader to next byte boundary by skipping remaining bits in current byte.
    pub fn align_byte(&mut self) {
        if self.bit_offset != 0 {
            self.bit_offset = 0;
            self.byte_offset += 1;
        }
    }

    /// Current position in whole bytes, rounded down.
    pub fn byte_position(&self) -> usize {
        self.byte_offset
    }

    /// Returns number of bits available to read.
    pub fn available_bits(&self) -> usize {
        self.data
            .len()
            .saturating_sub(self.byte_offset)
            .saturating_mul(8)
            .saturating_sub(self.bit_offset as usize)
    }
}
