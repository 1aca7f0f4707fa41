use crate::error::{DemuxError, Result};

/// A bit-level reader over a byte slice.
///
/// Bits are consumed MSB-first and reads may straddle byte boundaries. The
/// reader is used for every fixed-width field of the TS, PSI and PES layers
/// and, through [`data`](BitReader::data), hands the byte-aligned remainder to
/// nested parsers.
///
/// Running past the end of the buffer returns an error instead of panicking,
/// since the buffer usually comes straight off the network.
///
/// Example:
/// ```
/// use tsdemux::utils::BitReader;
///
/// let data = [0b10110011, 0xAB];
/// let mut reader = BitReader::new(&data);
///
/// assert_eq!(reader.read_bit().unwrap(), true);    // 1
/// assert_eq!(reader.read_bits(3).unwrap(), 0b011); // 011
/// reader.skip_bits(4).unwrap();
/// assert_eq!(reader.data(), &[0xAB]);
/// ```
#[derive(Debug, Clone)]
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

    /// Reads a single bit, `true` for 1.
    pub fn read_bit(&mut self) -> Result<bool> {
        Ok(self.read_bits(1)? == 1)
    }

    /// Reads `n` bits (at most 32) as a big-endian number.
    pub fn read_bits(&mut self, n: u32) -> Result<u32> {
        if n > 32 {
            return Err(DemuxError::Parser(format!(
                "cannot read {} bits at once",
                n
            )));
        }
        self.ensure(n as usize)?;

        let mut value = 0u64;
        let mut remaining = n;
        while remaining > 0 {
            let available = 8 - self.bit_offset as u32;
            let take = available.min(remaining);
            let shift = available - take;
            let mask = ((1u16 << take) - 1) as u8;
            let bits = (self.data[self.byte_offset] >> shift) & mask;

            value = (value << take) | bits as u64;
            remaining -= take;
            self.advance(take as usize);
        }

        Ok(value as u32)
    }

    /// Reads an unsigned exponential Golomb code (ue(v)) as used by H.264.
    ///
    /// `M` leading zeros, a one, then `M` info bits: value = 2^M + INFO - 1.
    pub fn read_golomb(&mut self) -> Result<u32> {
        let mut leading_zeros = 0;
        while !self.read_bit()? {
            leading_zeros += 1;
            if leading_zeros > 31 {
                return Err(DemuxError::Codec("invalid exp-Golomb code".into()));
            }
        }

        if leading_zeros == 0 {
            return Ok(0);
        }

        let info = self.read_bits(leading_zeros)?;
        Ok(((1u64 << leading_zeros) + info as u64 - 1) as u32)
    }

    /// Reads a signed exponential Golomb code (se(v)).
    ///
    /// Odd codes map to positive values, even codes to negative ones.
    pub fn read_signed_golomb(&mut self) -> Result<i32> {
        let k = self.read_golomb()?;
        let magnitude = ((k as i64 + 1) >> 1) as i32;
        if k & 1 == 1 {
            Ok(magnitude)
        } else {
            Ok(-magnitude)
        }
    }

    /// Skips `n` bits.
    pub fn skip_bits(&mut self, n: usize) -> Result<()> {
        self.ensure(n)?;
        self.advance(n);
        Ok(())
    }

    /// Skips `n` whole bytes.
    pub fn skip_bytes(&mut self, n: usize) -> Result<()> {
        self.skip_bits(n * 8)
    }

    /// Aligns reader to next byte boundary by skipping remaining bits in current byte.
    pub fn align_byte(&mut self) {
        if self.bit_offset != 0 {
            self.bit_offset = 0;
            self.byte_offset += 1;
        }
    }

    /// Returns number of bits available to read.
    pub fn available_bits(&self) -> usize {
        (self.data.len() - self.byte_offset) * 8 - self.bit_offset as usize
    }

    /// Whether the cursor sits on a byte boundary.
    pub fn is_byte_aligned(&self) -> bool {
        self.bit_offset == 0
    }

    /// Offset of the byte holding the next unread bit.
    pub fn byte_offset(&self) -> usize {
        self.byte_offset
    }

    /// The bytes from the current (byte-aligned) position to the end.
    ///
    /// If the cursor is in the middle of a byte, that partially consumed byte
    /// is included.
    pub fn data(&self) -> &'a [u8] {
        &self.data[self.byte_offset.min(self.data.len())..]
    }

    fn ensure(&self, bits: usize) -> Result<()> {
        if bits > self.available_bits() {
            return Err(DemuxError::InvalidData(format!(
                "need {} bits, only {} left",
                bits,
                self.available_bits()
            )));
        }
        Ok(())
    }

    fn advance(&mut self, bits: usize) {
        let total = self.bit_offset as usize + bits;
        self.byte_offset += total / 8;
        self.bit_offset = (total % 8) as u8;
    }
}

#[cfg(test)]
mod test_utils {
    /// Encodes a single value as exp-Golomb code per H.264.
    pub fn encode_golomb(value: u32) -> Vec<u8> {
        encode_multiple_golomb(&[value])
    }

    /// Packs several exp-Golomb codes back to back, zero padded.
    pub fn encode_multiple_golomb(values: &[u32]) -> Vec<u8> {
        let mut bits = Vec::new();
        for &value in values {
            let code = value as u64 + 1;
            let width = 64 - code.leading_zeros();
            bits.extend(std::iter::repeat(false).take(width as usize - 1));
            for i in (0..width).rev() {
                bits.push((code >> i) & 1 == 1);
            }
        }

        let mut result = vec![0u8; (bits.len() + 7) / 8];
        for (i, bit) in bits.into_iter().enumerate() {
            if bit {
                result[i / 8] |= 0x80 >> (i % 8);
            }
        }
        result
    }
}
