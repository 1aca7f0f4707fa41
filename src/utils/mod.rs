//! # Utility Functions and Types
//!
//! Bit-level reading for the TS/PSI/PES/codec parsers and the MPEG-2 CRC32
//! used to validate PSI sections.
//!
//! ```rust
//! use tsdemux::utils::BitReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let data = vec![0b10110011u8];
//! let mut reader = BitReader::new(&data);
//!
//! let value = reader.read_bits(3)?; // Reads first 3 bits (101)
//! assert_eq!(value, 0b101);
//! # Ok(())
//! # }
//! ```

/// Bitstream reading utilities
pub mod bits;

/// CRC calculation for PSI sections
pub mod crc;

pub use bits::BitReader;
pub use crc::Crc32Mpeg2;
