//! # H.264/AVC configuration extraction
//!
//! Just enough of H.264 to hand a stream to a decoder:
//!
//! - Annex-B NAL unit splitting
//! - SPS parsing for profile, level and picture size
//! - `avcC` record construction from the first SPS/PPS
//!
//! ```rust
//! use tsdemux::codec::h264::{split_nal_units, NALUnitType};
//!
//! let data = [0, 0, 0, 1, 0x09, 0xF0, 0, 0, 1, 0x65, 0x88];
//! let units = split_nal_units(&data);
//! assert_eq!(units[0].unit_type(), NALUnitType::AccessUnitDelimiter);
//! assert!(units[1].is_keyframe());
//! ```

/// Annex-B splitting, SPS parsing and avcC construction
pub mod parser;
/// NAL unit and parameter set types
pub mod types;

#[doc(inline)]
pub use parser::*;
#[doc(inline)]
pub use types::*;
