//! # MPEG Transport Stream (TS) demuxing
//!
//! Layers, bottom up:
//!
//! - [`parser`]: the 4-byte packet header and the adaptation field
//! - [`psi`]: PAT and PMT sections
//! - [`pes`]: PES headers and PTS/DTS decoding
//! - [`stream`]: per-PID PES reassembly feeding an access unit queue
//! - [`program`]: one PMT and the streams it declares
//! - [`demuxer`]: the PAT and packet routing
//! - [`reader`]: an async source adapter
//!
//! ## Example
//!
//! ```rust
//! use tsdemux::av::MediaKind;
//! use tsdemux::format::ts::{TransportDemuxer, TS_PACKET_SIZE};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut demuxer = TransportDemuxer::new();
//!
//! // a null packet
//! let mut packet = vec![0xFFu8; TS_PACKET_SIZE];
//! packet[..4].copy_from_slice(&[0x47, 0x1F, 0xFF, 0x10]);
//! demuxer.feed_packet(&packet)?;
//!
//! // no PAT seen yet, so no streams
//! assert!(demuxer.get_source(MediaKind::Video).is_none());
//! # Ok(())
//! # }
//! ```

/// Packet routing and the PAT
pub mod demuxer;

/// Packet header and adaptation field parsing
pub mod parser;

/// PES packet parsing
pub mod pes;

/// Per-program PMT handling
pub mod program;

/// PAT/PMT section parsing
pub mod psi;

/// Async transport source
pub mod reader;

/// Per-PID PES reassembly
pub mod stream;

/// Core TS types and constants
pub mod types;

pub use demuxer::TransportDemuxer;
pub use pes::{PESHeader, PESPacket};
pub use program::ProgramDemuxer;
pub use reader::TSReader;
pub use stream::{StreamDemuxer, StreamKind};
pub use types::{
    TSHeader,
    PID_NULL,
    PID_PAT,
    STREAM_TYPE_AAC,
    STREAM_TYPE_H264,
    TS_PACKET_SIZE,
};
