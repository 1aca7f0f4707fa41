//! Codec-configuration extractors used when a stream delivers its first
//! payload.

pub mod aac;
pub mod h264;

pub use h264::NALUnit;
