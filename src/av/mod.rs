use bytes::Bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecType {
    H264,
    AAC,
}

impl CodecType {
    pub fn kind(&self) -> MediaKind {
        match self {
            CodecType::H264 => MediaKind::Video,
            CodecType::AAC => MediaKind::Audio,
        }
    }
}

/// Logical content type a player asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
}

/// Per-stream format record derived from the first payload of a stream.
///
/// `extra_data` holds an `avcC` record for H.264 and an ES descriptor
/// (`esds`) for AAC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFormat {
    pub codec_type: CodecType,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
    pub extra_data: Bytes,
}

impl MediaFormat {
    pub fn video(codec_type: CodecType, width: u32, height: u32, extra_data: impl Into<Bytes>) -> Self {
        Self {
            codec_type,
            width: Some(width),
            height: Some(height),
            sample_rate: None,
            channels: None,
            extra_data: extra_data.into(),
        }
    }

    pub fn audio(
        codec_type: CodecType,
        sample_rate: u32,
        channels: u8,
        extra_data: impl Into<Bytes>,
    ) -> Self {
        Self {
            codec_type,
            width: None,
            height: None,
            sample_rate: Some(sample_rate),
            channels: Some(channels),
            extra_data: extra_data.into(),
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.codec_type.kind()
    }
}

mod packet;
pub mod queue;

pub use packet::*;
pub use queue::{AccessUnitQueue, Discontinuity, DiscontinuityType, FinalStatus, ReadError};
