//! Per-PID PES reassembly.
//!
//! A [`StreamDemuxer`] collects the payloads of consecutive TS packets on one
//! elementary PID into a PES packet, and when the next packet with
//! `payload_unit_start_indicator` arrives it parses the finished PES and
//! hands the elementary-stream bytes to the codec strategy picked from the
//! PMT `stream_type`. A PES with a non-zero `PES_packet_length` is finished
//! as soon as its declared bytes have arrived.

use super::pes::parse_pes;
use super::types::*;
use crate::av::{
    AccessUnit, AccessUnitQueue, CodecType, Discontinuity, FinalStatus, MediaFormat, MediaKind,
};
use crate::codec::{aac, h264};
use crate::error::{DemuxError, Result};
use crate::utils::BitReader;
use bytes::{Bytes, BytesMut};
use std::sync::Arc;

/// Payload strategy, fixed when the stream is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// H.264 in Annex-B form (`stream_type` 0x1B).
    Avc,
    /// AAC in ADTS frames (`stream_type` 0x0F).
    Aac,
    /// Reassembled but never delivered.
    Unknown,
}

impl StreamKind {
    pub fn from_stream_type(stream_type: u8) -> Self {
        match stream_type {
            STREAM_TYPE_H264 => StreamKind::Avc,
            STREAM_TYPE_AAC => StreamKind::Aac,
            _ => StreamKind::Unknown,
        }
    }

    pub fn media_kind(&self) -> Option<MediaKind> {
        match self {
            StreamKind::Avc => Some(MediaKind::Video),
            StreamKind::Aac => Some(MediaKind::Audio),
            StreamKind::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    AwaitingStart,
    Accumulating,
}

/// Reassembles PES packets for one elementary PID and feeds its queue.
#[derive(Debug)]
pub struct StreamDemuxer {
    pid: u16,
    stream_type: u8,
    kind: StreamKind,
    state: StreamState,
    buffer: BytesMut,
    damaged: bool,
    max_pes_size: usize,
    source: Arc<AccessUnitQueue>,
}

impl StreamDemuxer {
    pub fn new(pid: u16, stream_type: u8, max_pes_size: usize) -> Self {
        Self {
            pid,
            stream_type,
            kind: StreamKind::from_stream_type(stream_type),
            state: StreamState::AwaitingStart,
            buffer: BytesMut::new(),
            damaged: false,
            max_pes_size,
            source: Arc::new(AccessUnitQueue::new()),
        }
    }

    pub fn pid(&self) -> u16 {
        self.pid
    }

    pub fn stream_type(&self) -> u8 {
        self.stream_type
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn media_kind(&self) -> Option<MediaKind> {
        self.kind.media_kind()
    }

    /// Queue the access units of this stream are delivered to.
    pub fn source(&self) -> Arc<AccessUnitQueue> {
        Arc::clone(&self.source)
    }

    pub fn has_format(&self) -> bool {
        self.source.format().is_some()
    }

    /// Consumes the payload of one TS packet.
    ///
    /// A payload starting a new PES flushes the previous one first. If that
    /// flush fails, the new payload is still accumulated and the flush error
    /// is returned afterwards.
    pub fn parse(&mut self, payload_unit_start: bool, reader: &mut BitReader) -> Result<()> {
        debug_assert!(reader.is_byte_aligned());

        let mut flushed = Ok(());
        if payload_unit_start {
            if self.state == StreamState::Accumulating {
                flushed = self.flush();
            }
            self.state = StreamState::Accumulating;
            self.buffer.clear();
            self.damaged = false;
        } else if self.state == StreamState::AwaitingStart {
            log::trace!("PID 0x{:04x}: payload before first PES start, dropped", self.pid);
            return Ok(());
        }

        let payload = reader.data();
        if self.buffer.len() + payload.len() > self.max_pes_size {
            log::warn!(
                "PID 0x{:04x}: PES exceeds {} bytes, dropped",
                self.pid,
                self.max_pes_size
            );
            self.reset();
            return flushed;
        }
        self.buffer.extend_from_slice(payload);
        reader.skip_bytes(payload.len())?;

        if self.declared_pes_complete() {
            let completed = self.flush();
            if flushed.is_ok() {
                flushed = completed;
            }
        }
        flushed
    }

    /// Handles a packet flagged with `transport_error_indicator`.
    ///
    /// A corrupt packet that starts a new PES ends the previous one, which
    /// arrived intact and is delivered; the stream then waits for the next
    /// start. A corrupt continuation marks the PES being accumulated as
    /// damaged, so its access unit is produced and then discarded by the
    /// queue.
    pub fn mark_damaged(&mut self, payload_unit_start: bool) -> Result<()> {
        if self.state != StreamState::Accumulating {
            return Ok(());
        }
        if payload_unit_start {
            log::debug!("PID 0x{:04x}: transport error on PES start", self.pid);
            let flushed = self.flush();
            self.reset();
            return flushed;
        }
        log::debug!("PID 0x{:04x}: transport error inside PES", self.pid);
        self.damaged = true;
        Ok(())
    }

    /// Whether the buffer holds a PES with a non-zero `PES_packet_length`
    /// and all the bytes it declares.
    fn declared_pes_complete(&self) -> bool {
        if self.buffer.len() < 6 {
            return false;
        }
        let packet_length = u16::from_be_bytes([self.buffer[4], self.buffer[5]]) as usize;
        packet_length != 0 && self.buffer.len() >= 6 + packet_length
    }

    /// Parses and delivers the accumulated PES, if any.
    pub fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let data = self.buffer.split().freeze();
        let damaged = self.damaged;
        self.reset();

        let pes = parse_pes(&data)?;
        if !pes.carries_payload() {
            log::trace!(
                "PID 0x{:04x}: stream_id 0x{:02x} carries no payload",
                self.pid,
                pes.header.stream_id
            );
            return Ok(());
        }

        let pts = match pes.header.pts {
            Some(pts) => pts,
            None if self.kind == StreamKind::Unknown => return Ok(()),
            None => {
                return Err(DemuxError::InvalidData(format!(
                    "PID 0x{:04x}: PES without PTS",
                    self.pid
                )))
            }
        };

        let payload = data.slice_ref(pes.payload);
        self.on_payload_data(pts_to_us(pts), pes.header.dts.map(pts_to_us), payload, damaged)
    }

    /// Turns one PES payload into an access unit, deriving the stream format
    /// from the first payload that allows it.
    pub fn on_payload_data(
        &mut self,
        pts_us: i64,
        dts_us: Option<i64>,
        payload: Bytes,
        damaged: bool,
    ) -> Result<()> {
        if self.kind == StreamKind::Unknown {
            return Ok(());
        }

        if damaged {
            let mut unit = AccessUnit::new(payload, pts_us).with_damaged(true);
            unit.dts_us = dts_us;
            self.source.enqueue(unit);
            return Ok(());
        }

        let unit = match self.kind {
            StreamKind::Avc => {
                if !self.has_format() && !self.init_avc_format(&payload)? {
                    return Ok(());
                }
                let is_key = h264::contains_idr(&payload);
                AccessUnit::new(payload, pts_us).with_key_flag(is_key)
            }
            StreamKind::Aac => {
                if !self.has_format() {
                    self.init_aac_format(&payload)?;
                }
                AccessUnit::new(aac::strip_adts(&payload)?, pts_us).with_key_flag(true)
            }
            StreamKind::Unknown => return Ok(()),
        };

        self.source.enqueue(match dts_us {
            Some(dts_us) => unit.with_dts(dts_us),
            None => unit,
        });
        Ok(())
    }

    /// Drops the partial PES and forwards `discontinuity` to the queue.
    pub fn signal_discontinuity(&mut self, discontinuity: Discontinuity) {
        self.reset();
        self.source.enqueue_discontinuity(discontinuity);
    }

    /// Delivers the partial PES, then ends the queue with `status`.
    pub fn signal_eos(&mut self, status: FinalStatus) -> Result<()> {
        let flushed = self.flush();
        self.source.signal_end_of_stream(status);
        flushed
    }

    fn init_avc_format(&self, payload: &[u8]) -> Result<bool> {
        let (sps, pps) = h264::find_parameter_sets(payload);
        let (Some(sps), Some(pps)) = (sps, pps) else {
            log::debug!("PID 0x{:04x}: waiting for SPS/PPS", self.pid);
            return Ok(false);
        };

        let info = h264::parse_sps(sps)?;
        let format = MediaFormat::video(
            CodecType::H264,
            info.width,
            info.height,
            h264::make_avc_config(sps, pps)?,
        );
        log::info!(
            "PID 0x{:04x}: H.264 profile {} level {} {}x{}",
            self.pid,
            info.profile_idc,
            info.level_idc,
            info.width,
            info.height
        );
        self.source.set_format(format);
        Ok(true)
    }

    fn init_aac_format(&self, payload: &[u8]) -> Result<()> {
        let config = aac::parse_config(payload)?;
        log::info!(
            "PID 0x{:04x}: AAC {:?} {}Hz {} channels",
            self.pid,
            config.profile,
            config.sample_rate(),
            config.channel_configuration
        );
        self.source.set_format(MediaFormat::audio(
            CodecType::AAC,
            config.sample_rate(),
            config.channel_configuration,
            aac::make_esds(&config),
        ));
        Ok(())
    }

    fn reset(&mut self) {
        self.state = StreamState::AwaitingStart;
        self.buffer.clear();
        self.damaged = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::av::{DiscontinuityType, ReadError};
    use crate::codec::aac::test_utils::adts_frame;
    use crate::codec::h264::test_utils::{annexb_keyframe, baseline_sps};
    use crate::config::DEFAULT_MAX_PES_SIZE;
    use crate::format::ts::pes::test_utils::pes_packet;
    use pretty_assertions::assert_eq;

    fn feed(stream: &mut StreamDemuxer, start: bool, payload: &[u8]) -> Result<()> {
        let mut reader = BitReader::new(payload);
        stream.parse(start, &mut reader)
    }

    /// Splits `pes` into chunks and feeds them as consecutive TS payloads.
    fn feed_pes(stream: &mut StreamDemuxer, pes: &[u8], chunk: usize) -> Result<()> {
        let mut result = Ok(());
        for (i, part) in pes.chunks(chunk).enumerate() {
            let fed = feed(stream, i == 0, part);
            if result.is_ok() {
                result = fed;
            }
        }
        result
    }

    #[test]
    fn test_stream_kind() {
        assert_eq!(StreamKind::from_stream_type(0x1b), StreamKind::Avc);
        assert_eq!(StreamKind::from_stream_type(0x0f), StreamKind::Aac);
        assert_eq!(StreamKind::from_stream_type(0x03), StreamKind::Unknown);
        assert_eq!(StreamKind::Unknown.media_kind(), None);
    }

    #[test]
    fn test_aac_reassembly_across_fragments() {
        let frame_a = adts_frame(1, 4, 2, &[0x21; 40]);
        let frame_b = adts_frame(1, 4, 2, &[0x42; 30]);
        let es = [frame_a, frame_b].concat();
        let pes = pes_packet(0xc0, 90_000, None, &es, true);

        let mut stream = StreamDemuxer::new(0x101, STREAM_TYPE_AAC, DEFAULT_MAX_PES_SIZE);
        feed_pes(&mut stream, &pes, 17).unwrap();
        // PES_packet_length is set, so the last fragment completes the unit
        assert_eq!(stream.source().len(), 1);

        stream.signal_eos(FinalStatus::EndOfStream).unwrap();
        let source = stream.source();
        let format = source.format().unwrap();
        assert_eq!(format.sample_rate, Some(44_100));
        assert_eq!(format.channels, Some(2));
        assert_eq!(&format.extra_data[22..], &[0x12, 0x10]);

        let unit = source.dequeue().unwrap();
        assert_eq!(unit.pts_us, 1_000_000);
        assert!(unit.is_key);
        assert_eq!(unit.data, Bytes::from([vec![0x21; 40], vec![0x42; 30]].concat()));
        assert_eq!(
            source.dequeue(),
            Err(ReadError::EndOfStream(FinalStatus::EndOfStream))
        );
    }

    #[test]
    fn test_next_start_flushes_previous_pes() {
        let mut stream = StreamDemuxer::new(0x101, STREAM_TYPE_AAC, DEFAULT_MAX_PES_SIZE);
        for pts in [90_000u64, 92_000] {
            let pes = pes_packet(0xc0, pts, None, &adts_frame(1, 3, 1, &[1, 2, 3]), false);
            feed(&mut stream, true, &pes).unwrap();
        }

        let source = stream.source();
        assert_eq!(source.len(), 1);
        assert_eq!(source.next_timestamp(), Ok(1_000_000));
    }

    #[test]
    fn test_payload_before_start_is_dropped() {
        let mut stream = StreamDemuxer::new(0x101, STREAM_TYPE_AAC, DEFAULT_MAX_PES_SIZE);
        feed(&mut stream, false, &[0xAA; 20]).unwrap();
        stream.flush().unwrap();
        assert!(stream.source().is_empty());
    }

    #[test]
    fn test_reserved_aac_profile_rejected() {
        let pes = pes_packet(0xc0, 90_000, None, &adts_frame(3, 4, 2, &[0; 8]), false);
        let mut stream = StreamDemuxer::new(0x101, STREAM_TYPE_AAC, DEFAULT_MAX_PES_SIZE);
        feed(&mut stream, true, &pes).unwrap();

        assert!(matches!(
            stream.signal_eos(FinalStatus::EndOfStream),
            Err(DemuxError::InvalidData(_))
        ));
        assert!(!stream.has_format());
        assert_eq!(
            stream.source().dequeue(),
            Err(ReadError::EndOfStream(FinalStatus::EndOfStream))
        );
    }

    #[test]
    fn test_flush_error_returned_after_accumulating() {
        let bad = pes_packet(0xc0, 90_000, None, &adts_frame(3, 4, 2, &[0; 8]), false);
        let good = pes_packet(0xc0, 180_000, None, &adts_frame(1, 4, 2, &[9; 8]), false);

        let mut stream = StreamDemuxer::new(0x101, STREAM_TYPE_AAC, DEFAULT_MAX_PES_SIZE);
        feed(&mut stream, true, &bad).unwrap();
        assert!(feed(&mut stream, true, &good).is_err());

        stream.signal_eos(FinalStatus::EndOfStream).unwrap();
        let unit = stream.source().dequeue().unwrap();
        assert_eq!(unit.pts_us, 2_000_000);
        assert_eq!(unit.data, Bytes::from_static(&[9; 8]));
    }

    #[test]
    fn test_avc_waits_for_parameter_sets() {
        let mut stream = StreamDemuxer::new(0x100, STREAM_TYPE_H264, DEFAULT_MAX_PES_SIZE);
        let slice = [0, 0, 1, 0x41, 0x9A, 0x00];
        feed(&mut stream, true, &pes_packet(0xe0, 90_000, None, &slice, false)).unwrap();

        let keyframe = annexb_keyframe(&baseline_sps(20, 15, None));
        feed(&mut stream, true, &pes_packet(0xe0, 93_000, Some(90_000), &keyframe, false)).unwrap();
        stream.signal_eos(FinalStatus::EndOfStream).unwrap();

        let source = stream.source();
        let format = source.format().unwrap();
        assert_eq!(format.codec_type, CodecType::H264);
        assert_eq!((format.width, format.height), (Some(320), Some(240)));
        assert_eq!(format.extra_data[0], 0x01);
        assert_eq!(format.extra_data[4], 0xFF);

        let unit = source.dequeue().unwrap();
        assert!(unit.is_key);
        assert_eq!(unit.pts_us, pts_to_us(93_000));
        assert_eq!(unit.dts_us, Some(1_000_000));
        assert_eq!(unit.data, Bytes::from(keyframe));
        assert!(source.try_dequeue().is_err());
    }

    #[test]
    fn test_damaged_pes_is_not_delivered() {
        let pes = pes_packet(0xc0, 90_000, None, &adts_frame(1, 4, 2, &[5; 10]), false);
        let mut stream = StreamDemuxer::new(0x101, STREAM_TYPE_AAC, DEFAULT_MAX_PES_SIZE);
        feed(&mut stream, true, &pes).unwrap();
        stream.mark_damaged(false).unwrap();
        stream.flush().unwrap();

        assert!(stream.source().is_empty());
        assert!(!stream.has_format());
    }

    #[test]
    fn test_corrupt_pes_start_keeps_previous_pes() {
        let intact = pes_packet(0xc0, 90_000, None, &adts_frame(1, 4, 2, &[4; 12]), false);
        let mut stream = StreamDemuxer::new(0x101, STREAM_TYPE_AAC, DEFAULT_MAX_PES_SIZE);
        feed(&mut stream, true, &intact).unwrap();

        stream.mark_damaged(true).unwrap();
        // continuation of the corrupt PES is not accumulated
        feed(&mut stream, false, &[0xEE; 30]).unwrap();
        stream.signal_eos(FinalStatus::EndOfStream).unwrap();

        let source = stream.source();
        let unit = source.dequeue().unwrap();
        assert_eq!(unit.pts_us, 1_000_000);
        assert_eq!(unit.data, Bytes::from_static(&[4; 12]));
        assert_eq!(
            source.dequeue(),
            Err(ReadError::EndOfStream(FinalStatus::EndOfStream))
        );
    }

    #[test]
    fn test_bounded_pes_flushed_when_complete() {
        let mut stream = StreamDemuxer::new(0x101, STREAM_TYPE_AAC, DEFAULT_MAX_PES_SIZE);
        let bounded = pes_packet(0xc0, 90_000, None, &adts_frame(1, 4, 2, &[6; 50]), true);
        feed_pes(&mut stream, &bounded[..40], 40).unwrap();
        assert!(stream.source().is_empty());
        feed(&mut stream, false, &bounded[40..]).unwrap();
        assert_eq!(stream.source().next_timestamp(), Ok(1_000_000));

        // an unbounded PES waits for the next start or end of stream
        let open = pes_packet(0xc0, 180_000, None, &adts_frame(1, 4, 2, &[7; 50]), false);
        feed(&mut stream, true, &open).unwrap();
        assert_eq!(stream.source().len(), 1);
    }

    #[test]
    fn test_oversized_pes_dropped() {
        let pes = pes_packet(0xc0, 90_000, None, &adts_frame(1, 4, 2, &[5; 100]), false);
        let mut stream = StreamDemuxer::new(0x101, STREAM_TYPE_AAC, 64);
        feed_pes(&mut stream, &pes, 50).unwrap();
        stream.flush().unwrap();
        assert!(stream.source().is_empty());
    }

    #[test]
    fn test_format_change_discontinuity() {
        let mut stream = StreamDemuxer::new(0x101, STREAM_TYPE_AAC, DEFAULT_MAX_PES_SIZE);
        let pes = pes_packet(0xc0, 90_000, None, &adts_frame(1, 4, 2, &[1; 4]), false);
        feed(&mut stream, true, &pes).unwrap();
        stream.flush().unwrap();
        assert!(stream.has_format());

        // partial PES that must not survive the discontinuity
        feed(&mut stream, true, &pes).unwrap();
        stream.signal_discontinuity(Discontinuity::format_change());
        stream.flush().unwrap();
        assert!(!stream.has_format());

        let source = stream.source();
        assert!(matches!(
            source.dequeue(),
            Err(ReadError::Discontinuity(Discontinuity {
                kind: DiscontinuityType::FormatChange,
                ..
            }))
        ));
        assert!(source.is_empty());
    }

    #[test]
    fn test_unknown_stream_never_emits() {
        let mut stream = StreamDemuxer::new(0x102, 0x06, DEFAULT_MAX_PES_SIZE);
        let pes = pes_packet(0xbd, 90_000, None, &[1, 2, 3], false);
        feed(&mut stream, true, &pes).unwrap();
        stream.signal_eos(FinalStatus::EndOfStream).unwrap();
        assert_eq!(stream.media_kind(), None);
        assert!(stream.source().is_empty());
    }

    #[test]
    fn test_missing_pts_is_an_error() {
        let pes = [0x00, 0x00, 0x01, 0xc0, 0x00, 0x00, 0x80, 0x00, 0x00, 0xFF, 0xF1];
        let mut stream = StreamDemuxer::new(0x101, STREAM_TYPE_AAC, DEFAULT_MAX_PES_SIZE);
        feed(&mut stream, true, &pes).unwrap();
        assert!(stream.flush().is_err());
    }
}
