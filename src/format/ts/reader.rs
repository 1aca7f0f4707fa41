use super::demuxer::TransportDemuxer;
use super::types::TS_PACKET_SIZE;
use crate::av::{AccessUnitQueue, FinalStatus, MediaKind};
use crate::error::Result;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Pulls 188-byte packets from an async byte source into a
/// [`TransportDemuxer`].
///
/// Malformed packets are logged and skipped. A clean end of input ends every
/// stream with [`FinalStatus::EndOfStream`], an I/O error with
/// [`FinalStatus::Error`].
pub struct TSReader<R: AsyncRead + Unpin + Send> {
    reader: R,
    demuxer: TransportDemuxer,
    packets_read: u64,
    finished: bool,
}

impl<R: AsyncRead + Unpin + Send> TSReader<R> {
    pub fn new(reader: R, demuxer: TransportDemuxer) -> Self {
        Self {
            reader,
            demuxer,
            packets_read: 0,
            finished: false,
        }
    }

    pub fn demuxer(&self) -> &TransportDemuxer {
        &self.demuxer
    }

    pub fn demuxer_mut(&mut self) -> &mut TransportDemuxer {
        &mut self.demuxer
    }

    pub fn get_source(&self, kind: MediaKind) -> Option<Arc<AccessUnitQueue>> {
        self.demuxer.get_source(kind)
    }

    pub fn packets_read(&self) -> u64 {
        self.packets_read
    }

    /// Reads and feeds one packet. Returns `Ok(false)` once the input is
    /// exhausted.
    pub async fn read_packet(&mut self) -> Result<bool> {
        if self.finished {
            return Ok(false);
        }

        let mut packet = [0u8; TS_PACKET_SIZE];
        let mut filled = 0;
        while filled < TS_PACKET_SIZE {
            match self.reader.read(&mut packet[filled..]).await {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) => {
                    log::error!("transport read failed after {} packets: {}", self.packets_read, err);
                    self.finish(FinalStatus::Error);
                    return Err(err.into());
                }
            }
        }

        if filled < TS_PACKET_SIZE {
            if filled > 0 {
                log::warn!("dropping truncated trailing packet of {} bytes", filled);
            }
            self.finish(FinalStatus::EndOfStream);
            return Ok(false);
        }

        self.packets_read += 1;
        if let Err(err) = self.demuxer.feed_framed(&packet) {
            log::warn!("skipping packet {}: {}", self.packets_read, err);
        }
        Ok(true)
    }

    /// Feeds packets until the input ends. Returns the number of packets read.
    pub async fn run(&mut self) -> Result<u64> {
        while self.read_packet().await? {}
        Ok(self.packets_read)
    }

    fn finish(&mut self, status: FinalStatus) {
        self.finished = true;
        if let Err(err) = self.demuxer.signal_eos(status) {
            log::warn!("flushing pending PES at end of stream failed: {}", err);
        }
    }
}
