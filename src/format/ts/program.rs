use super::psi;
use super::stream::StreamDemuxer;
use crate::av::{AccessUnitQueue, Discontinuity, FinalStatus, MediaKind};
use crate::config::DemuxerConfig;
use crate::error::Result;
use crate::utils::BitReader;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One program announced by the PAT: its PMT PID and the elementary
/// streams the PMT declares.
#[derive(Debug)]
pub struct ProgramDemuxer {
    program_number: u16,
    pmt_pid: u16,
    pcr_pid: Option<u16>,
    version: Option<u8>,
    verify_crc: bool,
    max_pes_size: usize,
    streams: BTreeMap<u16, StreamDemuxer>,
}

impl ProgramDemuxer {
    pub fn new(program_number: u16, pmt_pid: u16, config: &DemuxerConfig) -> Self {
        Self {
            program_number,
            pmt_pid,
            pcr_pid: None,
            version: None,
            verify_crc: config.verify_crc,
            max_pes_size: config.max_pes_size,
            streams: BTreeMap::new(),
        }
    }

    pub fn program_number(&self) -> u16 {
        self.program_number
    }

    pub fn pmt_pid(&self) -> u16 {
        self.pmt_pid
    }

    /// PCR PID from the last PMT, `None` before any PMT arrived.
    pub fn pcr_pid(&self) -> Option<u16> {
        self.pcr_pid
    }

    pub fn version(&self) -> Option<u8> {
        self.version
    }

    /// Streams ordered by PID.
    pub fn streams(&self) -> impl Iterator<Item = &StreamDemuxer> {
        self.streams.values()
    }

    /// Routes one packet payload. Returns whether `pid` belongs to this
    /// program.
    pub fn parse_pid(
        &mut self,
        pid: u16,
        payload_unit_start: bool,
        reader: &mut BitReader,
    ) -> Result<bool> {
        if pid == self.pmt_pid {
            if !payload_unit_start {
                log::debug!(
                    "program {}: PMT continuation on PID 0x{:04x} ignored",
                    self.program_number,
                    pid
                );
                return Ok(true);
            }
            psi::skip_pointer_field(reader)?;
            self.parse_program_map(reader)?;
            return Ok(true);
        }

        match self.streams.get_mut(&pid) {
            Some(stream) => {
                stream.parse(payload_unit_start, reader)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Applies a PMT section. Streams are created once per elementary PID;
    /// repeated PMTs leave existing streams untouched.
    pub fn parse_program_map(&mut self, reader: &mut BitReader) -> Result<()> {
        let pmt = psi::parse_pmt(reader, self.verify_crc)?;
        if pmt.program_number != self.program_number {
            log::debug!(
                "PMT for program {} on PID 0x{:04x} of program {}, ignored",
                pmt.program_number,
                self.pmt_pid,
                self.program_number
            );
            return Ok(());
        }

        self.pcr_pid = Some(pmt.pcr_pid);
        self.version = Some(pmt.version);

        for info in &pmt.elementary_stream_infos {
            if self.streams.contains_key(&info.elementary_pid) {
                continue;
            }
            let stream = StreamDemuxer::new(info.elementary_pid, info.stream_type, self.max_pes_size);
            log::info!(
                "program {}: new stream PID 0x{:04x} stream_type 0x{:02x} ({:?})",
                self.program_number,
                info.elementary_pid,
                info.stream_type,
                stream.kind()
            );
            self.streams.insert(info.elementary_pid, stream);
        }
        Ok(())
    }

    /// Routes a transport error on `pid`. Returns false when no stream of
    /// this program owns it.
    pub fn mark_damaged(&mut self, pid: u16, payload_unit_start: bool) -> Result<bool> {
        match self.streams.get_mut(&pid) {
            Some(stream) => {
                stream.mark_damaged(payload_unit_start)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Queue of the first stream of `kind`, whether or not its format is
    /// known yet.
    pub fn source(&self, kind: MediaKind) -> Option<Arc<AccessUnitQueue>> {
        self.streams
            .values()
            .find(|stream| stream.media_kind() == Some(kind))
            .map(StreamDemuxer::source)
    }

    pub fn signal_discontinuity(&mut self, discontinuity: Discontinuity) {
        for stream in self.streams.values_mut() {
            stream.signal_discontinuity(discontinuity);
        }
    }

    /// Ends every stream; the first flush error is returned once all streams
    /// are ended.
    pub fn signal_eos(&mut self, status: FinalStatus) -> Result<()> {
        let mut result = Ok(());
        for stream in self.streams.values_mut() {
            let flushed = stream.signal_eos(status);
            if result.is_ok() {
                result = flushed;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ts::psi::test_utils::pmt_section;
    use crate::format::ts::types::*;
    use pretty_assertions::assert_eq;

    fn with_pointer(section: &[u8]) -> Vec<u8> {
        let mut payload = vec![0x00];
        payload.extend_from_slice(section);
        payload
    }

    #[test]
    fn test_pmt_creates_streams_once() {
        let mut program = ProgramDemuxer::new(1, 0x100, &DemuxerConfig::default());
        let payload = with_pointer(&pmt_section(
            1,
            &[(STREAM_TYPE_H264, 0x101), (STREAM_TYPE_AAC, 0x102)],
        ));

        for _ in 0..3 {
            let mut reader = BitReader::new(&payload);
            assert!(program.parse_pid(0x100, true, &mut reader).unwrap());
        }

        let pids: Vec<_> = program.streams().map(|s| (s.pid(), s.stream_type())).collect();
        assert_eq!(pids, vec![(0x101, STREAM_TYPE_H264), (0x102, STREAM_TYPE_AAC)]);
        assert_eq!(program.pcr_pid(), Some(0x101));
        assert_eq!(program.version(), Some(0));
    }

    #[test]
    fn test_repeated_pmt_keeps_queues() {
        let mut program = ProgramDemuxer::new(1, 0x100, &DemuxerConfig::default());
        let payload = with_pointer(&pmt_section(1, &[(STREAM_TYPE_AAC, 0x101)]));

        let mut reader = BitReader::new(&payload);
        program.parse_pid(0x100, true, &mut reader).unwrap();
        let before = program.source(MediaKind::Audio).unwrap();

        let mut reader = BitReader::new(&payload);
        program.parse_pid(0x100, true, &mut reader).unwrap();
        let after = program.source(MediaKind::Audio).unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        assert!(program.source(MediaKind::Video).is_none());
    }

    #[test]
    fn test_foreign_pmt_ignored() {
        let mut program = ProgramDemuxer::new(1, 0x100, &DemuxerConfig::default());
        let payload = with_pointer(&pmt_section(7, &[(STREAM_TYPE_AAC, 0x101)]));
        let mut reader = BitReader::new(&payload);
        assert!(program.parse_pid(0x100, true, &mut reader).unwrap());
        assert_eq!(program.streams().count(), 0);
    }

    #[test]
    fn test_unknown_pid_not_claimed() {
        let mut program = ProgramDemuxer::new(1, 0x100, &DemuxerConfig::default());
        let mut reader = BitReader::new(&[0u8; 4]);
        assert!(!program.parse_pid(0x200, true, &mut reader).unwrap());
        assert!(!program.mark_damaged(0x200, true).unwrap());
    }

    #[test]
    fn test_pmt_continuation_ignored() {
        let mut program = ProgramDemuxer::new(1, 0x100, &DemuxerConfig::default());
        let mut reader = BitReader::new(&[0xFFu8; 8]);
        assert!(program.parse_pid(0x100, false, &mut reader).unwrap());
        assert_eq!(program.version(), None);
    }

    #[test]
    fn test_crc_checked_when_enabled() {
        let config = DemuxerConfig {
            verify_crc: true,
            ..Default::default()
        };
        let mut program = ProgramDemuxer::new(1, 0x100, &config);
        let mut payload = with_pointer(&pmt_section(1, &[(STREAM_TYPE_AAC, 0x101)]));
        let last = payload.len() - 1;
        payload[last] ^= 0x01;

        let mut reader = BitReader::new(&payload);
        assert!(program.parse_pid(0x100, true, &mut reader).is_err());
        assert_eq!(program.streams().count(), 0);
    }
}
