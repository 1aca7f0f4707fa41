use super::parser;
use super::program::ProgramDemuxer;
use super::psi;
use super::types::*;
use crate::av::{AccessUnitQueue, Discontinuity, FinalStatus, MediaKind};
use crate::config::DemuxerConfig;
use crate::error::{DemuxError, Result};
use crate::utils::BitReader;
use std::sync::Arc;

/// MPEG Transport Stream demuxer.
///
/// Feeds on 188-byte packets and maintains:
/// - the program list from the PAT
/// - per program, the elementary streams from its PMT
/// - per stream, an [`AccessUnitQueue`] a player reads from
///
/// Parsing is synchronous. Queues are shared with consumers through `Arc`
/// and may be drained from other threads while packets are fed.
#[derive(Debug)]
pub struct TransportDemuxer {
    config: DemuxerConfig,
    programs: Vec<ProgramDemuxer>,
    packets_parsed: u64,
}

impl Default for TransportDemuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportDemuxer {
    pub fn new() -> Self {
        Self::with_config(DemuxerConfig::default())
    }

    pub fn with_config(config: DemuxerConfig) -> Self {
        Self {
            config,
            programs: Vec::new(),
            packets_parsed: 0,
        }
    }

    pub fn config(&self) -> &DemuxerConfig {
        &self.config
    }

    /// Programs in PAT order.
    pub fn programs(&self) -> &[ProgramDemuxer] {
        &self.programs
    }

    /// Packets that passed the size and sync checks.
    pub fn packets_parsed(&self) -> u64 {
        self.packets_parsed
    }

    /// Parses one transport packet.
    ///
    /// Errors are scoped to this packet; the demuxer can keep being fed.
    pub fn feed_packet(&mut self, data: &[u8]) -> Result<()> {
        if data.len() != TS_PACKET_SIZE {
            return Err(DemuxError::InvalidPacketSize(data.len()));
        }

        let mut reader = BitReader::new(data);
        let header = parser::parse_header(&mut reader)?;
        self.packets_parsed += 1;

        if header.transport_error {
            for program in &mut self.programs {
                if program.mark_damaged(header.pid, header.payload_unit_start)? {
                    return Ok(());
                }
            }
            log::trace!("transport error on PID 0x{:04x}", header.pid);
            return Ok(());
        }

        if header.adaptation_field_exists {
            let field = parser::parse_adaptation_field(&mut reader)?;
            if field.discontinuity {
                log::trace!("discontinuity_indicator on PID 0x{:04x}", header.pid);
            }
        }

        if header.contains_payload {
            self.parse_pid(header.pid, header.payload_unit_start, &mut reader)?;
        }
        Ok(())
    }

    /// Like [`feed_packet`](Self::feed_packet), but a packet whose first byte
    /// is `0x00` is a discontinuity sentinel instead of TS data: a second
    /// byte of `0x00` means seek, anything else a format change.
    pub fn feed_framed(&mut self, data: &[u8]) -> Result<()> {
        if data.first() == Some(&0x00) {
            let discontinuity = if data.get(1).copied().unwrap_or(0) == 0x00 {
                Discontinuity::seek()
            } else {
                Discontinuity::format_change()
            };
            log::debug!("framed discontinuity {:?}", discontinuity.kind);
            self.signal_discontinuity(discontinuity);
            return Ok(());
        }
        self.feed_packet(data)
    }

    /// Queue of the first stream of `kind`, searching programs in PAT order.
    pub fn get_source(&self, kind: MediaKind) -> Option<Arc<AccessUnitQueue>> {
        self.programs
            .iter()
            .find_map(|program| program.source(kind))
    }

    /// Drops partial PES data and queues `discontinuity` on every stream.
    pub fn signal_discontinuity(&mut self, discontinuity: Discontinuity) {
        for program in &mut self.programs {
            program.signal_discontinuity(discontinuity);
        }
    }

    /// Flushes partial PES data, then ends every stream with `status`.
    pub fn signal_eos(&mut self, status: FinalStatus) -> Result<()> {
        let mut result = Ok(());
        for program in &mut self.programs {
            let ended = program.signal_eos(status);
            if result.is_ok() {
                result = ended;
            }
        }
        result
    }

    fn parse_pid(&mut self, pid: u16, payload_unit_start: bool, reader: &mut BitReader) -> Result<()> {
        match pid {
            PID_PAT => self.parse_program_association(payload_unit_start, reader),
            PID_NULL => Ok(()),
            _ => {
                for program in &mut self.programs {
                    if program.parse_pid(pid, payload_unit_start, reader)? {
                        return Ok(());
                    }
                }
                if self.config.log_unhandled_pids {
                    log::warn!("unhandled PID 0x{:04x}", pid);
                } else {
                    log::debug!("unhandled PID 0x{:04x}", pid);
                }
                Ok(())
            }
        }
    }

    fn parse_program_association(
        &mut self,
        payload_unit_start: bool,
        reader: &mut BitReader,
    ) -> Result<()> {
        if !payload_unit_start {
            log::debug!("PAT continuation ignored");
            return Ok(());
        }
        psi::skip_pointer_field(reader)?;
        let pat = psi::parse_pat(reader, self.config.verify_crc)?;

        for entry in &pat.entries {
            if entry.is_network_pid() {
                log::trace!("network PID 0x{:04x}", entry.program_map_pid);
                continue;
            }
            if self
                .programs
                .iter()
                .any(|program| program.pmt_pid() == entry.program_map_pid)
            {
                continue;
            }
            log::info!(
                "program {} with PMT on PID 0x{:04x}",
                entry.program_number,
                entry.program_map_pid
            );
            self.programs.push(ProgramDemuxer::new(
                entry.program_number,
                entry.program_map_pid,
                &self.config,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use crate::format::ts::types::TS_PACKET_SIZE;

    /// Wraps `payload` in one TS packet, padding with an adaptation field.
    pub fn ts_packet(pid: u16, start: bool, cc: u8, payload: &[u8]) -> Vec<u8> {
        assert!(payload.len() <= TS_PACKET_SIZE - 4);
        let mut packet = vec![
            0x47,
            ((start as u8) << 6) | (pid >> 8) as u8 & 0x1F,
            pid as u8,
            0x10 | (cc & 0x0F),
        ];
        let stuffing = TS_PACKET_SIZE - 4 - payload.len();
        if stuffing > 0 {
            packet[3] |= 0x20;
            packet.push((stuffing - 1) as u8);
            if stuffing > 1 {
                packet.push(0x00);
                packet.resize(4 + stuffing, 0xFF);
            }
        }
        packet.extend_from_slice(payload);
        packet
    }

    /// Section payload with a zero pointer field.
    pub fn section_packet(pid: u16, section: &[u8]) -> Vec<u8> {
        let mut payload = vec![0x00];
        payload.extend_from_slice(section);
        ts_packet(pid, true, 0, &payload)
    }
}
