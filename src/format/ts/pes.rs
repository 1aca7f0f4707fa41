use super::types::*;
use crate::error::{DemuxError, Result};
use crate::utils::BitReader;

/// Packetized Elementary Stream (PES) header fields the demuxer uses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PESHeader {
    /// Stream identifier indicating content type (video/audio/etc.)
    pub stream_id: u8,
    /// Bytes following this field, 0 when unbounded (video)
    pub packet_length: u16,
    /// Control field for scrambling mode
    pub scrambling_control: u8,
    /// Data alignment indicator
    pub data_alignment: bool,
    /// Flags indicating presence of PTS/DTS fields
    pub pts_dts_flags: u8,
    /// ESCR (Extended System Clock Reference) flag
    pub escr_flag: bool,
    /// Elementary Stream rate flag
    pub es_rate_flag: bool,
    /// DSM trick mode flag
    pub dsm_trick_mode_flag: bool,
    /// Additional copy info flag
    pub additional_copy_info_flag: bool,
    /// CRC flag
    pub crc_flag: bool,
    /// Extension flag
    pub extension_flag: bool,
    /// Length of the header data following this field
    pub header_data_length: u8,
    /// Presentation Time Stamp (33 bits, 90kHz)
    pub pts: Option<u64>,
    /// Decoding Time Stamp (33 bits, 90kHz)
    pub dts: Option<u64>,
}

/// A parsed PES packet borrowing its payload from the reassembly buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PESPacket<'a> {
    pub header: PESHeader,
    /// Elementary stream bytes. Empty for stream ids that carry no
    /// optional header (padding, private_stream_2, ...).
    pub payload: &'a [u8],
}

impl<'a> PESPacket<'a> {
    /// Whether the payload is elementary-stream data to deliver.
    pub fn carries_payload(&self) -> bool {
        stream_id_has_optional_header(self.header.stream_id)
    }
}

/// Parses one complete PES packet.
pub fn parse_pes(data: &[u8]) -> Result<PESPacket<'_>> {
    let mut reader = BitReader::new(data);

    let prefix = reader.read_bits(24)?;
    if prefix != PES_START_CODE_PREFIX {
        return Err(DemuxError::InvalidData(format!(
            "bad PES start code prefix 0x{:06x}",
            prefix
        )));
    }

    let mut header = PESHeader {
        stream_id: reader.read_bits(8)? as u8,
        packet_length: reader.read_bits(16)? as u16,
        ..Default::default()
    };

    if !stream_id_has_optional_header(header.stream_id) {
        return Ok(PESPacket {
            header,
            payload: &[],
        });
    }

    if reader.read_bits(2)? != 0b10 {
        return Err(DemuxError::InvalidData(
            "missing '10' before PES optional header".into(),
        ));
    }
    header.scrambling_control = reader.read_bits(2)? as u8;
    reader.skip_bits(1)?; // PES_priority
    header.data_alignment = reader.read_bit()?;
    reader.skip_bits(2)?; // copyright, original_or_copy

    header.pts_dts_flags = reader.read_bits(2)? as u8;
    header.escr_flag = reader.read_bit()?;
    header.es_rate_flag = reader.read_bit()?;
    header.dsm_trick_mode_flag = reader.read_bit()?;
    header.additional_copy_info_flag = reader.read_bit()?;
    header.crc_flag = reader.read_bit()?;
    header.extension_flag = reader.read_bit()?;
    header.header_data_length = reader.read_bits(8)? as u8;

    let mut optional_bytes_remaining = header.header_data_length as usize;

    match header.pts_dts_flags {
        0b00 => {}
        0b10 | 0b11 => {
            if optional_bytes_remaining < 5 {
                return Err(DemuxError::InvalidData(
                    "PES header too short for PTS".into(),
                ));
            }
            header.pts = Some(read_timestamp(&mut reader, header.pts_dts_flags)?);
            optional_bytes_remaining -= 5;

            if header.pts_dts_flags == 0b11 {
                if optional_bytes_remaining < 5 {
                    return Err(DemuxError::InvalidData(
                        "PES header too short for DTS".into(),
                    ));
                }
                header.dts = Some(read_timestamp(&mut reader, 0b01)?);
                optional_bytes_remaining -= 5;
            }
        }
        _ => {
            return Err(DemuxError::InvalidData(
                "forbidden PTS_DTS_flags value 01".into(),
            ))
        }
    }

    // ESCR, ES rate, trick mode, copy info, CRC and extension are not used
    reader.skip_bytes(optional_bytes_remaining)?;

    let remaining = reader.data();
    let payload = if header.packet_length != 0 {
        let data_length = (header.packet_length as usize)
            .checked_sub(3 + header.header_data_length as usize)
            .ok_or_else(|| {
                DemuxError::InvalidData(format!(
                    "PES_packet_length {} shorter than its header",
                    header.packet_length
                ))
            })?;
        if data_length > remaining.len() {
            return Err(DemuxError::InvalidData(format!(
                "PES declares {} payload bytes, only {} received",
                data_length,
                remaining.len()
            )));
        }
        &remaining[..data_length]
    } else {
        remaining
    };

    Ok(PESPacket { header, payload })
}

/// Decodes a 5-byte PTS/DTS field: 4-bit prefix, then 3 + 15 + 15 bits each
/// followed by a marker bit that must be 1.
pub fn read_timestamp(reader: &mut BitReader, prefix: u8) -> Result<u64> {
    let found = reader.read_bits(4)? as u8;
    if found != prefix {
        return Err(DemuxError::InvalidData(format!(
            "timestamp prefix {:04b}, expected {:04b}",
            found, prefix
        )));
    }

    let mut value = 0u64;
    for width in [3, 15, 15] {
        value = (value << width) | reader.read_bits(width)? as u64;
        if !reader.read_bit()? {
            return Err(DemuxError::InvalidData("timestamp marker bit not set".into()));
        }
    }
    Ok(value)
}
