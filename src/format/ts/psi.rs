//! Program Specific Information: PAT and PMT sections.
//!
//! Both parsers expect the reader to sit on `table_id`, the pointer field
//! already consumed, and accept one section that fits in the bytes given.

use super::types::*;
use crate::error::{DemuxError, Result};
use crate::utils::{BitReader, Crc32Mpeg2};

/// Skips the pointer field that precedes a section in a packet with
/// `payload_unit_start_indicator` set.
pub fn skip_pointer_field(reader: &mut BitReader) -> Result<()> {
    let pointer = reader.read_bits(8)? as usize;
    reader.skip_bytes(pointer)
}

/// Common section header; returns `section_length`.
fn read_section_header(reader: &mut BitReader, table_id: u8, verify_crc: bool) -> Result<usize> {
    let start = reader.data();

    let found = reader.read_bits(8)? as u8;
    if found != table_id {
        return Err(DemuxError::InvalidData(format!(
            "expected table_id 0x{:02x}, found 0x{:02x}",
            table_id, found
        )));
    }
    if !reader.read_bit()? {
        return Err(DemuxError::InvalidData(
            "section_syntax_indicator not set".into(),
        ));
    }
    reader.skip_bits(3)?; // '0' + reserved

    let section_length = reader.read_bits(12)? as usize;
    if section_length & 0xC00 != 0 || section_length > MAX_SECTION_LENGTH {
        return Err(DemuxError::InvalidData(format!(
            "section_length {} out of range",
            section_length
        )));
    }
    if section_length * 8 > reader.available_bits() {
        return Err(DemuxError::InvalidData(format!(
            "section of {} bytes does not fit in {} remaining bytes",
            section_length,
            reader.available_bits() / 8
        )));
    }

    if verify_crc && !Crc32Mpeg2::verify(&start[..3 + section_length]) {
        return Err(DemuxError::InvalidData(format!(
            "CRC mismatch in section with table_id 0x{:02x}",
            table_id
        )));
    }

    Ok(section_length)
}

/// Parses a program association section.
pub fn parse_pat(reader: &mut BitReader, verify_crc: bool) -> Result<PAT> {
    let section_length = read_section_header(reader, TABLE_ID_PAT, verify_crc)?;
    if section_length < 9 {
        return Err(DemuxError::InvalidData(format!(
            "PAT section_length {} too short",
            section_length
        )));
    }

    let transport_stream_id = reader.read_bits(16)? as u16;
    reader.skip_bits(2)?; // reserved
    let version = reader.read_bits(5)? as u8;
    reader.skip_bits(1)?; // current_next_indicator
    reader.skip_bits(16)?; // section_number, last_section_number

    let entry_bytes = section_length - 5 - 4;
    if entry_bytes % 4 != 0 {
        return Err(DemuxError::InvalidData(format!(
            "PAT program loop of {} bytes is not a multiple of 4",
            entry_bytes
        )));
    }

    let mut entries = Vec::with_capacity(entry_bytes / 4);
    for _ in 0..entry_bytes / 4 {
        let program_number = reader.read_bits(16)? as u16;
        reader.skip_bits(3)?; // reserved
        let program_map_pid = reader.read_bits(13)? as u16;
        entries.push(PATEntry {
            program_number,
            program_map_pid,
        });
    }
    reader.skip_bits(32)?; // CRC_32

    Ok(PAT {
        transport_stream_id,
        version,
        entries,
    })
}

/// Parses a program map section. Descriptors are skipped.
pub fn parse_pmt(reader: &mut BitReader, verify_crc: bool) -> Result<PMT> {
    let section_length = read_section_header(reader, TABLE_ID_PMT, verify_crc)?;
    if section_length < 13 {
        return Err(DemuxError::InvalidData(format!(
            "PMT section_length {} too short",
            section_length
        )));
    }

    let program_number = reader.read_bits(16)? as u16;
    reader.skip_bits(2)?; // reserved
    let version = reader.read_bits(5)? as u8;
    reader.skip_bits(1)?; // current_next_indicator
    reader.skip_bits(16)?; // section_number, last_section_number
    reader.skip_bits(3)?; // reserved
    let pcr_pid = reader.read_bits(13)? as u16;
    reader.skip_bits(4)?; // reserved
    let program_info_length = reader.read_bits(12)? as usize;

    let mut info_bytes_remaining = (section_length - 9)
        .checked_sub(program_info_length + 4)
        .ok_or_else(|| {
            DemuxError::InvalidData(format!(
                "program_info_length {} exceeds section_length {}",
                program_info_length, section_length
            ))
        })?;
    reader.skip_bytes(program_info_length)?;

    let mut elementary_stream_infos = Vec::new();
    while info_bytes_remaining > 0 {
        if info_bytes_remaining < 5 {
            return Err(DemuxError::InvalidData(format!(
                "{} trailing bytes in PMT stream loop",
                info_bytes_remaining
            )));
        }
        let stream_type = reader.read_bits(8)? as u8;
        reader.skip_bits(3)?; // reserved
        let elementary_pid = reader.read_bits(13)? as u16;
        reader.skip_bits(4)?; // reserved
        let es_info_length = reader.read_bits(12)? as usize;

        info_bytes_remaining = info_bytes_remaining
            .checked_sub(5 + es_info_length)
            .ok_or_else(|| {
                DemuxError::InvalidData(format!(
                    "ES_info_length {} overruns PMT section",
                    es_info_length
                ))
            })?;
        reader.skip_bytes(es_info_length)?;

        elementary_stream_infos.push(ElementaryStreamInfo {
            stream_type,
            elementary_pid,
        });
    }
    reader.skip_bits(32)?; // CRC_32

    Ok(PMT {
        program_number,
        version,
        pcr_pid,
        elementary_stream_infos,
    })
}
