use super::types::*;
use crate::error::{DemuxError, Result};
use crate::utils::BitReader;

/// Reads the 4-byte transport packet header.
pub fn parse_header(reader: &mut BitReader) -> Result<TSHeader> {
    let sync_byte = reader.read_bits(8)? as u8;
    if sync_byte != SYNC_BYTE {
        return Err(DemuxError::SyncByte(sync_byte));
    }

    let transport_error = reader.read_bit()?;
    let payload_unit_start = reader.read_bit()?;
    let transport_priority = reader.read_bit()?;
    let pid = reader.read_bits(13)? as u16;
    let scrambling_control = reader.read_bits(2)? as u8;
    let adaptation_field_control = reader.read_bits(2)?;
    let continuity_counter = reader.read_bits(4)? as u8;

    Ok(TSHeader {
        sync_byte,
        transport_error,
        payload_unit_start,
        transport_priority,
        pid,
        scrambling_control,
        adaptation_field_exists: adaptation_field_control & 0x2 != 0,
        contains_payload: adaptation_field_control & 0x1 != 0,
        continuity_counter,
    })
}

/// Reads the adaptation field and leaves the reader on the first payload byte.
///
/// Only the flags and the PCR are decoded; everything else inside the field
/// is skipped by its declared length.
pub fn parse_adaptation_field(reader: &mut BitReader) -> Result<AdaptationField> {
    let length = reader.read_bits(8)? as usize;
    if length * 8 > reader.available_bits() {
        return Err(DemuxError::InvalidData(format!(
            "adaptation field length {} exceeds packet",
            length
        )));
    }

    let mut field = AdaptationField {
        length,
        ..Default::default()
    };
    if length == 0 {
        return Ok(field);
    }

    let mut body = BitReader::new(&reader.data()[..length]);
    field.discontinuity = body.read_bit()?;
    field.random_access = body.read_bit()?;
    body.skip_bits(1)?; // elementary_stream_priority_indicator
    let pcr_flag = body.read_bit()?;
    body.skip_bits(4)?; // OPCR, splicing point, private data, extension

    if pcr_flag {
        let base = ((body.read_bits(1)? as u64) << 32) | body.read_bits(32)? as u64;
        body.skip_bits(6)?;
        let extension = body.read_bits(9)? as u64;
        field.pcr = Some(base * 300 + extension);
    }

    reader.skip_bytes(length)?;
    Ok(field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_ts_header() {
        let data = [0x47, 0x41, 0x01, 0x3A];
        let mut reader = BitReader::new(&data);
        let header = parse_header(&mut reader).unwrap();

        assert_eq!(
            header,
            TSHeader {
                sync_byte: 0x47,
                transport_error: false,
                payload_unit_start: true,
                transport_priority: false,
                pid: 0x101,
                scrambling_control: 0,
                adaptation_field_exists: true,
                contains_payload: true,
                continuity_counter: 0xA,
            }
        );
        assert_eq!(reader.available_bits(), 0);
    }

    #[test]
    fn test_bad_sync_byte() {
        let data = [0x48, 0x00, 0x00, 0x10];
        let mut reader = BitReader::new(&data);
        assert!(matches!(
            parse_header(&mut reader),
            Err(DemuxError::SyncByte(0x48))
        ));
    }

    #[test]
    fn test_adaptation_field_with_pcr() {
        // length 7, random access + PCR flag, PCR base 1, extension 2
        let data = [7, 0x50, 0x00, 0x00, 0x00, 0x00, 0xFE, 0x02, 0xAA];
        let mut reader = BitReader::new(&data);
        let field = parse_adaptation_field(&mut reader).unwrap();

        assert!(field.random_access);
        assert!(!field.discontinuity);
        assert_eq!(field.pcr, Some(300 + 2));
        assert_eq!(reader.data(), &[0xAA]);
    }

    #[test]
    fn test_adaptation_field_stuffing_only() {
        let data = [0, 0xAA];
        let mut reader = BitReader::new(&data);
        let field = parse_adaptation_field(&mut reader).unwrap();
        assert_eq!(field.length, 0);
        assert_eq!(reader.data(), &[0xAA]);

        let data = [5, 0x80, 0xFF];
        let mut reader = BitReader::new(&data);
        assert!(parse_adaptation_field(&mut reader).is_err());
    }
}
