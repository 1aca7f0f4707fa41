use super::types::{AACConfig, ADTSHeader, ProfileType, ADTS_HEADER_SIZE};
use crate::utils::BitReader;
use crate::{DemuxError, Result};
use bytes::{BufMut, Bytes, BytesMut};

/// ES descriptor prefix; the 2-byte AudioSpecificConfig follows it.
const ESDS_PREFIX: [u8; 22] = [
    0x03, 22, // ES_DescrTag
    0x00, 0x00, // ES_ID
    0x00, // streamDependenceFlag, URL_Flag, OCRstreamFlag
    0x04, 17, // DecoderConfigDescrTag
    0x40, // Audio ISO/IEC 14496-3
    0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x00, //
    0x05, 2, // DecSpecificInfoTag
];

/// Parses the 7-byte ADTS header at the start of `data`.
pub fn parse_adts_header(data: &[u8]) -> Result<ADTSHeader> {
    if data.len() < ADTS_HEADER_SIZE {
        return Err(DemuxError::Codec("ADTS header too short".into()));
    }

    let mut reader = BitReader::new(&data[..ADTS_HEADER_SIZE]);

    let sync_word = reader.read_bits(12)? as u16;
    if sync_word != 0xFFF {
        return Err(DemuxError::Codec("invalid ADTS sync word".into()));
    }

    Ok(ADTSHeader {
        sync_word,
        id: reader.read_bits(1)? as u8,
        layer: reader.read_bits(2)? as u8,
        protection_absent: reader.read_bit()?,
        profile: ProfileType::from(reader.read_bits(2)? as u8),
        sample_rate_index: reader.read_bits(4)? as u8,
        private_bit: reader.read_bit()?,
        channel_configuration: reader.read_bits(3)? as u8,
        original_copy: reader.read_bit()?,
        home: reader.read_bit()?,
        copyright_id_bit: reader.read_bit()?,
        copyright_id_start: reader.read_bit()?,
        frame_length: reader.read_bits(13)? as u16,
        buffer_fullness: reader.read_bits(11)? as u16,
        number_of_raw_blocks: reader.read_bits(2)? as u8,
    })
}

/// Decoder configuration from the first ADTS header of a stream.
///
/// Rejects the reserved profile, sampling indices outside the table and
/// channel configuration 0 (configuration carried in-band via PCE).
pub fn parse_config(data: &[u8]) -> Result<AACConfig> {
    let header = parse_adts_header(data)?;

    if header.profile == ProfileType::Reserved {
        return Err(DemuxError::InvalidData("ADTS profile 3 is reserved".into()));
    }
    if header.sample_rate().is_none() {
        return Err(DemuxError::InvalidData(format!(
            "ADTS sampling frequency index {} out of range",
            header.sample_rate_index
        )));
    }
    if header.channel_configuration == 0 {
        return Err(DemuxError::Unsupported(
            "ADTS channel configuration 0".into(),
        ));
    }

    Ok(header.config())
}

/// Builds the `esds` payload for `config`.
///
/// The AudioSpecificConfig is `oooo offf fccc c000`: object type
/// (profile + 1), sampling index, channel configuration.
pub fn make_esds(config: &AACConfig) -> Bytes {
    let object_type = config.profile as u8 + 1;
    let index = config.sample_rate_index;

    let mut esds = BytesMut::with_capacity(ESDS_PREFIX.len() + 2);
    esds.put_slice(&ESDS_PREFIX);
    esds.put_u8((object_type << 3) | (index >> 1));
    esds.put_u8(((index << 7) & 0x80) | (config.channel_configuration << 3));
    esds.freeze()
}

/// Removes the ADTS header of every frame in `data` and concatenates the raw
/// frames.
///
/// Frames carrying more than one raw data block are refused rather than
/// split incorrectly.
pub fn strip_adts(data: &[u8]) -> Result<Bytes> {
    let mut out = BytesMut::with_capacity(data.len());
    let mut offset = 0;

    while offset < data.len() {
        let header = parse_adts_header(&data[offset..])?;

        if header.number_of_raw_blocks != 0 {
            return Err(DemuxError::Unsupported(format!(
                "ADTS frame with {} raw data blocks",
                header.number_of_raw_blocks as u32 + 1
            )));
        }

        let frame_length = header.frame_length as usize;
        let header_len = header.header_len();
        if frame_length < header_len || offset + frame_length > data.len() {
            return Err(DemuxError::InvalidData(format!(
                "ADTS frame length {} at offset {} does not fit {} bytes",
                frame_length,
                offset,
                data.len()
            )));
        }

        out.put_slice(&data[offset + header_len..offset + frame_length]);
        offset += frame_length;
    }

    Ok(out.freeze())
}


#[cfg(test)]
mod tests {
    use super::test_utils::adts_frame;
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_adts_header() {
        // AAC-LC, 44.1kHz, stereo, 1031 bytes
        let frame = adts_frame(1, 4, 2, &[0u8; 1024]);
        let header = parse_adts_header(&frame).unwrap();

        assert!(header.sync_word_valid());
        assert!(header.protection_absent);
        assert_eq!(header.profile, ProfileType::LC);
        assert_eq!(header.sample_rate(), Some(44_100));
        assert_eq!(header.channel_configuration, 2);
        assert_eq!(header.frame_length, 1031);
        assert_eq!(header.number_of_raw_blocks, 0);
        assert_eq!(header.header_len(), 7);
    }

    #[test]
    fn test_invalid_sync_word() {
        let data = [0x00, 0x00, 0x50, 0x80, 0x43, 0x80, 0x00];
        assert!(parse_adts_header(&data).is_err());
        assert!(parse_adts_header(&[0xFF, 0xF1]).is_err());
    }

    #[test]
    fn test_parse_config_rejections() {
        assert!(parse_config(&adts_frame(1, 3, 2, &[0; 4])).is_ok());
        assert!(matches!(
            parse_config(&adts_frame(3, 3, 2, &[0; 4])),
            Err(DemuxError::InvalidData(_))
        ));
        assert!(matches!(
            parse_config(&adts_frame(1, 3, 0, &[0; 4])),
            Err(DemuxError::Unsupported(_))
        ));
        assert!(parse_config(&adts_frame(1, 12, 2, &[0; 4])).is_err());
    }

    #[test]
    fn test_make_esds() {
        let config = AACConfig {
            profile: ProfileType::LC,
            sample_rate_index: 4,
            channel_configuration: 2,
        };
        let esds = make_esds(&config);
        assert_eq!(esds.len(), 24);
        assert_eq!(&esds[..2], &[0x03, 22]);
        // AAC-LC (2), 44.1kHz (4), stereo (2) => 0x12 0x10
        assert_eq!(&esds[22..], &[0x12, 0x10]);
    }

    #[test]
    fn test_strip_adts_concatenates_frames() {
        let mut data = adts_frame(1, 4, 2, &[1, 2, 3]);
        data.extend(adts_frame(1, 4, 2, &[4, 5]));
        assert_eq!(&strip_adts(&data).unwrap()[..], &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_strip_adts_with_crc() {
        let mut frame = adts_frame(1, 4, 2, &[0xAA, 0xBB, 9, 9]);
        // protection_absent = 0: two CRC bytes follow the header
        frame[1] = 0xF0;
        assert_eq!(&strip_adts(&frame).unwrap()[..], &[9, 9]);
    }

    #[test]
    fn test_strip_adts_refuses_multiple_raw_blocks() {
        let mut frame = adts_frame(1, 4, 2, &[1, 2, 3]);
        frame[6] |= 0x01;
        assert!(matches!(strip_adts(&frame), Err(DemuxError::Unsupported(_))));
    }

    #[test]
    fn test_strip_adts_truncated() {
        let frame = adts_frame(1, 4, 2, &[1, 2, 3]);
        assert!(matches!(
            strip_adts(&frame[..8]),
            Err(DemuxError::InvalidData(_))
        ));
    }
}
