use super::types::{NALUnit, NALUnitType, SPSInfo};
use crate::utils::BitReader;
use crate::{DemuxError, Result};
use bytes::{BufMut, Bytes, BytesMut};

const HIGH_PROFILES: [u8; 10] = [100, 110, 122, 244, 44, 83, 86, 118, 128, 138];

/// Splits an Annex-B byte stream into NAL units.
///
/// Accepts both `00 00 01` and `00 00 00 01` start codes. Bytes before the
/// first start code are ignored, as are the zero bytes padding a NAL unit
/// before the next start code.
pub fn split_nal_units(data: &[u8]) -> Vec<NALUnit<'_>> {
    let mut starts = Vec::new();
    let mut i = 0;
    while i + 3 <= data.len() {
        if data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 1 {
            starts.push((i, i + 3));
            i += 3;
        } else {
            i += 1;
        }
    }

    let mut units = Vec::with_capacity(starts.len());
    for (n, &(_, payload_start)) in starts.iter().enumerate() {
        let mut end = starts
            .get(n + 1)
            .map_or(data.len(), |&(next_code, _)| next_code);
        while end > payload_start && data[end - 1] == 0 && n + 1 < starts.len() {
            end -= 1;
        }
        if let Some(unit) = NALUnit::new(&data[payload_start..end]) {
            units.push(unit);
        }
    }
    units
}

/// First SPS and first PPS found in an Annex-B payload.
pub fn find_parameter_sets(data: &[u8]) -> (Option<&[u8]>, Option<&[u8]>) {
    let mut sps = None;
    let mut pps = None;
    for unit in split_nal_units(data) {
        match unit.unit_type() {
            NALUnitType::SPS if sps.is_none() => sps = Some(unit.data),
            NALUnitType::PPS if pps.is_none() => pps = Some(unit.data),
            _ => {}
        }
    }
    (sps, pps)
}

/// Whether the payload carries an IDR slice.
pub fn contains_idr(data: &[u8]) -> bool {
    split_nal_units(data).iter().any(NALUnit::is_keyframe)
}

/// Drops the `03` of every `00 00 03` emulation-prevention sequence.
pub fn remove_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut zeros = 0;
    for &byte in data {
        if zeros >= 2 && byte == 0x03 {
            zeros = 0;
            continue;
        }
        zeros = if byte == 0 { zeros + 1 } else { 0 };
        out.push(byte);
    }
    out
}

/// Parses an SPS NAL unit (header byte included) far enough to get the
/// profile, level and cropped picture size.
pub fn parse_sps(nal: &[u8]) -> Result<SPSInfo> {
    let unit = NALUnit::new(nal).ok_or_else(|| DemuxError::Codec("empty SPS".into()))?;
    if unit.unit_type() != NALUnitType::SPS {
        return Err(DemuxError::Codec(format!(
            "NAL type {} is not an SPS",
            unit.nal_type
        )));
    }

    let rbsp = remove_emulation_prevention(&nal[1..]);
    let mut reader = BitReader::new(&rbsp);

    let profile_idc = reader.read_bits(8)? as u8;
    let constraint_flags = reader.read_bits(8)? as u8;
    let level_idc = reader.read_bits(8)? as u8;
    reader.read_golomb()?; // seq_parameter_set_id

    let mut chroma_format_idc = 1;
    let mut separate_colour_plane = false;
    if HIGH_PROFILES.contains(&profile_idc) {
        chroma_format_idc = reader.read_golomb()?;
        if chroma_format_idc == 3 {
            separate_colour_plane = reader.read_bit()?;
        }
        reader.read_golomb()?; // bit_depth_luma_minus8
        reader.read_golomb()?; // bit_depth_chroma_minus8
        reader.skip_bits(1)?; // qpprime_y_zero_transform_bypass_flag

        if reader.read_bit()? {
            let count = if chroma_format_idc != 3 { 8 } else { 12 };
            for i in 0..count {
                if reader.read_bit()? {
                    skip_scaling_list(&mut reader, if i < 6 { 16 } else { 64 })?;
                }
            }
        }
    }

    reader.read_golomb()?; // log2_max_frame_num_minus4
    match reader.read_golomb()? {
        0 => {
            reader.read_golomb()?; // log2_max_pic_order_cnt_lsb_minus4
        }
        1 => {
            reader.skip_bits(1)?; // delta_pic_order_always_zero_flag
            reader.read_signed_golomb()?; // offset_for_non_ref_pic
            reader.read_signed_golomb()?; // offset_for_top_to_bottom_field
            let cycle = reader.read_golomb()?;
            for _ in 0..cycle {
                reader.read_signed_golomb()?;
            }
        }
        _ => {}
    }

    reader.read_golomb()?; // max_num_ref_frames
    reader.skip_bits(1)?; // gaps_in_frame_num_value_allowed_flag

    let pic_width_in_mbs = reader.read_golomb()? as u64 + 1;
    let pic_height_in_map_units = reader.read_golomb()? as u64 + 1;
    let frame_mbs_only = reader.read_bit()?;
    if !frame_mbs_only {
        reader.skip_bits(1)?; // mb_adaptive_frame_field_flag
    }
    reader.skip_bits(1)?; // direct_8x8_inference_flag

    let field_factor: u64 = if frame_mbs_only { 1 } else { 2 };
    let mut width = pic_width_in_mbs * 16;
    let mut height = field_factor * pic_height_in_map_units * 16;

    if reader.read_bit()? {
        let left = reader.read_golomb()? as u64;
        let right = reader.read_golomb()? as u64;
        let top = reader.read_golomb()? as u64;
        let bottom = reader.read_golomb()? as u64;

        let (crop_x, crop_y) = if separate_colour_plane || chroma_format_idc == 0 {
            (1, field_factor)
        } else {
            let sub_width = if chroma_format_idc == 3 { 1 } else { 2 };
            let sub_height = if chroma_format_idc == 1 { 2 } else { 1 };
            (sub_width, sub_height * field_factor)
        };

        width = width
            .checked_sub(crop_x * (left + right))
            .ok_or_else(|| DemuxError::Codec("SPS horizontal crop exceeds width".into()))?;
        height = height
            .checked_sub(crop_y * (top + bottom))
            .ok_or_else(|| DemuxError::Codec("SPS vertical crop exceeds height".into()))?;
    }

    Ok(SPSInfo {
        profile_idc,
        constraint_flags,
        level_idc,
        width: u32::try_from(width).map_err(|_| DemuxError::Codec("SPS width overflow".into()))?,
        height: u32::try_from(height)
            .map_err(|_| DemuxError::Codec("SPS height overflow".into()))?,
    })
}

fn skip_scaling_list(reader: &mut BitReader, size: usize) -> Result<()> {
    let mut last_scale = 8;
    let mut next_scale = 8;

    for _ in 0..size {
        if next_scale != 0 {
            let delta_scale = reader.read_signed_golomb()?;
            if !(-128..=127).contains(&delta_scale) {
                return Err(DemuxError::Codec(format!(
                    "scaling list delta {} out of range",
                    delta_scale
                )));
            }
            next_scale = (last_scale + delta_scale + 256) % 256;
        }
        last_scale = if next_scale == 0 { last_scale } else { next_scale };
    }

    Ok(())
}

/// Builds an `avcC` (AVCDecoderConfigurationRecord) carrying one SPS and one
/// PPS, with 4-byte NAL length fields.
pub fn make_avc_config(sps: &[u8], pps: &[u8]) -> Result<Bytes> {
    if sps.len() < 4 {
        return Err(DemuxError::Codec("SPS too short for avcC".into()));
    }
    let sps_len = u16::try_from(sps.len()).map_err(|_| DemuxError::Codec("SPS too large".into()))?;
    let pps_len = u16::try_from(pps.len()).map_err(|_| DemuxError::Codec("PPS too large".into()))?;

    let mut avcc = BytesMut::with_capacity(11 + sps.len() + pps.len());
    avcc.put_u8(0x01); // configurationVersion
    avcc.put_slice(&sps[1..4]); // profile, compatibility, level
    avcc.put_u8(0xFC | 0x03); // lengthSizeMinusOne = 3
    avcc.put_u8(0xE0 | 0x01); // one SPS
    avcc.put_u16(sps_len);
    avcc.put_slice(sps);
    avcc.put_u8(0x01); // one PPS
    avcc.put_u16(pps_len);
    avcc.put_slice(pps);
    Ok(avcc.freeze())
}
