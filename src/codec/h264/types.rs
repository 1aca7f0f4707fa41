/// A NAL unit borrowed from an Annex-B byte stream, start code removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NALUnit<'a> {
    pub nal_type: u8,
    pub nal_ref_idc: u8,
    pub data: &'a [u8],
}

impl<'a> NALUnit<'a> {
    /// `None` for an empty slice.
    pub fn new(data: &'a [u8]) -> Option<Self> {
        let header = *data.first()?;
        Some(Self {
            nal_type: header & 0x1F,
            nal_ref_idc: (header >> 5) & 0x03,
            data,
        })
    }

    pub fn unit_type(&self) -> NALUnitType {
        NALUnitType::from(self.nal_type)
    }

    pub fn is_keyframe(&self) -> bool {
        self.unit_type() == NALUnitType::CodedSliceIDR
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SPSInfo {
    pub profile_idc: u8,
    pub constraint_flags: u8,
    pub level_idc: u8,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NALUnitType {
    Unspecified = 0,
    CodedSliceNonIDR = 1,
    CodedSliceDataPartitionA = 2,
    CodedSliceDataPartitionB = 3,
    CodedSliceDataPartitionC = 4,
    CodedSliceIDR = 5,
    SEI = 6,
    SPS = 7,
    PPS = 8,
    AccessUnitDelimiter = 9,
    EndOfSequence = 10,
    EndOfStream = 11,
    FillerData = 12,
}

impl From<u8> for NALUnitType {
    fn from(value: u8) -> Self {
        match value {
            1 => NALUnitType::CodedSliceNonIDR,
            2 => NALUnitType::CodedSliceDataPartitionA,
            3 => NALUnitType::CodedSliceDataPartitionB,
            4 => NALUnitType::CodedSliceDataPartitionC,
            5 => NALUnitType::CodedSliceIDR,
            6 => NALUnitType::SEI,
            7 => NALUnitType::SPS,
            8 => NALUnitType::PPS,
            9 => NALUnitType::AccessUnitDelimiter,
            10 => NALUnitType::EndOfSequence,
            11 => NALUnitType::EndOfStream,
            12 => NALUnitType::FillerData,
            _ => NALUnitType::Unspecified,
        }
    }
}
