/// Sampling frequencies addressed by `sampling_frequency_index` 0..=11.
pub const SAMPLE_RATES: [u32; 12] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000,
];

pub const ADTS_HEADER_SIZE: usize = 7;
pub const ADTS_HEADER_SIZE_WITH_CRC: usize = 9;

/// The 2-bit ADTS `profile` field (audio object type minus one).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileType {
    Main = 0,
    LC = 1,
    SSR = 2,
    Reserved = 3,
}

impl From<u8> for ProfileType {
    fn from(value: u8) -> Self {
        match value & 0x03 {
            0 => ProfileType::Main,
            1 => ProfileType::LC,
            2 => ProfileType::SSR,
            _ => ProfileType::Reserved,
        }
    }
}

/// Decoder configuration recovered from the first ADTS header of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AACConfig {
    pub profile: ProfileType,
    pub sample_rate_index: u8,
    pub channel_configuration: u8,
}

impl AACConfig {
    pub fn sample_rate(&self) -> u32 {
        SAMPLE_RATES[self.sample_rate_index as usize]
    }
}

/// ADTS fixed + variable header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ADTSHeader {
    pub sync_word: u16,             // 12 bits
    pub id: u8,                     // 1 bit, 0=MPEG-4, 1=MPEG-2
    pub layer: u8,                  // 2 bits
    pub protection_absent: bool,    // 1 bit
    pub profile: ProfileType,       // 2 bits
    pub sample_rate_index: u8,      // 4 bits
    pub private_bit: bool,          // 1 bit
    pub channel_configuration: u8,  // 3 bits
    pub original_copy: bool,        // 1 bit
    pub home: bool,                 // 1 bit
    pub copyright_id_bit: bool,     // 1 bit
    pub copyright_id_start: bool,   // 1 bit
    pub frame_length: u16,          // 13 bits, header included
    pub buffer_fullness: u16,       // 11 bits
    pub number_of_raw_blocks: u8,   // 2 bits
}

impl ADTSHeader {
    pub fn sync_word_valid(&self) -> bool {
        self.sync_word == 0xFFF
    }

    pub fn sample_rate(&self) -> Option<u32> {
        SAMPLE_RATES.get(self.sample_rate_index as usize).copied()
    }

    /// 7 bytes, or 9 when a CRC follows the header.
    pub fn header_len(&self) -> usize {
        if self.protection_absent {
            ADTS_HEADER_SIZE
        } else {
            ADTS_HEADER_SIZE_WITH_CRC
        }
    }

    pub fn config(&self) -> AACConfig {
        AACConfig {
            profile: self.profile,
            sample_rate_index: self.sample_rate_index,
            channel_configuration: self.channel_configuration,
        }
    }
}
