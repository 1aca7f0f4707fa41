// Stream IDs without the optional PES header (ISO/IEC 13818-1 2.4.3.7)
pub const STREAM_ID_PROGRAM_STREAM_MAP: u8 = 0xbc;
pub const STREAM_ID_PADDING: u8 = 0xbe;
pub const STREAM_ID_PRIVATE_STREAM_2: u8 = 0xbf;
pub const STREAM_ID_ECM: u8 = 0xf0;
pub const STREAM_ID_EMM: u8 = 0xf1;
pub const STREAM_ID_DSMCC: u8 = 0xf2;
pub const STREAM_ID_H222_1_TYPE_E: u8 = 0xf8;
pub const STREAM_ID_PROGRAM_STREAM_DIRECTORY: u8 = 0xff;

// PIDs
pub const PID_PAT: u16 = 0x0000;
pub const PID_NULL: u16 = 0x1fff;

// Table IDs
pub const TABLE_ID_PAT: u8 = 0x00;
pub const TABLE_ID_PMT: u8 = 0x02;

// Elementary Stream Types
pub const STREAM_TYPE_H264: u8 = 0x1b;
pub const STREAM_TYPE_AAC: u8 = 0x0f;

// Constants
pub const TS_PACKET_SIZE: usize = 188;
pub const SYNC_BYTE: u8 = 0x47;
pub const PES_START_CODE_PREFIX: u32 = 0x000001;
pub const MAX_SECTION_LENGTH: usize = 1021;

/// Stream IDs whose PES packets carry no optional header and no
/// elementary-stream payload we deliver.
pub fn stream_id_has_optional_header(stream_id: u8) -> bool {
    !matches!(
        stream_id,
        STREAM_ID_PROGRAM_STREAM_MAP
            | STREAM_ID_PADDING
            | STREAM_ID_PRIVATE_STREAM_2
            | STREAM_ID_ECM
            | STREAM_ID_EMM
            | STREAM_ID_DSMCC
            | STREAM_ID_H222_1_TYPE_E
            | STREAM_ID_PROGRAM_STREAM_DIRECTORY
    )
}

/// 90kHz clock ticks to microseconds, rounding down.
pub fn pts_to_us(pts: u64) -> i64 {
    (pts * 100 / 9) as i64
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TSHeader {
    pub sync_byte: u8, // Always 0x47
    pub transport_error: bool,
    pub payload_unit_start: bool,
    pub transport_priority: bool,
    pub pid: u16,
    pub scrambling_control: u8,
    pub adaptation_field_exists: bool,
    pub contains_payload: bool,
    pub continuity_counter: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdaptationField {
    pub length: usize,
    pub discontinuity: bool,
    pub random_access: bool,
    pub pcr: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PATEntry {
    pub program_number: u16,
    /// Network PID when `program_number` is 0, PMT PID otherwise.
    pub program_map_pid: u16,
}

impl PATEntry {
    pub fn is_network_pid(&self) -> bool {
        self.program_number == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PAT {
    pub transport_stream_id: u16,
    pub version: u8,
    pub entries: Vec<PATEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementaryStreamInfo {
    pub stream_type: u8,
    pub elementary_pid: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PMT {
    pub program_number: u16,
    pub version: u8,
    pub pcr_pid: u16,
    pub elementary_stream_infos: Vec<ElementaryStreamInfo>,
}
