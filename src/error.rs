use std::num::ParseIntError;
use thiserror::Error;

/// Errors produced while parsing a transport stream.
///
/// Every variant is scoped to the unit being parsed (one TS packet, one PSI
/// section or one PES packet). The demuxer stays usable after any of them.
#[derive(Error, Debug)]
pub enum DemuxError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid packet size: expected 188 bytes, got {0}")]
    InvalidPacketSize(usize),

    #[error("invalid sync byte: 0x{0:02x}")]
    SyncByte(u8),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("parser error: {0}")]
    Parser(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("parse int error: {0}")]
    ParseInt(#[from] ParseIntError),
}

pub type Result<T> = std::result::Result<T, DemuxError>;
