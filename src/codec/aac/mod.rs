//! AAC framing helpers: ADTS header parsing, `esds` construction and ADTS
//! stripping for access units.

/// ADTS parsing and codec-config extraction
pub mod parser;
/// ADTS header and configuration types
pub mod types;

pub use parser::*;
pub use types::*;
