//! Container formats. Only MPEG-2 Transport Stream is implemented.

pub mod ts;
