#![doc(html_root_url = "https://docs.rs/tsdemux/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

//! # tsdemux - MPEG-2 Transport Stream demuxer
//!
//! `tsdemux` turns a stream of 188-byte MPEG-2 TS packets into per-stream
//! queues of timestamped access units, ready for a decoder.
//!
//! ## Features
//!
//! - PAT/PMT parsing with optional CRC32 checks
//! - PES reassembly across TS packets, PTS/DTS decoding
//! - H.264: SPS/PPS discovery, picture size, `avcC` record
//! - AAC: ADTS parsing, `esds` record, ADTS header stripping
//! - Thread-safe access unit queues with discontinuity and end-of-stream
//!   signalling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tsdemux::av::{MediaKind, ReadError};
//! use tsdemux::config::DemuxerConfig;
//! use tsdemux::format::ts::{TSReader, TransportDemuxer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let file = tokio::fs::File::open("capture.ts").await?;
//!     let demuxer = TransportDemuxer::with_config(DemuxerConfig::load()?);
//!     let mut reader = TSReader::new(file, demuxer);
//!     reader.run().await?;
//!
//!     if let Some(audio) = reader.get_source(MediaKind::Audio) {
//!         loop {
//!             match audio.dequeue() {
//!                 Ok(unit) => println!("{} bytes at {}us", unit.len(), unit.pts_us),
//!                 Err(ReadError::Discontinuity(d)) => println!("discontinuity {:?}", d.kind),
//!                 Err(_) => break,
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - `av`: access units, media formats and the per-stream queue
//! - `codec`: H.264 and AAC configuration extraction
//! - `format`: the transport stream demuxer
//! - `config`: runtime knobs from files and environment
//! - `error`: error type and `Result` alias
//! - `utils`: bit reader and CRC32

/// Access units, formats and queues
pub mod av;

/// H.264 and AAC codec helpers
pub mod codec;

/// Configuration module
pub mod config;

/// Error types and utilities
pub mod error;

/// Container formats
pub mod format;

/// Common utilities and helper functions
pub mod utils;

pub use error::{DemuxError, Result};
