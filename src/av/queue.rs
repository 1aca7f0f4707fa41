//! # Access unit queue
//!
//! A per-stream FIFO shared between the demuxer thread (producer) and a
//! playback thread (consumer).
//!
//! ```text
//! ┌───────────────┐ enqueue ┌────────────────┐ dequeue ┌────────┐
//! │ StreamDemuxer │────────►│ AccessUnitQueue│────────►│ Player │
//! └───────────────┘         └────────────────┘         └────────┘
//! ```
//!
//! All methods take one mutex. [`AccessUnitQueue::dequeue`] is the only call
//! that blocks; it waits on a condition variable that `enqueue`,
//! `enqueue_discontinuity` and `signal_end_of_stream` notify.

use super::{AccessUnit, MediaFormat};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use thiserror::Error;

/// Why the consumer has to resynchronize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscontinuityType {
    /// The source jumped; decoder state must be flushed.
    Seek,
    /// The stream format changed; the format record must be fetched again.
    FormatChange,
}

/// A discontinuity marker as it travels through the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Discontinuity {
    pub kind: DiscontinuityType,
    /// Media time playback resumes at, when the source knows it.
    pub resume_at_us: Option<i64>,
}

impl Discontinuity {
    pub fn new(kind: DiscontinuityType) -> Self {
        Self {
            kind,
            resume_at_us: None,
        }
    }

    pub fn seek() -> Self {
        Self::new(DiscontinuityType::Seek)
    }

    pub fn format_change() -> Self {
        Self::new(DiscontinuityType::FormatChange)
    }

    pub fn with_resume_at(mut self, resume_at_us: i64) -> Self {
        self.resume_at_us = Some(resume_at_us);
        self
    }
}

/// Terminal status of a stream. There is no "OK" value; a live stream simply
/// has none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FinalStatus {
    EndOfStream,
    Error,
}

/// Everything other than data that can come out of a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReadError {
    /// Queue is empty and the stream is still live.
    #[error("no access unit available yet")]
    WouldBlock,

    #[error("discontinuity: {0:?}")]
    Discontinuity(Discontinuity),

    #[error("end of stream: {0:?}")]
    EndOfStream(FinalStatus),
}

#[derive(Debug)]
enum Entry {
    Unit(AccessUnit),
    Marker(Discontinuity),
}

#[derive(Debug, Default)]
struct State {
    entries: VecDeque<Entry>,
    eos: Option<FinalStatus>,
    format: Option<MediaFormat>,
}

/// Thread-safe queue of access units for one elementary stream.
#[derive(Debug, Default)]
pub struct AccessUnitQueue {
    state: Mutex<State>,
    ready_cond: Condvar,
}

impl AccessUnitQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a unit. Damaged units are dropped, and so is anything arriving
    /// after end of stream.
    pub fn enqueue(&self, unit: AccessUnit) {
        if unit.damaged {
            log::debug!("dropping damaged access unit at {}us", unit.pts_us);
            return;
        }

        let mut state = self.state.lock();
        if let Some(status) = state.eos {
            log::warn!(
                "access unit at {}us queued after end of stream ({:?}), ignored",
                unit.pts_us,
                status
            );
            return;
        }

        state.entries.push_back(Entry::Unit(unit));
        self.ready_cond.notify_one();
    }

    /// Purges queued data, reopens an ended stream and appends the marker.
    ///
    /// Earlier markers survive the purge so the consumer still sees every
    /// resynchronization point.
    pub fn enqueue_discontinuity(&self, discontinuity: Discontinuity) {
        let mut state = self.state.lock();
        state
            .entries
            .retain(|entry| matches!(entry, Entry::Marker(_)));
        state.eos = None;
        if discontinuity.kind == DiscontinuityType::FormatChange {
            state.format = None;
        }
        state.entries.push_back(Entry::Marker(discontinuity));
        self.ready_cond.notify_one();
    }

    /// Ends the stream. Blocked consumers wake up, drain what is left and
    /// then get `status`.
    pub fn signal_end_of_stream(&self, status: FinalStatus) {
        let mut state = self.state.lock();
        state.eos = Some(status);
        self.ready_cond.notify_all();
    }

    /// Takes the oldest entry, waiting for one if the stream is live.
    pub fn dequeue(&self) -> Result<AccessUnit, ReadError> {
        let mut state = self.state.lock();
        while state.entries.is_empty() && state.eos.is_none() {
            self.ready_cond.wait(&mut state);
        }
        Self::pop(&mut state)
    }

    /// Non-blocking [`dequeue`](Self::dequeue).
    pub fn try_dequeue(&self) -> Result<AccessUnit, ReadError> {
        let mut state = self.state.lock();
        Self::pop(&mut state)
    }

    /// `Ok(true)` when an entry is queued, `Ok(false)` when empty but live,
    /// `Err(status)` when empty and ended.
    pub fn has_available(&self) -> Result<bool, FinalStatus> {
        let state = self.state.lock();
        if !state.entries.is_empty() {
            return Ok(true);
        }
        match state.eos {
            Some(status) => Err(status),
            None => Ok(false),
        }
    }

    /// Timestamp of the next unit without removing it.
    pub fn next_timestamp(&self) -> Result<i64, ReadError> {
        let state = self.state.lock();
        match state.entries.front() {
            Some(Entry::Unit(unit)) => Ok(unit.pts_us),
            Some(Entry::Marker(discontinuity)) => Err(ReadError::Discontinuity(*discontinuity)),
            None => Err(Self::empty_result(&state)),
        }
    }

    /// Current format record, if the stream has produced one.
    pub fn format(&self) -> Option<MediaFormat> {
        self.state.lock().format.clone()
    }

    pub fn set_format(&self, format: MediaFormat) {
        self.state.lock().format = Some(format);
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    fn pop(state: &mut State) -> Result<AccessUnit, ReadError> {
        match state.entries.pop_front() {
            Some(Entry::Unit(unit)) => Ok(unit),
            Some(Entry::Marker(discontinuity)) => Err(ReadError::Discontinuity(discontinuity)),
            None => Err(Self::empty_result(state)),
        }
    }

    fn empty_result(state: &State) -> ReadError {
        match state.eos {
            Some(status) => ReadError::EndOfStream(status),
            None => ReadError::WouldBlock,
        }
    }
}
