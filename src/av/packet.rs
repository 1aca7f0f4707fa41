use bytes::Bytes;

/// One decodable unit of elementary-stream data.
///
/// The presentation timestamp is mandatory; a unit cannot be built without
/// one. Once queued the unit is never mutated, and dequeuing hands ownership
/// to the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessUnit {
    pub data: Bytes,
    /// Presentation time in microseconds.
    pub pts_us: i64,
    /// Decode time in microseconds, when the PES header carried one.
    pub dts_us: Option<i64>,
    pub is_key: bool,
    /// Set when transport errors hit the PES this unit came from.
    /// Damaged units are dropped by the queue.
    pub damaged: bool,
}

impl AccessUnit {
    pub fn new(data: impl Into<Bytes>, pts_us: i64) -> Self {
        Self {
            data: data.into(),
            pts_us,
            dts_us: None,
            is_key: false,
            damaged: false,
        }
    }

    pub fn with_dts(mut self, dts_us: i64) -> Self {
        self.dts_us = Some(dts_us);
        self
    }

    pub fn with_key_flag(mut self, is_key: bool) -> Self {
        self.is_key = is_key;
        self
    }

    pub fn with_damaged(mut self, damaged: bool) -> Self {
        self.damaged = damaged;
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
