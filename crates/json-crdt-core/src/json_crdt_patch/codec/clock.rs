//! Clock table codec: compresses timestamps into `(session index, time
//! difference)` pairs relative to a per-document table of session clocks.
//!
//! Index `0` is reserved for the system session and decodes to
//! `(SESSION::SYSTEM, diff)`. Index `1` is always the local session.

use std::collections::HashMap;

use crate::json_crdt_patch::clock::{ClockVector, Ts};
use crate::json_crdt_patch::enums::SESSION;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelativeTimestamp {
    pub session_index: u64,
    pub time_diff: u64,
}

/// Assigns table slots to sessions as their timestamps are written.
///
/// Owned by the caller and reusable: call [`ClockEncoder::reset`] with the
/// document clock before each document.
#[derive(Debug, Clone, Default)]
pub struct ClockEncoder {
    slots: HashMap<u64, (u64, Ts)>,
    order: Vec<Ts>,
    local_time: u64,
    peers: HashMap<u64, Ts>,
}

impl ClockEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self, clock: &ClockVector) {
        self.slots.clear();
        self.order.clear();
        self.peers = clock.peers.clone();
        self.local_time = clock.time.saturating_sub(1);
        self.insert(Ts::new(clock.sid, self.local_time));
    }

    fn insert(&mut self, reference: Ts) -> (u64, Ts) {
        let slot = (self.order.len() as u64 + 1, reference);
        self.slots.insert(reference.sid, slot);
        self.order.push(reference);
        slot
    }

    /// Relative form of `stamp`. Sessions are added to the table on first
    /// use, with the last time the clock observed from them as reference.
    pub fn append(&mut self, stamp: Ts) -> RelativeTimestamp {
        if stamp.sid == SESSION::SYSTEM {
            return RelativeTimestamp { session_index: 0, time_diff: stamp.time };
        }
        let (index, reference) = match self.slots.get(&stamp.sid) {
            Some(slot) => *slot,
            None => {
                let reference = self
                    .peers
                    .get(&stamp.sid)
                    .copied()
                    .unwrap_or(Ts::new(stamp.sid, self.local_time));
                self.insert(reference)
            }
        };
        debug_assert!(stamp.time <= reference.time, "timestamp {stamp} ahead of its clock");
        RelativeTimestamp {
            session_index: index,
            time_diff: reference.time.saturating_sub(stamp.time),
        }
    }

    /// Table entries in slot order.
    pub fn table(&self) -> &[Ts] {
        &self.order
    }
}

/// Rebuilds absolute timestamps and the document clock from a table.
#[derive(Debug, Clone)]
pub struct ClockDecoder {
    table: Vec<Ts>,
    pub clock: ClockVector,
}

impl ClockDecoder {
    /// Seeds the decoder with the local session's last issued time.
    pub fn new(sid: u64, time: u64) -> Self {
        Self {
            table: vec![Ts::new(sid, time)],
            clock: ClockVector::new(sid, time + 1),
        }
    }

    pub fn push_tuple(&mut self, sid: u64, time: u64) {
        let id = Ts::new(sid, time);
        self.clock.observe(id, 1);
        self.table.push(id);
    }

    /// `None` when the index is outside the table or the difference
    /// underflows.
    pub fn decode_id(&self, session_index: u64, time_diff: u64) -> Option<Ts> {
        if session_index == 0 {
            return Some(Ts::new(SESSION::SYSTEM, time_diff));
        }
        let reference = self.table.get(usize::try_from(session_index - 1).ok()?)?;
        Some(Ts::new(reference.sid, reference.time.checked_sub(time_diff)?))
    }
}
