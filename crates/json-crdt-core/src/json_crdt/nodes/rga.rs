//! Replicated Growable Array over a linear chunk list.
//!
//! A chunk is a run of items with consecutive timestamps `id, id+1, ...`
//! that are either all live or all deleted. Tombstones keep their id and span
//! so every timestamp ever inserted stays addressable.

use crate::json_crdt_patch::clock::{contains_id, interval, tick, Ts, Tss};

/// Payload of a chunk: something that can be measured, split and extended.
pub trait ChunkData: Clone {
    /// Number of items (clock ticks) the payload covers.
    fn span(&self) -> u64;

    /// Keeps items `[0, at)` in `self` and returns items `[at, len)`.
    fn split_at_offset(&mut self, at: usize) -> Self;

    fn append(&mut self, other: Self);
}

impl ChunkData for String {
    fn span(&self) -> u64 {
        self.chars().count() as u64
    }

    fn split_at_offset(&mut self, at: usize) -> Self {
        let byte_pos = self.char_indices().nth(at).map_or(self.len(), |(i, _)| i);
        self.split_off(byte_pos)
    }

    fn append(&mut self, other: Self) {
        self.push_str(&other);
    }
}

impl<T: Clone> ChunkData for Vec<T> {
    fn span(&self) -> u64 {
        self.len() as u64
    }

    fn split_at_offset(&mut self, at: usize) -> Self {
        self.split_off(at)
    }

    fn append(&mut self, mut other: Self) {
        Vec::append(self, &mut other);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk<T> {
    pub id: Ts,
    pub span: u64,
    /// `None` for a tombstone.
    pub data: Option<T>,
}

impl<T> Chunk<T> {
    pub fn is_deleted(&self) -> bool {
        self.data.is_none()
    }

    /// Live item count.
    pub fn len(&self) -> u64 {
        if self.is_deleted() {
            0
        } else {
            self.span
        }
    }

    pub fn contains(&self, stamp: Ts) -> bool {
        contains_id(self.id, self.span, stamp)
    }

    pub fn last(&self) -> Ts {
        self.id.edge(self.span)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rga<T> {
    pub chunks: Vec<Chunk<T>>,
}

impl<T> Default for Rga<T> {
    fn default() -> Self {
        Self { chunks: Vec::new() }
    }
}

impl<T: ChunkData> Rga<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_by_id(&self, stamp: Ts) -> Option<usize> {
        self.chunks.iter().position(|c| c.contains(stamp))
    }

    /// Inserts `data` as items `id, id+1, ...` right after the item `after`,
    /// or at the head when `after` is `None`.
    ///
    /// Returns `false` when the insert was dropped: its id is already present
    /// or the anchor is unknown.
    pub fn insert(&mut self, after: Option<Ts>, id: Ts, data: T) -> bool {
        let span = data.span();
        if span == 0 || self.find_by_id(id).is_some() {
            return false;
        }
        let mut pos = match after {
            None => 0,
            Some(anchor) => {
                let Some(idx) = self.find_by_id(anchor) else {
                    return false;
                };
                let offset = anchor.time - self.chunks[idx].id.time + 1;
                self.split(idx, offset);
                idx + 1
            }
        };
        let skipped = self.chunks[pos..].iter().take_while(|c| c.id > id).count();
        if skipped == 0 && pos > 0 && self.try_extend(pos - 1, after, id, &data) {
            return true;
        }
        pos += skipped;
        self.chunks.insert(pos, Chunk { id, span, data: Some(data) });
        true
    }

    /// Appends in place when the new items directly continue the live chunk
    /// they are anchored on.
    fn try_extend(&mut self, idx: usize, after: Option<Ts>, id: Ts, data: &T) -> bool {
        let prev = &mut self.chunks[idx];
        let continues = after == Some(prev.last()) && tick(prev.id, prev.span) == id;
        match &mut prev.data {
            Some(existing) if continues => {
                existing.append(data.clone());
                prev.span += data.span();
                true
            }
            _ => false,
        }
    }

    /// Splits chunk `idx` so that its first `at` items stay in place and the
    /// rest move into a new chunk right after it. No-op at the edges.
    fn split(&mut self, idx: usize, at: u64) {
        let chunk = &mut self.chunks[idx];
        if at == 0 || at >= chunk.span {
            return;
        }
        let right = Chunk {
            id: tick(chunk.id, at),
            span: chunk.span - at,
            data: chunk.data.as_mut().map(|d| d.split_at_offset(at as usize)),
        };
        chunk.span = at;
        self.chunks.insert(idx + 1, right);
    }

    /// Tombstones exactly the items covered by `spans`. Returns `true` when
    /// any live item was deleted.
    pub fn delete(&mut self, spans: &[Tss]) -> bool {
        let mut changed = false;
        for range in spans {
            let (start, end) = (range.time, range.time.saturating_add(range.span));
            let mut i = 0;
            while i < self.chunks.len() {
                let chunk = &self.chunks[i];
                let (c_start, c_end) = (chunk.id.time, tick(chunk.id, chunk.span).time);
                if chunk.id.sid != range.sid || c_start >= end || c_end <= start {
                    i += 1;
                    continue;
                }
                if start > c_start {
                    self.split(i, start - c_start);
                    i += 1;
                }
                let c_end = tick(self.chunks[i].id, self.chunks[i].span).time;
                if end < c_end {
                    let at = end - self.chunks[i].id.time;
                    self.split(i, at);
                }
                if self.chunks[i].data.take().is_some() {
                    changed = true;
                }
                i += 1;
            }
        }
        self.merge_tombstones();
        changed
    }

    fn merge_tombstones(&mut self) {
        let mut i = 1;
        while i < self.chunks.len() {
            let (left, right) = (&self.chunks[i - 1], &self.chunks[i]);
            if left.is_deleted() && right.is_deleted() && tick(left.id, left.span) == right.id {
                let span = right.span;
                self.chunks[i - 1].span += span;
                self.chunks.remove(i);
            } else {
                i += 1;
            }
        }
    }

    pub fn iter_live(&self) -> impl Iterator<Item = &Chunk<T>> {
        self.chunks.iter().filter(|c| !c.is_deleted())
    }

    /// Number of live items.
    pub fn length(&self) -> u64 {
        self.chunks.iter().map(Chunk::len).sum()
    }

    /// Id of the live item at position `pos`.
    pub fn find(&self, pos: u64) -> Option<Ts> {
        let mut remaining = pos;
        for chunk in self.iter_live() {
            if remaining < chunk.span {
                return Some(tick(chunk.id, remaining));
            }
            remaining -= chunk.span;
        }
        None
    }

    /// Id ranges covering live positions `[pos, pos + len)`.
    pub fn find_interval(&self, pos: u64, len: u64) -> Vec<Tss> {
        let mut out = Vec::new();
        let end = pos.saturating_add(len);
        let mut offset = 0;
        for chunk in self.iter_live() {
            let (c_start, c_end) = (offset, offset + chunk.span);
            offset = c_end;
            if c_end <= pos {
                continue;
            }
            if c_start >= end {
                break;
            }
            let from = pos.max(c_start) - c_start;
            let to = end.min(c_end) - c_start;
            out.push(interval(chunk.id, from, to - from));
        }
        out
    }
}
