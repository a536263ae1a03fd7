//! [`Patch`]: an ordered batch of operations occupying one contiguous
//! timestamp range.

use serde_json::Value;

use crate::json_crdt_patch::clock::{print_ts, ts, Ts};
use crate::json_crdt_patch::codec::binary::{self, DecodeError};
use crate::json_crdt_patch::operations::Op;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Patch {
    pub ops: Vec<Op>,
    /// Opaque application metadata, carried through the codecs untouched.
    pub meta: Option<Value>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// A patch with no operations. Applying it changes nothing.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Id of the first operation, or `None` for a nil patch.
    pub fn get_id(&self) -> Option<Ts> {
        self.ops.first().map(Op::id)
    }

    /// Total number of clock ticks consumed by the operations.
    pub fn span(&self) -> u64 {
        self.ops.iter().map(Op::span).sum()
    }

    /// Time of the tick right after the last operation, `0` when empty.
    pub fn next_time(&self) -> u64 {
        self.ops.last().map_or(0, |op| op.id().time + op.span())
    }

    /// Copy of the patch with every timestamp passed through `f`.
    pub fn rewrite_time(&self, f: &impl Fn(Ts) -> Ts) -> Patch {
        Patch {
            ops: self.ops.iter().map(|op| op.map_ts(f)).collect(),
            meta: self.meta.clone(),
        }
    }

    /// Moves the patch so that it starts at `new_time`.
    ///
    /// Only timestamps of the patch's own session at or after
    /// `transform_after` (the patch start by default) are shifted, so
    /// references to older nodes stay intact.
    pub fn rebase(&self, new_time: u64, transform_after: Option<u64>) -> Patch {
        let Some(id) = self.get_id() else {
            return self.clone();
        };
        if id.time == new_time {
            return self.clone();
        }
        let sid = id.sid;
        let after = transform_after.unwrap_or(id.time);
        self.rewrite_time(&|stamp: Ts| {
            if stamp.sid != sid || stamp.time < after {
                stamp
            } else {
                ts(sid, stamp.time - id.time + new_time)
            }
        })
    }

    pub fn to_binary(&self) -> Vec<u8> {
        binary::encode(self)
    }

    pub fn from_binary(data: &[u8]) -> Result<Patch, DecodeError> {
        binary::decode(data)
    }
}

impl std::fmt::Display for Patch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.get_id() {
            Some(id) => write!(f, "Patch {}!{}", print_ts(id), self.span())?,
            None => write!(f, "Patch (nil)")?,
        }
        for (i, op) in self.ops.iter().enumerate() {
            let branch = if i + 1 == self.ops.len() { "└─" } else { "├─" };
            write!(f, "\n{} {}", branch, op)?;
        }
        Ok(())
    }
}
