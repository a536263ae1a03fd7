//! [`PatchBuilder`]: allocates timestamps from a clock and accumulates
//! operations into a [`Patch`].

use serde_json::Value;

use crate::json_crdt_patch::clock::{ts, Clock, ClockVector, ServerClockVector, Ts, Tss};
use crate::json_crdt_patch::constants::ORIGIN;
use crate::json_crdt_patch::operations::{ConValue, Literal, Op};
use crate::json_crdt_patch::patch::Patch;

#[derive(Debug, Clone)]
pub struct PatchBuilder {
    pub clock: Clock,
    pub patch: Patch,
}

impl PatchBuilder {
    /// Builder over a fresh logical clock at `(sid, time)`.
    pub fn new(sid: u64, time: u64) -> Self {
        Self::from_clock(ClockVector::new(sid, time).into())
    }

    pub fn from_clock(clock: Clock) -> Self {
        Self { clock, patch: Patch::new() }
    }

    pub fn from_server_clock(time: u64) -> Self {
        Self::from_clock(ServerClockVector::new(time).into())
    }

    /// Time the next operation will receive.
    pub fn next_time(&self) -> u64 {
        match self.patch.next_time() {
            0 => self.clock.time(),
            t => t,
        }
    }

    /// Seals the accumulated operations. An empty builder yields a nil patch.
    pub fn flush(&mut self) -> Patch {
        std::mem::take(&mut self.patch)
    }

    /// Fills the gap left by an externally advanced clock with a `nop`, so
    /// the patch keeps a contiguous time range.
    pub fn pad(&mut self) {
        let next = self.patch.next_time();
        if next == 0 {
            return;
        }
        let drift = self.clock.time().saturating_sub(next);
        if drift > 0 {
            let id = ts(self.clock.sid(), next);
            self.patch.ops.push(Op::Nop { id, len: drift });
        }
    }

    fn push(&mut self, make: impl FnOnce(Ts) -> Op) -> Ts {
        self.pad();
        let id = self.clock.ts();
        let op = make(id);
        self.clock.tick(op.span());
        self.patch.ops.push(op);
        id
    }

    // ── Construction ───────────────────────────────────────────────────────

    pub fn con(&mut self, val: impl Into<Literal>) -> Ts {
        let val = ConValue::Val(val.into());
        self.push(|id| Op::NewCon { id, val })
    }

    pub fn con_ref(&mut self, target: Ts) -> Ts {
        self.push(|id| Op::NewCon { id, val: ConValue::Ref(target) })
    }

    pub fn val(&mut self) -> Ts {
        self.push(|id| Op::NewVal { id })
    }

    pub fn obj(&mut self) -> Ts {
        self.push(|id| Op::NewObj { id })
    }

    pub fn vec(&mut self) -> Ts {
        self.push(|id| Op::NewVec { id })
    }

    pub fn str_node(&mut self) -> Ts {
        self.push(|id| Op::NewStr { id })
    }

    pub fn bin(&mut self) -> Ts {
        self.push(|id| Op::NewBin { id })
    }

    pub fn arr(&mut self) -> Ts {
        self.push(|id| Op::NewArr { id })
    }

    // ── Mutation ───────────────────────────────────────────────────────────

    /// Points the document root at `val`.
    pub fn root(&mut self, val: Ts) -> Ts {
        self.set_val(ORIGIN, val)
    }

    pub fn set_val(&mut self, obj: Ts, val: Ts) -> Ts {
        self.push(|id| Op::InsVal { id, obj, val })
    }

    /// Sets object keys. An empty list emits nothing.
    pub fn ins_obj(&mut self, obj: Ts, data: Vec<(String, Ts)>) -> Ts {
        if data.is_empty() {
            return self.clock.ts();
        }
        self.push(|id| Op::InsObj { id, obj, data })
    }

    pub fn ins_vec(&mut self, obj: Ts, data: Vec<(u8, Ts)>) -> Ts {
        if data.is_empty() {
            return self.clock.ts();
        }
        self.push(|id| Op::InsVec { id, obj, data })
    }

    /// Inserts text after `after`; the op id addresses the first character.
    pub fn ins_str(&mut self, obj: Ts, after: Ts, data: String) -> Ts {
        if data.is_empty() {
            return self.clock.ts();
        }
        self.push(|id| Op::InsStr { id, obj, after, data })
    }

    pub fn ins_bin(&mut self, obj: Ts, after: Ts, data: Vec<u8>) -> Ts {
        if data.is_empty() {
            return self.clock.ts();
        }
        self.push(|id| Op::InsBin { id, obj, after, data })
    }

    pub fn ins_arr(&mut self, obj: Ts, after: Ts, data: Vec<Ts>) -> Ts {
        if data.is_empty() {
            return self.clock.ts();
        }
        self.push(|id| Op::InsArr { id, obj, after, data })
    }

    pub fn del(&mut self, obj: Ts, what: Vec<Tss>) -> Ts {
        self.push(|id| Op::Del { id, obj, what })
    }

    /// Reserves `span` clock ticks.
    pub fn nop(&mut self, span: u64) -> Ts {
        self.push(|id| Op::Nop { id, len: span })
    }

    // ── JSON helpers ───────────────────────────────────────────────────────

    /// Builds a mutable node tree for `json`: objects become `obj`, arrays
    /// become `arr`, strings become `str`, and scalars become `con`.
    pub fn json(&mut self, json: &Value) -> Ts {
        match json {
            Value::Object(map) => {
                let obj = self.obj();
                let entries: Vec<(String, Ts)> =
                    map.iter().map(|(k, v)| (k.clone(), self.json(v))).collect();
                self.ins_obj(obj, entries);
                obj
            }
            Value::Array(items) => {
                let arr = self.arr();
                let ids: Vec<Ts> = items.iter().map(|v| self.json_val(v)).collect();
                self.ins_arr(arr, arr, ids);
                arr
            }
            Value::String(s) => {
                let node = self.str_node();
                self.ins_str(node, node, s.clone());
                node
            }
            scalar => self.con(scalar.clone()),
        }
    }

    /// Array elements: scalars are wrapped in a `val` register so they can be
    /// replaced in place later.
    pub fn json_val(&mut self, json: &Value) -> Ts {
        match json {
            Value::Object(_) | Value::Array(_) | Value::String(_) => self.json(json),
            scalar => {
                let reg = self.val();
                let con = self.con(scalar.clone());
                self.set_val(reg, con);
                reg
            }
        }
    }

    /// Builds a single immutable `con` node holding the whole value.
    pub fn json_con(&mut self, json: &Value) -> Ts {
        self.con(json.clone())
    }
}
