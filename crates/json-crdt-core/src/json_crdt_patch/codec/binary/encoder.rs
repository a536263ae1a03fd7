//! Binary patch encoder.

use crate::json_crdt_patch::clock::{Ts, Tss};
use crate::json_crdt_patch::enums::JsonCrdtPatchOpcode as Opcode;
use crate::json_crdt_patch::operations::{ConValue, Op};
use crate::json_crdt_patch::patch::Patch;
use crate::json_crdt_patch::util::binary::{CrdtWriter, CBOR_UNDEFINED};

/// Reusable encoder. Operation ids are implicit: the decoder recovers them
/// from the patch id and the running span, so only references are written.
pub struct Encoder {
    pub writer: CrdtWriter,
    patch_sid: u64,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    pub fn new() -> Self {
        Self { writer: CrdtWriter::with_capacity(4 * 1024), patch_sid: 0 }
    }

    pub fn encode(&mut self, patch: &Patch) -> Vec<u8> {
        self.writer.reset();
        let id = patch.get_id().unwrap_or_default();
        self.patch_sid = id.sid;
        self.writer.vu57(id.sid);
        self.writer.vu57(id.time);
        match &patch.meta {
            None => self.writer.u8(CBOR_UNDEFINED),
            Some(meta) => self.writer.cbor_json(meta),
        }
        self.writer.vu57(patch.ops.len() as u64);
        for op in &patch.ops {
            self.encode_operation(op);
        }
        self.writer.flush()
    }

    fn encode_id(&mut self, id: Ts) {
        if id.sid == self.patch_sid {
            self.writer.b1vu56(0, id.time);
        } else {
            self.writer.b1vu56(1, id.time);
            self.writer.vu57(id.sid);
        }
    }

    fn encode_tss(&mut self, span: &Tss) {
        self.encode_id(span.ts());
        self.writer.vu57(span.span);
    }

    /// Writes the header byte; lengths `1..=7` fit inline, anything else
    /// (including zero) follows as a `vu57`.
    fn header(&mut self, opcode: Opcode, len: u64) {
        if (1..=7).contains(&len) {
            self.writer.u8(opcode.overlay() | len as u8);
        } else {
            self.writer.u8(opcode.overlay());
            self.writer.vu57(len);
        }
    }

    fn encode_operation(&mut self, op: &Op) {
        match op {
            Op::NewCon { val: ConValue::Val(lit), .. } => {
                self.writer.u8(Opcode::NewCon.overlay());
                self.writer.literal(lit);
            }
            Op::NewCon { val: ConValue::Ref(target), .. } => {
                self.writer.u8(Opcode::NewCon.overlay() | 1);
                self.encode_id(*target);
            }
            Op::NewVal { .. } => self.writer.u8(Opcode::NewVal.overlay()),
            Op::NewObj { .. } => self.writer.u8(Opcode::NewObj.overlay()),
            Op::NewVec { .. } => self.writer.u8(Opcode::NewVec.overlay()),
            Op::NewStr { .. } => self.writer.u8(Opcode::NewStr.overlay()),
            Op::NewBin { .. } => self.writer.u8(Opcode::NewBin.overlay()),
            Op::NewArr { .. } => self.writer.u8(Opcode::NewArr.overlay()),
            Op::InsVal { obj, val, .. } => {
                self.writer.u8(Opcode::InsVal.overlay());
                self.encode_id(*obj);
                self.encode_id(*val);
            }
            Op::InsObj { obj, data, .. } => {
                self.header(Opcode::InsObj, data.len() as u64);
                self.encode_id(*obj);
                for (key, val) in data {
                    self.writer.cbor_str(key);
                    self.encode_id(*val);
                }
            }
            Op::InsVec { obj, data, .. } => {
                self.header(Opcode::InsVec, data.len() as u64);
                self.encode_id(*obj);
                for (index, val) in data {
                    self.writer.u8(*index);
                    self.encode_id(*val);
                }
            }
            Op::InsStr { obj, after, data, .. } => {
                self.header(Opcode::InsStr, data.len() as u64);
                self.encode_id(*obj);
                self.encode_id(*after);
                self.writer.utf8(data);
            }
            Op::InsBin { obj, after, data, .. } => {
                self.header(Opcode::InsBin, data.len() as u64);
                self.encode_id(*obj);
                self.encode_id(*after);
                self.writer.buf(data);
            }
            Op::InsArr { obj, after, data, .. } => {
                self.header(Opcode::InsArr, data.len() as u64);
                self.encode_id(*obj);
                self.encode_id(*after);
                for el in data {
                    self.encode_id(*el);
                }
            }
            Op::Del { obj, what, .. } => {
                self.header(Opcode::Del, what.len() as u64);
                self.encode_id(*obj);
                for span in what {
                    self.encode_tss(span);
                }
            }
            Op::Nop { len, .. } => self.header(Opcode::Nop, *len),
        }
    }
}
