//! Human readable JSON form of a [`Patch`](crate::json_crdt_patch::Patch).
//!
//! ```json
//! {"id": [123, 10], "ops": [{"op": "new_str"}, {"op": "ins_str", "obj": [123, 10], "after": [123, 10], "value": "hi"}]}
//! ```
//!
//! Timestamps are `[sid, time]` pairs, or a bare `time` number for the
//! server session. Ranges are `[sid, time, span]`. Binary payloads are
//! base64 strings. Times and spans above [`SESSION::MAX`] are rejected.

mod decode;
mod encode;

pub use decode::decode;
pub use encode::encode;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::json_crdt_patch::clock::{ts, Ts, Tss};
use crate::json_crdt_patch::enums::SESSION;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerboseError {
    #[error("expected a JSON object at {0}")]
    NotObject(&'static str),
    #[error("missing field {0:?}")]
    MissingField(&'static str),
    #[error("invalid field {0:?}")]
    InvalidField(&'static str),
    #[error("unknown operation {0:?}")]
    UnknownOp(String),
    #[error("unknown node type {0:?}")]
    UnknownNode(String),
    #[error("invalid base64 in {0:?}")]
    Base64(&'static str),
    #[error("{0:?} is out of range")]
    OutOfRange(&'static str),
}

pub(crate) fn in_range(value: u64, field: &'static str) -> Result<u64, VerboseError> {
    if value > SESSION::MAX {
        return Err(VerboseError::OutOfRange(field));
    }
    Ok(value)
}

pub fn encode_ts(id: Ts) -> Value {
    if id.sid == SESSION::SERVER {
        json!(id.time)
    } else {
        json!([id.sid, id.time])
    }
}

pub fn decode_ts(v: &Value, field: &'static str) -> Result<Ts, VerboseError> {
    match v {
        Value::Number(n) => {
            let time = n.as_u64().ok_or(VerboseError::InvalidField(field))?;
            Ok(ts(SESSION::SERVER, in_range(time, field)?))
        }
        Value::Array(pair) if pair.len() == 2 => match (pair[0].as_u64(), pair[1].as_u64()) {
            (Some(sid), Some(time)) => Ok(ts(sid, in_range(time, field)?)),
            _ => Err(VerboseError::InvalidField(field)),
        },
        _ => Err(VerboseError::InvalidField(field)),
    }
}

pub fn encode_tss(span: &Tss) -> Value {
    json!([span.sid, span.time, span.span])
}

pub fn decode_tss(v: &Value, field: &'static str) -> Result<Tss, VerboseError> {
    let triple = v.as_array().filter(|a| a.len() == 3).ok_or(VerboseError::InvalidField(field))?;
    match (triple[0].as_u64(), triple[1].as_u64(), triple[2].as_u64()) {
        (Some(sid), Some(time), Some(span)) => Ok(Tss::new(sid, in_range(time, field)?, in_range(span, field)?)),
        _ => Err(VerboseError::InvalidField(field)),
    }
}

pub fn encode_bytes(data: &[u8]) -> Value {
    Value::String(STANDARD.encode(data))
}

pub fn decode_bytes(v: &Value, field: &'static str) -> Result<Vec<u8>, VerboseError> {
    let text = v.as_str().ok_or(VerboseError::InvalidField(field))?;
    STANDARD.decode(text).map_err(|_| VerboseError::Base64(field))
}

pub fn as_object<'a>(v: &'a Value, at: &'static str) -> Result<&'a Map<String, Value>, VerboseError> {
    v.as_object().ok_or(VerboseError::NotObject(at))
}

pub fn field<'a>(obj: &'a Map<String, Value>, name: &'static str) -> Result<&'a Value, VerboseError> {
    obj.get(name).ok_or(VerboseError::MissingField(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_crdt_patch::operations::Literal;
    use crate::json_crdt_patch::patch::Patch;
    use crate::json_crdt_patch::patch_builder::PatchBuilder;

    #[test]
    fn round_trips_every_operation() {
        let mut b = PatchBuilder::new(42, 1);
        let obj = b.obj();
        let vec = b.vec();
        let s = b.str_node();
        let bin = b.bin();
        let arr = b.arr();
        let val = b.val();
        let c = b.con(json!({"deep": [1, 2.5, "x"]}));
        let undef = b.con(Literal::Undefined);
        let bytes = b.con(Literal::Bytes(vec![0, 255]));
        let r = b.con_ref(ts(7, 7));
        b.ins_obj(obj, vec![("a".into(), c), ("b".into(), undef)]);
        b.ins_vec(vec, vec![(0, bytes), (3, r)]);
        b.ins_str(s, s, "héllo".into());
        b.ins_bin(bin, bin, vec![1, 2, 3]);
        b.ins_arr(arr, arr, vec![c, r]);
        b.set_val(val, c);
        b.del(s, vec![Tss::new(42, 9, 2)]);
        b.nop(2);
        b.root(obj);
        let mut patch = b.flush();
        patch.meta = Some(json!({"m": 1}));
        let encoded = encode(&patch);
        assert_eq!(decode(&encoded).unwrap(), patch);
    }

    #[test]
    fn server_timestamps_are_numbers() {
        let mut b = PatchBuilder::from_server_clock(5);
        let id = b.obj();
        b.root(id);
        let encoded = encode(&b.flush());
        assert_eq!(encoded["id"], json!(5));
        assert_eq!(encoded["ops"][1], json!({"op": "ins_val", "obj": [0, 0], "value": 5}));
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(decode(&json!([])), Err(VerboseError::NotObject("patch")));
        assert_eq!(decode(&json!({"ops": []})), Err(VerboseError::MissingField("id")));
        assert_eq!(
            decode(&json!({"id": [1, 1], "ops": [{"op": "upd_arr"}]})),
            Err(VerboseError::UnknownOp("upd_arr".into()))
        );
        assert_eq!(
            decode(&json!({"id": [1, 1], "ops": [{"op": "ins_bin", "obj": [1, 0], "after": [1, 0], "value": "%%"}]})),
            Err(VerboseError::Base64("value"))
        );
    }

    #[test]
    fn rejects_out_of_range_times() {
        let huge = SESSION::MAX + 1;
        assert_eq!(
            decode(&json!({"id": [100_000, u64::MAX], "ops": [{"op": "new_obj"}]})),
            Err(VerboseError::OutOfRange("id"))
        );
        assert_eq!(decode(&json!({"id": huge, "ops": []})), Err(VerboseError::OutOfRange("id")));
        assert_eq!(
            decode(&json!({"id": [1, 1], "ops": [{"op": "del", "obj": [1, 0], "what": [[1, 1, huge]]}]})),
            Err(VerboseError::OutOfRange("what"))
        );
        assert_eq!(
            decode(&json!({"id": [1, 1], "ops": [{"op": "nop", "len": huge}]})),
            Err(VerboseError::OutOfRange("len"))
        );

        // Each gap fits on its own, together they run past the largest time.
        let nops: Vec<Value> = (0..128).map(|_| json!({"op": "nop", "len": SESSION::MAX / 64})).collect();
        assert_eq!(decode(&json!({"id": [1, 1], "ops": nops})), Err(VerboseError::OutOfRange("ops")));
    }

    #[test]
    fn nil_patch() {
        let encoded = encode(&Patch::new());
        assert_eq!(encoded, json!({"id": [0, 0], "ops": []}));
        assert!(decode(&encoded).unwrap().is_empty());
    }
}
