use serde_json::{Map, Value};

use super::{as_object, decode_bytes, decode_ts, decode_tss, field, in_range, VerboseError};
use crate::json_crdt_patch::clock::{ts, Ts};
use crate::json_crdt_patch::operations::{ConValue, Literal, Op};
use crate::json_crdt_patch::patch::Patch;

pub fn decode(data: &Value) -> Result<Patch, VerboseError> {
    let obj = as_object(data, "patch")?;
    let id = decode_ts(field(obj, "id")?, "id")?;
    let meta = obj.get("meta").cloned();
    let ops_json = field(obj, "ops")?.as_array().ok_or(VerboseError::InvalidField("ops"))?;
    let mut time = id.time;
    let mut ops = Vec::with_capacity(ops_json.len());
    for op_json in ops_json {
        let op = decode_op(op_json, ts(id.sid, time))?;
        time = in_range(time + op.span(), "ops")?;
        ops.push(op);
    }
    Ok(Patch { ops, meta })
}

fn ts_field(op: &Map<String, Value>, name: &'static str) -> Result<Ts, VerboseError> {
    decode_ts(field(op, name)?, name)
}

fn array_field<'a>(op: &'a Map<String, Value>, name: &'static str) -> Result<&'a Vec<Value>, VerboseError> {
    field(op, name)?.as_array().ok_or(VerboseError::InvalidField(name))
}

fn decode_op(v: &Value, id: Ts) -> Result<Op, VerboseError> {
    let op = as_object(v, "op")?;
    let name = field(op, "op")?.as_str().ok_or(VerboseError::InvalidField("op"))?;
    Ok(match name {
        "new_con" => {
            let val = if op.get("timestamp").and_then(Value::as_bool).unwrap_or(false) {
                ConValue::Ref(ts_field(op, "value")?)
            } else if let Some(bin) = op.get("bin") {
                ConValue::Val(Literal::Bytes(decode_bytes(bin, "bin")?))
            } else {
                ConValue::Val(op.get("value").cloned().map_or(Literal::Undefined, Literal::Json))
            };
            Op::NewCon { id, val }
        }
        "new_val" => Op::NewVal { id },
        "new_obj" => Op::NewObj { id },
        "new_vec" => Op::NewVec { id },
        "new_str" => Op::NewStr { id },
        "new_bin" => Op::NewBin { id },
        "new_arr" => Op::NewArr { id },
        "ins_val" => Op::InsVal { id, obj: ts_field(op, "obj")?, val: ts_field(op, "value")? },
        "ins_obj" => {
            let mut data = Vec::new();
            for pair in array_field(op, "value")? {
                match pair.as_array().map(Vec::as_slice) {
                    Some([Value::String(key), stamp]) => data.push((key.clone(), decode_ts(stamp, "value")?)),
                    _ => return Err(VerboseError::InvalidField("value")),
                }
            }
            Op::InsObj { id, obj: ts_field(op, "obj")?, data }
        }
        "ins_vec" => {
            let mut data = Vec::new();
            for pair in array_field(op, "value")? {
                match pair.as_array().map(Vec::as_slice) {
                    Some([index, stamp]) => {
                        let index = index
                            .as_u64()
                            .and_then(|i| u8::try_from(i).ok())
                            .ok_or(VerboseError::InvalidField("value"))?;
                        data.push((index, decode_ts(stamp, "value")?));
                    }
                    _ => return Err(VerboseError::InvalidField("value")),
                }
            }
            Op::InsVec { id, obj: ts_field(op, "obj")?, data }
        }
        "ins_str" => Op::InsStr {
            id,
            obj: ts_field(op, "obj")?,
            after: ts_field(op, "after")?,
            data: field(op, "value")?.as_str().ok_or(VerboseError::InvalidField("value"))?.to_owned(),
        },
        "ins_bin" => Op::InsBin {
            id,
            obj: ts_field(op, "obj")?,
            after: ts_field(op, "after")?,
            data: decode_bytes(field(op, "value")?, "value")?,
        },
        "ins_arr" => Op::InsArr {
            id,
            obj: ts_field(op, "obj")?,
            after: ts_field(op, "after")?,
            data: array_field(op, "value")?
                .iter()
                .map(|v| decode_ts(v, "value"))
                .collect::<Result<_, _>>()?,
        },
        "del" => Op::Del {
            id,
            obj: ts_field(op, "obj")?,
            what: array_field(op, "what")?
                .iter()
                .map(|v| decode_tss(v, "what"))
                .collect::<Result<_, _>>()?,
        },
        "nop" => {
            let len = op.get("len").map_or(Some(1), Value::as_u64).ok_or(VerboseError::InvalidField("len"))?;
            Op::Nop { id, len: in_range(len, "len")? }
        }
        other => return Err(VerboseError::UnknownOp(other.to_owned())),
    })
}
