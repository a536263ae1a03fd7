use serde_json::{json, Map, Value};

use super::{encode_bytes, encode_ts, encode_tss};
use crate::json_crdt_patch::operations::{ConValue, Literal, Op};
use crate::json_crdt_patch::patch::Patch;

pub fn encode(patch: &Patch) -> Value {
    let mut out = Map::new();
    out.insert("id".into(), encode_ts(patch.get_id().unwrap_or_default()));
    if let Some(meta) = &patch.meta {
        out.insert("meta".into(), meta.clone());
    }
    out.insert("ops".into(), Value::Array(patch.ops.iter().map(encode_op).collect()));
    Value::Object(out)
}

fn encode_op(op: &Op) -> Value {
    match op {
        Op::NewCon { val: ConValue::Ref(target), .. } => {
            json!({"op": "new_con", "timestamp": true, "value": encode_ts(*target)})
        }
        Op::NewCon { val: ConValue::Val(Literal::Undefined), .. } => json!({"op": "new_con"}),
        Op::NewCon { val: ConValue::Val(Literal::Json(v)), .. } => json!({"op": "new_con", "value": v}),
        Op::NewCon { val: ConValue::Val(Literal::Bytes(b)), .. } => {
            json!({"op": "new_con", "bin": encode_bytes(b)})
        }
        Op::NewVal { .. }
        | Op::NewObj { .. }
        | Op::NewVec { .. }
        | Op::NewStr { .. }
        | Op::NewBin { .. }
        | Op::NewArr { .. } => json!({"op": op.name()}),
        Op::InsVal { obj, val, .. } => {
            json!({"op": "ins_val", "obj": encode_ts(*obj), "value": encode_ts(*val)})
        }
        Op::InsObj { obj, data, .. } => json!({
            "op": "ins_obj",
            "obj": encode_ts(*obj),
            "value": data.iter().map(|(k, v)| json!([k, encode_ts(*v)])).collect::<Vec<_>>(),
        }),
        Op::InsVec { obj, data, .. } => json!({
            "op": "ins_vec",
            "obj": encode_ts(*obj),
            "value": data.iter().map(|(k, v)| json!([k, encode_ts(*v)])).collect::<Vec<_>>(),
        }),
        Op::InsStr { obj, after, data, .. } => json!({
            "op": "ins_str",
            "obj": encode_ts(*obj),
            "after": encode_ts(*after),
            "value": data,
        }),
        Op::InsBin { obj, after, data, .. } => json!({
            "op": "ins_bin",
            "obj": encode_ts(*obj),
            "after": encode_ts(*after),
            "value": encode_bytes(data),
        }),
        Op::InsArr { obj, after, data, .. } => json!({
            "op": "ins_arr",
            "obj": encode_ts(*obj),
            "after": encode_ts(*after),
            "value": data.iter().map(|v| encode_ts(*v)).collect::<Vec<_>>(),
        }),
        Op::Del { obj, what, .. } => json!({
            "op": "del",
            "obj": encode_ts(*obj),
            "what": what.iter().map(encode_tss).collect::<Vec<_>>(),
        }),
        Op::Nop { len, .. } => json!({"op": "nop", "len": len}),
    }
}
