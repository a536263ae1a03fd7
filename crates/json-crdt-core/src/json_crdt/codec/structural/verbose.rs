//! Structural verbose JSON snapshot of a [`Model`].
//!
//! ```json
//! {
//!   "time": [[123, 17], [456, 9]],
//!   "root": {"type": "val", "id": [0, 0], "op": [123, 12], "value": <node>},
//!   "detached": [<node>, ...]
//! }
//! ```
//!
//! `time` lists the local session first, then every peer the clock has
//! seen; a server clock is a bare number. Timestamps use the same shape as
//! the patch verbose codec. Object and vector entries carry the id of the
//! operation that wrote them, so a decoded model resolves later concurrent
//! writes exactly like the original.
//!
//! Decoding stops at [`MAX_DECODE_DEPTH`] levels of nesting.

use std::collections::HashSet;

use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::json_crdt::constants::{MAX_DECODE_DEPTH, MAX_VEC_SLOTS};
use crate::json_crdt::model::Model;
use crate::json_crdt::nodes::rga::Chunk;
use crate::json_crdt::nodes::{
    ArrNode, BinNode, ConNode, CrdtNode, LwwSlot, NodeIndex, ObjNode, StrNode, ValNode, VecNode,
};
use crate::json_crdt_patch::clock::{Clock, ClockVector, ServerClockVector, Ts};
use crate::json_crdt_patch::codec::verbose::{
    as_object, decode_bytes, decode_ts, encode_bytes, encode_ts, field, VerboseError,
};
use crate::json_crdt_patch::constants::ORIGIN;
use crate::json_crdt_patch::enums::SESSION;
use crate::json_crdt_patch::operations::{ConValue, Literal};

// ── Encode ─────────────────────────────────────────────────────────────────

pub fn encode(model: &Model) -> Value {
    let time = match &model.clock {
        Clock::Server(clock) => json!(clock.time),
        Clock::Vector(clock) => encode_clock(clock),
    };
    let mut seen = HashSet::new();
    let root = encode_val(&model.index, &model.root, &mut seen);
    let mut out = Map::new();
    out.insert("time".into(), time);
    out.insert("root".into(), root);
    // Ascending ids meet every unreachable subtree at its top node.
    let mut ids: Vec<Ts> = model.index.keys().filter(|id| !seen.contains(id)).copied().collect();
    ids.sort();
    let mut detached = Vec::new();
    for id in ids {
        if !seen.contains(&id) {
            detached.push(encode_node(&model.index, id, &mut seen));
        }
    }
    if !detached.is_empty() {
        out.insert("detached".into(), Value::Array(detached));
    }
    Value::Object(out)
}

fn encode_clock(clock: &ClockVector) -> Value {
    let mut peers: Vec<&Ts> = clock.peers.values().collect();
    peers.sort_by_key(|p| p.sid);
    let mut entries = vec![json!([clock.sid, clock.time])];
    entries.extend(peers.into_iter().map(|p| json!([p.sid, p.time])));
    Value::Array(entries)
}

fn encode_node(index: &NodeIndex, id: Ts, seen: &mut HashSet<Ts>) -> Value {
    seen.insert(id);
    match index.get(&id) {
        Some(CrdtNode::Con(n)) => encode_con(n),
        Some(CrdtNode::Val(n)) => encode_val(index, n, seen),
        Some(CrdtNode::Obj(n)) => encode_obj(index, n, seen),
        Some(CrdtNode::Vec(n)) => encode_vec(index, n, seen),
        Some(CrdtNode::Str(n)) => encode_str(n),
        Some(CrdtNode::Bin(n)) => encode_bin(n),
        Some(CrdtNode::Arr(n)) => encode_arr(index, n, seen),
        None => json!({"type": "con", "id": encode_ts(id)}),
    }
}

fn encode_con(node: &ConNode) -> Value {
    let id = encode_ts(node.id);
    match &node.val {
        ConValue::Ref(target) => json!({"type": "con", "id": id, "timestamp": true, "value": encode_ts(*target)}),
        ConValue::Val(Literal::Undefined) => json!({"type": "con", "id": id}),
        ConValue::Val(Literal::Json(v)) => json!({"type": "con", "id": id, "value": v}),
        ConValue::Val(Literal::Bytes(b)) => json!({"type": "con", "id": id, "bin": encode_bytes(b)}),
    }
}

fn encode_val(index: &NodeIndex, node: &ValNode, seen: &mut HashSet<Ts>) -> Value {
    let id = encode_ts(node.id);
    if node.op == ORIGIN {
        return json!({"type": "val", "id": id});
    }
    let value = encode_node(index, node.val, seen);
    json!({"type": "val", "id": id, "op": encode_ts(node.op), "value": value})
}

fn encode_slot(index: &NodeIndex, slot: &LwwSlot, seen: &mut HashSet<Ts>) -> Value {
    json!({"op": encode_ts(slot.op), "value": encode_node(index, slot.val, seen)})
}

fn encode_obj(index: &NodeIndex, node: &ObjNode, seen: &mut HashSet<Ts>) -> Value {
    let mut map = Map::new();
    for (key, slot) in &node.keys {
        map.insert(key.clone(), encode_slot(index, slot, seen));
    }
    json!({"type": "obj", "id": encode_ts(node.id), "map": map})
}

fn encode_vec(index: &NodeIndex, node: &VecNode, seen: &mut HashSet<Ts>) -> Value {
    let map: Vec<Value> = node
        .elements
        .iter()
        .map(|e| match e {
            Some(slot) => encode_slot(index, slot, seen),
            None => Value::Null,
        })
        .collect();
    json!({"type": "vec", "id": encode_ts(node.id), "map": map})
}

fn tombstone<T>(chunk: &Chunk<T>) -> Value {
    json!({"id": encode_ts(chunk.id), "span": chunk.span})
}

fn encode_str(node: &StrNode) -> Value {
    let chunks: Vec<Value> = node
        .rga
        .chunks
        .iter()
        .map(|chunk| match &chunk.data {
            Some(text) => json!({"id": encode_ts(chunk.id), "value": text}),
            None => tombstone(chunk),
        })
        .collect();
    json!({"type": "str", "id": encode_ts(node.id), "chunks": chunks})
}

fn encode_bin(node: &BinNode) -> Value {
    let chunks: Vec<Value> = node
        .rga
        .chunks
        .iter()
        .map(|chunk| match &chunk.data {
            Some(bytes) => json!({"id": encode_ts(chunk.id), "value": encode_bytes(bytes)}),
            None => tombstone(chunk),
        })
        .collect();
    json!({"type": "bin", "id": encode_ts(node.id), "chunks": chunks})
}

fn encode_arr(index: &NodeIndex, node: &ArrNode, seen: &mut HashSet<Ts>) -> Value {
    let chunks: Vec<Value> = node
        .rga
        .chunks
        .iter()
        .map(|chunk| match &chunk.data {
            Some(items) => {
                let values: Vec<Value> = items.iter().map(|id| encode_node(index, *id, seen)).collect();
                json!({"id": encode_ts(chunk.id), "value": values})
            }
            None => tombstone(chunk),
        })
        .collect();
    json!({"type": "arr", "id": encode_ts(node.id), "chunks": chunks})
}

// ── Decode ─────────────────────────────────────────────────────────────────

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error(transparent)]
    Field(#[from] VerboseError),
    #[error("clock table is empty")]
    EmptyClockTable,
    #[error("invalid chunk at {0}")]
    InvalidChunk(Ts),
    #[error("vec node {0} has more than 256 slots")]
    VecTooLong(Ts),
    #[error("nodes nested deeper than {0} levels")]
    TooDeep(usize),
}

/// Nodes decoded so far and the current nesting level.
#[derive(Default)]
struct Nodes {
    index: NodeIndex,
    depth: usize,
}

pub fn decode(doc: &Value) -> Result<Model, DecodeError> {
    let obj = as_object(doc, "model")?;
    let clock = decode_clock(field(obj, "time")?)?;
    let mut nodes = Nodes::default();
    let root = as_object(field(obj, "root")?, "root")?;
    let root = decode_val(root, ORIGIN, &mut nodes)?;
    if let Some(detached) = obj.get("detached") {
        for node in detached.as_array().ok_or(VerboseError::InvalidField("detached"))? {
            decode_node(node, &mut nodes)?;
        }
    }
    let mut model = Model::from_clock(clock);
    model.root = root;
    model.index = nodes.index;
    Ok(model)
}

fn decode_clock(time: &Value) -> Result<Clock, DecodeError> {
    if let Some(time) = time.as_u64() {
        if time > SESSION::MAX {
            return Err(VerboseError::OutOfRange("time").into());
        }
        return Ok(ServerClockVector::new(time).into());
    }
    let entries = time.as_array().ok_or(VerboseError::InvalidField("time"))?;
    let (local, peers) = entries.split_first().ok_or(DecodeError::EmptyClockTable)?;
    let local = decode_ts(local, "time")?;
    let mut clock = ClockVector::new(local.sid, local.time);
    for peer in peers {
        let peer = decode_ts(peer, "time")?;
        clock.peers.insert(peer.sid, peer);
    }
    Ok(clock.into())
}

fn id_of(obj: &Map<String, Value>) -> Result<Ts, DecodeError> {
    Ok(decode_ts(field(obj, "id")?, "id")?)
}

fn array_of<'a>(obj: &'a Map<String, Value>, name: &'static str) -> Result<&'a Vec<Value>, DecodeError> {
    Ok(field(obj, name)?.as_array().ok_or(VerboseError::InvalidField(name))?)
}

fn decode_node(v: &Value, nodes: &mut Nodes) -> Result<Ts, DecodeError> {
    if nodes.depth >= MAX_DECODE_DEPTH {
        return Err(DecodeError::TooDeep(MAX_DECODE_DEPTH));
    }
    nodes.depth += 1;
    let result = decode_node_body(v, nodes);
    nodes.depth -= 1;
    result
}

fn decode_node_body(v: &Value, nodes: &mut Nodes) -> Result<Ts, DecodeError> {
    let obj = as_object(v, "node")?;
    let kind = field(obj, "type")?.as_str().ok_or(VerboseError::InvalidField("type"))?;
    let id = id_of(obj)?;
    let node = match kind {
        "con" => CrdtNode::Con(decode_con(obj, id)?),
        "val" => CrdtNode::Val(decode_val(obj, id, nodes)?),
        "obj" => CrdtNode::Obj(decode_obj(obj, id, nodes)?),
        "vec" => CrdtNode::Vec(decode_vec(obj, id, nodes)?),
        "str" => CrdtNode::Str(decode_str(obj, id)?),
        "bin" => CrdtNode::Bin(decode_bin(obj, id)?),
        "arr" => CrdtNode::Arr(decode_arr(obj, id, nodes)?),
        other => return Err(VerboseError::UnknownNode(other.into()).into()),
    };
    nodes.index.entry(id).or_insert(node);
    Ok(id)
}

fn decode_con(obj: &Map<String, Value>, id: Ts) -> Result<ConNode, DecodeError> {
    let val = if obj.get("timestamp").and_then(Value::as_bool).unwrap_or(false) {
        ConValue::Ref(decode_ts(field(obj, "value")?, "value")?)
    } else if let Some(bin) = obj.get("bin") {
        ConValue::Val(Literal::Bytes(decode_bytes(bin, "bin")?))
    } else {
        ConValue::Val(obj.get("value").cloned().map_or(Literal::Undefined, Literal::Json))
    };
    Ok(ConNode { id, val })
}

fn decode_val(obj: &Map<String, Value>, id: Ts, nodes: &mut Nodes) -> Result<ValNode, DecodeError> {
    let mut node = ValNode::new(id);
    if let Some(op) = obj.get("op") {
        node.op = decode_ts(op, "op")?;
        node.val = decode_node(field(obj, "value")?, nodes)?;
    }
    Ok(node)
}

fn decode_slot(v: &Value, nodes: &mut Nodes) -> Result<LwwSlot, DecodeError> {
    let entry = as_object(v, "entry")?;
    let op = decode_ts(field(entry, "op")?, "op")?;
    let val = decode_node(field(entry, "value")?, nodes)?;
    Ok(LwwSlot { op, val })
}

fn decode_obj(obj: &Map<String, Value>, id: Ts, nodes: &mut Nodes) -> Result<ObjNode, DecodeError> {
    let mut node = ObjNode::new(id);
    for (key, entry) in as_object(field(obj, "map")?, "map")? {
        let slot = decode_slot(entry, nodes)?;
        node.keys.insert(key.clone(), slot);
    }
    Ok(node)
}

fn decode_vec(obj: &Map<String, Value>, id: Ts, nodes: &mut Nodes) -> Result<VecNode, DecodeError> {
    let map = array_of(obj, "map")?;
    if map.len() > MAX_VEC_SLOTS {
        return Err(DecodeError::VecTooLong(id));
    }
    let mut node = VecNode::new(id);
    for entry in map {
        let slot = match entry {
            Value::Null => None,
            entry => Some(decode_slot(entry, nodes)?),
        };
        node.elements.push(slot);
    }
    Ok(node)
}

/// Splits a chunk object into its id and either live data or a tombstone span.
fn chunk_parts<'a>(v: &'a Value) -> Result<(Ts, Result<&'a Value, u64>), DecodeError> {
    let chunk = as_object(v, "chunk")?;
    let id = id_of(chunk)?;
    match (chunk.get("value"), chunk.get("span")) {
        (Some(value), _) => Ok((id, Ok(value))),
        (None, Some(span)) => match span.as_u64() {
            Some(span) if span > 0 && span <= SESSION::MAX => Ok((id, Err(span))),
            _ => Err(DecodeError::InvalidChunk(id)),
        },
        (None, None) => Err(VerboseError::MissingField("value").into()),
    }
}

fn decode_str(obj: &Map<String, Value>, id: Ts) -> Result<StrNode, DecodeError> {
    let mut node = StrNode::new(id);
    for v in array_of(obj, "chunks")? {
        let chunk = match chunk_parts(v)? {
            (chunk_id, Ok(value)) => {
                let text = value.as_str().ok_or(VerboseError::InvalidField("value"))?;
                if text.is_empty() {
                    return Err(DecodeError::InvalidChunk(chunk_id));
                }
                Chunk { id: chunk_id, span: text.chars().count() as u64, data: Some(text.to_owned()) }
            }
            (chunk_id, Err(span)) => Chunk { id: chunk_id, span, data: None },
        };
        node.rga.chunks.push(chunk);
    }
    Ok(node)
}

fn decode_bin(obj: &Map<String, Value>, id: Ts) -> Result<BinNode, DecodeError> {
    let mut node = BinNode::new(id);
    for v in array_of(obj, "chunks")? {
        let chunk = match chunk_parts(v)? {
            (chunk_id, Ok(value)) => {
                let bytes = decode_bytes(value, "value")?;
                if bytes.is_empty() {
                    return Err(DecodeError::InvalidChunk(chunk_id));
                }
                Chunk { id: chunk_id, span: bytes.len() as u64, data: Some(bytes) }
            }
            (chunk_id, Err(span)) => Chunk { id: chunk_id, span, data: None },
        };
        node.rga.chunks.push(chunk);
    }
    Ok(node)
}

fn decode_arr(obj: &Map<String, Value>, id: Ts, nodes: &mut Nodes) -> Result<ArrNode, DecodeError> {
    let mut node = ArrNode::new(id);
    for v in array_of(obj, "chunks")? {
        let chunk = match chunk_parts(v)? {
            (chunk_id, Ok(value)) => {
                let items = value.as_array().ok_or(VerboseError::InvalidField("value"))?;
                if items.is_empty() {
                    return Err(DecodeError::InvalidChunk(chunk_id));
                }
                let ids = items.iter().map(|item| decode_node(item, nodes)).collect::<Result<Vec<_>, _>>()?;
                Chunk { id: chunk_id, span: ids.len() as u64, data: Some(ids) }
            }
            (chunk_id, Err(span)) => Chunk { id: chunk_id, span, data: None },
        };
        node.rga.chunks.push(chunk);
    }
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_crdt_patch::clock::tss;
    use crate::json_crdt_patch::patch_builder::PatchBuilder;

    const SID: u64 = 314_159;

    fn sample() -> Model {
        let mut model = Model::new(SID);
        {
            let mut api = model.api();
            api.set(&json!({"name": "ada", "list": [1, {"x": true}], "bytes": null}));
            let name = api.find(&[json!("name")]).unwrap();
            api.str_ins(name, 3, "!").unwrap();
            api.str_del(name, 0, 1).unwrap();
        }
        let root = model.root.val;
        let mut b = PatchBuilder::new(271_828, 50);
        let bin = b.bin();
        b.ins_bin(bin, bin, vec![9, 8, 7]);
        b.del(bin, vec![tss(271_828, 51, 1)]);
        let vec = b.vec();
        let r = b.con_ref(root);
        b.ins_vec(vec, vec![(1, r)]);
        b.ins_obj(root, vec![("bytes".into(), bin), ("tuple".into(), vec)]);
        b.str_node();
        model.apply_patch(&b.flush());
        model
    }

    #[test]
    fn round_trips_full_state() {
        let model = sample();
        let doc = encode(&model);
        assert_eq!(doc["root"]["type"], json!("val"));
        assert_eq!(doc["time"][0], json!([SID, model.clock.time()]));
        // The replaced null under "bytes" and a str never attached.
        assert_eq!(doc["detached"].as_array().map(Vec::len), Some(2));
        let decoded = decode(&doc).unwrap();
        assert_eq!(decoded.view(), model.view());
        assert_eq!(decoded.root, model.root);
        assert_eq!(decoded.index, model.index);
        assert_eq!(decoded.clock, model.clock);
        assert_eq!(encode(&decoded), doc);
    }

    #[test]
    fn agrees_with_binary_codec() {
        let model = sample();
        let decoded = decode(&encode(&model)).unwrap();
        assert_eq!(decoded.to_binary(), model.to_binary());
    }

    #[test]
    fn node_shapes() {
        let model = sample();
        let doc = encode(&model);
        let map = &doc["root"]["value"]["map"];
        assert_eq!(map["name"]["value"]["type"], json!("str"));
        assert_eq!(map["name"]["value"]["chunks"][0], json!({"id": [SID, 3], "span": 1}));
        assert_eq!(map["bytes"]["value"]["chunks"][0], json!({"id": [271_828, 51], "span": 1}));
        assert_eq!(map["bytes"]["value"]["chunks"][1]["value"], json!("CAc="));
        assert_eq!(map["tuple"]["value"]["map"][0], Value::Null);
        assert_eq!(map["tuple"]["value"]["map"][1]["value"]["timestamp"], json!(true));
    }

    #[test]
    fn server_clock_is_a_number() {
        let mut model = Model::with_server_clock(10);
        model.api().set(&json!([1, 2]));
        let doc = encode(&model);
        assert_eq!(doc["time"], json!(model.clock.time()));
        assert_eq!(doc["root"]["value"]["id"], json!(10));
        let decoded = decode(&doc).unwrap();
        assert!(decoded.clock.is_server());
        assert_eq!(decoded.view(), json!([1, 2]));
    }

    #[test]
    fn empty_model() {
        let model = Model::new(SID);
        let doc = encode(&model);
        assert_eq!(doc, json!({"time": [[SID, 1]], "root": {"type": "val", "id": [0, 0]}}));
        assert_eq!(decode(&doc).unwrap().view(), Value::Null);
    }

    #[test]
    fn rejects_malformed_documents() {
        assert_eq!(decode(&json!([])).unwrap_err(), DecodeError::Field(VerboseError::NotObject("model")));
        assert_eq!(decode(&json!({"root": {}})).unwrap_err(), DecodeError::Field(VerboseError::MissingField("time")));
        assert_eq!(
            decode(&json!({"time": [], "root": {"type": "val", "id": [0, 0]}})).unwrap_err(),
            DecodeError::EmptyClockTable
        );
        let unknown = json!({"time": [[5, 5]], "root": {"type": "val", "id": [0, 0], "op": [5, 2],
                             "value": {"type": "map", "id": [5, 1]}}});
        assert_eq!(decode(&unknown).unwrap_err(), DecodeError::Field(VerboseError::UnknownNode("map".into())));
        let empty_chunk = json!({"time": [[5, 5]], "root": {"type": "val", "id": [0, 0], "op": [5, 2],
                                 "value": {"type": "str", "id": [5, 1], "chunks": [{"id": [5, 3], "value": ""}]}}});
        assert_eq!(decode(&empty_chunk).unwrap_err(), DecodeError::InvalidChunk(Ts::new(5, 3)));
    }

    #[test]
    fn rejects_deep_nesting() {
        let mut node = json!({"type": "con", "id": [5, 1], "value": 1});
        for _ in 0..MAX_DECODE_DEPTH {
            node = json!({"type": "val", "id": [5, 2], "op": [5, 3], "value": node});
        }
        let doc = json!({"time": [[5, 5]], "root": {"type": "val", "id": [0, 0], "op": [5, 4], "value": node}});
        assert_eq!(decode(&doc).unwrap_err(), DecodeError::TooDeep(MAX_DECODE_DEPTH));
    }

    #[test]
    fn rejects_out_of_range_times() {
        let huge = SESSION::MAX + 1;
        let server = json!({"time": huge, "root": {"type": "val", "id": 0}});
        assert_eq!(decode(&server).unwrap_err(), DecodeError::Field(VerboseError::OutOfRange("time")));
        let peer = json!({"time": [[5, 5], [6, huge]], "root": {"type": "val", "id": [0, 0]}});
        assert_eq!(decode(&peer).unwrap_err(), DecodeError::Field(VerboseError::OutOfRange("time")));
        let span = json!({"time": [[5, 5]], "root": {"type": "val", "id": [0, 0], "op": [5, 2],
                          "value": {"type": "str", "id": [5, 1], "chunks": [{"id": [5, 3], "span": huge}]}}});
        assert_eq!(decode(&span).unwrap_err(), DecodeError::InvalidChunk(Ts::new(5, 3)));
    }
}
