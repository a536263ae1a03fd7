//! Structural binary snapshot of a [`Model`].
//!
//! Logical clock:
//! ```text
//! [u32 BE tree length] [root] [vu57 n] [n detached nodes] [clock table]
//! ```
//! Server clock:
//! ```text
//! [0x80] [vu57 time] [root] [vu57 n] [n detached nodes]
//! ```
//!
//! The first byte tells the modes apart: a tree length never has its high
//! bit set. Leading bytes `0x81..=0xFF` are reserved for future layouts and
//! rejected, so the mode byte doubles as the format version.
//!
//! In logical mode every timestamp is written as `id(session index, time
//! difference)` against the clock table, which lists the local session first
//! and then peers in order of first use. In server mode a
//! timestamp is `vu57(time)`.
//!
//! A node is its id followed by a type byte `|ttt lllll|`: the 3-bit kind
//! and an inline length (31 means a `vu57` length follows).
//!
//! | kind | length        | body                                               |
//! |------|---------------|----------------------------------------------------|
//! | con  | 0 / 1         | CBOR literal / referenced id                       |
//! | val  | 0 / 1         | nothing (unset) / op id, child                     |
//! | obj  | entries       | per entry: CBOR key, op id, child                  |
//! | vec  | slots         | per slot: `0x00` (empty) or op id, child           |
//! | str  | chunks        | per chunk: id, CBOR uint span (tombstone) or text  |
//! | bin  | chunks        | per chunk: id, `b1vu56(deleted, span)`, bytes      |
//! | arr  | chunks        | per chunk: id, `b1vu56(deleted, span)`, children   |
//!
//! The root is `0x00` when unset, otherwise the id of the op that set it and
//! the child node. Detached nodes are those created but not reachable from
//! the root; they are kept so later patches can still attach them.
//!
//! Decoding rejects times and spans above [`SESSION::MAX`] and nesting
//! deeper than [`MAX_DECODE_DEPTH`].

use std::collections::HashSet;

use ciborium::value::Value as CborValue;
use thiserror::Error;
use tracing::warn;

use crate::json_crdt::constants::{MAX_DECODE_DEPTH, MAX_VEC_SLOTS};
use crate::json_crdt::model::Model;
use crate::json_crdt::nodes::rga::Chunk;
use crate::json_crdt::nodes::{
    ArrNode, BinNode, ConNode, CrdtNode, LwwSlot, NodeIndex, ObjNode, StrNode, ValNode, VecNode,
};
use crate::json_crdt_patch::clock::{Clock, ClockVector, ServerClockVector, Ts};
use crate::json_crdt_patch::codec::clock::{ClockDecoder, ClockEncoder};
use crate::json_crdt_patch::constants::ORIGIN;
use crate::json_crdt_patch::enums::{JsonCrdtDataType, SESSION};
use crate::json_crdt_patch::operations::{ConValue, Literal};
use crate::json_crdt_patch::util::binary::{CrdtReader, CrdtWriter, ReadError};

const SERVER_FLAG: u8 = 0x80;

fn major(kind: JsonCrdtDataType) -> u8 {
    (kind as u8) << 5
}

// ── Encoder ────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct Encoder {
    pub writer: CrdtWriter,
    clock: ClockEncoder,
    server: bool,
    visited: HashSet<Ts>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encode(&mut self, model: &Model) -> Vec<u8> {
        self.writer.reset();
        self.visited.clear();
        match &model.clock {
            Clock::Server(clock) => {
                self.server = true;
                self.writer.u8(SERVER_FLAG);
                self.writer.vu57(clock.time);
                self.document(model);
            }
            Clock::Vector(clock) => {
                self.server = false;
                self.clock.reset(clock);
                let at = self.writer.reserve_u32();
                self.document(model);
                let tree_len = self.writer.len() - at - 4;
                self.writer.patch_u32(at, tree_len as u32);
                let table = self.clock.table();
                self.writer.vu57(table.len() as u64);
                for entry in table {
                    self.writer.vu57(entry.sid);
                    self.writer.vu57(entry.time);
                }
            }
        }
        self.writer.flush()
    }

    fn document(&mut self, model: &Model) {
        if model.root.op == ORIGIN {
            self.writer.u8(0);
        } else {
            self.ts(model.root.op);
            self.node(&model.index, model.root.val);
        }
        // Children always have larger ids than their containers, so
        // ascending order meets every detached subtree at its top.
        let mut ids: Vec<Ts> = model.index.keys().copied().collect();
        ids.sort();
        let mut detached = Vec::new();
        for id in ids {
            if !self.visited.contains(&id) {
                detached.push(id);
                self.mark(&model.index, id);
            }
        }
        self.writer.vu57(detached.len() as u64);
        for id in detached {
            self.node(&model.index, id);
        }
    }

    fn mark(&mut self, index: &NodeIndex, id: Ts) {
        if !self.visited.insert(id) {
            return;
        }
        if let Some(node) = index.get(&id) {
            for child in node.children() {
                self.mark(index, child);
            }
        }
    }

    fn ts(&mut self, stamp: Ts) {
        if self.server {
            self.writer.vu57(stamp.time);
        } else {
            let rel = self.clock.append(stamp);
            self.writer.id(rel.session_index, rel.time_diff);
        }
    }

    fn head(&mut self, kind: JsonCrdtDataType, len: usize) {
        if len < 31 {
            self.writer.u8(major(kind) | len as u8);
        } else {
            self.writer.u8(major(kind) | 31);
            self.writer.vu57(len as u64);
        }
    }

    fn node(&mut self, index: &NodeIndex, id: Ts) {
        self.visited.insert(id);
        match index.get(&id) {
            Some(CrdtNode::Con(n)) => self.con(n),
            Some(CrdtNode::Val(n)) => self.val(index, n),
            Some(CrdtNode::Obj(n)) => self.obj(index, n),
            Some(CrdtNode::Vec(n)) => self.vec(index, n),
            Some(CrdtNode::Str(n)) => self.str(n),
            Some(CrdtNode::Bin(n)) => self.bin(n),
            Some(CrdtNode::Arr(n)) => self.arr(index, n),
            // Dangling reference: keep the slot as an undefined constant.
            None => {
                self.ts(id);
                self.head(JsonCrdtDataType::Con, 0);
                self.writer.literal(&Literal::Undefined);
            }
        }
    }

    fn con(&mut self, node: &ConNode) {
        self.ts(node.id);
        match &node.val {
            ConValue::Val(lit) => {
                self.head(JsonCrdtDataType::Con, 0);
                self.writer.literal(lit);
            }
            ConValue::Ref(target) => {
                self.head(JsonCrdtDataType::Con, 1);
                self.ts(*target);
            }
        }
    }

    fn val(&mut self, index: &NodeIndex, node: &ValNode) {
        self.ts(node.id);
        if node.op == ORIGIN {
            self.head(JsonCrdtDataType::Val, 0);
        } else {
            self.head(JsonCrdtDataType::Val, 1);
            self.ts(node.op);
            self.node(index, node.val);
        }
    }

    fn slot(&mut self, index: &NodeIndex, slot: &LwwSlot) {
        self.ts(slot.op);
        self.node(index, slot.val);
    }

    fn obj(&mut self, index: &NodeIndex, node: &ObjNode) {
        self.ts(node.id);
        self.head(JsonCrdtDataType::Obj, node.keys.len());
        for (key, slot) in &node.keys {
            self.writer.cbor_str(key);
            self.slot(index, slot);
        }
    }

    fn vec(&mut self, index: &NodeIndex, node: &VecNode) {
        self.ts(node.id);
        self.head(JsonCrdtDataType::Vec, node.elements.len());
        for element in &node.elements {
            match element {
                Some(slot) => self.slot(index, slot),
                None => self.writer.u8(0),
            }
        }
    }

    fn str(&mut self, node: &StrNode) {
        self.ts(node.id);
        self.head(JsonCrdtDataType::Str, node.rga.chunks.len());
        for chunk in &node.rga.chunks {
            self.ts(chunk.id);
            match &chunk.data {
                Some(text) => self.writer.cbor_str(text),
                None => self.writer.cbor_uint(chunk.span),
            }
        }
    }

    fn bin(&mut self, node: &BinNode) {
        self.ts(node.id);
        self.head(JsonCrdtDataType::Bin, node.rga.chunks.len());
        for chunk in &node.rga.chunks {
            self.ts(chunk.id);
            self.writer.b1vu56(chunk.is_deleted() as u8, chunk.span);
            if let Some(bytes) = &chunk.data {
                self.writer.buf(bytes);
            }
        }
    }

    fn arr(&mut self, index: &NodeIndex, node: &ArrNode) {
        self.ts(node.id);
        self.head(JsonCrdtDataType::Arr, node.rga.chunks.len());
        for chunk in &node.rga.chunks {
            self.ts(chunk.id);
            self.writer.b1vu56(chunk.is_deleted() as u8, chunk.span);
            if let Some(items) = &chunk.data {
                for item in items {
                    self.node(index, *item);
                }
            }
        }
    }
}

pub fn encode(model: &Model) -> Vec<u8> {
    Encoder::new().encode(model)
}

// ── Decoder ────────────────────────────────────────────────────────────────

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error("clock table is empty")]
    EmptyClockTable,
    #[error("invalid id: session index {session_index}, time difference {time_diff}")]
    InvalidId { session_index: u64, time_diff: u64 },
    #[error("unknown node type {0}")]
    UnknownNodeType(u8),
    #[error("invalid {kind} node length {len}")]
    InvalidLength { kind: &'static str, len: u64 },
    #[error("invalid chunk at {0}")]
    InvalidChunk(Ts),
    #[error("{0} trailing bytes")]
    TrailingBytes(usize),
    #[error("unsupported format byte {0:#04x}")]
    UnsupportedFormat(u8),
    #[error("time or span {0} out of range")]
    OutOfRange(u64),
    #[error("nodes nested deeper than {0} levels")]
    TooDeep(usize),
}

fn in_range(value: u64) -> Result<u64, DecodeError> {
    if value > SESSION::MAX {
        return Err(DecodeError::OutOfRange(value));
    }
    Ok(value)
}

/// Reusable decoder. Each call builds a fresh model; nothing is kept on
/// failure.
#[derive(Debug, Default)]
pub struct Decoder {
    clock: Option<ClockDecoder>,
    index: NodeIndex,
    depth: usize,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, data: &[u8]) -> Result<Model, DecodeError> {
        self.index = NodeIndex::new();
        self.clock = None;
        self.depth = 0;
        let result = self.decode_document(data);
        if let Err(err) = &result {
            warn!(%err, len = data.len(), "model decode failed");
        }
        result
    }

    fn decode_document(&mut self, data: &[u8]) -> Result<Model, DecodeError> {
        let mut r = CrdtReader::new(data);
        if r.peek()? & SERVER_FLAG != 0 {
            let format = r.u8()?;
            if format != SERVER_FLAG {
                return Err(DecodeError::UnsupportedFormat(format));
            }
            let time = in_range(r.vu57()?)?;
            let root = self.document(&mut r)?;
            if !r.is_eof() {
                return Err(DecodeError::TrailingBytes(r.remaining()));
            }
            return Ok(self.finish(ServerClockVector::new(time).into(), root));
        }
        let tree_len = r.u32_be()? as usize;
        let tree = r.buf(tree_len)?;
        let count = r.vu57()?;
        if count == 0 {
            return Err(DecodeError::EmptyClockTable);
        }
        let sid = r.vu57()?;
        let mut clock = ClockDecoder::new(sid, in_range(r.vu57()?)?);
        for _ in 1..count {
            let sid = r.vu57()?;
            let time = in_range(r.vu57()?)?;
            clock.push_tuple(sid, time);
        }
        if !r.is_eof() {
            return Err(DecodeError::TrailingBytes(r.remaining()));
        }
        let vector: ClockVector = clock.clock.clone();
        self.clock = Some(clock);
        let mut tree = CrdtReader::new(tree);
        let root = self.document(&mut tree)?;
        if !tree.is_eof() {
            return Err(DecodeError::TrailingBytes(tree.remaining()));
        }
        Ok(self.finish(vector.into(), root))
    }

    fn finish(&mut self, clock: Clock, root: ValNode) -> Model {
        let mut model = Model::from_clock(clock);
        model.root = root;
        model.index = std::mem::take(&mut self.index);
        model
    }

    fn document(&mut self, r: &mut CrdtReader) -> Result<ValNode, DecodeError> {
        let mut root = ValNode::new(ORIGIN);
        if r.peek()? == 0 {
            r.u8()?;
        } else {
            root.op = self.ts(r)?;
            root.val = self.node(r)?;
        }
        let detached = r.vu57()?;
        for _ in 0..detached {
            self.node(r)?;
        }
        Ok(root)
    }

    fn ts(&self, r: &mut CrdtReader) -> Result<Ts, DecodeError> {
        match &self.clock {
            Some(clock) => {
                let (session_index, time_diff) = r.id()?;
                clock
                    .decode_id(session_index, time_diff)
                    .ok_or(DecodeError::InvalidId { session_index, time_diff })
            }
            None => match r.vu57()? {
                0 => Ok(ORIGIN),
                time => Ok(Ts::new(SESSION::SERVER, in_range(time)?)),
            },
        }
    }

    fn node(&mut self, r: &mut CrdtReader) -> Result<Ts, DecodeError> {
        if self.depth >= MAX_DECODE_DEPTH {
            return Err(DecodeError::TooDeep(MAX_DECODE_DEPTH));
        }
        self.depth += 1;
        let result = self.node_body(r);
        self.depth -= 1;
        result
    }

    fn node_body(&mut self, r: &mut CrdtReader) -> Result<Ts, DecodeError> {
        let id = self.ts(r)?;
        let byte = r.u8()?;
        let len = match byte & 0b1_1111 {
            31 => r.vu57()?,
            n => n as u64,
        };
        let kind = JsonCrdtDataType::from_u8(byte >> 5).ok_or(DecodeError::UnknownNodeType(byte >> 5))?;
        let node = match kind {
            JsonCrdtDataType::Con => CrdtNode::Con(self.con(r, id, len)?),
            JsonCrdtDataType::Val => CrdtNode::Val(self.val(r, id, len)?),
            JsonCrdtDataType::Obj => CrdtNode::Obj(self.obj(r, id, len)?),
            JsonCrdtDataType::Vec => CrdtNode::Vec(self.vec(r, id, len)?),
            JsonCrdtDataType::Str => CrdtNode::Str(self.str(r, id, len)?),
            JsonCrdtDataType::Bin => CrdtNode::Bin(self.bin(r, id, len)?),
            JsonCrdtDataType::Arr => CrdtNode::Arr(self.arr(r, id, len)?),
        };
        self.index.entry(id).or_insert(node);
        Ok(id)
    }

    fn con(&mut self, r: &mut CrdtReader, id: Ts, len: u64) -> Result<ConNode, DecodeError> {
        let val = match len {
            0 => ConValue::Val(r.literal()?),
            1 => ConValue::Ref(self.ts(r)?),
            _ => return Err(DecodeError::InvalidLength { kind: "con", len }),
        };
        Ok(ConNode { id, val })
    }

    fn val(&mut self, r: &mut CrdtReader, id: Ts, len: u64) -> Result<ValNode, DecodeError> {
        let mut node = ValNode::new(id);
        match len {
            0 => {}
            1 => {
                node.op = self.ts(r)?;
                node.val = self.node(r)?;
            }
            _ => return Err(DecodeError::InvalidLength { kind: "val", len }),
        }
        Ok(node)
    }

    fn slot(&mut self, r: &mut CrdtReader) -> Result<LwwSlot, DecodeError> {
        let op = self.ts(r)?;
        let val = self.node(r)?;
        Ok(LwwSlot { op, val })
    }

    fn obj(&mut self, r: &mut CrdtReader, id: Ts, len: u64) -> Result<ObjNode, DecodeError> {
        let mut node = ObjNode::new(id);
        for _ in 0..len {
            let key = r.cbor_str()?;
            let slot = self.slot(r)?;
            node.keys.insert(key, slot);
        }
        Ok(node)
    }

    fn vec(&mut self, r: &mut CrdtReader, id: Ts, len: u64) -> Result<VecNode, DecodeError> {
        if len > MAX_VEC_SLOTS as u64 {
            return Err(DecodeError::InvalidLength { kind: "vec", len });
        }
        let mut node = VecNode::new(id);
        for _ in 0..len {
            if r.peek()? == 0 {
                r.u8()?;
                node.elements.push(None);
            } else {
                node.elements.push(Some(self.slot(r)?));
            }
        }
        Ok(node)
    }

    fn str(&mut self, r: &mut CrdtReader, id: Ts, len: u64) -> Result<StrNode, DecodeError> {
        let mut node = StrNode::new(id);
        for _ in 0..len {
            let chunk_id = self.ts(r)?;
            let at = r.x;
            let chunk = match r.cbor()? {
                CborValue::Integer(n) => {
                    let span = u64::try_from(n).map_err(|_| DecodeError::InvalidChunk(chunk_id))?;
                    Chunk { id: chunk_id, span: in_range(span)?, data: None }
                }
                CborValue::Text(text) => Chunk { id: chunk_id, span: text.chars().count() as u64, data: Some(text) },
                _ => {
                    return Err(ReadError::Cbor { at, reason: "expected text or span".into() }.into());
                }
            };
            if chunk.span == 0 {
                return Err(DecodeError::InvalidChunk(chunk_id));
            }
            node.rga.chunks.push(chunk);
        }
        Ok(node)
    }

    fn bin(&mut self, r: &mut CrdtReader, id: Ts, len: u64) -> Result<BinNode, DecodeError> {
        let mut node = BinNode::new(id);
        for _ in 0..len {
            let chunk_id = self.ts(r)?;
            let (deleted, span) = r.b1vu56()?;
            let span = in_range(span)?;
            if span == 0 {
                return Err(DecodeError::InvalidChunk(chunk_id));
            }
            let data = match deleted {
                0 => Some(r.buf(span as usize)?.to_vec()),
                _ => None,
            };
            node.rga.chunks.push(Chunk { id: chunk_id, span, data });
        }
        Ok(node)
    }

    fn arr(&mut self, r: &mut CrdtReader, id: Ts, len: u64) -> Result<ArrNode, DecodeError> {
        let mut node = ArrNode::new(id);
        for _ in 0..len {
            let chunk_id = self.ts(r)?;
            let (deleted, span) = r.b1vu56()?;
            let span = in_range(span)?;
            if span == 0 {
                return Err(DecodeError::InvalidChunk(chunk_id));
            }
            let data = match deleted {
                0 => {
                    let mut items = Vec::with_capacity(span.min(1024) as usize);
                    for _ in 0..span {
                        items.push(self.node(r)?);
                    }
                    Some(items)
                }
                _ => None,
            };
            node.rga.chunks.push(Chunk { id: chunk_id, span, data });
        }
        Ok(node)
    }
}

pub fn decode(data: &[u8]) -> Result<Model, DecodeError> {
    Decoder::new().decode(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_crdt_patch::patch_builder::PatchBuilder;
    use serde_json::json;

    const SID: u64 = 987_654;
    const PEER: u64 = 555_555;

    fn sample() -> Model {
        let mut model = Model::new(SID);
        {
            let mut api = model.api();
            api.set(&json!({"title": "draft", "tags": ["a", "b", 3], "n": 1.5, "flag": null}));
            let title = api.find(&[json!("title")]).unwrap();
            api.str_del(title, 0, 1).unwrap();
            api.str_ins(title, 0, "D").unwrap();
            let tags = api.find(&[json!("tags")]).unwrap();
            api.arr_del(tags, 1, 1).unwrap();
        }
        let root = model.root.val;
        let mut b = PatchBuilder::new(PEER, 100);
        let bin = b.bin();
        b.ins_bin(bin, bin, vec![1, 2, 3, 4]);
        b.del(bin, vec![crate::json_crdt_patch::clock::tss(PEER, 102, 2)]);
        let vec = b.vec();
        let one = b.con(json!(1));
        b.ins_vec(vec, vec![(0, one)]);
        b.ins_obj(root, vec![("bin".into(), bin), ("vec".into(), vec)]);
        model.apply_patch(&b.flush());
        model
    }

    #[test]
    fn round_trips_view_and_metadata() {
        let model = sample();
        assert_eq!(
            model.view(),
            json!({"title": "Draft", "tags": ["a", 3], "n": 1.5, "flag": null,
                   "bin": [1, 4], "vec": [1]})
        );
        let data = encode(&model);
        let decoded = decode(&data).unwrap();
        assert_eq!(decoded.view(), model.view());
        assert_eq!(decoded.sid(), SID);
        assert_eq!(decoded.clock.time(), model.clock.time());
        assert_eq!(decoded.root, model.root);
        assert_eq!(decoded.index, model.index);
        assert_eq!(encode(&decoded), data);
    }

    #[test]
    fn decoded_model_keeps_merging() {
        let model = sample();
        let mut decoded = decode(&encode(&model)).unwrap();
        let mut original = model.clone();

        let mut peer = model.fork(Some(PEER + 1));
        let patch = {
            let mut api = peer.api();
            let title = api.find(&[json!("title")]).unwrap();
            api.str_ins(title, 5, "!").unwrap();
            api.flush()
        };
        original.apply_patch(&patch);
        decoded.apply_patch(&patch);
        assert_eq!(decoded.view()["title"], json!("Draft!"));
        assert_eq!(encode(&decoded), encode(&original));
    }

    #[test]
    fn lww_ids_survive_encoding() {
        let model = sample();
        let root = model.root.val;
        let mut decoded = decode(&encode(&model)).unwrap();
        // A concurrent write older than the one that set "n".
        let mut b = PatchBuilder::new(1_000_000, 2);
        let stale = b.con(json!("stale"));
        b.ins_obj(root, vec![("n".into(), stale)]);
        decoded.apply_patch(&b.flush());
        assert_eq!(decoded.view()["n"], json!(1.5));
    }

    #[test]
    fn server_clock_documents() {
        let mut model = Model::with_server_clock(1);
        model.api().set(&json!({"list": [true, "x"]}));
        let data = encode(&model);
        assert_eq!(data[0], SERVER_FLAG);
        let decoded = decode(&data).unwrap();
        assert!(decoded.clock.is_server());
        assert_eq!(decoded.clock.time(), model.clock.time());
        assert_eq!(decoded.view(), json!({"list": [true, "x"]}));
        assert_eq!(decoded.index, model.index);
    }

    #[test]
    fn empty_documents() {
        let model = Model::new(SID);
        let decoded = decode(&encode(&model)).unwrap();
        assert_eq!(decoded.view(), serde_json::Value::Null);
        assert!(decoded.index.is_empty());
        assert_eq!(decoded.clock.time(), model.clock.time());
    }

    #[test]
    fn detached_nodes_are_kept() {
        let mut model = Model::new(SID);
        let mut b = PatchBuilder::new(SID, 1);
        let text = b.str_node();
        b.ins_str(text, text, "later".into());
        let patch = b.flush();
        model.apply_patch(&patch);
        assert_eq!(model.view(), serde_json::Value::Null);

        let mut decoded = decode(&encode(&model)).unwrap();
        assert!(decoded.find(text).is_some());
        let mut b = PatchBuilder::new(SID, patch.next_time());
        b.root(text);
        decoded.apply_patch(&b.flush());
        assert_eq!(decoded.view(), json!("later"));
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(decode(&[]), Err(DecodeError::Read(ReadError::Eof { at: 0, need: 1 }))));

        // Unset root with no detached count, table [(5, 0)].
        assert!(matches!(decode(&[0, 0, 0, 1, 0, 1, 5, 0]), Err(DecodeError::Read(_))));
        assert!(matches!(decode(&[0, 0, 0, 2, 0, 0, 0]), Err(DecodeError::EmptyClockTable)));

        let mut data = encode(&sample());
        data.push(0);
        assert!(matches!(decode(&data), Err(DecodeError::TrailingBytes(1))));
    }

    #[test]
    fn rejects_unknown_node_type() {
        // Unset root, one detached node with id (1, 0) and kind 7.
        let data = [0, 0, 0, 4, 0, 1, 0x10, 0b1110_0000, 1, 0x40, 0];
        assert!(matches!(decode(&data), Err(DecodeError::UnknownNodeType(7))));
    }

    #[test]
    fn rejects_reserved_format_bytes() {
        assert!(matches!(decode(&[0x81, 1, 0, 0]), Err(DecodeError::UnsupportedFormat(0x81))));
        assert!(matches!(decode(&[0xff]), Err(DecodeError::UnsupportedFormat(0xff))));
    }

    #[test]
    fn rejects_deep_nesting() {
        // Server clock at 5, then a chain of val nodes all claiming id 1.
        let mut data = vec![0x80, 0x05, 0x01];
        for _ in 0..20_000 {
            data.extend_from_slice(&[0x01, 0x21, 0x01]);
        }
        data.extend_from_slice(&[0x01, 0x00, 0xf6, 0x00]);
        assert!(matches!(decode(&data), Err(DecodeError::TooDeep(MAX_DECODE_DEPTH))));

        let mut doc = json!(1);
        for _ in 0..300 {
            doc = json!([doc]);
        }
        let mut model = Model::new(SID);
        model.api().set(&doc);
        assert_eq!(decode(&encode(&model)).unwrap().view(), doc);
    }

    #[test]
    fn rejects_out_of_range_times() {
        let mut w = CrdtWriter::new();
        w.u8(SERVER_FLAG);
        w.vu57(SESSION::MAX + 1);
        w.u8(0);
        w.vu57(0);
        assert!(matches!(decode(&w.flush()), Err(DecodeError::OutOfRange(_))));

        // A deleted bin chunk whose span runs past the largest time.
        w.u8(SERVER_FLAG);
        w.vu57(10);
        w.vu57(1);
        w.vu57(2);
        w.u8((JsonCrdtDataType::Bin as u8) << 5 | 1);
        w.vu57(3);
        w.b1vu56(1, SESSION::MAX + 1);
        w.vu57(0);
        assert!(matches!(decode(&w.flush()), Err(DecodeError::OutOfRange(_))));

        let mut w = CrdtWriter::new();
        w.u8(0);
        w.u8(0);
        w.u8(0);
        w.u8(2);
        w.u8(0);
        w.u8(0);
        w.vu57(1);
        w.vu57(SID);
        w.vu57(u64::MAX >> 7);
        assert!(matches!(decode(&w.flush()), Err(DecodeError::OutOfRange(_))));
    }
}
