//! Local editing API.
//!
//! Every mutating call appends operations to the model's pending patch and
//! applies them to the model immediately. [`ModelApi::flush`] hands the
//! accumulated patch out for delivery to other replicas.
//!
//! Nodes can be addressed two ways. The `*_set`, `*_ins` and `*_del`
//! methods on [`ModelApi`] take node ids. The accessors [`ModelApi::obj`],
//! [`ModelApi::str`] and friends resolve a path of object keys and array
//! indices and return a typed handle. Both look through `val` registers, so
//! a register holding an `obj` works wherever the `obj` itself would.

use serde_json::Value;
use thiserror::Error;

use super::Model;
use crate::json_crdt::constants::MAX_VEC_SLOTS;
use crate::json_crdt::extensions::{self, AnyExtension};
use crate::json_crdt::nodes::rga::{ChunkData, Rga};
use crate::json_crdt::nodes::{ArrNode, BinNode, ConNode, CrdtNode, ObjNode, StrNode, ValNode, VecNode};
use crate::json_crdt::view::JsonView;
use crate::json_crdt_patch::clock::{Ts, Tss};
use crate::json_crdt_patch::operations::Literal;
use crate::json_crdt_patch::patch::Patch;
use crate::json_crdt_patch::patch_builder::PatchBuilder;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("node not found: {0}")]
    NotFound(String),
    #[error("expected {expected} node, found {found}")]
    WrongType { expected: &'static str, found: &'static str },
    #[error("position {pos} out of bounds for length {len}")]
    OutOfBounds { pos: usize, len: usize },
    #[error("node {node} is not a {ext} extension")]
    NotExtension { node: String, ext: String },
}

fn wrong_type(expected: &'static str, node: &CrdtNode) -> ApiError {
    ApiError::WrongType { expected, found: node.name() }
}

/// Scalars become `con` nodes; objects and arrays become mutable trees.
fn const_or_json(b: &mut PatchBuilder, v: &Value) -> Ts {
    match v {
        Value::Object(_) | Value::Array(_) => b.json(v),
        scalar => b.con(scalar.clone()),
    }
}

fn step_key(step: &Value) -> Option<String> {
    match step {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn step_index(step: &Value) -> Option<usize> {
    match step {
        Value::Number(n) => n.as_u64().and_then(|i| usize::try_from(i).ok()),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Id of the item an insert at `pos` goes after; the node id means head.
fn anchor_at<T: ChunkData>(rga: &Rga<T>, node: Ts, pos: usize) -> Result<Ts, ApiError> {
    let len = rga.length() as usize;
    if pos > len {
        return Err(ApiError::OutOfBounds { pos, len });
    }
    if pos == 0 {
        return Ok(node);
    }
    rga.find(pos as u64 - 1).ok_or(ApiError::OutOfBounds { pos, len })
}

fn spans_of<T: ChunkData>(rga: &Rga<T>, pos: usize, count: usize) -> Result<Vec<Tss>, ApiError> {
    let len = rga.length() as usize;
    if pos + count > len {
        return Err(ApiError::OutOfBounds { pos: pos + count, len });
    }
    Ok(rga.find_interval(pos as u64, count as u64))
}

// ── Lookups ────────────────────────────────────────────────────────────────

/// Resolves object keys and array or vec indices starting at the root.
fn resolve(model: &Model, path: &[Value]) -> Result<Ts, ApiError> {
    let mut id = model.root.val;
    for (depth, step) in path.iter().enumerate() {
        id = model.deref(id);
        let next = match model.find(id) {
            Some(CrdtNode::Obj(obj)) => step_key(step).and_then(|k| obj.get(&k)),
            Some(CrdtNode::Arr(arr)) => step_index(step).and_then(|i| arr.get(i)),
            Some(CrdtNode::Vec(vec)) => step_index(step).and_then(|i| vec.get(i)),
            Some(node) => return Err(wrong_type("container", node)),
            None => None,
        };
        id = next.ok_or_else(|| ApiError::NotFound(Value::from(path[..=depth].to_vec()).to_string()))?;
    }
    Ok(id)
}

fn node(model: &Model, id: Ts) -> Result<&CrdtNode, ApiError> {
    model.find(id).ok_or_else(|| ApiError::NotFound(id.to_string()))
}

fn val_node(model: &Model, id: Ts) -> Result<&ValNode, ApiError> {
    match node(model, id)? {
        CrdtNode::Val(n) => Ok(n),
        other => Err(wrong_type("val", other)),
    }
}

fn con_node(model: &Model, id: Ts) -> Result<&ConNode, ApiError> {
    match node(model, model.deref(id))? {
        CrdtNode::Con(n) => Ok(n),
        other => Err(wrong_type("con", other)),
    }
}

fn obj_node(model: &Model, id: Ts) -> Result<&ObjNode, ApiError> {
    match node(model, model.deref(id))? {
        CrdtNode::Obj(n) => Ok(n),
        other => Err(wrong_type("obj", other)),
    }
}

fn vec_node(model: &Model, id: Ts) -> Result<&VecNode, ApiError> {
    match node(model, model.deref(id))? {
        CrdtNode::Vec(n) => Ok(n),
        other => Err(wrong_type("vec", other)),
    }
}

fn str_node(model: &Model, id: Ts) -> Result<&StrNode, ApiError> {
    match node(model, model.deref(id))? {
        CrdtNode::Str(n) => Ok(n),
        other => Err(wrong_type("str", other)),
    }
}

fn bin_node(model: &Model, id: Ts) -> Result<&BinNode, ApiError> {
    match node(model, model.deref(id))? {
        CrdtNode::Bin(n) => Ok(n),
        other => Err(wrong_type("bin", other)),
    }
}

fn arr_node(model: &Model, id: Ts) -> Result<&ArrNode, ApiError> {
    match node(model, model.deref(id))? {
        CrdtNode::Arr(n) => Ok(n),
        other => Err(wrong_type("arr", other)),
    }
}

fn ext_payload(model: &Model, ext: &dyn AnyExtension, id: Ts) -> Result<Ts, ApiError> {
    let vec = vec_node(model, id)?;
    let not_ext = || ApiError::NotExtension { node: vec.id.to_string(), ext: ext.name().to_string() };
    match extensions::ext_id_of(&model.index, vec) {
        Some(x) if x == ext.id() => vec.get(1).ok_or_else(not_ext),
        _ => Err(not_ext()),
    }
}

// ── ModelApi ───────────────────────────────────────────────────────────────

pub struct ModelApi<'a> {
    pub model: &'a mut Model,
}

impl<'a> ModelApi<'a> {
    pub fn new(model: &'a mut Model) -> Self {
        Self { model }
    }

    /// Takes the local changes made since the last flush as one patch.
    pub fn flush(&mut self) -> Patch {
        self.model.builder.flush()
    }

    /// Local changes not yet flushed.
    pub fn pending(&self) -> &Patch {
        &self.model.builder.patch
    }

    pub fn root(&self) -> Ts {
        self.model.root.val
    }

    pub fn view(&self, id: Ts) -> Value {
        self.model.node_view(id).to_json()
    }

    pub fn find(&self, path: &[Value]) -> Result<Ts, ApiError> {
        resolve(self.model, path)
    }

    // ── Path accessors ─────────────────────────────────────────────────────

    /// Handle on whatever node `path` leads to.
    pub fn node(&mut self, path: &[Value]) -> Result<NodeApi<'_>, ApiError> {
        let id = resolve(self.model, path)?;
        node(self.model, id)?;
        Ok(NodeApi { model: &mut *self.model, id })
    }

    pub fn val(&mut self, path: &[Value]) -> Result<ValApi<'_>, ApiError> {
        self.node(path)?.as_val()
    }

    pub fn con(&mut self, path: &[Value]) -> Result<ConApi<'_>, ApiError> {
        self.node(path)?.as_con()
    }

    pub fn obj(&mut self, path: &[Value]) -> Result<ObjApi<'_>, ApiError> {
        self.node(path)?.as_obj()
    }

    pub fn vec(&mut self, path: &[Value]) -> Result<VecApi<'_>, ApiError> {
        self.node(path)?.as_vec()
    }

    pub fn str(&mut self, path: &[Value]) -> Result<StrApi<'_>, ApiError> {
        self.node(path)?.as_str()
    }

    pub fn bin(&mut self, path: &[Value]) -> Result<BinApi<'_>, ApiError> {
        self.node(path)?.as_bin()
    }

    pub fn arr(&mut self, path: &[Value]) -> Result<ArrApi<'_>, ApiError> {
        self.node(path)?.as_arr()
    }

    // ── Root and registers ─────────────────────────────────────────────────

    /// Replaces the whole document. Strings become editable `str` nodes.
    pub fn set(&mut self, json: &Value) -> Ts {
        self.model.change(|b| {
            let id = b.json(json);
            b.root(id);
            id
        })
    }

    pub fn val_set(&mut self, val_id: Ts, json: &Value) -> Result<(), ApiError> {
        let reg = val_node(self.model, val_id)?.id;
        self.model.change(|b| {
            let id = const_or_json(b, json);
            b.set_val(reg, id);
        });
        Ok(())
    }

    // ── obj ────────────────────────────────────────────────────────────────

    pub fn obj_set(&mut self, obj_id: Ts, entries: &[(&str, Value)]) -> Result<(), ApiError> {
        let obj = obj_node(self.model, obj_id)?.id;
        if entries.is_empty() {
            return Ok(());
        }
        self.model.change(|b| {
            let data = entries.iter().map(|(k, v)| (k.to_string(), const_or_json(b, v))).collect();
            b.ins_obj(obj, data);
        });
        Ok(())
    }

    /// Hides `keys` by writing `undefined` to them.
    pub fn obj_del(&mut self, obj_id: Ts, keys: &[&str]) -> Result<(), ApiError> {
        let obj = obj_node(self.model, obj_id)?.id;
        if keys.is_empty() {
            return Ok(());
        }
        self.model.change(|b| {
            let data = keys.iter().map(|k| (k.to_string(), b.con(Literal::Undefined))).collect();
            b.ins_obj(obj, data);
        });
        Ok(())
    }

    /// Whether `key` holds a visible value.
    pub fn obj_has(&self, obj_id: Ts, key: &str) -> Result<bool, ApiError> {
        let obj = obj_node(self.model, obj_id)?;
        Ok(obj.get(key).is_some_and(|v| !self.model.node_view(v).is_undefined()))
    }

    pub fn obj_get(&self, obj_id: Ts, key: &str) -> Result<Option<Ts>, ApiError> {
        Ok(obj_node(self.model, obj_id)?.get(key))
    }

    // ── vec ────────────────────────────────────────────────────────────────

    pub fn vec_set(&mut self, vec_id: Ts, entries: &[(usize, Value)]) -> Result<(), ApiError> {
        let vec = vec_node(self.model, vec_id)?.id;
        let mut slots = Vec::with_capacity(entries.len());
        for (index, value) in entries {
            let slot = u8::try_from(*index).map_err(|_| ApiError::OutOfBounds { pos: *index, len: MAX_VEC_SLOTS })?;
            slots.push((slot, value));
        }
        if slots.is_empty() {
            return Ok(());
        }
        self.model.change(|b| {
            let data = slots.into_iter().map(|(i, v)| (i, const_or_json(b, v))).collect();
            b.ins_vec(vec, data);
        });
        Ok(())
    }

    pub fn vec_get(&self, vec_id: Ts, index: usize) -> Result<Option<Ts>, ApiError> {
        Ok(vec_node(self.model, vec_id)?.get(index))
    }

    // ── str ────────────────────────────────────────────────────────────────

    pub fn str_ins(&mut self, str_id: Ts, pos: usize, text: &str) -> Result<(), ApiError> {
        let node = str_node(self.model, str_id)?;
        let (obj, after) = (node.id, anchor_at(&node.rga, node.id, pos)?);
        if text.is_empty() {
            return Ok(());
        }
        self.model.change(|b| b.ins_str(obj, after, text.to_owned()));
        Ok(())
    }

    pub fn str_del(&mut self, str_id: Ts, pos: usize, len: usize) -> Result<(), ApiError> {
        let node = str_node(self.model, str_id)?;
        let (obj, spans) = (node.id, spans_of(&node.rga, pos, len)?);
        if spans.is_empty() {
            return Ok(());
        }
        self.model.change(|b| b.del(obj, spans));
        Ok(())
    }

    /// Length in characters.
    pub fn str_len(&self, str_id: Ts) -> Result<usize, ApiError> {
        Ok(str_node(self.model, str_id)?.rga.length() as usize)
    }

    // ── bin ────────────────────────────────────────────────────────────────

    pub fn bin_ins(&mut self, bin_id: Ts, pos: usize, data: &[u8]) -> Result<(), ApiError> {
        let node = bin_node(self.model, bin_id)?;
        let (obj, after) = (node.id, anchor_at(&node.rga, node.id, pos)?);
        if data.is_empty() {
            return Ok(());
        }
        self.model.change(|b| b.ins_bin(obj, after, data.to_vec()));
        Ok(())
    }

    pub fn bin_del(&mut self, bin_id: Ts, pos: usize, len: usize) -> Result<(), ApiError> {
        let node = bin_node(self.model, bin_id)?;
        let (obj, spans) = (node.id, spans_of(&node.rga, pos, len)?);
        if spans.is_empty() {
            return Ok(());
        }
        self.model.change(|b| b.del(obj, spans));
        Ok(())
    }

    pub fn bin_len(&self, bin_id: Ts) -> Result<usize, ApiError> {
        Ok(bin_node(self.model, bin_id)?.rga.length() as usize)
    }

    // ── arr ────────────────────────────────────────────────────────────────

    /// Inserts `values` at `pos`. Scalars are wrapped in `val` registers.
    pub fn arr_ins(&mut self, arr_id: Ts, pos: usize, values: &[Value]) -> Result<(), ApiError> {
        let node = arr_node(self.model, arr_id)?;
        let (obj, after) = (node.id, anchor_at(&node.rga, node.id, pos)?);
        if values.is_empty() {
            return Ok(());
        }
        self.model.change(|b| {
            let ids = values.iter().map(|v| b.json_val(v)).collect();
            b.ins_arr(obj, after, ids);
        });
        Ok(())
    }

    pub fn arr_del(&mut self, arr_id: Ts, pos: usize, len: usize) -> Result<(), ApiError> {
        let node = arr_node(self.model, arr_id)?;
        let (obj, spans) = (node.id, spans_of(&node.rga, pos, len)?);
        if spans.is_empty() {
            return Ok(());
        }
        self.model.change(|b| b.del(obj, spans));
        Ok(())
    }

    pub fn arr_len(&self, arr_id: Ts) -> Result<usize, ApiError> {
        Ok(arr_node(self.model, arr_id)?.rga.length() as usize)
    }

    pub fn arr_get(&self, arr_id: Ts, pos: usize) -> Result<Option<Ts>, ApiError> {
        Ok(arr_node(self.model, arr_id)?.get(pos))
    }

    // ── Extensions ─────────────────────────────────────────────────────────

    /// Creates an extension node wrapping `payload` and returns its id. The
    /// node still has to be placed into the document.
    pub fn new_ext(&mut self, ext: &dyn AnyExtension, payload: &Value) -> Ts {
        let ext_id = ext.id();
        self.model.change(|b| {
            let vec = b.vec();
            let head = b.con(extensions::header(ext_id, vec));
            let data = b.json(payload);
            b.ins_vec(vec, vec![(0, head), (1, data)]);
            vec
        })
    }

    /// Payload node of an extension node, checked against `ext`.
    pub fn ext_payload(&self, ext: &dyn AnyExtension, id: Ts) -> Result<Ts, ApiError> {
        ext_payload(self.model, ext, id)
    }
}

// ── Handles ────────────────────────────────────────────────────────────────

/// Handle on a node of any kind.
pub struct NodeApi<'a> {
    model: &'a mut Model,
    id: Ts,
}

impl<'a> NodeApi<'a> {
    pub fn id(&self) -> Ts {
        self.id
    }

    pub fn kind(&self) -> &'static str {
        self.model.find(self.id).map_or("undefined", CrdtNode::name)
    }

    pub fn view(&self) -> Value {
        self.model.node_view(self.id).to_json()
    }

    pub fn as_val(self) -> Result<ValApi<'a>, ApiError> {
        let id = val_node(self.model, self.id)?.id;
        Ok(ValApi { model: self.model, id })
    }

    pub fn as_con(self) -> Result<ConApi<'a>, ApiError> {
        let id = con_node(self.model, self.id)?.id;
        Ok(ConApi { model: self.model, id })
    }

    pub fn as_obj(self) -> Result<ObjApi<'a>, ApiError> {
        let id = obj_node(self.model, self.id)?.id;
        Ok(ObjApi { model: self.model, id })
    }

    pub fn as_vec(self) -> Result<VecApi<'a>, ApiError> {
        let id = vec_node(self.model, self.id)?.id;
        Ok(VecApi { model: self.model, id })
    }

    pub fn as_str(self) -> Result<StrApi<'a>, ApiError> {
        let id = str_node(self.model, self.id)?.id;
        Ok(StrApi { model: self.model, id })
    }

    pub fn as_bin(self) -> Result<BinApi<'a>, ApiError> {
        let id = bin_node(self.model, self.id)?.id;
        Ok(BinApi { model: self.model, id })
    }

    pub fn as_arr(self) -> Result<ArrApi<'a>, ApiError> {
        let id = arr_node(self.model, self.id)?.id;
        Ok(ArrApi { model: self.model, id })
    }

    /// Interprets the node as an instance of `ext`.
    pub fn as_ext(self, ext: &dyn AnyExtension) -> Result<ExtApi<'a>, ApiError> {
        let payload = ext_payload(self.model, ext, self.id)?;
        let id = self.model.deref(self.id);
        Ok(ExtApi { model: self.model, id, payload })
    }
}

pub struct ValApi<'a> {
    model: &'a mut Model,
    id: Ts,
}

impl ValApi<'_> {
    pub fn id(&self) -> Ts {
        self.id
    }

    pub fn view(&self) -> Value {
        self.model.node_view(self.id).to_json()
    }

    /// Id of the node currently held.
    pub fn get(&self) -> Option<Ts> {
        val_node(self.model, self.id).ok().map(|reg| reg.val)
    }

    pub fn set(&mut self, json: &Value) -> Result<(), ApiError> {
        ModelApi::new(self.model).val_set(self.id, json)
    }
}

pub struct ConApi<'a> {
    model: &'a mut Model,
    id: Ts,
}

impl ConApi<'_> {
    pub fn id(&self) -> Ts {
        self.id
    }

    pub fn view(&self) -> Value {
        self.model.node_view(self.id).to_json()
    }

    /// The raw view; `undefined` stays distinguishable from `null`.
    pub fn view_shared(&self) -> JsonView {
        self.model.node_view(self.id)
    }
}

pub struct ObjApi<'a> {
    model: &'a mut Model,
    id: Ts,
}

impl ObjApi<'_> {
    pub fn id(&self) -> Ts {
        self.id
    }

    pub fn view(&self) -> Value {
        self.model.node_view(self.id).to_json()
    }

    pub fn set(&mut self, entries: &[(&str, Value)]) -> Result<(), ApiError> {
        ModelApi::new(self.model).obj_set(self.id, entries)
    }

    pub fn del(&mut self, keys: &[&str]) -> Result<(), ApiError> {
        ModelApi::new(self.model).obj_del(self.id, keys)
    }

    pub fn has(&self, key: &str) -> bool {
        obj_node(self.model, self.id)
            .ok()
            .and_then(|obj| obj.get(key))
            .is_some_and(|v| !self.model.node_view(v).is_undefined())
    }

    pub fn get(&self, key: &str) -> Option<Ts> {
        obj_node(self.model, self.id).ok()?.get(key)
    }

    /// Number of visible keys.
    pub fn len(&self) -> usize {
        match self.model.node_view(self.id) {
            JsonView::Obj(map) => map.values().filter(|v| !v.is_undefined()).count(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct VecApi<'a> {
    model: &'a mut Model,
    id: Ts,
}

impl VecApi<'_> {
    pub fn id(&self) -> Ts {
        self.id
    }

    pub fn view(&self) -> Value {
        self.model.node_view(self.id).to_json()
    }

    pub fn set(&mut self, entries: &[(usize, Value)]) -> Result<(), ApiError> {
        ModelApi::new(self.model).vec_set(self.id, entries)
    }

    pub fn get(&self, index: usize) -> Option<Ts> {
        vec_node(self.model, self.id).ok()?.get(index)
    }

    pub fn len(&self) -> usize {
        vec_node(self.model, self.id).map_or(0, |vec| vec.elements.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct StrApi<'a> {
    model: &'a mut Model,
    id: Ts,
}

impl StrApi<'_> {
    pub fn id(&self) -> Ts {
        self.id
    }

    pub fn view(&self) -> String {
        self.model.node_view(self.id).as_str().unwrap_or_default().to_owned()
    }

    pub fn ins(&mut self, pos: usize, text: &str) -> Result<(), ApiError> {
        ModelApi::new(self.model).str_ins(self.id, pos, text)
    }

    pub fn del(&mut self, pos: usize, len: usize) -> Result<(), ApiError> {
        ModelApi::new(self.model).str_del(self.id, pos, len)
    }

    pub fn len(&self) -> usize {
        str_node(self.model, self.id).map_or(0, |s| s.rga.length() as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct BinApi<'a> {
    model: &'a mut Model,
    id: Ts,
}

impl BinApi<'_> {
    pub fn id(&self) -> Ts {
        self.id
    }

    pub fn view(&self) -> Vec<u8> {
        self.model.node_view(self.id).as_bytes().unwrap_or_default().to_vec()
    }

    pub fn ins(&mut self, pos: usize, data: &[u8]) -> Result<(), ApiError> {
        ModelApi::new(self.model).bin_ins(self.id, pos, data)
    }

    pub fn del(&mut self, pos: usize, len: usize) -> Result<(), ApiError> {
        ModelApi::new(self.model).bin_del(self.id, pos, len)
    }

    pub fn len(&self) -> usize {
        bin_node(self.model, self.id).map_or(0, |b| b.rga.length() as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct ArrApi<'a> {
    model: &'a mut Model,
    id: Ts,
}

impl ArrApi<'_> {
    pub fn id(&self) -> Ts {
        self.id
    }

    pub fn view(&self) -> Value {
        self.model.node_view(self.id).to_json()
    }

    pub fn ins(&mut self, pos: usize, values: &[Value]) -> Result<(), ApiError> {
        ModelApi::new(self.model).arr_ins(self.id, pos, values)
    }

    pub fn push(&mut self, values: &[Value]) -> Result<(), ApiError> {
        let len = self.len();
        self.ins(len, values)
    }

    pub fn del(&mut self, pos: usize, len: usize) -> Result<(), ApiError> {
        ModelApi::new(self.model).arr_del(self.id, pos, len)
    }

    pub fn get(&self, pos: usize) -> Option<Ts> {
        arr_node(self.model, self.id).ok()?.get(pos)
    }

    pub fn len(&self) -> usize {
        arr_node(self.model, self.id).map_or(0, |a| a.rga.length() as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle on an extension node.
pub struct ExtApi<'a> {
    model: &'a mut Model,
    id: Ts,
    payload: Ts,
}

impl<'a> ExtApi<'a> {
    pub fn id(&self) -> Ts {
        self.id
    }

    pub fn payload_id(&self) -> Ts {
        self.payload
    }

    /// View as shaped by the registered extension, if any.
    pub fn view(&self) -> Value {
        self.model.node_view(self.id).to_json()
    }

    /// Handle on the payload node for editing.
    pub fn payload(self) -> NodeApi<'a> {
        NodeApi { model: self.model, id: self.payload }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_crdt_patch::operations::Op;
    use serde_json::json;

    fn doc(json: Value) -> Model {
        let mut model = Model::new(100_000);
        model.api().set(&json);
        model
    }

    #[test]
    fn find_walks_objects_arrays_and_registers() {
        let mut model = doc(json!({"list": [1, {"deep": "x"}], "n": 5}));
        let api = model.api();
        let deep = api.find(&[json!("list"), json!(1), json!("deep")]).unwrap();
        assert_eq!(api.view(deep), json!("x"));
        let one = api.find(&[json!("list"), json!("0")]).unwrap();
        assert_eq!(api.view(one), json!(1));
        assert!(matches!(api.find(&[json!("nope")]), Err(ApiError::NotFound(p)) if p == "[\"nope\"]"));
        assert!(matches!(
            api.find(&[json!("n"), json!("x")]),
            Err(ApiError::WrongType { expected: "container", found: "con" })
        ));
        assert_eq!(api.find(&[]).unwrap(), api.root());
    }

    #[test]
    fn string_editing() {
        let mut model = doc(json!({"s": "held"}));
        let mut api = model.api();
        let s = api.find(&[json!("s")]).unwrap();
        api.str_ins(s, 3, "lo wor").unwrap();
        assert_eq!(api.view(s), json!("hello word"));
        api.str_ins(s, 9, "l").unwrap();
        api.str_ins(s, 11, "!").unwrap();
        api.str_ins(s, 0, ">").unwrap();
        assert_eq!(api.view(s), json!(">hello world!"));
        api.str_del(s, 0, 1).unwrap();
        assert_eq!(api.str_len(s), Ok(12));
        assert_eq!(api.str_ins(s, 13, "x"), Err(ApiError::OutOfBounds { pos: 13, len: 12 }));
        assert_eq!(api.str_del(s, 10, 5), Err(ApiError::OutOfBounds { pos: 15, len: 12 }));
        assert_eq!(model.view(), json!({"s": "hello world!"}));
    }

    #[test]
    fn object_set_and_delete() {
        let mut model = doc(json!({}));
        let mut api = model.api();
        let root = api.root();
        api.obj_set(root, &[("a", json!(1)), ("b", json!({"c": [true]}))]).unwrap();
        assert!(api.obj_has(root, "a").unwrap());
        api.obj_del(root, &["a", "missing"]).unwrap();
        assert!(!api.obj_has(root, "a").unwrap());
        assert!(api.obj_get(root, "a").unwrap().is_some());
        assert_eq!(model.view(), json!({"b": {"c": [true]}}));
    }

    #[test]
    fn wrong_type_is_reported() {
        let mut model = doc(json!({"s": "x", "a": []}));
        let mut api = model.api();
        let s = api.find(&[json!("s")]).unwrap();
        let a = api.find(&[json!("a")]).unwrap();
        assert_eq!(api.arr_ins(s, 0, &[json!(1)]), Err(ApiError::WrongType { expected: "arr", found: "str" }));
        assert_eq!(api.str_len(a), Err(ApiError::WrongType { expected: "str", found: "arr" }));
        assert!(matches!(api.obj_set(Ts::new(1, 999), &[]), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn array_editing_and_registers() {
        let mut model = doc(json!({"a": [1, 2, 3]}));
        let mut api = model.api();
        let a = api.find(&[json!("a")]).unwrap();
        api.arr_del(a, 1, 1).unwrap();
        api.arr_ins(a, 2, &[json!("x"), json!(4)]).unwrap();
        assert_eq!(api.arr_len(a), Ok(4));
        let first = api.arr_get(a, 0).unwrap().unwrap();
        api.val_set(first, &json!({"z": 0})).unwrap();
        assert_eq!(api.view(a), json!([{"z": 0}, 3, "x", 4]));
        assert_eq!(api.val_set(a, &json!(1)), Err(ApiError::WrongType { expected: "val", found: "arr" }));
    }

    #[test]
    fn binary_and_vec_editing() {
        let mut model = Model::new(100_000);
        let mut api = model.api();
        let (bin, vec) = api.model.change(|b| {
            let bin = b.bin();
            let vec = b.vec();
            let obj = b.obj();
            b.ins_obj(obj, vec![("b".into(), bin), ("v".into(), vec)]);
            b.root(obj);
            (bin, vec)
        });
        api.bin_ins(bin, 0, &[1, 2, 5]).unwrap();
        api.bin_ins(bin, 2, &[3, 4]).unwrap();
        api.bin_del(bin, 0, 1).unwrap();
        assert_eq!(api.bin_len(bin), Ok(4));
        api.vec_set(vec, &[(1, json!("b")), (0, json!(null))]).unwrap();
        assert_eq!(api.vec_set(vec, &[(256, json!(0))]), Err(ApiError::OutOfBounds { pos: 256, len: 256 }));
        assert!(api.vec_get(vec, 1).unwrap().is_some());
        assert_eq!(model.view(), json!({"b": [2, 3, 4, 5], "v": [null, "b"]}));
    }

    #[test]
    fn flushed_patch_replays_elsewhere() {
        let mut model = doc(json!({"text": "ab"}));
        let s = model.api().find(&[json!("text")]).unwrap();
        model.api().str_ins(s, 1, "-").unwrap();
        let patch = model.api().flush();
        assert!(model.api().pending().is_empty());

        let mut other = Model::new(200_000);
        other.apply_patch(&patch);
        assert_eq!(other.view(), json!({"text": "a-b"}));
        assert_eq!(other.view(), model.view());
    }

    #[test]
    fn pending_patch_is_padded_after_remote_changes() {
        let mut remote = Model::new(200_000);
        remote.api().set(&json!({"a": [1, 2, 3]}));
        let remote_patch = remote.api().flush();

        let mut model = Model::new(100_000);
        model.api().set(&json!({}));
        model.apply_patch(&remote_patch);
        assert_eq!(model.view(), json!({"a": [1, 2, 3]}));
        model.api().set(&json!("mine"));
        let patch = model.api().flush();
        assert!(patch.ops.iter().any(|op| matches!(op, Op::Nop { .. })));
        assert_eq!(patch.span(), patch.next_time() - patch.get_id().unwrap().time);

        let mut third = Model::new(300_000);
        third.apply_patch(&remote_patch);
        third.apply_patch(&patch);
        assert_eq!(third.view(), json!("mine"));
        assert_eq!(third.view(), model.view());
    }

    struct Tagged;

    impl AnyExtension for Tagged {
        fn id(&self) -> u8 {
            3
        }
        fn name(&self) -> &str {
            "tagged"
        }
        fn view(&self, payload: &crate::json_crdt::view::JsonView) -> crate::json_crdt::view::JsonView {
            json!({"tagged": payload.to_json()}).into()
        }
    }

    #[test]
    fn extension_nodes() {
        let mut model = Model::new(100_000);
        let mut api = model.api();
        let ext = api.new_ext(&Tagged, &json!("body"));
        api.model.change(|b| b.root(ext));
        let payload = api.ext_payload(&Tagged, ext).unwrap();
        api.str_ins(payload, 4, "!").unwrap();
        assert_eq!(model.view(), json!([[3, 160, 1], "body!"]));

        let before = model.view();
        model.register_extension(std::sync::Arc::new(Tagged));
        assert_ne!(before, model.view());
        assert_eq!(model.view(), json!({"tagged": "body!"}));
        let root = model.api().root();
        assert!(matches!(model.api().ext_payload(&Tagged, root), Ok(_)));
        let mut plain = doc(json!({}));
        let r = plain.api().root();
        assert!(matches!(plain.api().ext_payload(&Tagged, r), Err(ApiError::WrongType { .. })));
    }

    #[test]
    fn path_handles() {
        let mut model = doc(json!({"title": "draft", "tags": ["a"], "meta": {"n": 1}}));
        let mut api = model.api();

        let mut title = api.str(&[json!("title")]).unwrap();
        title.ins(0, "first ").unwrap();
        title.del(6, 1).unwrap();
        assert_eq!(title.view(), "first raft");
        assert_eq!(title.len(), 10);

        let mut tags = api.arr(&[json!("tags")]).unwrap();
        tags.push(&[json!("b")]).unwrap();
        tags.ins(0, &[json!(0)]).unwrap();
        assert_eq!(tags.view(), json!([0, "a", "b"]));
        assert!(tags.get(3).is_none());

        let mut meta = api.obj(&[json!("meta")]).unwrap();
        meta.set(&[("m", json!(false))]).unwrap();
        meta.del(&["n"]).unwrap();
        assert!(meta.has("m"));
        assert!(!meta.has("n"));
        assert_eq!(meta.len(), 1);

        let mut first = api.val(&[json!("tags"), json!(0)]).unwrap();
        first.set(&json!("zero")).unwrap();
        assert_eq!(first.view(), json!("zero"));

        assert_eq!(api.node(&[json!("meta"), json!("m")]).unwrap().kind(), "con");
        assert_eq!(api.con(&[json!("meta"), json!("m")]).unwrap().view(), json!(false));
        assert!(matches!(api.bin(&[json!("title")]), Err(ApiError::WrongType { expected: "bin", found: "str" })));
        assert!(matches!(api.vec(&[]), Err(ApiError::WrongType { expected: "vec", found: "obj" })));
        assert_eq!(
            model.view(),
            json!({"title": "first raft", "tags": ["zero", "a", "b"], "meta": {"m": false}})
        );
    }

    #[test]
    fn extension_handle() {
        let mut model = Model::new(100_000);
        model.register_extension(std::sync::Arc::new(Tagged));
        let mut api = model.api();
        api.set(&json!({}));
        let root = api.root();
        let ext = api.new_ext(&Tagged, &json!({"k": "v"}));
        api.model.change(|b| b.ins_obj(root, vec![("doc".into(), ext)]));

        let handle = api.node(&[json!("doc")]).unwrap().as_ext(&Tagged).unwrap();
        assert_eq!(handle.id(), ext);
        assert_eq!(handle.view(), json!({"tagged": {"k": "v"}}));
        let mut payload = handle.payload().as_obj().unwrap();
        payload.set(&[("k", json!("w"))]).unwrap();
        assert_eq!(model.view(), json!({"doc": {"tagged": {"k": "w"}}}));
    }
}
