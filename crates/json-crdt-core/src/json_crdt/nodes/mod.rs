//! Node types of the document graph.
//!
//! | type  | semantics                                  |
//! |-------|--------------------------------------------|
//! | `con` | immutable literal or timestamp             |
//! | `val` | LWW register holding one child             |
//! | `obj` | LWW map from string keys to children       |
//! | `vec` | LWW tuple indexed by position (0..=255)    |
//! | `str` | RGA of characters                          |
//! | `bin` | RGA of bytes                               |
//! | `arr` | RGA of child references                    |
//!
//! Nodes reference each other by creation timestamp; the [`NodeIndex`] owns
//! them all.

pub mod rga;

use std::collections::{BTreeMap, HashMap};

use crate::json_crdt_patch::clock::{Ts, Tss};
use crate::json_crdt_patch::constants::ORIGIN;
use crate::json_crdt_patch::enums::JsonCrdtDataType;
use crate::json_crdt_patch::operations::{ConValue, Literal};
use rga::Rga;

pub type NodeIndex = HashMap<Ts, CrdtNode>;

/// The write that currently owns an LWW slot: the id of the operation and
/// the node it stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LwwSlot {
    pub op: Ts,
    pub val: Ts,
}

impl LwwSlot {
    /// Replaces the slot if `op` is newer. Returns whether it did.
    fn write(slot: &mut Option<LwwSlot>, op: Ts, val: Ts) -> bool {
        match slot {
            Some(current) if current.op >= op => false,
            _ => {
                *slot = Some(LwwSlot { op, val });
                true
            }
        }
    }
}

/// Whether `id` views as no value: a missing node, an `undefined` constant,
/// or a register holding either.
pub fn renders_undefined(index: &NodeIndex, mut id: Ts) -> bool {
    loop {
        match index.get(&id) {
            None => return true,
            Some(CrdtNode::Val(reg)) => id = reg.val,
            Some(CrdtNode::Con(con)) => return matches!(con.val, ConValue::Val(Literal::Undefined)),
            Some(_) => return false,
        }
    }
}

/// RGA anchors naming the node itself (or ORIGIN) mean "insert at head".
fn anchor(node: Ts, after: Ts) -> Option<Ts> {
    if after == ORIGIN || after == node {
        None
    } else {
        Some(after)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConNode {
    pub id: Ts,
    pub val: ConValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValNode {
    pub id: Ts,
    /// Id of the operation that wrote `val`; ORIGIN while unset.
    pub op: Ts,
    pub val: Ts,
}

impl ValNode {
    pub fn new(id: Ts) -> Self {
        Self { id, op: ORIGIN, val: ORIGIN }
    }

    pub fn set(&mut self, op: Ts, val: Ts) -> bool {
        if op <= self.op {
            return false;
        }
        self.op = op;
        self.val = val;
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjNode {
    pub id: Ts,
    pub keys: BTreeMap<String, LwwSlot>,
}

impl ObjNode {
    pub fn new(id: Ts) -> Self {
        Self { id, keys: BTreeMap::new() }
    }

    pub fn put(&mut self, key: &str, op: Ts, val: Ts) -> bool {
        match self.keys.get(key) {
            Some(current) if current.op >= op => false,
            _ => {
                self.keys.insert(key.to_owned(), LwwSlot { op, val });
                true
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<Ts> {
        self.keys.get(key).map(|slot| slot.val)
    }

    /// Entries that show up in the view, in key order. Deleted keys point
    /// at `undefined` and are skipped.
    pub fn visible<'a>(&'a self, index: &'a NodeIndex) -> impl Iterator<Item = (&'a str, Ts)> + 'a {
        self.keys
            .iter()
            .filter(move |(_, slot)| !renders_undefined(index, slot.val))
            .map(|(key, slot)| (key.as_str(), slot.val))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VecNode {
    pub id: Ts,
    pub elements: Vec<Option<LwwSlot>>,
}

impl VecNode {
    pub fn new(id: Ts) -> Self {
        Self { id, elements: Vec::new() }
    }

    pub fn put(&mut self, index: u8, op: Ts, val: Ts) -> bool {
        let index = index as usize;
        if index >= self.elements.len() {
            self.elements.resize(index + 1, None);
        }
        LwwSlot::write(&mut self.elements[index], op, val)
    }

    pub fn get(&self, index: usize) -> Option<Ts> {
        self.elements.get(index).copied().flatten().map(|slot| slot.val)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrNode {
    pub id: Ts,
    pub rga: Rga<String>,
}

impl StrNode {
    pub fn new(id: Ts) -> Self {
        Self { id, rga: Rga::new() }
    }

    pub fn ins(&mut self, after: Ts, id: Ts, data: String) -> bool {
        self.rga.insert(anchor(self.id, after), id, data)
    }

    pub fn view_str(&self) -> String {
        self.rga.iter_live().filter_map(|c| c.data.as_deref()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinNode {
    pub id: Ts,
    pub rga: Rga<Vec<u8>>,
}

impl BinNode {
    pub fn new(id: Ts) -> Self {
        Self { id, rga: Rga::new() }
    }

    pub fn ins(&mut self, after: Ts, id: Ts, data: Vec<u8>) -> bool {
        self.rga.insert(anchor(self.id, after), id, data)
    }

    pub fn view(&self) -> Vec<u8> {
        self.rga.iter_live().filter_map(|c| c.data.as_deref()).flatten().copied().collect()
    }
}

/// RGA whose items are slots holding references to other nodes. The slot id
/// (position identity) differs from the referenced node id.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrNode {
    pub id: Ts,
    pub rga: Rga<Vec<Ts>>,
}

impl ArrNode {
    pub fn new(id: Ts) -> Self {
        Self { id, rga: Rga::new() }
    }

    /// Inserts the slots and immediately tombstones those whose reference
    /// fails `accept`, so their ids stay addressable as anchors.
    pub fn ins(&mut self, after: Ts, id: Ts, data: Vec<Ts>, accept: impl Fn(Ts) -> bool) -> bool {
        let rejected: Vec<Tss> = data
            .iter()
            .enumerate()
            .filter(|(_, v)| !accept(**v))
            .map(|(i, _)| Tss::new(id.sid, id.time + i as u64, 1))
            .collect();
        if !self.rga.insert(anchor(self.id, after), id, data) {
            return false;
        }
        if !rejected.is_empty() {
            self.rga.delete(&rejected);
        }
        true
    }

    /// Referenced node ids of the live slots, in order.
    pub fn values(&self) -> Vec<Ts> {
        self.rga.iter_live().filter_map(|c| c.data.as_ref()).flatten().copied().collect()
    }

    pub fn get(&self, pos: usize) -> Option<Ts> {
        self.rga.iter_live().filter_map(|c| c.data.as_ref()).flatten().nth(pos).copied()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CrdtNode {
    Con(ConNode),
    Val(ValNode),
    Obj(ObjNode),
    Vec(VecNode),
    Str(StrNode),
    Bin(BinNode),
    Arr(ArrNode),
}

impl CrdtNode {
    pub fn id(&self) -> Ts {
        match self {
            Self::Con(n) => n.id,
            Self::Val(n) => n.id,
            Self::Obj(n) => n.id,
            Self::Vec(n) => n.id,
            Self::Str(n) => n.id,
            Self::Bin(n) => n.id,
            Self::Arr(n) => n.id,
        }
    }

    pub fn data_type(&self) -> JsonCrdtDataType {
        match self {
            Self::Con(_) => JsonCrdtDataType::Con,
            Self::Val(_) => JsonCrdtDataType::Val,
            Self::Obj(_) => JsonCrdtDataType::Obj,
            Self::Vec(_) => JsonCrdtDataType::Vec,
            Self::Str(_) => JsonCrdtDataType::Str,
            Self::Bin(_) => JsonCrdtDataType::Bin,
            Self::Arr(_) => JsonCrdtDataType::Arr,
        }
    }

    pub fn name(&self) -> &'static str {
        self.data_type().name()
    }

    /// Ids of the nodes this node currently references, in view order.
    pub fn children(&self) -> Vec<Ts> {
        match self {
            Self::Val(n) => vec![n.val],
            Self::Obj(n) => n.keys.values().map(|slot| slot.val).collect(),
            Self::Vec(n) => n.elements.iter().flatten().map(|slot| slot.val).collect(),
            Self::Arr(n) => n.values(),
            Self::Con(_) | Self::Str(_) | Self::Bin(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_crdt_patch::clock::{ts, tss};

    #[test]
    fn val_register_keeps_newest_write() {
        let mut reg = ValNode::new(ts(1, 1));
        assert!(reg.set(ts(1, 5), ts(1, 4)));
        assert!(!reg.set(ts(1, 3), ts(1, 2)));
        assert!(reg.set(ts(2, 5), ts(2, 2)));
        assert_eq!(reg.val, ts(2, 2));
    }

    #[test]
    fn obj_lww_compares_operation_ids() {
        let mut obj = ObjNode::new(ts(1, 1));
        assert!(obj.put("a", ts(1, 10), ts(1, 2)));
        assert!(!obj.put("a", ts(2, 9), ts(2, 20)));
        assert!(obj.put("a", ts(2, 10), ts(2, 3)));
        assert!(!obj.put("a", ts(2, 10), ts(2, 3)));
        assert_eq!(obj.get("a"), Some(ts(2, 3)));
        assert_eq!(obj.get("b"), None);
    }

    #[test]
    fn vec_grows_to_index() {
        let mut vec = VecNode::new(ts(1, 1));
        assert!(vec.put(3, ts(1, 4), ts(1, 2)));
        assert_eq!(vec.elements.len(), 4);
        assert_eq!(vec.get(0), None);
        assert_eq!(vec.get(3), Some(ts(1, 2)));
        assert_eq!(vec.get(9), None);
    }

    #[test]
    fn str_anchor_on_self_means_head() {
        let mut s = StrNode::new(ts(1, 1));
        s.ins(ts(1, 1), ts(1, 2), "world".into());
        s.ins(ORIGIN, ts(1, 7), "hello ".into());
        assert_eq!(s.view_str(), "hello world");
    }

    #[test]
    fn arr_rejected_slots_are_tombstoned() {
        let mut arr = ArrNode::new(ts(1, 5));
        assert!(arr.ins(ts(1, 5), ts(1, 10), vec![ts(1, 6), ts(1, 2), ts(1, 7)], |v| v.time > 5));
        assert_eq!(arr.values(), vec![ts(1, 6), ts(1, 7)]);
        assert_eq!(arr.rga.chunks.len(), 3);
        assert_eq!(arr.get(1), Some(ts(1, 7)));
        assert!(arr.rga.find_by_id(ts(1, 11)).is_some());
        arr.rga.delete(&[tss(1, 10, 1)]);
        assert_eq!(arr.values(), vec![ts(1, 7)]);
    }

    #[test]
    fn bin_view_concatenates_live_chunks() {
        let mut bin = BinNode::new(ts(1, 1));
        bin.ins(ORIGIN, ts(1, 2), vec![1, 2, 3]);
        bin.rga.delete(&[tss(1, 3, 1)]);
        assert_eq!(bin.view(), vec![1, 3]);
    }
}
