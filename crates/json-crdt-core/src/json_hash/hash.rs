//! 32-bit `djb2`-style hash over JSON values and CRDT nodes.
//!
//! Every value mixes in a type tag first, so `[]`, `{}` and `""` differ.
//! Object keys are hashed in sorted order.

use serde_json::Value;

use crate::json_crdt::nodes::{CrdtNode, NodeIndex};
use crate::json_crdt_patch::clock::Ts;
use crate::json_crdt_patch::operations::{ConValue, Literal};

const START: u32 = 5381;

const NULL: u32 = 982_452_847;
const TRUE: u32 = 982_453_247;
const FALSE: u32 = 982_454_243;
const ARRAY: u32 = 982_452_259;
const STRING: u32 = 982_453_601;
const OBJECT: u32 = 982_454_533;
const BINARY: u32 = 982_454_837;
const UNDEFINED: u32 = 982_455_037;
const TIMESTAMP: u32 = 982_455_211;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonHasher {
    state: u32,
}

impl Default for JsonHasher {
    fn default() -> Self {
        Self { state: START }
    }
}

impl JsonHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(&self) -> u32 {
        self.state
    }

    pub fn num(&mut self, n: u32) -> &mut Self {
        self.state = self.state.wrapping_shl(5).wrapping_add(self.state).wrapping_add(n);
        self
    }

    /// Mixes a length-prefixed string; characters are fed back to front.
    pub fn str(&mut self, s: &str) -> &mut Self {
        self.num(STRING).num(s.chars().count() as u32);
        for c in s.chars().rev() {
            self.num(c as u32);
        }
        self
    }

    pub fn bin(&mut self, data: &[u8]) -> &mut Self {
        self.num(BINARY).num(data.len() as u32);
        for b in data.iter().rev() {
            self.num(*b as u32);
        }
        self
    }

    pub fn json(&mut self, value: &Value) -> &mut Self {
        match value {
            Value::Null => self.num(NULL),
            Value::Bool(true) => self.num(TRUE),
            Value::Bool(false) => self.num(FALSE),
            // Integers hash by value; other numbers by their bit pattern.
            Value::Number(n) => match n.as_i64() {
                Some(i) => self.num(i as u32),
                None => {
                    let bits = n.as_f64().map_or(0, f64::to_bits);
                    self.num(bits as u32).num((bits >> 32) as u32)
                }
            },
            Value::String(s) => self.str(s),
            Value::Array(items) => {
                self.num(ARRAY);
                for item in items {
                    self.json(item);
                }
                self
            }
            Value::Object(map) => {
                self.num(OBJECT);
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                for key in keys {
                    self.str(key).json(&map[key]);
                }
                self
            }
        }
    }

    /// Mixes the value rendered by node `id`. Missing nodes hash like
    /// `undefined`.
    pub fn node(&mut self, index: &NodeIndex, id: Ts) -> &mut Self {
        let Some(node) = index.get(&id) else {
            return self.num(UNDEFINED);
        };
        match node {
            CrdtNode::Con(con) => match &con.val {
                ConValue::Val(Literal::Undefined) => self.num(UNDEFINED),
                ConValue::Val(Literal::Json(v)) => self.json(v),
                ConValue::Val(Literal::Bytes(b)) => self.bin(b),
                ConValue::Ref(stamp) => self.num(TIMESTAMP).num(stamp.sid as u32).num(stamp.time as u32),
            },
            CrdtNode::Val(val) => self.node(index, val.val),
            CrdtNode::Str(s) => self.str(&s.view_str()),
            CrdtNode::Bin(b) => self.bin(&b.view()),
            CrdtNode::Obj(obj) => {
                self.num(OBJECT);
                // Keys of an ObjNode are already sorted.
                for (key, val) in obj.visible(index) {
                    self.str(key).node(index, val);
                }
                self
            }
            CrdtNode::Vec(vec) => {
                self.num(ARRAY);
                for slot in &vec.elements {
                    match slot {
                        Some(slot) => self.node(index, slot.val),
                        None => self.num(UNDEFINED),
                    };
                }
                self
            }
            CrdtNode::Arr(arr) => {
                self.num(ARRAY);
                for item in arr.values() {
                    self.node(index, item);
                }
                self
            }
        }
    }
}

pub fn hash(value: &Value) -> u32 {
    JsonHasher::new().json(value).finish()
}

/// Content hash of the subtree rooted at `id`.
pub fn hash_node(index: &NodeIndex, id: Ts) -> u32 {
    JsonHasher::new().node(index, id).finish()
}
