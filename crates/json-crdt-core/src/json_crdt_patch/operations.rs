//! The operation set of the patch protocol.

use serde_json::Value;

use crate::json_crdt_patch::clock::{print_ts, Ts, Tss};

/// A constant literal carried by a `new_con` operation.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Literal {
    /// Absent value. Object keys holding it are hidden from the view.
    #[default]
    Undefined,
    Json(Value),
    Bytes(Vec<u8>),
}

impl Literal {
    /// Plain JSON form; bytes render as an array of numbers.
    pub fn to_json(&self) -> Value {
        match self {
            Literal::Undefined => Value::Null,
            Literal::Json(v) => v.clone(),
            Literal::Bytes(b) => Value::Array(b.iter().map(|x| Value::from(*x)).collect()),
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Literal::Undefined)
    }
}

impl From<Value> for Literal {
    fn from(v: Value) -> Self {
        Literal::Json(v)
    }
}

impl From<Vec<u8>> for Literal {
    fn from(b: Vec<u8>) -> Self {
        Literal::Bytes(b)
    }
}

/// Payload of a `new_con` operation.
#[derive(Debug, Clone, PartialEq)]
pub enum ConValue {
    /// A timestamp stored as a constant.
    Ref(Ts),
    Val(Literal),
}

/// A single patch operation. Every variant carries its own `id`.
///
/// Most operations consume one clock tick; `ins_str`, `ins_bin` and
/// `ins_arr` consume one tick per inserted element and `nop` consumes `len`.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    NewCon { id: Ts, val: ConValue },
    NewVal { id: Ts },
    NewObj { id: Ts },
    NewVec { id: Ts },
    NewStr { id: Ts },
    NewBin { id: Ts },
    NewArr { id: Ts },

    /// Sets a `val` register. With `obj == ORIGIN` this is the `root` op.
    InsVal { id: Ts, obj: Ts, val: Ts },
    InsObj { id: Ts, obj: Ts, data: Vec<(String, Ts)> },
    InsVec { id: Ts, obj: Ts, data: Vec<(u8, Ts)> },
    InsStr { id: Ts, obj: Ts, after: Ts, data: String },
    InsBin { id: Ts, obj: Ts, after: Ts, data: Vec<u8> },
    InsArr { id: Ts, obj: Ts, after: Ts, data: Vec<Ts> },
    /// Tombstones the given ranges of an RGA node.
    Del { id: Ts, obj: Ts, what: Vec<Tss> },
    Nop { id: Ts, len: u64 },
}

impl Op {
    pub fn id(&self) -> Ts {
        match self {
            Op::NewCon { id, .. }
            | Op::NewVal { id }
            | Op::NewObj { id }
            | Op::NewVec { id }
            | Op::NewStr { id }
            | Op::NewBin { id }
            | Op::NewArr { id }
            | Op::InsVal { id, .. }
            | Op::InsObj { id, .. }
            | Op::InsVec { id, .. }
            | Op::InsStr { id, .. }
            | Op::InsBin { id, .. }
            | Op::InsArr { id, .. }
            | Op::Del { id, .. }
            | Op::Nop { id, .. } => *id,
        }
    }

    pub fn span(&self) -> u64 {
        match self {
            Op::InsStr { data, .. } => data.chars().count() as u64,
            Op::InsBin { data, .. } => data.len() as u64,
            Op::InsArr { data, .. } => data.len() as u64,
            Op::Nop { len, .. } => *len,
            _ => 1,
        }
    }

    /// Target node of an `ins_*` or `del` operation.
    pub fn target(&self) -> Option<Ts> {
        match self {
            Op::InsVal { obj, .. }
            | Op::InsObj { obj, .. }
            | Op::InsVec { obj, .. }
            | Op::InsStr { obj, .. }
            | Op::InsBin { obj, .. }
            | Op::InsArr { obj, .. }
            | Op::Del { obj, .. } => Some(*obj),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Op::NewCon { .. } => "new_con",
            Op::NewVal { .. } => "new_val",
            Op::NewObj { .. } => "new_obj",
            Op::NewVec { .. } => "new_vec",
            Op::NewStr { .. } => "new_str",
            Op::NewBin { .. } => "new_bin",
            Op::NewArr { .. } => "new_arr",
            Op::InsVal { .. } => "ins_val",
            Op::InsObj { .. } => "ins_obj",
            Op::InsVec { .. } => "ins_vec",
            Op::InsStr { .. } => "ins_str",
            Op::InsBin { .. } => "ins_bin",
            Op::InsArr { .. } => "ins_arr",
            Op::Del { .. } => "del",
            Op::Nop { .. } => "nop",
        }
    }

    /// Copy of the operation with every timestamp passed through `f`.
    pub fn map_ts(&self, f: &impl Fn(Ts) -> Ts) -> Op {
        match self {
            Op::NewCon { id, val } => Op::NewCon {
                id: f(*id),
                val: match val {
                    ConValue::Ref(r) => ConValue::Ref(f(*r)),
                    ConValue::Val(v) => ConValue::Val(v.clone()),
                },
            },
            Op::NewVal { id } => Op::NewVal { id: f(*id) },
            Op::NewObj { id } => Op::NewObj { id: f(*id) },
            Op::NewVec { id } => Op::NewVec { id: f(*id) },
            Op::NewStr { id } => Op::NewStr { id: f(*id) },
            Op::NewBin { id } => Op::NewBin { id: f(*id) },
            Op::NewArr { id } => Op::NewArr { id: f(*id) },
            Op::InsVal { id, obj, val } => Op::InsVal { id: f(*id), obj: f(*obj), val: f(*val) },
            Op::InsObj { id, obj, data } => Op::InsObj {
                id: f(*id),
                obj: f(*obj),
                data: data.iter().map(|(k, v)| (k.clone(), f(*v))).collect(),
            },
            Op::InsVec { id, obj, data } => Op::InsVec {
                id: f(*id),
                obj: f(*obj),
                data: data.iter().map(|(k, v)| (*k, f(*v))).collect(),
            },
            Op::InsStr { id, obj, after, data } => Op::InsStr {
                id: f(*id),
                obj: f(*obj),
                after: f(*after),
                data: data.clone(),
            },
            Op::InsBin { id, obj, after, data } => Op::InsBin {
                id: f(*id),
                obj: f(*obj),
                after: f(*after),
                data: data.clone(),
            },
            Op::InsArr { id, obj, after, data } => Op::InsArr {
                id: f(*id),
                obj: f(*obj),
                after: f(*after),
                data: data.iter().map(|v| f(*v)).collect(),
            },
            Op::Del { id, obj, what } => Op::Del {
                id: f(*id),
                obj: f(*obj),
                what: what
                    .iter()
                    .map(|s| {
                        let start = f(s.ts());
                        Tss::new(start.sid, start.time, s.span)
                    })
                    .collect(),
            },
            Op::Nop { id, len } => Op::Nop { id: f(*id), len: *len },
        }
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let span = self.span();
        write!(f, "{} {}", self.name(), print_ts(self.id()))?;
        if span > 1 {
            write!(f, "!{}", span)?;
        }
        match self {
            Op::NewCon { val: ConValue::Ref(r), .. } => write!(f, " {{ {} }}", print_ts(*r)),
            Op::NewCon { val: ConValue::Val(v), .. } => write!(f, " {{ {} }}", v.to_json()),
            Op::InsVal { obj, val, .. } => {
                write!(f, ", obj = {}, val = {}", print_ts(*obj), print_ts(*val))
            }
            Op::InsObj { obj, data, .. } => {
                let pairs: Vec<_> = data.iter().map(|(k, v)| format!("{:?}: {}", k, print_ts(*v))).collect();
                write!(f, ", obj = {} {{ {} }}", print_ts(*obj), pairs.join(", "))
            }
            Op::InsVec { obj, data, .. } => {
                let pairs: Vec<_> = data.iter().map(|(k, v)| format!("{}: {}", k, print_ts(*v))).collect();
                write!(f, ", obj = {} {{ {} }}", print_ts(*obj), pairs.join(", "))
            }
            Op::InsStr { obj, after, data, .. } => {
                write!(f, ", obj = {} {{ {} ← {:?} }}", print_ts(*obj), print_ts(*after), data)
            }
            Op::InsBin { obj, after, data, .. } => {
                write!(f, ", obj = {} {{ {} ← {:?} }}", print_ts(*obj), print_ts(*after), data)
            }
            Op::InsArr { obj, after, data, .. } => {
                let ids: Vec<_> = data.iter().map(|v| print_ts(*v)).collect();
                write!(f, ", obj = {} {{ {} ← {} }}", print_ts(*obj), print_ts(*after), ids.join(", "))
            }
            Op::Del { obj, what, .. } => {
                let spans: Vec<_> = what.iter().map(|s| format!("{}!{}", print_ts(s.ts()), s.span)).collect();
                write!(f, ", obj = {} {{ {} }}", print_ts(*obj), spans.join(", "))
            }
            _ => Ok(()),
        }
    }
}
