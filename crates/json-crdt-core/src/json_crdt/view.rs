//! [`JsonView`]: the shared, immutable projection of a document.
//!
//! Composite views are reference counted so that an unchanged subtree can be
//! handed out again without copying. Two views of the same node taken before
//! and after an unrelated edit are [`JsonView::ptr_eq`].

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum JsonView {
    /// No value: an unset register or a `con` holding `undefined`.
    Undefined,
    Value(Arc<Value>),
    Str(Arc<str>),
    Bin(Arc<[u8]>),
    Arr(Arc<[JsonView]>),
    Obj(Arc<IndexMap<String, JsonView>>),
}

impl JsonView {
    pub fn is_undefined(&self) -> bool {
        matches!(self, JsonView::Undefined)
    }

    /// Identity comparison. Scalars without shared storage compare by value.
    pub fn ptr_eq(&self, other: &JsonView) -> bool {
        match (self, other) {
            (JsonView::Undefined, JsonView::Undefined) => true,
            (JsonView::Value(a), JsonView::Value(b)) => Arc::ptr_eq(a, b),
            (JsonView::Str(a), JsonView::Str(b)) => Arc::ptr_eq(a, b),
            (JsonView::Bin(a), JsonView::Bin(b)) => Arc::ptr_eq(a, b),
            (JsonView::Arr(a), JsonView::Arr(b)) => Arc::ptr_eq(a, b),
            (JsonView::Obj(a), JsonView::Obj(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Plain JSON. Undefined object members are omitted, undefined array
    /// items become `null`, and binary data becomes an array of numbers.
    pub fn to_json(&self) -> Value {
        match self {
            JsonView::Undefined => Value::Null,
            JsonView::Value(v) => Value::clone(v),
            JsonView::Str(s) => Value::String(s.to_string()),
            JsonView::Bin(b) => Value::Array(b.iter().map(|x| Value::from(*x)).collect()),
            JsonView::Arr(items) => Value::Array(items.iter().map(JsonView::to_json).collect()),
            JsonView::Obj(map) => {
                let mut out = Map::new();
                for (k, v) in map.iter() {
                    if !v.is_undefined() {
                        out.insert(k.clone(), v.to_json());
                    }
                }
                Value::Object(out)
            }
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            JsonView::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            JsonView::Bin(b) => Some(b),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&JsonView> {
        match self {
            JsonView::Obj(map) => map.get(key),
            _ => None,
        }
    }

    pub fn at(&self, index: usize) -> Option<&JsonView> {
        match self {
            JsonView::Arr(items) => items.get(index),
            _ => None,
        }
    }
}

impl From<Value> for JsonView {
    fn from(v: Value) -> Self {
        JsonView::Value(Arc::new(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn undefined_members_are_hidden() {
        let mut map = IndexMap::new();
        map.insert("a".to_string(), JsonView::from(json!(1)));
        map.insert("b".to_string(), JsonView::Undefined);
        let obj = JsonView::Obj(Arc::new(map));
        assert_eq!(obj.to_json(), json!({"a": 1}));

        let arr = JsonView::Arr(Arc::from(vec![JsonView::Undefined, JsonView::Str(Arc::from("x"))]));
        assert_eq!(arr.to_json(), json!([null, "x"]));
    }

    #[test]
    fn identity_versus_equality() {
        let a = JsonView::Str(Arc::from("hi"));
        let b = JsonView::Str(Arc::from("hi"));
        assert_eq!(a, b);
        assert!(!a.ptr_eq(&b));
        assert!(a.ptr_eq(&a.clone()));
        assert_eq!(JsonView::Bin(Arc::from(vec![1u8, 2])).to_json(), json!([1, 2]));
    }
}
