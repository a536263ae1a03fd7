//! [`struct_hash`](super::struct_hash) computed directly over document
//! nodes, without materializing a view first.

use super::hash::JsonHasher;
use super::radix_36;
use super::struct_hash::{str_token, struct_hash};
use crate::json_crdt::nodes::{CrdtNode, NodeIndex};
use crate::json_crdt_patch::clock::Ts;
use crate::json_crdt_patch::operations::{ConValue, Literal};

/// Missing nodes and `undefined` constants render as `U`.
pub fn struct_hash_crdt(index: &NodeIndex, id: Ts) -> String {
    let Some(node) = index.get(&id) else {
        return "U".into();
    };
    match node {
        CrdtNode::Con(con) => match &con.val {
            ConValue::Val(Literal::Json(v)) => struct_hash(v),
            ConValue::Val(Literal::Undefined) => "U".into(),
            ConValue::Val(Literal::Bytes(b)) => radix_36(JsonHasher::new().bin(b).finish() as u64),
            ConValue::Ref(stamp) => format!("@{}.{}", radix_36(stamp.sid), radix_36(stamp.time)),
        },
        CrdtNode::Val(val) => struct_hash_crdt(index, val.val),
        CrdtNode::Str(s) => str_token(&s.view_str()),
        CrdtNode::Bin(b) => radix_36(JsonHasher::new().bin(&b.view()).finish() as u64),
        CrdtNode::Obj(obj) => {
            let mut out = String::from("{");
            for (key, val) in obj.visible(index) {
                out.push_str(&str_token(key));
                out.push(':');
                out.push_str(&struct_hash_crdt(index, val));
                out.push(',');
            }
            out.push('}');
            out
        }
        CrdtNode::Vec(vec) => {
            let mut out = String::from("[");
            for slot in &vec.elements {
                match slot {
                    Some(slot) => out.push_str(&struct_hash_crdt(index, slot.val)),
                    None => out.push('U'),
                }
                out.push(';');
            }
            out.push(']');
            out
        }
        CrdtNode::Arr(arr) => {
            let mut out = String::from("[");
            for item in arr.values() {
                out.push_str(&struct_hash_crdt(index, item));
                out.push(';');
            }
            out.push(']');
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_crdt::model::Model;
    use serde_json::json;

    #[test]
    fn matches_hash_of_the_view() {
        let doc = json!({"title": "hi", "items": [1, {"done": false}], "n": null});
        let mut model = Model::new(100_000);
        model.api().set(&doc);
        assert_eq!(struct_hash_crdt(&model.index, model.root.val), struct_hash(&doc));
    }

    #[test]
    fn history_does_not_matter() {
        let mut a = Model::new(100_000);
        a.api().set(&json!({"s": "abc"}));

        let mut b = Model::new(200_000);
        {
            let mut api = b.api();
            api.set(&json!({"s": "xbc"}));
            let s = api.find(&[json!("s")]).unwrap();
            api.str_del(s, 0, 1).unwrap();
            api.str_ins(s, 0, "a").unwrap();
        }
        assert_eq!(
            struct_hash_crdt(&a.index, a.root.val),
            struct_hash_crdt(&b.index, b.root.val)
        );
    }

    #[test]
    fn missing_root_is_undefined() {
        let model = Model::new(100_000);
        assert_eq!(struct_hash_crdt(&model.index, model.root.val), "U");
    }
}
