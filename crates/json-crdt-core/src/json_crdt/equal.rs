//! Comparing documents by shape or by value, ignoring CRDT metadata.
//!
//! Nodes may come from different models, so each side carries its own
//! index.

use super::model::Model;
use super::nodes::{CrdtNode, NodeIndex};
use crate::json_crdt_patch::clock::Ts;

/// Deep comparison of node `a` in `ai` against node `b` in `bi`. With
/// `content` false only kinds, keys and lengths must agree.
pub fn cmp(ai: &NodeIndex, a: Ts, bi: &NodeIndex, b: Ts, content: bool) -> bool {
    let (na, nb) = match (ai.get(&a), bi.get(&b)) {
        (Some(na), Some(nb)) => (na, nb),
        (None, None) => return true,
        _ => return false,
    };
    match (na, nb) {
        (CrdtNode::Con(x), CrdtNode::Con(y)) => !content || x.val == y.val,
        (CrdtNode::Val(x), CrdtNode::Val(y)) => cmp(ai, x.val, bi, y.val, content),
        (CrdtNode::Str(x), CrdtNode::Str(y)) => !content || x.view_str() == y.view_str(),
        (CrdtNode::Bin(x), CrdtNode::Bin(y)) => !content || x.view() == y.view(),
        (CrdtNode::Obj(x), CrdtNode::Obj(y)) => {
            let (xs, ys): (Vec<_>, Vec<_>) = (x.visible(ai).collect(), y.visible(bi).collect());
            xs.len() == ys.len()
                && xs.iter().zip(&ys).all(|((ka, va), (kb, vb))| ka == kb && cmp(ai, *va, bi, *vb, content))
        }
        (CrdtNode::Vec(x), CrdtNode::Vec(y)) => {
            x.elements.len() == y.elements.len()
                && x.elements.iter().zip(&y.elements).all(|pair| match pair {
                    (Some(sa), Some(sb)) => cmp(ai, sa.val, bi, sb.val, content),
                    (None, None) => true,
                    _ => false,
                })
        }
        (CrdtNode::Arr(x), CrdtNode::Arr(y)) => {
            let (va, vb) = (x.values(), y.values());
            va.len() == vb.len() && va.iter().zip(&vb).all(|(ia, ib)| cmp(ai, *ia, bi, *ib, content))
        }
        _ => false,
    }
}

/// Same node kinds, object keys and sequence lengths.
pub fn equal_schema(a: &Model, b: &Model) -> bool {
    cmp(&a.index, a.root.val, &b.index, b.root.val, false)
}

/// Same rendered value, regardless of how either side got there.
pub fn equal_value(a: &Model, b: &Model) -> bool {
    cmp(&a.index, a.root.val, &b.index, b.root.val, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(sid: u64, value: serde_json::Value) -> Model {
        let mut model = Model::new(sid);
        model.api().set(&value);
        model
    }

    #[test]
    fn same_value_different_sessions() {
        let a = doc(100_001, json!({"a": [1, "x"], "b": {"c": null}}));
        let b = doc(100_002, json!({"b": {"c": null}, "a": [1, "x"]}));
        assert!(equal_value(&a, &b));
        assert!(equal_schema(&a, &b));
    }

    #[test]
    fn schema_ignores_leaf_values() {
        let a = doc(100_001, json!({"name": "ann", "tags": [1, 2]}));
        let b = doc(100_002, json!({"name": "bob", "tags": [3, 4]}));
        assert!(equal_schema(&a, &b));
        assert!(!equal_value(&a, &b));
    }

    #[test]
    fn schema_sees_keys_lengths_and_kinds() {
        let base = doc(100_001, json!({"a": [1, 2]}));
        assert!(!equal_schema(&base, &doc(100_002, json!({"b": [1, 2]}))));
        assert!(!equal_schema(&base, &doc(100_002, json!({"a": [1]}))));
        assert!(!equal_schema(&base, &doc(100_002, json!({"a": "12"}))));
    }

    #[test]
    fn deleted_keys_do_not_count() {
        let a = doc(100_001, json!({"a": 1}));
        let mut b = doc(100_002, json!({"a": 1, "gone": true}));
        let root = b.root.val;
        b.api().obj_del(root, &["gone"]).unwrap();
        assert!(equal_value(&a, &b));
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn empty_documents_are_equal() {
        assert!(equal_value(&Model::new(100_001), &Model::new(100_002)));
        assert!(!equal_value(&Model::new(100_001), &doc(100_002, json!(1))));
    }
}
