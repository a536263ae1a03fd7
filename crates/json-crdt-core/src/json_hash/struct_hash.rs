//! Printable structural hash: one token per JSON node, so the shape of the
//! value stays visible in the output.
//!
//! | value   | token                                   |
//! |---------|-----------------------------------------|
//! | null    | `N`                                     |
//! | boolean | `T` / `F`                               |
//! | number  | base-36 integer part, `-` when negative |
//! | string  | base-36 string hash                     |
//! | array   | `[a;b;]`                                |
//! | object  | `{key hash:value,}`, keys sorted        |

use serde_json::Value;

use super::hash::JsonHasher;
use super::radix_36;

pub(crate) fn str_token(s: &str) -> String {
    radix_36(JsonHasher::new().str(s).finish() as u64)
}

pub(crate) fn num_token(n: &serde_json::Number) -> String {
    let f = n.as_f64().unwrap_or(0.0);
    match (n.as_u64(), n.as_i64()) {
        (Some(u), _) => radix_36(u),
        (None, Some(i)) => format!("-{}", radix_36(i.unsigned_abs())),
        _ if f < 0.0 => format!("-{}", radix_36(-f as u64)),
        _ => radix_36(f as u64),
    }
}

pub fn struct_hash(value: &Value) -> String {
    match value {
        Value::Null => "N".into(),
        Value::Bool(true) => "T".into(),
        Value::Bool(false) => "F".into(),
        Value::Number(n) => num_token(n),
        Value::String(s) => str_token(s),
        Value::Array(items) => {
            let mut out = String::from("[");
            for item in items {
                out.push_str(&struct_hash(item));
                out.push(';');
            }
            out.push(']');
            out
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = String::from("{");
            for key in keys {
                out.push_str(&str_token(key));
                out.push(':');
                out.push_str(&struct_hash(&map[key]));
                out.push(',');
            }
            out.push('}');
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars() {
        assert_eq!(struct_hash(&json!(null)), "N");
        assert_eq!(struct_hash(&json!(true)), "T");
        assert_eq!(struct_hash(&json!(false)), "F");
        assert_eq!(struct_hash(&json!(0)), "0");
        assert_eq!(struct_hash(&json!(71)), "1z");
        assert_eq!(struct_hash(&json!(-36)), "-10");
        assert_eq!(struct_hash(&json!(2.9)), "2");
    }

    #[test]
    fn containers_show_their_shape() {
        assert_eq!(struct_hash(&json!([null, [true]])), "[N;[T;];]");
        let a = struct_hash(&json!({"x": 1, "y": [false]}));
        let b = struct_hash(&json!({"y": [false], "x": 1}));
        assert_eq!(a, b);
        assert!(a.starts_with('{') && a.ends_with(",}"));
        assert!(a.contains(":1,") && a.contains(":[F;],"));
    }

    #[test]
    fn output_is_printable_ascii() {
        let h = struct_hash(&json!({"emoji": "😀", "list": [1.5, "a\nb"]}));
        assert!(h.bytes().all(|b| (0x20..0x7f).contains(&b)));
    }
}
