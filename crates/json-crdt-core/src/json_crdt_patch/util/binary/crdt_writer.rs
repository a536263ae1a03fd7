//! [`CrdtWriter`]: growable byte buffer with the variable-length integer
//! and relative-id encodings of the CRDT wire formats.
//!
//! - `vu57`: 7 payload bits per byte, little-endian groups, high bit means
//!   "more follows"; the eighth byte carries a full 8 bits.
//! - `b1vu56`: like `vu57`, but the first byte is `|f?zzzzzz|`: a user flag,
//!   a continuation bit, and the 6 lowest payload bits.
//! - `id(x, y)`: one byte `|0xxxyyyy|` when `x <= 7 && y <= 15`, otherwise
//!   `b1vu56(1, x)` followed by `vu57(y)`.
//!
//! Constant literals are written as CBOR by hand so that encoding never fails.

use serde_json::Value;

use super::CBOR_UNDEFINED;
use crate::json_crdt_patch::operations::Literal;

#[derive(Debug, Default, Clone)]
pub struct CrdtWriter {
    buf: Vec<u8>,
}

impl CrdtWriter {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(size: usize) -> Self {
        Self { buf: Vec::with_capacity(size) }
    }

    /// Discards everything written so far.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Returns the written bytes and leaves the writer empty.
    pub fn flush(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn u8(&mut self, val: u8) {
        self.buf.push(val);
    }

    #[inline]
    pub fn buf(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Reserves four bytes and returns their position for [`Self::patch_u32`].
    pub fn reserve_u32(&mut self) -> usize {
        let at = self.buf.len();
        self.buf.extend_from_slice(&[0; 4]);
        at
    }

    /// Overwrites four reserved bytes with a big-endian `u32`.
    pub fn patch_u32(&mut self, at: usize, val: u32) {
        if let Some(slot) = self.buf.get_mut(at..at + 4) {
            slot.copy_from_slice(&val.to_be_bytes());
        }
    }

    /// Writes raw UTF-8 and returns its byte length.
    pub fn utf8(&mut self, s: &str) -> usize {
        self.buf.extend_from_slice(s.as_bytes());
        s.len()
    }

    pub fn id(&mut self, x: u64, y: u64) {
        if x <= 0b111 && y <= 0b1111 {
            self.u8(((x as u8) << 4) | y as u8);
        } else {
            self.b1vu56(1, x);
            self.vu57(y);
        }
    }

    pub fn vu57(&mut self, mut num: u64) {
        for _ in 0..7 {
            if num <= 0x7f {
                self.u8(num as u8);
                return;
            }
            self.u8(0x80 | (num & 0x7f) as u8);
            num >>= 7;
        }
        self.u8(num as u8);
    }

    pub fn b1vu56(&mut self, flag: u8, num: u64) {
        let flag = (flag & 1) << 7;
        if num <= 0x3f {
            self.u8(flag | num as u8);
            return;
        }
        self.u8(flag | 0x40 | (num & 0x3f) as u8);
        let mut rest = num >> 6;
        for _ in 0..6 {
            if rest <= 0x7f {
                self.u8(rest as u8);
                return;
            }
            self.u8(0x80 | (rest & 0x7f) as u8);
            rest >>= 7;
        }
        self.u8(rest as u8);
    }

    // ── CBOR ───────────────────────────────────────────────────────────────

    fn cbor_head(&mut self, major: u8, n: u64) {
        let major = major << 5;
        if n < 24 {
            self.u8(major | n as u8);
        } else if n <= 0xff {
            self.u8(major | 24);
            self.u8(n as u8);
        } else if n <= 0xffff {
            self.u8(major | 25);
            self.buf(&(n as u16).to_be_bytes());
        } else if n <= 0xffff_ffff {
            self.u8(major | 26);
            self.buf(&(n as u32).to_be_bytes());
        } else {
            self.u8(major | 27);
            self.buf(&n.to_be_bytes());
        }
    }

    pub fn cbor_uint(&mut self, n: u64) {
        self.cbor_head(0, n);
    }

    pub fn cbor_str(&mut self, s: &str) {
        self.cbor_head(3, s.len() as u64);
        self.utf8(s);
    }

    pub fn cbor_bytes(&mut self, b: &[u8]) {
        self.cbor_head(2, b.len() as u64);
        self.buf(b);
    }

    pub fn cbor_json(&mut self, v: &Value) {
        match v {
            Value::Null => self.u8(0xf6),
            Value::Bool(false) => self.u8(0xf4),
            Value::Bool(true) => self.u8(0xf5),
            Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    self.cbor_head(0, u);
                } else if let Some(i) = n.as_i64() {
                    self.cbor_head(1, (-1 - i) as u64);
                } else {
                    self.u8(0xfb);
                    self.buf(&n.as_f64().unwrap_or(f64::NAN).to_be_bytes());
                }
            }
            Value::String(s) => self.cbor_str(s),
            Value::Array(items) => {
                self.cbor_head(4, items.len() as u64);
                for item in items {
                    self.cbor_json(item);
                }
            }
            Value::Object(map) => {
                self.cbor_head(5, map.len() as u64);
                for (k, item) in map {
                    self.cbor_str(k);
                    self.cbor_json(item);
                }
            }
        }
    }

    /// Writes a constant literal; `undefined` is the CBOR simple value 23.
    pub fn literal(&mut self, lit: &Literal) {
        match lit {
            Literal::Undefined => self.u8(CBOR_UNDEFINED),
            Literal::Json(v) => self.cbor_json(v),
            Literal::Bytes(b) => self.cbor_bytes(b),
        }
    }
}
