//! [`CrdtReader`]: cursor over a byte slice decoding the formats written by
//! [`CrdtWriter`](super::CrdtWriter). Every read is bounds-checked.

use std::io::Cursor;

use ciborium::value::Value as CborValue;
use serde_json::{Map, Number, Value};
use thiserror::Error;

use super::CBOR_UNDEFINED;
use crate::json_crdt_patch::operations::Literal;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReadError {
    #[error("unexpected end of input at byte {at}, {need} more needed")]
    Eof { at: usize, need: usize },
    #[error("invalid UTF-8 at byte {0}")]
    InvalidUtf8(usize),
    #[error("invalid CBOR at byte {at}: {reason}")]
    Cbor { at: usize, reason: String },
}

pub struct CrdtReader<'a> {
    pub data: &'a [u8],
    pub x: usize,
}

impl<'a> CrdtReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, x: 0 }
    }

    pub fn reset(&mut self, data: &'a [u8]) {
        self.data = data;
        self.x = 0;
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.x)
    }

    pub fn is_eof(&self) -> bool {
        self.remaining() == 0
    }

    pub fn peek(&self) -> Result<u8, ReadError> {
        self.data.get(self.x).copied().ok_or(ReadError::Eof { at: self.x, need: 1 })
    }

    #[inline]
    pub fn u8(&mut self) -> Result<u8, ReadError> {
        let v = self.peek()?;
        self.x += 1;
        Ok(v)
    }

    pub fn buf(&mut self, len: usize) -> Result<&'a [u8], ReadError> {
        if len > self.remaining() {
            return Err(ReadError::Eof { at: self.x, need: len - self.remaining() });
        }
        let out = &self.data[self.x..self.x + len];
        self.x += len;
        Ok(out)
    }

    pub fn u32_be(&mut self) -> Result<u32, ReadError> {
        let b = self.buf(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn utf8(&mut self, len: usize) -> Result<&'a str, ReadError> {
        let at = self.x;
        let bytes = self.buf(len)?;
        std::str::from_utf8(bytes).map_err(|_| ReadError::InvalidUtf8(at))
    }

    pub fn id(&mut self) -> Result<(u64, u64), ReadError> {
        let byte = self.peek()?;
        if byte <= 0x7f {
            self.x += 1;
            return Ok(((byte >> 4) as u64, (byte & 0x0f) as u64));
        }
        let (_, x) = self.b1vu56()?;
        let y = self.vu57()?;
        Ok((x, y))
    }

    pub fn vu57(&mut self) -> Result<u64, ReadError> {
        let mut out = 0u64;
        for i in 0..7 {
            let b = self.u8()? as u64;
            out |= (b & 0x7f) << (7 * i);
            if b <= 0x7f {
                return Ok(out);
            }
        }
        let b = self.u8()? as u64;
        Ok(out | (b << 49))
    }

    /// Returns `(flag, value)`.
    pub fn b1vu56(&mut self) -> Result<(u8, u64), ReadError> {
        let first = self.u8()?;
        let flag = first >> 7;
        let mut out = (first & 0x3f) as u64;
        if first & 0x40 == 0 {
            return Ok((flag, out));
        }
        for i in 0..6 {
            let b = self.u8()? as u64;
            out |= (b & 0x7f) << (6 + 7 * i);
            if b <= 0x7f {
                return Ok((flag, out));
            }
        }
        let b = self.u8()? as u64;
        Ok((flag, out | (b << 48)))
    }

    // ── CBOR ───────────────────────────────────────────────────────────────

    /// Reads one CBOR data item.
    pub fn cbor(&mut self) -> Result<CborValue, ReadError> {
        let at = self.x;
        let mut cursor = Cursor::new(&self.data[self.x.min(self.data.len())..]);
        let value: CborValue = ciborium::de::from_reader(&mut cursor).map_err(|e| match e {
            ciborium::de::Error::Io(_) => ReadError::Eof { at, need: 1 },
            other => ReadError::Cbor { at, reason: format!("{other:?}") },
        })?;
        self.x += cursor.position() as usize;
        Ok(value)
    }

    pub fn cbor_json(&mut self) -> Result<Value, ReadError> {
        Ok(cbor_to_json(self.cbor()?))
    }

    pub fn cbor_uint(&mut self) -> Result<u64, ReadError> {
        let at = self.x;
        match self.cbor()? {
            CborValue::Integer(i) => u64::try_from(i).map_err(|_| ReadError::Cbor {
                at,
                reason: "expected unsigned integer".into(),
            }),
            _ => Err(ReadError::Cbor { at, reason: "expected unsigned integer".into() }),
        }
    }

    pub fn cbor_str(&mut self) -> Result<String, ReadError> {
        let at = self.x;
        match self.cbor()? {
            CborValue::Text(s) => Ok(s),
            _ => Err(ReadError::Cbor { at, reason: "expected text string".into() }),
        }
    }

    /// Reads a constant literal as written by [`super::CrdtWriter::literal`].
    pub fn literal(&mut self) -> Result<Literal, ReadError> {
        if self.peek()? == CBOR_UNDEFINED {
            self.x += 1;
            return Ok(Literal::Undefined);
        }
        Ok(match self.cbor()? {
            CborValue::Bytes(b) => Literal::Bytes(b),
            other => Literal::Json(cbor_to_json(other)),
        })
    }
}

/// Lossy conversion into JSON; nested byte strings become number arrays.
pub fn cbor_to_json(v: CborValue) -> Value {
    match v {
        CborValue::Null => Value::Null,
        CborValue::Bool(b) => Value::Bool(b),
        CborValue::Integer(i) => {
            let n = i128::from(i);
            if let Ok(u) = u64::try_from(n) {
                Value::Number(u.into())
            } else if let Ok(s) = i64::try_from(n) {
                Value::Number(s.into())
            } else {
                Number::from_f64(n as f64).map_or(Value::Null, Value::Number)
            }
        }
        CborValue::Float(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        CborValue::Text(s) => Value::String(s),
        CborValue::Bytes(b) => Value::Array(b.into_iter().map(Value::from).collect()),
        CborValue::Array(items) => Value::Array(items.into_iter().map(cbor_to_json).collect()),
        CborValue::Map(entries) => {
            let mut map = Map::new();
            for (k, v) in entries {
                let key = match k {
                    CborValue::Text(s) => s,
                    other => cbor_to_json(other).to_string(),
                };
                map.insert(key, cbor_to_json(v));
            }
            Value::Object(map)
        }
        CborValue::Tag(_, inner) => cbor_to_json(*inner),
        _ => Value::Null,
    }
}
