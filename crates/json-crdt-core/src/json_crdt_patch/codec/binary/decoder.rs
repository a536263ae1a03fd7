//! Binary patch decoder.

use thiserror::Error;

use crate::json_crdt_patch::clock::{ts, Ts, Tss};
use crate::json_crdt_patch::enums::{JsonCrdtPatchOpcode as Opcode, SESSION};
use crate::json_crdt_patch::operations::{ConValue, Op};
use crate::json_crdt_patch::patch::Patch;
use crate::json_crdt_patch::util::binary::{CrdtReader, ReadError, CBOR_UNDEFINED};

#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),
    #[error("{0} trailing bytes after patch")]
    TrailingBytes(usize),
    #[error("time or span {0} out of range")]
    OutOfRange(u64),
}

fn in_range(value: u64) -> Result<u64, DecodeError> {
    if value > SESSION::MAX {
        return Err(DecodeError::OutOfRange(value));
    }
    Ok(value)
}

/// Decoder state for one blob. Operation ids are rebuilt by advancing a
/// cursor from the patch id by each op's span; the cursor never passes
/// [`SESSION::MAX`].
pub struct Decoder<'a> {
    reader: CrdtReader<'a>,
    sid: u64,
    time: u64,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { reader: CrdtReader::new(data), sid: 0, time: 0 }
    }

    pub fn reset(&mut self, data: &'a [u8]) {
        self.reader.reset(data);
        self.sid = 0;
        self.time = 0;
    }

    pub fn decode(&mut self) -> Result<Patch, DecodeError> {
        self.sid = self.reader.vu57()?;
        self.time = in_range(self.reader.vu57()?)?;
        let meta = if self.reader.peek()? == CBOR_UNDEFINED {
            self.reader.u8()?;
            None
        } else {
            Some(self.reader.cbor_json()?)
        };
        let count = self.reader.vu57()?;
        let mut ops = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            let op = self.decode_operation()?;
            self.time = in_range(self.time + op.span())?;
            ops.push(op);
        }
        if !self.reader.is_eof() {
            return Err(DecodeError::TrailingBytes(self.reader.remaining()));
        }
        Ok(Patch { ops, meta })
    }

    fn decode_id(&mut self) -> Result<Ts, DecodeError> {
        let (flag, time) = self.reader.b1vu56()?;
        let time = in_range(time)?;
        if flag == 0 {
            Ok(ts(self.sid, time))
        } else {
            Ok(ts(self.reader.vu57()?, time))
        }
    }

    fn decode_tss(&mut self) -> Result<Tss, DecodeError> {
        let start = self.decode_id()?;
        let span = in_range(self.reader.vu57()?)?;
        Ok(Tss::new(start.sid, start.time, span))
    }

    fn length(&mut self, low: u8) -> Result<u64, DecodeError> {
        if low == 0 {
            Ok(self.reader.vu57()?)
        } else {
            Ok(low as u64)
        }
    }

    fn decode_operation(&mut self) -> Result<Op, DecodeError> {
        let header = self.reader.u8()?;
        let low = header & 0b111;
        let opcode = Opcode::from_u8(header >> 3).ok_or(DecodeError::UnknownOpcode(header >> 3))?;
        let id = ts(self.sid, self.time);
        Ok(match opcode {
            Opcode::NewCon => {
                let val = if low == 1 {
                    ConValue::Ref(self.decode_id()?)
                } else {
                    ConValue::Val(self.reader.literal()?)
                };
                Op::NewCon { id, val }
            }
            Opcode::NewVal => Op::NewVal { id },
            Opcode::NewObj => Op::NewObj { id },
            Opcode::NewVec => Op::NewVec { id },
            Opcode::NewStr => Op::NewStr { id },
            Opcode::NewBin => Op::NewBin { id },
            Opcode::NewArr => Op::NewArr { id },
            Opcode::InsVal => {
                let obj = self.decode_id()?;
                let val = self.decode_id()?;
                Op::InsVal { id, obj, val }
            }
            Opcode::InsObj => {
                let len = self.length(low)?;
                let obj = self.decode_id()?;
                let mut data = Vec::new();
                for _ in 0..len {
                    let key = self.reader.cbor_str()?;
                    data.push((key, self.decode_id()?));
                }
                Op::InsObj { id, obj, data }
            }
            Opcode::InsVec => {
                let len = self.length(low)?;
                let obj = self.decode_id()?;
                let mut data = Vec::new();
                for _ in 0..len {
                    let index = self.reader.u8()?;
                    data.push((index, self.decode_id()?));
                }
                Op::InsVec { id, obj, data }
            }
            Opcode::InsStr => {
                let len = self.length(low)?;
                let obj = self.decode_id()?;
                let after = self.decode_id()?;
                let data = self.reader.utf8(len as usize)?.to_owned();
                Op::InsStr { id, obj, after, data }
            }
            Opcode::InsBin => {
                let len = self.length(low)?;
                let obj = self.decode_id()?;
                let after = self.decode_id()?;
                let data = self.reader.buf(len as usize)?.to_vec();
                Op::InsBin { id, obj, after, data }
            }
            Opcode::InsArr => {
                let len = self.length(low)?;
                let obj = self.decode_id()?;
                let after = self.decode_id()?;
                let mut data = Vec::new();
                for _ in 0..len {
                    data.push(self.decode_id()?);
                }
                Op::InsArr { id, obj, after, data }
            }
            Opcode::Del => {
                let len = self.length(low)?;
                let obj = self.decode_id()?;
                let mut what = Vec::new();
                for _ in 0..len {
                    what.push(self.decode_tss()?);
                }
                Op::Del { id, obj, what }
            }
            Opcode::Nop => Op::Nop { id, len: in_range(self.length(low)?)? },
        })
    }
}
