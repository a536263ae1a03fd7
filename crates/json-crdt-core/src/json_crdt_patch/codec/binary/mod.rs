//! Compact binary form of a [`Patch`].
//!
//! Layout: `vu57 sid`, `vu57 time`, meta (CBOR, `0xf7` when absent),
//! `vu57 op count`, then one record per operation. A record starts with a
//! header byte holding the 5-bit opcode and a 3-bit inline length.

mod decoder;
mod encoder;

pub use decoder::{DecodeError, Decoder};
pub use encoder::Encoder;

use crate::json_crdt_patch::patch::Patch;

pub fn encode(patch: &Patch) -> Vec<u8> {
    Encoder::new().encode(patch)
}

pub fn decode(data: &[u8]) -> Result<Patch, DecodeError> {
    Decoder::new(data).decode()
}
