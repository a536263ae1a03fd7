//! Byte-level primitives shared by the patch and model codecs.

pub mod crdt_reader;
pub mod crdt_writer;

pub use crdt_reader::{CrdtReader, ReadError};
pub use crdt_writer::CrdtWriter;

/// CBOR `undefined` simple value.
pub const CBOR_UNDEFINED: u8 = 0xf7;
