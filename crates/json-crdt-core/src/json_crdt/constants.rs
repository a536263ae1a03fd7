pub use crate::json_crdt_patch::constants::ORIGIN;

/// A `vec` node addresses its slots with a single byte.
pub const MAX_VEC_SLOTS: usize = 256;

/// Deepest node nesting the snapshot decoders accept. Decoding recurses
/// once per level.
pub const MAX_DECODE_DEPTH: usize = 512;
