//! json-crdt-core: a JSON CRDT document engine.
//!
//! Replicas of a JSON document edit independently and exchange patches;
//! every replica that has applied the same set of patches renders the same
//! value.
//!
//! - [`json_crdt_patch`]: timestamps, clocks, operations, patches and the
//!   patch codecs.
//! - [`json_crdt`]: the document model, its node types, local editing API,
//!   snapshot codecs, extensions and patch history.
//! - [`json_hash`]: content hashes that ignore editing history.

pub mod json_crdt_patch;
pub mod json_hash;
pub mod json_crdt;

pub use json_crdt::{Model, ModelApi};
pub use json_crdt_patch::{Patch, PatchBuilder, Ts};
