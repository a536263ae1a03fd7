//! Protocol-level timestamp constants.

pub use crate::json_crdt_patch::enums::SESSION;

use crate::json_crdt_patch::clock::Ts;

/// `(SESSION::SYSTEM, 0)`: the id of the document root register, and the
/// anchor meaning "before the first element" in RGA inserts.
pub const ORIGIN: Ts = Ts::new(SESSION::SYSTEM, 0);
