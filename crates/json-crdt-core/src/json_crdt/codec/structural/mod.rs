//! Whole-document snapshots. `binary` is compact and carries the clock
//! table; `verbose` is a JSON rendering meant for debugging and fixtures.

pub mod binary;
pub mod verbose;
