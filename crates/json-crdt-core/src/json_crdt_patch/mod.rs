//! The patch protocol: timestamps, operations, patches, and their codecs.

pub mod clock;
pub mod codec;
pub mod constants;
pub mod enums;
pub mod operations;
pub mod patch;
pub mod patch_builder;
pub mod util;

pub use clock::{ts, tss, Clock, ClockVector, ServerClockVector, Ts, Tss};
pub use constants::ORIGIN;
pub use operations::{ConValue, Literal, Op};
pub use patch::Patch;
pub use patch_builder::PatchBuilder;
