#![allow(dead_code)]

use json_crdt_core::{Model, Patch};
use serde_json::Value;

pub const ALICE: u64 = 100_000;
pub const BOB: u64 = 200_000;
pub const CAROL: u64 = 300_000;

/// Routes crate logs to the test harness; set `RUST_LOG` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Document created by `sid` holding `json`, plus the patch that built it.
pub fn seeded(sid: u64, json: &Value) -> (Model, Patch) {
    let mut model = Model::new(sid);
    model.api().set(json);
    let patch = model.api().flush();
    (model, patch)
}

/// Flushes both replicas and delivers each one's changes to the other.
pub fn exchange(a: &mut Model, b: &mut Model) -> (Patch, Patch) {
    let from_a = a.api().flush();
    let from_b = b.api().flush();
    a.apply_patch(&from_b);
    b.apply_patch(&from_a);
    (from_a, from_b)
}

pub fn assert_converged(a: &Model, b: &Model) {
    assert_eq!(a.view(), b.view());
    assert_eq!(a.hash(), b.hash());
    assert!(a.equals(b));
}
