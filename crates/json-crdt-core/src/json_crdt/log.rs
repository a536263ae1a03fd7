//! Patch history of a document.
//!
//! A [`Log`] keeps a frozen start model, every patch applied since, keyed
//! by patch id in `(time, sid)` order, and the live end model. Any point in
//! history can be rebuilt by replaying patches onto a copy of the start.

use std::collections::BTreeMap;

use tracing::debug;

use crate::json_crdt::model::Model;
use crate::json_crdt_patch::clock::Ts;
use crate::json_crdt_patch::patch::Patch;

#[derive(Debug, Clone)]
pub struct Log {
    start: Model,
    pub patches: BTreeMap<Ts, Patch>,
    pub end: Model,
}

impl Log {
    /// Freezes the current state of `model` as the start of the log.
    pub fn from_model(model: &Model) -> Self {
        Self {
            start: model.clone(),
            patches: BTreeMap::new(),
            end: model.clone(),
        }
    }

    /// Log whose start is an empty document in `model`'s session. Use for a
    /// model that has not been edited yet.
    pub fn from_new_model(model: Model) -> Self {
        let mut start = Model::from_clock(model.clock.clone());
        start.ext = model.ext.clone();
        Self { start, patches: BTreeMap::new(), end: model }
    }

    /// Fresh copy of the start model.
    pub fn start(&self) -> Model {
        self.start.clone()
    }

    pub fn end(&self) -> &Model {
        &self.end
    }

    /// Applies `patch` to the end model and records it. Nil patches are
    /// ignored.
    pub fn apply(&mut self, patch: Patch) {
        self.end.apply_patch(&patch);
        self.record(patch);
    }

    /// Records a patch that was already applied to the end model elsewhere.
    pub fn record(&mut self, patch: Patch) {
        if let Some(id) = patch.get_id() {
            self.patches.insert(id, patch);
        }
    }

    /// Flushes the end model's pending local changes into the log.
    pub fn flush(&mut self) -> Patch {
        let patch = self.end.api().flush();
        self.record(patch.clone());
        patch
    }

    pub fn replay_to_end(&self) -> Model {
        let mut model = self.start();
        for patch in self.patches.values() {
            model.apply_patch(patch);
        }
        model
    }

    /// Start model plus every patch with id up to `ts`, inclusive.
    pub fn replay_to(&self, ts: Ts) -> Model {
        let mut model = self.start();
        for patch in self.patches.range(..=ts).map(|(_, p)| p) {
            model.apply_patch(patch);
        }
        model
    }

    /// Folds every patch with id up to `ts` into the start model and drops
    /// them from the history.
    pub fn advance_to(&mut self, ts: Ts) {
        // Ids order by time first, so the next session at the same time is
        // the first id past `ts`.
        let rest = self.patches.split_off(&Ts::new(ts.sid.saturating_add(1), ts.time));
        let baked = std::mem::replace(&mut self.patches, rest);
        debug!(count = baked.len(), %ts, "advancing log start");
        for patch in baked.values() {
            self.start.apply_patch(patch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SID: u64 = 400_000;

    fn edited_log() -> (Log, Vec<Ts>) {
        let mut log = Log::from_new_model(Model::new(SID));
        let mut ids = Vec::new();
        log.end.api().set(&json!({"n": 1}));
        ids.push(log.flush().get_id().unwrap());
        let root = log.end.root.val;
        log.end.api().obj_set(root, &[("n", json!(2))]).unwrap();
        ids.push(log.flush().get_id().unwrap());
        log.end.api().obj_set(root, &[("m", json!(true))]).unwrap();
        ids.push(log.flush().get_id().unwrap());
        (log, ids)
    }

    #[test]
    fn replays_history() {
        let (log, ids) = edited_log();
        assert_eq!(log.patches.len(), 3);
        assert_eq!(log.start().view(), serde_json::Value::Null);
        assert_eq!(log.replay_to(ids[0]).view(), json!({"n": 1}));
        assert_eq!(log.replay_to(ids[1]).view(), json!({"n": 2}));
        assert_eq!(log.replay_to_end().view(), log.end().view());
        assert_eq!(log.replay_to_end().to_binary(), log.end().to_binary());
    }

    #[test]
    fn advance_moves_the_start() {
        let (mut log, ids) = edited_log();
        log.advance_to(ids[1]);
        assert_eq!(log.patches.len(), 1);
        assert_eq!(log.start().view(), json!({"n": 2}));
        assert_eq!(log.replay_to_end().view(), json!({"n": 2, "m": true}));
    }

    #[test]
    fn remote_patches_are_recorded() {
        let (mut log, _) = edited_log();
        let mut peer = log.end().fork(Some(SID + 1));
        let root = peer.root.val;
        let patch = {
            let mut api = peer.api();
            api.obj_set(root, &[("peer", json!("hi"))]).unwrap();
            api.flush()
        };
        log.apply(patch);
        assert_eq!(log.patches.len(), 4);
        assert_eq!(log.end().view()["peer"], json!("hi"));
        assert_eq!(log.replay_to_end().view(), log.end().view());
    }

    #[test]
    fn frozen_start_is_independent() {
        let mut model = Model::new(SID);
        model.api().set(&json!([1]));
        let mut log = Log::from_model(&model);
        let root = log.end.root.val;
        log.end.api().arr_ins(root, 1, &[json!(2)]).unwrap();
        log.flush();
        assert_eq!(log.start().view(), json!([1]));
        assert_eq!(log.replay_to_end().view(), json!([1, 2]));
    }
}
