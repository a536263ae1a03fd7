//! JSON CRDT document model.
//!
//! A [`Model`] is one replica of a document: the node index, the root
//! register, and the logical clock tracking which operations it has seen.
//! Remote changes arrive as patches through [`Model::apply_patch`]; local
//! changes go through [`Model::api`], which records them into a pending
//! patch that [`ModelApi::flush`] hands out for sending.
//!
//! The JSON view is memoized per node. Views of subtrees untouched since the
//! previous read are returned as the same shared allocation.

pub mod api;
pub mod events;
pub mod util;

pub use api::{ApiError, ModelApi};
pub use events::{ChangeOrigin, ModelChange, Subscription};

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{json, Value};
use tracing::{debug, trace};

use crate::json_crdt::codec::structural::{binary, verbose};
use crate::json_crdt::equal;
use crate::json_crdt::extensions::{self, AnyExtension, Extensions};
use crate::json_crdt::nodes::{
    ArrNode, BinNode, ConNode, CrdtNode, NodeIndex, ObjNode, StrNode, ValNode, VecNode,
};
use crate::json_crdt::view::JsonView;
use crate::json_crdt_patch::clock::{Clock, ClockVector, ServerClockVector, Ts};
use crate::json_crdt_patch::constants::ORIGIN;
use crate::json_crdt_patch::operations::{ConValue, Literal, Op};
use crate::json_crdt_patch::patch::Patch;
use crate::json_crdt_patch::patch_builder::PatchBuilder;
use crate::json_hash;
use events::Listeners;
use util::random_session_id;

#[derive(Debug, Default)]
struct ViewCache {
    views: HashMap<Ts, JsonView>,
    /// `str` and `bin` nodes edited since their view was cached.
    dirty: HashSet<Ts>,
    /// Extension id and payload view each cached extension view was built from.
    ext_inputs: HashMap<Ts, (u8, JsonView)>,
}

pub struct Model {
    /// Document root: a register with id ORIGIN that lives outside the index.
    pub root: ValNode,
    pub index: NodeIndex,
    pub clock: Clock,
    /// Incremented once per applied patch, local change, or reset.
    pub tick: u64,
    pub ext: Extensions,
    /// Local changes made through the API and not yet flushed.
    builder: PatchBuilder,
    cache: RefCell<ViewCache>,
    listeners: Listeners,
}

impl Model {
    /// Empty document for session `sid`. Time 0 is never issued.
    pub fn new(sid: u64) -> Self {
        Self::from_clock(ClockVector::new(sid, 1).into())
    }

    /// Empty document with a random user session id.
    pub fn create() -> Self {
        Self::new(random_session_id())
    }

    /// Empty document on a server clock starting at `time`.
    pub fn with_server_clock(time: u64) -> Self {
        Self::from_clock(ServerClockVector::new(time).into())
    }

    pub fn from_clock(clock: Clock) -> Self {
        Self {
            root: ValNode::new(ORIGIN),
            index: NodeIndex::new(),
            builder: PatchBuilder::from_clock(clock.clone()),
            clock,
            tick: 0,
            ext: Extensions::new(),
            cache: RefCell::new(ViewCache::default()),
            listeners: Listeners::default(),
        }
    }

    /// Decodes a binary snapshot, optionally switching to session `sid`.
    pub fn load(data: &[u8], sid: Option<u64>) -> Result<Model, binary::DecodeError> {
        let mut model = binary::decode(data)?;
        if let Some(sid) = sid {
            model.set_sid(sid);
        }
        Ok(model)
    }

    pub fn sid(&self) -> u64 {
        self.clock.sid()
    }

    /// Continues editing under another session. A no-op for server clocks.
    pub fn set_sid(&mut self, sid: u64) {
        if sid != self.clock.sid() {
            self.clock = self.clock.fork(sid);
            self.builder = PatchBuilder::from_clock(self.clock.clone());
        }
    }

    pub fn register_extension(&mut self, ext: Arc<dyn AnyExtension>) {
        self.ext.register(ext);
        let cache = self.cache.get_mut();
        cache.views.clear();
        cache.ext_inputs.clear();
    }

    // ── Applying changes ───────────────────────────────────────────────────

    /// Applies a patch received from any replica. Operations already seen
    /// are no-ops, so patches may be re-delivered.
    pub fn apply_patch(&mut self, patch: &Patch) {
        if patch.is_empty() {
            return;
        }
        for op in &patch.ops {
            self.apply_operation(op);
        }
        self.tick += 1;
        self.notify(ChangeOrigin::Remote, patch.get_id());
    }

    /// Applies a patch authored by this replica: the clock only moves to
    /// the end of the patch and no peer entry is recorded for it.
    pub fn apply_local_patch(&mut self, patch: &Patch) {
        if patch.is_empty() {
            return;
        }
        for op in &patch.ops {
            self.mutate(op);
        }
        self.clock.advance_to(patch.next_time());
        self.tick += 1;
        self.notify(ChangeOrigin::Local, patch.get_id());
    }

    /// Observes `op` on the clock and applies it to the document.
    pub fn apply_operation(&mut self, op: &Op) {
        self.clock.observe(op.id(), op.span());
        self.mutate(op);
    }

    fn create_node(&mut self, node: CrdtNode) {
        let id = node.id();
        if self.index.contains_key(&id) {
            trace!(%id, "node already exists");
            return;
        }
        self.index.insert(id, node);
    }

    fn mutate(&mut self, op: &Op) {
        trace!(op = op.name(), id = %op.id(), "apply");
        let changed = match op {
            Op::NewCon { id, val } => {
                self.create_node(CrdtNode::Con(ConNode { id: *id, val: val.clone() }));
                false
            }
            Op::NewVal { id } => {
                self.create_node(CrdtNode::Val(ValNode::new(*id)));
                false
            }
            Op::NewObj { id } => {
                self.create_node(CrdtNode::Obj(ObjNode::new(*id)));
                false
            }
            Op::NewVec { id } => {
                self.create_node(CrdtNode::Vec(VecNode::new(*id)));
                false
            }
            Op::NewStr { id } => {
                self.create_node(CrdtNode::Str(StrNode::new(*id)));
                false
            }
            Op::NewBin { id } => {
                self.create_node(CrdtNode::Bin(BinNode::new(*id)));
                false
            }
            Op::NewArr { id } => {
                self.create_node(CrdtNode::Arr(ArrNode::new(*id)));
                false
            }
            Op::InsVal { id, obj, val } if *obj == ORIGIN => self.root.set(*id, *val),
            Op::InsVal { id, obj, val } => match self.index.get_mut(obj) {
                // A container may only reference nodes created after it,
                // which keeps the document graph acyclic.
                Some(CrdtNode::Val(node)) if *val > node.id => node.set(*id, *val),
                Some(CrdtNode::Val(_)) => {
                    debug!(%obj, %val, "ins_val references an older node, dropped");
                    false
                }
                _ => {
                    debug!(%obj, "ins_val target is not a val node, dropped");
                    false
                }
            },
            Op::InsObj { id, obj, data } => match self.index.get_mut(obj) {
                Some(CrdtNode::Obj(node)) => {
                    let mut changed = false;
                    for (key, val) in data {
                        if *val > node.id {
                            changed |= node.put(key, *id, *val);
                        } else {
                            debug!(%obj, key = key.as_str(), "ins_obj references an older node, skipped");
                        }
                    }
                    changed
                }
                _ => {
                    debug!(%obj, "ins_obj target is not an obj node, dropped");
                    false
                }
            },
            Op::InsVec { id, obj, data } => match self.index.get_mut(obj) {
                Some(CrdtNode::Vec(node)) => {
                    let mut changed = false;
                    for (index, val) in data {
                        if *val > node.id {
                            changed |= node.put(*index, *id, *val);
                        } else {
                            debug!(%obj, index, "ins_vec references an older node, skipped");
                        }
                    }
                    changed
                }
                _ => {
                    debug!(%obj, "ins_vec target is not a vec node, dropped");
                    false
                }
            },
            Op::InsStr { id, obj, after, data } => match self.index.get_mut(obj) {
                Some(CrdtNode::Str(node)) => node.ins(*after, *id, data.clone()),
                _ => {
                    debug!(%obj, "ins_str target is not a str node, dropped");
                    false
                }
            },
            Op::InsBin { id, obj, after, data } => match self.index.get_mut(obj) {
                Some(CrdtNode::Bin(node)) => node.ins(*after, *id, data.clone()),
                _ => {
                    debug!(%obj, "ins_bin target is not a bin node, dropped");
                    false
                }
            },
            Op::InsArr { id, obj, after, data } => match self.index.get_mut(obj) {
                Some(CrdtNode::Arr(node)) => {
                    let arr = node.id;
                    node.ins(*after, *id, data.clone(), |val| val > arr)
                }
                _ => {
                    debug!(%obj, "ins_arr target is not an arr node, dropped");
                    false
                }
            },
            Op::Del { obj, what, .. } => match self.index.get_mut(obj) {
                Some(CrdtNode::Str(node)) => node.rga.delete(what),
                Some(CrdtNode::Bin(node)) => node.rga.delete(what),
                Some(CrdtNode::Arr(node)) => node.rga.delete(what),
                _ => {
                    debug!(%obj, "del target is not an rga node, dropped");
                    false
                }
            },
            Op::Nop { .. } => false,
        };
        if changed {
            if let Some(obj) = op.target() {
                self.cache.get_mut().dirty.insert(obj);
            }
        }
    }

    /// Runs `f` against the pending local patch and applies whatever
    /// operations it appended.
    pub(crate) fn change<R>(&mut self, f: impl FnOnce(&mut PatchBuilder) -> R) -> R {
        self.builder.clock = self.clock.clone();
        let start = self.builder.patch.ops.len();
        let out = f(&mut self.builder);
        let ops = self.builder.patch.ops[start..].to_vec();
        if ops.is_empty() {
            return out;
        }
        for op in &ops {
            self.apply_operation(op);
        }
        self.tick += 1;
        self.notify(ChangeOrigin::Local, ops.first().map(Op::id));
        out
    }

    /// Local editing API.
    pub fn api(&mut self) -> ModelApi<'_> {
        ModelApi::new(self)
    }

    /// Replaces this replica's state with a copy of `other`'s.
    pub fn reset(&mut self, other: &Model) {
        self.root = other.root.clone();
        self.index = other.index.clone();
        self.clock = other.clock.clone();
        self.ext = other.ext.clone();
        self.builder = PatchBuilder::from_clock(self.clock.clone());
        *self.cache.get_mut() = ViewCache::default();
        self.tick += 1;
        self.notify(ChangeOrigin::Reset, None);
    }

    // ── Copies ─────────────────────────────────────────────────────────────

    fn with_state(&self, clock: Clock) -> Model {
        let mut model = Model::from_clock(clock);
        model.root = self.root.clone();
        model.index = self.index.clone();
        model.ext = self.ext.clone();
        model
    }

    /// Independent replica under a new session, random when `sid` is None.
    /// Listeners and unflushed local changes are not carried over.
    pub fn fork(&self, sid: Option<u64>) -> Model {
        let sid = sid.unwrap_or_else(random_session_id);
        self.with_state(self.clock.fork(sid))
    }

    // ── Events ─────────────────────────────────────────────────────────────

    pub fn subscribe(&mut self, listener: impl FnMut(&ModelChange) + Send + 'static) -> Subscription {
        self.listeners.subscribe(Box::new(listener))
    }

    pub fn unsubscribe(&mut self, sub: Subscription) -> bool {
        self.listeners.unsubscribe(sub)
    }

    fn notify(&mut self, origin: ChangeOrigin, patch_id: Option<Ts>) {
        let change = ModelChange { origin, patch_id, tick: self.tick };
        self.listeners.emit(&change);
    }

    // ── Reading ────────────────────────────────────────────────────────────

    pub fn find(&self, id: Ts) -> Option<&CrdtNode> {
        self.index.get(&id)
    }

    /// Follows `val` registers from `id` to the first non-register node.
    pub fn deref(&self, mut id: Ts) -> Ts {
        while let Some(CrdtNode::Val(reg)) = self.index.get(&id) {
            id = reg.val;
        }
        id
    }

    /// Plain JSON view of the document. An empty document views as `null`.
    pub fn view(&self) -> Value {
        self.view_shared().to_json()
    }

    /// Shared view of the document.
    pub fn view_shared(&self) -> JsonView {
        self.node_view(self.root.val)
    }

    /// Shared view of the subtree rooted at `id`.
    pub fn node_view(&self, id: Ts) -> JsonView {
        let mut cache = self.cache.borrow_mut();
        self.view_of(id, &mut cache)
    }

    fn view_of(&self, id: Ts, cache: &mut ViewCache) -> JsonView {
        let Some(node) = self.index.get(&id) else {
            return JsonView::Undefined;
        };
        let fresh = match node {
            CrdtNode::Val(reg) => return self.view_of(reg.val, cache),
            CrdtNode::Con(con) => {
                if let Some(view) = cache.views.get(&id) {
                    return view.clone();
                }
                con_view(&con.val)
            }
            CrdtNode::Str(node) => {
                if !cache.dirty.remove(&id) {
                    if let Some(view) = cache.views.get(&id) {
                        return view.clone();
                    }
                }
                JsonView::Str(Arc::from(node.view_str()))
            }
            CrdtNode::Bin(node) => {
                if !cache.dirty.remove(&id) {
                    if let Some(view) = cache.views.get(&id) {
                        return view.clone();
                    }
                }
                JsonView::Bin(Arc::from(node.view()))
            }
            CrdtNode::Obj(node) => {
                let mut map = IndexMap::with_capacity(node.keys.len());
                for (key, slot) in &node.keys {
                    map.insert(key.clone(), self.view_of(slot.val, cache));
                }
                reuse_obj(cache.views.get(&id), map)
            }
            CrdtNode::Vec(node) => {
                let ext = extensions::ext_id_of(&self.index, node).and_then(|x| Some((x, self.ext.get(x)?)));
                if let Some((ext_id, ext)) = ext {
                    let payload = match node.get(1) {
                        Some(p) => self.view_of(p, cache),
                        None => JsonView::Undefined,
                    };
                    let unchanged = matches!(
                        cache.ext_inputs.get(&id),
                        Some((seen_id, seen)) if *seen_id == ext_id && seen.ptr_eq(&payload)
                    );
                    if unchanged {
                        if let Some(view) = cache.views.get(&id) {
                            return view.clone();
                        }
                    }
                    let view = ext.view(&payload);
                    cache.ext_inputs.insert(id, (ext_id, payload));
                    cache.views.insert(id, view.clone());
                    return view;
                }
                let mut items = Vec::with_capacity(node.elements.len());
                for slot in &node.elements {
                    items.push(match slot {
                        Some(slot) => self.view_of(slot.val, cache),
                        None => JsonView::Undefined,
                    });
                }
                reuse_arr(cache.views.get(&id), items)
            }
            CrdtNode::Arr(node) => {
                let mut items = Vec::new();
                for child in node.values() {
                    items.push(self.view_of(child, cache));
                }
                reuse_arr(cache.views.get(&id), items)
            }
        };
        cache.views.insert(id, fresh.clone());
        fresh
    }

    /// Content hash of the document value; equal for replicas that
    /// converged, whatever their histories.
    pub fn hash(&self) -> u32 {
        json_hash::hash_node(&self.index, self.root.val)
    }

    /// Whether both documents render the same value.
    pub fn equals(&self, other: &Model) -> bool {
        equal::equal_value(self, other)
    }

    // ── Codecs ─────────────────────────────────────────────────────────────

    pub fn to_binary(&self) -> Vec<u8> {
        binary::encode(self)
    }

    pub fn from_binary(data: &[u8]) -> Result<Model, binary::DecodeError> {
        binary::decode(data)
    }

    pub fn to_verbose(&self) -> Value {
        verbose::encode(self)
    }

    pub fn from_verbose(doc: &Value) -> Result<Model, verbose::DecodeError> {
        verbose::decode(doc)
    }
}

fn con_view(val: &ConValue) -> JsonView {
    match val {
        ConValue::Ref(stamp) => JsonView::from(json!([stamp.sid, stamp.time])),
        ConValue::Val(Literal::Undefined) => JsonView::Undefined,
        ConValue::Val(Literal::Json(v)) => JsonView::from(v.clone()),
        ConValue::Val(Literal::Bytes(b)) => JsonView::Bin(Arc::from(b.as_slice())),
    }
}

fn reuse_obj(prev: Option<&JsonView>, map: IndexMap<String, JsonView>) -> JsonView {
    if let Some(JsonView::Obj(old)) = prev {
        let same = old.len() == map.len()
            && map.iter().all(|(k, v)| old.get(k).is_some_and(|o| o.ptr_eq(v)));
        if same {
            return JsonView::Obj(Arc::clone(old));
        }
    }
    JsonView::Obj(Arc::new(map))
}

fn reuse_arr(prev: Option<&JsonView>, items: Vec<JsonView>) -> JsonView {
    if let Some(JsonView::Arr(old)) = prev {
        let same = old.len() == items.len() && old.iter().zip(&items).all(|(a, b)| a.ptr_eq(b));
        if same {
            return JsonView::Arr(Arc::clone(old));
        }
    }
    JsonView::Arr(Arc::from(items))
}

impl Clone for Model {
    /// Same-session copy. Listeners and unflushed local changes stay behind.
    fn clone(&self) -> Self {
        self.with_state(self.clock.clone())
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("clock", &self.clock)
            .field("root", &self.root.val)
            .field("nodes", &self.index.len())
            .field("tick", &self.tick)
            .field("ext", &self.ext)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_crdt_patch::clock::{ts, tss};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const SID: u64 = 123_456;

    fn str_doc() -> (Model, Patch) {
        let mut b = PatchBuilder::new(SID, 1);
        let obj = b.obj();
        let s = b.str_node();
        b.ins_str(s, s, "hello".into());
        b.ins_obj(obj, vec![("key".into(), s)]);
        b.root(obj);
        let patch = b.flush();
        let mut model = Model::new(SID);
        model.apply_patch(&patch);
        (model, patch)
    }

    #[test]
    fn empty_model_views_null() {
        let model = Model::new(SID);
        assert_eq!(model.view(), Value::Null);
        assert!(model.view_shared().is_undefined());
    }

    #[test]
    fn applies_object_with_string() {
        let (model, _) = str_doc();
        assert_eq!(model.view(), json!({"key": "hello"}));
        assert_eq!(model.clock.time(), 10);
        assert_eq!(model.tick, 1);
    }

    #[test]
    fn reapplying_a_patch_changes_nothing() {
        let (mut model, patch) = str_doc();
        let before = model.to_binary();
        model.apply_patch(&patch);
        assert_eq!(model.view(), json!({"key": "hello"}));
        assert_eq!(model.to_binary(), before);
    }

    #[test]
    fn deletes_characters() {
        let (mut model, _) = str_doc();
        let s = ts(SID, 2);
        model.apply_operation(&Op::Del { id: ts(SID, 20), obj: s, what: vec![tss(SID, 5, 3)] });
        assert_eq!(model.view(), json!({"key": "he"}));
    }

    #[test]
    fn container_cannot_reference_older_node() {
        let mut model = Model::new(SID);
        model.apply_operation(&Op::NewObj { id: ts(SID, 1) });
        model.apply_operation(&Op::NewObj { id: ts(SID, 2) });
        model.apply_operation(&Op::InsObj { id: ts(SID, 3), obj: ts(SID, 1), data: vec![("a".into(), ts(SID, 2))] });
        model.apply_operation(&Op::InsObj { id: ts(SID, 4), obj: ts(SID, 2), data: vec![("b".into(), ts(SID, 1))] });
        model.apply_operation(&Op::InsVal { id: ts(SID, 5), obj: ORIGIN, val: ts(SID, 1) });
        assert_eq!(model.view(), json!({"a": {}}));
    }

    #[test]
    fn unknown_targets_are_ignored() {
        let mut model = Model::new(SID);
        model.apply_operation(&Op::InsStr { id: ts(SID, 2), obj: ts(SID, 1), after: ORIGIN, data: "x".into() });
        model.apply_operation(&Op::Del { id: ts(SID, 3), obj: ts(SID, 1), what: vec![tss(SID, 2, 1)] });
        assert!(model.index.is_empty());
        assert_eq!(model.clock.time(), 4);
    }

    #[test]
    fn con_views() {
        assert!(con_view(&ConValue::Val(Literal::Undefined)).is_undefined());
        assert_eq!(con_view(&ConValue::Ref(ts(5, 6))).to_json(), json!([5, 6]));
        assert_eq!(con_view(&ConValue::Val(Literal::Bytes(vec![1]))).as_bytes(), Some(&[1u8][..]));
    }

    #[test]
    fn unchanged_subtrees_keep_identity() {
        let mut model = Model::new(SID);
        model.api().set(&json!({"a": {"x": 1}, "b": "text"}));
        let v1 = model.view_shared();
        let a = model.api().find(&[json!("a")]).unwrap();
        model.api().obj_set(a, &[("y", json!(2))]).unwrap();
        let v2 = model.view_shared();
        assert!(!v1.ptr_eq(&v2));
        assert!(v1.get("b").unwrap().ptr_eq(v2.get("b").unwrap()));
        assert!(!v1.get("a").unwrap().ptr_eq(v2.get("a").unwrap()));
        let v3 = model.view_shared();
        assert!(v2.ptr_eq(&v3));
    }

    #[test]
    fn dirty_string_view_is_recomputed() {
        let (mut model, _) = str_doc();
        let before = model.view_shared();
        model.apply_operation(&Op::InsStr { id: ts(SID, 30), obj: ts(SID, 2), after: ts(SID, 7), data: "!".into() });
        let after = model.view_shared();
        assert_eq!(after.get("key").and_then(JsonView::as_str), Some("hello!"));
        assert_eq!(before.get("key").and_then(JsonView::as_str), Some("hello"));
    }

    #[test]
    fn local_patch_does_not_record_own_peer() {
        let mut b = PatchBuilder::new(SID, 1);
        let c = b.con(json!(true));
        b.root(c);
        let patch = b.flush();
        let mut model = Model::new(SID);
        model.apply_local_patch(&patch);
        assert_eq!(model.clock.time(), 3);
        match &model.clock {
            Clock::Vector(c) => assert!(c.peers.is_empty()),
            Clock::Server(_) => unreachable!(),
        }
        assert_eq!(model.view(), json!(true));
    }

    #[test]
    fn fork_and_clone_are_independent() {
        let (model, _) = str_doc();
        let mut fork = model.fork(Some(777_777));
        let clone = model.clone();
        assert_eq!(fork.sid(), 777_777);
        assert_eq!(clone.sid(), SID);
        let s = fork.api().find(&[json!("key")]).unwrap();
        fork.api().str_ins(s, 5, " world").unwrap();
        assert_eq!(fork.view(), json!({"key": "hello world"}));
        assert_eq!(model.view(), json!({"key": "hello"}));
        assert_eq!(clone.view(), json!({"key": "hello"}));
        let random = model.fork(None);
        assert_ne!(random.sid(), SID);
    }

    #[test]
    fn listeners_see_origins() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let (remote, patch) = str_doc();
        let mut model = Model::new(SID + 1);
        let sub = model.subscribe(move |change| sink.lock().unwrap().push(change.origin));
        model.apply_patch(&patch);
        model.api().set(&json!(1));
        model.reset(&remote);
        assert_eq!(*seen.lock().unwrap(), vec![ChangeOrigin::Remote, ChangeOrigin::Local, ChangeOrigin::Reset]);
        assert!(model.unsubscribe(sub));
        assert!(!model.unsubscribe(sub));
        assert_eq!(model.view(), json!({"key": "hello"}));
    }

    #[test]
    fn clones_drop_listeners() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut model = Model::new(SID);
        model.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let mut copy = model.clone();
        copy.api().set(&json!(1));
        model.api().set(&json!(2));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn set_sid_forks_clock() {
        let (mut model, _) = str_doc();
        model.set_sid(999_999);
        assert_eq!(model.sid(), 999_999);
        match &model.clock {
            Clock::Vector(c) => assert_eq!(c.peers.get(&SID), Some(&ts(SID, 9))),
            Clock::Server(_) => unreachable!(),
        }
    }
}
