//! Extension nodes: a `vec` whose slot 0 holds a 3-byte header
//! `[ext_id, sid % 256, time % 256]` (the low bytes of the vec's own id) and
//! whose slot 1 holds the payload node. Registered extensions get to reshape
//! the payload view; unregistered ones show up as a plain two element tuple.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::json_crdt::nodes::{CrdtNode, NodeIndex, VecNode};
use crate::json_crdt::view::JsonView;
use crate::json_crdt_patch::clock::Ts;
use crate::json_crdt_patch::operations::{ConValue, Literal};

pub trait AnyExtension: Send + Sync {
    /// Header byte identifying the extension in documents.
    fn id(&self) -> u8;

    fn name(&self) -> &str;

    /// View of the extension node given the view of its payload.
    fn view(&self, payload: &JsonView) -> JsonView {
        payload.clone()
    }
}

/// Header bytes for an extension node created with id `node`.
pub fn header(ext_id: u8, node: Ts) -> Vec<u8> {
    vec![ext_id, (node.sid % 256) as u8, (node.time % 256) as u8]
}

/// Extension id of `vec` when its slot 0 carries a header that matches the
/// vec's own id.
pub fn ext_id_of(index: &NodeIndex, vec: &VecNode) -> Option<u8> {
    let head = vec.get(0)?;
    match index.get(&head) {
        Some(CrdtNode::Con(con)) => match &con.val {
            ConValue::Val(Literal::Bytes(bytes)) if bytes.len() == 3 => {
                let ext_id = bytes[0];
                (header(ext_id, vec.id) == *bytes).then_some(ext_id)
            }
            _ => None,
        },
        _ => None,
    }
}

/// Extensions known to a model, keyed by id.
#[derive(Clone, Default)]
pub struct Extensions {
    registry: BTreeMap<u8, Arc<dyn AnyExtension>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `ext`, replacing any extension with the same id.
    pub fn register(&mut self, ext: Arc<dyn AnyExtension>) {
        self.registry.insert(ext.id(), ext);
    }

    pub fn get(&self, id: u8) -> Option<&Arc<dyn AnyExtension>> {
        self.registry.get(&id)
    }

    pub fn size(&self) -> usize {
        self.registry.len()
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.registry.iter().map(|(id, ext)| (id, ext.name())))
            .finish()
    }
}
