//! Change notifications emitted by a [`Model`](super::Model).

use std::fmt;

use crate::json_crdt_patch::clock::Ts;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// A change made through the local API or `apply_local_patch`.
    Local,
    /// A patch received from another replica.
    Remote,
    /// The whole state was replaced by `reset`.
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelChange {
    pub origin: ChangeOrigin,
    /// Id of the first applied operation, if any.
    pub patch_id: Option<Ts>,
    /// Model tick after the change.
    pub tick: u64,
}

/// Handle returned by `subscribe`; pass it back to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

pub type Listener = Box<dyn FnMut(&ModelChange) + Send>;

#[derive(Default)]
pub(crate) struct Listeners {
    next: u64,
    entries: Vec<(Subscription, Listener)>,
}

impl Listeners {
    pub fn subscribe(&mut self, listener: Listener) -> Subscription {
        let sub = Subscription(self.next);
        self.next += 1;
        self.entries.push((sub, listener));
        sub
    }

    pub fn unsubscribe(&mut self, sub: Subscription) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(s, _)| *s != sub);
        self.entries.len() != before
    }

    pub fn emit(&mut self, change: &ModelChange) {
        for (_, listener) in self.entries.iter_mut() {
            listener(change);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listeners({})", self.entries.len())
    }
}
