//! Advisory concurrency guard. Operations register the window and node ids
//! they are working on; affordance checks consult the sets so the UI can
//! grey out actions that would collide. Nothing here blocks.

use crate::codec;
use crate::schema;
use crate::types::{Node, NodeId, NodeKind, WindowId};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BusyId {
    Window(WindowId),
    Node(NodeId),
}

impl From<WindowId> for BusyId {
    fn from(id: WindowId) -> Self {
        BusyId::Window(id)
    }
}

impl From<NodeId> for BusyId {
    fn from(id: NodeId) -> Self {
        BusyId::Node(id)
    }
}

impl From<&str> for BusyId {
    fn from(id: &str) -> Self {
        BusyId::Node(id.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Stash,
    Unstash,
}

#[derive(Debug, Default)]
struct BusySets {
    stashing: HashSet<BusyId>,
    unstashing: HashSet<BusyId>,
}

impl BusySets {
    fn of(&mut self, kind: OpKind) -> &mut HashSet<BusyId> {
        match kind {
            OpKind::Stash => &mut self.stashing,
            OpKind::Unstash => &mut self.unstashing,
        }
    }

    fn contains(&self, id: &BusyId) -> bool {
        self.stashing.contains(id) || self.unstashing.contains(id)
    }
}

#[derive(Clone, Default)]
pub struct OpGuard {
    sets: Arc<Mutex<BusySets>>,
}

impl OpGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` busy under `kind`. The returned token removes the mark when
    /// released or dropped, so an early return cannot leave a stale entry.
    pub fn acquire(&self, kind: OpKind, id: impl Into<BusyId>) -> BusyToken {
        let id = id.into();
        self.sets.lock().of(kind).insert(id.clone());
        BusyToken {
            sets: Arc::clone(&self.sets),
            kind,
            id: Some(id),
        }
    }

    /// Membership in the union of both sets.
    pub fn is_busy(&self, id: impl Into<BusyId>) -> bool {
        self.sets.lock().contains(&id.into())
    }

    fn node_busy(&self, id: &NodeId) -> bool {
        self.is_busy(id.clone())
    }

    /// Whether tabs may be stashed from `window_id` into `node` right now.
    /// False while the node, its parent folder, or the window is in flight.
    pub fn can_stash_here(&self, node: &Node, window_id: WindowId) -> bool {
        if self.is_busy(window_id) || self.node_busy(&node.id) {
            return false;
        }
        if let Some(parent_id) = &node.parent_id {
            if self.node_busy(parent_id) {
                return false;
            }
        }
        true
    }

    /// Whether `node` may be unstashed right now. Separators and roots never
    /// qualify; folders annotated private need private windows to be allowed.
    pub fn can_unstash(&self, node: &Node, is_root: bool, private_allowed: bool) -> bool {
        if is_root || node.kind == NodeKind::Separator || self.node_busy(&node.id) {
            return false;
        }
        if node.kind == NodeKind::Folder && !private_allowed {
            let (_, props) = codec::parse(&node.title);
            if props
                .as_ref()
                .map(schema::window_from_note)
                .is_some_and(|proto| proto.incognito)
            {
                return false;
            }
        }
        true
    }
}

/// Busy mark held for the duration of one operation on one id.
pub struct BusyToken {
    sets: Arc<Mutex<BusySets>>,
    kind: OpKind,
    id: Option<BusyId>,
}

impl BusyToken {
    /// Remove the mark now instead of at end of scope.
    pub fn release(mut self) {
        self.clear();
    }

    fn clear(&mut self) {
        if let Some(id) = self.id.take() {
            self.sets.lock().of(self.kind).remove(&id);
        }
    }
}

impl Drop for BusyToken {
    fn drop(&mut self) {
        self.clear();
    }
}
