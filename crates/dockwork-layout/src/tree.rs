//! Arena-backed dock layout tree.
//!
//! [`DockTree`] stores every node as a [`DockNodeRecord`] keyed by
//! [`NodeId`]. Payloads reference children by id and each record carries a
//! non-owning parent link that only tree-maintenance code writes. Public
//! access is read-only; structural changes go through
//! [`crate::mutator`] and [`crate::validate`].

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;

use crate::node::{
    AutoHideNode, ContentKind, DockNode, DockSide, DockNodeRecord, FloatingNode, GroupNode, NodeId,
    Orientation, PersistKey, SplitNode,
};

/// Where a persist key currently lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemLocation {
    pub node_id: NodeId,
    pub content_kind: ContentKind,
    pub in_auto_hide: bool,
}

/// Dock layout tree.
#[derive(Debug, Clone, PartialEq)]
pub struct DockTree {
    root: NodeId,
    next_id: u64,
    nodes: BTreeMap<NodeId, DockNodeRecord>,
}

impl Default for DockTree {
    fn default() -> Self {
        Self::with_document_group()
    }
}

impl DockTree {
    /// Tree holding a single empty Document group.
    #[must_use]
    pub fn with_document_group() -> Self {
        Self::from_group(GroupNode::new(ContentKind::Document))
    }

    /// Tree whose root is `group`.
    #[must_use]
    pub fn from_group(group: GroupNode) -> Self {
        let root = NodeId::generated(1);
        let mut nodes = BTreeMap::new();
        nodes.insert(
            root.clone(),
            DockNodeRecord::new(root.clone(), None, DockNode::Group(group)),
        );
        Self {
            root,
            next_id: 2,
            nodes,
        }
    }

    /// Assemble a tree from records produced by deserialization.
    ///
    /// Parent links are recomputed; unreachable records are dropped.
    pub(crate) fn from_parts(root: NodeId, nodes: BTreeMap<NodeId, DockNodeRecord>) -> Self {
        let next_id = u64::try_from(nodes.len()).unwrap_or(u64::MAX).saturating_add(1);
        let mut tree = Self {
            root,
            next_id,
            nodes,
        };
        tree.relink();
        tree
    }

    // =====================================================================
    // Queries
    // =====================================================================

    #[must_use]
    pub fn root(&self) -> &NodeId {
        &self.root
    }

    #[must_use]
    pub fn node(&self, id: &str) -> Option<&DockNodeRecord> {
        self.nodes.get(id)
    }

    /// All records in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &DockNodeRecord> {
        self.nodes.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Child ids of `id` in slot order. Empty for leaves and unknown ids.
    #[must_use]
    pub fn children(&self, id: &str) -> Vec<&NodeId> {
        self.nodes
            .get(id)
            .map(|record| record.node().child_ids())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn parent_of(&self, id: &str) -> Option<&NodeId> {
        self.nodes.get(id).and_then(DockNodeRecord::parent)
    }

    /// Self-first depth-first walk starting at `start`.
    #[must_use]
    pub fn depth_first(&self, start: &str) -> DepthFirst<'_> {
        let stack = self
            .nodes
            .get_key_value(start)
            .map(|(id, _)| vec![id])
            .unwrap_or_default();
        DepthFirst {
            tree: self,
            stack,
            seen: FxHashSet::default(),
        }
    }

    /// Self-first depth-first walk from the root.
    #[must_use]
    pub fn walk(&self) -> DepthFirst<'_> {
        self.depth_first(self.root.as_str())
    }

    #[must_use]
    pub fn group(&self, id: &str) -> Option<&GroupNode> {
        self.nodes.get(id).and_then(|record| record.node().as_group())
    }

    #[must_use]
    pub fn auto_hide(&self, id: &str) -> Option<&AutoHideNode> {
        self.nodes
            .get(id)
            .and_then(|record| record.node().as_auto_hide())
    }

    #[must_use]
    pub fn split(&self, id: &str) -> Option<&SplitNode> {
        self.nodes.get(id).and_then(|record| record.node().as_split())
    }

    #[must_use]
    pub fn floating(&self, id: &str) -> Option<&FloatingNode> {
        self.nodes
            .get(id)
            .and_then(|record| record.node().as_floating())
    }

    /// Reachable groups in depth-first order.
    pub fn groups(&self) -> impl Iterator<Item = (&NodeId, &GroupNode)> {
        self.walk()
            .filter_map(|record| record.node().as_group().map(|group| (record.id(), group)))
    }

    /// Reachable auto-hide strips in depth-first order.
    pub fn auto_hides(&self) -> impl Iterator<Item = (&NodeId, &AutoHideNode)> {
        self.walk().filter_map(|record| {
            record
                .node()
                .as_auto_hide()
                .map(|strip| (record.id(), strip))
        })
    }

    /// First node holding `key`, depth-first.
    #[must_use]
    pub fn locate(&self, key: &str) -> Option<ItemLocation> {
        self.walk().find_map(|record| match record.node() {
            DockNode::Group(group) if group.contains(key) => Some(ItemLocation {
                node_id: record.id().clone(),
                content_kind: group.content_kind(),
                in_auto_hide: false,
            }),
            DockNode::AutoHide(strip) if strip.contains(key) => Some(ItemLocation {
                node_id: record.id().clone(),
                content_kind: strip.content_kind(),
                in_auto_hide: true,
            }),
            _ => None,
        })
    }

    /// Every item key in depth-first order, duplicates included.
    #[must_use]
    pub fn all_keys(&self) -> Vec<PersistKey> {
        let mut keys = Vec::new();
        for record in self.walk() {
            match record.node() {
                DockNode::Group(group) => {
                    keys.extend(group.items().iter().map(|item| item.persist_key.clone()));
                }
                DockNode::AutoHide(strip) => {
                    keys.extend(strip.items().iter().map(|item| item.persist_key.clone()));
                }
                DockNode::Split(_) | DockNode::Floating(_) => {}
            }
        }
        keys
    }

    #[must_use]
    pub fn document_group_count(&self) -> usize {
        self.groups()
            .filter(|(_, group)| group.content_kind() == ContentKind::Document)
            .count()
    }

    /// Deterministic FNV-1a hash over canonical tree content.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
        const PRIME: u64 = 0x0000_0001_0000_01b3;

        fn mix(hash: &mut u64, byte: u8) {
            *hash ^= u64::from(byte);
            *hash = hash.wrapping_mul(PRIME);
        }

        fn mix_bytes(hash: &mut u64, bytes: &[u8]) {
            for byte in bytes {
                mix(hash, *byte);
            }
        }

        fn mix_u64(hash: &mut u64, value: u64) {
            mix_bytes(hash, &value.to_le_bytes());
        }

        fn mix_f64(hash: &mut u64, value: f64) {
            mix_u64(hash, value.to_bits());
        }

        fn mix_str(hash: &mut u64, value: &str) {
            mix_u64(hash, value.len() as u64);
            mix_bytes(hash, value.as_bytes());
        }

        fn mix_opt_str(hash: &mut u64, value: Option<&str>) {
            match value {
                Some(value) => {
                    mix(hash, 1);
                    mix_str(hash, value);
                }
                None => mix(hash, 0),
            }
        }

        fn kind_byte(kind: ContentKind) -> u8 {
            match kind {
                ContentKind::Document => 1,
                ContentKind::ToolWindow => 2,
            }
        }

        fn side_byte(side: DockSide) -> u8 {
            match side {
                DockSide::Left => 1,
                DockSide::Right => 2,
                DockSide::Top => 3,
                DockSide::Bottom => 4,
            }
        }

        let mut hash = OFFSET_BASIS;
        mix_str(&mut hash, self.root.as_str());
        mix_u64(&mut hash, self.nodes.len() as u64);

        for record in self.nodes.values() {
            mix_str(&mut hash, record.id().as_str());
            mix_opt_str(&mut hash, record.parent().map(NodeId::as_str));
            match record.node() {
                DockNode::Group(group) => {
                    mix(&mut hash, 1);
                    mix(&mut hash, kind_byte(group.content_kind()));
                    mix_u64(&mut hash, group.len() as u64);
                    for item in group.items() {
                        mix_str(&mut hash, item.persist_key.as_str());
                        mix_opt_str(&mut hash, item.state.as_deref());
                    }
                    mix_opt_str(&mut hash, group.active_key().map(PersistKey::as_str));
                }
                DockNode::Split(split) => {
                    mix(&mut hash, 2);
                    mix(
                        &mut hash,
                        match split.orientation() {
                            Orientation::Vertical => 1,
                            Orientation::Horizontal => 2,
                        },
                    );
                    mix_f64(&mut hash, split.ratio());
                    mix_str(&mut hash, split.first().as_str());
                    mix_str(&mut hash, split.second().as_str());
                }
                DockNode::Floating(floating) => {
                    mix(&mut hash, 3);
                    let bounds = floating.bounds();
                    mix_f64(&mut hash, bounds.x);
                    mix_f64(&mut hash, bounds.y);
                    mix_f64(&mut hash, bounds.width);
                    mix_f64(&mut hash, bounds.height);
                    mix_str(&mut hash, floating.root().as_str());
                }
                DockNode::AutoHide(strip) => {
                    mix(&mut hash, 4);
                    mix(&mut hash, side_byte(strip.side()));
                    mix(&mut hash, kind_byte(strip.content_kind()));
                    mix_u64(&mut hash, strip.len() as u64);
                    for item in strip.items() {
                        mix_str(&mut hash, item.persist_key.as_str());
                        mix_opt_str(&mut hash, item.state.as_deref());
                        if let Some(size) = item.popup_size {
                            mix(&mut hash, 1);
                            mix_f64(&mut hash, size.width);
                            mix_f64(&mut hash, size.height);
                        } else {
                            mix(&mut hash, 0);
                        }
                    }
                    mix_opt_str(&mut hash, strip.active_key().map(PersistKey::as_str));
                }
            }
        }

        hash
    }

    // =====================================================================
    // Tree maintenance (crate-internal)
    // =====================================================================

    pub(crate) fn record_mut(&mut self, id: &str) -> Option<&mut DockNodeRecord> {
        self.nodes.get_mut(id)
    }

    pub(crate) fn group_mut(&mut self, id: &str) -> Option<&mut GroupNode> {
        match self.nodes.get_mut(id)?.node_mut() {
            DockNode::Group(group) => Some(group),
            _ => None,
        }
    }

    pub(crate) fn auto_hide_mut(&mut self, id: &str) -> Option<&mut AutoHideNode> {
        match self.nodes.get_mut(id)?.node_mut() {
            DockNode::AutoHide(strip) => Some(strip),
            _ => None,
        }
    }

    pub(crate) fn split_mut(&mut self, id: &str) -> Option<&mut SplitNode> {
        match self.nodes.get_mut(id)?.node_mut() {
            DockNode::Split(split) => Some(split),
            _ => None,
        }
    }

    pub(crate) fn floating_mut(&mut self, id: &str) -> Option<&mut FloatingNode> {
        match self.nodes.get_mut(id)?.node_mut() {
            DockNode::Floating(floating) => Some(floating),
            _ => None,
        }
    }

    /// Fresh id that is not in the arena.
    pub(crate) fn allocate_node_id(&mut self) -> NodeId {
        loop {
            let candidate = NodeId::generated(self.next_id);
            self.next_id = self.next_id.wrapping_add(1);
            if !self.nodes.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// Insert a leaf payload under `parent` (slot wiring is the caller's job).
    pub(crate) fn insert_leaf(&mut self, parent: Option<NodeId>, node: DockNode) -> NodeId {
        let id = self.allocate_node_id();
        self.nodes
            .insert(id.clone(), DockNodeRecord::new(id.clone(), parent, node));
        id
    }

    /// Point the slot of `parent_id` that holds `old_child` at `new_child`.
    pub(crate) fn replace_child(
        &mut self,
        parent_id: &str,
        old_child: &NodeId,
        new_child: NodeId,
    ) -> bool {
        let Some(parent) = self.nodes.get_mut(parent_id) else {
            return false;
        };
        match parent.node_mut() {
            DockNode::Split(split) if split.first == *old_child => {
                split.first = new_child;
                true
            }
            DockNode::Split(split) if split.second == *old_child => {
                split.second = new_child;
                true
            }
            DockNode::Floating(floating) if floating.root == *old_child => {
                floating.root = new_child;
                true
            }
            _ => false,
        }
    }

    /// Replace `target` in its slot with a split of `target` and a new leaf.
    ///
    /// Returns `(split_id, new_leaf_id)`.
    pub(crate) fn wrap_node(
        &mut self,
        target: &NodeId,
        orientation: Orientation,
        ratio: f64,
        leaf: DockNode,
        leaf_first: bool,
    ) -> Option<(NodeId, NodeId)> {
        let parent = self.nodes.get(target)?.parent().cloned();
        let split_id = self.allocate_node_id();
        let leaf_id = self.allocate_node_id();

        if let Some(parent_id) = &parent {
            if !self.replace_child(parent_id.as_str(), target, split_id.clone()) {
                return None;
            }
        } else {
            self.root = split_id.clone();
        }

        let (first, second) = if leaf_first {
            (leaf_id.clone(), target.clone())
        } else {
            (target.clone(), leaf_id.clone())
        };
        self.nodes.insert(
            leaf_id.clone(),
            DockNodeRecord::new(leaf_id.clone(), Some(split_id.clone()), leaf),
        );
        self.nodes.insert(
            split_id.clone(),
            DockNodeRecord::new(
                split_id.clone(),
                parent,
                DockNode::Split(SplitNode::new(orientation, ratio, first, second)),
            ),
        );
        if let Some(record) = self.nodes.get_mut(target) {
            record.set_parent(Some(split_id.clone()));
        }
        Some((split_id, leaf_id))
    }

    /// Wrap the whole tree in a split with a new leaf. Returns the leaf id.
    pub(crate) fn wrap_root(
        &mut self,
        orientation: Orientation,
        ratio: f64,
        leaf: DockNode,
        leaf_first: bool,
    ) -> NodeId {
        let old_root = self.root.clone();
        let split_id = self.allocate_node_id();
        let leaf_id = self.allocate_node_id();
        let (first, second) = if leaf_first {
            (leaf_id.clone(), old_root.clone())
        } else {
            (old_root.clone(), leaf_id.clone())
        };
        self.nodes.insert(
            leaf_id.clone(),
            DockNodeRecord::new(leaf_id.clone(), Some(split_id.clone()), leaf),
        );
        self.nodes.insert(
            split_id.clone(),
            DockNodeRecord::new(
                split_id.clone(),
                None,
                DockNode::Split(SplitNode::new(orientation, ratio, first, second)),
            ),
        );
        if let Some(record) = self.nodes.get_mut(&old_root) {
            record.set_parent(Some(split_id.clone()));
        }
        self.root = split_id;
        leaf_id
    }

    /// Detach `id` with its sub-tree and promote its sibling.
    ///
    /// A node hosted by a floating window takes the window with it. The
    /// root is never pruned; returns `false` when nothing was removed.
    pub(crate) fn prune_node(&mut self, id: &NodeId) -> bool {
        let Some(parent_id) = self.nodes.get(id).and_then(|record| record.parent().cloned())
        else {
            return false;
        };
        let Some(parent) = self.nodes.get(&parent_id) else {
            return false;
        };
        let grandparent = parent.parent().cloned();
        let sibling = match parent.node() {
            DockNode::Split(split) if split.first == *id => Some(split.second.clone()),
            DockNode::Split(split) if split.second == *id => Some(split.first.clone()),
            DockNode::Floating(_) => None,
            _ => return false,
        };
        let Some(sibling) = sibling else {
            return self.prune_node(&parent_id);
        };

        match &grandparent {
            Some(grandparent_id) => {
                if !self.replace_child(grandparent_id.as_str(), &parent_id, sibling.clone()) {
                    return false;
                }
            }
            None => self.root = sibling.clone(),
        }
        if let Some(record) = self.nodes.get_mut(&sibling) {
            record.set_parent(grandparent);
        }
        self.nodes.remove(&parent_id);
        self.remove_subtree(id);
        true
    }

    /// Make `id` the root, dropping the previous root's remaining records.
    pub(crate) fn set_root(&mut self, id: NodeId) {
        self.root = id;
        self.relink();
    }

    /// Recompute parent links from the root and drop unreachable records.
    ///
    /// Returns the number of records dropped.
    pub(crate) fn relink(&mut self) -> usize {
        if !self.nodes.contains_key(&self.root) {
            let root = self.root.clone();
            self.nodes.insert(
                root.clone(),
                DockNodeRecord::new(
                    root,
                    None,
                    DockNode::Group(GroupNode::new(ContentKind::Document)),
                ),
            );
        }

        let mut reachable: FxHashSet<NodeId> = FxHashSet::default();
        let mut stack: Vec<(NodeId, Option<NodeId>)> = vec![(self.root.clone(), None)];
        while let Some((id, parent)) = stack.pop() {
            if !reachable.insert(id.clone()) {
                continue;
            }
            let Some(record) = self.nodes.get_mut(&id) else {
                continue;
            };
            record.set_parent(parent);
            for child in record.node().child_ids() {
                stack.push((child.clone(), Some(id.clone())));
            }
        }

        let before = self.nodes.len();
        self.nodes.retain(|id, _| reachable.contains(id));
        before - self.nodes.len()
    }

    fn remove_subtree(&mut self, root_id: &NodeId) {
        let mut stack = vec![root_id.clone()];
        while let Some(id) = stack.pop() {
            if let Some(record) = self.nodes.remove(&id) {
                stack.extend(record.node().child_ids().into_iter().cloned());
            }
        }
    }
}

/// Self-first depth-first iterator over a [`DockTree`].
///
/// The first child is visited before the second; ids missing from the
/// arena are skipped and each record is yielded at most once.
pub struct DepthFirst<'a> {
    tree: &'a DockTree,
    stack: Vec<&'a NodeId>,
    seen: FxHashSet<&'a NodeId>,
}

impl<'a> Iterator for DepthFirst<'a> {
    type Item = &'a DockNodeRecord;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            if !self.seen.insert(id) {
                continue;
            }
            let Some(record) = self.tree.nodes.get(id) else {
                continue;
            };
            self.stack
                .extend(record.node().child_ids().into_iter().rev());
            return Some(record);
        }
        None
    }
}
