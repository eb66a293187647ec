//! Structural tree operations.
//!
//! Every public operation takes a tree by reference and returns a new tree;
//! the input is never changed. Work happens on a clone, so a rejected
//! operation leaves nothing behind.
//!
//! Pruning rule for groups emptied by an operation: ToolWindow groups are
//! always removed; Document groups only while another Document group
//! remains. Emptied auto-hide strips are always removed.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::node::{
    AutoHideItem, AutoHideNode, ContentKind, DockItem, DockNode, DockNodeRecord, DockPosition,
    DockSide, GroupNode, NodeId, PersistKey, PopupSize, clamp_ratio,
};
use crate::tree::DockTree;

/// Share of an auto-hide strip on a leading side (trailing sides use the
/// complement).
pub const AUTO_HIDE_STRIP_RATIO: f64 = 0.06;

/// Share of a ToolWindow group docked beside a Document group.
pub const TOOL_ON_DOCUMENT_RATIO: f64 = 0.20;

/// Share of a ToolWindow group docked beside another ToolWindow group.
pub const TOOL_ON_TOOL_RATIO: f64 = 0.50;

/// Share for every other side-docking combination.
pub const DEFAULT_SIDE_RATIO: f64 = 0.50;

/// Share of a freshly created tool area.
pub const DEFAULT_TOOL_AREA_RATIO: f64 = 0.20;

// =========================================================================
// Rejections
// =========================================================================

/// Expected reasons an operation leaves the tree unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRejected {
    AlreadyPinned { key: PersistKey },
    NotDocked { key: PersistKey },
    NotPinned { key: PersistKey },
    NoCompatibleTarget { key: PersistKey },
    KeyNotFound { key: PersistKey },
    TargetNotFound { node_id: NodeId },
    TargetNotGroup { node_id: NodeId },
    NotSplit { node_id: NodeId },
    KindMismatch {
        node_id: NodeId,
        expected: ContentKind,
        actual: ContentKind,
    },
}

impl fmt::Display for MutationRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyPinned { key } => write!(f, "{key} is already pinned to an auto-hide strip"),
            Self::NotDocked { key } => write!(f, "{key} is not docked in any group"),
            Self::NotPinned { key } => write!(f, "{key} is not pinned to any auto-hide strip"),
            Self::NoCompatibleTarget { key } => {
                write!(f, "no group can receive {key}")
            }
            Self::KeyNotFound { key } => write!(f, "{key} is not in the layout"),
            Self::TargetNotFound { node_id } => write!(f, "target node {node_id} not found"),
            Self::TargetNotGroup { node_id } => write!(f, "target node {node_id} is not a group"),
            Self::NotSplit { node_id } => write!(f, "node {node_id} is not a split"),
            Self::KindMismatch {
                node_id,
                expected,
                actual,
            } => write!(
                f,
                "group {node_id} holds {actual:?} content, cannot merge {expected:?} content"
            ),
        }
    }
}

impl std::error::Error for MutationRejected {}

// =========================================================================
// Finders
// =========================================================================

/// Reachable record with `id`, depth-first.
#[must_use]
pub fn find_by_node_id<'a>(tree: &'a DockTree, id: &str) -> Option<&'a DockNodeRecord> {
    tree.walk().find(|record| record.id().as_str() == id)
}

/// First group of `kind`, depth-first.
#[must_use]
pub fn find_first_group_by_kind(tree: &DockTree, kind: ContentKind) -> Option<NodeId> {
    tree.groups()
        .find(|(_, group)| group.content_kind() == kind)
        .map(|(id, _)| id.clone())
}

/// First auto-hide strip on `side`, depth-first.
#[must_use]
pub fn find_first_auto_hide_by_side(tree: &DockTree, side: DockSide) -> Option<NodeId> {
    tree.auto_hides()
        .find(|(_, strip)| strip.side() == side)
        .map(|(id, _)| id.clone())
}

/// Auto-hide strip on `side` holding `kind` content, depth-first.
#[must_use]
pub fn find_auto_hide_strip(tree: &DockTree, side: DockSide, kind: ContentKind) -> Option<NodeId> {
    tree.auto_hides()
        .find(|(_, strip)| strip.side() == side && strip.content_kind() == kind)
        .map(|(id, _)| id.clone())
}

/// Default share of a new side group given the target and new kinds.
#[must_use]
pub fn default_side_ratio(target_kind: ContentKind, new_kind: ContentKind) -> f64 {
    match (target_kind, new_kind) {
        (ContentKind::Document, ContentKind::ToolWindow) => TOOL_ON_DOCUMENT_RATIO,
        (ContentKind::ToolWindow, ContentKind::ToolWindow) => TOOL_ON_TOOL_RATIO,
        _ => DEFAULT_SIDE_RATIO,
    }
}

// =========================================================================
// Operations
// =========================================================================

/// Tree with an auto-hide strip for `kind` on `side`, plus that strip's id.
///
/// An existing strip with the same side and kind is reused as-is. Otherwise
/// the root is wrapped in a split with the empty strip on `side`, so one
/// side may carry a Document strip and a ToolWindow strip.
#[must_use]
pub fn ensure_auto_hide_strip(
    tree: &DockTree,
    side: DockSide,
    kind: ContentKind,
) -> (DockTree, NodeId) {
    let mut working = tree.clone();
    let strip_id = ensure_strip_in_place(&mut working, side, kind);
    (working, strip_id)
}

/// Tree with a ToolWindow group, plus that group's id.
///
/// An existing ToolWindow group is reused. Otherwise an empty one is placed
/// on `placement`, taking `ratio` of the space (default
/// [`DEFAULT_TOOL_AREA_RATIO`], clamped).
#[must_use]
pub fn ensure_tool_area(
    tree: &DockTree,
    placement: DockSide,
    ratio: Option<f64>,
) -> (DockTree, NodeId) {
    let mut working = tree.clone();
    let group_id = ensure_tool_area_in_place(&mut working, placement, ratio);
    (working, group_id)
}

/// Move `key` from its group into the auto-hide strip on `side`.
pub fn pin_to_auto_hide(
    tree: &DockTree,
    key: &PersistKey,
    side: DockSide,
    popup_size: Option<PopupSize>,
) -> Result<DockTree, MutationRejected> {
    if tree.auto_hides().any(|(_, strip)| strip.contains(key.as_str())) {
        return Err(MutationRejected::AlreadyPinned { key: key.clone() });
    }
    let (group_id, kind) = tree
        .groups()
        .find(|(_, group)| group.contains(key.as_str()))
        .map(|(id, group)| (id.clone(), group.content_kind()))
        .ok_or_else(|| MutationRejected::NotDocked { key: key.clone() })?;

    let mut working = tree.clone();
    let item = detach_from_group(&mut working, &group_id, key.as_str(), None)
        .ok_or_else(|| MutationRejected::NotDocked { key: key.clone() })?;
    let strip_id = ensure_strip_in_place(&mut working, side, kind);
    let strip = working
        .auto_hide_mut(strip_id.as_str())
        .ok_or(MutationRejected::TargetNotFound { node_id: strip_id })?;
    strip.push_item(AutoHideItem {
        persist_key: item.persist_key,
        state: item.state,
        popup_size,
    });
    Ok(working)
}

/// Move `key` from its auto-hide strip back into a group.
///
/// The item's kind is `item_kind` when known, the strip's kind otherwise.
/// Target resolution: `target_group` when it is a group of that kind, else
/// the first group of that kind, else (ToolWindow only) a tool area on the
/// strip's side.
pub fn unpin_from_auto_hide(
    tree: &DockTree,
    key: &PersistKey,
    item_kind: Option<ContentKind>,
    target_group: Option<&NodeId>,
    make_active: bool,
) -> Result<DockTree, MutationRejected> {
    let (strip_id, side, strip_kind) = tree
        .auto_hides()
        .find(|(_, strip)| strip.contains(key.as_str()))
        .map(|(id, strip)| (id.clone(), strip.side(), strip.content_kind()))
        .ok_or_else(|| MutationRejected::NotPinned { key: key.clone() })?;
    let kind = item_kind.unwrap_or(strip_kind);

    let mut working = tree.clone();
    let item = {
        let strip = working
            .auto_hide_mut(strip_id.as_str())
            .ok_or_else(|| MutationRejected::NotPinned { key: key.clone() })?;
        let item = strip
            .remove_item(key.as_str())
            .ok_or_else(|| MutationRejected::NotPinned { key: key.clone() })?;
        if !strip.is_empty() && strip.active_key().is_none() {
            let first = strip.items()[0].persist_key.clone();
            strip.set_active_key(Some(first));
        }
        item
    };
    if working
        .auto_hide(strip_id.as_str())
        .is_some_and(AutoHideNode::is_empty)
    {
        working.prune_node(&strip_id);
    }

    let explicit = target_group.filter(|id| {
        working
            .group(id.as_str())
            .is_some_and(|group| group.content_kind() == kind)
    });
    let target = match explicit.cloned() {
        Some(id) => id,
        None => match find_first_group_by_kind(&working, kind) {
            Some(id) => id,
            None if kind == ContentKind::ToolWindow => {
                ensure_tool_area_in_place(&mut working, side, None)
            }
            None => return Err(MutationRejected::NoCompatibleTarget { key: key.clone() }),
        },
    };

    let group = working
        .group_mut(target.as_str())
        .ok_or_else(|| MutationRejected::NoCompatibleTarget { key: key.clone() })?;
    group.push_item(DockItem {
        persist_key: item.persist_key,
        state: item.state,
    });
    if make_active || group.active_key().is_none() {
        group.set_active_key(Some(key.clone()));
    }
    Ok(working)
}

/// Parameters of [`dock_to_group`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockRequest {
    pub key: PersistKey,
    /// State for the docked item; the detached occurrence's state otherwise.
    #[serde(default)]
    pub state: Option<String>,
    pub target: NodeId,
    pub position: DockPosition,
    /// Share of the new group for side docking.
    #[serde(default)]
    pub ratio: Option<f64>,
    #[serde(default)]
    pub make_active: bool,
    /// Kind of the new group for side docking; the target's kind otherwise.
    #[serde(default)]
    pub new_group_kind: Option<ContentKind>,
}

impl DockRequest {
    /// Center-dock `key` into `target` and activate it.
    #[must_use]
    pub fn new(key: PersistKey, target: NodeId) -> Self {
        Self {
            key,
            state: None,
            target,
            position: DockPosition::Center,
            ratio: None,
            make_active: true,
            new_group_kind: None,
        }
    }

    #[must_use]
    pub fn position(mut self, position: DockPosition) -> Self {
        self.position = position;
        self
    }

    #[must_use]
    pub fn ratio(mut self, ratio: Option<f64>) -> Self {
        self.ratio = ratio;
        self
    }

    #[must_use]
    pub fn state(mut self, state: Option<String>) -> Self {
        self.state = state;
        self
    }

    #[must_use]
    pub fn make_active(mut self, make_active: bool) -> Self {
        self.make_active = make_active;
        self
    }

    #[must_use]
    pub fn new_group_kind(mut self, kind: Option<ContentKind>) -> Self {
        self.new_group_kind = kind;
        self
    }
}

/// Dock `request.key` relative to the target group.
///
/// Center merges into the target as a tab. A side position wraps the target
/// in a split with a new single-item group. Other occurrences of the key are
/// detached first; the target itself is never pruned.
pub fn dock_to_group(tree: &DockTree, request: &DockRequest) -> Result<DockTree, MutationRejected> {
    let target = &request.target;
    let target_kind = match tree.node(target.as_str()).map(DockNodeRecord::node) {
        Some(DockNode::Group(group)) => group.content_kind(),
        Some(_) => {
            return Err(MutationRejected::TargetNotGroup {
                node_id: target.clone(),
            });
        }
        None => {
            return Err(MutationRejected::TargetNotFound {
                node_id: target.clone(),
            });
        }
    };
    let side = request.position.side();
    if side.is_none()
        && let Some(kind) = request.new_group_kind
        && kind != target_kind
    {
        return Err(MutationRejected::KindMismatch {
            node_id: target.clone(),
            expected: kind,
            actual: target_kind,
        });
    }

    let key = &request.key;
    let mut working = tree.clone();
    let keep_in_target = side.is_none();
    let carried = detach_everywhere(&mut working, key.as_str(), Some(target), keep_in_target);
    let state = request.state.clone().or(carried);

    match side {
        None => {
            let group = working
                .group_mut(target.as_str())
                .ok_or_else(|| MutationRejected::TargetNotFound {
                    node_id: target.clone(),
                })?;
            if let Some(existing) = group
                .items_mut()
                .iter_mut()
                .find(|item| item.persist_key == *key)
            {
                if request.state.is_some() {
                    existing.state = request.state.clone();
                }
            } else {
                group.push_item(DockItem::new(key.clone()).with_state(state));
            }
            if request.make_active || group.active_key().is_none() {
                group.set_active_key(Some(key.clone()));
            }
        }
        Some(side) => {
            let kind = request.new_group_kind.unwrap_or(target_kind);
            let share = clamp_ratio(
                request
                    .ratio
                    .unwrap_or_else(|| default_side_ratio(target_kind, kind)),
            );
            let stored = if side.is_leading() { share } else { 1.0 - share };
            let group = GroupNode::new(kind)
                .with_item(DockItem::new(key.clone()).with_state(state))
                .with_active_key(Some(key.clone()));
            working
                .wrap_node(
                    target,
                    side.orientation(),
                    stored,
                    DockNode::Group(group),
                    side.is_leading(),
                )
                .ok_or_else(|| MutationRejected::TargetNotFound {
                    node_id: target.clone(),
                })?;
        }
    }
    Ok(working)
}

/// Remove `key` from every group and strip, pruning emptied hosts.
pub fn close_content(tree: &DockTree, key: &PersistKey) -> Result<DockTree, MutationRejected> {
    if tree.locate(key.as_str()).is_none() {
        return Err(MutationRejected::KeyNotFound { key: key.clone() });
    }
    let mut working = tree.clone();
    detach_everywhere(&mut working, key.as_str(), None, false);
    working.relink();
    Ok(working)
}

/// Set the first-child share of a split (clamped).
pub fn set_split_ratio(
    tree: &DockTree,
    split_id: &NodeId,
    ratio: f64,
) -> Result<DockTree, MutationRejected> {
    let mut working = tree.clone();
    let split = working
        .split_mut(split_id.as_str())
        .ok_or_else(|| MutationRejected::NotSplit {
            node_id: split_id.clone(),
        })?;
    split.set_ratio(ratio);
    Ok(working)
}

/// Make `key` the active item of whichever node holds it.
pub fn set_group_active(tree: &DockTree, key: &PersistKey) -> Result<DockTree, MutationRejected> {
    let location = tree
        .locate(key.as_str())
        .ok_or_else(|| MutationRejected::KeyNotFound { key: key.clone() })?;
    let mut working = tree.clone();
    if location.in_auto_hide {
        if let Some(strip) = working.auto_hide_mut(location.node_id.as_str()) {
            strip.set_active_key(Some(key.clone()));
        }
    } else if let Some(group) = working.group_mut(location.node_id.as_str()) {
        group.set_active_key(Some(key.clone()));
    }
    Ok(working)
}

// =========================================================================
// Replayable operations
// =========================================================================

/// Serializable form of every mutator operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DockOperation {
    EnsureAutoHideStrip {
        side: DockSide,
        kind: ContentKind,
    },
    EnsureToolArea {
        placement: DockSide,
        #[serde(default)]
        ratio: Option<f64>,
    },
    PinToAutoHide {
        key: PersistKey,
        side: DockSide,
        #[serde(default)]
        popup_size: Option<PopupSize>,
    },
    UnpinFromAutoHide {
        key: PersistKey,
        #[serde(default)]
        kind: Option<ContentKind>,
        #[serde(default)]
        target_group: Option<NodeId>,
        #[serde(default)]
        make_active: bool,
    },
    DockToGroup(DockRequest),
    CloseContent {
        key: PersistKey,
    },
    SetSplitRatio {
        split: NodeId,
        ratio: f64,
    },
    SetGroupActive {
        key: PersistKey,
    },
}

/// Operation discriminator for logs and outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DockOperationKind {
    EnsureAutoHideStrip,
    EnsureToolArea,
    PinToAutoHide,
    UnpinFromAutoHide,
    DockToGroup,
    CloseContent,
    SetSplitRatio,
    SetGroupActive,
}

impl DockOperation {
    #[must_use]
    pub const fn kind(&self) -> DockOperationKind {
        match self {
            Self::EnsureAutoHideStrip { .. } => DockOperationKind::EnsureAutoHideStrip,
            Self::EnsureToolArea { .. } => DockOperationKind::EnsureToolArea,
            Self::PinToAutoHide { .. } => DockOperationKind::PinToAutoHide,
            Self::UnpinFromAutoHide { .. } => DockOperationKind::UnpinFromAutoHide,
            Self::DockToGroup(_) => DockOperationKind::DockToGroup,
            Self::CloseContent { .. } => DockOperationKind::CloseContent,
            Self::SetSplitRatio { .. } => DockOperationKind::SetSplitRatio,
            Self::SetGroupActive { .. } => DockOperationKind::SetGroupActive,
        }
    }
}

/// Result of a successful [`apply_operation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DockOperationOutcome {
    pub kind: DockOperationKind,
    pub before_hash: u64,
    pub after_hash: u64,
}

/// Apply one operation atomically: on rejection `tree` is unchanged.
pub fn apply_operation(
    tree: &mut DockTree,
    operation: &DockOperation,
) -> Result<DockOperationOutcome, MutationRejected> {
    let kind = operation.kind();
    let before_hash = tree.state_hash();
    let next = match operation {
        DockOperation::EnsureAutoHideStrip { side, kind } => {
            ensure_auto_hide_strip(tree, *side, *kind).0
        }
        DockOperation::EnsureToolArea { placement, ratio } => {
            ensure_tool_area(tree, *placement, *ratio).0
        }
        DockOperation::PinToAutoHide {
            key,
            side,
            popup_size,
        } => pin_to_auto_hide(tree, key, *side, *popup_size)?,
        DockOperation::UnpinFromAutoHide {
            key,
            kind,
            target_group,
            make_active,
        } => unpin_from_auto_hide(tree, key, *kind, target_group.as_ref(), *make_active)?,
        DockOperation::DockToGroup(request) => dock_to_group(tree, request)?,
        DockOperation::CloseContent { key } => close_content(tree, key)?,
        DockOperation::SetSplitRatio { split, ratio } => set_split_ratio(tree, split, *ratio)?,
        DockOperation::SetGroupActive { key } => set_group_active(tree, key)?,
    };
    let after_hash = next.state_hash();
    tracing::trace!(
        target: "dockwork.layout",
        ?kind,
        before_hash,
        after_hash,
        "dock operation applied"
    );
    *tree = next;
    Ok(DockOperationOutcome {
        kind,
        before_hash,
        after_hash,
    })
}

// =========================================================================
// In-place helpers
// =========================================================================

pub(crate) fn ensure_strip_in_place(tree: &mut DockTree, side: DockSide, kind: ContentKind) -> NodeId {
    if let Some(existing) = find_auto_hide_strip(tree, side, kind) {
        return existing;
    }
    let ratio = if side.is_leading() {
        AUTO_HIDE_STRIP_RATIO
    } else {
        1.0 - AUTO_HIDE_STRIP_RATIO
    };
    tree.wrap_root(
        side.orientation(),
        ratio,
        DockNode::AutoHide(AutoHideNode::new(side, kind)),
        side.is_leading(),
    )
}

fn ensure_tool_area_in_place(tree: &mut DockTree, placement: DockSide, ratio: Option<f64>) -> NodeId {
    if let Some(existing) = find_first_group_by_kind(tree, ContentKind::ToolWindow) {
        return existing;
    }
    let share = clamp_ratio(ratio.unwrap_or(DEFAULT_TOOL_AREA_RATIO));
    let stored = if placement.is_leading() {
        share
    } else {
        1.0 - share
    };
    tree.wrap_root(
        placement.orientation(),
        stored,
        DockNode::Group(GroupNode::new(ContentKind::ToolWindow)),
        placement.is_leading(),
    )
}

/// Remove `key` from one group, repairing its active key and pruning it
/// when emptied (unless it is `protect`).
fn detach_from_group(
    tree: &mut DockTree,
    group_id: &NodeId,
    key: &str,
    protect: Option<&NodeId>,
) -> Option<DockItem> {
    let group = tree.group_mut(group_id.as_str())?;
    let item = group.remove_item(key)?;
    if group.active_key().is_none() && !group.is_empty() {
        let first = group.items()[0].persist_key.clone();
        group.set_active_key(Some(first));
    }
    let emptied = group.is_empty();
    let kind = group.content_kind();
    if emptied && protect != Some(group_id) {
        prune_empty_group(tree, group_id, kind);
    }
    Some(item)
}

fn prune_empty_group(tree: &mut DockTree, group_id: &NodeId, kind: ContentKind) {
    let prunable = match kind {
        ContentKind::ToolWindow => true,
        ContentKind::Document => tree.document_group_count() > 1,
    };
    if prunable {
        tree.prune_node(group_id);
    }
}

/// Remove every occurrence of `key`. Returns the first occurrence's state.
///
/// `protect` is never pruned; with `keep_in_protected` its own occurrence
/// stays in place.
fn detach_everywhere(
    tree: &mut DockTree,
    key: &str,
    protect: Option<&NodeId>,
    keep_in_protected: bool,
) -> Option<String> {
    let hosts: Vec<(NodeId, bool)> = tree
        .walk()
        .filter(|record| record.node().holds_key(key))
        .map(|record| (record.id().clone(), record.node().as_auto_hide().is_some()))
        .collect();

    let mut carried = None;
    let mut carried_set = false;
    for (host, is_strip) in hosts {
        if keep_in_protected && protect == Some(&host) {
            continue;
        }
        let state = if is_strip {
            detach_from_strip(tree, &host, key)
        } else {
            detach_from_group(tree, &host, key, protect).map(|item| item.state)
        };
        if let Some(state) = state
            && !carried_set
        {
            carried = state;
            carried_set = true;
        }
    }
    carried
}

fn detach_from_strip(tree: &mut DockTree, strip_id: &NodeId, key: &str) -> Option<Option<String>> {
    let strip = tree.auto_hide_mut(strip_id.as_str())?;
    let item = strip.remove_item(key)?;
    if strip.active_key().is_none() && !strip.is_empty() {
        let first = strip.items()[0].persist_key.clone();
        strip.set_active_key(Some(first));
    }
    if strip.is_empty() {
        tree.prune_node(strip_id);
    }
    Some(item.state)
}
