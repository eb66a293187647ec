//! Versioned layout snapshots.
//!
//! A [`DockTree`] maps to a [`LayoutDto`] as a plain structural mirror. The
//! reverse direction is forgiving:
//!
//! - missing or duplicate node ids are regenerated;
//! - splits with one child collapse to it, and child-less splits or floating
//!   nodes are dropped;
//! - items are re-homed to match their content kind (role normalization);
//! - the result passes through [`validate_and_fix`].
//!
//! # File Format
//!
//! ```json
//! {
//!   "version": 2,
//!   "root": {
//!     "kind": "Split",
//!     "nodeId": "node-2",
//!     "orientation": "Vertical",
//!     "ratio": 0.8,
//!     "first": { "kind": "Group", "nodeId": "node-1", "contentKind": "Document",
//!                "items": [{ "persistKey": "Doc:1" }], "activeKey": "Doc:1" },
//!     "second": { "kind": "AutoHide", "nodeId": "node-3", "side": "Right",
//!                 "contentKind": "ToolWindow", "items": [{ "persistKey": "Tool:1" }] }
//!   }
//! }
//! ```
//!
//! # Atomic Writes
//!
//! Files are written to a sibling temp file and renamed into place.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::Path;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::mutator::{ensure_strip_in_place, find_first_group_by_kind};
use crate::node::{
    AutoHideItem, AutoHideNode, Bounds, ContentKind, DockItem, DockNode, DockNodeRecord, DockSide,
    FloatingNode, GroupNode, NodeId, NodeKind, Orientation, PersistKey, PopupSize, SplitNode,
};
use crate::tree::DockTree;
use crate::validate::validate_and_fix;

/// Latest snapshot format version.
pub const LAYOUT_FORMAT_VERSION: u32 = 2;

fn default_layout_version() -> u32 {
    LAYOUT_FORMAT_VERSION
}

// =========================================================================
// DTOs
// =========================================================================

/// Serialized layout snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDto {
    #[serde(default = "default_layout_version")]
    pub version: u32,
    #[serde(default)]
    pub root: Option<NodeDto>,
}

impl LayoutDto {
    /// Snapshot with no layout.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            version: LAYOUT_FORMAT_VERSION,
            root: None,
        }
    }

    pub fn to_json(&self) -> Result<String, LayoutPersistError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, LayoutPersistError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// One serialized node. Only the fields of its kind are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDto {
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_kind: Option<ContentKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<ItemDto>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<DockSide>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation: Option<Orientation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first: Option<Box<NodeDto>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second: Option<Box<NodeDto>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<BoundsDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<Box<NodeDto>>,
}

impl NodeDto {
    /// Node of `kind` with no fields set.
    #[must_use]
    pub fn bare(kind: NodeKind) -> Self {
        Self {
            kind,
            node_id: None,
            content_kind: None,
            items: None,
            active_key: None,
            side: None,
            orientation: None,
            ratio: None,
            first: None,
            second: None,
            bounds: None,
            root: None,
        }
    }

    fn visit_mut(&mut self, visit: &mut impl FnMut(&mut NodeDto)) {
        visit(self);
        for child in [&mut self.first, &mut self.second, &mut self.root]
            .into_iter()
            .flatten()
        {
            child.visit_mut(visit);
        }
    }

    /// Every item record in this sub-tree, depth-first.
    pub fn items_mut(&mut self) -> Vec<&mut ItemDto> {
        let mut out = Vec::new();
        collect_items(self, &mut out);
        out
    }
}

fn collect_items<'a>(node: &'a mut NodeDto, out: &mut Vec<&'a mut ItemDto>) {
    let NodeDto {
        items,
        first,
        second,
        root,
        ..
    } = node;
    if let Some(items) = items {
        out.extend(items.iter_mut());
    }
    for child in [first, second, root].into_iter().flatten() {
        collect_items(child, out);
    }
}

/// Serialized group or auto-hide item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDto {
    pub persist_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popup_size: Option<PopupSize>,
}

/// Serialized floating bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundsDto {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

// =========================================================================
// Errors
// =========================================================================

/// Snapshot version errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutFormatError {
    UnsupportedVersion { found: u32, latest: u32 },
    NoMigrationPath { from: u32, to: u32 },
}

impl fmt::Display for LayoutFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedVersion { found, latest } => write!(
                f,
                "unsupported layout format version {found} (latest supported: {latest})"
            ),
            Self::NoMigrationPath { from, to } => {
                write!(f, "no layout migration path from version {from} to {to}")
            }
        }
    }
}

impl std::error::Error for LayoutFormatError {}

/// Errors from reading or writing layout snapshots.
#[derive(Debug)]
pub enum LayoutPersistError {
    Io(io::Error),
    Json(serde_json::Error),
    Format(LayoutFormatError),
}

impl fmt::Display for LayoutPersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "layout I/O error: {err}"),
            Self::Json(err) => write!(f, "layout JSON error: {err}"),
            Self::Format(err) => write!(f, "layout format error: {err}"),
        }
    }
}

impl std::error::Error for LayoutPersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::Format(err) => Some(err),
        }
    }
}

impl From<io::Error> for LayoutPersistError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for LayoutPersistError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

impl From<LayoutFormatError> for LayoutPersistError {
    fn from(err: LayoutFormatError) -> Self {
        Self::Format(err)
    }
}

// =========================================================================
// Versioning
// =========================================================================

/// Outcome of upgrading a snapshot to [`LAYOUT_FORMAT_VERSION`].
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutMigration {
    pub layout: LayoutDto,
    pub from_version: u32,
    pub to_version: u32,
    pub warnings: Vec<String>,
}

/// Upgrade `dto` one version at a time up to [`LAYOUT_FORMAT_VERSION`].
pub fn upgrade_to_latest(dto: LayoutDto) -> Result<LayoutMigration, LayoutFormatError> {
    let from_version = dto.version;
    if from_version > LAYOUT_FORMAT_VERSION {
        return Err(LayoutFormatError::UnsupportedVersion {
            found: from_version,
            latest: LAYOUT_FORMAT_VERSION,
        });
    }

    let mut layout = dto;
    let mut warnings = Vec::new();
    while layout.version < LAYOUT_FORMAT_VERSION {
        match layout.version {
            1 => upgrade_v1_to_v2(&mut layout, &mut warnings),
            other => {
                return Err(LayoutFormatError::NoMigrationPath {
                    from: other,
                    to: LAYOUT_FORMAT_VERSION,
                });
            }
        }
    }

    Ok(LayoutMigration {
        layout,
        from_version,
        to_version: LAYOUT_FORMAT_VERSION,
        warnings,
    })
}

/// v1 snapshots did not record content kinds.
fn upgrade_v1_to_v2(layout: &mut LayoutDto, warnings: &mut Vec<String>) {
    if let Some(root) = layout.root.as_mut() {
        root.visit_mut(&mut |node| {
            let default_kind = match node.kind {
                NodeKind::Group => ContentKind::Document,
                NodeKind::AutoHide => ContentKind::ToolWindow,
                NodeKind::Split | NodeKind::Floating => return,
            };
            if node.content_kind.is_none() {
                node.content_kind = Some(default_kind);
                warnings.push(format!(
                    "{:?} node {} assumed {default_kind:?}",
                    node.kind,
                    node.node_id.as_deref().unwrap_or("<unnamed>")
                ));
            }
        });
    }
    layout.version = 2;
}

// =========================================================================
// Tree -> DTO
// =========================================================================

/// Structural mirror of `tree` at the latest version.
#[must_use]
pub fn to_dto(tree: &DockTree) -> LayoutDto {
    LayoutDto {
        version: LAYOUT_FORMAT_VERSION,
        root: node_to_dto(tree, tree.root()),
    }
}

fn node_to_dto(tree: &DockTree, id: &NodeId) -> Option<NodeDto> {
    let record = tree.node(id.as_str())?;
    let mut dto = NodeDto::bare(record.kind());
    dto.node_id = Some(id.as_str().to_owned());
    match record.node() {
        DockNode::Group(group) => {
            dto.content_kind = Some(group.content_kind());
            dto.items = Some(
                group
                    .items()
                    .iter()
                    .map(|item| ItemDto {
                        persist_key: item.persist_key.as_str().to_owned(),
                        state: item.state.clone(),
                        popup_size: None,
                    })
                    .collect(),
            );
            dto.active_key = group.active_key().map(|key| key.as_str().to_owned());
        }
        DockNode::AutoHide(strip) => {
            dto.side = Some(strip.side());
            dto.content_kind = Some(strip.content_kind());
            dto.items = Some(
                strip
                    .items()
                    .iter()
                    .map(|item| ItemDto {
                        persist_key: item.persist_key.as_str().to_owned(),
                        state: item.state.clone(),
                        popup_size: item.popup_size,
                    })
                    .collect(),
            );
            dto.active_key = strip.active_key().map(|key| key.as_str().to_owned());
        }
        DockNode::Split(split) => {
            dto.orientation = Some(split.orientation());
            dto.ratio = Some(split.ratio());
            dto.first = node_to_dto(tree, split.first()).map(Box::new);
            dto.second = node_to_dto(tree, split.second()).map(Box::new);
        }
        DockNode::Floating(floating) => {
            let bounds = floating.bounds();
            dto.bounds = Some(BoundsDto {
                x: bounds.x,
                y: bounds.y,
                w: bounds.width,
                h: bounds.height,
            });
            dto.root = node_to_dto(tree, floating.root()).map(Box::new);
        }
    }
    Some(dto)
}

// =========================================================================
// DTO -> Tree
// =========================================================================

/// Supplies the content kind of a persist key during restore.
pub trait KindResolver {
    fn resolve_kind(&self, key: &PersistKey) -> Option<ContentKind>;
}

impl<F> KindResolver for F
where
    F: Fn(&PersistKey) -> Option<ContentKind>,
{
    fn resolve_kind(&self, key: &PersistKey) -> Option<ContentKind> {
        self(key)
    }
}

/// Restore a tree from `dto`.
///
/// Returns `Ok(None)` when the upgraded snapshot has no root.
pub fn from_dto(
    dto: &LayoutDto,
    resolver: Option<&dyn KindResolver>,
) -> Result<Option<DockTree>, LayoutFormatError> {
    let migration = upgrade_to_latest(dto.clone())?;
    for warning in &migration.warnings {
        tracing::debug!(target: "dockwork.layout.persist", %warning, "layout upgraded");
    }
    let Some(root_dto) = migration.layout.root.as_ref() else {
        return Ok(None);
    };

    let mut builder = ArenaBuilder::default();
    let root = match builder.build(root_dto) {
        Some(root) => root,
        None => {
            let id = builder.claim_id(None);
            builder.insert(id, DockNode::Group(GroupNode::new(ContentKind::Document)))
        }
    };
    if builder.regenerated > 0 || builder.collapsed > 0 {
        tracing::debug!(
            target: "dockwork.layout.persist",
            regenerated_ids = builder.regenerated,
            collapsed_nodes = builder.collapsed,
            "layout snapshot repaired"
        );
    }

    let mut tree = DockTree::from_parts(root, builder.nodes);
    normalize_roles(&mut tree, resolver);
    Ok(Some(validate_and_fix(&tree, true)))
}

#[derive(Default)]
struct ArenaBuilder {
    nodes: BTreeMap<NodeId, DockNodeRecord>,
    claimed: FxHashSet<NodeId>,
    next_generated: u64,
    regenerated: usize,
    collapsed: usize,
}

impl ArenaBuilder {
    fn claim_id(&mut self, raw: Option<&str>) -> NodeId {
        if let Some(id) = raw.and_then(|raw| NodeId::new(raw).ok())
            && !self.claimed.contains(&id)
        {
            self.claimed.insert(id.clone());
            return id;
        }
        self.regenerated += 1;
        loop {
            self.next_generated += 1;
            let candidate = NodeId::new(format!("restored-{}", self.next_generated));
            if let Ok(candidate) = candidate
                && self.claimed.insert(candidate.clone())
            {
                return candidate;
            }
        }
    }

    fn insert(&mut self, id: NodeId, node: DockNode) -> NodeId {
        self.nodes
            .insert(id.clone(), DockNodeRecord::new(id.clone(), None, node));
        id
    }

    fn build(&mut self, dto: &NodeDto) -> Option<NodeId> {
        match dto.kind {
            NodeKind::Group => {
                let id = self.claim_id(dto.node_id.as_deref());
                let mut group = GroupNode::new(dto.content_kind.unwrap_or(ContentKind::Document));
                for item in dto.items.iter().flatten() {
                    if let Ok(key) = PersistKey::new(&item.persist_key) {
                        group = group.with_item(DockItem::new(key).with_state(item.state.clone()));
                    }
                }
                let group = group.with_active_key(parse_key(dto.active_key.as_deref()));
                Some(self.insert(id, DockNode::Group(group)))
            }
            NodeKind::AutoHide => {
                let id = self.claim_id(dto.node_id.as_deref());
                let mut strip = AutoHideNode::new(
                    dto.side.unwrap_or(DockSide::Right),
                    dto.content_kind.unwrap_or(ContentKind::ToolWindow),
                );
                for item in dto.items.iter().flatten() {
                    if let Ok(key) = PersistKey::new(&item.persist_key) {
                        strip = strip.with_item(AutoHideItem {
                            persist_key: key,
                            state: item.state.clone(),
                            popup_size: item.popup_size,
                        });
                    }
                }
                strip.set_active_key(parse_key(dto.active_key.as_deref()));
                Some(self.insert(id, DockNode::AutoHide(strip)))
            }
            NodeKind::Split => {
                let id = self.claim_id(dto.node_id.as_deref());
                let first = dto.first.as_deref().and_then(|child| self.build(child));
                let second = dto.second.as_deref().and_then(|child| self.build(child));
                match (first, second) {
                    (Some(first), Some(second)) => {
                        let split = SplitNode::new(
                            dto.orientation.unwrap_or(Orientation::Vertical),
                            dto.ratio.unwrap_or(0.5),
                            first,
                            second,
                        );
                        Some(self.insert(id, DockNode::Split(split)))
                    }
                    (Some(only), None) | (None, Some(only)) => {
                        self.collapsed += 1;
                        Some(only)
                    }
                    (None, None) => {
                        self.collapsed += 1;
                        None
                    }
                }
            }
            NodeKind::Floating => {
                let id = self.claim_id(dto.node_id.as_deref());
                let Some(root) = dto.root.as_deref().and_then(|child| self.build(child)) else {
                    self.collapsed += 1;
                    return None;
                };
                let bounds = dto.bounds.map_or(Bounds::new(0.0, 0.0, 1.0, 1.0), |b| {
                    Bounds::new(b.x, b.y, b.w, b.h)
                });
                Some(self.insert(id, DockNode::Floating(FloatingNode::new(root, bounds))))
            }
        }
    }
}

fn parse_key(raw: Option<&str>) -> Option<PersistKey> {
    raw.and_then(|raw| PersistKey::new(raw).ok())
}

/// Re-home items whose content kind does not match their host.
///
/// Document items in auto-hide strips or ToolWindow groups move to the
/// first Document group. ToolWindow items in Document groups move to the
/// right-side auto-hide strip. A Document group is created when none exists.
fn normalize_roles(tree: &mut DockTree, resolver: Option<&dyn KindResolver>) {
    if tree.document_group_count() == 0 {
        tree.wrap_root(
            Orientation::Vertical,
            0.5,
            DockNode::Group(GroupNode::new(ContentKind::Document)),
            false,
        );
    }

    let resolve = |key: &PersistKey, host_kind: ContentKind| {
        resolver
            .and_then(|resolver| resolver.resolve_kind(key))
            .unwrap_or(host_kind)
    };

    let mut to_documents: Vec<(NodeId, PersistKey)> = Vec::new();
    let mut to_tool_strip: Vec<(NodeId, PersistKey)> = Vec::new();
    for record in tree.walk() {
        match record.node() {
            DockNode::Group(group) => {
                for item in group.items() {
                    let kind = resolve(&item.persist_key, group.content_kind());
                    match (group.content_kind(), kind) {
                        (ContentKind::Document, ContentKind::ToolWindow) => {
                            to_tool_strip.push((record.id().clone(), item.persist_key.clone()));
                        }
                        (ContentKind::ToolWindow, ContentKind::Document) => {
                            to_documents.push((record.id().clone(), item.persist_key.clone()));
                        }
                        _ => {}
                    }
                }
            }
            DockNode::AutoHide(strip) => {
                for item in strip.items() {
                    if resolve(&item.persist_key, strip.content_kind()) == ContentKind::Document {
                        to_documents.push((record.id().clone(), item.persist_key.clone()));
                    }
                }
            }
            DockNode::Split(_) | DockNode::Floating(_) => {}
        }
    }

    if to_documents.is_empty() && to_tool_strip.is_empty() {
        return;
    }
    tracing::debug!(
        target: "dockwork.layout.persist",
        to_documents = to_documents.len(),
        to_tool_strip = to_tool_strip.len(),
        "re-homing items by content kind"
    );

    for (host, key) in to_documents {
        let Some(item) = take_item(tree, &host, &key) else {
            continue;
        };
        if let Some(target) = find_first_group_by_kind(tree, ContentKind::Document)
            && let Some(group) = tree.group_mut(target.as_str())
        {
            group.push_item(item);
        }
    }

    for (host, key) in to_tool_strip {
        let Some(item) = take_item(tree, &host, &key) else {
            continue;
        };
        let strip_id = ensure_strip_in_place(tree, DockSide::Right, ContentKind::ToolWindow);
        if let Some(strip) = tree.auto_hide_mut(strip_id.as_str()) {
            strip.push_item(AutoHideItem {
                persist_key: item.persist_key,
                state: item.state,
                popup_size: None,
            });
        }
    }
}

fn take_item(tree: &mut DockTree, host: &NodeId, key: &PersistKey) -> Option<DockItem> {
    if let Some(group) = tree.group_mut(host.as_str()) {
        return group.remove_item(key.as_str());
    }
    let strip = tree.auto_hide_mut(host.as_str())?;
    strip.remove_item(key.as_str()).map(|item| DockItem {
        persist_key: item.persist_key,
        state: item.state,
    })
}

// =========================================================================
// Files
// =========================================================================

/// Write `dto` to `path` atomically (temp file, then rename).
pub fn write_layout_file(path: &Path, dto: &LayoutDto) -> Result<(), LayoutPersistError> {
    let json = dto.to_json()?;
    let temp = path.with_extension("json.tmp");
    std::fs::write(&temp, json)?;
    std::fs::rename(&temp, path)?;
    tracing::debug!(target: "dockwork.layout.persist", path = %path.display(), "layout written");
    Ok(())
}

/// Read a snapshot from `path` without restoring it.
pub fn read_layout_file(path: &Path) -> Result<LayoutDto, LayoutPersistError> {
    let contents = std::fs::read_to_string(path)?;
    LayoutDto::from_json(&contents)
}

/// Save `tree` to `path`.
pub fn save_layout_file(path: &Path, tree: &DockTree) -> Result<(), LayoutPersistError> {
    write_layout_file(path, &to_dto(tree))
}

/// Load and restore a tree from `path`. `Ok(None)` means "no layout".
pub fn load_layout_file(
    path: &Path,
    resolver: Option<&dyn KindResolver>,
) -> Result<Option<DockTree>, LayoutPersistError> {
    let dto = read_layout_file(path)?;
    Ok(from_dto(&dto, resolver)?)
}
