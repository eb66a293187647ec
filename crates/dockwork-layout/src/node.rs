//! Node payloads, identifiers and keys for the dock layout tree.
//!
//! The tree itself lives in [`crate::tree::DockTree`]; this module only
//! defines the per-node data:
//!
//! - [`NodeId`] and [`PersistKey`]: validated, trimmed, non-blank strings.
//! - [`GroupNode`]: a tab group of one [`ContentKind`].
//! - [`SplitNode`]: two children and a clamped first-child share.
//! - [`FloatingNode`]: a detached sub-tree with window bounds.
//! - [`AutoHideNode`]: an edge strip of collapsed items.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Smallest share a split may give its first child.
pub const MIN_SPLIT_RATIO: f64 = 0.05;

/// Largest share a split may give its first child.
pub const MAX_SPLIT_RATIO: f64 = 0.95;

/// Clamp a split ratio into `[MIN_SPLIT_RATIO, MAX_SPLIT_RATIO]`.
///
/// Non-finite input maps to an even split.
#[must_use]
pub fn clamp_ratio(ratio: f64) -> f64 {
    if !ratio.is_finite() {
        return 0.5;
    }
    ratio.clamp(MIN_SPLIT_RATIO, MAX_SPLIT_RATIO)
}

// =========================================================================
// Identifiers
// =========================================================================

/// Stable identifier for layout nodes.
///
/// Always trimmed and never blank.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(String);

impl NodeId {
    /// Create a node id, rejecting blank input.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, DockModelError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(DockModelError::BlankNodeId);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Borrow the raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn generated(counter: u64) -> Self {
        Self(format!("node-{counter}"))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for NodeId {
    type Error = DockModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NodeId> for String {
    fn from(value: NodeId) -> Self {
        value.0
    }
}

/// Stable identity of a content instance. Survives save/restore.
///
/// Always trimmed and never blank.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PersistKey(String);

impl PersistKey {
    /// Create a persist key, rejecting blank input.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, DockModelError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(DockModelError::BlankPersistKey);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Borrow the raw key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PersistKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for PersistKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PersistKey {
    type Error = DockModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PersistKey> for String {
    fn from(value: PersistKey) -> Self {
        value.0
    }
}

// =========================================================================
// Enumerations
// =========================================================================

/// The two tab-group categories. They never share a tab strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentKind {
    Document,
    ToolWindow,
}

/// Node discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Group,
    Split,
    Floating,
    AutoHide,
}

/// Orientation of the splitter line.
///
/// `Vertical` places children side by side (left | right); `Horizontal`
/// stacks them (top / bottom).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    Vertical,
    Horizontal,
}

/// Edge of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DockSide {
    Left,
    Right,
    Top,
    Bottom,
}

impl DockSide {
    /// All sides in declaration order.
    pub const ALL: [Self; 4] = [Self::Left, Self::Right, Self::Top, Self::Bottom];

    /// Splitter orientation produced by docking against this side.
    #[must_use]
    pub const fn orientation(self) -> Orientation {
        match self {
            Self::Left | Self::Right => Orientation::Vertical,
            Self::Top | Self::Bottom => Orientation::Horizontal,
        }
    }

    /// Whether content on this side occupies the first split slot.
    #[must_use]
    pub const fn is_leading(self) -> bool {
        matches!(self, Self::Left | Self::Top)
    }
}

/// Where incoming content lands relative to a target group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DockPosition {
    /// Merge into the target as another tab.
    Center,
    Left,
    Right,
    Top,
    Bottom,
}

impl DockPosition {
    /// Side for split docking, `None` for a tab merge.
    #[must_use]
    pub const fn side(self) -> Option<DockSide> {
        match self {
            Self::Center => None,
            Self::Left => Some(DockSide::Left),
            Self::Right => Some(DockSide::Right),
            Self::Top => Some(DockSide::Top),
            Self::Bottom => Some(DockSide::Bottom),
        }
    }
}

impl From<DockSide> for DockPosition {
    fn from(side: DockSide) -> Self {
        match side {
            DockSide::Left => Self::Left,
            DockSide::Right => Self::Right,
            DockSide::Top => Self::Top,
            DockSide::Bottom => Self::Bottom,
        }
    }
}

// =========================================================================
// Geometry payloads
// =========================================================================

/// Window bounds of a floating node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Width and height floored to at least 1.
    #[must_use]
    pub fn normalized(self) -> Self {
        fn at_least_one(value: f64) -> f64 {
            if value.is_finite() { value.max(1.0) } else { 1.0 }
        }
        Self {
            x: if self.x.is_finite() { self.x } else { 0.0 },
            y: if self.y.is_finite() { self.y } else { 0.0 },
            width: at_least_one(self.width),
            height: at_least_one(self.height),
        }
    }
}

/// Requested size of an auto-hide popup overlay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PopupSize {
    pub width: f64,
    pub height: f64,
}

impl PopupSize {
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

// =========================================================================
// Items
// =========================================================================

/// One tab in a [`GroupNode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockItem {
    pub persist_key: PersistKey,
    /// Opaque content state captured on save.
    pub state: Option<String>,
}

impl DockItem {
    #[must_use]
    pub fn new(persist_key: PersistKey) -> Self {
        Self {
            persist_key,
            state: None,
        }
    }

    #[must_use]
    pub fn with_state(mut self, state: Option<String>) -> Self {
        self.state = state;
        self
    }
}

/// One entry in an [`AutoHideNode`].
#[derive(Debug, Clone, PartialEq)]
pub struct AutoHideItem {
    pub persist_key: PersistKey,
    pub state: Option<String>,
    pub popup_size: Option<PopupSize>,
}

impl AutoHideItem {
    #[must_use]
    pub fn new(persist_key: PersistKey) -> Self {
        Self {
            persist_key,
            state: None,
            popup_size: None,
        }
    }
}

// =========================================================================
// Node payloads
// =========================================================================

/// Ordered tab group of a single content kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupNode {
    content_kind: ContentKind,
    items: Vec<DockItem>,
    active_key: Option<PersistKey>,
}

impl GroupNode {
    /// Empty group of the given kind.
    #[must_use]
    pub fn new(content_kind: ContentKind) -> Self {
        Self {
            content_kind,
            items: Vec::new(),
            active_key: None,
        }
    }

    /// Builder: append an item.
    #[must_use]
    pub fn with_item(mut self, item: DockItem) -> Self {
        self.items.push(item);
        self
    }

    /// Builder: set the active key.
    #[must_use]
    pub fn with_active_key(mut self, key: Option<PersistKey>) -> Self {
        self.active_key = key;
        self
    }

    #[must_use]
    pub const fn content_kind(&self) -> ContentKind {
        self.content_kind
    }

    #[must_use]
    pub fn items(&self) -> &[DockItem] {
        &self.items
    }

    #[must_use]
    pub fn active_key(&self) -> Option<&PersistKey> {
        self.active_key.as_ref()
    }

    /// Active key, or the first item when none is set.
    #[must_use]
    pub fn active_or_first(&self) -> Option<&PersistKey> {
        self.active_key
            .as_ref()
            .filter(|key| self.contains(key.as_str()))
            .or_else(|| self.items.first().map(|item| &item.persist_key))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.items.iter().any(|item| item.persist_key.as_str() == key)
    }

    #[must_use]
    pub fn item(&self, key: &str) -> Option<&DockItem> {
        self.items
            .iter()
            .find(|item| item.persist_key.as_str() == key)
    }

    pub(crate) fn push_item(&mut self, item: DockItem) {
        self.items.push(item);
    }

    pub(crate) fn remove_item(&mut self, key: &str) -> Option<DockItem> {
        let index = self
            .items
            .iter()
            .position(|item| item.persist_key.as_str() == key)?;
        let removed = self.items.remove(index);
        if self.active_key.as_ref().map(PersistKey::as_str) == Some(key) {
            self.active_key = None;
        }
        Some(removed)
    }

    pub(crate) fn set_active_key(&mut self, key: Option<PersistKey>) {
        self.active_key = key;
    }

    pub(crate) fn items_mut(&mut self) -> &mut Vec<DockItem> {
        &mut self.items
    }
}

/// Two-way split with a clamped first-child share.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitNode {
    orientation: Orientation,
    ratio: f64,
    pub(crate) first: NodeId,
    pub(crate) second: NodeId,
}

impl SplitNode {
    pub(crate) fn new(orientation: Orientation, ratio: f64, first: NodeId, second: NodeId) -> Self {
        Self {
            orientation,
            ratio: clamp_ratio(ratio),
            first,
            second,
        }
    }

    #[must_use]
    pub const fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// First child's share of the split, always within the ratio bounds.
    #[must_use]
    pub const fn ratio(&self) -> f64 {
        self.ratio
    }

    #[must_use]
    pub fn first(&self) -> &NodeId {
        &self.first
    }

    #[must_use]
    pub fn second(&self) -> &NodeId {
        &self.second
    }

    pub(crate) fn set_ratio(&mut self, ratio: f64) {
        self.ratio = clamp_ratio(ratio);
    }
}

/// Detached sub-tree shown in its own window.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatingNode {
    pub(crate) root: NodeId,
    bounds: Bounds,
}

impl FloatingNode {
    pub(crate) fn new(root: NodeId, bounds: Bounds) -> Self {
        Self {
            root,
            bounds: bounds.normalized(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &NodeId {
        &self.root
    }

    #[must_use]
    pub const fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub(crate) fn set_bounds(&mut self, bounds: Bounds) {
        self.bounds = bounds.normalized();
    }
}

/// Collapsible edge strip.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoHideNode {
    side: DockSide,
    content_kind: ContentKind,
    items: Vec<AutoHideItem>,
    active_key: Option<PersistKey>,
}

impl AutoHideNode {
    /// Empty strip on `side`.
    #[must_use]
    pub fn new(side: DockSide, content_kind: ContentKind) -> Self {
        Self {
            side,
            content_kind,
            items: Vec::new(),
            active_key: None,
        }
    }

    /// Builder: append an item.
    #[must_use]
    pub fn with_item(mut self, item: AutoHideItem) -> Self {
        self.items.push(item);
        self
    }

    #[must_use]
    pub const fn side(&self) -> DockSide {
        self.side
    }

    #[must_use]
    pub const fn content_kind(&self) -> ContentKind {
        self.content_kind
    }

    #[must_use]
    pub fn items(&self) -> &[AutoHideItem] {
        &self.items
    }

    /// Last selected item of the strip.
    #[must_use]
    pub fn active_key(&self) -> Option<&PersistKey> {
        self.active_key.as_ref()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.items.iter().any(|item| item.persist_key.as_str() == key)
    }

    #[must_use]
    pub fn item(&self, key: &str) -> Option<&AutoHideItem> {
        self.items
            .iter()
            .find(|item| item.persist_key.as_str() == key)
    }

    pub(crate) fn push_item(&mut self, item: AutoHideItem) {
        self.items.push(item);
    }

    pub(crate) fn remove_item(&mut self, key: &str) -> Option<AutoHideItem> {
        let index = self
            .items
            .iter()
            .position(|item| item.persist_key.as_str() == key)?;
        let removed = self.items.remove(index);
        if self.active_key.as_ref().map(PersistKey::as_str) == Some(key) {
            self.active_key = None;
        }
        Some(removed)
    }

    pub(crate) fn set_active_key(&mut self, key: Option<PersistKey>) {
        self.active_key = key;
    }

    pub(crate) fn items_mut(&mut self) -> &mut Vec<AutoHideItem> {
        &mut self.items
    }
}

/// Node payload variant.
#[derive(Debug, Clone, PartialEq)]
pub enum DockNode {
    Group(GroupNode),
    Split(SplitNode),
    Floating(FloatingNode),
    AutoHide(AutoHideNode),
}

impl DockNode {
    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        match self {
            Self::Group(_) => NodeKind::Group,
            Self::Split(_) => NodeKind::Split,
            Self::Floating(_) => NodeKind::Floating,
            Self::AutoHide(_) => NodeKind::AutoHide,
        }
    }

    /// Child ids in slot order.
    #[must_use]
    pub fn child_ids(&self) -> Vec<&NodeId> {
        match self {
            Self::Split(split) => vec![&split.first, &split.second],
            Self::Floating(floating) => vec![&floating.root],
            Self::Group(_) | Self::AutoHide(_) => Vec::new(),
        }
    }

    #[must_use]
    pub fn as_group(&self) -> Option<&GroupNode> {
        match self {
            Self::Group(group) => Some(group),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_split(&self) -> Option<&SplitNode> {
        match self {
            Self::Split(split) => Some(split),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_floating(&self) -> Option<&FloatingNode> {
        match self {
            Self::Floating(floating) => Some(floating),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_auto_hide(&self) -> Option<&AutoHideNode> {
        match self {
            Self::AutoHide(strip) => Some(strip),
            _ => None,
        }
    }

    /// Whether the node holds the key as an item.
    #[must_use]
    pub fn holds_key(&self, key: &str) -> bool {
        match self {
            Self::Group(group) => group.contains(key),
            Self::AutoHide(strip) => strip.contains(key),
            Self::Split(_) | Self::Floating(_) => false,
        }
    }
}

impl From<GroupNode> for DockNode {
    fn from(group: GroupNode) -> Self {
        Self::Group(group)
    }
}

impl From<AutoHideNode> for DockNode {
    fn from(strip: AutoHideNode) -> Self {
        Self::AutoHide(strip)
    }
}

/// Arena entry: a payload plus its non-owning parent link.
#[derive(Debug, Clone, PartialEq)]
pub struct DockNodeRecord {
    id: NodeId,
    parent: Option<NodeId>,
    node: DockNode,
}

impl DockNodeRecord {
    pub(crate) fn new(id: NodeId, parent: Option<NodeId>, node: DockNode) -> Self {
        Self { id, parent, node }
    }

    #[must_use]
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// Parent node, maintained by tree code only.
    #[must_use]
    pub fn parent(&self) -> Option<&NodeId> {
        self.parent.as_ref()
    }

    #[must_use]
    pub fn node(&self) -> &DockNode {
        &self.node
    }

    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        self.node.kind()
    }

    pub(crate) fn node_mut(&mut self) -> &mut DockNode {
        &mut self.node
    }

    pub(crate) fn set_parent(&mut self, parent: Option<NodeId>) {
        self.parent = parent;
    }
}

// =========================================================================
// Errors
// =========================================================================

/// Argument and construction errors for the layout model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockModelError {
    BlankNodeId,
    BlankPersistKey,
    EmptyPath,
    MissingNode { node_id: NodeId },
    NodeNotGroup { node_id: NodeId },
    NodeNotSplit { node_id: NodeId },
}

impl fmt::Display for DockModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlankNodeId => write!(f, "node id must not be blank"),
            Self::BlankPersistKey => write!(f, "persist key must not be blank"),
            Self::EmptyPath => write!(f, "node path must contain at least one id"),
            Self::MissingNode { node_id } => write!(f, "node {node_id} not found"),
            Self::NodeNotGroup { node_id } => write!(f, "node {node_id} is not a group"),
            Self::NodeNotSplit { node_id } => write!(f, "node {node_id} is not a split"),
        }
    }
}

impl std::error::Error for DockModelError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> PersistKey {
        PersistKey::new(raw).expect("test key must be non-blank")
    }

    #[test]
    fn keys_and_ids_are_trimmed_and_reject_blank() {
        assert_eq!(key("  Doc:1 ").as_str(), "Doc:1");
        assert_eq!(PersistKey::new("   "), Err(DockModelError::BlankPersistKey));
        assert_eq!(NodeId::new(""), Err(DockModelError::BlankNodeId));
        assert_eq!(NodeId::new(" n1\t").expect("valid").as_str(), "n1");
    }

    #[test]
    fn persist_key_deserialization_validates() {
        let parsed: PersistKey = serde_json::from_str("\" Tool:1 \"").expect("valid key");
        assert_eq!(parsed.as_str(), "Tool:1");
        assert!(serde_json::from_str::<PersistKey>("\"  \"").is_err());
    }

    #[test]
    fn ratio_clamps_into_bounds() {
        assert_eq!(clamp_ratio(0.0), MIN_SPLIT_RATIO);
        assert_eq!(clamp_ratio(1.0), MAX_SPLIT_RATIO);
        assert_eq!(clamp_ratio(0.3), 0.3);
        assert_eq!(clamp_ratio(f64::NAN), 0.5);
    }

    #[test]
    fn bounds_floor_width_and_height() {
        let bounds = Bounds::new(10.0, 20.0, 0.0, -4.0).normalized();
        assert_eq!(bounds, Bounds::new(10.0, 20.0, 1.0, 1.0));
    }

    #[test]
    fn side_orientation_and_slot() {
        assert_eq!(DockSide::Left.orientation(), Orientation::Vertical);
        assert_eq!(DockSide::Right.orientation(), Orientation::Vertical);
        assert_eq!(DockSide::Top.orientation(), Orientation::Horizontal);
        assert!(DockSide::Top.is_leading());
        assert!(!DockSide::Bottom.is_leading());
        assert_eq!(DockPosition::Center.side(), None);
    }

    #[test]
    fn removing_active_item_clears_active_key() {
        let mut group = GroupNode::new(ContentKind::Document)
            .with_item(DockItem::new(key("a")))
            .with_item(DockItem::new(key("b")))
            .with_active_key(Some(key("a")));
        assert_eq!(group.active_or_first().map(PersistKey::as_str), Some("a"));
        let removed = group.remove_item("a").expect("item present");
        assert_eq!(removed.persist_key.as_str(), "a");
        assert!(group.active_key().is_none());
        assert_eq!(group.active_or_first().map(PersistKey::as_str), Some("b"));
    }
}
