#![forbid(unsafe_code)]

//! Dock layout tree: model, mutation, validation and persistence.
//!
//! The tree is an arena ([`DockTree`]) of split, tab-group, floating and
//! auto-hide nodes. [`mutator`] operations return new trees, [`validate`]
//! repairs and inspects them, and [`persist`] maps them to versioned
//! snapshots.

pub mod mutator;
pub mod node;
pub mod path;
pub mod persist;
pub mod tree;
pub mod validate;

pub use mutator::{
    DockOperation, DockOperationKind, DockOperationOutcome, DockRequest, MutationRejected,
    apply_operation, close_content, dock_to_group, ensure_auto_hide_strip, ensure_tool_area,
    pin_to_auto_hide, set_group_active, set_split_ratio, unpin_from_auto_hide,
};
pub use node::{
    AutoHideItem, AutoHideNode, Bounds, ContentKind, DockItem, DockModelError, DockNode,
    DockNodeRecord, DockPosition, DockSide, FloatingNode, GroupNode, MAX_SPLIT_RATIO,
    MIN_SPLIT_RATIO, NodeId, NodeKind, Orientation, PersistKey, PopupSize, SplitNode,
    clamp_ratio,
};
pub use path::NodePath;
pub use persist::{
    KindResolver, LAYOUT_FORMAT_VERSION, LayoutDto, LayoutFormatError, LayoutMigration,
    LayoutPersistError, NodeDto, from_dto, to_dto,
};
pub use tree::{DepthFirst, DockTree, ItemLocation};
pub use validate::{
    DockInvariantCode, DockInvariantIssue, DockInvariantReport, DockInvariantSeverity,
    invariant_report, rebuild_parents, validate_and_fix,
};
