#![forbid(unsafe_code)]

//! dockwork public facade crate.
//!
//! Re-exports the layout model and, with the default `runtime` feature, the
//! dock manager, plus a prelude for day-to-day usage.

// --- Layout re-exports -----------------------------------------------------

pub use dockwork_layout::{
    ContentKind, DockInvariantReport, DockPosition, DockSide, DockTree, GroupNode, LayoutDto,
    LayoutFormatError, LayoutPersistError, NodeId, NodePath, PersistKey, PopupSize,
};

// --- Runtime re-exports ----------------------------------------------------

#[cfg(feature = "runtime")]
pub use dockwork_runtime::{
    ContentFactory, ContentStateError, DockContent, DockError, DockEvent, DockManager, DockPolicy,
    LayoutChangeReason, Result, Subscription, ViewHandle,
};

/// Common imports.
pub mod prelude {
    pub use crate::{ContentKind, DockPosition, DockSide, DockTree, PersistKey};

    #[cfg(feature = "runtime")]
    pub use crate::{
        ContentFactory, DockContent, DockError, DockEvent, DockManager, DockPolicy,
        LayoutChangeReason, ViewHandle,
    };

    pub use crate::layout;
    #[cfg(feature = "runtime")]
    pub use crate::runtime;
}

pub use dockwork_layout as layout;
#[cfg(feature = "runtime")]
pub use dockwork_runtime as runtime;
