#![forbid(unsafe_code)]

//! Dock manager runtime: content lifecycle, active-content and auto-hide
//! popup state machines, event notification and layout save/restore on top
//! of [`dockwork_layout`].
//!
//! # Role in dockwork
//! `dockwork-layout` owns the pure tree model. This crate owns everything
//! stateful: the [`DockManager`], the [`ContentRegistry`] of live content
//! instances, and the [`DockEvents`] hub.
//!
//! # Threading
//! Single-threaded. The manager and its event hub are `!Send`.

pub mod content;
pub mod error;
pub mod events;
pub mod manager;
pub mod policy;
pub mod registry;

pub use content::{ContentFactory, ContentStateError, DockContent, ViewHandle};
pub use error::{DockError, Result};
pub use events::{DockEvent, DockEvents, LayoutChangeReason, Subscription, SuppressionScope};
pub use manager::DockManager;
pub use policy::{DockPolicy, DockPolicyError};
pub use registry::{ContentRegistry, DisposePolicy};
