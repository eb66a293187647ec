//! Stateful dock orchestrator.
//!
//! [`DockManager`] owns the current [`DockTree`] and routes every
//! structural change through the layout mutator, then through one choke
//! point ([`DockManager::apply_layout`]) that validates the new tree,
//! re-syncs the auto-hide popup, re-derives the active content and raises
//! a reason-tagged [`DockEvent::LayoutChanged`].
//!
//! # Return Values
//!
//! Operations return `Ok(true)` when they changed something and `Ok(false)`
//! for expected refusals (unknown target, cross-kind tab merge,
//! non-closeable or non-hideable content, unpinning a key that is not
//! pinned). Blank keys or node ids are [`DockError::InvalidArgument`]; any
//! call after [`DockManager::dispose`] is [`DockError::Disposed`].
//!
//! # Invariants
//!
//! After every public call:
//!
//! 1. persist keys are unique across groups and strips;
//! 2. split ratios lie in `[0.05, 0.95]`;
//! 3. at least one Document group exists;
//! 4. the active content is set whenever any group holds an item.

mod active;
mod persist;

use std::collections::BTreeMap;

use dockwork_layout::mutator::{self, find_first_group_by_kind};
use dockwork_layout::{
    ContentKind, DockInvariantReport, DockPosition, DockRequest, DockSide, DockTree, GroupNode,
    NodeId, PersistKey, PopupSize, invariant_report, rebuild_parents, validate_and_fix,
};

use crate::content::{ContentFactory, DockContent};
use crate::error::{DockError, Result};
use crate::events::{DockEvent, DockEvents, LayoutChangeReason, Subscription, SuppressionScope};
use crate::policy::DockPolicy;
use crate::registry::ContentRegistry;

const TARGET: &str = "dockwork.manager";

/// Owner of the dock layout, its content and its UI state.
#[derive(Debug)]
pub struct DockManager {
    tree: DockTree,
    registry: ContentRegistry,
    events: DockEvents,
    policy: DockPolicy,
    active_content: Option<PersistKey>,
    last_active: Option<PersistKey>,
    last_non_auto_hide: Option<PersistKey>,
    auto_hide_popup: Option<PersistKey>,
    /// Restored states for keys without an instance yet.
    pending_states: BTreeMap<PersistKey, Option<String>>,
    disposed: bool,
}

impl DockManager {
    /// Manager over a single empty Document group.
    pub fn new(factory: impl ContentFactory + 'static) -> Self {
        Self::with_policy(factory, DockPolicy::default())
    }

    pub fn with_policy(factory: impl ContentFactory + 'static, policy: DockPolicy) -> Self {
        let events = DockEvents::new();
        let registry = ContentRegistry::new(factory, policy.dispose, events.clone());
        Self {
            tree: DockTree::with_document_group(),
            registry,
            events,
            policy,
            active_content: None,
            last_active: None,
            last_non_auto_hide: None,
            auto_hide_popup: None,
            pending_states: BTreeMap::new(),
            disposed: false,
        }
    }

    // =====================================================================
    // Queries
    // =====================================================================

    #[must_use]
    pub fn tree(&self) -> &DockTree {
        &self.tree
    }

    #[must_use]
    pub fn policy(&self) -> &DockPolicy {
        &self.policy
    }

    /// Replace the policy. Takes effect on the next operation.
    pub fn set_policy(&mut self, policy: DockPolicy) {
        self.registry.set_dispose_policy(policy.dispose);
        self.policy = policy;
    }

    #[must_use]
    pub fn events(&self) -> &DockEvents {
        &self.events
    }

    pub fn subscribe(&self, callback: impl Fn(&DockEvent) + 'static) -> Subscription {
        self.events.subscribe(callback)
    }

    /// Batch notifications until the returned scope is dropped.
    pub fn suppress_events(&self) -> SuppressionScope {
        self.events.suppress()
    }

    #[must_use]
    pub fn registry(&self) -> &ContentRegistry {
        &self.registry
    }

    #[must_use]
    pub fn content(&self, key: &str) -> Option<&dyn DockContent> {
        self.registry.get(key)
    }

    #[must_use]
    pub fn active_content(&self) -> Option<&PersistKey> {
        self.active_content.as_ref()
    }

    /// Instance behind [`Self::active_content`], if one exists.
    #[must_use]
    pub fn active_instance(&self) -> Option<&dyn DockContent> {
        self.active_content
            .as_ref()
            .and_then(|key| self.registry.get(key.as_str()))
    }

    /// Most recent non-empty active key.
    #[must_use]
    pub fn last_active(&self) -> Option<&PersistKey> {
        self.last_active.as_ref()
    }

    /// Key whose auto-hide popup is showing.
    #[must_use]
    pub fn active_auto_hide_key(&self) -> Option<&PersistKey> {
        self.auto_hide_popup.as_ref()
    }

    #[must_use]
    pub fn is_auto_hide_popup_visible(&self) -> bool {
        self.auto_hide_popup.is_some()
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    #[must_use]
    pub fn invariant_report(&self) -> DockInvariantReport {
        invariant_report(&self.tree)
    }

    // =====================================================================
    // Layout swap
    // =====================================================================

    /// Install `tree` as the current layout.
    ///
    /// `validate` overrides [`DockPolicy::validate_on_apply`]; without
    /// validation only parent links are rebuilt.
    pub fn apply_layout(
        &mut self,
        tree: DockTree,
        reason: LayoutChangeReason,
        validate: Option<bool>,
    ) -> Result<()> {
        self.ensure_live()?;
        self.install_layout(tree, reason, validate)
    }

    fn install_layout(
        &mut self,
        tree: DockTree,
        reason: LayoutChangeReason,
        validate: Option<bool>,
    ) -> Result<()> {
        let validate = validate.unwrap_or(self.policy.validate_on_apply);
        self.tree = if validate {
            validate_and_fix(&tree, self.policy.prune_empty_tool_leaves)
        } else {
            let mut tree = tree;
            rebuild_parents(&mut tree);
            tree
        };
        self.sync_popup_with_tree();
        self.rederive_active()?;
        tracing::debug!(
            target: TARGET,
            ?reason,
            nodes = self.tree.len(),
            hash = self.tree.state_hash(),
            "layout applied"
        );
        self.events.emit(DockEvent::LayoutChanged { reason });
        Ok(())
    }

    // =====================================================================
    // Docking
    // =====================================================================

    /// Dock `key` relative to the group `target_group`.
    ///
    /// Center merges into the group's tabs; a side splits the group. A
    /// side ratio defaults per [`DockPolicy::side_ratio`].
    pub fn dock(
        &mut self,
        key: &str,
        target_group: &str,
        position: DockPosition,
        ratio: Option<f64>,
    ) -> Result<bool> {
        self.ensure_live()?;
        let key = PersistKey::new(key)?;
        let target = NodeId::new(target_group)?;
        let _span =
            tracing::debug_span!(target: TARGET, "dock", %key, group = %target, ?position)
                .entered();
        self.dock_core(key, target, position, ratio)
    }

    /// Dock `key` into the tool area, creating one on `placement` (or the
    /// policy placement) when none exists.
    pub fn dock_to_tool_area(&mut self, key: &str, placement: Option<DockSide>) -> Result<bool> {
        self.ensure_live()?;
        let key = PersistKey::new(key)?;
        let _span = tracing::debug_span!(target: TARGET, "dock_to_tool_area", %key).entered();
        if self.ensure_content(&key)? == Some(ContentKind::Document) {
            tracing::debug!(target: TARGET, %key, "documents cannot join the tool area");
            return Ok(false);
        }
        let placement = placement.unwrap_or(self.policy.tool_area_placement);
        let (tree, group) =
            mutator::ensure_tool_area(&self.tree, placement, Some(self.policy.tool_area_ratio));
        let previous = std::mem::replace(&mut self.tree, tree);
        match self.dock_core(key, group, DockPosition::Center, None) {
            Ok(true) => Ok(true),
            other => {
                self.tree = previous;
                other
            }
        }
    }

    fn dock_core(
        &mut self,
        key: PersistKey,
        target: NodeId,
        position: DockPosition,
        ratio: Option<f64>,
    ) -> Result<bool> {
        let Some(target_kind) = self
            .tree
            .group(target.as_str())
            .map(GroupNode::content_kind)
        else {
            tracing::debug!(target: TARGET, group = %target, "dock target is not a group");
            return Ok(false);
        };
        let side = position.side();
        let already_docked = side.is_none()
            && self
                .tree
                .group(target.as_str())
                .is_some_and(|group| group.contains(key.as_str()));
        if already_docked {
            self.activate(key)?;
            return Ok(true);
        }

        let staged = if self.registry.contains(key.as_str()) {
            None
        } else {
            self.registry.instantiate(&key)?
        };
        let kind = match &staged {
            Some(content) => content.kind(),
            None => self
                .registry
                .get(key.as_str())
                .map_or(target_kind, |content| content.kind()),
        };
        if side.is_none() && kind != target_kind {
            tracing::debug!(
                target: TARGET,
                %key,
                ?kind,
                ?target_kind,
                "cross-kind tab merge refused"
            );
            return Ok(false);
        }
        if let Some(content) = staged {
            self.adopt_content(content);
        }
        let ratio = side.map(|_| ratio.unwrap_or_else(|| self.policy.side_ratio(target_kind, kind)));
        let request = DockRequest::new(key.clone(), target)
            .position(position)
            .ratio(ratio)
            .new_group_kind(Some(kind));
        let next = match mutator::dock_to_group(&self.tree, &request) {
            Ok(next) => next,
            Err(reason) => {
                tracing::debug!(target: TARGET, %reason, "dock rejected");
                return Ok(false);
            }
        };
        self.install_layout(next, LayoutChangeReason::Dock, None)?;
        self.activate(key)?;
        Ok(true)
    }

    /// Make `key` visible: activate it where it lives, or dock it into the
    /// first group of its kind (tool windows go to the tool area).
    pub fn show_content(&mut self, key: &str) -> Result<bool> {
        self.ensure_live()?;
        let key = PersistKey::new(key)?;
        let _span = tracing::debug_span!(target: TARGET, "show_content", %key).entered();
        match self.tree.locate(key.as_str()) {
            Some(at) if at.in_auto_hide => {
                self.show_popup(key)?;
                Ok(true)
            }
            Some(_) => {
                self.activate(key)?;
                Ok(true)
            }
            None => match self.ensure_content(&key)? {
                None => Ok(false),
                Some(ContentKind::ToolWindow) => self.dock_to_tool_area(key.as_str(), None),
                Some(ContentKind::Document) => {
                    match find_first_group_by_kind(&self.tree, ContentKind::Document) {
                        Some(target) => self.dock_core(key, target, DockPosition::Center, None),
                        None => Ok(false),
                    }
                }
            },
        }
    }

    // =====================================================================
    // Closing
    // =====================================================================

    /// Remove `key` from the layout and close its instance.
    ///
    /// The last Document group is kept even when this empties it.
    pub fn close_content(&mut self, key: &str) -> Result<bool> {
        self.ensure_live()?;
        let key = PersistKey::new(key)?;
        let _span = tracing::debug_span!(target: TARGET, "close_content", %key).entered();
        if !self.registry.can_close(key.as_str()) {
            tracing::debug!(target: TARGET, %key, "content refused close");
            return Ok(false);
        }
        let in_tree = self.tree.locate(key.as_str()).is_some();
        if !in_tree && !self.registry.contains(key.as_str()) {
            return Ok(false);
        }

        if !self.registry.close(key.as_str()) {
            tracing::debug!(target: TARGET, %key, "closing layout entry without an instance");
        }
        self.pending_states.remove(&key);
        if in_tree {
            match mutator::close_content(&self.tree, &key) {
                Ok(next) => self.install_layout(next, LayoutChangeReason::Close, None)?,
                Err(reason) => tracing::debug!(target: TARGET, %reason, "close rejected"),
            }
        } else if self.active_content.as_ref() == Some(&key) {
            self.rederive_active()?;
        }
        Ok(true)
    }

    /// Close every item of a group with one batched notification.
    pub fn close_all_in_group(&mut self, group_id: &str) -> Result<bool> {
        self.ensure_live()?;
        let group_id = NodeId::new(group_id)?;
        let Some(group) = self.tree.group(group_id.as_str()) else {
            return Ok(false);
        };
        let keys: Vec<PersistKey> = group
            .items()
            .iter()
            .map(|item| item.persist_key.clone())
            .collect();
        let _scope = self.events.suppress();
        let mut closed = 0_usize;
        for key in keys {
            if self.close_content(key.as_str())? {
                closed += 1;
            }
        }
        tracing::debug!(target: TARGET, %group_id, closed, "group closed");
        Ok(closed > 0)
    }

    // =====================================================================
    // Auto-hide pinning
    // =====================================================================

    /// Move a docked `key` to the auto-hide strip on `side`.
    ///
    /// The popup stays hidden. Pinning the active content re-derives it.
    pub fn pin_to_auto_hide(
        &mut self,
        key: &str,
        side: DockSide,
        popup_size: Option<PopupSize>,
    ) -> Result<bool> {
        self.ensure_live()?;
        let key = PersistKey::new(key)?;
        let _span =
            tracing::debug_span!(target: TARGET, "pin_to_auto_hide", %key, ?side).entered();
        if !self.registry.can_hide(key.as_str()) {
            tracing::debug!(target: TARGET, %key, "content cannot be hidden");
            return Ok(false);
        }
        let next = match mutator::pin_to_auto_hide(&self.tree, &key, side, popup_size) {
            Ok(next) => next,
            Err(reason) => {
                tracing::debug!(target: TARGET, %reason, "pin rejected");
                return Ok(false);
            }
        };
        self.install_layout(next, LayoutChangeReason::Pin, None)?;
        Ok(true)
    }

    /// Move a pinned `key` back into a group.
    pub fn unpin_from_auto_hide(
        &mut self,
        key: &str,
        target_group: Option<&str>,
        make_active: bool,
    ) -> Result<bool> {
        self.ensure_live()?;
        let key = PersistKey::new(key)?;
        let target = target_group.map(NodeId::new).transpose()?;
        let _span = tracing::debug_span!(target: TARGET, "unpin_from_auto_hide", %key).entered();
        let kind = self.registry.get(key.as_str()).map(|content| content.kind());
        let next = match mutator::unpin_from_auto_hide(
            &self.tree,
            &key,
            kind,
            target.as_ref(),
            make_active,
        ) {
            Ok(next) => next,
            Err(reason) => {
                tracing::debug!(target: TARGET, %reason, "unpin rejected");
                return Ok(false);
            }
        };
        self.install_layout(next, LayoutChangeReason::Unpin, None)?;
        if make_active {
            self.activate(key)?;
        }
        Ok(true)
    }

    /// Pin a docked key (to [`DockPolicy::default_pin_side`]) or unpin a
    /// pinned one. `Ok(false)` when the key is in neither place.
    pub fn toggle_pin_auto_hide(&mut self, key: &str) -> Result<bool> {
        self.ensure_live()?;
        let key = PersistKey::new(key)?;
        match self.tree.locate(key.as_str()) {
            Some(at) if at.in_auto_hide => self.unpin_from_auto_hide(key.as_str(), None, true),
            Some(_) => {
                let side = self.policy.default_pin_side;
                self.pin_to_auto_hide(key.as_str(), side, None)
            }
            None => Ok(false),
        }
    }

    // =====================================================================
    // Splits
    // =====================================================================

    /// Set a split's first-child share (clamped).
    pub fn set_split_ratio(&mut self, split_id: &str, ratio: f64) -> Result<bool> {
        self.ensure_live()?;
        let split_id = NodeId::new(split_id)?;
        let next = match mutator::set_split_ratio(&self.tree, &split_id, ratio) {
            Ok(next) => next,
            Err(reason) => {
                tracing::debug!(target: TARGET, %reason, "split ratio rejected");
                return Ok(false);
            }
        };
        self.install_layout(next, LayoutChangeReason::SplitRatio, None)?;
        Ok(true)
    }

    // =====================================================================
    // Content lifecycle
    // =====================================================================

    /// Add externally created content. A restored state waiting for its
    /// key is applied first.
    pub fn register_content(&mut self, mut content: Box<dyn DockContent>) -> Result<()> {
        self.ensure_live()?;
        let key = content.persist_key().clone();
        if let Some(state) = self.pending_states.remove(&key) {
            load_state_logged(content.as_mut(), &key, state.as_deref());
        }
        self.registry.register(content);
        Ok(())
    }

    /// Dispose every instance. Every later call fails with
    /// [`DockError::Disposed`].
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.registry.dispose_all();
        self.pending_states.clear();
        self.auto_hide_popup = None;
        self.active_content = None;
        self.disposed = true;
        tracing::debug!(target: TARGET, "dock manager disposed");
    }

    // =====================================================================
    // Internals
    // =====================================================================

    fn ensure_live(&self) -> Result<()> {
        if self.disposed {
            Err(DockError::Disposed)
        } else {
            Ok(())
        }
    }

    /// Instantiate `key` if needed and report its kind. A freshly created
    /// instance receives any pending restored state.
    fn ensure_content(&mut self, key: &PersistKey) -> Result<Option<ContentKind>> {
        if let Some(content) = self.registry.get(key.as_str()) {
            return Ok(Some(content.kind()));
        }
        let Some(content) = self.registry.instantiate(key)? else {
            return Ok(None);
        };
        Ok(Some(self.adopt_content(content)))
    }

    /// Register a fresh instance and hand it any restored state.
    fn adopt_content(&mut self, content: Box<dyn DockContent>) -> ContentKind {
        let key = content.persist_key().clone();
        let kind = content.kind();
        let content = self.registry.adopt(content);
        if let Some(state) = self.pending_states.remove(&key) {
            load_state_logged(content, &key, state.as_deref());
        }
        kind
    }

    fn sync_popup_with_tree(&mut self) {
        let Some(key) = self.auto_hide_popup.clone() else {
            return;
        };
        let pinned = self
            .tree
            .locate(key.as_str())
            .is_some_and(|at| at.in_auto_hide);
        if !pinned {
            tracing::debug!(target: TARGET, %key, "auto-hide popup closed by layout change");
            self.auto_hide_popup = None;
        } else if let Ok(next) = mutator::set_group_active(&self.tree, &key) {
            self.tree = next;
        }
    }
}

fn load_state_logged(content: &mut dyn DockContent, key: &PersistKey, state: Option<&str>) {
    if let Err(err) = content.load_state(state) {
        tracing::warn!(target: TARGET, %key, %err, "content state restore failed");
    }
}
