//! Active-content and auto-hide popup state machines.
//!
//! | input to `set_active_content` | effect |
//! |---|---|
//! | none / blank | hide popup; fall back |
//! | key in a group | hide popup; activate; remember as last non-auto-hide key |
//! | key in a strip, popup showing it | hide popup; fall back |
//! | key in a strip, popup hidden | show popup; activate |
//! | key not in the layout | activate (instantiating it) |

use dockwork_layout::mutator;
use dockwork_layout::{ContentKind, PersistKey};

use super::{DockManager, TARGET};
use crate::error::Result;
use crate::events::{DockEvent, LayoutChangeReason};

impl DockManager {
    /// Drive the active-content state machine with `key`.
    pub fn set_active_content(&mut self, key: Option<&str>) -> Result<()> {
        self.ensure_live()?;
        let key = match key.map(str::trim).filter(|raw| !raw.is_empty()) {
            Some(raw) => Some(PersistKey::new(raw)?),
            None => None,
        };
        let _span = tracing::debug_span!(target: TARGET, "set_active_content", key = ?key).entered();
        match key {
            Some(key) => self.activate(key),
            None => {
                self.set_auto_hide_popup(None);
                let next = self.select_fallback_group_active_key();
                self.change_active(next)
            }
        }
    }

    /// Show the popup for a pinned `key` and make it active.
    ///
    /// Returns whether the popup changed; `Ok(false)` also when `key` is
    /// not pinned.
    pub fn show_auto_hide_popup(&mut self, key: &str) -> Result<bool> {
        self.ensure_live()?;
        let key = PersistKey::new(key)?;
        self.show_popup(key)
    }

    /// Hide the popup, re-deriving the active content if it was showing.
    pub fn hide_auto_hide_popup(&mut self) -> Result<bool> {
        self.ensure_live()?;
        let Some(shown) = self.auto_hide_popup.clone() else {
            return Ok(false);
        };
        self.set_auto_hide_popup(None);
        if self.active_content.as_ref() == Some(&shown) {
            let next = self.select_fallback_group_active_key();
            self.change_active(next)?;
        }
        Ok(true)
    }

    pub fn toggle_auto_hide_popup(&mut self, key: &str) -> Result<bool> {
        self.ensure_live()?;
        let key = PersistKey::new(key)?;
        if self.auto_hide_popup.as_ref() == Some(&key) {
            self.hide_auto_hide_popup()
        } else {
            self.show_popup(key)
        }
    }

    /// Key that becomes active when nothing else is:
    ///
    /// 1. the last non-auto-hide key, if still docked;
    /// 2. the first Document group's active (or first) item;
    /// 3. the first ToolWindow group's active (or first) item.
    #[must_use]
    pub fn select_fallback_group_active_key(&self) -> Option<PersistKey> {
        if let Some(last) = &self.last_non_auto_hide
            && self
                .tree
                .locate(last.as_str())
                .is_some_and(|at| !at.in_auto_hide)
        {
            return Some(last.clone());
        }
        [ContentKind::Document, ContentKind::ToolWindow]
            .into_iter()
            .find_map(|kind| {
                self.tree
                    .groups()
                    .filter(|(_, group)| group.content_kind() == kind)
                    .find_map(|(_, group)| group.active_or_first().cloned())
            })
    }

    pub(super) fn activate(&mut self, key: PersistKey) -> Result<()> {
        match self.tree.locate(key.as_str()) {
            Some(at) if !at.in_auto_hide => {
                self.set_auto_hide_popup(None);
                if let Ok(next) = mutator::set_group_active(&self.tree, &key) {
                    self.tree = next;
                }
                self.change_active(Some(key.clone()))?;
                self.last_non_auto_hide = Some(key);
            }
            Some(_) if self.auto_hide_popup.as_ref() == Some(&key) => {
                self.set_auto_hide_popup(None);
                let next = self.select_fallback_group_active_key();
                self.change_active(next)?;
            }
            Some(_) => {
                self.show_popup(key)?;
            }
            None => {
                self.change_active(Some(key.clone()))?;
                self.last_non_auto_hide = Some(key);
            }
        }
        Ok(())
    }

    pub(super) fn show_popup(&mut self, key: PersistKey) -> Result<bool> {
        let pinned = self
            .tree
            .locate(key.as_str())
            .is_some_and(|at| at.in_auto_hide);
        if !pinned {
            tracing::debug!(target: TARGET, %key, "popup requested for unpinned key");
            return Ok(false);
        }
        let changed = self.set_auto_hide_popup(Some(key.clone()));
        self.change_active(Some(key))?;
        Ok(changed)
    }

    /// The single popup setter: no-op on the current key, otherwise moves
    /// the strip marker to the new key and raises a layout change.
    fn set_auto_hide_popup(&mut self, key: Option<PersistKey>) -> bool {
        if self.auto_hide_popup == key {
            return false;
        }
        if let Some(key) = &key
            && let Ok(next) = mutator::set_group_active(&self.tree, key)
        {
            self.tree = next;
        }
        tracing::debug!(
            target: TARGET,
            previous = ?self.auto_hide_popup,
            current = ?key,
            "auto-hide popup changed"
        );
        self.auto_hide_popup = key;
        self.events.emit(DockEvent::LayoutChanged {
            reason: LayoutChangeReason::AutoHidePopup,
        });
        true
    }

    pub(super) fn change_active(&mut self, next: Option<PersistKey>) -> Result<()> {
        if let Some(key) = &next {
            self.ensure_content(key)?;
            self.last_active = Some(key.clone());
        }
        if self.active_content == next {
            return Ok(());
        }
        let previous = std::mem::replace(&mut self.active_content, next.clone());
        tracing::debug!(
            target: TARGET,
            previous = ?previous,
            current = ?next,
            "active content changed"
        );
        self.events.emit(DockEvent::ActiveContentChanged {
            previous,
            current: next,
        });
        Ok(())
    }

    /// Replace an active key that left the layout or was pinned out of
    /// view (pinned without its popup showing).
    pub(super) fn rederive_active(&mut self) -> Result<()> {
        let stale = self.active_content.as_ref().is_none_or(|key| {
            self.tree.locate(key.as_str()).is_none_or(|at| {
                at.in_auto_hide && self.auto_hide_popup.as_ref() != Some(key)
            })
        });
        if stale {
            let next = self.select_fallback_group_active_key();
            self.change_active(next)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{DockContent, ViewHandle};
    use dockwork_layout::{DockPosition, DockSide};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Pane {
        key: PersistKey,
        kind: ContentKind,
    }

    impl DockContent for Pane {
        fn persist_key(&self) -> &PersistKey {
            &self.key
        }

        fn title(&self) -> &str {
            self.key.as_str()
        }

        fn view(&self) -> ViewHandle {
            ViewHandle(2)
        }

        fn kind(&self) -> ContentKind {
            self.kind
        }
    }

    fn manager() -> DockManager {
        DockManager::new(|key: &PersistKey| -> Option<Box<dyn DockContent>> {
            let kind = if key.as_str().starts_with("Tool") {
                ContentKind::ToolWindow
            } else {
                ContentKind::Document
            };
            Some(Box::new(Pane {
                key: key.clone(),
                kind,
            }))
        })
    }

    fn document_group(manager: &DockManager) -> String {
        manager.tree().root().to_string()
    }

    fn active(manager: &DockManager) -> Option<&str> {
        manager.active_content().map(PersistKey::as_str)
    }

    /// Doc:1 and Doc:2 docked, Tool:1 pinned left.
    fn pinned_setup() -> DockManager {
        let mut manager = manager();
        let docs = document_group(&manager);
        manager
            .dock("Doc:1", &docs, DockPosition::Center, None)
            .expect("docks");
        manager
            .dock("Doc:2", &docs, DockPosition::Center, None)
            .expect("docks");
        manager.dock_to_tool_area("Tool:1", None).expect("docks");
        manager
            .pin_to_auto_hide("Tool:1", DockSide::Left, None)
            .expect("pins");
        manager
    }

    #[test]
    fn blank_key_falls_back() {
        let mut manager = pinned_setup();
        manager.set_active_content(Some("Doc:1")).expect("activates");
        manager.set_active_content(Some("   ")).expect("falls back");
        assert_eq!(active(&manager), Some("Doc:1"));
        manager.set_active_content(None).expect("falls back");
        assert_eq!(active(&manager), Some("Doc:1"));
    }

    #[test]
    fn group_key_activates_and_hides_popup() {
        let mut manager = pinned_setup();
        manager.show_auto_hide_popup("Tool:1").expect("shows");
        assert!(manager.is_auto_hide_popup_visible());
        manager.set_active_content(Some("Doc:2")).expect("activates");
        assert!(!manager.is_auto_hide_popup_visible());
        assert_eq!(active(&manager), Some("Doc:2"));
        let at = manager.tree().locate("Doc:2").expect("docked");
        let group = manager.tree().group(at.node_id.as_str()).expect("group");
        assert_eq!(group.active_key().map(PersistKey::as_str), Some("Doc:2"));
    }

    #[test]
    fn pinned_key_toggles_popup() {
        let mut manager = pinned_setup();
        manager.set_active_content(Some("Doc:1")).expect("activates");

        manager.set_active_content(Some("Tool:1")).expect("shows");
        assert_eq!(
            manager.active_auto_hide_key().map(PersistKey::as_str),
            Some("Tool:1")
        );
        assert_eq!(active(&manager), Some("Tool:1"));

        manager.set_active_content(Some("Tool:1")).expect("hides");
        assert!(!manager.is_auto_hide_popup_visible());
        assert_eq!(active(&manager), Some("Doc:1"));
    }

    #[test]
    fn unknown_key_is_instantiated_and_activated() {
        let mut manager = pinned_setup();
        manager.set_active_content(Some("Doc:9")).expect("activates");
        assert_eq!(active(&manager), Some("Doc:9"));
        assert!(manager.content("Doc:9").is_some());
        assert!(manager.tree().locate("Doc:9").is_none());
    }

    #[test]
    fn popup_setter_ignores_repeats() {
        let mut manager = pinned_setup();
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let _sub = manager.subscribe(move |event| sink.borrow_mut().push(event.clone()));

        assert!(manager.show_auto_hide_popup("Tool:1").expect("shows"));
        assert!(!manager.show_auto_hide_popup("Tool:1").expect("repeat"));
        let popup_changes = log
            .borrow()
            .iter()
            .filter(|event| {
                matches!(
                    event,
                    DockEvent::LayoutChanged {
                        reason: LayoutChangeReason::AutoHidePopup
                    }
                )
            })
            .count();
        assert_eq!(popup_changes, 1);
    }

    #[test]
    fn popup_marks_strip_active_and_hide_keeps_marker() {
        let mut manager = pinned_setup();
        manager.dock_to_tool_area("Tool:2", None).expect("docks");
        manager
            .pin_to_auto_hide("Tool:2", DockSide::Left, None)
            .expect("pins");
        manager.show_auto_hide_popup("Tool:2").expect("shows");
        let strip_marker = |manager: &DockManager| {
            manager
                .tree()
                .auto_hides()
                .next()
                .and_then(|(_, strip)| strip.active_key().cloned())
        };
        assert_eq!(
            strip_marker(&manager).as_ref().map(PersistKey::as_str),
            Some("Tool:2")
        );
        assert!(manager.hide_auto_hide_popup().expect("hides"));
        assert_eq!(
            strip_marker(&manager).as_ref().map(PersistKey::as_str),
            Some("Tool:2")
        );
        assert!(!manager.hide_auto_hide_popup().expect("already hidden"));
    }

    #[test]
    fn toggle_popup_flips_visibility() {
        let mut manager = pinned_setup();
        assert!(manager.toggle_auto_hide_popup("Tool:1").expect("shows"));
        assert!(manager.is_auto_hide_popup_visible());
        assert!(manager.toggle_auto_hide_popup("Tool:1").expect("hides"));
        assert!(!manager.is_auto_hide_popup_visible());
        assert!(!manager.toggle_auto_hide_popup("Doc:1").expect("not pinned"));
    }

    #[test]
    fn fallback_prefers_documents_over_tools() {
        let mut manager = manager();
        manager.dock_to_tool_area("Tool:1", None).expect("docks");
        let docs = manager
            .tree()
            .groups()
            .find(|(_, group)| group.content_kind() == ContentKind::Document)
            .map(|(id, _)| id.to_string())
            .expect("document group");
        manager
            .dock("Doc:1", &docs, DockPosition::Center, None)
            .expect("docks");
        manager.close_content("Doc:1").expect("closes");
        assert_eq!(active(&manager), Some("Tool:1"));
        manager
            .dock("Doc:2", &docs, DockPosition::Center, None)
            .expect("docks");
        manager.set_active_content(Some("Tool:1")).expect("activates");
        manager.close_content("Tool:1").expect("closes");
        assert_eq!(active(&manager), Some("Doc:2"));
    }
}
