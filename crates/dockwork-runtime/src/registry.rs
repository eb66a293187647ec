//! Persist-key to content-instance map.
//!
//! Content is created lazily through the [`ContentFactory`] the first time a
//! key is needed and removed on close. Whether a closed instance is
//! disposed depends on its kind ([`DisposePolicy`]).

use std::collections::BTreeMap;
use std::fmt;

use dockwork_layout::{ContentKind, PersistKey};

use crate::content::{ContentFactory, DockContent};
use crate::error::{DockError, Result};
use crate::events::{DockEvent, DockEvents};

/// Whether closing content of a kind also disposes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "policy-config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "policy-config", serde(default))]
pub struct DisposePolicy {
    pub documents: bool,
    pub tool_windows: bool,
}

impl Default for DisposePolicy {
    fn default() -> Self {
        Self {
            documents: true,
            tool_windows: false,
        }
    }
}

impl DisposePolicy {
    #[must_use]
    pub const fn disposes(&self, kind: ContentKind) -> bool {
        match kind {
            ContentKind::Document => self.documents,
            ContentKind::ToolWindow => self.tool_windows,
        }
    }
}

/// Live content instances keyed by persist key.
pub struct ContentRegistry {
    factory: Box<dyn ContentFactory>,
    contents: BTreeMap<PersistKey, Box<dyn DockContent>>,
    dispose_policy: DisposePolicy,
    events: DockEvents,
}

impl fmt::Debug for ContentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentRegistry")
            .field("keys", &self.contents.keys().collect::<Vec<_>>())
            .field("dispose_policy", &self.dispose_policy)
            .finish_non_exhaustive()
    }
}

impl ContentRegistry {
    pub fn new(
        factory: impl ContentFactory + 'static,
        dispose_policy: DisposePolicy,
        events: DockEvents,
    ) -> Self {
        Self {
            factory: Box::new(factory),
            contents: BTreeMap::new(),
            dispose_policy,
            events,
        }
    }

    #[must_use]
    pub fn dispose_policy(&self) -> DisposePolicy {
        self.dispose_policy
    }

    pub fn set_dispose_policy(&mut self, policy: DisposePolicy) {
        self.dispose_policy = policy;
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.contents.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.contents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    /// Instantiated keys in key order.
    pub fn keys(&self) -> impl Iterator<Item = &PersistKey> {
        self.contents.keys()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&dyn DockContent> {
        self.contents.get(key).map(|content| content.as_ref())
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut dyn DockContent> {
        match self.contents.get_mut(key) {
            Some(content) => Some(content.as_mut()),
            None => None,
        }
    }

    /// The instance for `key`, created through the factory when missing.
    ///
    /// `Ok(None)` means the factory does not support the key. A factory
    /// answering with a different key is a contract violation.
    pub fn ensure(&mut self, key: &PersistKey) -> Result<Option<&mut dyn DockContent>> {
        if !self.contents.contains_key(key.as_str()) {
            let Some(content) = self.instantiate(key)? else {
                return Ok(None);
            };
            return Ok(Some(self.adopt(content)));
        }
        Ok(self.get_mut(key.as_str()))
    }

    /// Create an instance for `key` without registering it.
    pub(crate) fn instantiate(&mut self, key: &PersistKey) -> Result<Option<Box<dyn DockContent>>> {
        let Some(content) = self.factory.create(key) else {
            tracing::debug!(target: "dockwork.registry", %key, "factory does not support key");
            return Ok(None);
        };
        if content.persist_key() != key {
            return Err(DockError::FactoryKeyMismatch {
                requested: key.clone(),
                returned: content.persist_key().clone(),
            });
        }
        Ok(Some(content))
    }

    /// Register an instance from [`Self::instantiate`]. The key must be free.
    pub(crate) fn adopt(&mut self, content: Box<dyn DockContent>) -> &mut dyn DockContent {
        let key = content.persist_key().clone();
        tracing::debug!(
            target: "dockwork.registry",
            %key,
            kind = ?content.kind(),
            "content created"
        );
        self.events
            .emit(DockEvent::ContentAdded { key: key.clone() });
        self.contents.entry(key).or_insert(content).as_mut()
    }

    /// Add externally created content, replacing (and disposing) any
    /// previous instance under the same key.
    pub fn register(&mut self, content: Box<dyn DockContent>) {
        let key = content.persist_key().clone();
        if let Some(mut previous) = self.contents.insert(key.clone(), content) {
            previous.dispose();
            self.events
                .emit(DockEvent::ContentRemoved { key: key.clone() });
        }
        self.events.emit(DockEvent::ContentAdded { key });
    }

    /// Whether `key` may be closed. Keys without an instance may.
    #[must_use]
    pub fn can_close(&self, key: &str) -> bool {
        self.get(key).is_none_or(|content| content.can_close())
    }

    /// Whether `key` may be pinned. Keys without an instance may.
    #[must_use]
    pub fn can_hide(&self, key: &str) -> bool {
        self.get(key).is_none_or(|content| content.can_hide())
    }

    /// Remove and (per policy) dispose `key`.
    ///
    /// Returns `false` without effect when the key has no instance or the
    /// content refuses to close.
    pub fn close(&mut self, key: &str) -> bool {
        if !self.can_close(key) {
            tracing::debug!(target: "dockwork.registry", key, "content refused close");
            return false;
        }
        let Some((key, mut content)) = self.contents.remove_entry(key) else {
            return false;
        };
        self.events
            .emit(DockEvent::ContentClosed { key: key.clone() });
        self.events
            .emit(DockEvent::ContentRemoved { key: key.clone() });
        let dispose = self.dispose_policy.disposes(content.kind());
        if dispose {
            content.dispose();
        }
        tracing::debug!(target: "dockwork.registry", %key, dispose, "content closed");
        true
    }

    /// Dispose and drop every instance without raising events.
    pub fn dispose_all(&mut self) {
        for (_, mut content) in std::mem::take(&mut self.contents) {
            content.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ViewHandle;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    struct Sample {
        key: PersistKey,
        kind: ContentKind,
        closeable: bool,
        disposed: Rc<Cell<u32>>,
    }

    impl DockContent for Sample {
        fn persist_key(&self) -> &PersistKey {
            &self.key
        }

        fn title(&self) -> &str {
            self.key.as_str()
        }

        fn view(&self) -> ViewHandle {
            ViewHandle(0)
        }

        fn kind(&self) -> ContentKind {
            self.kind
        }

        fn can_close(&self) -> bool {
            self.closeable
        }

        fn dispose(&mut self) {
            self.disposed.set(self.disposed.get() + 1);
        }
    }

    fn key(raw: &str) -> PersistKey {
        PersistKey::new(raw).expect("valid key")
    }

    fn registry(disposed: Rc<Cell<u32>>, events: DockEvents) -> ContentRegistry {
        let factory = move |requested: &PersistKey| -> Option<Box<dyn DockContent>> {
            let raw = requested.as_str();
            if raw.starts_with("Unknown") {
                return None;
            }
            let kind = if raw.starts_with("Tool") {
                ContentKind::ToolWindow
            } else {
                ContentKind::Document
            };
            let reported = if raw == "Liar" {
                key("Other")
            } else {
                requested.clone()
            };
            Some(Box::new(Sample {
                key: reported,
                kind,
                closeable: !raw.starts_with("Pinned"),
                disposed: Rc::clone(&disposed),
            }))
        };
        ContentRegistry::new(factory, DisposePolicy::default(), events)
    }

    #[test]
    fn ensure_creates_once_and_raises_added() {
        let events = DockEvents::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let _sub = events.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        let mut registry = registry(Rc::new(Cell::new(0)), events);

        let created = registry.ensure(&key("Doc:1")).expect("ensure ok");
        assert!(created.is_some());
        registry.ensure(&key("Doc:1")).expect("ensure ok");
        assert_eq!(registry.len(), 1);
        assert_eq!(
            log.borrow().as_slice(),
            &[DockEvent::ContentAdded { key: key("Doc:1") }]
        );
    }

    #[test]
    fn instantiate_stages_without_registering() {
        let events = DockEvents::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let _sub = events.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        let mut registry = registry(Rc::new(Cell::new(0)), events);

        let staged = registry
            .instantiate(&key("Tool:1"))
            .expect("instantiate ok")
            .expect("supported key");
        assert_eq!(staged.kind(), ContentKind::ToolWindow);
        assert!(!registry.contains("Tool:1"));
        assert!(log.borrow().is_empty());

        registry.adopt(staged);
        assert!(registry.contains("Tool:1"));
        assert_eq!(
            log.borrow().as_slice(),
            &[DockEvent::ContentAdded { key: key("Tool:1") }]
        );
    }

    #[test]
    fn unsupported_key_yields_none() {
        let mut registry = registry(Rc::new(Cell::new(0)), DockEvents::new());
        let created = registry.ensure(&key("Unknown:1")).expect("ensure ok");
        assert!(created.is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn factory_key_mismatch_is_fatal() {
        let mut registry = registry(Rc::new(Cell::new(0)), DockEvents::new());
        let err = registry
            .ensure(&key("Liar"))
            .expect_err("mismatched key must fail");
        assert!(matches!(
            err,
            DockError::FactoryKeyMismatch { ref requested, ref returned }
                if requested.as_str() == "Liar" && returned.as_str() == "Other"
        ));
        assert!(!registry.contains("Liar"));
        assert!(!registry.contains("Other"));
    }

    #[test]
    fn close_disposes_per_kind() {
        let disposed = Rc::new(Cell::new(0));
        let mut registry = registry(Rc::clone(&disposed), DockEvents::new());
        registry.ensure(&key("Doc:1")).expect("ensure ok");
        registry.ensure(&key("Tool:1")).expect("ensure ok");

        assert!(registry.close("Tool:1"));
        assert_eq!(disposed.get(), 0, "tool windows are kept alive by default");
        assert!(registry.close("Doc:1"));
        assert_eq!(disposed.get(), 1);
        assert!(!registry.close("Doc:1"), "second close is a no-op");
    }

    #[test]
    fn close_respects_can_close() {
        let events = DockEvents::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let _sub = events.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        let mut registry = registry(Rc::new(Cell::new(0)), events);
        registry.ensure(&key("Pinned:1")).expect("ensure ok");
        log.borrow_mut().clear();

        assert!(!registry.close("Pinned:1"));
        assert!(registry.contains("Pinned:1"));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn close_raises_closed_then_removed() {
        let events = DockEvents::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let _sub = events.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        let mut registry = registry(Rc::new(Cell::new(0)), events);
        registry.ensure(&key("Doc:1")).expect("ensure ok");
        log.borrow_mut().clear();

        assert!(registry.close("Doc:1"));
        assert_eq!(
            log.borrow().as_slice(),
            &[
                DockEvent::ContentClosed { key: key("Doc:1") },
                DockEvent::ContentRemoved { key: key("Doc:1") },
            ]
        );
    }

    #[test]
    fn dispose_all_empties_registry() {
        let disposed = Rc::new(Cell::new(0));
        let mut registry = registry(Rc::clone(&disposed), DockEvents::new());
        registry.ensure(&key("Doc:1")).expect("ensure ok");
        registry.ensure(&key("Tool:1")).expect("ensure ok");
        registry.dispose_all();
        assert!(registry.is_empty());
        assert_eq!(disposed.get(), 2);
    }
}
