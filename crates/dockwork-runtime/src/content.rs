//! Contract between the dock manager and hosted content.
//!
//! The manager never inspects content beyond this trait: the kind is
//! declared by the content, the view is an opaque handle the render layer
//! resolves, and state is an opaque string stored in the layout.

use std::fmt;

use dockwork_layout::{ContentKind, PersistKey};

/// Opaque platform view handle owned by the render layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewHandle(pub u64);

/// Failure reported by [`DockContent::save_state`] or
/// [`DockContent::load_state`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentStateError {
    message: String,
}

impl ContentStateError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ContentStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "content state error: {}", self.message)
    }
}

impl std::error::Error for ContentStateError {}

/// A piece of dockable content.
pub trait DockContent {
    /// Stable identity; must never change for the life of the instance.
    fn persist_key(&self) -> &PersistKey;

    fn title(&self) -> &str;

    fn view(&self) -> ViewHandle;

    fn kind(&self) -> ContentKind;

    fn can_close(&self) -> bool {
        true
    }

    /// Whether the content may be pinned to an auto-hide strip.
    fn can_hide(&self) -> bool {
        true
    }

    fn save_state(&self) -> Result<Option<String>, ContentStateError> {
        Ok(None)
    }

    fn load_state(&mut self, _state: Option<&str>) -> Result<(), ContentStateError> {
        Ok(())
    }

    /// Release resources. Called at most once, after removal.
    fn dispose(&mut self) {}
}

impl fmt::Debug for dyn DockContent + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DockContent")
            .field("persist_key", self.persist_key())
            .field("kind", &self.kind())
            .finish_non_exhaustive()
    }
}

/// Creates content on demand.
///
/// `None` means the key is not supported. Returned content must report the
/// requested key.
pub trait ContentFactory {
    fn create(&mut self, key: &PersistKey) -> Option<Box<dyn DockContent>>;
}

impl<F> ContentFactory for F
where
    F: FnMut(&PersistKey) -> Option<Box<dyn DockContent>>,
{
    fn create(&mut self, key: &PersistKey) -> Option<Box<dyn DockContent>> {
        self(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain {
        key: PersistKey,
    }

    impl DockContent for Plain {
        fn persist_key(&self) -> &PersistKey {
            &self.key
        }

        fn title(&self) -> &str {
            self.key.as_str()
        }

        fn view(&self) -> ViewHandle {
            ViewHandle(7)
        }

        fn kind(&self) -> ContentKind {
            ContentKind::Document
        }
    }

    #[test]
    fn closures_act_as_factories() {
        let mut calls = 0;
        let mut factory = |key: &PersistKey| -> Option<Box<dyn DockContent>> {
            calls += 1;
            Some(Box::new(Plain { key: key.clone() }))
        };
        let key = PersistKey::new("Doc:1").expect("valid key");
        let content = factory.create(&key).expect("factory supports key");
        assert_eq!(content.persist_key(), &key);
        drop(factory);
        assert_eq!(calls, 1);
    }

    #[test]
    fn default_contract_is_permissive() {
        let mut content = Plain {
            key: PersistKey::new("Doc:1").expect("valid key"),
        };
        assert!(content.can_close());
        assert!(content.can_hide());
        assert_eq!(content.save_state(), Ok(None));
        assert_eq!(content.load_state(Some("x")), Ok(()));
        assert_eq!(content.view(), ViewHandle(7));
        assert!(format!("{:?}", &content as &dyn DockContent).contains("Doc:1"));
    }
}
