//! Suppressible notification hub for dock state changes.
//!
//! # Design
//!
//! [`DockEvents`] is a cheap, clonable handle over shared
//! `Rc<RefCell<..>>` state. Subscribers are held weakly; the returned
//! [`Subscription`] guard owns the callback, so dropping the guard
//! unsubscribes. Dead entries are pruned on the next dispatch.
//!
//! # Suppression
//!
//! [`DockEvents::suppress`] returns a nestable [`SuppressionScope`]. While
//! any scope is alive, events are queued instead of delivered:
//!
//! - content events (added / removed / closed) queue in order;
//! - active-content changes merge into one, keeping the first `previous`
//!   and the last `current`, and vanish when the two are equal;
//! - layout changes merge into one carrying the latest reason.
//!
//! Dropping the outermost scope flushes the queue in that order.
//!
//! # Failure Modes
//!
//! - **Re-entrant emit**: a callback may emit again; the borrow is released
//!   before callbacks run, so the nested event is delivered immediately
//!   (or queued if a scope is active).

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use dockwork_layout::PersistKey;

/// Why the layout changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutChangeReason {
    Dock,
    Close,
    Pin,
    Unpin,
    AutoHidePopup,
    SplitRatio,
    ApplyLayout,
    Load,
}

/// Notification delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockEvent {
    LayoutChanged {
        reason: LayoutChangeReason,
    },
    ActiveContentChanged {
        previous: Option<PersistKey>,
        current: Option<PersistKey>,
    },
    ContentAdded {
        key: PersistKey,
    },
    ContentRemoved {
        key: PersistKey,
    },
    ContentClosed {
        key: PersistKey,
    },
}

type CallbackRc = Rc<dyn Fn(&DockEvent)>;
type CallbackWeak = Weak<dyn Fn(&DockEvent)>;

#[derive(Default)]
struct Pending {
    content: Vec<DockEvent>,
    active: Option<(Option<PersistKey>, Option<PersistKey>)>,
    layout: Option<LayoutChangeReason>,
}

impl Pending {
    fn push(&mut self, event: DockEvent) {
        match event {
            DockEvent::LayoutChanged { reason } => self.layout = Some(reason),
            DockEvent::ActiveContentChanged { previous, current } => {
                let first = match self.active.take() {
                    Some((first, _)) => first,
                    None => previous,
                };
                self.active = Some((first, current));
            }
            other => self.content.push(other),
        }
    }

    fn drain(&mut self) -> Vec<DockEvent> {
        let mut out = std::mem::take(&mut self.content);
        if let Some((previous, current)) = self.active.take()
            && previous != current
        {
            out.push(DockEvent::ActiveContentChanged { previous, current });
        }
        if let Some(reason) = self.layout.take() {
            out.push(DockEvent::LayoutChanged { reason });
        }
        out
    }
}

#[derive(Default)]
struct EventsInner {
    subscribers: Vec<CallbackWeak>,
    suppress_depth: u32,
    pending: Pending,
}

/// Shared event hub.
///
/// Cloning creates another handle to the same subscribers and suppression
/// state.
#[derive(Clone, Default)]
pub struct DockEvents {
    inner: Rc<RefCell<EventsInner>>,
}

impl fmt::Debug for DockEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("DockEvents")
            .field("subscriber_count", &inner.subscribers.len())
            .field("suppress_depth", &inner.suppress_depth)
            .finish()
    }
}

impl DockEvents {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback`. It stays registered while the guard lives.
    pub fn subscribe(&self, callback: impl Fn(&DockEvent) + 'static) -> Subscription {
        let strong: CallbackRc = Rc::new(callback);
        self.inner
            .borrow_mut()
            .subscribers
            .push(Rc::downgrade(&strong));
        Subscription {
            _guard: Box::new(strong),
        }
    }

    /// Registered subscribers, including dropped ones not yet pruned.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    #[must_use]
    pub fn is_suppressed(&self) -> bool {
        self.inner.borrow().suppress_depth > 0
    }

    /// Deliver `event` now, or queue it while suppressed.
    pub fn emit(&self, event: DockEvent) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.suppress_depth > 0 {
                inner.pending.push(event);
                return;
            }
        }
        self.dispatch(&[event]);
    }

    /// Queue events until the returned scope (and every enclosing one) is
    /// dropped.
    #[must_use = "events resume as soon as the scope is dropped"]
    pub fn suppress(&self) -> SuppressionScope {
        self.inner.borrow_mut().suppress_depth += 1;
        SuppressionScope {
            events: self.clone(),
        }
    }

    fn release(&self) {
        let flushed = {
            let mut inner = self.inner.borrow_mut();
            inner.suppress_depth = inner.suppress_depth.saturating_sub(1);
            if inner.suppress_depth > 0 {
                return;
            }
            inner.pending.drain()
        };
        if flushed.is_empty() {
            return;
        }
        tracing::trace!(
            target: "dockwork.events",
            count = flushed.len(),
            "flushing suppressed dock events"
        );
        self.dispatch(&flushed);
    }

    fn dispatch(&self, events: &[DockEvent]) {
        let callbacks: Vec<CallbackRc> = {
            let mut inner = self.inner.borrow_mut();
            inner.subscribers.retain(|weak| weak.strong_count() > 0);
            inner.subscribers.iter().filter_map(Weak::upgrade).collect()
        };
        for event in events {
            tracing::trace!(target: "dockwork.events", ?event, "dock event");
            for callback in &callbacks {
                callback(event);
            }
        }
    }
}

/// RAII guard for a subscriber callback.
pub struct Subscription {
    _guard: Box<dyn std::any::Any>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// RAII guard returned by [`DockEvents::suppress`].
pub struct SuppressionScope {
    events: DockEvents,
}

impl fmt::Debug for SuppressionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuppressionScope").finish_non_exhaustive()
    }
}

impl Drop for SuppressionScope {
    fn drop(&mut self) {
        self.events.release();
    }
}
