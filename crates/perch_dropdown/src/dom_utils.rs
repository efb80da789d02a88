//! Element predicates and timing helpers

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use perch_core::{Document, FrameId, NodeId, Rect, Selector, TimerId};

/// Whether `node` is `container` or one of its descendants
pub fn is_within(doc: &Document, node: NodeId, container: NodeId) -> bool {
    doc.contains(container, node)
}

/// Whether `node` is inside any of the containers
pub fn is_within_any(doc: &Document, node: NodeId, containers: &[NodeId]) -> bool {
    containers.iter().any(|c| doc.contains(*c, node))
}

/// Whether `node` or one of its ancestors matches any of the selectors
pub fn is_within_selector(doc: &Document, node: NodeId, selectors: &[Selector]) -> bool {
    selectors
        .iter()
        .any(|selector| doc.closest(node, selector).is_some())
}

/// Whether focus is on `element` or one of its descendants
pub fn is_focused_within(doc: &Document, element: NodeId) -> bool {
    doc.active_element()
        .is_some_and(|focused| doc.contains(element, focused))
}

/// Whether the pointer is over `element` or one of its descendants
pub fn is_hovered(doc: &Document, element: NodeId) -> bool {
    doc.is_hovered(element)
}

/// Whether any part of the element is inside the viewport
///
/// Detached or unknown elements are never in the viewport.
pub fn is_in_viewport(doc: &Document, element: NodeId) -> bool {
    let Ok(rect) = doc.bounding_client_rect(element) else {
        return false;
    };
    let viewport = doc.viewport_size();
    rect.intersects(&Rect::new(0.0, 0.0, viewport.width, viewport.height))
}

/// Run a callback after the next animation frame
pub fn next_frame<F>(doc: &Document, callback: F) -> FrameId
where
    F: FnOnce() + 'static,
{
    doc.request_animation_frame(callback)
}

/// Coalesces bursts of calls into one callback after a quiet period
///
/// Each [`call`](Debouncer::call) restarts the delay. Clones share the pending
/// timer, so any clone can cancel it.
#[derive(Clone)]
pub struct Debouncer {
    doc: Document,
    delay_ms: u64,
    pending: Rc<Cell<Option<TimerId>>>,
}

impl Debouncer {
    pub fn new(doc: &Document, delay_ms: u64) -> Self {
        Self {
            doc: doc.clone(),
            delay_ms,
            pending: Rc::new(Cell::new(None)),
        }
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    /// Schedule `callback`, replacing whatever was pending
    pub fn call<F>(&self, callback: F)
    where
        F: FnOnce() + 'static,
    {
        self.cancel();
        let pending = Rc::clone(&self.pending);
        let id = self.doc.set_timeout(self.delay_ms, move || {
            pending.set(None);
            callback();
        });
        self.pending.set(Some(id));
    }

    /// Drop the pending call, returning whether one was pending
    pub fn cancel(&self) -> bool {
        match self.pending.take() {
            Some(id) => self.doc.clear_timeout(id),
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.get().is_some()
    }
}

impl fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay_ms", &self.delay_ms)
            .field("pending", &self.pending.get().is_some())
            .finish()
    }
}

/// A debounced callback
///
/// Calling [`trigger`](Debounced::trigger) repeatedly within `delay_ms` runs
/// the callback once, `delay_ms` after the last trigger.
#[derive(Clone)]
pub struct Debounced {
    debouncer: Debouncer,
    callback: Rc<dyn Fn()>,
}

impl Debounced {
    pub fn trigger(&self) {
        let callback = Rc::clone(&self.callback);
        self.debouncer.call(move || callback());
    }

    pub fn cancel(&self) -> bool {
        self.debouncer.cancel()
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }
}

impl fmt::Debug for Debounced {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Debounced").field(&self.debouncer).finish()
    }
}

/// Wrap a callback so bursts of triggers collapse into one call
pub fn debounce<F>(doc: &Document, delay_ms: u64, callback: F) -> Debounced
where
    F: Fn() + 'static,
{
    Debounced {
        debouncer: Debouncer::new(doc, delay_ms),
        callback: Rc::new(callback),
    }
}
