//! Event types and the listener registry
//!
//! Listeners are registered against an [`EventTarget`] and identified by a
//! [`ListenerId`] handle, so every owner removes exactly the listeners it added
//! and nothing else. Dispatch itself lives on [`Document`](crate::dom::Document)
//! because it needs the element tree to build the propagation path.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;

use crate::dom::NodeId;
use crate::geometry::Point;

new_key_type! {
    /// Handle to a registered listener
    pub struct ListenerId;
}

/// Event types understood by the document model
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Click,
    KeyDown,
    MouseEnter,
    MouseLeave,
    FocusIn,
    FocusOut,
    Scroll,
    Resize,
}

impl EventKind {
    /// DOM event name
    pub fn name(self) -> &'static str {
        match self {
            EventKind::Click => "click",
            EventKind::KeyDown => "keydown",
            EventKind::MouseEnter => "mouseenter",
            EventKind::MouseLeave => "mouseleave",
            EventKind::FocusIn => "focusin",
            EventKind::FocusOut => "focusout",
            EventKind::Scroll => "scroll",
            EventKind::Resize => "resize",
        }
    }

    /// Whether the event continues to ancestors after the target phase
    pub fn bubbles(self) -> bool {
        matches!(
            self,
            EventKind::Click | EventKind::KeyDown | EventKind::FocusIn | EventKind::FocusOut
        )
    }
}

/// Something listeners can be attached to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventTarget {
    Window,
    Document,
    Node(NodeId),
}

impl EventTarget {
    pub fn node(self) -> Option<NodeId> {
        match self {
            EventTarget::Node(node) => Some(node),
            _ => None,
        }
    }
}

impl From<NodeId> for EventTarget {
    fn from(node: NodeId) -> Self {
        EventTarget::Node(node)
    }
}

/// Keyboard key carried by `keydown`
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Key {
    Escape,
    Enter,
    Tab,
    ArrowUp,
    ArrowDown,
    Character(char),
    Named(String),
}

/// Propagation phase an event is currently in
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventPhase {
    Capturing,
    AtTarget,
    Bubbling,
}

/// A dispatched event
///
/// Listeners receive a shared reference; propagation and default handling are
/// controlled through interior flags, mirroring `stopPropagation()` and
/// `preventDefault()`.
#[derive(Debug)]
pub struct Event {
    kind: EventKind,
    target: EventTarget,
    related_target: Option<NodeId>,
    key: Option<Key>,
    point: Option<Point>,
    current_target: Cell<EventTarget>,
    phase: Cell<EventPhase>,
    propagation_stopped: Cell<bool>,
    default_prevented: Cell<bool>,
}

impl Event {
    pub fn new(kind: EventKind, target: impl Into<EventTarget>) -> Self {
        let target = target.into();
        Self {
            kind,
            target,
            related_target: None,
            key: None,
            point: None,
            current_target: Cell::new(target),
            phase: Cell::new(EventPhase::AtTarget),
            propagation_stopped: Cell::new(false),
            default_prevented: Cell::new(false),
        }
    }

    pub fn with_related_target(mut self, related: Option<NodeId>) -> Self {
        self.related_target = related;
        self
    }

    pub fn with_key(mut self, key: Key) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_point(mut self, point: Point) -> Self {
        self.point = Some(point);
        self
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn target(&self) -> EventTarget {
        self.target
    }

    /// The element the event was dispatched at, if it was dispatched at an element
    pub fn target_node(&self) -> Option<NodeId> {
        self.target.node()
    }

    /// For focus and hover events: the element focus/pointer came from or went to
    pub fn related_target(&self) -> Option<NodeId> {
        self.related_target
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    /// Client-space pointer position, for pointer-originated events
    pub fn point(&self) -> Option<Point> {
        self.point
    }

    /// The target whose listeners are currently running
    pub fn current_target(&self) -> EventTarget {
        self.current_target.get()
    }

    pub fn phase(&self) -> EventPhase {
        self.phase.get()
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }

    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    pub(crate) fn enter(&self, current: EventTarget, phase: EventPhase) {
        self.current_target.set(current);
        self.phase.set(phase);
    }
}

/// Registration options for a listener
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    /// Run during the capture phase instead of the bubble phase
    pub capture: bool,
}

impl ListenerOptions {
    pub const BUBBLE: ListenerOptions = ListenerOptions { capture: false };
    pub const CAPTURE: ListenerOptions = ListenerOptions { capture: true };
}

/// Listener callback
pub type EventCallback = Rc<dyn Fn(&Event)>;

struct ListenerEntry {
    target: EventTarget,
    kind: EventKind,
    capture: bool,
    callback: EventCallback,
}

/// Listeners grouped by target and event kind, in registration order
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    entries: SlotMap<ListenerId, ListenerEntry>,
    index: FxHashMap<(EventTarget, EventKind), SmallVec<[ListenerId; 4]>>,
}

impl ListenerRegistry {
    pub(crate) fn add(
        &mut self,
        target: EventTarget,
        kind: EventKind,
        options: ListenerOptions,
        callback: EventCallback,
    ) -> ListenerId {
        let id = self.entries.insert(ListenerEntry {
            target,
            kind,
            capture: options.capture,
            callback,
        });
        self.index.entry((target, kind)).or_default().push(id);
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let Some(entry) = self.entries.remove(id) else {
            return false;
        };
        let key = (entry.target, entry.kind);
        if let Some(ids) = self.index.get_mut(&key) {
            ids.retain(|existing| *existing != id);
            if ids.is_empty() {
                self.index.remove(&key);
            }
        }
        true
    }

    pub(crate) fn contains(&self, id: ListenerId) -> bool {
        self.entries.contains_key(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn count_on(&self, target: EventTarget) -> usize {
        self.entries.values().filter(|e| e.target == target).count()
    }

    /// Drop every listener attached to a target (used when nodes are destroyed)
    pub(crate) fn remove_target(&mut self, target: EventTarget) {
        let ids: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, e)| e.target == target)
            .map(|(id, _)| id)
            .collect();
        for id in ids {
            self.remove(id);
        }
    }

    /// Snapshot the callbacks that should run for a target during a phase
    ///
    /// At the target, capture listeners run before bubble listeners.
    pub(crate) fn collect(
        &self,
        target: EventTarget,
        kind: EventKind,
        phase: EventPhase,
    ) -> SmallVec<[(ListenerId, EventCallback); 4]> {
        let Some(ids) = self.index.get(&(target, kind)) else {
            return SmallVec::new();
        };
        let pick = |capture: bool| {
            ids.iter().filter_map(move |id| {
                let entry = self.entries.get(*id)?;
                (entry.capture == capture).then(|| (*id, Rc::clone(&entry.callback)))
            })
        };
        match phase {
            EventPhase::Capturing => pick(true).collect(),
            EventPhase::Bubbling => pick(false).collect(),
            EventPhase::AtTarget => pick(true).chain(pick(false)).collect(),
        }
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.entries.len())
            .finish()
    }
}
