//! Headless document model
//!
//! [`Document`] is the environment floating panels are positioned in: an
//! element tree with page-space layout rectangles, inline styles and classes,
//! a scrollable viewport, focus and hover tracking, an event dispatcher with
//! capture/target/bubble propagation, and a virtual-clock scheduler.
//!
//! # Architecture
//!
//! ```text
//! Embedder input (pointer moved, key pressed, viewport resized)
//!     ↓
//! Document (hit testing, hover/focus diffing)
//!     ↓
//! Event dispatch (window → document → ancestors → target → back up)
//!     ↓
//! Listener callbacks (may mutate the tree, add/remove listeners, schedule timers)
//! ```
//!
//! The handle is a cheap `Rc` clone. All internal borrows are released before
//! any callback runs, so callbacks may re-enter the document freely.
//!
//! # Example
//!
//! ```ignore
//! use perch_core::{Document, Rect, Size};
//!
//! let doc = Document::new(Size::new(800.0, 600.0));
//! let button = doc.create_element("button");
//! doc.append_child(doc.root(), button)?;
//! doc.set_layout(button, Rect::new(10.0, 500.0, 100.0, 30.0))?;
//!
//! doc.pointer_move(Point::new(20.0, 510.0));
//! assert!(doc.is_hovered(button));
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;

use crate::error::{DomError, Result};
use crate::events::{
    Event, EventKind, EventPhase, EventTarget, Key, ListenerId, ListenerOptions, ListenerRegistry,
};
use crate::geometry::{Point, Rect, Size};
use crate::scheduler::{FrameId, Scheduler, TimerId};
use crate::selector::{Selector, SelectorSubject};

new_key_type! {
    /// Identifier of an element in a [`Document`]
    pub struct NodeId;
}

/// Element data
#[derive(Clone, Debug, Default)]
struct Node {
    tag: String,
    id: Option<String>,
    classes: SmallVec<[String; 4]>,
    attributes: IndexMap<String, String>,
    style: IndexMap<String, String>,
    /// Border box in page coordinates
    layout: Rect,
    /// Establishes a containing block for absolutely positioned descendants
    positioned: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

struct DocumentState {
    nodes: SlotMap<NodeId, Node>,
    root: NodeId,
    viewport: Size,
    scroll: Point,
    focused: Option<NodeId>,
    /// Hovered element followed by its ancestors
    hovered: SmallVec<[NodeId; 8]>,
}

impl DocumentState {
    fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id).ok_or(DomError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(id).ok_or(DomError::NodeNotFound(id))
    }

    fn is_connected(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == self.root {
                return true;
            }
            cursor = self.nodes.get(current).and_then(|n| n.parent);
        }
        false
    }

    /// Inclusive ancestor check
    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.nodes.get(current).and_then(|n| n.parent);
        }
        false
    }

    /// The node and all of its ancestors, innermost first
    fn ancestry(&self, node: NodeId) -> SmallVec<[NodeId; 8]> {
        let mut chain = SmallVec::new();
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if !self.nodes.contains_key(current) {
                break;
            }
            chain.push(current);
            cursor = self.nodes[current].parent;
        }
        chain
    }

    /// Topmost connected element containing a page-space point
    ///
    /// Pre-order traversal: later siblings and descendants paint over earlier ones.
    fn hit_test(&self, page_point: Point) -> Option<NodeId> {
        let mut hit = None;
        let mut stack = vec![self.root];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            if node.layout.contains(page_point) {
                hit = Some(current);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        hit
    }
}

/// View of one element used by the selector matcher
#[derive(Clone, Copy)]
struct ElementRef<'a> {
    state: &'a DocumentState,
    node: &'a Node,
}

impl<'a> ElementRef<'a> {
    fn new(state: &'a DocumentState, id: NodeId) -> Option<Self> {
        state.nodes.get(id).map(|node| Self { state, node })
    }
}

impl SelectorSubject for ElementRef<'_> {
    fn tag_name(&self) -> &str {
        &self.node.tag
    }

    fn element_id(&self) -> Option<&str> {
        self.node.id.as_deref()
    }

    fn has_class(&self, class: &str) -> bool {
        self.node.classes.iter().any(|c| c == class)
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.node.attributes.get(name).map(String::as_str)
    }

    fn parent_element(&self) -> Option<Self> {
        ElementRef::new(self.state, self.node.parent?)
    }
}

struct DocumentInner {
    state: RefCell<DocumentState>,
    listeners: RefCell<ListenerRegistry>,
    scheduler: RefCell<Scheduler>,
}

/// Shared handle to a document
#[derive(Clone)]
pub struct Document {
    inner: Rc<DocumentInner>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Document")
            .field("nodes", &state.nodes.len())
            .field("viewport", &state.viewport)
            .field("scroll", &state.scroll)
            .field("listeners", &self.inner.listeners.borrow().len())
            .field("now_ms", &self.inner.scheduler.borrow().now())
            .finish()
    }
}

impl Document {
    /// Create a document whose root (`body`) spans the given viewport
    pub fn new(viewport: Size) -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node {
            tag: "body".to_string(),
            layout: Rect::from_origin_size(Point::ZERO, viewport),
            ..Node::default()
        });
        Self {
            inner: Rc::new(DocumentInner {
                state: RefCell::new(DocumentState {
                    nodes,
                    root,
                    viewport,
                    scroll: Point::ZERO,
                    focused: None,
                    hovered: SmallVec::new(),
                }),
                listeners: RefCell::new(ListenerRegistry::default()),
                scheduler: RefCell::new(Scheduler::default()),
            }),
        }
    }

    /// Whether two handles refer to the same document
    pub fn ptr_eq(&self, other: &Document) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn root(&self) -> NodeId {
        self.inner.state.borrow().root
    }

    // =========================================================================
    // Tree
    // =========================================================================

    /// Create a detached element
    pub fn create_element(&self, tag: &str) -> NodeId {
        self.inner.state.borrow_mut().nodes.insert(Node {
            tag: tag.to_ascii_lowercase(),
            ..Node::default()
        })
    }

    /// Append `child` as the last child of `parent`, moving it if already attached
    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<()> {
        let mut state = self.inner.state.borrow_mut();
        state.node(parent)?;
        state.node(child)?;
        if state.contains(child, parent) {
            return Err(DomError::HierarchyCycle { parent, child });
        }
        if let Some(old_parent) = state.nodes[child].parent.take() {
            if let Some(old) = state.nodes.get_mut(old_parent) {
                old.children.retain(|c| *c != child);
            }
        }
        state.nodes[child].parent = Some(parent);
        state.nodes[parent].children.push(child);
        Ok(())
    }

    /// Detach an element (and its subtree) from its parent
    ///
    /// Focus and hover inside the removed subtree are dropped without events.
    pub fn remove(&self, node: NodeId) -> Result<()> {
        let mut state = self.inner.state.borrow_mut();
        let parent = state.node_mut(node)?.parent.take();
        if let Some(parent) = parent {
            if let Some(p) = state.nodes.get_mut(parent) {
                p.children.retain(|c| *c != node);
            }
        }
        if state.focused.is_some_and(|f| state.contains(node, f)) {
            state.focused = None;
        }
        let hovered: SmallVec<[NodeId; 8]> = state
            .hovered
            .iter()
            .filter(|h| !state.contains(node, **h))
            .copied()
            .collect();
        state.hovered = hovered;
        Ok(())
    }

    /// Remove an element and its subtree from the document entirely
    ///
    /// Listeners attached to the destroyed elements are dropped too.
    pub fn destroy_element(&self, node: NodeId) -> Result<()> {
        self.remove(node)?;
        let destroyed = {
            let mut state = self.inner.state.borrow_mut();
            let mut destroyed = Vec::new();
            let mut stack = vec![node];
            while let Some(current) = stack.pop() {
                if let Some(removed) = state.nodes.remove(current) {
                    stack.extend(removed.children);
                    destroyed.push(current);
                }
            }
            destroyed
        };
        tracing::debug!("destroyed {} element(s) under {:?}", destroyed.len(), node);
        let mut listeners = self.inner.listeners.borrow_mut();
        for id in destroyed {
            listeners.remove_target(EventTarget::Node(id));
        }
        Ok(())
    }

    pub fn exists(&self, node: NodeId) -> bool {
        self.inner.state.borrow().nodes.contains_key(node)
    }

    /// Whether the element is attached under the document root
    pub fn is_connected(&self, node: NodeId) -> bool {
        self.inner.state.borrow().is_connected(node)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.inner.state.borrow().nodes.get(node).and_then(|n| n.parent)
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.inner
            .state
            .borrow()
            .nodes
            .get(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Inclusive containment: an element contains itself
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.inner.state.borrow().contains(ancestor, node)
    }

    pub fn tag_name(&self, node: NodeId) -> Option<String> {
        self.inner.state.borrow().nodes.get(node).map(|n| n.tag.clone())
    }

    // =========================================================================
    // Attributes, classes, styles
    // =========================================================================

    pub fn set_id(&self, node: NodeId, id: &str) -> Result<()> {
        self.inner.state.borrow_mut().node_mut(node)?.id = Some(id.to_string());
        Ok(())
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<()> {
        self.inner
            .state
            .borrow_mut()
            .node_mut(node)?
            .attributes
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        let state = self.inner.state.borrow();
        state.nodes.get(node)?.attributes.get(name).cloned()
    }

    pub fn add_class(&self, node: NodeId, class: &str) -> Result<()> {
        let mut state = self.inner.state.borrow_mut();
        let node = state.node_mut(node)?;
        if !node.classes.iter().any(|c| c == class) {
            node.classes.push(class.to_string());
        }
        Ok(())
    }

    pub fn remove_class(&self, node: NodeId, class: &str) -> Result<()> {
        self.inner
            .state
            .borrow_mut()
            .node_mut(node)?
            .classes
            .retain(|c| c != class);
        Ok(())
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        let state = self.inner.state.borrow();
        state
            .nodes
            .get(node)
            .is_some_and(|n| n.classes.iter().any(|c| c == class))
    }

    pub fn classes(&self, node: NodeId) -> Vec<String> {
        let state = self.inner.state.borrow();
        state
            .nodes
            .get(node)
            .map(|n| n.classes.to_vec())
            .unwrap_or_default()
    }

    /// Set an inline style property
    pub fn set_style(&self, node: NodeId, property: &str, value: &str) -> Result<()> {
        self.inner
            .state
            .borrow_mut()
            .node_mut(node)?
            .style
            .insert(property.to_string(), value.to_string());
        Ok(())
    }

    /// Remove an inline style property, returning whether it was set
    pub fn remove_style(&self, node: NodeId, property: &str) -> Result<bool> {
        Ok(self
            .inner
            .state
            .borrow_mut()
            .node_mut(node)?
            .style
            .shift_remove(property)
            .is_some())
    }

    pub fn style(&self, node: NodeId, property: &str) -> Option<String> {
        let state = self.inner.state.borrow();
        state.nodes.get(node)?.style.get(property).cloned()
    }

    /// All inline style properties in insertion order
    pub fn styles(&self, node: NodeId) -> Vec<(String, String)> {
        let state = self.inner.state.borrow();
        state
            .nodes
            .get(node)
            .map(|n| {
                n.style
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Check an element against a selector
    pub fn matches(&self, node: NodeId, selector: &Selector) -> bool {
        let state = self.inner.state.borrow();
        ElementRef::new(&state, node).is_some_and(|el| selector.matches(&el))
    }

    /// Nearest inclusive ancestor matching a selector
    pub fn closest(&self, node: NodeId, selector: &Selector) -> Option<NodeId> {
        let state = self.inner.state.borrow();
        state.ancestry(node).into_iter().find(|candidate| {
            ElementRef::new(&state, *candidate).is_some_and(|el| selector.matches(&el))
        })
    }

    // =========================================================================
    // Layout
    // =========================================================================

    /// Set the element's border box in page coordinates
    pub fn set_layout(&self, node: NodeId, rect: Rect) -> Result<()> {
        self.inner.state.borrow_mut().node_mut(node)?.layout = rect;
        Ok(())
    }

    pub fn layout(&self, node: NodeId) -> Result<Rect> {
        Ok(self.inner.state.borrow().node(node)?.layout)
    }

    /// Mark an element as a containing block for absolutely positioned descendants
    pub fn set_positioned(&self, node: NodeId, positioned: bool) -> Result<()> {
        self.inner.state.borrow_mut().node_mut(node)?.positioned = positioned;
        Ok(())
    }

    /// Border box relative to the viewport
    pub fn bounding_client_rect(&self, node: NodeId) -> Result<Rect> {
        let state = self.inner.state.borrow();
        let layout = state.node(node)?.layout;
        if !state.is_connected(node) {
            return Err(DomError::Detached(node));
        }
        Ok(layout.offset(-state.scroll.x, -state.scroll.y))
    }

    /// Nearest positioned ancestor, or `None` for the initial containing block
    pub fn offset_parent(&self, node: NodeId) -> Option<NodeId> {
        let state = self.inner.state.borrow();
        state
            .ancestry(node)
            .into_iter()
            .skip(1)
            .find(|ancestor| state.nodes[*ancestor].positioned)
    }

    pub fn viewport_size(&self) -> Size {
        self.inner.state.borrow().viewport
    }

    /// Resize the viewport and dispatch `resize` at the window
    pub fn set_viewport_size(&self, size: Size) {
        {
            let mut state = self.inner.state.borrow_mut();
            state.viewport = size;
            let root = state.root;
            state.nodes[root].layout.size = size;
        }
        self.dispatch_event(Event::new(EventKind::Resize, EventTarget::Window));
    }

    pub fn scroll_offset(&self) -> Point {
        self.inner.state.borrow().scroll
    }

    /// Scroll the window to a page offset and dispatch `scroll` at the window
    pub fn scroll_to(&self, offset: Point) {
        self.inner.state.borrow_mut().scroll = offset;
        self.dispatch_event(Event::new(EventKind::Scroll, EventTarget::Window));
    }

    // =========================================================================
    // Focus
    // =========================================================================

    pub fn active_element(&self) -> Option<NodeId> {
        self.inner.state.borrow().focused
    }

    /// Move focus to an element
    ///
    /// Emits `focusout` on the previously focused element (related target: the
    /// new one), then `focusin` on the new element (related target: the old one).
    pub fn focus(&self, node: NodeId) -> Result<()> {
        let previous = {
            let state = self.inner.state.borrow();
            state.node(node)?;
            if !state.is_connected(node) {
                return Err(DomError::Detached(node));
            }
            if state.focused == Some(node) {
                return Ok(());
            }
            state.focused
        };

        if let Some(previous) = previous {
            self.inner.state.borrow_mut().focused = None;
            self.dispatch_event(
                Event::new(EventKind::FocusOut, previous).with_related_target(Some(node)),
            );
        }
        self.inner.state.borrow_mut().focused = Some(node);
        self.dispatch_event(Event::new(EventKind::FocusIn, node).with_related_target(previous));
        Ok(())
    }

    /// Clear focus, emitting `focusout` on the focused element
    pub fn blur(&self) {
        let previous = self.inner.state.borrow_mut().focused.take();
        if let Some(previous) = previous {
            self.dispatch_event(Event::new(EventKind::FocusOut, previous));
        }
    }

    // =========================================================================
    // Pointer and keyboard
    // =========================================================================

    /// Topmost element under a client-space point
    pub fn hit_test(&self, point: Point) -> Option<NodeId> {
        let state = self.inner.state.borrow();
        state.hit_test(Point::new(point.x + state.scroll.x, point.y + state.scroll.y))
    }

    /// Move the pointer to a client-space point, updating hover state
    pub fn pointer_move(&self, point: Point) {
        let target = self.hit_test(point);
        self.set_hovered(target);
    }

    /// Put the pointer over an element (or nowhere)
    ///
    /// Emits non-bubbling `mouseleave` on every element the pointer left
    /// (innermost first) and `mouseenter` on every element it entered
    /// (outermost first).
    pub fn set_hovered(&self, target: Option<NodeId>) {
        let (left, entered, previous) = {
            let mut state = self.inner.state.borrow_mut();
            let next: SmallVec<[NodeId; 8]> = match target {
                Some(node) if state.is_connected(node) => state.ancestry(node),
                _ => SmallVec::new(),
            };
            let previous = state.hovered.first().copied();
            let left: Vec<_> = state
                .hovered
                .iter()
                .filter(|n| !next.contains(n))
                .copied()
                .collect();
            let entered: Vec<_> = next
                .iter()
                .rev()
                .filter(|n| !state.hovered.contains(n))
                .copied()
                .collect();
            state.hovered = next;
            (left, entered, previous)
        };

        for node in left {
            self.dispatch_event(Event::new(EventKind::MouseLeave, node).with_related_target(target));
        }
        for node in entered {
            self.dispatch_event(
                Event::new(EventKind::MouseEnter, node).with_related_target(previous),
            );
        }
    }

    /// Whether the pointer is over the element or one of its descendants
    pub fn is_hovered(&self, node: NodeId) -> bool {
        self.inner.state.borrow().hovered.contains(&node)
    }

    /// Innermost hovered element
    pub fn hovered_element(&self) -> Option<NodeId> {
        self.inner.state.borrow().hovered.first().copied()
    }

    /// Dispatch a click at an element; returns false if a listener prevented default
    pub fn click(&self, node: NodeId) -> bool {
        self.dispatch_event(Event::new(EventKind::Click, node))
    }

    /// Click at a client-space point; empty space targets the document
    pub fn click_at(&self, point: Point) -> bool {
        let target = self
            .hit_test(point)
            .map(EventTarget::Node)
            .unwrap_or(EventTarget::Document);
        self.dispatch_event(Event::new(EventKind::Click, target).with_point(point))
    }

    /// Dispatch `keydown` at the focused element, or the document when nothing has focus
    pub fn key_down(&self, key: Key) -> bool {
        let target = self
            .active_element()
            .map(EventTarget::Node)
            .unwrap_or(EventTarget::Document);
        self.dispatch_event(Event::new(EventKind::KeyDown, target).with_key(key))
    }

    // =========================================================================
    // Listeners and dispatch
    // =========================================================================

    pub fn add_event_listener<F>(
        &self,
        target: EventTarget,
        kind: EventKind,
        options: ListenerOptions,
        callback: F,
    ) -> ListenerId
    where
        F: Fn(&Event) + 'static,
    {
        self.inner
            .listeners
            .borrow_mut()
            .add(target, kind, options, Rc::new(callback))
    }

    /// Remove a listener by handle; returns false if it was already gone
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.borrow_mut().remove(id)
    }

    pub fn has_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.borrow().contains(id)
    }

    /// Total number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    /// Number of listeners registered on one target
    pub fn listener_count_on(&self, target: EventTarget) -> usize {
        self.inner.listeners.borrow().count_on(target)
    }

    /// Dispatch an event along its propagation path
    ///
    /// Returns false if any listener called `prevent_default`.
    pub fn dispatch_event(&self, event: Event) -> bool {
        let path = self.propagation_path(event.target());
        tracing::trace!(
            "dispatch {} at {:?} (path length {})",
            event.kind().name(),
            event.target(),
            path.len()
        );
        let Some((&target, ancestors)) = path.split_last() else {
            return true;
        };

        for &current in ancestors {
            if event.is_propagation_stopped() {
                break;
            }
            self.invoke_listeners(current, &event, EventPhase::Capturing);
        }
        if !event.is_propagation_stopped() {
            self.invoke_listeners(target, &event, EventPhase::AtTarget);
        }
        if event.kind().bubbles() {
            for &current in ancestors.iter().rev() {
                if event.is_propagation_stopped() {
                    break;
                }
                self.invoke_listeners(current, &event, EventPhase::Bubbling);
            }
        }
        !event.is_default_prevented()
    }

    /// Outermost first, ending at the target
    fn propagation_path(&self, target: EventTarget) -> SmallVec<[EventTarget; 10]> {
        let mut path = SmallVec::new();
        match target {
            EventTarget::Window => path.push(EventTarget::Window),
            EventTarget::Document => {
                path.push(EventTarget::Window);
                path.push(EventTarget::Document);
            }
            EventTarget::Node(node) => {
                let state = self.inner.state.borrow();
                if state.is_connected(node) {
                    path.push(EventTarget::Window);
                    path.push(EventTarget::Document);
                }
                path.extend(state.ancestry(node).into_iter().rev().map(EventTarget::Node));
            }
        }
        path
    }

    fn invoke_listeners(&self, current: EventTarget, event: &Event, phase: EventPhase) {
        let callbacks = self
            .inner
            .listeners
            .borrow()
            .collect(current, event.kind(), phase);
        if callbacks.is_empty() {
            return;
        }
        event.enter(current, phase);
        for (id, callback) in callbacks {
            // A listener removed by an earlier one in the same batch must not run
            if !self.inner.listeners.borrow().contains(id) {
                continue;
            }
            callback(event);
        }
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    /// Current virtual time in milliseconds
    pub fn now(&self) -> u64 {
        self.inner.scheduler.borrow().now()
    }

    pub fn set_timeout<F>(&self, delay_ms: u64, callback: F) -> TimerId
    where
        F: FnOnce() + 'static,
    {
        self.inner
            .scheduler
            .borrow_mut()
            .set_timeout(delay_ms, Box::new(callback))
    }

    /// Cancel a timeout; returns false if it already fired or was cleared
    pub fn clear_timeout(&self, id: TimerId) -> bool {
        self.inner.scheduler.borrow_mut().clear_timeout(id)
    }

    pub fn request_animation_frame<F>(&self, callback: F) -> FrameId
    where
        F: FnOnce() + 'static,
    {
        self.inner
            .scheduler
            .borrow_mut()
            .request_frame(Box::new(callback))
    }

    pub fn cancel_animation_frame(&self, id: FrameId) -> bool {
        self.inner.scheduler.borrow_mut().cancel_frame(id)
    }

    pub fn pending_timers(&self) -> usize {
        self.inner.scheduler.borrow().pending_timers()
    }

    pub fn pending_frames(&self) -> usize {
        self.inner.scheduler.borrow().pending_frames()
    }

    /// Run the animation-frame callbacks queued before this call
    ///
    /// Frames requested by these callbacks wait for the next flush.
    pub fn flush_frames(&self) {
        let queued = self.inner.scheduler.borrow().queued_frames();
        for id in queued {
            let callback = self.inner.scheduler.borrow_mut().take_frame(id);
            if let Some(callback) = callback {
                callback();
            }
        }
    }

    /// Paint a frame, then move the clock forward, firing due timeouts in order
    pub fn advance(&self, ms: u64) {
        self.flush_frames();
        let until = self.now().saturating_add(ms);
        loop {
            let next = self.inner.scheduler.borrow().next_due(until);
            let Some(id) = next else {
                break;
            };
            let taken = self.inner.scheduler.borrow_mut().take_timer(id);
            if let Some((due_ms, callback)) = taken {
                self.inner.scheduler.borrow_mut().set_now(due_ms);
                callback();
            }
        }
        self.inner.scheduler.borrow_mut().set_now(until);
    }
}
