//! Dropdown interaction controller
//!
//! Owns the open/closed state of one trigger/panel pair, binds the trigger
//! listeners for the configured mode, positions the panel, and attaches the
//! document and window listeners that exist only while the panel is open.
//!
//! # State Machine
//!
//! ```text
//!            open()                    next frame
//! Closed ──[before-open]──► Open ──────────────────► position, listeners, [open]
//!   ▲                        │
//!   └──────[before-close]────┘ close(): detach listeners, clear timers, reset styles, [close]
//! ```
//!
//! # Listener ownership
//!
//! | Set            | Target              | Lifetime                                   |
//! |----------------|---------------------|--------------------------------------------|
//! | trigger        | trigger (and panel) | connected with elements set, mode != manual |
//! | open-state     | document, window    | Open only                                  |
//!
//! Every listener is registered through its [`ListenerId`] and removed by it.
//! Closures hold a weak reference to the controller, so a listener that
//! outlives a dropped controller does nothing.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use perch_core::{
    Document, Edges, Event, EventKind, EventTarget, FrameId, Key, ListenerId, ListenerOptions,
    NodeId, Selector, TimerId,
};
use smallvec::SmallVec;

use crate::config::{
    ConfigPatch, DropdownConfig, PositionProcessor, PositioningMode, ScrollBehavior, TriggerMode,
    FOCUS_CLOSE_DELAY_MS, HOVER_CLOSE_DELAY_MS, RESIZE_DEBOUNCE_MS, SCROLL_DEBOUNCE_MS,
};
use crate::dom_utils::{
    debounce, is_focused_within, is_hovered, is_in_viewport, is_within_any, is_within_selector,
    next_frame, Debounced,
};
use crate::error::{PositionError, Result};
use crate::events::{DropdownEvent, DropdownEventKind};
use crate::geometry::{calculate_available_space, calculate_complete_position, Position, PositionOptions};
use crate::host::{Host, HostController};
use crate::styles::{self, PanelStyle};

struct State {
    config: DropdownConfig,
    /// Parsed `config.exclude_selectors`; invalid entries are dropped with a warning
    excludes: Vec<Selector>,
    is_open: bool,
    connected: bool,
    destroyed: bool,
    trigger: Option<NodeId>,
    panel: Option<NodeId>,
    position: Option<Position>,
    trigger_listeners: SmallVec<[ListenerId; 4]>,
    open_listeners: SmallVec<[ListenerId; 4]>,
    hover_open_timer: Option<TimerId>,
    hover_close_timer: Option<TimerId>,
    focus_close_timer: Option<TimerId>,
    open_frame: Option<FrameId>,
    debounced: SmallVec<[Debounced; 2]>,
}

fn parse_excludes(selectors: &[String]) -> Vec<Selector> {
    selectors
        .iter()
        .filter_map(|source| match Selector::parse(source) {
            Ok(selector) => Some(selector),
            Err(err) => {
                tracing::warn!("ignoring exclude selector: {}", err);
                None
            }
        })
        .collect()
}

fn cancel_timer(doc: &Document, slot: &mut Option<TimerId>) {
    if let Some(id) = slot.take() {
        doc.clear_timeout(id);
    }
}

/// Cancel every pending timer, frame and debounce owned by the controller
fn clear_timers(doc: &Document, state: &mut State) {
    cancel_timer(doc, &mut state.hover_open_timer);
    cancel_timer(doc, &mut state.hover_close_timer);
    cancel_timer(doc, &mut state.focus_close_timer);
    if let Some(frame) = state.open_frame.take() {
        doc.cancel_animation_frame(frame);
    }
    for debounced in state.debounced.drain(..) {
        debounced.cancel();
    }
}

struct Shared {
    doc: Document,
    host: Weak<dyn Host>,
    state: RefCell<State>,
}

impl Shared {
    fn host(&self) -> Option<Rc<dyn Host>> {
        self.host.upgrade()
    }

    fn request_update(&self) {
        if let Some(host) = self.host() {
            host.request_update();
        }
    }

    /// Dispatch to the host; false if a cancelable event was cancelled
    fn emit(&self, event: DropdownEvent) -> bool {
        let Some(host) = self.host() else {
            return true;
        };
        let delivered = host.dispatch_event(&event);
        !(event.cancelable() && (!delivered || event.is_default_prevented()))
    }

    /// Register a listener whose handler runs only while the controller is alive
    fn listen<F>(
        self: &Rc<Self>,
        target: EventTarget,
        kind: EventKind,
        options: ListenerOptions,
        handler: F,
    ) -> ListenerId
    where
        F: Fn(&Rc<Shared>, &Event) + 'static,
    {
        let weak = Rc::downgrade(self);
        self.doc
            .add_event_listener(target, kind, options, move |event| {
                if let Some(shared) = weak.upgrade() {
                    handler(&shared, event);
                }
            })
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    fn open(self: &Rc<Self>) {
        {
            let state = self.state.borrow();
            if state.is_open || state.destroyed {
                return;
            }
            if state.config.disabled {
                tracing::debug!("dropdown open refused: disabled");
                return;
            }
        }
        if self.host().is_some_and(|host| host.is_disabled()) {
            tracing::debug!("dropdown open refused: host disabled");
            return;
        }
        if !self.emit(DropdownEvent::new(DropdownEventKind::BeforeOpen)) {
            tracing::debug!("dropdown open cancelled");
            return;
        }

        {
            let mut state = self.state.borrow_mut();
            // A before-open listener may have opened or destroyed us already
            if state.is_open || state.destroyed {
                return;
            }
            state.is_open = true;
            clear_timers(&self.doc, &mut state);
            let weak = Rc::downgrade(self);
            state.open_frame = Some(next_frame(&self.doc, move || {
                if let Some(shared) = weak.upgrade() {
                    shared.finish_open();
                }
            }));
        }
        tracing::debug!("dropdown opened");
        self.request_update();
    }

    /// Runs one frame after `open`, once the panel has been rendered
    fn finish_open(self: &Rc<Self>) {
        {
            let mut state = self.state.borrow_mut();
            state.open_frame = None;
            if !state.is_open {
                return;
            }
        }
        self.reposition();
        self.attach_open_listeners();

        let position = self.state.borrow().position;
        let event = match position {
            Some(position) => DropdownEvent::new(DropdownEventKind::Open).with_detail(position),
            None => DropdownEvent::new(DropdownEventKind::Open),
        };
        self.emit(event);
    }

    fn close(&self) {
        if !self.state.borrow().is_open {
            return;
        }
        if !self.emit(DropdownEvent::new(DropdownEventKind::BeforeClose)) {
            tracing::debug!("dropdown close cancelled");
            return;
        }
        if !self.close_now() {
            return;
        }
        self.request_update();
        self.emit(DropdownEvent::new(DropdownEventKind::Close));
    }

    fn toggle(self: &Rc<Self>) {
        let is_open = self.state.borrow().is_open;
        if is_open {
            self.close();
        } else {
            self.open();
        }
    }

    /// Leave the Open state without events; returns whether it was open
    fn close_now(&self) -> bool {
        let (listeners, panel) = {
            let mut state = self.state.borrow_mut();
            if !state.is_open {
                return false;
            }
            state.is_open = false;
            state.position = None;
            clear_timers(&self.doc, &mut state);
            (std::mem::take(&mut state.open_listeners), state.panel)
        };
        for id in listeners {
            self.doc.remove_event_listener(id);
        }
        if let Some(panel) = panel {
            if let Err(err) = styles::reset_position(&self.doc, panel) {
                tracing::warn!("failed to reset dropdown panel styles: {}", err);
            }
        }
        tracing::debug!("dropdown closed");
        true
    }

    /// Unconditional cleanup for disconnect, destroy and drop
    fn teardown(&self) {
        clear_timers(&self.doc, &mut self.state.borrow_mut());
        let was_open = self.close_now();
        self.unbind_trigger();
        if was_open {
            self.request_update();
        }
    }

    // =========================================================================
    // Positioning
    // =========================================================================

    fn update_position(&self) -> Result<Position> {
        let (trigger, panel, options, processor, z_index, min_width, max_width) = {
            let state = self.state.borrow();
            let (Some(trigger), Some(panel)) = (state.trigger, state.panel) else {
                return Err(PositionError::MissingElements);
            };
            let config = &state.config;
            (
                trigger,
                panel,
                PositionOptions::from(config),
                config.position_processor.clone(),
                config.z_index,
                config.min_width,
                config.max_width,
            )
        };

        let position =
            calculate_complete_position(&self.doc, trigger, panel, &options, processor.as_ref())?;

        let min_width = if options.match_trigger_width && options.mode == PositioningMode::Absolute
        {
            let trigger_width = self.doc.layout(trigger)?.width();
            Some(min_width.map_or(trigger_width, |min| min.max(trigger_width)))
        } else {
            min_width
        };
        let style = PanelStyle {
            z_index,
            min_width,
            max_width,
        };
        styles::apply_position(&self.doc, panel, &position, &style)?;
        Ok(position)
    }

    /// Recompute and apply the position; failures are logged and leave the old one
    fn reposition(&self) {
        if !self.state.borrow().is_open {
            return;
        }
        match self.update_position() {
            Ok(position) => {
                self.state.borrow_mut().position = Some(position);
                self.emit(DropdownEvent::new(DropdownEventKind::Reposition).with_detail(position));
            }
            Err(err) => tracing::warn!("dropdown positioning failed: {}", err),
        }
    }

    // =========================================================================
    // Open-state listeners
    // =========================================================================

    fn attach_open_listeners(self: &Rc<Self>) {
        let (outside_click, escape, scroll) = {
            let state = self.state.borrow();
            if !state.is_open {
                return;
            }
            (
                state.config.close_on_outside_click,
                state.config.close_on_escape,
                state.config.scroll_behavior,
            )
        };

        let mut listeners: SmallVec<[ListenerId; 4]> = SmallVec::new();
        let mut debounced: SmallVec<[Debounced; 2]> = SmallVec::new();

        if outside_click {
            listeners.push(self.listen(
                EventTarget::Document,
                EventKind::Click,
                ListenerOptions::CAPTURE,
                |shared, event| shared.on_document_click(event),
            ));
        }
        if escape {
            listeners.push(self.listen(
                EventTarget::Document,
                EventKind::KeyDown,
                ListenerOptions::BUBBLE,
                |shared, event| {
                    if event.key() == Some(&Key::Escape) {
                        shared.close();
                    }
                },
            ));
        }
        if scroll != ScrollBehavior::None {
            let weak = Rc::downgrade(self);
            let tick = debounce(&self.doc, SCROLL_DEBOUNCE_MS, move || {
                if let Some(shared) = weak.upgrade() {
                    shared.on_scroll_settled();
                }
            });
            let handler = tick.clone();
            listeners.push(self.doc.add_event_listener(
                EventTarget::Window,
                EventKind::Scroll,
                ListenerOptions::BUBBLE,
                move |_| handler.trigger(),
            ));
            debounced.push(tick);
        }

        let weak = Rc::downgrade(self);
        let tick = debounce(&self.doc, RESIZE_DEBOUNCE_MS, move || {
            if let Some(shared) = weak.upgrade() {
                shared.reposition();
            }
        });
        let handler = tick.clone();
        listeners.push(self.doc.add_event_listener(
            EventTarget::Window,
            EventKind::Resize,
            ListenerOptions::BUBBLE,
            move |_| handler.trigger(),
        ));
        debounced.push(tick);

        tracing::debug!("attached {} open-state listeners", listeners.len());
        let mut state = self.state.borrow_mut();
        state.open_listeners.extend(listeners);
        state.debounced.extend(debounced);
    }

    fn detach_open_listeners(&self) {
        let (listeners, debounced) = {
            let mut state = self.state.borrow_mut();
            (
                std::mem::take(&mut state.open_listeners),
                std::mem::take(&mut state.debounced),
            )
        };
        for tick in debounced {
            tick.cancel();
        }
        for id in listeners {
            self.doc.remove_event_listener(id);
        }
    }

    fn on_document_click(&self, event: &Event) {
        let inside = {
            let state = self.state.borrow();
            event.target_node().is_some_and(|node| {
                let owned: SmallVec<[NodeId; 2]> =
                    [state.trigger, state.panel].into_iter().flatten().collect();
                is_within_any(&self.doc, node, &owned)
                    || is_within_selector(&self.doc, node, &state.excludes)
            })
        };
        if !inside {
            tracing::debug!("outside click on {:?}", event.target());
            self.close();
        }
    }

    fn on_scroll_settled(&self) {
        let (behavior, trigger) = {
            let state = self.state.borrow();
            if !state.is_open {
                return;
            }
            (state.config.scroll_behavior, state.trigger)
        };
        tracing::trace!("scroll settled ({})", behavior);
        match behavior {
            ScrollBehavior::None => {}
            ScrollBehavior::Close => {
                if trigger.is_some_and(|trigger| !is_in_viewport(&self.doc, trigger)) {
                    self.close();
                }
            }
            ScrollBehavior::Reposition => self.reposition(),
        }
    }

    // =========================================================================
    // Trigger bindings
    // =========================================================================

    fn bind_trigger(self: &Rc<Self>) {
        let (mode, trigger, panel) = {
            let state = self.state.borrow();
            if !state.connected || state.destroyed || !state.trigger_listeners.is_empty() {
                return;
            }
            let Some(trigger) = state.trigger else {
                return;
            };
            (state.config.trigger, trigger, state.panel)
        };

        let on = EventTarget::Node(trigger);
        let bubble = ListenerOptions::BUBBLE;
        let mut listeners: SmallVec<[ListenerId; 4]> = SmallVec::new();
        match mode {
            TriggerMode::Click => {
                listeners.push(self.listen(on, EventKind::Click, bubble, |shared, event| {
                    event.stop_propagation();
                    shared.toggle();
                }));
            }
            TriggerMode::Hover => {
                listeners.push(self.listen(on, EventKind::MouseEnter, bubble, |shared, _| {
                    shared.on_trigger_enter()
                }));
                listeners.push(self.listen(on, EventKind::MouseLeave, bubble, |shared, _| {
                    shared.on_trigger_leave()
                }));
                if let Some(panel) = panel {
                    let on_panel = EventTarget::Node(panel);
                    listeners.push(self.listen(on_panel, EventKind::MouseEnter, bubble, |shared, _| {
                        shared.on_panel_enter()
                    }));
                    listeners.push(self.listen(on_panel, EventKind::MouseLeave, bubble, |shared, _| {
                        shared.on_panel_leave()
                    }));
                }
            }
            TriggerMode::Focus => {
                listeners.push(self.listen(on, EventKind::FocusIn, bubble, |shared, _| {
                    shared.on_trigger_focus_in()
                }));
                listeners.push(self.listen(on, EventKind::FocusOut, bubble, |shared, _| {
                    shared.on_trigger_focus_out()
                }));
            }
            TriggerMode::Manual => {}
        }

        tracing::debug!("bound {} {} trigger listeners", listeners.len(), mode);
        self.state.borrow_mut().trigger_listeners = listeners;
    }

    fn unbind_trigger(&self) {
        let listeners = std::mem::take(&mut self.state.borrow_mut().trigger_listeners);
        for id in listeners {
            self.doc.remove_event_listener(id);
        }
    }

    // Hover-open and hover-close timers cancel each other

    fn on_trigger_enter(self: &Rc<Self>) {
        let mut state = self.state.borrow_mut();
        cancel_timer(&self.doc, &mut state.hover_close_timer);
        if state.is_open || state.hover_open_timer.is_some() {
            return;
        }
        let delay = state.config.hover_delay_ms;
        let weak = Rc::downgrade(self);
        state.hover_open_timer = Some(self.doc.set_timeout(delay, move || {
            if let Some(shared) = weak.upgrade() {
                shared.state.borrow_mut().hover_open_timer = None;
                shared.open();
            }
        }));
    }

    fn on_trigger_leave(self: &Rc<Self>) {
        let mut state = self.state.borrow_mut();
        cancel_timer(&self.doc, &mut state.hover_open_timer);
        if state.is_open {
            self.schedule_hover_close(&mut state);
        }
    }

    fn on_panel_enter(&self) {
        cancel_timer(&self.doc, &mut self.state.borrow_mut().hover_close_timer);
    }

    fn on_panel_leave(self: &Rc<Self>) {
        let mut state = self.state.borrow_mut();
        let over_trigger = state
            .trigger
            .is_some_and(|trigger| is_hovered(&self.doc, trigger));
        if state.is_open && !over_trigger {
            self.schedule_hover_close(&mut state);
        }
    }

    fn schedule_hover_close(self: &Rc<Self>, state: &mut State) {
        cancel_timer(&self.doc, &mut state.hover_open_timer);
        cancel_timer(&self.doc, &mut state.hover_close_timer);
        let weak = Rc::downgrade(self);
        state.hover_close_timer = Some(self.doc.set_timeout(HOVER_CLOSE_DELAY_MS, move || {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            shared.state.borrow_mut().hover_close_timer = None;
            let still_hovered = {
                let state = shared.state.borrow();
                [state.trigger, state.panel]
                    .into_iter()
                    .flatten()
                    .any(|node| is_hovered(&shared.doc, node))
            };
            if !still_hovered {
                shared.close();
            }
        }));
    }

    fn on_trigger_focus_in(self: &Rc<Self>) {
        cancel_timer(&self.doc, &mut self.state.borrow_mut().focus_close_timer);
        self.open();
    }

    fn on_trigger_focus_out(self: &Rc<Self>) {
        let mut state = self.state.borrow_mut();
        if !state.is_open {
            return;
        }
        cancel_timer(&self.doc, &mut state.focus_close_timer);
        let weak = Rc::downgrade(self);
        state.focus_close_timer = Some(self.doc.set_timeout(FOCUS_CLOSE_DELAY_MS, move || {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            shared.state.borrow_mut().focus_close_timer = None;
            let focus_kept = {
                let state = shared.state.borrow();
                [state.trigger, state.panel]
                    .into_iter()
                    .flatten()
                    .any(|node| is_focused_within(&shared.doc, node))
            };
            if !focus_kept {
                shared.close();
            }
        }));
    }

    // =========================================================================
    // Host lifecycle
    // =========================================================================

    fn connect(self: &Rc<Self>) {
        {
            let mut state = self.state.borrow_mut();
            if state.destroyed {
                return;
            }
            state.connected = true;
        }
        self.bind_trigger();
    }

    fn disconnect(&self) {
        self.teardown();
        self.state.borrow_mut().connected = false;
    }
}

/// Positioning and interaction controller for one dropdown
///
/// Created by a host widget against the document its elements live in.
/// Dropping the controller removes every listener and timer it owns.
pub struct DropdownController {
    shared: Rc<Shared>,
}

impl DropdownController {
    pub fn new<H>(doc: &Document, host: &Rc<H>, config: DropdownConfig) -> Self
    where
        H: Host + 'static,
    {
        let host: Weak<H> = Rc::downgrade(host);
        let host: Weak<dyn Host> = host;
        let excludes = parse_excludes(&config.exclude_selectors);
        Self {
            shared: Rc::new(Shared {
                doc: doc.clone(),
                host,
                state: RefCell::new(State {
                    config,
                    excludes,
                    is_open: false,
                    connected: false,
                    destroyed: false,
                    trigger: None,
                    panel: None,
                    position: None,
                    trigger_listeners: SmallVec::new(),
                    open_listeners: SmallVec::new(),
                    hover_open_timer: None,
                    hover_close_timer: None,
                    focus_close_timer: None,
                    open_frame: None,
                    debounced: SmallVec::new(),
                }),
            }),
        }
    }

    pub fn document(&self) -> &Document {
        &self.shared.doc
    }

    /// Open the panel unless disabled, already open, or cancelled by `before-open`
    pub fn open(&self) {
        self.shared.open();
    }

    /// Close the panel unless already closed or cancelled by `before-close`
    pub fn close(&self) {
        self.shared.close();
    }

    pub fn toggle(&self) {
        self.shared.toggle();
    }

    pub fn is_open(&self) -> bool {
        self.shared.state.borrow().is_open
    }

    /// Last applied position; `None` while closed or before the first frame
    pub fn position(&self) -> Option<Position> {
        self.shared.state.borrow().position
    }

    /// Space around the trigger in each direction
    pub fn available_space(&self) -> Result<Edges> {
        let trigger = self
            .shared
            .state
            .borrow()
            .trigger
            .ok_or(PositionError::MissingElements)?;
        calculate_available_space(&self.shared.doc, trigger)
    }

    pub fn trigger(&self) -> Option<NodeId> {
        self.shared.state.borrow().trigger
    }

    pub fn panel(&self) -> Option<NodeId> {
        self.shared.state.borrow().panel
    }

    /// Associate the panel and trigger elements, rebinding trigger listeners
    pub fn set_elements(&self, panel: NodeId, trigger: NodeId) {
        let shared = &self.shared;
        shared.unbind_trigger();
        let (previous_panel, is_open) = {
            let mut state = shared.state.borrow_mut();
            state.trigger = Some(trigger);
            (state.panel.replace(panel), state.is_open)
        };
        if is_open {
            if let Some(previous) = previous_panel.filter(|previous| *previous != panel) {
                if let Err(err) = styles::reset_position(&shared.doc, previous) {
                    tracing::warn!("failed to reset previous dropdown panel: {}", err);
                }
            }
        }
        shared.bind_trigger();
        if is_open {
            shared.reposition();
        }
    }

    /// Shallow-merge a configuration patch; an open dropdown repositions immediately
    pub fn update_config(&self, patch: &ConfigPatch) {
        let shared = &self.shared;
        let (mode_changed, is_open, listeners_attached) = {
            let mut guard = shared.state.borrow_mut();
            let state = &mut *guard;
            let previous_mode = state.config.trigger;
            state.config.apply(patch);
            if patch.exclude_selectors.is_some() {
                state.excludes = parse_excludes(&state.config.exclude_selectors);
            }
            (
                previous_mode != state.config.trigger,
                state.is_open,
                state.open_frame.is_none(),
            )
        };

        if mode_changed {
            {
                let mut state = shared.state.borrow_mut();
                cancel_timer(&shared.doc, &mut state.hover_open_timer);
                cancel_timer(&shared.doc, &mut state.hover_close_timer);
                cancel_timer(&shared.doc, &mut state.focus_close_timer);
            }
            shared.unbind_trigger();
            shared.bind_trigger();
        }
        if is_open {
            if listeners_attached {
                shared.detach_open_listeners();
                shared.attach_open_listeners();
            }
            shared.reposition();
        }
    }

    /// Install or clear the position post-processor
    pub fn set_position_processor(&self, processor: Option<PositionProcessor>) {
        self.shared.state.borrow_mut().config.position_processor = processor;
        self.shared.reposition();
    }

    /// Recompute the position now (no-op while closed)
    pub fn reposition(&self) {
        self.shared.reposition();
    }

    /// Snapshot of the current configuration
    pub fn config(&self) -> DropdownConfig {
        self.shared.state.borrow().config.clone()
    }

    /// Number of listeners this controller currently has registered
    ///
    /// Includes the trigger bindings, which stay attached across `close()`
    /// while the controller is connected. Only the document and window
    /// listeners are dropped on close.
    pub fn listener_count(&self) -> usize {
        let state = self.shared.state.borrow();
        state.trigger_listeners.len() + state.open_listeners.len()
    }

    /// Tear down for good; later `open` calls are ignored
    pub fn destroy(&self) {
        self.shared.teardown();
        let mut state = self.shared.state.borrow_mut();
        state.destroyed = true;
        state.connected = false;
    }
}

impl HostController for DropdownController {
    fn host_connected(&self) {
        self.shared.connect();
    }

    fn host_disconnected(&self) {
        self.shared.disconnect();
    }
}

impl Drop for DropdownController {
    fn drop(&mut self) {
        self.shared.teardown();
    }
}

impl fmt::Debug for DropdownController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.borrow();
        f.debug_struct("DropdownController")
            .field("is_open", &state.is_open)
            .field("connected", &state.connected)
            .field("trigger", &state.trigger)
            .field("panel", &state.panel)
            .field("position", &state.position)
            .field(
                "listeners",
                &(state.trigger_listeners.len() + state.open_listeners.len()),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Alignment, Placement};
    use crate::host::ControllerHost;
    use perch_core::{Point, Rect, Size};
    use std::cell::Cell;

    #[derive(Default)]
    struct TestHost {
        disabled: Cell<bool>,
        updates: Cell<usize>,
        events: RefCell<Vec<DropdownEventKind>>,
        cancel: RefCell<Vec<DropdownEventKind>>,
        positions: RefCell<Vec<Position>>,
    }

    impl Host for TestHost {
        fn is_disabled(&self) -> bool {
            self.disabled.get()
        }

        fn request_update(&self) {
            self.updates.set(self.updates.get() + 1);
        }

        fn dispatch_event(&self, event: &DropdownEvent) -> bool {
            self.events.borrow_mut().push(event.kind());
            if let Some(position) = event.detail() {
                self.positions.borrow_mut().push(*position);
            }
            if self.cancel.borrow().contains(&event.kind()) {
                event.prevent_default();
            }
            !event.is_default_prevented()
        }
    }

    struct Fixture {
        doc: Document,
        host: Rc<TestHost>,
        controllers: ControllerHost,
        dropdown: Rc<DropdownController>,
        trigger: NodeId,
        panel: NodeId,
        item: NodeId,
        outside: NodeId,
    }

    fn element(doc: &Document, parent: NodeId, tag: &str, rect: Rect) -> NodeId {
        let node = doc.create_element(tag);
        doc.append_child(parent, node).unwrap();
        doc.set_layout(node, rect).unwrap();
        node
    }

    fn fixture(config: DropdownConfig) -> Fixture {
        let doc = Document::new(Size::new(800.0, 600.0));
        let root = doc.root();
        let trigger = element(&doc, root, "button", Rect::new(10.0, 100.0, 100.0, 30.0));
        let panel = element(&doc, root, "div", Rect::new(10.0, 134.0, 200.0, 150.0));
        let item = element(&doc, panel, "a", Rect::new(10.0, 134.0, 200.0, 30.0));
        let outside = element(&doc, root, "div", Rect::new(400.0, 400.0, 100.0, 100.0));

        let host = Rc::new(TestHost::default());
        let dropdown = Rc::new(DropdownController::new(&doc, &host, config));
        dropdown.set_elements(panel, trigger);

        let controllers = ControllerHost::new();
        controllers.add_controller(dropdown.clone());
        controllers.connect();

        Fixture {
            doc,
            host,
            controllers,
            dropdown,
            trigger,
            panel,
            item,
            outside,
        }
    }

    impl Fixture {
        fn open(&self) {
            self.dropdown.open();
            self.doc.flush_frames();
        }

        fn events(&self) -> Vec<DropdownEventKind> {
            self.host.events.borrow().clone()
        }

        fn count(&self, kind: DropdownEventKind) -> usize {
            self.host.events.borrow().iter().filter(|k| **k == kind).count()
        }

        fn open_state_listeners(&self) -> usize {
            self.doc.listener_count_on(EventTarget::Document)
                + self.doc.listener_count_on(EventTarget::Window)
        }
    }

    #[test]
    fn test_click_trigger_toggles() {
        let f = fixture(DropdownConfig::default());
        assert_eq!(f.dropdown.listener_count(), 1);

        f.doc.click(f.trigger);
        assert!(f.dropdown.is_open());
        assert_eq!(f.events(), vec![DropdownEventKind::BeforeOpen]);

        f.doc.flush_frames();
        assert_eq!(
            f.events(),
            vec![
                DropdownEventKind::BeforeOpen,
                DropdownEventKind::Reposition,
                DropdownEventKind::Open
            ]
        );
        assert_eq!(f.doc.listener_count_on(EventTarget::Document), 2);
        assert_eq!(f.doc.listener_count_on(EventTarget::Window), 2);

        f.doc.click(f.trigger);
        assert!(!f.dropdown.is_open());
        assert_eq!(f.count(DropdownEventKind::Close), 1);
        assert_eq!(f.open_state_listeners(), 0);
        assert_eq!(f.dropdown.listener_count(), 1);
    }

    #[test]
    fn test_open_is_idempotent() {
        let f = fixture(DropdownConfig::default());
        f.open();
        let listeners = f.doc.listener_count();
        f.open();
        f.dropdown.open();

        assert_eq!(f.count(DropdownEventKind::BeforeOpen), 1);
        assert_eq!(f.count(DropdownEventKind::Open), 1);
        assert_eq!(f.doc.listener_count(), listeners);
        assert_eq!(f.host.updates.get(), 1);
    }

    #[test]
    fn test_position_deferred_to_next_frame() {
        let f = fixture(DropdownConfig::default());
        f.dropdown.open();
        assert!(f.dropdown.is_open());
        assert_eq!(f.dropdown.position(), None);
        assert_eq!(f.doc.style(f.panel, "top"), None);
        assert_eq!(f.open_state_listeners(), 0);

        f.doc.flush_frames();
        let position = f.dropdown.position().unwrap();
        assert_eq!(position.placement, Placement::Bottom);
        assert_eq!(position.top, 134.0);
        assert_eq!(f.doc.style(f.panel, "top").as_deref(), Some("134px"));
    }

    #[test]
    fn test_flips_above_trigger_near_viewport_bottom() {
        let f = fixture(DropdownConfig::default());
        f.doc
            .set_layout(f.trigger, Rect::new(10.0, 500.0, 100.0, 30.0))
            .unwrap();
        f.open();

        let position = f.dropdown.position().unwrap();
        assert_eq!(position.placement, Placement::Top);
        assert_eq!(position.top, 346.0);
        assert_eq!(position.left, 10.0);

        assert_eq!(f.doc.style(f.panel, "position").as_deref(), Some("fixed"));
        assert_eq!(f.doc.style(f.panel, "top").as_deref(), Some("346px"));
        assert_eq!(f.doc.style(f.panel, "left").as_deref(), Some("10px"));
        assert_eq!(f.doc.style(f.panel, "max-height").as_deref(), Some("496px"));
        assert_eq!(f.doc.style(f.panel, "z-index").as_deref(), Some("1000"));
        assert!(f.doc.has_class(f.panel, "placement-top"));
        assert!(f.doc.has_class(f.panel, "alignment-left"));
        assert_eq!(f.host.positions.borrow().last(), Some(&position));
    }

    #[test]
    fn test_close_resets_panel() {
        let f = fixture(DropdownConfig::default());
        f.doc.add_class(f.panel, "menu").unwrap();
        f.open();
        f.dropdown.close();

        assert_eq!(f.dropdown.position(), None);
        assert!(f.doc.styles(f.panel).is_empty());
        assert_eq!(f.doc.classes(f.panel), vec!["menu".to_string()]);
        assert_eq!(f.host.updates.get(), 2);
        assert_eq!(
            &f.events()[3..],
            &[DropdownEventKind::BeforeClose, DropdownEventKind::Close]
        );
    }

    #[test]
    fn test_cancelled_before_open() {
        let f = fixture(DropdownConfig::default());
        f.host.cancel.borrow_mut().push(DropdownEventKind::BeforeOpen);

        f.doc.click(f.trigger);
        assert!(!f.dropdown.is_open());
        assert_eq!(f.doc.pending_frames(), 0);
        f.doc.flush_frames();
        assert_eq!(f.open_state_listeners(), 0);
        assert_eq!(f.dropdown.listener_count(), 1);
        assert_eq!(f.host.updates.get(), 0);
        assert_eq!(f.events(), vec![DropdownEventKind::BeforeOpen]);
    }

    #[test]
    fn test_cancelled_before_close() {
        let f = fixture(DropdownConfig::default());
        f.open();
        f.host.cancel.borrow_mut().push(DropdownEventKind::BeforeClose);

        f.dropdown.close();
        f.doc.key_down(Key::Escape);
        assert!(f.dropdown.is_open());
        assert_eq!(f.count(DropdownEventKind::Close), 0);
    }

    #[test]
    fn test_disabled_refuses_open() {
        let mut config = DropdownConfig::default();
        config.disabled = true;
        let f = fixture(config);
        f.doc.click(f.trigger);
        assert!(!f.dropdown.is_open());
        assert!(f.events().is_empty());

        let f = fixture(DropdownConfig::default());
        f.host.disabled.set(true);
        f.dropdown.toggle();
        assert!(!f.dropdown.is_open());
        f.host.disabled.set(false);
        f.dropdown.toggle();
        assert!(f.dropdown.is_open());
    }

    #[test]
    fn test_outside_click_respects_excluded_selectors() {
        let f = fixture(DropdownConfig::default().with_exclude_selector(".cascade-panel"));
        let cascade = element(
            &f.doc,
            f.doc.root(),
            "div",
            Rect::new(600.0, 50.0, 100.0, 100.0),
        );
        f.doc.add_class(cascade, "cascade-panel").unwrap();
        let nested = element(&f.doc, cascade, "span", Rect::new(600.0, 50.0, 100.0, 20.0));
        f.open();

        f.doc.click(f.item);
        assert!(f.dropdown.is_open());
        f.doc.click(nested);
        assert!(f.dropdown.is_open());

        f.doc.click(f.outside);
        assert!(!f.dropdown.is_open());

        f.open();
        f.doc.click_at(Point::new(700.0, 550.0));
        assert!(!f.dropdown.is_open());
    }

    #[test]
    fn test_outside_click_disabled() {
        let mut config = DropdownConfig::default();
        config.close_on_outside_click = false;
        let f = fixture(config);
        f.open();
        f.doc.click(f.outside);
        assert!(f.dropdown.is_open());
        assert_eq!(f.doc.listener_count_on(EventTarget::Document), 1);
    }

    #[test]
    fn test_escape_closes() {
        let f = fixture(DropdownConfig::default());
        f.open();
        f.doc.key_down(Key::Character('a'));
        assert!(f.dropdown.is_open());
        f.doc.focus(f.item).unwrap();
        f.doc.key_down(Key::Escape);
        assert!(!f.dropdown.is_open());
    }

    #[test]
    fn test_hover_intent_delay() {
        let f = fixture(DropdownConfig::default().with_trigger(TriggerMode::Hover));
        assert_eq!(f.dropdown.listener_count(), 4);

        f.doc.set_hovered(Some(f.trigger));
        f.doc.advance(149);
        assert!(!f.dropdown.is_open());
        f.doc.advance(1);
        assert!(f.dropdown.is_open());

        f.doc.flush_frames();
        assert_eq!(f.count(DropdownEventKind::Open), 1);
    }

    #[test]
    fn test_hover_reenter_cancels_pending_close() {
        let f = fixture(DropdownConfig::default().with_trigger(TriggerMode::Hover));
        f.doc.set_hovered(Some(f.trigger));
        f.doc.advance(150);
        f.doc.flush_frames();

        f.doc.set_hovered(Some(f.outside));
        f.doc.advance(50);
        f.doc.set_hovered(Some(f.trigger));
        f.doc.advance(500);

        assert!(f.dropdown.is_open());
        assert_eq!(f.count(DropdownEventKind::BeforeClose), 0);
        assert_eq!(f.doc.pending_timers(), 0);
    }

    #[test]
    fn test_hover_moves_into_panel_then_out() {
        let f = fixture(DropdownConfig::default().with_trigger(TriggerMode::Hover));
        f.doc.set_hovered(Some(f.trigger));
        f.doc.advance(150);
        f.doc.flush_frames();

        f.doc.set_hovered(Some(f.item));
        f.doc.advance(200);
        assert!(f.dropdown.is_open());

        f.doc.set_hovered(Some(f.outside));
        f.doc.advance(99);
        assert!(f.dropdown.is_open());
        f.doc.advance(1);
        assert!(!f.dropdown.is_open());
    }

    #[test]
    fn test_hover_leave_before_delay_never_opens() {
        let f = fixture(DropdownConfig::default().with_trigger(TriggerMode::Hover));
        f.doc.set_hovered(Some(f.trigger));
        f.doc.advance(100);
        f.doc.set_hovered(None);
        f.doc.advance(500);

        assert!(!f.dropdown.is_open());
        assert!(f.events().is_empty());
        assert_eq!(f.doc.pending_timers(), 0);
    }

    #[test]
    fn test_focus_mode() {
        let f = fixture(DropdownConfig::default().with_trigger(TriggerMode::Focus));
        f.doc.focus(f.trigger).unwrap();
        assert!(f.dropdown.is_open());
        f.doc.flush_frames();

        // Focus moving into the panel keeps it open
        f.doc.focus(f.item).unwrap();
        f.doc.advance(FOCUS_CLOSE_DELAY_MS);
        assert!(f.dropdown.is_open());

        f.doc.focus(f.trigger).unwrap();
        f.doc.focus(f.outside).unwrap();
        f.doc.advance(FOCUS_CLOSE_DELAY_MS - 1);
        assert!(f.dropdown.is_open());
        f.doc.advance(1);
        assert!(!f.dropdown.is_open());
    }

    #[test]
    fn test_scroll_repositions_after_debounce() {
        let f = fixture(DropdownConfig::default());
        f.open();
        assert_eq!(f.dropdown.position().unwrap().top, 134.0);

        f.doc.scroll_to(Point::new(0.0, 20.0));
        f.doc.advance(10);
        f.doc.scroll_to(Point::new(0.0, 50.0));
        f.doc.advance(15);
        assert_eq!(f.dropdown.position().unwrap().top, 134.0);
        f.doc.advance(1);
        assert_eq!(f.dropdown.position().unwrap().top, 84.0);
        assert_eq!(f.count(DropdownEventKind::Reposition), 2);
    }

    #[test]
    fn test_scroll_closes_when_trigger_leaves_viewport() {
        let f = fixture(DropdownConfig::default().with_scroll_behavior(ScrollBehavior::Close));
        f.open();

        f.doc.scroll_to(Point::new(0.0, 50.0));
        f.doc.advance(SCROLL_DEBOUNCE_MS);
        assert!(f.dropdown.is_open());

        f.doc.scroll_to(Point::new(0.0, 200.0));
        f.doc.advance(SCROLL_DEBOUNCE_MS);
        assert!(!f.dropdown.is_open());
    }

    #[test]
    fn test_scroll_none_attaches_no_scroll_listener() {
        let f = fixture(DropdownConfig::default().with_scroll_behavior(ScrollBehavior::None));
        f.open();
        assert_eq!(f.doc.listener_count_on(EventTarget::Window), 1);
        f.doc.scroll_to(Point::new(0.0, 50.0));
        f.doc.advance(100);
        assert_eq!(f.count(DropdownEventKind::Reposition), 1);
    }

    #[test]
    fn test_resize_repositions() {
        let f = fixture(DropdownConfig::default());
        f.open();
        f.doc.set_viewport_size(Size::new(800.0, 200.0));
        f.doc.advance(RESIZE_DEBOUNCE_MS);

        let position = f.dropdown.position().unwrap();
        assert_eq!(position.placement, Placement::Top);
        assert_eq!(position.max_height, 96.0);
        assert_eq!(position.top, 0.0);
    }

    #[test]
    fn test_manual_mode_leaves_no_listeners_when_closed() {
        let f = fixture(DropdownConfig::default().with_trigger(TriggerMode::Manual));
        assert_eq!(f.doc.listener_count(), 0);

        f.open();
        f.dropdown.toggle();
        f.dropdown.open();
        f.dropdown.close();
        f.dropdown.toggle();
        f.doc.flush_frames();
        f.doc.scroll_to(Point::new(0.0, 10.0));
        f.dropdown.close();

        assert!(!f.dropdown.is_open());
        assert_eq!(f.doc.listener_count(), 0);
        assert_eq!(f.dropdown.listener_count(), 0);
        assert_eq!(f.doc.pending_timers(), 0);
        assert_eq!(f.doc.pending_frames(), 0);
    }

    #[test]
    fn test_disconnect_tears_everything_down() {
        let f = fixture(DropdownConfig::default().with_trigger(TriggerMode::Hover));
        f.open();
        f.doc.set_hovered(Some(f.trigger));
        f.doc.set_hovered(Some(f.outside));
        f.doc.scroll_to(Point::new(0.0, 10.0));
        assert!(f.doc.pending_timers() > 0);

        f.controllers.disconnect();
        assert!(!f.dropdown.is_open());
        assert_eq!(f.doc.listener_count(), 0);
        assert_eq!(f.doc.pending_timers(), 0);
        assert!(f.doc.styles(f.panel).is_empty());

        f.controllers.connect();
        assert_eq!(f.dropdown.listener_count(), 4);
    }

    #[test]
    fn test_destroy_and_drop_release_listeners() {
        let f = fixture(DropdownConfig::default());
        f.open();
        f.dropdown.destroy();
        assert_eq!(f.doc.listener_count(), 0);
        f.dropdown.open();
        assert!(!f.dropdown.is_open());

        let doc = Document::new(Size::new(800.0, 600.0));
        let trigger = element(&doc, doc.root(), "button", Rect::new(0.0, 0.0, 50.0, 20.0));
        let panel = element(&doc, doc.root(), "div", Rect::new(0.0, 24.0, 80.0, 60.0));
        let host = Rc::new(TestHost::default());
        let dropdown = DropdownController::new(&doc, &host, DropdownConfig::default());
        dropdown.set_elements(panel, trigger);
        dropdown.host_connected();
        dropdown.open();
        doc.flush_frames();
        assert_eq!(doc.listener_count(), 5);

        drop(dropdown);
        assert_eq!(doc.listener_count(), 0);
        assert!(doc.styles(panel).is_empty());
    }

    #[test]
    fn test_update_config_while_open() {
        let f = fixture(DropdownConfig::default());
        f.doc
            .set_layout(f.trigger, Rect::new(300.0, 100.0, 100.0, 30.0))
            .unwrap();
        f.open();
        assert_eq!(f.dropdown.position().unwrap().left, 300.0);

        f.dropdown.update_config(&ConfigPatch {
            alignment: Some(Alignment::End),
            close_on_escape: Some(false),
            ..ConfigPatch::default()
        });
        assert_eq!(f.dropdown.position().unwrap().left, 200.0);
        assert_eq!(f.events().last(), Some(&DropdownEventKind::Reposition));
        assert_eq!(f.doc.listener_count_on(EventTarget::Document), 1);

        f.doc.key_down(Key::Escape);
        assert!(f.dropdown.is_open());
    }

    #[test]
    fn test_update_config_rebinds_trigger_mode() {
        let f = fixture(DropdownConfig::default());
        let patch = ConfigPatch::from_json(r#"{"trigger": "manual"}"#).unwrap();
        f.dropdown.update_config(&patch);

        assert_eq!(f.dropdown.config().trigger, TriggerMode::Manual);
        assert_eq!(f.dropdown.listener_count(), 0);
        f.doc.click(f.trigger);
        assert!(!f.dropdown.is_open());
    }

    #[test]
    fn test_trigger_mode_change_cancels_hover_timers() {
        let f = fixture(DropdownConfig::default().with_trigger(TriggerMode::Hover));
        f.doc.set_hovered(Some(f.trigger));
        f.doc.advance(150);
        f.doc.flush_frames();
        assert!(f.dropdown.is_open());

        // Pending hover-close from the old mode
        f.doc.set_hovered(Some(f.outside));
        let patch = ConfigPatch {
            trigger: Some(TriggerMode::Click),
            ..Default::default()
        };
        f.dropdown.update_config(&patch);
        f.doc.advance(200);
        assert!(f.dropdown.is_open());
        assert_eq!(f.count(DropdownEventKind::BeforeClose), 0);

        f.doc.click(f.trigger);
        assert!(!f.dropdown.is_open());
    }

    #[test]
    fn test_trigger_mode_change_cancels_pending_hover_open() {
        let f = fixture(DropdownConfig::default().with_trigger(TriggerMode::Hover));
        f.doc.set_hovered(Some(f.trigger));
        f.doc.advance(50);

        let patch = ConfigPatch {
            trigger: Some(TriggerMode::Manual),
            ..Default::default()
        };
        f.dropdown.update_config(&patch);
        assert_eq!(f.doc.pending_timers(), 0);
        f.doc.advance(500);
        assert!(!f.dropdown.is_open());
        assert!(f.events().is_empty());
    }

    #[test]
    fn test_set_elements_moves_bindings() {
        let f = fixture(DropdownConfig::default());
        let other = element(
            &f.doc,
            f.doc.root(),
            "button",
            Rect::new(300.0, 10.0, 80.0, 30.0),
        );
        f.dropdown.set_elements(f.panel, other);
        assert_eq!(f.dropdown.trigger(), Some(other));
        assert_eq!(f.dropdown.listener_count(), 1);

        f.doc.click(f.trigger);
        assert!(!f.dropdown.is_open());
        f.doc.click(other);
        assert!(f.dropdown.is_open());
    }

    #[test]
    fn test_available_space() {
        let f = fixture(DropdownConfig::default());
        let space = f.dropdown.available_space().unwrap();
        assert_eq!(space.above, 100.0);
        assert_eq!(space.below, 470.0);

        let lonely = DropdownController::new(&f.doc, &f.host, DropdownConfig::default());
        assert_eq!(
            lonely.available_space(),
            Err(PositionError::MissingElements)
        );
    }

    #[test]
    fn test_positioning_failure_keeps_dropdown_closable() {
        let f = fixture(DropdownConfig::default());
        f.open();
        let before = f.dropdown.position();

        f.doc.remove(f.trigger).unwrap();
        f.dropdown.reposition();
        assert_eq!(f.dropdown.position(), before);

        f.doc.key_down(Key::Escape);
        assert!(!f.dropdown.is_open());
        assert_eq!(f.open_state_listeners(), 0);
    }

    #[test]
    fn test_select_matches_trigger_width() {
        let f = fixture(DropdownConfig::select());
        f.doc
            .set_layout(f.trigger, Rect::new(10.0, 100.0, 300.0, 30.0))
            .unwrap();
        f.open();

        let position = f.dropdown.position().unwrap();
        assert_eq!(position.width, 300.0);
        assert_eq!(position.top, 134.0);
        assert_eq!(f.doc.style(f.panel, "position").as_deref(), Some("absolute"));
        assert_eq!(f.doc.style(f.panel, "min-width").as_deref(), Some("300px"));
        assert_eq!(f.doc.style(f.panel, "max-height").as_deref(), Some("300px"));
    }

    #[test]
    fn test_position_processor() {
        let f = fixture(DropdownConfig::default());
        f.open();
        f.dropdown.set_position_processor(Some(Rc::new(
            |mut position: Position, _: &crate::geometry::PositionContext| {
                position.top += 10.0;
                position
            },
        )));
        assert_eq!(f.dropdown.position().unwrap().top, 144.0);
        assert_eq!(f.doc.style(f.panel, "top").as_deref(), Some("144px"));
    }

    #[test]
    fn test_dropdowns_on_one_document_are_independent() {
        let f = fixture(DropdownConfig::default());
        let trigger = element(
            &f.doc,
            f.doc.root(),
            "button",
            Rect::new(500.0, 10.0, 80.0, 30.0),
        );
        let panel = element(
            &f.doc,
            f.doc.root(),
            "div",
            Rect::new(500.0, 44.0, 120.0, 80.0),
        );
        let second = Rc::new(DropdownController::new(
            &f.doc,
            &f.host,
            DropdownConfig::default(),
        ));
        second.set_elements(panel, trigger);
        f.controllers.add_controller(second.clone());

        f.open();
        f.doc.click(trigger);
        f.doc.flush_frames();
        assert!(!f.dropdown.is_open());
        assert!(second.is_open());
        assert_eq!(f.doc.listener_count_on(EventTarget::Document), 2);

        f.doc.key_down(Key::Escape);
        assert!(!second.is_open());
        assert_eq!(f.open_state_listeners(), 0);
    }
}
