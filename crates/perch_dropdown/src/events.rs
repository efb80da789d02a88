//! Lifecycle events emitted to the host

use std::cell::Cell;

use crate::geometry::Position;

/// Dropdown lifecycle event types
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DropdownEventKind {
    BeforeOpen,
    Open,
    BeforeClose,
    Close,
    Reposition,
}

impl DropdownEventKind {
    /// DOM event name
    pub fn name(self) -> &'static str {
        match self {
            DropdownEventKind::BeforeOpen => "dropdown-before-open",
            DropdownEventKind::Open => "dropdown-open",
            DropdownEventKind::BeforeClose => "dropdown-before-close",
            DropdownEventKind::Close => "dropdown-close",
            DropdownEventKind::Reposition => "dropdown-reposition",
        }
    }

    /// Only the `before-*` events can be cancelled
    pub fn is_cancelable(self) -> bool {
        matches!(
            self,
            DropdownEventKind::BeforeOpen | DropdownEventKind::BeforeClose
        )
    }
}

/// An event dispatched through [`Host::dispatch_event`](crate::host::Host::dispatch_event)
#[derive(Debug)]
pub struct DropdownEvent {
    kind: DropdownEventKind,
    detail: Option<Position>,
    default_prevented: Cell<bool>,
}

impl DropdownEvent {
    pub fn new(kind: DropdownEventKind) -> Self {
        Self {
            kind,
            detail: None,
            default_prevented: Cell::new(false),
        }
    }

    pub fn with_detail(mut self, position: Position) -> Self {
        self.detail = Some(position);
        self
    }

    pub fn kind(&self) -> DropdownEventKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Resolved position, carried by `dropdown-reposition` and `dropdown-open`
    pub fn detail(&self) -> Option<&Position> {
        self.detail.as_ref()
    }

    pub fn cancelable(&self) -> bool {
        self.kind.is_cancelable()
    }

    pub fn bubbles(&self) -> bool {
        true
    }

    pub fn composed(&self) -> bool {
        true
    }

    /// Cancel the pending transition; ignored for non-cancelable events
    pub fn prevent_default(&self) {
        if self.cancelable() {
            self.default_prevented.set(true);
        }
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented.get()
    }
}
